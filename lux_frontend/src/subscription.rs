use lux_core::browse::to_webcal;
use web_sys::{window, Document, Url};

/// Point `#subscribe-link` at the absolute `webcal://` URL of the calendar.
///
/// The published link may be relative, so it is resolved against the page URL first.
pub fn rewrite(document: &Document) {
    let Some(link) = document.get_element_by_id("subscribe-link") else {
        return;
    };
    let Some(href) = link.get_attribute("href") else {
        return;
    };
    let Some(base) = window().and_then(|window| window.location().href().ok()) else {
        return;
    };
    match Url::new_with_base(&href, &base) {
        Ok(url) => {
            let webcal = to_webcal(&url.href());
            if let Err(err) = link.set_attribute("href", &webcal) {
                log::debug!("cannot set subscription href: {err:?}");
            }
            link.set_text_content(Some(&webcal));
        }
        Err(err) => log::warn!("cannot resolve subscription link {href}: {err:?}"),
    }
}

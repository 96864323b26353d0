//! Browser side of the published landing page.
//!
//! The publisher renders the complete page, so everything works without this
//! module. Once loaded it restores the theme preference, turns the subscription
//! link into a `webcal://` link and adds category filters and search to the
//! event list.

mod filter;
mod subscription;
mod theme;

use wasm_bindgen::prelude::wasm_bindgen;
use web_sys::window;

#[wasm_bindgen(start)]
pub fn start() {
    #[cfg(target_arch = "wasm32")]
    wasm_logger::init(wasm_logger::Config::new(log::Level::Info));
    let Some(document) = window().and_then(|window| window.document()) else {
        return;
    };
    theme::bind(&document);
    subscription::rewrite(&document);
    filter::mount(&document);
}

//! Light/dark theme toggle backed by `localStorage`.

use std::cell::RefCell;

use lux_core::browse::{Theme, ThemeController, ThemeStore, ThemeStoreError, THEME_STORAGE_KEY};
use wasm_bindgen::{closure::Closure, JsCast};
use web_sys::{window, Document, Element, Event, Storage};

struct LocalStorage;

/// Accessing `localStorage` throws when storage is disabled, that is treated as absent.
fn local_storage() -> Option<Storage> {
    window()?.local_storage().ok().flatten()
}

impl ThemeStore for LocalStorage {
    fn load(&self) -> Option<String> {
        local_storage()?.get_item(THEME_STORAGE_KEY).ok().flatten()
    }

    fn save(&mut self, value: &str) -> Result<(), ThemeStoreError> {
        let storage = local_storage()
            .ok_or_else(|| ThemeStoreError(String::from("localStorage is unavailable")))?;
        storage
            .set_item(THEME_STORAGE_KEY, value)
            .map_err(|err| ThemeStoreError(format!("{err:?}")))
    }
}

/// Apply the stored theme and wire up `#theme-toggle`.
pub fn bind(document: &Document) {
    let controller = ThemeController::new(LocalStorage);
    let toggle = document.get_element_by_id("theme-toggle");
    apply(document, toggle.as_ref(), controller.theme());
    let Some(toggle) = toggle else {
        return;
    };

    let controller = RefCell::new(controller);
    let document = document.clone();
    let target = toggle.clone();
    let on_click = Closure::<dyn Fn(Event)>::new(move |_: Event| {
        let theme = controller.borrow_mut().toggle();
        apply(&document, Some(&target), theme);
    });
    if let Err(err) =
        toggle.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())
    {
        log::warn!("theme toggle unavailable: {err:?}");
    }
    // Lives as long as the page.
    on_click.forget();
}

fn apply(document: &Document, toggle: Option<&Element>, theme: Theme) {
    if let Some(root) = document.document_element() {
        set_attribute(&root, "data-theme", theme.as_str());
    }
    if let Some(toggle) = toggle {
        toggle.set_text_content(Some(theme.toggle_text()));
        set_attribute(toggle, "aria-label", theme.toggle_label());
        set_attribute(toggle, "aria-pressed", theme.aria_pressed());
    }
}

fn set_attribute(element: &Element, name: &str, value: &str) {
    if let Err(err) = element.set_attribute(name, value) {
        log::debug!("cannot set {name}: {err:?}");
    }
}

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, Event, EventTarget, HtmlElement};

/// Look up `#id` as a concrete element type.
///
/// Missing elements are normal (not every page carries every widget); an
/// element of the wrong type is logged and treated as missing.
pub fn element_by_id<T: JsCast>(doc: &Document, id: &str) -> Option<T> {
    let el = doc.get_element_by_id(id)?;
    match el.dyn_into::<T>() {
        Ok(typed) => Some(typed),
        Err(el) => {
            log::warn!("#{id} is a <{}>, not the expected element type", el.tag_name().to_lowercase());
            None
        }
    }
}

/// Set inline `display` style
pub fn set_display(el: &HtmlElement, display: &str) {
    let _ = el.style().set_property("display", display);
}

/// Displayed size of an element in CSS pixels
pub fn css_size(el: &Element) -> (f64, f64) {
    (f64::from(el.client_width()), f64::from(el.client_height()))
}

/// Inline `width`/`height` values that hold an element at a CSS size.
pub fn pinned_size(width: f64, height: f64) -> (String, String) {
    (format!("{width}px"), format!("{height}px"))
}

/// Fix the element's displayed size, so changing a canvas' backing store
/// cannot change its layout.
pub fn pin_css_size(el: &HtmlElement, width: f64, height: f64) {
    let (width, height) = pinned_size(width, height);
    let style = el.style();
    let _ = style.set_property("width", &width);
    let _ = style.set_property("height", &height);
}


/// An event listener that is detached again when dropped.
///
/// Call [`Listener::forget`] for listeners that should live as long as the
/// page does.
pub struct Listener {
    target: EventTarget,
    event: &'static str,
    callback: Option<Closure<dyn FnMut(Event)>>,
}

impl Listener {
    pub fn new<F>(target: &EventTarget, event: &'static str, handler: F) -> Result<Self, JsValue>
    where
        F: FnMut(Event) + 'static,
    {
        let callback = Closure::wrap(Box::new(handler) as Box<dyn FnMut(Event)>);
        target.add_event_listener_with_callback(event, callback.as_ref().unchecked_ref())?;
        Ok(Self {
            target: target.clone(),
            event,
            callback: Some(callback),
        })
    }

    /// Keep the listener attached for the rest of the page's life.
    pub fn forget(mut self) {
        if let Some(callback) = self.callback.take() {
            callback.forget();
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            let _ = self
                .target
                .remove_event_listener_with_callback(self.event, callback.as_ref().unchecked_ref());
        }
    }
}

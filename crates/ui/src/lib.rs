mod asset;
mod config;
mod dom;
mod error;
mod preview;
mod voice;
mod viewer;

use std::cell::RefCell;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{window, Document, Event, HtmlCanvasElement, PageTransitionEvent, Window};

use crate::config::DashboardConfig;
use crate::dom::{element_by_id, Listener};
use crate::error::UiError;
use crate::viewer::ViewerHandle;

thread_local! {
    static DASHBOARD: RefCell<Option<ViewerHandle>> = const { RefCell::new(None) };
}

#[wasm_bindgen(start)]
pub fn main_js() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    if let Err(e) = console_log::init_with_level(log::Level::Info) {
        web_sys::console::warn_1(&format!("logger already set: {e}").into());
    }

    let window = window().ok_or(UiError::NoWindow)?;
    let document = window.document().ok_or(UiError::NoWindow)?;
    let search = window.location().search().unwrap_or_default();

    let config = DashboardConfig::load(&document, &search);
    log::set_max_level(config.level_filter());
    log::info!("Dashboard widgets loading");

    if config.scene.enabled {
        start_viewer(&window, &document, &config)?;
    } else {
        log::info!("Hero viewer disabled");
    }

    // each widget is independent; one failing to bind leaves the others alone
    if let Err(e) = preview::mount(&document, &config.preview) {
        log::error!("Image preview not bound: {}", UiError::from_js(e));
    }
    if let Err(e) = voice::mount(&window, &document, &config.voice) {
        log::error!("Voice input not bound: {}", UiError::from_js(e));
    }

    Ok(())
}

fn start_viewer(window: &Window, document: &Document, config: &DashboardConfig) -> Result<(), JsValue> {
    let canvas = element_by_id::<HtmlCanvasElement>(document, &config.scene.canvas_id);
    let Some(handle) = viewer::bootstrap(canvas, &config.scene) else {
        log::debug!("No #{} on this page", config.scene.canvas_id);
        return Ok(());
    };
    DASHBOARD.with(|slot| *slot.borrow_mut() = Some(handle));

    // bfcache keeps the page (and its GL context) alive when persisted
    Listener::new(window, "pagehide", move |e: Event| {
        let persisted = e
            .dyn_ref::<PageTransitionEvent>()
            .is_some_and(PageTransitionEvent::persisted);
        if !persisted {
            teardown();
        }
    })?
    .forget();

    Ok(())
}

/// Stop the hero viewer and release its GPU resources.
#[wasm_bindgen]
pub fn teardown() {
    if let Some(handle) = DASHBOARD.with(|slot| slot.borrow_mut().take()) {
        handle.teardown();
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

//! requestAnimationFrame loop with explicit cancellation

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::Window;

use crate::error::UiError;

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

/// Calls `tick(timestamp_ms)` once per display refresh until stopped.
pub struct RenderLoop {
    window: Window,
    pending: Rc<Cell<Option<i32>>>,
    callback: FrameCallback,
}

impl RenderLoop {
    pub fn start(window: &Window, mut tick: impl FnMut(f64) + 'static) -> Result<Self, UiError> {
        let pending = Rc::new(Cell::new(None));
        let callback: FrameCallback = Rc::new(RefCell::new(None));

        let win = window.clone();
        let pending_inner = pending.clone();
        let callback_inner = callback.clone();
        let closure = Closure::wrap(Box::new(move |timestamp: f64| {
            pending_inner.set(None);
            tick(timestamp);

            // stop() clears the slot; nothing left to schedule then
            if let Some(cb) = callback_inner.borrow().as_ref() {
                match win.request_animation_frame(cb.as_ref().unchecked_ref()) {
                    Ok(id) => pending_inner.set(Some(id)),
                    Err(e) => log::error!("Render loop stopped: {}", UiError::from_js(e)),
                }
            }
        }) as Box<dyn FnMut(f64)>);

        let first = window
            .request_animation_frame(closure.as_ref().unchecked_ref())
            .map_err(UiError::from_js)?;
        pending.set(Some(first));
        *callback.borrow_mut() = Some(closure);

        Ok(Self {
            window: window.clone(),
            pending,
            callback,
        })
    }

    /// Cancel the queued frame and drop the callback (breaking its self reference).
    pub fn stop(&self) {
        if let Some(id) = self.pending.take() {
            let _ = self.window.cancel_animation_frame(id);
        }
        self.callback.borrow_mut().take();
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

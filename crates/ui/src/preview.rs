//! Inline preview of the image picked on the diagnose page
//!
//! Each selection starts a new read. Only the newest read may touch the
//! preview: an older read still in flight is aborted, and if it completes
//! anyway its result is discarded.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use base64::Engine as _;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Document, FileReader, HtmlElement, HtmlImageElement, HtmlInputElement};

use crate::asset::read_file;
use crate::config::PreviewConfig;
use crate::dom::{element_by_id, set_display, Listener};
use crate::error::UiError;

const FALLBACK_MIME: &str = "application/octet-stream";

/// Encode bytes as a `data:` URL, the same shape `FileReader.readAsDataURL` produces.
pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    let mime = if mime.is_empty() { FALLBACK_MIME } else { mime };
    format!(
        "data:{mime};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Where a finished preview goes.
pub trait PreviewTarget {
    fn show(&self, data_url: &str);
}

impl PreviewTarget for HtmlImageElement {
    fn show(&self, data_url: &str) {
        self.set_src(data_url);
        let el: &HtmlElement = self;
        set_display(el, "block");
    }
}

/// Ticket for one read; only the newest ticket can complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadTicket {
    generation: u64,
    mime: String,
}

pub struct PreviewController<T> {
    target: T,
    generation: Cell<u64>,
}

impl<T: PreviewTarget> PreviewController<T> {
    pub const fn new(target: T) -> Self {
        Self {
            target,
            generation: Cell::new(0),
        }
    }

    /// Start a read for the selected file's MIME type; `None` when nothing
    /// was selected, in which case the preview stays as it is.
    pub fn begin(&self, selected_mime: Option<String>) -> Option<ReadTicket> {
        let mime = selected_mime?;
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        Some(ReadTicket { generation, mime })
    }

    pub fn is_current(&self, ticket: &ReadTicket) -> bool {
        ticket.generation == self.generation.get()
    }

    /// Show the bytes if `ticket` is still the newest read. Returns whether
    /// the preview was updated.
    pub fn complete(&self, ticket: &ReadTicket, bytes: &[u8]) -> bool {
        if !self.is_current(ticket) {
            log::debug!("Dropping superseded preview read #{}", ticket.generation);
            return false;
        }
        self.target.show(&data_url(&ticket.mime, bytes));
        true
    }
}

/// Wire `#imageUpload` to `#imagePreview` if the page has both.
pub fn mount(doc: &Document, config: &PreviewConfig) -> Result<bool, JsValue> {
    let (Some(input), Some(image)) = (
        element_by_id::<HtmlInputElement>(doc, &config.input_id),
        element_by_id::<HtmlImageElement>(doc, &config.image_id),
    ) else {
        return Ok(false);
    };

    let controller = Rc::new(PreviewController::new(image));
    let in_flight: Rc<RefCell<Option<FileReader>>> = Rc::new(RefCell::new(None));
    let input_el = input.clone();

    Listener::new(&input, "change", move |_| {
        let Some(file) = input_el.files().and_then(|files| files.get(0)) else {
            return;
        };
        let Some(ticket) = controller.begin(Some(file.type_())) else {
            return;
        };

        if let Some(previous) = in_flight.borrow_mut().take() {
            previous.abort();
        }
        let reader = match FileReader::new() {
            Ok(reader) => reader,
            Err(e) => {
                log::error!("FileReader unavailable: {}", UiError::from_js(e));
                return;
            }
        };
        *in_flight.borrow_mut() = Some(reader.clone());

        let controller = controller.clone();
        let in_flight = in_flight.clone();
        spawn_local(async move {
            match read_file(&reader, &file).await {
                Ok(bytes) => {
                    controller.complete(&ticket, &bytes);
                }
                Err(UiError::ReadCancelled) => {}
                Err(e) => log::error!("Could not read '{}': {e}", file.name()),
            }
            if controller.is_current(&ticket) {
                in_flight.borrow_mut().take();
            }
        });
    })?
    .forget();

    log::debug!("Image preview bound to #{}", config.input_id);
    Ok(true)
}

use krishi_scene::ModelError;
use thiserror::Error;
use wasm_bindgen::{JsCast, JsValue};

#[derive(Debug, Error)]
pub enum UiError {
    #[error("no global `window` exists")]
    NoWindow,
    #[error("failed to create rendering surface: {0}")]
    Surface(String),
    #[error("no compatible graphics adapter")]
    NoAdapter,
    #[error("failed to open graphics device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("failed to acquire frame: {0}")]
    Frame(#[from] wgpu::SurfaceError),
    #[error("request for '{path}' failed with HTTP {status}")]
    HttpStatus { path: String, status: u16 },
    #[error("file read failed: {0}")]
    FileRead(String),
    #[error("file read was cancelled")]
    ReadCancelled,
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("{0}")]
    Js(String),
}

impl UiError {
    pub fn from_js(value: JsValue) -> Self {
        Self::Js(js_error_message(&value))
    }
}

impl From<UiError> for JsValue {
    fn from(err: UiError) -> Self {
        Self::from_str(&err.to_string())
    }
}

/// Best-effort human readable text for a thrown JS value.
pub fn js_error_message(value: &JsValue) -> String {
    if let Some(err) = value.dyn_ref::<js_sys::Error>() {
        return String::from(err.message());
    }
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

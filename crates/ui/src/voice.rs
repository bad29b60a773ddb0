//! Voice input for the ask page
//!
//! `idle -> listening -> (result | error | end) -> idle`. Pressing the mic
//! while a session is already listening does nothing.

use std::cell::Cell;
use std::rc::Rc;

use js_sys::{Array, Function, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Event, HtmlElement, HtmlInputElement, HtmlTextAreaElement, Window};

use crate::config::{VoiceConfig, VoicePrompts};
use crate::dom::{element_by_id, set_display, Listener};
use crate::error::js_error_message;

/// Constructor names looked up on `window`, standard name first.
const RECOGNITION_CONSTRUCTORS: [&str; 2] = ["SpeechRecognition", "webkitSpeechRecognition"];

pub trait RecognitionEngine {
    /// Begin one recognition session.
    fn start(&self) -> Result<(), String>;
}

/// The text field the transcript lands in.
pub trait PromptField {
    fn set_value(&self, value: &str);
    fn set_placeholder(&self, placeholder: &str);
}

pub trait TriggerControl {
    fn hide(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Idle,
    Listening,
}

pub struct VoiceCapture<E, F> {
    engine: E,
    field: F,
    prompts: VoicePrompts,
    state: Cell<VoiceState>,
}

impl<E: RecognitionEngine, F: PromptField> VoiceCapture<E, F> {
    pub const fn new(engine: E, field: F, prompts: VoicePrompts) -> Self {
        Self {
            engine,
            field,
            prompts,
            state: Cell::new(VoiceState::Idle),
        }
    }

    #[cfg(test)]
    fn state(&self) -> VoiceState {
        self.state.get()
    }

    /// Mic pressed. Returns `true` if a new session started.
    pub fn activate(&self) -> bool {
        if self.state.get() == VoiceState::Listening {
            log::debug!("Speech recognition already listening, ignoring trigger");
            return false;
        }
        match self.engine.start() {
            Ok(()) => {
                self.state.set(VoiceState::Listening);
                self.field.set_placeholder(&self.prompts.listening);
                true
            }
            Err(e) => {
                log::error!("Speech recognition failed to start: {e}");
                self.field.set_placeholder(&self.prompts.retry);
                false
            }
        }
    }

    pub fn on_result(&self, transcript: &str) {
        self.state.set(VoiceState::Idle);
        self.field.set_value(transcript);
        self.field.set_placeholder(&self.prompts.idle);
    }

    pub fn on_error(&self, kind: &str) {
        self.state.set(VoiceState::Idle);
        log::error!("Speech recognition error: {kind}");
        self.field.set_placeholder(&self.prompts.retry);
    }

    /// Session closed. Fires after `result`/`error` too, and alone when the
    /// recognizer gives up silently.
    pub fn on_end(&self) {
        self.state.set(VoiceState::Idle);
    }
}

/// Build the capture when the field exists and the host can recognize
/// speech; otherwise hide the trigger. `detect` runs only if the field exists.
pub fn attach<E, F, T>(
    trigger: &T,
    field: Option<F>,
    detect: impl FnOnce() -> Option<E>,
    prompts: VoicePrompts,
) -> Option<VoiceCapture<E, F>>
where
    E: RecognitionEngine,
    F: PromptField,
    T: TriggerControl,
{
    let capture = field.and_then(|field| detect().map(|engine| VoiceCapture::new(engine, field, prompts)));
    if capture.is_none() {
        trigger.hide();
    }
    capture
}

/// `SpeechRecognition` (or the webkit-prefixed variant) driven through
/// reflection, so no unstable web-sys bindings are needed.
#[derive(Clone)]
pub struct WebSpeechRecognition {
    inner: JsValue,
}

impl WebSpeechRecognition {
    /// Construct a recognizer configured for single, final results in `lang`.
    pub fn detect(win: &Window, lang: &str) -> Option<Self> {
        let ctor = RECOGNITION_CONSTRUCTORS.iter().find_map(|name| {
            Reflect::get(win, &JsValue::from_str(name))
                .ok()
                .and_then(|value| value.dyn_into::<Function>().ok())
        })?;

        let inner = match Reflect::construct(&ctor, &Array::new()) {
            Ok(inner) => inner,
            Err(e) => {
                log::warn!("Speech recognition present but unusable: {}", js_error_message(&e));
                return None;
            }
        };

        let recognition = Self { inner };
        recognition.set("continuous", &JsValue::FALSE);
        recognition.set("interimResults", &JsValue::FALSE);
        recognition.set("lang", &JsValue::from_str(lang));
        Some(recognition)
    }

    fn set(&self, key: &str, value: &JsValue) {
        let _ = Reflect::set(&self.inner, &JsValue::from_str(key), value);
    }

    /// Install `on<event>`; the handler lives as long as the page.
    fn on(&self, event: &str, handler: impl FnMut(JsValue) + 'static) {
        let callback = Closure::wrap(Box::new(handler) as Box<dyn FnMut(JsValue)>);
        self.set(&format!("on{event}"), callback.as_ref());
        callback.forget();
    }
}

impl RecognitionEngine for WebSpeechRecognition {
    fn start(&self) -> Result<(), String> {
        let start = Reflect::get(&self.inner, &JsValue::from_str("start"))
            .ok()
            .and_then(|v| v.dyn_into::<Function>().ok())
            .ok_or_else(|| "recognizer has no start()".to_string())?;
        start
            .call0(&self.inner)
            .map(|_| ())
            .map_err(|e| js_error_message(&e))
    }
}

/// `event.results[0][0].transcript`
fn first_transcript(event: &JsValue) -> Option<String> {
    let results = Reflect::get(event, &JsValue::from_str("results")).ok()?;
    let first = Reflect::get_u32(&results, 0).ok()?;
    let alternative = Reflect::get_u32(&first, 0).ok()?;
    Reflect::get(&alternative, &JsValue::from_str("transcript"))
        .ok()?
        .as_string()
}

fn error_kind(event: &JsValue) -> String {
    Reflect::get(event, &JsValue::from_str("error"))
        .ok()
        .and_then(|v| v.as_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// The question box is a `<textarea>` on the stock template but an
/// `<input>` works too.
pub enum QuestionField {
    Input(HtmlInputElement),
    TextArea(HtmlTextAreaElement),
}

impl QuestionField {
    fn find(doc: &Document, id: &str) -> Option<Self> {
        let el = doc.get_element_by_id(id)?;
        match el.dyn_into::<HtmlTextAreaElement>() {
            Ok(area) => Some(Self::TextArea(area)),
            Err(el) => el.dyn_into::<HtmlInputElement>().ok().map(Self::Input),
        }
    }
}

impl PromptField for QuestionField {
    fn set_value(&self, value: &str) {
        match self {
            Self::Input(el) => el.set_value(value),
            Self::TextArea(el) => el.set_value(value),
        }
    }

    fn set_placeholder(&self, placeholder: &str) {
        match self {
            Self::Input(el) => el.set_placeholder(placeholder),
            Self::TextArea(el) => el.set_placeholder(placeholder),
        }
    }
}

impl TriggerControl for HtmlElement {
    fn hide(&self) {
        set_display(self, "none");
    }
}

/// Wire `#micButton` to `#questionText`. Returns whether voice input is live.
pub fn mount(win: &Window, doc: &Document, config: &VoiceConfig) -> Result<bool, JsValue> {
    let Some(trigger) = element_by_id::<HtmlElement>(doc, &config.trigger_id) else {
        return Ok(false);
    };

    let field = QuestionField::find(doc, &config.field_id);
    let Some(capture) = attach(
        &trigger,
        field,
        || WebSpeechRecognition::detect(win, &config.lang),
        config.prompts.clone(),
    ) else {
        log::info!("Speech recognition unavailable, mic button hidden");
        return Ok(false);
    };
    let capture = Rc::new(capture);
    let engine = capture.engine.clone();

    {
        let capture = capture.clone();
        engine.on("result", move |event| match first_transcript(&event) {
            Some(transcript) => capture.on_result(&transcript),
            None => capture.on_error("no-match"),
        });
    }
    {
        let capture = capture.clone();
        engine.on("error", move |event| capture.on_error(&error_kind(&event)));
    }
    {
        let capture = capture.clone();
        engine.on("end", move |_| capture.on_end());
    }

    Listener::new(&trigger, "click", move |_: Event| {
        capture.activate();
    })?
    .forget();

    log::debug!("Voice capture bound to #{} ({})", config.trigger_id, config.lang);
    Ok(true)
}

//! Configuration for the dashboard glue
//!
//! Defaults match the stock dashboard templates. A page may override any
//! field with an inline block:
//!
//! ```html
//! <script type="application/json" id="krishi-config">
//!   { "scene": { "model_scale": 12.0 }, "voice": { "lang": "ml-IN" } }
//! </script>
//! ```

use krishi_scene::{CameraSettings, ControlSettings, LightSettings};
use serde::Deserialize;
use web_sys::Document;

/// Element id of the optional inline JSON override block
pub const CONFIG_ELEMENT_ID: &str = "krishi-config";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub enabled: bool,
    pub canvas_id: String,
    pub model_path: String,
    pub model_scale: f32,
    pub antialias: bool,
    pub camera: CameraSettings,
    pub lights: LightSettings,
    pub controls: ControlSettings,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            canvas_id: "hero-canvas".to_string(),
            model_path: "static/models/mini.glb".to_string(),
            model_scale: 30.0,
            antialias: true,
            camera: CameraSettings::default(),
            lights: LightSettings::default(),
            controls: ControlSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub input_id: String,
    pub image_id: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            input_id: "imageUpload".to_string(),
            image_id: "imagePreview".to_string(),
        }
    }
}

/// Placeholder texts shown in the question field
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VoicePrompts {
    pub idle: String,
    pub listening: String,
    pub retry: String,
}

impl Default for VoicePrompts {
    fn default() -> Self {
        Self {
            idle: "e.g., Which fertilizer is best for bananas during the monsoon?".to_string(),
            listening: "Listening...".to_string(),
            retry: "Sorry, I could not hear you. Please try again.".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub trigger_id: String,
    pub field_id: String,
    /// BCP 47 tag handed to the recognizer
    pub lang: String,
    pub prompts: VoicePrompts,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            trigger_id: "micButton".to_string(),
            field_id: "questionText".to_string(),
            lang: "hi-IN".to_string(),
            prompts: VoicePrompts::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub log_level: String,
    pub scene: SceneConfig,
    pub preview: PreviewConfig,
    pub voice: VoiceConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            scene: SceneConfig::default(),
            preview: PreviewConfig::default(),
            voice: VoiceConfig::default(),
        }
    }
}

impl DashboardConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Read the inline override block (if any) and apply URL switches.
    pub fn load(document: &Document, search: &str) -> Self {
        let mut config = document
            .get_element_by_id(CONFIG_ELEMENT_ID)
            .and_then(|el| el.text_content())
            .map_or_else(Self::default, |text| {
                Self::from_json(&text).unwrap_or_else(|e| {
                    log::warn!("Ignoring malformed #{CONFIG_ELEMENT_ID} block: {e}");
                    Self::default()
                })
            });
        config.apply_query(search);
        config
    }

    /// `?scene=0` (or `scene=false`) turns the hero viewer off, e.g. on
    /// machines where WebGL misbehaves.
    pub fn apply_query(&mut self, search: &str) {
        let query = search.trim_start_matches('?');
        for pair in query.split('&') {
            if let Some(("scene", value)) = pair.split_once('=') {
                match value {
                    "0" | "false" => self.scene.enabled = false,
                    "1" | "true" => self.scene.enabled = true,
                    _ => {}
                }
            }
        }
    }

    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

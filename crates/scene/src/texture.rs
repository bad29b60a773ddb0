//! Decoded material images

use std::borrow::Cow;
use std::sync::Arc;

use image::imageops::FilterType;

/// How texture coordinates outside 0..1 are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WrapMode {
    #[default]
    Repeat,
    MirroredRepeat,
    ClampToEdge,
}

impl From<gltf::texture::WrappingMode> for WrapMode {
    fn from(mode: gltf::texture::WrappingMode) -> Self {
        match mode {
            gltf::texture::WrappingMode::Repeat => Self::Repeat,
            gltf::texture::WrappingMode::MirroredRepeat => Self::MirroredRepeat,
            gltf::texture::WrappingMode::ClampToEdge => Self::ClampToEdge,
        }
    }
}

/// An image decoded to tightly packed sRGB RGBA8.
#[derive(Clone, PartialEq, Eq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl std::fmt::Debug for TextureImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl TextureImage {
    /// Decode a PNG or JPEG.
    pub fn decode(bytes: &[u8]) -> Result<Self, image::ImageError> {
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        Ok(Self {
            width: rgba.width(),
            height: rgba.height(),
            rgba: rgba.into_raw(),
        })
    }

    /// The image itself if both sides fit in `max_dim`, otherwise a copy
    /// scaled down to fit with its aspect ratio kept.
    pub fn fit_within(&self, max_dim: u32) -> Cow<'_, Self> {
        let longest = self.width.max(self.height);
        if max_dim == 0 || longest <= max_dim {
            return Cow::Borrowed(self);
        }
        let Some(source) = image::RgbaImage::from_raw(self.width, self.height, self.rgba.clone()) else {
            return Cow::Borrowed(self);
        };

        let scale = f64::from(max_dim) / f64::from(longest);
        let fit = |side: u32| ((f64::from(side) * scale).round() as u32).clamp(1, max_dim);
        let (width, height) = (fit(self.width), fit(self.height));
        let resized = image::imageops::resize(&source, width, height, FilterType::Triangle);

        log::debug!(
            "Texture {}x{} downscaled to {width}x{height}",
            self.width,
            self.height
        );
        Cow::Owned(Self {
            width,
            height,
            rgba: resized.into_raw(),
        })
    }
}

/// A material's `baseColorTexture`, resolved to its image and sampler.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseColorTexture {
    pub image: Arc<TextureImage>,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
}

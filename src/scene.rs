use crate::{
    error::{GlowshotError, GlowshotResult},
    geom::{BlurBlock, ImageTransform},
    gradient::Gradient,
};

/// Identifies an image's bytes. The contained string is the stable cache key:
/// the same source always decodes to the same bitmap.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ImageSource {
    /// A file on disk (bundled preset backgrounds, CLI inputs).
    Path(String),
    /// Bytes registered in the [`ImageStore`](crate::assets::ImageStore)
    /// under this key (user uploads, crop output).
    Memory(String),
}

impl ImageSource {
    pub fn key(&self) -> &str {
        match self {
            Self::Path(p) => p,
            Self::Memory(k) => k,
        }
    }
}

/// The background layer, as a true sum type: exactly one variant is active,
/// so invalid combined states (gradient + uploaded image) are unrepresentable.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Background {
    /// Solid white fill.
    White,
    /// A preset or uploaded image, stretched edge-to-edge.
    Image(ImageSource),
    /// A generated linear gradient.
    Gradient(Gradient),
}

/// The foreground image together with its geometric state.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Foreground {
    pub source: ImageSource,
    pub transform: ImageTransform,
}

/// The complete declarative description of one render target. Constructed
/// fresh from editor state on every render call; both the preview and export
/// drivers consume it through the same renderer.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Scene {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub background: Background,
    /// Blur radius applied to the background fill, in logical pixels.
    pub background_blur: f64,
    pub foreground: Option<Foreground>,
    pub blur_blocks: Vec<BlurBlock>,
}

impl Scene {
    /// A blank white scene at the given canvas size.
    pub fn blank(canvas_width: u32, canvas_height: u32) -> Self {
        Self {
            canvas_width,
            canvas_height,
            background: Background::White,
            background_blur: 0.0,
            foreground: None,
            blur_blocks: Vec::new(),
        }
    }

    pub fn validate(&self) -> GlowshotResult<()> {
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(GlowshotError::validation(
                "canvas width/height must be > 0",
            ));
        }
        if !self.background_blur.is_finite() || self.background_blur < 0.0 {
            return Err(GlowshotError::validation("background_blur must be >= 0"));
        }
        if let Background::Gradient(g) = &self.background {
            g.validate()?;
        }
        if let Some(fg) = &self.foreground {
            fg.transform.validate()?;
        }
        for block in &self.blur_blocks {
            block.validate()?;
        }
        Ok(())
    }
}

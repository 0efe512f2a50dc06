//! File export.
//!
//! Renders a [`Scene`] at an integer multiple of its canvas size through the
//! same pipeline the preview uses, bakes blur-block redactions into the
//! pixels, and encodes to PNG or JPEG. Unlike the preview, export is strict:
//! any missing or undecodable image aborts the operation.

use std::io::Cursor;

use tracing::info;

use crate::{
    assets::ImageStore,
    error::{GlowshotError, GlowshotResult},
    render::{bake_blur_blocks, render_scene, surface_size},
    scene::Scene,
};

pub const EXPORT_SCALE_MIN: u8 = 1;
pub const EXPORT_SCALE_MAX: u8 = 4;
pub const DEFAULT_JPEG_QUALITY: f64 = 0.95;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Png,
    Jpeg,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExportOptions {
    /// Integer output multiplier over the logical canvas size.
    pub scale: u8,
    pub format: ExportFormat,
    /// JPEG quality in 0.0..=1.0; ignored for PNG.
    pub quality: f64,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            scale: 1,
            format: ExportFormat::Png,
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl ExportOptions {
    pub fn validate(&self) -> GlowshotResult<()> {
        if !(EXPORT_SCALE_MIN..=EXPORT_SCALE_MAX).contains(&self.scale) {
            return Err(GlowshotError::validation(format!(
                "export scale must be in {EXPORT_SCALE_MIN}..={EXPORT_SCALE_MAX}, got {}",
                self.scale
            )));
        }
        if !(self.quality.is_finite() && (0.0..=1.0).contains(&self.quality)) {
            return Err(GlowshotError::validation(
                "export quality must be in 0.0..=1.0",
            ));
        }
        Ok(())
    }
}

/// Output filename convention: `{base}-{size-slug}-{scale}x.{ext}`.
pub fn export_filename(base: &str, size_slug: &str, scale: u8, format: ExportFormat) -> String {
    format!("{base}-{size_slug}-{scale}x.{}", format.extension())
}

/// Render and encode `scene`, returning the finished file bytes.
pub fn export_scene(
    scene: &Scene,
    images: &mut ImageStore,
    options: &ExportOptions,
) -> GlowshotResult<Vec<u8>> {
    options.validate()?;
    let scale = f64::from(options.scale);
    let (width, height) = surface_size(scene, scale)?;

    let mut pixmap = vello_cpu::Pixmap::new(width, height);
    render_scene(&mut pixmap, scene, scale, images, true)?;
    bake_blur_blocks(&mut pixmap, scene, scale)?;

    let bytes = encode_pixmap(&pixmap, options)?;
    info!(
        width,
        height,
        format = ?options.format,
        size_bytes = bytes.len(),
        "scene exported"
    );
    Ok(bytes)
}

fn encode_pixmap(pixmap: &vello_cpu::Pixmap, options: &ExportOptions) -> GlowshotResult<Vec<u8>> {
    let (w, h) = (u32::from(pixmap.width()), u32::from(pixmap.height()));
    let premul = pixmap.data_as_u8_slice();
    let mut out = Cursor::new(Vec::new());

    match options.format {
        ExportFormat::Png => {
            let rgba = unpremultiply_rgba8(premul);
            let img = image::RgbaImage::from_raw(w, h, rgba)
                .ok_or_else(|| GlowshotError::encode("surface byte length mismatch"))?;
            image::DynamicImage::ImageRgba8(img)
                .write_to(&mut out, image::ImageFormat::Png)
                .map_err(|e| GlowshotError::encode(format!("png encode failed: {e}")))?;
        }
        ExportFormat::Jpeg => {
            let rgb = flatten_over_white(premul);
            let img = image::RgbImage::from_raw(w, h, rgb)
                .ok_or_else(|| GlowshotError::encode("surface byte length mismatch"))?;
            let quality = (options.quality * 100.0).round().clamp(1.0, 100.0) as u8;
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality);
            img.write_with_encoder(encoder)
                .map_err(|e| GlowshotError::encode(format!("jpeg encode failed: {e}")))?;
        }
    }
    Ok(out.into_inner())
}

fn unpremultiply_rgba8(premul: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(premul.len());
    for px in premul.chunks_exact(4) {
        let a = px[3] as u32;
        if a == 0 {
            out.extend_from_slice(&[0, 0, 0, 0]);
            continue;
        }
        let un = |c: u8| -> u8 { ((c as u32 * 255 + a / 2) / a).min(255) as u8 };
        out.extend_from_slice(&[un(px[0]), un(px[1]), un(px[2]), px[3]]);
    }
    out
}

/// JPEG has no alpha channel; composite premultiplied pixels over white.
fn flatten_over_white(premul: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(premul.len() / 4 * 3);
    for px in premul.chunks_exact(4) {
        let inv_a = 255 - px[3] as u32;
        let flat = |c: u8| -> u8 { (c as u32 + (255 * inv_a + 127) / 255).min(255) as u8 };
        out.extend_from_slice(&[flat(px[0]), flat(px[1]), flat(px[2])]);
    }
    out
}

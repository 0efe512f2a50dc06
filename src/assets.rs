use std::{collections::HashMap, path::PathBuf, sync::Arc};

use anyhow::Context;
use tracing::warn;

use crate::{
    error::{GlowshotError, GlowshotResult},
    scene::ImageSource,
};

/// A decoded, premultiplied bitmap ready to be used as a paint.
#[derive(Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba8_premul: Arc<Vec<u8>>,
    paint: vello_cpu::Image,
}

impl DecodedImage {
    pub fn paint(&self) -> vello_cpu::Image {
        self.paint.clone()
    }
}

/// Decode image bytes (PNG/JPEG/WebP/...) into premultiplied RGBA8 plus a
/// renderer paint. The decode call is the only format validation performed.
pub fn decode_image(bytes: &[u8]) -> GlowshotResult<DecodedImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    let paint = premul_bytes_to_paint(&rgba8_premul, width, height)?;
    Ok(DecodedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
        paint,
    })
}

/// Decoded-image cache keyed by [`ImageSource`]. The same source always
/// decodes to the same bitmap, so entries are never invalidated; uploads get
/// fresh keys instead of overwriting old ones.
#[derive(Default)]
pub struct ImageStore {
    assets_root: Option<PathBuf>,
    memory: HashMap<String, Arc<Vec<u8>>>,
    cache: HashMap<ImageSource, DecodedImage>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `ImageSource::Path` entries relative to `root` (e.g. the
    /// directory of a scene file).
    pub fn with_assets_root(root: impl Into<PathBuf>) -> Self {
        Self {
            assets_root: Some(root.into()),
            ..Self::default()
        }
    }

    /// Register uploaded bytes under a caller-chosen key, to be referenced
    /// as `ImageSource::Memory(key)`.
    pub fn register_memory(&mut self, key: impl Into<String>, bytes: Vec<u8>) {
        self.memory.insert(key.into(), Arc::new(bytes));
    }

    /// Decode (or fetch from cache) the given source. Fails hard; this is the
    /// export path, where a decode failure aborts the whole operation.
    pub fn load(&mut self, source: &ImageSource) -> GlowshotResult<DecodedImage> {
        if let Some(img) = self.cache.get(source) {
            return Ok(img.clone());
        }

        let bytes: Arc<Vec<u8>> = match source {
            ImageSource::Path(p) => {
                let path = match &self.assets_root {
                    Some(root) => root.join(p),
                    None => PathBuf::from(p),
                };
                Arc::new(
                    std::fs::read(&path)
                        .with_context(|| format!("read image '{}'", path.display()))?,
                )
            }
            ImageSource::Memory(key) => self
                .memory
                .get(key)
                .cloned()
                .ok_or_else(|| {
                    GlowshotError::decode(format!("no registered image bytes for key '{key}'"))
                })?,
        };

        let img = decode_image(&bytes)?;
        self.cache.insert(source.clone(), img.clone());
        Ok(img)
    }

    /// Preview-path lookup: a failed decode is logged and the layer is
    /// skipped rather than failing the render.
    pub fn try_load(&mut self, source: &ImageSource) -> Option<DecodedImage> {
        match self.load(source) {
            Ok(img) => Some(img),
            Err(err) => {
                warn!(source = source.key(), error = %err, "image decode failed; skipping layer");
                None
            }
        }
    }

    /// Decode a list of sources up front so later redraws hit the cache.
    /// Individual failures are logged and skipped.
    pub fn preload(&mut self, sources: &[ImageSource]) {
        for source in sources {
            let _ = self.try_load(source);
        }
    }

    pub fn is_cached(&self, source: &ImageSource) -> bool {
        self.cache.contains_key(source)
    }
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

/// Wrap premultiplied RGBA8 bytes in a renderer image paint.
pub fn premul_bytes_to_paint(
    rgba8_premul: &[u8],
    width: u32,
    height: u32,
) -> GlowshotResult<vello_cpu::Image> {
    let w: u16 = width
        .try_into()
        .map_err(|_| GlowshotError::render("image width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| GlowshotError::render("image height exceeds u16"))?;
    if rgba8_premul.len() != width as usize * height as usize * 4 {
        return Err(GlowshotError::render("image byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for px in rgba8_premul.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a,
        });
    }

    let pixmap = vello_cpu::Pixmap::from_parts_with_opacity(pixels, w, h, may_have_opacities);
    Ok(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}

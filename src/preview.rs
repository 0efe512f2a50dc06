//! Interactive preview driver.
//!
//! Owns a persistent pixmap sized to the logical canvas times the device
//! pixel ratio and re-renders the current [`Scene`] through the same
//! pipeline export uses. Blur blocks are deliberately *not* baked here; in
//! the preview they exist as overlay chrome so the pixels underneath stay
//! editable.

use kurbo::{Point, Rect};
use tracing::debug;

use crate::{
    assets::ImageStore,
    error::{GlowshotError, GlowshotResult},
    render::{render_scene, surface_size},
    scene::{ImageSource, Scene},
};

pub struct PreviewDriver {
    dpr: f64,
    images: ImageStore,
    pixmap: Option<vello_cpu::Pixmap>,
}

impl PreviewDriver {
    /// `dpr` is the device pixel ratio the preview surface is displayed at.
    pub fn new(dpr: f64) -> GlowshotResult<Self> {
        if !(dpr.is_finite() && dpr > 0.0) {
            return Err(GlowshotError::validation("device pixel ratio must be > 0"));
        }
        Ok(Self {
            dpr,
            images: ImageStore::new(),
            pixmap: None,
        })
    }

    pub fn dpr(&self) -> f64 {
        self.dpr
    }

    pub fn images_mut(&mut self) -> &mut ImageStore {
        &mut self.images
    }

    /// Warm the decode cache so the first redraw after a background switch
    /// does not stall on decoding.
    pub fn preload(&mut self, sources: &[ImageSource]) {
        self.images.preload(sources);
    }

    /// Render the scene into the persistent surface and return it.
    ///
    /// The surface is reallocated only when the canvas size (at this DPR)
    /// changes. Missing images degrade gracefully rather than failing; the
    /// caller keeps getting frames while an upload decodes.
    pub fn render(&mut self, scene: &Scene) -> GlowshotResult<&vello_cpu::Pixmap> {
        let (width, height) = surface_size(scene, self.dpr)?;
        let needs_alloc = self
            .pixmap
            .as_ref()
            .is_none_or(|p| p.width() != width || p.height() != height);
        if needs_alloc {
            debug!(width, height, dpr = self.dpr, "allocating preview surface");
            self.pixmap = Some(vello_cpu::Pixmap::new(width, height));
        }

        let pixmap = self
            .pixmap
            .as_mut()
            .ok_or_else(|| GlowshotError::render("preview surface missing"))?;
        render_scene(pixmap, scene, self.dpr, &mut self.images, false)?;
        Ok(&*pixmap)
    }

    /// Axis-aligned bounds of the foreground (before rotation) in logical
    /// canvas coordinates, for drawing selection chrome. `None` until the
    /// image has decoded.
    pub fn foreground_box(&mut self, scene: &Scene) -> Option<Rect> {
        let fg = scene.foreground.as_ref()?;
        let img = self.images.try_load(&fg.source)?;
        let crop = fg.transform.crop_rect_px(img.width, img.height);
        if crop.width() <= 0.0 || crop.height() <= 0.0 {
            return None;
        }
        let (dw, dh) = fg.transform.display_size(crop.width(), crop.height());
        let s = fg.transform.scale / 100.0;
        let (hw, hh) = (dw * s / 2.0, dh * s / 2.0);
        let (cx, cy) = (
            f64::from(scene.canvas_width) / 2.0,
            f64::from(scene.canvas_height) / 2.0,
        );
        Some(Rect::new(cx - hw, cy - hh, cx + hw, cy + hh))
    }

    /// Whether a pointer position (logical canvas coordinates) lands on the
    /// foreground image, accounting for its rotation.
    pub fn hit_test_foreground(&mut self, scene: &Scene, p: Point) -> bool {
        let Some(rect) = self.foreground_box(scene) else {
            return false;
        };
        let rotation = scene
            .foreground
            .as_ref()
            .map(|fg| fg.transform.rotation)
            .unwrap_or(0.0);

        let (cx, cy) = ((rect.x0 + rect.x1) / 2.0, (rect.y0 + rect.y1) / 2.0);
        let (dx, dy) = (p.x - cx, p.y - cy);
        let a = -rotation.to_radians();
        let (lx, ly) = (dx * a.cos() - dy * a.sin(), dx * a.sin() + dy * a.cos());
        lx.abs() <= rect.width() / 2.0 && ly.abs() <= rect.height() / 2.0
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::{
        geom::ImageTransform,
        scene::{Background, Foreground},
    };

    fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn rejects_nonpositive_dpr() {
        assert!(PreviewDriver::new(0.0).is_err());
        assert!(PreviewDriver::new(f64::NAN).is_err());
    }

    #[test]
    fn renders_white_scene_and_reuses_surface() {
        let mut driver = PreviewDriver::new(1.0).unwrap();
        let scene = Scene::blank(20, 10);

        let frame = driver.render(&scene).unwrap();
        assert_eq!((frame.width(), frame.height()), (20, 10));
        assert!(
            frame
                .data_as_u8_slice()
                .chunks_exact(4)
                .all(|px| px == [255, 255, 255, 255])
        );

        driver.render(&scene).unwrap();

        // A canvas resize reallocates.
        let bigger = Scene::blank(40, 10);
        let frame = driver.render(&bigger).unwrap();
        assert_eq!((frame.width(), frame.height()), (40, 10));
    }

    #[test]
    fn dpr_scales_the_surface() {
        let mut driver = PreviewDriver::new(2.0).unwrap();
        let frame = driver.render(&Scene::blank(30, 15)).unwrap();
        assert_eq!((frame.width(), frame.height()), (60, 30));
    }

    #[test]
    fn missing_foreground_image_does_not_fail_preview() {
        let mut driver = PreviewDriver::new(1.0).unwrap();
        let mut scene = Scene::blank(100, 100);
        scene.foreground = Some(Foreground {
            source: ImageSource::Memory("pending-upload".into()),
            transform: ImageTransform::fitted(100, 100),
        });
        driver.render(&scene).unwrap();
        assert!(driver.foreground_box(&scene).is_none());
    }

    #[test]
    fn hit_test_respects_rotation() {
        let mut driver = PreviewDriver::new(1.0).unwrap();
        driver
            .images_mut()
            .register_memory("fg", png_bytes(200, 100, [10, 20, 30, 255]));

        let mut scene = Scene::blank(1000, 1000);
        let mut transform = ImageTransform::fitted(1000, 1000);
        transform.rotation = 90.0;
        scene.foreground = Some(Foreground {
            source: ImageSource::Memory("fg".into()),
            transform,
        });
        scene.background = Background::White;

        let rect = driver.foreground_box(&scene).unwrap();
        assert!(rect.width() > rect.height(), "2:1 source fits wide");

        // After 90 degree rotation the long axis is vertical: a point far
        // out on the x axis misses, the same distance on y hits.
        let far = rect.width() / 2.0 - 1.0;
        assert!(!driver.hit_test_foreground(&scene, Point::new(500.0 + far, 500.0)));
        assert!(driver.hit_test_foreground(&scene, Point::new(500.0, 500.0 + far)));
    }
}

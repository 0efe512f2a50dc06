//! The shared scene renderer.
//!
//! Both the interactive preview and file export feed a [`Scene`] through
//! [`render_scene`], differing only in target size and strictness of asset
//! loading. Keeping a single pipeline is what makes the preview a faithful
//! picture of the exported file.
//!
//! A frame is one `RenderContext`: background fill first, foreground image
//! on top, one `render_to_pixmap` at the end (`render_to_pixmap` resolves
//! the whole buffer, so split passes would drop earlier layers). Background
//! blur resolves the context mid-frame, blurs the surface, and restarts the
//! context from the blurred pixels so the foreground stays sharp. Blur-block
//! redactions are a separate post-pass ([`bake_blur_blocks`]) because the
//! preview draws them as overlay chrome instead.

use kurbo::{Affine, Rect, RoundedRect, Shape};
use tracing::debug;

use crate::{
    assets::{DecodedImage, ImageStore, premul_bytes_to_paint},
    blur_cpu,
    error::{GlowshotError, GlowshotResult},
    scene::{Background, Foreground, Scene},
};

/// Physical surface size for a scene rendered at `scale` (1.0 = logical
/// canvas size, 2.0 = 2x export, a fractional DPR for the preview).
pub fn surface_size(scene: &Scene, scale: f64) -> GlowshotResult<(u16, u16)> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(GlowshotError::render("render scale must be > 0"));
    }
    let dim = |logical: u32| -> GlowshotResult<u16> {
        let px = (f64::from(logical) * scale).round();
        if px < 1.0 {
            return Err(GlowshotError::render("render surface rounds to zero pixels"));
        }
        u16::try_from(px as u64).map_err(|_| GlowshotError::render("render surface exceeds u16"))
    };
    Ok((dim(scene.canvas_width)?, dim(scene.canvas_height)?))
}

/// Render `scene` into `pixmap`, replacing its entire contents.
///
/// `scale` maps logical canvas pixels to pixmap pixels; the pixmap is
/// expected to be sized via [`surface_size`] with the same factor. With
/// `images_required` a missing or undecodable image fails the render (the
/// export contract); without it the layer is skipped after a warning (the
/// preview keeps drawing while an upload is in flight).
pub fn render_scene(
    pixmap: &mut vello_cpu::Pixmap,
    scene: &Scene,
    scale: f64,
    images: &mut ImageStore,
    images_required: bool,
) -> GlowshotResult<()> {
    scene.validate()?;
    if !(scale.is_finite() && scale > 0.0) {
        return Err(GlowshotError::render("render scale must be > 0"));
    }
    let (width, height) = (pixmap.width(), pixmap.height());

    let mut ctx = vello_cpu::RenderContext::new(width, height);
    push_background(&mut ctx, scene, width, height, images, images_required)?;

    let blur_radius = (scene.background_blur * scale).round().max(0.0) as u32;
    if blur_radius > 0 {
        // Resolve the background to pixels, blur it, and restart the frame
        // from the blurred surface as a backdrop paint.
        ctx.flush();
        ctx.render_to_pixmap(pixmap);
        blur_surface(pixmap, blur_radius)?;
        ctx = vello_cpu::RenderContext::new(width, height);
        let backdrop = premul_bytes_to_paint(
            pixmap.data_as_u8_slice(),
            u32::from(width),
            u32::from(height),
        )?;
        ctx.set_paint(backdrop);
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(width),
            f64::from(height),
        ));
    }

    if let Some(fg) = &scene.foreground {
        push_foreground(&mut ctx, fg, scene, scale, images, images_required)?;
    }
    ctx.flush();
    ctx.render_to_pixmap(pixmap);
    Ok(())
}

fn push_background(
    ctx: &mut vello_cpu::RenderContext,
    scene: &Scene,
    width: u16,
    height: u16,
    images: &mut ImageStore,
    images_required: bool,
) -> GlowshotResult<()> {
    let full = vello_cpu::kurbo::Rect::new(0.0, 0.0, f64::from(width), f64::from(height));

    match &scene.background {
        Background::White => {
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(255, 255, 255, 255));
            ctx.fill_rect(&full);
        }
        Background::Image(source) => {
            let img = if images_required {
                Some(images.load(source)?)
            } else {
                images.try_load(source)
            };
            match img {
                Some(img) => {
                    // Stretched edge-to-edge, aspect ratio not preserved.
                    let sx = f64::from(width) / f64::from(img.width);
                    let sy = f64::from(height) / f64::from(img.height);
                    ctx.set_transform(affine_to_cpu(Affine::scale_non_uniform(sx, sy)));
                    ctx.set_paint(img.paint());
                    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                        0.0,
                        0.0,
                        f64::from(img.width),
                        f64::from(img.height),
                    ));
                    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
                }
                None => {
                    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(255, 255, 255, 255));
                    ctx.fill_rect(&full);
                }
            }
        }
        Background::Gradient(gradient) => {
            let bytes = gradient.rasterize(u32::from(width), u32::from(height))?;
            let paint = premul_bytes_to_paint(&bytes, u32::from(width), u32::from(height))?;
            ctx.set_paint(paint);
            ctx.fill_rect(&full);
        }
    }
    Ok(())
}

/// Blur the whole surface in place.
fn blur_surface(pixmap: &mut vello_cpu::Pixmap, radius: u32) -> GlowshotResult<()> {
    let (w, h) = (u32::from(pixmap.width()), u32::from(pixmap.height()));
    let src = pixmap.data_as_u8_slice().to_vec();
    let blurred = blur_cpu::blur_rgba8_premul(&src, w, h, radius, blur_cpu::default_sigma(radius))?;
    pixmap.data_as_u8_slice_mut().copy_from_slice(&blurred);
    Ok(())
}

fn push_foreground(
    ctx: &mut vello_cpu::RenderContext,
    fg: &Foreground,
    scene: &Scene,
    scale: f64,
    images: &mut ImageStore,
    images_required: bool,
) -> GlowshotResult<()> {
    let img: DecodedImage = if images_required {
        images.load(&fg.source)?
    } else {
        match images.try_load(&fg.source) {
            Some(img) => img,
            None => return Ok(()),
        }
    };

    let crop = fg.transform.crop_rect_px(img.width, img.height);
    if crop.width() <= 0.0 || crop.height() <= 0.0 {
        return Err(GlowshotError::render("crop region is empty"));
    }
    let (dw, dh) = fg.transform.display_size(crop.width(), crop.height());
    debug!(
        crop = ?crop,
        display_w = dw,
        display_h = dh,
        rotation = fg.transform.rotation,
        "foreground pass"
    );

    // Local space: origin at the display rect's center, logical canvas units.
    let transform = Affine::scale(scale)
        * Affine::translate((
            f64::from(scene.canvas_width) / 2.0,
            f64::from(scene.canvas_height) / 2.0,
        ))
        * Affine::rotate(fg.transform.rotation.to_radians())
        * Affine::scale(fg.transform.scale / 100.0);

    // Map source crop pixels onto the display rect.
    let paint_transform = Affine::translate((-dw / 2.0, -dh / 2.0))
        * Affine::scale_non_uniform(dw / crop.width(), dh / crop.height())
        * Affine::translate((-crop.x0, -crop.y0));

    ctx.set_transform(affine_to_cpu(transform));
    ctx.set_paint(img.paint());
    ctx.set_paint_transform(affine_to_cpu(paint_transform));

    let rect = Rect::new(-dw / 2.0, -dh / 2.0, dw / 2.0, dh / 2.0);
    let radius = fg.transform.clamped_radius(dw, dh);
    if radius > 0.0 {
        let path = RoundedRect::from_rect(rect, radius).to_path(0.1);
        ctx.fill_path(&bezpath_to_cpu(&path));
    } else {
        ctx.fill_rect(&rect_to_cpu(rect));
    }
    ctx.reset_transform();
    ctx.reset_paint_transform();
    Ok(())
}

/// Replace each blur block's pixels with a blurred sample of themselves.
///
/// Export-only: the preview communicates blocks through overlay chrome.
/// Every pixel outside a block rectangle is left byte-identical; the blur is
/// sampled from a padded window around the rectangle so edge pixels pull from
/// real neighbors instead of a clamped border.
pub fn bake_blur_blocks(
    pixmap: &mut vello_cpu::Pixmap,
    scene: &Scene,
    scale: f64,
) -> GlowshotResult<()> {
    if scene.blur_blocks.is_empty() {
        return Ok(());
    }
    let (pw, ph) = (u32::from(pixmap.width()), u32::from(pixmap.height()));

    for block in &scene.blur_blocks {
        let radius = (block.blur_amount * scale).round().max(0.0) as u32;
        if radius == 0 {
            continue;
        }

        // Percent geometry resolves directly against the physical surface.
        let rect = block.rect_px(f64::from(pw), f64::from(ph));
        let rx0 = (rect.x0.round().max(0.0) as u32).min(pw);
        let ry0 = (rect.y0.round().max(0.0) as u32).min(ph);
        let rx1 = (rect.x1.round().max(0.0) as u32).min(pw);
        let ry1 = (rect.y1.round().max(0.0) as u32).min(ph);
        if rx1 <= rx0 || ry1 <= ry0 {
            continue;
        }

        let pad = 2 * radius;
        let px0 = rx0.saturating_sub(pad);
        let py0 = ry0.saturating_sub(pad);
        let px1 = (rx1 + pad).min(pw);
        let py1 = (ry1 + pad).min(ph);
        let (sample_w, sample_h) = (px1 - px0, py1 - py0);

        let data = pixmap.data_as_u8_slice();
        let mut sample = Vec::with_capacity(sample_w as usize * sample_h as usize * 4);
        for y in py0..py1 {
            let row = (y * pw + px0) as usize * 4;
            sample.extend_from_slice(&data[row..row + sample_w as usize * 4]);
        }

        let blurred = blur_cpu::blur_rgba8_premul(
            &sample,
            sample_w,
            sample_h,
            radius,
            blur_cpu::default_sigma(radius),
        )?;

        let data = pixmap.data_as_u8_slice_mut();
        for y in ry0..ry1 {
            let dst = (y * pw + rx0) as usize * 4;
            let src = ((y - py0) * sample_w + (rx0 - px0)) as usize * 4;
            let len = (rx1 - rx0) as usize * 4;
            data[dst..dst + len].copy_from_slice(&blurred[src..src + len]);
        }
    }
    Ok(())
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn rect_to_cpu(r: Rect) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1)
}

fn point_to_cpu(p: kurbo::Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn bezpath_to_cpu(path: &kurbo::BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::geom::{BlurBlock, ImageTransform};
    use crate::scene::ImageSource;

    fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn pixel(pixmap: &vello_cpu::Pixmap, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * u32::from(pixmap.width()) + x) * 4) as usize;
        let d = pixmap.data_as_u8_slice();
        [d[i], d[i + 1], d[i + 2], d[i + 3]]
    }

    fn checkerboard_pixmap(w: u16, h: u16) -> vello_cpu::Pixmap {
        let mut pixmap = vello_cpu::Pixmap::new(w, h);
        let data = pixmap.data_as_u8_slice_mut();
        for y in 0..u32::from(h) {
            for x in 0..u32::from(w) {
                let v = if (x + y) % 2 == 0 { 255 } else { 0 };
                let i = ((y * u32::from(w) + x) * 4) as usize;
                data[i..i + 4].copy_from_slice(&[v, v, v, 255]);
            }
        }
        pixmap
    }

    #[test]
    fn surface_size_rounds_and_guards() {
        let scene = Scene::blank(1200, 675);
        assert_eq!(surface_size(&scene, 1.0).unwrap(), (1200, 675));
        assert_eq!(surface_size(&scene, 2.0).unwrap(), (2400, 1350));
        assert_eq!(surface_size(&scene, 0.5).unwrap(), (600, 338));
        assert!(surface_size(&scene, 0.0).is_err());
        assert!(surface_size(&Scene::blank(40_000, 100), 2.0).is_err());
    }

    #[test]
    fn white_scene_renders_uniform_white() {
        let scene = Scene::blank(16, 8);
        let mut pixmap = vello_cpu::Pixmap::new(16, 8);
        let mut store = ImageStore::new();
        render_scene(&mut pixmap, &scene, 1.0, &mut store, true).unwrap();
        assert!(
            pixmap
                .data_as_u8_slice()
                .chunks_exact(4)
                .all(|px| px == [255, 255, 255, 255])
        );
    }

    #[test]
    fn foreground_leaves_background_pixels_intact() {
        // The frame resolves through one context, so the background must
        // survive outside the foreground's display rectangle.
        let mut scene = Scene::blank(100, 100);
        let mut transform = ImageTransform::fitted(100, 100);
        transform.width = 40.0;
        transform.height = 40.0;
        scene.foreground = Some(Foreground {
            source: ImageSource::Memory("shot".into()),
            transform,
        });

        let mut store = ImageStore::new();
        store.register_memory("shot", png_bytes(40, 40, [255, 0, 0, 255]));

        let mut pixmap = vello_cpu::Pixmap::new(100, 100);
        render_scene(&mut pixmap, &scene, 1.0, &mut store, true).unwrap();

        assert_eq!(pixel(&pixmap, 50, 50), [255, 0, 0, 255]);
        for (x, y) in [(2, 2), (97, 2), (2, 97), (97, 97)] {
            assert_eq!(pixel(&pixmap, x, y), [255, 255, 255, 255], "corner ({x},{y})");
        }
    }

    #[test]
    fn background_blur_keeps_the_foreground_sharp() {
        // Black/white halves blur to gray at the seam; the red subject on
        // top must stay exactly red.
        let mut scene = Scene::blank(64, 64);
        scene.background = Background::Image(ImageSource::Memory("bg".into()));
        scene.background_blur = 6.0;
        let mut transform = ImageTransform::fitted(64, 64);
        transform.width = 16.0;
        transform.height = 16.0;
        scene.foreground = Some(Foreground {
            source: ImageSource::Memory("shot".into()),
            transform,
        });

        let mut bg = image::RgbaImage::from_pixel(64, 64, image::Rgba([255, 255, 255, 255]));
        for y in 0..64 {
            for x in 0..32 {
                bg.put_pixel(x, y, image::Rgba([0, 0, 0, 255]));
            }
        }
        let mut bg_png = Vec::new();
        image::DynamicImage::ImageRgba8(bg)
            .write_to(&mut Cursor::new(&mut bg_png), image::ImageFormat::Png)
            .unwrap();

        let mut store = ImageStore::new();
        store.register_memory("bg", bg_png);
        store.register_memory("shot", png_bytes(16, 16, [255, 0, 0, 255]));

        let mut pixmap = vello_cpu::Pixmap::new(64, 64);
        render_scene(&mut pixmap, &scene, 1.0, &mut store, true).unwrap();

        // Blur bled across the background seam.
        let seam = pixel(&pixmap, 32, 4);
        assert!(seam[0] > 40 && seam[0] < 215, "seam not blurred: {seam:?}");
        // Subject unaffected by the background blur.
        assert_eq!(pixel(&pixmap, 32, 32), [255, 0, 0, 255]);
    }

    #[test]
    fn missing_background_image_fails_only_when_required() {
        let mut scene = Scene::blank(8, 8);
        scene.background = Background::Image(crate::scene::ImageSource::Memory("gone".into()));
        let mut store = ImageStore::new();

        let mut pixmap = vello_cpu::Pixmap::new(8, 8);
        assert!(render_scene(&mut pixmap, &scene, 1.0, &mut store, true).is_err());

        // Preview path falls back to white.
        let mut pixmap = vello_cpu::Pixmap::new(8, 8);
        render_scene(&mut pixmap, &scene, 1.0, &mut store, false).unwrap();
        assert!(
            pixmap
                .data_as_u8_slice()
                .chunks_exact(4)
                .all(|px| px == [255, 255, 255, 255])
        );
    }

    #[test]
    fn bake_blur_blocks_touches_only_block_interior() {
        let mut scene = Scene::blank(32, 32);
        scene.blur_blocks.push(BlurBlock {
            id: "blur-1".into(),
            x: 25.0,
            y: 25.0,
            width: 50.0,
            height: 50.0,
            blur_amount: 4.0,
        });

        let mut pixmap = checkerboard_pixmap(32, 32);
        let before = pixmap.data_as_u8_slice().to_vec();
        bake_blur_blocks(&mut pixmap, &scene, 1.0).unwrap();
        let after = pixmap.data_as_u8_slice();

        let mut changed_inside = false;
        for y in 0..32u32 {
            for x in 0..32u32 {
                let i = ((y * 32 + x) * 4) as usize;
                let inside = (8..24).contains(&x) && (8..24).contains(&y);
                if inside {
                    changed_inside |= after[i..i + 4] != before[i..i + 4];
                } else {
                    assert_eq!(&after[i..i + 4], &before[i..i + 4], "pixel ({x},{y}) moved");
                }
            }
        }
        assert!(changed_inside, "blur left the block interior untouched");
    }

    #[test]
    fn bake_blur_blocks_is_a_noop_for_zero_amount() {
        let mut scene = Scene::blank(16, 16);
        scene.blur_blocks.push(BlurBlock {
            id: "blur-1".into(),
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
            blur_amount: 0.0,
        });
        let mut pixmap = checkerboard_pixmap(16, 16);
        let before = pixmap.data_as_u8_slice().to_vec();
        bake_blur_blocks(&mut pixmap, &scene, 1.0).unwrap();
        assert_eq!(pixmap.data_as_u8_slice(), before.as_slice());
    }
}

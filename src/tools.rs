//! Pointer tools: blur-block manipulation, inline crop, and inline scale.
//!
//! Each tool is an explicit gesture state machine over logical canvas
//! coordinates ([`DisplayMap`](crate::geom::DisplayMap) converts pointer
//! positions first). Tools never touch editor state directly; crop and scale
//! accumulate into a working rectangle and write back through `commit`,
//! matching their cancelable, Enter-to-apply interaction.

use kurbo::{Point, Rect};

use crate::geom::{BlurBlock, Handle, ImageTransform};

/// Default hit radius around handles, in on-screen element pixels. Convert
/// with [`DisplayMap::to_logical_radius`](crate::geom::DisplayMap) before
/// handing it to a tool.
pub const HANDLE_THRESHOLD: f64 = 20.0;
/// Smallest blur block, percent of canvas per axis.
pub const MIN_BLOCK_PCT: f64 = 5.0;
/// Smallest crop rectangle, logical pixels per axis.
pub const MIN_CROP_PX: f64 = 50.0;
/// Smallest scale box width, logical pixels.
pub const MIN_SCALE_PX: f64 = 100.0;

// --- blur blocks ---

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockGesture {
    Move,
    Resize(Handle),
}

struct BlockDragState {
    gesture: BlockGesture,
    origin: Point,
    start_x: f64,
    start_y: f64,
    start_width: f64,
    start_height: f64,
}

/// Drag/resize state machine for one blur block. Geometry stays in canvas
/// percentages; pointer deltas are converted using the canvas size.
#[derive(Default)]
pub struct BlockTool {
    drag: Option<BlockDragState>,
}

impl BlockTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.drag.is_some()
    }

    pub fn begin(&mut self, gesture: BlockGesture, pointer: Point, block: &BlurBlock) {
        self.drag = Some(BlockDragState {
            gesture,
            origin: pointer,
            start_x: block.x,
            start_y: block.y,
            start_width: block.width,
            start_height: block.height,
        });
    }

    /// Apply the pointer position to the block. The block never leaves the
    /// canvas and never shrinks below [`MIN_BLOCK_PCT`] per axis.
    pub fn update(
        &mut self,
        pointer: Point,
        canvas_width: f64,
        canvas_height: f64,
        block: &mut BlurBlock,
    ) {
        let Some(drag) = &self.drag else {
            return;
        };
        let dx = (pointer.x - drag.origin.x) / canvas_width * 100.0;
        let dy = (pointer.y - drag.origin.y) / canvas_height * 100.0;

        match drag.gesture {
            BlockGesture::Move => {
                block.x = (drag.start_x + dx).clamp(0.0, 100.0 - block.width);
                block.y = (drag.start_y + dy).clamp(0.0, 100.0 - block.height);
            }
            BlockGesture::Resize(handle) => {
                if handle.touches_west() {
                    let delta = dx.clamp(-drag.start_x, drag.start_width - MIN_BLOCK_PCT);
                    block.x = drag.start_x + delta;
                    block.width = drag.start_width - delta;
                }
                if handle.touches_east() {
                    block.width = (drag.start_width + dx)
                        .clamp(MIN_BLOCK_PCT, 100.0 - drag.start_x);
                }
                if handle.touches_north() {
                    let delta = dy.clamp(-drag.start_y, drag.start_height - MIN_BLOCK_PCT);
                    block.y = drag.start_y + delta;
                    block.height = drag.start_height - delta;
                }
                if handle.touches_south() {
                    block.height = (drag.start_height + dy)
                        .clamp(MIN_BLOCK_PCT, 100.0 - drag.start_y);
                }
            }
        }
    }

    pub fn end(&mut self) {
        self.drag = None;
    }
}

// --- crop ---

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CropPreset {
    pub name: &'static str,
    /// 0.0 = free-form.
    pub aspect_ratio: f64,
}

pub const CROP_PRESETS: &[CropPreset] = &[
    CropPreset {
        name: "Free",
        aspect_ratio: 0.0,
    },
    CropPreset {
        name: "16:9",
        aspect_ratio: 16.0 / 9.0,
    },
    CropPreset {
        name: "1:1",
        aspect_ratio: 1.0,
    },
    CropPreset {
        name: "4:3",
        aspect_ratio: 4.0 / 3.0,
    },
];

enum CropDrag {
    /// Pointer offset from the crop origin at grab time.
    Move { grab: Point },
    /// Incremental: `last` advances every update.
    Resize { handle: Handle, last: Point },
}

/// Inline crop. The image is fitted into 85% of the container (preserving
/// aspect ratio, centered) and the crop rectangle starts at 80% of that,
/// also centered. Commit converts the rectangle into crop percentages of
/// the source image.
pub struct CropTool {
    image: Rect,
    crop: Rect,
    preset_index: usize,
    hit_radius: f64,
    drag: Option<CropDrag>,
}

impl CropTool {
    /// `hit_radius` is in the same logical units as the container; callers
    /// convert [`HANDLE_THRESHOLD`] through their `DisplayMap` so the grab
    /// area tracks the on-screen size.
    pub fn new(
        container_width: f64,
        container_height: f64,
        natural_width: u32,
        natural_height: u32,
        hit_radius: f64,
    ) -> Self {
        let img_aspect = f64::from(natural_width) / f64::from(natural_height);
        let container_aspect = container_width / container_height;

        let (draw_w, draw_h) = if img_aspect > container_aspect {
            let w = container_width * 0.85;
            (w, w / img_aspect)
        } else {
            let h = container_height * 0.85;
            (h * img_aspect, h)
        };
        let x = (container_width - draw_w) / 2.0;
        let y = (container_height - draw_h) / 2.0;
        let image = Rect::new(x, y, x + draw_w, y + draw_h);

        let crop_w = draw_w * 0.8;
        let crop_h = draw_h * 0.8;
        let cx = x + (draw_w - crop_w) / 2.0;
        let cy = y + (draw_h - crop_h) / 2.0;

        Self {
            image,
            crop: Rect::new(cx, cy, cx + crop_w, cy + crop_h),
            preset_index: 0,
            hit_radius,
            drag: None,
        }
    }

    pub fn crop_rect(&self) -> Rect {
        self.crop
    }

    pub fn image_rect(&self) -> Rect {
        self.image
    }

    pub fn preset_index(&self) -> usize {
        self.preset_index
    }

    pub fn hit(&self, p: Point) -> Option<Handle> {
        Handle::at(p, self.crop, self.hit_radius)
    }

    /// Switch aspect preset, resizing the crop around its center. Free-form
    /// keeps the rectangle as-is.
    pub fn set_preset(&mut self, index: usize) {
        if index >= CROP_PRESETS.len() || index == self.preset_index {
            return;
        }
        self.preset_index = index;
        let aspect = CROP_PRESETS[index].aspect_ratio;
        if aspect == 0.0 {
            return;
        }

        let center = self.crop.center();
        let mut w = self.crop.width();
        let mut h = w / aspect;
        if h > self.image.height() {
            h = self.image.height() * 0.8;
            w = h * aspect;
        }
        if w > self.image.width() {
            w = self.image.width() * 0.8;
            h = w / aspect;
        }

        let x = (center.x - w / 2.0).clamp(self.image.x0, self.image.x1 - w);
        let y = (center.y - h / 2.0).clamp(self.image.y0, self.image.y1 - h);
        self.crop = Rect::new(x, y, x + w, y + h);
    }

    pub fn begin_drag(&mut self, p: Point) -> Option<Handle> {
        let handle = self.hit(p)?;
        self.drag = Some(match handle {
            Handle::Move => CropDrag::Move {
                grab: Point::new(p.x - self.crop.x0, p.y - self.crop.y0),
            },
            h => CropDrag::Resize { handle: h, last: p },
        });
        Some(handle)
    }

    pub fn drag(&mut self, p: Point) {
        let resize = match &mut self.drag {
            None => return,
            Some(CropDrag::Move { grab }) => {
                let w = self.crop.width();
                let h = self.crop.height();
                let x = (p.x - grab.x).clamp(self.image.x0, self.image.x1 - w);
                let y = (p.y - grab.y).clamp(self.image.y0, self.image.y1 - h);
                self.crop = Rect::new(x, y, x + w, y + h);
                return;
            }
            Some(CropDrag::Resize { handle, last }) => {
                let delta = (p.x - last.x, p.y - last.y);
                let handle = *handle;
                *last = p;
                (handle, delta.0, delta.1)
            }
        };
        self.resize_by(resize.0, resize.1, resize.2);
    }

    fn resize_by(&mut self, handle: Handle, dx: f64, dy: f64) {
        let aspect = CROP_PRESETS[self.preset_index].aspect_ratio;
        let prev = self.crop;
        let (mut x, mut y) = (prev.x0, prev.y0);
        let (mut w, mut h) = (prev.width(), prev.height());

        if aspect > 0.0 {
            if handle.is_corner() {
                let grow = if handle.touches_east() { dx } else { -dx };
                w = (prev.width() + grow).max(MIN_CROP_PX);
                h = w / aspect;
                if handle.touches_west() {
                    x = (prev.x1 - w).max(self.image.x0);
                }
                if handle.touches_north() {
                    y = (prev.y1 - h).max(self.image.y0);
                }
            } else if handle == Handle::North || handle == Handle::South {
                let grow = if handle == Handle::South { dy } else { -dy };
                h = (prev.height() + grow).max(MIN_CROP_PX);
                w = h * aspect;
                if handle == Handle::North {
                    y = (prev.y1 - h).max(self.image.y0);
                }
            } else {
                let grow = if handle == Handle::East { dx } else { -dx };
                w = (prev.width() + grow).max(MIN_CROP_PX);
                h = w / aspect;
                if handle == Handle::West {
                    x = (prev.x1 - w).max(self.image.x0);
                }
            }
        } else {
            if handle.touches_west() {
                x = (prev.x0 + dx).clamp(self.image.x0, prev.x1 - MIN_CROP_PX);
                w = prev.x1 - x;
            }
            if handle.touches_east() {
                w = (prev.width() + dx).max(MIN_CROP_PX);
            }
            if handle.touches_north() {
                y = (prev.y0 + dy).clamp(self.image.y0, prev.y1 - MIN_CROP_PX);
                h = prev.y1 - y;
            }
            if handle.touches_south() {
                h = (prev.height() + dy).max(MIN_CROP_PX);
            }
        }

        // Never extend past the image.
        w = w.min(self.image.x1 - x);
        h = h.min(self.image.y1 - y);
        self.crop = Rect::new(x, y, x + w, y + h);
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    /// Write the crop back as source-image percentages and refit the display
    /// box to the canvas.
    pub fn commit(&self, transform: &mut ImageTransform, canvas_width: u32, canvas_height: u32) {
        let iw = self.image.width();
        let ih = self.image.height();
        transform.crop_x = ((self.crop.x0 - self.image.x0) / iw * 100.0).clamp(0.0, 100.0);
        transform.crop_y = ((self.crop.y0 - self.image.y0) / ih * 100.0).clamp(0.0, 100.0);
        transform.crop_width =
            (self.crop.width() / iw * 100.0).clamp(0.0, 100.0 - transform.crop_x);
        transform.crop_height =
            (self.crop.height() / ih * 100.0).clamp(0.0, 100.0 - transform.crop_y);
        transform.refit(canvas_width, canvas_height);
    }
}

// --- scale ---

/// Inline scale: corner handles only, locked to the source aspect ratio,
/// growing and shrinking around the box center with doubled pointer
/// sensitivity.
pub struct ScaleTool {
    img_aspect: f64,
    box_rect: Rect,
    hit_radius: f64,
    drag: Option<(Handle, Point)>,
}

impl ScaleTool {
    /// `hit_radius` follows the same convention as [`CropTool::new`].
    pub fn new(
        container_width: f64,
        container_height: f64,
        natural_width: u32,
        natural_height: u32,
        current_width: f64,
        current_height: f64,
        hit_radius: f64,
    ) -> Self {
        let img_aspect = f64::from(natural_width) / f64::from(natural_height);
        let container_aspect = container_width / container_height;

        let (w, h) = if img_aspect > container_aspect {
            (current_width, current_width / img_aspect)
        } else {
            (current_height * img_aspect, current_height)
        };
        let x = (container_width - w) / 2.0;
        let y = (container_height - h) / 2.0;

        Self {
            img_aspect,
            box_rect: Rect::new(x, y, x + w, y + h),
            hit_radius,
            drag: None,
        }
    }

    pub fn box_rect(&self) -> Rect {
        self.box_rect
    }

    pub fn hit(&self, p: Point) -> Option<Handle> {
        Handle::at(p, self.box_rect, self.hit_radius).filter(|h| h.is_corner())
    }

    pub fn begin_drag(&mut self, p: Point) -> Option<Handle> {
        let handle = self.hit(p)?;
        self.drag = Some((handle, p));
        Some(handle)
    }

    pub fn drag(&mut self, p: Point) {
        let Some((handle, last)) = self.drag else {
            return;
        };
        let dx = p.x - last.x;
        let dy = p.y - last.y;
        self.drag = Some((handle, p));

        // Each corner grows the box when dragged away from the center.
        let sensitivity = 2.0;
        let avg = match handle {
            Handle::NorthWest => -(dx + dy) / 2.0,
            Handle::NorthEast => (dx - dy) / 2.0,
            Handle::SouthWest => (-dx + dy) / 2.0,
            Handle::SouthEast => (dx + dy) / 2.0,
            _ => return,
        } * sensitivity;

        let prev = self.box_rect;
        let w = (prev.width() + avg).max(MIN_SCALE_PX);
        let h = w / self.img_aspect;
        let x = prev.x0 + (prev.width() - w) / 2.0;
        let y = prev.y0 + (prev.height() - h) / 2.0;
        self.box_rect = Rect::new(x, y, x + w, y + h);
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    /// Apply the resized box to the transform's display dimensions.
    pub fn commit(&self, transform: &mut ImageTransform) {
        transform.width = self.box_rect.width();
        transform.height = self.box_rect.height();
    }
}

use kurbo::{Point, Rect};

use crate::error::{GlowshotError, GlowshotResult};

/// Bounds for user-entered custom canvas dimensions.
pub const CUSTOM_DIM_MIN: u32 = 1;
pub const CUSTOM_DIM_MAX: u32 = 10_000;

/// A named output canvas size.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
    pub name: String,
    pub aspect_ratio: String,
}

impl CanvasSize {
    fn preset(width: u32, height: u32, name: &str, aspect_ratio: &str) -> Self {
        Self {
            width,
            height,
            name: name.to_string(),
            aspect_ratio: aspect_ratio.to_string(),
        }
    }

    /// The fixed preset table. The final "Custom" entry carries the default
    /// custom dimensions; the editor substitutes user-entered values.
    pub fn presets() -> Vec<CanvasSize> {
        vec![
            Self::preset(1920, 1080, "HD Landscape", "16:9"),
            Self::preset(1080, 1080, "Square", "1:1"),
            Self::preset(1080, 1350, "Portrait", "4:5"),
            Self::preset(1200, 675, "Twitter Post", "16:9"),
            Self::preset(1200, 1200, "Custom", "Custom"),
        ]
    }

    pub fn is_custom(&self) -> bool {
        self.name == "Custom"
    }

    /// Lowercased, dash-separated name used in export filenames.
    pub fn slug(&self) -> String {
        self.name
            .split_whitespace()
            .map(|w| w.to_ascii_lowercase())
            .collect::<Vec<_>>()
            .join("-")
    }
}

/// Validate a user-entered custom dimension at the input boundary.
pub fn validate_custom_dim(value: u32) -> GlowshotResult<u32> {
    if !(CUSTOM_DIM_MIN..=CUSTOM_DIM_MAX).contains(&value) {
        return Err(GlowshotError::validation(format!(
            "custom canvas dimension must be in {CUSTOM_DIM_MIN}..={CUSTOM_DIM_MAX}, got {value}"
        )));
    }
    Ok(value)
}

/// Geometric state of the foreground image on the canvas.
///
/// `width`/`height` are the display box in logical canvas pixels; the crop
/// fields are percentages of the *source* image.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ImageTransform {
    pub width: f64,
    pub height: f64,
    /// Rotation in degrees around the canvas center.
    pub rotation: f64,
    /// Percent, 100 = natural size.
    pub scale: f64,
    /// Corner radius in logical pixels.
    pub border_radius: f64,
    pub crop_x: f64,
    pub crop_y: f64,
    pub crop_width: f64,
    pub crop_height: f64,
}

impl ImageTransform {
    /// Default transform for a freshly placed image: display box at 85% of
    /// the canvas, full crop, no rotation or rounding.
    pub fn fitted(canvas_width: u32, canvas_height: u32) -> Self {
        Self {
            width: f64::from(canvas_width) * 0.85,
            height: f64::from(canvas_height) * 0.85,
            rotation: 0.0,
            scale: 100.0,
            border_radius: 0.0,
            crop_x: 0.0,
            crop_y: 0.0,
            crop_width: 100.0,
            crop_height: 100.0,
        }
    }

    /// Reset the display box to 85% of a new canvas size, keeping the other
    /// fields intact. Applied when the canvas size selection changes.
    pub fn refit(&mut self, canvas_width: u32, canvas_height: u32) {
        self.width = f64::from(canvas_width) * 0.85;
        self.height = f64::from(canvas_height) * 0.85;
    }

    pub fn validate(&self) -> GlowshotResult<()> {
        if !(self.width.is_finite() && self.width > 0.0)
            || !(self.height.is_finite() && self.height > 0.0)
        {
            return Err(GlowshotError::validation(
                "transform display box must have width/height > 0",
            ));
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(GlowshotError::validation("transform scale must be > 0"));
        }
        if !self.rotation.is_finite() {
            return Err(GlowshotError::validation("transform rotation must be finite"));
        }
        if !(self.border_radius.is_finite() && self.border_radius >= 0.0) {
            return Err(GlowshotError::validation(
                "transform border_radius must be >= 0",
            ));
        }
        for (name, v) in [
            ("crop_x", self.crop_x),
            ("crop_y", self.crop_y),
            ("crop_width", self.crop_width),
            ("crop_height", self.crop_height),
        ] {
            if !v.is_finite() || !(0.0..=100.0).contains(&v) {
                return Err(GlowshotError::validation(format!(
                    "transform {name} must be a percentage in 0..=100"
                )));
            }
        }
        if self.crop_width <= 0.0 || self.crop_height <= 0.0 {
            return Err(GlowshotError::validation(
                "transform crop_width/crop_height must be > 0",
            ));
        }
        if self.crop_x + self.crop_width > 100.0 + 1e-9
            || self.crop_y + self.crop_height > 100.0 + 1e-9
        {
            return Err(GlowshotError::validation(
                "transform crop rectangle exceeds the source image",
            ));
        }
        Ok(())
    }

    /// Crop rectangle in source-image pixel space, clamped to the source
    /// bounds so stale percentages can never index outside the bitmap.
    pub fn crop_rect_px(&self, natural_width: u32, natural_height: u32) -> Rect {
        let nw = f64::from(natural_width);
        let nh = f64::from(natural_height);
        let x0 = (nw * self.crop_x / 100.0).clamp(0.0, nw);
        let y0 = (nh * self.crop_y / 100.0).clamp(0.0, nh);
        let x1 = (x0 + nw * self.crop_width / 100.0).clamp(x0, nw);
        let y1 = (y0 + nh * self.crop_height / 100.0).clamp(y0, nh);
        Rect::new(x0, y0, x1, y1)
    }

    /// Size of the on-canvas display rectangle for a crop of the given pixel
    /// size: the crop's aspect ratio is preserved and neither dimension ever
    /// exceeds the declared display box.
    pub fn display_size(&self, crop_width_px: f64, crop_height_px: f64) -> (f64, f64) {
        let crop_aspect = crop_width_px / crop_height_px;
        let box_aspect = self.width / self.height;
        if crop_aspect > box_aspect {
            (self.width, self.width / crop_aspect)
        } else {
            (self.height * crop_aspect, self.height)
        }
    }

    /// Corner radius clamped to half of the smaller display dimension.
    pub fn clamped_radius(&self, draw_width: f64, draw_height: f64) -> f64 {
        self.border_radius
            .min(draw_width / 2.0)
            .min(draw_height / 2.0)
    }
}

/// A rectangular blur redaction region in canvas-percentage coordinates.
///
/// Percent geometry keeps blocks canvas-size-independent; its pixels are
/// replaced with a blurred sample of themselves at export time only.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BlurBlock {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Blur radius in logical canvas pixels; scaled with the render target.
    pub blur_amount: f64,
}

impl BlurBlock {
    /// Block rectangle in pixels against the given canvas size.
    pub fn rect_px(&self, canvas_width: f64, canvas_height: f64) -> Rect {
        let x0 = canvas_width * self.x / 100.0;
        let y0 = canvas_height * self.y / 100.0;
        Rect::new(
            x0,
            y0,
            x0 + canvas_width * self.width / 100.0,
            y0 + canvas_height * self.height / 100.0,
        )
    }

    pub fn validate(&self) -> GlowshotResult<()> {
        for (name, v) in [
            ("x", self.x),
            ("y", self.y),
            ("width", self.width),
            ("height", self.height),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(GlowshotError::validation(format!(
                    "blur block {name} must be finite and >= 0"
                )));
            }
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(GlowshotError::validation(
                "blur block width/height must be > 0",
            ));
        }
        if self.x + self.width > 100.0 + 1e-9 || self.y + self.height > 100.0 + 1e-9 {
            return Err(GlowshotError::validation(
                "blur block must stay within the canvas (x+width, y+height <= 100)",
            ));
        }
        if !self.blur_amount.is_finite() || self.blur_amount < 0.0 {
            return Err(GlowshotError::validation("blur block blur_amount must be >= 0"));
        }
        Ok(())
    }
}

/// Conversion between the on-screen element space a pointer event lives in
/// and the logical canvas space all geometry is stored in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayMap {
    pub logical_width: f64,
    pub logical_height: f64,
    pub element_width: f64,
    pub element_height: f64,
}

impl DisplayMap {
    pub fn new(
        logical_width: f64,
        logical_height: f64,
        element_width: f64,
        element_height: f64,
    ) -> GlowshotResult<Self> {
        if element_width <= 0.0 || element_height <= 0.0 {
            return Err(GlowshotError::validation(
                "display map element size must be > 0",
            ));
        }
        Ok(Self {
            logical_width,
            logical_height,
            element_width,
            element_height,
        })
    }

    /// Identity map for an element displayed at its logical size.
    pub fn identity(logical_width: f64, logical_height: f64) -> Self {
        Self {
            logical_width,
            logical_height,
            element_width: logical_width,
            element_height: logical_height,
        }
    }

    pub fn to_logical(&self, p: Point) -> Point {
        Point::new(
            p.x * self.logical_width / self.element_width,
            p.y * self.logical_height / self.element_height,
        )
    }

    /// Convert a hit radius given in element pixels into logical units, so
    /// the on-screen grab area stays the same size at any display scale.
    pub fn to_logical_radius(&self, radius: f64) -> f64 {
        radius * self.logical_width / self.element_width
    }
}

/// Resize/move handle classification shared by the crop, scale, and
/// blur-block tools.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handle {
    NorthWest,
    NorthEast,
    SouthWest,
    SouthEast,
    North,
    East,
    South,
    West,
    Move,
}

impl Handle {
    pub fn is_corner(self) -> bool {
        matches!(
            self,
            Self::NorthWest | Self::NorthEast | Self::SouthWest | Self::SouthEast
        )
    }

    pub fn touches_west(self) -> bool {
        matches!(self, Self::West | Self::NorthWest | Self::SouthWest)
    }

    pub fn touches_east(self) -> bool {
        matches!(self, Self::East | Self::NorthEast | Self::SouthEast)
    }

    pub fn touches_north(self) -> bool {
        matches!(self, Self::North | Self::NorthWest | Self::NorthEast)
    }

    pub fn touches_south(self) -> bool {
        matches!(self, Self::South | Self::SouthWest | Self::SouthEast)
    }

    /// Classify a pointer position against a rectangle: corners first, then
    /// edge midpoints, then inside = move. `threshold` is the hit radius in
    /// the same (logical) units as `rect`.
    pub fn at(p: Point, rect: Rect, threshold: f64) -> Option<Handle> {
        let near = |a: f64, b: f64| (a - b).abs() < threshold;
        let (x0, y0, x1, y1) = (rect.x0, rect.y0, rect.x1, rect.y1);
        let (cx, cy) = ((x0 + x1) / 2.0, (y0 + y1) / 2.0);

        if near(p.x, x0) && near(p.y, y0) {
            return Some(Handle::NorthWest);
        }
        if near(p.x, x1) && near(p.y, y0) {
            return Some(Handle::NorthEast);
        }
        if near(p.x, x0) && near(p.y, y1) {
            return Some(Handle::SouthWest);
        }
        if near(p.x, x1) && near(p.y, y1) {
            return Some(Handle::SouthEast);
        }
        if near(p.x, cx) && near(p.y, y0) {
            return Some(Handle::North);
        }
        if near(p.x, cx) && near(p.y, y1) {
            return Some(Handle::South);
        }
        if near(p.x, x0) && near(p.y, cy) {
            return Some(Handle::West);
        }
        if near(p.x, x1) && near(p.y, cy) {
            return Some(Handle::East);
        }
        if p.x >= x0 && p.x <= x1 && p.y >= y0 && p.y <= y1 {
            return Some(Handle::Move);
        }
        None
    }
}

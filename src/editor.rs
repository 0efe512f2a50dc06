//! Editor session state.
//!
//! Holds everything the user can change between renders and builds a
//! [`Scene`] snapshot from it on demand. All mutation goes through methods
//! that validate at the boundary and keep prior values on rejection, so the
//! state is renderable at every moment.

use tracing::debug;

use crate::{
    error::{GlowshotError, GlowshotResult},
    export::{ExportFormat, export_filename},
    geom::{BlurBlock, CanvasSize, ImageTransform, validate_custom_dim},
    gradient::Gradient,
    scene::{Background, Foreground, ImageSource, Scene},
};

pub const BACKGROUND_PRESET_COUNT: usize = 16;
pub const DEFAULT_EXPORT_BASENAME: &str = "glowshot";

/// Bundled background images, cycled in order.
pub fn background_presets() -> Vec<ImageSource> {
    (1..=BACKGROUND_PRESET_COUNT)
        .map(|i| ImageSource::Path(format!("background/{i}.jpg")))
        .collect()
}

/// Which tool currently owns pointer input. The modes are mutually
/// exclusive; entering one leaves the others.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EditorMode {
    #[default]
    Idle,
    Cropping,
    Scaling,
    ManagingBlur,
    EditingBorderRadius,
}

pub struct EditorState {
    sizes: Vec<CanvasSize>,
    size_index: usize,
    custom_width: u32,
    custom_height: u32,

    background_index: Option<usize>,
    uploaded_background: Option<ImageSource>,
    gradient: Option<Gradient>,
    background_blur: f64,
    gradient_seed: u64,

    foreground: Option<Foreground>,

    blur_blocks: Vec<BlurBlock>,
    selected_block: Option<String>,
    clipboard: Option<BlurBlock>,
    next_block_id: u64,

    mode: EditorMode,
    export_base: String,
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorState {
    pub fn new() -> Self {
        Self {
            sizes: CanvasSize::presets(),
            size_index: 0,
            custom_width: 1200,
            custom_height: 1200,
            background_index: None,
            uploaded_background: None,
            gradient: None,
            background_blur: 0.0,
            gradient_seed: 0,
            foreground: None,
            blur_blocks: Vec::new(),
            selected_block: None,
            clipboard: None,
            next_block_id: 1,
            mode: EditorMode::Idle,
            export_base: DEFAULT_EXPORT_BASENAME.to_string(),
        }
    }

    // --- canvas size ---

    pub fn canvas_size(&self) -> &CanvasSize {
        &self.sizes[self.size_index]
    }

    pub fn canvas_width(&self) -> u32 {
        if self.canvas_size().is_custom() {
            self.custom_width
        } else {
            self.canvas_size().width
        }
    }

    pub fn canvas_height(&self) -> u32 {
        if self.canvas_size().is_custom() {
            self.custom_height
        } else {
            self.canvas_size().height
        }
    }

    /// Switch to another size preset and refit the foreground display box.
    pub fn select_canvas_size(&mut self, index: usize) -> GlowshotResult<()> {
        if index >= self.sizes.len() {
            return Err(GlowshotError::validation(format!(
                "canvas size index {index} out of range"
            )));
        }
        self.size_index = index;
        self.refit_foreground();
        Ok(())
    }

    /// Update custom dimensions. Both must validate or neither is applied.
    pub fn set_custom_size(&mut self, width: u32, height: u32) -> GlowshotResult<()> {
        let width = validate_custom_dim(width)?;
        let height = validate_custom_dim(height)?;
        self.custom_width = width;
        self.custom_height = height;
        if self.canvas_size().is_custom() {
            self.refit_foreground();
        }
        Ok(())
    }

    fn refit_foreground(&mut self) {
        let (w, h) = (self.canvas_width(), self.canvas_height());
        if let Some(fg) = &mut self.foreground {
            fg.transform.refit(w, h);
        }
    }

    // --- background ---

    /// Advance to the next preset background. From white the cycle enters at
    /// the first image and then wraps within the presets; it never returns
    /// to white on its own. Cycling discards uploads and gradients.
    pub fn cycle_background(&mut self) {
        self.background_index = Some(match self.background_index {
            None => 0,
            Some(i) => (i + 1) % BACKGROUND_PRESET_COUNT,
        });
        self.uploaded_background = None;
        self.gradient = None;
    }

    pub fn set_preset_background(&mut self, index: usize) -> GlowshotResult<()> {
        if index >= BACKGROUND_PRESET_COUNT {
            return Err(GlowshotError::validation(format!(
                "background preset index {index} out of range"
            )));
        }
        self.background_index = Some(index);
        self.uploaded_background = None;
        self.gradient = None;
        Ok(())
    }

    /// An uploaded background replaces any gradient; the caller registers
    /// the bytes with the render driver's image store under `source`'s key.
    pub fn set_uploaded_background(&mut self, source: ImageSource) {
        self.uploaded_background = Some(source);
        self.gradient = None;
    }

    /// Pick the next gradient preset deterministically and make it the
    /// background, replacing any upload.
    pub fn generate_gradient(&mut self) -> &Gradient {
        let gradient = Gradient::pick(self.gradient_seed);
        self.gradient_seed = self.gradient_seed.wrapping_add(1);
        debug!(angle = gradient.angle, "generated gradient background");
        self.uploaded_background = None;
        &*self.gradient.insert(gradient)
    }

    pub fn set_background_blur(&mut self, blur: f64) -> GlowshotResult<()> {
        if !blur.is_finite() || blur < 0.0 {
            return Err(GlowshotError::validation(
                "background blur must be >= 0",
            ));
        }
        self.background_blur = blur;
        Ok(())
    }

    /// Resolve the active background. A gradient wins over an upload, an
    /// upload over the preset cycle, and with nothing set the canvas is
    /// white.
    pub fn background(&self) -> Background {
        if let Some(g) = &self.gradient {
            return Background::Gradient(g.clone());
        }
        if let Some(src) = &self.uploaded_background {
            return Background::Image(src.clone());
        }
        match self.background_index {
            Some(i) => Background::Image(background_presets()[i].clone()),
            None => Background::White,
        }
    }

    // --- foreground ---

    pub fn set_foreground(&mut self, source: ImageSource) {
        self.foreground = Some(Foreground {
            source,
            transform: ImageTransform::fitted(self.canvas_width(), self.canvas_height()),
        });
        self.mode = EditorMode::Idle;
    }

    pub fn clear_foreground(&mut self) {
        self.foreground = None;
    }

    pub fn foreground(&self) -> Option<&Foreground> {
        self.foreground.as_ref()
    }

    pub fn transform_mut(&mut self) -> Option<&mut ImageTransform> {
        self.foreground.as_mut().map(|fg| &mut fg.transform)
    }

    // --- blur blocks ---

    /// Add a block at the canvas center quarter and select it. Adding
    /// always enters blur-management mode.
    pub fn add_blur_block(&mut self) -> &BlurBlock {
        let block = BlurBlock {
            id: self.next_block_id(),
            x: 25.0,
            y: 25.0,
            width: 25.0,
            height: 25.0,
            blur_amount: 10.0,
        };
        self.selected_block = Some(block.id.clone());
        let idx = self.blur_blocks.len();
        self.blur_blocks.push(block);
        self.mode = EditorMode::ManagingBlur;
        &self.blur_blocks[idx]
    }

    fn next_block_id(&mut self) -> String {
        let id = format!("blur-{}", self.next_block_id);
        self.next_block_id += 1;
        id
    }

    pub fn blur_blocks(&self) -> &[BlurBlock] {
        &self.blur_blocks
    }

    pub fn blur_block_mut(&mut self, id: &str) -> Option<&mut BlurBlock> {
        self.blur_blocks.iter_mut().find(|b| b.id == id)
    }

    pub fn delete_blur_block(&mut self, id: &str) {
        self.blur_blocks.retain(|b| b.id != id);
        if self.selected_block.as_deref() == Some(id) {
            self.selected_block = None;
        }
    }

    pub fn select_blur_block(&mut self, id: Option<&str>) {
        self.selected_block = id.map(str::to_string);
    }

    pub fn selected_blur_block(&self) -> Option<&BlurBlock> {
        let id = self.selected_block.as_deref()?;
        self.blur_blocks.iter().find(|b| b.id == id)
    }

    pub fn copy_selected_block(&mut self) -> bool {
        match self.selected_blur_block().cloned() {
            Some(block) => {
                self.clipboard = Some(block);
                true
            }
            None => false,
        }
    }

    /// Paste the copied block offset by 5% so the duplicate is visible,
    /// clamped to stay on the canvas. The paste becomes the selection.
    pub fn paste_block(&mut self) -> Option<&BlurBlock> {
        let source = self.clipboard.clone()?;
        let block = BlurBlock {
            id: self.next_block_id(),
            x: (source.x + 5.0).min(95.0 - source.width).max(0.0),
            y: (source.y + 5.0).min(95.0 - source.height).max(0.0),
            ..source
        };
        self.selected_block = Some(block.id.clone());
        let idx = self.blur_blocks.len();
        self.blur_blocks.push(block);
        self.mode = EditorMode::ManagingBlur;
        self.blur_blocks.get(idx)
    }

    // --- modes ---

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    /// Enter a mode; leaving blur management drops the block selection.
    pub fn set_mode(&mut self, mode: EditorMode) {
        if self.mode == EditorMode::ManagingBlur && mode != EditorMode::ManagingBlur {
            self.selected_block = None;
        }
        self.mode = mode;
    }

    // --- output ---

    pub fn export_base(&self) -> &str {
        &self.export_base
    }

    pub fn set_export_base(&mut self, base: impl Into<String>) {
        self.export_base = base.into();
    }

    pub fn export_filename(&self, scale: u8, format: ExportFormat) -> String {
        export_filename(&self.export_base, &self.canvas_size().slug(), scale, format)
    }

    /// Snapshot the current state as a renderable scene.
    pub fn scene(&self) -> Scene {
        Scene {
            canvas_width: self.canvas_width(),
            canvas_height: self.canvas_height(),
            background: self.background(),
            background_blur: self.background_blur,
            foreground: self.foreground.clone(),
            blur_blocks: self.blur_blocks.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_cycle_enters_presets_and_wraps() {
        let mut state = EditorState::new();
        assert_eq!(state.background(), Background::White);

        state.cycle_background();
        assert_eq!(
            state.background(),
            Background::Image(ImageSource::Path("background/1.jpg".into()))
        );

        for _ in 0..BACKGROUND_PRESET_COUNT - 1 {
            state.cycle_background();
        }
        assert_eq!(
            state.background(),
            Background::Image(ImageSource::Path("background/16.jpg".into()))
        );
        state.cycle_background();
        assert_eq!(
            state.background(),
            Background::Image(ImageSource::Path("background/1.jpg".into()))
        );
    }

    #[test]
    fn gradient_beats_upload_beats_preset() {
        let mut state = EditorState::new();
        state.set_preset_background(3).unwrap();
        state.set_uploaded_background(ImageSource::Memory("bg-upload".into()));
        assert!(matches!(state.background(), Background::Image(ImageSource::Memory(_))));

        state.generate_gradient();
        assert!(matches!(state.background(), Background::Gradient(_)));

        // Cycling discards both and returns to the preset list.
        state.cycle_background();
        assert!(matches!(state.background(), Background::Image(ImageSource::Path(_))));
    }

    #[test]
    fn generate_gradient_is_deterministic_per_seed() {
        let mut a = EditorState::new();
        let mut b = EditorState::new();
        assert_eq!(a.generate_gradient(), b.generate_gradient());
        // Successive picks advance.
        let second = a.generate_gradient().clone();
        assert_eq!(&second, b.generate_gradient());
    }

    #[test]
    fn custom_size_keeps_prior_values_on_invalid_input() {
        let mut state = EditorState::new();
        state.select_canvas_size(4).unwrap();
        assert_eq!((state.canvas_width(), state.canvas_height()), (1200, 1200));

        assert!(state.set_custom_size(800, 20_000).is_err());
        assert_eq!((state.canvas_width(), state.canvas_height()), (1200, 1200));

        state.set_custom_size(800, 600).unwrap();
        assert_eq!((state.canvas_width(), state.canvas_height()), (800, 600));
    }

    #[test]
    fn canvas_change_refits_foreground_box() {
        let mut state = EditorState::new();
        state.set_foreground(ImageSource::Memory("img".into()));
        let t = state.foreground().unwrap().transform;
        assert_eq!((t.width, t.height), (1920.0 * 0.85, 1080.0 * 0.85));

        state.select_canvas_size(1).unwrap();
        let t = state.foreground().unwrap().transform;
        assert_eq!((t.width, t.height), (1080.0 * 0.85, 1080.0 * 0.85));
    }

    #[test]
    fn blur_block_ids_are_unique_and_add_selects() {
        let mut state = EditorState::new();
        let first = state.add_blur_block().id.clone();
        let second = state.add_blur_block().id.clone();
        assert_ne!(first, second);
        assert_eq!(state.selected_blur_block().unwrap().id, second);
        assert_eq!(state.mode(), EditorMode::ManagingBlur);
    }

    #[test]
    fn paste_offsets_and_clamps() {
        let mut state = EditorState::new();
        let id = state.add_blur_block().id.clone();
        {
            let block = state.blur_block_mut(&id).unwrap();
            block.x = 72.0;
            block.width = 25.0;
        }
        state.select_blur_block(Some(&id));
        assert!(state.copy_selected_block());

        let pasted = state.paste_block().unwrap();
        // min(72 + 5, 95 - 25) = 70
        assert_eq!(pasted.x, 70.0);
        assert_eq!(pasted.y, 30.0);
        assert!(state.scene().validate().is_ok());
    }

    #[test]
    fn delete_clears_selection_and_leaving_blur_mode_deselects() {
        let mut state = EditorState::new();
        let id = state.add_blur_block().id.clone();
        state.delete_blur_block(&id);
        assert!(state.selected_blur_block().is_none());
        assert!(state.blur_blocks().is_empty());

        let _ = state.add_blur_block();
        state.set_mode(EditorMode::Idle);
        assert!(state.selected_blur_block().is_none());
    }

    #[test]
    fn export_filename_uses_size_slug() {
        let mut state = EditorState::new();
        assert_eq!(
            state.export_filename(2, ExportFormat::Png),
            "glowshot-hd-landscape-2x.png"
        );
        state.select_canvas_size(3).unwrap();
        state.set_export_base("shot");
        assert_eq!(
            state.export_filename(1, ExportFormat::Jpeg),
            "shot-twitter-post-1x.jpg"
        );
    }

    #[test]
    fn scene_snapshot_matches_state() {
        let mut state = EditorState::new();
        state.set_background_blur(6.0).unwrap();
        state.set_foreground(ImageSource::Memory("img".into()));
        state.add_blur_block();

        let scene = state.scene();
        assert_eq!(scene.canvas_width, 1920);
        assert_eq!(scene.background_blur, 6.0);
        assert!(scene.foreground.is_some());
        assert_eq!(scene.blur_blocks.len(), 1);
        scene.validate().unwrap();
    }
}

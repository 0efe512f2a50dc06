#![forbid(unsafe_code)]

pub mod assets;
pub mod blur_cpu;
pub mod editor;
pub mod error;
pub mod export;
pub mod geom;
pub mod gradient;
pub mod preview;
pub mod render;
pub mod scene;
pub mod tools;

pub use assets::{DecodedImage, ImageStore};
pub use editor::{EditorMode, EditorState};
pub use error::{GlowshotError, GlowshotResult};
pub use export::{ExportFormat, ExportOptions, export_filename, export_scene};
pub use geom::{BlurBlock, CanvasSize, DisplayMap, Handle, ImageTransform};
pub use gradient::Gradient;
pub use preview::PreviewDriver;
pub use render::{bake_blur_blocks, render_scene, surface_size};
pub use scene::{Background, Foreground, ImageSource, Scene};

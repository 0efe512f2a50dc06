use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "glowshot", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a scene JSON to an image file.
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input scene JSON. Image paths inside resolve relative to this file.
    #[arg(long = "scene")]
    scene_path: PathBuf,

    /// Output image path.
    #[arg(long)]
    out: PathBuf,

    /// Output size multiplier over the canvas size (1-4).
    #[arg(long, default_value_t = 1)]
    scale: u8,

    /// Output format.
    #[arg(long, value_enum, default_value_t = FormatChoice::Png)]
    format: FormatChoice,

    /// JPEG quality in 0.0..=1.0; ignored for PNG.
    #[arg(long, default_value_t = glowshot::export::DEFAULT_JPEG_QUALITY)]
    quality: f64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatChoice {
    Png,
    Jpeg,
}

impl From<FormatChoice> for glowshot::ExportFormat {
    fn from(choice: FormatChoice) -> Self {
        match choice {
            FormatChoice::Png => Self::Png,
            FormatChoice::Jpeg => Self::Jpeg,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
    }
}

fn read_scene_json(path: &Path) -> anyhow::Result<glowshot::Scene> {
    let f = File::open(path).with_context(|| format!("open scene '{}'", path.display()))?;
    let r = BufReader::new(f);
    let scene: glowshot::Scene = serde_json::from_reader(r).with_context(|| "parse scene JSON")?;
    Ok(scene)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let scene = read_scene_json(&args.scene_path)?;
    scene.validate()?;

    let assets_root = args.scene_path.parent().unwrap_or_else(|| Path::new("."));
    let mut images = glowshot::ImageStore::with_assets_root(assets_root);

    let options = glowshot::ExportOptions {
        scale: args.scale,
        format: args.format.into(),
        quality: args.quality,
    };
    let bytes = glowshot::export_scene(&scene, &mut images, &options)?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&args.out, &bytes)
        .with_context(|| format!("write image '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

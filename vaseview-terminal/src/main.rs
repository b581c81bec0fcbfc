//! Vaseview terminal viewer
//!
//! Shows a parametric vase in the terminal, scaled to the requested
//! physical height and width.
//! Controls:
//!   - Up/Down: height, Left/Right: width
//!   - C: next color, M: next model
//!   - Mouse drag: orbit, wheel: zoom
//!   - Q/ESC: Quit

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use vaseview_core::{FsMeshStore, Rgb, ViewParameters, ViewerConfig};
use vaseview_terminal::TerminalApp;

#[derive(Debug, Parser)]
#[command(name = "vaseview", version, about = "Parametric vase viewer for the terminal")]
struct Args {
    /// Model paths relative to --root; `m` cycles through them
    #[arg(short, long = "model")]
    models: Vec<String>,

    /// Vase height, 5 to 25
    #[arg(long, default_value_t = 15.0)]
    height: f32,

    /// Vase width, 5 to 25
    #[arg(long, default_value_t = 15.0)]
    width: f32,

    /// Vase color as #rrggbb
    #[arg(long, default_value = "#f14a4a")]
    color: Rgb,

    /// Directory the model paths are resolved against
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Viewer settings in TOML
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log destination; the terminal itself is the draw surface
    #[arg(long, default_value = "vaseview.log")]
    log_file: PathBuf,
}

fn init_logging(path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_file)?;

    let config = match &args.config {
        Some(path) => ViewerConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ViewerConfig::default(),
    };
    let params = ViewParameters::new(args.height, args.width, args.color)?;

    tracing::info!(root = %args.root.display(), "starting vaseview");
    let mut app = TerminalApp::new(FsMeshStore::new(&args.root), config, args.models, params)?;
    app.run()?;

    tracing::info!("vaseview exited");
    Ok(())
}

// CLI application
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

mod commands;
mod manifest;
mod render;

use commands::{render_fademask, render_patch, render_texture, show_stats};

#[derive(Parser)]
#[command(name = "hwcache")]
#[command(about = "Hardware texture cache inspector")]
#[command(version)]
struct Cli {
    /// Asset manifest (JSON) listing lumps, palette and textures
    #[arg(short, long, global = true, default_value = "assets.json")]
    manifest: PathBuf,

    /// Cache settings file; overrides the manifest's `config` entry
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Composite a texture and write it as PNG
    Texture {
        /// Texture name
        name: String,

        /// Output image path
        #[arg(short, long, default_value = "texture.png")]
        output: PathBuf,
    },
    /// Render a sprite or graphic patch
    Patch {
        /// Lump name
        lump: String,

        /// 256-byte translation table applied to the patch
        #[arg(long)]
        colormap: Option<PathBuf>,

        /// Output image path
        #[arg(short, long, default_value = "patch.png")]
        output: PathBuf,
    },
    /// Rescale a fade mask lump
    Fademask {
        /// Lump name
        lump: String,

        /// Output image path
        #[arg(short, long, default_value = "fademask.png")]
        output: PathBuf,
    },
    /// Generate every texture and print cache statistics
    Stats {
        /// Print the counters as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Texture { name, output } => {
            let pb = create_progress_bar("Compositing texture...");
            render_texture(&cli.manifest, config, &name, &output)?;
            pb.finish_with_message("Texture written");
        }
        Commands::Patch {
            lump,
            colormap,
            output,
        } => {
            let pb = create_progress_bar("Rendering patch...");
            render_patch(&cli.manifest, config, &lump, colormap.as_deref(), &output)?;
            pb.finish_with_message("Patch written");
        }
        Commands::Fademask { lump, output } => {
            let pb = create_progress_bar("Scaling fade mask...");
            render_fademask(&cli.manifest, config, &lump, &output)?;
            pb.finish_with_message("Fade mask written");
        }
        Commands::Stats { json } => {
            show_stats(&cli.manifest, config, json)?;
        }
    }

    Ok(())
}

fn create_progress_bar(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(message.to_string());
    pb
}

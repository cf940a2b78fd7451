mod commands;
mod progress;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "imred", about = "Mosaic camera spectrum and image reduction")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reduce a long-slit spectrum into one stitched mosaic
    Spectrum(commands::spectrum::SpectrumArgs),
    /// Reduce a direct image into one file per detector
    Image(commands::image::ImageArgs),
    /// List the classified raw frames of a directory
    Catalog(commands::catalog::CatalogArgs),
    /// Build master bias and flat frames only
    Masters(commands::masters::MastersArgs),
    /// Print or save the default reduction config
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Spectrum(args) => commands::spectrum::run(args),
        Commands::Image(args) => commands::image::run(args),
        Commands::Catalog(args) => commands::catalog::run(args),
        Commands::Masters(args) => commands::masters::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}

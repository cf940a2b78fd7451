use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use imred_core::frame::ReductionMode;
use imred_core::io::catalog::FrameCatalog;
use imred_core::pipeline::{build_calibrations, open_library};
use tracing::info;

use crate::progress::BarReporter;
use crate::summary::print_calibration_report;

use super::load_config;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ModeArg {
    Spectroscopy,
    Imaging,
}

impl From<ModeArg> for ReductionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Spectroscopy => ReductionMode::Spectroscopy,
            ModeArg::Imaging => ReductionMode::Imaging,
        }
    }
}

#[derive(Args)]
pub struct MastersArgs {
    /// Directory containing the raw FITS files
    pub raw_dir: PathBuf,

    /// Which flats to build
    #[arg(long, value_enum, default_value = "spectroscopy")]
    pub mode: ModeArg,

    /// Directory for master frames (default: RAW_DIR)
    #[arg(long)]
    pub masters: Option<PathBuf>,

    /// Rebuild master frames even if they already exist
    #[arg(long)]
    pub force_rebuild: bool,

    /// Reduction config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn run(args: &MastersArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref(), &args.raw_dir, 0, args.mode.into())?;
    if args.masters.is_some() {
        config.masters = args.masters.clone();
    }
    config.force_rebuild |= args.force_rebuild;
    config.validate()?;

    let catalog = FrameCatalog::scan(&config.input)
        .with_context(|| format!("Failed to scan {}", config.input.display()))?;
    let library = open_library(&config);
    info!(
        frames = catalog.len(),
        masters = %config.masters_dir().display(),
        mode = %config.mode,
        "Building calibrations"
    );

    let reporter = BarReporter::new()?;
    let report = build_calibrations(&catalog, &config, &library, &reporter);
    reporter.finish();

    print_calibration_report(&report);
    println!("Masters in {}", config.masters_dir().display());
    Ok(())
}

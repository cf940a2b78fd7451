use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use imred_core::frame::{DetectorId, ReductionMode};
use imred_core::pipeline::run_reduction_reported;

use crate::progress::BarReporter;
use crate::summary::{print_calibration_report, print_output, print_reduction_summary};

use super::{apply_dirs, load_config};

#[derive(Args)]
pub struct ImageArgs {
    /// Directory containing the raw FITS files
    pub raw_dir: PathBuf,

    /// Dataset (exposure) number to reduce
    pub dataset: u32,

    /// Reduce a single detector (e.g. 3 or c3)
    #[arg(long)]
    pub detector: Option<DetectorId>,

    /// Base name of the output files (default: J<RA><DEC> from the header)
    #[arg(long)]
    pub save_name: Option<String>,

    /// Rebuild master frames even if they already exist
    #[arg(long)]
    pub force_rebuild: bool,

    /// Directory for master frames (default: RAW_DIR)
    #[arg(long)]
    pub masters: Option<PathBuf>,

    /// Output directory (default: RAW_DIR)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Reduction config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn run(args: &ImageArgs) -> Result<()> {
    let mut config = load_config(
        args.config.as_deref(),
        &args.raw_dir,
        args.dataset,
        ReductionMode::Imaging,
    )?;
    apply_dirs(&mut config, &args.masters, &args.output);
    if args.detector.is_some() {
        config.imaging.detector = args.detector;
    }
    if args.save_name.is_some() {
        config.save_name = args.save_name.clone();
    }
    config.force_rebuild |= args.force_rebuild;
    config.validate()?;

    print_reduction_summary(&config);

    let reporter = Arc::new(BarReporter::new()?);
    let output = run_reduction_reported(&config, reporter.clone(), None)?;
    reporter.finish();

    print_calibration_report(&output.calibration);
    print_output(&output);
    Ok(())
}

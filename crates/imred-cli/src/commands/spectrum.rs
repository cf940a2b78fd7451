use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use imred_core::frame::ReductionMode;
use imred_core::pipeline::run_reduction_reported;

use crate::progress::BarReporter;
use crate::summary::{print_calibration_report, print_output, print_reduction_summary};

use super::{apply_dirs, load_config};

#[derive(Args)]
pub struct SpectrumArgs {
    /// Directory containing the raw FITS files
    pub raw_dir: PathBuf,

    /// Dataset (exposure) number to reduce
    pub dataset: u32,

    /// Number of adjacent spectral columns to sum [default: 2]
    #[arg(long)]
    pub spectral_binning: Option<usize>,

    /// Base name of the output files (default: J<RA><DEC> from the header)
    #[arg(long)]
    pub save_name: Option<String>,

    /// Wavelength of the first column, for the linear wavelength solution
    #[arg(long, requires = "lambda_max")]
    pub lambda_min: Option<f64>,

    /// Wavelength of the last column
    #[arg(long, requires = "lambda_min")]
    pub lambda_max: Option<f64>,

    /// Skip sky background subtraction
    #[arg(long)]
    pub no_sky_subtraction: bool,

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

    /// Do not write the preview image
    #[arg(long)]
    pub no_preview: bool,
}

pub fn run(args: &SpectrumArgs) -> Result<()> {
    let mut config = load_config(
        args.config.as_deref(),
        &args.raw_dir,
        args.dataset,
        ReductionMode::Spectroscopy,
    )?;
    apply_dirs(&mut config, &args.masters, &args.output);
    if let Some(factor) = args.spectral_binning {
        config.spectroscopy.spectral_binning = factor;
    }
    if args.save_name.is_some() {
        config.save_name = args.save_name.clone();
    }
    if args.lambda_min.is_some() {
        config.spectroscopy.lambda_min = args.lambda_min;
        config.spectroscopy.lambda_max = args.lambda_max;
    }
    config.spectroscopy.sky_subtraction &= !args.no_sky_subtraction;
    config.preview &= !args.no_preview;
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

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use imred_core::io::catalog::FrameCatalog;

#[derive(Args)]
pub struct CatalogArgs {
    /// Directory containing the raw FITS files
    pub raw_dir: PathBuf,
}

pub fn run(args: &CatalogArgs) -> Result<()> {
    let catalog = FrameCatalog::scan(&args.raw_dir)
        .with_context(|| format!("Failed to scan {}", args.raw_dir.display()))?;

    println!(
        "{:<24} {:<8} {:<5} {:<7} {:<12} {:<14} {:<10} {:>9}",
        "File", "Type", "Chip", "Binning", "Readout", "Slit mask", "Filter", "Exptime"
    );
    for record in catalog.records() {
        println!(
            "{:<24} {:<8} {:<5} {:<7} {:<12} {:<14} {:<10} {:>9.1}",
            record.file_name(),
            record.frame_type.to_string(),
            record.detector.to_string(),
            record.binning.to_string(),
            record.readout.to_string(),
            record.slit_mask,
            record.filter,
            record.exposure_time,
        );
    }
    println!();
    println!("Frames:      {}", catalog.len());

    if !catalog.rejected.is_empty() {
        println!("Rejected:    {}", catalog.rejected.len());
        for (path, reason) in &catalog.rejected {
            println!("  {}: {}", path.display(), reason);
        }
    }

    Ok(())
}

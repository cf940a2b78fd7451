pub mod catalog;
pub mod config;
pub mod image;
pub mod masters;
pub mod spectrum;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use imred_core::frame::ReductionMode;
use imred_core::pipeline::ReductionConfig;
use tracing::info;

/// Load `config` if given, else start from defaults, then point it at the
/// raw directory and dataset from the command line.
pub(crate) fn load_config(
    config: Option<&Path>,
    raw_dir: &Path,
    dataset: u32,
    mode: ReductionMode,
) -> Result<ReductionConfig> {
    let mut cfg = match config {
        Some(path) => {
            info!(config = %path.display(), "Loading reduction config");
            ReductionConfig::from_toml_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?
        }
        None => ReductionConfig::default(),
    };
    cfg.input = raw_dir.to_path_buf();
    cfg.dataset = dataset;
    cfg.mode = mode;
    Ok(cfg)
}

pub(crate) fn apply_dirs(
    cfg: &mut ReductionConfig,
    masters: &Option<PathBuf>,
    output: &Option<PathBuf>,
) {
    if let Some(dir) = masters {
        cfg.masters = Some(dir.clone());
    }
    if let Some(dir) = output {
        cfg.output = Some(dir.clone());
    }
}

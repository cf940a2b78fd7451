use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::calib::{BiasPolicy, FlatPolicy, FlatSelection};
use crate::consts::{
    DEFAULT_EXPOSURE_PREFIX, DEFAULT_IMAGING_DETECTORS, DEFAULT_IMAGING_MARKER,
    DEFAULT_LONG_SLIT_MARKER, DEFAULT_SPECTRAL_BINNING,
};
use crate::error::{ReductionError, Result};
use crate::frame::{DetectorId, ReductionMode};
use crate::reduce::{CropGeometry, DetectorLayout};
use crate::stack::CombineMethod;

/// Everything one reduction run needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReductionConfig {
    /// Directory of raw exposures.
    pub input: PathBuf,
    /// Where master frames are stored. Defaults to `input`.
    #[serde(default)]
    pub masters: Option<PathBuf>,
    /// Where products are written. Defaults to `input`.
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub dataset: u32,
    #[serde(default)]
    pub mode: ReductionMode,
    #[serde(default)]
    pub force_rebuild: bool,
    #[serde(default)]
    pub save_name: Option<String>,
    /// Write a stretched preview next to spectrum products.
    #[serde(default = "default_true")]
    pub preview: bool,
    /// File prefix of raw exposures, `<prefix><dataset:04>c<N>.fits`.
    #[serde(default = "default_exposure_prefix")]
    pub exposure_prefix: String,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub spectroscopy: SpectroscopyConfig,
    #[serde(default)]
    pub imaging: ImagingConfig,
}

fn default_true() -> bool {
    true
}

fn default_exposure_prefix() -> String {
    DEFAULT_EXPOSURE_PREFIX.to_string()
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("."),
            masters: None,
            output: None,
            dataset: 0,
            mode: ReductionMode::default(),
            force_rebuild: false,
            save_name: None,
            preview: true,
            exposure_prefix: default_exposure_prefix(),
            calibration: CalibrationConfig::default(),
            spectroscopy: SpectroscopyConfig::default(),
            imaging: ImagingConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    #[serde(default)]
    pub bias: BiasPolicy,
    #[serde(default)]
    pub flat: FlatPolicy,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpectroscopyConfig {
    #[serde(default = "default_true")]
    pub sky_subtraction: bool,
    /// Adjacent spectral columns summed per output column.
    #[serde(default = "default_spectral_binning")]
    pub spectral_binning: usize,
    /// Wavelength of the first output column, for the linear solution.
    #[serde(default)]
    pub lambda_min: Option<f64>,
    /// Wavelength of the last output column.
    #[serde(default)]
    pub lambda_max: Option<f64>,
    #[serde(default = "default_long_slit_marker")]
    pub long_slit_marker: String,
    #[serde(default)]
    pub layout: DetectorLayout,
    #[serde(default = "CropGeometry::spectroscopy")]
    pub crop: CropGeometry,
}

fn default_spectral_binning() -> usize {
    DEFAULT_SPECTRAL_BINNING
}

fn default_long_slit_marker() -> String {
    DEFAULT_LONG_SLIT_MARKER.to_string()
}

impl Default for SpectroscopyConfig {
    fn default() -> Self {
        Self {
            layout: DetectorLayout::default(),
            crop: CropGeometry::spectroscopy(),
            sky_subtraction: true,
            spectral_binning: DEFAULT_SPECTRAL_BINNING,
            lambda_min: None,
            lambda_max: None,
            long_slit_marker: default_long_slit_marker(),
        }
    }
}

impl SpectroscopyConfig {
    /// `(lambda_min, lambda_max)` when both ends are configured.
    pub fn wavelength_range(&self) -> Option<(f64, f64)> {
        self.lambda_min.zip(self.lambda_max)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImagingConfig {
    #[serde(default = "default_imaging_detectors")]
    pub detectors: Vec<DetectorId>,
    /// Reduce only this detector.
    #[serde(default)]
    pub detector: Option<DetectorId>,
    #[serde(default = "default_imaging_marker")]
    pub imaging_marker: String,
    #[serde(default = "CropGeometry::imaging")]
    pub crop: CropGeometry,
}

fn default_imaging_detectors() -> Vec<DetectorId> {
    DEFAULT_IMAGING_DETECTORS
        .iter()
        .map(|&n| DetectorId(n))
        .collect()
}

fn default_imaging_marker() -> String {
    DEFAULT_IMAGING_MARKER.to_string()
}

impl Default for ImagingConfig {
    fn default() -> Self {
        Self {
            detectors: default_imaging_detectors(),
            crop: CropGeometry::imaging(),
            detector: None,
            imaging_marker: default_imaging_marker(),
        }
    }
}

impl ImagingConfig {
    /// Detectors to reduce, honouring a single-detector selection.
    pub fn selected_detectors(&self) -> Vec<DetectorId> {
        match self.detector {
            Some(d) => vec![d],
            None => self.detectors.clone(),
        }
    }
}

impl ReductionConfig {
    pub fn new(input: &Path, dataset: u32, mode: ReductionMode) -> Self {
        Self {
            input: input.to_path_buf(),
            dataset,
            mode,
            ..Default::default()
        }
    }

    pub fn masters_dir(&self) -> &Path {
        self.masters.as_deref().unwrap_or(&self.input)
    }

    pub fn output_dir(&self) -> &Path {
        self.output.as_deref().unwrap_or(&self.input)
    }

    pub fn flat_selection(&self) -> FlatSelection {
        FlatSelection {
            long_slit_marker: self.spectroscopy.long_slit_marker.trim().to_lowercase(),
            imaging_marker: self.imaging.imaging_marker.trim().to_lowercase(),
        }
    }

    pub fn crop(&self) -> &CropGeometry {
        match self.mode {
            ReductionMode::Spectroscopy => &self.spectroscopy.crop,
            ReductionMode::Imaging => &self.imaging.crop,
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ReductionError::InvalidConfiguration(e.to_string()))
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ReductionError::InvalidConfiguration(e.to_string()))
    }

    /// Check every setting before any file is touched.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ReductionError::InvalidConfiguration(msg));

        if self.exposure_prefix.contains(['/', '\\']) {
            return invalid(format!(
                "exposure prefix '{}' must not contain path separators",
                self.exposure_prefix
            ));
        }
        validate_combine(&self.calibration.bias.method)?;
        validate_combine(&self.calibration.flat.method)?;
        validate_flat_policy(&self.calibration.flat)?;

        let spectro = &self.spectroscopy;
        spectro.layout.validate()?;
        validate_crop(&spectro.crop)?;
        if spectro.spectral_binning == 0 {
            return Err(ReductionError::InvalidFactor(spectro.spectral_binning));
        }
        match (spectro.lambda_min, spectro.lambda_max) {
            (None, None) => {}
            (Some(a), Some(b)) if a.is_finite() && b.is_finite() && a != b => {}
            (Some(_), Some(_)) => {
                return invalid(format!(
                    "wavelength range {:?}..{:?} must be finite and non-empty",
                    spectro.lambda_min, spectro.lambda_max
                ))
            }
            _ => return invalid("lambda_min and lambda_max must be given together".into()),
        }
        if spectro.long_slit_marker.trim().is_empty() {
            return invalid("long-slit marker must not be empty".into());
        }

        let imaging = &self.imaging;
        validate_crop(&imaging.crop)?;
        if imaging.detectors.is_empty() {
            return invalid("imaging needs at least one detector".into());
        }
        let mut seen = HashSet::new();
        if let Some(dup) = imaging.detectors.iter().find(|d| !seen.insert(**d)) {
            return invalid(format!("imaging detector {dup} listed twice"));
        }
        if let Some(d) = imaging.detector {
            if !imaging.detectors.contains(&d) {
                return invalid(format!("selected detector {d} is not an imaging detector"));
            }
        }
        if imaging.imaging_marker.trim().is_empty() {
            return invalid("imaging marker must not be empty".into());
        }
        Ok(())
    }
}

fn validate_combine(method: &CombineMethod) -> Result<()> {
    if let CombineMethod::SigmaClip(p) = method {
        if !(p.sigma > 0.0) || p.iterations == 0 {
            return Err(ReductionError::InvalidConfiguration(format!(
                "sigma clipping needs sigma > 0 and at least one iteration, got {method}"
            )));
        }
    }
    Ok(())
}

fn validate_flat_policy(policy: &FlatPolicy) -> Result<()> {
    let invalid = |msg: String| Err(ReductionError::InvalidConfiguration(msg));
    if !(0.0..=100.0).contains(&policy.percentile) {
        return invalid(format!("flat percentile {} outside 0..=100", policy.percentile));
    }
    if !(policy.min_level <= policy.max_level) {
        return invalid(format!(
            "flat band [{}, {}] is empty",
            policy.min_level, policy.max_level
        ));
    }
    if !(policy.floor > 0.0) {
        return invalid(format!("flat floor {} must be positive", policy.floor));
    }
    Ok(())
}

fn validate_crop(crop: &CropGeometry) -> Result<()> {
    if crop.sensor_rows == 0 || crop.sensor_cols == 0 {
        return Err(ReductionError::InvalidConfiguration(
            "sensor dimensions must be positive".into(),
        ));
    }
    if crop.bottom_margin + crop.top_margin >= crop.sensor_rows {
        return Err(ReductionError::InvalidConfiguration(format!(
            "margins {} + {} leave no rows of {}",
            crop.bottom_margin, crop.top_margin, crop.sensor_rows
        )));
    }
    Ok(())
}

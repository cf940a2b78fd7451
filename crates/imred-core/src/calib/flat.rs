use std::path::PathBuf;
use std::sync::Arc;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::consts::{
    DEFAULT_FLAT_FLOOR, DEFAULT_FLAT_MAX_LEVEL, DEFAULT_FLAT_MIN_LEVEL, DEFAULT_FLAT_PERCENTILE,
};
use crate::error::{ReductionError, Result};
use crate::frame::{FrameRecord, FrameType};
use crate::io::fits::read_frame;
use crate::stack::{combine, CombineMethod};
use crate::stats::{nan_median, nan_percentile};

use super::key::{BiasKey, ConfigurationKey, FlatKey};
use super::library::{MasterLibrary, MasterStore};
use super::MasterFrame;

/// Quality gating and normalization of flat fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlatPolicy {
    /// Percentile (0-100) of positive bias-subtracted pixels used as the
    /// flat's brightness.
    #[serde(default = "default_percentile")]
    pub percentile: f32,
    /// Flats dimmer than this (counts) are rejected.
    #[serde(default = "default_min_level")]
    pub min_level: f32,
    /// Flats brighter than this (counts) are rejected.
    #[serde(default = "default_max_level")]
    pub max_level: f32,
    /// Combined pixels below this value are replaced by the frame median.
    #[serde(default = "default_floor")]
    pub floor: f32,
    /// Combination statistic for the normalized flats.
    #[serde(default = "default_flat_method")]
    pub method: CombineMethod,
}

fn default_flat_method() -> CombineMethod {
    CombineMethod::Median
}
fn default_percentile() -> f32 {
    DEFAULT_FLAT_PERCENTILE
}
fn default_min_level() -> f32 {
    DEFAULT_FLAT_MIN_LEVEL
}
fn default_max_level() -> f32 {
    DEFAULT_FLAT_MAX_LEVEL
}
fn default_floor() -> f32 {
    DEFAULT_FLAT_FLOOR
}

impl Default for FlatPolicy {
    fn default() -> Self {
        Self {
            percentile: DEFAULT_FLAT_PERCENTILE,
            min_level: DEFAULT_FLAT_MIN_LEVEL,
            max_level: DEFAULT_FLAT_MAX_LEVEL,
            floor: DEFAULT_FLAT_FLOOR,
            method: default_flat_method(),
        }
    }
}

impl FlatPolicy {
    /// Whether a flat with this brightness is inside the exposure band.
    pub fn accepts(&self, level: f32) -> bool {
        level >= self.min_level && level <= self.max_level
    }
}

/// A flat excluded from combination. `statistic` is `None` when the frame
/// had no positive pixels after bias subtraction.
#[derive(Clone, Debug, PartialEq)]
pub struct FlatRejection {
    pub path: PathBuf,
    pub statistic: Option<f32>,
}

/// Brightness of a bias-subtracted flat: the given percentile of its
/// positive pixels.
pub fn flat_brightness(data: &Array2<f32>, percentile: f32) -> Option<f32> {
    nan_percentile(data.iter().copied().filter(|&v| v > 0.0), percentile)
}

/// Build a unit-median master flat from the flats of one configuration.
///
/// Each flat is bias-subtracted with the master matching its own readout
/// speed, gated on brightness, scaled to unit brightness and combined.
/// Fails with `NoValidFrames` when every candidate is rejected.
pub fn build_master_flat<S: MasterStore>(
    records: &[FrameRecord],
    key: &FlatKey,
    library: &MasterLibrary<S>,
    policy: &FlatPolicy,
) -> Result<Arc<MasterFrame>> {
    let config_key = ConfigurationKey::Flat(key.clone());
    if records.is_empty() {
        return Err(ReductionError::InsufficientFrames { key: config_key });
    }
    if let Some(stray) = records.iter().find(|r| {
        r.frame_type != FrameType::Flat
            || r.detector != key.detector
            || r.binning != key.binning
            || !key.identity.matches(r)
    }) {
        return Err(ReductionError::InvalidConfiguration(format!(
            "{} does not belong to {config_key}",
            stray.file_name()
        )));
    }

    library.get_or_build(&config_key, || {
        combine_flats(records, &config_key, library, policy)
    })
}

fn combine_flats<S: MasterStore>(
    records: &[FrameRecord],
    key: &ConfigurationKey,
    library: &MasterLibrary<S>,
    policy: &FlatPolicy,
) -> Result<MasterFrame> {
    let mut accepted = Vec::with_capacity(records.len());
    let mut rejected = Vec::new();

    for record in records {
        let bias_key = ConfigurationKey::Bias(BiasKey {
            detector: record.detector,
            binning: record.binning,
            readout: record.readout.clone(),
        });
        let bias = library.require(&bias_key, record.detector)?;
        let raw = read_frame(&record.path)?;
        if raw.data.dim() != bias.data.dim() {
            return Err(ReductionError::ShapeMismatch(format!(
                "{} is {:?} but {bias_key} is {:?}",
                record.file_name(),
                raw.data.dim(),
                bias.data.dim()
            )));
        }

        let mut data = raw.data - &bias.data;
        let level = flat_brightness(&data, policy.percentile);
        debug!(
            file = %record.file_name(),
            percentile = policy.percentile,
            level = ?level,
            "Flat brightness"
        );

        match level {
            Some(level) if policy.accepts(level) => {
                data.mapv_inplace(|v| v / level);
                accepted.push(data);
            }
            _ => {
                warn!(
                    file = %record.file_name(),
                    level = ?level,
                    min = policy.min_level,
                    max = policy.max_level,
                    "Rejecting flat outside the exposure band"
                );
                rejected.push(FlatRejection {
                    path: record.path.clone(),
                    statistic: level,
                });
            }
        }
    }

    if accepted.is_empty() {
        return Err(ReductionError::NoValidFrames {
            key: key.clone(),
            rejected,
        });
    }

    info!(
        key = %key,
        accepted = accepted.len(),
        rejected = rejected.len(),
        method = %policy.method,
        "Combining flat frames"
    );
    let mut data = combine(&accepted, &policy.method)?;
    normalize_master_flat(&mut data, policy.floor);

    Ok(MasterFrame {
        key: key.clone(),
        data,
        method: policy.method.clone(),
        frames_combined: accepted.len(),
    })
}

/// Replace sub-floor pixels by the frame median, then scale so the median
/// of positive pixels is 1. No pixel ends below `floor`.
pub fn normalize_master_flat(data: &mut Array2<f32>, floor: f32) {
    let median = nan_median(data.iter().copied()).unwrap_or(1.0);
    let replacement = if median >= floor { median } else { 1.0 };
    data.mapv_inplace(|v| if v.is_nan() || v < floor { replacement } else { v });

    let norm = nan_median(data.iter().copied().filter(|&v| v > 0.0)).unwrap_or(1.0);
    data.mapv_inplace(|v| {
        let scaled = v / norm;
        if scaled < floor {
            1.0
        } else {
            scaled
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_replaces_floor_and_centers_on_one() {
        let mut data = Array2::from_shape_vec(
            (2, 3),
            vec![0.5, 0.5, 0.0, 0.5, 0.6, 0.4],
        )
        .unwrap();
        normalize_master_flat(&mut data, 1e-4);
        // zero replaced by median 0.5, then everything divided by 0.5
        assert!((data[[0, 2]] - 1.0).abs() < 1e-6);
        assert!((data[[1, 1]] - 1.2).abs() < 1e-6);
        assert!(data.iter().all(|&v| v >= 1e-4));
    }

    #[test]
    fn test_brightness_ignores_non_positive_pixels() {
        let data = Array2::from_shape_vec((1, 4), vec![-10.0, 0.0, 100.0, 100.0]).unwrap();
        assert_eq!(flat_brightness(&data, 90.0), Some(100.0));
        let dark = Array2::from_elem((2, 2), -1.0f32);
        assert_eq!(flat_brightness(&dark, 90.0), None);
    }
}

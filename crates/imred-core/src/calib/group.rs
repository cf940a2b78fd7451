use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::consts::{DEFAULT_IMAGING_MARKER, DEFAULT_LONG_SLIT_MARKER};
use crate::error::{ReductionError, Result};
use crate::frame::{FlatIdentity, FrameRecord, FrameType, ReductionMode};
use crate::io::catalog::FrameCatalog;

use super::bias::{build_master_bias, BiasPolicy};
use super::flat::{build_master_flat, FlatPolicy};
use super::key::{BiasKey, ConfigurationKey, FlatKey};
use super::library::{MasterLibrary, MasterStore};

/// Slit-mask markers that decide which flats belong to which reduction mode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlatSelection {
    /// Slit masks containing this text are long-slit masks.
    #[serde(default = "default_long_slit_marker")]
    pub long_slit_marker: String,
    /// Slit mask value the instrument reports in direct imaging.
    #[serde(default = "default_imaging_marker")]
    pub imaging_marker: String,
}

fn default_long_slit_marker() -> String {
    DEFAULT_LONG_SLIT_MARKER.to_string()
}
fn default_imaging_marker() -> String {
    DEFAULT_IMAGING_MARKER.to_string()
}

impl Default for FlatSelection {
    fn default() -> Self {
        Self {
            long_slit_marker: default_long_slit_marker(),
            imaging_marker: default_imaging_marker(),
        }
    }
}

/// Decide which flat group a record belongs to in `mode`.
///
/// `Ok(None)` means the flat belongs to the other mode. A flat that names
/// neither a slit mask nor a filter, or an imaging flat without a filter,
/// is an `InvalidConfiguration`.
pub fn resolve_flat_identity(
    record: &FrameRecord,
    mode: ReductionMode,
    selection: &FlatSelection,
) -> Result<Option<FlatIdentity>> {
    let slit = record.slit_mask.as_str();
    let filter = record.filter.as_str();
    if slit.is_empty() && filter.is_empty() {
        return Err(ReductionError::InvalidConfiguration(format!(
            "flat {} declares neither a slit mask nor a filter",
            record.file_name()
        )));
    }

    match mode {
        ReductionMode::Spectroscopy => {
            if slit.contains(selection.long_slit_marker.as_str()) {
                Ok(Some(FlatIdentity::slit_mask(slit)))
            } else {
                Ok(None)
            }
        }
        ReductionMode::Imaging => {
            if !slit.is_empty() && !slit.contains(selection.imaging_marker.as_str()) {
                Ok(None)
            } else if filter.is_empty() {
                Err(ReductionError::InvalidConfiguration(format!(
                    "imaging flat {} has no filter",
                    record.file_name()
                )))
            } else {
                Ok(Some(FlatIdentity::photometric_filter(filter)))
            }
        }
    }
}

/// Partition bias records by (detector, binning, readout).
pub fn group_bias_records(records: &[FrameRecord]) -> BTreeMap<BiasKey, Vec<FrameRecord>> {
    let mut groups: BTreeMap<BiasKey, Vec<FrameRecord>> = BTreeMap::new();
    for record in records.iter().filter(|r| r.frame_type == FrameType::Bias) {
        let key = BiasKey {
            detector: record.detector,
            binning: record.binning,
            readout: record.readout.clone(),
        };
        groups.entry(key).or_default().push(record.clone());
    }
    groups
}

/// Flat records partitioned by (detector, binning, identity), plus the
/// records whose identity could not be resolved.
#[derive(Debug, Default)]
pub struct FlatGroups {
    pub groups: BTreeMap<FlatKey, Vec<FrameRecord>>,
    pub invalid: Vec<(PathBuf, ReductionError)>,
}

pub fn group_flat_records(
    records: &[FrameRecord],
    mode: ReductionMode,
    selection: &FlatSelection,
) -> FlatGroups {
    let mut result = FlatGroups::default();
    for record in records.iter().filter(|r| r.frame_type == FrameType::Flat) {
        match resolve_flat_identity(record, mode, selection) {
            Ok(Some(identity)) => {
                let key = FlatKey {
                    detector: record.detector,
                    binning: record.binning,
                    identity,
                };
                result.groups.entry(key).or_default().push(record.clone());
            }
            Ok(None) => {}
            Err(e) => result.invalid.push((record.path.clone(), e)),
        }
    }
    result
}

/// Outcome of building every master of one kind.
#[derive(Debug, Default)]
pub struct CalibrationReport {
    pub built: Vec<ConfigurationKey>,
    /// Groups that could not be built. Other groups are unaffected.
    pub skipped: Vec<(ConfigurationKey, ReductionError)>,
    /// Records that could not be assigned to any group.
    pub invalid: Vec<(PathBuf, ReductionError)>,
}

impl CalibrationReport {
    pub fn merge(&mut self, other: CalibrationReport) {
        self.built.extend(other.built);
        self.skipped.extend(other.skipped);
        self.invalid.extend(other.invalid);
    }

    fn record_failure(&mut self, key: ConfigurationKey, err: ReductionError) {
        if err.is_recoverable() {
            warn!(key = %key, error = %err, "Skipping calibration group");
        } else {
            error!(key = %key, error = %err, "Calibration group failed");
        }
        self.skipped.push((key, err));
    }
}

/// Build a master bias for every bias configuration in the catalog.
pub fn build_bias_library<S: MasterStore>(
    catalog: &FrameCatalog,
    library: &MasterLibrary<S>,
    policy: &BiasPolicy,
) -> CalibrationReport {
    let mut report = CalibrationReport::default();
    let groups = group_bias_records(catalog.records());
    info!(groups = groups.len(), "Building master biases");

    for (key, records) in &groups {
        match build_master_bias(records, key, library, policy) {
            Ok(_) => report.built.push(ConfigurationKey::Bias(key.clone())),
            Err(e) => report.record_failure(ConfigurationKey::Bias(key.clone()), e),
        }
    }
    report
}

/// Build a master flat for every flat configuration of `mode` in the
/// catalog. The matching master biases must already be in the library.
pub fn build_flat_library<S: MasterStore>(
    catalog: &FrameCatalog,
    mode: ReductionMode,
    selection: &FlatSelection,
    library: &MasterLibrary<S>,
    policy: &FlatPolicy,
) -> CalibrationReport {
    let FlatGroups { groups, invalid } = group_flat_records(catalog.records(), mode, selection);
    info!(groups = groups.len(), mode = %mode, "Building master flats");
    for (path, e) in &invalid {
        warn!(file = %path.display(), error = %e, "Flat excluded from grouping");
    }

    let mut report = CalibrationReport {
        invalid,
        ..Default::default()
    };
    for (key, records) in &groups {
        match build_master_flat(records, key, library, policy) {
            Ok(_) => report.built.push(ConfigurationKey::Flat(key.clone())),
            Err(e) => report.record_failure(ConfigurationKey::Flat(key.clone()), e),
        }
    }
    report
}

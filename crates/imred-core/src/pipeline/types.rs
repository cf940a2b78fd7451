use std::path::PathBuf;

use crate::calib::CalibrationReport;
use crate::reduce::{ImageSet, SpectrumMosaic};

/// Reduction stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Cataloging,
    BuildingBiases,
    BuildingFlats,
    Calibrating,
    PostProcessing,
    Writing,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cataloging => write!(f, "Cataloging raw frames"),
            Self::BuildingBiases => write!(f, "Building master biases"),
            Self::BuildingFlats => write!(f, "Building master flats"),
            Self::Calibrating => write!(f, "Calibrating detectors"),
            Self::PostProcessing => write!(f, "Post-processing"),
            Self::Writing => write!(f, "Writing products"),
        }
    }
}

/// Reduced data of one run.
#[derive(Clone, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum ReductionProduct {
    /// Stitched, post-processed spectrum.
    Spectrum(SpectrumMosaic),
    Images(ImageSet),
}

/// Result of [`run_reduction`](super::run_reduction).
#[derive(Debug)]
pub struct ReductionOutput {
    /// Base name of the product files.
    pub name: String,
    pub product: ReductionProduct,
    /// Files written, products first, then previews.
    pub files: Vec<PathBuf>,
    pub calibration: CalibrationReport,
}

/// Thread-safe progress reporting for a reduction.
///
/// Implementors can use this to drive progress bars or logging. All
/// methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new stage has started. `total_items` is the number of work items
    /// in this stage (groups, detectors, files), if known.
    fn begin_stage(&self, _stage: PipelineStage, _total_items: Option<usize>) {}

    /// One work item within the current stage has completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// No-op progress reporter, used when `run_reduction` delegates.
pub(super) struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

use std::path::PathBuf;

use thiserror::Error;

use crate::calib::flat::FlatRejection;
use crate::calib::key::ConfigurationKey;
use crate::frame::DetectorId;

#[derive(Error, Debug)]
pub enum ReductionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid FITS file: {0}")]
    InvalidFits(String),

    #[error("FITS error in {}: {source}", path.display())]
    Fits {
        path: PathBuf,
        #[source]
        source: Box<fitsio::errors::Error>,
    },

    #[error("No input frames for {key}")]
    InsufficientFrames { key: ConfigurationKey },

    #[error("All {} candidate frames rejected for {key}", .rejected.len())]
    NoValidFrames {
        key: ConfigurationKey,
        rejected: Vec<FlatRejection>,
    },

    #[error("Missing {key} for detector {detector}")]
    CalibrationMissing {
        detector: DetectorId,
        key: ConfigurationKey,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid binning factor {0}: must be at least 1")]
    InvalidFactor(usize),

    #[error("Empty frame sequence")]
    EmptySequence,

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Plate solving failed: {0}")]
    PlateSolve(String),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),
}

impl ReductionError {
    /// Errors that only invalidate one calibration group. Callers skip the
    /// group and continue with the rest of the catalog.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientFrames { .. } | Self::NoValidFrames { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ReductionError>;

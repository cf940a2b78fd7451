//! Pixel-wise combination of equally shaped frames.

pub mod mean;
pub mod median;
pub mod sigma_clip;

use std::fmt;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{ReductionError, Result};

pub use mean::mean_stack;
pub use median::median_stack;
pub use sigma_clip::{sigma_clip_stack, SigmaClipParams};

/// Statistic used to combine calibration frames.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CombineMethod {
    Mean,
    Median,
    SigmaClip(SigmaClipParams),
}

impl CombineMethod {
    /// Short tag stored in master frame headers.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Median => "median",
            Self::SigmaClip(_) => "sigma-clip",
        }
    }
}

impl fmt::Display for CombineMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mean => write!(f, "Mean"),
            Self::Median => write!(f, "Median"),
            Self::SigmaClip(p) => write!(f, "Sigma Clip (sigma={}, iter={})", p.sigma, p.iterations),
        }
    }
}

/// Combine frames with the given method.
pub fn combine(frames: &[Array2<f32>], method: &CombineMethod) -> Result<Array2<f32>> {
    match method {
        CombineMethod::Mean => mean_stack(frames),
        CombineMethod::Median => median_stack(frames),
        CombineMethod::SigmaClip(params) => sigma_clip_stack(frames, params),
    }
}

pub(crate) fn check_shapes(frames: &[Array2<f32>]) -> Result<()> {
    let expected = frames[0].dim();
    match frames.iter().position(|f| f.dim() != expected) {
        Some(i) => Err(ReductionError::ShapeMismatch(format!(
            "frame {i} is {:?}, expected {:?}",
            frames[i].dim(),
            expected
        ))),
        None => Ok(()),
    }
}

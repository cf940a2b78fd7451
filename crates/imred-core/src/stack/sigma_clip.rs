use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{ReductionError, Result};

use super::check_shapes;

/// Parameters for sigma-clipped mean combination.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SigmaClipParams {
    /// Number of rejection iterations (default: 2).
    pub iterations: usize,
    /// Values beyond mean +/- sigma*stddev are rejected (default: 3.0).
    pub sigma: f32,
}

impl Default for SigmaClipParams {
    fn default() -> Self {
        Self {
            iterations: 2,
            sigma: 3.0,
        }
    }
}

/// Combine frames using a sigma-clipped mean.
///
/// Per pixel: compute mean and stddev, reject values more than `sigma` standard
/// deviations from the mean, then recompute the mean from remaining values.
/// Repeat for the configured number of iterations.
pub fn sigma_clip_stack(frames: &[Array2<f32>], params: &SigmaClipParams) -> Result<Array2<f32>> {
    if frames.is_empty() {
        return Err(ReductionError::EmptySequence);
    }
    check_shapes(frames)?;

    let (h, w) = frames[0].dim();
    let n = frames.len();
    let mut result = Array2::<f32>::zeros((h, w));

    let mut pixel_values = vec![0.0f32; n];
    let mut mask = vec![true; n];

    for row in 0..h {
        for col in 0..w {
            for (i, frame) in frames.iter().enumerate() {
                pixel_values[i] = frame[[row, col]];
                mask[i] = true;
            }

            for _ in 0..params.iterations {
                let (mean, stddev) = mean_stddev(&pixel_values, &mask);
                if stddev < 1e-10 {
                    break;
                }
                let lo = mean - params.sigma * stddev;
                let hi = mean + params.sigma * stddev;
                for i in 0..n {
                    if mask[i] && (pixel_values[i] < lo || pixel_values[i] > hi) {
                        mask[i] = false;
                    }
                }
            }

            let (mean, _) = mean_stddev(&pixel_values, &mask);
            result[[row, col]] = if mask.iter().any(|&m| m) {
                mean
            } else {
                // All values rejected: fall back to the plain mean
                pixel_values.iter().sum::<f32>() / n as f32
            };
        }
    }

    Ok(result)
}

fn mean_stddev(values: &[f32], mask: &[bool]) -> (f32, f32) {
    let kept = values
        .iter()
        .zip(mask)
        .filter_map(|(&v, &m)| m.then_some(v));
    let (sum, count) = kept.clone().fold((0.0f32, 0u32), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / count as f32;
    let var_sum: f32 = kept.map(|v| (v - mean) * (v - mean)).sum();
    (mean, (var_sum / count as f32).sqrt())
}

use ndarray::Array2;
use rayon::prelude::*;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::error::{ReductionError, Result};
use crate::stats::median_in_place;

use super::check_shapes;

/// Combine frames by computing the median at each pixel position.
///
/// Parallelizes at the row level for images >= 256x256.
pub fn median_stack(frames: &[Array2<f32>]) -> Result<Array2<f32>> {
    if frames.is_empty() {
        return Err(ReductionError::EmptySequence);
    }
    check_shapes(frames)?;

    let (h, w) = frames[0].dim();
    let n = frames.len();

    if h * w >= PARALLEL_PIXEL_THRESHOLD && n > 1 {
        // Row-parallel: each row allocates its own pixel_values
        let rows: Vec<Vec<f32>> = (0..h)
            .into_par_iter()
            .map(|row| {
                let mut pixel_values = vec![0.0f32; n];
                let mut row_result = vec![0.0f32; w];
                for (col, result) in row_result.iter_mut().enumerate() {
                    for (i, frame) in frames.iter().enumerate() {
                        pixel_values[i] = frame[[row, col]];
                    }
                    *result = median_in_place(&mut pixel_values);
                }
                row_result
            })
            .collect();

        let flat: Vec<f32> = rows.into_iter().flatten().collect();
        Array2::from_shape_vec((h, w), flat)
            .map_err(|e| ReductionError::ShapeMismatch(e.to_string()))
    } else {
        let mut result = Array2::<f32>::zeros((h, w));
        let mut pixel_values = vec![0.0f32; n];

        for row in 0..h {
            for col in 0..w {
                for (i, frame) in frames.iter().enumerate() {
                    pixel_values[i] = frame[[row, col]];
                }
                result[[row, col]] = median_in_place(&mut pixel_values);
            }
        }
        Ok(result)
    }
}

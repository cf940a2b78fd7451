use ndarray::Array2;

use crate::error::{ReductionError, Result};

use super::check_shapes;

/// Combine frames by computing the mean at each pixel.
pub fn mean_stack(frames: &[Array2<f32>]) -> Result<Array2<f32>> {
    if frames.is_empty() {
        return Err(ReductionError::EmptySequence);
    }
    check_shapes(frames)?;

    let n = frames.len() as f32;
    let mut sum = Array2::<f32>::zeros(frames[0].dim());

    for frame in frames {
        sum += frame;
    }

    sum /= n;

    Ok(sum)
}

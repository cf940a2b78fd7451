use ndarray::{s, Array2, Axis};

use crate::error::{ReductionError, Result};

/// Sum groups of `factor` adjacent columns. Trailing columns that do not
/// fill a whole group are dropped.
pub fn bin_spectral(mosaic: &Array2<f32>, factor: usize) -> Result<Array2<f32>> {
    if factor == 0 {
        return Err(ReductionError::InvalidFactor(factor));
    }
    let (rows, cols) = mosaic.dim();
    let out_cols = cols / factor;

    let mut binned = Array2::<f32>::zeros((rows, out_cols));
    for (j, mut column) in binned.axis_iter_mut(Axis(1)).enumerate() {
        let group = mosaic.slice(s![.., j * factor..(j + 1) * factor]);
        column.assign(&group.sum_axis(Axis(1)));
    }
    Ok(binned)
}

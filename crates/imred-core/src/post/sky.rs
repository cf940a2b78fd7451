use std::ops::Range;

use ndarray::{s, Array1, Array2, Axis};
use tracing::{debug, warn};

use crate::stats::nan_median;

/// Rows treated as pure sky: the bottom and top quarters of the slit.
/// `None` when the frame is too short to have a sky band.
pub fn sky_band_rows(rows: usize) -> Option<(Range<usize>, Range<usize>)> {
    let band = rows / 4;
    if band == 0 {
        return None;
    }
    Some((0..band, rows - band..rows))
}

/// Subtract the per-column median of the sky band from every row.
///
/// NaN pixels are ignored when estimating the background; a column with no
/// finite sky pixel becomes NaN.
pub fn subtract_sky_background(mosaic: &Array2<f32>) -> Array2<f32> {
    let Some((low, high)) = sky_band_rows(mosaic.nrows()) else {
        warn!(
            rows = mosaic.nrows(),
            "Spectrum too short for a sky band, background not subtracted"
        );
        return mosaic.clone();
    };

    let background: Array1<f32> = mosaic
        .axis_iter(Axis(1))
        .map(|column| {
            let sky = column
                .slice(s![low.clone()])
                .iter()
                .chain(column.slice(s![high.clone()]).iter())
                .copied()
                .collect::<Vec<f32>>();
            nan_median(sky).unwrap_or(f32::NAN)
        })
        .collect();
    debug!(
        sky_rows = low.len() + high.len(),
        columns = background.len(),
        "Sky background estimated"
    );

    mosaic - &background.insert_axis(Axis(0))
}

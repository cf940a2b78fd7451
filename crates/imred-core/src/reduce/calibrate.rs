use std::ops::Range;
use std::path::Path;

use ndarray::{s, Array2, Zip};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::calib::{BiasKey, ConfigurationKey, FlatKey, MasterLibrary, MasterStore};
use crate::consts::{
    DEFAULT_SPECTRUM_BOTTOM_MARGIN, DEFAULT_SPECTRUM_TOP_MARGIN, KEY_CHIP, KEY_FILTER,
    KEY_SLITMASK, SENSOR_COLS, SENSOR_ROWS,
};
use crate::error::{ReductionError, Result};
use crate::frame::{Binning, DetectorId, FlatIdentity, ReductionMode};
use crate::header::Header;
use crate::io::fits::read_frame;

/// Valid-region geometry of one detector, in unbinned pixels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CropGeometry {
    #[serde(default = "default_sensor_rows")]
    pub sensor_rows: usize,
    #[serde(default = "default_sensor_cols")]
    pub sensor_cols: usize,
    /// Rows dropped at the bottom of the sensor.
    #[serde(default)]
    pub bottom_margin: usize,
    /// Rows dropped at the top of the sensor.
    #[serde(default)]
    pub top_margin: usize,
}

fn default_sensor_rows() -> usize {
    SENSOR_ROWS
}
fn default_sensor_cols() -> usize {
    SENSOR_COLS
}

/// Row and column ranges of a binned frame to keep.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CropRegion {
    pub rows: Range<usize>,
    pub cols: Range<usize>,
}

impl CropRegion {
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.cols.len())
    }
}

impl CropGeometry {
    /// Slit region used for long-slit spectra.
    pub fn spectroscopy() -> Self {
        Self {
            sensor_rows: SENSOR_ROWS,
            sensor_cols: SENSOR_COLS,
            bottom_margin: DEFAULT_SPECTRUM_BOTTOM_MARGIN,
            top_margin: DEFAULT_SPECTRUM_TOP_MARGIN,
        }
    }

    /// Full sensor.
    pub fn imaging() -> Self {
        Self {
            sensor_rows: SENSOR_ROWS,
            sensor_cols: SENSOR_COLS,
            bottom_margin: 0,
            top_margin: 0,
        }
    }

    pub fn for_mode(mode: ReductionMode) -> Self {
        match mode {
            ReductionMode::Spectroscopy => Self::spectroscopy(),
            ReductionMode::Imaging => Self::imaging(),
        }
    }

    /// Crop region of a frame with the given binning and `(rows, cols)`.
    ///
    /// The top margin is scaled by the column binning factor, matching the
    /// instrument's trimming convention.
    pub fn region(&self, binning: Binning, frame_dim: (usize, usize)) -> Result<CropRegion> {
        let (bx, by) = (binning.x as usize, binning.y as usize);
        let row_start = self.bottom_margin / by;
        let row_end = (self.sensor_rows / by).saturating_sub(self.top_margin / bx);
        let col_end = self.sensor_cols / bx;

        if row_start >= row_end || col_end == 0 {
            return Err(ReductionError::InvalidConfiguration(format!(
                "empty crop region rows {row_start}..{row_end}, cols 0..{col_end} at {binning}"
            )));
        }
        let (rows, cols) = frame_dim;
        if rows < row_end || cols < col_end {
            return Err(ReductionError::InvalidConfiguration(format!(
                "frame of {rows}x{cols} is smaller than crop region {row_end}x{col_end} at {binning}"
            )));
        }
        Ok(CropRegion {
            rows: row_start..row_end,
            cols: 0..col_end,
        })
    }
}

/// One science frame after bias subtraction, flat division and cropping.
#[derive(Clone, Debug)]
pub struct CalibratedCcd {
    pub detector: DetectorId,
    pub data: Array2<f32>,
    pub binning: Binning,
    /// Header of the raw exposure.
    pub header: Header,
}

/// Applies master calibrations to raw science frames of one mode.
pub struct CcdCalibrator<'a, S: MasterStore> {
    library: &'a MasterLibrary<S>,
    mode: ReductionMode,
    crop: CropGeometry,
}

impl<'a, S: MasterStore> CcdCalibrator<'a, S> {
    pub fn new(library: &'a MasterLibrary<S>, mode: ReductionMode, crop: CropGeometry) -> Self {
        Self {
            library,
            mode,
            crop,
        }
    }

    pub fn mode(&self) -> ReductionMode {
        self.mode
    }

    /// Calibrate the raw exposure at `path` taken with `detector`.
    pub fn calibrate(&self, path: &Path, detector: DetectorId) -> Result<CalibratedCcd> {
        let raw = read_frame(path)?;
        if let Some(chip) = raw.header.get_string(KEY_CHIP) {
            if chip.parse::<DetectorId>().ok() != Some(detector) {
                warn!(
                    file = %path.display(),
                    chip = %chip,
                    detector = %detector,
                    "CHIP keyword disagrees with requested detector"
                );
            }
        }

        let binning = raw.binning()?;
        let bias_key = ConfigurationKey::Bias(BiasKey {
            detector,
            binning,
            readout: raw.readout(),
        });
        let flat_key = ConfigurationKey::Flat(FlatKey {
            detector,
            binning,
            identity: science_flat_identity(&raw.header, self.mode)?,
        });
        let bias = self.library.require(&bias_key, detector)?;
        let flat = self.library.require(&flat_key, detector)?;

        for (key, dim) in [(&bias_key, bias.data.dim()), (&flat_key, flat.data.dim())] {
            if dim != raw.data.dim() {
                return Err(ReductionError::ShapeMismatch(format!(
                    "{} is {:?} but {key} is {dim:?}",
                    path.display(),
                    raw.data.dim()
                )));
            }
        }

        let region = self.crop.region(binning, raw.data.dim())?;
        let (rows, cols) = (region.rows.clone(), region.cols.clone());
        let mut data = Array2::<f32>::zeros(region.shape());
        Zip::from(&mut data)
            .and(raw.data.slice(s![rows.clone(), cols.clone()]))
            .and(bias.data.slice(s![rows.clone(), cols.clone()]))
            .and(flat.data.slice(s![rows, cols]))
            .for_each(|out, &r, &b, &f| *out = (r - b) / f);

        debug!(
            detector = %detector,
            binning = %binning,
            rows = ?region.rows,
            cols = ?region.cols,
            "Calibrated detector"
        );
        Ok(CalibratedCcd {
            detector,
            data,
            binning,
            header: raw.header,
        })
    }
}

/// Flat identity a science exposure needs: its slit mask in spectroscopy,
/// its filter in imaging.
pub fn science_flat_identity(header: &Header, mode: ReductionMode) -> Result<FlatIdentity> {
    let (keyword, make): (&str, fn(&str) -> FlatIdentity) = match mode {
        ReductionMode::Spectroscopy => (KEY_SLITMASK, FlatIdentity::slit_mask),
        ReductionMode::Imaging => (KEY_FILTER, FlatIdentity::photometric_filter),
    };
    match header.get_string(keyword) {
        Some(value) if !value.trim().is_empty() => Ok(make(&value)),
        _ => Err(ReductionError::InvalidConfiguration(format!(
            "science frame has no {keyword} for {} flat lookup",
            mode.to_string().to_lowercase()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spectroscopy_region_scales_with_binning() {
        let geometry = CropGeometry::spectroscopy();
        let region = geometry
            .region(Binning { x: 2, y: 2 }, (2048, 1024))
            .unwrap();
        // top margin 100 scales by bx: 2048 - 50
        assert_eq!(region.rows, 1800..1998);
        assert_eq!(region.cols, 0..1024);
    }

    #[test]
    fn test_imaging_region_is_full_sensor() {
        let region = CropGeometry::imaging()
            .region(Binning::default(), (4096, 2048))
            .unwrap();
        assert_eq!(region.shape(), (4096, 2048));
    }

    #[test]
    fn test_undersized_frame_rejected() {
        let err = CropGeometry::spectroscopy()
            .region(Binning::default(), (100, 100))
            .unwrap_err();
        assert!(matches!(err, ReductionError::InvalidConfiguration(_)));
    }
}

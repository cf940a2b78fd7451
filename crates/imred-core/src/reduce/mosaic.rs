use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::{concatenate, s, Array2, ArrayView2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::calib::MasterStore;
use crate::consts::{DEFAULT_GAP_PIXELS, DEFAULT_SPECTRUM_DETECTORS};
use crate::error::{ReductionError, Result};
use crate::frame::DetectorId;
use crate::header::Header;

use super::calibrate::{CalibratedCcd, CcdCalibrator};

/// Detectors in stitching order and the unbinned gap after each one but
/// the last.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectorLayout {
    pub order: Vec<DetectorId>,
    pub gaps: Vec<usize>,
}

impl Default for DetectorLayout {
    fn default() -> Self {
        let order: Vec<DetectorId> = DEFAULT_SPECTRUM_DETECTORS
            .iter()
            .map(|&n| DetectorId(n))
            .collect();
        let gaps = vec![DEFAULT_GAP_PIXELS; order.len() - 1];
        Self { order, gaps }
    }
}

impl DetectorLayout {
    /// Layout with the same gap between every pair of detectors.
    pub fn uniform(order: Vec<DetectorId>, gap: usize) -> Self {
        let gaps = vec![gap; order.len().saturating_sub(1)];
        Self { order, gaps }
    }

    pub fn validate(&self) -> Result<()> {
        if self.order.is_empty() {
            return Err(ReductionError::InvalidConfiguration(
                "detector layout has no detectors".into(),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.order.iter().find(|d| !seen.insert(**d)) {
            return Err(ReductionError::InvalidConfiguration(format!(
                "detector {dup} appears twice in the layout"
            )));
        }
        if self.gaps.len() != self.order.len() - 1 {
            return Err(ReductionError::InvalidConfiguration(format!(
                "{} detectors need {} gaps, got {}",
                self.order.len(),
                self.order.len() - 1,
                self.gaps.len()
            )));
        }
        Ok(())
    }
}

/// Path of one detector's raw exposure: `<dir>/<prefix><dataset:04>c<N>.fits`.
pub fn raw_exposure_path(dir: &Path, prefix: &str, dataset: u32, detector: DetectorId) -> PathBuf {
    dir.join(format!("{prefix}{dataset:04}{detector}.fits"))
}

/// Stitched long-slit spectrum with the headers of its detectors in
/// layout order.
#[derive(Clone, Debug)]
pub struct SpectrumMosaic {
    pub data: Array2<f32>,
    pub detectors: Vec<DetectorId>,
    pub headers: Vec<Header>,
}

/// Calibrated detectors of one imaging exposure.
pub type ImageSet = BTreeMap<DetectorId, CalibratedCcd>;

/// Where a dataset's raw exposures live.
#[derive(Clone, Copy, Debug)]
pub struct ExposureSource<'a> {
    pub directory: &'a Path,
    pub prefix: &'a str,
    pub dataset: u32,
}

impl ExposureSource<'_> {
    pub fn path_for(&self, detector: DetectorId) -> PathBuf {
        raw_exposure_path(self.directory, self.prefix, self.dataset, detector)
    }
}

fn calibrate_all<S: MasterStore>(
    calibrator: &CcdCalibrator<'_, S>,
    source: &ExposureSource<'_>,
    detectors: &[DetectorId],
    on_progress: &(impl Fn(usize) + Send + Sync),
) -> Result<Vec<CalibratedCcd>> {
    let done = AtomicUsize::new(0);
    detectors
        .par_iter()
        .map(|&detector| {
            let path = source.path_for(detector);
            if !path.is_file() {
                return Err(ReductionError::InvalidConfiguration(format!(
                    "raw exposure {} for detector {detector} not found",
                    path.display()
                )));
            }
            let ccd = calibrator.calibrate(&path, detector)?;
            on_progress(done.fetch_add(1, Ordering::Relaxed) + 1);
            Ok(ccd)
        })
        .collect()
}

/// Calibrate every detector of `layout` and stitch them into one spectrum.
///
/// Each detector is mirrored along columns, zero-filled gaps of
/// `gap / bx` columns separate neighbours, and the stitched array is
/// mirrored once more so wavelength increases with column.
pub fn assemble_spectrum<S: MasterStore>(
    calibrator: &CcdCalibrator<'_, S>,
    source: &ExposureSource<'_>,
    layout: &DetectorLayout,
) -> Result<SpectrumMosaic> {
    assemble_spectrum_with_progress(calibrator, source, layout, |_| {})
}

/// [`assemble_spectrum`] calling `on_progress(detectors_done)` as each
/// detector is calibrated.
pub fn assemble_spectrum_with_progress<S: MasterStore>(
    calibrator: &CcdCalibrator<'_, S>,
    source: &ExposureSource<'_>,
    layout: &DetectorLayout,
    on_progress: impl Fn(usize) + Send + Sync,
) -> Result<SpectrumMosaic> {
    layout.validate()?;
    let ccds = calibrate_all(calibrator, source, &layout.order, &on_progress)?;

    let rows = ccds[0].data.nrows();
    if let Some(odd) = ccds.iter().find(|c| c.data.nrows() != rows) {
        return Err(ReductionError::ShapeMismatch(format!(
            "detector {} has {} rows, {} has {rows}",
            odd.detector,
            odd.data.nrows(),
            ccds[0].detector
        )));
    }

    let gap_blocks: Vec<Array2<f32>> = ccds
        .iter()
        .zip(&layout.gaps)
        .map(|(ccd, &gap)| Array2::zeros((rows, gap / ccd.binning.x as usize)))
        .collect();

    let mut pieces: Vec<ArrayView2<f32>> = Vec::with_capacity(ccds.len() * 2);
    for (i, ccd) in ccds.iter().enumerate() {
        pieces.push(ccd.data.slice(s![.., ..;-1]));
        if let Some(gap) = gap_blocks.get(i) {
            pieces.push(gap.view());
        }
    }
    let stitched = concatenate(Axis(1), &pieces)
        .map_err(|e| ReductionError::ShapeMismatch(e.to_string()))?;
    let data = stitched.slice(s![.., ..;-1]).to_owned();

    info!(
        detectors = ccds.len(),
        rows = data.nrows(),
        cols = data.ncols(),
        "Spectrum mosaic assembled"
    );
    let (detectors, headers) = ccds.into_iter().map(|c| (c.detector, c.header)).unzip();
    Ok(SpectrumMosaic {
        data,
        detectors,
        headers,
    })
}

/// Calibrate each requested detector independently. No mirroring or gaps.
pub fn assemble_images<S: MasterStore>(
    calibrator: &CcdCalibrator<'_, S>,
    source: &ExposureSource<'_>,
    detectors: &[DetectorId],
) -> Result<ImageSet> {
    assemble_images_with_progress(calibrator, source, detectors, |_| {})
}

/// [`assemble_images`] calling `on_progress(detectors_done)` as each
/// detector is calibrated.
pub fn assemble_images_with_progress<S: MasterStore>(
    calibrator: &CcdCalibrator<'_, S>,
    source: &ExposureSource<'_>,
    detectors: &[DetectorId],
    on_progress: impl Fn(usize) + Send + Sync,
) -> Result<ImageSet> {
    if detectors.is_empty() {
        return Err(ReductionError::InvalidConfiguration(
            "no detectors selected for imaging".into(),
        ));
    }
    let ccds = calibrate_all(calibrator, source, detectors, &on_progress)?;
    info!(detectors = ccds.len(), "Imaging detectors calibrated");
    Ok(ccds.into_iter().map(|c| (c.detector, c)).collect())
}

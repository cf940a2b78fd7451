//! Science-frame calibration and mosaic assembly.

pub mod calibrate;
pub mod mosaic;

pub use calibrate::{science_flat_identity, CalibratedCcd, CcdCalibrator, CropGeometry, CropRegion};
pub use mosaic::{
    assemble_images, assemble_images_with_progress, assemble_spectrum,
    assemble_spectrum_with_progress, raw_exposure_path, DetectorLayout, ExposureSource, ImageSet,
    SpectrumMosaic,
};

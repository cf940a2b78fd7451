//! Post-processing of assembled spectra.

pub mod binning;
pub mod sky;

pub use binning::bin_spectral;
pub use sky::{sky_band_rows, subtract_sky_background};

/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Unbinned sensor height (rows) of one detector.
pub const SENSOR_ROWS: usize = 4096;

/// Unbinned sensor width (columns) of one detector.
pub const SENSOR_COLS: usize = 2048;

/// Unbinned rows skipped at the bottom of the sensor in spectroscopy mode.
/// Only the slit region above this row carries the spectrum.
pub const DEFAULT_SPECTRUM_BOTTOM_MARGIN: usize = 3600;

/// Unbinned rows skipped at the top of the sensor in spectroscopy mode.
pub const DEFAULT_SPECTRUM_TOP_MARGIN: usize = 100;

/// Nominal physical gap between adjacent detectors, in unbinned pixels.
pub const DEFAULT_GAP_PIXELS: usize = 57;

/// Detector order along the dispersion axis.
pub const DEFAULT_SPECTRUM_DETECTORS: [u8; 4] = [6, 5, 8, 7];

/// Canonical detector order for imaging reductions.
pub const DEFAULT_IMAGING_DETECTORS: [u8; 8] = [1, 2, 3, 4, 5, 6, 7, 8];

/// Percentile of positive bias-subtracted pixels used as a flat's brightness.
pub const DEFAULT_FLAT_PERCENTILE: f32 = 90.0;

/// Lowest acceptable flat brightness (counts).
pub const DEFAULT_FLAT_MIN_LEVEL: f32 = 1_000.0;

/// Highest acceptable flat brightness (counts), below saturation.
pub const DEFAULT_FLAT_MAX_LEVEL: f32 = 50_000.0;

/// Master flat pixels below this value are replaced before normalization.
pub const DEFAULT_FLAT_FLOOR: f32 = 1e-4;

/// Default number of adjacent spectral columns summed per output column.
pub const DEFAULT_SPECTRAL_BINNING: usize = 2;

/// Slit masks whose name contains this marker are long-slit masks.
pub const DEFAULT_LONG_SLIT_MARKER: &str = "ls";

/// Slit "mask" name used when the instrument is in direct imaging.
pub const DEFAULT_IMAGING_MARKER: &str = "imaging";

/// Raw exposure file prefix: `<prefix><dataset:04>c<N>.fits`.
pub const DEFAULT_EXPOSURE_PREFIX: &str = "iff";

/// Softening parameter of the preview asinh stretch.
pub const PREVIEW_ASINH_SOFTENING: f32 = 0.05;

/// Fraction of pixel values kept inside the preview display interval.
pub const PREVIEW_INTERVAL_PERCENT: f32 = 99.9;

/// Readout mode recorded when a file has no `SPEED` keyword.
pub const UNSPECIFIED_READOUT: &str = "unspecified";

/// Product name when neither a save name nor a pointing is available.
pub const UNKNOWN_OBJECT_NAME: &str = "UNKNOWN";

// Header keywords written by the instrument.
pub const KEY_CHIP: &str = "CHIP";
pub const KEY_BINNING: &str = "BINNING";
pub const KEY_SPEED: &str = "SPEED";
pub const KEY_EXPTYPE: &str = "EXPTYPE";
pub const KEY_SLITMASK: &str = "SLITMASK";
pub const KEY_FILTER: &str = "FILTER";
pub const KEY_EXPTIME: &str = "EXPTIME";
pub const KEY_OBJECT: &str = "OBJECT";
pub const KEY_RA: &str = "RA";
pub const KEY_DEC: &str = "DEC";

// Header keywords written by this crate.
pub const KEY_PRODUCT: &str = "PRODUCT";
pub const KEY_MASTER_KIND: &str = "IMRKIND";
pub const KEY_COMBINE: &str = "COMBINE";
pub const KEY_NCOMBINE: &str = "NCOMBINE";

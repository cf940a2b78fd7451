use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::consts::{KEY_BINNING, KEY_SPEED, UNSPECIFIED_READOUT};
use crate::error::{ReductionError, Result};
use crate::header::Header;

/// A single 2D frame with the header it was read with.
/// Pixel values are f32 counts (ADU), shape = (rows, cols).
#[derive(Clone, Debug)]
pub struct Frame {
    pub data: Array2<f32>,
    pub header: Header,
}

impl Frame {
    pub fn new(data: Array2<f32>, header: Header) -> Self {
        Self { data, header }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    /// Binning declared in the header, 1x1 when absent.
    pub fn binning(&self) -> Result<Binning> {
        match self.header.get_string(KEY_BINNING) {
            Some(s) if !s.is_empty() => s.parse(),
            _ => Ok(Binning::default()),
        }
    }

    pub fn readout(&self) -> ReadoutMode {
        ReadoutMode::new(self.header.get_string(KEY_SPEED).as_deref().unwrap_or(""))
    }
}

/// One chip of the mosaic camera. Displays as `c<N>`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DetectorId(pub u8);

impl fmt::Display for DetectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

impl FromStr for DetectorId {
    type Err = ReductionError;

    /// Accepts `6` or `c6`.
    fn from_str(s: &str) -> Result<Self> {
        let digits = s.trim().trim_start_matches(['c', 'C']);
        match digits.parse::<u8>() {
            Ok(n) if n > 0 => Ok(Self(n)),
            _ => Err(ReductionError::InvalidConfiguration(format!(
                "invalid detector id '{s}'"
            ))),
        }
    }
}

/// On-chip binning factors along columns (x) and rows (y).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Binning {
    pub x: u32,
    pub y: u32,
}

impl Binning {
    pub fn new(x: u32, y: u32) -> Result<Self> {
        if x == 0 || y == 0 {
            return Err(ReductionError::InvalidConfiguration(format!(
                "binning factors must be positive, got {x}x{y}"
            )));
        }
        Ok(Self { x, y })
    }
}

impl Default for Binning {
    fn default() -> Self {
        Self { x: 1, y: 1 }
    }
}

impl fmt::Display for Binning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.x, self.y)
    }
}

impl FromStr for Binning {
    type Err = ReductionError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ReductionError::InvalidConfiguration(format!("invalid binning '{s}'"));
        let lower = s.trim().to_ascii_lowercase();
        let (bx, by) = lower.split_once('x').ok_or_else(invalid)?;
        let x = bx.trim().parse::<u32>().map_err(|_| invalid())?;
        let y = by.trim().parse::<u32>().map_err(|_| invalid())?;
        Binning::new(x, y)
    }
}

impl TryFrom<String> for Binning {
    type Error = ReductionError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Binning> for String {
    fn from(b: Binning) -> Self {
        b.to_string()
    }
}

/// Readout speed of the controller, lower-cased (`slow`, `fast`, ...).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReadoutMode(String);

impl ReadoutMode {
    pub fn new(mode: &str) -> Self {
        let mode = mode.trim().to_lowercase();
        if mode.is_empty() {
            Self(UNSPECIFIED_READOUT.to_string())
        } else {
            Self(mode)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ReadoutMode {
    fn default() -> Self {
        Self::new("")
    }
}

impl fmt::Display for ReadoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of exposure a raw file holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameType {
    Bias,
    Flat,
    Science,
}

impl FrameType {
    /// Classify an `EXPTYPE` header value. Arcs, darks and other exposure
    /// types are not part of the reduction and yield `None`.
    pub fn from_exposure_type(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "bias" | "zero" => Some(Self::Bias),
            "flat" => Some(Self::Flat),
            "object" | "science" => Some(Self::Science),
            _ => None,
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bias => write!(f, "bias"),
            Self::Flat => write!(f, "flat"),
            Self::Science => write!(f, "science"),
        }
    }
}

/// Which kind of reduction is being run. Selects flat identity and
/// mosaic assembly; never inferred from the data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReductionMode {
    /// Long-slit spectroscopy: flats keyed by slit mask, stitched mosaic.
    #[default]
    Spectroscopy,
    /// Direct imaging: flats keyed by photometric filter, per-detector output.
    Imaging,
}

impl fmt::Display for ReductionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spectroscopy => write!(f, "Spectroscopy"),
            Self::Imaging => write!(f, "Imaging"),
        }
    }
}

/// What a flat field was exposed through.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FlatIdentity {
    SlitMask(String),
    PhotometricFilter(String),
}

impl FlatIdentity {
    pub fn slit_mask(name: &str) -> Self {
        Self::SlitMask(name.trim().to_lowercase())
    }

    pub fn photometric_filter(name: &str) -> Self {
        Self::PhotometricFilter(name.trim().to_lowercase())
    }

    /// Whether `record` was exposed through this slit mask or filter.
    pub fn matches(&self, record: &FrameRecord) -> bool {
        match self {
            Self::SlitMask(_) => *self == Self::slit_mask(&record.slit_mask),
            Self::PhotometricFilter(_) => *self == Self::photometric_filter(&record.filter),
        }
    }
}

impl fmt::Display for FlatIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SlitMask(s) => write!(f, "slit-{s}"),
            Self::PhotometricFilter(s) => write!(f, "filter-{s}"),
        }
    }
}

/// Telescope pointing as written by the instrument (sexagesimal text).
#[derive(Clone, Debug, PartialEq)]
pub struct SkyPosition {
    pub ra: String,
    pub dec: String,
}

/// Catalog entry for one raw file. Never modified after cataloging.
#[derive(Clone, Debug)]
pub struct FrameRecord {
    pub path: PathBuf,
    pub object: String,
    pub detector: DetectorId,
    pub binning: Binning,
    pub readout: ReadoutMode,
    pub frame_type: FrameType,
    /// Lower-cased `SLITMASK`, empty when absent.
    pub slit_mask: String,
    /// Lower-cased `FILTER`, empty when absent.
    pub filter: String,
    pub exposure_time: f64,
    pub sky_position: Option<SkyPosition>,
}

impl FrameRecord {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

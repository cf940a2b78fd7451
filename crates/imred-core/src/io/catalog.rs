use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::consts::{
    KEY_BINNING, KEY_CHIP, KEY_DEC, KEY_EXPTIME, KEY_EXPTYPE, KEY_FILTER, KEY_OBJECT,
    KEY_PRODUCT, KEY_RA, KEY_SLITMASK, KEY_SPEED,
};
use crate::error::{ReductionError, Result};
use crate::frame::{Binning, DetectorId, FrameRecord, FrameType, ReadoutMode, SkyPosition};
use crate::header::Header;
use crate::io::fits::read_header;

/// Classified raw frames of one observing directory.
#[derive(Clone, Debug, Default)]
pub struct FrameCatalog {
    pub directory: PathBuf,
    records: Vec<FrameRecord>,
    /// Files that look like raw frames but carry malformed metadata.
    pub rejected: Vec<(PathBuf, String)>,
}

impl FrameCatalog {
    /// Scan `directory` for FITS files and classify each by its header.
    ///
    /// IRAF mosaics (`*_mos*`), files without `OBJECT`, exposure types other
    /// than bias/flat/science, and products written by this crate are
    /// skipped. Files with malformed metadata are listed in `rejected`.
    pub fn scan(directory: &Path) -> Result<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(directory)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_fits_path(p))
            .filter(|p| {
                !p.file_name()
                    .is_some_and(|n| n.to_string_lossy().contains("_mos"))
            })
            .collect();
        paths.sort();

        let mut records = Vec::new();
        let mut rejected = Vec::new();
        for path in paths {
            let header = match read_header(&path) {
                Ok(h) => h,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Unreadable FITS file skipped");
                    rejected.push((path, e.to_string()));
                    continue;
                }
            };
            match record_from_header(&path, &header) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => debug!(file = %path.display(), "Not a reducible raw frame"),
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Malformed raw frame metadata");
                    rejected.push((path, e.to_string()));
                }
            }
        }

        info!(
            directory = %directory.display(),
            frames = records.len(),
            rejected = rejected.len(),
            "Catalog built"
        );
        Ok(Self {
            directory: directory.to_path_buf(),
            records,
            rejected,
        })
    }

    pub fn from_records(directory: &Path, records: Vec<FrameRecord>) -> Self {
        Self {
            directory: directory.to_path_buf(),
            records,
            rejected: Vec::new(),
        }
    }

    pub fn records(&self) -> &[FrameRecord] {
        &self.records
    }

    pub fn of_type(&self, frame_type: FrameType) -> impl Iterator<Item = &FrameRecord> {
        self.records
            .iter()
            .filter(move |r| r.frame_type == frame_type)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn is_fits_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "fits" | "fit" | "fts"))
}

/// Build a catalog record from a raw header. `Ok(None)` for frames that
/// take no part in the reduction.
pub fn record_from_header(path: &Path, header: &Header) -> Result<Option<FrameRecord>> {
    if header.contains(KEY_PRODUCT) {
        return Ok(None);
    }
    let object = match header.get_string(KEY_OBJECT) {
        Some(o) if !o.is_empty() => o.to_lowercase(),
        _ => return Ok(None),
    };
    let frame_type = match header
        .get_string(KEY_EXPTYPE)
        .as_deref()
        .and_then(FrameType::from_exposure_type)
    {
        Some(t) => t,
        None => return Ok(None),
    };

    let detector = header
        .get_string(KEY_CHIP)
        .ok_or_else(|| ReductionError::InvalidConfiguration("missing CHIP keyword".into()))?
        .parse::<DetectorId>()?;
    let binning = match header.get_string(KEY_BINNING) {
        Some(b) if !b.is_empty() => b.parse::<Binning>()?,
        _ => Binning::default(),
    };
    let readout = ReadoutMode::new(header.get_string(KEY_SPEED).as_deref().unwrap_or(""));
    let lowered = |key: &str| header.get_string(key).unwrap_or_default().to_lowercase();

    let sky_position = match (frame_type, header.get_string(KEY_RA), header.get_string(KEY_DEC)) {
        (FrameType::Science, Some(ra), Some(dec)) if !ra.is_empty() && !dec.is_empty() => {
            Some(SkyPosition { ra, dec })
        }
        _ => None,
    };

    Ok(Some(FrameRecord {
        path: path.to_path_buf(),
        object,
        detector,
        binning,
        readout,
        frame_type,
        slit_mask: lowered(KEY_SLITMASK),
        filter: lowered(KEY_FILTER),
        exposure_time: header.get_float(KEY_EXPTIME).unwrap_or(0.0),
        sky_position,
    }))
}

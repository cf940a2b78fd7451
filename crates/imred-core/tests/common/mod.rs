use std::path::{Path, PathBuf};

use ndarray::Array2;

use imred_core::calib::{
    build_bias_library, build_flat_library, BiasPolicy, FlatPolicy, FlatSelection,
    MasterLibrary, MemoryStore,
};
use imred_core::frame::ReductionMode;
use imred_core::io::catalog::FrameCatalog;
use imred_core::reduce::CropGeometry;

/// Size of one FITS logical record in bytes.
pub const FITS_BLOCK_SIZE: usize = 2880;

/// Sensor geometry used by the synthetic frames: 16 rows x 8 columns,
/// rows 4..14 valid.
pub fn small_geometry() -> CropGeometry {
    CropGeometry {
        sensor_rows: 16,
        sensor_cols: 8,
        bottom_margin: 4,
        top_margin: 2,
    }
}

pub const ROWS: usize = 16;
pub const COLS: usize = 8;

/// Quote a string header value the way instruments write it.
pub fn text(s: &str) -> String {
    format!("'{s:<8}'")
}

/// One 80-character header card. `COMMENT`, `HISTORY` and `CONTINUE`
/// records carry their text without a value indicator.
pub fn card(keyword: &str, value: &str) -> String {
    match keyword {
        "COMMENT" | "HISTORY" => format!("{:<80}", format!("{keyword:<8}{value}")),
        "CONTINUE" => format!("{:<80}", format!("{keyword:<8}  {value}")),
        _ => format!("{:<80}", format!("{keyword:<8}= {value:>20}")),
    }
}

/// Build a 16-bit unsigned FITS file (BITPIX 16, BZERO 32768) from
/// physical pixel values. `cards` are `(keyword, literal value)` pairs.
pub fn build_raw_fits(data: &Array2<f32>, cards: &[(String, String)]) -> Vec<u8> {
    let (rows, cols) = data.dim();
    let mut header = String::new();
    header.push_str(&card("SIMPLE", "T"));
    header.push_str(&card("BITPIX", "16"));
    header.push_str(&card("NAXIS", "2"));
    header.push_str(&card("NAXIS1", &cols.to_string()));
    header.push_str(&card("NAXIS2", &rows.to_string()));
    header.push_str(&card("BZERO", "32768"));
    header.push_str(&card("BSCALE", "1"));
    for (k, v) in cards {
        header.push_str(&card(k, v));
    }
    header.push_str(&format!("{:<80}", "END"));

    let mut buf = header.into_bytes();
    pad(&mut buf, b' ');
    for &v in data.iter() {
        let stored = (v.round() as i32 - 32768) as i16;
        buf.extend_from_slice(&stored.to_be_bytes());
    }
    pad(&mut buf, 0);
    buf
}

fn pad(buf: &mut Vec<u8>, fill: u8) {
    let rem = buf.len() % FITS_BLOCK_SIZE;
    if rem != 0 {
        buf.resize(buf.len() + FITS_BLOCK_SIZE - rem, fill);
    }
}

/// Header description of a synthetic raw exposure.
#[derive(Clone, Debug)]
pub struct RawHeader {
    pub chip: u8,
    pub exptype: &'static str,
    pub object: &'static str,
    pub binning: &'static str,
    pub speed: &'static str,
    pub slitmask: &'static str,
    pub filter: &'static str,
    pub pointing: Option<(&'static str, &'static str)>,
}

impl RawHeader {
    pub fn bias(chip: u8) -> Self {
        Self {
            chip,
            exptype: "Bias",
            object: "bias",
            binning: "1x1",
            speed: "Slow",
            slitmask: "",
            filter: "",
            pointing: None,
        }
    }

    pub fn flat(chip: u8, slitmask: &'static str, filter: &'static str) -> Self {
        Self {
            exptype: "Flat",
            object: "flat",
            slitmask,
            filter,
            ..Self::bias(chip)
        }
    }

    pub fn science(chip: u8, slitmask: &'static str, filter: &'static str) -> Self {
        Self {
            exptype: "Object",
            object: "NGC 1234",
            slitmask,
            filter,
            pointing: Some(("12:34:56.7", "-45:12:33")),
            ..Self::bias(chip)
        }
    }

    pub fn cards(&self) -> Vec<(String, String)> {
        let mut cards = vec![
            ("OBJECT".to_string(), text(self.object)),
            ("EXPTYPE".to_string(), text(self.exptype)),
            ("CHIP".to_string(), self.chip.to_string()),
            ("BINNING".to_string(), text(self.binning)),
            ("SPEED".to_string(), text(self.speed)),
            ("EXPTIME".to_string(), "10.0".to_string()),
        ];
        if !self.slitmask.is_empty() {
            cards.push(("SLITMASK".to_string(), text(self.slitmask)));
        }
        if !self.filter.is_empty() {
            cards.push(("FILTER".to_string(), text(self.filter)));
        }
        if let Some((ra, dec)) = self.pointing {
            cards.push(("RA".to_string(), text(ra)));
            cards.push(("DEC".to_string(), text(dec)));
        }
        cards
    }
}

pub fn write_raw(path: &Path, data: &Array2<f32>, fields: &RawHeader) -> PathBuf {
    std::fs::write(path, build_raw_fits(data, &fields.cards())).expect("write raw FITS");
    path.to_path_buf()
}

pub fn constant(value: f32) -> Array2<f32> {
    Array2::from_elem((ROWS, COLS), value)
}

/// Write a complete calibration set and one science exposure per
/// detector into `dir`: three biases at 100, three long-slit flats at
/// 10100 and science frames `100 + detector * 1000 + col`.
pub fn write_spectroscopic_night(dir: &Path, detectors: &[u8], dataset: u32) {
    for &chip in detectors {
        for i in 0..3 {
            write_raw(
                &dir.join(format!("bias_{i}c{chip}.fits")),
                &constant(100.0),
                &RawHeader::bias(chip),
            );
            write_raw(
                &dir.join(format!("flat_{i}c{chip}.fits")),
                &constant(10_100.0),
                &RawHeader::flat(chip, "LS1", "Spectroscopic"),
            );
        }
        let science = Array2::from_shape_fn((ROWS, COLS), |(_, c)| {
            100.0 + chip as f32 * 1000.0 + c as f32
        });
        write_raw(
            &dir.join(format!("iff{dataset:04}c{chip}.fits")),
            &science,
            &RawHeader::science(chip, "LS1", "Spectroscopic"),
        );
    }
}

/// Imaging counterpart of [`write_spectroscopic_night`]: flats through the
/// `r` filter with the imaging slit, science frames at 200.
pub fn write_imaging_night(dir: &Path, detectors: &[u8], dataset: u32) {
    for &chip in detectors {
        for i in 0..3 {
            write_raw(
                &dir.join(format!("bias_{i}c{chip}.fits")),
                &constant(100.0),
                &RawHeader::bias(chip),
            );
            write_raw(
                &dir.join(format!("flat_{i}c{chip}.fits")),
                &constant(5_100.0),
                &RawHeader::flat(chip, "Imaging", "r"),
            );
        }
        write_raw(
            &dir.join(format!("iff{dataset:04}c{chip}.fits")),
            &constant(200.0),
            &RawHeader::science(chip, "Imaging", "r"),
        );
    }
}

/// Catalog `dir` and build every master bias and flat of `mode` into an
/// in-memory library.
pub fn calibrated_library(dir: &Path, mode: ReductionMode) -> MasterLibrary<MemoryStore> {
    let catalog = FrameCatalog::scan(dir).expect("scan");
    let library = MasterLibrary::new(MemoryStore::new(), false);
    let mut report = build_bias_library(&catalog, &library, &BiasPolicy::default());
    report.merge(build_flat_library(
        &catalog,
        mode,
        &FlatSelection::default(),
        &library,
        &FlatPolicy::default(),
    ));
    assert!(report.skipped.is_empty(), "calibration failures: {:?}", report.skipped);
    library
}

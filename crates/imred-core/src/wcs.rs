//! World coordinate solutions and product naming.

use ndarray::Array2;

use crate::consts::{KEY_DEC, KEY_RA};
use crate::error::{ReductionError, Result};
use crate::frame::SkyPosition;
use crate::header::Header;

/// Approximate linear dispersion: wavelength along columns, pixel index
/// along rows.
///
/// Only as good as the supplied endpoints; a fitted solution should
/// provide them.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearWavelengthSolution {
    pub crpix: [f64; 2],
    pub crval: [f64; 2],
    pub cdelt: [f64; 2],
}

impl LinearWavelengthSolution {
    /// Solution for an array of `(rows, cols)` whose first column is at
    /// `lambda_start` and last column at `lambda_end`.
    pub fn new(shape: (usize, usize), lambda_start: f64, lambda_end: f64) -> Result<Self> {
        let (rows, cols) = shape;
        if cols < 2 {
            return Err(ReductionError::InvalidConfiguration(format!(
                "wavelength solution needs at least 2 columns, got {cols}"
            )));
        }
        if !lambda_start.is_finite() || !lambda_end.is_finite() || lambda_start == lambda_end {
            return Err(ReductionError::InvalidConfiguration(format!(
                "invalid wavelength range {lambda_start}..{lambda_end}"
            )));
        }
        let center_row = rows as f64 / 2.0;
        Ok(Self {
            crpix: [cols as f64 / 2.0, center_row],
            crval: [(lambda_start + lambda_end) / 2.0, center_row],
            cdelt: [(lambda_end - lambda_start) / (cols - 1) as f64, 1.0],
        })
    }

    /// Wavelength at a 1-based FITS pixel coordinate along the spectral axis.
    pub fn wavelength_at(&self, pixel: f64) -> f64 {
        self.crval[0] + (pixel - self.crpix[0]) * self.cdelt[0]
    }

    pub fn write_cards(&self, header: &mut Header) {
        header.set_with_comment("WCSAXES", 2i64, Some("number of WCS axes"));
        for axis in 0..2 {
            let n = axis + 1;
            header.set(&format!("CRPIX{n}"), self.crpix[axis]);
            header.set(&format!("CDELT{n}"), self.cdelt[axis]);
            header.set(&format!("CRVAL{n}"), self.crval[axis]);
        }
        header.set_with_comment("CTYPE1", "LINEAR", Some("wavelength, linear"));
        header.set("CTYPE2", "PIXEL");
    }
}

/// Right ascension and declination in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SkyCoordinate {
    pub ra_deg: f64,
    pub dec_deg: f64,
}

impl SkyPosition {
    /// Parse the sexagesimal RA (hours) and Dec (degrees) header strings.
    pub fn to_degrees(&self) -> Result<SkyCoordinate> {
        let ra_hours = parse_sexagesimal(&self.ra)?;
        let dec_deg = parse_sexagesimal(&self.dec)?;
        if !(0.0..24.0).contains(&ra_hours) || !(-90.0..=90.0).contains(&dec_deg) {
            return Err(ReductionError::InvalidConfiguration(format!(
                "pointing {} {} out of range",
                self.ra, self.dec
            )));
        }
        Ok(SkyCoordinate {
            ra_deg: ra_hours * 15.0,
            dec_deg,
        })
    }
}

/// `"dd:mm:ss.s"` (or space separated) to decimal units. A leading `-`
/// applies to the whole value, including `-00:30:00`.
pub fn parse_sexagesimal(text: &str) -> Result<f64> {
    let invalid = || ReductionError::InvalidConfiguration(format!("invalid sexagesimal '{text}'"));
    let trimmed = text.trim();
    let negative = trimmed.starts_with('-');
    let body = trimmed.trim_start_matches(['+', '-']);

    let fields: Vec<f64> = body
        .split([':', ' '])
        .filter(|f| !f.is_empty())
        .map(|f| f.parse::<f64>().map_err(|_| invalid()))
        .collect::<Result<_>>()?;
    if fields.is_empty() || fields.len() > 3 || fields.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(invalid());
    }

    let value = fields
        .iter()
        .zip([1.0, 60.0, 3600.0])
        .map(|(v, scale)| v / scale)
        .sum::<f64>();
    Ok(if negative { -value } else { value })
}

/// Celestial TAN-projection solution with a CD matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct CelestialSolution {
    /// Reference pixel (1-based, x then y).
    pub crpix: [f64; 2],
    pub crval: SkyCoordinate,
    /// Degrees per pixel, `cd[i][j]` = CDi_j.
    pub cd: [[f64; 2]; 2],
}

impl CelestialSolution {
    pub fn write_cards(&self, header: &mut Header) {
        header.set_with_comment("WCSAXES", 2i64, Some("number of WCS axes"));
        header.set("CTYPE1", "RA---TAN");
        header.set("CTYPE2", "DEC--TAN");
        header.set("CUNIT1", "deg");
        header.set("CUNIT2", "deg");
        header.set("CRPIX1", self.crpix[0]);
        header.set("CRPIX2", self.crpix[1]);
        header.set("CRVAL1", self.crval.ra_deg);
        header.set("CRVAL2", self.crval.dec_deg);
        for (i, row) in self.cd.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                header.set(&format!("CD{}_{}", i + 1, j + 1), *value);
            }
        }
    }
}

/// External astrometric solver for calibrated images.
pub trait PlateSolver: Send + Sync {
    /// Solve `image`, optionally seeded with the telescope pointing.
    fn solve(&self, image: &Array2<f32>, approx: Option<SkyCoordinate>)
        -> Result<CelestialSolution>;
}

/// IAU-style designation from the header pointing, e.g. `J1234-4512`.
///
/// Uses the first two sexagesimal fields of `RA` and `DEC`.
pub fn object_designation(header: &Header) -> Option<String> {
    let leading = |keyword: &str| -> Option<String> {
        let value = header.get_string(keyword)?;
        let fields: Vec<&str> = value.trim().split(':').collect();
        if fields.len() < 2 || fields[..2].iter().any(|f| f.trim().is_empty()) {
            return None;
        }
        Some(fields[..2].iter().map(|f| f.trim()).collect())
    };
    Some(format!("J{}{}", leading(KEY_RA)?, leading(KEY_DEC)?))
}

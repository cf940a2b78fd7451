use std::path::{Path, PathBuf};

use ndarray::Array2;
use tracing::info;

use crate::consts::{KEY_PRODUCT, UNKNOWN_OBJECT_NAME};
use crate::error::Result;
use crate::frame::DetectorId;
use crate::header::Header;
use crate::io::fits_writer::write_fits;
use crate::wcs::object_designation;

/// Kind of reduced product, recorded in the `PRODUCT` keyword.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProductKind {
    Spectrum,
    Image,
}

impl ProductKind {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Spectrum => "SPECTRUM",
            Self::Image => "IMAGE",
        }
    }
}

/// Product base name: the user's save name, else the designation derived
/// from the pointing in `header`, else `UNKNOWN`.
pub fn product_name(save_name: Option<&str>, header: Option<&Header>) -> String {
    if let Some(name) = save_name.map(str::trim).filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    header
        .and_then(object_designation)
        .unwrap_or_else(|| UNKNOWN_OBJECT_NAME.to_string())
}

pub fn spectrum_product_path(dir: &Path, name: &str, dataset: u32) -> PathBuf {
    dir.join(format!("{name}_reduced_spectrum_{dataset:04}.fits"))
}

pub fn spectrum_preview_path(dir: &Path, name: &str, dataset: u32) -> PathBuf {
    dir.join(format!("{name}_reduced_spectrum_{dataset:04}.png"))
}

pub fn image_product_path(
    dir: &Path,
    name: &str,
    detector: DetectorId,
    prefix: &str,
    dataset: u32,
) -> PathBuf {
    dir.join(format!("{name}_{detector}_{prefix}{dataset:04}.fits"))
}

/// Header for a product: descriptive records of `base`, commentary
/// included, plus `PRODUCT`.
pub fn product_header(base: &Header, kind: ProductKind) -> Header {
    let mut header = Header::new();
    for record in base.descriptive_records() {
        header.push_record(record.clone());
    }
    header.set_with_comment(KEY_PRODUCT, kind.tag(), Some("reduced product"));
    header
}

/// Write a product FITS file, creating the output directory if needed.
pub fn write_product(path: &Path, data: &Array2<f32>, header: &Header) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    write_fits(path, data, header)?;
    info!(
        path = %path.display(),
        rows = data.nrows(),
        cols = data.ncols(),
        "Product written"
    );
    Ok(())
}

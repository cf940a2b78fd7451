use std::ffi::c_int;
use std::path::Path;
use std::ptr;

use fitsio::errors::check_status as fits_check_status;
use fitsio::images::{ImageDescription, ImageType};
use fitsio::FitsFile;
use ndarray::Array2;

use crate::error::Result;
use crate::header::{Commentary, Header, HeaderRecord, HeaderValue};
use crate::io::fits::{c_string, fits_error};

/// Significant digits written for real values; 17 round-trips any f64.
const REAL_DIGITS: c_int = 17;

/// Write a 2D array as a single-HDU FITS file with 32-bit float pixels.
///
/// Descriptive records of `header`, commentary included, are copied after
/// the layout keywords, which are regenerated from `data`. An existing file
/// at `path` is replaced.
pub fn write_fits(path: &Path, data: &Array2<f32>, header: &Header) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let dimensions = [data.nrows(), data.ncols()];
    let description = ImageDescription {
        data_type: ImageType::Float,
        dimensions: &dimensions,
    };
    let mut fptr = FitsFile::create(path)
        .with_custom_primary(&description)
        .open()
        .map_err(|e| fits_error(path, e))?;
    let hdu = fptr.primary_hdu().map_err(|e| fits_error(path, e))?;

    if has_long_string(header) {
        let mut status = 0;
        unsafe {
            // ffplsw = fits_write_key_longwarn
            fitsio_sys::ffplsw(fptr.as_raw(), &mut status);
        }
        fits_check_status(status).map_err(|e| fits_error(path, e))?;
    }
    for record in header.descriptive_records() {
        write_record(path, &mut fptr, record)?;
    }

    let pixels: Vec<f32> = data.iter().copied().collect();
    hdu.write_image(&mut fptr, &pixels)
        .map_err(|e| fits_error(path, e))?;
    Ok(())
}

/// Longest string value that fits a single card without `CONTINUE`.
const MAX_CARD_STRING: usize = 68;

fn has_long_string(header: &Header) -> bool {
    header.descriptive_records().any(|r| {
        matches!(
            r,
            HeaderRecord::Keyword { value: HeaderValue::Text(s), .. } if s.len() > MAX_CARD_STRING
        )
    })
}

fn write_record(path: &Path, fptr: &mut FitsFile, record: &HeaderRecord) -> Result<()> {
    let mut status = 0;
    match record {
        HeaderRecord::Commentary { kind, text } => {
            let text = c_string(path, text)?;
            unsafe {
                match kind {
                    // ffpcom = fits_write_comment
                    Commentary::Comment => {
                        fitsio_sys::ffpcom(fptr.as_raw(), text.as_ptr(), &mut status)
                    }
                    // ffphis = fits_write_history
                    Commentary::History => {
                        fitsio_sys::ffphis(fptr.as_raw(), text.as_ptr(), &mut status)
                    }
                };
            }
        }
        HeaderRecord::Keyword {
            keyword,
            value,
            comment,
        } => {
            let key = c_string(path, keyword)?;
            let comment = comment.as_deref().map(|c| c_string(path, c)).transpose()?;
            let comment_ptr = comment.as_ref().map_or(ptr::null(), |c| c.as_ptr());
            match value {
                HeaderValue::Text(s) => {
                    let s = c_string(path, s)?;
                    unsafe {
                        // ffpkls = fits_write_key_longstr
                        fitsio_sys::ffpkls(
                            fptr.as_raw(),
                            key.as_ptr(),
                            s.as_ptr(),
                            comment_ptr,
                            &mut status,
                        );
                    }
                }
                HeaderValue::Integer(i) => unsafe {
                    // ffpkyj = fits_write_key_lng
                    fitsio_sys::ffpkyj(fptr.as_raw(), key.as_ptr(), *i, comment_ptr, &mut status);
                },
                HeaderValue::Float(v) => unsafe {
                    // ffpkyd = fits_write_key_dbl; negative digits select %G
                    fitsio_sys::ffpkyd(
                        fptr.as_raw(),
                        key.as_ptr(),
                        *v,
                        -REAL_DIGITS,
                        comment_ptr,
                        &mut status,
                    );
                },
                HeaderValue::Logical(b) => unsafe {
                    // ffpkyl = fits_write_key_log
                    fitsio_sys::ffpkyl(
                        fptr.as_raw(),
                        key.as_ptr(),
                        c_int::from(*b),
                        comment_ptr,
                        &mut status,
                    );
                },
            }
        }
    }
    fits_check_status(status).map_err(|e| fits_error(path, e))
}

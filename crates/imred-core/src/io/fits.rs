//! Reading the primary image HDU of FITS files through cfitsio.

use std::ffi::{c_char, c_int, CStr, CString};
use std::path::Path;
use std::ptr;

use fitsio::errors::check_status as fits_check_status;
use fitsio::hdu::{FitsHdu, HduInfo};
use fitsio::FitsFile;
use ndarray::Array2;

use crate::error::{ReductionError, Result};
use crate::frame::Frame;
use crate::header::{Commentary, Header, HeaderRecord, HeaderValue};

/// Buffer length of one header card plus the terminator.
const FLEN_CARD: usize = 81;

/// cfitsio status for a keyword without a value.
const VALUE_UNDEFINED: c_int = 204;

pub(crate) fn fits_error(path: &Path, err: fitsio::errors::Error) -> ReductionError {
    ReductionError::Fits {
        path: path.to_path_buf(),
        source: Box::new(err),
    }
}

pub(crate) fn c_string(path: &Path, text: &str) -> Result<CString> {
    CString::new(text).map_err(|_| {
        ReductionError::InvalidFits(format!(
            "{}: header text contains a NUL byte: {text:?}",
            path.display()
        ))
    })
}

/// Read the primary image and header of a FITS file. Pixels are returned as
/// physical values, with `BZERO`/`BSCALE` applied.
pub fn read_frame(path: &Path) -> Result<Frame> {
    let (mut fptr, hdu) = open_primary(path)?;
    let (rows, cols) = image_shape(path, &hdu)?;
    let header = read_records(path, &mut fptr, &hdu)?;
    let pixels: Vec<f32> = hdu
        .read_image(&mut fptr)
        .map_err(|e| fits_error(path, e))?;
    let data = Array2::from_shape_vec((rows, cols), pixels).map_err(|e| {
        ReductionError::InvalidFits(format!("{}: image shape: {e}", path.display()))
    })?;
    Ok(Frame::new(data, header))
}

/// Read only the primary header of a 2D FITS image.
pub fn read_header(path: &Path) -> Result<Header> {
    let (mut fptr, hdu) = open_primary(path)?;
    image_shape(path, &hdu)?;
    read_records(path, &mut fptr, &hdu)
}

fn open_primary(path: &Path) -> Result<(FitsFile, FitsHdu)> {
    let mut fptr = FitsFile::open(path).map_err(|e| fits_error(path, e))?;
    let hdu = fptr.primary_hdu().map_err(|e| fits_error(path, e))?;
    Ok((fptr, hdu))
}

fn image_shape(path: &Path, hdu: &FitsHdu) -> Result<(usize, usize)> {
    let invalid = |msg: String| ReductionError::InvalidFits(format!("{}: {msg}", path.display()));
    match &hdu.info {
        // fitsio reports axes slowest first: [NAXIS2, NAXIS1].
        HduInfo::ImageInfo { shape, .. } => match shape.as_slice() {
            &[rows, cols] if rows > 0 && cols > 0 => Ok((rows, cols)),
            &[_, _] => Err(invalid("image has an empty axis".to_string())),
            other => Err(invalid(format!(
                "expected a 2D image, NAXIS = {}",
                other.len()
            ))),
        },
        _ => Err(invalid("primary HDU is not an image".to_string())),
    }
}

/// Every header record in file order. Long strings spread over `CONTINUE`
/// cards are joined; keywords without a value are skipped.
fn read_records(path: &Path, fptr: &mut FitsFile, hdu: &FitsHdu) -> Result<Header> {
    let mut count: c_int = 0;
    let mut more: c_int = 0;
    let mut status = 0;
    unsafe {
        // ffghsp = fits_get_hdrspace
        fitsio_sys::ffghsp(fptr.as_raw(), &mut count, &mut more, &mut status);
    }
    fits_check_status(status).map_err(|e| fits_error(path, e))?;

    let mut header = Header::new();
    for n in 1..=count {
        let (keyword, raw_value, comment) = read_keyn(path, fptr, n)?;
        if let Some(kind) = Commentary::from_keyword(&keyword) {
            header.push_record(HeaderRecord::Commentary {
                kind,
                text: comment,
            });
            continue;
        }
        if keyword.is_empty() || keyword == "CONTINUE" {
            continue;
        }
        if let Some(value) = typed_value(path, fptr, hdu, &keyword, &raw_value)? {
            header.push_record(HeaderRecord::Keyword {
                keyword,
                value,
                comment: Some(comment).filter(|c| !c.is_empty()),
            });
        }
    }
    Ok(header)
}

/// Keyword, unparsed value and comment of the `n`th record (1-based).
fn read_keyn(path: &Path, fptr: &mut FitsFile, n: c_int) -> Result<(String, String, String)> {
    let mut keyword = [0 as c_char; FLEN_CARD];
    let mut value = [0 as c_char; FLEN_CARD];
    let mut comment = [0 as c_char; FLEN_CARD];
    let mut status = 0;
    unsafe {
        // ffgkyn = fits_read_keyn
        fitsio_sys::ffgkyn(
            fptr.as_raw(),
            n,
            keyword.as_mut_ptr(),
            value.as_mut_ptr(),
            comment.as_mut_ptr(),
            &mut status,
        );
    }
    fits_check_status(status).map_err(|e| fits_error(path, e))?;
    Ok((
        buffer_text(&keyword),
        buffer_text(&value),
        buffer_text(&comment),
    ))
}

fn buffer_text(buffer: &[c_char; FLEN_CARD]) -> String {
    // cfitsio always terminates the buffers it fills.
    let text = unsafe { CStr::from_ptr(buffer.as_ptr()) };
    text.to_string_lossy().trim_end().to_string()
}

fn typed_value(
    path: &Path,
    fptr: &mut FitsFile,
    hdu: &FitsHdu,
    keyword: &str,
    raw_value: &str,
) -> Result<Option<HeaderValue>> {
    if raw_value.is_empty() {
        return Ok(None);
    }
    let raw = c_string(path, raw_value)?;
    let mut dtype: c_char = 0;
    let mut status = 0;
    unsafe {
        // ffdtyp = fits_get_keytype
        fitsio_sys::ffdtyp(raw.as_ptr(), &mut dtype, &mut status);
    }
    if status == VALUE_UNDEFINED {
        return Ok(None);
    }
    fits_check_status(status).map_err(|e| fits_error(path, e))?;

    let value = match dtype as u8 {
        b'C' => HeaderValue::Text(read_long_string(path, fptr, keyword)?),
        b'L' => HeaderValue::Logical(raw_value == "T"),
        b'I' => HeaderValue::Integer(
            hdu.read_key(fptr, keyword)
                .map_err(|e| fits_error(path, e))?,
        ),
        b'F' => HeaderValue::Float(
            hdu.read_key(fptr, keyword)
                .map_err(|e| fits_error(path, e))?,
        ),
        // Complex values are kept verbatim.
        _ => HeaderValue::Text(raw_value.to_string()),
    };
    Ok(Some(value))
}

/// String value of `keyword`, following the `CONTINUE` convention.
fn read_long_string(path: &Path, fptr: &mut FitsFile, keyword: &str) -> Result<String> {
    let key = c_string(path, keyword)?;
    let mut value_ptr: *mut c_char = ptr::null_mut();
    let mut status = 0;
    let value = unsafe {
        // ffgkls = fits_read_key_longstr
        fitsio_sys::ffgkls(
            fptr.as_raw(),
            key.as_ptr(),
            &mut value_ptr,
            ptr::null_mut(),
            &mut status,
        );
        if status == 0 && !value_ptr.is_null() {
            let value = CStr::from_ptr(value_ptr).to_string_lossy().into_owned();
            // fffree = fits_free_memory
            fitsio_sys::fffree(value_ptr.cast(), &mut 0);
            value
        } else {
            String::new()
        }
    };
    fits_check_status(status).map_err(|e| fits_error(path, e))?;
    Ok(value.trim_end().to_string())
}

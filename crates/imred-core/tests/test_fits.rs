#[allow(dead_code)]
mod common;

use ndarray::Array2;
use tempfile::TempDir;

use imred_core::error::ReductionError;
use imred_core::header::{Commentary, Header, HeaderValue};
use imred_core::io::fits::{read_frame, read_header};
use imred_core::io::fits_writer::write_fits;
use imred_core::io::products::{product_header, write_product, ProductKind};

use common::{build_raw_fits, text, RawHeader};

#[test]
fn test_read_unsigned_16bit_applies_bzero() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("raw.fits");
    let data = Array2::from_shape_fn((3, 5), |(r, c)| (r * 1000 + c) as f32 + 40_000.0);
    std::fs::write(&path, build_raw_fits(&data, &RawHeader::bias(2).cards())).unwrap();

    let frame = read_frame(&path).unwrap();
    assert_eq!(frame.data, data);
    assert_eq!(frame.header.get_int("BITPIX"), Some(16));
    assert_eq!(frame.header.get_string("EXPTYPE").as_deref(), Some("Bias"));
    assert_eq!(frame.header.get_int("CHIP"), Some(2));
}

#[test]
fn test_written_frame_reads_back() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("out.fits");
    let data = Array2::from_shape_fn((4, 7), |(r, c)| r as f32 * 0.5 - c as f32);

    let mut header = Header::new();
    header.set("OBJECT", "it's here");
    header.set("EXPTIME", 12.5);
    header.set("CDELT1", 1000.0 / 21.0);
    header.set("NCOMBINE", 3usize);
    header.set("FLIPPED", true);
    // Layout keywords of the input header are regenerated.
    header.set("BITPIX", 16i64);
    header.set("BZERO", 32768i64);
    write_fits(&path, &data, &header).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len() % common::FITS_BLOCK_SIZE, 0);

    let frame = read_frame(&path).unwrap();
    assert_eq!(frame.data, data);
    assert_eq!(frame.header.get_int("BITPIX"), Some(-32));
    assert!(!frame.header.contains("BZERO"));
    assert_eq!(
        frame.header.get("OBJECT"),
        Some(&HeaderValue::Text("it's here".into()))
    );
    assert_eq!(frame.header.get_float("EXPTIME"), Some(12.5));
    assert_eq!(frame.header.get_float("CDELT1"), Some(1000.0 / 21.0));
    assert_eq!(frame.header.get_int("NCOMBINE"), Some(3));
    assert_eq!(frame.header.get("FLIPPED"), Some(&HeaderValue::Logical(true)));
}

#[test]
fn test_rewriting_an_existing_file_replaces_it() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("out.fits");
    write_fits(&path, &Array2::from_elem((2, 2), 1.0), &Header::new()).unwrap();
    write_fits(&path, &Array2::from_elem((3, 5), 2.0), &Header::new()).unwrap();

    let frame = read_frame(&path).unwrap();
    assert_eq!(frame.data, Array2::from_elem((3, 5), 2.0));
}

#[test]
fn test_commentary_and_long_strings_survive_into_products() {
    let tmp = TempDir::new().unwrap();
    let raw_path = tmp.path().join("raw.fits");
    let observers = "Observers: A. Lovelace, G. Hopper, K. Johnson, M. Hamilton, D. Vaughan";
    let (head, tail) = observers.split_at(60);

    let mut cards = RawHeader::science(6, "LS1", "").cards();
    cards.push(("COMMENT".into(), "Telescope closed for wind at 02:10".into()));
    cards.push(("HISTORY".into(), "shutter test passed".into()));
    cards.push(("OBSERVER".into(), format!("'{head}&'")));
    cards.push(("CONTINUE".into(), format!("'{tail}'")));
    cards.push(("COMMENT".into(), "Reopened at 02:45".into()));
    std::fs::write(&raw_path, build_raw_fits(&Array2::zeros((2, 3)), &cards)).unwrap();

    let raw = read_header(&raw_path).unwrap();
    assert_eq!(raw.get_string("OBSERVER").as_deref(), Some(observers));
    assert!(!raw.contains("CONTINUE"));
    let comments: Vec<_> = raw.commentary(Commentary::Comment).collect();
    assert_eq!(
        comments,
        ["Telescope closed for wind at 02:10", "Reopened at 02:45"]
    );

    let product_path = tmp.path().join("product.fits");
    let header = product_header(&raw, ProductKind::Spectrum);
    write_product(&product_path, &Array2::zeros((2, 3)), &header).unwrap();

    let product = read_header(&product_path).unwrap();
    assert_eq!(product.get_string("OBSERVER").as_deref(), Some(observers));
    assert_eq!(product.get_string("PRODUCT").as_deref(), Some("SPECTRUM"));
    let comments: Vec<_> = product.commentary(Commentary::Comment).collect();
    assert!(comments.contains(&"Telescope closed for wind at 02:10"));
    assert!(comments.contains(&"Reopened at 02:45"));
    let history: Vec<_> = product.commentary(Commentary::History).collect();
    assert_eq!(history, ["shutter test passed"]);
}

#[test]
fn test_truncated_data_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("short.fits");
    let data = Array2::from_elem((64, 64), 1.0f32);
    let mut bytes = build_raw_fits(&data, &[]);
    bytes.truncate(2880 + 100);
    std::fs::write(&path, bytes).unwrap();

    let err = read_frame(&path).err().unwrap();
    assert!(matches!(err, ReductionError::Fits { .. }), "{err}");
    assert!(err.to_string().contains("short.fits"), "{err}");
}

#[test]
fn test_non_fits_file_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("notes.fits");
    std::fs::write(&path, vec![b'x'; 4000]).unwrap();
    assert!(matches!(
        read_header(&path),
        Err(ReductionError::Fits { .. })
    ));
}

#[test]
fn test_three_dimensional_cube_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("cube.fits");
    let mut header = String::new();
    for (k, v) in [
        ("SIMPLE", "T"),
        ("BITPIX", "8"),
        ("NAXIS", "3"),
        ("NAXIS1", "2"),
        ("NAXIS2", "2"),
        ("NAXIS3", "2"),
    ] {
        header.push_str(&common::card(k, v));
    }
    header.push_str(&format!("{:<80}", "END"));
    let mut bytes = header.into_bytes();
    bytes.resize(2880 * 2, 0);
    std::fs::write(&path, bytes).unwrap();

    let err = read_frame(&path).err().unwrap();
    assert!(matches!(err, ReductionError::InvalidFits(_)), "{err}");
    assert!(err.to_string().contains("NAXIS"), "{err}");
}

#[test]
fn test_string_card_with_comment() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("c.fits");
    let cards = vec![("SLITMASK".to_string(), format!("{} / mask", text("LS 0.7")))];
    std::fs::write(&path, build_raw_fits(&Array2::zeros((1, 1)), &cards)).unwrap();

    let header = read_header(&path).unwrap();
    assert_eq!(header.get_string("SLITMASK").as_deref(), Some("LS 0.7"));
}

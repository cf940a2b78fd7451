#[allow(dead_code)]
mod common;

use tempfile::TempDir;

use imred_core::frame::{Binning, DetectorId, FrameType};
use imred_core::io::catalog::FrameCatalog;

use common::{constant, text, write_raw, RawHeader};

#[test]
fn test_scan_classifies_frames() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    write_raw(&dir.join("b1.fits"), &constant(100.0), &RawHeader::bias(6));
    write_raw(
        &dir.join("f1.fits"),
        &constant(9000.0),
        &RawHeader::flat(6, "LS1", "Spectroscopic"),
    );
    write_raw(
        &dir.join("iff0001c6.fits"),
        &constant(500.0),
        &RawHeader::science(6, "LS1", "Spectroscopic"),
    );

    let catalog = FrameCatalog::scan(dir).unwrap();
    assert_eq!(catalog.len(), 3);
    assert!(catalog.rejected.is_empty());

    let science: Vec<_> = catalog.of_type(FrameType::Science).collect();
    assert_eq!(science.len(), 1);
    let record = science[0];
    assert_eq!(record.detector, DetectorId(6));
    assert_eq!(record.binning, Binning::default());
    assert_eq!(record.readout.as_str(), "slow");
    assert_eq!(record.slit_mask, "ls1");
    assert_eq!(record.filter, "spectroscopic");
    assert_eq!(record.exposure_time, 10.0);
    let pointing = record.sky_position.as_ref().unwrap();
    assert_eq!(pointing.ra, "12:34:56.7");

    let bias = catalog.of_type(FrameType::Bias).next().unwrap();
    assert!(bias.sky_position.is_none());
}

#[test]
fn test_scan_skips_non_raw_files() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    write_raw(&dir.join("good.fits"), &constant(100.0), &RawHeader::bias(1));
    // IRAF mosaic output
    write_raw(&dir.join("iff0001_mos.fits"), &constant(100.0), &RawHeader::bias(1));
    // Arc lamp: not part of the reduction
    let arc = RawHeader {
        exptype: "Arc",
        ..RawHeader::bias(1)
    };
    write_raw(&dir.join("arc.fits"), &constant(100.0), &arc);
    // Not a FITS extension
    std::fs::write(dir.join("log.txt"), "observing log").unwrap();

    // No OBJECT keyword
    let no_object: Vec<(String, String)> = RawHeader::bias(1)
        .cards()
        .into_iter()
        .filter(|(k, _)| k != "OBJECT")
        .collect();
    std::fs::write(
        dir.join("anon.fits"),
        common::build_raw_fits(&constant(1.0), &no_object),
    )
    .unwrap();

    // A product written by a previous run
    let mut product = RawHeader::bias(1).cards();
    product.push(("PRODUCT".to_string(), text("MASTER")));
    std::fs::write(
        dir.join("master_bias_c1_1x1_slow.fits"),
        common::build_raw_fits(&constant(1.0), &product),
    )
    .unwrap();

    let catalog = FrameCatalog::scan(dir).unwrap();
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog.records()[0].file_name(), "good.fits");
    assert!(catalog.rejected.is_empty());
}

#[test]
fn test_malformed_metadata_is_reported() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let bad = RawHeader {
        binning: "2by2",
        ..RawHeader::bias(3)
    };
    write_raw(&dir.join("bad_binning.fits"), &constant(100.0), &bad);
    std::fs::write(dir.join("broken.fits"), b"SIMPLE  =").unwrap();
    write_raw(&dir.join("ok.fits"), &constant(100.0), &RawHeader::bias(3));

    let catalog = FrameCatalog::scan(dir).unwrap();
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog.rejected.len(), 2);
}

#[test]
fn test_missing_speed_is_unspecified() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let fields = RawHeader {
        speed: "",
        binning: "2x2",
        ..RawHeader::bias(4)
    };
    let cards: Vec<(String, String)> = fields
        .cards()
        .into_iter()
        .filter(|(k, _)| k != "SPEED")
        .collect();
    std::fs::write(
        dir.join("b.fits"),
        common::build_raw_fits(&constant(1.0), &cards),
    )
    .unwrap();

    let catalog = FrameCatalog::scan(dir).unwrap();
    let record = &catalog.records()[0];
    assert_eq!(record.readout.as_str(), "unspecified");
    assert_eq!(record.binning, Binning { x: 2, y: 2 });
}

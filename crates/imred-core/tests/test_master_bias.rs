#[allow(dead_code)]
mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ndarray::Array2;
use tempfile::TempDir;

use imred_core::calib::{
    build_bias_library, build_master_bias, BiasKey, BiasPolicy, ConfigurationKey,
    DirectoryStore, MasterFrame, MasterLibrary, MemoryStore,
};
use imred_core::error::ReductionError;
use imred_core::frame::{Binning, DetectorId, ReadoutMode};
use imred_core::io::catalog::FrameCatalog;
use imred_core::stack::CombineMethod;

use common::{constant, write_raw, RawHeader};

fn slow_key(chip: u8) -> BiasKey {
    BiasKey {
        detector: DetectorId(chip),
        binning: Binning::default(),
        readout: ReadoutMode::new("slow"),
    }
}

fn write_biases(dir: &std::path::Path, chip: u8, levels: &[f32]) {
    for (i, &level) in levels.iter().enumerate() {
        write_raw(
            &dir.join(format!("bias{i}c{chip}.fits")),
            &constant(level),
            &RawHeader::bias(chip),
        );
    }
}

#[test]
fn test_constant_biases_combine_exactly() {
    let tmp = TempDir::new().unwrap();
    write_biases(tmp.path(), 5, &[100.0, 100.0, 100.0]);
    let catalog = FrameCatalog::scan(tmp.path()).unwrap();
    let library = MasterLibrary::new(MemoryStore::new(), false);

    let master = build_master_bias(
        catalog.records(),
        &slow_key(5),
        &library,
        &BiasPolicy::default(),
    )
    .unwrap();
    assert!(master.data.iter().all(|&v| v == 100.0));
    assert_eq!(master.frames_combined, 3);
    assert_eq!(master.method, CombineMethod::Mean);
    assert_eq!(library.store().len(), 1);
}

#[test]
fn test_empty_group_is_insufficient() {
    let library = MasterLibrary::new(MemoryStore::new(), false);
    let err = build_master_bias(&[], &slow_key(1), &library, &BiasPolicy::default())
        .err()
        .unwrap();
    assert!(matches!(err, ReductionError::InsufficientFrames { .. }));
    assert!(err.is_recoverable());
}

#[test]
fn test_record_from_other_detector_is_rejected() {
    let tmp = TempDir::new().unwrap();
    write_biases(tmp.path(), 2, &[100.0]);
    let catalog = FrameCatalog::scan(tmp.path()).unwrap();
    let library = MasterLibrary::new(MemoryStore::new(), false);

    let err = build_master_bias(
        catalog.records(),
        &slow_key(3),
        &library,
        &BiasPolicy::default(),
    )
    .err()
    .unwrap();
    assert!(matches!(err, ReductionError::InvalidConfiguration(_)));
}

#[test]
fn test_stored_master_is_reused_unless_forced() {
    let raw = TempDir::new().unwrap();
    let masters = TempDir::new().unwrap();
    write_biases(raw.path(), 1, &[100.0, 100.0]);
    let catalog = FrameCatalog::scan(raw.path()).unwrap();
    let key = slow_key(1);
    let policy = BiasPolicy::default();

    let first = MasterLibrary::new(DirectoryStore::new(masters.path()), false);
    build_master_bias(catalog.records(), &key, &first, &policy).unwrap();
    let stored = first
        .store()
        .path_for(&ConfigurationKey::Bias(key.clone()));
    assert!(stored.ends_with("master_bias_c1_1x1_slow.fits"));
    assert!(stored.is_file());

    // The raw biases change; a non-forcing library keeps the stored master.
    write_biases(raw.path(), 1, &[300.0, 300.0]);
    let reused = MasterLibrary::new(DirectoryStore::new(masters.path()), false);
    let master = build_master_bias(catalog.records(), &key, &reused, &policy).unwrap();
    assert!(master.data.iter().all(|&v| v == 100.0));

    // Forcing rebuilds once per library lifetime.
    let forced = MasterLibrary::new(DirectoryStore::new(masters.path()), true);
    let master = build_master_bias(catalog.records(), &key, &forced, &policy).unwrap();
    assert!(master.data.iter().all(|&v| v == 300.0));
    write_biases(raw.path(), 1, &[500.0, 500.0]);
    let again = build_master_bias(catalog.records(), &key, &forced, &policy).unwrap();
    assert!(again.data.iter().all(|&v| v == 300.0));
}

#[test]
fn test_concurrent_builds_of_one_key_run_once() {
    let library = Arc::new(MasterLibrary::new(MemoryStore::new(), false));
    let builds = Arc::new(AtomicUsize::new(0));
    let key = ConfigurationKey::Bias(slow_key(7));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let library = Arc::clone(&library);
            let builds = Arc::clone(&builds);
            let key = key.clone();
            std::thread::spawn(move || {
                library
                    .get_or_build(&key, || {
                        builds.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(20));
                        Ok(MasterFrame {
                            key: key.clone(),
                            data: Array2::from_elem((2, 2), 1.0),
                            method: CombineMethod::Mean,
                            frames_combined: 1,
                        })
                    })
                    .unwrap()
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[test]
fn test_bias_library_builds_each_configuration() {
    let tmp = TempDir::new().unwrap();
    write_biases(tmp.path(), 1, &[100.0, 100.0]);
    write_biases(tmp.path(), 2, &[50.0]);
    let fast = RawHeader {
        speed: "Fast",
        ..RawHeader::bias(2)
    };
    write_raw(&tmp.path().join("fastc2.fits"), &constant(80.0), &fast);

    let catalog = FrameCatalog::scan(tmp.path()).unwrap();
    let library = MasterLibrary::new(MemoryStore::new(), false);
    let report = build_bias_library(&catalog, &library, &BiasPolicy::default());

    assert_eq!(report.built.len(), 3);
    assert!(report.skipped.is_empty());
    let fast_key = ConfigurationKey::Bias(BiasKey {
        readout: ReadoutMode::new("fast"),
        ..slow_key(2)
    });
    let master = library.get(&fast_key).unwrap().unwrap();
    assert!(master.data.iter().all(|&v| v == 80.0));
}

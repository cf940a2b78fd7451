use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::consts::{
    KEY_BINNING, KEY_CHIP, KEY_COMBINE, KEY_FILTER, KEY_MASTER_KIND, KEY_NCOMBINE, KEY_PRODUCT,
    KEY_SLITMASK, KEY_SPEED,
};
use crate::error::{ReductionError, Result};
use crate::frame::{DetectorId, FlatIdentity};
use crate::header::Header;
use crate::io::fits::read_frame;
use crate::io::fits_writer::write_fits;
use crate::stack::{CombineMethod, SigmaClipParams};

use super::key::{CalibrationKind, ConfigurationKey};
use super::MasterFrame;

const KEY_CLIP_SIGMA: &str = "CLIPSIG";
const KEY_CLIP_ITERATIONS: &str = "CLIPITER";

/// Persistent keyed storage for master frames.
pub trait MasterStore: Send + Sync {
    fn get(&self, key: &ConfigurationKey) -> Result<Option<MasterFrame>>;
    fn put(&self, key: &ConfigurationKey, frame: &MasterFrame) -> Result<()>;
}

/// Stores each master frame as `<root>/<key stem>.fits`.
#[derive(Clone, Debug)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &ConfigurationKey) -> PathBuf {
        self.root.join(format!("{}.fits", key.file_stem()))
    }
}

impl MasterStore for DirectoryStore {
    fn get(&self, key: &ConfigurationKey) -> Result<Option<MasterFrame>> {
        let path = self.path_for(key);
        if !path.is_file() {
            return Ok(None);
        }
        let frame = read_frame(&path)?;
        let kind = frame
            .header
            .get_string(KEY_MASTER_KIND)
            .as_deref()
            .and_then(CalibrationKind::from_tag);
        if kind != Some(key.kind()) {
            return Err(ReductionError::InvalidFits(format!(
                "{} is not a master {}",
                path.display(),
                key.kind()
            )));
        }
        let method = method_from_header(&frame.header);
        let frames_combined = frame
            .header
            .get_int(KEY_NCOMBINE)
            .map(|n| n.max(0) as usize)
            .unwrap_or(0);
        Ok(Some(MasterFrame {
            key: key.clone(),
            data: frame.data,
            method,
            frames_combined,
        }))
    }

    fn put(&self, key: &ConfigurationKey, frame: &MasterFrame) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        let path = self.path_for(key);
        write_fits(&path, &frame.data, &master_header(key, frame))?;
        debug!(path = %path.display(), "Master frame written");
        Ok(())
    }
}

fn master_header(key: &ConfigurationKey, frame: &MasterFrame) -> Header {
    let mut header = Header::new();
    header.set_with_comment(KEY_PRODUCT, "MASTER", Some("calibration product"));
    header.set(KEY_MASTER_KIND, key.kind().tag());
    header.set(KEY_CHIP, key.detector().0 as i64);
    header.set(KEY_BINNING, key.binning().to_string());
    match key {
        ConfigurationKey::Bias(k) => header.set(KEY_SPEED, k.readout.to_string()),
        ConfigurationKey::Flat(k) => match &k.identity {
            FlatIdentity::SlitMask(s) => header.set(KEY_SLITMASK, s.as_str()),
            FlatIdentity::PhotometricFilter(f) => header.set(KEY_FILTER, f.as_str()),
        },
    }
    header.set(KEY_COMBINE, frame.method.tag());
    if let CombineMethod::SigmaClip(ref p) = frame.method {
        header.set(KEY_CLIP_SIGMA, p.sigma as f64);
        header.set(KEY_CLIP_ITERATIONS, p.iterations);
    }
    header.set_with_comment(KEY_NCOMBINE, frame.frames_combined, Some("frames combined"));
    header
}

fn method_from_header(header: &Header) -> CombineMethod {
    match header.get_string(KEY_COMBINE).as_deref() {
        Some("median") => CombineMethod::Median,
        Some("sigma-clip") => {
            let defaults = SigmaClipParams::default();
            CombineMethod::SigmaClip(SigmaClipParams {
                sigma: header
                    .get_float(KEY_CLIP_SIGMA)
                    .map_or(defaults.sigma, |s| s as f32),
                iterations: header
                    .get_int(KEY_CLIP_ITERATIONS)
                    .map_or(defaults.iterations, |n| n.max(0) as usize),
            })
        }
        _ => CombineMethod::Mean,
    }
}

/// In-memory store, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    frames: Mutex<HashMap<ConfigurationKey, MasterFrame>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.frames).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MasterStore for MemoryStore {
    fn get(&self, key: &ConfigurationKey) -> Result<Option<MasterFrame>> {
        Ok(lock(&self.frames).get(key).cloned())
    }

    fn put(&self, key: &ConfigurationKey, frame: &MasterFrame) -> Result<()> {
        lock(&self.frames).insert(key.clone(), frame.clone());
        Ok(())
    }
}

/// Master frames for one reduction run, backed by a [`MasterStore`].
///
/// Loaded masters are cached in memory. A stored master is reused unless
/// `force_rebuild` is set, in which case each key is rebuilt once for the
/// lifetime of the library and stored masters are invisible until their
/// rebuild succeeds. Builds of the same key are serialized, so at most one
/// caller computes a given master.
pub struct MasterLibrary<S: MasterStore = DirectoryStore> {
    store: S,
    force_rebuild: bool,
    loaded: Mutex<HashMap<ConfigurationKey, Arc<MasterFrame>>>,
    rebuilt: Mutex<HashSet<ConfigurationKey>>,
    in_flight: Mutex<HashMap<ConfigurationKey, Arc<Mutex<()>>>>,
}

impl<S: MasterStore> MasterLibrary<S> {
    pub fn new(store: S, force_rebuild: bool) -> Self {
        Self {
            store,
            force_rebuild,
            loaded: Mutex::new(HashMap::new()),
            rebuilt: Mutex::new(HashSet::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn force_rebuild(&self) -> bool {
        self.force_rebuild
    }

    /// Look up a master frame, loading it from the store on first access.
    /// When rebuilding is forced, a master not yet rebuilt by this library
    /// is reported as absent.
    pub fn get(&self, key: &ConfigurationKey) -> Result<Option<Arc<MasterFrame>>> {
        if let Some(frame) = lock(&self.loaded).get(key) {
            return Ok(Some(Arc::clone(frame)));
        }
        if self.is_stale(key) {
            debug!(key = %key, "Stored master ignored until rebuilt");
            return Ok(None);
        }
        let Some(frame) = self.store.get(key)? else {
            return Ok(None);
        };
        let frame = Arc::new(frame);
        lock(&self.loaded).insert(key.clone(), Arc::clone(&frame));
        Ok(Some(frame))
    }

    /// Like [`get`](Self::get), but a missing master is an error naming the
    /// detector that needed it.
    pub fn require(&self, key: &ConfigurationKey, detector: DetectorId) -> Result<Arc<MasterFrame>> {
        self.get(key)?.ok_or_else(|| ReductionError::CalibrationMissing {
            detector,
            key: key.clone(),
        })
    }

    /// Return the stored master for `key`, or run `build`, persist its
    /// result and return it.
    pub fn get_or_build<F>(&self, key: &ConfigurationKey, build: F) -> Result<Arc<MasterFrame>>
    where
        F: FnOnce() -> Result<MasterFrame>,
    {
        let guard = self.key_guard(key);
        let result = {
            let _building = lock(&*guard);
            self.reuse_or_build(key, build)
        };
        self.release_key_guard(key, guard);
        result
    }

    fn reuse_or_build<F>(&self, key: &ConfigurationKey, build: F) -> Result<Arc<MasterFrame>>
    where
        F: FnOnce() -> Result<MasterFrame>,
    {
        if let Some(existing) = self.get(key)? {
            debug!(key = %key, "Reusing existing master frame");
            return Ok(existing);
        }

        let frame = build()?;
        self.store.put(key, &frame)?;
        info!(
            key = %key,
            method = %frame.method,
            frames = frame.frames_combined,
            "Master frame built"
        );

        let frame = Arc::new(frame);
        lock(&self.rebuilt).insert(key.clone());
        lock(&self.loaded).insert(key.clone(), Arc::clone(&frame));
        Ok(frame)
    }

    fn is_stale(&self, key: &ConfigurationKey) -> bool {
        self.force_rebuild && !lock(&self.rebuilt).contains(key)
    }

    fn key_guard(&self, key: &ConfigurationKey) -> Arc<Mutex<()>> {
        Arc::clone(lock(&self.in_flight).entry(key.clone()).or_default())
    }

    /// Drop the per-key guard once no other caller is waiting on it.
    fn release_key_guard(&self, key: &ConfigurationKey, guard: Arc<Mutex<()>>) {
        let mut in_flight = lock(&self.in_flight);
        // One reference in the map, one held here.
        let idle = in_flight
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, &guard) && Arc::strong_count(&guard) == 2);
        if idle {
            in_flight.remove(key);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

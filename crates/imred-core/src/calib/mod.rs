//! Master bias/flat construction and storage.

pub mod bias;
pub mod flat;
pub mod group;
pub mod key;
pub mod library;

use ndarray::Array2;

use crate::stack::CombineMethod;

pub use bias::{build_master_bias, BiasPolicy};
pub use flat::{build_master_flat, FlatPolicy, FlatRejection};
pub use group::{
    build_bias_library, build_flat_library, group_bias_records, group_flat_records,
    resolve_flat_identity, CalibrationReport, FlatGroups, FlatSelection,
};
pub use key::{BiasKey, CalibrationKind, ConfigurationKey, FlatKey};
pub use library::{DirectoryStore, MasterLibrary, MasterStore, MemoryStore};

/// A combined calibration frame. Read-only once built.
#[derive(Clone, Debug)]
pub struct MasterFrame {
    pub key: ConfigurationKey,
    pub data: Array2<f32>,
    pub method: CombineMethod,
    /// Number of raw frames that went into the combination.
    pub frames_combined: usize,
}

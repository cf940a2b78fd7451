use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ReductionError, Result};
use crate::frame::{FrameRecord, FrameType};
use crate::io::fits::read_frame;
use crate::stack::{combine, CombineMethod};

use super::key::{BiasKey, ConfigurationKey};
use super::library::{MasterLibrary, MasterStore};
use super::MasterFrame;

/// How bias frames are combined.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BiasPolicy {
    #[serde(default = "default_bias_method")]
    pub method: CombineMethod,
}

fn default_bias_method() -> CombineMethod {
    CombineMethod::Mean
}

impl Default for BiasPolicy {
    fn default() -> Self {
        Self {
            method: default_bias_method(),
        }
    }
}

/// Combine the bias frames of one configuration into a master bias.
///
/// Returns the stored master when one exists and the library is not
/// forcing a rebuild.
pub fn build_master_bias<S: MasterStore>(
    records: &[FrameRecord],
    key: &BiasKey,
    library: &MasterLibrary<S>,
    policy: &BiasPolicy,
) -> Result<Arc<MasterFrame>> {
    let config_key = ConfigurationKey::Bias(key.clone());
    if records.is_empty() {
        return Err(ReductionError::InsufficientFrames { key: config_key });
    }
    if let Some(stray) = records.iter().find(|r| !belongs_to(r, key)) {
        return Err(ReductionError::InvalidConfiguration(format!(
            "{} does not belong to {config_key}",
            stray.file_name()
        )));
    }

    library.get_or_build(&config_key, || {
        info!(
            detector = %key.detector,
            binning = %key.binning,
            readout = %key.readout,
            frames = records.len(),
            "Combining bias frames"
        );
        let frames = records
            .iter()
            .map(|r| read_frame(&r.path).map(|f| f.data))
            .collect::<Result<Vec<_>>>()?;
        let data = combine(&frames, &policy.method)?;
        Ok(MasterFrame {
            key: config_key.clone(),
            data,
            method: policy.method.clone(),
            frames_combined: frames.len(),
        })
    })
}

fn belongs_to(record: &FrameRecord, key: &BiasKey) -> bool {
    record.frame_type == FrameType::Bias
        && record.detector == key.detector
        && record.binning == key.binning
        && record.readout == key.readout
}

pub mod config;
mod orchestrator;
mod types;

pub use config::ReductionConfig;
pub use orchestrator::{build_calibrations, open_library, run_reduction, run_reduction_reported};
pub use types::{PipelineStage, ProgressReporter, ReductionOutput, ReductionProduct};

//! walkdir CI - the repository's CI script as a typed plan
//!
//! Provides a small orchestrator that:
//! - Classifies the toolchain under test (MSRV, nightly, anything else)
//! - Derives the ordered list of cargo invocations for that toolchain
//! - Runs them one at a time, stopping at the first failure
//! - Reports the outcome as a serializable [`PipelineResult`]

pub mod config;
pub mod error;
pub mod fakes;
pub mod pipeline;
pub mod plan;
pub mod runner;
pub mod stage;
pub mod telemetry;

// Re-export key types
pub use config::{CiConfig, DependencyPin, ScriptRevision};
pub use error::{CiError, Result};
pub use pipeline::{CiPipeline, PipelineResult};
pub use plan::{Channel, CiPlan};
pub use runner::{ProcessExecutor, StageExecutor, StageResult};
pub use stage::{BuiltinStage, StageConfig};

//! batchflow
//!
//! AWS Batch jobs for Serverless services. [`BatchPlugin`] binds the
//! template synthesis and image lifecycle steps to the host deployment
//! pipeline's hook points.

pub mod error;
pub mod hooks;
pub mod plugin;

pub use error::{HookError, Result, StepError};
pub use hooks::{HookPoint, PhaseRun, Step, StepRecord, StepState};
pub use plugin::{BatchConfig, BatchPlugin, Capabilities};

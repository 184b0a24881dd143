use crate::hooks::{HookPoint, Step};
use batchflow_build::{BuildError, PushError, RegistryCleanupError};
use batchflow_core::{ConfigurationError, SynthesisError};
use thiserror::Error;

/// Why a step failed
#[derive(Error, Debug)]
pub enum StepError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Push(#[from] PushError),

    #[error(transparent)]
    Cleanup(#[from] RegistryCleanupError),

    #[error("{0} is not available in this run")]
    CapabilityUnavailable(&'static str),
}

/// A step failure, with the phase, the step and the task or resource involved
#[derive(Error, Debug)]
#[error(
    "[{point}] {step}{} failed: {source}",
    subject.as_ref().map(|s| format!(" ({s})")).unwrap_or_default()
)]
pub struct HookError {
    pub point: HookPoint,
    pub step: Step,
    pub subject: Option<String>,
    #[source]
    pub source: StepError,
}

impl HookError {
    /// ユーザー向けのメッセージ (ビルド出力の末尾を含む)
    pub fn user_message(&self) -> String {
        match &self.source {
            StepError::Build(build) => format!(
                "[{}] {} に失敗しました\n{}",
                self.point,
                self.step,
                build.user_message()
            ),
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HookError>;

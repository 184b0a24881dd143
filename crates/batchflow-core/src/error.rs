//! Error types for configuration validation and template synthesis

use thiserror::Error;

/// A `batch` block field has the wrong shape or an out-of-range value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid batch configuration at `{path}`: {constraint}")]
pub struct ConfigurationError {
    /// Dotted path of the offending field, e.g. `provider.batch.Subnets[1]`
    pub path: String,

    /// The constraint that was violated
    pub constraint: String,
}

impl ConfigurationError {
    pub fn new(path: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            constraint: constraint.into(),
        }
    }
}

/// A synthesized resource cannot be wired into the existing template.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateConflictError {
    #[error("resource `{from}` references `{target}`, which is not defined in the template")]
    UnresolvedReference { from: String, target: String },

    #[error("resource `{logical_id}` already exists as `{found}`, but `{expected}` is required")]
    TypeMismatch {
        logical_id: String,
        expected: String,
        found: String,
    },

    #[error("malformed deployment template: {0}")]
    Malformed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Conflict(#[from] TemplateConflictError),
}

pub type Result<T> = std::result::Result<T, SynthesisError>;

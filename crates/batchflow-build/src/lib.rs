//! batchflow image lifecycle
//!
//! This crate builds the container image behind the batch jobs, pushes it
//! to the service's registry repository and empties that repository on
//! teardown. Docker access goes through [`ContainerEngine`]; registry
//! credentials and image deletion are capabilities supplied by a cloud
//! adapter ([`CredentialProvider`], [`RegistryClient`]).

pub mod auth;
pub mod context;
pub mod docker;
pub mod dockerfile;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod progress;
pub mod reference;
pub mod registry;

pub use auth::{CredentialProvider, RegistryCredentials};
pub use context::ContextBuilder;
pub use docker::DockerEngine;
pub use dockerfile::DockerfileSource;
pub use engine::ContainerEngine;
pub use error::{
    AuthError, BuildError, BuildResult, CleanupResult, PushError, PushResult,
    RegistryCleanupError,
};
pub use lifecycle::{CleanupReport, ImageLifecycle, derive_tag};
pub use progress::ImageProgress;
pub use reference::{ImageReference, content_tag, validate_tag};
pub use registry::{DELETE_BATCH_SIZE, DeleteOutcome, ImageId, RegistryClient};

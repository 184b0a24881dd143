//! AWS adapters for batchflow
//!
//! [`AwsEcr`] supplies registry credentials and image cleanup to the image
//! lifecycle through the capability traits defined in `batchflow-build`.

pub mod ecr;
pub mod error;

pub use ecr::{AwsEcr, registry_host_from_endpoint};
pub use error::{AwsError, Result};

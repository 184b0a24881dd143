//! batchflow core
//!
//! Everything needed to turn a service's `batch` configuration into
//! CloudFormation resources, without touching the network:
//!
//! - [`naming`]: deterministic logical ids and physical names per resource role
//! - [`validator`]: shape checks for the provider-level and per-function `batch` blocks
//! - [`schema`]: the JSON Schema extension handed to the host's config validation
//! - [`template`]: the deployment template and the non-clobbering merge
//! - [`synth`]: compute environment, job queue, IAM, ECR and job definition fragments

pub mod error;
pub mod model;
pub mod naming;
pub mod schema;
pub mod synth;
pub mod template;
pub mod validator;

pub use error::{ConfigurationError, Result, SynthesisError, TemplateConflictError};
pub use model::{
    BatchProviderConfig, BatchTask, BatchTaskConfig, ComputeType, ContainerProperties,
    ImportValue, ResourceRefs, RetryStrategy, TaskTimeout,
};
pub use naming::Naming;
pub use schema::{SCHEMA_VERSION, SchemaExtension};
pub use synth::{
    JOB_QUEUE_OUTPUT, Synthesizer, compile_tasks, generate_core_template, synthesize_environment,
};
pub use template::{LogicalId, MergeReport, Resource, Template, TemplateFragment};
pub use validator::{validate_provider, validate_task};

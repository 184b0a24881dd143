//! Typed batch configuration
//!
//! Field names follow the CloudFormation property names users write in
//! their service file (`MinvCpus`, `ContainerProperties`, ...). Every field is
//! optional; the accessor methods apply the defaults.

use crate::error::ConfigurationError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const DEFAULT_INSTANCE_TYPES: &[&str] = &["optimal"];
pub const DEFAULT_MIN_VCPUS: u32 = 0;
pub const DEFAULT_MAX_VCPUS: u32 = 256;
pub const DEFAULT_MEMORY_MIB: u32 = 2048;
pub const DEFAULT_VCPUS: u32 = 1;
pub const DEFAULT_ATTEMPTS: u32 = 1;
pub const DEFAULT_ATTEMPT_DURATION_SECONDS: u32 = 300;

/// Compute resource type of the managed compute environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComputeType {
    #[default]
    Ec2,
    Spot,
}

impl ComputeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComputeType::Ec2 => "EC2",
            ComputeType::Spot => "SPOT",
        }
    }
}

impl std::fmt::Display for ComputeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cross-stack reference: `{ "Fn::ImportValue": <export name> }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ImportValue {
    #[serde(rename = "Fn::ImportValue")]
    pub import_value: Value,
}

/// Subnet or security group references.
///
/// A list is either all literal ids or all import references, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ResourceRefs {
    Literal(Vec<String>),
    Imports(Vec<ImportValue>),
}

impl Default for ResourceRefs {
    fn default() -> Self {
        ResourceRefs::Literal(Vec::new())
    }
}

impl ResourceRefs {
    pub fn len(&self) -> usize {
        match self {
            ResourceRefs::Literal(ids) => ids.len(),
            ResourceRefs::Imports(imports) => imports.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The value placed into `ComputeResources`
    pub fn to_template_value(&self) -> Value {
        match self {
            ResourceRefs::Literal(ids) => Value::from(ids.clone()),
            ResourceRefs::Imports(imports) => Value::Array(
                imports
                    .iter()
                    .map(|i| serde_json::json!({ "Fn::ImportValue": i.import_value }))
                    .collect(),
            ),
        }
    }
}

/// Provider-level `batch` block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct BatchProviderConfig {
    #[serde(rename = "Type", skip_serializing_if = "Option::is_none")]
    pub compute_type: Option<ComputeType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnets: Option<ResourceRefs>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_group_ids: Option<ResourceRefs>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_types: Option<Vec<String>>,

    #[serde(rename = "MinvCpus", skip_serializing_if = "Option::is_none")]
    pub min_vcpus: Option<u32>,

    #[serde(rename = "MaxvCpus", skip_serializing_if = "Option::is_none")]
    pub max_vcpus: Option<u32>,

    #[serde(rename = "DesiredvCpus", skip_serializing_if = "Option::is_none")]
    pub desired_vcpus: Option<u32>,

    /// Maximum spot price as a percentage of on-demand (SPOT only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bid_percentage: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
}

impl BatchProviderConfig {
    pub fn compute_type(&self) -> ComputeType {
        self.compute_type.unwrap_or_default()
    }

    pub fn is_spot(&self) -> bool {
        self.compute_type() == ComputeType::Spot
    }

    pub fn subnets(&self) -> ResourceRefs {
        self.subnets.clone().unwrap_or_default()
    }

    pub fn security_group_ids(&self) -> ResourceRefs {
        self.security_group_ids.clone().unwrap_or_default()
    }

    pub fn instance_types(&self) -> Vec<String> {
        self.instance_types.clone().unwrap_or_else(|| {
            DEFAULT_INSTANCE_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect()
        })
    }

    pub fn min_vcpus(&self) -> u32 {
        self.min_vcpus.unwrap_or(DEFAULT_MIN_VCPUS)
    }

    pub fn max_vcpus(&self) -> u32 {
        self.max_vcpus.unwrap_or(DEFAULT_MAX_VCPUS)
    }

    pub fn tags(&self) -> BTreeMap<String, String> {
        self.tags.clone().unwrap_or_default()
    }

    /// Cross-field vCPU checks, with defaults filling the absent side.
    pub fn check_vcpu_bounds(&self) -> Result<(), ConfigurationError> {
        let (min, max) = (self.min_vcpus(), self.max_vcpus());
        if min > max {
            return Err(ConfigurationError::new(
                "provider.batch.MinvCpus",
                format!("MinvCpus ({min}) must not exceed MaxvCpus ({max})"),
            ));
        }

        if let Some(desired) = self.desired_vcpus
            && !(min..=max).contains(&desired)
        {
            return Err(ConfigurationError::new(
                "provider.batch.DesiredvCpus",
                format!("DesiredvCpus ({desired}) must lie within [{min}, {max}]"),
            ));
        }

        Ok(())
    }
}

/// Per-function `batch` block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct BatchTaskConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_properties: Option<ContainerProperties>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_strategy: Option<RetryStrategy>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<TaskTimeout>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerProperties {
    /// MiB
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcpus: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct RetryStrategy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct TaskTimeout {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt_duration_seconds: Option<u32>,
}

impl BatchTaskConfig {
    pub fn memory(&self) -> u32 {
        self.container_properties
            .as_ref()
            .and_then(|c| c.memory)
            .unwrap_or(DEFAULT_MEMORY_MIB)
    }

    pub fn vcpus(&self) -> u32 {
        self.container_properties
            .as_ref()
            .and_then(|c| c.vcpus)
            .unwrap_or(DEFAULT_VCPUS)
    }

    pub fn environment(&self) -> BTreeMap<String, String> {
        self.container_properties
            .as_ref()
            .and_then(|c| c.environment.clone())
            .unwrap_or_default()
    }

    pub fn attempts(&self) -> u32 {
        self.retry_strategy
            .as_ref()
            .and_then(|r| r.attempts)
            .unwrap_or(DEFAULT_ATTEMPTS)
    }

    pub fn attempt_duration_seconds(&self) -> u32 {
        self.timeout
            .as_ref()
            .and_then(|t| t.attempt_duration_seconds)
            .unwrap_or(DEFAULT_ATTEMPT_DURATION_SECONDS)
    }
}

/// One declared function that runs as a batch job
#[derive(Debug, Clone, PartialEq)]
pub struct BatchTask {
    pub name: String,

    /// Handler passed as the container command
    pub handler: String,

    pub config: BatchTaskConfig,
}

impl BatchTask {
    pub fn new(name: impl Into<String>, handler: impl Into<String>, config: BatchTaskConfig) -> Self {
        Self {
            name: name.into(),
            handler: handler.into(),
            config,
        }
    }
}

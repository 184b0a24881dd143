//! Validation of raw `batch` blocks
//!
//! Input is the untyped value read from the service file. Absent fields are
//! fine; present fields must have the declared shape. Keys this module does
//! not know about are ignored, matching the host's open schema.

use crate::error::ConfigurationError;
use crate::model::{
    BatchProviderConfig, BatchTaskConfig, ComputeType, ContainerProperties, ImportValue,
    ResourceRefs, RetryStrategy, TaskTimeout,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

type Result<T> = std::result::Result<T, ConfigurationError>;

const PROVIDER_PATH: &str = "provider.batch";
const IMPORT_VALUE_KEY: &str = "Fn::ImportValue";

const MIN_MEMORY_MIB: u32 = 4;
const MAX_ATTEMPTS: u32 = 10;
const MIN_ATTEMPT_DURATION_SECONDS: u32 = 60;

/// Validate the provider-level block. `None` yields the all-defaults config.
pub fn validate_provider(raw: Option<&Value>) -> Result<BatchProviderConfig> {
    let Some(raw) = raw else {
        return Ok(BatchProviderConfig::default());
    };
    let block = Block::new(raw, PROVIDER_PATH.to_string())?;

    let config = BatchProviderConfig {
        compute_type: block.compute_type("Type")?,
        subnets: block.resource_refs("Subnets")?,
        security_group_ids: block.resource_refs("SecurityGroupIds")?,
        instance_types: block.string_list("InstanceTypes")?,
        min_vcpus: block.integer("MinvCpus", 0, None)?,
        max_vcpus: block.integer("MaxvCpus", 0, None)?,
        desired_vcpus: block.integer("DesiredvCpus", 0, None)?,
        bid_percentage: block.integer("BidPercentage", 1, Some(100))?,
        tags: block.string_map("Tags")?,
    };
    config.check_vcpu_bounds()?;

    if config.bid_percentage.is_some() && !config.is_spot() {
        tracing::warn!("provider.batch.BidPercentage is only used by SPOT compute environments");
    }

    Ok(config)
}

/// Validate the `batch` block of function `task`.
pub fn validate_task(task: &str, raw: &Value) -> Result<BatchTaskConfig> {
    let block = Block::new(raw, format!("functions.{task}.batch"))?;

    let container_properties = block
        .child("ContainerProperties")?
        .map(|c| -> Result<ContainerProperties> {
            Ok(ContainerProperties {
                memory: c.integer("Memory", MIN_MEMORY_MIB, None)?,
                vcpus: c.integer("Vcpus", 1, None)?,
                environment: c.string_map("Environment")?,
            })
        })
        .transpose()?;

    let retry_strategy = block
        .child("RetryStrategy")?
        .map(|r| -> Result<RetryStrategy> {
            Ok(RetryStrategy {
                attempts: r.integer("Attempts", 1, Some(MAX_ATTEMPTS))?,
            })
        })
        .transpose()?;

    let timeout = block
        .child("Timeout")?
        .map(|t| -> Result<TaskTimeout> {
            Ok(TaskTimeout {
                attempt_duration_seconds: t.integer(
                    "AttemptDurationSeconds",
                    MIN_ATTEMPT_DURATION_SECONDS,
                    None,
                )?,
            })
        })
        .transpose()?;

    Ok(BatchTaskConfig {
        container_properties,
        retry_strategy,
        timeout,
    })
}

/// An object being validated, with its path for error reporting
struct Block<'a> {
    fields: &'a Map<String, Value>,
    path: String,
}

impl<'a> Block<'a> {
    fn new(value: &'a Value, path: String) -> Result<Self> {
        match value.as_object() {
            Some(fields) => Ok(Self { fields, path }),
            None => Err(ConfigurationError::new(path, "must be an object")),
        }
    }

    fn field_path(&self, key: &str) -> String {
        format!("{}.{}", self.path, key)
    }

    fn child(&self, key: &str) -> Result<Option<Block<'a>>> {
        self.fields
            .get(key)
            .map(|v| Block::new(v, self.field_path(key)))
            .transpose()
    }

    fn integer(&self, key: &str, min: u32, max: Option<u32>) -> Result<Option<u32>> {
        let Some(value) = self.fields.get(key) else {
            return Ok(None);
        };
        let path = self.field_path(key);

        let number = match value.as_u64() {
            Some(n) => n,
            None if value.as_i64().is_some() => {
                return Err(ConfigurationError::new(path, "must be a non-negative integer"));
            }
            None => return Err(ConfigurationError::new(path, "must be an integer")),
        };
        let number = u32::try_from(number)
            .map_err(|_| ConfigurationError::new(&path, "is too large"))?;

        if number < min {
            return Err(ConfigurationError::new(path, format!("must be at least {min}")));
        }
        if let Some(max) = max
            && number > max
        {
            return Err(ConfigurationError::new(path, format!("must be at most {max}")));
        }
        Ok(Some(number))
    }

    fn compute_type(&self, key: &str) -> Result<Option<ComputeType>> {
        let Some(value) = self.fields.get(key) else {
            return Ok(None);
        };
        match value.as_str() {
            Some("EC2") => Ok(Some(ComputeType::Ec2)),
            Some("SPOT") => Ok(Some(ComputeType::Spot)),
            Some(other) => Err(ConfigurationError::new(
                self.field_path(key),
                format!("must be one of EC2, SPOT (found `{other}`)"),
            )),
            None => Err(ConfigurationError::new(self.field_path(key), "must be a string")),
        }
    }

    fn string_list(&self, key: &str) -> Result<Option<Vec<String>>> {
        let Some(value) = self.fields.get(key) else {
            return Ok(None);
        };
        let path = self.field_path(key);
        let items = value
            .as_array()
            .ok_or_else(|| ConfigurationError::new(&path, "must be a list of strings"))?;

        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ConfigurationError::new(format!("{path}[{i}]"), "must be a string"))
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    fn string_map(&self, key: &str) -> Result<Option<BTreeMap<String, String>>> {
        let Some(value) = self.fields.get(key) else {
            return Ok(None);
        };
        let path = self.field_path(key);
        let entries = value
            .as_object()
            .ok_or_else(|| ConfigurationError::new(&path, "must be a mapping of strings"))?;

        entries
            .iter()
            .map(|(k, v)| {
                v.as_str()
                    .map(|s| (k.clone(), s.to_string()))
                    .ok_or_else(|| ConfigurationError::new(format!("{path}.{k}"), "must be a string"))
            })
            .collect::<Result<BTreeMap<_, _>>>()
            .map(Some)
    }

    /// A list of literal ids or a list of `Fn::ImportValue` objects, never mixed.
    fn resource_refs(&self, key: &str) -> Result<Option<ResourceRefs>> {
        let Some(value) = self.fields.get(key) else {
            return Ok(None);
        };
        let path = self.field_path(key);
        let items = value.as_array().ok_or_else(|| {
            ConfigurationError::new(&path, "must be a list of ids or `Fn::ImportValue` references")
        })?;

        let mut literals = Vec::new();
        let mut imports = Vec::new();
        for (i, item) in items.iter().enumerate() {
            let item_path = format!("{path}[{i}]");
            match item {
                Value::String(id) => literals.push(id.clone()),
                Value::Object(map) => {
                    let import_value = match map.get(IMPORT_VALUE_KEY) {
                        Some(v) if map.len() == 1 => v.clone(),
                        _ => {
                            return Err(ConfigurationError::new(
                                item_path,
                                "import reference must have exactly the single key `Fn::ImportValue`",
                            ));
                        }
                    };
                    imports.push(ImportValue { import_value });
                }
                _ => {
                    return Err(ConfigurationError::new(
                        item_path,
                        "must be a string id or an `Fn::ImportValue` reference",
                    ));
                }
            }

            if !literals.is_empty() && !imports.is_empty() {
                return Err(ConfigurationError::new(
                    item_path,
                    "must not mix literal ids and `Fn::ImportValue` references in one list",
                ));
            }
        }

        if imports.is_empty() {
            Ok(Some(ResourceRefs::Literal(literals)))
        } else {
            Ok(Some(ResourceRefs::Imports(imports)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_absent_block_is_all_defaults() {
        assert_eq!(validate_provider(None).unwrap(), BatchProviderConfig::default());
        assert_eq!(
            validate_provider(Some(&json!({}))).unwrap(),
            BatchProviderConfig::default()
        );
    }

    #[test]
    fn test_full_provider_block() {
        let raw = json!({
            "Type": "SPOT",
            "Subnets": ["subnet-1", "subnet-2"],
            "SecurityGroupIds": [{ "Fn::ImportValue": "net-SecurityGroup" }],
            "InstanceTypes": ["c5.large"],
            "MinvCpus": 0,
            "MaxvCpus": 16,
            "BidPercentage": 60,
            "Tags": { "team": "imaging" },
            "SomethingElse": true
        });
        let config = validate_provider(Some(&raw)).unwrap();
        assert_eq!(config.compute_type(), ComputeType::Spot);
        assert_eq!(
            config.subnets,
            Some(ResourceRefs::Literal(vec!["subnet-1".into(), "subnet-2".into()]))
        );
        assert!(matches!(config.security_group_ids, Some(ResourceRefs::Imports(ref v)) if v.len() == 1));
        assert_eq!(config.max_vcpus(), 16);
        assert_eq!(config.tags().get("team").map(String::as_str), Some("imaging"));
    }

    #[test]
    fn test_mixed_subnets_rejected() {
        let raw = json!({ "Subnets": ["subnet-1", { "Fn::ImportValue": "net-Subnet" }] });
        let err = validate_provider(Some(&raw)).unwrap_err();
        assert_eq!(err.path, "provider.batch.Subnets[1]");
        assert!(err.constraint.contains("must not mix"));
    }

    #[test]
    fn test_mixed_security_groups_rejected_in_either_order() {
        let raw = json!({
            "SecurityGroupIds": [{ "Fn::ImportValue": "net-Sg" }, "sg-123"]
        });
        let err = validate_provider(Some(&raw)).unwrap_err();
        assert_eq!(err.path, "provider.batch.SecurityGroupIds[1]");
    }

    #[test]
    fn test_import_object_with_extra_keys_rejected() {
        let raw = json!({
            "Subnets": [{ "Fn::ImportValue": "net-Subnet", "Extra": 1 }]
        });
        let err = validate_provider(Some(&raw)).unwrap_err();
        assert_eq!(err.path, "provider.batch.Subnets[0]");
    }

    #[test]
    fn test_wrong_shapes_rejected() {
        let cases = [
            (json!({ "MinvCpus": "0" }), "provider.batch.MinvCpus"),
            (json!({ "MaxvCpus": 1.5 }), "provider.batch.MaxvCpus"),
            (json!({ "MaxvCpus": -1 }), "provider.batch.MaxvCpus"),
            (json!({ "InstanceTypes": ["c5.large", 4] }), "provider.batch.InstanceTypes[1]"),
            (json!({ "InstanceTypes": "c5.large" }), "provider.batch.InstanceTypes"),
            (json!({ "Tags": { "team": 1 } }), "provider.batch.Tags.team"),
            (json!({ "Type": "FARGATE" }), "provider.batch.Type"),
            (json!({ "Subnets": "subnet-1" }), "provider.batch.Subnets"),
            (json!({ "BidPercentage": 0 }), "provider.batch.BidPercentage"),
            (json!("not-an-object"), "provider.batch"),
        ];
        for (raw, path) in cases {
            let err = validate_provider(Some(&raw)).unwrap_err();
            assert_eq!(err.path, path, "for {raw}");
        }
    }

    #[test]
    fn test_min_greater_than_max_rejected() {
        let raw = json!({ "MinvCpus": 32, "MaxvCpus": 16 });
        let err = validate_provider(Some(&raw)).unwrap_err();
        assert_eq!(err.path, "provider.batch.MinvCpus");
    }

    #[test]
    fn test_task_block() {
        let raw = json!({
            "ContainerProperties": { "Memory": 512, "Vcpus": 1, "Environment": { "MODE": "fast" } },
            "RetryStrategy": { "Attempts": 3 },
            "Timeout": { "AttemptDurationSeconds": 900 }
        });
        let config = validate_task("resize", &raw).unwrap();
        assert_eq!(config.memory(), 512);
        assert_eq!(config.attempts(), 3);
        assert_eq!(config.attempt_duration_seconds(), 900);
        assert_eq!(config.environment().len(), 1);
    }

    #[test]
    fn test_task_errors_carry_function_path() {
        let raw = json!({ "ContainerProperties": { "Memory": "512" } });
        let err = validate_task("resize", &raw).unwrap_err();
        assert_eq!(err.path, "functions.resize.batch.ContainerProperties.Memory");

        let raw = json!({ "RetryStrategy": { "Attempts": 11 } });
        let err = validate_task("resize", &raw).unwrap_err();
        assert_eq!(err.path, "functions.resize.batch.RetryStrategy.Attempts");

        let raw = json!({ "Timeout": { "AttemptDurationSeconds": 10 } });
        let err = validate_task("resize", &raw).unwrap_err();
        assert_eq!(err.path, "functions.resize.batch.Timeout.AttemptDurationSeconds");

        let raw = json!({ "RetryStrategy": [] });
        let err = validate_task("resize", &raw).unwrap_err();
        assert_eq!(err.path, "functions.resize.batch.RetryStrategy");
    }
}

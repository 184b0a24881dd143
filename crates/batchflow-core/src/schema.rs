//! Schema extension handed to the host's configuration validation
//!
//! The host validates the service file against these schemas before any
//! hook runs; [`crate::validator`] repeats the checks on the raw values so
//! synthesis never depends on the host having done so.

use crate::model::{BatchProviderConfig, BatchTaskConfig};
use schemars::{Schema, schema_for};
use serde::Serialize;

/// Bumped whenever an accepted shape changes.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Both `batch` schemas, versioned together
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaExtension {
    pub version: &'static str,

    /// Shape of `provider.batch`
    pub provider: Schema,

    /// Shape of `functions.<name>.batch`
    pub function: Schema,
}

pub fn provider_batch_schema() -> Schema {
    schema_for!(BatchProviderConfig)
}

pub fn function_batch_schema() -> Schema {
    schema_for!(BatchTaskConfig)
}

pub fn extension() -> SchemaExtension {
    SchemaExtension {
        version: SCHEMA_VERSION,
        provider: provider_batch_schema(),
        function: function_batch_schema(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_schema_lists_fields() {
        let value = serde_json::to_value(provider_batch_schema()).unwrap();
        let properties = value["properties"].as_object().unwrap();
        for key in [
            "Type",
            "Subnets",
            "SecurityGroupIds",
            "InstanceTypes",
            "MinvCpus",
            "MaxvCpus",
            "Tags",
        ] {
            assert!(properties.contains_key(key), "missing {key}");
        }
    }

    #[test]
    fn test_function_schema_lists_fields() {
        let value = serde_json::to_value(function_batch_schema()).unwrap();
        let properties = value["properties"].as_object().unwrap();
        assert!(properties.contains_key("ContainerProperties"));
        assert!(properties.contains_key("RetryStrategy"));
        assert!(properties.contains_key("Timeout"));
    }

    #[test]
    fn test_extension_is_versioned() {
        let value = serde_json::to_value(extension()).unwrap();
        assert_eq!(value["version"], SCHEMA_VERSION);
        assert!(value["provider"].is_object());
        assert!(value["function"].is_object());
    }
}

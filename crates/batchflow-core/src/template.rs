//! Deployment template model
//!
//! The template is kept as a JSON document so resources the user authored
//! survive a round trip exactly as written. Synthesized resources enter it
//! only through [`Template::merge`], which never replaces an existing entry.

use crate::error::TemplateConflictError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";
pub const DEFAULT_DESCRIPTION: &str = "The AWS CloudFormation template for this Serverless application";

/// Deterministic identifier of a resource inside the template
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `{ "Ref": <id> }`
    pub fn to_ref(&self) -> Value {
        json!({ "Ref": self.0 })
    }

    /// `{ "Fn::GetAtt": [<id>, <attribute>] }`
    pub fn get_att(&self, attribute: &str) -> Value {
        json!({ "Fn::GetAtt": [self.0, attribute] })
    }
}

impl std::fmt::Display for LogicalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LogicalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A CloudFormation resource body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "Type")]
    pub resource_type: String,

    #[serde(rename = "DependsOn", default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<LogicalId>,

    #[serde(rename = "Properties", default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
}

/// One synthesized resource plus the resources it depends on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateFragment {
    pub logical_id: LogicalId,
    pub resource: Resource,
}

impl TemplateFragment {
    pub fn new(logical_id: LogicalId, resource_type: impl Into<String>) -> Self {
        Self {
            logical_id,
            resource: Resource {
                resource_type: resource_type.into(),
                depends_on: Vec::new(),
                properties: Map::new(),
            },
        }
    }

    /// Set the `Properties` object. Non-object values are ignored.
    pub fn with_properties(mut self, properties: Value) -> Self {
        if let Value::Object(map) = properties {
            self.resource.properties = map;
        }
        self
    }

    pub fn depends_on(mut self, target: &LogicalId) -> Self {
        if !self.resource.depends_on.contains(target) {
            self.resource.depends_on.push(target.clone());
        }
        self
    }

    pub fn resource_type(&self) -> &str {
        &self.resource.resource_type
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(&self.resource).unwrap_or(Value::Null)
    }

    /// Logical ids this fragment points at through `DependsOn`, `Ref` or `Fn::GetAtt`.
    ///
    /// Pseudo parameters (`AWS::Region`, ...) are not resources and are skipped.
    pub fn references(&self) -> BTreeSet<String> {
        let mut targets: BTreeSet<String> = self
            .resource
            .depends_on
            .iter()
            .map(|id| id.as_str().to_string())
            .collect();
        for value in self.resource.properties.values() {
            collect_references(value, &mut targets);
        }
        targets
    }
}

fn collect_references(value: &Value, targets: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(target)) = map.get("Ref") {
                    if !target.starts_with("AWS::") {
                        targets.insert(target.clone());
                    }
                    return;
                }
                match map.get("Fn::GetAtt") {
                    Some(Value::Array(parts)) => {
                        if let Some(Value::String(target)) = parts.first() {
                            targets.insert(target.clone());
                        }
                        return;
                    }
                    Some(Value::String(dotted)) => {
                        if let Some((target, _)) = dotted.split_once('.') {
                            targets.insert(target.to_string());
                        }
                        return;
                    }
                    _ => {}
                }
            }
            for nested in map.values() {
                collect_references(nested, targets);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, targets);
            }
        }
        _ => {}
    }
}

/// Outcome of a merge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Fragments written into the template
    pub added: Vec<LogicalId>,

    /// Fragments dropped because the template already had that logical id
    pub skipped: Vec<LogicalId>,
}

impl MergeReport {
    pub fn extend(&mut self, other: MergeReport) {
        self.added.extend(other.added);
        self.skipped.extend(other.skipped);
    }
}

/// The single deployment template shared with the host pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Template(Map<String, Value>);

impl Template {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(value: Value) -> Result<Self, TemplateConflictError> {
        match value {
            Value::Object(map) => {
                if let Some(resources) = map.get("Resources")
                    && !resources.is_object()
                {
                    return Err(TemplateConflictError::Malformed(
                        "`Resources` must be an object".to_string(),
                    ));
                }
                Ok(Self(map))
            }
            other => Err(TemplateConflictError::Malformed(format!(
                "expected a JSON object, found {}",
                type_name(&other)
            ))),
        }
    }

    pub fn from_json(content: &str) -> Result<Self, TemplateConflictError> {
        let value: Value = serde_json::from_str(content)
            .map_err(|e| TemplateConflictError::Malformed(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| "{}".to_string())
    }

    /// Make sure the baseline keys exist. Existing values are left alone.
    pub fn ensure_scaffolding(&mut self) {
        self.0
            .entry("AWSTemplateFormatVersion")
            .or_insert_with(|| Value::from(TEMPLATE_FORMAT_VERSION));
        self.0
            .entry("Description")
            .or_insert_with(|| Value::from(DEFAULT_DESCRIPTION));
        self.0
            .entry("Resources")
            .or_insert_with(|| Value::Object(Map::new()));
        self.0
            .entry("Outputs")
            .or_insert_with(|| Value::Object(Map::new()));
    }

    pub fn resources(&self) -> Option<&Map<String, Value>> {
        self.0.get("Resources").and_then(Value::as_object)
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Value> {
        self.resources().and_then(|r| r.get(logical_id))
    }

    pub fn contains_resource(&self, logical_id: &str) -> bool {
        self.resource(logical_id).is_some()
    }

    pub fn resource_type(&self, logical_id: &str) -> Option<&str> {
        self.resource(logical_id)
            .and_then(|r| r.get("Type"))
            .and_then(Value::as_str)
    }

    pub fn output(&self, name: &str) -> Option<&Value> {
        self.0
            .get("Outputs")
            .and_then(Value::as_object)
            .and_then(|o| o.get(name))
    }

    /// Add an output unless one with the same name exists. Returns whether it was added.
    pub fn add_output(&mut self, name: &str, output: Value) -> bool {
        let outputs = self
            .0
            .entry("Outputs")
            .or_insert_with(|| Value::Object(Map::new()));
        match outputs.as_object_mut() {
            Some(map) if !map.contains_key(name) => {
                map.insert(name.to_string(), output);
                true
            }
            _ => false,
        }
    }

    /// Merge fragments without clobbering.
    ///
    /// A fragment whose logical id is already present is skipped, provided
    /// the existing resource has the same `Type`; a different type means the
    /// synthesized references into it cannot hold and the merge fails. Every
    /// reference of an added fragment must resolve inside the merged result.
    /// Nothing is written unless the whole set merges.
    pub fn merge(
        &mut self,
        fragments: Vec<TemplateFragment>,
    ) -> Result<MergeReport, TemplateConflictError> {
        let mut report = MergeReport::default();
        let mut pending: Vec<TemplateFragment> = Vec::new();

        for fragment in fragments {
            match self.resource_type(fragment.logical_id.as_str()) {
                Some(found) if found != fragment.resource_type() => {
                    return Err(TemplateConflictError::TypeMismatch {
                        logical_id: fragment.logical_id.to_string(),
                        expected: fragment.resource_type().to_string(),
                        found: found.to_string(),
                    });
                }
                _ if self.contains_resource(fragment.logical_id.as_str()) => {
                    tracing::debug!(
                        logical_id = %fragment.logical_id,
                        "Resource already defined, keeping the existing one"
                    );
                    report.skipped.push(fragment.logical_id);
                }
                _ if pending.iter().any(|p| p.logical_id == fragment.logical_id) => {
                    report.skipped.push(fragment.logical_id);
                }
                _ => pending.push(fragment),
            }
        }

        for fragment in &pending {
            for target in fragment.references() {
                let resolvable = self.contains_resource(&target)
                    || pending.iter().any(|p| p.logical_id.as_str() == target);
                if !resolvable {
                    return Err(TemplateConflictError::UnresolvedReference {
                        from: fragment.logical_id.to_string(),
                        target,
                    });
                }
            }
        }

        let resources = self
            .0
            .entry("Resources")
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(resources) = resources.as_object_mut() else {
            return Err(TemplateConflictError::Malformed(
                "`Resources` must be an object".to_string(),
            ));
        };
        for fragment in pending {
            resources.insert(fragment.logical_id.to_string(), fragment.to_value());
            report.added.push(fragment.logical_id);
        }

        Ok(report)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(id: &str) -> TemplateFragment {
        TemplateFragment::new(LogicalId::new(id), "AWS::IAM::Role")
    }

    #[test]
    fn test_ensure_scaffolding_keeps_existing_values() {
        let mut template = Template::from_value(json!({
            "Description": "custom",
            "Resources": { "Bucket": { "Type": "AWS::S3::Bucket" } }
        }))
        .unwrap();
        template.ensure_scaffolding();

        let value = template.as_value();
        assert_eq!(value["Description"], "custom");
        assert_eq!(value["AWSTemplateFormatVersion"], TEMPLATE_FORMAT_VERSION);
        assert!(template.contains_resource("Bucket"));
        assert!(value["Outputs"].is_object());
    }

    #[test]
    fn test_from_value_rejects_non_object() {
        assert!(matches!(
            Template::from_value(json!([1, 2])),
            Err(TemplateConflictError::Malformed(_))
        ));
        assert!(matches!(
            Template::from_value(json!({ "Resources": [] })),
            Err(TemplateConflictError::Malformed(_))
        ));
    }

    #[test]
    fn test_references_skip_pseudo_parameters() {
        let fragment = role("Queue")
            .depends_on(&LogicalId::new("Env"))
            .with_properties(json!({
                "A": { "Ref": "AWS::Region" },
                "B": { "Fn::GetAtt": ["Role", "Arn"] },
                "C": [{ "Fn::GetAtt": "Profile.Arn" }],
                "D": { "Fn::Sub": "arn:${AWS::Partition}:iam::aws:policy/x" }
            }));
        let refs: Vec<String> = fragment.references().into_iter().collect();
        assert_eq!(refs, vec!["Env", "Profile", "Role"]);
    }

    #[test]
    fn test_merge_does_not_clobber() {
        let mut template = Template::from_value(json!({
            "Resources": {
                "ServiceRole": { "Type": "AWS::IAM::Role", "Properties": { "RoleName": "mine" } }
            }
        }))
        .unwrap();

        let report = template
            .merge(vec![role("ServiceRole"), role("OtherRole")])
            .unwrap();

        assert_eq!(report.added, vec![LogicalId::new("OtherRole")]);
        assert_eq!(report.skipped, vec![LogicalId::new("ServiceRole")]);
        assert_eq!(
            template.resource("ServiceRole").unwrap()["Properties"]["RoleName"],
            "mine"
        );
    }

    #[test]
    fn test_merge_type_mismatch() {
        let mut template = Template::from_value(json!({
            "Resources": { "ServiceRole": { "Type": "AWS::S3::Bucket" } }
        }))
        .unwrap();
        let err = template.merge(vec![role("ServiceRole")]).unwrap_err();
        assert!(matches!(err, TemplateConflictError::TypeMismatch { .. }));
    }

    #[test]
    fn test_merge_unresolved_reference_writes_nothing() {
        let mut template = Template::new();
        let queue = role("Queue").depends_on(&LogicalId::new("Missing"));
        let err = template.merge(vec![role("Fine"), queue]).unwrap_err();
        assert_eq!(
            err,
            TemplateConflictError::UnresolvedReference {
                from: "Queue".to_string(),
                target: "Missing".to_string(),
            }
        );
        assert!(!template.contains_resource("Fine"));
    }

    #[test]
    fn test_add_output_is_non_clobbering() {
        let mut template = Template::new();
        assert!(template.add_output("QueueArn", json!({ "Value": "a" })));
        assert!(!template.add_output("QueueArn", json!({ "Value": "b" })));
        assert_eq!(template.output("QueueArn").unwrap()["Value"], "a");
    }
}

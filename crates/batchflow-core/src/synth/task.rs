//! Job definitions

use crate::model::BatchTask;
use crate::naming::Naming;
use crate::template::TemplateFragment;
use serde_json::{Value, json};

/// Placeholder substituted by the submitter with the serialized event
const EVENT_PARAMETER: &str = "Ref::event";

pub fn job_definition(naming: &Naming, task: &BatchTask, image_tag: &str) -> TemplateFragment {
    let execution_role = naming.job_execution_role_logical_id();
    let config = &task.config;

    let environment: Vec<Value> = config
        .environment()
        .into_iter()
        .map(|(name, value)| json!({ "Name": name, "Value": value }))
        .collect();

    TemplateFragment::new(
        naming.job_definition_logical_id(&task.name),
        "AWS::Batch::JobDefinition",
    )
    .depends_on(&execution_role)
    .depends_on(&naming.ecr_logical_id())
    .with_properties(json!({
        "Type": "container",
        "JobDefinitionName": naming.job_definition_name(&task.name),
        "Parameters": { "event": "{}" },
        "ContainerProperties": {
            "Image": naming.ecr_image(image_tag),
            "Command": [task.handler, EVENT_PARAMETER],
            "Memory": config.memory(),
            "Vcpus": config.vcpus(),
            "Environment": environment,
            "JobRoleArn": execution_role.get_att("Arn"),
        },
        "RetryStrategy": { "Attempts": config.attempts() },
        "Timeout": { "AttemptDurationSeconds": config.attempt_duration_seconds() },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BatchTaskConfig, ContainerProperties};
    use std::collections::BTreeMap;

    #[test]
    fn test_job_definition_defaults() {
        let naming = Naming::new("svc", "dev").unwrap();
        let task = BatchTask::new("resize", "handler.resize", BatchTaskConfig::default());
        let fragment = job_definition(&naming, &task, "dev-0123456789ab");
        let props = &fragment.resource.properties;

        assert_eq!(fragment.logical_id.as_str(), "resizeBatchJobDefinition");
        assert_eq!(props["JobDefinitionName"], "svc-dev-resize");
        assert_eq!(
            props["ContainerProperties"]["Command"],
            json!(["handler.resize", "Ref::event"])
        );
        assert_eq!(props["ContainerProperties"]["Memory"], 2048);
        assert_eq!(props["RetryStrategy"]["Attempts"], 1);
        assert_eq!(props["Timeout"]["AttemptDurationSeconds"], 300);
        assert_eq!(props["ContainerProperties"]["Environment"], json!([]));
    }

    #[test]
    fn test_job_definition_environment_and_dependencies() {
        let naming = Naming::new("svc", "dev").unwrap();
        let config = BatchTaskConfig {
            container_properties: Some(ContainerProperties {
                memory: Some(4096),
                vcpus: Some(2),
                environment: Some(BTreeMap::from([
                    ("B".to_string(), "2".to_string()),
                    ("A".to_string(), "1".to_string()),
                ])),
            }),
            ..Default::default()
        };
        let task = BatchTask::new("job", "handler.job", config);
        let fragment = job_definition(&naming, &task, "dev-x");

        assert_eq!(
            fragment.resource.properties["ContainerProperties"]["Environment"],
            json!([{ "Name": "A", "Value": "1" }, { "Name": "B", "Value": "2" }])
        );
        let refs = fragment.references();
        assert!(refs.contains("BatchJobExecutionRole"));
        assert!(refs.contains("BatchEcrRepository"));
    }
}

//! Compute environment, job queue and image repository

use crate::model::BatchProviderConfig;
use crate::naming::Naming;
use crate::template::TemplateFragment;
use serde_json::{Value, json};

/// Untagged images older than this are expired by the repository itself
const UNTAGGED_IMAGE_RETENTION_DAYS: u32 = 1;

pub fn compute_environment(naming: &Naming, config: &BatchProviderConfig) -> TemplateFragment {
    let service_role = naming.service_role_logical_id();

    let mut compute_resources = json!({
        "Type": config.compute_type().as_str(),
        "MinvCpus": config.min_vcpus(),
        "MaxvCpus": config.max_vcpus(),
        "InstanceTypes": config.instance_types(),
        "Subnets": config.subnets().to_template_value(),
        "SecurityGroupIds": config.security_group_ids().to_template_value(),
        "InstanceRole": naming.instance_management_profile_logical_id().get_att("Arn"),
    });
    if let Some(desired) = config.desired_vcpus {
        compute_resources["DesiredvCpus"] = json!(desired);
    }
    let tags = config.tags();
    if !tags.is_empty() {
        compute_resources["Tags"] = json!(tags);
    }
    if config.is_spot() {
        compute_resources["SpotIamFleetRole"] = naming
            .spot_fleet_management_role_logical_id()
            .get_att("Arn");
        if let Some(bid) = config.bid_percentage {
            compute_resources["BidPercentage"] = json!(bid);
        }
    }

    TemplateFragment::new(
        naming.compute_environment_logical_id(),
        "AWS::Batch::ComputeEnvironment",
    )
    .depends_on(&service_role)
    .with_properties(json!({
        "Type": "MANAGED",
        "State": "ENABLED",
        "ServiceRole": service_role.get_att("Arn"),
        "ComputeResources": compute_resources,
    }))
}

pub fn job_queue(naming: &Naming) -> TemplateFragment {
    let compute_environment = naming.compute_environment_logical_id();

    TemplateFragment::new(naming.job_queue_logical_id(), "AWS::Batch::JobQueue")
        .depends_on(&compute_environment)
        .with_properties(json!({
            "JobQueueName": naming.job_queue_name(),
            "Priority": 1,
            "State": "ENABLED",
            "ComputeEnvironmentOrder": [{
                "Order": 1,
                "ComputeEnvironment": compute_environment.to_ref(),
            }],
        }))
}

pub fn ecr_repository(naming: &Naming) -> TemplateFragment {
    TemplateFragment::new(naming.ecr_logical_id(), "AWS::ECR::Repository").with_properties(json!({
        "RepositoryName": naming.ecr_repository_name(),
        "LifecyclePolicy": { "LifecyclePolicyText": lifecycle_policy_text() },
    }))
}

fn lifecycle_policy_text() -> String {
    let policy: Value = json!({
        "rules": [{
            "rulePriority": 1,
            "description": "Expire untagged images",
            "selection": {
                "tagStatus": "untagged",
                "countType": "sinceImagePushed",
                "countUnit": "days",
                "countNumber": UNTAGGED_IMAGE_RETENTION_DAYS,
            },
            "action": { "type": "expire" },
        }]
    });
    policy.to_string()
}

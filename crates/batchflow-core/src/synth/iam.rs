//! IAM roles for the compute environment, the jobs and the job scheduler

use crate::model::BatchTask;
use crate::naming::Naming;
use crate::template::{LogicalId, TemplateFragment};
use serde_json::{Value, json};

const POLICY_VERSION: &str = "2012-10-17";

fn assume_role_policy(principal: &str) -> Value {
    json!({
        "Version": POLICY_VERSION,
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": [principal] },
            "Action": ["sts:AssumeRole"]
        }]
    })
}

fn managed_policy(name: &str) -> Value {
    json!({ "Fn::Sub": format!("arn:${{AWS::Partition}}:iam::aws:policy/{name}") })
}

fn role(logical_id: LogicalId, principal: &str, managed: &[&str]) -> TemplateFragment {
    let mut properties = json!({ "AssumeRolePolicyDocument": assume_role_policy(principal) });
    if !managed.is_empty() {
        properties["ManagedPolicyArns"] =
            Value::Array(managed.iter().map(|name| managed_policy(name)).collect());
    }
    TemplateFragment::new(logical_id, "AWS::IAM::Role").with_properties(properties)
}

/// Role assumed by the Batch service to manage the compute environment
pub fn service_role(naming: &Naming) -> TemplateFragment {
    role(
        naming.service_role_logical_id(),
        "batch.amazonaws.com",
        &["service-role/AWSBatchServiceRole"],
    )
}

/// Role of the ECS container instances, plus the profile wrapping it
pub fn instance_management(naming: &Naming) -> [TemplateFragment; 2] {
    let role_id = naming.instance_management_role_logical_id();
    let instance_role = role(
        role_id.clone(),
        "ec2.amazonaws.com",
        &["service-role/AmazonEC2ContainerServiceforEC2Role"],
    );
    let profile = TemplateFragment::new(
        naming.instance_management_profile_logical_id(),
        "AWS::IAM::InstanceProfile",
    )
    .with_properties(json!({ "Roles": [role_id.to_ref()] }));

    [instance_role, profile]
}

pub fn spot_fleet_management_role(naming: &Naming) -> TemplateFragment {
    role(
        naming.spot_fleet_management_role_logical_id(),
        "spotfleet.amazonaws.com",
        &["service-role/AmazonEC2SpotFleetTaggingRole"],
    )
}

/// Role the job containers run as.
///
/// Carries the service's IAM statements so a job gets the permissions the
/// function would have had.
pub fn job_execution_role(naming: &Naming, statements: &[Value]) -> TemplateFragment {
    let mut fragment = role(naming.job_execution_role_logical_id(), "ecs-tasks.amazonaws.com", &[]);
    if !statements.is_empty() {
        fragment.resource.properties.insert(
            "Policies".to_string(),
            json!([{
                "PolicyName": format!("{}-{}-batch-job", naming.service(), naming.stage()),
                "PolicyDocument": { "Version": POLICY_VERSION, "Statement": statements }
            }]),
        );
    }
    fragment
}

/// Role for functions that submit jobs to the queue
pub fn lambda_schedule_execution_role(naming: &Naming, tasks: &[BatchTask]) -> TemplateFragment {
    let mut resources = vec![naming.job_queue_logical_id().to_ref()];
    resources.extend(
        tasks
            .iter()
            .map(|t| naming.job_definition_logical_id(&t.name).to_ref()),
    );

    let mut fragment = role(
        naming.lambda_schedule_execution_role_logical_id(),
        "lambda.amazonaws.com",
        &["service-role/AWSLambdaBasicExecutionRole"],
    );
    fragment.resource.properties.insert(
        "Policies".to_string(),
        json!([{
            "PolicyName": format!("{}-{}-batch-submit", naming.service(), naming.stage()),
            "PolicyDocument": {
                "Version": POLICY_VERSION,
                "Statement": [{
                    "Effect": "Allow",
                    "Action": ["batch:SubmitJob"],
                    "Resource": resources
                }]
            }
        }]),
    );
    fragment
}

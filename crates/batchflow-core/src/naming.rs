//! Resource naming
//!
//! One pure function per resource role. The synthesizer, the image
//! lifecycle and the CLI all resolve names through a shared [`Naming`]
//! value, so a role always maps to the same logical id and physical name.

use crate::template::LogicalId;
use serde_json::{Value, json};

const COMPUTE_ENVIRONMENT: &str = "BatchComputeEnvironment";
const JOB_QUEUE: &str = "BatchJobQueue";
const SERVICE_ROLE: &str = "BatchServiceRole";
const INSTANCE_MANAGEMENT_ROLE: &str = "BatchInstanceManagementRole";
const INSTANCE_MANAGEMENT_PROFILE: &str = "BatchInstanceManagementProfile";
const SPOT_FLEET_MANAGEMENT_ROLE: &str = "BatchSpotFleetManagementRole";
const JOB_EXECUTION_ROLE: &str = "BatchJobExecutionRole";
const LAMBDA_SCHEDULE_EXECUTION_ROLE: &str = "LambdaScheduleExecutionRole";
const ECR_REPOSITORY: &str = "BatchEcrRepository";
const JOB_DEFINITION_SUFFIX: &str = "BatchJobDefinition";

/// Naming scope of one deployed service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Naming {
    service: String,
    stage: String,
}

impl Naming {
    /// Returns `None` when the service or stage name is empty.
    pub fn new(service: impl Into<String>, stage: impl Into<String>) -> Option<Self> {
        let service = service.into();
        let stage = stage.into();
        if service.is_empty() || stage.is_empty() {
            return None;
        }
        Some(Self { service, stage })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn compute_environment_logical_id(&self) -> LogicalId {
        LogicalId::new(COMPUTE_ENVIRONMENT)
    }

    pub fn job_queue_logical_id(&self) -> LogicalId {
        LogicalId::new(JOB_QUEUE)
    }

    pub fn job_queue_name(&self) -> String {
        format!("{}-{}-JobQueue", self.service, self.stage)
    }

    pub fn service_role_logical_id(&self) -> LogicalId {
        LogicalId::new(SERVICE_ROLE)
    }

    pub fn instance_management_role_logical_id(&self) -> LogicalId {
        LogicalId::new(INSTANCE_MANAGEMENT_ROLE)
    }

    pub fn instance_management_profile_logical_id(&self) -> LogicalId {
        LogicalId::new(INSTANCE_MANAGEMENT_PROFILE)
    }

    pub fn spot_fleet_management_role_logical_id(&self) -> LogicalId {
        LogicalId::new(SPOT_FLEET_MANAGEMENT_ROLE)
    }

    pub fn job_execution_role_logical_id(&self) -> LogicalId {
        LogicalId::new(JOB_EXECUTION_ROLE)
    }

    pub fn lambda_schedule_execution_role_logical_id(&self) -> LogicalId {
        LogicalId::new(LAMBDA_SCHEDULE_EXECUTION_ROLE)
    }

    pub fn ecr_logical_id(&self) -> LogicalId {
        LogicalId::new(ECR_REPOSITORY)
    }

    /// ECR only accepts `[a-z0-9._/-]`; anything else becomes `-`.
    pub fn ecr_repository_name(&self) -> String {
        format!("{}-{}", self.service, self.stage)
            .to_lowercase()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '-') {
                    c
                } else {
                    '-'
                }
            })
            .collect()
    }

    /// Repository URI as a CloudFormation expression, resolved at deploy time
    pub fn ecr_repository_url(&self) -> Value {
        self.ecr_logical_id().get_att("RepositoryUri")
    }

    /// Concrete repository URI for a registry host such as
    /// `123456789012.dkr.ecr.us-east-1.amazonaws.com`
    pub fn ecr_repository_uri(&self, registry_host: &str) -> String {
        let host = registry_host
            .trim_start_matches("https://")
            .trim_end_matches('/');
        format!("{}/{}", host, self.ecr_repository_name())
    }

    /// Image expression for a job definition: repository URI plus tag
    pub fn ecr_image(&self, tag: &str) -> Value {
        json!({ "Fn::Join": ["", [self.ecr_repository_url(), ":", tag]] })
    }

    pub fn job_definition_logical_id(&self, task: &str) -> LogicalId {
        debug_assert!(!task.is_empty(), "task name must not be empty");
        LogicalId::new(format!("{}{}", encode_task_name(task), JOB_DEFINITION_SUFFIX))
    }

    pub fn job_definition_name(&self, task: &str) -> String {
        debug_assert!(!task.is_empty(), "task name must not be empty");
        format!("{}-{}-{}", self.service, self.stage, task)
    }
}

/// Injective mapping of a task name onto `[A-Za-z0-9]`.
///
/// `Z` is the escape character. Escape tokens start with distinct letters
/// (`Z`, `Dash`, `Underscore`, `X`), so every output decodes to exactly one input.
fn encode_task_name(task: &str) -> String {
    let mut encoded = String::with_capacity(task.len());
    for c in task.chars() {
        match c {
            'Z' => encoded.push_str("ZZ"),
            '-' => encoded.push_str("ZDash"),
            '_' => encoded.push_str("ZUnderscore"),
            c if c.is_ascii_alphanumeric() => encoded.push(c),
            c => encoded.push_str(&format!("ZX{:06X}", c as u32)),
        }
    }
    encoded
}

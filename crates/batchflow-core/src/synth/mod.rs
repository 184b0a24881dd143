//! Template synthesis
//!
//! Two passes mirror the two points of the host pipeline that touch the
//! template:
//!
//! - [`synthesize_environment`] adds the shared infrastructure (compute
//!   environment, job queue, roles, image repository) once the template exists.
//! - [`compile_tasks`] adds one job definition per batch task after the image
//!   tag is known, plus the role functions use to submit jobs.
//!
//! Both go through [`Template::merge`], so anything the user already declared
//! under the same logical id wins and running a pass twice changes nothing.

mod environment;
mod iam;
mod task;

use crate::error::Result;
use crate::model::{BatchProviderConfig, BatchTask};
use crate::naming::Naming;
use crate::template::{MergeReport, Template, TemplateFragment};
use serde_json::{Value, json};

/// Name of the output exposing the job queue
pub const JOB_QUEUE_OUTPUT: &str = "BatchJobQueueArn";

/// Builds fragments for one naming scope
#[derive(Debug, Clone, Copy)]
pub struct Synthesizer<'a> {
    naming: &'a Naming,
}

impl<'a> Synthesizer<'a> {
    pub fn new(naming: &'a Naming) -> Self {
        Self { naming }
    }

    /// Shared infrastructure fragments, in dependency order.
    ///
    /// `iam_statements` are the service's provider-level statements; they are
    /// attached to the job execution role.
    pub fn environment_fragments(
        &self,
        config: &BatchProviderConfig,
        iam_statements: &[Value],
    ) -> Result<Vec<TemplateFragment>> {
        config.check_vcpu_bounds()?;

        let naming = self.naming;
        let mut fragments = vec![iam::service_role(naming)];
        fragments.extend(iam::instance_management(naming));
        if config.is_spot() {
            fragments.push(iam::spot_fleet_management_role(naming));
        }
        fragments.push(environment::compute_environment(naming, config));
        fragments.push(environment::job_queue(naming));
        fragments.push(environment::ecr_repository(naming));
        fragments.push(iam::job_execution_role(naming, iam_statements));
        Ok(fragments)
    }

    /// Job definitions for `tasks`, each pointing at `image_tag`.
    ///
    /// Empty when there are no tasks.
    pub fn task_fragments(&self, tasks: &[BatchTask], image_tag: &str) -> Vec<TemplateFragment> {
        if tasks.is_empty() {
            return Vec::new();
        }
        let mut fragments: Vec<TemplateFragment> = tasks
            .iter()
            .map(|t| task::job_definition(self.naming, t, image_tag))
            .collect();
        fragments.push(iam::lambda_schedule_execution_role(self.naming, tasks));
        fragments
    }
}

/// Initialize step: make sure the template has its baseline keys.
pub fn generate_core_template(template: &mut Template) {
    template.ensure_scaffolding();
    tracing::debug!("Core template scaffolding in place");
}

/// Merge the shared infrastructure into `template`.
pub fn synthesize_environment(
    template: &mut Template,
    naming: &Naming,
    config: &BatchProviderConfig,
    iam_statements: &[Value],
) -> Result<MergeReport> {
    let fragments = Synthesizer::new(naming).environment_fragments(config, iam_statements)?;
    generate_core_template(template);
    let report = template.merge(fragments)?;

    tracing::info!(
        added = report.added.len(),
        skipped = report.skipped.len(),
        "Synthesized batch environment"
    );
    Ok(report)
}

/// Merge one job definition per task into `template`.
///
/// The environment must already be part of the template; otherwise the
/// job definitions' references cannot resolve and the merge fails.
pub fn compile_tasks(
    template: &mut Template,
    naming: &Naming,
    tasks: &[BatchTask],
    image_tag: &str,
) -> Result<MergeReport> {
    let fragments = Synthesizer::new(naming).task_fragments(tasks, image_tag);
    let report = template.merge(fragments)?;

    let queue = naming.job_queue_logical_id();
    if template.contains_resource(queue.as_str()) {
        template.add_output(
            JOB_QUEUE_OUTPUT,
            json!({ "Description": "ARN of the batch job queue", "Value": queue.to_ref() }),
        );
    }

    tracing::info!(
        tasks = tasks.len(),
        added = report.added.len(),
        skipped = report.skipped.len(),
        "Compiled batch tasks"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SynthesisError, TemplateConflictError};
    use crate::model::{BatchTaskConfig, ComputeType};

    fn naming() -> Naming {
        Naming::new("image-service", "dev").unwrap()
    }

    fn tasks() -> Vec<BatchTask> {
        vec![
            BatchTask::new("resize", "handler.resize", BatchTaskConfig::default()),
            BatchTask::new("thumbnail", "handler.thumbnail", BatchTaskConfig::default()),
        ]
    }

    fn synthesize(template: &mut Template) {
        synthesize_environment(template, &naming(), &BatchProviderConfig::default(), &[]).unwrap();
        compile_tasks(template, &naming(), &tasks(), "dev-0123456789ab").unwrap();
    }

    #[test]
    fn test_full_synthesis_on_empty_template() {
        let mut template = Template::new();
        synthesize(&mut template);

        let resources = template.resources().unwrap();
        for id in [
            "BatchServiceRole",
            "BatchInstanceManagementRole",
            "BatchInstanceManagementProfile",
            "BatchComputeEnvironment",
            "BatchJobQueue",
            "BatchEcrRepository",
            "BatchJobExecutionRole",
            "LambdaScheduleExecutionRole",
            "resizeBatchJobDefinition",
            "thumbnailBatchJobDefinition",
        ] {
            assert!(resources.contains_key(id), "missing {id}");
        }
        assert!(!resources.contains_key("BatchSpotFleetManagementRole"));
        assert_eq!(
            template.output(JOB_QUEUE_OUTPUT).unwrap()["Value"],
            json!({ "Ref": "BatchJobQueue" })
        );
    }

    #[test]
    fn test_single_task_wiring() {
        use crate::model::ContainerProperties;

        let config = BatchProviderConfig {
            min_vcpus: Some(0),
            max_vcpus: Some(16),
            ..Default::default()
        };
        let task = BatchTask::new(
            "T1",
            "handler.t1",
            BatchTaskConfig {
                container_properties: Some(ContainerProperties {
                    memory: Some(512),
                    vcpus: Some(1),
                    environment: None,
                }),
                ..Default::default()
            },
        );

        let mut template = Template::new();
        synthesize_environment(&mut template, &naming(), &config, &[]).unwrap();
        compile_tasks(&mut template, &naming(), &[task], "dev-0123456789ab").unwrap();

        let environment = template.resource("BatchComputeEnvironment").unwrap();
        assert_eq!(environment["Properties"]["ComputeResources"]["MaxvCpus"], 16);

        let queue = template.resource("BatchJobQueue").unwrap();
        assert_eq!(queue["DependsOn"], json!(["BatchComputeEnvironment"]));

        let definition = template.resource("T1BatchJobDefinition").unwrap();
        assert!(
            definition["DependsOn"]
                .as_array()
                .unwrap()
                .contains(&json!("BatchJobExecutionRole"))
        );
        let image = &definition["Properties"]["ContainerProperties"]["Image"];
        assert_eq!(image["Fn::Join"][1][0], naming().ecr_repository_url());
        assert_eq!(definition["Properties"]["ContainerProperties"]["Memory"], 512);
    }

    #[test]
    fn test_synthesis_is_idempotent() {
        let mut template = Template::new();
        synthesize(&mut template);
        let first = template.to_json_pretty();

        synthesize(&mut template);
        assert_eq!(template.to_json_pretty(), first);
    }

    #[test]
    fn test_fresh_templates_are_byte_identical() {
        let mut first = Template::new();
        let mut second = Template::new();
        synthesize(&mut first);
        synthesize(&mut second);
        assert_eq!(first.to_json_pretty(), second.to_json_pretty());

        let naming = naming();
        let config = BatchProviderConfig {
            compute_type: Some(ComputeType::Spot),
            bid_percentage: Some(60),
            ..Default::default()
        };
        let statements = [json!({ "Effect": "Allow", "Action": "s3:*", "Resource": "*" })];
        let synthesizer = Synthesizer::new(&naming);
        assert_eq!(
            synthesizer.environment_fragments(&config, &statements).unwrap(),
            synthesizer.environment_fragments(&config, &statements).unwrap()
        );
        assert_eq!(
            synthesizer.task_fragments(&tasks(), "dev-0123456789ab"),
            synthesizer.task_fragments(&tasks(), "dev-0123456789ab")
        );
    }

    #[test]
    fn test_user_resources_are_preserved() {
        let mut template = Template::from_value(json!({
            "Resources": {
                "BatchJobQueue": {
                    "Type": "AWS::Batch::JobQueue",
                    "Properties": { "JobQueueName": "hand-written", "Priority": 10 }
                },
                "Bucket": { "Type": "AWS::S3::Bucket" }
            }
        }))
        .unwrap();

        let report = synthesize_environment(
            &mut template,
            &naming(),
            &BatchProviderConfig::default(),
            &[],
        )
        .unwrap();

        assert!(report.skipped.iter().any(|id| id.as_str() == "BatchJobQueue"));
        let queue = template.resource("BatchJobQueue").unwrap();
        assert_eq!(queue["Properties"]["JobQueueName"], "hand-written");
        assert!(template.contains_resource("Bucket"));
    }

    #[test]
    fn test_spot_adds_fleet_role() {
        let config = BatchProviderConfig {
            compute_type: Some(ComputeType::Spot),
            ..Default::default()
        };
        let mut template = Template::new();
        synthesize_environment(&mut template, &naming(), &config, &[]).unwrap();
        assert!(template.contains_resource("BatchSpotFleetManagementRole"));
    }

    #[test]
    fn test_invalid_vcpu_bounds_leave_template_untouched() {
        let config = BatchProviderConfig {
            min_vcpus: Some(64),
            max_vcpus: Some(8),
            ..Default::default()
        };
        let mut template = Template::new();
        let err = synthesize_environment(&mut template, &naming(), &config, &[]).unwrap_err();
        assert!(matches!(err, SynthesisError::Configuration(_)));
        assert_eq!(template, Template::new());
    }

    #[test]
    fn test_compile_without_environment_fails() {
        let mut template = Template::new();
        let err = compile_tasks(&mut template, &naming(), &tasks(), "dev-x").unwrap_err();
        assert!(matches!(
            err,
            SynthesisError::Conflict(TemplateConflictError::UnresolvedReference { .. })
        ));
        assert!(template.output(JOB_QUEUE_OUTPUT).is_none());
    }

    #[test]
    fn test_compile_with_no_tasks_adds_only_output() {
        let mut template = Template::new();
        synthesize_environment(&mut template, &naming(), &BatchProviderConfig::default(), &[])
            .unwrap();
        let report = compile_tasks(&mut template, &naming(), &[], "dev-x").unwrap();
        assert!(report.added.is_empty());
        assert!(!template.contains_resource("LambdaScheduleExecutionRole"));
        assert!(template.output(JOB_QUEUE_OUTPUT).is_some());
    }

    #[test]
    fn test_conflicting_resource_type_is_reported() {
        let mut template = Template::from_value(json!({
            "Resources": { "BatchEcrRepository": { "Type": "AWS::S3::Bucket" } }
        }))
        .unwrap();
        let err = synthesize_environment(
            &mut template,
            &naming(),
            &BatchProviderConfig::default(),
            &[],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SynthesisError::Conflict(TemplateConflictError::TypeMismatch { .. })
        ));
    }
}

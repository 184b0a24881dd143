//! The hook orchestrator
//!
//! [`BatchPlugin`] holds everything one deployment run shares between
//! hook points: the service description, the naming scope, the template
//! being assembled, the validated configuration, and the image tag and
//! reference once they are known. The host pipeline calls [`BatchPlugin::run`]
//! once per hook point; the plugin never decides the order of points itself.

use crate::error::{HookError, Result, StepError};
use crate::hooks::{HookPoint, PhaseRun, Step};
use batchflow_build::{
    BuildError, ContainerEngine, CredentialProvider, ImageLifecycle, ImageReference, PushError,
    RegistryClient, derive_tag,
};
use batchflow_config::ServiceDescription;
use batchflow_core::{
    BatchProviderConfig, BatchTask, ConfigurationError, Naming, SynthesisError, Template,
    TemplateConflictError, compile_tasks, generate_core_template, synthesize_environment,
    validate_provider, validate_task,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// External capabilities the image steps need
///
/// One adapter often covers several capabilities, so they are shared.
#[derive(Clone)]
pub struct Capabilities {
    pub engine: Arc<dyn ContainerEngine>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub registry: Arc<dyn RegistryClient>,
}

/// Validated configuration
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    pub provider: BatchProviderConfig,
    pub tasks: Vec<BatchTask>,
}

/// A step failure before it is attributed to a hook point
#[derive(Debug)]
struct StepFailure {
    subject: Option<String>,
    source: StepError,
}

impl StepFailure {
    fn new(subject: Option<String>, source: impl Into<StepError>) -> Self {
        Self {
            subject,
            source: source.into(),
        }
    }

    fn about(subject: impl Into<String>, source: impl Into<StepError>) -> Self {
        Self::new(Some(subject.into()), source)
    }

    /// Registry authentication failures seen while pushing belong to the push.
    fn into_push(self) -> Self {
        match self.source {
            StepError::Build(BuildError::Auth(e)) => Self {
                subject: self.subject,
                source: StepError::Push(PushError::Auth(e)),
            },
            source => Self { source, ..self },
        }
    }
}

type StepResult<T> = std::result::Result<T, StepFailure>;

enum StepOutcome {
    Done,
    /// The step failed but the phase continues
    Warning(String),
}

pub struct BatchPlugin {
    description: ServiceDescription,
    naming: Naming,
    context_dir: PathBuf,
    template: Template,
    capabilities: Option<Capabilities>,
    config: Option<BatchConfig>,
    image_tag: Option<String>,
    image_reference: Option<ImageReference>,
    history: Vec<PhaseRun>,
}

impl BatchPlugin {
    /// `context_dir` is the image build context, normally the service directory.
    pub fn new(
        description: ServiceDescription,
        context_dir: impl Into<PathBuf>,
    ) -> std::result::Result<Self, ConfigurationError> {
        let naming = Naming::new(
            description.service.clone(),
            description.provider.stage.clone(),
        )
        .ok_or_else(|| {
            ConfigurationError::new("service", "service and stage names must not be empty")
        })?;

        Ok(Self {
            description,
            naming,
            context_dir: context_dir.into(),
            template: Template::new(),
            capabilities: None,
            config: None,
            image_tag: None,
            image_reference: None,
            history: Vec::new(),
        })
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    /// Start from an existing template instead of an empty one
    pub fn with_template(mut self, template: Template) -> Self {
        self.template = template;
        self
    }

    pub fn naming(&self) -> &Naming {
        &self.naming
    }

    pub fn description(&self) -> &ServiceDescription {
        &self.description
    }

    pub fn context_dir(&self) -> &Path {
        &self.context_dir
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn into_template(self) -> Template {
        self.template
    }

    pub fn image_tag(&self) -> Option<&str> {
        self.image_tag.as_deref()
    }

    pub fn image_reference(&self) -> Option<&ImageReference> {
        self.image_reference.as_ref()
    }

    /// Every phase run so far, including failed ones
    pub fn history(&self) -> &[PhaseRun] {
        &self.history
    }

    /// Run the step chain bound to `point`.
    ///
    /// Steps run strictly in order and the first failure ends the phase.
    pub async fn run(&mut self, point: HookPoint) -> Result<PhaseRun> {
        tracing::info!(hook = %point, "Running hook");
        let mut run = PhaseRun::new(point);

        for &step in point.steps() {
            run.start(step);
            tracing::debug!(hook = %point, step = %step, "Step started");

            match self.run_step(step).await {
                Ok(StepOutcome::Done) => run.succeed(step),
                Ok(StepOutcome::Warning(message)) => {
                    tracing::warn!(hook = %point, step = %step, "{}", message);
                    run.fail(step);
                    run.warn(message);
                }
                Err(failure) => {
                    run.fail(step);
                    run.finish();
                    self.history.push(run);
                    return Err(HookError {
                        point,
                        step,
                        subject: failure.subject,
                        source: failure.source,
                    });
                }
            }
        }

        run.finish();
        self.history.push(run.clone());
        Ok(run)
    }

    /// Validate the `batch` blocks without touching the template.
    pub fn validate(&mut self) -> Result<&BatchConfig> {
        self.validated().map_err(|failure| HookError {
            point: HookPoint::BeforeCompile,
            step: Step::ValidateConfig,
            subject: failure.subject,
            source: failure.source,
        })
    }

    async fn run_step(&mut self, step: Step) -> StepResult<StepOutcome> {
        match step {
            Step::GenerateCoreTemplate => {
                generate_core_template(&mut self.template);
            }
            Step::ValidateConfig => {
                self.config = None;
                self.validated()?;
            }
            Step::SynthesizeEnvironment => self.synthesize_environment()?,
            Step::CompileTasks => self.compile_tasks()?,
            Step::BuildImage => self.build_image().await?,
            Step::PushImage => self.push_image().await?,
            Step::DeleteImages => return self.delete_images().await,
        }
        Ok(StepOutcome::Done)
    }

    /// The validated configuration, checked once and then reused
    fn validated(&mut self) -> StepResult<&BatchConfig> {
        let config = match self.config.take() {
            Some(config) => config,
            None => check_config(&self.description)?,
        };
        Ok(self.config.insert(config))
    }

    fn synthesize_environment(&mut self) -> StepResult<()> {
        let provider = self.validated()?.provider.clone();
        synthesize_environment(
            &mut self.template,
            &self.naming,
            &provider,
            &self.description.provider.iam_role_statements,
        )
        .map_err(synthesis_failure)?;
        Ok(())
    }

    fn compile_tasks(&mut self) -> StepResult<()> {
        let tasks = self.validated()?.tasks.clone();
        let tag = self.ensure_tag()?;
        compile_tasks(&mut self.template, &self.naming, &tasks, &tag)
            .map_err(synthesis_failure)?;
        Ok(())
    }

    async fn build_image(&mut self) -> StepResult<()> {
        let reference = self.ensure_reference().await?;
        let runtime = self.description.batch_runtime().to_string();
        self.lifecycle()?
            .build(&self.context_dir, &runtime, &reference)
            .await
            .map_err(|e| StepFailure::about(reference.full_name(), e))
    }

    async fn push_image(&mut self) -> StepResult<()> {
        let reference = self
            .ensure_reference()
            .await
            .map_err(StepFailure::into_push)?;
        self.lifecycle()?
            .push(&reference)
            .await
            .map_err(|e| StepFailure::about(reference.full_name(), e))
    }

    async fn delete_images(&mut self) -> StepResult<StepOutcome> {
        let repository = self.naming.ecr_repository_name();
        match self.lifecycle()?.delete_all(&repository).await {
            Ok(report) => {
                tracing::info!(repository = %repository, deleted = report.deleted, "Registry cleaned");
                Ok(StepOutcome::Done)
            }
            Err(e) => Ok(StepOutcome::Warning(format!(
                "Registry cleanup for {} failed, continuing with removal: {}",
                repository, e
            ))),
        }
    }

    /// The image tag, derived once per run
    fn ensure_tag(&mut self) -> StepResult<String> {
        if let Some(tag) = &self.image_tag {
            return Ok(tag.clone());
        }
        let tag = derive_tag(
            &self.naming,
            &self.context_dir,
            self.description.batch_runtime(),
        )
        .map_err(|e| StepFailure::about(self.context_dir.display().to_string(), e))?;

        tracing::debug!(tag = %tag, "Derived image tag");
        self.image_tag = Some(tag.clone());
        Ok(tag)
    }

    /// The image reference, resolved once per run
    async fn ensure_reference(&mut self) -> StepResult<ImageReference> {
        if let Some(reference) = &self.image_reference {
            return Ok(reference.clone());
        }
        let lifecycle = self.lifecycle()?;
        let resolved = match &self.image_tag {
            Some(tag) => lifecycle.reference_for_tag(&self.naming, tag).await,
            None => {
                lifecycle
                    .provision_reference(
                        &self.naming,
                        &self.context_dir,
                        self.description.batch_runtime(),
                    )
                    .await
            }
        };
        let reference =
            resolved.map_err(|e| StepFailure::about(self.naming.ecr_repository_name(), e))?;

        if self.image_tag.is_none() {
            tracing::debug!(tag = %reference.tag(), "Derived image tag");
            self.image_tag = Some(reference.tag().to_string());
        }
        self.image_reference = Some(reference.clone());
        Ok(reference)
    }

    fn lifecycle(&self) -> StepResult<ImageLifecycle<'_>> {
        let capabilities = self.capabilities.as_ref().ok_or_else(|| {
            StepFailure::new(
                None,
                StepError::CapabilityUnavailable("container engine and registry access"),
            )
        })?;
        Ok(ImageLifecycle::new(
            capabilities.engine.as_ref(),
            capabilities.credentials.as_ref(),
            capabilities.registry.as_ref(),
        ))
    }
}

fn check_config(description: &ServiceDescription) -> StepResult<BatchConfig> {
    let provider = validate_provider(description.provider.batch.as_ref())
        .map_err(|e| StepFailure::about("provider.batch", e))?;

    let mut tasks = Vec::new();
    for (name, function, raw) in description.batch_functions() {
        let config = validate_task(name, raw).map_err(|e| StepFailure::about(name, e))?;
        tasks.push(BatchTask::new(name, function.handler.clone(), config));
    }
    tracing::debug!(tasks = tasks.len(), "Batch configuration is valid");

    Ok(BatchConfig { provider, tasks })
}

fn synthesis_failure(error: SynthesisError) -> StepFailure {
    let subject = match &error {
        SynthesisError::Configuration(e) => e.path.clone(),
        SynthesisError::Conflict(TemplateConflictError::UnresolvedReference { from, .. }) => {
            from.clone()
        }
        SynthesisError::Conflict(TemplateConflictError::TypeMismatch { logical_id, .. }) => {
            logical_id.clone()
        }
        SynthesisError::Conflict(TemplateConflictError::Malformed(_)) => "Resources".to_string(),
    };
    StepFailure::about(subject, error)
}

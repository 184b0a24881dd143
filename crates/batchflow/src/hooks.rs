//! Hook points of the host deployment pipeline and their step chains
//!
//! Each [`HookPoint`] owns a fixed, ordered list of [`Step`]s. A
//! [`PhaseRun`] records how far one invocation got: every step starts
//! [`StepState::Pending`], moves to `Running`, and ends `Succeeded` or
//! `Failed`. A failed step leaves the steps after it pending.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookPoint {
    /// `after:package:initialize`
    Initialize,
    /// `before:package:compileFunctions`
    BeforeCompile,
    /// `after:package:createDeploymentArtifacts`
    AfterArtifacts,
    /// `after:aws:deploy:deploy:updateStack`
    AfterStackUpdate,
    /// `before:remove:remove`
    BeforeRemove,
}

impl HookPoint {
    pub const ALL: [HookPoint; 5] = [
        HookPoint::Initialize,
        HookPoint::BeforeCompile,
        HookPoint::AfterArtifacts,
        HookPoint::AfterStackUpdate,
        HookPoint::BeforeRemove,
    ];

    /// Event name the host pipeline uses for this point
    pub fn host_event(&self) -> &'static str {
        match self {
            HookPoint::Initialize => "after:package:initialize",
            HookPoint::BeforeCompile => "before:package:compileFunctions",
            HookPoint::AfterArtifacts => "after:package:createDeploymentArtifacts",
            HookPoint::AfterStackUpdate => "after:aws:deploy:deploy:updateStack",
            HookPoint::BeforeRemove => "before:remove:remove",
        }
    }

    pub fn from_host_event(event: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.host_event() == event)
    }

    /// The step chain, in execution order
    pub fn steps(&self) -> &'static [Step] {
        match self {
            HookPoint::Initialize => &[Step::GenerateCoreTemplate],
            HookPoint::BeforeCompile => &[
                Step::ValidateConfig,
                Step::SynthesizeEnvironment,
                Step::CompileTasks,
            ],
            HookPoint::AfterArtifacts => &[Step::BuildImage],
            HookPoint::AfterStackUpdate => &[Step::PushImage],
            HookPoint::BeforeRemove => &[Step::DeleteImages],
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.host_event())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    GenerateCoreTemplate,
    ValidateConfig,
    SynthesizeEnvironment,
    CompileTasks,
    BuildImage,
    PushImage,
    DeleteImages,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::GenerateCoreTemplate => "generate core template",
            Step::ValidateConfig => "validate batch configuration",
            Step::SynthesizeEnvironment => "synthesize batch environment",
            Step::CompileTasks => "compile job definitions",
            Step::BuildImage => "build image",
            Step::PushImage => "push image",
            Step::DeleteImages => "delete registry images",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub step: Step,
    pub state: StepState,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// One invocation of a hook point
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseRun {
    pub point: HookPoint,
    pub steps: Vec<StepRecord>,
    /// Warning-class failures that did not abort the phase
    pub warnings: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PhaseRun {
    pub fn new(point: HookPoint) -> Self {
        Self {
            point,
            steps: point
                .steps()
                .iter()
                .map(|&step| StepRecord {
                    step,
                    state: StepState::Pending,
                    started_at: None,
                    finished_at: None,
                })
                .collect(),
            warnings: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn state_of(&self, step: Step) -> Option<StepState> {
        self.steps.iter().find(|r| r.step == step).map(|r| r.state)
    }

    fn record_mut(&mut self, step: Step) -> Option<&mut StepRecord> {
        self.steps.iter_mut().find(|r| r.step == step)
    }

    pub fn start(&mut self, step: Step) {
        if let Some(record) = self.record_mut(step) {
            record.state = StepState::Running;
            record.started_at = Some(Utc::now());
        }
    }

    pub fn succeed(&mut self, step: Step) {
        self.finish_step(step, StepState::Succeeded);
    }

    pub fn fail(&mut self, step: Step) {
        self.finish_step(step, StepState::Failed);
    }

    fn finish_step(&mut self, step: Step, state: StepState) {
        if let Some(record) = self.record_mut(step) {
            record.state = state;
            record.finished_at = Some(Utc::now());
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Steps that reached `state`, in order
    pub fn steps_in(&self, state: StepState) -> Vec<Step> {
        self.steps
            .iter()
            .filter(|r| r.state == state)
            .map(|r| r.step)
            .collect()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

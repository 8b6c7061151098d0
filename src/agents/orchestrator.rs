/// Orchestrator - Drives one icon task through stylist consultation and image
/// generation, in that order.
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use super::capability::{CapabilityOutput, CapabilitySet};
use super::stylist::StylistAgent;
use super::tools::{
    CONSULT_STYLIST, ConsultStylistTool, GENERATE_IMAGE, GenerateImageTool, strip_stylist_marker,
};
use crate::context::{RequestContext, RunContext, Usage, UsageTracker};
use crate::error::IconError;
use crate::pipeline::{ImagePipeline, SavedIcon};
use crate::telemetry::TelemetrySink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskPhase {
    Idle,
    AwaitingStylistConsult,
    AwaitingImageGeneration,
    Done,
    Failed,
}

impl TaskPhase {
    pub fn label(self) -> &'static str {
        match self {
            TaskPhase::Idle => "idle",
            TaskPhase::AwaitingStylistConsult => "awaiting-stylist-consult",
            TaskPhase::AwaitingImageGeneration => "awaiting-image-generation",
            TaskPhase::Done => "done",
            TaskPhase::Failed => "failed",
        }
    }

    /// The only capability this phase accepts, if any.
    pub fn expected_capability(self) -> Option<&'static str> {
        match self {
            TaskPhase::AwaitingStylistConsult => Some(CONSULT_STYLIST),
            TaskPhase::AwaitingImageGeneration => Some(GENERATE_IMAGE),
            TaskPhase::Idle | TaskPhase::Done | TaskPhase::Failed => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub icon: SavedIcon,
    pub refined_prompt: String,
    pub usage: Usage,
    pub status: String,
}

pub struct Orchestrator {
    capabilities: CapabilitySet,
    telemetry: Option<TelemetrySink>,
}

impl Orchestrator {
    pub fn new(stylist: Arc<StylistAgent>, pipeline: Arc<ImagePipeline>) -> Self {
        Self::with_capabilities(
            CapabilitySet::new()
                .with(Arc::new(ConsultStylistTool::new(stylist)))
                .with(Arc::new(GenerateImageTool::new(pipeline))),
        )
    }

    pub fn with_capabilities(capabilities: CapabilitySet) -> Self {
        Self {
            capabilities,
            telemetry: None,
        }
    }

    pub fn with_telemetry(mut self, telemetry: TelemetrySink) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn capability_names(&self) -> Vec<String> {
        self.capabilities.names()
    }

    /// Open a task in `Idle`. Nothing is accepted until [`TaskRun::start`].
    pub fn open_task(&self, request: Arc<RequestContext>, usage: UsageTracker) -> TaskRun<'_> {
        TaskRun {
            orchestrator: self,
            ctx: RunContext::new(request, usage),
            phase: TaskPhase::Idle,
            refined_prompt: None,
            icon: None,
            status: None,
            invocations: Vec::new(),
        }
    }

    /// Open a task and move it straight to `AwaitingStylistConsult`.
    pub fn start_task(&self, request: Arc<RequestContext>, usage: UsageTracker) -> TaskRun<'_> {
        let mut run = self.open_task(request, usage);
        run.begin();
        run
    }

    /// Run one task to completion: consult the stylist, then generate the
    /// image from exactly what the stylist returned.
    pub async fn run(
        &self,
        instruction: &str,
        request: Arc<RequestContext>,
        usage: UsageTracker,
    ) -> Result<TaskOutcome, IconError> {
        let mut run = self.open_task(request, usage);
        run.start()?;
        let consulted = run.invoke(CONSULT_STYLIST, instruction).await?;
        run.invoke(GENERATE_IMAGE, &consulted.text).await?;
        run.finish()
    }

    fn emit(&self, event: &str, payload: serde_json::Value) {
        if let Some(telemetry) = &self.telemetry {
            telemetry.emit(event, payload);
        }
    }
}

/// State of a single task. Capabilities are accepted strictly in
/// consult → generate order; anything else is an ordering violation.
pub struct TaskRun<'a> {
    orchestrator: &'a Orchestrator,
    ctx: RunContext,
    phase: TaskPhase,
    refined_prompt: Option<String>,
    icon: Option<SavedIcon>,
    status: Option<String>,
    invocations: Vec<String>,
}

impl TaskRun<'_> {
    pub fn phase(&self) -> TaskPhase {
        self.phase
    }

    pub fn refined_prompt(&self) -> Option<&str> {
        self.refined_prompt.as_deref()
    }

    /// Names of capabilities that were actually invoked, in order.
    pub fn invocations(&self) -> &[String] {
        &self.invocations
    }

    /// `Idle → AwaitingStylistConsult`. Any other phase is an ordering
    /// violation.
    pub fn start(&mut self) -> Result<(), IconError> {
        if self.begin() {
            return Ok(());
        }
        Err(IconError::OrderingViolation {
            capability: "start".to_string(),
            phase: self.phase.label(),
        })
    }

    fn begin(&mut self) -> bool {
        if self.phase != TaskPhase::Idle {
            return false;
        }
        self.phase = TaskPhase::AwaitingStylistConsult;
        tracing::debug!(phase = self.phase.label(), "icon task started");
        true
    }

    /// `generate_image` only accepts the text `consult_stylist` produced,
    /// with or without the marker.
    pub async fn invoke(&mut self, name: &str, input: &str) -> Result<CapabilityOutput, IconError> {
        let orchestrator = self.orchestrator;
        if orchestrator.capabilities.get(name).is_none() {
            return Err(IconError::UnknownCapability(name.to_string()));
        }
        if self.phase.expected_capability() != Some(name) {
            tracing::warn!(
                capability = name,
                phase = self.phase.label(),
                "rejected out-of-order capability call"
            );
            return Err(IconError::OrderingViolation {
                capability: name.to_string(),
                phase: self.phase.label(),
            });
        }
        if name == GENERATE_IMAGE
            && self.refined_prompt.as_deref() != Some(strip_stylist_marker(input))
        {
            tracing::warn!(
                capability = name,
                "rejected prompt that did not come from the stylist"
            );
            return Err(IconError::Delegation(format!(
                "{GENERATE_IMAGE} must be called with the stylist's refined prompt"
            )));
        }

        orchestrator.emit(
            "capability.requested",
            json!({ "capability": name, "phase": self.phase.label() }),
        );
        self.invocations.push(name.to_string());

        let result = orchestrator
            .capabilities
            .invoke(name, &self.ctx, input)
            .await;

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                tracing::warn!(capability = name, error = %err, "capability failed");
                orchestrator.emit(
                    "capability.failed",
                    json!({ "capability": name, "error": err.to_string() }),
                );
                self.phase = TaskPhase::Failed;
                return Err(err);
            }
        };

        if name == CONSULT_STYLIST {
            self.refined_prompt = Some(strip_stylist_marker(&output.text).to_string());
            self.phase = TaskPhase::AwaitingImageGeneration;
        } else {
            self.icon = output.icon.clone();
            self.status = Some(output.text.clone());
            self.phase = TaskPhase::Done;
        }

        tracing::debug!(capability = name, phase = self.phase.label(), "capability succeeded");
        orchestrator.emit(
            "capability.succeeded",
            json!({ "capability": name, "phase": self.phase.label() }),
        );
        Ok(output)
    }

    pub fn finish(self) -> Result<TaskOutcome, IconError> {
        let phase = self.phase;
        let usage = self.ctx.usage.snapshot();
        match (phase, self.icon, self.refined_prompt, self.status) {
            (TaskPhase::Done, Some(icon), Some(refined_prompt), Some(status)) => Ok(TaskOutcome {
                icon,
                refined_prompt,
                usage,
                status,
            }),
            _ => Err(IconError::OrderingViolation {
                capability: "finish".to_string(),
                phase: phase.label(),
            }),
        }
    }
}

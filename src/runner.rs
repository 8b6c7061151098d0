//! Task driver: one orchestrator run per requested icon, strictly one after
//! another.

use std::sync::Arc;

use serde_json::json;
use tracing::Instrument;

use crate::agents::{Orchestrator, StylistAgent, TaskOutcome};
use crate::cli::BatchPolicy;
use crate::config::RuntimeConfig;
use crate::context::{RequestContext, UsageLimits, UsageTracker};
use crate::error::IconError;
use crate::pipeline::{ImageFetcher, ImagePipeline};
use crate::provider::{ChatModel, ImageGenerator};
use crate::telemetry::TelemetrySink;

/// Wire agents, pipeline and driver from resolved configuration.
pub fn build_task_driver(
    cfg: &RuntimeConfig,
    chat_model: Arc<dyn ChatModel>,
    generator: Arc<dyn ImageGenerator>,
    fetcher: Arc<dyn ImageFetcher>,
    telemetry: Option<TelemetrySink>,
) -> TaskDriver {
    let stylist = Arc::new(StylistAgent::new(chat_model));
    let pipeline = Arc::new(ImagePipeline::new(cfg.pipeline_settings(), fetcher));
    let mut orchestrator = Orchestrator::new(stylist, pipeline);
    if let Some(sink) = telemetry.clone() {
        orchestrator = orchestrator.with_telemetry(sink);
    }

    let driver = TaskDriver::new(orchestrator, generator, cfg.usage_limits(), cfg.on_error);
    match telemetry {
        Some(sink) => driver.with_telemetry(sink),
        None => driver,
    }
}

#[derive(Debug, Clone)]
pub struct IconJob {
    pub art_style: String,
    pub description: String,
    pub count: u32,
}

#[derive(Debug)]
pub struct TaskRecord {
    /// 1-based position in the batch.
    pub index: u32,
    pub result: Result<TaskOutcome, IconError>,
}

/// Progress notifications from [`TaskDriver::run_batch`].
#[derive(Debug)]
pub enum BatchEvent<'a> {
    Started {
        index: u32,
        total: u32,
    },
    Finished {
        index: u32,
        total: u32,
        result: &'a Result<TaskOutcome, IconError>,
    },
}

#[derive(Debug)]
pub struct BatchReport {
    pub requested: u32,
    pub records: Vec<TaskRecord>,
    pub stopped_early: bool,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.records.iter().filter(|r| r.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.records.len() - self.succeeded()
    }

    pub fn first_error(&self) -> Option<&IconError> {
        self.records.iter().find_map(|r| r.result.as_ref().err())
    }
}

pub struct TaskDriver {
    orchestrator: Orchestrator,
    generator: Arc<dyn ImageGenerator>,
    limits: UsageLimits,
    policy: BatchPolicy,
    telemetry: Option<TelemetrySink>,
}

impl TaskDriver {
    pub fn new(
        orchestrator: Orchestrator,
        generator: Arc<dyn ImageGenerator>,
        limits: UsageLimits,
        policy: BatchPolicy,
    ) -> Self {
        Self {
            orchestrator,
            generator,
            limits,
            policy,
            telemetry: None,
        }
    }

    pub fn with_telemetry(mut self, telemetry: TelemetrySink) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    fn emit(&self, event: &str, payload: serde_json::Value) {
        if let Some(telemetry) = &self.telemetry {
            telemetry.emit(event, payload);
        }
    }

    /// Run a single icon task with a fresh request context and usage tracker.
    pub async fn run_once(&self, job: &IconJob, index: u32) -> Result<TaskOutcome, IconError> {
        let request = Arc::new(RequestContext::new(
            job.art_style.clone(),
            job.description.clone(),
            Arc::clone(&self.generator),
        )?);
        let instruction = request.task_instruction();
        let usage = UsageTracker::new(self.limits);

        let span = tracing::info_span!("icon_task", task = index, style = %request.art_style());
        self.emit(
            "task.started",
            json!({ "task": index, "style": request.art_style() }),
        );

        let result = self
            .orchestrator
            .run(&instruction, request, usage)
            .instrument(span.clone())
            .await;
        let _entered = span.enter();
        match &result {
            Ok(outcome) => {
                tracing::info!(file = %outcome.icon.path.display(), "icon task completed");
                self.emit(
                    "task.completed",
                    json!({
                        "task": index,
                        "file": outcome.icon.filename,
                        "requests": outcome.usage.requests,
                        "tokens": outcome.usage.total_tokens(),
                    }),
                );
            }
            Err(err) => {
                tracing::warn!(error = %err, "icon task failed");
                self.emit(
                    "task.failed",
                    json!({ "task": index, "error": err.to_string(), "category": err.category().code() }),
                );
            }
        }
        result
    }

    /// Run `job.count` tasks in sequence, reporting each start and finish to
    /// `on_event`.
    pub async fn run_batch<F>(&self, job: &IconJob, mut on_event: F) -> BatchReport
    where
        F: FnMut(BatchEvent<'_>),
    {
        let mut records = Vec::with_capacity(job.count as usize);
        let mut stopped_early = false;

        for index in 1..=job.count {
            on_event(BatchEvent::Started {
                index,
                total: job.count,
            });
            let result = self.run_once(job, index).await;
            on_event(BatchEvent::Finished {
                index,
                total: job.count,
                result: &result,
            });
            let failed = result.is_err();
            records.push(TaskRecord { index, result });

            if failed && self.policy == BatchPolicy::Abort && index < job.count {
                tracing::warn!(
                    completed = index,
                    requested = job.count,
                    "aborting batch after failed icon"
                );
                stopped_early = true;
                break;
            }
        }

        BatchReport {
            requested: job.count,
            records,
            stopped_early,
        }
    }
}

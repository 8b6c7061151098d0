//! JSONL event log for icon runs, and the per-task summary behind
//! `telemetry report`.

use std::collections::{BTreeMap, HashMap};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::RuntimeConfig;

/// How many of the most recent tasks `telemetry report` lists individually.
const RECENT_TASKS: usize = 10;

#[derive(Serialize)]
struct EventRecord<'a> {
    ts_unix_ms: i64,
    event: &'a str,
    run_id: &'a str,
    command: &'a str,
    #[serde(flatten)]
    payload: &'a Map<String, Value>,
}

/// Appends one JSON object per event. Disabled sinks drop everything.
#[derive(Debug, Clone)]
pub struct TelemetrySink {
    path: Option<PathBuf>,
    run_id: String,
    command: String,
    write_lock: Arc<Mutex<()>>,
}

impl TelemetrySink {
    pub fn new(cfg: &RuntimeConfig, command: impl Into<String>) -> Self {
        Self {
            path: cfg
                .telemetry_enabled
                .then(|| PathBuf::from(&cfg.telemetry_path)),
            run_id: format!(
                "run-{}-{}",
                chrono::Utc::now().timestamp_millis(),
                std::process::id()
            ),
            command: command.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Record `event` with the fields of `payload` merged in. A write failure
    /// is logged and otherwise ignored.
    pub fn emit(&self, event: &str, payload: Value) {
        let Some(path) = &self.path else {
            return;
        };

        let empty = Map::new();
        let record = EventRecord {
            ts_unix_ms: chrono::Utc::now().timestamp_millis(),
            event,
            run_id: &self.run_id,
            command: &self.command,
            payload: payload.as_object().unwrap_or(&empty),
        };
        if let Err(err) = self.append(path, &record) {
            tracing::warn!(
                event = event,
                path = %path.display(),
                error = %err,
                "telemetry write failed"
            );
        }
    }

    fn append(&self, path: &Path, record: &EventRecord<'_>) -> Result<()> {
        let mut line = serde_json::to_vec(record)
            .with_context(|| format!("failed to serialize telemetry event '{}'", record.event))?;
        line.push(b'\n');

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create telemetry directory '{}'", parent.display())
            })?;
        }

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(&line))
            .with_context(|| format!("failed to append to telemetry log '{}'", path.display()))
    }
}

/// The fields `telemetry report` reads back. Anything else in a record is
/// ignored.
#[derive(Debug, Deserialize)]
struct EventLine {
    event: String,
    #[serde(default)]
    run_id: String,
    ts_unix_ms: Option<i64>,
    task: Option<u32>,
    style: Option<String>,
    file: Option<String>,
    category: Option<String>,
    error: Option<String>,
    requests: Option<u32>,
    tokens: Option<u64>,
    capability: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Started but no terminal event in the analysed window.
    Unfinished,
    Saved { file: String },
    Failed { category: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSummary {
    pub run_id: String,
    pub task: u32,
    pub style: Option<String>,
    pub status: TaskStatus,
    pub requests: u32,
    pub tokens: u64,
}

#[derive(Debug, Default)]
pub struct TelemetrySummary {
    pub events: usize,
    pub parse_errors: usize,
    /// One entry per icon task, in the order the tasks started.
    pub tasks: Vec<TaskSummary>,
    pub failures_by_category: BTreeMap<String, usize>,
    pub capability_failures: BTreeMap<String, usize>,
    pub commands_failed: usize,
    pub last_event_ts_unix_ms: Option<i64>,
}

impl TelemetrySummary {
    pub fn saved(&self) -> usize {
        self.count(|status| matches!(status, TaskStatus::Saved { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|status| matches!(status, TaskStatus::Failed { .. }))
    }

    pub fn unfinished(&self) -> usize {
        self.count(|status| *status == TaskStatus::Unfinished)
    }

    pub fn total_requests(&self) -> u64 {
        self.tasks.iter().map(|task| u64::from(task.requests)).sum()
    }

    pub fn total_tokens(&self) -> u64 {
        self.tasks.iter().map(|task| task.tokens).sum()
    }

    fn count(&self, pred: impl Fn(&TaskStatus) -> bool) -> usize {
        self.tasks.iter().filter(|task| pred(&task.status)).count()
    }

    fn task_entry(
        &mut self,
        index: &mut HashMap<(String, u32), usize>,
        run_id: &str,
        task: u32,
    ) -> &mut TaskSummary {
        let slot = *index
            .entry((run_id.to_string(), task))
            .or_insert_with(|| {
                self.tasks.push(TaskSummary {
                    run_id: run_id.to_string(),
                    task,
                    style: None,
                    status: TaskStatus::Unfinished,
                    requests: 0,
                    tokens: 0,
                });
                self.tasks.len() - 1
            });
        &mut self.tasks[slot]
    }
}

/// Fold the last `limit` log lines into per-task outcomes.
pub fn summarize_telemetry_lines(lines: &[String], limit: usize) -> TelemetrySummary {
    let window = &lines[lines.len().saturating_sub(limit.max(1))..];
    let mut summary = TelemetrySummary::default();
    let mut index = HashMap::new();

    for line in window.iter().map(|line| line.trim()).filter(|line| !line.is_empty()) {
        let Ok(event) = serde_json::from_str::<EventLine>(line) else {
            summary.parse_errors += 1;
            continue;
        };
        summary.events += 1;
        if let Some(ts) = event.ts_unix_ms {
            summary.last_event_ts_unix_ms = summary.last_event_ts_unix_ms.max(Some(ts));
        }

        match (event.event.as_str(), event.task) {
            ("task.started", Some(task)) => {
                let entry = summary.task_entry(&mut index, &event.run_id, task);
                entry.style = event.style;
            }
            ("task.completed", Some(task)) => {
                let entry = summary.task_entry(&mut index, &event.run_id, task);
                entry.status = TaskStatus::Saved {
                    file: event.file.unwrap_or_default(),
                };
                entry.requests = event.requests.unwrap_or_default();
                entry.tokens = event.tokens.unwrap_or_default();
            }
            ("task.failed", Some(task)) => {
                let category = event.category.unwrap_or_else(|| "INTERNAL".to_string());
                *summary
                    .failures_by_category
                    .entry(category.clone())
                    .or_default() += 1;
                let entry = summary.task_entry(&mut index, &event.run_id, task);
                entry.status = TaskStatus::Failed {
                    category,
                    error: event.error.unwrap_or_default(),
                };
            }
            ("capability.failed", _) => {
                let name = event.capability.unwrap_or_else(|| "<unknown>".to_string());
                *summary.capability_failures.entry(name).or_default() += 1;
            }
            ("command.failed", _) => summary.commands_failed += 1,
            _ => {}
        }
    }

    summary
}

pub fn run_telemetry_report(
    cfg: &RuntimeConfig,
    path_override: Option<String>,
    limit: usize,
) -> Result<()> {
    let path = PathBuf::from(path_override.unwrap_or_else(|| cfg.telemetry_path.clone()));
    if !path.exists() {
        println!("No telemetry file found at '{}'.", path.display());
        return Ok(());
    }

    let lines = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read telemetry file '{}'", path.display()))?
        .lines()
        .map(str::to_string)
        .collect::<Vec<String>>();
    let summary = summarize_telemetry_lines(&lines, limit);

    println!("Telemetry report ({})", path.display());
    println!(
        "Events analyzed: {} of {} lines (parse_errors={})",
        summary.events,
        lines.len(),
        summary.parse_errors
    );
    println!(
        "Icon tasks: {} saved, {} failed, {} unfinished",
        summary.saved(),
        summary.failed(),
        summary.unfinished()
    );
    println!(
        "Usage: {} requests, {} tokens",
        summary.total_requests(),
        summary.total_tokens()
    );
    if summary.commands_failed > 0 {
        println!("Failed commands: {}", summary.commands_failed);
    }

    if !summary.failures_by_category.is_empty() {
        println!("Failures by category:");
        for (category, count) in &summary.failures_by_category {
            println!("- {category}: {count}");
        }
    }
    if !summary.capability_failures.is_empty() {
        println!("Failed capabilities:");
        for (name, count) in &summary.capability_failures {
            println!("- {name}: {count}");
        }
    }

    let skip = summary.tasks.len().saturating_sub(RECENT_TASKS);
    if skip < summary.tasks.len() {
        println!("Recent tasks:");
    }
    for task in &summary.tasks[skip..] {
        let style = task.style.as_deref().unwrap_or("?");
        match &task.status {
            TaskStatus::Saved { file } => println!(
                "- {} #{} [{style}] saved {file} (requests={}, tokens={})",
                task.run_id, task.task, task.requests, task.tokens
            ),
            TaskStatus::Failed { category, error } => println!(
                "- {} #{} [{style}] failed [{category}] {error}",
                task.run_id, task.task
            ),
            TaskStatus::Unfinished => {
                println!("- {} #{} [{style}] unfinished", task.run_id, task.task)
            }
        }
    }

    if let Some(ts) = summary.last_event_ts_unix_ms {
        println!("Last event ts_unix_ms: {ts}");
    }
    Ok(())
}

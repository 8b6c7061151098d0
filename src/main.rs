use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use iconsmith::cli::{Cli, Commands, ProfileCommands, TelemetryCommands, command_label};
use iconsmith::config::{RuntimeConfig, load_profiles, resolve_runtime_config};
use iconsmith::doctor::run_doctor;
use iconsmith::error::{categorize_error, format_cli_error, render_error_message};
use iconsmith::pipeline::HttpFetcher;
use iconsmith::profiles::{run_profiles_list, run_profiles_show};
use iconsmith::provider::resolve_openai_client;
use iconsmith::runner::{BatchEvent, IconJob, build_task_driver};
use iconsmith::telemetry::{TelemetrySink, run_telemetry_report};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let show_sensitive_config = cli.show_sensitive_config;
    if let Err(err) = run_cli(cli).await {
        eprintln!("{}", format_cli_error(&err, show_sensitive_config));
        tracing::error!(
            category = %categorize_error(&err).code(),
            error = %render_error_message(&err, show_sensitive_config),
            "command failed"
        );
        std::process::exit(1);
    }

    Ok(())
}

async fn run_cli(cli: Cli) -> Result<()> {
    init_tracing(&cli.log_filter)?;
    let profiles = load_profiles(&cli.config_path)?;
    let cfg = resolve_runtime_config(&cli, &profiles)?;
    let telemetry = TelemetrySink::new(&cfg, command_label(&cli.command));

    let result = match cli.command {
        Commands::Generate {
            style,
            description,
            count,
        } => {
            run_generate(
                &cfg,
                &telemetry,
                IconJob {
                    art_style: style,
                    description,
                    count,
                },
            )
            .await
        }
        Commands::Doctor => run_doctor(&cfg),
        Commands::Profiles { command } => match command {
            ProfileCommands::List => run_profiles_list(&profiles, &cfg),
            ProfileCommands::Show => run_profiles_show(&cfg),
        },
        Commands::Telemetry { command } => match command {
            TelemetryCommands::Report { path, limit } => run_telemetry_report(&cfg, path, limit),
        },
    };

    match &result {
        Ok(()) => telemetry.emit("command.completed", json!({})),
        Err(err) => telemetry.emit(
            "command.failed",
            json!({
                "category": categorize_error(err).code(),
                "error": render_error_message(err, cfg.show_sensitive_config),
            }),
        ),
    }
    result
}

async fn run_generate(cfg: &RuntimeConfig, telemetry: &TelemetrySink, job: IconJob) -> Result<()> {
    let client = resolve_openai_client(cfg)?;
    tracing::info!(
        chat_model = %cfg.chat_model,
        image_model = %cfg.image_model,
        output_dir = %cfg.output_dir.display(),
        "Using models"
    );

    std::fs::create_dir_all(&cfg.output_dir).with_context(|| {
        format!(
            "failed to create output directory '{}'",
            cfg.output_dir.display()
        )
    })?;

    let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(
        cfg.download_timeout_secs,
    )));
    let driver = build_task_driver(
        cfg,
        client.clone(),
        client,
        fetcher,
        Some(telemetry.clone()),
    );

    println!(
        "Generating {} icon(s) in '{}' style...",
        job.count, job.art_style
    );
    println!("Description: {}\n", job.description);

    let report = driver
        .run_batch(&job, |event| match event {
            BatchEvent::Started { index, total } if total > 1 => {
                println!("[{index}/{total}] Starting icon generation...");
            }
            BatchEvent::Started { .. } => {}
            BatchEvent::Finished { result: Ok(outcome), .. } => {
                println!("{}\n", outcome.status);
            }
            BatchEvent::Finished {
                index,
                total,
                result: Err(err),
            } => eprintln!("[{index}/{total}] Icon generation failed: {err}\n"),
        })
        .await;

    if report.stopped_early {
        eprintln!(
            "Stopped after {} of {} icon(s); use --on-error continue to keep going past failures.",
            report.records.len(),
            report.requested
        );
    }

    if report.failed() == 0 {
        return Ok(());
    }

    let summary = format!(
        "{} of {} icon(s) failed ({} saved)",
        report.failed(),
        report.requested,
        report.succeeded()
    );
    let first = report
        .records
        .into_iter()
        .find_map(|record| record.result.err())
        .context("batch reported a failure without an error")?;
    Err(anyhow::Error::new(first).context(summary))
}

fn init_tracing(log_filter: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(log_filter).unwrap_or_else(|_| EnvFilter::new("error")))
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {e}"))
}

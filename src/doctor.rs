use std::path::Path;

use anyhow::{Context, Result};

use crate::config::RuntimeConfig;
use crate::pipeline::ICON_EDGE;
use crate::provider::{OPENAI_API_KEY_ENV, env_present, validate_chat_model, validate_image_model};

/// Creates the directory if needed and round-trips a probe file.
pub fn check_output_dir_writable(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory '{}'", dir.display()))?;
    let probe = dir.join(".iconsmith-doctor-probe");
    std::fs::write(&probe, b"ok")
        .with_context(|| format!("output directory '{}' is not writable", dir.display()))?;
    std::fs::remove_file(&probe)
        .with_context(|| format!("failed to remove probe file '{}'", probe.display()))?;
    Ok(())
}

pub fn run_doctor(cfg: &RuntimeConfig) -> Result<()> {
    println!(
        "Active profile: '{}' (config: {})",
        cfg.profile, cfg.config_path
    );

    let key_status = if env_present(OPENAI_API_KEY_ENV) {
        "set"
    } else {
        "missing"
    };
    println!("Provider environment check:");
    println!("- {OPENAI_API_KEY_ENV}: {key_status}");
    println!("- API base URL: {}", cfg.api_base_url);

    let report = |label: &str, check: Result<()>| match check {
        Ok(()) => println!("{label}: ok"),
        Err(err) => println!("{label}: {err:#}"),
    };
    report(
        &format!("Chat model '{}'", cfg.chat_model),
        validate_chat_model(&cfg.chat_model),
    );
    report(
        &format!("Image model '{}'", cfg.image_model),
        validate_image_model(&cfg.image_model),
    );
    report(
        &format!("Output directory '{}'", cfg.output_dir.display()),
        check_output_dir_writable(&cfg.output_dir),
    );

    println!(
        "Icons: {}x{} from {}x{} source, quality={}, naming={:?}",
        ICON_EDGE,
        ICON_EDGE,
        cfg.source_edge,
        cfg.source_edge,
        cfg.image_quality,
        cfg.naming
    );
    println!(
        "Batch: on_error={:?}, request_timeout_secs={}, download_timeout_secs={}",
        cfg.on_error, cfg.request_timeout_secs, cfg.download_timeout_secs
    );
    println!(
        "Usage limits: requests={}, total_tokens={}",
        cfg.request_limit
            .map(|v| v.to_string())
            .unwrap_or_else(|| "<unlimited>".to_string()),
        cfg.total_tokens_limit
            .map(|v| v.to_string())
            .unwrap_or_else(|| "<unlimited>".to_string())
    );
    println!(
        "Telemetry: enabled={} path={}",
        cfg.telemetry_enabled, cfg.telemetry_path
    );

    if !env_present(OPENAI_API_KEY_ENV) {
        println!("Tip: export {OPENAI_API_KEY_ENV} before running generate");
    }

    Ok(())
}

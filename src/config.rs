use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::{BatchPolicy, Cli};
use crate::context::UsageLimits;
use crate::naming::FileNaming;
use crate::openai::DEFAULT_API_BASE_URL;
use crate::pipeline::{DEFAULT_SOURCE_EDGE, PipelineSettings, validate_source_edge};

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub profile: String,
    pub config_path: String,
    pub chat_model: String,
    pub image_model: String,
    pub image_quality: String,
    pub api_base_url: String,
    pub source_edge: u32,
    pub output_dir: PathBuf,
    pub naming: FileNaming,
    pub on_error: BatchPolicy,
    pub request_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub request_limit: Option<u32>,
    pub total_tokens_limit: Option<u64>,
    pub telemetry_enabled: bool,
    pub telemetry_path: String,
    pub show_sensitive_config: bool,
}

impl RuntimeConfig {
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            image_model: self.image_model.clone(),
            quality: self.image_quality.clone(),
            source_edge: self.source_edge,
            output_dir: self.output_dir.clone(),
            naming: self.naming,
        }
    }

    pub fn usage_limits(&self) -> UsageLimits {
        UsageLimits {
            request_limit: self.request_limit,
            total_tokens_limit: self.total_tokens_limit,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilesFile {
    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    pub chat_model: Option<String>,
    pub image_model: Option<String>,
    pub image_quality: Option<String>,
    pub api_base_url: Option<String>,
    pub source_edge: Option<u32>,
    pub output_dir: Option<String>,
    pub naming: Option<FileNaming>,
    pub on_error: Option<BatchPolicy>,
    pub request_timeout_secs: Option<u64>,
    pub download_timeout_secs: Option<u64>,
    pub request_limit: Option<u32>,
    pub total_tokens_limit: Option<u64>,
    pub telemetry_enabled: Option<bool>,
    pub telemetry_path: Option<String>,
}

pub fn load_profiles(config_path: &str) -> Result<ProfilesFile> {
    let path = Path::new(config_path);
    if !path.exists() {
        return Ok(ProfilesFile::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read profile config file at '{}'", path.display()))?;
    toml::from_str::<ProfilesFile>(&content).with_context(|| {
        format!(
            "invalid profile configuration in '{}'. Check model/naming values and field names.",
            path.display()
        )
    })
}

pub fn resolve_runtime_config(cli: &Cli, profiles: &ProfilesFile) -> Result<RuntimeConfig> {
    let selected = cli.profile.trim();
    if selected.is_empty() {
        return Err(anyhow::anyhow!(
            "profile name cannot be empty. Set --profile <name>."
        ));
    }

    let profile = if selected == "default" && !profiles.profiles.contains_key("default") {
        ProfileConfig::default()
    } else {
        profiles.profiles.get(selected).cloned().ok_or_else(|| {
            let mut names = profiles.profiles.keys().cloned().collect::<Vec<String>>();
            names.sort();
            if names.is_empty() {
                anyhow::anyhow!(
                    "profile '{}' not found in '{}'. No profiles are defined yet.",
                    selected,
                    cli.config_path
                )
            } else {
                anyhow::anyhow!(
                    "profile '{}' not found in '{}'. Available profiles: {}",
                    selected,
                    cli.config_path,
                    names.join(", ")
                )
            }
        })?
    };

    let image_model = cli
        .image_model
        .clone()
        .or(profile.image_model)
        .unwrap_or_else(|| "dall-e-3".to_string());
    let source_edge = profile.source_edge.unwrap_or(DEFAULT_SOURCE_EDGE);
    validate_source_edge(&image_model, source_edge).with_context(|| {
        format!("invalid source_edge in profile '{selected}'")
    })?;

    Ok(RuntimeConfig {
        profile: selected.to_string(),
        config_path: cli.config_path.clone(),
        chat_model: cli
            .chat_model
            .clone()
            .or(profile.chat_model)
            .unwrap_or_else(|| "gpt-4o".to_string()),
        image_model,
        image_quality: cli
            .image_quality
            .clone()
            .or(profile.image_quality)
            .unwrap_or_else(|| "standard".to_string()),
        api_base_url: cli
            .api_base_url
            .clone()
            .or(profile.api_base_url)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
        source_edge,
        output_dir: PathBuf::from(
            cli.output_dir
                .clone()
                .or(profile.output_dir)
                .unwrap_or_else(|| "output".to_string()),
        ),
        naming: cli.naming.or(profile.naming).unwrap_or(FileNaming::Plain),
        on_error: cli
            .on_error
            .or(profile.on_error)
            .unwrap_or(BatchPolicy::Abort),
        request_timeout_secs: cli
            .request_timeout_secs
            .or(profile.request_timeout_secs)
            .unwrap_or(120)
            .max(1),
        download_timeout_secs: cli
            .download_timeout_secs
            .or(profile.download_timeout_secs)
            .unwrap_or(60)
            .max(1),
        request_limit: Some(
            cli.request_limit
                .or(profile.request_limit)
                .unwrap_or(50)
                .max(2),
        ),
        total_tokens_limit: profile.total_tokens_limit,
        telemetry_enabled: cli
            .telemetry_enabled
            .or(profile.telemetry_enabled)
            .unwrap_or(true),
        telemetry_path: cli
            .telemetry_path
            .clone()
            .or(profile.telemetry_path)
            .unwrap_or_else(|| ".iconsmith/telemetry/events.jsonl".to_string()),
        show_sensitive_config: cli.show_sensitive_config,
    })
}

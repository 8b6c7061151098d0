use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;

use crate::naming::FileNaming;

/// What the task driver does when one icon in a batch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchPolicy {
    /// Stop the batch at the first failed icon.
    Abort,
    /// Record the failure and move on to the next icon.
    Continue,
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommands {
    #[command(about = "List configured profiles and highlight the active profile")]
    List,
    #[command(about = "Show the active profile's resolved runtime settings")]
    Show,
}

#[derive(Debug, Subcommand)]
pub enum TelemetryCommands {
    #[command(about = "Summarize telemetry events from a JSONL stream")]
    Report {
        #[arg(long)]
        path: Option<String>,
        #[arg(long, default_value_t = 5000)]
        limit: usize,
    },
}

const CLI_EXAMPLES: &str = "Examples:\n\
  iconsmith generate --style minimalist --description \"a hot cup of coffee\"\n\
  iconsmith generate --style \"pixel art\" --description \"a retro rocket ship\" --count 3\n\
  iconsmith --naming timestamp --output-dir icons generate --style watercolor --description \"a fox\"\n\
  iconsmith --on-error continue generate --style \"slack emoji\" --description \"a party parrot\" --count 5\n\
  iconsmith doctor\n\
  iconsmith profiles show\n\
  iconsmith telemetry report --limit 2000";

#[derive(Debug, Parser)]
#[command(name = "iconsmith")]
#[command(about = "Generate custom icons using AI with multi-agent delegation")]
#[command(after_long_help = CLI_EXAMPLES)]
pub struct Cli {
    #[arg(long, env = "ICONSMITH_PROFILE", default_value = "default")]
    pub profile: String,

    #[arg(long, env = "ICONSMITH_CONFIG", default_value = ".iconsmith/config.toml")]
    pub config_path: String,

    #[arg(long, env = "ICONSMITH_CHAT_MODEL")]
    pub chat_model: Option<String>,

    #[arg(long, env = "ICONSMITH_IMAGE_MODEL")]
    pub image_model: Option<String>,

    #[arg(long, env = "ICONSMITH_IMAGE_QUALITY")]
    pub image_quality: Option<String>,

    #[arg(long, env = "ICONSMITH_API_BASE_URL")]
    pub api_base_url: Option<String>,

    #[arg(long, env = "ICONSMITH_OUTPUT_DIR")]
    pub output_dir: Option<String>,

    #[arg(long, env = "ICONSMITH_NAMING", value_enum)]
    pub naming: Option<FileNaming>,

    #[arg(long, env = "ICONSMITH_ON_ERROR", value_enum)]
    pub on_error: Option<BatchPolicy>,

    #[arg(long, env = "ICONSMITH_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    #[arg(long, env = "ICONSMITH_DOWNLOAD_TIMEOUT_SECS")]
    pub download_timeout_secs: Option<u64>,

    #[arg(long, env = "ICONSMITH_REQUEST_LIMIT")]
    pub request_limit: Option<u32>,

    #[arg(long, env = "ICONSMITH_TELEMETRY_ENABLED", action = clap::ArgAction::Set)]
    pub telemetry_enabled: Option<bool>,

    #[arg(long, env = "ICONSMITH_TELEMETRY_PATH")]
    pub telemetry_path: Option<String>,

    #[arg(long, env = "ICONSMITH_SHOW_SENSITIVE_CONFIG", default_value_t = false)]
    pub show_sensitive_config: bool,

    #[arg(long, env = "RUST_LOG", default_value = "error")]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Generate one or more icons for a style and description")]
    Generate {
        #[arg(long, help = "Art style for the icon (e.g., 'minimalist', 'pixel art', 'slack emoji')")]
        style: String,
        #[arg(long, help = "Description of what the icon should depict")]
        description: String,
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        count: u32,
    },
    #[command(about = "Validate API credentials, output directory and resolved configuration")]
    Doctor,
    #[command(about = "Inspect profile configuration and active resolved profile state")]
    Profiles {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    #[command(about = "Telemetry utilities and reporting")]
    Telemetry {
        #[command(subcommand)]
        command: TelemetryCommands,
    },
}

pub fn command_label(command: &Commands) -> String {
    match command {
        Commands::Generate { .. } => "generate".to_string(),
        Commands::Doctor => "doctor".to_string(),
        Commands::Profiles { command } => match command {
            ProfileCommands::List => "profiles.list".to_string(),
            ProfileCommands::Show => "profiles.show".to_string(),
        },
        Commands::Telemetry { command } => match command {
            TelemetryCommands::Report { .. } => "telemetry.report".to_string(),
        },
    }
}

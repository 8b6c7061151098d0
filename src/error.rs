use std::path::PathBuf;

use thiserror::Error;

/// Failures that end a single icon task.
#[derive(Debug, Error)]
pub enum IconError {
    #[error("stylist could not produce a prompt: {0}")]
    Delegation(String),

    #[error("generation service error: {0}")]
    GenerationService(String),

    #[error("image download failed: {0}")]
    Download(String),

    #[error("image payload could not be decoded: {0}")]
    Decode(String),

    #[error("icon could not be encoded as PNG: {0}")]
    Encode(String),

    #[error("filesystem error at '{}': {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("capability '{capability}' is not allowed while the task is {phase}")]
    OrderingViolation {
        capability: String,
        phase: &'static str,
    },

    #[error("unknown capability '{0}'")]
    UnknownCapability(String),

    #[error("usage limit exceeded: {0}")]
    UsageLimitExceeded(String),

    #[error("invalid icon request: {0}")]
    InvalidRequest(String),
}

impl IconError {
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IconError::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            IconError::GenerationService(_) | IconError::UsageLimitExceeded(_) => {
                ErrorCategory::Provider
            }
            IconError::Delegation(_)
            | IconError::OrderingViolation { .. }
            | IconError::UnknownCapability(_) => ErrorCategory::Delegation,
            IconError::Download(_) | IconError::Decode(_) | IconError::Encode(_) => {
                ErrorCategory::Pipeline
            }
            IconError::Filesystem { .. } => ErrorCategory::Filesystem,
            IconError::InvalidRequest(_) => ErrorCategory::Input,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Provider,
    Delegation,
    Pipeline,
    Filesystem,
    Input,
    Internal,
}

impl ErrorCategory {
    pub fn code(self) -> &'static str {
        match self {
            ErrorCategory::Provider => "PROVIDER",
            ErrorCategory::Delegation => "DELEGATION",
            ErrorCategory::Pipeline => "PIPELINE",
            ErrorCategory::Filesystem => "FILESYSTEM",
            ErrorCategory::Input => "INPUT",
            ErrorCategory::Internal => "INTERNAL",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            ErrorCategory::Provider => {
                "Set OPENAI_API_KEY, check --chat-model/--image-model, or raise --request-limit."
            }
            ErrorCategory::Delegation => {
                "The stylist returned no usable prompt. Retry with RUST_LOG=debug to inspect the exchange."
            }
            ErrorCategory::Pipeline => {
                "The generated image could not be fetched or processed. Retry, or raise --download-timeout-secs."
            }
            ErrorCategory::Filesystem => "Check that --output-dir exists or can be created and is writable.",
            ErrorCategory::Input => "Run iconsmith --help and correct command arguments.",
            ErrorCategory::Internal => {
                "Retry with RUST_LOG=debug. If it persists, capture logs and open an issue."
            }
        }
    }
}

pub fn categorize_error(err: &anyhow::Error) -> ErrorCategory {
    if let Some(icon_err) = err.chain().find_map(|cause| cause.downcast_ref::<IconError>()) {
        return icon_err.category();
    }

    let msg = format!("{err:#}").to_ascii_lowercase();

    if msg.contains("api_key") || msg.contains("model") {
        return ErrorCategory::Provider;
    }

    if msg.contains("invalid value")
        || msg.contains("unknown argument")
        || msg.contains("profile")
        || msg.contains("cannot be empty")
    {
        return ErrorCategory::Input;
    }

    if msg.contains("directory") || msg.contains("permission denied") {
        return ErrorCategory::Filesystem;
    }

    ErrorCategory::Internal
}

pub fn format_cli_error(err: &anyhow::Error, show_sensitive_config: bool) -> String {
    let category = categorize_error(err);
    let rendered_error = render_error_message(err, show_sensitive_config);
    format!(
        "[{}] {}\nHint: {}",
        category.code(),
        rendered_error,
        category.hint()
    )
}

pub fn render_error_message(err: &anyhow::Error, show_sensitive_config: bool) -> String {
    let text = format!("{err:#}");
    if show_sensitive_config {
        text
    } else {
        redact_sensitive_text(&text)
    }
}

pub fn redact_sensitive_text(text: &str) -> String {
    redact_api_keys(text)
}

/// Replaces OpenAI-style secret keys (`sk-...`) with a fixed placeholder.
pub fn redact_api_keys(text: &str) -> String {
    const KEY_PREFIX: &str = "sk-";
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;

    while let Some(offset) = text[cursor..].find(KEY_PREFIX) {
        let start = cursor + offset;
        let at_boundary = text[..start]
            .chars()
            .next_back()
            .is_none_or(|ch| !ch.is_ascii_alphanumeric());
        out.push_str(&text[cursor..start]);

        let remainder = &text[start..];
        let end = remainder
            .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'))
            .unwrap_or(remainder.len());
        let token = &remainder[..end];
        out.push_str(&redact_api_key_value(token, at_boundary));
        cursor = start + end;
    }

    out.push_str(&text[cursor..]);
    out
}

pub fn redact_api_key_value(value: &str, at_boundary: bool) -> String {
    if at_boundary && value.len() > "sk-".len() {
        "sk-[REDACTED]".to_string()
    } else {
        value.to_string()
    }
}

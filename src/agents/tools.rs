/// Orchestrator tools - Expose the stylist agent and the image pipeline as
/// callable capabilities.
use std::sync::Arc;

use async_trait::async_trait;

use super::capability::{Capability, CapabilityOutput};
use super::stylist::StylistAgent;
use crate::context::RunContext;
use crate::error::IconError;
use crate::pipeline::ImagePipeline;

pub const CONSULT_STYLIST: &str = "consult_stylist";
pub const GENERATE_IMAGE: &str = "generate_image";

/// Prefix wrapped around delegated stylist output.
pub const STYLIST_MARKER: &str = "Style expert's refined prompt:";

/// Keep the text after the last marker, trimmed. Text without the marker is
/// only trimmed.
pub fn strip_stylist_marker(text: &str) -> &str {
    match text.rfind(STYLIST_MARKER) {
        Some(index) => text[index + STYLIST_MARKER.len()..].trim(),
        None => text.trim(),
    }
}

pub struct ConsultStylistTool {
    stylist: Arc<StylistAgent>,
}

impl ConsultStylistTool {
    pub fn new(stylist: Arc<StylistAgent>) -> Self {
        Self { stylist }
    }
}

#[async_trait]
impl Capability for ConsultStylistTool {
    fn name(&self) -> &str {
        CONSULT_STYLIST
    }

    fn description(&self) -> &str {
        "Delegate to the stylist agent to refine the icon prompt. Args: the prompt seed."
    }

    async fn invoke(&self, ctx: &RunContext, input: &str) -> Result<CapabilityOutput, IconError> {
        let delegate_ctx = ctx.for_delegate();
        let output = self
            .stylist
            .run(&format!("Please refine this icon prompt: {input}"), &delegate_ctx)
            .await?;
        tracing::debug!(prompt = %output.prompt, "stylist returned refined prompt");
        Ok(CapabilityOutput::text(format!(
            "{STYLIST_MARKER} {}",
            output.prompt
        )))
    }
}

pub struct GenerateImageTool {
    pipeline: Arc<ImagePipeline>,
}

impl GenerateImageTool {
    pub fn new(pipeline: Arc<ImagePipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl Capability for GenerateImageTool {
    fn name(&self) -> &str {
        GENERATE_IMAGE
    }

    fn description(&self) -> &str {
        "Generate the icon image from the stylist's refined prompt, resize it to 128x128 and save it."
    }

    async fn invoke(&self, ctx: &RunContext, input: &str) -> Result<CapabilityOutput, IconError> {
        let prompt = strip_stylist_marker(input);
        if prompt.is_empty() {
            return Err(IconError::Delegation(
                "refined prompt is empty after removing the stylist marker".to_string(),
            ));
        }
        let icon = self
            .pipeline
            .generate(prompt, &ctx.request, &ctx.usage)
            .await?;
        Ok(CapabilityOutput {
            text: icon.status(),
            icon: Some(icon),
        })
    }
}

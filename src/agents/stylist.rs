/// Stylist agent - Turns a style + description into a generation prompt.
use std::sync::Arc;

use async_trait::async_trait;

use super::capability::{Capability, CapabilityOutput, CapabilitySet};
use crate::context::{RunContext, Usage, estimate_tokens};
use crate::error::IconError;
use crate::pipeline::ICON_EDGE;
use crate::provider::{ChatMessage, ChatModel};

pub const REFINE: &str = "refine";

pub const STYLIST_INSTRUCTIONS: &str = "You are an expert in visual art styles and icon design. \
When given an art style and description, you create detailed, optimized prompts for generating \
high-quality icons. Focus on: composition, color palettes, visual elements, and style-specific \
techniques. Keep prompts concise but detailed, suitable for 128x128 icon generation. \
Reply with the prompt only.";

/// Drafts the prompt skeleton from the bound request. Registered only on the
/// stylist's own capability set.
struct RefinePrompt;

#[async_trait]
impl Capability for RefinePrompt {
    fn name(&self) -> &str {
        REFINE
    }

    fn description(&self) -> &str {
        "Refine the icon description based on the specified art style."
    }

    async fn invoke(&self, ctx: &RunContext, _input: &str) -> Result<CapabilityOutput, IconError> {
        let style = ctx.request.art_style();
        let description = ctx.request.description();
        let edge = ICON_EDGE;
        Ok(CapabilityOutput::text(format!(
            "Create a detailed prompt for a {edge}x{edge} pixel icon in {style} art style.\n\
             The icon should depict: {description}.\n\
             Include specific details about composition, colors, and visual elements \
             that best represent this style."
        )))
    }
}

#[derive(Debug, Clone)]
pub struct StylistOutput {
    pub prompt: String,
    pub draft: String,
    pub usage: Usage,
}

pub struct StylistAgent {
    model: Arc<dyn ChatModel>,
    instructions: String,
    capabilities: CapabilitySet,
}

impl StylistAgent {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            instructions: STYLIST_INSTRUCTIONS.to_string(),
            capabilities: CapabilitySet::new().with(Arc::new(RefinePrompt)),
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Run to completion. Service errors from the chat model are returned
    /// unchanged; an empty answer is a delegation failure.
    pub async fn run(&self, user_prompt: &str, ctx: &RunContext) -> Result<StylistOutput, IconError> {
        let draft = self.capabilities.invoke(REFINE, ctx, user_prompt).await?.text;
        tracing::debug!(capability = REFINE, chars = draft.len(), "stylist drafted prompt");

        let messages = vec![
            ChatMessage::system(self.instructions.clone()),
            ChatMessage::user(format!("{user_prompt}\n\n{}", draft.trim())),
        ];

        ctx.usage.begin_request()?;
        let completion = self.model.complete(&messages).await?;

        let input_chars = messages
            .iter()
            .map(|m| m.content.chars().count())
            .sum::<usize>();
        ctx.usage.record_tokens(
            completion
                .input_tokens
                .unwrap_or_else(|| estimate_tokens(input_chars) as u64),
            completion
                .output_tokens
                .unwrap_or_else(|| estimate_tokens(completion.text.chars().count()) as u64),
        );

        let prompt = completion.text.trim().to_string();
        if prompt.is_empty() {
            return Err(IconError::Delegation(format!(
                "model '{}' returned an empty prompt",
                self.model.model_name()
            )));
        }

        Ok(StylistOutput {
            prompt,
            draft,
            usage: ctx.usage.snapshot(),
        })
    }
}

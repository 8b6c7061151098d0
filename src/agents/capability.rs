/// Named operations an agent can invoke during its own run.
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::RunContext;
use crate::error::IconError;
use crate::pipeline::SavedIcon;

#[derive(Debug, Clone)]
pub struct CapabilityOutput {
    pub text: String,
    pub icon: Option<SavedIcon>,
}

impl CapabilityOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            icon: None,
        }
    }
}

#[async_trait]
pub trait Capability: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    async fn invoke(&self, ctx: &RunContext, input: &str) -> Result<CapabilityOutput, IconError>;
}

/// The capabilities one agent exposes, keyed by name.
#[derive(Default, Clone)]
pub struct CapabilitySet {
    entries: BTreeMap<String, Arc<dyn Capability>>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, capability: Arc<dyn Capability>) -> Self {
        self.register(capability);
        self
    }

    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        self.entries
            .insert(capability.name().to_string(), capability);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.entries.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub async fn invoke(
        &self,
        name: &str,
        ctx: &RunContext,
        input: &str,
    ) -> Result<CapabilityOutput, IconError> {
        let capability = self
            .get(name)
            .ok_or_else(|| IconError::UnknownCapability(name.to_string()))?;
        capability.invoke(ctx, input).await
    }
}

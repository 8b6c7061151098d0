/// Per-task request context and usage accounting.
///
/// Token counts fall back to a char/4 heuristic when the service omits them,
/// rounded to the nearest 10 to avoid false precision.
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::error::IconError;
use crate::provider::ImageGenerator;

// ---------------------------------------------------------------------------
// Token estimation
// ---------------------------------------------------------------------------

/// Chars-per-token ratio used for estimation.
pub const TOKEN_CHAR_RATIO: usize = 4;

/// Estimate token count from character length. Rounds to nearest 10.
pub fn estimate_tokens(char_count: usize) -> usize {
    (char_count / TOKEN_CHAR_RATIO + 5) / 10 * 10
}

// ---------------------------------------------------------------------------
// Request context
// ---------------------------------------------------------------------------

/// Immutable inputs for one icon task, shared read-only by both agents and the
/// image pipeline.
#[derive(Clone)]
pub struct RequestContext {
    art_style: String,
    description: String,
    generator: Arc<dyn ImageGenerator>,
}

impl RequestContext {
    pub fn new(
        art_style: impl Into<String>,
        description: impl Into<String>,
        generator: Arc<dyn ImageGenerator>,
    ) -> Result<Self, IconError> {
        let art_style = art_style.into().trim().to_string();
        let description = description.into().trim().to_string();
        if art_style.is_empty() {
            return Err(IconError::InvalidRequest(
                "art style cannot be empty".to_string(),
            ));
        }
        if description.is_empty() {
            return Err(IconError::InvalidRequest(
                "description cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            art_style,
            description,
            generator,
        })
    }

    pub fn art_style(&self) -> &str {
        &self.art_style
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn generator(&self) -> &Arc<dyn ImageGenerator> {
        &self.generator
    }

    /// Instruction the task driver hands to the orchestrator.
    pub fn task_instruction(&self) -> String {
        format!(
            "Create a {} style icon: {}",
            self.art_style, self.description
        )
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("art_style", &self.art_style)
            .field("description", &self.description)
            .field("generator", &self.generator.name())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Usage accounting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub requests: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub images: u32,
}

impl Usage {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageLimits {
    pub request_limit: Option<u32>,
    pub total_tokens_limit: Option<u64>,
}

impl Default for UsageLimits {
    fn default() -> Self {
        Self {
            request_limit: Some(50),
            total_tokens_limit: None,
        }
    }
}

/// Cumulative usage for one task. Derived trackers share the same
/// accumulator, so a delegate's requests count against its caller's limits.
#[derive(Debug, Clone)]
pub struct UsageTracker {
    totals: Arc<Mutex<Usage>>,
    limits: UsageLimits,
}

impl UsageTracker {
    pub fn new(limits: UsageLimits) -> Self {
        Self {
            totals: Arc::new(Mutex::new(Usage::default())),
            limits,
        }
    }

    pub fn derive(&self) -> Self {
        Self {
            totals: Arc::clone(&self.totals),
            limits: self.limits,
        }
    }

    pub fn snapshot(&self) -> Usage {
        *self.totals.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn limits(&self) -> UsageLimits {
        self.limits
    }

    /// Reserve one outbound request, failing if it would break a limit.
    pub fn begin_request(&self) -> Result<(), IconError> {
        let mut totals = self.totals.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(limit) = self.limits.request_limit
            && totals.requests >= limit
        {
            return Err(IconError::UsageLimitExceeded(format!(
                "request_limit of {limit} reached"
            )));
        }
        if let Some(limit) = self.limits.total_tokens_limit
            && totals.total_tokens() > limit
        {
            return Err(IconError::UsageLimitExceeded(format!(
                "total_tokens_limit of {limit} exceeded ({} used)",
                totals.total_tokens()
            )));
        }
        totals.requests += 1;
        Ok(())
    }

    pub fn record_tokens(&self, input_tokens: u64, output_tokens: u64) {
        let mut totals = self.totals.lock().unwrap_or_else(|e| e.into_inner());
        totals.input_tokens += input_tokens;
        totals.output_tokens += output_tokens;
    }

    pub fn record_image(&self) {
        let mut totals = self.totals.lock().unwrap_or_else(|e| e.into_inner());
        totals.images += 1;
    }
}

// ---------------------------------------------------------------------------
// Run context
// ---------------------------------------------------------------------------

/// What a capability sees while it runs: the task's request plus the usage
/// tracker of the agent run that invoked it.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub request: Arc<RequestContext>,
    pub usage: UsageTracker,
}

impl RunContext {
    pub fn new(request: Arc<RequestContext>, usage: UsageTracker) -> Self {
        Self { request, usage }
    }

    /// Context for a delegate run: same request, derived usage.
    pub fn for_delegate(&self) -> Self {
        Self {
            request: Arc::clone(&self.request),
            usage: self.usage.derive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_tokens_rounds_to_nearest_ten() {
        assert_eq!(estimate_tokens(0), 0);
        assert_eq!(estimate_tokens(40), 10);
        assert_eq!(estimate_tokens(400), 100);
        assert_eq!(estimate_tokens(418), 100);
    }

    #[test]
    fn derived_tracker_shares_totals() {
        let parent = UsageTracker::new(UsageLimits::default());
        let child = parent.derive();

        child.begin_request().unwrap();
        child.record_tokens(12, 30);
        parent.record_image();

        let usage = parent.snapshot();
        assert_eq!(usage.requests, 1);
        assert_eq!(usage.total_tokens(), 42);
        assert_eq!(child.snapshot().images, 1);
    }

    #[test]
    fn request_limit_is_enforced() {
        let tracker = UsageTracker::new(UsageLimits {
            request_limit: Some(1),
            total_tokens_limit: None,
        });
        tracker.begin_request().unwrap();
        let err = tracker.begin_request().unwrap_err();
        assert!(matches!(err, IconError::UsageLimitExceeded(_)));
    }
}

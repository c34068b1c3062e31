use agora_core::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::evaluator::DispatchContext;

/// What an action handler produced. Any `text` is surfaced to the user
/// immediately, even when `success` is false — an informational failure
/// ("connect your wallet first") is still an answer.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub success: bool,
    pub text: Option<String>,
    pub data: Option<Value>,
}

impl ActionOutcome {
    pub fn reply(text: &str) -> Self {
        Self {
            success: true,
            text: Some(text.to_string()),
            data: None,
        }
    }

    pub fn failed(text: &str) -> Self {
        Self {
            success: false,
            text: Some(text.to_string()),
            data: None,
        }
    }

    /// Completed without anything to say; dispatch moves to the next
    /// candidate.
    pub fn silent() -> Self {
        Self {
            success: true,
            text: None,
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// An executable unit with an optional eligibility check and a required
/// effect. Both sides may perform I/O and may fail; the dispatch engine
/// treats failure as "skip this candidate", never as a fatal error.
#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> &'static str;

    /// Eligibility check. The default accepts.
    async fn validate(&self, _ctx: &DispatchContext) -> Result<bool> {
        Ok(true)
    }

    async fn handle(&self, ctx: &DispatchContext) -> Result<ActionOutcome>;
}

use agora_core::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Input for one dispatch or enrichment pass.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    pub persona: String,
    pub utterance: String,
    pub session_id: Option<String>,
    pub auth_token: Option<String>,
    /// Opaque state the chat client attached to the turn.
    pub client_state: Option<Value>,
}

impl DispatchContext {
    pub fn new(persona: &str, utterance: &str) -> Self {
        Self {
            persona: persona.to_string(),
            utterance: utterance.to_string(),
            session_id: None,
            auth_token: None,
            client_state: None,
        }
    }

    pub fn with_session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    pub fn with_auth_token(mut self, token: &str) -> Self {
        self.auth_token = Some(token.to_string());
        self
    }

    pub fn with_client_state(mut self, state: Value) -> Self {
        self.client_state = Some(state);
        self
    }
}

/// Confidence verdict from one evaluator invocation. Ephemeral.
#[derive(Debug, Clone)]
pub struct EvaluatorResult {
    /// Confidence in [0, 1].
    pub score: f32,
    pub reason: String,
    pub data: Option<Value>,
}

impl EvaluatorResult {
    pub fn no_match(reason: &str) -> Self {
        Self {
            score: 0.0,
            reason: reason.to_string(),
            data: None,
        }
    }

    pub fn matched(score: f32, reason: &str) -> Self {
        Self {
            score: score.clamp(0.0, 1.0),
            reason: reason.to_string(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Scores how strongly an utterance expresses one intent. Implementations
/// must be pure with respect to dispatch state (read-only I/O is fine) and
/// return score 0 for expected non-matches instead of erroring.
#[async_trait]
pub trait Evaluator: Send + Sync {
    fn name(&self) -> &'static str;
    async fn evaluate(&self, ctx: &DispatchContext) -> Result<EvaluatorResult>;
}

/// Run every evaluator concurrently and wait for all of them, so latency is
/// bounded by the slowest evaluator rather than their sum. A failed
/// evaluator degrades to score 0 and never aborts the batch.
pub async fn run_evaluators(
    evaluators: &[Arc<dyn Evaluator>],
    ctx: &DispatchContext,
) -> HashMap<&'static str, EvaluatorResult> {
    let runs = evaluators.iter().map(|evaluator| async move {
        let result = match evaluator.evaluate(ctx).await {
            Ok(result) => result,
            Err(err) => {
                warn!(evaluator = evaluator.name(), error = %err, "evaluator failed, scoring 0");
                EvaluatorResult::no_match("evaluator failed")
            }
        };
        (evaluator.name(), result)
    });
    futures::future::join_all(runs).await.into_iter().collect()
}

/// Evaluate a single optional evaluator, treating absence and failure alike
/// as score 0.
pub(crate) async fn score_or_zero(
    evaluator: Option<&Arc<dyn Evaluator>>,
    ctx: &DispatchContext,
) -> EvaluatorResult {
    match evaluator {
        Some(evaluator) => match evaluator.evaluate(ctx).await {
            Ok(result) => result,
            Err(err) => {
                warn!(evaluator = evaluator.name(), error = %err, "evaluator failed, scoring 0");
                EvaluatorResult::no_match("evaluator failed")
            }
        },
        None => EvaluatorResult::no_match("no evaluator wired"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::Error;

    struct Fixed(f32);

    #[async_trait]
    impl Evaluator for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn evaluate(&self, _ctx: &DispatchContext) -> Result<EvaluatorResult> {
            Ok(EvaluatorResult::matched(self.0, "fixed"))
        }
    }

    struct Failing;

    #[async_trait]
    impl Evaluator for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn evaluate(&self, _ctx: &DispatchContext) -> Result<EvaluatorResult> {
            Err(Error::Evaluator("upstream unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_evaluator_degrades_to_zero() {
        let evaluators: Vec<Arc<dyn Evaluator>> = vec![Arc::new(Fixed(0.8)), Arc::new(Failing)];
        let ctx = DispatchContext::new("finn", "hello");
        let scores = run_evaluators(&evaluators, &ctx).await;

        assert_eq!(scores.len(), 2);
        assert_eq!(scores["fixed"].score, 0.8);
        assert_eq!(scores["failing"].score, 0.0);
    }

    #[test]
    fn test_score_is_clamped() {
        assert_eq!(EvaluatorResult::matched(1.7, "overshoot").score, 1.0);
        assert_eq!(EvaluatorResult::matched(-0.2, "undershoot").score, 0.0);
    }
}

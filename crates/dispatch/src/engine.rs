use agora_core::DispatchConfig;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::action::Action;
use crate::evaluator::{run_evaluators, DispatchContext, Evaluator, EvaluatorResult};

/// Priority tier for candidates produced by direct evaluator→action routes.
pub const DIRECT_TIER: u8 = 10;
/// Priority tier for the specificity-ordered chains.
pub const SPECIFICITY_TIER: u8 = 5;
/// Priority tier for context-gated actions. Lowest number, dispatched first.
pub const CONTEXT_TIER: u8 = 3;

const CONTEXT_NOMINAL_SCORE: f32 = 1.0;

/// How evaluator matches map to executable candidates. The three shapes
/// realize an explicit, auditable fallback chain: a later, lower-scored but
/// more specific action can still win because tier sorts before score.
pub enum ActionRoute {
    /// Evaluator above threshold → one fixed candidate.
    Direct {
        evaluator: &'static str,
        action: Arc<dyn Action>,
        tier: u8,
    },
    /// Most-specific-first chain; the first action whose `validate` passes
    /// becomes the single, pre-validated candidate.
    Specificity {
        evaluator: &'static str,
        chain: Vec<Arc<dyn Action>>,
        tier: u8,
    },
    /// Probed on every dispatch regardless of evaluator scores; the action's
    /// own `validate` governs eligibility.
    ContextGated {
        action: Arc<dyn Action>,
        tier: u8,
        nominal_score: f32,
    },
}

impl ActionRoute {
    pub fn direct(evaluator: &'static str, action: Arc<dyn Action>) -> Self {
        Self::Direct {
            evaluator,
            action,
            tier: DIRECT_TIER,
        }
    }

    pub fn specificity(evaluator: &'static str, chain: Vec<Arc<dyn Action>>) -> Self {
        Self::Specificity {
            evaluator,
            chain,
            tier: SPECIFICITY_TIER,
        }
    }

    pub fn context_gated(action: Arc<dyn Action>) -> Self {
        Self::ContextGated {
            action,
            tier: CONTEXT_TIER,
            nominal_score: CONTEXT_NOMINAL_SCORE,
        }
    }
}

/// Terminal outcome of one dispatch call. `NoAction` is a sentinel, not an
/// error: it means every candidate declined or stayed silent.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Replied(String),
    NoAction,
}

impl DispatchOutcome {
    pub fn text(&self) -> Option<&str> {
        match self {
            DispatchOutcome::Replied(text) => Some(text),
            DispatchOutcome::NoAction => None,
        }
    }
}

struct Candidate {
    action: Arc<dyn Action>,
    tier: u8,
    score: f32,
    pre_validated: bool,
    /// Monotonic insertion counter; the explicit final tie-break so ordering
    /// never depends on sort stability.
    seq: u64,
}

/// Turns evaluator matches into a prioritized candidate list and executes
/// candidates in order until one produces usable text.
pub struct DispatchEngine {
    config: DispatchConfig,
    evaluators: Vec<Arc<dyn Evaluator>>,
    routes: Vec<ActionRoute>,
}

impl DispatchEngine {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            evaluators: Vec::new(),
            routes: Vec::new(),
        }
    }

    pub fn add_evaluator(&mut self, evaluator: Arc<dyn Evaluator>) -> &mut Self {
        self.evaluators.push(evaluator);
        self
    }

    pub fn add_route(&mut self, route: ActionRoute) -> &mut Self {
        self.routes.push(route);
        self
    }

    /// Never returns an error. Evaluator failures score 0, candidate
    /// failures skip to the next candidate, and exhaustion yields the
    /// `NoAction` sentinel.
    pub async fn dispatch(&self, ctx: &DispatchContext) -> DispatchOutcome {
        let scores = run_evaluators(&self.evaluators, ctx).await;
        let mut candidates = self.collect(ctx, &scores).await;

        candidates.sort_by(|a, b| {
            a.tier
                .cmp(&b.tier)
                .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
                .then_with(|| a.seq.cmp(&b.seq))
        });

        self.execute(ctx, candidates).await
    }

    async fn collect(
        &self,
        ctx: &DispatchContext,
        scores: &HashMap<&'static str, EvaluatorResult>,
    ) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        let mut seq = 0u64;
        let mut next_seq = || {
            let n = seq;
            seq += 1;
            n
        };

        for route in &self.routes {
            match route {
                ActionRoute::Direct {
                    evaluator,
                    action,
                    tier,
                } => {
                    let Some(result) = scores.get(evaluator) else {
                        continue;
                    };
                    if result.score < self.config.primary_threshold {
                        continue;
                    }
                    candidates.push(Candidate {
                        action: action.clone(),
                        tier: *tier,
                        score: result.score,
                        pre_validated: false,
                        seq: next_seq(),
                    });
                }
                ActionRoute::Specificity {
                    evaluator,
                    chain,
                    tier,
                } => {
                    let Some(result) = scores.get(evaluator) else {
                        continue;
                    };
                    if result.score < self.config.primary_threshold {
                        continue;
                    }
                    for action in chain {
                        match action.validate(ctx).await {
                            Ok(true) => {
                                candidates.push(Candidate {
                                    action: action.clone(),
                                    tier: *tier,
                                    score: result.score,
                                    pre_validated: true,
                                    seq: next_seq(),
                                });
                                break;
                            }
                            Ok(false) => continue,
                            Err(err) => {
                                warn!(action = action.name(), error = %err, "chain validate failed, trying next");
                                continue;
                            }
                        }
                    }
                }
                ActionRoute::ContextGated {
                    action,
                    tier,
                    nominal_score,
                } => match action.validate(ctx).await {
                    Ok(true) => candidates.push(Candidate {
                        action: action.clone(),
                        tier: *tier,
                        score: *nominal_score,
                        pre_validated: true,
                        seq: next_seq(),
                    }),
                    Ok(false) => {}
                    Err(err) => {
                        warn!(action = action.name(), error = %err, "context-gated validate failed, skipping");
                    }
                },
            }
        }
        candidates
    }

    /// Strictly sequential: later candidates only run if earlier, more
    /// important ones decline or fail.
    async fn execute(&self, ctx: &DispatchContext, candidates: Vec<Candidate>) -> DispatchOutcome {
        for candidate in candidates {
            if !candidate.pre_validated {
                match candidate.action.validate(ctx).await {
                    Ok(true) => {}
                    Ok(false) => {
                        debug!(action = candidate.action.name(), "candidate declined");
                        continue;
                    }
                    Err(err) => {
                        warn!(action = candidate.action.name(), error = %err, "validate failed, skipping candidate");
                        continue;
                    }
                }
            }

            match candidate.action.handle(ctx).await {
                Ok(outcome) => {
                    if let Some(text) = outcome.text {
                        if !outcome.success {
                            debug!(
                                action = candidate.action.name(),
                                "informational failure surfaced to the user"
                            );
                        }
                        return DispatchOutcome::Replied(text);
                    }
                    // Nothing to say; fall through to the next candidate.
                }
                Err(err) => {
                    warn!(action = candidate.action.name(), error = %err, "handler failed, trying next candidate");
                }
            }
        }
        DispatchOutcome::NoAction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionOutcome;
    use agora_core::{Error, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    struct Fixed {
        name: &'static str,
        score: f32,
    }

    #[async_trait]
    impl Evaluator for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn evaluate(&self, _ctx: &DispatchContext) -> Result<EvaluatorResult> {
            Ok(EvaluatorResult::matched(self.score, "fixed"))
        }
    }

    enum Behavior {
        Reply(&'static str),
        InformationalFailure(&'static str),
        Silent,
        Fail,
    }

    struct TestAction {
        name: &'static str,
        eligible: bool,
        behavior: Behavior,
        validate_calls: AtomicUsize,
        handle_calls: AtomicUsize,
    }

    impl TestAction {
        fn new(name: &'static str, eligible: bool, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                name,
                eligible,
                behavior,
                validate_calls: AtomicUsize::new(0),
                handle_calls: AtomicUsize::new(0),
            })
        }

        fn handled(&self) -> usize {
            self.handle_calls.load(AtomicOrdering::SeqCst)
        }

        fn validated(&self) -> usize {
            self.validate_calls.load(AtomicOrdering::SeqCst)
        }
    }

    #[async_trait]
    impl Action for TestAction {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn validate(&self, _ctx: &DispatchContext) -> Result<bool> {
            self.validate_calls.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(self.eligible)
        }

        async fn handle(&self, _ctx: &DispatchContext) -> Result<ActionOutcome> {
            self.handle_calls.fetch_add(1, AtomicOrdering::SeqCst);
            match &self.behavior {
                Behavior::Reply(text) => Ok(ActionOutcome::reply(text)),
                Behavior::InformationalFailure(text) => Ok(ActionOutcome::failed(text)),
                Behavior::Silent => Ok(ActionOutcome::silent()),
                Behavior::Fail => Err(Error::Action("exploded".to_string())),
            }
        }
    }

    fn engine() -> DispatchEngine {
        DispatchEngine::new(DispatchConfig::default())
    }

    fn ctx() -> DispatchContext {
        DispatchContext::new("finn", "scan $MINO")
    }

    #[tokio::test]
    async fn test_short_circuit_on_first_text() {
        let first = TestAction::new("first", true, Behavior::Reply("first wins"));
        let second = TestAction::new("second", true, Behavior::Reply("never seen"));

        let mut engine = engine();
        engine.add_evaluator(Arc::new(Fixed { name: "eval", score: 0.9 }));
        engine.add_route(ActionRoute::direct("eval", first.clone()));
        engine.add_route(ActionRoute::direct("eval", second.clone()));

        let outcome = engine.dispatch(&ctx()).await;
        assert_eq!(outcome, DispatchOutcome::Replied("first wins".to_string()));
        assert_eq!(first.handled(), 1);
        assert_eq!(second.handled(), 0);
    }

    #[tokio::test]
    async fn test_fallback_after_handler_failure() {
        let flaky = TestAction::new("flaky", true, Behavior::Fail);
        let backup = TestAction::new("backup", true, Behavior::Reply("backup answered"));

        let mut engine = engine();
        engine.add_evaluator(Arc::new(Fixed { name: "eval", score: 0.9 }));
        engine.add_route(ActionRoute::direct("eval", flaky.clone()));
        engine.add_route(ActionRoute::direct("eval", backup.clone()));

        let outcome = engine.dispatch(&ctx()).await;
        assert_eq!(outcome, DispatchOutcome::Replied("backup answered".to_string()));
        assert_eq!(flaky.handled(), 1);
        assert_eq!(backup.handled(), 1);
    }

    #[tokio::test]
    async fn test_silent_candidate_falls_through() {
        let quiet = TestAction::new("quiet", true, Behavior::Silent);
        let talkative = TestAction::new("talkative", true, Behavior::Reply("spoke up"));

        let mut engine = engine();
        engine.add_evaluator(Arc::new(Fixed { name: "eval", score: 0.9 }));
        engine.add_route(ActionRoute::direct("eval", quiet));
        engine.add_route(ActionRoute::direct("eval", talkative));

        let outcome = engine.dispatch(&ctx()).await;
        assert_eq!(outcome, DispatchOutcome::Replied("spoke up".to_string()));
    }

    #[tokio::test]
    async fn test_informational_failure_short_circuits() {
        let gate = TestAction::new(
            "gate",
            true,
            Behavior::InformationalFailure("connect your wallet first"),
        );
        let backup = TestAction::new("backup", true, Behavior::Reply("never"));

        let mut engine = engine();
        engine.add_evaluator(Arc::new(Fixed { name: "eval", score: 0.9 }));
        engine.add_route(ActionRoute::direct("eval", gate));
        engine.add_route(ActionRoute::direct("eval", backup.clone()));

        let outcome = engine.dispatch(&ctx()).await;
        assert_eq!(
            outcome,
            DispatchOutcome::Replied("connect your wallet first".to_string())
        );
        assert_eq!(backup.handled(), 0);
    }

    #[tokio::test]
    async fn test_no_match_is_a_sentinel() {
        let action = TestAction::new("unreachable", true, Behavior::Reply("no"));

        let mut engine = engine();
        engine.add_evaluator(Arc::new(Fixed { name: "eval", score: 0.2 }));
        engine.add_route(ActionRoute::direct("eval", action.clone()));

        let outcome = engine.dispatch(&ctx()).await;
        assert_eq!(outcome, DispatchOutcome::NoAction);
        assert_eq!(outcome.text(), None);
        assert_eq!(action.handled(), 0);
    }

    #[tokio::test]
    async fn test_context_gated_beats_higher_scored_direct() {
        // A context-gated candidate sits in a more important tier than a
        // direct candidate with a perfect evaluator score.
        let reminder = TestAction::new("reminder", true, Behavior::Reply("reminder first"));
        let direct = TestAction::new("direct", true, Behavior::Reply("direct"));

        let mut engine = engine();
        engine.add_evaluator(Arc::new(Fixed { name: "eval", score: 1.0 }));
        engine.add_route(ActionRoute::direct("eval", direct.clone()));
        engine.add_route(ActionRoute::context_gated(reminder));

        let outcome = engine.dispatch(&ctx()).await;
        assert_eq!(outcome, DispatchOutcome::Replied("reminder first".to_string()));
        assert_eq!(direct.handled(), 0);
    }

    #[tokio::test]
    async fn test_ineligible_context_gated_is_not_collected() {
        let reminder = TestAction::new("reminder", false, Behavior::Reply("nope"));

        let mut engine = engine();
        engine.add_route(ActionRoute::context_gated(reminder.clone()));

        let outcome = engine.dispatch(&ctx()).await;
        assert_eq!(outcome, DispatchOutcome::NoAction);
        assert_eq!(reminder.handled(), 0);
    }

    #[tokio::test]
    async fn test_specificity_chain_picks_first_validating_action() {
        let specific = TestAction::new("specific", false, Behavior::Reply("specific"));
        let general = TestAction::new("general", true, Behavior::Reply("general"));

        let mut engine = engine();
        engine.add_evaluator(Arc::new(Fixed { name: "eval", score: 0.8 }));
        engine.add_route(ActionRoute::specificity(
            "eval",
            vec![specific.clone() as Arc<dyn Action>, general.clone()],
        ));

        let outcome = engine.dispatch(&ctx()).await;
        assert_eq!(outcome, DispatchOutcome::Replied("general".to_string()));
        assert_eq!(specific.handled(), 0);
        // The chain probed the specific action once, during collection, and
        // the winning candidate was not re-validated at execution time.
        assert_eq!(specific.validated(), 1);
        assert_eq!(general.validated(), 1);
    }

    #[tokio::test]
    async fn test_equal_tier_ties_break_on_score_then_insertion() {
        let low = TestAction::new("low", true, Behavior::Reply("low score"));
        let high = TestAction::new("high", true, Behavior::Reply("high score"));

        let mut engine = engine();
        engine.add_evaluator(Arc::new(Fixed { name: "weak", score: 0.6 }));
        engine.add_evaluator(Arc::new(Fixed { name: "strong", score: 0.9 }));
        // Inserted first but weaker; the stronger score must dispatch first.
        engine.add_route(ActionRoute::direct("weak", low.clone()));
        engine.add_route(ActionRoute::direct("strong", high.clone()));

        let outcome = engine.dispatch(&ctx()).await;
        assert_eq!(outcome, DispatchOutcome::Replied("high score".to_string()));
        assert_eq!(low.handled(), 0);

        // Equal scores fall back to insertion order.
        let first = TestAction::new("first", true, Behavior::Reply("inserted first"));
        let second = TestAction::new("second", true, Behavior::Reply("inserted second"));
        let mut engine = engine_with_equal_scores();
        engine.add_route(ActionRoute::direct("a", first));
        engine.add_route(ActionRoute::direct("b", second.clone()));
        let outcome = engine.dispatch(&ctx()).await;
        assert_eq!(outcome, DispatchOutcome::Replied("inserted first".to_string()));
        assert_eq!(second.handled(), 0);
    }

    fn engine_with_equal_scores() -> DispatchEngine {
        let mut engine = engine();
        engine.add_evaluator(Arc::new(Fixed { name: "a", score: 0.7 }));
        engine.add_evaluator(Arc::new(Fixed { name: "b", score: 0.7 }));
        engine
    }

    #[tokio::test]
    async fn test_failing_evaluator_never_aborts_dispatch() {
        struct Broken;

        #[async_trait]
        impl Evaluator for Broken {
            fn name(&self) -> &'static str {
                "broken"
            }

            async fn evaluate(&self, _ctx: &DispatchContext) -> Result<EvaluatorResult> {
                Err(Error::Evaluator("feed offline".to_string()))
            }
        }

        let action = TestAction::new("ok", true, Behavior::Reply("still works"));

        let mut engine = engine();
        engine.add_evaluator(Arc::new(Broken));
        engine.add_evaluator(Arc::new(Fixed { name: "eval", score: 0.9 }));
        engine.add_route(ActionRoute::direct("broken", TestAction::new(
            "dead",
            true,
            Behavior::Reply("never"),
        )));
        engine.add_route(ActionRoute::direct("eval", action));

        let outcome = engine.dispatch(&ctx()).await;
        assert_eq!(outcome, DispatchOutcome::Replied("still works".to_string()));
    }
}

pub mod action;
pub mod context;
pub mod engine;
pub mod enrich;
pub mod evaluator;
pub mod evaluators;

pub use action::{Action, ActionOutcome};
pub use context::{ContextAssembler, ConversationContext};
pub use engine::{
    ActionRoute, DispatchEngine, DispatchOutcome, CONTEXT_TIER, DIRECT_TIER, SPECIFICITY_TIER,
};
pub use enrich::{CachedProvider, EnrichmentPipeline, Provider, TokenDirectory, TokenRef};
pub use evaluator::{run_evaluators, DispatchContext, Evaluator, EvaluatorResult};
pub use evaluators::{
    extract_address, extract_ticker, PriceQueryEvaluator, ScanRequestEvaluator,
    TokenMentionEvaluator,
};

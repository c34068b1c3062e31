//! Reference wiring: a coordinator with two personas, the built-in
//! evaluators, a fixture token directory, and a small set of actions that
//! exercise the bus. The embedding chat server replaces the fixtures with
//! live lookups; the shape stays the same.

use agora_bus::{keys, Coordinator};
use agora_core::{Capability, Config, Result};
use agora_dispatch::{
    extract_address, extract_ticker, Action, ActionOutcome, ActionRoute, ContextAssembler,
    ConversationContext, DispatchContext, DispatchEngine, DispatchOutcome, EnrichmentPipeline,
    PriceQueryEvaluator, Provider, ScanRequestEvaluator, TokenDirectory, TokenMentionEvaluator,
    TokenRef,
};
use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

pub struct Runtime {
    coordinator: Arc<Coordinator>,
    engine: DispatchEngine,
    assembler: ContextAssembler,
}

impl Runtime {
    pub fn new(config: &Config) -> Self {
        let coordinator = Arc::new(Coordinator::new(config.bus.clone()));
        coordinator
            .registry()
            .register("neo", [Capability::Scan, Capability::Alert]);
        coordinator
            .registry()
            .register("finn", [Capability::Advise, Capability::Price]);
        coordinator.shared().set(keys::WORLD_HEALTH, json!(80));

        let directory: Arc<dyn TokenDirectory> = Arc::new(FixtureTokenDirectory::new());

        let mut engine = DispatchEngine::new(config.dispatch.clone());
        engine.add_evaluator(Arc::new(TokenMentionEvaluator));
        engine.add_evaluator(Arc::new(PriceQueryEvaluator));
        engine.add_evaluator(Arc::new(ScanRequestEvaluator));
        engine.add_route(ActionRoute::direct(
            "scan_request",
            Arc::new(ScanAction {
                coordinator: coordinator.clone(),
                directory: directory.clone(),
            }),
        ));
        engine.add_route(ActionRoute::specificity(
            "price_query",
            vec![
                Arc::new(TokenPriceAction {
                    directory: directory.clone(),
                }) as Arc<dyn Action>,
                Arc::new(MarketOverviewAction {
                    coordinator: coordinator.clone(),
                }),
            ],
        ));
        engine.add_route(ActionRoute::context_gated(Arc::new(ReminderAction {
            coordinator: coordinator.clone(),
        })));

        let pipeline = EnrichmentPipeline::new(&config.dispatch, &config.enrich)
            .with_world_provider(Arc::new(WorldStateProvider {
                coordinator: coordinator.clone(),
            }))
            .add_conditional(
                Regex::new(r"(?i)@?(neo|finn)\b").unwrap(),
                Arc::new(AgentMentionProvider {
                    coordinator: coordinator.clone(),
                }),
            )
            .with_token_lookup(
                Arc::new(TokenMentionEvaluator),
                Some(Arc::new(PriceQueryEvaluator) as Arc<dyn agora_dispatch::Evaluator>),
                directory,
            );
        let assembler = ContextAssembler::new(pipeline, coordinator.clone());

        Self {
            coordinator,
            engine,
            assembler,
        }
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    pub async fn dispatch(&self, persona: &str, utterance: &str) -> DispatchOutcome {
        self.engine
            .dispatch(&DispatchContext::new(persona, utterance))
            .await
    }

    pub async fn conversation_context(
        &self,
        persona: &str,
        utterance: &str,
    ) -> ConversationContext {
        self.assembler
            .build(&DispatchContext::new(persona, utterance))
            .await
    }
}

/// Ambient world block read from shared context.
struct WorldStateProvider {
    coordinator: Arc<Coordinator>,
}

#[async_trait]
impl Provider for WorldStateProvider {
    fn name(&self) -> &'static str {
        "world_state"
    }

    async fn get(&self, _ctx: &DispatchContext) -> Result<Option<String>> {
        Ok(self
            .coordinator
            .shared()
            .get(keys::WORLD_HEALTH)
            .map(|health| format!("World health: {}/100", health)))
    }
}

/// Who is online and what they can do, for turns that name an agent.
struct AgentMentionProvider {
    coordinator: Arc<Coordinator>,
}

#[async_trait]
impl Provider for AgentMentionProvider {
    fn name(&self) -> &'static str {
        "agent_mention"
    }

    async fn get(&self, _ctx: &DispatchContext) -> Result<Option<String>> {
        let statuses = self.coordinator.registry().list_statuses();
        if statuses.is_empty() {
            return Ok(None);
        }
        let lines: Vec<String> = statuses
            .iter()
            .map(|s| {
                let mut caps: Vec<String> = s.capabilities.iter().map(|c| c.to_string()).collect();
                caps.sort();
                format!("{} ({}) [{}]", s.agent_id, s.liveness, caps.join(", "))
            })
            .collect();
        Ok(Some(format!("Known agents:\n{}", lines.join("\n"))))
    }
}

struct FixtureToken {
    symbol: &'static str,
    address: &'static str,
    summary: &'static str,
    stats: &'static str,
}

/// In-memory stand-in for the token metadata API.
struct FixtureTokenDirectory {
    tokens: Vec<FixtureToken>,
}

impl FixtureTokenDirectory {
    fn new() -> Self {
        Self {
            tokens: vec![
                FixtureToken {
                    symbol: "MINO",
                    address: "0x1111111111111111111111111111111111111111",
                    summary: "Minotaur index token. LP locked, contract renounced.",
                    stats: "Price: 0.042 | 24h: +7% | MCap: 1.2M",
                },
                FixtureToken {
                    symbol: "RUGME",
                    address: "0x2222222222222222222222222222222222222222",
                    summary: "Unverified contract, mint authority retained. High risk.",
                    stats: "Price: 0.0001 | 24h: -93% | MCap: 4k",
                },
            ],
        }
    }

    fn entry(&self, predicate: impl Fn(&FixtureToken) -> bool) -> Option<&FixtureToken> {
        self.tokens.iter().find(|t| predicate(t))
    }
}

fn token_ref(token: &FixtureToken) -> TokenRef {
    TokenRef {
        symbol: token.symbol.to_string(),
        address: token.address.to_string(),
        summary: token.summary.to_string(),
    }
}

#[async_trait]
impl TokenDirectory for FixtureTokenDirectory {
    async fn by_address(&self, address: &str) -> Result<Option<TokenRef>> {
        Ok(self
            .entry(|t| t.address.eq_ignore_ascii_case(address))
            .map(token_ref))
    }

    async fn by_symbol(&self, symbol: &str) -> Result<Option<TokenRef>> {
        Ok(self
            .entry(|t| t.symbol.eq_ignore_ascii_case(symbol))
            .map(token_ref))
    }

    async fn market_stats(&self, token: &TokenRef) -> Result<Option<String>> {
        Ok(self
            .entry(|t| t.symbol == token.symbol)
            .map(|t| t.stats.to_string()))
    }
}

/// Resolves the mentioned token and reports risk signals. A risky result
/// also raises an urgent alert on the bus and pins it in shared context.
struct ScanAction {
    coordinator: Arc<Coordinator>,
    directory: Arc<dyn TokenDirectory>,
}

impl ScanAction {
    async fn resolve(&self, utterance: &str) -> Result<Option<TokenRef>> {
        if let Some(address) = extract_address(utterance) {
            if let Some(token) = self.directory.by_address(&address).await? {
                return Ok(Some(token));
            }
        }
        if let Some(symbol) = extract_ticker(utterance) {
            return self.directory.by_symbol(&symbol).await;
        }
        Ok(None)
    }
}

#[async_trait]
impl Action for ScanAction {
    fn name(&self) -> &'static str {
        "token_scan"
    }

    async fn validate(&self, ctx: &DispatchContext) -> Result<bool> {
        Ok(extract_address(&ctx.utterance).is_some() || extract_ticker(&ctx.utterance).is_some())
    }

    async fn handle(&self, ctx: &DispatchContext) -> Result<ActionOutcome> {
        let Some(token) = self.resolve(&ctx.utterance).await? else {
            // Informational failure: the user still gets an answer.
            return Ok(ActionOutcome::failed(
                "I can't find that token — give me a contract address and I'll look again.",
            ));
        };

        let risky = token.summary.to_lowercase().contains("risk");
        if risky {
            let alert = format!("rug risk on {} ({})", token.symbol, token.address);
            info!(symbol = %token.symbol, "scan found risk signals, raising alert");
            self.coordinator
                .bus()
                .alert(&ctx.persona, &alert, Some(json!({ "symbol": token.symbol })));
            self.coordinator
                .shared()
                .set(keys::ACTIVE_ALERT, json!(alert));
        }

        let verdict = if risky {
            "Walk away from this one."
        } else {
            "Nothing alarming in the usual places."
        };
        Ok(ActionOutcome::reply(&format!(
            "Scan of {} ({}): {} {}",
            token.symbol, token.address, token.summary, verdict
        ))
        .with_data(json!({ "symbol": token.symbol, "risky": risky })))
    }
}

/// Specific head of the price chain: only eligible when a concrete token is
/// named.
struct TokenPriceAction {
    directory: Arc<dyn TokenDirectory>,
}

#[async_trait]
impl Action for TokenPriceAction {
    fn name(&self) -> &'static str {
        "token_price"
    }

    async fn validate(&self, ctx: &DispatchContext) -> Result<bool> {
        Ok(extract_address(&ctx.utterance).is_some() || extract_ticker(&ctx.utterance).is_some())
    }

    async fn handle(&self, ctx: &DispatchContext) -> Result<ActionOutcome> {
        let token = if let Some(address) = extract_address(&ctx.utterance) {
            self.directory.by_address(&address).await?
        } else if let Some(symbol) = extract_ticker(&ctx.utterance) {
            self.directory.by_symbol(&symbol).await?
        } else {
            None
        };
        let Some(token) = token else {
            return Ok(ActionOutcome::failed(
                "That token isn't in my book yet — paste the contract address.",
            ));
        };
        let stats = self.directory.market_stats(&token).await?;
        match stats {
            Some(stats) => Ok(ActionOutcome::reply(&format!("{}: {}", token.symbol, stats))),
            None => Ok(ActionOutcome::silent()),
        }
    }
}

/// General tail of the price chain: always eligible, answers from ambient
/// state.
struct MarketOverviewAction {
    coordinator: Arc<Coordinator>,
}

#[async_trait]
impl Action for MarketOverviewAction {
    fn name(&self) -> &'static str {
        "market_overview"
    }

    async fn handle(&self, _ctx: &DispatchContext) -> Result<ActionOutcome> {
        let health = self
            .coordinator
            .shared()
            .get(keys::WORLD_HEALTH)
            .and_then(|v| v.as_i64())
            .unwrap_or(50);
        let mood = if health >= 70 {
            "steady"
        } else if health >= 40 {
            "choppy"
        } else {
            "rough"
        };
        Ok(ActionOutcome::reply(&format!(
            "No single token named — the market overall looks {} (world health {}/100).",
            mood, health
        )))
    }
}

/// Context-gated: fires only while a reminder is pinned for this persona,
/// regardless of what the utterance scored.
struct ReminderAction {
    coordinator: Arc<Coordinator>,
}

impl ReminderAction {
    fn key(persona: &str) -> String {
        format!("pending_reminder:{persona}")
    }
}

#[async_trait]
impl Action for ReminderAction {
    fn name(&self) -> &'static str {
        "reminder"
    }

    async fn validate(&self, ctx: &DispatchContext) -> Result<bool> {
        Ok(self
            .coordinator
            .shared()
            .get(&Self::key(&ctx.persona))
            .is_some())
    }

    async fn handle(&self, ctx: &DispatchContext) -> Result<ActionOutcome> {
        let Some(reminder) = self.coordinator.shared().remove(&Self::key(&ctx.persona)) else {
            return Ok(ActionOutcome::silent());
        };
        let text = reminder.as_str().map(str::to_string).unwrap_or_else(|| reminder.to_string());
        Ok(ActionOutcome::reply(&format!("Before anything else: {text}")))
    }
}

use agora_core::{DispatchConfig, EnrichConfig, Result};
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::evaluator::{score_or_zero, DispatchContext, Evaluator};

/// Source for one ambient context block (world state, persona notes, ...).
/// `Ok(None)` means "nothing to contribute" and is not an error.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn get(&self, ctx: &DispatchContext) -> Result<Option<String>>;
}

/// A token resolved from a mention, with whatever summary the directory has.
#[derive(Debug, Clone)]
pub struct TokenRef {
    pub symbol: String,
    pub address: String,
    pub summary: String,
}

/// Lookup boundary for token reference data. Implemented by the embedding
/// application (HTTP API, database, fixture table — the pipeline does not
/// care).
#[async_trait]
pub trait TokenDirectory: Send + Sync {
    async fn by_address(&self, address: &str) -> Result<Option<TokenRef>>;
    async fn by_symbol(&self, symbol: &str) -> Result<Option<TokenRef>>;
    async fn market_stats(&self, token: &TokenRef) -> Result<Option<String>>;
}

struct CacheState {
    fetched_at: Instant,
    value: Option<String>,
}

/// TTL cache around a provider. The lock is held across the refresh, so
/// concurrent misses collapse into one upstream fetch per window. A failed
/// fetch still stamps the window — a flaky upstream is polled at most once
/// per TTL.
pub struct CachedProvider {
    inner: Arc<dyn Provider>,
    ttl: Duration,
    state: Mutex<Option<CacheState>>,
}

impl CachedProvider {
    pub fn new(inner: Arc<dyn Provider>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            state: Mutex::new(None),
        }
    }

    pub async fn get(&self, ctx: &DispatchContext) -> Option<String> {
        let mut state = self.state.lock().await;
        if let Some(cached) = state.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return cached.value.clone();
            }
        }
        let value = match self.inner.get(ctx).await {
            Ok(value) => value,
            Err(err) => {
                warn!(provider = self.inner.name(), error = %err, "provider fetch failed, omitting block");
                None
            }
        };
        *state = Some(CacheState {
            fetched_at: Instant::now(),
            value: value.clone(),
        });
        value
    }
}

struct ConditionalBlock {
    pattern: Regex,
    provider: Arc<dyn Provider>,
}

struct TokenEnrichment {
    mention: Arc<dyn Evaluator>,
    price: Option<Arc<dyn Evaluator>>,
    directory: Arc<dyn TokenDirectory>,
}

/// Best-effort, cache-aware data-fetch stage. Runs independently of action
/// dispatch, driven by the same utterance; every sub-step failure degrades
/// to "omit this block".
pub struct EnrichmentPipeline {
    primary_threshold: f32,
    secondary_threshold: f32,
    world_ttl: Duration,
    world: Option<CachedProvider>,
    conditional: Vec<ConditionalBlock>,
    token: Option<TokenEnrichment>,
}

impl EnrichmentPipeline {
    pub fn new(dispatch: &DispatchConfig, enrich: &EnrichConfig) -> Self {
        Self {
            primary_threshold: dispatch.primary_threshold,
            secondary_threshold: dispatch.secondary_threshold,
            world_ttl: Duration::from_secs(enrich.world_cache_ttl_secs),
            world: None,
            conditional: Vec::new(),
            token: None,
        }
    }

    /// Ambient world-state block, cached for the configured TTL.
    pub fn with_world_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.world = Some(CachedProvider::new(provider, self.world_ttl));
        self
    }

    /// Block included only when `pattern` matches the raw utterance — a
    /// cheap pre-filter so irrelevant turns never reach the provider.
    pub fn add_conditional(mut self, pattern: Regex, provider: Arc<dyn Provider>) -> Self {
        self.conditional.push(ConditionalBlock { pattern, provider });
        self
    }

    /// Token lookup gated on the mention evaluator (primary threshold), with
    /// the market-stats lookup additionally gated on the price evaluator
    /// (secondary threshold).
    pub fn with_token_lookup(
        mut self,
        mention: Arc<dyn Evaluator>,
        price: Option<Arc<dyn Evaluator>>,
        directory: Arc<dyn TokenDirectory>,
    ) -> Self {
        self.token = Some(TokenEnrichment {
            mention,
            price,
            directory,
        });
        self
    }

    /// Fan out all independent sub-steps, fan in, and concatenate fragments
    /// in a fixed order: world, conditional blocks (registration order),
    /// token reference.
    pub async fn enrich(&self, ctx: &DispatchContext) -> String {
        let world = async {
            match &self.world {
                Some(cached) => cached.get(ctx).await,
                None => None,
            }
        };
        let conditionals = async {
            let applicable = self
                .conditional
                .iter()
                .filter(|block| block.pattern.is_match(&ctx.utterance));
            let fetches = applicable.map(|block| async {
                match block.provider.get(ctx).await {
                    Ok(value) => value,
                    Err(err) => {
                        warn!(provider = block.provider.name(), error = %err, "conditional block failed, omitting");
                        None
                    }
                }
            });
            futures::future::join_all(fetches).await
        };
        let token = self.token_block(ctx);

        let (world, conditionals, token) = tokio::join!(world, conditionals, token);

        let mut blocks: Vec<String> = Vec::new();
        blocks.extend(world);
        blocks.extend(conditionals.into_iter().flatten());
        blocks.extend(token);
        blocks.join("\n\n")
    }

    async fn token_block(&self, ctx: &DispatchContext) -> Option<String> {
        let token = self.token.as_ref()?;
        let result = score_or_zero(Some(&token.mention), ctx).await;
        if result.score < self.primary_threshold {
            return None;
        }
        let data = result.data?;

        // Resolve with independent fallbacks: by address, else by symbol,
        // else skip the block entirely.
        let mut resolved = None;
        if let Some(address) = data.get("address").and_then(|v| v.as_str()) {
            resolved = match token.directory.by_address(address).await {
                Ok(found) => found,
                Err(err) => {
                    warn!(error = %err, "address lookup failed, falling back to symbol");
                    None
                }
            };
        }
        if resolved.is_none() {
            if let Some(symbol) = data.get("symbol").and_then(|v| v.as_str()) {
                resolved = match token.directory.by_symbol(symbol).await {
                    Ok(found) => found,
                    Err(err) => {
                        warn!(error = %err, "symbol lookup failed, omitting token block");
                        None
                    }
                };
            }
        }
        let resolved = resolved?;
        debug!(symbol = %resolved.symbol, "token reference resolved");

        let mut block = format!(
            "Token reference: {} ({})\n{}",
            resolved.symbol, resolved.address, resolved.summary
        );

        // Dependent lookup behind the secondary threshold.
        let price_score = score_or_zero(token.price.as_ref(), ctx).await.score;
        if price_score >= self.secondary_threshold {
            match token.directory.market_stats(&resolved).await {
                Ok(Some(stats)) => {
                    block.push('\n');
                    block.push_str(&stats);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %err, "market stats lookup failed, omitting stats");
                }
            }
        }
        Some(block)
    }
}

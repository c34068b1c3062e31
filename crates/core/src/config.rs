use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub enrich: EnrichConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusConfig {
    /// Maximum number of messages kept in the log; older entries are evicted.
    #[serde(default = "default_log_bound")]
    pub log_bound: usize,
    /// Per-subscriber channel capacity.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
    /// Lifetime of broadcast alerts.
    #[serde(default = "default_alert_ttl_secs")]
    pub alert_ttl_secs: i64,
    /// How many pending messages the coordination digest shows.
    #[serde(default = "default_digest_message_limit")]
    pub digest_message_limit: usize,
    /// Default `limit` for message queries that do not pass one.
    #[serde(default = "default_message_limit")]
    pub default_message_limit: usize,
}

fn default_log_bound() -> usize {
    1000
}

fn default_subscriber_buffer() -> usize {
    64
}

fn default_alert_ttl_secs() -> i64 {
    300
}

fn default_digest_message_limit() -> usize {
    3
}

fn default_message_limit() -> usize {
    50
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            log_bound: default_log_bound(),
            subscriber_buffer: default_subscriber_buffer(),
            alert_ttl_secs: default_alert_ttl_secs(),
            digest_message_limit: default_digest_message_limit(),
            default_message_limit: default_message_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchConfig {
    /// Minimum evaluator score for an action candidate.
    #[serde(default = "default_primary_threshold")]
    pub primary_threshold: f32,
    /// Minimum score for dependent enrichment lookups.
    #[serde(default = "default_secondary_threshold")]
    pub secondary_threshold: f32,
}

fn default_primary_threshold() -> f32 {
    0.5
}

fn default_secondary_threshold() -> f32 {
    0.3
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            primary_threshold: default_primary_threshold(),
            secondary_threshold: default_secondary_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichConfig {
    /// TTL for the cached world-state block. One upstream fetch per window.
    #[serde(default = "default_world_cache_ttl_secs")]
    pub world_cache_ttl_secs: u64,
}

fn default_world_cache_ttl_secs() -> u64 {
    60
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            world_cache_ttl_secs: default_world_cache_ttl_secs(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

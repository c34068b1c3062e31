use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

/// Well-known shared-context keys the coordination digest looks for.
pub mod keys {
    /// Set while an urgent alert is in effect; the digest surfaces it.
    pub const ACTIVE_ALERT: &str = "active_alert";
    /// Ambient world health, 0-100.
    pub const WORLD_HEALTH: &str = "world_health";
}

/// Flat key/value table visible to every agent. Last writer wins; no
/// expiration, no versioning.
pub struct SharedContext {
    entries: RwLock<HashMap<String, Value>>,
}

impl Default for SharedContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedContext {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn set(&self, key: &str, value: Value) {
        self.entries.write().unwrap().insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().unwrap().get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.entries.write().unwrap().remove(key)
    }

    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.entries.read().unwrap().clone()
    }
}

use agora_core::{AgentStatus, Capability, Liveness, StatusUpdate};
use chrono::Utc;
use std::sync::RwLock;
use tracing::debug;

/// Tracks which agents exist, what they can do, and whether they are
/// reachable right now. Entries are kept in registration order so lookups
/// are deterministic; re-registering an agent replaces it in place.
pub struct CapabilityRegistry {
    agents: RwLock<Vec<AgentStatus>>,
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(Vec::new()),
        }
    }

    /// Insert or replace the agent's capability set and mark it online.
    pub fn register(&self, agent_id: &str, capabilities: impl IntoIterator<Item = Capability>) {
        let status = AgentStatus {
            agent_id: agent_id.to_string(),
            liveness: Liveness::Online,
            last_seen: Utc::now(),
            current_task: None,
            capabilities: capabilities.into_iter().collect(),
        };

        let mut agents = self.agents.write().unwrap();
        match agents.iter_mut().find(|a| a.agent_id == agent_id) {
            Some(slot) => *slot = status,
            None => agents.push(status),
        }
        debug!(agent = agent_id, "agent registered");
    }

    /// Merge fields into an existing status. Unknown agents are silently
    /// ignored.
    pub fn update_status(&self, agent_id: &str, update: StatusUpdate) {
        let mut agents = self.agents.write().unwrap();
        if let Some(status) = agents.iter_mut().find(|a| a.agent_id == agent_id) {
            update.apply(status);
        }
    }

    /// First online agent holding `capability`, in registration order.
    /// Busy and offline agents never match.
    pub fn find_agent_for_task(&self, capability: Capability) -> Option<String> {
        self.agents
            .read()
            .unwrap()
            .iter()
            .find(|a| a.liveness == Liveness::Online && a.capabilities.contains(&capability))
            .map(|a| a.agent_id.clone())
    }

    /// Snapshot copy of all statuses.
    pub fn list_statuses(&self) -> Vec<AgentStatus> {
        self.agents.read().unwrap().clone()
    }

    pub fn online_agents(&self) -> Vec<String> {
        self.agents
            .read()
            .unwrap()
            .iter()
            .filter(|a| a.liveness == Liveness::Online)
            .map(|a| a.agent_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_lookup() {
        let registry = CapabilityRegistry::new();
        registry.register("neo", [Capability::Scan, Capability::Alert]);
        registry.register("finn", [Capability::Advise]);

        assert_eq!(registry.find_agent_for_task(Capability::Scan).as_deref(), Some("neo"));
        assert_eq!(registry.find_agent_for_task(Capability::Advise).as_deref(), Some("finn"));
        assert_eq!(registry.find_agent_for_task(Capability::Entertain), None);

        registry.update_status("neo", StatusUpdate::liveness(Liveness::Offline));
        assert_eq!(registry.find_agent_for_task(Capability::Scan), None);
    }

    #[test]
    fn test_busy_agents_do_not_match() {
        let registry = CapabilityRegistry::new();
        registry.register("neo", [Capability::Scan]);
        registry.update_status("neo", StatusUpdate::liveness(Liveness::Busy));
        assert_eq!(registry.find_agent_for_task(Capability::Scan), None);
    }

    #[test]
    fn test_registration_order_is_lookup_order() {
        let registry = CapabilityRegistry::new();
        registry.register("first", [Capability::Scan]);
        registry.register("second", [Capability::Scan]);
        assert_eq!(registry.find_agent_for_task(Capability::Scan).as_deref(), Some("first"));

        // Re-registering keeps the original slot.
        registry.register("first", [Capability::Scan, Capability::Alert]);
        assert_eq!(registry.find_agent_for_task(Capability::Scan).as_deref(), Some("first"));
        assert_eq!(registry.list_statuses()[0].agent_id, "first");
    }

    #[test]
    fn test_update_unknown_agent_is_a_no_op() {
        let registry = CapabilityRegistry::new();
        registry.update_status("ghost", StatusUpdate::liveness(Liveness::Online));
        assert!(registry.list_statuses().is_empty());
    }

    #[test]
    fn test_list_statuses_is_a_snapshot() {
        let registry = CapabilityRegistry::new();
        registry.register("neo", [Capability::Scan]);
        let snapshot = registry.list_statuses();
        registry.update_status("neo", StatusUpdate::liveness(Liveness::Offline));
        assert_eq!(snapshot[0].liveness, Liveness::Online);
    }
}

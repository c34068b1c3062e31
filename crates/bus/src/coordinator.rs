use agora_core::{AgentStatus, BusConfig};
use serde_json::Value;
use std::fmt::Write as _;

use crate::bus::{MessageBus, MessageFilter};
use crate::registry::CapabilityRegistry;
use crate::shared::{keys, SharedContext};

/// Explicitly owned composition of the registry, the message bus, and the
/// shared context table. Constructed once at process start and passed by
/// handle to everything that needs it; there is no global instance.
pub struct Coordinator {
    registry: CapabilityRegistry,
    bus: MessageBus,
    shared: SharedContext,
    digest_limit: usize,
}

impl Coordinator {
    pub fn new(config: BusConfig) -> Self {
        let digest_limit = config.digest_message_limit;
        Self {
            registry: CapabilityRegistry::new(),
            bus: MessageBus::new(config),
            shared: SharedContext::new(),
            digest_limit,
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn shared(&self) -> &SharedContext {
        &self.shared
    }

    /// Short human-readable digest for one agent: which peers are online,
    /// its top pending messages, and notable shared facts. Returns an empty
    /// string when there is nothing to report — callers treat empty as
    /// "omit this block".
    pub fn build_coordination_context(&self, agent_id: &str) -> String {
        let mut sections: Vec<String> = Vec::new();

        let peers: Vec<String> = self
            .registry
            .list_statuses()
            .iter()
            .filter(|a| a.agent_id != agent_id && a.liveness == agora_core::Liveness::Online)
            .map(describe_agent)
            .collect();
        if !peers.is_empty() {
            sections.push(format!("Agents online: {}", peers.join(", ")));
        }

        let pending = self.bus.get_messages(
            agent_id,
            &MessageFilter::default().with_limit(self.digest_limit),
        );
        if !pending.is_empty() {
            let mut block = String::from("Pending messages:");
            for message in &pending {
                let _ = write!(
                    block,
                    "\n- [{}] {} ({}): {}",
                    message.priority, message.from, message.kind, message.content
                );
            }
            sections.push(block);
        }

        if let Some(alert) = self.shared.get(keys::ACTIVE_ALERT) {
            sections.push(format!("Active alert: {}", render_value(&alert)));
        }
        if let Some(health) = self.shared.get(keys::WORLD_HEALTH) {
            sections.push(format!("World health: {}/100", render_value(&health)));
        }

        if sections.is_empty() {
            return String::new();
        }
        format!("=== AGENT COORDINATION ===\n{}", sections.join("\n"))
    }

    pub fn shutdown(&self) {
        self.bus.shutdown();
    }
}

fn describe_agent(status: &AgentStatus) -> String {
    let mut caps: Vec<String> = status.capabilities.iter().map(|c| c.to_string()).collect();
    caps.sort();
    if caps.is_empty() {
        status.agent_id.clone()
    } else {
        format!("{} [{}]", status.agent_id, caps.join(", "))
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::{
        Capability, Liveness, MessageDraft, MessageKind, Priority, Recipient, StatusUpdate,
    };
    use serde_json::json;

    fn coordinator() -> Coordinator {
        Coordinator::new(BusConfig::default())
    }

    #[test]
    fn test_alert_scenario_digest() {
        let coord = coordinator();
        coord
            .registry()
            .register("neo", [Capability::Scan, Capability::Alert]);
        coord.registry().register("finn", [Capability::Advise]);

        coord.bus().send(
            MessageDraft::new(
                "neo",
                Recipient::from("finn"),
                MessageKind::Alert,
                "rug detected",
            )
            .with_priority(Priority::Urgent),
        );

        let messages = coord.bus().get_messages("finn", &MessageFilter::default());
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].kind, MessageKind::Alert);
        assert_eq!(messages[0].priority, Priority::Urgent);

        let digest = coord.build_coordination_context("finn");
        assert!(digest.contains("COORDINATION"));
        assert!(digest.contains("rug detected"));
        assert!(digest.contains("neo"));
    }

    #[test]
    fn test_empty_digest_is_empty_string() {
        let coord = coordinator();
        assert_eq!(coord.build_coordination_context("finn"), "");
    }

    #[test]
    fn test_offline_peers_are_not_listed() {
        let coord = coordinator();
        coord.registry().register("neo", [Capability::Scan]);
        coord.registry().register("finn", [Capability::Advise]);
        coord
            .registry()
            .update_status("neo", StatusUpdate::liveness(Liveness::Offline));

        let digest = coord.build_coordination_context("finn");
        assert!(!digest.contains("neo"));
    }

    #[test]
    fn test_digest_includes_shared_facts() {
        let coord = coordinator();
        coord.shared().set(keys::WORLD_HEALTH, json!(80));
        coord
            .shared()
            .set(keys::ACTIVE_ALERT, json!("liquidity drained on $MINO"));

        let digest = coord.build_coordination_context("finn");
        assert!(digest.contains("World health: 80/100"));
        assert!(digest.contains("liquidity drained on $MINO"));
    }

    #[test]
    fn test_digest_caps_pending_messages() {
        let coord = coordinator();
        for i in 0..6 {
            coord.bus().send(MessageDraft::new(
                "neo",
                Recipient::from("finn"),
                MessageKind::Update,
                &format!("update {i}"),
            ));
        }
        let digest = coord.build_coordination_context("finn");
        assert_eq!(digest.matches("\n- ").count(), 3);
    }
}

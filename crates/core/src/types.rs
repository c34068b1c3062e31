use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Recipient string meaning "every agent".
pub const WILDCARD: &str = "all";

/// Delivery priority. The declaration order is the sort order:
/// `Urgent` sorts before `Low`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Urgent,
    High,
    Normal,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Urgent => "urgent",
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Alert,
    Query,
    Response,
    Handoff,
    Update,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageKind::Alert => "alert",
            MessageKind::Query => "query",
            MessageKind::Response => "response",
            MessageKind::Handoff => "handoff",
            MessageKind::Update => "update",
        };
        f.write_str(s)
    }
}

/// Message recipient: one agent or every agent. Serialized as the agent id,
/// with `"all"` reserved for the wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Recipient {
    All,
    Agent(String),
}

impl Recipient {
    pub fn includes(&self, agent_id: &str) -> bool {
        match self {
            Recipient::All => true,
            Recipient::Agent(id) => id == agent_id,
        }
    }
}

impl From<&str> for Recipient {
    fn from(raw: &str) -> Self {
        if raw == WILDCARD {
            Recipient::All
        } else {
            Recipient::Agent(raw.to_string())
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipient::All => f.write_str(WILDCARD),
            Recipient::Agent(id) => f.write_str(id),
        }
    }
}

impl Serialize for Recipient {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Recipient {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Recipient::from(raw.as_str()))
    }
}

/// A message owned by the bus log. Immutable once created; the bus assigns
/// `id` and `created_at` at send time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub from: String,
    pub to: Recipient,
    pub kind: MessageKind,
    pub content: String,
    #[serde(default)]
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|t| t <= now).unwrap_or(false)
    }
}

/// What a caller hands to `send`: a message without id or timestamp.
/// `expires_in` is relative so the expiry anchors to the send timestamp.
#[derive(Debug, Clone)]
pub struct MessageDraft {
    pub from: String,
    pub to: Recipient,
    pub kind: MessageKind,
    pub content: String,
    pub data: serde_json::Value,
    pub priority: Priority,
    pub expires_in: Option<Duration>,
}

impl MessageDraft {
    pub fn new(from: &str, to: Recipient, kind: MessageKind, content: &str) -> Self {
        Self {
            from: from.to_string(),
            to,
            kind,
            content: content.to_string(),
            data: serde_json::Value::Null,
            priority: Priority::Normal,
            expires_in: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_expiry(mut self, ttl: Duration) -> Self {
        self.expires_in = Some(ttl);
        self
    }

    pub fn into_message(self, now: DateTime<Utc>) -> Message {
        Message {
            id: Uuid::new_v4(),
            from: self.from,
            to: self.to,
            kind: self.kind,
            content: self.content,
            data: self.data,
            created_at: now,
            priority: self.priority,
            expires_at: self.expires_in.map(|ttl| now + ttl),
        }
    }
}

/// What a registered agent can do. A closed set so call sites that branch on
/// capabilities match exhaustively.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Inspect a token or contract for risk signals.
    Scan,
    /// Raise urgent broadcasts when something looks wrong.
    Alert,
    /// Give trading or safety advice.
    Advise,
    /// Answer price and market questions.
    Price,
    /// Narrate world state and lore.
    Lore,
    /// Run games and casino banter.
    Entertain,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::Scan => "scan",
            Capability::Alert => "alert",
            Capability::Advise => "advise",
            Capability::Price => "price",
            Capability::Lore => "lore",
            Capability::Entertain => "entertain",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Liveness {
    Online,
    Busy,
    Offline,
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Liveness::Online => "online",
            Liveness::Busy => "busy",
            Liveness::Offline => "offline",
        };
        f.write_str(s)
    }
}

/// Registry entry for one agent. Created on registration, mutated by
/// `update_status`, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    pub agent_id: String,
    pub liveness: Liveness,
    pub last_seen: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_task: Option<String>,
    pub capabilities: HashSet<Capability>,
}

/// Partial status update. Unset fields leave the existing value alone;
/// `clear_task` distinguishes "no change" from "task finished".
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub liveness: Option<Liveness>,
    pub current_task: Option<String>,
    pub clear_task: bool,
    pub capabilities: Option<HashSet<Capability>>,
}

impl StatusUpdate {
    pub fn liveness(liveness: Liveness) -> Self {
        Self {
            liveness: Some(liveness),
            ..Default::default()
        }
    }

    pub fn task(task: &str) -> Self {
        Self {
            current_task: Some(task.to_string()),
            ..Default::default()
        }
    }

    pub fn task_done() -> Self {
        Self {
            clear_task: true,
            ..Default::default()
        }
    }

    pub fn with_liveness(mut self, liveness: Liveness) -> Self {
        self.liveness = Some(liveness);
        self
    }

    pub fn apply(self, status: &mut AgentStatus) {
        if let Some(liveness) = self.liveness {
            status.liveness = liveness;
        }
        if let Some(task) = self.current_task {
            status.current_task = Some(task);
        } else if self.clear_task {
            status.current_task = None;
        }
        if let Some(capabilities) = self.capabilities {
            status.capabilities = capabilities;
        }
        status.last_seen = Utc::now();
    }
}

use agora_core::{BusConfig, Message, MessageDraft, MessageKind, Priority, Recipient};
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Filter for `get_messages`. Unset fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    pub since: Option<DateTime<Utc>>,
    pub kinds: Option<Vec<MessageKind>>,
    pub limit: Option<usize>,
}

impl MessageFilter {
    pub fn since(at: DateTime<Utc>) -> Self {
        Self {
            since: Some(at),
            ..Default::default()
        }
    }

    pub fn kinds(kinds: impl IntoIterator<Item = MessageKind>) -> Self {
        Self {
            kinds: Some(kinds.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

struct Subscriber {
    id: u64,
    target: Recipient,
    tx: mpsc::Sender<Arc<Message>>,
}

/// Live feed of messages for one subscriber. Each subscription owns its own
/// buffered channel, so a stalled consumer cannot hold up the sender or its
/// peers. Dropping the subscription (or calling `MessageBus::unsubscribe`)
/// ends delivery.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<Arc<Message>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn recv(&mut self) -> Option<Arc<Message>> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Arc<Message>> {
        self.rx.try_recv().ok()
    }
}

/// Bounded, time-ordered message log with per-subscriber delivery channels.
pub struct MessageBus {
    config: BusConfig,
    log: RwLock<VecDeque<Arc<Message>>>,
    subscribers: RwLock<Vec<Subscriber>>,
    next_sub_id: AtomicU64,
}

impl MessageBus {
    pub fn new(config: BusConfig) -> Self {
        Self {
            config,
            log: RwLock::new(VecDeque::new()),
            subscribers: RwLock::new(Vec::new()),
            next_sub_id: AtomicU64::new(1),
        }
    }

    /// Assign an id and timestamp, append to the log (evicting the oldest
    /// entries past the bound), then notify matching subscribers.
    pub fn send(&self, draft: MessageDraft) -> Uuid {
        let message = Arc::new(draft.into_message(Utc::now()));
        {
            let mut log = self.log.write().unwrap();
            log.push_back(message.clone());
            while log.len() > self.config.log_bound {
                log.pop_front();
            }
        }
        debug!(id = %message.id, from = %message.from, to = %message.to, kind = %message.kind, "message sent");
        self.notify(&message);
        message.id
    }

    /// Send to every agent at normal priority.
    pub fn broadcast(
        &self,
        from: &str,
        kind: MessageKind,
        content: &str,
        data: Option<serde_json::Value>,
    ) -> Uuid {
        let mut draft = MessageDraft::new(from, Recipient::All, kind, content);
        if let Some(data) = data {
            draft = draft.with_data(data);
        }
        self.send(draft)
    }

    /// Urgent broadcast that expires after the configured alert TTL.
    pub fn alert(&self, from: &str, content: &str, data: Option<serde_json::Value>) -> Uuid {
        let mut draft = MessageDraft::new(from, Recipient::All, MessageKind::Alert, content)
            .with_priority(Priority::Urgent)
            .with_expiry(Duration::seconds(self.config.alert_ttl_secs));
        if let Some(data) = data {
            draft = draft.with_data(data);
        }
        self.send(draft)
    }

    /// Hand a task to a specific agent at high priority.
    pub fn handoff(&self, from: &str, to: &str, content: &str, data: serde_json::Value) -> Uuid {
        self.send(
            MessageDraft::new(from, Recipient::from(to), MessageKind::Handoff, content)
                .with_priority(Priority::High)
                .with_data(data),
        )
    }

    /// Ask a specific agent a question.
    pub fn query(&self, from: &str, to: &str, question: &str) -> Uuid {
        self.send(MessageDraft::new(
            from,
            Recipient::from(to),
            MessageKind::Query,
            question,
        ))
    }

    fn notify(&self, message: &Arc<Message>) {
        let mut subscribers = self.subscribers.write().unwrap();
        subscribers.retain(|sub| {
            if !Self::matches(&sub.target, &message.to) {
                return true;
            }
            match sub.tx.try_send(message.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    // The subscriber keeps its slot; only this delivery is lost.
                    warn!(subscriber = sub.id, "subscriber channel full, dropping delivery");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(subscriber = sub.id, "subscriber gone, pruning");
                    false
                }
            }
        });
    }

    fn matches(target: &Recipient, to: &Recipient) -> bool {
        match (target, to) {
            // Wildcard listeners see every message.
            (Recipient::All, _) => true,
            // Broadcasts reach every listener.
            (_, Recipient::All) => true,
            (Recipient::Agent(a), Recipient::Agent(b)) => a == b,
        }
    }

    /// Register for every future message addressed to `target` (including
    /// broadcasts). Pass `"all"` to listen to all traffic.
    pub fn subscribe(&self, target: &str) -> Subscription {
        let (tx, rx) = mpsc::channel(self.config.subscriber_buffer);
        let id = self.next_sub_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().unwrap().push(Subscriber {
            id,
            target: Recipient::from(target),
            tx,
        });
        Subscription { id, rx }
    }

    pub fn unsubscribe(&self, id: u64) {
        self.subscribers.write().unwrap().retain(|s| s.id != id);
    }

    /// Messages visible to `agent_id`, grouped by priority (urgent first) and
    /// newest-first within a priority, truncated to the filter limit.
    pub fn get_messages(&self, agent_id: &str, filter: &MessageFilter) -> Vec<Arc<Message>> {
        let now = Utc::now();
        let log = self.log.read().unwrap();
        // Walk the log newest-first; the stable sort below then keeps
        // newest-first order within each priority band without comparing
        // timestamps (equal timestamps would otherwise tie ambiguously).
        let mut out: Vec<Arc<Message>> = log
            .iter()
            .rev()
            .filter(|m| m.to.includes(agent_id))
            .filter(|m| !m.is_expired_at(now))
            .filter(|m| filter.since.map_or(true, |s| m.created_at >= s))
            .filter(|m| {
                filter
                    .kinds
                    .as_ref()
                    .map_or(true, |kinds| kinds.contains(&m.kind))
            })
            .cloned()
            .collect();
        out.sort_by_key(|m| m.priority);
        out.truncate(filter.limit.unwrap_or(self.config.default_message_limit));
        out
    }

    /// Drop all subscriptions. Deliveries already pushed into subscriber
    /// channels are not recalled.
    pub fn shutdown(&self) {
        self.subscribers.write().unwrap().clear();
    }

    #[cfg(test)]
    fn log_len(&self) -> usize {
        self.log.read().unwrap().len()
    }
}

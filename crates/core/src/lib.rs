pub mod config;
pub mod error;
pub mod types;

pub use config::{BusConfig, Config, DispatchConfig, EnrichConfig};
pub use error::{Error, Result};
pub use types::{
    AgentStatus, Capability, Liveness, Message, MessageDraft, MessageKind, Priority, Recipient,
    StatusUpdate, WILDCARD,
};

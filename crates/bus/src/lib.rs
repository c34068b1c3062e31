pub mod bus;
pub mod coordinator;
pub mod registry;
pub mod shared;

pub use bus::{MessageBus, MessageFilter, Subscription};
pub use coordinator::Coordinator;
pub use registry::CapabilityRegistry;
pub use shared::{keys, SharedContext};

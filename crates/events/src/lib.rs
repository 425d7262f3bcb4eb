//! Outbound event mechanics: the `Event` trait, envelopes, a pub/sub bus and
//! the deterministic command execution helper.
//!
//! Nothing here knows about batches or products.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};

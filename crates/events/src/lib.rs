//! `vendora-events` — domain event abstractions.
//!
//! Events are immutable facts, appended to per-aggregate streams and fanned
//! out to read-model projections through an [`EventBus`].

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};

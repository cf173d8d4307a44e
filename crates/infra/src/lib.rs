//! `vendora-infra` — event store, command dispatch, read models, and the
//! receiving engine.
//!
//! This crate composes the pure domain crates into a running system: an
//! append-only event store with optimistic concurrency, the generic command
//! execution pipeline, disposable read-model projections, and the one
//! cross-aggregate service (receiving).

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod receiving;


pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent};
pub use read_model::{InMemoryStore, Store};
pub use receiving::{ReceiveOutcome, ReceivingEngine};

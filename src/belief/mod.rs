//! Belief base and belief-change events.
//!
//! The base is owned and mutated by a single agent. Every mutation queues a
//! [`BeliefEvent`] for the agent's reasoning cycle and fans it out to any
//! subscribed [`BeliefProbe`].

/// Literal storage and queries.
pub mod base;
/// Event type definitions.
pub mod event;
/// External event subscriptions.
pub mod probe;

pub use base::{BeliefBase, Query};
pub use event::{BeliefEvent, BeliefEventKind};
pub use probe::{BeliefProbe, ProbeConfig};

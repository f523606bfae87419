//! # Event Bus
//!
//! Lifecycle notifications for composite operations and health-change
//! notifications from the health monitor.

pub mod publisher;
pub mod types;

pub use publisher::{EventBus, EventListener, SubscriptionId};
pub use types::{EventKind, OrchestratorEvent};

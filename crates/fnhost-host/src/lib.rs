//! Host services for fnhost functions.
//!
//! This crate provides the shared services a function can reach while it
//! runs. Both are safe to call from any thread and never hold their lock
//! while user code executes.
//!
//! # Services
//!
//! - [`event`]: In-process publish/subscribe bus used for event choreography
//! - [`metrics`]: Per-function execution counters with cold-start detection

pub mod event;
pub mod metrics;

pub use event::{Event, EventBus, EventContext, EventHandler, SubscriptionId};
pub use metrics::{FunctionMetrics, MetricsCollector};

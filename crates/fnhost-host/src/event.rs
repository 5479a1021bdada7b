//! In-process publish/subscribe event bus.
//!
//! The [`EventBus`] lets functions trigger other functions without a central
//! scheduler. Delivery is synchronous: [`EventBus::publish`] runs every
//! subscriber on the calling thread, in subscription order, and returns the
//! errors they reported.
//!
//! # Reentrancy
//!
//! `publish` copies the subscriber list under a read lock and releases the
//! lock before calling anyone, so a subscriber may itself publish or
//! subscribe (even for the same event type) without deadlocking. A
//! subscription added during a publish is seen by the next publish, not the
//! one in flight.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use fnhost_common::EventError;

/// A transient event: a type tag and an ordered key-value payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event type, e.g. `function.executed`.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Open payload; no schema is enforced.
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl Event {
    /// Create a new event.
    pub fn new(event_type: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }
}

/// Context threaded through one chain of publishes.
///
/// Subscribers that publish follow-up events should pass the context they
/// received so the whole chain shares one request id in the logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventContext {
    request_id: String,
}

impl EventContext {
    /// Create a context with a fresh request id.
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create a context that reuses an existing request id.
    pub fn with_request_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
        }
    }

    /// The request id shared by this chain of events.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

impl Default for EventContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A subscriber callback.
pub type EventHandler = Arc<dyn Fn(&EventContext, &Event) -> Result<(), EventError> + Send + Sync>;

/// Opaque handle identifying one subscription.
///
/// Returned by [`EventBus::subscribe`]; pass it back to
/// [`EventBus::unsubscribe`] to remove exactly that entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Clone)]
struct Subscription {
    id: SubscriptionId,
    handler: EventHandler,
}

/// Event bus dispatching events to subscribers by type.
pub struct EventBus {
    /// Event type -> subscribers in subscription order.
    ///
    /// Lists are shared with in-flight publishes; writers copy on write.
    handlers: RwLock<HashMap<String, Arc<Vec<Subscription>>>>,

    next_id: AtomicU64,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// The process-wide bus, created on first access.
    ///
    /// Prefer passing a bus explicitly; this exists for code that has no
    /// other way to reach one.
    pub fn global() -> Arc<EventBus> {
        static GLOBAL: OnceLock<Arc<EventBus>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(EventBus::new())).clone()
    }

    /// Append `handler` to the subscribers of `event_type`.
    ///
    /// The same logical handler may be subscribed several times; each call
    /// creates an independent entry.
    pub fn subscribe<F>(&self, event_type: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&EventContext, &Event) -> Result<(), EventError> + Send + Sync + 'static,
    {
        let event_type = event_type.into();
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let mut handlers = self.handlers.write();
        let list = handlers.entry(event_type.clone()).or_default();
        Arc::make_mut(list).push(Subscription {
            id,
            handler: Arc::new(handler),
        });

        debug!(event_type = %event_type, subscription = %id, subscribers = list.len(), "Subscribed");
        id
    }

    /// Deliver `event` to every current subscriber of its type.
    ///
    /// Every subscriber runs even if an earlier one fails; all errors are
    /// returned in delivery order. No subscribers is not an error.
    pub fn publish(&self, ctx: &EventContext, event: &Event) -> Vec<EventError> {
        let snapshot = self.handlers.read().get(&event.event_type).cloned();

        let Some(subscribers) = snapshot else {
            debug!(
                request_id = ctx.request_id(),
                event_type = %event.event_type,
                "No subscribers for event"
            );
            return Vec::new();
        };

        debug!(
            request_id = ctx.request_id(),
            event_type = %event.event_type,
            subscribers = subscribers.len(),
            "Publishing event"
        );

        let mut errors = Vec::new();
        for subscription in subscribers.iter() {
            if let Err(e) = (subscription.handler)(ctx, event) {
                warn!(
                    request_id = ctx.request_id(),
                    event_type = %event.event_type,
                    subscription = %subscription.id,
                    error = %e,
                    "Event handler failed"
                );
                errors.push(e);
            }
        }

        errors
    }

    /// Remove the subscription `id` from `event_type`.
    ///
    /// Returns `true` if an entry was removed.
    pub fn unsubscribe(&self, event_type: &str, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        let Some(list) = handlers.get_mut(event_type) else {
            return false;
        };

        let Some(position) = list.iter().position(|s| s.id == id) else {
            return false;
        };

        Arc::make_mut(list).remove(position);
        if list.is_empty() {
            handlers.remove(event_type);
        }

        debug!(event_type = %event_type, subscription = %id, "Unsubscribed");
        true
    }

    /// Number of subscribers currently registered for `event_type`.
    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.handlers.read().get(event_type).map_or(0, |l| l.len())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("event_types", &self.handlers.read().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_subscribe() {
        let bus = EventBus::new();
        bus.subscribe("test-event", |_, _| Ok(()));

        assert_eq!(bus.subscriber_count("test-event"), 1);
        assert_eq!(bus.subscriber_count("other"), 0);
    }

    #[test]
    fn test_publish_delivers_event() {
        let bus = EventBus::new();
        let received = Arc::new(Mutex::new(None));

        let sink = received.clone();
        bus.subscribe("test-event", move |_, event| {
            *sink.lock() = Some(event.clone());
            Ok(())
        });

        let event = Event::new("test-event", payload(json!({"key": "value"})));
        let errors = bus.publish(&EventContext::new(), &event);

        assert!(errors.is_empty());
        assert_eq!(received.lock().as_ref(), Some(&event));
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        let errors = bus.publish(&EventContext::new(), &Event::new("unknown", Map::new()));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_publish_order_and_no_short_circuit() {
        let bus = EventBus::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        for name in ["A", "B", "C"] {
            let calls = calls.clone();
            bus.subscribe("T", move |_, _| {
                calls.lock().push(name);
                if name == "B" {
                    Err(EventError::handler("B failed"))
                } else {
                    Ok(())
                }
            });
        }

        let errors = bus.publish(&EventContext::new(), &Event::new("T", Map::new()));

        assert_eq!(*calls.lock(), vec!["A", "B", "C"]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "event handler failed: B failed");
    }

    #[test]
    fn test_duplicate_subscriptions_are_independent() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU64::new(0));

        let handler = {
            let count = count.clone();
            move |_: &EventContext, _: &Event| {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        };
        let first = bus.subscribe("T", handler.clone());
        bus.subscribe("T", handler);

        bus.publish(&EventContext::new(), &Event::new("T", Map::new()));
        assert_eq!(count.load(Ordering::SeqCst), 2);

        assert!(bus.unsubscribe("T", first));
        bus.publish(&EventContext::new(), &Event::new("T", Map::new()));
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let id = bus.subscribe("T", |_, _| Ok(()));

        assert!(bus.unsubscribe("T", id));
        assert_eq!(bus.subscriber_count("T"), 0);

        // Second removal finds nothing
        assert!(!bus.unsubscribe("T", id));
        assert!(!bus.unsubscribe("missing", id));
    }

    #[test]
    fn test_subscribe_during_publish_uses_snapshot() {
        let bus = Arc::new(EventBus::new());
        let late_calls = Arc::new(AtomicU64::new(0));

        let inner_bus = bus.clone();
        let late = late_calls.clone();
        bus.subscribe("T", move |_, _| {
            let late = late.clone();
            inner_bus.subscribe("T", move |_, _| {
                late.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            Ok(())
        });

        bus.publish(&EventContext::new(), &Event::new("T", Map::new()));
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);
        assert_eq!(bus.subscriber_count("T"), 2);

        bus.publish(&EventContext::new(), &Event::new("T", Map::new()));
        assert_eq!(late_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reentrant_publish() {
        let bus = Arc::new(EventBus::new());
        let reached = Arc::new(AtomicU64::new(0));

        let inner_bus = bus.clone();
        bus.subscribe("first", move |ctx, event| {
            let errors = inner_bus.publish(ctx, &Event::new("second", event.payload.clone()));
            assert!(errors.is_empty());
            Ok(())
        });

        let flag = reached.clone();
        bus.subscribe("second", move |_, event| {
            assert_eq!(event.payload.get("id"), Some(&json!(7)));
            flag.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish(&EventContext::new(), &Event::new("first", payload(json!({"id": 7}))));
        assert_eq!(reached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_publish_and_subscribe() {
        let bus = Arc::new(EventBus::new());
        let count = Arc::new(AtomicU64::new(0));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let bus = bus.clone();
                let count = count.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let count = count.clone();
                        bus.subscribe("T", move |_, _| {
                            count.fetch_add(1, Ordering::Relaxed);
                            Ok(())
                        });
                        bus.publish(&EventContext::new(), &Event::new("T", Map::new()));
                    }
                })
            })
            .collect();

        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(bus.subscriber_count("T"), 400);
        assert!(count.load(Ordering::Relaxed) > 0);
    }

    #[test]
    fn test_global_bus_is_shared() {
        let bus1 = EventBus::global();
        let bus2 = EventBus::global();
        assert!(Arc::ptr_eq(&bus1, &bus2));
    }

    #[test]
    fn test_event_json_shape() {
        let event: Event =
            serde_json::from_value(json!({"type": "user.created", "payload": {"id": 1}})).unwrap();
        assert_eq!(event.event_type, "user.created");
        assert_eq!(event.payload.get("id"), Some(&json!(1)));

        // Payload is optional
        let event: Event = serde_json::from_value(json!({"type": "ping"})).unwrap();
        assert!(event.payload.is_empty());
    }

    #[test]
    fn test_context_request_id() {
        let ctx = EventContext::with_request_id("req-1");
        assert_eq!(ctx.request_id(), "req-1");
        assert_ne!(EventContext::new().request_id(), EventContext::new().request_id());
    }
}

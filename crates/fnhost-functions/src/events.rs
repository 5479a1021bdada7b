//! Event bus access from a request.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::info;

use fnhost_common::{FunctionError, FunctionHandler, FunctionInput};
use fnhost_core::{FunctionContext, NativeFunction};
use fnhost_host::{Event, EventBus, EventContext};

use crate::required_str;

pub const PUBLISHER: NativeFunction = NativeFunction {
    name: "event-publisher",
    description: "A function that publishes events",
    constructor: |ctx| Box::new(Publisher::new(ctx)),
};

pub const SUBSCRIBER: NativeFunction = NativeFunction {
    name: "event-subscriber",
    description: "A function that subscribes to events",
    constructor: |ctx| Box::new(Subscriber::new(ctx)),
};

/// Publishes `input.payload` as an event of type `input.event_type`.
pub struct Publisher {
    bus: Arc<EventBus>,
}

impl Publisher {
    pub fn new(ctx: &FunctionContext) -> Self {
        Self {
            bus: ctx.bus().clone(),
        }
    }
}

impl FunctionHandler for Publisher {
    fn execute(&self, input: &FunctionInput) -> Result<Value, FunctionError> {
        let event_type = required_str(input, "event_type")?;
        let payload = match input.get("payload") {
            None => return Err(FunctionError::invalid_input("payload is required")),
            Some(Value::Object(payload)) => payload.clone(),
            Some(_) => return Err(FunctionError::invalid_input("payload must be an object")),
        };

        let errors = self
            .bus
            .publish(&EventContext::new(), &Event::new(event_type, payload));

        if errors.is_empty() {
            Ok(json!({"published": true, "event_type": event_type}))
        } else {
            Ok(json!({
                "published": false,
                "event_type": event_type,
                "errors": errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
            }))
        }
    }
}

/// Subscribes a logging handler to `input.event_type`.
pub struct Subscriber {
    bus: Arc<EventBus>,
}

impl Subscriber {
    pub fn new(ctx: &FunctionContext) -> Self {
        Self {
            bus: ctx.bus().clone(),
        }
    }
}

impl FunctionHandler for Subscriber {
    fn execute(&self, input: &FunctionInput) -> Result<Value, FunctionError> {
        let event_type = required_str(input, "event_type")?;
        let handler_name = input
            .get("handler_name")
            .and_then(Value::as_str)
            .unwrap_or("default-handler")
            .to_string();

        let subscriber = handler_name.clone();
        let id = self.bus.subscribe(event_type, move |ctx, event| {
            info!(
                request_id = ctx.request_id(),
                handler = %subscriber,
                event_type = %event.event_type,
                payload = ?event.payload,
                "Received event"
            );
            Ok(())
        });

        Ok(json!({
            "subscribed": true,
            "event_type": event_type,
            "handler": handler_name,
            "subscription_id": id.to_string(),
            "message": "Event handler registered successfully",
        }))
    }
}

//! A three-step process coordinated only through events.
//!
//! ```text
//! execute(step1) ──► process.step1.completed ──► step2 subscriber
//!                    process.step2.completed ◄──┘
//!                            │
//!                            ▼
//!                     step3 subscriber ──► process.completed
//! ```
//!
//! Each step subscribes when it is constructed. Delivery is synchronous, so
//! the whole chain runs inside the first publish.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::info;

use fnhost_common::{EventError, FunctionError, FunctionHandler, FunctionInput};
use fnhost_core::{FunctionContext, NativeFunction};
use fnhost_host::{Event, EventBus, EventContext};

pub const STEP1_COMPLETED: &str = "process.step1.completed";
pub const STEP2_COMPLETED: &str = "process.step2.completed";
pub const PROCESS_COMPLETED: &str = "process.completed";

pub const STEP1: NativeFunction = NativeFunction {
    name: "event-chain-step1",
    description: "First step in an event chain",
    constructor: |ctx| Box::new(Step1::new(ctx)),
};

pub const STEP2: NativeFunction = NativeFunction {
    name: "event-chain-step2",
    description: "Second step in an event chain",
    constructor: |ctx| Box::new(Step2::new(ctx)),
};

pub const STEP3: NativeFunction = NativeFunction {
    name: "event-chain-step3",
    description: "Final step in an event chain",
    constructor: |ctx| Box::new(Step3::new(ctx)),
};

/// Starts a process and hands it to step 2.
pub struct Step1 {
    bus: Arc<EventBus>,
}

impl Step1 {
    pub fn new(ctx: &FunctionContext) -> Self {
        ctx.bus().subscribe(PROCESS_COMPLETED, |ctx, event| {
            info!(request_id = ctx.request_id(), payload = ?event.payload, "Process completed");
            Ok(())
        });

        Self {
            bus: ctx.bus().clone(),
        }
    }
}

impl FunctionHandler for Step1 {
    fn execute(&self, input: &FunctionInput) -> Result<Value, FunctionError> {
        let process_id = match input.get("id") {
            Some(Value::String(id)) => format!("process-{id}"),
            Some(id) => format!("process-{id}"),
            None => "process-unknown".to_string(),
        };
        info!(process_id = %process_id, "Step 1: processing request");

        let mut data = Map::new();
        data.insert("process_id".into(), json!(process_id));
        data.extend(input.clone());
        data.insert("step1_result".into(), json!("Step 1 processing completed"));
        data.insert("next_step".into(), json!("step2"));

        let errors = self
            .bus
            .publish(&EventContext::new(), &Event::new(STEP1_COMPLETED, data));

        Ok(json!({
            "status": "processing",
            "step": "step1",
            "process_id": process_id,
            "message": "Step 1 processing initiated, event published for step 2",
            "errors": errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
        }))
    }
}

/// Reacts to step 1 and hands the process to step 3.
pub struct Step2;

impl Step2 {
    pub fn new(ctx: &FunctionContext) -> Self {
        let bus = Arc::downgrade(ctx.bus());
        ctx.bus().subscribe(STEP1_COMPLETED, move |ctx, event| {
            let Some(bus) = bus.upgrade() else {
                return Ok(());
            };
            forward(
                &bus,
                ctx,
                event,
                STEP2_COMPLETED,
                [
                    ("step2_result", json!("Step 2 processing completed")),
                    ("next_step", json!("step3")),
                ],
            )
        });
        Self
    }
}

impl FunctionHandler for Step2 {
    fn execute(&self, _input: &FunctionInput) -> Result<Value, FunctionError> {
        Ok(json!({
            "status": "ready",
            "message": "Step 2 is ready and listening for events",
        }))
    }
}

/// Reacts to step 2 and announces completion.
pub struct Step3;

impl Step3 {
    pub fn new(ctx: &FunctionContext) -> Self {
        let bus = Arc::downgrade(ctx.bus());
        ctx.bus().subscribe(STEP2_COMPLETED, move |ctx, event| {
            let Some(bus) = bus.upgrade() else {
                return Ok(());
            };
            forward(
                &bus,
                ctx,
                event,
                PROCESS_COMPLETED,
                [
                    ("step3_result", json!("Step 3 processing completed")),
                    ("status", json!("completed")),
                ],
            )
        });
        Self
    }
}

impl FunctionHandler for Step3 {
    fn execute(&self, _input: &FunctionInput) -> Result<Value, FunctionError> {
        Ok(json!({
            "status": "ready",
            "message": "Step 3 is ready and listening for events",
        }))
    }
}

/// Copy `event`'s payload, add `fields`, and publish it as `next`.
///
/// Failures further down the chain are reported back to the publisher.
fn forward<const N: usize>(
    bus: &EventBus,
    ctx: &EventContext,
    event: &Event,
    next: &str,
    fields: [(&str, Value); N],
) -> Result<(), EventError> {
    let process_id = event
        .payload
        .get("process_id")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    info!(request_id = ctx.request_id(), process_id, from = %event.event_type, to = next, "Forwarding process");

    let mut data = event.payload.clone();
    for (key, value) in fields {
        data.insert(key.to_string(), value);
    }

    let errors = bus.publish(ctx, &Event::new(next, data));
    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<_> = errors.iter().map(ToString::to_string).collect();
        Err(EventError::handler(format!(
            "{next} handlers failed: {}",
            messages.join("; ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn capture_completed(ctx: &FunctionContext) -> Arc<Mutex<Vec<Map<String, Value>>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        ctx.bus().subscribe(PROCESS_COMPLETED, move |_, event| {
            sink.lock().push(event.payload.clone());
            Ok(())
        });
        seen
    }

    #[test]
    fn test_chain_from_step1_event() {
        let ctx = FunctionContext::default();
        let _step2 = Step2::new(&ctx);
        let _step3 = Step3::new(&ctx);
        let seen = capture_completed(&ctx);

        let mut payload = Map::new();
        payload.insert("id".into(), json!(7));
        payload.insert("step1_result".into(), json!("Step 1 processing completed"));

        let errors = ctx
            .bus()
            .publish(&EventContext::new(), &Event::new(STEP1_COMPLETED, payload));
        assert!(errors.is_empty());

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        let completed = &seen[0];
        assert_eq!(completed["id"], 7);
        assert!(completed.contains_key("step1_result"));
        assert_eq!(completed["step2_result"], "Step 2 processing completed");
        assert_eq!(completed["step3_result"], "Step 3 processing completed");
        assert_eq!(completed["status"], "completed");
    }

    #[test]
    fn test_chain_from_step1_execute() {
        let ctx = FunctionContext::default();
        let step1 = Step1::new(&ctx);
        let _step2 = Step2::new(&ctx);
        let _step3 = Step3::new(&ctx);
        let seen = capture_completed(&ctx);

        let input = json!({"id": 7}).as_object().cloned().unwrap();
        let output = step1.execute(&input).unwrap();

        assert_eq!(output["status"], "processing");
        assert_eq!(output["process_id"], "process-7");
        assert_eq!(output["errors"], json!([]));

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["process_id"], "process-7");
        assert_eq!(seen[0]["next_step"], "step3");
        for key in ["step1_result", "step2_result", "step3_result"] {
            assert!(seen[0].contains_key(key), "missing {key}");
        }
    }

    #[test]
    fn test_downstream_failure_is_reported() {
        let ctx = FunctionContext::default();
        let step1 = Step1::new(&ctx);
        let _step2 = Step2::new(&ctx);
        ctx.bus().subscribe(STEP2_COMPLETED, |_, _| Err(EventError::handler("disk full")));

        let input = json!({"id": "abc"}).as_object().cloned().unwrap();
        let output = step1.execute(&input).unwrap();

        assert_eq!(output["process_id"], "process-abc");
        let errors = output["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].as_str().unwrap().contains("disk full"));
    }

    #[test]
    fn test_step1_without_id_still_starts_process() {
        let ctx = FunctionContext::default();
        let step1 = Step1::new(&ctx);
        let _step2 = Step2::new(&ctx);
        let _step3 = Step3::new(&ctx);
        let seen = capture_completed(&ctx);

        let output = step1.execute(&FunctionInput::new()).unwrap();

        assert_eq!(output["status"], "processing");
        assert_eq!(output["process_id"], "process-unknown");
        assert_eq!(seen.lock()[0]["process_id"], "process-unknown");
    }

    #[test]
    fn test_listening_steps_report_ready() {
        let ctx = FunctionContext::default();
        let output = Step2::new(&ctx).execute(&FunctionInput::new()).unwrap();
        assert_eq!(output["status"], "ready");

        let output = Step3::new(&ctx).execute(&FunctionInput::new()).unwrap();
        assert_eq!(output["status"], "ready");
    }
}

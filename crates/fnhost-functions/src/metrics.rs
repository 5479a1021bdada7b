//! A function that records metrics about its own operations.
//!
//! Besides the per-invocation metrics a transport records, each call adds
//! `operation.<name>` and `success.total` or `errors.total` entries to the
//! shared collector.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{Value, json};

use fnhost_common::{FunctionError, FunctionHandler, FunctionInput};
use fnhost_core::{FunctionContext, NativeFunction};
use fnhost_host::MetricsCollector;

pub const FUNCTION: NativeFunction = NativeFunction {
    name: "custom-metrics",
    description: "A function that demonstrates custom metrics",
    constructor: |ctx| Box::new(CustomMetrics::new(ctx)),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Default,
    Fast,
    Slow,
    Error,
}

impl Operation {
    fn parse(name: &str) -> Self {
        match name {
            "fast" => Self::Fast,
            "slow" => Self::Slow,
            "error" => Self::Error,
            _ => Self::Default,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Fast => "fast",
            Self::Slow => "slow",
            Self::Error => "error",
        }
    }

    fn work(self) -> Duration {
        match self {
            Self::Fast => Duration::from_millis(5),
            Self::Default | Self::Error => Duration::from_millis(25),
            Self::Slow => Duration::from_millis(200),
        }
    }
}

/// Simulates operations of different speeds and records them.
pub struct CustomMetrics {
    metrics: Arc<MetricsCollector>,
}

impl CustomMetrics {
    pub fn new(ctx: &FunctionContext) -> Self {
        Self {
            metrics: ctx.metrics().clone(),
        }
    }

    fn record(&self, operation: Operation, duration: Duration, error: Option<&FunctionError>) {
        let error = error.map(|e| e as &dyn std::error::Error);

        self.metrics
            .record_execution(&format!("operation.{}", operation.name()), duration, error);
        let total = if error.is_some() { "errors.total" } else { "success.total" };
        self.metrics.record_execution(total, duration, error);
    }
}

impl FunctionHandler for CustomMetrics {
    fn execute(&self, input: &FunctionInput) -> Result<Value, FunctionError> {
        let operation = Operation::parse(
            input
                .get("operation")
                .and_then(Value::as_str)
                .unwrap_or("default"),
        );

        let start = Instant::now();
        thread::sleep(operation.work());
        let duration = start.elapsed();

        if operation == Operation::Error {
            let err = FunctionError::failed("simulated error in error operation");
            self.record(operation, duration, Some(&err));
            return Err(err);
        }

        self.record(operation, duration, None);

        let name = operation.name();
        let mut message = format!("{name} operation completed successfully");
        if let Some(first) = message.get_mut(0..1) {
            first.make_ascii_uppercase();
        }

        Ok(json!({
            "operation": name,
            "duration": format!("{duration:?}"),
            "message": message,
        }))
    }
}

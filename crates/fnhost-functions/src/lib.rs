//! Built-in native functions.
//!
//! These are compiled into the host and installed with
//! [`Registry::register_native`](fnhost_core::Registry::register_native).
//! They double as reference implementations for plugin authors:
//!
//! - [`hello`]: Greets `input.name`
//! - [`chain`]: Three functions coordinated purely through events
//! - [`events`]: Publish or subscribe on the event bus from a request
//! - [`metrics`]: Records its own operation metrics

pub mod chain;
pub mod events;
pub mod hello;
pub mod metrics;

use fnhost_core::NativeFunction;
use serde_json::Value;

use fnhost_common::{FunctionError, FunctionInput};

/// Every built-in function, in registration order.
pub fn builtin_functions() -> Vec<NativeFunction> {
    vec![
        hello::FUNCTION,
        chain::STEP1,
        chain::STEP2,
        chain::STEP3,
        events::PUBLISHER,
        events::SUBSCRIBER,
        metrics::FUNCTION,
    ]
}

/// Read a required string field.
fn required_str<'a>(input: &'a FunctionInput, key: &str) -> Result<&'a str, FunctionError> {
    match input.get(key) {
        None => Err(FunctionError::invalid_input(format!("{key} is required"))),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(FunctionError::invalid_input(format!("{key} must be a string"))),
    }
}

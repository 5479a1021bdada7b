//! A native function built as a dynamic library.
//!
//! Copy the built `libhello_plugin.so` (or `.dylib`/`.dll`) into the
//! functions directory and it is registered as `hello-plugin` at startup.
//! It also counts `function.executed` events seen on the host's bus.
//!
//! The library statically links its own copy of `tracing` through
//! `fnhost-core`, and that copy never has a dispatcher set, so anything it
//! logs is dropped. It reports through its output instead:
//! `executions_observed` carries the event count.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Value, json};

use fnhost_core::{FunctionContext, FunctionError, FunctionHandler, FunctionInput};

fnhost_core::declare_function! {
    name: "hello-plugin",
    description: "Greets from a dynamically loaded library",
    constructor: HelloPlugin::new,
}

pub struct HelloPlugin {
    observed: Arc<AtomicU64>,
}

impl HelloPlugin {
    pub fn new(ctx: &FunctionContext) -> Self {
        let observed = Arc::new(AtomicU64::new(0));

        let counter = observed.clone();
        ctx.bus().subscribe("function.executed", move |_, _| {
            counter.fetch_add(1, Ordering::Relaxed);
            Ok(())
        });

        Self { observed }
    }
}

impl FunctionHandler for HelloPlugin {
    fn execute(&self, input: &FunctionInput) -> Result<Value, FunctionError> {
        let name = match input.get("name") {
            None => "plugin",
            Some(Value::String(name)) => name,
            Some(_) => return Err(FunctionError::invalid_input("name must be a string")),
        };

        Ok(json!({
            "message": format!("Hello from a plugin, {name}!"),
            "executions_observed": self.observed.load(Ordering::Relaxed),
        }))
    }
}

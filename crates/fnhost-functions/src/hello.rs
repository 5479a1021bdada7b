use fnhost_common::{FunctionError, FunctionHandler, FunctionInput};
use fnhost_core::{FunctionContext, NativeFunction};
use serde_json::{Value, json};

pub const FUNCTION: NativeFunction = NativeFunction {
    name: "hello",
    description: "A simple hello world function",
    constructor: |ctx| Box::new(Hello::new(ctx)),
};

/// Greets `input.name`, or the world.
pub struct Hello;

impl Hello {
    pub fn new(_ctx: &FunctionContext) -> Self {
        Self
    }
}

impl FunctionHandler for Hello {
    fn execute(&self, input: &FunctionInput) -> Result<Value, FunctionError> {
        let name = input.get("name").and_then(Value::as_str).unwrap_or("World");

        Ok(json!({
            "message": format!("Hello, {name}!"),
            "input": input,
        }))
    }
}

//! The function contract shared by every execution backend.
//!
//! A function is anything that implements [`FunctionHandler`]: a native
//! plugin, a built-in registered at compile time, or a WebAssembly module
//! wrapped by the core crate. Each one is described by a [`FunctionInfo`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::FunctionError;

/// Structured input passed to a function: an ordered JSON object.
pub type FunctionInput = Map<String, Value>;

/// The capability every function implements.
///
/// Implementations must be thread-safe: the registry hands out shared
/// references and may call `execute` from many threads at once.
pub trait FunctionHandler: Send + Sync {
    /// Run the function against `input`.
    fn execute(&self, input: &FunctionInput) -> Result<Value, FunctionError>;
}

impl<F> FunctionHandler for F
where
    F: Fn(&FunctionInput) -> Result<Value, FunctionError> + Send + Sync,
{
    fn execute(&self, input: &FunctionInput) -> Result<Value, FunctionError> {
        self(input)
    }
}

/// Execution backend of a function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuntimeKind {
    /// Native code, loaded from a dynamic library or linked in.
    Native,
    /// A sandboxed WebAssembly module.
    Bytecode,
    /// Any other runtime tag declared by an artifact.
    Other(String),
}

impl RuntimeKind {
    /// The tag used on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Native => "native",
            Self::Bytecode => "bytecode",
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for RuntimeKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "native" => Self::Native,
            "bytecode" => Self::Bytecode,
            _ => Self::Other(tag),
        }
    }
}

impl From<&str> for RuntimeKind {
    fn from(tag: &str) -> Self {
        Self::from(tag.to_string())
    }
}

impl From<RuntimeKind> for String {
    fn from(kind: RuntimeKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable metadata describing a registered function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    /// Unique name the function is invoked by.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Execution backend.
    pub runtime: RuntimeKind,
}

impl FunctionInfo {
    /// Create function metadata.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        runtime: impl Into<RuntimeKind>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            runtime: runtime.into(),
        }
    }

    /// Metadata synthesized for a WebAssembly module discovered on disk.
    pub fn bytecode(name: impl Into<String>) -> Self {
        let name = name.into();
        let description = format!("WebAssembly function: {name}");
        Self::new(name, description, RuntimeKind::Bytecode)
    }
}

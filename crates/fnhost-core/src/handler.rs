//! Function handler backed by a WebAssembly module.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use fnhost_common::{FunctionError, FunctionHandler, FunctionInput};

use crate::WasmEngine;
use crate::value::WasmArg;

/// Export called when a bytecode function runs.
pub const DEFAULT_EXPORT: &str = "execute";

/// Runs one export of a module file on every call.
///
/// The handler holds no compiled state of its own; each `execute` goes
/// through [`WasmEngine::execute_function`].
///
/// Input values become positional arguments in the order their keys appear
/// in the input object. Only numbers are accepted.
#[derive(Debug, Clone)]
pub struct BytecodeHandler {
    module_path: PathBuf,
    export_name: String,
    engine: Arc<WasmEngine>,
}

impl BytecodeHandler {
    pub fn new(
        module_path: impl Into<PathBuf>,
        export_name: impl Into<String>,
        engine: Arc<WasmEngine>,
    ) -> Self {
        Self {
            module_path: module_path.into(),
            export_name: export_name.into(),
            engine,
        }
    }

    pub fn module_path(&self) -> &Path {
        &self.module_path
    }

    pub fn export_name(&self) -> &str {
        &self.export_name
    }
}

impl FunctionHandler for BytecodeHandler {
    fn execute(&self, input: &FunctionInput) -> Result<Value, FunctionError> {
        let args = input
            .values()
            .map(WasmArg::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let result = self
            .engine
            .execute_function(&self.module_path, &self.export_name, &args)?;

        Ok(result.map_or(Value::Null, |v| v.to_json()))
    }
}

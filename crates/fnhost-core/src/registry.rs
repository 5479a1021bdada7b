//! The function registry.
//!
//! [`Registry`] maps function names to handlers and metadata and is the one
//! entry point transports use to run functions.
//!
//! # Locking
//!
//! Both maps sit behind a single `RwLock` and are always updated together.
//! [`Registry::execute`] holds the read lock only long enough to clone the
//! handler's `Arc`; the handler body runs with no lock held, so it may call
//! back into the registry (register or execute) without deadlocking.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, error, info, instrument, trace, warn};
use walkdir::WalkDir;

use fnhost_common::{
    EngineError, FunctionError, FunctionHandler, FunctionInfo, FunctionInput, LoadError,
    RuntimeConfig,
};

use crate::handler::{BytecodeHandler, DEFAULT_EXPORT};
use crate::plugin::{NativeFunction, construct, load_plugin};
use crate::{FunctionContext, WasmEngine};

/// File extension of bytecode artifacts.
pub const BYTECODE_EXTENSION: &str = "wasm";

/// File extension of native artifacts on this platform (`so` on Linux).
pub const NATIVE_EXTENSION: &str = std::env::consts::DLL_EXTENSION;

#[derive(Default)]
struct RegistryInner {
    handlers: HashMap<String, Arc<dyn FunctionHandler>>,
    metadata: HashMap<String, FunctionInfo>,
}

/// Outcome of a directory scan.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Names registered by the scan, in scan order.
    pub loaded: Vec<String>,
    /// Artifacts that were skipped because they failed to load.
    pub failed: Vec<(PathBuf, LoadError)>,
}

/// Registry of executable functions.
pub struct Registry {
    inner: RwLock<RegistryInner>,
    engine: Option<Arc<WasmEngine>>,
    context: FunctionContext,
}

impl Registry {
    /// Create an empty registry.
    ///
    /// Without an engine, bytecode artifacts are skipped when scanning.
    pub fn new(engine: Option<Arc<WasmEngine>>, context: FunctionContext) -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            engine,
            context,
        }
    }

    /// Create a registry from configuration and scan the functions directory.
    ///
    /// A failure to initialize the engine is logged and leaves the registry
    /// without bytecode support; it does not fail startup.
    ///
    /// # Errors
    ///
    /// Returns an error only if the functions directory is missing and
    /// cannot be created.
    pub fn from_config(config: &RuntimeConfig, context: FunctionContext) -> Result<Self, LoadError> {
        let engine = match WasmEngine::new(&config.engine) {
            Ok(engine) => Some(Arc::new(engine)),
            Err(e) => {
                warn!(error = %e, "WebAssembly engine unavailable, bytecode functions disabled");
                None
            }
        };

        let registry = Self::new(engine, context);
        registry.load_functions(&config.functions.directory)?;
        Ok(registry)
    }

    /// Register `handler` under `name`, replacing any existing entry.
    pub fn register(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn FunctionHandler>,
        info: FunctionInfo,
    ) {
        let name = name.into();
        let mut inner = self.inner.write();

        let replaced = inner.handlers.insert(name.clone(), handler).is_some();
        inner.metadata.insert(name.clone(), info);

        debug!(function = %name, replaced, "Function registered");
    }

    /// Build and register a function compiled into the host.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::ConstructorPanicked`] if the constructor panics;
    /// nothing is registered in that case.
    pub fn register_native(&self, function: &NativeFunction) -> Result<(), LoadError> {
        let handler = construct(function.constructor, &self.context, function.name)?;
        self.register(function.name, Arc::from(handler), function.info());
        Ok(())
    }

    /// Register the module at `module_path` as a bytecode function.
    ///
    /// The module is not read until the function is executed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotInitialized`] if the registry has no engine.
    pub fn register_bytecode(
        &self,
        name: impl Into<String>,
        module_path: impl Into<PathBuf>,
        export_name: &str,
        info: FunctionInfo,
    ) -> Result<(), EngineError> {
        let engine = self.engine.clone().ok_or(EngineError::NotInitialized)?;
        let handler = BytecodeHandler::new(module_path, export_name, engine);

        self.register(name, Arc::new(handler), info);
        Ok(())
    }

    /// Run the function `name` with `input`.
    ///
    /// Errors from the handler are returned unmodified. A panic in the
    /// handler is caught and returned as [`FunctionError::Panicked`].
    ///
    /// # Errors
    ///
    /// Returns [`FunctionError::NotFound`] if no function has that name.
    #[instrument(level = "debug", skip(self, input))]
    pub fn execute(&self, name: &str, input: &FunctionInput) -> Result<Value, FunctionError> {
        let handler = self
            .inner
            .read()
            .handlers
            .get(name)
            .cloned()
            .ok_or_else(|| FunctionError::not_found(name))?;

        let start = Instant::now();
        let result = catch_unwind(AssertUnwindSafe(|| handler.execute(input))).unwrap_or_else(
            |payload| {
                let message = panic_message(payload.as_ref());
                error!(function = name, panic = %message, "Function panicked");
                Err(FunctionError::Panicked {
                    name: name.to_string(),
                    message,
                })
            },
        );

        debug!(
            function = name,
            success = result.is_ok(),
            duration_ms = start.elapsed().as_millis(),
            "Function executed"
        );

        result
    }

    /// Metadata of every registered function, in no particular order.
    pub fn list_functions(&self) -> Vec<FunctionInfo> {
        self.inner.read().metadata.values().cloned().collect()
    }

    /// Metadata of one function.
    pub fn get_info(&self, name: &str) -> Option<FunctionInfo> {
        self.inner.read().metadata.get(name).cloned()
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().handlers.contains_key(name)
    }

    /// Number of registered functions.
    pub fn len(&self) -> usize {
        self.inner.read().handlers.len()
    }

    /// Whether no function is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recursively scan `dir` and register every recognized artifact.
    ///
    /// `.wasm` files become bytecode functions named after the file stem.
    /// Native libraries are loaded as plugins. Other files are ignored. An
    /// artifact that fails to load is logged and skipped. A missing
    /// directory is created and yields no functions.
    ///
    /// # Errors
    ///
    /// Returns an error only if a missing directory cannot be created.
    #[instrument(skip(self, dir), fields(dir = %dir.display()))]
    pub fn load_functions(&self, dir: &Path) -> Result<LoadReport, LoadError> {
        let mut report = LoadReport::default();

        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|source| LoadError::Io {
                path: dir.display().to_string(),
                source,
            })?;
            info!("Created functions directory");
            return Ok(report);
        }

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            match self.load_artifact(path) {
                Ok(Some(name)) => report.loaded.push(name),
                Ok(None) => trace!(path = %path.display(), "Ignoring unrecognized file"),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to load function artifact");
                    report.failed.push((path.to_path_buf(), e));
                }
            }
        }

        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "Function directory scanned"
        );

        Ok(report)
    }

    /// Load one artifact, dispatching on its extension.
    ///
    /// Returns the registered name, or `None` for unrecognized files.
    pub fn load_artifact(&self, path: &Path) -> Result<Option<String>, LoadError> {
        match path.extension().and_then(OsStr::to_str) {
            Some(BYTECODE_EXTENSION) => self.load_bytecode(path).map(Some),
            Some(ext) if ext == NATIVE_EXTENSION => self.load_native(path).map(Some),
            _ => Ok(None),
        }
    }

    /// Register a bytecode artifact under its file stem.
    pub fn load_bytecode(&self, path: &Path) -> Result<String, LoadError> {
        let name = path
            .file_stem()
            .and_then(OsStr::to_str)
            .ok_or_else(|| LoadError::Scan {
                path: path.display().to_string(),
                reason: "file name is not valid UTF-8".to_string(),
            })?
            .to_string();

        let info = FunctionInfo::bytecode(&name);
        self.register_bytecode(&name, path, DEFAULT_EXPORT, info)
            .map_err(|_| LoadError::EngineUnavailable {
                path: path.display().to_string(),
            })?;

        info!(function = %name, path = %path.display(), "Bytecode function loaded");
        Ok(name)
    }

    /// Load a native plugin and register it under its declared name.
    pub fn load_native(&self, path: &Path) -> Result<String, LoadError> {
        let plugin = load_plugin(path, &self.context)?;
        let name = plugin.info.name.clone();

        self.register(&name, Arc::from(plugin.handler), plugin.info);
        Ok(name)
    }

    /// The bytecode engine, if it initialized.
    pub fn engine(&self) -> Option<&Arc<WasmEngine>> {
        self.engine.as_ref()
    }

    /// Host services handed to native functions.
    pub fn context(&self) -> &FunctionContext {
        &self.context
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("functions", &self.len())
            .field("bytecode", &self.engine.is_some())
            .finish_non_exhaustive()
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use fnhost_common::RuntimeKind;

    fn constant(value: Value) -> Arc<dyn FunctionHandler> {
        Arc::new(move |_: &FunctionInput| -> Result<Value, FunctionError> { Ok(value.clone()) })
    }

    fn input(pairs: &[(&str, Value)]) -> FunctionInput {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn registry() -> Registry {
        Registry::new(None, FunctionContext::default())
    }

    #[test]
    fn test_register_and_execute() {
        let registry = registry();
        registry.register(
            "answer",
            constant(json!(42)),
            FunctionInfo::new("answer", "Returns 42", RuntimeKind::Native),
        );

        assert_eq!(registry.execute("answer", &input(&[])).unwrap(), json!(42));
        assert!(registry.contains("answer"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_execute_not_found() {
        let registry = registry();

        for payload in [input(&[]), input(&[("name", json!("x"))])] {
            let err = registry.execute("missing", &payload).unwrap_err();
            assert!(err.is_not_found());
            assert_eq!(err.to_string(), "function missing not found");
        }
    }

    #[test]
    fn test_handler_error_is_returned_unmodified() {
        let registry = registry();
        let failing: Arc<dyn FunctionHandler> = Arc::new(
            |_: &FunctionInput| -> Result<Value, FunctionError> {
                Err(FunctionError::invalid_input("name is required"))
            },
        );
        registry.register(
            "strict",
            failing,
            FunctionInfo::new("strict", "", RuntimeKind::Native),
        );

        let err = registry.execute("strict", &input(&[])).unwrap_err();
        assert!(matches!(err, FunctionError::InvalidInput { ref reason } if reason == "name is required"));
    }

    #[test]
    fn test_reregister_replaces_both_entries() {
        let registry = registry();
        registry.register(
            "f",
            constant(json!("old")),
            FunctionInfo::new("f", "old version", RuntimeKind::Native),
        );
        registry.register(
            "f",
            constant(json!("new")),
            FunctionInfo::new("f", "new version", RuntimeKind::Bytecode),
        );

        assert_eq!(registry.execute("f", &input(&[])).unwrap(), json!("new"));

        let functions = registry.list_functions();
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].description, "new version");
        assert_eq!(functions[0].runtime, RuntimeKind::Bytecode);
    }

    #[test]
    fn test_list_functions_contains_registered_set() {
        let registry = registry();
        for name in ["a", "b", "c"] {
            registry.register(
                name,
                constant(json!(name)),
                FunctionInfo::new(name, "", RuntimeKind::Native),
            );
        }

        let mut names: Vec<_> = registry
            .list_functions()
            .into_iter()
            .map(|info| info.name)
            .collect();
        names.sort();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn test_panic_is_contained() {
        let registry = registry();
        let panicking: Arc<dyn FunctionHandler> = Arc::new(
            |_: &FunctionInput| -> Result<Value, FunctionError> { panic!("simulated crash") },
        );
        registry.register(
            "crash",
            panicking,
            FunctionInfo::new("crash", "", RuntimeKind::Native),
        );

        let err = registry.execute("crash", &input(&[])).unwrap_err();
        let FunctionError::Panicked { name, message } = err else {
            panic!("expected panic error, got {err:?}");
        };
        assert_eq!(name, "crash");
        assert_eq!(message, "simulated crash");

        // The registry is still usable afterwards
        registry.register(
            "ok",
            constant(json!(true)),
            FunctionInfo::new("ok", "", RuntimeKind::Native),
        );
        assert_eq!(registry.execute("ok", &input(&[])).unwrap(), json!(true));
    }

    #[test]
    fn test_handler_may_reenter_registry() {
        let registry = Arc::new(registry());
        registry.register(
            "inner",
            constant(json!("inner result")),
            FunctionInfo::new("inner", "", RuntimeKind::Native),
        );

        let weak = Arc::downgrade(&registry);
        let outer: Arc<dyn FunctionHandler> = Arc::new(
            move |input: &FunctionInput| -> Result<Value, FunctionError> {
                let registry = weak.upgrade().ok_or_else(|| FunctionError::failed("gone"))?;
                registry.register(
                    "late",
                    constant(json!("late")),
                    FunctionInfo::new("late", "", RuntimeKind::Native),
                );
                registry.execute("inner", input)
            },
        );
        registry.register(
            "outer",
            outer,
            FunctionInfo::new("outer", "", RuntimeKind::Native),
        );

        assert_eq!(
            registry.execute("outer", &input(&[])).unwrap(),
            json!("inner result")
        );
        assert!(registry.contains("late"));
    }

    #[test]
    fn test_register_bytecode_without_engine() {
        let registry = registry();
        let result = registry.register_bytecode(
            "fib",
            "fib.wasm",
            DEFAULT_EXPORT,
            FunctionInfo::bytecode("fib"),
        );

        assert!(matches!(result, Err(EngineError::NotInitialized)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_missing_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let functions = dir.path().join("functions");

        let report = registry().load_functions(&functions).unwrap();

        assert!(functions.is_dir());
        assert!(report.loaded.is_empty());
        assert!(report.failed.is_empty());
    }

    #[test]
    fn test_bytecode_skipped_without_engine() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("add.wasm"), "(module)").unwrap();
        std::fs::write(dir.path().join("README.txt"), "not a function").unwrap();

        let registry = registry();
        let report = registry.load_functions(dir.path()).unwrap();

        assert!(report.loaded.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(
            report.failed[0].1,
            LoadError::EngineUnavailable { .. }
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_constructor_panic_does_not_stop_registration() {
        let registry = registry();
        let broken = NativeFunction {
            name: "broken",
            description: "Panics while being built",
            constructor: |_| panic!("missing configuration"),
        };
        let working = NativeFunction {
            name: "working",
            description: "Builds fine",
            constructor: |_| {
                Box::new(|_: &FunctionInput| -> Result<Value, FunctionError> { Ok(json!("up")) })
            },
        };

        let mut failed = Vec::new();
        for function in [broken, working] {
            if let Err(e) = registry.register_native(&function) {
                failed.push(e);
            }
        }

        assert_eq!(failed.len(), 1);
        assert_eq!(
            failed[0].to_string(),
            "constructor of function broken panicked: missing configuration"
        );
        assert!(!registry.contains("broken"));
        assert_eq!(registry.execute("working", &input(&[])).unwrap(), json!("up"));
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u8), "unknown panic");
    }
}

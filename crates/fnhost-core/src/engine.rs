//! Wasmtime engine configuration and the bytecode execution entry point.
//!
//! The [`WasmEngine`] is created once per process. It owns:
//! - the Wasmtime [`Engine`] (shared, thread-safe, no per-call state)
//! - a [`Linker`] with WASI preview1 and the fnhost host imports
//! - the optional compiled-module cache
//!
//! Every [`WasmEngine::execute_function`] call gets a fresh store and
//! instance that are torn down before it returns.

use std::path::Path;

use tracing::{info, instrument};
use uuid::Uuid;
use wasmtime::{Config, Engine, InstanceAllocationStrategy, Linker, PoolingAllocationConfig};

use fnhost_common::{EngineConfig, EngineError};

use crate::instance::invoke;
use crate::linker::register_all;
use crate::module::{CompiledModule, ModuleCache};
use crate::store::{WorkerContext, create_store};
use crate::value::{WasmArg, WasmValue};

/// Thread-safe WebAssembly engine wrapper.
///
/// # Example
///
/// ```ignore
/// use fnhost_common::EngineConfig;
/// use fnhost_core::{WasmArg, WasmEngine};
///
/// let engine = WasmEngine::new(&EngineConfig::default())?;
/// let result = engine.execute_function("functions/fib.wasm".as_ref(), "execute", &[WasmArg::I32(10)])?;
/// ```
pub struct WasmEngine {
    engine: Engine,
    linker: Linker<WorkerContext>,
    config: EngineConfig,
    cache: Option<ModuleCache>,
}

impl WasmEngine {
    /// Create a new WebAssembly engine with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the Wasmtime configuration is invalid or the host
    /// imports cannot be linked.
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let mut wasmtime_config = Config::new();

        wasmtime_config.cranelift_opt_level(wasmtime::OptLevel::Speed);

        if config.pooling_allocator {
            wasmtime_config.allocation_strategy(InstanceAllocationStrategy::Pooling(
                Self::create_pooling_config(config),
            ));

            info!(
                max_instances = config.max_instances,
                instance_memory_mb = config.instance_memory_mb,
                "Pooling allocator enabled"
            );
        }

        let engine = Engine::new(&wasmtime_config).map_err(|e| {
            EngineError::invalid_config(format!("failed to create Wasmtime engine: {e}"))
        })?;

        let mut linker = Linker::new(&engine);
        register_all(&mut linker)?;

        let cache = config.cache_compiled_modules.then(ModuleCache::new);

        info!(
            module_cache = cache.is_some(),
            inherit_stdio = config.inherit_stdio,
            "Wasmtime engine initialized"
        );

        Ok(Self {
            engine,
            linker,
            config: config.clone(),
            cache,
        })
    }

    fn create_pooling_config(config: &EngineConfig) -> PoolingAllocationConfig {
        let mut pooling = PoolingAllocationConfig::default();

        pooling.total_core_instances(config.max_instances);
        pooling.total_memories(config.max_instances);
        pooling.total_tables(config.max_instances);

        let max_memory_bytes = (config.instance_memory_mb as usize) * 1024 * 1024;
        pooling.max_memory_size(max_memory_bytes);

        pooling
    }

    /// Run `export` from the module at `module_path` with `args`.
    ///
    /// Returns the export's first result, or `None` if it returns nothing.
    ///
    /// # Errors
    ///
    /// Each failure is a distinct [`EngineError`]: unreadable file, compile
    /// failure, instantiation failure, missing export, argument mismatch,
    /// or a trap during the call.
    #[instrument(level = "debug", skip(self, module_path, args), fields(module = %module_path.display()))]
    pub fn execute_function(
        &self,
        module_path: &Path,
        export: &str,
        args: &[WasmArg],
    ) -> Result<Option<WasmValue>, EngineError> {
        let module = self.compile(module_path)?;

        let context = WorkerContext::new(Uuid::new_v4().to_string(), self.config.inherit_stdio);
        let store = create_store(&self.engine, context);

        invoke(
            &self.linker,
            store,
            &module,
            &module_path.display().to_string(),
            export,
            args,
        )
    }

    /// Compile the module at `path`, through the cache when enabled.
    pub fn compile(&self, path: &Path) -> Result<CompiledModule, EngineError> {
        match &self.cache {
            Some(cache) => cache.get_or_compile(&self.engine, path),
            None => CompiledModule::from_file(&self.engine, path),
        }
    }

    /// Get a reference to the inner Wasmtime engine.
    pub fn inner(&self) -> &Engine {
        &self.engine
    }

    /// Get the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The compiled-module cache, if enabled.
    pub fn cache(&self) -> Option<&ModuleCache> {
        self.cache.as_ref()
    }
}

impl std::fmt::Debug for WasmEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmEngine")
            .field("pooling_allocator", &self.config.pooling_allocator)
            .field("cache_compiled_modules", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

//! Function execution core for fnhost.
//!
//! This crate turns function artifacts into runnable handlers:
//! - [`Registry`]: Name to handler dispatch, directory discovery, panic boundary
//! - [`WasmEngine`]: Shared Wasmtime engine running bytecode exports
//! - [`BytecodeHandler`]: Handler that runs one export of a module file
//! - [`plugin`]: Native plugin ABI and the [`declare_function!`] macro
//! - [`FunctionContext`]: Host services handed to native functions
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       Registry                          │
//! │  name -> Arc<dyn FunctionHandler>, name -> FunctionInfo │
//! │  (one RwLock, released before any handler runs)         │
//! └─────────────────────────────────────────────────────────┘
//!            │                                │
//!            ▼                                ▼
//! ┌──────────────────────┐     ┌────────────────────────────┐
//! │   Native handlers    │     │      BytecodeHandler       │
//! │  (plugins, built-ins)│     │  (module path + export)    │
//! └──────────────────────┘     └────────────────────────────┘
//!                                             │
//!                                             ▼
//!                              ┌────────────────────────────┐
//!                              │         WasmEngine         │
//!                              │  Engine + Linker (WASI,    │
//!                              │  env::log), module cache   │
//!                              └────────────────────────────┘
//!                                             │
//!                                             ▼
//!                              ┌────────────────────────────┐
//!                              │ Store<WorkerContext>       │
//!                              │ + Instance (per call)      │
//!                              └────────────────────────────┘
//! ```

pub mod context;
pub mod engine;
pub mod handler;
pub mod instance;
pub mod linker;
pub mod logging;
pub mod module;
pub mod plugin;
pub mod registry;
pub mod store;
pub mod value;

pub use context::FunctionContext;
pub use engine::WasmEngine;
pub use handler::{BytecodeHandler, DEFAULT_EXPORT};
pub use module::{CompiledModule, ModuleCache};
pub use plugin::{HandlerConstructor, NativeFunction, PluginInfo};
pub use registry::{LoadReport, Registry};
pub use store::{LogEntry, LogLevel, WorkerContext};
pub use value::{WasmArg, WasmValue};

pub use fnhost_common::{FunctionError, FunctionHandler, FunctionInfo, FunctionInput};

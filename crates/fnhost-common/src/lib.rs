//! Common types, errors, and configuration for fnhost.
//!
//! This crate provides shared functionality used across the fnhost workspace:
//! - Error types using `thiserror` for type-safe error handling
//! - Configuration structures for runtime and server settings
//! - The [`FunctionHandler`] contract and [`FunctionInfo`] metadata every
//!   function implements, regardless of its execution backend

pub mod config;
pub mod config_file;
pub mod error;
pub mod function;

pub use config::{EngineConfig, FunctionsConfig, MetricsConfig, RuntimeConfig};
pub use config_file::{ConfigFile, ConfigFileError, FunctionEntry, RpcConfig, ServerConfigFile};
pub use error::{EngineError, EventError, FunctionError, LoadError, RuntimeError};
pub use function::{FunctionHandler, FunctionInfo, FunctionInput, RuntimeKind};

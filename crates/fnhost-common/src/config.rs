//! Configuration structures for fnhost.
//!
//! This module defines configuration options for various components:
//! - [`RuntimeConfig`]: Top-level configuration containing all settings
//! - [`EngineConfig`]: Wasmtime engine settings (pooling, module cache)
//! - [`FunctionsConfig`]: Where function artifacts are discovered
//! - [`MetricsConfig`]: Invocation metrics and cold-start detection

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level runtime configuration.
///
/// This structure contains all configuration options for the function host.
/// It can be loaded from files (TOML, JSON) or overridden from the CLI.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Wasmtime engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Function discovery configuration.
    #[serde(default)]
    pub functions: FunctionsConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Wasmtime engine configuration.
///
/// These settings affect the shared engine used by every bytecode function.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Enable pooling allocator for instance creation.
    ///
    /// Every call instantiates a fresh module instance, so a pool trades
    /// reserved virtual memory for faster instantiation.
    #[serde(default = "defaults::pooling_allocator")]
    pub pooling_allocator: bool,

    /// Maximum concurrent instances in the pool.
    ///
    /// Only effective when `pooling_allocator` is enabled.
    #[serde(default = "defaults::max_instances")]
    pub max_instances: u32,

    /// Memory per instance slot in megabytes.
    ///
    /// Only effective when `pooling_allocator` is enabled.
    #[serde(default = "defaults::instance_memory_mb")]
    pub instance_memory_mb: u32,

    /// Keep compiled modules in memory between calls.
    ///
    /// Entries are keyed by module path and recompiled when the file's
    /// length or modification time changes.
    #[serde(default = "defaults::cache_compiled_modules")]
    pub cache_compiled_modules: bool,

    /// Connect guest stdin/stdout/stderr to the host process streams.
    #[serde(default = "defaults::inherit_stdio")]
    pub inherit_stdio: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pooling_allocator: defaults::pooling_allocator(),
            max_instances: defaults::max_instances(),
            instance_memory_mb: defaults::instance_memory_mb(),
            cache_compiled_modules: defaults::cache_compiled_modules(),
            inherit_stdio: defaults::inherit_stdio(),
        }
    }
}

/// Function discovery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FunctionsConfig {
    /// Directory scanned recursively for `.so` and `.wasm` artifacts.
    ///
    /// Created on startup if it does not exist.
    #[serde(default = "defaults::functions_directory")]
    pub directory: PathBuf,
}

impl Default for FunctionsConfig {
    fn default() -> Self {
        Self {
            directory: defaults::functions_directory(),
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Record every invocation made through a transport.
    #[serde(default = "defaults::record_invocations")]
    pub record_invocations: bool,

    /// Idle gap after which the next invocation counts as a cold start.
    #[serde(default = "defaults::cold_start_gap_secs")]
    pub cold_start_gap_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            record_invocations: defaults::record_invocations(),
            cold_start_gap_secs: defaults::cold_start_gap_secs(),
        }
    }
}

impl MetricsConfig {
    /// Get the cold-start gap as a `Duration`.
    pub fn cold_start_gap(&self) -> Duration {
        Duration::from_secs(self.cold_start_gap_secs)
    }
}

/// Default value functions for serde.
mod defaults {
    use std::path::PathBuf;

    pub const fn pooling_allocator() -> bool {
        false
    }

    pub const fn max_instances() -> u32 {
        1000
    }

    pub const fn instance_memory_mb() -> u32 {
        64
    }

    pub const fn cache_compiled_modules() -> bool {
        false
    }

    pub const fn inherit_stdio() -> bool {
        true
    }

    pub fn functions_directory() -> PathBuf {
        PathBuf::from("functions")
    }

    pub const fn record_invocations() -> bool {
        true
    }

    pub const fn cold_start_gap_secs() -> u64 {
        300
    }
}

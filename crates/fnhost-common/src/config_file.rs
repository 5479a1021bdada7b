//! Configuration file structures for fnhost.
//!
//! This module defines structures for TOML configuration files:
//! - [`ConfigFile`]: Top-level configuration file structure
//! - [`ServerConfigFile`]: HTTP server settings
//! - [`RpcConfig`]: RPC transport settings
//! - [`FunctionEntry`]: Explicitly registered bytecode function

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::RuntimeConfig;

/// Top-level configuration file structure.
///
/// # Example
///
/// ```toml
/// [runtime.engine]
/// cache_compiled_modules = true
///
/// [runtime.functions]
/// directory = "./functions"
///
/// [runtime.metrics]
/// cold_start_gap_secs = 300
///
/// [server]
/// bind_addr = "0.0.0.0:8080"
/// request_timeout_secs = 30
///
/// [rpc]
/// enabled = true
/// prefix = "/rpc"
///
/// [[functions]]
/// name = "fib"
/// path = "./modules/fib.wasm"
/// description = "Fibonacci in WebAssembly"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    /// Runtime configuration (engine, discovery, metrics).
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfigFile,

    /// RPC transport configuration.
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Bytecode functions to register in addition to the scanned directory.
    #[serde(default)]
    pub functions: Vec<FunctionEntry>,
}

impl ConfigFile {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigFileError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed as TOML.
    pub fn from_toml(content: &str) -> Result<Self, ConfigFileError> {
        toml::from_str(content).map_err(|e| ConfigFileError::Parse {
            message: e.to_string(),
        })
    }
}

/// HTTP server configuration from config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfigFile {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "defaults::bind_addr")]
    pub bind_addr: String,

    /// Request timeout in seconds.
    #[serde(default = "defaults::request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Enable graceful shutdown.
    #[serde(default = "defaults::graceful_shutdown")]
    pub graceful_shutdown: bool,
}

impl Default for ServerConfigFile {
    fn default() -> Self {
        Self {
            bind_addr: defaults::bind_addr(),
            request_timeout_secs: defaults::request_timeout_secs(),
            graceful_shutdown: defaults::graceful_shutdown(),
        }
    }
}

/// RPC transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RpcConfig {
    /// Serve the RPC endpoints alongside the HTTP API.
    #[serde(default = "defaults::rpc_enabled")]
    pub enabled: bool,

    /// URL prefix for RPC endpoints.
    #[serde(default = "defaults::rpc_prefix")]
    pub prefix: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::rpc_enabled(),
            prefix: defaults::rpc_prefix(),
        }
    }
}

/// A bytecode function registered explicitly at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FunctionEntry {
    /// Name the function is invoked by.
    pub name: String,

    /// Path to the WebAssembly module file.
    pub path: PathBuf,

    /// Optional human-readable description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Configuration file errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("Failed to parse config file: {message}")]
    Parse { message: String },
}

/// Default value functions for serde.
mod defaults {
    pub fn bind_addr() -> String {
        "0.0.0.0:8080".to_string()
    }

    pub const fn request_timeout_secs() -> u64 {
        30
    }

    pub const fn graceful_shutdown() -> bool {
        true
    }

    pub const fn rpc_enabled() -> bool {
        true
    }

    pub fn rpc_prefix() -> String {
        "/rpc".to_string()
    }
}

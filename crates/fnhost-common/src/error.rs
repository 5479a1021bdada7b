//! Error types for fnhost.
//!
//! This module defines a hierarchy of error types using `thiserror`:
//! - [`FunctionError`]: Errors surfaced by `Registry::execute` and handlers
//! - [`EngineError`]: Failures of the bytecode engine (read, compile, call)
//! - [`LoadError`]: Artifact discovery and native plugin loading failures
//! - [`EventError`]: Errors returned by event subscribers
//! - [`RuntimeError`]: Top-level errors for process startup and serving

use std::io;

use thiserror::Error;

use crate::config_file::ConfigFileError;

/// Errors produced when executing a function.
///
/// Handler-originated failures ([`FunctionError::Failed`] and
/// [`FunctionError::InvalidInput`]) are relayed to the caller unmodified by
/// the registry.
#[derive(Error, Debug)]
pub enum FunctionError {
    /// No function is registered under the requested name.
    #[error("function {name} not found")]
    NotFound {
        /// The name that was looked up.
        name: String,
    },

    /// The input did not satisfy the function's expectations.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Description of what was wrong with the input.
        reason: String,
    },

    /// The bytecode engine failed while running the function.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The handler panicked; the panic was contained at the call site.
    #[error("function {name} panicked: {message}")]
    Panicked {
        /// Name of the function whose handler panicked.
        name: String,
        /// Panic payload rendered as text.
        message: String,
    },

    /// The handler body reported a failure.
    #[error("{message}")]
    Failed {
        /// The handler's error message.
        message: String,
    },
}

impl FunctionError {
    /// Create a new `NotFound` error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Create a new `InvalidInput` error.
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Create a new `Failed` error.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Returns `true` if this error indicates the function was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Bytecode engine failures.
///
/// Each variant is a distinct condition so operators can tell artifact
/// problems (unreadable, invalid bytes, missing export) from runtime
/// problems (traps).
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine failed to initialize, so bytecode cannot run.
    #[error("WebAssembly engine not initialized")]
    NotInitialized,

    /// The module file could not be read.
    #[error("failed to read WebAssembly file {path}: {source}")]
    ReadModule {
        /// Path of the module file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The module bytes failed to compile.
    #[error("failed to compile WebAssembly module {path}: {reason}")]
    Compile {
        /// Path of the module file.
        path: String,
        /// Compiler diagnostic.
        reason: String,
    },

    /// The compiled module could not be instantiated.
    #[error("failed to instantiate WebAssembly module {path}: {reason}")]
    Instantiate {
        /// Path of the module file.
        path: String,
        /// Linker or start-function diagnostic.
        reason: String,
    },

    /// The requested export does not exist or is not a function.
    #[error("export '{export}' not found")]
    ExportNotFound {
        /// Name of the export that was requested.
        export: String,
    },

    /// An argument cannot be encoded as a WebAssembly number.
    #[error("unsupported argument type: {type_name}")]
    UnsupportedArgument {
        /// The kind of value that was rejected.
        type_name: String,
    },

    /// The number of arguments does not match the export's signature.
    #[error("export '{export}' expects {expected} arguments, got {actual}")]
    ArgumentCount {
        /// Name of the export.
        export: String,
        /// Parameter count declared by the export.
        expected: usize,
        /// Number of arguments supplied.
        actual: usize,
    },

    /// The call trapped or otherwise failed inside the module.
    #[error("failed to call function {export}: {message}")]
    Call {
        /// Name of the export that was called.
        export: String,
        /// Description of the failure.
        message: String,
        /// Trap code if available.
        code: Option<String>,
    },

    /// Invalid engine configuration was provided.
    #[error("invalid engine configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },
}

impl EngineError {
    /// Create a new `Compile` error.
    pub fn compile(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Compile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new `Instantiate` error.
    pub fn instantiate(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Instantiate {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new `UnsupportedArgument` error.
    pub fn unsupported_argument(type_name: impl Into<String>) -> Self {
        Self::UnsupportedArgument {
            type_name: type_name.into(),
        }
    }

    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

/// Errors raised while discovering or loading function artifacts.
///
/// These are load-time failures: the offending artifact is skipped and the
/// scan continues.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The artifact or directory could not be accessed.
    #[error("failed to access {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Walking the functions directory failed.
    #[error("failed to scan {path}: {reason}")]
    Scan {
        /// Path being scanned.
        path: String,
        /// Description of the failure.
        reason: String,
    },

    /// The dynamic library could not be opened.
    #[error("failed to load plugin {path}: {reason}")]
    OpenLibrary {
        /// Path of the library.
        path: String,
        /// Loader diagnostic.
        reason: String,
    },

    /// A required symbol is not exported by the library.
    #[error("plugin {path} does not export {symbol} symbol")]
    MissingSymbol {
        /// Path of the library.
        path: String,
        /// Name of the missing symbol.
        symbol: String,
    },

    /// A required symbol exists but does not have the expected shape.
    #[error("plugin {path} symbol {symbol} is invalid: {reason}")]
    InvalidSymbol {
        /// Path of the library.
        path: String,
        /// Name of the symbol.
        symbol: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The plugin was built against a different plugin ABI.
    #[error("plugin {path} has ABI version {found}, expected {expected}")]
    AbiMismatch {
        /// Path of the library.
        path: String,
        /// ABI version this host understands.
        expected: u32,
        /// ABI version declared by the plugin.
        found: u32,
    },

    /// A handler constructor panicked while the function was being built.
    #[error("constructor of function {function} panicked: {message}")]
    ConstructorPanicked {
        /// Name of the function being constructed.
        function: String,
        /// Panic payload rendered as text.
        message: String,
    },

    /// A bytecode artifact was found but the engine is unavailable.
    #[error("cannot load {path}: WebAssembly engine not initialized")]
    EngineUnavailable {
        /// Path of the bytecode artifact.
        path: String,
    },
}

/// Errors returned by event subscribers.
#[derive(Error, Debug)]
pub enum EventError {
    /// The subscriber reported a failure.
    #[error("event handler failed: {message}")]
    Handler {
        /// The subscriber's error message.
        message: String,
    },
}

impl EventError {
    /// Create a new `Handler` error.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
        }
    }
}

/// Top-level runtime errors.
///
/// These errors represent failures of the process as a whole: configuration,
/// startup, and serving.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Invalid configuration was provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// Configuration file could not be loaded.
    #[error(transparent)]
    ConfigFile(#[from] ConfigFileError),

    /// I/O operation failed, such as binding the listen address.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl RuntimeError {
    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

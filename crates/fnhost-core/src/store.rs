//! Per-call execution context and store management.
//!
//! This module provides:
//! - [`WorkerContext`]: Per-call state accessible from host functions
//! - [`LogEntry`] and [`LogLevel`]: Structured logging from guest code

use std::time::{Duration, Instant};

use wasmtime::{Engine, Store};
use wasmtime_wasi::WasiCtxBuilder;
use wasmtime_wasi::preview1::WasiP1Ctx;

/// Per-call execution context.
///
/// A context is created for every call into a bytecode module and dropped
/// together with its [`Store`] once the call returns, whatever the outcome.
///
/// Host functions reach it through [`wasmtime::Caller::data_mut`].
pub struct WorkerContext {
    /// WASI preview1 context for system interface calls.
    pub(crate) wasi: WasiP1Ctx,

    /// Unique identifier for tracing.
    pub request_id: String,

    /// Logs collected from guest code.
    pub logs: Vec<LogEntry>,

    /// When the call began; reported in completion and trap traces.
    start_time: Instant,
}

/// A single log entry from guest code.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Log level (debug, info, warn, error).
    pub level: LogLevel,

    /// Log message content.
    pub message: String,
}

/// Log level for guest logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug-level messages.
    Debug,
    /// Informational messages.
    Info,
    /// Warning messages.
    Warn,
    /// Error messages.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl WorkerContext {
    /// Create a new worker context.
    ///
    /// With `inherit_stdio` the guest's stdin, stdout and stderr are the
    /// host process streams; otherwise they are closed.
    pub fn new(request_id: impl Into<String>, inherit_stdio: bool) -> Self {
        let mut builder = WasiCtxBuilder::new();
        if inherit_stdio {
            builder.inherit_stdio();
        }

        Self {
            wasi: builder.build_p1(),
            request_id: request_id.into(),
            logs: Vec::new(),
            start_time: Instant::now(),
        }
    }

    /// Add a log entry.
    pub fn log(&mut self, level: LogLevel, message: String) {
        self.logs.push(LogEntry { level, message });
    }

    /// Time since the context was created.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl std::fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerContext")
            .field("request_id", &self.request_id)
            .field("logs", &self.logs.len())
            .finish_non_exhaustive()
    }
}

/// Create a fresh store for one call.
pub fn create_store(engine: &Engine, context: WorkerContext) -> Store<WorkerContext> {
    Store::new(engine, context)
}

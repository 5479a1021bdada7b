//! Shared application state.
//!
//! This module provides [`AppState`], which holds shared resources
//! across all HTTP and RPC handlers.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, error};

use fnhost_common::{FunctionError, FunctionInput};
use fnhost_core::Registry;
use fnhost_host::{EventBus, MetricsCollector};

/// Shared state across all request handlers.
///
/// Cloned for each request; everything inside is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    registry: Arc<Registry>,

    /// Record a metrics sample for every execution made through a transport.
    record_metrics: bool,
}

impl AppState {
    /// Create state over `registry`.
    ///
    /// The bus and metrics collector are the ones the registry hands to its
    /// functions, so transports and functions observe the same instances.
    pub fn new(registry: Arc<Registry>, record_metrics: bool) -> Self {
        Self {
            registry,
            record_metrics,
        }
    }

    /// Get the function registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Get the event bus.
    pub fn bus(&self) -> &Arc<EventBus> {
        self.registry.context().bus()
    }

    /// Get the metrics collector.
    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        self.registry.context().metrics()
    }

    /// Whether transport executions are recorded.
    pub fn records_metrics(&self) -> bool {
        self.record_metrics
    }

    /// Execute `name` on the blocking pool and record the outcome.
    ///
    /// Unknown names are not recorded, so the collector only ever holds
    /// registered functions.
    pub async fn execute(&self, name: &str, input: FunctionInput) -> Result<Value, FunctionError> {
        let registry = self.registry.clone();
        let function = name.to_string();
        let start = Instant::now();

        let result = tokio::task::spawn_blocking(move || registry.execute(&function, &input))
            .await
            .unwrap_or_else(|e| {
                error!(function = %name, error = %e, "Execution task failed");
                Err(FunctionError::failed(format!("execution task failed: {e}")))
            });

        let duration = start.elapsed();
        debug!(function = %name, duration_ms = duration.as_millis(), ok = result.is_ok(), "Execution finished");

        if self.record_metrics && !matches!(result, Err(FunctionError::NotFound { .. })) {
            let error = result.as_ref().err().map(|e| e as &dyn std::error::Error);
            self.metrics().record_execution(name, duration, error);
        }

        result
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("functions", &self.registry.len())
            .field("record_metrics", &self.record_metrics)
            .finish_non_exhaustive()
    }
}

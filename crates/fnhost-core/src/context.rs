use std::sync::Arc;

use fnhost_host::{EventBus, MetricsCollector};

/// Host services handed to native functions when they are constructed.
///
/// Functions that take part in event choreography subscribe through
/// [`FunctionContext::bus`] from their constructor and keep a clone of the
/// bus for publishing.
#[derive(Clone, Debug)]
pub struct FunctionContext {
    bus: Arc<EventBus>,
    metrics: Arc<MetricsCollector>,
}

impl FunctionContext {
    pub fn new(bus: Arc<EventBus>, metrics: Arc<MetricsCollector>) -> Self {
        Self { bus, metrics }
    }

    /// The event bus shared by every function.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// The metrics collector shared by every function.
    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }
}

impl Default for FunctionContext {
    fn default() -> Self {
        Self::new(Arc::new(EventBus::new()), Arc::new(MetricsCollector::new()))
    }
}

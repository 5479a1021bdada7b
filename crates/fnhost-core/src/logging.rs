//! Guest log capture.
//!
//! Messages a module emits through `env::log` are kept in the call's
//! [`WorkerContext`] and re-emitted through `tracing` with the call's
//! request id.

use tracing::{debug, error, info, warn};

use crate::store::{LogLevel, WorkerContext};

/// Host side of the guest logging import.
pub struct LoggingHost;

impl LoggingHost {
    /// Record `message` at `level` for the current call.
    pub fn log(ctx: &mut WorkerContext, level: LogLevel, message: &str) {
        ctx.log(level, message.to_string());

        let request_id = &ctx.request_id;
        match level {
            LogLevel::Debug => debug!(request_id, guest_log = true, "{}", message),
            LogLevel::Info => info!(request_id, guest_log = true, "{}", message),
            LogLevel::Warn => warn!(request_id, guest_log = true, "{}", message),
            LogLevel::Error => error!(request_id, guest_log = true, "{}", message),
        }
    }
}

/// Convert the numeric level passed by the guest.
///
/// 0=debug, 1=info, 2=warn, 3=error; anything else is treated as info.
pub fn level_from_i32(level: i32) -> LogLevel {
    match level {
        0 => LogLevel::Debug,
        2 => LogLevel::Warn,
        3 => LogLevel::Error,
        _ => LogLevel::Info,
    }
}

//! Host imports offered to bytecode modules.
//!
//! Every module is linked against WASI preview1 and the `env::log` import
//! below. Modules are free to import neither.

use tracing::warn;
use wasmtime::{Caller, Linker};

use fnhost_common::EngineError;

use crate::logging::{LoggingHost, level_from_i32};
use crate::store::WorkerContext;

/// Register WASI preview1 and all fnhost host functions on `linker`.
pub fn register_all(linker: &mut Linker<WorkerContext>) -> Result<(), EngineError> {
    wasmtime_wasi::preview1::add_to_linker_sync(linker, |ctx: &mut WorkerContext| &mut ctx.wasi)
        .map_err(|e| EngineError::invalid_config(format!("failed to link WASI: {e}")))?;
    register_logging(linker)?;
    Ok(())
}

/// Register `env::log(level: i32, ptr: i32, len: i32)`.
///
/// `ptr`/`len` address a UTF-8 message in the module's exported `memory`.
/// Malformed requests are dropped with a warning; they never trap the guest.
pub fn register_logging(linker: &mut Linker<WorkerContext>) -> Result<(), EngineError> {
    linker
        .func_wrap(
            "env",
            "log",
            |mut caller: Caller<'_, WorkerContext>, level: i32, ptr: i32, len: i32| {
                let (Ok(start), Ok(len)) = (usize::try_from(ptr), usize::try_from(len)) else {
                    warn!(ptr, len, "Invalid pointer or length (negative value)");
                    return;
                };

                let Some(memory) = caller
                    .get_export("memory")
                    .and_then(wasmtime::Extern::into_memory)
                else {
                    warn!("Memory export not found in guest module");
                    return;
                };

                // Owned copy so the memory borrow ends before data_mut()
                let message = {
                    let data = memory.data(&caller);
                    let Some(bytes) = start
                        .checked_add(len)
                        .and_then(|end| data.get(start..end))
                    else {
                        warn!(start, len, memory_size = data.len(), "Memory access out of bounds");
                        return;
                    };
                    String::from_utf8_lossy(bytes).into_owned()
                };

                LoggingHost::log(caller.data_mut(), level_from_i32(level), &message);
            },
        )
        .map_err(|e| EngineError::invalid_config(format!("failed to register env::log: {e}")))?;

    Ok(())
}

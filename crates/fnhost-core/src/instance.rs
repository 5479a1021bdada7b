//! Instance lifecycle for one call.
//!
//! [`invoke`] runs the full sequence on a fresh store:
//!
//! 1. Instantiate the module against the shared linker
//! 2. Resolve the export
//! 3. Encode the arguments for the export's parameter types
//! 4. Call it and decode the first result
//!
//! The store, and with it the instance, is dropped before returning.

use tracing::{debug, error};
use wasmtime::{Linker, Store, Trap, Val};

use fnhost_common::EngineError;

use crate::CompiledModule;
use crate::store::WorkerContext;
use crate::value::{WasmArg, WasmValue};

/// Instantiate `module`, call `export` with `args`, and return its first result.
pub fn invoke(
    linker: &Linker<WorkerContext>,
    mut store: Store<WorkerContext>,
    module: &CompiledModule,
    module_path: &str,
    export: &str,
    args: &[WasmArg],
) -> Result<Option<WasmValue>, EngineError> {
    let instance = linker
        .instantiate(&mut store, module.inner())
        .map_err(|e| EngineError::instantiate(module_path, format!("{e:#}")))?;

    let func = instance
        .get_func(&mut store, export)
        .ok_or_else(|| EngineError::ExportNotFound {
            export: export.to_string(),
        })?;

    let ty = func.ty(&store);
    let expected = ty.params().len();
    if expected != args.len() {
        return Err(EngineError::ArgumentCount {
            export: export.to_string(),
            expected,
            actual: args.len(),
        });
    }

    let params = args
        .iter()
        .zip(ty.params())
        .map(|(arg, param)| arg.to_val(&param))
        .collect::<Result<Vec<_>, _>>()?;
    let mut results = vec![Val::I32(0); ty.results().len()];

    if let Err(e) = func.call(&mut store, &params, &mut results) {
        let (message, code) = extract_trap_info(&e);
        error!(
            request_id = %store.data().request_id,
            export,
            trap_message = %message,
            duration_ms = store.data().elapsed().as_millis(),
            "Execution trapped"
        );
        return Err(EngineError::Call {
            export: export.to_string(),
            message,
            code,
        });
    }

    debug!(
        request_id = %store.data().request_id,
        export,
        guest_logs = store.data().logs.len(),
        duration_ms = store.data().elapsed().as_millis(),
        "Execution completed"
    );

    Ok(results.first().and_then(WasmValue::from_val))
}

/// Human-readable trap message and trap code, if any.
fn extract_trap_info(error: &wasmtime::Error) -> (String, Option<String>) {
    let message = error.root_cause().to_string();
    let code = error.downcast_ref::<Trap>().map(|trap| format!("{trap:?}"));

    (message, code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linker::register_all;
    use crate::store::create_store;
    use wasmtime::Engine;

    fn run(wat: &str, export: &str, args: &[WasmArg]) -> Result<Option<WasmValue>, EngineError> {
        let engine = Engine::default();
        let mut linker = Linker::new(&engine);
        register_all(&mut linker).unwrap();

        let module = CompiledModule::from_bytes(&engine, "test.wat", wat.as_bytes()).unwrap();
        let store = create_store(&engine, WorkerContext::new("test", false));

        invoke(&linker, store, &module, "test.wat", export, args)
    }

    #[test]
    fn test_no_result() {
        let result = run(r#"(module (func (export "execute")))"#, "execute", &[]).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_i64_result() {
        let wat = r#"
            (module
                (func (export "execute") (param i64) (result i64)
                    local.get 0
                    i64.const 2
                    i64.mul))
        "#;
        let result = run(wat, "execute", &[WasmArg::I64(21)]).unwrap();
        assert_eq!(result, Some(WasmValue::I64(42)));
    }

    #[test]
    fn test_argument_count_mismatch() {
        let wat = r#"(module (func (export "execute") (param i32)))"#;
        let err = run(wat, "execute", &[]).unwrap_err();

        assert!(matches!(
            err,
            EngineError::ArgumentCount {
                expected: 1,
                actual: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_trap_code() {
        let wat = r#"(module (func (export "execute") unreachable))"#;
        let err = run(wat, "execute", &[]).unwrap_err();

        let EngineError::Call { code, .. } = err else {
            panic!("expected call error, got {err:?}");
        };
        assert_eq!(code.as_deref(), Some("UnreachableCodeReached"));
    }

    #[test]
    fn test_unresolved_import() {
        let wat = r#"
            (module
                (import "env" "missing" (func))
                (func (export "execute")))
        "#;
        let err = run(wat, "execute", &[]).unwrap_err();
        assert!(matches!(err, EngineError::Instantiate { .. }));
    }
}

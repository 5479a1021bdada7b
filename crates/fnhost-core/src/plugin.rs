//! Native function plugins.
//!
//! A plugin is a `cdylib` exporting two symbols:
//!
//! - [`INFO_SYMBOL`]: a `static` [`PluginInfo`] describing the function
//! - [`HANDLER_SYMBOL`]: a [`HandlerConstructor`] building the handler
//!
//! Both are emitted by [`declare_function!`](crate::declare_function).
//! Plugins must be built with the same compiler and `fnhost-core` version as
//! the host; [`PLUGIN_ABI_VERSION`] catches the obvious mismatches.
//!
//! Loaded libraries are never unloaded. Their code backs handlers and
//! subscriptions that live until the process exits.
//!
//! The same constructor type powers [`NativeFunction`], the build-time
//! registration table for functions linked into the host binary.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;

use libloading::{Library, Symbol};
use tracing::{debug, error, info};

use fnhost_common::{FunctionHandler, FunctionInfo, LoadError, RuntimeKind};

use crate::FunctionContext;
use crate::registry::panic_message;

/// Version of the plugin layout this host understands.
pub const PLUGIN_ABI_VERSION: u32 = 1;

/// Name of the exported [`PluginInfo`] static.
pub const INFO_SYMBOL: &str = "FNHOST_FUNCTION_INFO";

/// Name of the exported [`HandlerConstructor`].
pub const HANDLER_SYMBOL: &str = "fnhost_function_handler";

/// Builds a function's handler. Subscriptions are set up here.
pub type HandlerConstructor = fn(&FunctionContext) -> Box<dyn FunctionHandler>;

/// Metadata exported by a plugin.
#[repr(C)]
#[derive(Debug)]
pub struct PluginInfo {
    pub abi_version: u32,
    pub name: &'static str,
    pub description: &'static str,
    pub runtime: &'static str,
}

impl PluginInfo {
    pub fn to_function_info(&self) -> FunctionInfo {
        FunctionInfo::new(self.name, self.description, RuntimeKind::from(self.runtime))
    }
}

/// A native function compiled into the host.
#[derive(Debug, Clone, Copy)]
pub struct NativeFunction {
    pub name: &'static str,
    pub description: &'static str,
    pub constructor: HandlerConstructor,
}

impl NativeFunction {
    pub fn info(&self) -> FunctionInfo {
        FunctionInfo::new(self.name, self.description, RuntimeKind::Native)
    }
}

/// A function loaded from a dynamic library.
pub struct LoadedPlugin {
    pub info: FunctionInfo,
    pub handler: Box<dyn FunctionHandler>,
}

/// Open the library at `path` and build its function.
///
/// The library is leaked on success so the handler's code stays mapped.
#[allow(unsafe_code)]
pub fn load_plugin(path: &Path, ctx: &FunctionContext) -> Result<LoadedPlugin, LoadError> {
    let path_display = path.display().to_string();

    // SAFETY: loading runs the library's initializers; plugins are trusted
    // artifacts placed in the functions directory by the operator
    let library = unsafe { Library::new(path) }.map_err(|e| LoadError::OpenLibrary {
        path: path_display.clone(),
        reason: e.to_string(),
    })?;

    let info = {
        // SAFETY: the symbol is the address of a `PluginInfo` static
        let symbol: Symbol<'_, *const PluginInfo> =
            unsafe { library.get(symbol_name(INFO_SYMBOL).as_bytes()) }.map_err(|_| {
                LoadError::MissingSymbol {
                    path: path_display.clone(),
                    symbol: INFO_SYMBOL.to_string(),
                }
            })?;

        // SAFETY: the pointer stays valid for as long as the library is loaded
        unsafe { read_info(*symbol, &path_display) }?
    };

    let constructor: HandlerConstructor = {
        // SAFETY: the symbol was emitted by `declare_function!` with this type
        let symbol: Symbol<'_, HandlerConstructor> =
            unsafe { library.get(symbol_name(HANDLER_SYMBOL).as_bytes()) }.map_err(|_| {
                LoadError::MissingSymbol {
                    path: path_display.clone(),
                    symbol: HANDLER_SYMBOL.to_string(),
                }
            })?;
        *symbol
    };

    debug!(path = %path_display, function = %info.name, "Plugin symbols resolved");

    // Never unloaded
    std::mem::forget(library);

    let handler = construct(constructor, ctx, &info.name)?;
    info!(path = %path_display, function = %info.name, "Native plugin loaded");

    Ok(LoadedPlugin { info, handler })
}

/// Check the exported metadata and convert it.
///
/// # Safety
///
/// `ptr` must be null or point to a live `PluginInfo`.
#[allow(unsafe_code)]
unsafe fn read_info(ptr: *const PluginInfo, path: &str) -> Result<FunctionInfo, LoadError> {
    // SAFETY: upheld by the caller
    let Some(plugin_info) = (unsafe { ptr.as_ref() }) else {
        return Err(LoadError::InvalidSymbol {
            path: path.to_string(),
            symbol: INFO_SYMBOL.to_string(),
            reason: "null pointer".to_string(),
        });
    };

    if plugin_info.abi_version != PLUGIN_ABI_VERSION {
        return Err(LoadError::AbiMismatch {
            path: path.to_string(),
            expected: PLUGIN_ABI_VERSION,
            found: plugin_info.abi_version,
        });
    }

    Ok(plugin_info.to_function_info())
}

/// Run a handler constructor, turning a panic into a load error.
pub(crate) fn construct(
    constructor: HandlerConstructor,
    ctx: &FunctionContext,
    function: &str,
) -> Result<Box<dyn FunctionHandler>, LoadError> {
    catch_unwind(AssertUnwindSafe(|| constructor(ctx))).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        error!(function, panic = %message, "Function constructor panicked");
        LoadError::ConstructorPanicked {
            function: function.to_string(),
            message,
        }
    })
}

fn symbol_name(name: &str) -> String {
    format!("{name}\0")
}

/// Export a native function from a plugin crate.
///
/// `constructor` is called once at load time with the host's
/// [`FunctionContext`] and returns any [`FunctionHandler`].
///
/// ```ignore
/// fnhost_core::declare_function! {
///     name: "hello-plugin",
///     description: "Greets from a dynamically loaded library",
///     constructor: HelloPlugin::new,
/// }
/// ```
#[macro_export]
macro_rules! declare_function {
    (name: $name:expr, description: $description:expr, constructor: $constructor:path $(,)?) => {
        #[allow(unsafe_code)]
        #[unsafe(no_mangle)]
        pub static FNHOST_FUNCTION_INFO: $crate::plugin::PluginInfo = $crate::plugin::PluginInfo {
            abi_version: $crate::plugin::PLUGIN_ABI_VERSION,
            name: $name,
            description: $description,
            runtime: "native",
        };

        #[allow(unsafe_code)]
        #[unsafe(no_mangle)]
        pub fn fnhost_function_handler(
            ctx: &$crate::FunctionContext,
        ) -> ::std::boxed::Box<dyn $crate::FunctionHandler> {
            ::std::boxed::Box::new($constructor(ctx))
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    use fnhost_common::{FunctionError, FunctionInput};

    fn echo(_ctx: &FunctionContext) -> Box<dyn FunctionHandler> {
        Box::new(|input: &FunctionInput| -> Result<Value, FunctionError> {
            Ok(Value::Object(input.clone()))
        })
    }

    #[test]
    fn test_native_function_info() {
        let function = NativeFunction {
            name: "echo",
            description: "Returns its input",
            constructor: echo,
        };

        let info = function.info();
        assert_eq!(info.name, "echo");
        assert_eq!(info.runtime, RuntimeKind::Native);

        let handler = (function.constructor)(&FunctionContext::default());
        let mut input = FunctionInput::new();
        input.insert("a".into(), json!(1));
        assert_eq!(handler.execute(&input).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_plugin_info_conversion() {
        let info = PluginInfo {
            abi_version: PLUGIN_ABI_VERSION,
            name: "p",
            description: "d",
            runtime: "native",
        };

        let converted = info.to_function_info();
        assert_eq!(converted.name, "p");
        assert_eq!(converted.description, "d");
        assert_eq!(converted.runtime, RuntimeKind::Native);
    }

    fn exploding(_ctx: &FunctionContext) -> Box<dyn FunctionHandler> {
        panic!("constructor exploded")
    }

    #[test]
    fn test_construct_contains_panic() {
        let ctx = FunctionContext::default();

        let err = construct(exploding, &ctx, "exploding").err().unwrap();
        let LoadError::ConstructorPanicked { function, message } = err else {
            panic!("expected constructor panic, got {err:?}");
        };
        assert_eq!(function, "exploding");
        assert_eq!(message, "constructor exploded");

        let handler = construct(echo, &ctx, "echo").unwrap();
        assert_eq!(handler.execute(&FunctionInput::new()).unwrap(), json!({}));
    }

    #[test]
    #[allow(unsafe_code)]
    fn test_read_info_checks_pointer_and_version() {
        let err = unsafe { read_info(std::ptr::null(), "null.so") }.unwrap_err();
        assert!(matches!(err, LoadError::InvalidSymbol { ref symbol, .. } if symbol == INFO_SYMBOL));

        let stale = PluginInfo {
            abi_version: PLUGIN_ABI_VERSION + 1,
            name: "stale",
            description: "",
            runtime: "native",
        };
        let err = unsafe { read_info(&raw const stale, "stale.so") }.unwrap_err();
        assert!(matches!(
            err,
            LoadError::AbiMismatch { expected, found, .. }
                if expected == PLUGIN_ABI_VERSION && found == PLUGIN_ABI_VERSION + 1
        ));

        let current = PluginInfo {
            abi_version: PLUGIN_ABI_VERSION,
            name: "current",
            description: "ok",
            runtime: "native",
        };
        let info = unsafe { read_info(&raw const current, "current.so") }.unwrap();
        assert_eq!(info.name, "current");
        assert_eq!(info.runtime, RuntimeKind::Native);
    }

    #[test]
    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    fn test_load_library_without_symbols() {
        // Resolved through the dynamic linker search path
        let result = load_plugin(Path::new("libc.so.6"), &FunctionContext::default());

        let Err(LoadError::MissingSymbol { path, symbol }) = result else {
            panic!("expected missing symbol");
        };
        assert_eq!(path, "libc.so.6");
        assert_eq!(symbol, INFO_SYMBOL);
    }

    #[test]
    fn test_load_missing_library() {
        let result = load_plugin(Path::new("/nonexistent/plugin.so"), &FunctionContext::default());
        assert!(matches!(result, Err(LoadError::OpenLibrary { .. })));
    }

    #[test]
    fn test_load_non_library_file() {
        let file = tempfile::Builder::new().suffix(".so").tempfile().unwrap();
        std::fs::write(file.path(), b"definitely not ELF").unwrap();

        let result = load_plugin(file.path(), &FunctionContext::default());
        assert!(matches!(result, Err(LoadError::OpenLibrary { .. })));
    }
}

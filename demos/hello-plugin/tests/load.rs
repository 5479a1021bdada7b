//! Loads the built library the way the host does at startup.

use std::env::consts::{DLL_EXTENSION, DLL_PREFIX};
use std::path::PathBuf;

use serde_json::{Map, json};

use fnhost_common::LoadError;
use fnhost_core::{FunctionContext, FunctionInput, Registry};
use fnhost_host::{Event, EventContext};

/// The cdylib cargo built next to this test binary.
fn built_library() -> PathBuf {
    let file_name = format!("{DLL_PREFIX}hello_plugin.{DLL_EXTENSION}");
    let exe = std::env::current_exe().unwrap();
    let deps = exe.parent().unwrap();

    [deps.join(&file_name), deps.parent().unwrap().join(&file_name)]
        .into_iter()
        .find(|path| path.is_file())
        .unwrap_or_else(|| panic!("{file_name} not found next to {}", exe.display()))
}

fn registry() -> Registry {
    Registry::new(None, FunctionContext::default())
}

#[test]
fn test_load_native_and_execute() {
    let registry = registry();

    let name = registry.load_native(&built_library()).unwrap();
    assert_eq!(name, "hello-plugin");

    let info = registry.get_info("hello-plugin").unwrap();
    assert_eq!(info.description, "Greets from a dynamically loaded library");

    let input: FunctionInput = json!({"name": "Ada"}).as_object().cloned().unwrap();
    let output = registry.execute("hello-plugin", &input).unwrap();
    assert_eq!(output["message"], "Hello from a plugin, Ada!");
    assert_eq!(output["executions_observed"], 0);

    registry.context().bus().publish(
        &EventContext::new(),
        &Event::new("function.executed", Map::new()),
    );

    let output = registry
        .execute("hello-plugin", &FunctionInput::new())
        .unwrap();
    assert_eq!(output["message"], "Hello from a plugin, plugin!");
    assert_eq!(output["executions_observed"], 1);
}

#[test]
fn test_scan_skips_broken_library_and_loads_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(format!("a_broken.{DLL_EXTENSION}")),
        b"not a library",
    )
    .unwrap();
    std::fs::copy(
        built_library(),
        dir.path().join(format!("b_hello.{DLL_EXTENSION}")),
    )
    .unwrap();

    let registry = registry();
    let report = registry.load_functions(dir.path()).unwrap();

    assert_eq!(report.loaded, ["hello-plugin"]);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].0.ends_with(format!("a_broken.{DLL_EXTENSION}")));
    assert!(matches!(report.failed[0].1, LoadError::OpenLibrary { .. }));

    let output = registry
        .execute("hello-plugin", &FunctionInput::new())
        .unwrap();
    assert_eq!(output["executions_observed"], 0);
}

mod common;

use std::collections::BTreeMap;
use std::fs;

use rsre::{HostConfig, HostError, ScriptHost};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

#[test]
fn test_run_returns_last_value() {
    let (_dir, host) = common::host();
    let value = host.run("let x = 6; x * 7").unwrap();
    assert_eq!(value.as_int().unwrap(), 42);
}

#[test]
fn test_state_persists_between_requests() {
    let (_dir, host) = common::host();
    host.run("let total = 1; fn bump(n) { n + 1 }").unwrap();
    host.run("total = bump(total);").unwrap();
    assert_eq!(host.get("total").unwrap().as_int().unwrap(), 2);
}

#[test]
fn test_get_and_set() {
    let (_dir, host) = common::host();
    host.set("name", "world").unwrap();
    let value = host.run("`hello ${name}`").unwrap();
    assert_eq!(value.into_string().unwrap(), "hello world");

    let err = host.get("missing").unwrap_err();
    assert!(matches!(err, HostError::UnknownVariable(_)));
}

#[test]
fn test_set_constant_is_rejected() {
    let (_dir, host) = common::host();
    host.run("const VERSION = 1;").unwrap();
    let err = host.set("VERSION", 2_i64).unwrap_err();
    assert!(matches!(err, HostError::ConstantVariable(name) if name == "VERSION"));
}

#[test]
fn test_typed_get_and_set() {
    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Settings {
        name: String,
        retries: i64,
        tags: Vec<String>,
    }

    let (_dir, host) = common::host();
    let settings = Settings {
        name: "worker".to_string(),
        retries: 2,
        tags: vec!["a".to_string()],
    };
    host.set_from("settings", &settings).unwrap();
    host.run("settings.retries += 1; settings.tags.push(\"b\");").unwrap();

    let updated: Settings = host.get_as("settings").unwrap();
    assert_eq!(updated.retries, 3);
    assert_eq!(updated.tags, vec!["a", "b"]);

    let counts: BTreeMap<String, i64> = {
        host.run("let counts = #{a: 1, b: 2};").unwrap();
        host.get_as("counts").unwrap()
    };
    assert_eq!(counts.get("b"), Some(&2));
}

#[test]
fn test_get_as_wrong_shape_is_conversion_error() {
    let (_dir, host) = common::host();
    host.run("let word = \"text\";").unwrap();
    let err = host.get_as::<Vec<i64>>("word").unwrap_err();
    assert!(matches!(err, HostError::Conversion(_)));
}

#[test]
fn test_eval_pretty_prints() {
    let (_dir, host) = common::host();
    assert_eq!(
        host.eval("[1, \"two\", #{three: 3}]").unwrap(),
        r#"[1, "two", #{three: 3}]"#
    );
    assert_eq!(host.eval("let unused = 1;").unwrap(), "()");
    assert_eq!(host.eval("prettyPrint(\"quoted\")").unwrap(), r#""\"quoted\"""#);
}

#[test]
fn test_eval_ignores_script_pretty_print() {
    let (_dir, host) = common::host();
    host.run("fn prettyPrint(value) { \"custom\" }").unwrap();

    assert_eq!(host.run("prettyPrint(1)").unwrap().into_string().unwrap(), "custom");
    assert_eq!(host.eval("[1, 2]").unwrap(), "[1, 2]");
}

#[test]
fn test_parse_and_runtime_errors() {
    let (_dir, host) = common::host();
    assert!(matches!(host.run("let = ;"), Err(HostError::Parse(_))));
    assert!(matches!(host.run("throw \"boom\""), Err(HostError::Runtime(_))));

    // The host stays usable after a failed request
    assert_eq!(host.run("1 + 1").unwrap().as_int().unwrap(), 2);
}

#[test]
fn test_compile_runs_named_source() {
    let (_dir, host) = common::host();
    host.compile("setup.rhai", "let ready = true;").unwrap();
    assert!(host.get("ready").unwrap().as_bool().unwrap());

    let err = host.compile("broken.rhai", "fn (").unwrap_err();
    assert!(matches!(err, HostError::Parse(_)));
}

#[test]
fn test_exec_resolves_against_asset_root() {
    let (dir, host) = common::host();
    fs::write(dir.path().join("main.rhai"), "let from_file = 40 + 2;").unwrap();

    host.exec("main.rhai").unwrap();
    assert_eq!(host.get("from_file").unwrap().as_int().unwrap(), 42);
    assert_eq!(host.asset_root(), dir.path());

    let err = host.exec("missing.rhai").unwrap_err();
    assert!(matches!(err, HostError::Io { .. }));
}

#[test]
fn test_startup_script_is_loaded() {
    let dir = TempDir::new().unwrap();
    let rc = dir.path().join("init.rhai");
    fs::write(&rc, "let greeting = \"hi\"; fn shout(s) { s.to_upper() }").unwrap();

    let config = HostConfig::new(dir.path()).with_startup_script(&rc);
    let host = ScriptHost::with_config(config).unwrap();
    let value = host.run("shout(greeting)").unwrap();
    assert_eq!(value.into_string().unwrap(), "HI");
}

#[test]
fn test_startup_script_can_load_scripts() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("lib.rhai"),
        "let loaded = 21; fn triple(x) { x * 3 }",
    )
    .unwrap();
    let rc = dir.path().join("init.rhai");
    fs::write(&rc, "loadScript(\"lib.rhai\"); let doubled = loaded * 2;").unwrap();

    let config = HostConfig::new(dir.path()).with_startup_script(&rc);
    let host = ScriptHost::with_config(config).unwrap();
    assert_eq!(host.get("doubled").unwrap().as_int().unwrap(), 42);
    assert_eq!(host.run("triple(loaded)").unwrap().as_int().unwrap(), 63);
}

#[test]
fn test_broken_startup_script_is_not_fatal() {
    let dir = TempDir::new().unwrap();
    let rc = dir.path().join("init.rhai");
    fs::write(&rc, "let = ;").unwrap();

    let config = HostConfig::new(dir.path()).with_startup_script(&rc);
    let host = ScriptHost::with_config(config).unwrap();
    assert_eq!(host.run("1").unwrap().as_int().unwrap(), 1);
}

#[test]
fn test_panicking_job_is_reported() {
    let (_dir, host) = common::host();
    let err = host.submit(|_| panic!("job failed")).unwrap_err();
    assert!(matches!(err, HostError::Panicked));
    assert_eq!(host.run("2").unwrap().as_int().unwrap(), 2);
}

#[test]
fn test_submit_after_stop() {
    let (_dir, host) = common::host();
    assert!(host.is_running());
    host.stop(false);
    assert!(!host.is_running());

    assert!(matches!(host.run("1"), Err(HostError::Stopped)));
    // Stopping twice is harmless
    host.stop(true);
}

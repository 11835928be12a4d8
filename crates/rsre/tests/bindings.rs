mod common;

use std::fs;

use rsre::HostError;

#[test]
fn test_fs_write_read_append() {
    let (dir, host) = common::host();
    host.set("dir", dir.path().display().to_string()).unwrap();

    let written = host
        .run(r#"fs::writeFile(`${dir}/notes.txt`, "first")"#)
        .unwrap();
    assert!(written.as_bool().unwrap());

    host.run(r#"fs::appendFile(`${dir}/notes.txt`, "\nsecond");"#)
        .unwrap();
    let content = host.run(r#"fs::readFile(`${dir}/notes.txt`)"#).unwrap();
    assert_eq!(content.into_string().unwrap(), "first\nsecond");
    assert_eq!(
        fs::read_to_string(dir.path().join("notes.txt")).unwrap(),
        "first\nsecond"
    );
}

#[test]
fn test_fs_failures_return_false() {
    let (dir, host) = common::host();
    host.set("dir", dir.path().display().to_string()).unwrap();

    let missing = host.run(r#"fs::readFile(`${dir}/nope.txt`)"#).unwrap();
    assert!(!missing.as_bool().unwrap());

    let listing = host.run(r#"fs::readdir(`${dir}/nope`)"#).unwrap();
    assert!(!listing.as_bool().unwrap());

    let written = host
        .run(r#"fs::writeFile(`${dir}/nope/deeper.txt`, "x")"#)
        .unwrap();
    assert!(!written.as_bool().unwrap());
}

#[test]
fn test_fs_readdir_lists_names() {
    let (dir, host) = common::host();
    fs::write(dir.path().join("b.txt"), "").unwrap();
    fs::write(dir.path().join("a.txt"), "").unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    host.set("dir", dir.path().display().to_string()).unwrap();

    let names: Vec<String> = {
        host.run("let names = fs::readdir(dir);").unwrap();
        host.get_as("names").unwrap()
    };
    assert_eq!(names, vec!["a.txt", "b.txt", "sub"]);
}

#[test]
fn test_process_argv_and_env() {
    let (_dir, host) = common::host();

    let argv: Vec<String> = {
        host.run("let args = process::argv;").unwrap();
        host.get_as("args").unwrap()
    };
    assert_eq!(argv, vec!["rsre", "test"]);

    let has_path = host.run("process::env.contains(\"PATH\")").unwrap();
    assert_eq!(has_path.as_bool().unwrap(), std::env::var_os("PATH").is_some());

    let env_type = host.run("type_of(process::env)").unwrap();
    assert_eq!(env_type.into_string().unwrap(), "map");
}

#[cfg(unix)]
#[test]
fn test_process_exec_captures_output() {
    let (_dir, host) = common::host();

    host.run("let out = process::exec(\"echo hello; echo oops >&2\");")
        .unwrap();
    let stdout = host.run("out.stdout").unwrap().into_string().unwrap();
    let stderr = host.run("out.stderr").unwrap().into_string().unwrap();
    assert_eq!(stdout, "hello\n");
    assert_eq!(stderr, "oops\n");
}

#[cfg(unix)]
#[test]
fn test_process_exec_failure_sets_stderr() {
    let (_dir, host) = common::host();

    host.run("let out = process::exec(\"exit 3\");").unwrap();
    let stdout = host.run("out.stdout").unwrap().into_string().unwrap();
    let stderr = host.run("out.stderr").unwrap().into_string().unwrap();
    assert!(stdout.is_empty());
    assert!(stderr.contains('3'), "stderr was {stderr:?}");
}

#[test]
fn test_load_script_defines_functions_and_globals() {
    let (dir, host) = common::host();
    fs::write(
        dir.path().join("lib.rhai"),
        "let loaded = 7; fn triple(x) { x * 3 }",
    )
    .unwrap();

    let ok = host.run("loadScript(\"lib.rhai\")").unwrap();
    assert!(ok.as_bool().unwrap());

    let value = host.run("triple(loaded)").unwrap();
    assert_eq!(value.as_int().unwrap(), 21);
}

#[test]
fn test_load_script_globals_visible_in_same_evaluation() {
    let (dir, host) = common::host();
    fs::write(dir.path().join("lib.rhai"), "let loaded = 7; let base = loaded * 2;").unwrap();

    let value = host.run("loadScript(\"lib.rhai\"); loaded + base").unwrap();
    assert_eq!(value.as_int().unwrap(), 21);
    assert_eq!(host.get("base").unwrap().as_int().unwrap(), 14);
}

#[test]
fn test_load_script_sees_caller_globals() {
    let (dir, host) = common::host();
    fs::write(dir.path().join("lib.rhai"), "let doubled = seed * 2;").unwrap();

    let value = host.run("let seed = 5; loadScript(\"lib.rhai\"); doubled").unwrap();
    assert_eq!(value.as_int().unwrap(), 10);
}

#[test]
fn test_load_script_functions_callable_from_next_evaluation() {
    let (dir, host) = common::host();
    fs::write(dir.path().join("lib.rhai"), "fn triple(x) { x * 3 }").unwrap();

    // The program already running cannot be extended with new functions
    let err = host.run("loadScript(\"lib.rhai\"); triple(2)").unwrap_err();
    assert!(matches!(err, HostError::Runtime(_)));
    assert!(err.to_string().contains("triple"), "unexpected error: {err}");

    assert_eq!(host.run("triple(2)").unwrap().as_int().unwrap(), 6);
}

#[test]
fn test_load_script_inside_function_merges_after_call() {
    let (dir, host) = common::host();
    fs::write(dir.path().join("lib.rhai"), "let from_fn = 3;").unwrap();

    host.run("fn setup() { loadScript(\"lib.rhai\") } setup();").unwrap();
    assert_eq!(host.get("from_fn").unwrap().as_int().unwrap(), 3);
}

#[test]
fn test_load_script_nested_and_failures() {
    let (dir, host) = common::host();
    fs::write(dir.path().join("inner.rhai"), "fn inner() { 1 }").unwrap();
    fs::write(
        dir.path().join("outer.rhai"),
        "loadScript(\"inner.rhai\"); fn outer() { inner() + 1 }",
    )
    .unwrap();
    fs::write(dir.path().join("broken.rhai"), "fn (").unwrap();

    assert!(host.run("loadScript(\"outer.rhai\")").unwrap().as_bool().unwrap());
    assert_eq!(host.run("outer()").unwrap().as_int().unwrap(), 2);

    assert!(!host.run("loadScript(\"missing.rhai\")").unwrap().as_bool().unwrap());
    assert!(!host.run("loadScript(\"broken.rhai\")").unwrap().as_bool().unwrap());
}

#[test]
fn test_pretty_print_builtin() {
    let (_dir, host) = common::host();
    let text = host.run("prettyPrint(#{name: \"x\", list: [1, 2]})").unwrap();
    assert_eq!(text.into_string().unwrap(), r#"#{list: [1, 2], name: "x"}"#);
}

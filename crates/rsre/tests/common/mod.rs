// Shared helpers for the host integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use rsre::rhai::Dynamic;
use rsre::{HostConfig, ScriptHost};
use tempfile::TempDir;

/// A host rooted in a fresh temporary directory, without any startup script
pub fn host() -> (TempDir, ScriptHost) {
    let dir = TempDir::new().unwrap();
    let config = HostConfig::new(dir.path())
        .without_startup_script()
        .with_argv(vec!["rsre".to_string(), "test".to_string()]);
    let host = ScriptHost::with_config(config).unwrap();
    (dir, host)
}

/// Install a native `record(value)` function that appends to the returned log
pub fn recorder(host: &ScriptHost) -> Arc<Mutex<Vec<String>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    host.submit(move |engine| {
        engine.engine_mut().register_fn("record", move |value: Dynamic| {
            let value = match value.clone().into_string() {
                Ok(s) => s,
                Err(_) => value.to_string(),
            };
            sink.lock().unwrap().push(value);
        });
    })
    .unwrap();
    log
}

pub fn entries(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    log.lock().unwrap().clone()
}

//! `process::*` namespace: environment, arguments, working directory and
//! shell execution.
//!
//! `process::exec` hands any script full shell access. That is deliberate:
//! scripts run with the same trust as the host process.

use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use std::process::Command;

use rhai::{Dynamic, Engine, EvalAltResult, Map, Module};
use tracing::debug;

use super::arg_string;

/// Captured output of a shell command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ShellOutput {
    /// Script representation: `#{ stdout: "...", stderr: "..." }`
    pub fn into_map(self) -> Map {
        let mut map = Map::new();
        map.insert("stdout".into(), self.stdout.into());
        map.insert("stderr".into(), self.stderr.into());
        map
    }
}

#[cfg(not(target_os = "windows"))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(target_os = "windows")]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

/// Run a command through the system shell and capture its output.
///
/// Never fails: a command that can't be spawned or exits unsuccessfully
/// produces a non-empty `stderr`.
pub fn run_shell(command: &str) -> ShellOutput {
    match shell_command(command).output() {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let mut stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            if !output.status.success() && stderr.trim().is_empty() {
                stderr = output.status.to_string();
            }
            ShellOutput { stdout, stderr }
        }
        Err(e) => {
            debug!(target: "scripting", "process::exec failed to spawn {:?}: {}", command, e);
            ShellOutput {
                stdout: String::new(),
                stderr: e.to_string(),
            }
        }
    }
}

/// Change the process working directory
pub fn change_dir(path: &Path) -> std::io::Result<()> {
    env::set_current_dir(path)
}

/// Split `KEY=VALUE` entries at the first `=`. Entries without `=` are skipped.
pub fn parse_environ<I, S>(entries: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    entries
        .into_iter()
        .filter_map(|entry| {
            entry
                .as_ref()
                .split_once('=')
                .map(|(key, value)| (key.to_string(), value.to_string()))
        })
        .collect()
}

/// Snapshot of the current process environment
pub fn environment() -> BTreeMap<String, String> {
    parse_environ(env::vars_os().map(|(key, value)| {
        format!("{}={}", key.to_string_lossy(), value.to_string_lossy())
    }))
}

/// Build the `process` module with a snapshot of the environment and the
/// given arguments
pub fn module(argv: Vec<String>) -> Module {
    let mut module = Module::new();

    let env: Map = environment()
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect();
    module.set_var("env", Dynamic::from_map(env));
    module.set_var(
        "argv",
        Dynamic::from_array(argv.into_iter().map(Dynamic::from).collect()),
    );

    module.set_native_fn(
        "chdir",
        |path: Dynamic| -> Result<bool, Box<EvalAltResult>> {
            let path = arg_string(&path);
            match change_dir(Path::new(&path)) {
                Ok(()) => Ok(true),
                Err(e) => {
                    debug!(target: "scripting", "process::chdir {} failed: {}", path, e);
                    Ok(false)
                }
            }
        },
    );

    module.set_native_fn(
        "exec",
        |command: Dynamic| -> Result<Map, Box<EvalAltResult>> {
            Ok(run_shell(&arg_string(&command)).into_map())
        },
    );

    module
}

/// Install the `process` namespace
pub fn register(engine: &mut Engine, argv: Vec<String>) {
    engine.register_static_module("process", module(argv).into());
}

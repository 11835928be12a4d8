//! `fs::*` namespace: file access for scripts.
//!
//! Every function reports failure as `false` instead of raising, so scripts
//! check return values.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use rhai::{Dynamic, Engine, EvalAltResult, Module};
use tracing::debug;

use super::{arg_string, or_false};

/// Read a whole file as text
pub fn read_file(path: &Path) -> io::Result<String> {
    fs::read_to_string(path)
}

/// Write `content` to `path`, replacing any existing content
pub fn write_file(path: &Path, content: &str) -> io::Result<()> {
    fs::write(path, content)
}

/// Append `content` to `path`, creating the file if it doesn't exist
pub fn append_file(path: &Path, content: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(content.as_bytes())?;
    file.flush()
}

/// Names of the entries in a directory, sorted
pub fn read_dir(path: &Path) -> io::Result<Vec<String>> {
    let mut names = fs::read_dir(path)?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<io::Result<Vec<_>>>()?;
    names.sort();
    Ok(names)
}

fn log_failure<T>(op: &str, path: &str, result: io::Result<T>) -> io::Result<T> {
    if let Err(e) = &result {
        debug!(target: "scripting", "fs::{} {} failed: {}", op, path, e);
    }
    result
}

/// Build the `fs` module
pub fn module() -> Module {
    let mut module = Module::new();

    module.set_native_fn(
        "readFile",
        |path: Dynamic| -> Result<Dynamic, Box<EvalAltResult>> {
            let path = arg_string(&path);
            Ok(or_false(
                log_failure("readFile", &path, read_file(Path::new(&path))).map(Dynamic::from),
            ))
        },
    );

    module.set_native_fn(
        "writeFile",
        |path: Dynamic, content: Dynamic| -> Result<bool, Box<EvalAltResult>> {
            let path = arg_string(&path);
            let result = write_file(Path::new(&path), &arg_string(&content));
            Ok(log_failure("writeFile", &path, result).is_ok())
        },
    );

    module.set_native_fn(
        "appendFile",
        |path: Dynamic, content: Dynamic| -> Result<bool, Box<EvalAltResult>> {
            let path = arg_string(&path);
            let result = append_file(Path::new(&path), &arg_string(&content));
            Ok(log_failure("appendFile", &path, result).is_ok())
        },
    );

    module.set_native_fn(
        "readdir",
        |path: Dynamic| -> Result<Dynamic, Box<EvalAltResult>> {
            let path = arg_string(&path);
            let names = log_failure("readdir", &path, read_dir(Path::new(&path)));
            Ok(or_false(names.map(|names| {
                Dynamic::from_array(names.into_iter().map(Dynamic::from).collect())
            })))
        },
    );

    module
}

/// Install the `fs` namespace
pub fn register(engine: &mut Engine) {
    engine.register_static_module("fs", module().into());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");

        write_file(&path, "first").unwrap();
        write_file(&path, "second").unwrap();
        assert_eq!(read_file(&path).unwrap(), "second");
    }

    #[test]
    fn test_append_creates_then_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");

        append_file(&path, "a").unwrap();
        assert_eq!(read_file(&path).unwrap(), "a");
        append_file(&path, "b").unwrap();
        assert_eq!(read_file(&path).unwrap(), "ab");
    }

    #[test]
    fn test_read_dir_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["zeta", "alpha", "mid"] {
            write_file(&dir.path().join(name), "").unwrap();
        }
        assert_eq!(read_dir(dir.path()).unwrap(), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_missing_paths_fail() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(read_file(&missing).is_err());
        assert!(read_dir(&missing).is_err());
        assert!(write_file(&missing.join("child.txt"), "x").is_err());
    }
}

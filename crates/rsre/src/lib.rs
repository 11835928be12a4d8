//! Host runtime for evaluating Rhai scripts
//!
//! A [`ScriptHost`] owns one interpreter on a dedicated dispatch thread.
//! Any thread may submit work; requests, timer callbacks and shutdown are
//! serialized on that thread so script code never runs concurrently.
//!
//! Scripts get `setTimeout`/`setInterval`, the `fs::` and `process::`
//! namespaces, `loadScript` and `prettyPrint`.

pub mod bindings;
pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod pretty;
pub mod timer;

mod dispatch;

pub use bindings::process::ShellOutput;
pub use bindings::timers::{TimerCallback, TimerHandle};
pub use config::{EngineLimits, HostConfig};
pub use engine::{from_dynamic, to_dynamic, ScriptEngine};
pub use error::{HostError, Result};
pub use host::ScriptHost;
pub use pretty::pretty_print;
pub use timer::{TimerId, TimerRegistry};

// Re-export the engine crate so hosts can name its types
pub use rhai;

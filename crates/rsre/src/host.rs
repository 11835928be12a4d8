use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};

use rhai::Dynamic;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::config::{resolve_path, HostConfig};
use crate::dispatch::{self, EvalRequest};
use crate::engine::{from_dynamic, to_dynamic, ScriptEngine};
use crate::error::{HostError, Result};
use crate::pretty::pretty_print;

/// Handle to a running script host.
///
/// Every method blocks the calling thread until the dispatch loop has
/// processed the request. The handle can be shared between threads;
/// concurrent requests are served in arrival order.
pub struct ScriptHost {
    asset_root: PathBuf,
    requests: UnboundedSender<EvalRequest>,
    stop_tx: UnboundedSender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl ScriptHost {
    /// Create a host resolving relative script paths against `asset_root`
    pub fn new(asset_root: impl Into<PathBuf>) -> Result<Self> {
        Self::with_config(HostConfig::new(asset_root))
    }

    /// Create a host from a full configuration.
    ///
    /// Loads the startup script if one is configured and exists. Errors in
    /// the startup script are logged, not returned.
    pub fn with_config(config: HostConfig) -> Result<Self> {
        let asset_root = config.asset_root.clone();
        let startup_script = config.startup_script_path();

        let dispatcher = dispatch::spawn(config)?;
        let host = Self {
            asset_root,
            requests: dispatcher.requests,
            stop_tx: dispatcher.stop,
            worker_id: dispatcher.thread.thread().id(),
            worker: Mutex::new(Some(dispatcher.thread)),
        };

        if let Some(path) = startup_script.filter(|path| path.is_file()) {
            let shown = path.display().to_string();
            match host.submit(move |engine| engine.load_file(&path))? {
                Ok(()) => info!(target: "scripting", "Loaded startup script {}", shown),
                Err(e) => warn!(target: "scripting", "Startup script {} failed: {}", shown, e),
            }
        }

        Ok(host)
    }

    /// Run `f` against the engine on the dispatch thread and wait for its
    /// result.
    ///
    /// Calling this from the dispatch thread itself (e.g. from inside a
    /// native function) is rejected with [`HostError::Reentrant`]; such code
    /// already has the engine and must use it directly.
    pub fn submit<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut ScriptEngine) -> R + Send + 'static,
        R: Send + 'static,
    {
        if thread::current().id() == self.worker_id {
            return Err(HostError::Reentrant);
        }

        let (request, done) = EvalRequest::new(f);
        self.requests
            .send(request)
            .map_err(|_| HostError::Stopped)?;

        match done.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(HostError::Panicked),
            Err(_) => Err(HostError::Stopped),
        }
    }

    /// Read and run a script file. Relative paths resolve against the
    /// asset root.
    pub fn exec(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = resolve_path(&self.asset_root, path);
        let source = fs::read_to_string(&path).map_err(|e| HostError::io(&path, e))?;
        let name = path.display().to_string();
        debug!(target: "scripting", "Executing {}", name);
        self.submit(move |engine| engine.compile_and_run(&name, &source).map(|_| ()))?
    }

    /// Run source text and return its value
    pub fn run(&self, source: impl Into<String>) -> Result<Dynamic> {
        let source = source.into();
        self.submit(move |engine| engine.run(&source))?
    }

    /// Read a global variable
    pub fn get(&self, name: impl Into<String>) -> Result<Dynamic> {
        let name = name.into();
        self.submit(move |engine| engine.get(&name))?
    }

    /// Read a global variable and deserialize it into host data
    pub fn get_as<T>(&self, name: impl Into<String>) -> Result<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let name = name.into();
        self.submit(move |engine| engine.get(&name).and_then(|value| from_dynamic(&value)))?
    }

    /// Create or overwrite a global variable
    pub fn set(&self, name: impl Into<String>, value: impl Into<Dynamic>) -> Result<()> {
        let name = name.into();
        let value = value.into();
        self.submit(move |engine| engine.set(&name, value))?
    }

    /// Serialize host data into a global variable
    pub fn set_from<T: Serialize>(&self, name: impl Into<String>, value: &T) -> Result<()> {
        let value = to_dynamic(value)?;
        self.set(name, value)
    }

    /// Compile source text under the given name and run it
    pub fn compile(&self, name: impl Into<String>, source: impl Into<String>) -> Result<()> {
        let name = name.into();
        let source = source.into();
        self.submit(move |engine| engine.compile_and_run(&name, &source).map(|_| ()))?
    }

    /// Run source text and return its value formatted for display
    pub fn eval(&self, source: impl Into<String>) -> Result<String> {
        let value = self.run(source)?;
        Ok(pretty_print(&value))
    }

    /// Format a value the same way [`eval`](Self::eval) does
    pub fn pretty_print(&self, value: &Dynamic) -> String {
        pretty_print(value)
    }

    /// Directory relative script paths are resolved against
    pub fn asset_root(&self) -> &Path {
        &self.asset_root
    }

    /// Whether the dispatch loop is still running
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the dispatch loop and wait for its thread to exit.
    ///
    /// With `drain` false pending timers are dropped immediately. With
    /// `drain` true the loop keeps serving timers and requests until no
    /// timer is armed; an interval must be cleared for this to return.
    /// Stopping an already stopped host does nothing.
    pub fn stop(&self, drain: bool) {
        let _ = self.stop_tx.send(drain);

        if thread::current().id() == self.worker_id {
            return;
        }

        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = worker.take() {
            if handle.join().is_err() {
                warn!(target: "scripting", "Dispatch thread panicked");
            }
        }
    }
}

impl Drop for ScriptHost {
    fn drop(&mut self) {
        self.stop(false);
    }
}

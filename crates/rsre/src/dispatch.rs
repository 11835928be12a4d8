//! The dispatch loop: the only thread that ever touches the engine.
//!
//! Host threads hand work over as [`EvalRequest`]s and block on their
//! completion channel. Timer expiries arrive as ids on the ready channel.
//! A stop signal carries the drain flag.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tokio::runtime::Builder;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, trace, warn};

use crate::bindings::{self, timers::SharedTimers};
use crate::config::HostConfig;
use crate::engine::ScriptEngine;
use crate::error::{HostError, Result};
use crate::timer::{TimerId, TimerRegistry};

type Job = Box<dyn FnOnce(&mut ScriptEngine) + Send>;

/// A unit of work for the dispatch loop.
///
/// The job sends its outcome on the paired completion channel exactly once.
/// A request dropped without running closes that channel instead.
pub(crate) struct EvalRequest {
    job: Job,
}

impl EvalRequest {
    /// Wrap `f` into a request and return the receiver for its outcome.
    /// A panic inside `f` is delivered as `Err`.
    pub(crate) fn new<F, R>(f: F) -> (Self, std_mpsc::Receiver<thread::Result<R>>)
    where
        F: FnOnce(&mut ScriptEngine) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (done_tx, done_rx) = std_mpsc::sync_channel(1);
        let job = Box::new(move |engine: &mut ScriptEngine| {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(engine)));
            let _ = done_tx.send(outcome);
        });
        (Self { job }, done_rx)
    }

    fn run(self, engine: &mut ScriptEngine) {
        (self.job)(engine)
    }
}

/// Channels and thread handle of a running dispatch loop
pub(crate) struct Dispatcher {
    pub requests: UnboundedSender<EvalRequest>,
    pub stop: UnboundedSender<bool>,
    pub thread: JoinHandle<()>,
}

/// Start the dispatch thread. Returns once the engine and its bindings are
/// ready.
pub(crate) fn spawn(config: HostConfig) -> Result<Dispatcher> {
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let (stop_tx, stop_rx) = mpsc::unbounded_channel();
    let (init_tx, init_rx) = std_mpsc::channel::<Result<()>>();

    let thread = thread::Builder::new()
        .name("rsre-dispatch".to_string())
        .spawn(move || {
            let runtime = match Builder::new_current_thread().enable_time().build() {
                Ok(runtime) => runtime,
                Err(e) => {
                    let _ = init_tx.send(Err(HostError::Spawn(e.to_string())));
                    return;
                }
            };

            let (ready_tx, ready_rx) = mpsc::unbounded_channel();
            let timers: SharedTimers = Arc::new(Mutex::new(TimerRegistry::new(
                runtime.handle().clone(),
                ready_tx,
            )));

            let mut engine = ScriptEngine::new(&config.limits, Arc::clone(&timers));
            if let Err(e) = bindings::install(&mut engine, &config) {
                let _ = init_tx.send(Err(e));
                return;
            }
            let _ = init_tx.send(Ok(()));

            let dispatch = DispatchLoop {
                engine,
                timers,
                requests: request_rx,
                ready: ready_rx,
                stop: stop_rx,
                draining: false,
            };
            runtime.block_on(dispatch.run());
        })
        .map_err(|e| HostError::Spawn(e.to_string()))?;

    match init_rx.recv() {
        Ok(Ok(())) => Ok(Dispatcher {
            requests: request_tx,
            stop: stop_tx,
            thread,
        }),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(HostError::Spawn(
            "dispatch thread exited during startup".to_string(),
        )),
    }
}

struct DispatchLoop {
    engine: ScriptEngine,
    timers: SharedTimers,
    requests: UnboundedReceiver<EvalRequest>,
    ready: UnboundedReceiver<TimerId>,
    stop: UnboundedReceiver<bool>,
    /// Set by a draining stop: exit as soon as no timers remain
    draining: bool,
}

impl DispatchLoop {
    async fn run(mut self) {
        debug!(target: "scripting", "Dispatch loop started");

        loop {
            tokio::select! {
                Some(id) = self.ready.recv() => self.fire(id),
                request = self.requests.recv() => match request {
                    Some(request) => request.run(&mut self.engine),
                    None => {
                        debug!(target: "scripting", "All host handles dropped, stopping dispatch loop");
                        break;
                    }
                },
                drain = self.stop.recv() => {
                    let drain = drain.unwrap_or(false);
                    debug!(target: "scripting", "Stop requested (drain: {})", drain);
                    if !drain {
                        break;
                    }
                    self.draining = true;
                }
            }

            if self.draining && bindings::timers::lock(&self.timers).is_empty() {
                debug!(target: "scripting", "All timers drained");
                break;
            }
        }

        self.shutdown();
    }

    /// Run the callback of a timer that became ready
    fn fire(&mut self, id: TimerId) {
        let Some((callback, repeating)) = bindings::timers::lock(&self.timers).begin_fire(id)
        else {
            trace!(target: "scripting", "Ignoring {}: no longer armed", id);
            return;
        };

        trace!(target: "scripting", "Firing {}", id);
        let engine = &mut self.engine;
        match panic::catch_unwind(AssertUnwindSafe(|| {
            engine.call_function(&callback.function, callback.args.clone())
        })) {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                warn!(target: "scripting", "Callback of {} failed: {}", id, e);
            }
            Err(e) => {
                error!(target: "scripting", "Callback of {} panicked: {:?}", id, e);
            }
        }

        // The callback may have cancelled its own interval
        if repeating {
            bindings::timers::lock(&self.timers).rearm(id);
        }
    }

    fn shutdown(&mut self) {
        let mut timers = bindings::timers::lock(&self.timers);
        if !timers.is_empty() {
            debug!(target: "scripting", "Cancelling {} pending timer(s)", timers.len());
        }
        timers.clear();
        debug!(target: "scripting", "Dispatch loop stopped");
    }
}

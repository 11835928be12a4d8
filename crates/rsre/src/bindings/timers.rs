//! Timer builtins.
//!
//! The callback is a function pointer (`Fn("name")` or a closure) or the
//! name of a script function as a string. At most six extra arguments can
//! be bound after the delay; one overload is registered per arity.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rhai::{Dynamic, Engine, EvalAltResult, FnPtr, ImmutableString, INT};

use crate::timer::{TimerId, TimerRegistry};

/// Script callback stored with an armed timer
#[derive(Clone)]
pub struct TimerCallback {
    /// Function to invoke on expiry
    pub function: FnPtr,
    /// Extra arguments given after the delay
    pub args: Vec<Dynamic>,
}

/// Registry shared between the dispatch loop and the timer builtins
pub type SharedTimers = Arc<Mutex<TimerRegistry<TimerCallback>>>;

pub(crate) fn lock(timers: &SharedTimers) -> MutexGuard<'_, TimerRegistry<TimerCallback>> {
    timers.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Script-visible handle returned by `setTimeout` / `setInterval`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub TimerId);

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timer({})", self.0.as_u64())
    }
}

/// Interpret a script-provided delay as milliseconds.
/// Floats are truncated; anything that isn't a number counts as 0.
fn delay_millis(delay: &Dynamic) -> i64 {
    if let Ok(ms) = delay.as_int() {
        ms
    } else if let Ok(ms) = delay.as_float() {
        ms as i64
    } else {
        0
    }
}

/// Accept a function pointer or a function name as a timer callback
fn callback_fn(callback: Dynamic) -> Result<FnPtr, Box<EvalAltResult>> {
    let callback = callback.flatten();
    if callback.is::<FnPtr>() {
        return Ok(callback.cast::<FnPtr>());
    }
    match callback.try_cast::<ImmutableString>() {
        Some(name) => FnPtr::new(name),
        None => Err("timer callback must be a function or a function name".into()),
    }
}

/// Register one overload of a scheduling builtin for a fixed number of
/// bound arguments
macro_rules! register_overload {
    ($engine:expr, $name:expr, $schedule:expr; $($arg:ident),*) => {{
        let schedule = Arc::clone(&$schedule);
        $engine.register_fn(
            $name,
            move |callback: Dynamic, delay: Dynamic $(, $arg: Dynamic)*|
                -> Result<TimerHandle, Box<EvalAltResult>> {
                Ok(schedule(callback_fn(callback)?, delay, vec![$($arg),*]))
            },
        );
    }};
}

fn register_scheduler(engine: &mut Engine, name: &str, repeating: bool, timers: &SharedTimers) {
    let timers = Arc::clone(timers);
    let schedule = Arc::new(
        move |function: FnPtr, delay: Dynamic, args: Vec<Dynamic>| -> TimerHandle {
            let callback = TimerCallback { function, args };
            TimerHandle(lock(&timers).register(delay_millis(&delay), repeating, callback))
        },
    );

    register_overload!(engine, name, schedule;);
    register_overload!(engine, name, schedule; a);
    register_overload!(engine, name, schedule; a, b);
    register_overload!(engine, name, schedule; a, b, c);
    register_overload!(engine, name, schedule; a, b, c, d);
    register_overload!(engine, name, schedule; a, b, c, d, e);
    register_overload!(engine, name, schedule; a, b, c, d, e, f);
}

/// Install `setTimeout`, `setInterval`, `clearTimeout` and `clearInterval`
pub fn register(engine: &mut Engine, timers: &SharedTimers) {
    engine
        .register_type_with_name::<TimerHandle>("Timer")
        .register_get("id", |handle: &mut TimerHandle| handle.0.as_u64() as INT)
        .register_fn("to_string", |handle: &mut TimerHandle| handle.to_string())
        .register_fn("to_debug", |handle: &mut TimerHandle| handle.to_string());

    register_scheduler(engine, "setTimeout", false, timers);
    register_scheduler(engine, "setInterval", true, timers);

    for name in ["clearTimeout", "clearInterval"] {
        let timers = Arc::clone(timers);
        engine.register_fn(name, move |handle: Dynamic| {
            // Anything that isn't a timer handle is ignored
            if let Some(TimerHandle(id)) = handle.try_cast::<TimerHandle>() {
                lock(&timers).cancel(id);
            }
        });
    }
}

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::AbortHandle;
use tracing::trace;

/// Smallest delay a timer can be armed with
pub const MIN_DELAY: Duration = Duration::from_millis(1);

/// Unique identifier for a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    /// Raw numeric value of this handle
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Convert a requested delay in milliseconds into the delay actually armed.
/// Non-positive delays are clamped to [`MIN_DELAY`].
pub fn effective_delay(delay_ms: i64) -> Duration {
    if delay_ms <= 0 {
        MIN_DELAY
    } else {
        Duration::from_millis(delay_ms as u64)
    }
}

/// An armed timer
struct Timer<C> {
    delay: Duration,
    repeating: bool,
    callback: C,
    /// Handle of the sleep task that will deliver the ready notification
    armed: AbortHandle,
}

/// Tracks armed timers for the dispatch loop.
///
/// Expiry happens in a task spawned on `runtime`; that task only sends the
/// timer's id on the ready channel. The registry itself is only ever touched
/// by its owner, which looks the id up again when the notification arrives.
/// An entry exists exactly while its timer is armed.
pub struct TimerRegistry<C> {
    timers: HashMap<TimerId, Timer<C>>,
    next_id: u64,
    ready_tx: UnboundedSender<TimerId>,
    runtime: Handle,
}

impl<C: Clone> TimerRegistry<C> {
    /// Create an empty registry delivering expiries to `ready_tx`
    pub fn new(runtime: Handle, ready_tx: UnboundedSender<TimerId>) -> Self {
        Self {
            timers: HashMap::new(),
            next_id: 0,
            ready_tx,
            runtime,
        }
    }

    /// Arm a new timer and return its handle
    pub fn register(&mut self, delay_ms: i64, repeating: bool, callback: C) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;

        let delay = effective_delay(delay_ms);
        let armed = self.arm(id, delay);
        self.timers.insert(
            id,
            Timer {
                delay,
                repeating,
                callback,
                armed,
            },
        );

        trace!(target: "scripting", "Armed {} ({:?}, repeating: {})", id, delay, repeating);
        id
    }

    /// Cancel a timer. Returns false if it was not armed.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.timers.remove(&id) {
            Some(timer) => {
                timer.armed.abort();
                trace!(target: "scripting", "Cancelled {}", id);
                true
            }
            None => false,
        }
    }

    /// Start handling a ready notification.
    ///
    /// Returns the callback and whether the timer repeats, or `None` if the
    /// timer was cancelled in the meantime. One-shot timers leave the
    /// registry here; periodic timers stay and must be [`rearm`](Self::rearm)ed.
    pub fn begin_fire(&mut self, id: TimerId) -> Option<(C, bool)> {
        let repeating = self.timers.get(&id)?.repeating;
        if repeating {
            let timer = self.timers.get(&id)?;
            Some((timer.callback.clone(), true))
        } else {
            let timer = self.timers.remove(&id)?;
            Some((timer.callback, false))
        }
    }

    /// Re-arm a periodic timer with its original delay.
    /// Returns false if the timer is no longer registered.
    pub fn rearm(&mut self, id: TimerId) -> bool {
        let Some(delay) = self.timers.get(&id).map(|timer| timer.delay) else {
            return false;
        };
        let armed = self.arm(id, delay);
        if let Some(timer) = self.timers.get_mut(&id) {
            timer.armed.abort();
            timer.armed = armed;
        }
        true
    }

    /// Cancel every armed timer
    pub fn clear(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.armed.abort();
        }
    }

    /// Whether the timer is currently armed
    pub fn contains(&self, id: TimerId) -> bool {
        self.timers.contains_key(&id)
    }

    /// Number of armed timers
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Whether no timers are armed
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    fn arm(&self, id: TimerId, delay: Duration) -> AbortHandle {
        let ready_tx = self.ready_tx.clone();
        self.runtime
            .spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = ready_tx.send(id);
            })
            .abort_handle()
    }
}

impl<C> Drop for TimerRegistry<C> {
    fn drop(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.armed.abort();
        }
    }
}

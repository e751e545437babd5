//! Idle monitor
//!
//! Two states: `Armed(deadline)` and `Disarmed`, held in a watch channel so
//! activity from any thread can push the deadline without waking a task per
//! event. A single watcher task sleeps until the current deadline and
//! re-checks it on every change.
//!
//! Expiry is a compare-and-set on the channel: the watcher only fires if the
//! deadline it slept on is still the armed one, so a reset racing the elapse
//! wins and a disarmed monitor never fires.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// User activity the shell can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivitySignal {
    Click,
    MouseMove,
    KeyPress,
    Scroll,
    Touch,
}

impl ActivitySignal {
    /// Signals that reset the idle deadline unless configured otherwise.
    pub fn defaults() -> Vec<Self> {
        vec![Self::Click, Self::MouseMove, Self::KeyPress]
    }
}

/// Single-shot inactivity deadline, rearmed on activity.
pub struct IdleMonitor {
    timeout: Duration,
    signals: Vec<ActivitySignal>,
    deadline: Arc<watch::Sender<Option<Instant>>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl IdleMonitor {
    pub fn new(timeout: Duration, signals: Vec<ActivitySignal>) -> Self {
        let (deadline, _) = watch::channel(None);
        Self {
            timeout,
            signals,
            deadline: Arc::new(deadline),
            watcher: Mutex::new(None),
        }
    }

    /// Arm the deadline at now + timeout and call `on_expire` once when it
    /// elapses without a reset. Cancels any watcher from an earlier arm.
    pub fn arm<F>(&self, on_expire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut watcher = self.watcher.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = watcher.take() {
            previous.abort();
        }
        self.deadline
            .send_replace(Some(Instant::now() + self.timeout));
        *watcher = Some(tokio::spawn(watch_deadline(
            Arc::clone(&self.deadline),
            on_expire,
        )));
        debug!(timeout_secs = self.timeout.as_secs_f64(), "idle deadline armed");
    }

    /// Push the deadline to now + timeout. No-op while disarmed.
    ///
    /// Returns whether the monitor was armed.
    pub fn reset(&self) -> bool {
        let next = Instant::now() + self.timeout;
        self.deadline.send_if_modified(|deadline| match deadline {
            Some(current) => {
                *current = next;
                true
            }
            None => false,
        })
    }

    /// Reset for a configured activity signal; ignore the rest.
    pub fn record_activity(&self, signal: ActivitySignal) -> bool {
        self.signals.contains(&signal) && self.reset()
    }

    /// Cancel the pending deadline.
    pub fn disarm(&self) {
        let mut watcher = self.watcher.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = watcher.take() {
            previous.abort();
        }
        self.deadline.send_replace(None);
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.borrow().is_some()
    }

    /// Current deadline, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        *self.deadline.borrow()
    }
}

impl Drop for IdleMonitor {
    fn drop(&mut self) {
        self.disarm();
    }
}

async fn watch_deadline<F>(deadline: Arc<watch::Sender<Option<Instant>>>, on_expire: F)
where
    F: FnOnce(),
{
    let mut changes = deadline.subscribe();
    loop {
        let current = *changes.borrow_and_update();
        let Some(current) = current else {
            return;
        };

        tokio::select! {
            _ = tokio::time::sleep_until(current) => {
                let expired = deadline.send_if_modified(|armed| {
                    if *armed == Some(current) {
                        *armed = None;
                        true
                    } else {
                        false
                    }
                });
                if expired {
                    break;
                }
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }
    }

    debug!("idle deadline elapsed");
    on_expire();
}

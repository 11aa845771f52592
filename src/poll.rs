//! Bounded sleep-and-recheck polling.
use crate::defaults::{WAIT_INTERVAL, WAIT_RETRIES};
use duration_str::deserialize_duration;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

/// How many times a condition is checked and how long to wait between checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollPolicy {
    pub attempts: usize,
    #[serde(deserialize_with = "deserialize_duration")]
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            attempts: WAIT_RETRIES,
            interval: WAIT_INTERVAL,
        }
    }
}

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration)
    }
}

impl<T: Sleeper + ?Sized> Sleeper for &T {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Shared stop signal. Cloned handles observe the same flag; a deadline only applies to the handle
/// it was set on.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Cancellation {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns a handle sharing the flag that also reports cancellation once `timeout` elapses.
    pub fn with_deadline(&self, timeout: Duration) -> Self {
        Self {
            cancelled: Arc::clone(&self.cancelled),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self
                .deadline
                .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error("`{description}` not satisfied after {attempts} attempts: {last_error}")]
    Exhausted {
        description: String,
        attempts: usize,
        last_error: String,
    },

    #[error("`{description}` cancelled after {attempts} attempts")]
    Cancelled {
        description: String,
        attempts: usize,
    },
}

pub struct Poller<S = ThreadSleeper> {
    policy: PollPolicy,
    sleeper: S,
    cancellation: Cancellation,
}

impl<S: Sleeper> Poller<S> {
    pub fn new(policy: PollPolicy, sleeper: S, cancellation: Cancellation) -> Self {
        Self {
            policy,
            sleeper,
            cancellation,
        }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Calls `check` until it succeeds, at most `policy.attempts` times, sleeping `policy.interval`
    /// between calls. Returns the number of attempts used.
    pub fn until<F>(&self, description: &str, mut check: F) -> Result<usize, PollError>
    where
        F: FnMut() -> Result<(), String>,
    {
        let attempts = self.policy.attempts;
        let mut last_error = String::from("condition never checked");
        for attempt in 1..=attempts {
            if self.cancellation.is_cancelled() {
                return Err(PollError::Cancelled {
                    description: description.to_string(),
                    attempts: attempt - 1,
                });
            }
            match check() {
                Ok(()) => {
                    debug!(attempt, "{description} satisfied");
                    return Ok(attempt);
                }
                Err(err) => {
                    last_error = err;
                    if attempt < attempts {
                        info!(
                            reason = %last_error,
                            "[{attempt}/{attempts}] {description} not satisfied yet, retrying in {:?}",
                            self.policy.interval
                        );
                        self.sleeper.sleep(self.policy.interval);
                    }
                }
            }
        }
        Err(PollError::Exhausted {
            description: description.to_string(),
            attempts,
            last_error,
        })
    }
}

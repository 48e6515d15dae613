//! Time and randomness strategies.
//!
//! The cache and the scheduler never read the wall clock or draw random
//! numbers directly; they go through these traits so hosts and tests can
//! substitute deterministic sources. [`SystemClock`] and [`ThreadRandom`]
//! are the production defaults; [`ManualClock`] and [`FixedRandom`] give
//! deterministic control.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Source of uniform random samples in `[0, 1)`.
pub trait RandomSource: Send + Sync {
    /// Draw one sample.
    fn next_f64(&self) -> f64;
}

/// The wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Build a clock frozen at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock to an absolute instant.
    pub fn set(&self, to: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = to;
        }
    }

    /// Move the clock forward by `step`.
    pub fn advance(&self, step: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += step;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
            .lock()
            .map(|now| *now)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Thread-local RNG samples.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_f64(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// A random source that replays scripted samples.
///
/// Draws return the queued samples in order; once the queue is exhausted,
/// every further draw repeats the last sample.
#[derive(Debug)]
pub struct FixedRandom {
    state: Mutex<(VecDeque<f64>, f64)>,
}

impl FixedRandom {
    /// A source that always returns `value`.
    #[must_use]
    pub fn always(value: f64) -> Self {
        Self {
            state: Mutex::new((VecDeque::new(), value)),
        }
    }

    /// A source that returns `values` in order, then repeats the last one.
    ///
    /// An empty sequence behaves like `always(0.0)`.
    #[must_use]
    pub fn sequence(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            state: Mutex::new((values.into_iter().collect(), 0.0)),
        }
    }
}

impl RandomSource for FixedRandom {
    fn next_f64(&self) -> f64 {
        if let Ok(mut state) = self.state.lock() {
            if let Some(value) = state.0.pop_front() {
                state.1 = value;
            }
            state.1
        } else {
            0.0
        }
    }
}

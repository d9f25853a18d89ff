//! Virtual time for simulation.
//!
//! [`SimClock`] only moves when told to. [`SimEnv`] reads it for `now()` and
//! advances it on `sleep()`, so a runtime loop that sleeps between cycles
//! walks virtual time forward without waiting.

use std::{
    ops::{Add, Sub},
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use agora_core::Environment;

/// Point in virtual time, measured from the start of the simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimInstant(Duration);

impl SimInstant {
    /// Time elapsed since the start of the simulation.
    pub fn since_start(self) -> Duration {
        self.0
    }
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs)
    }
}

impl Sub for SimInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

/// Shared, manually advanced clock.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    elapsed: Arc<Mutex<Duration>>,
}

impl SimClock {
    /// Clock at the start of the simulation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    pub fn now(&self) -> SimInstant {
        SimInstant(*self.elapsed.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        let mut elapsed = self.elapsed.lock().unwrap_or_else(PoisonError::into_inner);
        *elapsed += by;
    }
}

/// Environment backed by a [`SimClock`].
#[derive(Debug, Clone, Default)]
pub struct SimEnv {
    clock: SimClock,
}

impl SimEnv {
    /// Environment on a fresh clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment sharing `clock`.
    pub fn with_clock(clock: SimClock) -> Self {
        Self { clock }
    }

    /// The underlying clock.
    pub fn clock(&self) -> &SimClock {
        &self.clock
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> SimInstant {
        self.clock.now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        self.clock.advance(duration);
        tokio::task::yield_now()
    }
}

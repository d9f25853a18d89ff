//! Environment abstraction for deterministic testing.
//!
//! Decouples session logic from the system clock. Production shells use tokio
//! time; the simulation harness uses a manually advanced clock so typing
//! expiry and reconnect delays can be tested without waiting.

use std::{
    ops::{Add, Sub},
    time::Duration,
};

/// A point in monotonic time.
///
/// Blanket-implemented for every type with the required arithmetic, which
/// covers `std::time::Instant` and `tokio::time::Instant`.
pub trait Moment:
    Copy + Ord + Send + Sync + std::fmt::Debug + Add<Duration, Output = Self> + Sub<Output = Duration>
{
}

impl<T> Moment for T where
    T: Copy
        + Ord
        + Send
        + Sync
        + std::fmt::Debug
        + Add<Duration, Output = T>
        + Sub<Output = Duration>
{
}

/// Abstract environment providing time and async sleep.
///
/// # Invariants
///
/// - `now()` never goes backwards within one execution context.
pub trait Environment: Clone + Send + Sync + 'static {
    /// The instant type used by this environment.
    type Instant: Moment;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code awaits this; state machines never do.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}

//! Production environment on tokio time.
//!
//! Time advances naturally, so behavior is not reproducible. Tests use the
//! simulated clock from the harness crate instead.

use std::time::Duration;

use agora_core::env::Environment;

/// Production environment using tokio's monotonic clock.
///
/// `tokio::time::Instant` is used rather than the std type so that tests with
/// a paused tokio clock still see consistent time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

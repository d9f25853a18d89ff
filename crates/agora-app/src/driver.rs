//! Driver trait for abstracting I/O operations.
//!
//! The [`Driver`] trait decouples the application runtime from the user
//! interface. Each frontend implements the trait, while the generic
//! [`crate::Runtime`] handles all orchestration.

use std::future::Future;

use agora_core::Moment;

use crate::{App, UserInput};

/// Abstracts user-facing I/O for the application runtime.
///
/// # Implementations
///
/// - **Terminal**: line-based input on stdin, plain text output
/// - **Simulation**: scripted input, records what was rendered
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Time instant type. Enables virtual time in simulation.
    type Instant: Moment;

    /// Poll for the next user input.
    ///
    /// Returns `None` if no input is ready.
    ///
    /// # Errors
    ///
    /// Returns an error if the input source failed.
    fn poll_input(&mut self) -> impl Future<Output = Result<Option<UserInput>, Self::Error>> + Send;

    /// Render the room view.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    fn render(&mut self, app: &App<Self::Instant>) -> Result<(), Self::Error>;

    /// Show a blocking alert.
    ///
    /// # Errors
    ///
    /// Returns an error if the alert cannot be shown.
    fn alert(&mut self, message: &str) -> Result<(), Self::Error>;

    /// Release the user interface.
    fn stop(&mut self);
}

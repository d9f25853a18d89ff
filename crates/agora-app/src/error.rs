//! Runtime errors.

use thiserror::Error;

/// Errors that stop the runtime.
///
/// Chat failures never do: they become status lines and alerts. Only the
/// driver can fail the loop.
#[derive(Debug, Error)]
pub enum RuntimeError<E: std::error::Error + 'static> {
    /// Group or room id is absent.
    #[error("no chat room selected")]
    MissingRoom,

    /// The driver failed.
    #[error("driver error: {0}")]
    Driver(#[source] E),
}

//! Error types for the store engine.

use thiserror::Error;

/// Errors that can occur during store construction and dispatch.
///
/// All variants are programmer errors (misconfiguration or protocol
/// violation). Nothing in this crate retries or recovers; errors are
/// surfaced immediately to the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store options are inconsistent (e.g. the interest map names a
    /// method that was never registered).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A value delivered through dispatch is not a well-formed action
    /// envelope.
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// A method name was invoked that the store does not define.
    #[error("unknown method '{0}'")]
    UnknownMethod(String),
}

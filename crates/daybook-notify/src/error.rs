//! Notification errors.

/// The result type used throughout daybook-notify.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by [`Notifier`](crate::Notifier) implementations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The sending service call failed.
    #[error(transparent)]
    Service(#[from] daybook_core::Error),

    /// The message was rejected before being sent.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

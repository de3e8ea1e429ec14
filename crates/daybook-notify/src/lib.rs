//! # daybook-notify
//!
//! Sends the rendered report as a plain-text email.
//!
//! - [`ses::SesNotifier`]: SES v2 `SendEmail` over signed HTTP
//! - [`memory::RecordingNotifier`]: records messages, optionally fails, for tests

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
pub mod ses;

use async_trait::async_trait;
use serde::Serialize;

pub use error::{Error, Result};
pub use memory::RecordingNotifier;
pub use ses::SesNotifier;

/// A plain-text email to a single recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    /// Sender address.
    pub from: String,
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body_text: String,
}

/// Delivery receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    /// Message id assigned by the sending service.
    pub message_id: String,
}

/// Sends email notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends `message`.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be accepted for delivery.
    async fn send(&self, message: &EmailMessage) -> Result<SendReceipt>;
}

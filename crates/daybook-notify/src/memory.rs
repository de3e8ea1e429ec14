//! In-memory notifier for testing.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::{EmailMessage, Notifier, SendReceipt};

/// Records every message it is asked to send.
///
/// Can be switched to fail every send, to exercise best-effort delivery.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<EmailMessage>>,
    failure: Option<String>,
}

fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::Service(daybook_core::Error::Internal {
        message: "notifier lock poisoned".to_string(),
    })
}

impl RecordingNotifier {
    /// Creates a notifier that accepts every message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a notifier that records attempts but fails each one with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failure: Some(message.into()),
        }
    }

    /// Messages passed to [`Notifier::send`], including failed attempts.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn sent(&self) -> Result<Vec<EmailMessage>> {
        Ok(self.sent.lock().map_err(poison_err)?.clone())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &EmailMessage) -> Result<SendReceipt> {
        let mut sent = self.sent.lock().map_err(poison_err)?;
        sent.push(message.clone());
        let count = sent.len();
        drop(sent);

        if let Some(failure) = &self.failure {
            return Err(Error::Service(daybook_core::Error::Api {
                service: "memory",
                status: 400,
                code: "MessageRejected".to_string(),
                message: failure.clone(),
            }));
        }

        Ok(SendReceipt {
            message_id: format!("memory-message-{count}"),
        })
    }
}

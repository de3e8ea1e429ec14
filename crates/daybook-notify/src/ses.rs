//! SES v2 notifier (`POST /v2/email/outbound-emails`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use daybook_core::aws::{AwsJsonClient, Credentials, ServiceEndpoint};

use crate::error::{Error, Result};
use crate::{EmailMessage, Notifier, SendReceipt};

/// SigV4 signing name.
pub const SERVICE: &str = "ses";

const ENDPOINT_PREFIX: &str = "email";
const SEND_EMAIL_PATH: &str = "/v2/email/outbound-emails";
const CHARSET: &str = "UTF-8";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendEmailRequest<'a> {
    from_email_address: &'a str,
    destination: Destination<'a>,
    content: EmailContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Destination<'a> {
    to_addresses: [&'a str; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct EmailContent<'a> {
    simple: SimpleMessage<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SimpleMessage<'a> {
    subject: Content<'a>,
    body: Body<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Body<'a> {
    text: Content<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Content<'a> {
    data: &'a str,
    charset: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SendEmailResponse {
    message_id: String,
}

impl<'a> SendEmailRequest<'a> {
    fn from_message(message: &'a EmailMessage) -> Self {
        Self {
            from_email_address: &message.from,
            destination: Destination {
                to_addresses: [&message.to],
            },
            content: EmailContent {
                simple: SimpleMessage {
                    subject: Content {
                        data: &message.subject,
                        charset: CHARSET,
                    },
                    body: Body {
                        text: Content {
                            data: &message.body_text,
                            charset: CHARSET,
                        },
                    },
                },
            },
        }
    }
}

fn validate(message: &EmailMessage) -> Result<()> {
    for (field, address) in [("sender", &message.from), ("recipient", &message.to)] {
        if !address.contains('@') {
            return Err(Error::InvalidMessage(format!(
                "{field} '{address}' is not an email address"
            )));
        }
    }
    Ok(())
}

/// SES-backed [`Notifier`].
#[derive(Debug, Clone)]
pub struct SesNotifier {
    client: AwsJsonClient,
}

impl SesNotifier {
    /// Wraps a client already configured for the `ses` signing name.
    #[must_use]
    pub fn new(client: AwsJsonClient) -> Self {
        Self { client }
    }

    /// Builds a notifier for `region`, optionally against an endpoint override.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid endpoint.
    pub fn connect(region: &str, endpoint: Option<&str>, credentials: Credentials) -> Result<Self> {
        let endpoint = match endpoint {
            Some(url) => ServiceEndpoint::parse(url)?,
            None => ServiceEndpoint::regional(ENDPOINT_PREFIX, region)?,
        };
        let client = AwsJsonClient::new(SERVICE, endpoint, region, credentials)?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl Notifier for SesNotifier {
    async fn send(&self, message: &EmailMessage) -> Result<SendReceipt> {
        validate(message)?;

        let response: SendEmailResponse = self
            .client
            .post_json(SEND_EMAIL_PATH, &SendEmailRequest::from_message(message))
            .await?;

        tracing::info!(message_id = %response.message_id, to = %message.to, "email sent");
        Ok(SendReceipt {
            message_id: response.message_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> EmailMessage {
        EmailMessage {
            from: "reports@example.com".into(),
            to: "ops@example.com".into(),
            subject: "Daily Summary Report - 2024-03-01".into(),
            body_text: "=== DAILY SUMMARY REPORT ===\n".into(),
        }
    }

    #[test]
    fn request_uses_wire_names() {
        let message = message();
        let json = serde_json::to_value(SendEmailRequest::from_message(&message)).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "FromEmailAddress": "reports@example.com",
                "Destination": {"ToAddresses": ["ops@example.com"]},
                "Content": {"Simple": {
                    "Subject": {"Data": "Daily Summary Report - 2024-03-01", "Charset": "UTF-8"},
                    "Body": {"Text": {"Data": "=== DAILY SUMMARY REPORT ===\n", "Charset": "UTF-8"}}
                }}
            })
        );
    }

    #[test]
    fn validate_rejects_non_addresses() {
        assert!(validate(&message()).is_ok());

        let mut bad = message();
        bad.to = "ops".into();
        let err = validate(&bad).expect_err("invalid");
        assert!(err.to_string().contains("recipient"));
    }
}

//! Static credentials resolved from the process environment.
//!
//! Serverless runtimes inject short-lived keys through `AWS_ACCESS_KEY_ID`,
//! `AWS_SECRET_ACCESS_KEY` and `AWS_SESSION_TOKEN`, which is the only source
//! supported here.

use crate::error::{Error, Result};
use crate::observability::Redacted;

/// Region used when neither `AWS_REGION` nor `AWS_DEFAULT_REGION` is set.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Request-signing credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: Redacted<String>,
    session_token: Option<Redacted<String>>,
}

impl Credentials {
    /// Creates credentials from explicit values.
    #[must_use]
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: Redacted::new(secret_access_key.into()),
            session_token: session_token.map(Redacted::new),
        }
    }

    /// Reads credentials from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the access key or secret is missing.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads credentials through a variable lookup function.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the access key or secret is missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let value = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let access_key_id = value("AWS_ACCESS_KEY_ID")
            .ok_or_else(|| Error::configuration("missing AWS_ACCESS_KEY_ID"))?;
        let secret_access_key = value("AWS_SECRET_ACCESS_KEY")
            .ok_or_else(|| Error::configuration("missing AWS_SECRET_ACCESS_KEY"))?;

        Ok(Self::new(
            access_key_id,
            secret_access_key,
            value("AWS_SESSION_TOKEN"),
        ))
    }

    /// Access key id (not secret).
    #[must_use]
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// Secret access key.
    #[must_use]
    pub fn secret_access_key(&self) -> &str {
        self.secret_access_key.expose()
    }

    /// Session token for temporary credentials.
    #[must_use]
    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_ref().map(|t| t.expose().as_str())
    }
}

/// Resolves the service region through a variable lookup function.
pub fn region_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> String {
    ["AWS_REGION", "AWS_DEFAULT_REGION"]
        .into_iter()
        .filter_map(|name| lookup(name))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_REGION.to_string())
}

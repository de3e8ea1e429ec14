//! Signed JSON client shared by the AWS-backed query engine and notifier.

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use reqwest::Url;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::credentials::Credentials;
use super::sigv4::{self, SignableRequest, SigningParams};
use crate::error::{Error, Result};

const JSON_1_1: &str = "application/x-amz-json-1.1";
const REST_JSON: &str = "application/json";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Base URL of a service endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    url: Url,
}

impl ServiceEndpoint {
    /// The public regional endpoint, e.g. `https://athena.us-east-1.amazonaws.com`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the prefix or region produce an invalid URL.
    pub fn regional(prefix: &str, region: &str) -> Result<Self> {
        Self::parse(&format!("https://{prefix}.{region}.amazonaws.com"))
    }

    /// Parses an endpoint override such as `http://127.0.0.1:4566`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for malformed URLs or URLs without a host.
    pub fn parse(url: &str) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| Error::configuration(format!("invalid endpoint URL '{url}': {e}")))?;
        if url.host_str().is_none() {
            return Err(Error::configuration(format!(
                "endpoint URL '{url}' has no host"
            )));
        }
        Ok(Self { url })
    }

    /// Value the HTTP client sends as the `Host` header.
    #[must_use]
    pub fn host_header(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// Resolves `path` against the endpoint base.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the joined URL is invalid.
    pub fn url_for(&self, path: &str) -> Result<Url> {
        let base = self.url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Url::parse(&format!("{base}/{path}"))
            .map_err(|e| Error::configuration(format!("invalid request URL: {e}")))
    }
}

/// Error payload returned by AWS JSON protocols.
#[derive(Debug, serde::Deserialize)]
struct AwsErrorBody {
    #[serde(rename = "__type")]
    error_type: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

/// HTTP client that signs every request for one AWS service.
#[derive(Debug, Clone)]
pub struct AwsJsonClient {
    http: reqwest::Client,
    endpoint: ServiceEndpoint,
    region: String,
    service: &'static str,
    credentials: Credentials,
}

impl AwsJsonClient {
    /// Creates a client for `service` (the SigV4 signing name).
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(
        service: &'static str,
        endpoint: ServiceEndpoint,
        region: impl Into<String>,
        credentials: Credentials,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::configuration(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint,
            region: region.into(),
            service,
            credentials,
        })
    }

    /// Signing name of the service this client talks to.
    #[must_use]
    pub fn service(&self) -> &'static str {
        self.service
    }

    /// Calls an `x-amz-json-1.1` operation (`POST /` with `X-Amz-Target`).
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` when the request fails, `Error::Api` when the
    /// service answers with an error, and `Error::Serialization` for bodies that
    /// cannot be encoded or decoded.
    pub async fn call_target<Req, Resp>(&self, target: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized + Sync,
        Resp: DeserializeOwned,
    {
        let body = serde_json::to_vec(request)?;
        let bytes = self.send("/", JSON_1_1, Some(target), body).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Calls a REST-JSON operation with `POST {path}`.
    ///
    /// # Errors
    ///
    /// Same as [`AwsJsonClient::call_target`].
    pub async fn post_json<Req, Resp>(&self, path: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized + Sync,
        Resp: DeserializeOwned,
    {
        let body = serde_json::to_vec(request)?;
        let bytes = self.send(path, REST_JSON, None, body).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn send(
        &self,
        path: &str,
        content_type: &str,
        target: Option<&str>,
        body: Vec<u8>,
    ) -> Result<Bytes> {
        let url = self.endpoint.url_for(path)?;

        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), content_type.to_string());
        headers.insert("host".to_string(), self.endpoint.host_header());
        if let Some(target) = target {
            headers.insert("x-amz-target".to_string(), target.to_string());
        }

        let signed = sigv4::sign(
            &SignableRequest {
                method: "POST",
                path: url.path(),
                query: url.query().unwrap_or_default(),
                headers,
                payload: &body,
            },
            &SigningParams {
                credentials: &self.credentials,
                region: &self.region,
                service: self.service,
                time: Utc::now(),
            },
        );

        let mut request = self
            .http
            .post(url.clone())
            .header(CONTENT_TYPE, content_type);
        if let Some(target) = target {
            request = request.header("x-amz-target", target);
        }
        for (name, value) in signed.headers {
            request = request.header(name, value);
        }

        tracing::debug!(
            service = self.service,
            amz_target = target.unwrap_or("-"),
            %url,
            "sending signed request"
        );
        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| Error::transport(format!("{} request failed", self.service), e))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::transport(format!("{} response read failed", self.service), e))?;

        if status.is_success() {
            return Ok(bytes);
        }

        Err(api_error(self.service, status, &bytes))
    }
}

fn api_error(service: &'static str, status: reqwest::StatusCode, body: &[u8]) -> Error {
    let parsed = serde_json::from_slice::<AwsErrorBody>(body).ok();
    let code = parsed
        .as_ref()
        .and_then(|b| b.error_type.as_deref())
        .map(|t| t.rsplit('#').next().unwrap_or(t).to_string())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string());
    let message = parsed
        .and_then(|b| b.message)
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());

    Error::Api {
        service,
        status: status.as_u16(),
        code,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regional_endpoint_host() {
        let endpoint = ServiceEndpoint::regional("athena", "eu-west-1").expect("endpoint");
        assert_eq!(endpoint.host_header(), "athena.eu-west-1.amazonaws.com");
        assert_eq!(
            endpoint.url_for("/").expect("url").as_str(),
            "https://athena.eu-west-1.amazonaws.com/"
        );
    }

    #[test]
    fn override_endpoint_keeps_port() {
        let endpoint = ServiceEndpoint::parse("http://127.0.0.1:4566/").expect("endpoint");
        assert_eq!(endpoint.host_header(), "127.0.0.1:4566");
        assert_eq!(
            endpoint
                .url_for("/v2/email/outbound-emails")
                .expect("url")
                .as_str(),
            "http://127.0.0.1:4566/v2/email/outbound-emails"
        );
    }

    #[test]
    fn endpoint_rejects_garbage() {
        assert!(ServiceEndpoint::parse("not a url").is_err());
    }

    #[test]
    fn api_error_reads_json_type_and_message() {
        let err = api_error(
            "athena",
            reqwest::StatusCode::BAD_REQUEST,
            br#"{"__type":"com.amazonaws.athena#InvalidRequestException","Message":"bad query"}"#,
        );
        match err {
            Error::Api {
                service,
                status,
                code,
                message,
            } => {
                assert_eq!(service, "athena");
                assert_eq!(status, 400);
                assert_eq!(code, "InvalidRequestException");
                assert_eq!(message, "bad query");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn api_error_falls_back_to_body_text() {
        let err = api_error("ses", reqwest::StatusCode::SERVICE_UNAVAILABLE, b"upstream down");
        let text = err.to_string();
        assert!(text.contains("Service Unavailable"), "{text}");
        assert!(text.contains("upstream down"), "{text}");
    }
}

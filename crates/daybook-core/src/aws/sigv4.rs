//! AWS Signature Version 4 request signing.
//!
//! Header-based signing only (no presigned query strings, no chunked payloads).
//! The signer adds `x-amz-date` and, for temporary credentials,
//! `x-amz-security-token` to the signed header set.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use super::credentials::Credentials;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Scope of a signature.
#[derive(Debug, Clone, Copy)]
pub struct SigningParams<'a> {
    /// Credentials used to derive the signing key.
    pub credentials: &'a Credentials,
    /// Region (e.g. `us-east-1`).
    pub region: &'a str,
    /// Signing name of the service (e.g. `athena`, `ses`).
    pub service: &'a str,
    /// Request time.
    pub time: DateTime<Utc>,
}

/// The parts of an HTTP request covered by the signature.
#[derive(Debug, Clone)]
pub struct SignableRequest<'a> {
    /// HTTP method.
    pub method: &'a str,
    /// Absolute path, not yet URI-encoded.
    pub path: &'a str,
    /// Canonical (sorted, encoded) query string; empty when absent.
    pub query: &'a str,
    /// Headers to sign. Must include `host`.
    pub headers: BTreeMap<String, String>,
    /// Request body.
    pub payload: &'a [u8],
}

/// Headers to attach to the outgoing request.
#[derive(Debug, Clone)]
pub struct SignedHeaders {
    /// `(name, value)` pairs: `x-amz-date`, optional `x-amz-security-token`, `authorization`.
    pub headers: Vec<(&'static str, String)>,
    /// Hex-encoded signature.
    pub signature: String,
}

/// Signs a request.
#[must_use]
pub fn sign(request: &SignableRequest<'_>, params: &SigningParams<'_>) -> SignedHeaders {
    let amz_date = params.time.format("%Y%m%dT%H%M%SZ").to_string();
    let date = params.time.format("%Y%m%d").to_string();

    let mut headers: BTreeMap<String, String> = request
        .headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), normalize_header_value(value)))
        .collect();
    headers.insert("x-amz-date".to_string(), amz_date.clone());
    if let Some(token) = params.credentials.session_token() {
        headers.insert("x-amz-security-token".to_string(), token.to_string());
    }

    let (canonical, signed_headers) = canonical_request(request, &headers);
    let scope = format!(
        "{date}/{}/{}/aws4_request",
        params.region, params.service
    );
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        hex::encode(Sha256::digest(canonical.as_bytes()))
    );

    let key = signing_key(
        params.credentials.secret_access_key(),
        &date,
        params.region,
        params.service,
    );
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

    let authorization = format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
        params.credentials.access_key_id()
    );

    let mut out = vec![("x-amz-date", amz_date)];
    if let Some(token) = params.credentials.session_token() {
        out.push(("x-amz-security-token", token.to_string()));
    }
    out.push(("authorization", authorization));

    SignedHeaders {
        headers: out,
        signature,
    }
}

/// Builds the canonical request and the `SignedHeaders` list.
fn canonical_request(
    request: &SignableRequest<'_>,
    headers: &BTreeMap<String, String>,
) -> (String, String) {
    let mut canonical_headers = String::new();
    for (name, value) in headers {
        let _ = writeln!(canonical_headers, "{name}:{value}");
    }
    let signed_headers = headers.keys().map(String::as_str).collect::<Vec<_>>().join(";");
    let payload_hash = hex::encode(Sha256::digest(request.payload));

    let canonical = format!(
        "{}\n{}\n{}\n{canonical_headers}\n{signed_headers}\n{payload_hash}",
        request.method,
        uri_encode_path(request.path),
        request.query,
    );
    (canonical, signed_headers)
}

fn normalize_header_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn uri_encode_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    let mut out = String::with_capacity(path.len());
    for byte in path.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(char::from(byte));
            }
            _ => {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    out
}

fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

#[allow(clippy::expect_used)]
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC-SHA256 accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const SECRET: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

    fn example_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0)
            .single()
            .expect("valid time")
    }

    fn headers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn authorization(signed: &SignedHeaders) -> &str {
        signed
            .headers
            .iter()
            .find(|(name, _)| *name == "authorization")
            .map(|(_, value)| value.as_str())
            .expect("authorization header")
    }

    // Vectors from the published SigV4 test suite.
    #[test]
    fn signs_get_vanilla() {
        let creds = Credentials::new("AKIDEXAMPLE", SECRET, None);
        let request = SignableRequest {
            method: "GET",
            path: "/",
            query: "",
            headers: headers(&[("Host", "example.amazonaws.com")]),
            payload: b"",
        };
        let params = SigningParams {
            credentials: &creds,
            region: "us-east-1",
            service: "service",
            time: example_time(),
        };

        let signed = sign(&request, &params);
        assert_eq!(
            signed.signature,
            "5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
        assert_eq!(
            authorization(&signed),
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
    }

    #[test]
    fn signs_post_vanilla() {
        let creds = Credentials::new("AKIDEXAMPLE", SECRET, None);
        let request = SignableRequest {
            method: "POST",
            path: "/",
            query: "",
            headers: headers(&[("host", "example.amazonaws.com")]),
            payload: b"",
        };
        let params = SigningParams {
            credentials: &creds,
            region: "us-east-1",
            service: "service",
            time: example_time(),
        };

        assert_eq!(
            sign(&request, &params).signature,
            "5da7c1a2acd57cee7505fc6676e4e544621c30862966e37dddb68e92efbe5d6b"
        );
    }

    #[test]
    fn signs_json_target_request() {
        let creds = Credentials::new("AKIDEXAMPLE", SECRET, None);
        let request = SignableRequest {
            method: "POST",
            path: "/",
            query: "",
            headers: headers(&[
                ("content-type", "application/x-amz-json-1.1"),
                ("host", "athena.us-east-1.amazonaws.com"),
                ("x-amz-target", "AmazonAthena.GetQueryExecution"),
            ]),
            payload: br#"{"QueryExecutionId":"abc"}"#,
        };
        let params = SigningParams {
            credentials: &creds,
            region: "us-east-1",
            service: "athena",
            time: Utc
                .with_ymd_and_hms(2024, 3, 1, 6, 0, 0)
                .single()
                .expect("valid time"),
        };

        let signed = sign(&request, &params);
        assert_eq!(
            signed.signature,
            "0f847b519d7975cd6a8c5c14d91d18c8203ca48acf5e26bad6d9a2ee6e42829a"
        );
        assert!(
            authorization(&signed)
                .contains("SignedHeaders=content-type;host;x-amz-date;x-amz-target,")
        );
        assert_eq!(signed.headers[0], ("x-amz-date", "20240301T060000Z".to_string()));
    }

    #[test]
    fn session_token_is_signed_and_attached() {
        let creds = Credentials::new("AKIDEXAMPLE", SECRET, Some("session".to_string()));
        let request = SignableRequest {
            method: "POST",
            path: "/",
            query: "",
            headers: headers(&[("host", "example.amazonaws.com")]),
            payload: b"{}",
        };
        let params = SigningParams {
            credentials: &creds,
            region: "us-east-1",
            service: "service",
            time: example_time(),
        };

        let signed = sign(&request, &params);
        assert!(
            signed
                .headers
                .contains(&("x-amz-security-token", "session".to_string()))
        );
        assert!(
            authorization(&signed)
                .contains("SignedHeaders=host;x-amz-date;x-amz-security-token,")
        );
    }

    #[test]
    fn canonical_request_layout() {
        let request = SignableRequest {
            method: "POST",
            path: "/v2/email/outbound-emails",
            query: "",
            headers: BTreeMap::new(),
            payload: b"",
        };
        let hdrs = headers(&[("host", "email.us-east-1.amazonaws.com"), ("x-amz-date", "20240301T060000Z")]);

        let (canonical, signed) = canonical_request(&request, &hdrs);
        assert_eq!(signed, "host;x-amz-date");
        assert_eq!(
            canonical,
            "POST\n/v2/email/outbound-emails\n\n\
             host:email.us-east-1.amazonaws.com\nx-amz-date:20240301T060000Z\n\n\
             host;x-amz-date\n\
             e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn path_encoding_keeps_unreserved_characters() {
        assert_eq!(uri_encode_path(""), "/");
        assert_eq!(uri_encode_path("/a-b_c.d~e/f"), "/a-b_c.d~e/f");
        assert_eq!(uri_encode_path("/a b/ü"), "/a%20b/%C3%BC");
    }

    #[test]
    fn header_values_collapse_whitespace() {
        assert_eq!(normalize_header_value("  a   b  c "), "a b c");
    }
}

//! Minimal AWS service access: credentials, Signature V4 and a signed JSON client.
//!
//! Only the JSON protocols are covered (the `x-amz-json-1.1` target protocol
//! used by Athena and the REST-JSON protocol used by SES v2). S3 access goes
//! through `object_store` instead.

pub mod client;
pub mod credentials;
pub mod sigv4;

pub use client::{AwsJsonClient, ServiceEndpoint};
pub use credentials::{Credentials, DEFAULT_REGION, region_from_lookup};

//! # daybook-core
//!
//! Shared primitives for the daybook daily report job.
//!
//! - **Error Types**: Shared error definitions and result alias
//! - **Observability**: Logging initialization and span helpers
//! - **Storage**: Object storage contract with in-memory and `object_store` backends
//! - **AWS**: Credentials, Signature V4 signing and a signed JSON client used by the
//!   query engine and notifier crates
//!
//! ## Example
//!
//! ```rust
//! use daybook_core::prelude::*;
//!
//! let storage = MemoryBackend::new();
//! let options = PutOptions::text_plain();
//! # let _ = (storage, options);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod aws;
pub mod error;
pub mod observability;
pub mod storage;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::aws::{AwsJsonClient, Credentials, ServiceEndpoint};
    pub use crate::error::{Error, Result};
    pub use crate::storage::{
        MemoryBackend, ObjectMeta, ObjectStoreBackend, PutOptions, StorageBackend,
    };
}

pub use error::{Error, Result};
pub use observability::{LogFormat, Redacted, init_logging};
pub use storage::{
    BucketLocation, MemoryBackend, ObjectMeta, ObjectStoreBackend, PutOptions, StorageBackend,
    WriteResult,
};

//! Storage backend abstraction for object storage (S3, memory).
//!
//! The report job only needs unconditional writes and reads by key within a
//! single bucket. Backends are bound to their bucket at construction, so paths
//! passed to the trait are object keys such as `reports/daily_report_2024-03-01.txt`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use object_store::path::Path as StorePath;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions as StorePutOptions};

use crate::error::{Error, Result};

/// Options applied to a single write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// MIME type recorded with the object.
    pub content_type: Option<String>,
}

impl PutOptions {
    /// Options for a UTF-8 plain-text object.
    #[must_use]
    pub fn text_plain() -> Self {
        Self {
            content_type: Some("text/plain".to_string()),
        }
    }
}

/// Result of a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResult {
    /// Entity tag of the new object version, when the backend reports one.
    pub etag: Option<String>,
    /// Backend version token, when the backend reports one.
    pub version: Option<String>,
}

/// Metadata about a stored object.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// Object path (key).
    pub path: String,
    /// Object size in bytes.
    pub size: u64,
    /// Last modification timestamp.
    pub last_modified: Option<DateTime<Utc>>,
    /// Entity tag for cache validation.
    pub etag: Option<String>,
}

/// Storage backend trait for object storage.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Reads entire object.
    ///
    /// Returns `Error::NotFound` if object doesn't exist.
    async fn get(&self, path: &str) -> Result<Bytes>;

    /// Writes an object unconditionally, replacing any existing object at `path`.
    async fn put(&self, path: &str, data: Bytes, options: PutOptions) -> Result<WriteResult>;

    /// Gets object metadata without reading content.
    ///
    /// Returns `None` if object doesn't exist.
    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>>;

    /// Lists objects with the given prefix.
    ///
    /// Results are returned in arbitrary order.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>>;
}

/// In-memory storage backend for testing and local runs.
///
/// Thread-safe via `RwLock`. Not suitable for production.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    version: i64,
    content_type: Option<String>,
    last_modified: DateTime<Utc>,
}

impl MemoryBackend {
    /// Creates a new empty memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the content type recorded for `path`, if the object exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn content_type(&self, path: &str) -> Result<Option<String>> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;
        Ok(objects.get(path).and_then(|o| o.content_type.clone()))
    }
}

fn memory_meta(path: &str, obj: &StoredObject) -> ObjectMeta {
    ObjectMeta {
        path: path.to_string(),
        size: obj.data.len() as u64,
        last_modified: Some(obj.last_modified),
        etag: Some(format!("\"{}\"", obj.version)),
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        objects
            .get(path)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::NotFound(format!("object not found: {path}")))
    }

    async fn put(&self, path: &str, data: Bytes, options: PutOptions) -> Result<WriteResult> {
        let mut objects = self.objects.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        let new_version = objects.get(path).map_or(1, |o| o.version + 1);
        objects.insert(
            path.to_string(),
            StoredObject {
                data,
                version: new_version,
                content_type: options.content_type,
                last_modified: Utc::now(),
            },
        );
        drop(objects);

        Ok(WriteResult {
            etag: Some(format!("\"{new_version}\"")),
            version: Some(new_version.to_string()),
        })
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        Ok(objects.get(path).map(|obj| memory_meta(path, obj)))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        Ok(objects
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(path, obj)| memory_meta(path, obj))
            .collect())
    }
}

/// Storage backend over any [`ObjectStore`] implementation.
///
/// Production deployments use S3; `memory://` buckets give a process-local
/// store for dry runs.
#[derive(Debug, Clone)]
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

/// Location parsed from a bucket argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketLocation {
    /// An S3 bucket name.
    S3(String),
    /// A process-local in-memory store.
    Memory,
}

impl BucketLocation {
    /// Parses `my-bucket`, `s3://my-bucket` or `memory://`.
    ///
    /// # Errors
    ///
    /// Returns an error for empty names or unsupported schemes.
    pub fn parse(bucket: &str) -> Result<Self> {
        let bucket = bucket.trim();
        if bucket.starts_with("memory://") {
            return Ok(Self::Memory);
        }

        let name = match bucket.split_once("://") {
            Some(("s3", rest)) => rest,
            Some((scheme, _)) => {
                return Err(Error::configuration(format!(
                    "unsupported bucket scheme '{scheme}' (expected s3:// or memory://)"
                )));
            }
            None => bucket,
        };

        let name = name.trim_end_matches('/');
        if name.is_empty() || name.contains('/') {
            return Err(Error::configuration(format!(
                "invalid bucket name '{bucket}'"
            )));
        }
        Ok(Self::S3(name.to_string()))
    }
}

impl ObjectStoreBackend {
    /// Wraps an existing object store.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Builds a backend from a bucket argument (see [`BucketLocation::parse`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket is malformed or the S3 client cannot be built.
    pub fn from_bucket(bucket: &str) -> Result<Self> {
        match BucketLocation::parse(bucket)? {
            BucketLocation::S3(name) => Self::s3(&name),
            BucketLocation::Memory => Ok(Self::memory()),
        }
    }

    /// Builds an S3 backend using credentials and region from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the S3 client cannot be built.
    pub fn s3(bucket: &str) -> Result<Self> {
        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| Error::storage_with_source(format!("failed to build S3 client for {bucket}"), e))?;
        Ok(Self::new(Arc::new(store), bucket))
    }

    /// Builds a process-local in-memory backend.
    #[must_use]
    pub fn memory() -> Self {
        Self::new(Arc::new(InMemory::new()), "memory")
    }

    /// Returns the bucket this backend writes to.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn convert_meta(meta: object_store::ObjectMeta) -> ObjectMeta {
    ObjectMeta {
        path: meta.location.to_string(),
        size: u64::try_from(meta.size).unwrap_or(u64::MAX),
        last_modified: Some(meta.last_modified),
        etag: meta.e_tag,
    }
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let location = StorePath::from(path);
        let result = match self.store.get(&location).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(Error::NotFound(format!("object not found: {path}")));
            }
            Err(e) => return Err(Error::storage_with_source(format!("get {path} failed"), e)),
        };

        result
            .bytes()
            .await
            .map_err(|e| Error::storage_with_source(format!("read {path} failed"), e))
    }

    async fn put(&self, path: &str, data: Bytes, options: PutOptions) -> Result<WriteResult> {
        let location = StorePath::from(path);
        let mut attributes = Attributes::new();
        if let Some(content_type) = options.content_type {
            attributes.insert(Attribute::ContentType, content_type.into());
        }
        let opts = StorePutOptions {
            attributes,
            ..StorePutOptions::default()
        };

        let result = self
            .store
            .put_opts(&location, data.into(), opts)
            .await
            .map_err(|e| Error::storage_with_source(format!("put {path} failed"), e))?;

        tracing::debug!(bucket = %self.bucket, path, "object written");
        Ok(WriteResult {
            etag: result.e_tag,
            version: result.version,
        })
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        match self.store.head(&StorePath::from(path)).await {
            Ok(meta) => Ok(Some(convert_meta(meta))),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(Error::storage_with_source(format!("head {path} failed"), e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let prefix_path = StorePath::from(prefix);
        let metas: Vec<object_store::ObjectMeta> = self
            .store
            .list(Some(&prefix_path))
            .try_collect()
            .await
            .map_err(|e| Error::storage_with_source(format!("list {prefix} failed"), e))?;

        Ok(metas.into_iter().map(convert_meta).collect())
    }
}

//! Object storage behind a trait so call sites never know which backend
//! holds the slides.
//!
//! [`S3Storage`] is the production implementation. It only constructs an SDK
//! client when credentials and bucket are all present, which keeps
//! [`ObjectStorage::is_configured`] a pure in-memory check: the process
//! endpoint must distinguish "you never configured storage" from "the upload
//! call failed" without making a network call to find out.
//!
//! [`MemoryStorage`] backs tests and local development; swapping in a real
//! distributed store later means one more impl, not new call sites.

use crate::config::StorageConfig;
use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

/// Failures from the storage layer, kept distinct so the API can produce an
/// actionable message for each.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Credentials or bucket missing; no request was attempted.
    #[error("storage is not configured")]
    NotConfigured,

    /// The put was attempted and failed (network, auth, bucket policy).
    #[error("storage upload failed: {detail}")]
    Transport { detail: String },

    /// The put did not complete within the configured bound.
    #[error("storage upload timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// A durable blob store addressed by string keys.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Whether uploads can be attempted at all. Must not touch the network.
    fn is_configured(&self) -> bool;

    /// Bucket (or equivalent container) name, when configured.
    fn bucket(&self) -> Option<&str>;

    /// Store `bytes` under `key` and return a publicly resolvable URL.
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError>;
}

/// S3-backed storage. Objects are uploaded `public-read` because the
/// generated HTML hot-links them.
pub struct S3Storage {
    client: Option<aws_sdk_s3::Client>,
    bucket: Option<String>,
    region: String,
}

impl S3Storage {
    /// Build from the environment-derived config. With incomplete credentials
    /// no client is constructed and every `put` fails fast with
    /// [`StorageError::NotConfigured`].
    pub fn new(cfg: &StorageConfig) -> Self {
        let client = match (&cfg.access_key_id, &cfg.secret_access_key, &cfg.bucket) {
            (Some(key), Some(secret), Some(_)) => {
                let credentials = Credentials::new(key, secret, None, None, "environment");
                let sdk_config = aws_sdk_s3::Config::builder()
                    .region(Region::new(cfg.region.clone()))
                    .credentials_provider(credentials)
                    .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
                    .build();
                Some(aws_sdk_s3::Client::from_conf(sdk_config))
            }
            _ => {
                warn!("storage credentials incomplete; uploads disabled");
                None
            }
        };
        Self {
            client,
            bucket: cfg.bucket.clone(),
            region: cfg.region.clone(),
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let client = self.client.as_ref().ok_or(StorageError::NotConfigured)?;
        let bucket = self.bucket.as_deref().ok_or(StorageError::NotConfigured)?;

        let size = bytes.len();
        client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| StorageError::Transport {
                detail: e.to_string(),
            })?;

        debug!("stored {size} bytes at s3://{bucket}/{key}");
        Ok(format!(
            "https://{bucket}.s3.{}.amazonaws.com/{key}",
            self.region
        ))
    }
}

/// In-process storage for tests and local runs. Keys map to stored bytes;
/// URLs use a `memory://` scheme that is resolvable by nothing, on purpose.
#[derive(Default)]
pub struct MemoryStorage {
    bucket: String,
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
}

impl MemoryStorage {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Mutex::new(HashMap::new()),
        }
    }

    /// Number of stored objects.
    pub fn object_count(&self) -> usize {
        self.objects.lock().expect("memory storage poisoned").len()
    }

    /// Fetch stored bytes back out, for assertions.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .expect("memory storage poisoned")
            .get(key)
            .map(|(bytes, _)| bytes.clone())
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    fn is_configured(&self) -> bool {
        true
    }

    fn bucket(&self) -> Option<&str> {
        Some(&self.bucket)
    }

    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        self.objects
            .lock()
            .expect("memory storage poisoned")
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(format!("memory://{}/{key}", self.bucket))
    }
}

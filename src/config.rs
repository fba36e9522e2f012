//! Service configuration, read once from the environment at startup.
//!
//! Everything tunable lives in [`AppConfig`] so a single struct can be logged
//! at startup, shared across handlers, and overridden wholesale in tests.
//! Storage credentials sit in their own [`StorageConfig`] because "is storage
//! configured at all" is a question the API answers without touching the
//! network (`GET /api/test`, and the process endpoint's precondition check).

use std::time::Duration;

/// Maximum accepted upload size: 50 MiB.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Object-storage credentials and addressing, from the environment.
///
/// All fields except `region` may be absent; the service still starts and
/// serves uploads, but the process endpoint reports storage as unconfigured.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// `AWS_ACCESS_KEY_ID`
    pub access_key_id: Option<String>,
    /// `AWS_SECRET_ACCESS_KEY`
    pub secret_access_key: Option<String>,
    /// `AWS_REGION`, defaulting to `us-east-1`.
    pub region: String,
    /// `S3_BUCKET_NAME`
    pub bucket: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            access_key_id: None,
            secret_access_key: None,
            region: "us-east-1".to_string(),
            bucket: None,
        }
    }
}

impl StorageConfig {
    /// Read credentials from the environment. Never fails; absent variables
    /// just leave the corresponding field unset.
    pub fn from_env() -> Self {
        Self {
            access_key_id: non_empty_env("AWS_ACCESS_KEY_ID"),
            secret_access_key: non_empty_env("AWS_SECRET_ACCESS_KEY"),
            region: non_empty_env("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            bucket: non_empty_env("S3_BUCKET_NAME"),
        }
    }

    /// True when every field needed for an upload is present. No network call.
    pub fn is_configured(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some() && self.bucket.is_some()
    }
}

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Listen port (`PORT`, default 5000).
    pub port: u16,

    /// Maximum accepted upload size in bytes. Default: [`MAX_UPLOAD_BYTES`].
    pub max_upload_bytes: usize,

    /// Rasterization DPI. 150 keeps text legible while a full-page PNG stays
    /// around 1-2 MB; raise it only if slide decks carry fine print.
    pub dpi: u32,

    /// Thumbnail bounding box, width then height. The preview image is scaled
    /// to fit inside this box preserving aspect ratio.
    pub thumbnail_max: (u32, u32),

    /// Sessions older than this are treated as gone (`SESSION_TTL_SECS`,
    /// default 1800). An unclaimed upload holds every page of the deck as PNG
    /// bytes in memory, so the store must not grow for the life of the process.
    pub session_ttl: Duration,

    /// Hard cap on live sessions (`SESSION_CAPACITY`, default 256). When
    /// full, the oldest session is evicted to admit a new one.
    pub session_capacity: usize,

    /// Upper bound on a single storage put. Without one, a stalled
    /// connection wedges the worker for the rest of the request's life.
    pub storage_timeout: Duration,

    /// Storage credentials.
    pub storage: StorageConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            max_upload_bytes: MAX_UPLOAD_BYTES,
            dpi: 150,
            thumbnail_max: (300, 200),
            session_ttl: Duration::from_secs(1800),
            session_capacity: 256,
            storage_timeout: Duration::from_secs(30),
            storage: StorageConfig::default(),
        }
    }
}

impl AppConfig {
    /// Build the configuration from the environment, falling back to defaults
    /// for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: parsed_env("PORT").unwrap_or(defaults.port),
            session_ttl: parsed_env("SESSION_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.session_ttl),
            session_capacity: parsed_env("SESSION_CAPACITY").unwrap_or(defaults.session_capacity),
            storage: StorageConfig::from_env(),
            ..defaults
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

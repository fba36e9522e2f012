//! The session store: the only in-process state in the service.
//!
//! An upload and the process request that spends it are two independent HTTP
//! calls. Between them the rasterized deck (slide metadata plus every page as
//! full-resolution PNG bytes) lives here, keyed by a random 128-bit id.
//!
//! Consume semantics are single-use: [`SessionStore::take`] removes the
//! record under the same lock that finds it, so of two racing process
//! requests exactly one obtains the session and the loser observes "not
//! found". Deleting only after uploads finish would let both racers read
//! the same session and upload the deck twice.
//!
//! Sessions also expire. An unclaimed upload pins the whole deck in memory,
//! so entries past the TTL are treated as absent and swept, and the store
//! holds at most `capacity` sessions, evicting the oldest to admit a new one.

use crate::sanitize::sanitize_token;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

/// One rasterized PDF page plus its selection metadata.
///
/// Field names match the JSON the frontend consumes. `thumbnail` is a
/// `data:image/png;base64,` URI small enough to inline in the upload
/// response; the full-resolution bytes stay server-side in the [`Session`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Slide {
    /// 1-based page index.
    pub id: u32,
    /// Inline PNG preview, at most 300x200 pixels.
    pub thumbnail: String,
    /// Display title, "Slide N".
    pub title: String,
    /// Always false at creation; the client flips it locally.
    pub selected: bool,
    /// Assigned by the client in the process request; never set server-side.
    pub category: Option<String>,
}

/// Everything the process request needs, parked between the two calls.
#[derive(Debug)]
pub struct Session {
    /// Opaque random identifier, also the first segment of storage keys.
    pub id: String,
    /// Slide metadata in page order.
    pub slides: Vec<Slide>,
    /// Full-resolution PNG bytes, index-aligned with `slides`.
    pub images: Vec<Vec<u8>>,
    /// Fund identifier as supplied by the caller.
    pub fund_id: String,
    /// Fund display name as supplied by the caller.
    pub fund_name: String,
    /// Key-safe form of `fund_id`, derived once at creation.
    pub fund_id_safe: String,
    /// Key-safe form of `fund_name`, derived once at creation.
    pub fund_name_safe: String,
    created_at: Instant,
    /// Creation order, monotonic per store. Instants can tie on fast clocks,
    /// which would make capacity eviction nondeterministic.
    seq: u64,
}

impl Session {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() >= ttl
    }
}

/// Keyed in-memory store with single-use take semantics.
///
/// Interior mutability via a `std::sync::Mutex`; no method holds the lock
/// across an await point (none of them are async).
pub struct SessionStore {
    inner: Mutex<HashMap<String, Arc<Session>>>,
    ttl: Duration,
    capacity: usize,
    next_seq: AtomicU64,
}

impl SessionStore {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Store a freshly rasterized deck and return its session id.
    ///
    /// Sweeps expired entries first; if the store is still full, the oldest
    /// live session is evicted so a new upload always succeeds.
    pub fn create(
        &self,
        slides: Vec<Slide>,
        images: Vec<Vec<u8>>,
        fund_id: &str,
        fund_name: &str,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        let session = Arc::new(Session {
            id: id.clone(),
            slides,
            images,
            fund_id: fund_id.to_string(),
            fund_name: fund_name.to_string(),
            fund_id_safe: sanitize_token(fund_id),
            fund_name_safe: sanitize_token(fund_name),
            created_at: Instant::now(),
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        });

        let mut map = self.inner.lock().expect("session store poisoned");
        map.retain(|_, s| !s.is_expired(self.ttl));
        if map.len() >= self.capacity {
            if let Some(oldest) = map
                .iter()
                .min_by_key(|(_, s)| s.seq)
                .map(|(k, _)| k.clone())
            {
                info!("session store full, evicting oldest session {oldest}");
                map.remove(&oldest);
            }
        }
        map.insert(id.clone(), session);
        debug!("created session {id} ({} live)", map.len());
        id
    }

    /// Whether a live (non-expired) session exists for this id.
    pub fn contains(&self, id: &str) -> bool {
        let map = self.inner.lock().expect("session store poisoned");
        map.get(id).is_some_and(|s| !s.is_expired(self.ttl))
    }

    /// Atomically remove and return the session.
    ///
    /// Returns `None` for unknown, expired, or already-taken ids; an expired
    /// entry is dropped as a side effect.
    pub fn take(&self, id: &str) -> Option<Arc<Session>> {
        let mut map = self.inner.lock().expect("session store poisoned");
        let session = map.remove(id)?;
        if session.is_expired(self.ttl) {
            debug!("session {id} expired before it was consumed");
            return None;
        }
        Some(session)
    }

    /// Drop every expired session. Called periodically by the server's
    /// background task; `create` also sweeps, so this only bounds how long
    /// an idle process keeps dead decks in memory.
    pub fn sweep(&self) -> usize {
        let mut map = self.inner.lock().expect("session store poisoned");
        let before = map.len();
        map.retain(|_, s| !s.is_expired(self.ttl));
        let removed = before - map.len();
        if removed > 0 {
            info!("swept {removed} expired session(s)");
        }
        removed
    }

    /// Number of live entries, expired or not yet swept included.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("session store poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

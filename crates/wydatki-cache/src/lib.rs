//! # Wydatki Cache
//!
//! Versioned cache stores for the Wydatki offline cache: a persistent-style
//! key-value mapping from request identity (method + URL) to a stored
//! response snapshot.
//!
//! ## Architecture
//!
//! ```text
//! CacheStorage
//!     └── CacheStore ("dashboard-wydatki-v1.0.3")
//!             └── "GET /dashboard.html" → CacheEntry
//! ```
//!
//! Stores are owned exclusively by the cache controller; one store exists
//! per cache version, and whole stores are deleted when their version goes
//! stale.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur in cache-store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Store not found: {0}")]
    StoreNotFound(String),

    #[error("Quota exceeded in store {store}: {needed} bytes needed, {available} available")]
    QuotaExceeded {
        store: String,
        needed: usize,
        available: usize,
    },
}

/// A cached request/response pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Request URL.
    pub url: String,

    /// Request method.
    pub method: String,

    /// Response status.
    pub status: u16,

    /// Response headers.
    pub headers: HashMap<String, String>,

    /// Response body.
    pub body: Vec<u8>,

    /// Cached at timestamp (ms since epoch), supplied by the caller.
    pub cached_at: u64,
}

impl CacheEntry {
    /// Create a GET entry.
    pub fn get(url: impl Into<String>, status: u16, body: Vec<u8>, cached_at: u64) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            status,
            headers: HashMap::new(),
            body,
            cached_at,
        }
    }

    /// The identity this entry is stored under.
    pub fn identity(&self) -> String {
        request_identity(&self.method, &self.url)
    }

    /// Approximate stored size in bytes.
    pub fn size(&self) -> usize {
        self.body.len()
            + self.url.len()
            + self
                .headers
                .iter()
                .map(|(k, v)| k.len() + v.len())
                .sum::<usize>()
    }
}

/// Build the store key for a request.
pub fn request_identity(method: &str, url: &str) -> String {
    format!("{} {}", method, url)
}

/// One named, versioned cache store.
#[derive(Debug, Default)]
pub struct CacheStore {
    /// Store name (e.g. "dashboard-wydatki-v1.0.3").
    pub name: String,

    /// Optional byte quota for entry bodies and headers.
    max_bytes: Option<usize>,

    /// Current approximate size.
    total_bytes: usize,

    /// Cached entries keyed by request identity.
    entries: HashMap<String, CacheEntry>,
}

impl CacheStore {
    /// Create a new store.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            max_bytes: None,
            total_bytes: 0,
            entries: HashMap::new(),
        }
    }

    /// Create a new store with a byte quota.
    pub fn with_quota(name: &str, max_bytes: usize) -> Self {
        Self {
            name: name.to_string(),
            max_bytes: Some(max_bytes),
            total_bytes: 0,
            entries: HashMap::new(),
        }
    }

    /// Match a request by method and URL.
    pub fn match_request(&self, method: &str, url: &str) -> Option<&CacheEntry> {
        self.entries.get(&request_identity(method, url))
    }

    /// Insert an entry, replacing any previous entry with the same identity.
    pub fn put(&mut self, entry: CacheEntry) -> Result<(), CacheError> {
        let key = entry.identity();
        let new_size = entry.size();
        let old_size = self.entries.get(&key).map(|e| e.size()).unwrap_or(0);

        if let Some(max) = self.max_bytes {
            let projected = self.total_bytes - old_size + new_size;
            if projected > max {
                return Err(CacheError::QuotaExceeded {
                    store: self.name.clone(),
                    needed: new_size,
                    available: max.saturating_sub(self.total_bytes - old_size),
                });
            }
        }

        self.total_bytes = self.total_bytes - old_size + new_size;
        self.entries.insert(key, entry);
        Ok(())
    }

    /// Delete an entry. Returns whether it existed.
    pub fn delete(&mut self, method: &str, url: &str) -> bool {
        match self.entries.remove(&request_identity(method, url)) {
            Some(entry) => {
                self.total_bytes -= entry.size();
                true
            }
            None => false,
        }
    }

    /// URLs of all cached entries.
    pub fn keys(&self) -> Vec<String> {
        self.entries.values().map(|e| e.url.clone()).collect()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Approximate stored bytes.
    pub fn size_bytes(&self) -> usize {
        self.total_bytes
    }
}

/// The set of named cache stores.
#[derive(Debug, Default)]
pub struct CacheStorage {
    stores: HashMap<String, CacheStore>,

    /// Quota applied to newly opened stores.
    store_quota: Option<usize>,
}

impl CacheStorage {
    /// Create new cache storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create cache storage whose stores carry a byte quota.
    pub fn with_store_quota(max_bytes: usize) -> Self {
        Self {
            stores: HashMap::new(),
            store_quota: Some(max_bytes),
        }
    }

    /// Open a store, creating it if absent.
    pub fn open(&mut self, name: &str) -> &mut CacheStore {
        let quota = self.store_quota;
        self.stores.entry(name.to_string()).or_insert_with(|| {
            debug!(store = name, "Opening cache store");
            match quota {
                Some(max) => CacheStore::with_quota(name, max),
                None => CacheStore::new(name),
            }
        })
    }

    /// Get a store without creating it.
    pub fn get(&self, name: &str) -> Option<&CacheStore> {
        self.stores.get(name)
    }

    /// Check if a store exists.
    pub fn has(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    /// Delete a store. Returns whether it existed.
    pub fn delete(&mut self, name: &str) -> bool {
        let existed = self.stores.remove(name).is_some();
        if existed {
            debug!(store = name, "Deleted cache store");
        }
        existed
    }

    /// All store names.
    pub fn keys(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    /// Store names starting with the given prefix.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.stores
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Match a request across all stores.
    pub fn match_request(&self, method: &str, url: &str) -> Option<&CacheEntry> {
        self.stores
            .values()
            .find_map(|store| store.match_request(method, url))
    }
}

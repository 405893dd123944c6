//! Per-URL response history driving conditional GitHub requests.
//!
//! Every response the client receives is recorded here (status, validators,
//! body) so the next request for the same URL can be made conditional. A
//! 404 without a strong ETag gives us nothing safe to revalidate against: sending
//! a conditional request after such an answer can be served a stale "still
//! absent" from an intermediate cache even though the resource now exists.
//! For that case the next request bypasses caches entirely.

use crate::core::path::{ensure_dir, http_cache_dir};
use crate::core::{ScoutError, ScoutResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// What the last response for a URL looked like
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub status: u16,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    /// `Link` header, kept so cached pages can still be followed
    #[serde(default)]
    pub link: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl ResponseRecord {
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// A strong `ETag` was recorded; weak `W/"..."` tags don't count
    pub fn has_strong_etag(&self) -> bool {
        self.etag.as_deref().is_some_and(|e| !e.starts_with("W/"))
    }
}

/// Header policy for the next request to a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPolicy {
    /// No history: plain request
    Unconditional,
    /// Revalidate against the recorded validators
    Conditional {
        etag: Option<String>,
        last_modified: Option<String>,
    },
    /// Previous answer was a 404 we cannot validate: `Cache-Control: no-cache`,
    /// no conditional headers
    ForceRevalidate,
}

/// In-memory response history, optionally mirrored to disk
pub struct ResponseCache {
    entries: Mutex<HashMap<String, ResponseRecord>>,
    dir: Option<PathBuf>,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl ResponseCache {
    /// History kept for the lifetime of the process only
    pub fn in_memory() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            dir: None,
        }
    }

    /// History persisted as one JSON file per URL under `dir`
    pub fn persistent(dir: PathBuf) -> ScoutResult<Self> {
        ensure_dir(&dir)?;
        Ok(Self {
            entries: Mutex::new(HashMap::new()),
            dir: Some(dir),
        })
    }

    /// Directory for one API endpoint + credential pair
    ///
    /// Responses are visible only to the identity that fetched them, so the
    /// history is partitioned the same way.
    pub fn partition_dir(cache_root: &Path, api_url: &str, credential_id: &str) -> PathBuf {
        http_cache_dir(cache_root).join(Self::url_hash(&format!("{}\n{}", api_url, credential_id)))
    }

    /// Decide the header policy for the next request to `url`
    pub fn policy(&self, url: &str) -> RequestPolicy {
        match self.lookup(url) {
            None => RequestPolicy::Unconditional,
            Some(record) if record.is_not_found() && !record.has_strong_etag() => {
                RequestPolicy::ForceRevalidate
            }
            Some(record) if record.etag.is_some() || record.last_modified.is_some() => {
                RequestPolicy::Conditional {
                    etag: record.etag,
                    last_modified: record.last_modified,
                }
            }
            Some(_) => RequestPolicy::Unconditional,
        }
    }

    /// Record the response just received for `url`
    pub fn record(&self, url: &str, record: ResponseRecord) {
        self.persist(url, &record);
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(url.to_string(), record);
        }
    }

    /// Apply a `304 Not Modified`: refresh validators and return the stored record
    ///
    /// Returns `None` when there is nothing to replay, which callers treat as a
    /// protocol error.
    pub fn revalidated(
        &self,
        url: &str,
        etag: Option<String>,
        last_modified: Option<String>,
    ) -> Option<ResponseRecord> {
        let mut record = self.lookup(url)?;
        if etag.is_some() {
            record.etag = etag;
        }
        if last_modified.is_some() {
            record.last_modified = last_modified;
        }
        record.recorded_at = Utc::now();
        self.record(url, record.clone());
        Some(record)
    }

    /// Recorded response for `url`, loading it from disk on first use
    pub fn lookup(&self, url: &str) -> Option<ResponseRecord> {
        if let Some(record) = self
            .entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(url).cloned())
        {
            return Some(record);
        }
        let record = self.load(url)?;
        if let Ok(mut entries) = self.entries.lock() {
            entries
                .entry(url.to_string())
                .or_insert_with(|| record.clone());
        }
        Some(record)
    }

    /// Number of URLs with history in memory
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget everything, including the on-disk mirror
    pub fn clear(&self) -> ScoutResult<()> {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
        if let Some(dir) = &self.dir {
            if dir.exists() {
                fs::remove_dir_all(dir).map_err(|e| {
                    ScoutError::Cache(format!(
                        "Failed to clear HTTP cache {}: {}",
                        dir.display(),
                        e
                    ))
                })?;
            }
            ensure_dir(dir)?;
        }
        Ok(())
    }

    fn entry_path(&self, url: &str) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", Self::url_hash(url))))
    }

    fn load(&self, url: &str) -> Option<ResponseRecord> {
        let path = self.entry_path(url)?;
        let data = fs::read(&path).ok()?;
        match serde_json::from_slice(&data) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "ignoring unreadable cache entry");
                None
            }
        }
    }

    fn persist(&self, url: &str, record: &ResponseRecord) {
        let Some(path) = self.entry_path(url) else {
            return;
        };
        // A cache that cannot be written only costs a conditional request later
        if let Err(e) = serde_json::to_vec(record)
            .map_err(ScoutError::from)
            .and_then(|data| fs::write(&path, data).map_err(ScoutError::from))
        {
            tracing::warn!(path = %path.display(), error = %e, "failed to persist HTTP cache entry");
        }
    }

    /// Generate a hash for a URL (for cache file names)
    fn url_hash(url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        let hash = hasher.finalize();
        hex::encode(&hash[..16]) // Use first 16 bytes for shorter filename
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(status: u16, etag: Option<&str>) -> ResponseRecord {
        ResponseRecord {
            status,
            etag: etag.map(str::to_string),
            last_modified: None,
            body: Some("{}".to_string()),
            link: None,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_first_request_is_unconditional() {
        let cache = ResponseCache::in_memory();
        assert_eq!(cache.policy("https://x/a"), RequestPolicy::Unconditional);
    }

    #[test]
    fn test_validator_makes_next_request_conditional() {
        let cache = ResponseCache::in_memory();
        let mut r = record(200, Some("\"abc\""));
        r.last_modified = Some("Wed, 21 Oct 2015 07:28:00 GMT".to_string());
        cache.record("https://x/a", r);

        assert_eq!(
            cache.policy("https://x/a"),
            RequestPolicy::Conditional {
                etag: Some("\"abc\"".to_string()),
                last_modified: Some("Wed, 21 Oct 2015 07:28:00 GMT".to_string()),
            }
        );
    }

    #[test]
    fn test_unvalidated_not_found_forces_revalidation_once() {
        let cache = ResponseCache::in_memory();
        cache.record("https://x/a", record(404, None));
        assert_eq!(cache.policy("https://x/a"), RequestPolicy::ForceRevalidate);

        // The forced request came back with a validator: back to normal
        cache.record("https://x/a", record(200, Some("\"new\"")));
        assert!(matches!(
            cache.policy("https://x/a"),
            RequestPolicy::Conditional { .. }
        ));
    }

    #[test]
    fn test_not_found_with_etag_stays_conditional() {
        let cache = ResponseCache::in_memory();
        cache.record("https://x/a", record(404, Some("\"gone\"")));
        assert!(matches!(
            cache.policy("https://x/a"),
            RequestPolicy::Conditional { .. }
        ));
    }

    #[test]
    fn test_not_found_with_weak_etag_forces_revalidation() {
        let cache = ResponseCache::in_memory();
        cache.record("https://x/a", record(404, Some("W/\"abc\"")));
        assert_eq!(cache.policy("https://x/a"), RequestPolicy::ForceRevalidate);

        // Weak tags on found resources still drive conditional requests
        cache.record("https://x/b", record(200, Some("W/\"def\"")));
        assert_eq!(
            cache.policy("https://x/b"),
            RequestPolicy::Conditional {
                etag: Some("W/\"def\"".to_string()),
                last_modified: None,
            }
        );
    }

    #[test]
    fn test_revalidated_refreshes_etag() {
        let cache = ResponseCache::in_memory();
        cache.record("https://x/a", record(200, Some("\"1\"")));
        let replay = cache
            .revalidated("https://x/a", Some("\"2\"".to_string()), None)
            .unwrap();
        assert_eq!(replay.body.as_deref(), Some("{}"));
        assert_eq!(replay.etag.as_deref(), Some("\"2\""));
        assert!(cache.revalidated("https://x/other", None, None).is_none());
    }

    #[test]
    fn test_persistent_history_survives_restart() {
        let temp = TempDir::new().unwrap();
        let dir = ResponseCache::partition_dir(temp.path(), "https://api.github.com", "app-1");

        let cache = ResponseCache::persistent(dir.clone()).unwrap();
        cache.record("https://x/a", record(200, Some("\"abc\"")));
        drop(cache);

        let reopened = ResponseCache::persistent(dir).unwrap();
        assert!(reopened.is_empty());
        assert_eq!(
            reopened.lookup("https://x/a").unwrap().etag.as_deref(),
            Some("\"abc\"")
        );
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn test_partition_depends_on_credential() {
        let root = Path::new("/tmp/c");
        let a = ResponseCache::partition_dir(root, "https://api.github.com", "app-1");
        let b = ResponseCache::partition_dir(root, "https://api.github.com", "app-2");
        assert_ne!(a, b);
        assert!(a.starts_with(root.join("http")));
    }

    #[test]
    fn test_clear_removes_disk_entries() {
        let temp = TempDir::new().unwrap();
        let cache = ResponseCache::persistent(temp.path().join("h")).unwrap();
        cache.record("https://x/a", record(200, Some("\"abc\"")));
        cache.clear().unwrap();
        assert!(cache.lookup("https://x/a").is_none());
    }
}

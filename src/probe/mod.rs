//! File existence and content at one revision of a head.
//!
//! Directory listings are memoized per probe; a missing directory answers
//! "absent" for everything below it without another request. Conditional
//! request headers (and the no-cache revalidation of validator-less 404s)
//! are handled by the client's response cache.

use crate::core::{ScoutError, ScoutResult};
use crate::di::traits::RemoteClient;
use crate::discovery::head::{CheckoutStrategy, Head, Revision};
use crate::github::types::{ContentEntry, ContentKind, Contents};
use base64::Engine;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// What a path is at the probed revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    File,
    Directory,
    Symlink,
    /// Submodules and anything else GitHub reports
    Other,
    Nonexistent,
}

impl From<ContentKind> for FileKind {
    fn from(kind: ContentKind) -> Self {
        match kind {
            ContentKind::File => FileKind::File,
            ContentKind::Dir => FileKind::Directory,
            ContentKind::Symlink => FileKind::Symlink,
            ContentKind::Submodule | ContentKind::Unknown => FileKind::Other,
        }
    }
}

/// Result of [`CachingContentProbe::stat`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeStat {
    pub kind: FileKind,
    /// Same path with different letter case, when only that exists
    pub alternative_path: Option<String>,
}

impl ProbeStat {
    fn of(kind: FileKind) -> Self {
        Self {
            kind,
            alternative_path: None,
        }
    }

    pub fn exists(&self) -> bool {
        self.kind != FileKind::Nonexistent
    }
}

/// `None` records a directory that does not exist
type Listing = Option<Arc<Vec<ContentEntry>>>;

/// Answers content questions about one head at one revision
pub struct CachingContentProbe {
    client: Arc<dyn RemoteClient>,
    head: Head,
    revision: Option<Revision>,
    git_ref: String,
    listings: Mutex<HashMap<String, Listing>>,
    open: AtomicBool,
}

/// Git ref a head is probed at
pub fn head_ref(head: &Head) -> String {
    match head {
        Head::Branch { name } => format!("refs/heads/{}", name),
        Head::Tag(tag) => format!("refs/tags/{}", tag.name),
        Head::PullRequest(pr) => match pr.strategy {
            CheckoutStrategy::Merge => format!("refs/pull/{}/merge", pr.number),
            CheckoutStrategy::Head => format!("refs/pull/{}/head", pr.number),
        },
    }
}

fn split_parent(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((parent, name)) => (parent, name),
        None => ("", path),
    }
}

fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

impl CachingContentProbe {
    /// Probe `head`; a known branch or tag revision pins the commit
    pub fn new(client: Arc<dyn RemoteClient>, head: Head, revision: Option<Revision>) -> Self {
        let git_ref = revision
            .as_ref()
            .and_then(|r| r.plain_sha())
            .map(str::to_string)
            .unwrap_or_else(|| head_ref(&head));
        Self {
            client,
            head,
            revision,
            git_ref,
            listings: Mutex::new(HashMap::new()),
            open: AtomicBool::new(true),
        }
    }

    pub fn head(&self) -> &Head {
        &self.head
    }

    /// Ref or commit every request is made at
    pub fn git_ref(&self) -> &str {
        &self.git_ref
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Drop memoized listings; later calls fail
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        self.memo().clear();
    }

    fn ensure_open(&self) -> ScoutResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(ScoutError::RequestClosed("content probe"))
        }
    }

    fn memo(&self) -> std::sync::MutexGuard<'_, HashMap<String, Listing>> {
        match self.listings.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Whether a memoized listing already shows `dir` or an ancestor missing
    fn known_missing(&self, dir: &str) -> bool {
        let memo = self.memo();
        let mut current = dir;
        loop {
            if let Some(None) = memo.get(current) {
                return true;
            }
            if current.is_empty() {
                return false;
            }
            current = split_parent(current).0;
        }
    }

    async fn listing(&self, dir: &str) -> ScoutResult<Listing> {
        if let Some(listing) = self.memo().get(dir) {
            return Ok(listing.clone());
        }
        if self.known_missing(dir) {
            return Ok(None);
        }

        let listing = match self.client.contents(dir, &self.git_ref).await? {
            Some(Contents::Directory(entries)) => Some(Arc::new(entries)),
            // A file where a directory was expected
            Some(Contents::File(_)) | None => None,
        };
        tracing::debug!(dir, git_ref = %self.git_ref, found = listing.is_some(), "listed directory");
        self.memo().insert(dir.to_string(), listing.clone());
        Ok(listing)
    }

    /// Kind of `path`, answered from its parent directory's listing
    pub async fn stat(&self, path: &str) -> ScoutResult<ProbeStat> {
        self.ensure_open()?;
        let path = normalize(path);
        if path.is_empty() {
            return Ok(ProbeStat::of(FileKind::Directory));
        }

        let (parent, name) = split_parent(&path);
        let Some(entries) = self.listing(parent).await? else {
            return Ok(ProbeStat::of(FileKind::Nonexistent));
        };

        if let Some(entry) = entries.iter().find(|e| e.name == name) {
            return Ok(ProbeStat::of(entry.kind.into()));
        }
        let alternative_path = entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
            .map(|e| {
                if parent.is_empty() {
                    e.name.clone()
                } else {
                    format!("{}/{}", parent, e.name)
                }
            });
        Ok(ProbeStat {
            kind: FileKind::Nonexistent,
            alternative_path,
        })
    }

    pub async fn exists(&self, path: &str) -> ScoutResult<bool> {
        Ok(self.stat(path).await?.exists())
    }

    /// Decoded content of a file; `None` when it does not exist
    pub async fn read(&self, path: &str) -> ScoutResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        let path = normalize(path);
        if self.known_missing(split_parent(&path).0) {
            return Ok(None);
        }

        let entry = match self.client.contents(&path, &self.git_ref).await? {
            Some(Contents::File(entry)) => entry,
            Some(Contents::Directory(_)) => {
                return Err(ScoutError::Path(format!("{} is a directory", path)));
            }
            None => return Ok(None),
        };

        match entry.encoding.as_deref() {
            Some("base64") => {}
            other => {
                return Err(ScoutError::Protocol(format!(
                    "Unexpected encoding {:?} for {}",
                    other.unwrap_or("none"),
                    path
                )));
            }
        }
        let content = entry.content.unwrap_or_default();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(content.replace('\n', ""))
            .map_err(|e| ScoutError::Protocol(format!("Failed to decode base64 content: {}", e)))?;
        Ok(Some(decoded))
    }

    /// Commit time of the probed revision in epoch millis; 0 when unknown
    pub async fn last_modified(&self) -> i64 {
        if !self.is_open() {
            return 0;
        }
        match self.resolve_last_modified().await {
            Ok(millis) => millis,
            Err(e) => {
                tracing::warn!(head = %self.head, error = %e, "could not determine last modification");
                0
            }
        }
    }

    async fn resolve_last_modified(&self) -> ScoutResult<i64> {
        let sha = match &self.revision {
            Some(revision) => Some(revision.commit_sha().to_string()),
            None => self.resolve_sha().await?,
        };
        let Some(sha) = sha else {
            return Ok(0);
        };
        Ok(self
            .client
            .commit_date(&sha)
            .await?
            .map(|date| date.timestamp_millis())
            .unwrap_or(0))
    }

    async fn resolve_sha(&self) -> ScoutResult<Option<String>> {
        Ok(match &self.head {
            Head::Branch { name } => self.client.branch(name).await?.map(|b| b.commit.sha),
            Head::Tag(tag) => self.client.tag(&tag.name).await?.map(|t| t.commit.sha),
            Head::PullRequest(pr) => self
                .client
                .pull_request(pr.number)
                .await?
                .map(|p| p.head.sha),
        })
    }
}

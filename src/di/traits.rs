//! Trait definitions for dependency injection

use crate::auth::token::{StaleTokenPolicy, TokenTiming};
use crate::core::ScoutResult;
use crate::discovery::traits::SourceTrait;
use crate::github::types::{
    Branch, CommitStatusRequest, Contents, Installation, InstallationAccessToken, Permission,
    PullRequest, PullRequestState, Repository, RepositoryCoordinates, Tag,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;

/// Trait for configuration access
///
/// Provides read-only access to application configuration.
/// Implementations should be thread-safe (Send + Sync).
pub trait ConfigProvider: Send + Sync {
    /// GitHub REST API root, e.g. `https://api.github.com`
    fn api_url(&self) -> &str;

    /// Repository being scanned
    fn repository(&self) -> ScoutResult<RepositoryCoordinates>;

    /// Cache directory path
    fn cache_dir(&self) -> ScoutResult<PathBuf>;

    /// Whether HTTP validators are persisted under the cache directory
    fn persist_http_cache(&self) -> bool;

    /// Timeout applied to every HTTP call
    fn http_timeout(&self) -> Duration;

    fn user_agent(&self) -> &str;

    /// Staleness knobs for installation tokens
    fn token_timing(&self) -> TokenTiming;

    fn stale_token_policy(&self) -> StaleTokenPolicy;

    /// Delay before re-asking GitHub for a mergeability it had not computed
    fn merge_poll_delay(&self) -> Duration;

    /// Discovery traits, in application order
    fn traits(&self) -> &[SourceTrait];
}

/// Anything that can hand out a bearer credential for API calls
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Current secret, refreshing it first if needed
    async fn token(&self) -> ScoutResult<String>;

    /// Identity used to partition caches (app id, target, ...)
    fn credential_id(&self) -> String;
}

/// Repository-scoped GitHub operations used by discovery, probing and
/// notifications
///
/// Not-found answers are `Ok(None)` (or an empty list); every other failure
/// is an error.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn repository(&self) -> ScoutResult<Option<Repository>>;

    async fn branch(&self, name: &str) -> ScoutResult<Option<Branch>>;

    async fn branches(&self) -> ScoutResult<Vec<Branch>>;

    async fn pull_request(&self, number: u64) -> ScoutResult<Option<PullRequest>>;

    async fn pull_requests(&self, state: PullRequestState) -> ScoutResult<Vec<PullRequest>>;

    async fn tag(&self, name: &str) -> ScoutResult<Option<Tag>>;

    async fn tags(&self) -> ScoutResult<Vec<Tag>>;

    /// Contents of `path` at `git_ref` (a directory listing or a single entry)
    async fn contents(&self, path: &str, git_ref: &str) -> ScoutResult<Option<Contents>>;

    /// Committer date of a commit
    async fn commit_date(&self, sha: &str) -> ScoutResult<Option<DateTime<Utc>>>;

    /// Collaborator logins; `None` when the listing is not visible to us
    async fn collaborators(&self) -> ScoutResult<Option<Vec<String>>>;

    async fn collaborator_permission(&self, user: &str) -> ScoutResult<Option<Permission>>;

    async fn create_commit_status(&self, sha: &str, status: &CommitStatusRequest)
        -> ScoutResult<()>;
}

/// GitHub App operations that need the app JWT rather than an installation token
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// App id the issuer signs for
    fn app_id(&self) -> &str;

    async fn installations(&self) -> ScoutResult<Vec<Installation>>;

    async fn create_installation_token(
        &self,
        installation_id: u64,
    ) -> ScoutResult<InstallationAccessToken>;
}

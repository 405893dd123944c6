//! Mock implementations of service traits for testing

use super::traits::{ConfigProvider, RemoteClient, TokenIssuer};
use crate::auth::token::{StaleTokenPolicy, TokenTiming};
use crate::core::{ScoutError, ScoutResult};
use crate::discovery::traits::SourceTrait;
use crate::github::types::{
    Account, Branch, CommitRef, CommitStatusRequest, Contents, Installation,
    InstallationAccessToken, Label, Permission, PullRequest, PullRequestRef,
    PullRequestRepository, PullRequestState, Repository, RepositoryCoordinates, Tag,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Owner of the repository every mock serves
pub const MOCK_OWNER: &str = "octo";

/// Name of the repository every mock serves
pub const MOCK_REPO: &str = "repo";

/// Mock configuration provider for testing
///
/// # Example
///
/// ```
/// use ghscout::di::mocks::MockConfigProvider;
/// use ghscout::di::ConfigProvider;
///
/// let config = MockConfigProvider::default();
/// assert_eq!(config.api_url(), "https://api.github.com");
/// ```
#[derive(Clone)]
pub struct MockConfigProvider {
    pub api_url: String,
    pub repository: RepositoryCoordinates,
    pub cache_dir: PathBuf,
    pub persist_http_cache: bool,
    pub http_timeout: Duration,
    pub user_agent: String,
    pub token_timing: TokenTiming,
    pub stale_token_policy: StaleTokenPolicy,
    pub merge_poll_delay: Duration,
    pub traits: Vec<SourceTrait>,
}

impl Default for MockConfigProvider {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            repository: RepositoryCoordinates::new(MOCK_OWNER, MOCK_REPO),
            cache_dir: PathBuf::from("/tmp/ghscout-test-cache"),
            persist_http_cache: false,
            http_timeout: Duration::from_secs(30),
            user_agent: "ghscout-test".to_string(),
            token_timing: TokenTiming::default(),
            stale_token_policy: StaleTokenPolicy::default(),
            merge_poll_delay: Duration::from_millis(10),
            traits: Vec::new(),
        }
    }
}

impl ConfigProvider for MockConfigProvider {
    fn api_url(&self) -> &str {
        &self.api_url
    }

    fn repository(&self) -> ScoutResult<RepositoryCoordinates> {
        Ok(self.repository.clone())
    }

    fn cache_dir(&self) -> ScoutResult<PathBuf> {
        Ok(self.cache_dir.clone())
    }

    fn persist_http_cache(&self) -> bool {
        self.persist_http_cache
    }

    fn http_timeout(&self) -> Duration {
        self.http_timeout
    }

    fn user_agent(&self) -> &str {
        &self.user_agent
    }

    fn token_timing(&self) -> TokenTiming {
        self.token_timing
    }

    fn stale_token_policy(&self) -> StaleTokenPolicy {
        self.stale_token_policy
    }

    fn merge_poll_delay(&self) -> Duration {
        self.merge_poll_delay
    }

    fn traits(&self) -> &[SourceTrait] {
        &self.traits
    }
}

/// Builds pull requests against the mock repository
#[derive(Clone)]
pub struct PullRequestBuilder {
    pr: PullRequest,
}

impl PullRequestBuilder {
    /// Pull request from a branch of the mock repository itself
    pub fn origin(number: u64, branch: &str) -> Self {
        Self::from_owner(number, MOCK_OWNER, branch)
    }

    /// Pull request from a fork owned by `owner`
    pub fn fork(number: u64, owner: &str, branch: &str) -> Self {
        Self::from_owner(number, owner, branch)
    }

    fn from_owner(number: u64, owner: &str, branch: &str) -> Self {
        let repo = |owner: &str| PullRequestRepository {
            name: MOCK_REPO.to_string(),
            full_name: format!("{}/{}", owner, MOCK_REPO),
            owner: Account {
                login: owner.to_string(),
            },
        };
        Self {
            pr: PullRequest {
                number,
                state: PullRequestState::Open,
                title: format!("Change #{}", number),
                html_url: None,
                draft: false,
                user: Some(Account {
                    login: owner.to_string(),
                }),
                labels: Vec::new(),
                head: PullRequestRef {
                    git_ref: branch.to_string(),
                    sha: format!("head-{}", number),
                    user: Some(Account {
                        login: owner.to_string(),
                    }),
                    repo: Some(repo(owner)),
                },
                base: PullRequestRef {
                    git_ref: "master".to_string(),
                    sha: format!("base-{}", number),
                    user: Some(Account {
                        login: MOCK_OWNER.to_string(),
                    }),
                    repo: Some(repo(MOCK_OWNER)),
                },
                mergeable: Some(true),
                merge_commit_sha: None,
            },
        }
    }

    pub fn target(mut self, branch: &str) -> Self {
        self.pr.base.git_ref = branch.to_string();
        self
    }

    pub fn labels(mut self, labels: &[&str]) -> Self {
        self.pr.labels = labels
            .iter()
            .map(|l| Label {
                name: l.to_string(),
            })
            .collect();
        self
    }

    pub fn draft(mut self) -> Self {
        self.pr.draft = true;
        self
    }

    pub fn closed(mut self) -> Self {
        self.pr.state = PullRequestState::Closed;
        self
    }

    pub fn build(self) -> PullRequest {
        self.pr
    }
}

/// Mock remote client for testing
///
/// Serves an in-memory repository and counts calls per method.
///
/// # Example
///
/// ```
/// use ghscout::di::mocks::MockRemoteClient;
///
/// let client = MockRemoteClient::new()
///     .with_branch("master", "abc")
///     .with_branch("feature", "def");
/// assert_eq!(client.calls("branches"), 0);
/// ```
#[derive(Clone, Default)]
pub struct MockRemoteClient {
    repository: Arc<Mutex<Option<Repository>>>,
    branches: Arc<Mutex<Vec<Branch>>>,
    tags: Arc<Mutex<Vec<Tag>>>,
    pull_requests: Arc<Mutex<Vec<PullRequest>>>,
    mergeability: Arc<Mutex<HashMap<u64, VecDeque<Option<bool>>>>>,
    contents: Arc<Mutex<HashMap<(String, String), Contents>>>,
    commit_dates: Arc<Mutex<HashMap<String, DateTime<Utc>>>>,
    collaborators: Arc<Mutex<Option<Vec<String>>>>,
    permissions: Arc<Mutex<HashMap<String, Permission>>>,
    statuses: Arc<Mutex<Vec<(String, CommitStatusRequest)>>>,
    failing: Arc<Mutex<HashSet<&'static str>>>,
    calls: Arc<Mutex<HashMap<&'static str, usize>>>,
}

impl MockRemoteClient {
    /// Create a mock serving `octo/repo` with default branch `master`
    pub fn new() -> Self {
        let client = Self::default();
        if let Ok(mut repo) = client.repository.lock() {
            *repo = Some(Repository {
                name: MOCK_REPO.to_string(),
                full_name: format!("{}/{}", MOCK_OWNER, MOCK_REPO),
                owner: Account {
                    login: MOCK_OWNER.to_string(),
                },
                default_branch: "master".to_string(),
                private: false,
                html_url: Some(format!("https://github.com/{}/{}", MOCK_OWNER, MOCK_REPO)),
                clone_url: Some(format!("https://github.com/{}/{}.git", MOCK_OWNER, MOCK_REPO)),
                ssh_url: Some(format!("git@github.com:{}/{}.git", MOCK_OWNER, MOCK_REPO)),
            });
        }
        client
    }

    pub fn coordinates() -> RepositoryCoordinates {
        RepositoryCoordinates::new(MOCK_OWNER, MOCK_REPO)
    }

    pub fn with_default_branch(self, name: &str) -> Self {
        if let Ok(mut repo) = self.repository.lock() {
            if let Some(repo) = repo.as_mut() {
                repo.default_branch = name.to_string();
            }
        }
        self
    }

    pub fn with_branch(self, name: &str, sha: &str) -> Self {
        if let Ok(mut branches) = self.branches.lock() {
            branches.push(Branch {
                name: name.to_string(),
                commit: CommitRef {
                    sha: sha.to_string(),
                },
            });
        }
        self
    }

    pub fn with_tag(self, name: &str, sha: &str) -> Self {
        if let Ok(mut tags) = self.tags.lock() {
            tags.push(Tag {
                name: name.to_string(),
                commit: CommitRef {
                    sha: sha.to_string(),
                },
            });
        }
        self
    }

    pub fn with_pull_request(self, pr: PullRequest) -> Self {
        if let Ok(mut prs) = self.pull_requests.lock() {
            prs.push(pr);
        }
        self
    }

    /// Successive `mergeable` answers for the single pull request endpoint;
    /// the last one repeats
    pub fn with_mergeability(self, number: u64, answers: &[Option<bool>]) -> Self {
        if let Ok(mut m) = self.mergeability.lock() {
            m.insert(number, answers.iter().copied().collect());
        }
        self
    }

    pub fn with_contents(self, path: &str, git_ref: &str, contents: Contents) -> Self {
        if let Ok(mut c) = self.contents.lock() {
            c.insert(
                (path.trim_matches('/').to_string(), git_ref.to_string()),
                contents,
            );
        }
        self
    }

    pub fn with_commit_date(self, sha: &str, date: DateTime<Utc>) -> Self {
        if let Ok(mut d) = self.commit_dates.lock() {
            d.insert(sha.to_string(), date);
        }
        self
    }

    pub fn with_collaborators(self, logins: &[&str]) -> Self {
        if let Ok(mut c) = self.collaborators.lock() {
            *c = Some(logins.iter().map(|l| l.to_string()).collect());
        }
        self
    }

    pub fn with_permission(self, user: &str, permission: Permission) -> Self {
        if let Ok(mut p) = self.permissions.lock() {
            p.insert(user.to_string(), permission);
        }
        self
    }

    /// Make `method` fail with a server error
    pub fn failing(self, method: &'static str) -> Self {
        if let Ok(mut f) = self.failing.lock() {
            f.insert(method);
        }
        self
    }

    /// Number of calls made to `method`
    pub fn calls(&self, method: &str) -> usize {
        self.calls
            .lock()
            .map(|c| c.get(method).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Statuses published so far, as (sha, status)
    pub fn statuses(&self) -> Vec<(String, CommitStatusRequest)> {
        self.statuses.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn enter(&self, method: &'static str) -> ScoutResult<()> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(method).or_insert(0) += 1;
        }
        let failing = self
            .failing
            .lock()
            .map(|f| f.contains(method))
            .unwrap_or(false);
        if failing {
            return Err(ScoutError::Remote {
                status: 500,
                url: format!("mock://{}", method),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteClient for MockRemoteClient {
    async fn repository(&self) -> ScoutResult<Option<Repository>> {
        self.enter("repository")?;
        Ok(self.repository.lock().ok().and_then(|r| r.clone()))
    }

    async fn branch(&self, name: &str) -> ScoutResult<Option<Branch>> {
        self.enter("branch")?;
        Ok(self
            .branches
            .lock()
            .ok()
            .and_then(|b| b.iter().find(|b| b.name == name).cloned()))
    }

    async fn branches(&self) -> ScoutResult<Vec<Branch>> {
        self.enter("branches")?;
        Ok(self.branches.lock().map(|b| b.clone()).unwrap_or_default())
    }

    async fn pull_request(&self, number: u64) -> ScoutResult<Option<PullRequest>> {
        self.enter("pull_request")?;
        let Some(mut pr) = self
            .pull_requests
            .lock()
            .ok()
            .and_then(|p| p.iter().find(|p| p.number == number).cloned())
        else {
            return Ok(None);
        };

        let answer = self.mergeability.lock().ok().and_then(|mut m| {
            let queue = m.get_mut(&number)?;
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().copied()
            }
        });
        if let Some(answer) = answer {
            pr.mergeable = answer;
        }
        if pr.mergeable == Some(true) {
            pr.merge_commit_sha = Some(format!("merge-{}", number));
        }
        Ok(Some(pr))
    }

    async fn pull_requests(&self, state: PullRequestState) -> ScoutResult<Vec<PullRequest>> {
        self.enter("pull_requests")?;
        Ok(self
            .pull_requests
            .lock()
            .map(|p| {
                p.iter()
                    .filter(|pr| state == PullRequestState::All || pr.state == state)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn tag(&self, name: &str) -> ScoutResult<Option<Tag>> {
        self.enter("tag")?;
        Ok(self
            .tags
            .lock()
            .ok()
            .and_then(|t| t.iter().find(|t| t.name == name).cloned()))
    }

    async fn tags(&self) -> ScoutResult<Vec<Tag>> {
        self.enter("tags")?;
        Ok(self.tags.lock().map(|t| t.clone()).unwrap_or_default())
    }

    async fn contents(&self, path: &str, git_ref: &str) -> ScoutResult<Option<Contents>> {
        self.enter("contents")?;
        Ok(self.contents.lock().ok().and_then(|c| {
            c.get(&(path.trim_matches('/').to_string(), git_ref.to_string()))
                .cloned()
        }))
    }

    async fn commit_date(&self, sha: &str) -> ScoutResult<Option<DateTime<Utc>>> {
        self.enter("commit_date")?;
        Ok(self.commit_dates.lock().ok().and_then(|d| d.get(sha).copied()))
    }

    async fn collaborators(&self) -> ScoutResult<Option<Vec<String>>> {
        self.enter("collaborators")?;
        Ok(self.collaborators.lock().ok().and_then(|c| c.clone()))
    }

    async fn collaborator_permission(&self, user: &str) -> ScoutResult<Option<Permission>> {
        self.enter("collaborator_permission")?;
        Ok(self.permissions.lock().ok().and_then(|p| p.get(user).copied()))
    }

    async fn create_commit_status(
        &self,
        sha: &str,
        status: &CommitStatusRequest,
    ) -> ScoutResult<()> {
        self.enter("create_commit_status")?;
        if let Ok(mut s) = self.statuses.lock() {
            s.push((sha.to_string(), status.clone()));
        }
        Ok(())
    }
}

/// Mock GitHub App issuer for testing
///
/// Hands out tokens `token-<n>` and records every attempt.
pub struct MockTokenIssuer {
    app_id: String,
    installations: Vec<Installation>,
    lifetime: chrono::Duration,
    delay: Option<Duration>,
    failure: Mutex<Option<String>>,
    listing_fails: AtomicBool,
    attempts: AtomicUsize,
    created: AtomicUsize,
    listings: AtomicUsize,
    minted_for: Mutex<Vec<u64>>,
}

impl MockTokenIssuer {
    pub fn new(app_id: &str) -> Self {
        Self {
            app_id: app_id.to_string(),
            installations: Vec::new(),
            lifetime: chrono::Duration::hours(1),
            delay: None,
            failure: Mutex::new(None),
            listing_fails: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
            created: AtomicUsize::new(0),
            listings: AtomicUsize::new(0),
            minted_for: Mutex::new(Vec::new()),
        }
    }

    pub fn with_installation(mut self, id: u64, login: &str) -> Self {
        self.installations.push(Installation {
            id,
            account: Account {
                login: login.to_string(),
            },
        });
        self
    }

    /// Lifetime of minted tokens (default one hour)
    pub fn with_lifetime(mut self, lifetime: chrono::Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Delay every token creation, to widen race windows
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make token creation fail from now on
    pub fn fail_with(&self, message: &str) {
        if let Ok(mut f) = self.failure.lock() {
            *f = Some(message.to_string());
        }
    }

    pub fn fail_listing(&self, fail: bool) {
        self.listing_fails.store(fail, Ordering::SeqCst);
    }

    /// Successful token creations
    pub fn tokens_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Token creations attempted, successful or not
    pub fn token_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn installation_listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }

    /// Installation ids tokens were minted for, in order
    pub fn minted_for(&self) -> Vec<u64> {
        self.minted_for.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TokenIssuer for MockTokenIssuer {
    fn app_id(&self) -> &str {
        &self.app_id
    }

    async fn installations(&self) -> ScoutResult<Vec<Installation>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        if self.listing_fails.load(Ordering::SeqCst) {
            return Err(ScoutError::Auth("installation listing failed".to_string()));
        }
        Ok(self.installations.clone())
    }

    async fn create_installation_token(
        &self,
        installation_id: u64,
    ) -> ScoutResult<InstallationAccessToken> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.failure.lock().ok().and_then(|f| f.clone()) {
            return Err(ScoutError::Auth(message));
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut m) = self.minted_for.lock() {
            m.push(installation_id);
        }
        Ok(InstallationAccessToken {
            token: format!("token-{}", n),
            expires_at: Utc::now() + self.lifetime,
        })
    }
}

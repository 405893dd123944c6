//! GitHub API client implementation

use crate::cache::{RequestPolicy, ResponseCache, ResponseRecord};
use crate::core::{ScoutError, ScoutResult};
use crate::di::traits::{ConfigProvider, RemoteClient, TokenSource};
use crate::github::types::{
    AnnotatedTag, Branch, Commit, CommitRef, CommitStatusRequest, Contents, GitReference,
    CollaboratorPermission, Permission, PullRequest, PullRequestState, Repository,
    RepositoryCoordinates, Tag,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client as HttpClient, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;

/// Page size for collection endpoints
const PER_PAGE: u32 = 100;

/// Body and paging information of a successful (or replayed) GET
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub body: String,
    pub next_page: Option<String>,
}

/// GitHub API client bound to one repository
pub struct GitHubClient {
    http_client: HttpClient,
    api_url: String,
    repository: RepositoryCoordinates,
    tokens: Arc<dyn TokenSource>,
    rate_limiter: Arc<RateLimiter>,
    responses: Arc<ResponseCache>,
}

/// Rate limiter for GitHub API
struct RateLimiter {
    remaining: Mutex<u64>,
    reset_time: Mutex<SystemTime>,
}

impl GitHubClient {
    /// Create a new GitHub client
    pub fn new(
        config: &dyn ConfigProvider,
        tokens: Arc<dyn TokenSource>,
        responses: Arc<ResponseCache>,
    ) -> ScoutResult<Self> {
        Self::with_repository(
            config.api_url(),
            config.repository()?,
            config.user_agent(),
            config.http_timeout(),
            tokens,
            responses,
        )
    }

    /// Create a client without a config file
    pub fn with_repository(
        api_url: &str,
        repository: RepositoryCoordinates,
        user_agent: &str,
        timeout: Duration,
        tokens: Arc<dyn TokenSource>,
        responses: Arc<ResponseCache>,
    ) -> ScoutResult<Self> {
        let http_client = build_http_client(user_agent, timeout)?;
        Ok(Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
            repository,
            tokens,
            rate_limiter: Arc::new(RateLimiter {
                remaining: Mutex::new(5000),
                reset_time: Mutex::new(SystemTime::now() + Duration::from_secs(3600)),
            }),
            responses,
        })
    }

    pub fn coordinates(&self) -> &RepositoryCoordinates {
        &self.repository
    }

    fn repo_url(&self, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}{}",
            self.api_url,
            urlencoding::encode(&self.repository.owner),
            urlencoding::encode(&self.repository.name),
            suffix
        )
    }

    /// Get repository information
    pub async fn get_repository(&self) -> ScoutResult<Option<Repository>> {
        let url = self.repo_url("");
        self.api_get_optional(&url).await
    }

    /// Get a single branch
    pub async fn get_branch(&self, name: &str) -> ScoutResult<Option<Branch>> {
        let url = self.repo_url(&format!("/branches/{}", encode_path(name)));
        self.api_get_optional(&url).await
    }

    /// Get all branches
    pub async fn get_branches(&self) -> ScoutResult<Vec<Branch>> {
        let url = self.repo_url(&format!("/branches?per_page={}", PER_PAGE));
        self.api_get_all(&url).await
    }

    /// Get a single pull request (includes mergeability)
    pub async fn get_pull_request(&self, number: u64) -> ScoutResult<Option<PullRequest>> {
        let url = self.repo_url(&format!("/pulls/{}", number));
        self.api_get_optional(&url).await
    }

    /// Get pull requests in the given state
    pub async fn get_pull_requests(&self, state: PullRequestState) -> ScoutResult<Vec<PullRequest>> {
        let url = self.repo_url(&format!("/pulls?state={}&per_page={}", state, PER_PAGE));
        self.api_get_all(&url).await
    }

    /// Get a single tag, peeling annotated tags to their commit
    pub async fn get_tag(&self, name: &str) -> ScoutResult<Option<Tag>> {
        let url = self.repo_url(&format!("/git/ref/tags/{}", encode_path(name)));
        let Some(reference) = self.api_get_optional::<GitReference>(&url).await? else {
            return Ok(None);
        };

        let sha = if reference.object.kind == "tag" {
            let url = self.repo_url(&format!("/git/tags/{}", reference.object.sha));
            match self.api_get_optional::<AnnotatedTag>(&url).await? {
                Some(tag) => tag.object.sha,
                None => return Ok(None),
            }
        } else {
            reference.object.sha
        };

        Ok(Some(Tag {
            name: name.to_string(),
            commit: CommitRef { sha },
        }))
    }

    /// Get all tags
    pub async fn get_tags(&self) -> ScoutResult<Vec<Tag>> {
        let url = self.repo_url(&format!("/tags?per_page={}", PER_PAGE));
        self.api_get_all(&url).await
    }

    /// Get the contents of a path at a ref
    pub async fn get_contents(&self, path: &str, git_ref: &str) -> ScoutResult<Option<Contents>> {
        let path = path.trim_matches('/');
        let suffix = if path.is_empty() {
            "/contents".to_string()
        } else {
            format!("/contents/{}", encode_path(path))
        };
        let url = self.repo_url(&format!("{}?ref={}", suffix, urlencoding::encode(git_ref)));
        self.api_get_optional(&url).await
    }

    /// Get the committer date of a commit
    pub async fn get_commit_date(&self, sha: &str) -> ScoutResult<Option<DateTime<Utc>>> {
        let url = self.repo_url(&format!("/commits/{}", urlencoding::encode(sha)));
        Ok(self
            .api_get_optional::<Commit>(&url)
            .await?
            .and_then(|c| c.date()))
    }

    /// Get collaborator logins; `None` when the list is hidden from us
    pub async fn get_collaborators(&self) -> ScoutResult<Option<Vec<String>>> {
        #[derive(serde::Deserialize)]
        struct Collaborator {
            login: String,
        }

        let url = self.repo_url(&format!("/collaborators?per_page={}", PER_PAGE));
        Ok(self
            .api_get_all_optional::<Collaborator>(&url)
            .await?
            .map(|list| list.into_iter().map(|c| c.login).collect()))
    }

    /// Get the permission level of a user
    pub async fn get_collaborator_permission(&self, user: &str) -> ScoutResult<Option<Permission>> {
        let url = self.repo_url(&format!(
            "/collaborators/{}/permission",
            urlencoding::encode(user)
        ));
        Ok(self
            .api_get_optional::<CollaboratorPermission>(&url)
            .await?
            .map(|p| p.permission))
    }

    /// Create a commit status
    pub async fn post_commit_status(
        &self,
        sha: &str,
        status: &CommitStatusRequest,
    ) -> ScoutResult<()> {
        let url = self.repo_url(&format!("/statuses/{}", urlencoding::encode(sha)));
        self.check_rate_limit().await?;

        let token = self.tokens.token().await?;
        let response = self
            .http_client
            .post(&url)
            .header(header::AUTHORIZATION, format!("token {}", token))
            .json(status)
            .send()
            .await?;

        self.update_rate_limit(&response).await;

        if !response.status().is_success() {
            return Err(ScoutError::Remote {
                status: response.status().as_u16(),
                url,
            });
        }
        Ok(())
    }

    /// Make a GET request through the response history
    ///
    /// Returns `None` for 404. The history is updated before the body is
    /// handed back.
    pub async fn fetch(&self, url: &str) -> ScoutResult<Option<FetchedResponse>> {
        self.check_rate_limit().await?;

        let token = self.tokens.token().await?;
        let mut request = self
            .http_client
            .get(url)
            .header(header::AUTHORIZATION, format!("token {}", token));

        match self.responses.policy(url) {
            RequestPolicy::Unconditional => {}
            RequestPolicy::Conditional {
                etag,
                last_modified,
            } => {
                if let Some(etag) = etag {
                    request = request.header(header::IF_NONE_MATCH, etag);
                }
                if let Some(last_modified) = last_modified {
                    request = request.header(header::IF_MODIFIED_SINCE, last_modified);
                }
            }
            RequestPolicy::ForceRevalidate => {
                tracing::debug!(url, "revalidating unvalidated 404 without cache");
                request = request.header(header::CACHE_CONTROL, "no-cache");
            }
        }

        let response = request.send().await?;
        self.update_rate_limit(&response).await;

        let status = response.status();
        let etag = header_string(&response, header::ETAG);
        let last_modified = header_string(&response, header::LAST_MODIFIED);
        let link = header_string(&response, header::LINK);

        if status == StatusCode::NOT_MODIFIED {
            let record = self
                .responses
                .revalidated(url, etag, last_modified)
                .ok_or_else(|| {
                    ScoutError::Protocol(format!("304 Not Modified without cached body for {}", url))
                })?;
            if record.is_not_found() {
                return Ok(None);
            }
            return Ok(Some(FetchedResponse {
                next_page: record.link.as_deref().and_then(next_page_url),
                body: record.body.unwrap_or_default(),
            }));
        }

        if status == StatusCode::NOT_FOUND {
            self.responses.record(
                url,
                ResponseRecord {
                    status: status.as_u16(),
                    etag,
                    last_modified,
                    body: None,
                    link: None,
                    recorded_at: Utc::now(),
                },
            );
            tracing::debug!(url, "not found");
            return Ok(None);
        }

        if status == StatusCode::FORBIDDEN && *self.rate_limiter.remaining.lock().await == 0 {
            return Err(ScoutError::RateLimited {
                reset_in_secs: self.seconds_until_reset().await,
            });
        }

        if !status.is_success() {
            return Err(ScoutError::Remote {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        self.responses.record(
            url,
            ResponseRecord {
                status: status.as_u16(),
                etag,
                last_modified,
                body: Some(body.clone()),
                link: link.clone(),
                recorded_at: Utc::now(),
            },
        );

        Ok(Some(FetchedResponse {
            body,
            next_page: link.as_deref().and_then(next_page_url),
        }))
    }

    /// GET and parse a single resource; `None` on 404
    async fn api_get_optional<T: DeserializeOwned>(&self, url: &str) -> ScoutResult<Option<T>> {
        match self.fetch(url).await? {
            Some(response) => serde_json::from_str(&response.body)
                .map(Some)
                .map_err(|e| {
                    ScoutError::Protocol(format!("Failed to parse GitHub API response: {}", e))
                }),
            None => Ok(None),
        }
    }

    /// GET every page of a collection; 404 on the first page is an empty list
    ///
    /// All pages are read before returning, so a failure on a later page
    /// surfaces as an error rather than a truncated list.
    async fn api_get_all<T: DeserializeOwned>(&self, url: &str) -> ScoutResult<Vec<T>> {
        Ok(self.api_get_all_optional(url).await?.unwrap_or_default())
    }

    /// Every page of a collection; `None` when the first page is a 404
    async fn api_get_all_optional<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> ScoutResult<Option<Vec<T>>> {
        let mut items = Vec::new();
        let mut next = Some(url.to_string());
        let mut first = true;

        while let Some(page_url) = next.take() {
            match self.fetch(&page_url).await? {
                Some(response) => {
                    let page: Vec<T> = serde_json::from_str(&response.body).map_err(|e| {
                        ScoutError::Protocol(format!("Failed to parse GitHub API response: {}", e))
                    })?;
                    items.extend(page);
                    next = response.next_page;
                }
                None if first => return Ok(None),
                None => {
                    return Err(ScoutError::NotFound(format!("page vanished: {}", page_url)));
                }
            }
            first = false;
        }

        Ok(Some(items))
    }

    /// Check if we're within rate limits
    async fn check_rate_limit(&self) -> ScoutResult<()> {
        let remaining = *self.rate_limiter.remaining.lock().await;
        if remaining == 0 {
            let reset_in_secs = self.seconds_until_reset().await;
            if reset_in_secs > 0 {
                return Err(ScoutError::RateLimited { reset_in_secs });
            }
        }
        Ok(())
    }

    async fn seconds_until_reset(&self) -> u64 {
        let reset_time = *self.rate_limiter.reset_time.lock().await;
        reset_time
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO)
            .as_secs()
    }

    /// Update rate limit from response headers
    async fn update_rate_limit(&self, response: &reqwest::Response) {
        if let Some(remaining) = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
        {
            *self.rate_limiter.remaining.lock().await = remaining;
        }

        if let Some(reset) = response
            .headers()
            .get("x-ratelimit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
        {
            *self.rate_limiter.reset_time.lock().await =
                SystemTime::UNIX_EPOCH + Duration::from_secs(reset);
        }
    }
}

/// Shared reqwest client setup for GitHub endpoints
pub(crate) fn build_http_client(user_agent: &str, timeout: Duration) -> ScoutResult<HttpClient> {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::USER_AGENT,
        header::HeaderValue::from_str(user_agent)
            .map_err(|e| ScoutError::Config(format!("Invalid user agent: {}", e)))?,
    );
    headers.insert(
        header::ACCEPT,
        header::HeaderValue::from_static("application/vnd.github.v3+json"),
    );

    HttpClient::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|e| ScoutError::Config(format!("Failed to create HTTP client: {}", e)))
}

fn header_string(response: &reqwest::Response, name: header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Encode each segment of a slash separated path
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Extract the `rel="next"` target of a `Link` header
fn next_page_url(link: &str) -> Option<String> {
    link.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        if params.split(';').any(|p| p.trim() == "rel=\"next\"") {
            Some(
                target
                    .trim()
                    .trim_start_matches('<')
                    .trim_end_matches('>')
                    .to_string(),
            )
        } else {
            None
        }
    })
}

// Implement RemoteClient trait
#[async_trait]
impl RemoteClient for GitHubClient {
    async fn repository(&self) -> ScoutResult<Option<Repository>> {
        Self::get_repository(self).await
    }

    async fn branch(&self, name: &str) -> ScoutResult<Option<Branch>> {
        Self::get_branch(self, name).await
    }

    async fn branches(&self) -> ScoutResult<Vec<Branch>> {
        Self::get_branches(self).await
    }

    async fn pull_request(&self, number: u64) -> ScoutResult<Option<PullRequest>> {
        Self::get_pull_request(self, number).await
    }

    async fn pull_requests(&self, state: PullRequestState) -> ScoutResult<Vec<PullRequest>> {
        Self::get_pull_requests(self, state).await
    }

    async fn tag(&self, name: &str) -> ScoutResult<Option<Tag>> {
        Self::get_tag(self, name).await
    }

    async fn tags(&self) -> ScoutResult<Vec<Tag>> {
        Self::get_tags(self).await
    }

    async fn contents(&self, path: &str, git_ref: &str) -> ScoutResult<Option<Contents>> {
        Self::get_contents(self, path, git_ref).await
    }

    async fn commit_date(&self, sha: &str) -> ScoutResult<Option<DateTime<Utc>>> {
        Self::get_commit_date(self, sha).await
    }

    async fn collaborators(&self) -> ScoutResult<Option<Vec<String>>> {
        Self::get_collaborators(self).await
    }

    async fn collaborator_permission(&self, user: &str) -> ScoutResult<Option<Permission>> {
        Self::get_collaborator_permission(self, user).await
    }

    async fn create_commit_status(
        &self,
        sha: &str,
        status: &CommitStatusRequest,
    ) -> ScoutResult<()> {
        Self::post_commit_status(self, sha, status).await
    }
}

//! One scan's view of a repository: lazy, memoized listings and trust.

use crate::core::{ScoutError, ScoutResult};
use crate::di::traits::RemoteClient;
use crate::discovery::context::DiscoveryContext;
use crate::discovery::filter::{Authority, HeadFilter, Prefilter};
use crate::discovery::head::{
    CheckoutStrategy, Head, HeadKind, MergeHash, PullRequestOrigin, Revision,
};
use crate::discovery::observer::HeadSelector;
use crate::github::types::{
    Branch, Permission, PullRequest, PullRequestState, Repository, RepositoryCoordinates, Tag,
};
use crate::notification::NotificationStrategy;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, OnceCell};

/// Delay before asking GitHub a second time for a pending mergeability
pub const DEFAULT_MERGE_POLL_DELAY: Duration = Duration::from_secs(1);

/// Scan-scoped caches, dropped on close
#[derive(Default)]
struct ScanMemo {
    repository: OnceCell<Option<Repository>>,
    branches: OnceCell<Vec<Branch>>,
    tags: OnceCell<Vec<Tag>>,
    pull_requests: OnceCell<Vec<PullRequest>>,
    collaborators: OnceCell<Vec<String>>,
    permissions: Mutex<HashMap<String, Permission>>,
    trust: Mutex<HashMap<Head, bool>>,
    merge_hashes: Mutex<HashMap<u64, MergeHash>>,
}

fn locked<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// What to scan and how, captured from a [`DiscoveryContext`]
///
/// Listings are fetched on first use and replayed afterwards. Once
/// [`close`](Self::close)d, every listing call fails with
/// [`ScoutError::RequestClosed`].
pub struct DiscoveryRequest {
    client: Arc<dyn RemoteClient>,
    coordinates: RepositoryCoordinates,
    want_branches: bool,
    want_tags: bool,
    want_origin_prs: bool,
    want_fork_prs: bool,
    origin_pr_strategies: BTreeSet<CheckoutStrategy>,
    fork_pr_strategies: BTreeSet<CheckoutStrategy>,
    prefilters: Vec<Prefilter>,
    filters: Vec<HeadFilter>,
    authorities: Vec<Authority>,
    notification_strategies: Vec<NotificationStrategy>,
    ignored_head_errors: BTreeSet<HeadKind>,
    includes: Option<Vec<HeadSelector>>,
    /// Branch selectors named explicitly in the inclusion set
    selected_branches: BTreeSet<String>,
    /// Selected branches plus source branches of selected origin pull requests
    requested_branches: BTreeSet<String>,
    requested_tags: BTreeSet<String>,
    requested_pull_requests: BTreeSet<u64>,
    /// The only selected branch is the target of the only selected origin pull request
    only_wants_pull_request_branch: bool,
    merge_poll_delay: Duration,
    cancel: Option<watch::Receiver<bool>>,
    closed: AtomicBool,
    memo: Mutex<Arc<ScanMemo>>,
}

impl DiscoveryRequest {
    pub fn new(
        client: Arc<dyn RemoteClient>,
        coordinates: RepositoryCoordinates,
        context: &DiscoveryContext,
        includes: Option<Vec<HeadSelector>>,
    ) -> Self {
        let mut selected_branches = BTreeSet::new();
        let mut requested_branches = BTreeSet::new();
        let mut requested_tags = BTreeSet::new();
        let mut requested_pull_requests = BTreeSet::new();
        let mut origin_pr_target = None;

        for selector in includes.iter().flatten() {
            match selector {
                HeadSelector::Branch { name } => {
                    selected_branches.insert(name.clone());
                    requested_branches.insert(name.clone());
                }
                HeadSelector::Tag { name } => {
                    requested_tags.insert(name.clone());
                }
                HeadSelector::PullRequest {
                    number,
                    source_owner,
                    source_branch,
                    target_branch,
                } => {
                    requested_pull_requests.insert(*number);
                    let from_origin = source_owner
                        .as_deref()
                        .map(|owner| owner.eq_ignore_ascii_case(&coordinates.owner))
                        .unwrap_or(false);
                    if from_origin {
                        if let Some(branch) = source_branch {
                            requested_branches.insert(branch.clone());
                        }
                        origin_pr_target = target_branch.clone();
                    }
                }
            }
        }

        let only_wants_pull_request_branch = selected_branches.len() == 1
            && requested_pull_requests.len() == 1
            && origin_pr_target
                .as_ref()
                .map(|target| selected_branches.contains(target))
                .unwrap_or(false);

        let want_origin_prs = context.wants_origin_prs();
        let want_fork_prs = context.wants_fork_prs();

        Self {
            client,
            coordinates,
            want_branches: context.wants_branches(),
            want_tags: context.wants_tags(),
            want_origin_prs,
            want_fork_prs,
            origin_pr_strategies: if want_origin_prs {
                context.origin_pr_strategies().clone()
            } else {
                BTreeSet::new()
            },
            fork_pr_strategies: if want_fork_prs {
                context.fork_pr_strategies().clone()
            } else {
                BTreeSet::new()
            },
            prefilters: context.prefilters().to_vec(),
            filters: context.filters().to_vec(),
            authorities: context.authorities().to_vec(),
            notification_strategies: context.notification_strategies().to_vec(),
            ignored_head_errors: context.ignored_head_errors().clone(),
            includes,
            selected_branches,
            requested_branches,
            requested_tags,
            requested_pull_requests,
            only_wants_pull_request_branch,
            merge_poll_delay: DEFAULT_MERGE_POLL_DELAY,
            cancel: None,
            closed: AtomicBool::new(false),
            memo: Mutex::new(Arc::new(ScanMemo::default())),
        }
    }

    pub fn with_merge_poll_delay(mut self, delay: Duration) -> Self {
        self.merge_poll_delay = delay;
        self
    }

    /// Stop the scan once `true` is sent on the channel
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn coordinates(&self) -> &RepositoryCoordinates {
        &self.coordinates
    }

    pub fn wants_branches(&self) -> bool {
        self.want_branches
    }

    pub fn wants_tags(&self) -> bool {
        self.want_tags
    }

    pub fn wants_prs(&self) -> bool {
        self.want_origin_prs || self.want_fork_prs
    }

    /// Checkout strategies built for pull requests of that origin
    pub fn strategies_for(&self, origin: PullRequestOrigin) -> &BTreeSet<CheckoutStrategy> {
        match origin {
            PullRequestOrigin::Origin => &self.origin_pr_strategies,
            PullRequestOrigin::Fork => &self.fork_pr_strategies,
        }
    }

    pub fn notification_strategies(&self) -> &[NotificationStrategy] {
        &self.notification_strategies
    }

    /// Whether a failing head of this kind is skipped instead of ending the scan
    pub fn ignores_errors_for(&self, kind: HeadKind) -> bool {
        self.ignored_head_errors.contains(&kind)
    }

    pub fn requested_branch_names(&self) -> Option<&BTreeSet<String>> {
        self.includes.as_ref().map(|_| &self.requested_branches)
    }

    pub fn requested_tag_names(&self) -> Option<&BTreeSet<String>> {
        self.includes.as_ref().map(|_| &self.requested_tags)
    }

    pub fn requested_pull_request_numbers(&self) -> Option<&BTreeSet<u64>> {
        self.includes.as_ref().map(|_| &self.requested_pull_requests)
    }

    /// Whether the observer asked for this head
    pub fn is_included(&self, head: &Head) -> bool {
        match &self.includes {
            Some(selectors) => selectors.iter().any(|s| s.matches(head)),
            None => true,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Release every scan-scoped cache
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        *locked(&self.memo) = Arc::new(ScanMemo::default());
        tracing::debug!(repository = %self.coordinates, "closed discovery request");
    }

    /// Fails with [`ScoutError::Cancelled`] once cancellation was signalled
    pub fn check_cancelled(&self) -> ScoutResult<()> {
        match &self.cancel {
            Some(cancel) if *cancel.borrow() => Err(ScoutError::Cancelled),
            _ => Ok(()),
        }
    }

    fn memo(&self) -> ScoutResult<Arc<ScanMemo>> {
        if self.is_closed() {
            return Err(ScoutError::RequestClosed("discovery request"));
        }
        Ok(locked(&self.memo).clone())
    }

    /// Repository metadata, fetched once
    pub async fn repository(&self) -> ScoutResult<Option<Repository>> {
        let memo = self.memo()?;
        let repository = memo
            .repository
            .get_or_try_init(|| self.client.repository())
            .await?;
        Ok(repository.clone())
    }

    /// Branches to scan, default branch first
    pub async fn branches(&self) -> ScoutResult<Vec<Branch>> {
        let memo = self.memo()?;
        if !self.want_branches {
            return Ok(Vec::new());
        }
        let branches = memo
            .branches
            .get_or_try_init(|| self.fetch_branches(&memo))
            .await?;
        Ok(branches.clone())
    }

    async fn fetch_branches(&self, memo: &ScanMemo) -> ScoutResult<Vec<Branch>> {
        if self.includes.is_some() {
            if self.requested_branches.is_empty() {
                return Ok(Vec::new());
            }
            if self.requested_branches.len() == 1 {
                if let Some(name) = self.requested_branches.iter().next() {
                    tracing::debug!(branch = %name, "fetching single branch");
                    return Ok(self.client.branch(name).await?.into_iter().collect());
                }
            }
        }

        let mut branches = self.client.branches().await?;
        branches.sort_by(|a, b| a.name.cmp(&b.name));

        let repository = memo
            .repository
            .get_or_try_init(|| self.client.repository())
            .await?;
        if let Some(default) = repository.as_ref().map(|r| r.default_branch.as_str()) {
            if let Some(index) = branches.iter().position(|b| b.name == default) {
                let branch = branches.remove(index);
                branches.insert(0, branch);
            }
        }
        tracing::debug!(repository = %self.coordinates, count = branches.len(), "listed branches");
        Ok(branches)
    }

    /// Tags to scan
    pub async fn tags(&self) -> ScoutResult<Vec<Tag>> {
        let memo = self.memo()?;
        if !self.want_tags {
            return Ok(Vec::new());
        }
        let tags = memo.tags.get_or_try_init(|| self.fetch_tags()).await?;
        Ok(tags.clone())
    }

    async fn fetch_tags(&self) -> ScoutResult<Vec<Tag>> {
        if self.includes.is_some() {
            if self.requested_tags.is_empty() {
                return Ok(Vec::new());
            }
            if self.requested_tags.len() == 1 {
                if let Some(name) = self.requested_tags.iter().next() {
                    tracing::debug!(tag = %name, "fetching single tag");
                    return Ok(self.client.tag(name).await?.into_iter().collect());
                }
            }
        }
        let tags = self.client.tags().await?;
        tracing::debug!(repository = %self.coordinates, count = tags.len(), "listed tags");
        Ok(tags)
    }

    /// Open pull requests to scan
    pub async fn pull_requests(&self) -> ScoutResult<Vec<PullRequest>> {
        let memo = self.memo()?;
        if !self.wants_prs() {
            return Ok(Vec::new());
        }
        let pull_requests = memo
            .pull_requests
            .get_or_try_init(|| self.fetch_pull_requests())
            .await?;
        Ok(pull_requests.clone())
    }

    fn single_pull_request(&self) -> Option<u64> {
        if self.includes.is_none() || self.requested_pull_requests.len() != 1 {
            return None;
        }
        if !self.selected_branches.is_empty() && !self.only_wants_pull_request_branch {
            return None;
        }
        self.requested_pull_requests.iter().next().copied()
    }

    async fn fetch_pull_requests(&self) -> ScoutResult<Vec<PullRequest>> {
        if let Some(number) = self.single_pull_request() {
            tracing::debug!(number, "fetching single pull request");
            return Ok(match self.client.pull_request(number).await? {
                Some(pr) if pr.state == PullRequestState::Open => vec![pr],
                Some(_) => {
                    tracing::debug!(number, "pull request is closed");
                    Vec::new()
                }
                None => Vec::new(),
            });
        }

        let only_requested = self.includes.is_some() && self.selected_branches.is_empty();
        if only_requested && self.requested_pull_requests.is_empty() {
            return Ok(Vec::new());
        }

        let mut pull_requests = self.client.pull_requests(PullRequestState::Open).await?;
        if only_requested {
            pull_requests.retain(|pr| self.requested_pull_requests.contains(&pr.number));
        }
        tracing::debug!(
            repository = %self.coordinates,
            count = pull_requests.len(),
            "listed pull requests"
        );
        Ok(pull_requests)
    }

    /// Whether a pull request comes from the scanned repository or a fork
    pub fn origin_of(&self, pr: &PullRequest) -> PullRequestOrigin {
        match pr.source_owner() {
            Some(owner) if owner.eq_ignore_ascii_case(&self.coordinates.owner) => {
                PullRequestOrigin::Origin
            }
            _ => PullRequestOrigin::Fork,
        }
    }

    /// Whether an open pull request was filed from this origin branch
    pub async fn is_origin_pull_request_branch(&self, branch: &str) -> ScoutResult<bool> {
        Ok(self
            .pull_requests()
            .await?
            .iter()
            .any(|pr| pr.is_from_origin_branch(branch)))
    }

    /// Merge state of a pull request, asked of GitHub at most twice
    pub async fn merge_hash(&self, number: u64) -> ScoutResult<MergeHash> {
        let memo = self.memo()?;
        if let Some(hash) = locked(&memo.merge_hashes).get(&number) {
            return Ok(hash.clone());
        }

        let mut hash = self.query_merge_hash(number).await?;
        if hash == MergeHash::NotComputedYet {
            tracing::debug!(
                number,
                delay_ms = self.merge_poll_delay.as_millis() as u64,
                "mergeability not computed yet, asking again"
            );
            tokio::time::sleep(self.merge_poll_delay).await;
            self.check_cancelled()?;
            hash = self.query_merge_hash(number).await?;
            if hash == MergeHash::NotComputedYet {
                return Err(ScoutError::Protocol(format!(
                    "GitHub did not compute the merge commit of pull request #{} in time",
                    number
                )));
            }
        }

        locked(&memo.merge_hashes).insert(number, hash.clone());
        Ok(hash)
    }

    async fn query_merge_hash(&self, number: u64) -> ScoutResult<MergeHash> {
        let pr = self
            .client
            .pull_request(number)
            .await?
            .ok_or_else(|| ScoutError::NotFound(format!("pull request #{}", number)))?;
        Ok(match (pr.mergeable, pr.merge_commit_sha) {
            (Some(true), Some(sha)) => MergeHash::Mergeable(sha),
            (Some(false), _) => MergeHash::NotMergeable,
            _ => MergeHash::NotComputedYet,
        })
    }

    /// Collaborator logins, fetched once
    pub async fn collaborators(&self) -> ScoutResult<Vec<String>> {
        let memo = self.memo()?;
        let names = memo
            .collaborators
            .get_or_try_init(|| async {
                Ok::<_, ScoutError>(match self.client.collaborators().await? {
                    Some(names) => names,
                    None => {
                        tracing::warn!(
                            repository = %self.coordinates,
                            "collaborators are not visible to these credentials"
                        );
                        Vec::new()
                    }
                })
            })
            .await?;
        Ok(names.clone())
    }

    /// Permission of a user on the repository; the owner is admin
    pub async fn permission(&self, user: &str) -> ScoutResult<Permission> {
        let memo = self.memo()?;
        if user.eq_ignore_ascii_case(&self.coordinates.owner) {
            return Ok(Permission::Admin);
        }
        if let Some(permission) = locked(&memo.permissions).get(user) {
            return Ok(*permission);
        }
        let permission = self
            .client
            .collaborator_permission(user)
            .await?
            .unwrap_or(Permission::None);
        locked(&memo.permissions).insert(user.to_string(), permission);
        Ok(permission)
    }

    /// Committer date of a commit
    pub async fn commit_date(&self, sha: &str) -> ScoutResult<Option<DateTime<Utc>>> {
        self.memo()?;
        self.client.commit_date(sha).await
    }

    /// Whether a prefilter drops the name (a pull request's target branch)
    pub fn is_prefiltered(&self, name: &str) -> bool {
        self.prefilters.iter().any(|p| p.is_excluded(name))
    }

    /// Whether any filter drops the candidate
    pub async fn is_excluded(&self, head: &Head, revision: &Revision) -> ScoutResult<bool> {
        for filter in &self.filters {
            if filter.is_excluded(self, head, revision).await? {
                tracing::debug!(head = %head, filter = ?filter, "head excluded");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Whether an applicable authority trusts the head; memoized per head
    pub async fn is_trusted(&self, head: &Head) -> ScoutResult<bool> {
        let memo = self.memo()?;
        if let Some(trusted) = locked(&memo.trust).get(head) {
            return Ok(*trusted);
        }

        let mut trusted = false;
        for authority in self.authorities.iter().filter(|a| a.is_applicable(head)) {
            if authority.is_trusted(self, head).await? {
                trusted = true;
                break;
            }
        }
        locked(&memo.trust).insert(head.clone(), trusted);
        Ok(trusted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::mocks::{MockRemoteClient, PullRequestBuilder, MOCK_OWNER};
    use crate::discovery::filter::ForkTrust;
    use crate::discovery::traits::{BranchDiscoveryStrategy, SourceTrait};

    fn context() -> DiscoveryContext {
        DiscoveryContext::new().apply(&[
            SourceTrait::BranchDiscovery {
                strategy: BranchDiscoveryStrategy::AllBranches,
            },
            SourceTrait::TagDiscovery,
            SourceTrait::OriginPullRequestDiscovery {
                strategies: BTreeSet::from([CheckoutStrategy::Merge]),
            },
            SourceTrait::ForkPullRequestDiscovery {
                strategies: BTreeSet::from([CheckoutStrategy::Merge]),
                trust: ForkTrust::Permission,
            },
        ])
    }

    fn request(client: &MockRemoteClient, includes: Option<Vec<HeadSelector>>) -> DiscoveryRequest {
        DiscoveryRequest::new(
            Arc::new(client.clone()),
            MockRemoteClient::coordinates(),
            &context(),
            includes,
        )
        .with_merge_poll_delay(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_default_branch_first_then_sorted() {
        let client = MockRemoteClient::new()
            .with_branch("nexistent-branch1", "a")
            .with_branch("zeta", "z")
            .with_branch("master", "m")
            .with_branch("beta", "b");
        let request = request(&client, None);

        let names: Vec<String> = request
            .branches()
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, vec!["master", "beta", "nexistent-branch1", "zeta"]);
    }

    #[tokio::test]
    async fn test_listings_are_memoized() {
        let client = MockRemoteClient::new().with_branch("master", "m");
        let request = request(&client, None);
        request.branches().await.unwrap();
        request.branches().await.unwrap();
        request.repository().await.unwrap();
        assert_eq!(client.calls("branches"), 1);
        assert_eq!(client.calls("repository"), 1);
    }

    #[tokio::test]
    async fn test_single_branch_fetch() {
        let client = MockRemoteClient::new()
            .with_branch("master", "m")
            .with_branch("existent-branch", "e");

        let found = request(&client, Some(vec![HeadSelector::branch("existent-branch")]));
        assert_eq!(found.branches().await.unwrap().len(), 1);

        let missing = request(&client, Some(vec![HeadSelector::branch("non-existent-branch")]));
        assert!(missing.branches().await.unwrap().is_empty());

        assert_eq!(client.calls("branch"), 2);
        assert_eq!(client.calls("branches"), 0);
    }

    #[tokio::test]
    async fn test_single_tag_fetch() {
        let client = MockRemoteClient::new().with_tag("v1.0", "t");
        let request = request(&client, Some(vec![HeadSelector::tag("v1.0")]));
        assert_eq!(request.tags().await.unwrap().len(), 1);
        assert_eq!(client.calls("tags"), 0);
    }

    #[tokio::test]
    async fn test_listing_failure_is_raised() {
        let client = MockRemoteClient::new().failing("branches");
        let request = request(&client, None);
        assert!(matches!(
            request.branches().await,
            Err(ScoutError::Remote { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_single_pull_request_fetch() {
        let client = MockRemoteClient::new()
            .with_pull_request(PullRequestBuilder::origin(1, "feature").build())
            .with_pull_request(PullRequestBuilder::origin(2, "other").build());
        let request = request(&client, Some(vec![HeadSelector::pull_request(2)]));

        let prs = request.pull_requests().await.unwrap();
        assert_eq!(prs.len(), 1);
        assert_eq!(prs[0].number, 2);
        assert_eq!(client.calls("pull_requests"), 0);
    }

    #[tokio::test]
    async fn test_closed_single_pull_request_is_empty() {
        let client = MockRemoteClient::new()
            .with_pull_request(PullRequestBuilder::origin(1, "feature").closed().build());
        let request = request(&client, Some(vec![HeadSelector::pull_request(1)]));
        assert!(request.pull_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pull_request_and_its_target_branch_use_single_fetch() {
        let client = MockRemoteClient::new()
            .with_branch("master", "m")
            .with_pull_request(PullRequestBuilder::origin(1, "feature").build());
        let includes = vec![
            HeadSelector::branch("master"),
            HeadSelector::PullRequest {
                number: 1,
                source_owner: Some(MOCK_OWNER.to_string()),
                source_branch: Some("feature".to_string()),
                target_branch: Some("master".to_string()),
            },
        ];
        let request = request(&client, Some(includes));

        assert_eq!(request.pull_requests().await.unwrap().len(), 1);
        assert_eq!(client.calls("pull_requests"), 0);
        assert_eq!(
            request.requested_branch_names().unwrap(),
            &BTreeSet::from(["feature".to_string(), "master".to_string()])
        );
    }

    #[tokio::test]
    async fn test_unrelated_branch_forces_full_pull_request_listing() {
        let client = MockRemoteClient::new()
            .with_pull_request(PullRequestBuilder::origin(1, "feature").build());
        let request = request(
            &client,
            Some(vec![HeadSelector::branch("develop"), HeadSelector::pull_request(1)]),
        );
        request.pull_requests().await.unwrap();
        assert_eq!(client.calls("pull_requests"), 1);
    }

    #[tokio::test]
    async fn test_closed_request_rejects_calls() {
        let client = MockRemoteClient::new().with_branch("master", "m");
        let request = request(&client, None);
        request.branches().await.unwrap();
        request.close();

        assert!(request.is_closed());
        assert!(matches!(
            request.branches().await,
            Err(ScoutError::RequestClosed(_))
        ));
        assert!(request.pull_requests().await.is_err());
        assert!(request.permission("someone").await.is_err());
    }

    #[tokio::test]
    async fn test_merge_hash_states() {
        let client = MockRemoteClient::new()
            .with_pull_request(PullRequestBuilder::origin(1, "a").build())
            .with_pull_request(PullRequestBuilder::origin(2, "b").build())
            .with_mergeability(2, &[Some(false)]);
        let request = request(&client, None);

        assert_eq!(
            request.merge_hash(1).await.unwrap(),
            MergeHash::Mergeable("merge-1".to_string())
        );
        assert_eq!(request.merge_hash(2).await.unwrap(), MergeHash::NotMergeable);

        // Memoized
        request.merge_hash(1).await.unwrap();
        assert_eq!(client.calls("pull_request"), 2);
    }

    #[tokio::test]
    async fn test_pending_merge_hash_is_asked_once_more() {
        let client = MockRemoteClient::new()
            .with_pull_request(PullRequestBuilder::origin(1, "a").build())
            .with_mergeability(1, &[None, Some(true)]);
        let request = request(&client, None);

        assert_eq!(
            request.merge_hash(1).await.unwrap(),
            MergeHash::Mergeable("merge-1".to_string())
        );
        assert_eq!(client.calls("pull_request"), 2);
    }

    #[tokio::test]
    async fn test_merge_hash_never_computed_fails() {
        let client = MockRemoteClient::new()
            .with_pull_request(PullRequestBuilder::origin(1, "a").build())
            .with_mergeability(1, &[None]);
        let request = request(&client, None);

        assert!(matches!(
            request.merge_hash(1).await,
            Err(ScoutError::Protocol(_))
        ));
        assert_eq!(client.calls("pull_request"), 2);
    }

    #[tokio::test]
    async fn test_permissions_are_memoized_and_owner_is_admin() {
        let client = MockRemoteClient::new().with_permission("alice", Permission::Write);
        let request = request(&client, None);

        assert_eq!(request.permission(MOCK_OWNER).await.unwrap(), Permission::Admin);
        assert_eq!(request.permission("alice").await.unwrap(), Permission::Write);
        assert_eq!(request.permission("alice").await.unwrap(), Permission::Write);
        assert_eq!(request.permission("bob").await.unwrap(), Permission::None);
        assert_eq!(client.calls("collaborator_permission"), 2);
    }

    #[tokio::test]
    async fn test_trust_is_memoized() {
        let client = MockRemoteClient::new().with_permission("alice", Permission::Admin);
        let request = request(&client, None);
        let pr = PullRequestBuilder::fork(7, "alice", "patch").build();
        let head = crate::discovery::scan::pull_request_head(
            &pr,
            PullRequestOrigin::Fork,
            CheckoutStrategy::Merge,
            false,
        );

        assert!(request.is_trusted(&head).await.unwrap());
        assert!(request.is_trusted(&head).await.unwrap());
        assert_eq!(client.calls("collaborator_permission"), 1);
        assert!(request.is_trusted(&Head::branch("master")).await.unwrap());
    }

    #[tokio::test]
    async fn test_cancellation() {
        let (tx, rx) = watch::channel(false);
        let client = MockRemoteClient::new();
        let request = request(&client, None).with_cancellation(rx);
        assert!(request.check_cancelled().is_ok());
        tx.send(true).unwrap();
        assert!(matches!(request.check_cancelled(), Err(ScoutError::Cancelled)));
    }

    #[test]
    fn test_pull_request_strategies_only_for_wanted_kinds() {
        let ctx = DiscoveryContext::new()
            .with_fork_pr_strategies([CheckoutStrategy::Head])
            .want_origin_prs(true)
            .with_origin_pr_strategies([CheckoutStrategy::Merge]);
        let request = DiscoveryRequest::new(
            Arc::new(MockRemoteClient::new()),
            MockRemoteClient::coordinates(),
            &ctx,
            None,
        );
        assert_eq!(request.strategies_for(PullRequestOrigin::Origin).len(), 1);
        assert!(request.strategies_for(PullRequestOrigin::Fork).is_empty());
        assert!(request.requested_branch_names().is_none());
    }
}

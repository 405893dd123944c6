//! Commit status notifications for built heads.

use crate::core::ScoutResult;
use crate::di::traits::RemoteClient;
use crate::discovery::head::{CheckoutStrategy, Head, Revision};
use crate::github::types::{CommitState, CommitStatusRequest};
use serde::{Deserialize, Serialize};

pub const BRANCH_CONTEXT: &str = "ci/ghscout/branch";
pub const PR_MERGE_CONTEXT: &str = "ci/ghscout/pr-merge";
pub const PR_HEAD_CONTEXT: &str = "ci/ghscout/pr-head";

/// Produces zero or one status per build of a head
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationStrategy {
    /// Context label chosen from the head kind
    Default,
    /// Same state and message as `Default`, reported under a fixed label
    CustomContext { label: String },
}

impl NotificationStrategy {
    /// Status this strategy reports for `head`, if any
    pub fn notification(
        &self,
        head: &Head,
        build: Option<&BuildOutcome>,
        job_url: Option<&str>,
    ) -> Option<StatusPayload> {
        let context_label = match self {
            NotificationStrategy::Default => default_context(head).to_string(),
            NotificationStrategy::CustomContext { label } => label.clone(),
        };
        Some(StatusPayload {
            state: state_for(build),
            description: message_for(build).to_string(),
            url: build
                .and_then(|b| b.url.clone())
                .or_else(|| job_url.map(str::to_string)),
            context_label,
            ignore_error: build.map(|b| b.result.is_none()).unwrap_or(true),
        })
    }
}

/// Final result of a finished build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildResult {
    Success,
    Unstable,
    Failure,
    Aborted,
    NotBuilt,
}

/// A build of a head; `result` is `None` while it runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutcome {
    pub url: Option<String>,
    pub result: Option<BuildResult>,
}

/// One commit status to publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub state: CommitState,
    pub description: String,
    pub url: Option<String>,
    pub context_label: String,
    /// Publishing failures are logged instead of returned
    pub ignore_error: bool,
}

impl StatusPayload {
    fn to_request(&self) -> CommitStatusRequest {
        CommitStatusRequest {
            state: self.state,
            target_url: self.url.clone(),
            description: self.description.clone(),
            context: self.context_label.clone(),
        }
    }
}

fn default_context(head: &Head) -> &'static str {
    match head.as_pull_request() {
        Some(pr) if pr.strategy == CheckoutStrategy::Merge => PR_MERGE_CONTEXT,
        Some(_) => PR_HEAD_CONTEXT,
        None => BRANCH_CONTEXT,
    }
}

fn state_for(build: Option<&BuildOutcome>) -> CommitState {
    match build.and_then(|b| b.result) {
        Some(BuildResult::Success) => CommitState::Success,
        Some(BuildResult::Unstable) => CommitState::Failure,
        Some(_) => CommitState::Error,
        None => CommitState::Pending,
    }
}

fn message_for(build: Option<&BuildOutcome>) -> &'static str {
    let Some(build) = build else {
        return "This commit is scheduled to be built";
    };
    match build.result {
        Some(BuildResult::Success) => "This commit looks good",
        Some(BuildResult::Unstable) => "This commit is unstable",
        Some(BuildResult::Failure) => "This commit has test failures",
        Some(BuildResult::Aborted) => "The build of this commit was aborted",
        Some(BuildResult::NotBuilt) => "Something is wrong with the build of this commit",
        None => "This commit is being built",
    }
}

/// Statuses the strategies produce, one per context label
///
/// When two strategies report the same label the later one wins.
pub fn compute(
    strategies: &[NotificationStrategy],
    head: &Head,
    build: Option<&BuildOutcome>,
    job_url: Option<&str>,
) -> Vec<StatusPayload> {
    let mut payloads: Vec<StatusPayload> = Vec::new();
    for payload in strategies
        .iter()
        .filter_map(|s| s.notification(head, build, job_url))
    {
        match payloads
            .iter_mut()
            .find(|p| p.context_label == payload.context_label)
        {
            Some(existing) => *existing = payload,
            None => payloads.push(payload),
        }
    }
    payloads
}

/// Publish statuses against the commit the revision was built from
///
/// Returns how many statuses were accepted.
pub async fn publish(
    client: &dyn RemoteClient,
    revision: &Revision,
    payloads: &[StatusPayload],
) -> ScoutResult<usize> {
    let sha = revision.commit_sha();
    let mut published = 0;
    for payload in payloads {
        match client.create_commit_status(sha, &payload.to_request()).await {
            Ok(()) => {
                tracing::debug!(sha, context = %payload.context_label, state = %payload.state, "published commit status");
                published += 1;
            }
            Err(e) if payload.ignore_error => {
                tracing::warn!(sha, context = %payload.context_label, error = %e, "could not publish commit status");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(published)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::mocks::MockRemoteClient;
    use crate::discovery::head::{MergeHash, PullRequestHead, PullRequestOrigin};

    fn pr_head(strategy: CheckoutStrategy) -> Head {
        Head::PullRequest(PullRequestHead {
            number: 3,
            name: "PR-3".to_string(),
            source_owner: "octo".to_string(),
            source_repository: "repo".to_string(),
            source_branch: "feature".to_string(),
            target_branch: "master".to_string(),
            origin: PullRequestOrigin::Origin,
            strategy,
            title: "Change".to_string(),
            author: None,
            labels: Vec::new(),
            draft: false,
        })
    }

    fn finished(result: BuildResult) -> BuildOutcome {
        BuildOutcome {
            url: Some("https://ci.example/job/1".to_string()),
            result: Some(result),
        }
    }

    #[test]
    fn test_default_context_by_head_kind() {
        let strategies = [NotificationStrategy::Default];
        let branch = compute(&strategies, &Head::branch("master"), None, None);
        assert_eq!(branch[0].context_label, BRANCH_CONTEXT);

        let merge = compute(&strategies, &pr_head(CheckoutStrategy::Merge), None, None);
        assert_eq!(merge[0].context_label, PR_MERGE_CONTEXT);

        let head = compute(&strategies, &pr_head(CheckoutStrategy::Head), None, None);
        assert_eq!(head[0].context_label, PR_HEAD_CONTEXT);
    }

    #[test]
    fn test_states_and_messages() {
        let head = Head::branch("master");
        let strategies = [NotificationStrategy::Default];

        let queued = &compute(&strategies, &head, None, Some("https://ci.example/job"))[0];
        assert_eq!(queued.state, CommitState::Pending);
        assert_eq!(queued.description, "This commit is scheduled to be built");
        assert_eq!(queued.url.as_deref(), Some("https://ci.example/job"));
        assert!(queued.ignore_error);

        let running = &compute(&strategies, &head, Some(&BuildOutcome::default()), None)[0];
        assert_eq!(running.state, CommitState::Pending);
        assert_eq!(running.description, "This commit is being built");
        assert!(running.ignore_error);

        let cases = [
            (BuildResult::Success, CommitState::Success, "This commit looks good"),
            (BuildResult::Unstable, CommitState::Failure, "This commit is unstable"),
            (BuildResult::Failure, CommitState::Error, "This commit has test failures"),
            (BuildResult::Aborted, CommitState::Error, "The build of this commit was aborted"),
            (
                BuildResult::NotBuilt,
                CommitState::Error,
                "Something is wrong with the build of this commit",
            ),
        ];
        for (result, state, message) in cases {
            let payload = &compute(&strategies, &head, Some(&finished(result)), None)[0];
            assert_eq!(payload.state, state);
            assert_eq!(payload.description, message);
            assert!(!payload.ignore_error);
        }
    }

    #[test]
    fn test_duplicate_labels_collapse() {
        let strategies = [
            NotificationStrategy::CustomContext {
                label: BRANCH_CONTEXT.to_string(),
            },
            NotificationStrategy::CustomContext {
                label: "other".to_string(),
            },
            NotificationStrategy::Default,
        ];
        let payloads = compute(&strategies, &Head::branch("master"), None, None);
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0].context_label, BRANCH_CONTEXT);
        assert_eq!(payloads[1].context_label, "other");
    }

    #[test]
    fn test_no_strategies_no_payloads() {
        assert!(compute(&[], &Head::branch("master"), None, None).is_empty());
    }

    #[tokio::test]
    async fn test_publish_uses_pull_request_head_sha() {
        let client = MockRemoteClient::new();
        let revision = Revision::PullRequest {
            base_sha: "base".to_string(),
            head_sha: "head".to_string(),
            merge: MergeHash::Mergeable("merge".to_string()),
        };
        let payloads = compute(
            &[NotificationStrategy::Default],
            &pr_head(CheckoutStrategy::Merge),
            Some(&finished(BuildResult::Success)),
            None,
        );

        assert_eq!(publish(&client, &revision, &payloads).await.unwrap(), 1);
        let statuses = client.statuses();
        assert_eq!(statuses[0].0, "head");
        assert_eq!(statuses[0].1.state, CommitState::Success);
        assert_eq!(statuses[0].1.context, PR_MERGE_CONTEXT);
    }

    #[tokio::test]
    async fn test_publish_errors_respect_ignore_error() {
        let client = MockRemoteClient::new().failing("create_commit_status");
        let revision = Revision::Branch {
            sha: "abc".to_string(),
        };
        let head = Head::branch("master");

        let pending = compute(&[NotificationStrategy::Default], &head, None, None);
        assert_eq!(publish(&client, &revision, &pending).await.unwrap(), 0);

        let done = compute(
            &[NotificationStrategy::Default],
            &head,
            Some(&finished(BuildResult::Failure)),
            None,
        );
        assert!(publish(&client, &revision, &done).await.is_err());
    }
}

//! Drives a discovery request and reports accepted heads to an observer.

use crate::core::{ScoutError, ScoutResult};
use crate::discovery::filter::format_millis;
use crate::discovery::head::{
    pull_request_head_name, CheckoutStrategy, Head, HeadKind, MergeHash, PullRequestHead,
    PullRequestOrigin, Revision, TagHead,
};
use crate::discovery::observer::{HeadObserver, Observation};
use crate::discovery::request::DiscoveryRequest;
use crate::github::types::{PullRequest, Tag};
use serde::Serialize;

/// Counts from one scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub pull_requests: usize,
    pub branches: usize,
    pub tags: usize,
    /// Candidates dropped by a prefilter or filter
    pub excluded: usize,
    /// Observed heads no authority trusted
    pub untrusted: usize,
    /// Candidates dropped after an error their kind is allowed to ignore
    pub skipped: usize,
}

impl ScanSummary {
    pub fn observed(&self) -> usize {
        self.pull_requests + self.branches + self.tags
    }
}

/// Head for one checkout strategy of a pull request
pub fn pull_request_head(
    pr: &PullRequest,
    origin: PullRequestOrigin,
    strategy: CheckoutStrategy,
    multiple_strategies: bool,
) -> Head {
    Head::PullRequest(PullRequestHead {
        number: pr.number,
        name: pull_request_head_name(pr.number, strategy, multiple_strategies),
        source_owner: pr.source_owner().unwrap_or_default().to_string(),
        source_repository: pr.source_repository().unwrap_or_default().to_string(),
        source_branch: pr.head.git_ref.clone(),
        target_branch: pr.base.git_ref.clone(),
        origin,
        strategy,
        title: pr.title.clone(),
        author: pr.user.as_ref().map(|u| u.login.clone()),
        labels: pr.label_names(),
        draft: pr.draft,
    })
}

/// Scan pull requests, then branches, then tags
///
/// Stops with [`ScoutError::Cancelled`](crate::core::ScoutError::Cancelled)
/// when cancellation is signalled between candidates, and early (without
/// error) once the observer stops observing.
pub async fn run(
    request: &DiscoveryRequest,
    observer: &mut dyn HeadObserver,
) -> ScoutResult<ScanSummary> {
    let mut summary = ScanSummary::default();
    tracing::info!(repository = %request.coordinates(), "starting scan");

    let finished = scan_pull_requests(request, observer, &mut summary).await?
        && scan_branches(request, observer, &mut summary).await?
        && scan_tags(request, observer, &mut summary).await?;
    if !finished {
        tracing::debug!("observer stopped the scan early");
    }

    tracing::info!(
        repository = %request.coordinates(),
        pull_requests = summary.pull_requests,
        branches = summary.branches,
        tags = summary.tags,
        excluded = summary.excluded,
        untrusted = summary.untrusted,
        skipped = summary.skipped,
        "scan finished"
    );
    Ok(summary)
}

/// Filter and classify one candidate; `None` when it is not wanted
async fn admit(
    request: &DiscoveryRequest,
    head: &Head,
    revision: &Revision,
    summary: &mut ScanSummary,
) -> ScoutResult<Option<bool>> {
    if !request.is_included(head) {
        return Ok(None);
    }
    if request.is_excluded(head, revision).await? {
        summary.excluded += 1;
        return Ok(None);
    }
    let trusted = request.is_trusted(head).await?;
    if !trusted {
        summary.untrusted += 1;
    }
    Ok(Some(trusted))
}

/// Swallow a per-head failure when the request ignores errors for `kind`
fn skip_failed(
    request: &DiscoveryRequest,
    kind: HeadKind,
    head: &str,
    err: ScoutError,
    summary: &mut ScanSummary,
) -> ScoutResult<()> {
    if matches!(err, ScoutError::Cancelled | ScoutError::RequestClosed(_))
        || !request.ignores_errors_for(kind)
    {
        return Err(err);
    }
    tracing::warn!(%kind, head, error = %err, "skipping head after error");
    summary.skipped += 1;
    Ok(())
}

/// Admit one pull request head and resolve its merge commit when needed
async fn pull_request_candidate(
    request: &DiscoveryRequest,
    pr: &PullRequest,
    head: &Head,
    strategy: CheckoutStrategy,
    summary: &mut ScanSummary,
) -> ScoutResult<Option<(Revision, bool)>> {
    let mut revision = Revision::PullRequest {
        base_sha: pr.base.sha.clone(),
        head_sha: pr.head.sha.clone(),
        merge: MergeHash::Unresolved,
    };
    let Some(trusted) = admit(request, head, &revision, summary).await? else {
        return Ok(None);
    };
    if strategy == CheckoutStrategy::Merge {
        if let Revision::PullRequest { merge, .. } = &mut revision {
            *merge = request.merge_hash(pr.number).await?;
        }
    }
    Ok(Some((revision, trusted)))
}

/// Resolve the tagged commit's timestamp and admit the tag head
async fn tag_candidate(
    request: &DiscoveryRequest,
    tag: &Tag,
    summary: &mut ScanSummary,
) -> ScoutResult<Option<(Head, Revision, bool)>> {
    let timestamp = request
        .commit_date(&tag.commit.sha)
        .await?
        .map(|date| date.timestamp_millis())
        .unwrap_or(0);
    let head = Head::Tag(TagHead {
        name: tag.name.clone(),
        timestamp,
    });
    let revision = Revision::Tag {
        sha: tag.commit.sha.clone(),
    };
    Ok(admit(request, &head, &revision, summary)
        .await?
        .map(|trusted| (head, revision, trusted)))
}

async fn scan_pull_requests(
    request: &DiscoveryRequest,
    observer: &mut dyn HeadObserver,
    summary: &mut ScanSummary,
) -> ScoutResult<bool> {
    if !request.wants_prs() {
        return Ok(true);
    }
    for pr in request.pull_requests().await? {
        request.check_cancelled()?;
        if !observer.is_observing() {
            return Ok(false);
        }

        let origin = request.origin_of(&pr);
        let strategies = request.strategies_for(origin);
        if strategies.is_empty() {
            tracing::debug!(number = pr.number, ?origin, "not discovering pull requests of this origin");
            continue;
        }
        if request.is_prefiltered(&pr.base.git_ref) {
            tracing::debug!(number = pr.number, target = %pr.base.git_ref, "pull request target prefiltered");
            summary.excluded += 1;
            continue;
        }

        let multiple = strategies.len() > 1;
        for strategy in strategies.iter().copied() {
            let head = pull_request_head(&pr, origin, strategy, multiple);
            let (revision, trusted) =
                match pull_request_candidate(request, &pr, &head, strategy, summary).await {
                    Ok(Some(candidate)) => candidate,
                    Ok(None) => continue,
                    Err(e) => {
                        skip_failed(request, HeadKind::PullRequest, &head.to_string(), e, summary)?;
                        continue;
                    }
                };
            tracing::debug!(head = %head, revision = %revision, trusted, "observed pull request");
            observer
                .observe(Observation {
                    head,
                    revision,
                    trusted,
                })
                .await?;
            summary.pull_requests += 1;
            if !observer.is_observing() {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

async fn scan_branches(
    request: &DiscoveryRequest,
    observer: &mut dyn HeadObserver,
    summary: &mut ScanSummary,
) -> ScoutResult<bool> {
    if !request.wants_branches() {
        return Ok(true);
    }
    for branch in request.branches().await? {
        request.check_cancelled()?;
        if !observer.is_observing() {
            return Ok(false);
        }
        if request.is_prefiltered(&branch.name) {
            summary.excluded += 1;
            continue;
        }

        let head = Head::branch(&branch.name);
        let revision = Revision::Branch {
            sha: branch.commit.sha,
        };
        let trusted = match admit(request, &head, &revision, summary).await {
            Ok(Some(trusted)) => trusted,
            Ok(None) => continue,
            Err(e) => {
                skip_failed(request, HeadKind::Branch, &branch.name, e, summary)?;
                continue;
            }
        };
        tracing::debug!(head = %head, revision = %revision, "observed branch");
        observer
            .observe(Observation {
                head,
                revision,
                trusted,
            })
            .await?;
        summary.branches += 1;
    }
    Ok(observer.is_observing())
}

async fn scan_tags(
    request: &DiscoveryRequest,
    observer: &mut dyn HeadObserver,
    summary: &mut ScanSummary,
) -> ScoutResult<bool> {
    if !request.wants_tags() {
        return Ok(true);
    }
    for tag in request.tags().await? {
        request.check_cancelled()?;
        if !observer.is_observing() {
            return Ok(false);
        }
        if request.is_prefiltered(&tag.name) {
            summary.excluded += 1;
            continue;
        }
        // Skip the timestamp lookup for tags nobody asked for
        if !request.is_included(&Head::tag(&tag.name, 0)) {
            continue;
        }

        let (head, revision, trusted) = match tag_candidate(request, &tag, summary).await {
            Ok(Some(candidate)) => candidate,
            Ok(None) => continue,
            Err(e) => {
                skip_failed(request, HeadKind::Tag, &tag.name, e, summary)?;
                continue;
            }
        };
        let timestamp = match &head {
            Head::Tag(tag) => tag.timestamp,
            _ => 0,
        };
        tracing::debug!(head = %head, tagged = %format_millis(timestamp), "observed tag");
        observer
            .observe(Observation {
                head,
                revision,
                trusted,
            })
            .await?;
        summary.tags += 1;
    }
    Ok(observer.is_observing())
}

//! Discovered heads (branches, tags, pull requests) and their revisions.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// How a pull request is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStrategy {
    /// The result of merging the pull request into its target
    Merge,
    /// The pull request head as-is
    Head,
}

impl CheckoutStrategy {
    pub fn suffix(&self) -> &'static str {
        match self {
            CheckoutStrategy::Merge => "merge",
            CheckoutStrategy::Head => "head",
        }
    }
}

/// Where a pull request comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestOrigin {
    /// A branch of the scanned repository
    Origin,
    /// A branch of some other repository
    Fork,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadKind {
    Branch,
    Tag,
    PullRequest,
}

impl std::fmt::Display for HeadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeadKind::Branch => write!(f, "branch"),
            HeadKind::Tag => write!(f, "tag"),
            HeadKind::PullRequest => write!(f, "pull request"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagHead {
    pub name: String,
    /// Epoch millis of the tagged commit, 0 when unknown
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestHead {
    pub number: u64,
    pub name: String,
    pub source_owner: String,
    pub source_repository: String,
    pub source_branch: String,
    pub target_branch: String,
    pub origin: PullRequestOrigin,
    pub strategy: CheckoutStrategy,
    pub title: String,
    pub author: Option<String>,
    pub labels: Vec<String>,
    pub draft: bool,
}

/// A candidate for building
///
/// Equality and hashing use the kind and name only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Head {
    Branch { name: String },
    Tag(TagHead),
    PullRequest(PullRequestHead),
}

impl Head {
    pub fn branch(name: impl Into<String>) -> Self {
        Head::Branch { name: name.into() }
    }

    pub fn tag(name: impl Into<String>, timestamp: i64) -> Self {
        Head::Tag(TagHead {
            name: name.into(),
            timestamp,
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Head::Branch { name } => name,
            Head::Tag(tag) => &tag.name,
            Head::PullRequest(pr) => &pr.name,
        }
    }

    pub fn kind(&self) -> HeadKind {
        match self {
            Head::Branch { .. } => HeadKind::Branch,
            Head::Tag(_) => HeadKind::Tag,
            Head::PullRequest(_) => HeadKind::PullRequest,
        }
    }

    pub fn as_pull_request(&self) -> Option<&PullRequestHead> {
        match self {
            Head::PullRequest(pr) => Some(pr),
            _ => None,
        }
    }

    /// Whether the head lives in the scanned repository
    pub fn is_origin(&self) -> bool {
        match self {
            Head::PullRequest(pr) => pr.origin == PullRequestOrigin::Origin,
            _ => true,
        }
    }
}

impl PartialEq for Head {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind() && self.name() == other.name()
    }
}

impl Eq for Head {}

impl Hash for Head {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind().hash(state);
        self.name().hash(state);
    }
}

impl std::fmt::Display for Head {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind(), self.name())
    }
}

/// Name of a pull request head: `PR-<n>`, suffixed with the strategy when
/// more than one strategy is built for that origin
pub fn pull_request_head_name(number: u64, strategy: CheckoutStrategy, multiple: bool) -> String {
    if multiple {
        format!("PR-{}-{}", number, strategy.suffix())
    } else {
        format!("PR-{}", number)
    }
}

/// Merge commit state of a pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "sha", rename_all = "snake_case")]
pub enum MergeHash {
    /// Not asked for yet
    Unresolved,
    /// GitHub has not computed the merge yet
    NotComputedYet,
    Mergeable(String),
    /// GitHub computed the merge and it conflicts
    NotMergeable,
}

/// What a head points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Revision {
    Branch {
        sha: String,
    },
    Tag {
        sha: String,
    },
    PullRequest {
        base_sha: String,
        head_sha: String,
        merge: MergeHash,
    },
}

impl Revision {
    /// Commit a build of this revision reports against
    pub fn commit_sha(&self) -> &str {
        match self {
            Revision::Branch { sha } | Revision::Tag { sha } => sha,
            Revision::PullRequest { head_sha, .. } => head_sha,
        }
    }

    /// Single SHA for branches and tags, `None` for pull requests
    pub fn plain_sha(&self) -> Option<&str> {
        match self {
            Revision::Branch { sha } | Revision::Tag { sha } => Some(sha),
            Revision::PullRequest { .. } => None,
        }
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Revision::Branch { sha } | Revision::Tag { sha } => write!(f, "{}", sha),
            Revision::PullRequest {
                base_sha,
                head_sha,
                merge,
            } => match merge {
                MergeHash::Mergeable(sha) => write!(f, "{}+{} ({})", head_sha, base_sha, sha),
                MergeHash::NotMergeable => write!(f, "{}+{} (not mergeable)", head_sha, base_sha),
                _ => write!(f, "{}+{}", head_sha, base_sha),
            },
        }
    }
}

//! Prefilters, filters and authorities applied to discovered heads.

use crate::core::ScoutResult;
use crate::discovery::head::{Head, HeadKind, Revision};
use crate::discovery::request::DiscoveryRequest;
use crate::github::types::Permission;
use chrono::{TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Which fork pull requests are trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForkTrust {
    Nobody,
    /// Forks owned by a repository collaborator
    #[default]
    Contributors,
    /// Forks owned by someone with admin or write permission
    Permission,
    Everyone,
}

/// Anchored regular expression over head names
#[derive(Debug, Clone)]
pub struct HeadRegex(Regex);

impl HeadRegex {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(&format!("^(?:{})$", pattern)).map(Self)
    }

    /// The pattern as configured
    pub fn as_str(&self) -> &str {
        let anchored = self.0.as_str();
        &anchored[4..anchored.len() - 2]
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.0.is_match(name)
    }
}

impl PartialEq for HeadRegex {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for HeadRegex {}

impl TryFrom<String> for HeadRegex {
    type Error = regex::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<HeadRegex> for String {
    fn from(value: HeadRegex) -> Self {
        value.as_str().to_string()
    }
}

impl Serialize for HeadRegex {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for HeadRegex {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pattern = String::deserialize(deserializer)?;
        HeadRegex::new(&pattern).map_err(serde::de::Error::custom)
    }
}

/// Space separated wildcard patterns, e.g. `"master release-*"`
///
/// `*` matches any run of characters, `?` exactly one; a name matches when any
/// pattern matches all of it.
pub(crate) fn wildcard_match(patterns: &str, name: &str) -> bool {
    patterns
        .split_whitespace()
        .any(|pattern| glob_match(pattern, name))
}

fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();

    glob_match_recursive(&pattern_chars, &text_chars, 0, 0)
}

fn glob_match_recursive(pattern: &[char], text: &[char], p_idx: usize, t_idx: usize) -> bool {
    if p_idx == pattern.len() {
        return t_idx == text.len();
    }

    match pattern[p_idx] {
        '*' => {
            glob_match_recursive(pattern, text, p_idx + 1, t_idx)
                || (t_idx < text.len() && glob_match_recursive(pattern, text, p_idx, t_idx + 1))
        }
        '?' => t_idx < text.len() && glob_match_recursive(pattern, text, p_idx + 1, t_idx + 1),
        c => {
            t_idx < text.len()
                && text[t_idx] == c
                && glob_match_recursive(pattern, text, p_idx + 1, t_idx + 1)
        }
    }
}

/// Cheap exclusion from listing data alone
///
/// Pull requests are matched on the branch they target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prefilter {
    Wildcard { includes: String, excludes: String },
    Regex(HeadRegex),
}

impl Prefilter {
    /// `name` is the head name, or the target branch of a pull request
    pub fn is_excluded(&self, name: &str) -> bool {
        match self {
            Prefilter::Wildcard { includes, excludes } => {
                !wildcard_match(includes, name) || wildcard_match(excludes, name)
            }
            Prefilter::Regex(regex) => !regex.is_match(name),
        }
    }
}

/// Exclusion once the full candidate is known
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadFilter {
    /// Drop origin branches that are also the source of an open pull request
    ExcludeOriginPullRequestBranches,
    /// Keep only origin branches that are the source of an open pull request
    OnlyOriginPullRequestBranches,
    /// Pull requests by label; an exclude match always wins
    PullRequestLabels { includes: String, excludes: String },
    IgnoreDrafts,
    /// Branches and tags whose head commit is older than this many days
    HeadAge { max_days_old: i64 },
}

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

impl HeadFilter {
    pub async fn is_excluded(
        &self,
        request: &DiscoveryRequest,
        head: &Head,
        revision: &Revision,
    ) -> ScoutResult<bool> {
        match self {
            HeadFilter::ExcludeOriginPullRequestBranches => match head {
                Head::Branch { name } => request.is_origin_pull_request_branch(name).await,
                _ => Ok(false),
            },
            HeadFilter::OnlyOriginPullRequestBranches => match head {
                Head::Branch { name } => Ok(!request.is_origin_pull_request_branch(name).await?),
                _ => Ok(false),
            },
            HeadFilter::PullRequestLabels { includes, excludes } => Ok(head
                .as_pull_request()
                .map(|pr| labels_excluded(&pr.labels, includes, excludes))
                .unwrap_or(false)),
            HeadFilter::IgnoreDrafts => Ok(head.as_pull_request().map(|pr| pr.draft).unwrap_or(false)),
            HeadFilter::HeadAge { max_days_old } => {
                if *max_days_old <= 0 {
                    return Ok(false);
                }
                let last_modified = match head {
                    Head::Branch { .. } => branch_last_modified(request, revision).await,
                    Head::Tag(tag) => tag.timestamp,
                    Head::PullRequest(_) => return Ok(false),
                };
                if last_modified == 0 {
                    return Ok(false);
                }
                let days_old = (Utc::now().timestamp_millis() - last_modified) / MILLIS_PER_DAY;
                if days_old > *max_days_old {
                    tracing::debug!(head = %head, days_old, max_days_old, "head is too old");
                    return Ok(true);
                }
                Ok(false)
            }
        }
    }
}

async fn branch_last_modified(request: &DiscoveryRequest, revision: &Revision) -> i64 {
    let Some(sha) = revision.plain_sha() else {
        return 0;
    };
    match request.commit_date(sha).await {
        Ok(Some(date)) => date.timestamp_millis(),
        Ok(None) => 0,
        Err(e) => {
            tracing::warn!(sha, error = %e, "could not read commit date, keeping head");
            0
        }
    }
}

/// Label rule: unlabeled pull requests only pass an `*` include
fn labels_excluded(labels: &[String], includes: &str, excludes: &str) -> bool {
    if labels.iter().any(|label| wildcard_match(excludes, label)) {
        return true;
    }
    if labels.is_empty() {
        return includes.trim() != "*";
    }
    !labels.iter().any(|label| wildcard_match(includes, label))
}

/// Classifies accepted heads as trusted or not
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    Branch,
    Tag,
    OriginPullRequest,
    ForkPullRequest(ForkTrust),
    /// Any head living in the scanned repository
    OriginHeads,
}

impl Authority {
    pub fn is_applicable(&self, head: &Head) -> bool {
        match self {
            Authority::Branch => head.kind() == HeadKind::Branch,
            Authority::Tag => head.kind() == HeadKind::Tag,
            Authority::OriginPullRequest => head.kind() == HeadKind::PullRequest && head.is_origin(),
            Authority::ForkPullRequest(_) => {
                head.kind() == HeadKind::PullRequest && !head.is_origin()
            }
            Authority::OriginHeads => head.is_origin(),
        }
    }

    pub async fn is_trusted(&self, request: &DiscoveryRequest, head: &Head) -> ScoutResult<bool> {
        let trust = match self {
            Authority::ForkPullRequest(trust) => *trust,
            _ => return Ok(true),
        };
        let Some(pr) = head.as_pull_request() else {
            return Ok(false);
        };
        match trust {
            ForkTrust::Nobody => Ok(false),
            ForkTrust::Everyone => Ok(true),
            ForkTrust::Contributors => Ok(request
                .collaborators()
                .await?
                .iter()
                .any(|login| login.eq_ignore_ascii_case(&pr.source_owner))),
            ForkTrust::Permission => Ok(matches!(
                request.permission(&pr.source_owner).await?,
                Permission::Admin | Permission::Write
            )),
        }
    }
}

/// Millis since the epoch to a readable date, for logs
pub(crate) fn format_millis(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|d| d.to_rfc3339())
        .unwrap_or_else(|| millis.to_string())
}

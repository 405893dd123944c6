//! GitHub API type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Owner/name pair identifying a repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryCoordinates {
    pub owner: String,
    pub name: String,
}

impl RepositoryCoordinates {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl std::fmt::Display for RepositoryCoordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A user or organisation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub login: String,
}

/// GitHub repository information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    pub owner: Account,
    pub default_branch: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub clone_url: Option<String>,
    #[serde(default)]
    pub ssh_url: Option<String>,
}

/// Commit pointer as embedded in branch and tag listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRef {
    pub sha: String,
}

/// Branch as returned by `/repos/{owner}/{repo}/branches`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub commit: CommitRef,
}

/// Lightweight tag as returned by `/repos/{owner}/{repo}/tags`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub commit: CommitRef,
}

/// `/git/ref/...` answer
#[derive(Debug, Clone, Deserialize)]
pub struct GitReference {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub object: GitObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitObject {
    pub sha: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Annotated tag object (`/git/tags/{sha}`)
#[derive(Debug, Clone, Deserialize)]
pub struct AnnotatedTag {
    pub object: GitObject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullRequestState {
    Open,
    Closed,
    All,
}

impl std::fmt::Display for PullRequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PullRequestState::Open => write!(f, "open"),
            PullRequestState::Closed => write!(f, "closed"),
            PullRequestState::All => write!(f, "all"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}

/// Repository reference embedded in a pull request's head/base
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRepository {
    pub name: String,
    pub full_name: String,
    pub owner: Account,
}

/// Head or base of a pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub sha: String,
    #[serde(default)]
    pub user: Option<Account>,
    /// `None` when the fork was deleted
    #[serde(default)]
    pub repo: Option<PullRequestRepository>,
}

/// GitHub pull request information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub state: PullRequestState,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub user: Option<Account>,
    #[serde(default)]
    pub labels: Vec<Label>,
    pub head: PullRequestRef,
    pub base: PullRequestRef,
    /// Only present on the single pull request endpoint; `None` while
    /// GitHub is still computing it
    #[serde(default)]
    pub mergeable: Option<bool>,
    #[serde(default)]
    pub merge_commit_sha: Option<String>,
}

impl PullRequest {
    /// Login of whoever owns the head branch
    pub fn source_owner(&self) -> Option<&str> {
        self.head
            .repo
            .as_ref()
            .map(|r| r.owner.login.as_str())
            .or_else(|| self.head.user.as_ref().map(|u| u.login.as_str()))
    }

    pub fn source_repository(&self) -> Option<&str> {
        self.head.repo.as_ref().map(|r| r.name.as_str())
    }

    pub fn label_names(&self) -> Vec<String> {
        self.labels.iter().map(|l| l.name.clone()).collect()
    }

    /// Whether this pull request was filed from a branch of the same repository
    pub fn is_from_origin_branch(&self, branch: &str) -> bool {
        match (&self.head.repo, &self.base.repo) {
            (Some(head), Some(base)) => {
                base.full_name.eq_ignore_ascii_case(&head.full_name) && self.head.git_ref == branch
            }
            _ => false,
        }
    }
}

/// Kind of an entry returned by the contents API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    File,
    Dir,
    Symlink,
    Submodule,
    #[serde(other)]
    Unknown,
}

/// Entry of the contents API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

/// The contents API answers with a list for directories and an object otherwise
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Contents {
    Directory(Vec<ContentEntry>),
    File(ContentEntry),
}

/// `/repos/{owner}/{repo}/commits/{sha}`
#[derive(Debug, Clone, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub commit: CommitDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitDetail {
    #[serde(default)]
    pub committer: Option<CommitSignature>,
    #[serde(default)]
    pub author: Option<CommitSignature>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitSignature {
    pub date: DateTime<Utc>,
}

impl Commit {
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.commit
            .committer
            .as_ref()
            .or(self.commit.author.as_ref())
            .map(|s| s.date)
    }
}

/// Repository permission level of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Admin,
    Maintain,
    Write,
    Triage,
    Read,
    #[serde(other)]
    None,
}

impl Permission {
    /// Admin or write access
    pub fn can_push(&self) -> bool {
        matches!(self, Permission::Admin | Permission::Maintain | Permission::Write)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollaboratorPermission {
    pub permission: Permission,
}

/// Commit status state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitState {
    Pending,
    Success,
    Failure,
    Error,
}

impl std::fmt::Display for CommitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitState::Pending => write!(f, "pending"),
            CommitState::Success => write!(f, "success"),
            CommitState::Failure => write!(f, "failure"),
            CommitState::Error => write!(f, "error"),
        }
    }
}

/// Body of `POST /repos/{owner}/{repo}/statuses/{sha}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStatusRequest {
    pub state: CommitState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    pub description: String,
    pub context: String,
}

/// GitHub App installation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installation {
    pub id: u64,
    pub account: Account,
}

/// `POST /app/installations/{id}/access_tokens`
#[derive(Debug, Clone, Deserialize)]
pub struct InstallationAccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pull_request(head_repo: Option<&str>, base_repo: &str, head_ref: &str) -> PullRequest {
        let repo = |full: &str| {
            let (owner, name) = full.split_once('/').unwrap();
            json!({"name": name, "full_name": full, "owner": {"login": owner}})
        };
        serde_json::from_value(json!({
            "number": 7,
            "state": "open",
            "title": "Fix",
            "head": {"ref": head_ref, "sha": "h1", "repo": head_repo.map(repo)},
            "base": {"ref": "main", "sha": "b1", "repo": repo(base_repo)},
        }))
        .unwrap()
    }

    #[test]
    fn test_origin_branch_match_is_case_insensitive_on_repo() {
        let pr = pull_request(Some("Octo/Repo"), "octo/repo", "feature");
        assert!(pr.is_from_origin_branch("feature"));
        assert!(!pr.is_from_origin_branch("other"));
    }

    #[test]
    fn test_deleted_fork_is_not_origin() {
        let pr = pull_request(None, "octo/repo", "feature");
        assert!(!pr.is_from_origin_branch("feature"));
        assert_eq!(pr.source_owner(), None);
    }

    #[test]
    fn test_contents_untagged() {
        let dir: Contents = serde_json::from_value(json!([
            {"name": "a.txt", "path": "a.txt", "type": "file"},
            {"name": "lib", "path": "lib", "type": "dir"}
        ]))
        .unwrap();
        assert!(matches!(dir, Contents::Directory(ref v) if v.len() == 2));

        let file: Contents = serde_json::from_value(json!(
            {"name": "a.txt", "path": "a.txt", "type": "file", "content": "aGk=", "encoding": "base64"}
        ))
        .unwrap();
        assert!(matches!(file, Contents::File(ref e) if e.kind == ContentKind::File));
    }

    #[test]
    fn test_unknown_permission_maps_to_none() {
        let p: CollaboratorPermission =
            serde_json::from_value(json!({"permission": "something-new"})).unwrap();
        assert_eq!(p.permission, Permission::None);
        assert!(!p.permission.can_push());
        assert!(Permission::Write.can_push());
    }
}

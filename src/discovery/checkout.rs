//! How a discovered head is cloned and checked out.

use crate::core::{ScoutError, ScoutResult};
use crate::discovery::head::{CheckoutStrategy, Head, MergeHash, Revision};
use crate::discovery::traits::SourceTrait;
use crate::github::types::Repository;
use serde::Serialize;

/// Merge step for pull requests built with the merge strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeWith {
    /// Remote tracking branch of the target, e.g. `remotes/origin/master`
    pub remote_branch: String,
    /// Target commit the pull request was discovered against
    pub base_sha: String,
}

/// Everything needed to reproduce a head's working tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutSpec {
    pub remote_url: String,
    pub refspecs: Vec<String>,
    /// Commit (or ref when unknown) to check out
    pub checkout_ref: String,
    pub credentials_id: Option<String>,
    pub merge_with: Option<MergeWith>,
    #[serde(skip)]
    ssh_url: Option<String>,
}

impl CheckoutSpec {
    /// Plain HTTPS checkout of a head at a revision
    pub fn for_head(
        repository: &Repository,
        head: &Head,
        revision: &Revision,
        credentials_id: Option<String>,
    ) -> ScoutResult<Self> {
        let remote_url = repository.clone_url.clone().ok_or_else(|| {
            ScoutError::Protocol(format!("{} has no clone URL", repository.full_name))
        })?;

        let (refspecs, checkout_ref, merge_with) = match (head, revision) {
            (Head::Branch { name }, Revision::Branch { sha }) => (
                vec![format!("+refs/heads/{0}:refs/remotes/origin/{0}", name)],
                sha.clone(),
                None,
            ),
            (Head::Tag(tag), Revision::Tag { sha }) => (
                vec![format!("+refs/tags/{0}:refs/tags/{0}", tag.name)],
                sha.clone(),
                None,
            ),
            (
                Head::PullRequest(pr),
                Revision::PullRequest {
                    base_sha,
                    head_sha,
                    merge,
                },
            ) => {
                let mut refspecs = vec![format!(
                    "+refs/pull/{}/head:refs/remotes/origin/{}",
                    pr.number, pr.name
                )];
                let merge_with = match pr.strategy {
                    CheckoutStrategy::Head => None,
                    CheckoutStrategy::Merge => {
                        if *merge == MergeHash::NotMergeable {
                            return Err(ScoutError::Protocol(format!(
                                "Pull request #{} has merge conflicts with {}",
                                pr.number, pr.target_branch
                            )));
                        }
                        refspecs.push(format!(
                            "+refs/heads/{0}:refs/remotes/origin/{0}",
                            pr.target_branch
                        ));
                        Some(MergeWith {
                            remote_branch: format!("remotes/origin/{}", pr.target_branch),
                            base_sha: base_sha.clone(),
                        })
                    }
                };
                (refspecs, head_sha.clone(), merge_with)
            }
            _ => {
                return Err(ScoutError::Protocol(format!(
                    "Revision {} does not belong to {}",
                    revision, head
                )))
            }
        };

        Ok(Self {
            remote_url,
            refspecs,
            checkout_ref,
            credentials_id,
            merge_with,
            ssh_url: repository.ssh_url.clone(),
        })
    }

    /// Let each trait adjust the checkout, in order
    pub fn apply(self, traits: &[SourceTrait]) -> Self {
        traits.iter().fold(self, |spec, t| t.decorate_checkout(spec))
    }

    /// Clone over SSH, optionally with different credentials
    pub fn over_ssh(mut self, credentials_id: Option<String>) -> Self {
        match &self.ssh_url {
            Some(url) => self.remote_url = url.clone(),
            None => tracing::warn!(remote = %self.remote_url, "repository has no SSH URL, keeping HTTPS"),
        }
        if credentials_id.is_some() {
            self.credentials_id = credentials_id;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::mocks::{MockRemoteClient, PullRequestBuilder};
    use crate::di::traits::RemoteClient;
    use crate::discovery::head::PullRequestOrigin;
    use crate::discovery::scan::pull_request_head;

    async fn repository() -> Repository {
        MockRemoteClient::new().repository().await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_branch_checkout() {
        let spec = CheckoutSpec::for_head(
            &repository().await,
            &Head::branch("master"),
            &Revision::Branch {
                sha: "abc".to_string(),
            },
            None,
        )
        .unwrap();
        assert_eq!(spec.remote_url, "https://github.com/octo/repo.git");
        assert_eq!(spec.refspecs, vec!["+refs/heads/master:refs/remotes/origin/master"]);
        assert_eq!(spec.checkout_ref, "abc");
        assert!(spec.merge_with.is_none());
    }

    #[tokio::test]
    async fn test_merge_pull_request_checkout() {
        let pr = PullRequestBuilder::origin(4, "feature").build();
        let head = pull_request_head(&pr, PullRequestOrigin::Origin, CheckoutStrategy::Merge, false);
        let revision = Revision::PullRequest {
            base_sha: "base-4".to_string(),
            head_sha: "head-4".to_string(),
            merge: MergeHash::Mergeable("merge-4".to_string()),
        };
        let spec = CheckoutSpec::for_head(&repository().await, &head, &revision, None).unwrap();
        assert_eq!(
            spec.refspecs,
            vec![
                "+refs/pull/4/head:refs/remotes/origin/PR-4",
                "+refs/heads/master:refs/remotes/origin/master"
            ]
        );
        assert_eq!(spec.checkout_ref, "head-4");
        assert_eq!(
            spec.merge_with,
            Some(MergeWith {
                remote_branch: "remotes/origin/master".to_string(),
                base_sha: "base-4".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_conflicting_merge_is_rejected() {
        let pr = PullRequestBuilder::origin(4, "feature").build();
        let head = pull_request_head(&pr, PullRequestOrigin::Origin, CheckoutStrategy::Merge, false);
        let revision = Revision::PullRequest {
            base_sha: "b".to_string(),
            head_sha: "h".to_string(),
            merge: MergeHash::NotMergeable,
        };
        assert!(CheckoutSpec::for_head(&repository().await, &head, &revision, None).is_err());
    }

    #[tokio::test]
    async fn test_mismatched_revision_is_rejected() {
        let result = CheckoutSpec::for_head(
            &repository().await,
            &Head::branch("master"),
            &Revision::Tag {
                sha: "t".to_string(),
            },
            None,
        );
        assert!(matches!(result, Err(ScoutError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_ssh_checkout_trait() {
        let spec = CheckoutSpec::for_head(
            &repository().await,
            &Head::tag("v1", 0),
            &Revision::Tag {
                sha: "t".to_string(),
            },
            Some("https-token".to_string()),
        )
        .unwrap()
        .apply(&[
            SourceTrait::TagDiscovery,
            SourceTrait::SshCheckout {
                credentials_id: Some("deploy-key".to_string()),
            },
        ]);
        assert_eq!(spec.remote_url, "git@github.com:octo/repo.git");
        assert_eq!(spec.credentials_id.as_deref(), Some("deploy-key"));
        assert_eq!(spec.refspecs, vec!["+refs/tags/v1:refs/tags/v1"]);
    }
}

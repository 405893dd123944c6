//! GitHub REST v3 integration
//!
//! This module provides the repository-scoped client used for:
//! - Listing branches, tags and pull requests
//! - Reading file contents at a ref
//! - Looking up collaborators and their permissions
//! - Publishing commit statuses

pub mod client;
pub mod types;

pub use client::GitHubClient;
pub use types::{Branch, PullRequest, PullRequestState, Repository, RepositoryCoordinates, Tag};

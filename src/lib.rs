//! ghscout: GitHub branch-source discovery
//!
//! This crate provides the main ghscout library, re-exporting core
//! functionality from `ghscout-core` and organizing discovery, content
//! probing and GitHub App authentication.

pub use ghscout_core::{format_error_with_help, CredentialStore, ErrorHelp, ScoutError, ScoutResult};

/// Core module re-exported from ghscout-core.
pub mod core {
    pub use ghscout_core::core::*;
    pub use ghscout_core::*;
}

/// Configuration management.
pub mod config;

/// Conditional-request history for GitHub responses.
pub mod cache;

/// GitHub REST client and wire types.
pub mod github;

/// GitHub App authentication and installation token caching.
pub mod auth;

/// Dependency injection infrastructure.
pub mod di;

/// Branch, tag and pull request discovery.
pub mod discovery;

/// File existence and content at a revision.
pub mod probe;

/// Commit status notifications.
pub mod notification;

//! GitHub App authentication
//!
//! - [`jwt`]: app credentials and RS256 app JWTs
//! - [`issuer`]: installation listing and token minting
//! - [`token`]: immutable installation tokens and their staleness window
//! - [`cache`]: single-flight token cache for one owner
//! - [`multi_target`]: token cache keyed by target organisation

pub mod cache;
pub mod issuer;
pub mod jwt;
pub mod multi_target;
pub mod token;

pub use cache::InstallationTokenCache;
pub use issuer::GitHubAppIssuer;
pub use jwt::AppCredentials;
pub use multi_target::MultiTargetTokenCache;
pub use token::{InstallationToken, Secret, StaleTokenPolicy, TokenTiming};

use crate::core::ScoutResult;
use crate::di::traits::TokenSource;
use async_trait::async_trait;

/// Fixed token, e.g. a personal access token from `GITHUB_TOKEN`
pub struct StaticToken {
    secret: Secret,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            secret: Secret::new(token),
        }
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> ScoutResult<String> {
        Ok(self.secret.expose().to_string())
    }

    fn credential_id(&self) -> String {
        "static-token".to_string()
    }
}

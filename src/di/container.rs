//! Service container for dependency injection

use super::traits::{ConfigProvider, RemoteClient, TokenSource};
use crate::auth::{
    GitHubAppIssuer, InstallationTokenCache, MultiTargetTokenCache, StaticToken,
};
use crate::cache::ResponseCache;
use crate::config::Config;
use crate::core::{ScoutError, ScoutResult};
use crate::discovery::{DiscoveryContext, DiscoveryRequest, HeadSelector};
use crate::github::client::GitHubClient;
use std::path::Path;
use std::sync::Arc;

/// Environment variable with a personal access token, used when no app is configured
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// App token cache behind the container's token source
#[derive(Clone)]
pub enum AppTokens {
    Single(Arc<InstallationTokenCache>),
    MultiTarget {
        cache: Arc<MultiTargetTokenCache>,
        target: Option<String>,
    },
}

/// Service container for dependency injection
///
/// Holds the services a command needs as trait objects so tests can swap in
/// the in-memory implementations from [`mocks`](super::mocks).
///
/// # Example (Testing)
///
/// ```
/// use ghscout::di::{ServiceContainer, mocks::*};
/// use ghscout::auth::StaticToken;
/// use std::sync::Arc;
///
/// let container = ServiceContainer::with_providers(
///     Arc::new(MockConfigProvider::default()),
///     Arc::new(StaticToken::new("token")),
///     Arc::new(MockRemoteClient::new()),
/// );
/// assert!(container.app_tokens().is_none());
/// ```
#[derive(Clone)]
pub struct ServiceContainer {
    pub config: Arc<dyn ConfigProvider>,
    pub tokens: Arc<dyn TokenSource>,
    pub responses: Arc<ResponseCache>,
    pub client: Arc<dyn RemoteClient>,
    app_tokens: Option<AppTokens>,
}

impl ServiceContainer {
    /// Create a service container with production implementations
    ///
    /// Loads the config (from `config_path` or the platform default) and
    /// authenticates as the configured GitHub App, falling back to
    /// `GITHUB_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Config file cannot be loaded or created
    /// - The app private key is missing or malformed
    /// - Neither an app nor `GITHUB_TOKEN` is configured
    pub fn new(config_path: Option<&Path>) -> ScoutResult<Self> {
        let config = match config_path {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> ScoutResult<Self> {
        let (tokens, app_tokens) = Self::token_source(&config)?;

        let responses = if config.persist_http_cache {
            let dir = ResponseCache::partition_dir(
                &config.get_cache_dir()?,
                &config.api_url,
                &tokens.credential_id(),
            );
            Arc::new(ResponseCache::persistent(dir)?)
        } else {
            Arc::new(ResponseCache::in_memory())
        };

        let client = GitHubClient::new(&config, tokens.clone(), responses.clone())?;
        tracing::debug!(
            api_url = %config.api_url,
            credential = %tokens.credential_id(),
            "services initialised"
        );

        Ok(Self {
            config: Arc::new(config),
            tokens,
            responses,
            client: Arc::new(client),
            app_tokens,
        })
    }

    fn token_source(
        config: &Config,
    ) -> ScoutResult<(Arc<dyn TokenSource>, Option<AppTokens>)> {
        if let Some(credentials) = config.app_credentials()? {
            let issuer = Arc::new(GitHubAppIssuer::new(
                &config.api_url,
                credentials,
                &config.user_agent,
                config.http_timeout(),
            )?);
            let target = config.effective_target().map(str::to_string);

            if config.multi_target {
                let cache = Arc::new(MultiTargetTokenCache::new(
                    issuer,
                    config.token,
                    config.stale_token_policy,
                ));
                let tokens: Arc<dyn TokenSource> = Arc::new(cache.for_target(target.clone()));
                return Ok((tokens, Some(AppTokens::MultiTarget { cache, target })));
            }

            let cache = Arc::new(InstallationTokenCache::new(
                issuer,
                target,
                config.token,
                config.stale_token_policy,
            ));
            let tokens: Arc<dyn TokenSource> = cache.clone();
            return Ok((tokens, Some(AppTokens::Single(cache))));
        }

        match std::env::var(GITHUB_TOKEN_ENV) {
            Ok(token) if !token.trim().is_empty() => {
                let tokens: Arc<dyn TokenSource> = Arc::new(StaticToken::new(token.trim()));
                Ok((tokens, None))
            }
            _ => Err(ScoutError::Auth(format!(
                "No credentials configured; set app_id with a private key, or {}",
                GITHUB_TOKEN_ENV
            ))),
        }
    }

    /// Create a service container with custom provider implementations
    ///
    /// Responses are kept in memory only.
    pub fn with_providers(
        config: Arc<dyn ConfigProvider>,
        tokens: Arc<dyn TokenSource>,
        client: Arc<dyn RemoteClient>,
    ) -> Self {
        Self {
            config,
            tokens,
            responses: Arc::new(ResponseCache::in_memory()),
            client,
            app_tokens: None,
        }
    }

    /// Get the configuration provider
    pub fn config(&self) -> &dyn ConfigProvider {
        self.config.as_ref()
    }

    pub fn client(&self) -> Arc<dyn RemoteClient> {
        self.client.clone()
    }

    /// App token cache, when authenticating as a GitHub App
    pub fn app_tokens(&self) -> Option<&AppTokens> {
        self.app_tokens.as_ref()
    }

    /// Context built from the configured traits
    pub fn discovery_context(&self) -> DiscoveryContext {
        DiscoveryContext::new().apply(self.config.traits())
    }

    /// Discovery request over the configured repository
    pub fn discovery_request(
        &self,
        includes: Option<Vec<HeadSelector>>,
    ) -> ScoutResult<DiscoveryRequest> {
        Ok(DiscoveryRequest::new(
            self.client(),
            self.config.repository()?,
            &self.discovery_context(),
            includes,
        )
        .with_merge_poll_delay(self.config.merge_poll_delay()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PRIVATE_KEY_ENV;
    use crate::di::mocks::{MockConfigProvider, MockRemoteClient};
    use crate::discovery::{run, BranchDiscoveryStrategy, CollectingObserver, SourceTrait};
    use serial_test::serial;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_with_providers_scans_mock_repository() {
        let config = MockConfigProvider {
            traits: vec![
                SourceTrait::BranchDiscovery {
                    strategy: BranchDiscoveryStrategy::AllBranches,
                },
                SourceTrait::TagDiscovery,
            ],
            ..Default::default()
        };
        let client = MockRemoteClient::new()
            .with_branch("master", "a1")
            .with_tag("v1.0", "t1");
        let container = ServiceContainer::with_providers(
            Arc::new(config),
            Arc::new(StaticToken::new("token")),
            Arc::new(client),
        );

        assert!(container.discovery_context().wants_tags());
        let request = container.discovery_request(None).unwrap();
        let mut observer = CollectingObserver::new();
        let summary = run(&request, &mut observer).await.unwrap();
        assert_eq!(summary.tags, 1);
        assert_eq!(summary.branches, 1);
    }

    fn config_in(temp: &TempDir) -> Config {
        Config {
            owner: Some("octo".to_string()),
            repository: Some("repo".to_string()),
            cache_dir: Some(temp.path().to_string_lossy().to_string()),
            ..Default::default()
        }
    }

    #[test]
    #[serial]
    fn test_github_token_fallback() {
        std::env::remove_var(PRIVATE_KEY_ENV);
        std::env::set_var(GITHUB_TOKEN_ENV, "ghp_example");
        let temp = TempDir::new().unwrap();
        let container = ServiceContainer::from_config(config_in(&temp));
        std::env::remove_var(GITHUB_TOKEN_ENV);

        let container = container.unwrap();
        assert!(container.app_tokens().is_none());
        assert_eq!(container.tokens.credential_id(), "static-token");
        assert!(temp.path().join("http").is_dir());
    }

    #[test]
    #[serial]
    fn test_no_credentials_is_auth_error() {
        std::env::remove_var(GITHUB_TOKEN_ENV);
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            ServiceContainer::from_config(config_in(&temp)),
            Err(ScoutError::Auth(_))
        ));
    }

    #[test]
    #[serial]
    fn test_app_without_key_is_config_error() {
        std::env::remove_var(PRIVATE_KEY_ENV);
        let temp = TempDir::new().unwrap();
        let config = Config {
            app_id: Some("42".to_string()),
            ..config_in(&temp)
        };
        assert!(matches!(
            ServiceContainer::from_config(config),
            Err(ScoutError::Config(_))
        ));
    }
}

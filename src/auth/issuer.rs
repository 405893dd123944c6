//! GitHub App endpoints authenticated with the app JWT.

use crate::auth::jwt::AppCredentials;
use crate::core::{ScoutError, ScoutResult};
use crate::di::traits::TokenIssuer;
use crate::github::client::build_http_client;
use crate::github::types::{Installation, InstallationAccessToken};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client as HttpClient};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Talks to `/app/...` on behalf of a GitHub App
pub struct GitHubAppIssuer {
    http_client: HttpClient,
    api_url: String,
    credentials: AppCredentials,
}

impl GitHubAppIssuer {
    pub fn new(
        api_url: &str,
        credentials: AppCredentials,
        user_agent: &str,
        timeout: Duration,
    ) -> ScoutResult<Self> {
        Ok(Self {
            http_client: build_http_client(user_agent, timeout)?,
            api_url: api_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// List the app's installations
    pub async fn list_installations(&self) -> ScoutResult<Vec<Installation>> {
        let url = format!("{}/app/installations?per_page=100", self.api_url);
        self.app_request(self.http_client.get(&url), &url).await
    }

    /// Mint an installation access token
    pub async fn mint_token(&self, installation_id: u64) -> ScoutResult<InstallationAccessToken> {
        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.api_url, installation_id
        );
        self.app_request(self.http_client.post(&url), &url).await
    }

    async fn app_request<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> ScoutResult<T> {
        let jwt = self.credentials.sign_jwt(Utc::now())?;
        let response = request
            .header(header::AUTHORIZATION, format!("Bearer {}", jwt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScoutError::Auth(format!(
                "GitHub app {} request to {} failed: HTTP {}",
                self.credentials.app_id(),
                url,
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ScoutError::Protocol(format!("Failed to parse GitHub app response: {}", e)))
    }
}

#[async_trait]
impl TokenIssuer for GitHubAppIssuer {
    fn app_id(&self) -> &str {
        self.credentials.app_id()
    }

    async fn installations(&self) -> ScoutResult<Vec<Installation>> {
        Self::list_installations(self).await
    }

    async fn create_installation_token(
        &self,
        installation_id: u64,
    ) -> ScoutResult<InstallationAccessToken> {
        Self::mint_token(self, installation_id).await
    }
}

/// Pick the installation tokens should be minted for
///
/// With a single installation that one is used; otherwise the installation
/// whose account login matches `owner` (case-insensitively).
pub fn select_installation<'a>(
    installations: &'a [Installation],
    owner: Option<&str>,
    app_id: &str,
) -> ScoutResult<&'a Installation> {
    if installations.len() == 1 {
        return Ok(&installations[0]);
    }
    owner
        .and_then(|owner| {
            installations
                .iter()
                .find(|i| i.account.login.eq_ignore_ascii_case(owner))
        })
        .ok_or_else(|| not_installed(app_id))
}

/// Error for an app with no installation matching the requested owner
pub fn not_installed(app_id: &str) -> ScoutError {
    ScoutError::Auth(format!(
        "Couldn't authenticate with GitHub app ID {}, has it been installed to your GitHub organisation / user?",
        app_id
    ))
}

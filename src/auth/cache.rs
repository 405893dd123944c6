//! Installation token cache with single-flight refresh.
//!
//! Readers always see a fully built, immutable token (`Arc`). A stale or
//! missing token is refreshed under a per-key async lock; callers that queued
//! behind an in-flight refresh take its outcome instead of issuing again.

use crate::auth::issuer::select_installation;
use crate::auth::token::{InstallationToken, Secret, StaleTokenPolicy, TokenTiming};
use crate::core::{ScoutError, ScoutResult};
use crate::di::traits::{TokenIssuer, TokenSource};
use async_trait::async_trait;
use chrono::Utc;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

/// Outcome of the last refresh, handed to callers that waited for it
#[derive(Default)]
struct RefreshLedger {
    last_failure: Option<String>,
}

/// One cached token plus the lock guarding its refresh
#[derive(Default)]
pub(crate) struct TokenSlot {
    current: RwLock<Option<Arc<InstallationToken>>>,
    generation: AtomicU64,
    refresh: Mutex<RefreshLedger>,
}

impl TokenSlot {
    pub(crate) fn current(&self) -> Option<Arc<InstallationToken>> {
        self.current.read().ok().and_then(|guard| guard.clone())
    }

    /// Fresh token, refreshing through `mint` when stale or missing
    pub(crate) async fn get<F, Fut>(
        &self,
        policy: StaleTokenPolicy,
        mint: F,
    ) -> ScoutResult<Arc<InstallationToken>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ScoutResult<InstallationToken>>,
    {
        if let Some(token) = self.current() {
            if !token.is_stale() {
                return Ok(token);
            }
        }

        let observed = self.generation.load(Ordering::Acquire);
        let mut ledger = self.refresh.lock().await;

        if self.generation.load(Ordering::Acquire) != observed {
            // Another caller refreshed while we were queued
            if let Some(message) = &ledger.last_failure {
                return self.fallback(policy, ScoutError::Auth(message.clone()));
            }
        }
        if let Some(token) = self.current() {
            if !token.is_stale() {
                return Ok(token);
            }
        }

        self.install(&mut ledger, mint().await)
            .or_else(|e| self.fallback(policy, e))
    }

    /// Refresh unconditionally
    pub(crate) async fn force<F, Fut>(&self, mint: F) -> ScoutResult<Arc<InstallationToken>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ScoutResult<InstallationToken>>,
    {
        let mut ledger = self.refresh.lock().await;
        self.install(&mut ledger, mint().await)
    }

    fn install(
        &self,
        ledger: &mut RefreshLedger,
        outcome: ScoutResult<InstallationToken>,
    ) -> ScoutResult<Arc<InstallationToken>> {
        let result = match outcome {
            Ok(token) => {
                let token = Arc::new(token);
                if let Ok(mut current) = self.current.write() {
                    *current = Some(token.clone());
                }
                ledger.last_failure = None;
                Ok(token)
            }
            Err(e) => {
                // The previous token stays in place
                ledger.last_failure = Some(e.to_string());
                Err(e)
            }
        };
        self.generation.fetch_add(1, Ordering::AcqRel);
        result
    }

    fn fallback(
        &self,
        policy: StaleTokenPolicy,
        error: ScoutError,
    ) -> ScoutResult<Arc<InstallationToken>> {
        match (policy, self.current()) {
            (StaleTokenPolicy::UseUntilExpired, Some(token)) if !token.is_expired() => {
                tracing::warn!(
                    expires_at = %token.expires_at(),
                    error = %error,
                    "failed to refresh installation token, using stale token"
                );
                Ok(token)
            }
            _ => Err(error),
        }
    }

    pub(crate) fn is_stale(&self) -> bool {
        self.current().map(|t| t.is_stale()).unwrap_or(true)
    }

    pub(crate) fn is_expired(&self) -> bool {
        self.current().map(|t| t.is_expired()).unwrap_or(true)
    }
}

/// Mint a token for the installation owned by `owner`
pub(crate) async fn mint_for_owner(
    issuer: &dyn TokenIssuer,
    owner: Option<&str>,
    timing: &TokenTiming,
) -> ScoutResult<InstallationToken> {
    let installations = issuer.installations().await?;
    let installation = select_installation(&installations, owner, issuer.app_id())?;
    mint_for_installation(issuer, installation.id, timing).await
}

pub(crate) async fn mint_for_installation(
    issuer: &dyn TokenIssuer,
    installation_id: u64,
    timing: &TokenTiming,
) -> ScoutResult<InstallationToken> {
    tracing::debug!(
        app_id = issuer.app_id(),
        installation_id,
        "generating installation token"
    );
    let issued_at = Utc::now();
    let access = issuer
        .create_installation_token(installation_id)
        .await
        .map_err(|e| match e {
            ScoutError::Auth(_) => e,
            other => ScoutError::Auth(format!(
                "Failed to generate installation token for GitHub app ID {}: {}",
                issuer.app_id(),
                other
            )),
        })?;
    Ok(InstallationToken::new(
        Secret::new(access.token),
        issued_at,
        access.expires_at,
        timing,
    ))
}

/// Keeps one installation token fresh for one app + owner
pub struct InstallationTokenCache {
    issuer: Arc<dyn TokenIssuer>,
    owner: Option<String>,
    timing: TokenTiming,
    policy: StaleTokenPolicy,
    slot: TokenSlot,
}

impl InstallationTokenCache {
    pub fn new(
        issuer: Arc<dyn TokenIssuer>,
        owner: Option<String>,
        timing: TokenTiming,
        policy: StaleTokenPolicy,
    ) -> Self {
        Self {
            issuer,
            owner,
            timing,
            policy,
            slot: TokenSlot::default(),
        }
    }

    /// Current token, refreshed first when stale
    pub async fn installation_token(&self) -> ScoutResult<Arc<InstallationToken>> {
        self.slot
            .get(self.policy, || {
                mint_for_owner(self.issuer.as_ref(), self.owner.as_deref(), &self.timing)
            })
            .await
    }

    /// Refresh now, whatever the state of the current token
    pub async fn force_refresh(&self) -> ScoutResult<Arc<InstallationToken>> {
        self.slot
            .force(|| mint_for_owner(self.issuer.as_ref(), self.owner.as_deref(), &self.timing))
            .await
    }

    /// True when there is no token or the current one is stale
    pub fn is_stale(&self) -> bool {
        self.slot.is_stale()
    }

    pub fn is_expired(&self) -> bool {
        self.slot.is_expired()
    }

    /// Token currently held, without refreshing
    pub fn peek(&self) -> Option<Arc<InstallationToken>> {
        self.slot.current()
    }
}

#[async_trait]
impl TokenSource for InstallationTokenCache {
    async fn token(&self) -> ScoutResult<String> {
        Ok(self.installation_token().await?.secret().expose().to_string())
    }

    fn credential_id(&self) -> String {
        match &self.owner {
            Some(owner) => format!("app-{}@{}", self.issuer.app_id(), owner),
            None => format!("app-{}", self.issuer.app_id()),
        }
    }
}

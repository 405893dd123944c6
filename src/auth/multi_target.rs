//! One app, many installations: tokens keyed by target organisation.

use crate::auth::cache::{mint_for_installation, TokenSlot};
use crate::auth::issuer::not_installed;
use crate::auth::token::{InstallationToken, StaleTokenPolicy, TokenTiming};
use crate::core::{ScoutError, ScoutResult};
use crate::di::traits::{TokenIssuer, TokenSource};
use crate::github::types::Installation;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// How long the list of installations is trusted
pub const TARGET_LIST_TTL: Duration = Duration::from_secs(60 * 60);

/// Upper bound on cached per-target tokens
pub const MAX_CACHED_TOKENS: usize = 100;

struct CachedSlot {
    slot: Arc<TokenSlot>,
    created: u64,
}

#[derive(Default)]
struct TargetList {
    installations: Vec<Installation>,
    fetched_at: Option<Instant>,
}

/// Token cache keyed by (app, target organisation or user)
pub struct MultiTargetTokenCache {
    issuer: Arc<dyn TokenIssuer>,
    timing: TokenTiming,
    policy: StaleTokenPolicy,
    target_ttl: Duration,
    slots: Mutex<HashMap<String, CachedSlot>>,
    sequence: std::sync::atomic::AtomicU64,
    targets: Mutex<TargetList>,
}

impl MultiTargetTokenCache {
    pub fn new(issuer: Arc<dyn TokenIssuer>, timing: TokenTiming, policy: StaleTokenPolicy) -> Self {
        Self {
            issuer,
            timing,
            policy,
            target_ttl: TARGET_LIST_TTL,
            slots: Mutex::new(HashMap::new()),
            sequence: std::sync::atomic::AtomicU64::new(0),
            targets: Mutex::new(TargetList::default()),
        }
    }

    /// Override how long the installation list is reused
    pub fn with_target_ttl(mut self, ttl: Duration) -> Self {
        self.target_ttl = ttl;
        self
    }

    /// Account logins the app is installed on
    ///
    /// The list is cached for [`TARGET_LIST_TTL`]. When listing fails the
    /// previous list is kept (empty if there never was one).
    pub async fn available_targets(&self, force: bool) -> Vec<String> {
        self.installations(force)
            .await
            .into_iter()
            .map(|i| i.account.login)
            .collect()
    }

    async fn installations(&self, force: bool) -> Vec<Installation> {
        let mut targets = self.targets.lock().await;
        let expired = targets
            .fetched_at
            .map(|at| at.elapsed() >= self.target_ttl)
            .unwrap_or(true);

        if force || expired {
            match self.issuer.installations().await {
                Ok(list) => {
                    tracing::debug!(count = list.len(), "refreshed GitHub app installations");
                    targets.installations = list;
                }
                Err(e) => {
                    tracing::warn!(
                        app_id = self.issuer.app_id(),
                        error = %e,
                        "failed to list GitHub app installations, keeping previous list"
                    );
                }
            }
            targets.fetched_at = Some(Instant::now());
        }
        targets.installations.clone()
    }

    /// Explicit target, or the first available one
    async fn resolve_target(&self, target: Option<&str>) -> ScoutResult<String> {
        if let Some(target) = target {
            return Ok(target.to_string());
        }
        self.available_targets(false)
            .await
            .into_iter()
            .next()
            .ok_or_else(|| {
                ScoutError::Auth(format!(
                    "GitHub app ID {} has no installations to authenticate with",
                    self.issuer.app_id()
                ))
            })
    }

    /// Slot for `target`; account logins are case-insensitive
    async fn slot(&self, target: &str) -> Arc<TokenSlot> {
        let key = target.to_ascii_lowercase();
        let mut slots = self.slots.lock().await;
        if let Some(cached) = slots.get(&key) {
            return cached.slot.clone();
        }

        slots.retain(|key, cached| {
            let keep = !cached.slot.is_expired() || cached.slot.current().is_none();
            if !keep {
                tracing::debug!(target = %key, "dropping expired installation token");
            }
            keep
        });
        while slots.len() >= MAX_CACHED_TOKENS {
            let oldest = slots
                .iter()
                .min_by_key(|(_, cached)| cached.created)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    slots.remove(&key);
                }
                None => break,
            }
        }

        let slot = Arc::new(TokenSlot::default());
        let created = self
            .sequence
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        slots.insert(
            key,
            CachedSlot {
                slot: slot.clone(),
                created,
            },
        );
        slot
    }

    async fn mint(&self, target: &str) -> ScoutResult<InstallationToken> {
        let mut installations = self.installations(false).await;
        if !installations
            .iter()
            .any(|i| i.account.login.eq_ignore_ascii_case(target))
        {
            // Might have been installed since the list was cached
            installations = self.installations(true).await;
        }
        let installation = installations
            .iter()
            .find(|i| i.account.login.eq_ignore_ascii_case(target))
            .ok_or_else(|| not_installed(self.issuer.app_id()))?;
        mint_for_installation(self.issuer.as_ref(), installation.id, &self.timing).await
    }

    /// Token for `target` (or the first available target)
    pub async fn installation_token(
        &self,
        target: Option<&str>,
    ) -> ScoutResult<Arc<InstallationToken>> {
        let target = self.resolve_target(target).await?;
        let slot = self.slot(&target).await;
        slot.get(self.policy, || self.mint(&target)).await
    }

    pub async fn force_refresh(&self, target: Option<&str>) -> ScoutResult<Arc<InstallationToken>> {
        let target = self.resolve_target(target).await?;
        let slot = self.slot(&target).await;
        slot.force(|| self.mint(&target)).await
    }

    /// True when the target has no token or a stale one
    pub async fn is_stale(&self, target: &str) -> bool {
        match self.slots.lock().await.get(&target.to_ascii_lowercase()) {
            Some(cached) => cached.slot.is_stale(),
            None => true,
        }
    }

    /// Number of targets with a cached slot
    pub async fn cached_targets(&self) -> usize {
        self.slots.lock().await.len()
    }

    /// Bind this cache to one target so it can authenticate a client
    pub fn for_target(self: &Arc<Self>, target: Option<String>) -> TargetTokenSource {
        TargetTokenSource {
            cache: self.clone(),
            target,
        }
    }
}

/// A [`MultiTargetTokenCache`] pinned to one target
pub struct TargetTokenSource {
    cache: Arc<MultiTargetTokenCache>,
    target: Option<String>,
}

#[async_trait]
impl TokenSource for TargetTokenSource {
    async fn token(&self) -> ScoutResult<String> {
        Ok(self
            .cache
            .installation_token(self.target.as_deref())
            .await?
            .secret()
            .expose()
            .to_string())
    }

    fn credential_id(&self) -> String {
        match &self.target {
            Some(target) => format!("app-{}@{}", self.cache.issuer.app_id(), target),
            None => format!("app-{}", self.cache.issuer.app_id()),
        }
    }
}

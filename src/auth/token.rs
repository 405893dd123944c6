//! Installation token values and their staleness window.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Secret string that never shows up in `Debug` output or logs
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(****)")
    }
}

/// Knobs controlling when a token is considered stale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTiming {
    /// A fresh token is never stale before this many seconds (clamped to >= 1)
    #[serde(default = "default_not_stale_minimum_secs")]
    pub not_stale_minimum_secs: i64,

    /// Refresh this long before the token actually expires
    #[serde(default = "default_stale_before_expiration_secs")]
    pub stale_before_expiration_secs: i64,

    /// Never keep a token longer than this
    #[serde(default = "default_maximum_age_secs")]
    pub maximum_age_secs: i64,
}

fn default_not_stale_minimum_secs() -> i64 {
    60
}

fn default_stale_before_expiration_secs() -> i64 {
    45 * 60
}

fn default_maximum_age_secs() -> i64 {
    30 * 60
}

impl Default for TokenTiming {
    fn default() -> Self {
        Self {
            not_stale_minimum_secs: default_not_stale_minimum_secs(),
            stale_before_expiration_secs: default_stale_before_expiration_secs(),
            maximum_age_secs: default_maximum_age_secs(),
        }
    }
}

impl TokenTiming {
    /// Instant after which a token issued at `issued_at` should be refreshed
    pub fn stale_at(&self, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> DateTime<Utc> {
        let floor = issued_at + Duration::seconds(self.not_stale_minimum_secs.max(1));
        let before_expiry = expires_at - Duration::seconds(self.stale_before_expiration_secs);
        let max_age = issued_at + Duration::seconds(self.maximum_age_secs);
        floor.max(before_expiry.min(max_age))
    }
}

/// What to do with a stale token when refreshing it fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleTokenPolicy {
    /// Keep serving the stale token (with a warning) until it expires
    #[default]
    UseUntilExpired,
    /// Surface the refresh error
    Reject,
}

/// Immutable installation token; replaced wholesale on refresh
#[derive(Debug, Clone)]
pub struct InstallationToken {
    secret: Secret,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    stale_at: DateTime<Utc>,
}

impl InstallationToken {
    pub fn new(
        secret: Secret,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        timing: &TokenTiming,
    ) -> Self {
        Self {
            secret,
            issued_at,
            expires_at,
            stale_at: timing.stale_at(issued_at, expires_at),
        }
    }

    pub fn secret(&self) -> &Secret {
        &self.secret
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn stale_at(&self) -> DateTime<Utc> {
        self.stale_at
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Utc::now())
    }

    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.stale_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

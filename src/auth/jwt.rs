//! GitHub App credentials and app JWT signing.

use crate::core::{ScoutError, ScoutResult};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

/// How long an app JWT is valid for (GitHub allows at most 10 minutes)
const JWT_VALIDITY_MINUTES: i64 = 8;

/// Backdating of `iat` to absorb clock skew with GitHub
const CLOCK_SKEW_SECONDS: i64 = 60;

/// Registered claims GitHub expects in an app JWT
#[derive(Debug, Serialize, Deserialize)]
pub struct AppClaims {
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// App id plus a parsed RSA private key
#[derive(Clone)]
pub struct AppCredentials {
    app_id: String,
    key: EncodingKey,
}

impl std::fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCredentials")
            .field("app_id", &self.app_id)
            .finish_non_exhaustive()
    }
}

impl AppCredentials {
    /// Parse a PEM private key for `app_id`
    ///
    /// Accepts PKCS#8 and PKCS#1 RSA keys.
    pub fn from_pem(app_id: impl Into<String>, pem: &str) -> ScoutResult<Self> {
        let app_id = app_id.into();
        if app_id.trim().is_empty() {
            return Err(ScoutError::Config("GitHub app ID is not set".to_string()));
        }
        let key = EncodingKey::from_rsa_pem(pem.trim().as_bytes()).map_err(|e| {
            ScoutError::Config(format!(
                "Couldn't parse private key for GitHub app {}, make sure it's PKCS#8 format: {}",
                app_id, e
            ))
        })?;
        Ok(Self { app_id, key })
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Sign an RS256 JWT identifying the app, valid from `now`
    pub fn sign_jwt(&self, now: DateTime<Utc>) -> ScoutResult<String> {
        let claims = AppClaims {
            iat: (now - Duration::seconds(CLOCK_SKEW_SECONDS)).timestamp(),
            exp: (now + Duration::minutes(JWT_VALIDITY_MINUTES)).timestamp(),
            iss: self.app_id.clone(),
        };
        encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| ScoutError::Auth(format!("Failed to sign app JWT: {}", e)))
    }
}

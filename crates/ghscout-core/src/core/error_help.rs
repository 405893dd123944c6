//! Human-facing remediation hints for errors printed by the CLI.

use crate::core::error::ScoutError;

/// Suggest a next step for an error, if we know one
pub trait ErrorHelp {
    fn help(&self) -> Option<String>;
}

impl ErrorHelp for ScoutError {
    fn help(&self) -> Option<String> {
        match self {
            ScoutError::Config(msg) if msg.contains("parse private key") => Some(
                "GitHub App private keys must be PKCS#8 PEM. Convert a PKCS#1 key with:\n  \
                 openssl pkcs8 -topk8 -inform PEM -outform PEM -in current-key.pem -out new-key.pem -nocrypt"
                    .to_string(),
            ),
            ScoutError::Config(_) | ScoutError::Yaml(_) => Some(
                "Check your config file (run `ghscout config` to see the effective settings)."
                    .to_string(),
            ),
            ScoutError::Auth(msg) if msg.contains("installed") => Some(
                "Install the GitHub App on the organisation or user that owns the repository, \
                 or set `owner`/`target` in the config."
                    .to_string(),
            ),
            ScoutError::Auth(_) => Some(
                "Verify the app ID and private key; run `ghscout token --refresh` to retry."
                    .to_string(),
            ),
            ScoutError::Credentials(_) => Some(
                "Store the private key with `ghscout login`, or set GHSCOUT_PRIVATE_KEY."
                    .to_string(),
            ),
            ScoutError::RateLimited { .. } => {
                Some("Wait for the rate limit window to reset and retry.".to_string())
            }
            ScoutError::Http(_) => {
                Some("Check network connectivity and the configured api_url.".to_string())
            }
            ScoutError::Remote { status, .. } if *status == 401 || *status == 403 => Some(
                "The installation token was rejected; check the app's repository permissions."
                    .to_string(),
            ),
            _ => None,
        }
    }
}

/// Render an error followed by its hint, if any
pub fn format_error_with_help(error: &ScoutError) -> String {
    match error.help() {
        Some(help) => format!("Error: {}\n\nHelp: {}", error, help),
        None => format!("Error: {}", error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_key_hint_mentions_pkcs8() {
        let err = ScoutError::Config("Couldn't parse private key for GitHub app".to_string());
        let text = format_error_with_help(&err);
        assert!(text.contains("PKCS#8"));
        assert!(text.contains("openssl pkcs8"));
    }

    #[test]
    fn test_no_help_for_cancelled() {
        let text = format_error_with_help(&ScoutError::Cancelled);
        assert_eq!(text, "Error: Operation cancelled");
    }
}

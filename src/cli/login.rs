use super::{config_path, load_config};
use ghscout::auth::AppCredentials;
use ghscout::config::Config;
use ghscout::core::credentials::CredentialStore;
use ghscout::core::{ScoutError, ScoutResult};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

pub fn run(config: Option<&Path>, app_id: String, key_file: Option<PathBuf>) -> ScoutResult<()> {
    let pem = match &key_file {
        Some(path) => std::fs::read_to_string(path).map_err(|e| {
            ScoutError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?,
        None => {
            println!("Paste the GitHub App private key (PEM), then end input with Ctrl-D:");
            let mut pem = String::new();
            io::stdin().read_to_string(&mut pem)?;
            pem
        }
    };

    if pem.trim().is_empty() {
        return Err(ScoutError::Config("Private key cannot be empty".to_string()));
    }

    // Reject keys we could not sign with before storing them
    AppCredentials::from_pem(app_id.clone(), &pem)?;

    let key = Config::keychain_key_for(&app_id);
    CredentialStore::store(&key, pem.trim())?;

    let mut settings = load_config(config)?;
    settings.app_id = Some(app_id.clone());
    settings.private_key_keychain_key = Some(key);
    settings.private_key_path = None;
    settings.save_to(&config_path(config)?)?;

    println!();
    println!("✓ Private key for GitHub app {} stored securely", app_id);

    Ok(())
}

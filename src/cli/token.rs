use ghscout::auth::InstallationToken;
use ghscout::core::{ScoutError, ScoutResult};
use ghscout::di::{AppTokens, ServiceContainer};
use std::path::Path;

pub async fn run(
    config: Option<&Path>,
    refresh: bool,
    target: Option<String>,
    list_targets: bool,
) -> ScoutResult<()> {
    let container = ServiceContainer::new(config)?;
    let Some(tokens) = container.app_tokens() else {
        return Err(ScoutError::Auth(
            "Token status needs a GitHub App; GITHUB_TOKEN is used as given".to_string(),
        ));
    };

    match tokens {
        AppTokens::Single(cache) => {
            if target.is_some() || list_targets {
                return Err(ScoutError::Config(
                    "--target and --list-targets need multi_target: true".to_string(),
                ));
            }
            let token = if refresh {
                cache.force_refresh().await?
            } else {
                cache.installation_token().await?
            };
            print_token(None, &token);
        }
        AppTokens::MultiTarget {
            cache,
            target: configured,
        } => {
            if list_targets {
                let targets = cache.available_targets(refresh).await;
                println!("Installed on {} account(s):", targets.len());
                for target in &targets {
                    println!("  {}", target);
                }
                return Ok(());
            }
            let target = target.or_else(|| configured.clone());
            let token = if refresh {
                cache.force_refresh(target.as_deref()).await?
            } else {
                cache.installation_token(target.as_deref()).await?
            };
            print_token(target.as_deref(), &token);
        }
    }
    Ok(())
}

fn print_token(target: Option<&str>, token: &InstallationToken) {
    match target {
        Some(target) => println!("✓ Installation token for {}", target),
        None => println!("✓ Installation token"),
    }
    println!("  issued:  {}", token.issued_at().to_rfc3339());
    println!("  stale:   {}", token.stale_at().to_rfc3339());
    println!("  expires: {}", token.expires_at().to_rfc3339());
    if token.is_stale() {
        println!("  (stale, will be refreshed on next use)");
    }
}

use super::*;
use predicates::prelude::*;

#[test]
fn test_help_lists_commands() {
    let ctx = TestContext::new();
    ctx.ghscout()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("probe"))
        .stdout(predicate::str::contains("token"));
}

#[test]
fn test_config_creates_default_file() {
    let ctx = TestContext::new();
    let path = ctx.temp.child("fresh").child("config.yaml");

    ctx.ghscout()
        .arg("--config")
        .arg(path.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("api_url: https://api.github.com"))
        .stdout(predicate::str::contains("branch_discovery"));

    path.assert(predicate::path::exists());
}

#[test]
fn test_config_path() {
    let ctx = TestContext::new();
    ctx.ghscout()
        .arg("--config")
        .arg(ctx.config_path())
        .arg("config")
        .arg("--path")
        .assert()
        .success()
        .stdout(predicate::str::contains("ghscout.yaml"));
}

#[test]
fn test_invalid_config_reported() {
    let ctx = TestContext::new();
    ctx.write_config("http_timeout_secs: 0\n");
    ctx.ghscout()
        .arg("--config")
        .arg(ctx.config_path())
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("http_timeout_secs"));
}

#[test]
fn test_scan_without_credentials_fails() {
    let ctx = TestContext::new();
    ctx.write_config("owner: octo\nrepository: repo\n");
    ctx.ghscout()
        .arg("--config")
        .arg(ctx.config_path())
        .arg("scan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No credentials configured"));
}

#[test]
fn test_token_needs_app() {
    let ctx = TestContext::new();
    ctx.write_config("owner: octo\nrepository: repo\npersist_http_cache: false\n");
    ctx.ghscout()
        .arg("--config")
        .arg(ctx.config_path())
        .arg("token")
        .env("GITHUB_TOKEN", "test-token")
        .assert()
        .failure()
        .stderr(predicate::str::contains("GitHub App"));
}

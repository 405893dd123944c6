use assert_cmd::Command;
use assert_fs::{prelude::*, TempDir};
use std::path::PathBuf;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod config;
mod probe;
mod scan;

/// Test context that provides isolated environment for each test
pub struct TestContext {
    pub temp: TempDir,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    /// Create a new test context with isolated environment
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        // Create config and cache directories that dirs crate will use
        std::fs::create_dir_all(temp.child("config").path()).unwrap();
        std::fs::create_dir_all(temp.child("cache").path()).unwrap();
        Self { temp }
    }

    /// Create a Command for running ghscout with proper environment
    pub fn ghscout(&self) -> Command {
        #[allow(deprecated)]
        let mut cmd = Command::cargo_bin("ghscout").unwrap();
        cmd.current_dir(&self.temp);

        // Set platform-specific env vars that dirs crate uses
        // This isolates ghscout's config/cache directories to the test temp dir
        let config_dir = self.temp.child("config").to_path_buf();
        let cache_dir = self.temp.child("cache").to_path_buf();

        if cfg!(target_os = "windows") {
            cmd.env("APPDATA", &config_dir);
            cmd.env("LOCALAPPDATA", &cache_dir);
            cmd.env("USERPROFILE", self.temp.path());
        } else if cfg!(target_os = "linux") {
            cmd.env("XDG_CONFIG_HOME", &config_dir);
            cmd.env("XDG_CACHE_HOME", &cache_dir);
            cmd.env("HOME", self.temp.path());
        } else {
            cmd.env("HOME", self.temp.path());
        }

        cmd.env_remove("GITHUB_TOKEN");
        cmd.env_remove("GHSCOUT_PRIVATE_KEY");
        cmd.env_remove("RUST_LOG");
        cmd
    }

    /// ghscout authenticated with a static token against `server`
    pub fn ghscout_against(&self, server: &MockServer) -> Command {
        self.write_config(&format!(
            "api_url: {}\nowner: octo\nrepository: repo\npersist_http_cache: false\n",
            server.uri()
        ));
        let mut cmd = self.ghscout();
        cmd.arg("--config").arg(self.config_path());
        cmd.env("GITHUB_TOKEN", "test-token");
        cmd
    }

    pub fn config_path(&self) -> PathBuf {
        self.temp.child("ghscout.yaml").to_path_buf()
    }

    pub fn write_config(&self, content: &str) {
        self.temp.child("ghscout.yaml").write_str(content).unwrap();
    }
}

/// Serve `octo/repo` with default branch `master`
pub async fn mount_repository(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/repos/octo/repo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "repo",
            "full_name": "octo/repo",
            "owner": {"login": "octo"},
            "default_branch": "master",
            "clone_url": "https://github.com/octo/repo.git",
            "ssh_url": "git@github.com:octo/repo.git"
        })))
        .mount(server)
        .await;
}

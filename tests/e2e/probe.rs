use super::*;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::query_param;

async fn mount_master(server: &MockServer) {
    mount_repository(server).await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/repo/branches/master"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"name": "master", "commit": {"sha": "master-sha"}})),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/repo/contents"))
        .and(query_param("ref", "master-sha"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "Jenkinsfile", "path": "Jenkinsfile", "type": "file", "sha": "f1", "size": 11},
            {"name": "docs", "path": "docs", "type": "dir", "sha": "d1", "size": 0}
        ])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/repo/contents/Jenkinsfile"))
        .and(query_param("ref", "master-sha"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Jenkinsfile",
            "path": "Jenkinsfile",
            "type": "file",
            "sha": "f1",
            "size": 11,
            "encoding": "base64",
            "content": "cGlwZWxp\nbmUge30=\n"
        })))
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_probe_default_branch_file() {
    let server = MockServer::start().await;
    mount_master(&server).await;

    let ctx = TestContext::new();
    ctx.ghscout_against(&server)
        .args(["probe", "Jenkinsfile"])
        .assert()
        .success()
        .stdout(predicate::str::contains("branch master"))
        .stdout(predicate::str::contains("✓ file"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_probe_suggests_other_case() {
    let server = MockServer::start().await;
    mount_master(&server).await;

    let ctx = TestContext::new();
    ctx.ghscout_against(&server)
        .args(["probe", "jenkinsfile", "--branch", "master"])
        .assert()
        .success()
        .stdout(predicate::str::contains("does not exist"))
        .stdout(predicate::str::contains("Did you mean Jenkinsfile?"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_probe_read() {
    let server = MockServer::start().await;
    mount_master(&server).await;

    let ctx = TestContext::new();
    ctx.ghscout_against(&server)
        .args(["probe", "Jenkinsfile", "--read"])
        .assert()
        .success()
        .stdout("pipeline {}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_probe_json() {
    let server = MockServer::start().await;
    mount_master(&server).await;

    let ctx = TestContext::new();
    let output = ctx
        .ghscout_against(&server)
        .args(["probe", "docs", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["kind"], "directory");
    assert_eq!(report["git_ref"], "master-sha");
    assert_eq!(report["path"], "docs");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_probe_missing_branch() {
    let server = MockServer::start().await;
    mount_master(&server).await;

    let ctx = TestContext::new();
    ctx.ghscout_against(&server)
        .args(["probe", "Jenkinsfile", "--branch", "gone"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("branch gone"));
}

use super::*;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header};

fn pull_request(number: u64, owner: &str, branch: &str) -> serde_json::Value {
    json!({
        "number": number,
        "state": "open",
        "title": format!("Change {}", number),
        "user": {"login": owner},
        "labels": [],
        "draft": false,
        "head": {
            "ref": branch,
            "sha": format!("head-{}", number),
            "user": {"login": owner},
            "repo": {"name": "repo", "full_name": format!("{}/repo", owner), "owner": {"login": owner}}
        },
        "base": {"ref": "master", "sha": "base-sha", "user": {"login": "octo"}}
    })
}

async fn mount_listings(server: &MockServer) {
    mount_repository(server).await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/repo/branches"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "master", "commit": {"sha": "master-sha"}},
            {"name": "feature", "commit": {"sha": "feature-sha"}}
        ])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/repo/pulls"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([pull_request(7, "octo", "feature")])),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/repo/pulls/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json({
            let mut pr = pull_request(7, "octo", "feature");
            pr["mergeable"] = json!(true);
            pr["merge_commit_sha"] = json!("merge-7");
            pr
        }))
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_scan_lists_heads() {
    let server = MockServer::start().await;
    mount_listings(&server).await;

    let ctx = TestContext::new();
    ctx.ghscout_against(&server)
        .arg("scan")
        .assert()
        .success()
        .stdout(predicate::str::contains("PR-7"))
        .stdout(predicate::str::contains("master"))
        // Origin pull request branches are left to the pull request
        .stdout(predicate::str::contains("feature-sha").not())
        .stdout(predicate::str::contains("1 pull requests, 1 branches, 0 tags"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_scan_json_with_checkout() {
    let server = MockServer::start().await;
    mount_listings(&server).await;

    let ctx = TestContext::new();
    let output = ctx
        .ghscout_against(&server)
        .args(["scan", "--json", "--checkout"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["repository"], "octo/repo");
    assert_eq!(report["summary"]["pull_requests"], 1);
    let heads = report["heads"].as_array().unwrap();
    assert_eq!(heads.len(), 2);
    let pr = &heads[0];
    assert_eq!(pr["trusted"], true);
    assert_eq!(pr["checkout"]["remote_url"], "https://github.com/octo/repo.git");
    assert_eq!(
        pr["checkout"]["merge_with"]["remote_branch"],
        "remotes/origin/master"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_scan_single_branch() {
    let server = MockServer::start().await;
    mount_repository(&server).await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/repo/branches/master"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"name": "master", "commit": {"sha": "master-sha"}})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/repo/pulls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let ctx = TestContext::new();
    ctx.ghscout_against(&server)
        .args(["scan", "--branch", "master"])
        .assert()
        .success()
        .stdout(predicate::str::contains("master-sha"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_scan_notify_publishes_statuses() {
    let server = MockServer::start().await;
    mount_listings(&server).await;
    Mock::given(method("POST"))
        .and(path("/repos/octo/repo/statuses/master-sha"))
        .and(header("authorization", "token test-token"))
        .and(body_partial_json(json!({
            "state": "success",
            "context": "ci/ghscout/branch"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/octo/repo/statuses/head-7"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .mount(&server)
        .await;

    let ctx = TestContext::new();
    ctx.ghscout_against(&server)
        .args(["scan", "--notify", "--build-result", "success"])
        .assert()
        .success()
        .stdout(predicate::str::contains("statuses published: 1"));
}

#[test]
fn test_build_result_requires_notify() {
    let ctx = TestContext::new();
    ctx.ghscout()
        .args(["scan", "--build-result", "success"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--notify"));
}

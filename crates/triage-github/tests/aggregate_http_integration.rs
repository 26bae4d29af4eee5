use std::time::{Duration, Instant};

use httpmock::prelude::*;
use serde_json::json;
use triage_core::{CancellationToken, FailureKind, IssueContext};
use triage_github::{GithubApiClient, GithubClientConfig, GithubIssue, IssueDataSource};

fn context() -> IssueContext {
    IssueContext {
        owner: "acme".to_string(),
        repo: "widgets".to_string(),
        issue_number: 7,
    }
}

fn client_for(server: &MockServer, request_timeout_ms: u64) -> GithubApiClient {
    GithubApiClient::new(GithubClientConfig {
        api_base: server.base_url(),
        token: "test-github-token".to_string(),
        request_timeout_ms,
    })
    .expect("github client should be created")
}

fn mock_readme(server: &MockServer) {
    server.mock(|when, then| {
        when.method(GET).path("/repos/acme/widgets/readme");
        then.status(200)
            .json_body(json!({"content": "IyBXaWRnZXRz\n", "encoding": "base64"}));
    });
}

fn mock_issue(server: &MockServer) {
    server.mock(|when, then| {
        when.method(GET).path("/repos/acme/widgets/issues/7");
        then.status(200).json_body(json!({
            "number": 7,
            "user": {"login": "alice"},
            "title": "Crash",
            "body": "It crashes"
        }));
    });
}

#[tokio::test]
async fn integration_aggregates_all_three_resources_with_expected_headers() {
    let server = MockServer::start();
    let readme = server.mock(|when, then| {
        when.method(GET)
            .path("/repos/acme/widgets/readme")
            .header("authorization", "Bearer test-github-token")
            .header("accept", "application/vnd.github+json")
            .header_exists("user-agent");
        then.status(200)
            .json_body(json!({"content": "IyBXaWRnZXRz", "encoding": "base64"}));
    });
    mock_issue(&server);
    let comments = server.mock(|when, then| {
        when.method(GET)
            .path("/repos/acme/widgets/issues/7/comments")
            .query_param("per_page", "100");
        then.status(200).json_body(json!([
            {"user": {"login": "bob"}, "body": "Can you share logs?"},
            {"user": {"login": "carol"}, "body": "Same here"},
            {"user": {"login": "alice"}, "body": null}
        ]));
    });

    let aggregate = client_for(&server, 5_000)
        .aggregate(&context(), &CancellationToken::new())
        .await
        .expect("aggregate should succeed");

    readme.assert();
    comments.assert();
    assert_eq!(aggregate.readme_text, "# Widgets");
    assert_eq!(aggregate.issue_author, "alice");
    assert_eq!(aggregate.issue_title, "Crash");
    assert_eq!(aggregate.issue_body, "It crashes");
    let authors = aggregate
        .comments
        .iter()
        .map(|comment| comment.author.as_str())
        .collect::<Vec<_>>();
    assert_eq!(authors, vec!["bob", "carol", "alice"]);
    assert_eq!(aggregate.comments[2].body, "");
}

#[tokio::test]
async fn integration_single_status_failure_fails_whole_aggregate() {
    let server = MockServer::start();
    mock_readme(&server);
    mock_issue(&server);
    server.mock(|when, then| {
        when.method(GET).path("/repos/acme/widgets/issues/7/comments");
        then.status(404).json_body(json!({"message": "Not Found"}));
    });

    let failure = client_for(&server, 5_000)
        .aggregate(&context(), &CancellationToken::new())
        .await
        .expect_err("404 on comments must fail the aggregate");

    assert_eq!(failure.kind, FailureKind::HttpStatus);
    assert!(failure.detail.contains("404"));
    assert!(failure.detail.contains("/repos/acme/widgets/issues/7/comments"));
}

#[tokio::test]
async fn integration_missing_readme_content_does_not_fail_aggregate() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/repos/acme/widgets/readme");
        then.status(200).json_body(json!({"name": "README.md"}));
    });
    mock_issue(&server);
    server.mock(|when, then| {
        when.method(GET).path("/repos/acme/widgets/issues/7/comments");
        then.status(200).json_body(json!([]));
    });

    let aggregate = client_for(&server, 5_000)
        .aggregate(&context(), &CancellationToken::new())
        .await
        .expect("absent readme content is empty text");
    assert_eq!(aggregate.readme_text, "");
    assert!(aggregate.comments.is_empty());
}

#[tokio::test]
async fn integration_repository_without_readme_aggregates_empty_text() {
    let server = MockServer::start();
    let readme = server.mock(|when, then| {
        when.method(GET).path("/repos/acme/widgets/readme");
        then.status(404).json_body(json!({"message": "Not Found"}));
    });
    mock_issue(&server);
    server.mock(|when, then| {
        when.method(GET).path("/repos/acme/widgets/issues/7/comments");
        then.status(200).json_body(json!([]));
    });

    let aggregate = client_for(&server, 5_000)
        .aggregate(&context(), &CancellationToken::new())
        .await
        .expect("missing readme is empty text");
    readme.assert_calls(1);
    assert_eq!(aggregate.readme_text, "");
    assert_eq!(aggregate.issue_title, "Crash");
}

#[tokio::test]
async fn regression_readme_server_error_still_fails_aggregate() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/repos/acme/widgets/readme");
        then.status(500).body("boom");
    });
    mock_issue(&server);
    server.mock(|when, then| {
        when.method(GET).path("/repos/acme/widgets/issues/7/comments");
        then.status(200).json_body(json!([]));
    });

    let failure = client_for(&server, 5_000)
        .aggregate(&context(), &CancellationToken::new())
        .await
        .expect_err("readme 500 must fail the aggregate");
    assert_eq!(failure.kind, FailureKind::HttpStatus);
    assert!(failure.detail.contains("500"));
}

#[tokio::test]
async fn integration_slow_resource_times_out_and_fails_aggregate() {
    let server = MockServer::start();
    mock_readme(&server);
    mock_issue(&server);
    server.mock(|when, then| {
        when.method(GET).path("/repos/acme/widgets/issues/7/comments");
        then.status(200)
            .delay(Duration::from_millis(2_000))
            .json_body(json!([]));
    });

    let started = Instant::now();
    let failure = client_for(&server, 100)
        .aggregate(&context(), &CancellationToken::new())
        .await
        .expect_err("slow comments must time out");

    assert_eq!(failure.kind, FailureKind::Timeout);
    assert!(failure.detail.contains("100ms"));
    assert!(
        started.elapsed() < Duration::from_millis(1_500),
        "timeout must not wait for the late response"
    );
}

#[tokio::test]
async fn integration_malformed_issue_body_is_parse_failure() {
    let server = MockServer::start();
    mock_readme(&server);
    server.mock(|when, then| {
        when.method(GET).path("/repos/acme/widgets/issues/7");
        then.status(200).body("{\"title\": 3}");
    });
    server.mock(|when, then| {
        when.method(GET).path("/repos/acme/widgets/issues/7/comments");
        then.status(200).json_body(json!([]));
    });

    let failure = client_for(&server, 5_000)
        .aggregate(&context(), &CancellationToken::new())
        .await
        .expect_err("wrong issue shape must fail");
    assert_eq!(failure.kind, FailureKind::Parse);
    assert!(failure.detail.contains("/repos/acme/widgets/issues/7"));
}

#[tokio::test]
async fn integration_unreachable_host_is_network_failure() {
    let client = GithubApiClient::new(GithubClientConfig {
        api_base: "http://127.0.0.1:1".to_string(),
        token: "t".to_string(),
        request_timeout_ms: 2_000,
    })
    .expect("client");

    let failure = client
        .fetch_json::<GithubIssue>(
            "fetch issue",
            "http://127.0.0.1:1/repos/acme/widgets/issues/7",
            &CancellationToken::new(),
        )
        .await
        .expect_err("connection refused must fail");
    assert_eq!(failure.kind, FailureKind::Network);
    assert!(failure.detail.contains("127.0.0.1:1"));
}

#[tokio::test]
async fn integration_cancellation_abandons_pending_fetches() {
    let server = MockServer::start();
    for path in [
        "/repos/acme/widgets/readme",
        "/repos/acme/widgets/issues/7",
        "/repos/acme/widgets/issues/7/comments",
    ] {
        server.mock(|when, then| {
            when.method(GET).path(path);
            then.status(200)
                .delay(Duration::from_millis(2_000))
                .json_body(json!({}));
        });
    }

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let failure = client_for(&server, 5_000)
        .aggregate(&context(), &cancel)
        .await
        .expect_err("cancelled aggregate must fail");
    assert_eq!(failure.kind, FailureKind::Cancelled);
    assert!(started.elapsed() < Duration::from_millis(1_500));
}

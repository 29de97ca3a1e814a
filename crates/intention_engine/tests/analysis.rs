use std::sync::{Arc, Mutex};
use std::time::Duration;

use intention_engine::{
    AnalysisError, AnalysisSettings, Analyzer, ProgressSink, ResponsesAnalyzer, Stage,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REPO_URL: &str = "https://github.com/acme/shop";
const GHERKIN: &str = "Feature: End-to-End Summary\n  Scenario: Checkout\n    Given a cart";

#[derive(Default)]
struct TestSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl TestSink {
    fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl ProgressSink for TestSink {
    fn emit(&self, message: String) {
        self.lines.lock().unwrap().push(message);
    }
}

fn settings(server: &MockServer) -> AnalysisSettings {
    AnalysisSettings {
        api_key: Some("sk-test".to_string()),
        allow_web: true,
        base_url: server.uri(),
        poll_interval: Duration::from_millis(10),
        poll_timeout: Duration::from_secs(2),
        ..AnalysisSettings::default()
    }
}

fn completed(id: &str, text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": id,
        "status": "completed",
        "output_text": text,
    }))
}

/// Mounts one POST answer per call, consumed in order.
async fn mount_posts(server: &MockServer, answers: Vec<ResponseTemplate>) {
    for answer in answers {
        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(answer)
            .up_to_n_times(1)
            .mount(server)
            .await;
    }
}

async fn request_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|req| req.method.as_str() == "POST")
        .map(|req| serde_json::from_slice(&req.body).unwrap())
        .collect()
}

#[tokio::test]
async fn three_calls_produce_refined_gherkin_and_stage_markers() {
    intention_logging::initialize_for_tests();
    let server = MockServer::start().await;
    mount_posts(
        &server,
        vec![
            completed("plan", "1. Checkout flow"),
            completed("gen", "Feature: Draft"),
            completed("ref", &format!("```gherkin\n{GHERKIN}\n```\n")),
        ],
    )
    .await;

    let analyzer = ResponsesAnalyzer::new(settings(&server)).unwrap();
    let sink = TestSink::default();
    let gherkin = analyzer.analyze(REPO_URL, &sink).await.unwrap();

    assert_eq!(gherkin, format!("```gherkin\n{GHERKIN}\n```"));

    let lines = sink.lines();
    assert_eq!(lines[0], "Using link-based analyzer (model: gpt-4.1-mini)");
    let position = |needle: &str| lines.iter().position(|l| l == needle).unwrap();
    assert!(position(&Stage::Planning.tag()) < position(&Stage::Generating.tag()));
    assert!(position(&Stage::Generating.tag()) < position(&Stage::Refining.tag()));
    assert!(lines.contains(&"::plan::\n1. Checkout flow".to_string()));
    assert!(lines.contains(&"Planning completed (16 chars)".to_string()));
    assert!(lines.contains(&"Refining Gherkin organization and structure".to_string()));

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies.len(), 3);
    assert_eq!(bodies[0]["model"], "gpt-4.1-mini");
    assert_eq!(bodies[0]["tools"], json!([{ "type": "web_search" }]));
    assert_eq!(bodies[1]["tools"], json!([{ "type": "web_search" }]));
    assert!(bodies[2].get("tools").is_none());
    let refine_prompt = bodies[2]["input"][0]["content"][0]["text"].as_str().unwrap();
    assert!(refine_prompt.contains("Feature: Draft"));
}

#[tokio::test]
async fn unfinished_response_is_polled_until_completed() {
    let server = MockServer::start().await;
    mount_posts(
        &server,
        vec![
            completed("plan", "plan"),
            ResponseTemplate::new(200).set_body_json(json!({ "id": "gen", "status": "queued" })),
            completed("ref", ""),
        ],
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/v1/responses/gen"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "gen", "status": "in_progress" })),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/responses/gen"))
        .respond_with(completed("gen", GHERKIN))
        .mount(&server)
        .await;

    let analyzer = ResponsesAnalyzer::new(settings(&server)).unwrap();
    let sink = TestSink::default();
    let gherkin = analyzer.analyze(REPO_URL, &sink).await.unwrap();

    // Empty refinement falls back to the generated text.
    assert_eq!(gherkin, GHERKIN);
    let lines = sink.lines();
    assert!(lines.contains(&"Service status: queued. Polling for completion...".to_string()));
    assert!(lines.contains(&"Service status: in_progress".to_string()));
    assert!(lines.contains(&"Service status: completed".to_string()));
}

#[tokio::test]
async fn terminal_poll_status_fails_the_analysis() {
    let server = MockServer::start().await;
    mount_posts(
        &server,
        vec![ResponseTemplate::new(200).set_body_json(json!({ "id": "plan", "status": "queued" }))],
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/v1/responses/plan"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "plan", "status": "failed" })),
        )
        .mount(&server)
        .await;

    let analyzer = ResponsesAnalyzer::new(settings(&server)).unwrap();
    let err = analyzer
        .analyze(REPO_URL, &TestSink::default())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        AnalysisError::Terminal {
            status: "failed".to_string()
        }
    );
}

#[tokio::test]
async fn poll_window_elapsing_keeps_latest_output() {
    let server = MockServer::start().await;
    mount_posts(
        &server,
        vec![
            completed("plan", "plan"),
            ResponseTemplate::new(200).set_body_json(json!({
                "id": "gen",
                "status": "in_progress",
                "output_text": "Feature: Partial",
            })),
            completed("ref", ""),
        ],
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/v1/responses/gen"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "gen", "status": "in_progress" })),
        )
        .mount(&server)
        .await;

    let analyzer = ResponsesAnalyzer::new(AnalysisSettings {
        poll_timeout: Duration::from_millis(60),
        ..settings(&server)
    })
    .unwrap();
    let sink = TestSink::default();
    let gherkin = analyzer.analyze(REPO_URL, &sink).await.unwrap();

    assert_eq!(gherkin, "Feature: Partial");
    assert!(sink
        .lines()
        .iter()
        .any(|l| l.starts_with("Polling window elapsed; last status: in_progress")));
}

#[tokio::test]
async fn http_error_surfaces_service_message() {
    let server = MockServer::start().await;
    mount_posts(
        &server,
        vec![ResponseTemplate::new(401)
            .set_body_json(json!({ "error": { "message": "Incorrect API key provided" } }))],
    )
    .await;

    let analyzer = ResponsesAnalyzer::new(settings(&server)).unwrap();
    let err = analyzer
        .analyze(REPO_URL, &TestSink::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "OpenAI error: Incorrect API key provided");
    assert!(matches!(err, AnalysisError::HttpStatus { status: 401, .. }));
}

#[tokio::test]
async fn http_error_without_json_body_reports_status_code() {
    let server = MockServer::start().await;
    mount_posts(&server, vec![ResponseTemplate::new(502).set_body_string("bad gateway")]).await;

    let analyzer = ResponsesAnalyzer::new(settings(&server)).unwrap();
    let err = analyzer
        .analyze(REPO_URL, &TestSink::default())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        AnalysisError::HttpStatus {
            status: 502,
            message: "HTTP 502".to_string()
        }
    );
}

#[tokio::test]
async fn empty_generation_is_an_error() {
    let server = MockServer::start().await;
    mount_posts(
        &server,
        vec![completed("plan", "plan"), completed("gen", "   ")],
    )
    .await;

    let analyzer = ResponsesAnalyzer::new(settings(&server)).unwrap();
    let err = analyzer
        .analyze(REPO_URL, &TestSink::default())
        .await
        .unwrap_err();
    assert_eq!(err, AnalysisError::EmptyResponse);
}

#[tokio::test]
async fn oversized_response_is_rejected() {
    let server = MockServer::start().await;
    mount_posts(&server, vec![completed("plan", &"x".repeat(512))]).await;

    let analyzer = ResponsesAnalyzer::new(AnalysisSettings {
        max_response_bytes: 64,
        ..settings(&server)
    })
    .unwrap();
    let err = analyzer
        .analyze(REPO_URL, &TestSink::default())
        .await
        .unwrap_err();
    assert_eq!(err, AnalysisError::TooLarge { max_bytes: 64 });
}

#[tokio::test]
async fn missing_key_and_disabled_web_fail_before_any_request() {
    let server = MockServer::start().await;
    let sink = TestSink::default();

    let no_key = ResponsesAnalyzer::new(AnalysisSettings {
        api_key: Some("  ".to_string()),
        ..settings(&server)
    })
    .unwrap();
    let err = no_key.analyze(REPO_URL, &sink).await.unwrap_err();
    assert_eq!(err.to_string(), "Missing OPENAI_API_SECRET");

    let no_web = ResponsesAnalyzer::new(AnalysisSettings {
        allow_web: false,
        ..settings(&server)
    })
    .unwrap();
    let err = no_web.analyze(REPO_URL, &sink).await.unwrap_err();
    assert_eq!(err, AnalysisError::WebAccessDisabled);

    assert!(sink.lines().is_empty());
    assert!(request_bodies(&server).await.is_empty());
}

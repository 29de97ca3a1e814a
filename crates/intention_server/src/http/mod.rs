//! HTTP surface: job submission, progress streaming and health.
mod error;
mod progress;

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use intention_core::parse_repo_input;
use intention_engine::Orchestrator;
use intention_logging::intention_info;
use serde_json::{json, Value};

pub use error::AppError;
pub use progress::sse_event;

const MISSING_REPO: &str = "Missing repo. Provide owner/repo or GitHub URL.";

#[derive(Clone)]
pub struct AppState {
    orchestrator: Orchestrator,
    heartbeat: Duration,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, heartbeat: Duration) -> Self {
        Self {
            orchestrator,
            heartbeat,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/generate", post(generate))
        .route("/api/progress/{job_id}", get(progress::progress))
        .route("/health", get(health))
        .with_state(state)
}

/// Body `{ repo, branch? }`. Parsed by hand so a missing or non-string
/// `repo` gets the same 400 as an unparseable one.
async fn generate(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>, AppError> {
    let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let repo = request
        .get("repo")
        .and_then(Value::as_str)
        .filter(|repo| !repo.trim().is_empty())
        .ok_or_else(|| AppError::bad_request(MISSING_REPO))?;
    let branch = request.get("branch").and_then(Value::as_str);

    let repo_ref = parse_repo_input(repo)
        .map_err(|err| AppError::bad_request(err.to_string()))?
        .with_branch(branch);
    let job_id = state.orchestrator.start_generation(&repo_ref);
    intention_info!("Accepted generation request for {} as job {}", repo_ref, job_id);
    Ok(Json(json!({ "jobId": job_id })))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::http::{header, HeaderName, HeaderValue};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use intention_core::{JobEvent, JobId};
use intention_logging::intention_debug;
use serde_json::json;
use tokio_stream::StreamExt as _;

use super::{AppError, AppState};

/// Server-sent events for one job: the replayed history first, then live
/// events. Dropping the connection drops the subscription; the job keeps
/// running.
pub(super) async fn progress(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response, AppError> {
    let job_id = JobId::new(job_id);
    let subscription = state
        .orchestrator
        .registry()
        .subscribe(&job_id)
        .ok_or_else(|| AppError::not_found(format!("job {job_id} not found")))?;
    intention_debug!(
        "Subscriber {} attached to job {}",
        subscription.id(),
        job_id
    );

    let stream = subscription.map(|event| Ok::<Event, Infallible>(sse_event(event)));
    let mut response = Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(state.heartbeat).text("ping"))
        .into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(
        HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );
    Ok(response)
}

pub fn sse_event(event: JobEvent) -> Event {
    let (name, data) = match event {
        JobEvent::Status(status) => ("status", json!({ "status": status })),
        JobEvent::Log(message) => ("log", json!({ "message": message })),
        JobEvent::Done { gherkin } => ("done", json!({ "gherkin": gherkin })),
    };
    Event::default().event(name).data(data.to_string())
}

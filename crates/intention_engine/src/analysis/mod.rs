//! Repository analysis against a Responses-style text generation service.
//!
//! Three sequential calls: a testability plan, the Gherkin itself and a
//! refinement pass that enforces feature order and the outline convention.
//! Every call may come back unfinished, in which case it is polled until it
//! completes or the poll window closes.
mod prompts;
mod response;

use std::time::Duration;

use futures_util::StreamExt;
use intention_core::gherkin::{check_document, check_feature_order};
use intention_logging::{intention_debug, intention_info};
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};

pub use response::extract_response_text;

pub const STAGE_PREFIX: &str = "::stage::";
pub const PLAN_PREFIX: &str = "::plan::\n";

const TERMINAL_FAILURES: [&str; 3] = ["failed", "expired", "cancelled"];

#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub api_key: Option<String>,
    pub model: String,
    /// Web search must be explicitly allowed; the analyzer refuses to run otherwise.
    pub allow_web: bool,
    pub base_url: String,
    pub temperature: f64,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_response_bytes: u64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4.1-mini".to_string(),
            allow_web: false,
            base_url: "https://api.openai.com".to_string(),
            temperature: 0.2,
            poll_interval: Duration::from_millis(1500),
            poll_timeout: Duration::from_secs(45),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(180),
            max_response_bytes: 8 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    #[error("Missing OPENAI_API_SECRET")]
    MissingApiKey,
    #[error("OPENAI_ALLOW_WEB not enabled")]
    WebAccessDisabled,
    #[error("OpenAI error: {message}")]
    HttpStatus { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("response is not valid JSON: {0}")]
    Decode(String),
    #[error("response exceeds {max_bytes} bytes")]
    TooLarge { max_bytes: u64 },
    #[error("response ended with status `{status}`")]
    Terminal { status: String },
    #[error("link-based response was empty")]
    EmptyResponse,
}

/// Receives human-readable progress lines while an analysis runs.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, message: String);
}

#[async_trait::async_trait]
pub trait Analyzer: Send + Sync {
    /// Final Gherkin for the repository at `repo_url`.
    async fn analyze(&self, repo_url: &str, sink: &dyn ProgressSink)
        -> Result<String, AnalysisError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Planning,
    Generating,
    Refining,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Planning => "planning",
            Stage::Generating => "generating",
            Stage::Refining => "refining",
        }
    }

    pub fn tag(self) -> String {
        format!("{STAGE_PREFIX}{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ResponsesAnalyzer {
    settings: AnalysisSettings,
    client: reqwest::Client,
}

impl ResponsesAnalyzer {
    pub fn new(settings: AnalysisSettings) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| AnalysisError::Transport(err.to_string()))?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    fn endpoint(&self, tail: &str) -> String {
        format!(
            "{}/v1/responses{tail}",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    /// One prompt round trip, polling when the service answers before the
    /// response is complete. `None` when no text came back.
    async fn respond(
        &self,
        api_key: &str,
        prompt: String,
        use_web: bool,
        sink: &dyn ProgressSink,
    ) -> Result<Option<String>, AnalysisError> {
        let mut body = json!({
            "model": self.settings.model,
            "input": [{
                "role": "user",
                "content": [{ "type": "input_text", "text": prompt }],
            }],
            "temperature": self.settings.temperature,
        });
        if use_web {
            body["tools"] = json!([{ "type": "web_search" }]);
            body["tool_choice"] = json!("auto");
        }
        let payload =
            serde_json::to_vec(&body).map_err(|err| AnalysisError::Decode(err.to_string()))?;

        let response = self
            .client
            .post(self.endpoint(""))
            .bearer_auth(api_key)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let mut data = self.read_json(response).await?;

        let status = status_of(&data);
        let id = data.get("id").and_then(Value::as_str).map(str::to_string);
        if let (Some(mut status), Some(id)) = (status, id) {
            if status != "completed" {
                sink.emit(format!(
                    "Service status: {status}. Polling for completion..."
                ));
                status = self.poll(api_key, &id, &mut data, status, sink).await?;
                intention_debug!("Response {} settled with status {}", id, status);
            }
        }

        Ok(extract_response_text(&data)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty()))
    }

    /// Poll `id` until completion, a terminal failure or the poll window
    /// closes; on timeout whatever output was last seen is kept.
    async fn poll(
        &self,
        api_key: &str,
        id: &str,
        data: &mut Value,
        mut status: String,
        sink: &dyn ProgressSink,
    ) -> Result<String, AnalysisError> {
        let deadline = tokio::time::Instant::now() + self.settings.poll_timeout;
        loop {
            if tokio::time::Instant::now() >= deadline {
                sink.emit(format!(
                    "Polling window elapsed; last status: {status}. Using the latest output."
                ));
                return Ok(status);
            }
            tokio::time::sleep(self.settings.poll_interval).await;

            let response = self
                .client
                .get(self.endpoint(&format!("/{id}")))
                .bearer_auth(api_key)
                .send()
                .await
                .map_err(map_reqwest_error)?;
            let latest = self.read_json(response).await?;
            merge_poll_update(data, latest);

            if let Some(next) = status_of(data) {
                if next != status {
                    sink.emit(format!("Service status: {next}"));
                    status = next;
                }
            }
            if status == "completed" {
                return Ok(status);
            }
            if TERMINAL_FAILURES.contains(&status.as_str()) {
                return Err(AnalysisError::Terminal { status });
            }
        }
    }

    async fn read_json(&self, response: reqwest::Response) -> Result<Value, AnalysisError> {
        let status = response.status();
        let max_bytes = self.settings.max_response_bytes;
        if response.content_length().is_some_and(|len| len > max_bytes) {
            return Err(AnalysisError::TooLarge { max_bytes });
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            if bytes.len() as u64 + chunk.len() as u64 > max_bytes {
                return Err(AnalysisError::TooLarge { max_bytes });
            }
            bytes.extend_from_slice(&chunk);
        }

        let parsed = serde_json::from_slice::<Value>(&bytes);
        if status.as_u16() >= 400 {
            let message = parsed
                .ok()
                .and_then(|v| {
                    v.pointer("/error/message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(AnalysisError::HttpStatus {
                status: status.as_u16(),
                message,
            });
        }
        parsed.map_err(|err| AnalysisError::Decode(err.to_string()))
    }
}

#[async_trait::async_trait]
impl Analyzer for ResponsesAnalyzer {
    async fn analyze(
        &self,
        repo_url: &str,
        sink: &dyn ProgressSink,
    ) -> Result<String, AnalysisError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(AnalysisError::MissingApiKey)?;
        if !self.settings.allow_web {
            return Err(AnalysisError::WebAccessDisabled);
        }
        intention_info!("Analyzing {} with model {}", repo_url, self.settings.model);
        sink.emit(format!(
            "Using link-based analyzer (model: {})",
            self.settings.model
        ));

        sink.emit(Stage::Planning.tag());
        let plan = self
            .respond(api_key, prompts::plan(repo_url), true, sink)
            .await?;
        if let Some(plan) = &plan {
            sink.emit(format!("Planning completed ({} chars)", plan.chars().count()));
            sink.emit(format!("{PLAN_PREFIX}{plan}"));
        }

        sink.emit(Stage::Generating.tag());
        let initial = self
            .respond(
                api_key,
                prompts::generate(repo_url, plan.as_deref()),
                true,
                sink,
            )
            .await?
            .ok_or(AnalysisError::EmptyResponse)?;
        report_conformance(sink, "Generated", &initial);

        sink.emit(Stage::Refining.tag());
        sink.emit("Refining Gherkin organization and structure".to_string());
        let refined = self
            .respond(api_key, prompts::refine(&initial), false, sink)
            .await?;

        let gherkin = refined.unwrap_or(initial).trim().to_string();
        report_conformance(sink, "Refined", &gherkin);
        Ok(gherkin)
    }
}

fn status_of(data: &Value) -> Option<String> {
    data.get("status")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Fold the fields a poll may update into the running response.
fn merge_poll_update(data: &mut Value, latest: Value) {
    let Value::Object(latest) = latest else {
        return;
    };
    if !data.is_object() {
        *data = json!({});
    }
    for key in ["status", "output", "output_text", "error"] {
        if let Some(value) = latest.get(key).filter(|v| !v.is_null()) {
            data[key] = value.clone();
        }
    }
}

fn report_conformance(sink: &dyn ProgressSink, label: &str, gherkin: &str) {
    match check_document(gherkin) {
        Ok(issues) => {
            sink.emit(format!(
                "{label} Gherkin: {} convention issue(s)",
                issues.len()
            ));
            for issue in &issues {
                intention_debug!("{} Gherkin convention issue: {}", label, issue);
            }
        }
        Err(err) => sink.emit(format!("{label} Gherkin could not be parsed: {err}")),
    }
    if !check_feature_order(gherkin).in_order {
        sink.emit(format!("{label} Gherkin does not follow the mandated feature order"));
    }
}

fn map_reqwest_error(err: reqwest::Error) -> AnalysisError {
    if err.is_timeout() {
        return AnalysisError::Timeout(err.to_string());
    }
    AnalysisError::Transport(err.to_string())
}

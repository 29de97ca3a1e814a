use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use intention_core::{JobId, JobStatus, RepoRef};
use intention_logging::{intention_error, intention_info, intention_warn};

use crate::analysis::{Analyzer, ProgressSink};
use crate::registry::JobRegistry;

/// Forwards analysis progress into a job's log.
pub struct JobLogSink {
    registry: JobRegistry,
    job_id: JobId,
}

impl JobLogSink {
    pub fn new(registry: JobRegistry, job_id: JobId) -> Self {
        Self { registry, job_id }
    }
}

impl ProgressSink for JobLogSink {
    fn emit(&self, message: String) {
        if let Err(err) = self.registry.append_log(&self.job_id, &message) {
            intention_warn!("Dropping progress line for {}: {}", self.job_id, err);
        }
    }
}

/// Starts generation jobs and drives each to exactly one terminal state.
#[derive(Clone)]
pub struct Orchestrator {
    registry: JobRegistry,
    analyzer: Arc<dyn Analyzer>,
}

impl Orchestrator {
    pub fn new(registry: JobRegistry, analyzer: Arc<dyn Analyzer>) -> Self {
        Self { registry, analyzer }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Create the job and return its id; the analysis runs on a spawned task.
    /// Must be called from within a tokio runtime.
    pub fn start_generation(&self, repo: &RepoRef) -> JobId {
        let job_id = self.registry.create_job();
        intention_info!("Job {} started for {}", job_id, repo);

        let registry = self.registry.clone();
        let analyzer = self.analyzer.clone();
        let url = repo.url();
        let id = job_id.clone();
        tokio::spawn(async move {
            run_job(registry, analyzer.as_ref(), id, url).await;
        });
        job_id
    }
}

async fn run_job(registry: JobRegistry, analyzer: &dyn Analyzer, job_id: JobId, url: String) {
    if let Err(err) = registry.set_status(&job_id, JobStatus::Running) {
        intention_warn!("Job {} could not start: {}", job_id, err);
        return;
    }
    log_line(&registry, &job_id, &format!("Analyzing {url}"));

    let sink = JobLogSink::new(registry.clone(), job_id.clone());
    let analysis = AssertUnwindSafe(analyzer.analyze(&url, &sink))
        .catch_unwind()
        .await;
    let outcome = match analysis {
        Ok(Ok(gherkin)) => {
            log_line(&registry, &job_id, "Generation complete.");
            Ok(gherkin)
        }
        Ok(Err(err)) => {
            intention_error!("Job {} failed: {}", job_id, err);
            log_line(&registry, &job_id, &format!("Error: {err}"));
            Err(err.to_string())
        }
        Err(_) => {
            intention_error!("Job {} panicked during analysis", job_id);
            log_line(&registry, &job_id, "Error: analysis task panicked");
            Err("analysis task panicked".to_string())
        }
    };

    if let Err(err) = registry.complete(&job_id, outcome) {
        intention_warn!("Job {} could not be completed: {}", job_id, err);
    }
}

fn log_line(registry: &JobRegistry, job_id: &JobId, message: &str) {
    if let Err(err) = registry.append_log(job_id, message) {
        intention_warn!("Job {} log dropped: {}", job_id, err);
    }
}

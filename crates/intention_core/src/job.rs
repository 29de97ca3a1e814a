use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque job identifier handed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }

    /// The only legal moves are pending -> running -> {done, error}.
    pub fn can_advance_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Done)
                | (JobStatus::Running, JobStatus::Error)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("job status cannot move from {from} to {to}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// One progress event as seen by a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    Status(JobStatus),
    Log(String),
    Done { gherkin: String },
}

/// Pure job state: status, append-only log history and the final result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    id: JobId,
    status: JobStatus,
    logs: Vec<String>,
    result: Option<String>,
}

impl JobRecord {
    pub fn new(id: JobId) -> Self {
        Self {
            id,
            status: JobStatus::Pending,
            logs: Vec::new(),
            result: None,
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    pub fn advance(&mut self, next: JobStatus) -> Result<JobEvent, TransitionError> {
        if !self.status.can_advance_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(JobEvent::Status(next))
    }

    /// Appends an already formatted line and returns the matching event.
    pub fn push_log(&mut self, line: String) -> JobEvent {
        self.logs.push(line.clone());
        JobEvent::Log(line)
    }

    /// Terminal transition. Returns the status event followed by the done event.
    pub fn finish(
        &mut self,
        outcome: Result<String, String>,
    ) -> Result<[JobEvent; 2], TransitionError> {
        let (next, gherkin) = match outcome {
            Ok(gherkin) => (JobStatus::Done, Some(gherkin)),
            Err(_) => (JobStatus::Error, None),
        };
        let status = self.advance(next)?;
        self.result = gherkin;
        Ok([status, self.done_event()])
    }

    /// History a late subscriber must see: status, every log line, and the
    /// done event when the job already finished.
    pub fn replay(&self) -> Vec<JobEvent> {
        let mut events = Vec::with_capacity(self.logs.len() + 2);
        events.push(JobEvent::Status(self.status));
        events.extend(self.logs.iter().cloned().map(JobEvent::Log));
        if self.status.is_terminal() {
            events.push(self.done_event());
        }
        events
    }

    fn done_event(&self) -> JobEvent {
        JobEvent::Done {
            gherkin: self.result.clone().unwrap_or_default(),
        }
    }
}

//! In-process job registry and per-subscriber progress fan-out.
//!
//! The map sits behind a `std::sync::Mutex` that is only held for short,
//! synchronous sections, so events reach every subscriber in the order the
//! registry produced them.
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use futures_util::Stream;
use intention_core::{JobEvent, JobId, JobRecord, JobStatus, TransitionError};
use intention_logging::{intention_debug, intention_info};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// How long a finished job stays visible.
    pub retention: Duration,
    /// Upper bound on retained jobs; the oldest finished ones go first.
    pub max_jobs: usize,
    pub sweep_interval: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(60 * 60),
            max_jobs: 256,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("job {0} not found")]
    UnknownJob(JobId),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

pub type SubscriberId = u64;

struct JobEntry {
    record: JobRecord,
    subscribers: Vec<(SubscriberId, UnboundedSender<JobEvent>)>,
    finished: Option<Instant>,
}

impl JobEntry {
    /// Deliver to every live subscriber; closed channels are pruned.
    fn broadcast(&mut self, event: &JobEvent) {
        self.subscribers.retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }
}

struct RegistryInner {
    jobs: Mutex<HashMap<JobId, JobEntry>>,
    next_subscriber: AtomicU64,
    policy: RetentionPolicy,
}

impl RegistryInner {
    fn jobs(&self) -> MutexGuard<'_, HashMap<JobId, JobEntry>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unsubscribe(&self, job_id: &JobId, subscriber: SubscriberId) {
        if let Some(entry) = self.jobs().get_mut(job_id) {
            entry.subscribers.retain(|(id, _)| *id != subscriber);
        }
    }
}

/// Cheap to clone; all clones share one job map.
#[derive(Clone)]
pub struct JobRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new(RetentionPolicy::default())
    }
}

impl JobRegistry {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                jobs: Mutex::new(HashMap::new()),
                next_subscriber: AtomicU64::new(1),
                policy,
            }),
        }
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.inner.policy
    }

    pub fn create_job(&self) -> JobId {
        let id = JobId::new(Uuid::new_v4().to_string());
        let entry = JobEntry {
            record: JobRecord::new(id.clone()),
            subscribers: Vec::new(),
            finished: None,
        };
        self.inner.jobs().insert(id.clone(), entry);
        intention_debug!("Created job {}", id);
        id
    }

    /// Register a subscriber. The returned channel first replays the job's
    /// status, its log history and, when finished, the done event.
    pub fn subscribe(&self, job_id: &JobId) -> Option<Subscription> {
        let mut jobs = self.inner.jobs();
        let entry = jobs.get_mut(job_id)?;
        let (tx, rx) = unbounded_channel();
        for event in entry.record.replay() {
            // The receiver is still in hand, so this cannot fail.
            let _ = tx.send(event);
        }
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        entry.subscribers.push((id, tx));
        Some(Subscription {
            id,
            job_id: job_id.clone(),
            rx,
            registry: Arc::downgrade(&self.inner),
        })
    }

    /// No-op when the subscriber or the job is already gone.
    pub fn unsubscribe(&self, job_id: &JobId, subscriber: SubscriberId) {
        self.inner.unsubscribe(job_id, subscriber);
    }

    pub fn append_log(&self, job_id: &JobId, message: &str) -> Result<(), JobError> {
        let line = format!(
            "{} {message}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
        );
        let mut jobs = self.inner.jobs();
        let entry = jobs
            .get_mut(job_id)
            .ok_or_else(|| JobError::UnknownJob(job_id.clone()))?;
        let event = entry.record.push_log(line);
        entry.broadcast(&event);
        Ok(())
    }

    pub fn set_status(&self, job_id: &JobId, status: JobStatus) -> Result<(), JobError> {
        let mut jobs = self.inner.jobs();
        let entry = jobs
            .get_mut(job_id)
            .ok_or_else(|| JobError::UnknownJob(job_id.clone()))?;
        let event = entry.record.advance(status)?;
        if status.is_terminal() {
            entry.finished = Some(Instant::now());
        }
        entry.broadcast(&event);
        Ok(())
    }

    /// Terminal transition: `status` then `done` go out back to back.
    pub fn complete(
        &self,
        job_id: &JobId,
        outcome: Result<String, String>,
    ) -> Result<(), JobError> {
        let mut jobs = self.inner.jobs();
        let entry = jobs
            .get_mut(job_id)
            .ok_or_else(|| JobError::UnknownJob(job_id.clone()))?;
        let events = entry.record.finish(outcome)?;
        entry.finished = Some(Instant::now());
        for event in &events {
            entry.broadcast(event);
        }
        Ok(())
    }

    pub fn snapshot(&self, job_id: &JobId) -> Option<JobRecord> {
        self.inner.jobs().get(job_id).map(|e| e.record.clone())
    }

    pub fn subscriber_count(&self, job_id: &JobId) -> usize {
        self.inner
            .jobs()
            .get(job_id)
            .map_or(0, |e| e.subscribers.len())
    }

    pub fn len(&self) -> usize {
        self.inner.jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop finished jobs older than the retention window, then the oldest
    /// finished jobs beyond `max_jobs`. Running jobs are never evicted.
    pub fn evict_finished(&self, now: Instant) -> usize {
        let policy = &self.inner.policy;
        let mut jobs = self.inner.jobs();
        let before = jobs.len();

        jobs.retain(|_, entry| match entry.finished {
            Some(at) => now.saturating_duration_since(at) < policy.retention,
            None => true,
        });

        if jobs.len() > policy.max_jobs {
            let mut finished: Vec<(Instant, JobId)> = jobs
                .iter()
                .filter_map(|(id, e)| e.finished.map(|at| (at, id.clone())))
                .collect();
            finished.sort();
            let excess = jobs.len() - policy.max_jobs;
            for (_, id) in finished.into_iter().take(excess) {
                jobs.remove(&id);
            }
        }
        before - jobs.len()
    }

    /// Periodically run [`JobRegistry::evict_finished`] until `cancel` fires.
    pub fn spawn_sweeper(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let registry = self.clone();
        let every = self.inner.policy.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = registry.evict_finished(Instant::now());
                        if evicted > 0 {
                            intention_info!("Evicted {} finished job(s)", evicted);
                        }
                    }
                }
            }
            intention_debug!("Job sweeper stopped");
        })
    }
}

/// A live subscription; dropping it unsubscribes.
pub struct Subscription {
    id: SubscriberId,
    job_id: JobId,
    rx: UnboundedReceiver<JobEvent>,
    registry: Weak<RegistryInner>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Next event; `None` once the job is evicted.
    pub async fn recv(&mut self) -> Option<JobEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<JobEvent> {
        self.rx.try_recv().ok()
    }
}

impl Stream for Subscription {
    type Item = JobEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<JobEvent>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        match self.registry.upgrade() {
            Some(inner) => inner.unsubscribe(&self.job_id, self.id),
            None => intention_debug!("Registry gone before subscriber {} dropped", self.id),
        }
    }
}

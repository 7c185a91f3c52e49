//! Durable job queue: concurrency-limited, per-worker rate-limited,
//! exponential-backoff retry. Grounded on the dead-letter queue's retry
//! model but structured as a forward queue (a job runs until it succeeds
//! or exhausts its retries) rather than an after-the-fact failure log.

pub mod retry;
pub mod job;

pub use job::{Job, JobStatus};
pub use retry::RetryPolicy;

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::error::{IngestError, Result};

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct QueueStats {
    pub waiting: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: Job) -> Result<()>;
    /// Atomically claims the oldest ready job (`run_after <= now`, status
    /// `Pending`), marking it `Running` and bumping its attempt counter.
    async fn claim_ready(&self) -> Result<Option<Job>>;
    async fn complete(&self, id: Uuid) -> Result<()>;
    /// Reschedules the job per `policy`, or marks it permanently `Failed`
    /// once its attempt budget is exhausted.
    async fn fail(&self, id: Uuid, error: String, policy: &RetryPolicy) -> Result<()>;
    async fn depth(&self) -> usize;
    async fn stats(&self) -> QueueStats;
}

#[derive(Default)]
pub struct InMemoryJobQueue {
    jobs: Mutex<VecDeque<Job>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job: Job) -> Result<()> {
        self.jobs.lock().await.push_back(job);
        Ok(())
    }

    async fn claim_ready(&self) -> Result<Option<Job>> {
        let mut guard = self.jobs.lock().await;
        let now = Utc::now();
        let position = guard
            .iter()
            .position(|j| j.status == JobStatus::Pending && j.run_after <= now);

        Ok(position.map(|idx| {
            let mut job = guard.remove(idx).expect("position was just found");
            job.status = JobStatus::Running;
            job.attempt += 1;
            job.updated_at = now;
            guard.push_back(job.clone());
            job
        }))
    }

    async fn complete(&self, id: Uuid) -> Result<()> {
        let mut guard = self.jobs.lock().await;
        if let Some(job) = guard.iter_mut().find(|j| j.id == id) {
            job.status = JobStatus::Succeeded;
            job.updated_at = Utc::now();
            Ok(())
        } else {
            Err(IngestError::JobNotFound(id.to_string()))
        }
    }

    async fn fail(&self, id: Uuid, error: String, policy: &RetryPolicy) -> Result<()> {
        let mut guard = self.jobs.lock().await;
        let job = guard
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| IngestError::JobNotFound(id.to_string()))?;

        job.last_error = Some(error);
        job.updated_at = Utc::now();

        if policy.should_retry(job.attempt) {
            job.status = JobStatus::Pending;
            let delay = policy.delay_secs(job.attempt);
            job.run_after = Utc::now() + chrono::Duration::seconds(delay as i64);
        } else {
            job.status = JobStatus::Failed;
        }

        Ok(())
    }

    async fn depth(&self) -> usize {
        self.jobs
            .lock()
            .await
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .count()
    }

    async fn stats(&self) -> QueueStats {
        let guard = self.jobs.lock().await;
        let mut stats = QueueStats::default();
        for job in guard.iter() {
            match job.status {
                JobStatus::Pending => stats.waiting += 1,
                JobStatus::Running => stats.active += 1,
                JobStatus::Succeeded => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }
}

/// Runs `handler` against jobs popped from `queue`, bounded by a semaphore
/// for overall concurrency and a fixed-interval ticker per worker for the
/// per-worker rate limit. Returns once `shutdown` fires, letting any jobs
/// already claimed finish before returning.
pub async fn run_workers<Q, H, Fut>(
    queue: Arc<Q>,
    handler: H,
    concurrency: usize,
    max_jobs_per_sec: u32,
    retry_policy: RetryPolicy,
    shutdown: tokio_util::sync::CancellationToken,
) where
    Q: JobQueue + 'static,
    H: Fn(Job) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<()>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let handler = Arc::new(handler);
    let min_interval = Duration::from_secs_f64(1.0 / max_jobs_per_sec.max(1) as f64);
    let mut ticker = interval(min_interval);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("job worker pool shutting down");
                break;
            }
            _ = ticker.tick() => {
                let permit = match semaphore.clone().try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => continue,
                };

                let claimed = match queue.claim_ready().await {
                    Ok(Some(job)) => job,
                    Ok(None) => {
                        drop(permit);
                        continue;
                    }
                    Err(e) => {
                        error!(error = %e, "failed to claim job");
                        drop(permit);
                        continue;
                    }
                };

                let queue = queue.clone();
                let handler = handler.clone();
                let policy = retry_policy;
                let job_id = claimed.id;

                tokio::spawn(async move {
                    let _permit = permit;
                    match handler(claimed).await {
                        Ok(()) => {
                            if let Err(e) = queue.complete(job_id).await {
                                error!(error = %e, job_id = %job_id, "failed to mark job complete");
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, job_id = %job_id, "job attempt failed");
                            if let Err(e) = queue.fail(job_id, e.to_string(), &policy).await {
                                error!(error = %e, job_id = %job_id, "failed to record job failure");
                            }
                        }
                    }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::source::{CollectionJobKind, Source};

    fn sample_job() -> Job {
        Job::new(
            CollectionJobKind::PlaceDetails {
                source: Source::Google,
                external_id: "abc".to_string(),
            },
            3,
        )
    }

    #[tokio::test]
    async fn claim_marks_running_and_increments_attempt() {
        let queue = InMemoryJobQueue::new();
        queue.enqueue(sample_job()).await.unwrap();

        let claimed = queue.claim_ready().await.unwrap().unwrap();
        assert_eq!(claimed.attempt, 1);
        assert_eq!(claimed.status, JobStatus::Running);
    }

    #[tokio::test]
    async fn fail_reschedules_until_attempts_exhausted() {
        let queue = InMemoryJobQueue::new();
        let policy = RetryPolicy {
            jitter: false,
            base_delay_secs: 0,
            max_delay_secs: 0,
            ..RetryPolicy::default()
        };
        queue.enqueue(sample_job()).await.unwrap();

        for _ in 0..3 {
            let job = queue.claim_ready().await.unwrap().unwrap();
            queue.fail(job.id, "boom".into(), &policy).await.unwrap();
        }

        // A fourth claim should find nothing ready: the job is Failed, not
        // rescheduled, once it has burned its three attempts.
        assert_eq!(queue.depth().await, 0);
    }

    #[tokio::test]
    async fn successful_completion_leaves_nothing_pending() {
        let queue = InMemoryJobQueue::new();
        queue.enqueue(sample_job()).await.unwrap();
        let job = queue.claim_ready().await.unwrap().unwrap();
        queue.complete(job.id).await.unwrap();
        assert_eq!(queue.depth().await, 0);
    }
}

//! Fire-and-forget side effects.
//!
//! Jobs go through a bounded queue to a single worker loop, which runs up to
//! `concurrency` of them at once. A caller only ever learns whether its job
//! was queued; job failures are logged and counted in [`DispatchStats`],
//! never retried.
//!
//! ```text
//! record_share / schedule_captioning
//!        |  try_send (full or closed: dropped)
//!        v
//!   mpsc queue (queue_size)
//!        |
//!        v
//!   worker loop --semaphore(concurrency)--> JoinSet of jobs
//!                                              |
//!                                              +--> store / caption scheduler
//! ```

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use folio_config::DispatchConfig;
use folio_store::{Repository, ShareEvent};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Notify, Semaphore, mpsc};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// Handle returned by the external captioning service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub task_id: String,
}

/// External video captioning service.
#[async_trait]
pub trait CaptionScheduler: Send + Sync {
    async fn schedule_captioning(&self, media_id: i64, user_id: &str) -> Result<TaskHandle>;
}

pub type CaptionSchedulerHandle = Arc<dyn CaptionScheduler>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    RecordShare(ShareEvent),
    ScheduleCaptioning { media_id: i64, user_id: String },
}
impl Job {
    fn kind(&self) -> &'static str {
        match self {
            Self::RecordShare(_) => "record_share",
            Self::ScheduleCaptioning { .. } => "schedule_captioning",
        }
    }
}

/// Snapshot of job counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Accepted onto the queue.
    pub queued: u64,
    pub completed: u64,
    pub failed: u64,
    /// Rejected because the queue was full or shut down.
    pub dropped: u64,
}
impl DispatchStats {
    /// Accepted jobs that have not finished yet.
    pub fn pending(&self) -> u64 {
        self.queued.saturating_sub(self.completed + self.failed)
    }
}

#[derive(Default)]
struct Counters {
    queued: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    settled: Notify,
}
impl Counters {
    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            queued: self.queued.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            dropped: self.dropped.load(Ordering::SeqCst),
        }
    }

    fn settle(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::SeqCst);
        self.settled.notify_waiters();
    }
}

pub struct Dispatcher {
    jobs: mpsc::Sender<Job>,
    counters: Arc<Counters>,
    worker: JoinHandle<()>,
}

impl Dispatcher {
    /// Start the worker loop. Must be called from within a tokio runtime.
    pub fn spawn(repo: Repository, captions: CaptionSchedulerHandle, config: &DispatchConfig) -> Self {
        let (jobs, queue) = mpsc::channel(config.queue_size.max(1));
        let counters = Arc::new(Counters::default());
        let worker = Worker {
            queue,
            runner: Arc::new(Runner { repo, captions }),
            counters: Arc::clone(&counters),
            permits: Arc::new(Semaphore::new(config.concurrency.max(1))),
        };
        let worker = tokio::spawn(worker.run());
        Self { jobs, counters, worker }
    }

    /// Queue a job without waiting for it to run.
    ///
    /// Fails with [`ErrorKind::Dispatch`] if the queue is full or the worker
    /// has stopped; the job is counted as dropped either way.
    pub fn submit(&self, job: Job) -> Result<()> {
        let kind = job.kind();
        // Counted first so a fast job can never settle before it was queued.
        self.counters.queued.fetch_add(1, Ordering::SeqCst);
        let reason = match self.jobs.try_send(job) {
            Ok(()) => {
                debug!(job = kind, "job queued");
                return Ok(());
            },
            Err(mpsc::error::TrySendError::Full(_)) => "dispatch queue full",
            Err(mpsc::error::TrySendError::Closed(_)) => "dispatcher stopped",
        };
        self.counters.queued.fetch_sub(1, Ordering::SeqCst);
        self.counters.dropped.fetch_add(1, Ordering::SeqCst);
        warn!(job = kind, reason, "job dropped");
        exn::bail!(ErrorKind::Dispatch)
    }

    /// Record a share in the background. The outcome is never reported.
    pub fn record_share(&self, event: ShareEvent) {
        _ = self.submit(Job::RecordShare(event));
    }

    /// Ask the captioning service to process a video in the background.
    pub fn schedule_captioning(&self, media_id: i64, user_id: impl Into<String>) {
        _ = self.submit(Job::ScheduleCaptioning { media_id, user_id: user_id.into() });
    }

    pub fn stats(&self) -> DispatchStats {
        self.counters.snapshot()
    }

    /// Wait until every job queued so far has completed or failed.
    pub async fn wait_idle(&self) {
        loop {
            let settled = self.counters.settled.notified();
            tokio::pin!(settled);
            // Register before checking so a job finishing in between is not missed.
            settled.as_mut().enable();
            if self.counters.snapshot().pending() == 0 {
                return;
            }
            settled.await;
        }
    }

    /// Stop accepting jobs, run everything already queued, and wait for it.
    pub async fn shutdown(self) -> DispatchStats {
        let Self { jobs, counters, worker } = self;
        drop(jobs);
        if let Err(e) = worker.await {
            error!(error = %e, "dispatch worker panicked");
        }
        let stats = counters.snapshot();
        info!(
            queued = stats.queued,
            completed = stats.completed,
            failed = stats.failed,
            dropped = stats.dropped,
            "dispatcher shut down"
        );
        stats
    }
}

struct Runner {
    repo: Repository,
    captions: CaptionSchedulerHandle,
}
impl Runner {
    async fn run(&self, job: Job) -> Result<()> {
        match job {
            Job::RecordShare(event) => {
                self.repo.insert_share(&event).await.or_raise(|| ErrorKind::Store)?;
            },
            Job::ScheduleCaptioning { media_id, user_id } => {
                let handle = self.captions.schedule_captioning(media_id, &user_id).await?;
                self.repo.insert_video_task(media_id, &handle.task_id).await.or_raise(|| ErrorKind::Store)?;
                info!(media_id, task_id = %handle.task_id, "captioning scheduled");
            },
        }
        Ok(())
    }
}

struct Worker {
    queue: mpsc::Receiver<Job>,
    runner: Arc<Runner>,
    counters: Arc<Counters>,
    permits: Arc<Semaphore>,
}
impl Worker {
    async fn run(mut self) {
        let mut running: JoinSet<(&'static str, Result<()>)> = JoinSet::new();
        loop {
            tokio::select! {
                Some(finished) = running.join_next(), if !running.is_empty() => self.settle(finished),
                job = self.queue.recv() => {
                    let Some(job) = job else { break };
                    let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else { break };
                    let runner = Arc::clone(&self.runner);
                    running.spawn(async move {
                        let _permit = permit;
                        let kind = job.kind();
                        (kind, runner.run(job).await)
                    });
                },
            }
        }
        while let Some(finished) = running.join_next().await {
            self.settle(finished);
        }
    }

    fn settle(&self, finished: std::result::Result<(&'static str, Result<()>), JoinError>) {
        match finished {
            Ok((kind, Ok(()))) => {
                debug!(job = kind, "job completed");
                self.counters.settle(&self.counters.completed);
            },
            Ok((kind, Err(e))) => {
                warn!(job = kind, error = ?e, "job failed");
                self.counters.settle(&self.counters.failed);
            },
            Err(e) => {
                error!(error = %e, "job panicked");
                self.counters.settle(&self.counters.failed);
            },
        }
    }
}

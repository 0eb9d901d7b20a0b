//! Background extraction jobs.
//!
//! Jobs are sent over a channel to a single worker thread which runs each
//! one through [`ScanProcessor::run_with_retry`]. Shutdown is cooperative:
//! `shutdown` drains the queue, `stop` abandons it after the current job.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use medscan_llm::DocumentKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use super::processor::ScanProcessor;
use crate::config::RetryConfig;
use crate::models::ScanRecord;

/// Unit of background work: which record to extract and from which blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionJob {
    pub record_id: String,
    pub kind: DocumentKind,
    pub blob_id: String,
}

impl ExtractionJob {
    pub fn for_record(record: &ScanRecord) -> Self {
        Self {
            record_id: record.id.clone(),
            kind: record.kind,
            blob_id: record.blob_id.clone(),
        }
    }
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("job queue is closed")]
    Closed,

    #[error("job queue lock poisoned")]
    LockPoisoned,
}

/// Accepts jobs for asynchronous execution.
pub trait JobQueue: Send + Sync {
    fn enqueue(&self, job: ExtractionJob) -> Result<(), QueueError>;
}

/// Attempts and backoff for retryable failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
        }
    }

    /// Wait after failed attempt number `attempt` (1-based): `base * 2^(attempt-1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match 1u32.checked_shl(attempt.saturating_sub(1)) {
            Some(factor) => self.base_delay.saturating_mul(factor),
            None => Duration::MAX,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Worker thread draining the job channel.
pub struct BackgroundRunner {
    sender: Mutex<Option<Sender<ExtractionJob>>>,
    stop: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundRunner {
    /// Spawn the worker thread.
    pub fn start(processor: Arc<ScanProcessor>, policy: RetryPolicy) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));

        let worker_stop = stop.clone();
        let handle = std::thread::Builder::new()
            .name("medscan-jobs".into())
            .spawn(move || worker_loop(receiver, processor, policy, worker_stop))?;

        info!(max_attempts = policy.max_attempts, "background runner started");
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            stop,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Close the queue, let queued jobs finish and join the worker.
    pub fn shutdown(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        let handle = match self.handle.lock() {
            Ok(mut handle) => handle.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("background runner panicked");
            }
        }
    }

    /// Abandon queued jobs, interrupt retry waits and join the worker.
    ///
    /// Records left in `pending` or `processing` are picked up again by
    /// `ScanWorkflow::requeue_interrupted`.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.shutdown();
    }
}

impl JobQueue for BackgroundRunner {
    fn enqueue(&self, job: ExtractionJob) -> Result<(), QueueError> {
        let sender = self.sender.lock().map_err(|_| QueueError::LockPoisoned)?;
        match sender.as_ref() {
            Some(sender) => sender.send(job).map_err(|_| QueueError::Closed),
            None => Err(QueueError::Closed),
        }
    }
}

impl Drop for BackgroundRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(
    receiver: Receiver<ExtractionJob>,
    processor: Arc<ScanProcessor>,
    policy: RetryPolicy,
    stop: Arc<AtomicBool>,
) {
    while let Ok(job) = receiver.recv() {
        if stop.load(Ordering::SeqCst) {
            break;
        }
        if let Err(e) = processor.run_with_retry(&job, &policy, &stop) {
            error!(record_id = %job.record_id, error = %e, "background extraction failed");
        }
    }
    info!("background runner stopped");
}

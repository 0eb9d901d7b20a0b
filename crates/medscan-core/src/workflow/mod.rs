//! Scan record lifecycle.
//!
//! ```text
//! submit ─> pending ─┬─ sync ──> processing ─> extracted ─> confirmed
//!                    └─ async ─> (job queue) ─┘     └─> failed ─> reprocess
//! ```
//!
//! Small uploads are extracted in the caller's thread, large ones are queued
//! for the [`BackgroundRunner`]. Cancellation deletes any record that is not
//! confirmed; a job whose record disappeared finds out and does nothing.

mod jobs;
mod mode;
mod processor;

pub use jobs::*;
pub use mode::*;
pub use processor::*;

use std::sync::Arc;
use std::time::Duration;

use medscan_llm::DocumentKind;
use thiserror::Error;
use tracing::info;

use crate::config::PipelineConfig;
use crate::models::{ExtractionStatus, ScanPayload, ScanRecord};
use crate::store::{BlobError, BlobStore, ScanStore, StoreError};

/// Workflow errors.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Blob error: {0}")]
    Blob(#[from] BlobError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Scan record not found: {0}")]
    NotFound(String),

    #[error("Uploaded photo not found: {0}")]
    BlobNotFound(String),

    #[error("Scan record {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: ExtractionStatus,
        to: ExtractionStatus,
    },
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// What the caller gets back after submitting a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    /// Final record for sync runs, the pending record for async ones
    pub record: ScanRecord,
    pub mode: ExecutionMode,
    /// For progress messaging only
    pub estimated_duration: Duration,
}

/// Result of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Deleted,
    /// Confirmed records are permanent; nothing was changed
    AlreadyConfirmed,
    NotFound,
}

/// Entry point for creating, confirming and cancelling scans.
pub struct ScanWorkflow {
    processor: Arc<ScanProcessor>,
    queue: Arc<dyn JobQueue>,
    config: PipelineConfig,
}

impl ScanWorkflow {
    pub fn new(processor: Arc<ScanProcessor>, queue: Arc<dyn JobQueue>, config: PipelineConfig) -> Self {
        Self {
            processor,
            queue,
            config,
        }
    }

    fn store(&self) -> &dyn ScanStore {
        self.processor.store()
    }

    /// Create a pending record for an uploaded photo and start extraction.
    pub fn submit(
        &self,
        kind: DocumentKind,
        blob_id: &str,
        mode_override: ModeOverride,
    ) -> WorkflowResult<Submission> {
        let byte_size = self
            .processor
            .blobs()
            .byte_size(blob_id)?
            .ok_or_else(|| WorkflowError::BlobNotFound(blob_id.to_string()))?;

        let record = ScanRecord::new(kind, blob_id, byte_size);
        self.store().insert(&record)?;
        info!(record_id = %record.id, kind = %kind, byte_size, "scan submitted");

        self.dispatch(record, mode_override)
    }

    /// Move a failed record back to pending and extract it again.
    pub fn reprocess(&self, id: &str, mode_override: ModeOverride) -> WorkflowResult<Submission> {
        let record = self.get(id)?;
        self.transition(&record, ExtractionStatus::Pending, None)?;
        info!(record_id = %id, "scan resubmitted");

        let record = self.get(id)?;
        self.dispatch(record, mode_override)
    }

    /// Accept the extracted data.
    pub fn confirm(&self, id: &str) -> WorkflowResult<ScanRecord> {
        let record = self.get(id)?;
        self.transition(
            &record,
            ExtractionStatus::Confirmed,
            record.extracted_data.as_ref(),
        )?;
        info!(record_id = %id, "scan confirmed");
        self.get(id)
    }

    /// Delete a record unless it is confirmed.
    ///
    /// An in-flight job for the record discards its result.
    pub fn cancel(&self, id: &str) -> WorkflowResult<CancelOutcome> {
        let Some(record) = self.store().get(id)? else {
            return Ok(CancelOutcome::NotFound);
        };
        if record.extraction_status.is_locked() {
            return Ok(CancelOutcome::AlreadyConfirmed);
        }
        if !self.store().delete(id)? {
            return Ok(CancelOutcome::NotFound);
        }
        info!(record_id = %id, status = %record.extraction_status, "scan cancelled");
        Ok(CancelOutcome::Deleted)
    }

    /// Queue every record left pending or processing, e.g. after a restart.
    pub fn requeue_interrupted(&self) -> WorkflowResult<usize> {
        let mut count = 0;
        for status in [ExtractionStatus::Pending, ExtractionStatus::Processing] {
            for record in self.store().list_by_status(status)? {
                self.queue.enqueue(ExtractionJob::for_record(&record))?;
                count += 1;
            }
        }
        if count > 0 {
            info!(count, "interrupted scans requeued");
        }
        Ok(count)
    }

    pub fn get(&self, id: &str) -> WorkflowResult<ScanRecord> {
        self.store()
            .get(id)?
            .ok_or_else(|| WorkflowError::NotFound(id.to_string()))
    }

    fn dispatch(&self, record: ScanRecord, mode_override: ModeOverride) -> WorkflowResult<Submission> {
        let mode = decide_mode(
            record.byte_size,
            self.config.async_threshold_bytes,
            mode_override,
        );
        let estimated_duration = estimated_duration(record.byte_size, &self.config.estimate);
        let job = ExtractionJob::for_record(&record);

        let record = match mode {
            ExecutionMode::Sync => match self.processor.run_once(&job)? {
                AttemptOutcome::Finished(record) => record,
                _ => return Err(WorkflowError::NotFound(job.record_id)),
            },
            ExecutionMode::Async => {
                self.queue.enqueue(job)?;
                record
            }
        };

        Ok(Submission {
            record,
            mode,
            estimated_duration,
        })
    }

    fn transition(
        &self,
        record: &ScanRecord,
        to: ExtractionStatus,
        data: Option<&ScanPayload>,
    ) -> WorkflowResult<()> {
        let from = record.extraction_status;
        let invalid = || WorkflowError::InvalidTransition {
            id: record.id.clone(),
            from,
            to,
        };
        if !from.can_transition_to(to) {
            return Err(invalid());
        }
        if !self.store().update_extraction(&record.id, from, to, data)? {
            return Err(invalid());
        }
        Ok(())
    }
}

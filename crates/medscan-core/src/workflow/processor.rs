//! One extraction attempt against a stored scan record.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use medscan_llm::DocumentKind;
use tracing::{debug, info, warn};

use super::jobs::{ExtractionJob, RetryPolicy};
use super::WorkflowResult;
use crate::extraction::ExtractionService;
use crate::models::{
    ExtractionErrorKind, ExtractionFailure, ExtractionResult, ExtractionStatus, ScanPayload,
    ScanRecord,
};
use crate::store::{BlobStore, ScanStore};

/// Retry waits are split into slices this long so `stop` is honoured quickly.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// What happened to a job after one attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// The record reached `extracted` or `failed`
    Finished(ScanRecord),
    /// Transient failure; the record stays in `processing`
    Retryable(ExtractionFailure),
    /// The record was deleted or moved on; nothing was written
    Discarded,
    /// The runner stopped while waiting to retry
    Interrupted,
}

/// Drives scan records through extraction and persists the outcome.
pub struct ScanProcessor {
    store: Arc<dyn ScanStore>,
    blobs: Arc<dyn BlobStore>,
    prescription: Arc<dyn ExtractionService>,
    biology: Arc<dyn ExtractionService>,
}

impl ScanProcessor {
    pub fn new(
        store: Arc<dyn ScanStore>,
        blobs: Arc<dyn BlobStore>,
        prescription: Arc<dyn ExtractionService>,
        biology: Arc<dyn ExtractionService>,
    ) -> Self {
        Self {
            store,
            blobs,
            prescription,
            biology,
        }
    }

    pub fn store(&self) -> &dyn ScanStore {
        self.store.as_ref()
    }

    pub fn blobs(&self) -> &dyn BlobStore {
        self.blobs.as_ref()
    }

    fn service(&self, kind: DocumentKind) -> &dyn ExtractionService {
        match kind {
            DocumentKind::Prescription => self.prescription.as_ref(),
            DocumentKind::BiologyReport => self.biology.as_ref(),
        }
    }

    /// Run a single extraction attempt.
    ///
    /// Moves a `pending` record to `processing`, extracts, and writes the
    /// final status unless the failure is retryable.
    pub fn attempt(&self, job: &ExtractionJob) -> WorkflowResult<AttemptOutcome> {
        let Some(record) = self.store.get(&job.record_id)? else {
            info!(record_id = %job.record_id, "scan record gone, job discarded");
            return Ok(AttemptOutcome::Discarded);
        };

        match record.extraction_status {
            ExtractionStatus::Pending => {
                let claimed = self.store.update_extraction(
                    &record.id,
                    ExtractionStatus::Pending,
                    ExtractionStatus::Processing,
                    None,
                )?;
                if !claimed {
                    info!(record_id = %record.id, "scan record changed before extraction, job discarded");
                    return Ok(AttemptOutcome::Discarded);
                }
            }
            ExtractionStatus::Processing => {}
            status => {
                debug!(record_id = %record.id, status = %status, "scan record not awaiting extraction");
                return Ok(AttemptOutcome::Discarded);
            }
        }

        let blob = match self.blobs.fetch(&record.blob_id) {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                let failure = ExtractionFailure::new(
                    ExtractionErrorKind::NotFound,
                    format!("uploaded photo {} not found", record.blob_id),
                );
                return self.finish(&record.id, ScanPayload::Failed(failure));
            }
            Err(e) => {
                let failure = ExtractionFailure::new(
                    ExtractionErrorKind::Configuration,
                    format!("photo storage unavailable: {e}"),
                );
                return self.finish(&record.id, ScanPayload::Failed(failure));
            }
        };

        match self.service(record.kind).extract(&blob) {
            ExtractionResult::Error(failure) if failure.kind().is_retryable() => {
                Ok(AttemptOutcome::Retryable(failure))
            }
            result => self.finish(&record.id, result.into()),
        }
    }

    /// Single attempt; a retryable failure is recorded as-is.
    pub fn run_once(&self, job: &ExtractionJob) -> WorkflowResult<AttemptOutcome> {
        match self.attempt(job)? {
            AttemptOutcome::Retryable(failure) => {
                self.finish(&job.record_id, ScanPayload::Failed(failure))
            }
            outcome => Ok(outcome),
        }
    }

    /// Attempt with exponential backoff on `rate_limit` and `api_error`.
    ///
    /// After the last attempt the record fails with `retries_exhausted`.
    pub fn run_with_retry(
        &self,
        job: &ExtractionJob,
        policy: &RetryPolicy,
        stop: &AtomicBool,
    ) -> WorkflowResult<AttemptOutcome> {
        let _span = tracing::info_span!(
            "scan_job",
            record_id = %job.record_id,
            kind = %job.kind
        )
        .entered();

        let mut attempt = 1;
        loop {
            match self.attempt(job)? {
                AttemptOutcome::Retryable(failure) if attempt < policy.max_attempts => {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        attempt,
                        max_attempts = policy.max_attempts,
                        error_kind = %failure.kind(),
                        delay_ms = delay.as_millis() as u64,
                        "extraction failed, retrying"
                    );
                    if !sleep_unless_stopped(delay, stop) {
                        info!("runner stopping, retry abandoned");
                        return Ok(AttemptOutcome::Interrupted);
                    }
                    attempt += 1;
                }
                AttemptOutcome::Retryable(failure) => {
                    warn!(
                        attempts = attempt,
                        error_kind = %failure.kind(),
                        "extraction retries exhausted"
                    );
                    let exhausted = ExtractionFailure::new(
                        ExtractionErrorKind::RetriesExhausted,
                        failure.message(),
                    );
                    return self.finish(&job.record_id, ScanPayload::Failed(exhausted));
                }
                outcome => return Ok(outcome),
            }
        }
    }

    /// Write the final status, unless the record left `processing` meanwhile.
    fn finish(&self, record_id: &str, payload: ScanPayload) -> WorkflowResult<AttemptOutcome> {
        let status = payload.status();
        let written = self.store.update_extraction(
            record_id,
            ExtractionStatus::Processing,
            status,
            Some(&payload),
        )?;
        if !written {
            info!(record_id, "scan record changed during extraction, result discarded");
            return Ok(AttemptOutcome::Discarded);
        }

        info!(record_id, status = %status, error_kind = ?payload.error_kind(), "scan record updated");
        Ok(match self.store.get(record_id)? {
            Some(record) => AttemptOutcome::Finished(record),
            None => AttemptOutcome::Discarded,
        })
    }
}

/// Sleep for `total`, returning `false` early if `stop` is raised.
fn sleep_unless_stopped(total: Duration, stop: &AtomicBool) -> bool {
    let deadline = Instant::now().checked_add(total);
    loop {
        if stop.load(Ordering::SeqCst) {
            return false;
        }
        let remaining = match deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => SLEEP_SLICE,
        };
        if remaining.is_zero() {
            return true;
        }
        std::thread::sleep(remaining.min(SLEEP_SLICE));
    }
}

// src/pipeline/processor.rs

//! Job execution task.
//!
//! Drains the queue and drives each job through both analyzer stages. A stage
//! failure requeues the whole job at the tail until its retry budget runs out;
//! the budget is shared by the two stages and every retry starts again from
//! stage one.

use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{AnalysisRecord, JobKind, ProcessingJob};
use crate::pipeline::PipelineContext;
use crate::pipeline::fingerprint::fingerprint;

/// Terminal state of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Both stages succeeded and were persisted.
    Completed,
    /// `new` job for an already processed item.
    Skipped,
    /// A stage failed; the next attempt was queued.
    Requeued { retry_count: u32 },
    /// A stage failed and the next attempt was rejected by a full queue.
    RetryDropped,
    /// Retries exhausted or a non-retryable error.
    Failed { reason: String },
}

enum StageFailure {
    Retry(AppError),
    Abort(AppError),
}

/// Runs jobs from the queue through the analyzers.
pub struct Processor<'a> {
    ctx: &'a PipelineContext,
}

impl<'a> Processor<'a> {
    pub fn new(ctx: &'a PipelineContext) -> Self {
        Self { ctx }
    }

    /// Process one dequeued job and mark it done.
    pub async fn process(&self, job: ProcessingJob) -> JobOutcome {
        let outcome = self.execute(job).await;

        {
            let mut stats = self.ctx.stats.borrow_mut();
            stats.total_processed += 1;
            match &outcome {
                JobOutcome::Completed => stats.successful += 1,
                JobOutcome::Skipped => stats.skipped += 1,
                JobOutcome::Requeued { .. } => stats.retried += 1,
                JobOutcome::RetryDropped | JobOutcome::Failed { .. } => stats.failed += 1,
            }
        }

        self.ctx.queue.mark_done();
        outcome
    }

    async fn execute(&self, job: ProcessingJob) -> JobOutcome {
        if job.job_kind == JobKind::New && self.ctx.is_processed(&job.item_id) {
            log::debug!("Skipping {}: already processed", job.item_id);
            return JobOutcome::Skipped;
        }

        let content_fingerprint = fingerprint(&job.content);

        match self.run_stages(&job, &content_fingerprint).await {
            Ok(()) => {
                self.ctx
                    .ledger
                    .borrow_mut()
                    .mark_processed(&job.item_id, content_fingerprint);
                log::info!("Processed {} ({} job)", job.item_id, job.job_kind);
                JobOutcome::Completed
            }
            Err(StageFailure::Retry(e)) if job.can_retry() => self.requeue(job, e),
            Err(StageFailure::Retry(e)) | Err(StageFailure::Abort(e)) => {
                log::error!(
                    "Job for {} failed after {} attempts: {}",
                    job.item_id,
                    job.retry_count + 1,
                    e
                );
                JobOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn run_stages(
        &self,
        job: &ProcessingJob,
        content_fingerprint: &str,
    ) -> std::result::Result<(), StageFailure> {
        for analyzer in self.ctx.analyzers.stages() {
            // Any analyzer error is retryable; only persistence aborts.
            let payload = analyzer
                .analyze(&job.item_id, &job.content)
                .await
                .map_err(StageFailure::Retry)?;

            let record = AnalysisRecord::new(
                job.item_id.as_str(),
                analyzer.stage(),
                content_fingerprint,
                payload,
            );
            self.persist(&record).await.map_err(StageFailure::Abort)?;
        }
        Ok(())
    }

    async fn persist(&self, record: &AnalysisRecord) -> Result<()> {
        self.ctx.store.upsert_result(record).await
    }

    fn requeue(&self, job: ProcessingJob, error: AppError) -> JobOutcome {
        let next = job.into_retry();
        let retry_count = next.retry_count;
        log::warn!(
            "Retrying {} ({}/{}): {}",
            next.item_id,
            retry_count,
            next.max_retries,
            error
        );

        if self.ctx.queue.enqueue(next).is_accepted() {
            JobOutcome::Requeued { retry_count }
        } else {
            JobOutcome::RetryDropped
        }
    }

    /// Drain the queue until `cancel` fires. A job already running is
    /// finished before cancellation is honored.
    pub async fn run(&self, cancel: CancellationToken) {
        let timeout = self.ctx.config.poll_interval();
        log::info!("Processor started");

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let job = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                job = self.ctx.queue.dequeue(timeout) => job,
            };

            if let Some(job) = job {
                self.process(job).await;
            }
        }

        log::info!("Processor stopped");
    }
}

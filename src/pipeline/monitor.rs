// src/pipeline/monitor.rs

//! Discovery task.
//!
//! On every tick the monitor looks for advisories that arrived since the last
//! pass and for processed advisories whose text has changed, and turns both
//! into jobs. Store failures are logged and retried on the next tick.

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::{JobKind, ProcessingJob};
use crate::pipeline::PipelineContext;
use crate::pipeline::fingerprint::fingerprint;
use crate::pipeline::ledger::Observation;

/// Jobs produced by one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Rows returned by the store
    pub seen: usize,
    /// Jobs accepted by the queue
    pub enqueued: usize,
    /// Rows ignored because they were already processed
    pub already_processed: usize,
    /// Jobs rejected by a full queue
    pub dropped: usize,
}

/// Polls the store and feeds the job queue.
pub struct Monitor<'a> {
    ctx: &'a PipelineContext,
}

impl<'a> Monitor<'a> {
    pub fn new(ctx: &'a PipelineContext) -> Self {
        Self { ctx }
    }

    /// Enqueue a `new` job for every unprocessed item newer than the watermark.
    ///
    /// The watermark moves to the wall-clock time of the pass, not to the
    /// newest arrival seen.
    pub async fn scan_new(&self) -> Result<ScanSummary> {
        let since = self.ctx.watermark();
        let scan_started = Utc::now();
        let items = self
            .ctx
            .store
            .items_since(since, self.ctx.config.batch_size)
            .await?;

        let mut summary = ScanSummary {
            seen: items.len(),
            ..ScanSummary::default()
        };

        for item in items {
            if self.ctx.is_processed(&item.id) {
                summary.already_processed += 1;
                continue;
            }

            let job = ProcessingJob::new(
                item.id,
                item.text,
                JobKind::New,
                self.ctx.config.max_retries,
            );
            if self.ctx.queue.enqueue(job).is_accepted() {
                summary.enqueued += 1;
            } else {
                summary.dropped += 1;
            }
        }

        self.ctx.set_watermark(scan_started);

        if summary.enqueued > 0 {
            log::info!(
                "Found {} new advisories ({} queued, {} dropped)",
                summary.seen - summary.already_processed,
                summary.enqueued,
                summary.dropped
            );
        }
        Ok(summary)
    }

    /// Enqueue an `update` job for every processed item whose text changed.
    pub async fn scan_updates(&self) -> Result<ScanSummary> {
        let ids = self.ctx.ledger.borrow().processed_ids();
        let mut texts = self.ctx.store.items_text(&ids).await?;
        let mut summary = ScanSummary::default();

        for item_id in ids {
            let Some(text) = texts.remove(&item_id) else {
                log::debug!("Processed item {} no longer in store", item_id);
                continue;
            };
            summary.seen += 1;

            let current = fingerprint(&text);
            let observation = self.ctx.ledger.borrow_mut().observe(&item_id, &current);
            let Observation::Changed { previous } = observation else {
                continue;
            };

            log::info!(
                "Advisory {} changed ({} -> {}), queueing update",
                item_id,
                previous,
                current
            );
            let job = ProcessingJob::new(
                item_id.as_str(),
                text,
                JobKind::Update,
                self.ctx.config.max_retries,
            );
            if self.ctx.queue.enqueue(job).is_accepted() {
                // Optimistic: the new fingerprint stands even if the job later fails.
                self.ctx
                    .ledger
                    .borrow_mut()
                    .set_fingerprint(&item_id, current);
                summary.enqueued += 1;
            } else {
                summary.dropped += 1;
            }
        }

        Ok(summary)
    }

    /// One full pass: new items, then edits.
    pub async fn poll_once(&self) -> Result<(ScanSummary, ScanSummary)> {
        let new = self.scan_new().await?;
        let updates = self.scan_updates().await?;
        Ok((new, updates))
    }

    /// Poll until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let interval = self.ctx.config.poll_interval();
        log::info!("Monitor started (poll every {:?})", interval);

        loop {
            if cancel.is_cancelled() {
                break;
            }

            if let Err(e) = self.poll_once().await {
                log::error!("Monitor scan failed: {}", e);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        log::info!("Monitor stopped");
    }
}

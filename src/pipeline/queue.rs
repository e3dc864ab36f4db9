//! Bounded FIFO between the monitor and the processor.
//!
//! Lives entirely on the pipeline's single-threaded scheduler, so state is
//! kept in `Cell`/`RefCell` and waiting is done with [`Notify`].

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::models::ProcessingJob;

/// Outcome of [`JobQueue::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Accepted,
    /// The queue was full; the job was discarded.
    Dropped,
}

impl Enqueued {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Enqueued::Accepted)
    }
}

/// Drop-newest bounded job queue with completion tracking.
pub struct JobQueue {
    jobs: RefCell<VecDeque<ProcessingJob>>,
    capacity: usize,
    // Enqueued but not yet marked done.
    unfinished: Cell<usize>,
    dropped: Cell<u64>,
    available: Notify,
    drained: Notify,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            jobs: RefCell::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            unfinished: Cell::new(0),
            dropped: Cell::new(0),
            available: Notify::new(),
            drained: Notify::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.jobs.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.borrow().is_empty()
    }

    /// Jobs rejected because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.get()
    }

    /// Jobs handed out or waiting that have not been marked done.
    pub fn unfinished(&self) -> usize {
        self.unfinished.get()
    }

    /// Append `job`, or drop it when the queue already holds `capacity` jobs.
    pub fn enqueue(&self, job: ProcessingJob) -> Enqueued {
        let mut jobs = self.jobs.borrow_mut();
        if jobs.len() >= self.capacity {
            self.dropped.set(self.dropped.get() + 1);
            log::warn!(
                "Job queue full ({}), dropping {} job for {}",
                self.capacity,
                job.job_kind,
                job.item_id
            );
            return Enqueued::Dropped;
        }

        jobs.push_back(job);
        self.unfinished.set(self.unfinished.get() + 1);
        self.available.notify_one();
        Enqueued::Accepted
    }

    /// Take the oldest job, waiting up to `timeout` for one to arrive.
    pub async fn dequeue(&self, timeout: Duration) -> Option<ProcessingJob> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(job) = self.jobs.borrow_mut().pop_front() {
                return Some(job);
            }
            if tokio::time::timeout_at(deadline, self.available.notified())
                .await
                .is_err()
            {
                return None;
            }
        }
    }

    /// Signal that a dequeued job reached a terminal state.
    pub fn mark_done(&self) {
        let remaining = self.unfinished.get().saturating_sub(1);
        self.unfinished.set(remaining);
        if remaining == 0 {
            self.drained.notify_waiters();
        }
    }

    /// Remove every waiting job, marking each done. Returns how many.
    pub fn discard_pending(&self) -> usize {
        let discarded: Vec<ProcessingJob> = self.jobs.borrow_mut().drain(..).collect();
        for job in &discarded {
            log::debug!("Discarding pending {} job for {}", job.job_kind, job.item_id);
            self.mark_done();
        }
        discarded.len()
    }

    /// Wait until every enqueued job has been marked done.
    pub async fn join(&self) {
        loop {
            let drained = self.drained.notified();
            if self.unfinished.get() == 0 {
                return;
            }
            drained.await;
        }
    }
}

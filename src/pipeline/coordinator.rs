// src/pipeline/coordinator.rs

//! Lifecycle bridge between a synchronous host and the pipeline scheduler.
//!
//! The pipeline runs on a dedicated OS thread with its own current-thread
//! tokio runtime. The host never touches pipeline state: it posts control
//! messages and receives status snapshots in reply.
//!
//! ```text
//! host thread                         worker thread (current-thread runtime)
//! ───────────                         ──────────────────────────────────────
//! start()  ── spawn ───────────────►  reconcile → join!(monitor, processor, control)
//! get_status() ── Status(reply) ───►  control: reply.send(snapshot)
//! stop()   ── Stop ────────────────►  control: cancel → tasks exit → drain
//! wait()   ◄── join ───────────────  final snapshot
//! ```

use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{Config, PipelineConfig, StatusSnapshot};
use crate::pipeline::{Monitor, PipelineContext, Processor};
use crate::services::AnalyzerSet;
use crate::storage::{AdvisoryStore, LocalStorage};

const WORKER_THREAD_NAME: &str = "advisory-pipeline";

/// How long the host waits for a status reply.
const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// Messages from the host to the worker.
#[derive(Debug)]
enum ControlMessage {
    Status(std_mpsc::Sender<StatusSnapshot>),
    Stop,
}

struct Worker {
    control: mpsc::UnboundedSender<ControlMessage>,
    thread: thread::JoinHandle<StatusSnapshot>,
    /// Set by the worker thread just before it exits.
    final_status: Arc<OnceLock<StatusSnapshot>>,
}

impl Worker {
    /// Ask the worker for a snapshot, or read the one it left on exit.
    fn status(&self) -> Option<StatusSnapshot> {
        if let Some(status) = self.final_status.get() {
            return Some(status.clone());
        }

        let (reply_tx, reply_rx) = std_mpsc::channel();
        if self.control.send(ControlMessage::Status(reply_tx)).is_ok() {
            match reply_rx.recv_timeout(STATUS_TIMEOUT) {
                Ok(status) => return Some(status),
                Err(std_mpsc::RecvTimeoutError::Timeout) => {
                    log::warn!("No status reply from pipeline worker");
                }
                Err(std_mpsc::RecvTimeoutError::Disconnected) => {}
            }
        }

        // The worker may have exited between the two checks.
        self.final_status.get().cloned()
    }
}

/// Starts, stops and observes one pipeline.
pub struct Coordinator {
    config: PipelineConfig,
    store: Arc<dyn AdvisoryStore>,
    analyzers: AnalyzerSet,
    running: Option<Worker>,
    stopping: Option<Worker>,
    last_status: Option<StatusSnapshot>,
}

impl Coordinator {
    pub fn new(config: PipelineConfig, store: Arc<dyn AdvisoryStore>, analyzers: AnalyzerSet) -> Self {
        Self {
            config,
            store,
            analyzers,
            running: None,
            stopping: None,
            last_status: None,
        }
    }

    /// Local JSON storage and keyword analyzers, as described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(LocalStorage::new(&config.storage.root_dir));
        let analyzers = AnalyzerSet::from_config(&config.analyzers)?;
        Ok(Self::new(config.pipeline.clone(), store, analyzers))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Whether a worker is up and has not been asked to stop.
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|worker| !worker.thread.is_finished())
    }

    /// Spawn the worker thread. A no-op (with a warning) if already running.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            log::warn!("Pipeline already running");
            return Ok(());
        }
        self.config.validate()?;

        // A worker that exited on its own still needs joining.
        if let Some(dead) = self.running.take() {
            self.stopping = Some(dead);
        }
        if self.stopping.is_some() {
            log::info!("Waiting for previous pipeline worker to exit");
            self.wait();
        }

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let final_status = Arc::new(OnceLock::new());
        let config = self.config.clone();
        let store = Arc::clone(&self.store);
        let analyzers = self.analyzers.clone();
        let slot = Arc::clone(&final_status);

        let thread = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let status = run_worker(config, store, analyzers, control_rx);
                let _ = slot.set(status.clone());
                status
            })
            .map_err(|e| AppError::lifecycle(format!("failed to spawn worker: {e}")))?;

        self.running = Some(Worker {
            control: control_tx,
            thread,
            final_status,
        });
        log::info!(
            "Pipeline started (poll {} ms, batch {}, queue {})",
            self.config.poll_interval_ms,
            self.config.batch_size,
            self.config.max_queue_size
        );
        Ok(())
    }

    /// Ask the worker to shut down and return immediately.
    ///
    /// The worker finishes any job it is running, discards queued jobs and
    /// drains before its thread exits. Use [`Coordinator::wait`] to join it.
    pub fn stop(&mut self) {
        let Some(worker) = self.running.take() else {
            log::warn!("Pipeline is not running");
            return;
        };

        if worker.control.send(ControlMessage::Stop).is_err() {
            log::warn!("Pipeline worker already exited");
        }
        log::info!("Pipeline stop requested");
        self.stopping = Some(worker);
    }

    /// Join a stopped worker and return its final status.
    ///
    /// Returns `None` when no stop is pending or the worker panicked.
    pub fn wait(&mut self) -> Option<StatusSnapshot> {
        let worker = self.stopping.take()?;
        match worker.thread.join() {
            Ok(status) => {
                self.last_status = Some(status.clone());
                Some(status)
            }
            Err(_) => {
                log::error!("Pipeline worker panicked");
                None
            }
        }
    }

    /// Snapshot of the pipeline.
    ///
    /// A worker that is stopping still reports its live counters, with
    /// `is_running = false`. Once joined, the final snapshot is returned.
    pub fn get_status(&self) -> StatusSnapshot {
        if let Some(status) = self.running.as_ref().and_then(Worker::status) {
            return status;
        }
        if let Some(mut status) = self.stopping.as_ref().and_then(Worker::status) {
            status.is_running = false;
            return status;
        }

        let mut status = self
            .last_status
            .clone()
            .unwrap_or_else(|| StatusSnapshot::idle(&self.config));
        status.is_running = false;
        status
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        if self.running.is_some() {
            self.stop();
        }
    }
}

/// Body of the worker thread.
fn run_worker(
    config: PipelineConfig,
    store: Arc<dyn AdvisoryStore>,
    analyzers: AnalyzerSet,
    control: mpsc::UnboundedReceiver<ControlMessage>,
) -> StatusSnapshot {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to build pipeline runtime: {}", e);
            return StatusSnapshot::idle(&config);
        }
    };

    let ctx = PipelineContext::new(config, store, analyzers);
    runtime.block_on(drive(&ctx, control));

    let status = ctx.snapshot(false);
    log::info!(
        "Pipeline stopped: {} processed, {} ok, {} failed, {} skipped",
        status.statistics.total_processed,
        status.statistics.successful,
        status.statistics.failed,
        status.statistics.skipped
    );
    status
}

/// Reconcile, run both tasks until stopped, then drain.
async fn drive(ctx: &PipelineContext, mut control: mpsc::UnboundedReceiver<ControlMessage>) {
    if let Err(e) = ctx.reconcile().await {
        log::error!("Boot reconciliation failed, starting with an empty ledger: {}", e);
    }

    let cancel = CancellationToken::new();
    let monitor = Monitor::new(ctx);
    let processor = Processor::new(ctx);

    let work = async {
        tokio::join!(monitor.run(cancel.clone()), processor.run(cancel.clone()));
        drain(ctx).await;
    };

    // Keeps answering status requests until the drain is over.
    let control_loop = async {
        loop {
            match control.recv().await {
                Some(ControlMessage::Status(reply)) => {
                    // The host may have timed out and gone away.
                    let _ = reply.send(ctx.snapshot(!cancel.is_cancelled()));
                }
                Some(ControlMessage::Stop) => cancel.cancel(),
                None => {
                    cancel.cancel();
                    std::future::pending::<()>().await;
                }
            }
        }
    };

    tokio::select! {
        _ = work => {}
        _ = control_loop => {}
    }
}

/// Release queued jobs and wait for every job to be marked done.
async fn drain(ctx: &PipelineContext) {
    let discarded = ctx.queue.discard_pending();
    if discarded > 0 {
        log::warn!("Discarded {} queued jobs on shutdown", discarded);
    }

    let timeout = ctx.config.drain_timeout();
    if tokio::time::timeout(timeout, ctx.queue.join()).await.is_err() {
        log::warn!(
            "Drain timed out after {:?} with {} unfinished jobs",
            timeout,
            ctx.queue.unfinished()
        );
    }
}

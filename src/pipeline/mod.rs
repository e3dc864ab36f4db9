//! Advisory processing pipeline.
//!
//! - `Monitor`: discovers new and edited advisories and queues jobs
//! - `Processor`: runs queued jobs through the analyzer stages
//! - `Coordinator`: starts, stops and observes both from a synchronous host

pub mod context;
pub mod coordinator;
pub mod fingerprint;
pub mod ledger;
pub mod monitor;
pub mod processor;
pub mod queue;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::{PipelineContext, Reconciliation};
pub use coordinator::Coordinator;
pub use fingerprint::fingerprint;
pub use ledger::{DedupLedger, Observation};
pub use monitor::{Monitor, ScanSummary};
pub use processor::{JobOutcome, Processor};
pub use queue::{Enqueued, JobQueue};

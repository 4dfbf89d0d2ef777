//! Batch reconciliation engine
//!
//! Resolves spreadsheet rows into concrete remote resources, applies (or
//! removes) schema fragments idempotently, and produces one audit outcome
//! per row while streaming ordered progress to a sink.

pub mod accounts;
pub mod progress;
pub mod runner;
pub mod types;

pub use accounts::{Account, AccountRegistry};
pub use progress::{ChannelSink, ProgressBus, ProgressEvent, ProgressSink, StdoutSink};
pub use runner::{execute_run, run_batch, spawn_run};
pub use types::{BatchRow, ContentType, Mode, RowOutcome, RowStatus};

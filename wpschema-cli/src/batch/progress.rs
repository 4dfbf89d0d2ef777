//! Progress reporting for batch runs
//!
//! The orchestrator emits one line per completed row, in strict row order,
//! and a terminating sentinel. Sinks are injected; `ProgressBus` is the
//! run-id keyed registry for detached runs, with an explicit lifecycle:
//! opened at run start, closed by the sentinel, entry reclaimed once the
//! subscriber is gone.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Result, bail};
use tokio::sync::mpsc;

/// One event on a run's progress stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Human-readable line for one completed row
    Line(String),
    /// Sentinel: the run is finished; carries the result artifact's file
    /// name when one was produced
    Done { artifact: Option<String> },
}

/// Where the orchestrator pushes progress events
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Prints progress directly, for foreground CLI runs
pub struct StdoutSink;

impl ProgressSink for StdoutSink {
    fn emit(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Line(line) => println!("{}", line),
            ProgressEvent::Done { artifact: Some(name) } => println!("Done. Result: {}", name),
            ProgressEvent::Done { artifact: None } => println!("Done."),
        }
    }
}

/// Forwards events into a channel owned by a `ProgressBus`
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: ProgressEvent) {
        // A disconnected subscriber just discards further events
        let _ = self.tx.send(event);
    }
}

/// Registry of live progress channels, one per run id.
///
/// At most one live run per id: opening an id whose previous channel still
/// has a connected subscriber is rejected. Stale entries (subscriber
/// dropped) are reclaimed on the next `open`.
#[derive(Default)]
pub struct ProgressBus {
    runs: Mutex<HashMap<String, mpsc::UnboundedSender<ProgressEvent>>>,
}

impl ProgressBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a progress channel for `run_id`, returning the sink side for
    /// the orchestrator and the receiver side for the observer.
    pub fn open(
        &self,
        run_id: &str,
    ) -> Result<(ChannelSink, mpsc::UnboundedReceiver<ProgressEvent>)> {
        let mut runs = self.runs.lock().unwrap();
        if let Some(existing) = runs.get(run_id) {
            if !existing.is_closed() {
                bail!("a run is already live for id '{}'", run_id);
            }
            runs.remove(run_id);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        runs.insert(run_id.to_string(), tx.clone());
        Ok((ChannelSink { tx }, rx))
    }

    /// Drop the registry entry for a finished run
    pub fn release(&self, run_id: &str) {
        self.runs.lock().unwrap().remove(run_id);
    }
}

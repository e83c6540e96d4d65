//! Progress reporting.
//!
//! Sinks are called from blocking worker threads. They must not block and
//! must not fail; the engine ignores whatever happens inside them.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Receives coarse progress from a running classification or trajectory.
pub trait ProgressSink: Send + Sync {
    /// `percent` is in `0.0..=100.0`.
    fn report(&self, percent: f64, message: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(f64, &str) + Send + Sync,
{
    fn report(&self, percent: f64, message: &str) {
        self(percent, message)
    }
}

/// Sink that drops every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&self, _percent: f64, _message: &str) {}
}

/// One progress report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Segment index when the sink was tagged with one
    pub segment: Option<usize>,
    pub percent: f64,
    pub message: String,
}

/// Sink that forwards reports into an unbounded tokio channel.
///
/// Sending never blocks; reports are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
    segment: Option<usize>,
}

impl ChannelProgress {
    pub fn new(tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self { tx, segment: None }
    }

    /// Create a sink and the receiver that drains it.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Tag every report from this sink with a segment index.
    pub fn for_segment(&self, segment: usize) -> Self {
        Self {
            tx: self.tx.clone(),
            segment: Some(segment),
        }
    }
}

impl ProgressSink for ChannelProgress {
    fn report(&self, percent: f64, message: &str) {
        let _ = self.tx.send(ProgressEvent {
            segment: self.segment,
            percent: percent.clamp(0.0, 100.0),
            message: message.to_string(),
        });
    }
}

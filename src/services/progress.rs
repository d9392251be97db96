//! Extraction progress shared between the pipeline and SSE subscribers.
//!
//! The pipeline writes through a `watch` channel; readers only ever see the
//! latest value, which is all the progress bar needs.

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
}

impl Progress {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.processed >= self.total
    }
}

/// One message on the progress event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ProgressUpdate {
    Progress(Progress),
    Complete { complete: bool },
}

#[derive(Clone)]
pub struct ProgressTracker {
    tx: Arc<watch::Sender<Progress>>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Progress::default());
        Self { tx: Arc::new(tx) }
    }

    /// Reset for a run over `total` files.
    pub fn start(&self, total: usize) {
        self.tx.send_replace(Progress { processed: 0, total });
    }

    /// Mark one more file as processed.
    pub fn advance(&self) {
        self.tx.send_modify(|p| {
            if p.processed < p.total {
                p.processed += 1;
            }
        });
    }

    #[must_use]
    pub fn snapshot(&self) -> Progress {
        *self.tx.borrow()
    }

    /// Sample progress every `period` until the run completes, then emit a
    /// final `Complete` and end. With no run started the stream never ends.
    pub fn updates(&self, period: Duration) -> impl Stream<Item = ProgressUpdate> + Send + use<> {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        futures::stream::unfold((self.clone(), ticker, Phase::Report), |(tracker, mut ticker, phase)| async move {
            match phase {
                Phase::Done => None,
                Phase::Complete => Some((ProgressUpdate::Complete { complete: true }, (tracker, ticker, Phase::Done))),
                Phase::Report => {
                    ticker.tick().await;
                    let progress = tracker.snapshot();
                    let next = if progress.is_complete() { Phase::Complete } else { Phase::Report };
                    Some((ProgressUpdate::Progress(progress), (tracker, ticker, next)))
                }
            }
        })
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

enum Phase {
    Report,
    Complete,
    Done,
}

#[cfg(test)]
#[path = "progress_test.rs"]
mod tests;

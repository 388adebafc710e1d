// Debounced search submission.
//
// Every keystroke submits the full criteria; only the last one submitted
// within the quiet period is released to the receiver.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::criteria::SearchCriteria;

/// Holds at most one pending search and releases it after `delay`.
///
/// Must be used from within a Tokio runtime.
#[derive(Debug)]
pub struct SearchDebouncer {
    delay: Duration,
    tx: mpsc::UnboundedSender<SearchCriteria>,
    pending: Option<CancellationToken>,
}

impl SearchDebouncer {
    pub fn new(delay: Duration) -> (Self, mpsc::UnboundedReceiver<SearchCriteria>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                delay,
                tx,
                pending: None,
            },
            rx,
        )
    }

    /// Replace any pending search with `criteria`.
    pub fn submit(&mut self, criteria: SearchCriteria) {
        self.cancel();

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let tx = self.tx.clone();
        let delay = self.delay;

        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancelled.cancelled() => {
                    trace!(text = %criteria.text, "debounced search superseded");
                }
                () = tokio::time::sleep(delay) => {
                    let _ = tx.send(criteria);
                }
            }
        });
        self.pending = Some(token);
    }

    /// Drop the pending search, if any.
    pub fn cancel(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
    }
}

impl Drop for SearchDebouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

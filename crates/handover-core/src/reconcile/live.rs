// ── Live search ──
//
// A background task that owns one `ResultSet`, feeds it realtime
// messages in arrival order, and publishes every new state on a `watch`
// channel. Consumers only ever see whole snapshots.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use handover_api::RealtimeMessage;

use super::{ChangeEvent, Outcome, ResultSet};
use crate::error::CoreError;
use crate::search::{SearchCriteria, SearchPage};

/// Anything that can run a listing search.
pub trait ListingSource: Send + Sync + 'static {
    fn search(
        &self,
        criteria: &SearchCriteria,
    ) -> impl Future<Output = Result<SearchPage, CoreError>> + Send;
}

/// One published state of a live search.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveSnapshot {
    pub page: Arc<SearchPage>,
    /// The criteria `page` answers.
    pub criteria: SearchCriteria,
    /// Whether the realtime channel is currently joined.
    pub connected: bool,
    /// Set when the latest refresh failed; `page` is then the last good one.
    pub last_error: Option<String>,
    /// Bumped on every publish.
    pub version: u64,
}

#[derive(Debug)]
enum LiveCommand {
    SetCriteria(SearchCriteria),
    Refresh,
}

/// Handle to a running live search. Dropping it stops the task.
pub struct LiveSearch {
    commands: mpsc::UnboundedSender<LiveCommand>,
    snapshot: watch::Receiver<LiveSnapshot>,
    _guard: DropGuard,
}

impl LiveSearch {
    /// Run the initial query, then keep the result current from
    /// `realtime` (if any) until the handle is dropped or `cancel` fires.
    ///
    /// Only the initial query's failure is returned; later failures are
    /// reported through [`LiveSnapshot::last_error`].
    pub async fn start<S: ListingSource>(
        source: S,
        criteria: SearchCriteria,
        realtime: Option<broadcast::Receiver<RealtimeMessage>>,
        cancel: CancellationToken,
    ) -> Result<Self, CoreError> {
        let page = source.search(&criteria).await?;
        let set = ResultSet::new(criteria.clone(), page);

        let (snapshot_tx, snapshot) = watch::channel(LiveSnapshot {
            page: Arc::new(set.to_page()),
            criteria: criteria.clone(),
            connected: false,
            last_error: None,
            version: 0,
        });
        let (commands, command_rx) = mpsc::unbounded_channel();

        let task = LiveTask {
            source,
            set,
            wanted: criteria,
            realtime,
            snapshot: snapshot_tx,
        };
        let task_cancel = cancel.clone();
        tokio::spawn(task.run(command_rx, task_cancel));

        Ok(Self {
            commands,
            snapshot,
            _guard: cancel.drop_guard(),
        })
    }

    /// Switch to new filters or another page.
    pub fn set_criteria(&self, criteria: SearchCriteria) {
        let _ = self.commands.send(LiveCommand::SetCriteria(criteria));
    }

    /// Re-run the current query (the "retry" affordance).
    pub fn refresh(&self) {
        let _ = self.commands.send(LiveCommand::Refresh);
    }

    pub fn latest(&self) -> LiveSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Wait for the next published snapshot.
    /// Returns `None` once the task has stopped.
    pub async fn changed(&mut self) -> Option<LiveSnapshot> {
        self.snapshot.changed().await.ok()?;
        Some(self.snapshot.borrow_and_update().clone())
    }

    /// Convert into a `Stream` of snapshots, starting with the current one.
    pub fn into_stream(self) -> LiveStream {
        LiveStream {
            inner: WatchStream::new(self.snapshot),
            _commands: self.commands,
            _guard: self._guard,
        }
    }
}

/// `Stream` adapter over a live search. Dropping it stops the task.
pub struct LiveStream {
    inner: WatchStream<LiveSnapshot>,
    _commands: mpsc::UnboundedSender<LiveCommand>,
    _guard: DropGuard,
}

impl Stream for LiveStream {
    type Item = LiveSnapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

// ── Task ────────────────────────────────────────────────────────────

struct LiveTask<S> {
    source: S,
    set: ResultSet,
    /// Criteria to query with; differs from `set.criteria()` only while
    /// a criteria change has not yet been fetched successfully.
    wanted: SearchCriteria,
    realtime: Option<broadcast::Receiver<RealtimeMessage>>,
    snapshot: watch::Sender<LiveSnapshot>,
}

impl<S: ListingSource> LiveTask<S> {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<LiveCommand>, cancel: CancellationToken) {
        loop {
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                command = commands.recv() => match command {
                    None => break,
                    Some(LiveCommand::SetCriteria(criteria)) => {
                        self.wanted = criteria;
                        Outcome::RefreshRequired
                    }
                    Some(LiveCommand::Refresh) => Outcome::RefreshRequired,
                },
                message = next_message(self.realtime.as_mut()) => self.on_message(message),
            };

            match outcome {
                Outcome::Applied => self.publish(|_| {}),
                Outcome::Unchanged => {}
                Outcome::RefreshRequired => self.refresh().await,
            }
        }
        debug!("live search stopped");
    }

    fn on_message(&mut self, message: Result<RealtimeMessage, RecvError>) -> Outcome {
        match message {
            Ok(RealtimeMessage::Subscribed) => {
                self.set_connected(true);
                self.set.apply(&ChangeEvent::Resync)
            }
            Ok(RealtimeMessage::Disconnected) => {
                self.set_connected(false);
                Outcome::Unchanged
            }
            Ok(RealtimeMessage::Change(record)) => ChangeEvent::from_record(&record)
                .map_or(Outcome::Unchanged, |event| self.set.apply(&event)),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "live search lagged behind the realtime channel");
                self.set.apply(&ChangeEvent::Resync)
            }
            Err(RecvError::Closed) => {
                self.realtime = None;
                self.set_connected(false);
                Outcome::Unchanged
            }
        }
    }

    async fn refresh(&mut self) {
        match self.source.search(&self.wanted).await {
            Ok(page) => {
                self.set.replace(self.wanted.clone(), page);
                self.publish(|snap| snap.last_error = None);
            }
            Err(e) => {
                warn!(error = %e, "live search refresh failed; keeping last results");
                let message = e.to_string();
                self.publish(|snap| snap.last_error = Some(message));
            }
        }
    }

    fn set_connected(&self, connected: bool) {
        if self.snapshot.borrow().connected != connected {
            self.publish(|snap| snap.connected = connected);
        }
    }

    /// Publish the current result set, with `tweak` applied on top.
    fn publish(&self, tweak: impl FnOnce(&mut LiveSnapshot)) {
        let page = Arc::new(self.set.to_page());
        let criteria = self.set.criteria().clone();
        self.snapshot.send_modify(|snap| {
            snap.page = page;
            snap.criteria = criteria;
            snap.version += 1;
            tweak(snap);
        });
    }
}

async fn next_message(
    realtime: Option<&mut broadcast::Receiver<RealtimeMessage>>,
) -> Result<RealtimeMessage, RecvError> {
    match realtime {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

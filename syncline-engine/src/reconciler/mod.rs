//! Streaming ingestion reconciler.
//!
//! Owns the reconciliation buffer exclusively: no other component writes
//! buffer contents. Records arrive from two independent sources, the push
//! channel and periodic pull batches forwarded by the lifecycle controller,
//! and are merged by identity. The committed view is published over a watch
//! channel; arrival instants are published for the health watchdog.

mod buffer;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use futures::stream::StreamExt;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::{BroadcastStream, ReceiverStream};

use crate::config::Config;
use crate::push::PushEvent;
use syncline_core::record::{IngestedRecord, RawRecord};

pub use buffer::{CommitSnapshot, ReconciliationBuffer, Signature};

/// How often the commit gate is re-evaluated.
const COMMIT_TICK_INTERVAL: std::time::Duration = std::time::Duration::from_millis(250);

const METRIC_RECORDS_INGESTED: &str = "syncline_records_ingested";
const METRIC_RECORDS_REPLACED: &str = "syncline_records_replaced";
const METRIC_VIEW_COMMITS: &str = "syncline_view_commits";

/// A controller encapsulating all logic for reconciling ingested records.
pub struct ReconcilerCtl {
    /// The application's runtime config.
    _config: Arc<Config>,
    /// The reconciliation buffer; owned and mutated only by this controller.
    buf: ReconciliationBuffer,
    /// The connector currently being ingested, if any.
    connector_id: Option<String>,

    /// A channel of events arriving over the push channel.
    push_rx: ReceiverStream<PushEvent>,
    /// A channel of control messages.
    ctl_rx: ReceiverStream<ReconcilerCtlMsg>,
    /// The committed view, published for the UI.
    commits_tx: watch::Sender<CommitSnapshot>,
    /// The instant of the last data arrival, published for the watchdog.
    arrival_tx: watch::Sender<Option<Instant>>,

    /// A channel used for triggering graceful shutdown.
    shutdown_rx: BroadcastStream<()>,
}

impl ReconcilerCtl {
    /// Create a new instance.
    pub fn new(
        config: Arc<Config>, push_rx: mpsc::Receiver<PushEvent>, ctl_rx: mpsc::Receiver<ReconcilerCtlMsg>, shutdown_tx: broadcast::Sender<()>,
    ) -> (Self, watch::Receiver<CommitSnapshot>, watch::Receiver<Option<Instant>>) {
        let (commits_tx, commits_rx) = watch::channel(CommitSnapshot::default());
        let (arrival_tx, arrival_rx) = watch::channel(None);
        metrics::register_counter!(METRIC_RECORDS_INGESTED, metrics::Unit::Count, "the number of records ingested from push and pull sources");
        metrics::register_counter!(METRIC_RECORDS_REPLACED, metrics::Unit::Count, "the number of duplicate-identity records replaced in place");
        metrics::register_counter!(METRIC_VIEW_COMMITS, metrics::Unit::Count, "the number of buffer commits made visible to the view");
        let buf = ReconciliationBuffer::new(config.buffer_capacity, config.commit_interval());
        (
            Self {
                _config: config,
                buf,
                connector_id: None,
                push_rx: ReceiverStream::new(push_rx),
                ctl_rx: ReceiverStream::new(ctl_rx),
                commits_tx,
                arrival_tx,
                shutdown_rx: BroadcastStream::new(shutdown_tx.subscribe()),
            },
            commits_rx,
            arrival_rx,
        )
    }

    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) -> Result<()> {
        tracing::debug!("reconciler has started");

        let mut commit_timer = tokio::time::interval(COMMIT_TICK_INTERVAL);
        loop {
            tokio::select! {
                Some(event) = self.push_rx.next() => self.handle_push_event(event),
                Some(msg) = self.ctl_rx.next() => self.handle_ctl_msg(msg),
                _ = commit_timer.tick() => self.commit_pass(),
                _ = self.shutdown_rx.next() => break,
            }
        }

        tracing::debug!("reconciler has shutdown");
        Ok(())
    }

    /// Handle an event arriving over the push channel.
    #[tracing::instrument(level = "trace", skip(self, event))]
    fn handle_push_event(&mut self, event: PushEvent) {
        match event {
            PushEvent::Data(raw) => self.ingest_push(*raw),
            PushEvent::Connected => tracing::debug!("push channel established"),
            PushEvent::Ping => {}
            PushEvent::Disconnected => tracing::warn!("push channel closed, awaiting pull refreshes"),
            PushEvent::Error(err) => tracing::warn!(error = %err, "push channel error"),
        }
    }

    /// Handle a control message.
    #[tracing::instrument(level = "trace", skip(self, msg))]
    fn handle_ctl_msg(&mut self, msg: ReconcilerCtlMsg) {
        match msg {
            ReconcilerCtlMsg::SetConnector(id) => self.connector_id = Some(id),
            ReconcilerCtlMsg::PullBatch(batch) => self.ingest_pull_batch(batch),
            ReconcilerCtlMsg::Reset => self.handle_reset(),
        }
    }

    /// Insert one push record by identity at the head of the buffer.
    ///
    /// Ingestion never fails: malformed records are degraded to placeholder
    /// display values by the boundary adapter rather than dropped.
    fn ingest_push(&mut self, raw: RawRecord) {
        let connector_id = match self.connector_id.clone() {
            Some(id) => id,
            None => {
                tracing::debug!("push record received with no active connector, dropping");
                return;
            }
        };
        let record = IngestedRecord::from_raw(raw, &connector_id);
        let replaced = self.buf.ingest_push(record);
        metrics::counter!(METRIC_RECORDS_INGESTED, 1);
        if replaced {
            metrics::counter!(METRIC_RECORDS_REPLACED, 1);
        }
        let _res = self.arrival_tx.send(Some(tokio::time::Instant::now().into_std()));
        self.commit_pass();
    }

    /// Replace the buffer content with a full pull batch.
    fn ingest_pull_batch(&mut self, batch: Vec<RawRecord>) {
        let connector_id = match self.connector_id.clone() {
            Some(id) => id,
            None => return,
        };
        let count = batch.len();
        let records = batch.into_iter().map(|raw| IngestedRecord::from_raw(raw, &connector_id)).collect();
        self.buf.ingest_pull_batch(records);
        metrics::counter!(METRIC_RECORDS_INGESTED, count as u64);
        if count > 0 {
            let _res = self.arrival_tx.send(Some(tokio::time::Instant::now().into_std()));
        }
        self.commit_pass();
    }

    /// Clear all buffer and commit state, immediately committing the empty
    /// view so no data from a previous session leaks into a new one.
    fn handle_reset(&mut self) {
        self.buf.reset();
        self.connector_id = None;
        let _res = self.arrival_tx.send(None);
        self.commit_pass();
    }

    /// Run the two-part anti-flicker commit gate.
    fn commit_pass(&mut self) {
        if let Some(snapshot) = self.buf.maybe_commit(tokio::time::Instant::now().into_std()) {
            tracing::trace!(records = snapshot.records.len(), "committing buffer to view");
            metrics::counter!(METRIC_VIEW_COMMITS, 1);
            let _res = self.commits_tx.send(snapshot);
        }
    }
}

/// A message bound for the reconciler.
#[derive(Debug)]
pub enum ReconcilerCtlMsg {
    /// Attribute subsequent records to the given connector.
    SetConnector(String),
    /// A full pull batch fetched by the lifecycle controller.
    PullBatch(Vec<RawRecord>),
    /// Clear the buffer and commit state; issued on connector stop/restart.
    Reset,
}

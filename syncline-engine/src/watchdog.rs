//! Stream health watchdog.
//!
//! Push channels can silently die (half-open socket) without an explicit
//! disconnect event; without an independent watchdog the UI would show
//! "running" forever with dead data. The watchdog observes the reconciler's
//! arrival instants and, when a running stream goes silent past the
//! staleness threshold, signals the lifecycle controller to recover.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use futures::stream::StreamExt;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};

use crate::config::Config;
use crate::lifecycle::ConnectorCtlMsg;
use syncline_core::status::ConnectorStatus;

const METRIC_STALE_STREAMS: &str = "syncline_stale_streams_detected";

/// Whether a stream with the given last arrival is stale at `now`.
///
/// Stale means the silence has exceeded the threshold; exactly at the
/// threshold the stream is still fresh. A `None` arrival means the watchdog
/// is not armed; it cannot be stale.
pub fn is_stale(now: Instant, last_arrival: Option<Instant>, threshold: Duration) -> bool {
    match last_arrival {
        Some(arrival) => now.duration_since(arrival) > threshold,
        None => false,
    }
}

/// A controller monitoring the freshness of the ingestion stream.
pub struct WatchdogCtl {
    /// The application's runtime config.
    config: Arc<Config>,

    /// The connector's externally visible status.
    status_rx: WatchStream<ConnectorStatus>,
    /// Arrival instants published by the reconciler.
    arrival_rx: WatchStream<Option<Instant>>,
    /// The lifecycle controller's message channel, used for stale signals.
    lifecycle_tx: mpsc::Sender<ConnectorCtlMsg>,

    /// The last known connector status.
    status: ConnectorStatus,
    /// The instant of the last observed arrival; armed only while running.
    last_arrival: Option<Instant>,
    /// Whether a stale signal has already been fired for the current episode.
    fired: bool,

    /// A channel used for triggering graceful shutdown.
    shutdown_rx: BroadcastStream<()>,
}

impl WatchdogCtl {
    /// Create a new instance.
    pub fn new(
        config: Arc<Config>, status_rx: watch::Receiver<ConnectorStatus>, arrival_rx: watch::Receiver<Option<Instant>>,
        lifecycle_tx: mpsc::Sender<ConnectorCtlMsg>, shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        metrics::register_counter!(METRIC_STALE_STREAMS, metrics::Unit::Count, "the number of stale stream episodes detected");
        Self {
            config,
            status_rx: WatchStream::new(status_rx),
            arrival_rx: WatchStream::new(arrival_rx),
            lifecycle_tx,
            status: ConnectorStatus::Inactive,
            last_arrival: None,
            fired: false,
            shutdown_rx: BroadcastStream::new(shutdown_tx.subscribe()),
        }
    }

    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) -> Result<()> {
        tracing::debug!("stream health watchdog has started");

        let mut check_timer = tokio::time::interval(self.config.health_check_interval());
        loop {
            tokio::select! {
                Some(status) = self.status_rx.next() => self.handle_status_update(status),
                Some(arrival) = self.arrival_rx.next() => self.handle_arrival_update(arrival),
                _ = check_timer.tick() => self.check_staleness().await,
                _ = self.shutdown_rx.next() => break,
            }
        }

        tracing::debug!("stream health watchdog has shutdown");
        Ok(())
    }

    /// Handle a connector status transition.
    ///
    /// Entering `Running` arms the watchdog, treating the start itself as an
    /// arrival so a stream that never delivers anything is still caught.
    /// Leaving `Running` disarms it.
    #[tracing::instrument(level = "trace", skip(self, status))]
    fn handle_status_update(&mut self, status: ConnectorStatus) {
        self.status = status;
        self.fired = false;
        self.last_arrival = match status {
            ConnectorStatus::Running => Some(tokio::time::Instant::now().into_std()),
            _ => None,
        };
    }

    /// Handle an arrival instant published by the reconciler.
    ///
    /// Fresh data re-arms the watchdog for a new staleness episode.
    fn handle_arrival_update(&mut self, arrival: Option<Instant>) {
        if let Some(instant) = arrival {
            self.last_arrival = Some(instant);
            self.fired = false;
        }
    }

    /// Run a periodic staleness check.
    ///
    /// Fires at most once per episode: a new episode requires fresh arrivals
    /// or a connector restart after the forced reset.
    #[tracing::instrument(level = "trace", skip(self))]
    async fn check_staleness(&mut self) {
        if self.status != ConnectorStatus::Running || self.fired {
            return;
        }
        if !is_stale(tokio::time::Instant::now().into_std(), self.last_arrival, self.config.staleness_threshold()) {
            return;
        }
        self.fired = true;
        metrics::counter!(METRIC_STALE_STREAMS, 1);
        tracing::warn!(
            threshold_secs = self.config.staleness_threshold_secs,
            "no data received within the staleness threshold, signaling stream as stale"
        );
        let _res = self.lifecycle_tx.send(ConnectorCtlMsg::StreamStale).await;
    }
}

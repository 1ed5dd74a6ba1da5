//! The session harness wiring the engine's controllers together.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::client::BackendApi;
use crate::config::Config;
use crate::error::AppError;
use crate::lifecycle::{Alert, ConnectorCtl, ConnectorCtlMsg};
use crate::push::PushEvent;
use crate::reconciler::{CommitSnapshot, ReconcilerCtl};
use crate::tracker::{ProgressView, TrackerCtl, TrackerCtlMsg};
use crate::watchdog::WatchdogCtl;
use syncline_core::connector::ConnectorSpec;
use syncline_core::pipeline::PipelineInfo;
use syncline_core::status::ConnectorStatus;

/// One UI session of the reconciliation engine.
///
/// Owns the shutdown broadcast and the join handles of all controllers; no
/// in-memory session state survives `shutdown`, and no periodic timer leaks
/// past it.
pub struct Session {
    /// The application's runtime config.
    _config: Arc<Config>,
    /// The backend API client, for direct pass-through calls.
    client: Arc<dyn BackendApi>,

    /// The sender side of the push channel, for the transport to feed.
    push_tx: mpsc::Sender<PushEvent>,
    /// The lifecycle controller's message channel.
    connector_tx: mpsc::Sender<ConnectorCtlMsg>,
    /// The progress tracker's message channel.
    tracker_tx: mpsc::Sender<TrackerCtlMsg>,

    /// The committed record view.
    commits_rx: watch::Receiver<CommitSnapshot>,
    /// The connector's externally visible status.
    status_rx: watch::Receiver<ConnectorStatus>,
    /// The current user-visible alert, if any.
    alerts_rx: watch::Receiver<Option<Alert>>,
    /// The pipeline progress view.
    progress_rx: watch::Receiver<ProgressView>,

    /// A channel used for triggering graceful shutdown.
    shutdown_tx: broadcast::Sender<()>,
    /// The join handles of the spawned controllers.
    handles: Vec<JoinHandle<Result<()>>>,
}

impl Session {
    /// Create a new instance, spawning all controllers.
    pub fn new(config: Arc<Config>, client: Arc<dyn BackendApi>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(100);

        let (push_tx, push_rx) = mpsc::channel(1000);
        let (reconciler_tx, reconciler_rx) = mpsc::channel(1000);
        let (reconciler, commits_rx, arrival_rx) = ReconcilerCtl::new(config.clone(), push_rx, reconciler_rx, shutdown_tx.clone());
        let reconciler_handle = reconciler.spawn();

        let (connector_tx, connector_rx) = mpsc::channel(100);
        let (connector, status_rx, alerts_rx) = ConnectorCtl::new(
            config.clone(),
            client.clone(),
            connector_tx.clone(),
            connector_rx,
            reconciler_tx,
            shutdown_tx.clone(),
        );
        let connector_handle = connector.spawn();

        let watchdog = WatchdogCtl::new(config.clone(), status_rx.clone(), arrival_rx, connector_tx.clone(), shutdown_tx.clone());
        let watchdog_handle = watchdog.spawn();

        let (tracker_tx, tracker_rx) = mpsc::channel(100);
        let (tracker, progress_rx) = TrackerCtl::new(config.clone(), client.clone(), tracker_tx.clone(), tracker_rx, shutdown_tx.clone());
        let tracker_handle = tracker.spawn();

        Self {
            _config: config,
            client,
            push_tx,
            connector_tx,
            tracker_tx,
            commits_rx,
            status_rx,
            alerts_rx,
            progress_rx,
            shutdown_tx,
            handles: vec![reconciler_handle, connector_handle, watchdog_handle, tracker_handle],
        }
    }

    /// Start a connector with the given config.
    pub async fn start_connector(&self, spec: ConnectorSpec) -> Result<String, AppError> {
        let (tx, rx) = oneshot::channel();
        self.connector_tx
            .send(ConnectorCtlMsg::Start { spec, tx })
            .await
            .map_err(|_| AppError::Ise(anyhow!("lifecycle controller is no longer running")))?;
        rx.await.map_err(|_| AppError::Ise(anyhow!("lifecycle controller dropped the start request")))?
    }

    /// Stop the active connector. Idempotent.
    pub async fn stop_connector(&self) -> Result<(), AppError> {
        let (tx, rx) = oneshot::channel();
        self.connector_tx
            .send(ConnectorCtlMsg::Stop { tx })
            .await
            .map_err(|_| AppError::Ise(anyhow!("lifecycle controller is no longer running")))?;
        rx.await.map_err(|_| AppError::Ise(anyhow!("lifecycle controller dropped the stop request")))?
    }

    /// List the pipelines available for tracking.
    pub async fn pipelines(&self) -> Result<Vec<PipelineInfo>, AppError> {
        self.client.list_pipelines().await
    }

    /// Trigger a pipeline job run directly, for backends where connector
    /// start alone does not kick off a run.
    pub async fn run_job(&self, id: &str) -> Result<(), AppError> {
        self.client.run_job(id).await
    }

    /// Begin tracking progress of the given pipeline.
    pub async fn track_pipeline(&self, id: impl Into<String>) {
        let _res = self.tracker_tx.send(TrackerCtlMsg::Track(id.into())).await;
    }

    /// Stop tracking pipeline progress.
    pub async fn untrack_pipeline(&self) {
        let _res = self.tracker_tx.send(TrackerCtlMsg::Untrack).await;
    }

    /// The sender side of the push channel, to be fed by a transport.
    pub fn push_sender(&self) -> mpsc::Sender<PushEvent> {
        self.push_tx.clone()
    }

    /// The committed record view.
    pub fn commits(&self) -> watch::Receiver<CommitSnapshot> {
        self.commits_rx.clone()
    }

    /// The connector's externally visible status.
    pub fn status(&self) -> watch::Receiver<ConnectorStatus> {
        self.status_rx.clone()
    }

    /// The current user-visible alert, if any.
    pub fn alerts(&self) -> watch::Receiver<Option<Alert>> {
        self.alerts_rx.clone()
    }

    /// The pipeline progress view.
    pub fn progress(&self) -> watch::Receiver<ProgressView> {
        self.progress_rx.clone()
    }

    /// Tear the session down, cancelling every periodic timer.
    pub async fn shutdown(self) -> Result<()> {
        let started = tokio::time::Instant::now().into_std();
        let _res = self.shutdown_tx.send(());
        for handle in self.handles {
            if let Err(err) = handle.await.map_err(anyhow::Error::from).and_then(|res| res) {
                tracing::error!(error = ?err, "error shutting down controller");
            }
        }
        tracing::debug!(elapsed = ?started.elapsed(), "session shutdown complete");
        Ok(())
    }
}

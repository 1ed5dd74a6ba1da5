//! Connector lifecycle controller.
//!
//! Owns the connector state machine and issues all backend calls:
//!
//! ```text
//! inactive --start--> creating --(backend ack)--> running
//! running  --stop-->  stopping --(backend ack)--> inactive
//! running  --watchdog stale--> error --(auto, grace)--> inactive
//! any      --backend error-->  error
//! ```
//!
//! Entering `inactive` or `creating` always clears the reconciler buffer and
//! disarms the watchdog, so no stale data from a previous session leaks into
//! a new one. At most one connector runs per session: starting while already
//! running fully stops and awaits backend acknowledgment first.

use std::sync::Arc;

use anyhow::Result;
use futures::stream::StreamExt;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::{BroadcastStream, ReceiverStream};

use crate::client::BackendApi;
use crate::config::Config;
use crate::error::{ApiResult, AppError};
use crate::reconciler::ReconcilerCtlMsg;
use syncline_core::connector::ConnectorSpec;
use syncline_core::record::RawRecord;
use syncline_core::status::ConnectorStatus;
use syncline_core::validate::validate_connector;

/// A user-visible alert raised by the lifecycle controller.
///
/// Blocking alerts correspond to validation and transport errors; advisory
/// alerts (staleness) auto-recover and never block the UI.
#[derive(Clone, Debug, PartialEq)]
pub struct Alert {
    pub message: String,
    pub blocking: bool,
}

/// A controller managing the lifecycle of the session's connector.
pub struct ConnectorCtl {
    /// The application's runtime config.
    config: Arc<Config>,
    /// The backend API client.
    client: Arc<dyn BackendApi>,

    /// A channel of inbound requests and internal events.
    msgs_tx: mpsc::Sender<ConnectorCtlMsg>,
    /// A channel of inbound requests and internal events.
    msgs_rx: ReceiverStream<ConnectorCtlMsg>,
    /// The reconciler's control channel.
    reconciler_tx: mpsc::Sender<ReconcilerCtlMsg>,
    /// The connector's externally visible status, published for the watchdog
    /// and the UI.
    status_tx: watch::Sender<ConnectorStatus>,
    /// The current user-visible alert, if any.
    alerts_tx: watch::Sender<Option<Alert>>,

    /// The last published status.
    status: ConnectorStatus,
    /// The backend-assigned ID of the active connector, if any.
    connector_id: Option<String>,
    /// A bool indicating if a pull refresh is currently in flight.
    is_fetching: bool,

    /// A channel used for triggering graceful shutdown.
    shutdown_rx: BroadcastStream<()>,
}

impl ConnectorCtl {
    /// Create a new instance.
    pub fn new(
        config: Arc<Config>, client: Arc<dyn BackendApi>, msgs_tx: mpsc::Sender<ConnectorCtlMsg>, msgs_rx: mpsc::Receiver<ConnectorCtlMsg>,
        reconciler_tx: mpsc::Sender<ReconcilerCtlMsg>, shutdown_tx: broadcast::Sender<()>,
    ) -> (Self, watch::Receiver<ConnectorStatus>, watch::Receiver<Option<Alert>>) {
        let (status_tx, status_rx) = watch::channel(ConnectorStatus::Inactive);
        let (alerts_tx, alerts_rx) = watch::channel(None);
        (
            Self {
                config,
                client,
                msgs_tx,
                msgs_rx: ReceiverStream::new(msgs_rx),
                reconciler_tx,
                status_tx,
                alerts_tx,
                status: ConnectorStatus::Inactive,
                connector_id: None,
                is_fetching: false,
                shutdown_rx: BroadcastStream::new(shutdown_tx.subscribe()),
            },
            status_rx,
            alerts_rx,
        )
    }

    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) -> Result<()> {
        tracing::debug!("connector lifecycle controller has started");

        let mut pull_timer = tokio::time::interval(self.config.pull_refresh_interval());
        loop {
            tokio::select! {
                Some(msg) = self.msgs_rx.next() => self.handle_msg(msg).await,
                _ = pull_timer.tick() => self.spawn_pull_refresh(),
                _ = self.shutdown_rx.next() => break,
            }
        }

        tracing::debug!("connector lifecycle controller has shutdown");
        Ok(())
    }

    /// Handle a controller message.
    #[tracing::instrument(level = "trace", skip(self, msg))]
    async fn handle_msg(&mut self, msg: ConnectorCtlMsg) {
        match msg {
            ConnectorCtlMsg::Start { spec, tx } => self.handle_start(spec, tx).await,
            ConnectorCtlMsg::Stop { tx } => self.handle_stop(tx).await,
            ConnectorCtlMsg::StreamStale => self.handle_stream_stale().await,
            ConnectorCtlMsg::ForcedReset => self.handle_forced_reset().await,
            ConnectorCtlMsg::PullResult(res) => self.handle_pull_result(res).await,
        }
    }

    /// Transition to the given status, clearing reconciler and watchdog state
    /// when entering `Inactive` or `Creating`.
    async fn set_status(&mut self, status: ConnectorStatus) {
        self.status = status;
        let _res = self.status_tx.send(status);
        if matches!(status, ConnectorStatus::Inactive | ConnectorStatus::Creating) {
            let _res = self.reconciler_tx.send(ReconcilerCtlMsg::Reset).await;
        }
    }

    fn raise_alert(&mut self, message: String, blocking: bool) {
        let _res = self.alerts_tx.send(Some(Alert { message, blocking }));
    }

    /// Handle a request to start a connector.
    ///
    /// Validation runs before any network call. If a connector is already
    /// active, it is fully stopped and acknowledged first so two concurrent
    /// subscriptions can never exist for one session.
    #[tracing::instrument(level = "trace", skip(self, spec, tx))]
    async fn handle_start(&mut self, spec: ConnectorSpec, tx: oneshot::Sender<Result<String, AppError>>) {
        if let Err(err) = validate_connector(&spec) {
            self.raise_alert(err.to_string(), true);
            let _res = tx.send(Err(err));
            return;
        }
        if let Some(id) = self.connector_id.take() {
            self.set_status(ConnectorStatus::Stopping).await;
            if let Err(err) = self.client.stop_connector(&id).await {
                tracing::error!(error = %err, connector = %id, "error stopping connector before restart");
                self.raise_alert(err.to_string(), true);
                self.set_status(ConnectorStatus::Error).await;
                let _res = tx.send(Err(err));
                return;
            }
        }

        self.set_status(ConnectorStatus::Creating).await;
        let id = match self.client.create_connector(&spec).await {
            Ok(id) => id,
            Err(err) => {
                tracing::error!(error = %err, "error creating connector");
                self.raise_alert(err.to_string(), true);
                self.set_status(ConnectorStatus::Error).await;
                let _res = tx.send(Err(err));
                return;
            }
        };
        self.connector_id = Some(id.clone());
        let _res = self.reconciler_tx.send(ReconcilerCtlMsg::SetConnector(id.clone())).await;

        if let Err(err) = self.client.start_connector(&id).await {
            tracing::error!(error = %err, connector = %id, "error starting connector");
            self.raise_alert(err.to_string(), true);
            self.set_status(ConnectorStatus::Error).await;
            let _res = tx.send(Err(err));
            return;
        }
        let _res = self.alerts_tx.send(None);
        self.set_status(ConnectorStatus::Running).await;
        tracing::info!(connector = %id, "connector is running");
        let _res = tx.send(Ok(id));
    }

    /// Handle a request to stop the connector. Idempotent: stopping an
    /// inactive session is a no-op.
    #[tracing::instrument(level = "trace", skip(self, tx))]
    async fn handle_stop(&mut self, tx: oneshot::Sender<Result<(), AppError>>) {
        if self.status == ConnectorStatus::Inactive {
            let _res = tx.send(Ok(()));
            return;
        }
        self.set_status(ConnectorStatus::Stopping).await;
        let res = match self.connector_id.take() {
            Some(id) => self.client.stop_connector(&id).await,
            None => Ok(()),
        };
        match res {
            Ok(()) => {
                self.set_status(ConnectorStatus::Inactive).await;
                let _res = tx.send(Ok(()));
            }
            Err(err) => {
                tracing::error!(error = %err, "error stopping connector");
                self.raise_alert(err.to_string(), true);
                // Teardown must stay consistent even when the backend call
                // fails, so the buffer is still cleared.
                let _res = self.reconciler_tx.send(ReconcilerCtlMsg::Reset).await;
                self.set_status(ConnectorStatus::Error).await;
                let _res = tx.send(Err(err));
            }
        }
    }

    /// Handle a stale signal from the watchdog: surface an advisory warning,
    /// enter `Error`, and schedule the forced reset after the grace delay.
    #[tracing::instrument(level = "trace", skip(self))]
    async fn handle_stream_stale(&mut self) {
        if self.status != ConnectorStatus::Running {
            return;
        }
        self.raise_alert(AppError::Stale.to_string(), false);
        self.set_status(ConnectorStatus::Error).await;
        let (msgs_tx, grace) = (self.msgs_tx.clone(), self.config.stale_reset_grace());
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let _res = msgs_tx.send(ConnectorCtlMsg::ForcedReset).await;
        });
    }

    /// Handle the forced stop-and-reset which follows a staleness episode.
    ///
    /// Only acts while the session is still in the error state from that
    /// episode: a connector the user restarted (or stopped) during the grace
    /// window must not be torn down by the previous episode's reset.
    #[tracing::instrument(level = "trace", skip(self))]
    async fn handle_forced_reset(&mut self) {
        if self.status != ConnectorStatus::Error {
            tracing::debug!(status = %self.status, "stale episode superseded before the grace elapsed, skipping forced reset");
            return;
        }
        if let Some(id) = self.connector_id.take() {
            if let Err(err) = self.client.stop_connector(&id).await {
                tracing::warn!(error = %err, connector = %id, "error stopping stale connector, resetting anyway");
            }
        }
        self.set_status(ConnectorStatus::Inactive).await;
        tracing::info!("stale connector has been reset");
    }

    /// Begin a pull refresh of ingested records, if one is due.
    #[tracing::instrument(level = "trace", skip(self))]
    fn spawn_pull_refresh(&mut self) {
        if self.status != ConnectorStatus::Running || self.is_fetching {
            return;
        }
        let id = match self.connector_id.clone() {
            Some(id) => id,
            None => return,
        };
        self.is_fetching = true;
        let (client, msgs_tx, limit) = (self.client.clone(), self.msgs_tx.clone(), self.config.pull_batch_limit);
        tokio::spawn(async move {
            let res = client.fetch_records(&id, limit).await;
            let _res = msgs_tx.send(ConnectorCtlMsg::PullResult(res)).await;
        });
    }

    /// Handle the result of a pull refresh.
    #[tracing::instrument(level = "trace", skip(self, res))]
    async fn handle_pull_result(&mut self, res: ApiResult<Vec<RawRecord>>) {
        self.is_fetching = false;
        match res {
            Ok(batch) => {
                let _res = self.reconciler_tx.send(ReconcilerCtlMsg::PullBatch(batch)).await;
            }
            Err(err) => {
                tracing::error!(error = %err, "error pull-refreshing ingested records");
                self.raise_alert(err.to_string(), true);
                self.set_status(ConnectorStatus::Error).await;
            }
        }
    }
}

/// A message bound for the connector lifecycle controller.
pub enum ConnectorCtlMsg {
    /// A request to start a connector with the given config.
    Start {
        spec: ConnectorSpec,
        tx: oneshot::Sender<Result<String, AppError>>,
    },
    /// A request to stop the active connector.
    Stop { tx: oneshot::Sender<Result<(), AppError>> },
    /// The watchdog has declared the stream stale.
    StreamStale,
    /// The grace period after a stale signal has elapsed.
    ForcedReset,
    /// A pull refresh has finished.
    PullResult(ApiResult<Vec<RawRecord>>),
}

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::config::Config;
use crate::error::AppError;
use crate::fixtures::{self, MockBackend};
use crate::lifecycle::{Alert, ConnectorCtl, ConnectorCtlMsg};
use crate::reconciler::ReconcilerCtlMsg;
use syncline_core::status::ConnectorStatus;

struct Harness {
    ctl_tx: mpsc::Sender<ConnectorCtlMsg>,
    reconciler_rx: mpsc::Receiver<ReconcilerCtlMsg>,
    status_rx: watch::Receiver<ConnectorStatus>,
    alerts_rx: watch::Receiver<Option<Alert>>,
    mock: Arc<MockBackend>,
    _shutdown_tx: broadcast::Sender<()>,
}

impl Harness {
    async fn start(&self) -> Result<String, AppError> {
        let (tx, rx) = oneshot::channel();
        let _res = self.ctl_tx.send(ConnectorCtlMsg::Start { spec: fixtures::connector_spec(), tx }).await;
        rx.await.expect("lifecycle controller must reply to start")
    }

    async fn stop(&self) -> Result<(), AppError> {
        let (tx, rx) = oneshot::channel();
        let _res = self.ctl_tx.send(ConnectorCtlMsg::Stop { tx }).await;
        rx.await.expect("lifecycle controller must reply to stop")
    }

    fn drain_reconciler(&mut self) -> Vec<ReconcilerCtlMsg> {
        let mut msgs = Vec::new();
        while let Ok(msg) = self.reconciler_rx.try_recv() {
            msgs.push(msg);
        }
        msgs
    }
}

async fn spawn_lifecycle() -> Harness {
    let config = Config::new_test();
    let mock = MockBackend::new();
    let (shutdown_tx, _) = broadcast::channel(10);
    let (ctl_tx, ctl_rx) = mpsc::channel(100);
    let (reconciler_tx, reconciler_rx) = mpsc::channel(100);
    let (ctl, status_rx, alerts_rx) = ConnectorCtl::new(config, mock.clone(), ctl_tx.clone(), ctl_rx, reconciler_tx, shutdown_tx.clone());
    ctl.spawn();
    // Under the paused clock the controller's pull timer has an immediate
    // first tick; yield so it is consumed before any test command arrives,
    // as it is in production where the actor runs ahead of user input.
    tokio::task::yield_now().await;
    Harness {
        ctl_tx,
        reconciler_rx,
        status_rx,
        alerts_rx,
        mock,
        _shutdown_tx: shutdown_tx,
    }
}

#[tokio::test(start_paused = true)]
async fn start_runs_the_connector() {
    let mut harness = spawn_lifecycle().await;

    let res = harness.start().await;

    assert_eq!(res.as_deref().ok(), Some("conn-test-1"), "expected the backend-assigned ID, got {:?}", res);
    assert_eq!(*harness.status_rx.borrow(), ConnectorStatus::Running, "expected the running status");
    let calls = harness.mock.calls();
    assert_eq!(calls, vec!["create", "start:conn-test-1"], "unexpected backend calls {:?}", calls);
    let msgs = harness.drain_reconciler();
    assert!(
        matches!(msgs.as_slice(), [ReconcilerCtlMsg::Reset, ReconcilerCtlMsg::SetConnector(id)] if id == "conn-test-1"),
        "expected a reset then connector attribution, got {:?}",
        msgs
    );
}

#[tokio::test(start_paused = true)]
async fn placeholder_credentials_are_rejected_before_any_network_call() {
    let harness = spawn_lifecycle().await;
    let mut spec = fixtures::connector_spec();
    spec.auth.fields.insert("token".into(), "your-token-here".into());

    let (tx, rx) = oneshot::channel();
    let _res = harness.ctl_tx.send(ConnectorCtlMsg::Start { spec, tx }).await;
    let res = rx.await.expect("lifecycle controller must reply to start");

    assert!(matches!(res, Err(AppError::InvalidInput(_))), "expected a validation error, got {:?}", res);
    assert!(harness.mock.calls().is_empty(), "expected no backend calls on validation failure, got {:?}", harness.mock.calls());
    let alert = harness.alerts_rx.borrow().clone();
    assert!(alert.as_ref().map(|a| a.blocking) == Some(true), "expected a blocking alert, got {:?}", alert);
    assert_eq!(*harness.status_rx.borrow(), ConnectorStatus::Inactive, "expected the status untouched by validation");
}

#[tokio::test(start_paused = true)]
async fn backend_failure_during_start_enters_error() {
    let harness = spawn_lifecycle().await;
    harness.mock.set_failing("create");

    let res = harness.start().await;

    assert!(matches!(res, Err(AppError::Transport(_))), "expected a transport error, got {:?}", res);
    assert_eq!(*harness.status_rx.borrow(), ConnectorStatus::Error, "expected the error status");
    let alert = harness.alerts_rx.borrow().clone();
    assert!(alert.as_ref().map(|a| a.blocking) == Some(true), "expected a blocking alert, got {:?}", alert);
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent_when_inactive() {
    let harness = spawn_lifecycle().await;

    let res = harness.stop().await;

    assert!(res.is_ok(), "expected stopping an inactive session to be a no-op, got {:?}", res);
    assert!(harness.mock.calls().is_empty(), "expected no backend calls, got {:?}", harness.mock.calls());
}

#[tokio::test(start_paused = true)]
async fn stop_tears_the_session_down() {
    let mut harness = spawn_lifecycle().await;
    harness.start().await.expect("start must succeed");
    harness.drain_reconciler();

    let res = harness.stop().await;

    assert!(res.is_ok(), "expected a clean stop, got {:?}", res);
    assert_eq!(*harness.status_rx.borrow(), ConnectorStatus::Inactive, "expected the inactive status");
    let calls = harness.mock.calls();
    assert_eq!(calls.last().map(String::as_str), Some("stop:conn-test-1"), "expected a backend stop, got {:?}", calls);
    let msgs = harness.drain_reconciler();
    assert!(
        msgs.iter().any(|msg| matches!(msg, ReconcilerCtlMsg::Reset)),
        "expected the reconciler reset on teardown, got {:?}",
        msgs
    );
}

#[tokio::test(start_paused = true)]
async fn restart_stops_the_existing_connector_first() {
    let harness = spawn_lifecycle().await;
    harness.start().await.expect("first start must succeed");

    let res = harness.start().await;

    assert!(res.is_ok(), "expected the restart to succeed, got {:?}", res);
    let calls = harness.mock.calls();
    assert_eq!(
        calls,
        vec!["create", "start:conn-test-1", "stop:conn-test-1", "create", "start:conn-test-1"],
        "expected the existing connector stopped before the restart, got {:?}",
        calls
    );
}

#[tokio::test(start_paused = true)]
async fn stale_signal_enters_error_then_auto_resets() {
    let mut harness = spawn_lifecycle().await;
    harness.start().await.expect("start must succeed");
    harness.drain_reconciler();

    let _res = harness.ctl_tx.send(ConnectorCtlMsg::StreamStale).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(*harness.status_rx.borrow(), ConnectorStatus::Error, "expected the error status on a stale signal");
    let alert = harness.alerts_rx.borrow().clone();
    assert!(alert.as_ref().map(|a| a.blocking) == Some(false), "expected an advisory (non-blocking) alert, got {:?}", alert);

    // After the grace delay the connector is force-stopped and the session
    // returns to inactive with a cleared buffer.
    tokio::time::sleep(Duration::from_millis(3100)).await;
    assert_eq!(*harness.status_rx.borrow(), ConnectorStatus::Inactive, "expected the forced reset after the grace delay");
    let calls = harness.mock.calls();
    assert_eq!(calls.last().map(String::as_str), Some("stop:conn-test-1"), "expected the stale connector stopped, got {:?}", calls);
    let msgs = harness.drain_reconciler();
    assert!(
        msgs.iter().any(|msg| matches!(msg, ReconcilerCtlMsg::Reset)),
        "expected the reconciler reset by the forced reset, got {:?}",
        msgs
    );
}

#[tokio::test(start_paused = true)]
async fn a_restart_during_the_grace_window_survives_the_forced_reset() {
    let mut harness = spawn_lifecycle().await;
    harness.start().await.expect("start must succeed");
    let _res = harness.ctl_tx.send(ConnectorCtlMsg::StreamStale).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(*harness.status_rx.borrow(), ConnectorStatus::Error, "expected the error status on a stale signal");

    // The user restarts before the grace delay elapses; the stale episode is
    // superseded and its pending reset must not touch the fresh connector.
    harness.start().await.expect("restart must succeed");
    harness.drain_reconciler();
    assert_eq!(*harness.status_rx.borrow(), ConnectorStatus::Running, "expected the restarted connector running");

    tokio::time::sleep(Duration::from_millis(3100)).await;
    assert_eq!(
        *harness.status_rx.borrow(),
        ConnectorStatus::Running,
        "expected the restarted connector to survive the previous episode's reset"
    );
    let calls = harness.mock.calls();
    assert_eq!(
        calls.last().map(String::as_str),
        Some("start:conn-test-1"),
        "expected no backend stop after the restart, got {:?}",
        calls
    );
    let msgs = harness.drain_reconciler();
    assert!(
        !msgs.iter().any(|msg| matches!(msg, ReconcilerCtlMsg::Reset)),
        "expected no reconciler reset after the grace elapsed, got {:?}",
        msgs
    );
}

#[tokio::test(start_paused = true)]
async fn stale_signal_is_ignored_unless_running() {
    let harness = spawn_lifecycle().await;

    let _res = harness.ctl_tx.send(ConnectorCtlMsg::StreamStale).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(*harness.status_rx.borrow(), ConnectorStatus::Inactive, "expected a stale signal on an inactive session ignored");
    assert!(harness.alerts_rx.borrow().is_none(), "expected no alert, got {:?}", harness.alerts_rx.borrow());
}

#[tokio::test(start_paused = true)]
async fn pull_results_forward_to_the_reconciler() {
    let mut harness = spawn_lifecycle().await;
    harness.start().await.expect("start must succeed");
    harness.drain_reconciler();

    let _res = harness.ctl_tx.send(ConnectorCtlMsg::PullResult(Ok(fixtures::raw_records(3)))).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    let msgs = harness.drain_reconciler();
    assert!(
        matches!(msgs.as_slice(), [ReconcilerCtlMsg::PullBatch(batch)] if batch.len() == 3),
        "expected the pull batch forwarded, got {:?}",
        msgs
    );
}

#[tokio::test(start_paused = true)]
async fn pull_failure_enters_error() {
    let harness = spawn_lifecycle().await;
    harness.start().await.expect("start must succeed");

    let _res = harness
        .ctl_tx
        .send(ConnectorCtlMsg::PullResult(Err(AppError::Transport("connection refused".into()))))
        .await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(*harness.status_rx.borrow(), ConnectorStatus::Error, "expected the error status on a pull failure");
    let alert = harness.alerts_rx.borrow().clone();
    assert!(alert.as_ref().map(|a| a.blocking) == Some(true), "expected a blocking alert, got {:?}", alert);
}

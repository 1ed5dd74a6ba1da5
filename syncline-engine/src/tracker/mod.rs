//! Pipeline run progress tracker.
//!
//! Presents a step-by-step view of the currently active (or most recent)
//! pipeline run with smoothly animated record counters. Runs in parallel to
//! the reconciler, polling a different endpoint but sharing the same
//! connector identity. Two cadences decouple count freshness from full-state
//! freshness: a fast poll re-fetches only counts, a slow poll re-fetches the
//! full run/step/history metadata.

mod anim;
mod counts;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use futures::stream::StreamExt;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::{BroadcastStream, ReceiverStream};

use crate::client::BackendApi;
use crate::config::Config;
use crate::error::ApiResult;
use syncline_core::pipeline::{DataStats, PipelineSnapshot, StepSnapshot};
use syncline_core::status::{RunStatus, StepStatus};

pub use anim::{duration_for, ease_in_out, value_at, CounterAnim, MAX_ANIMATION, MIN_ANIMATION};
pub use counts::{active_step, active_step_with, derived_status, details_count, raw_count_for_step, BaselineCounts};

/// The progress view published for the UI.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProgressView {
    /// The run currently being presented, if any.
    pub run_id: Option<String>,
    /// The normalized overall run status.
    pub run_status: RunStatus,
    /// Per-step views, in pipeline order.
    pub steps: Vec<StepView>,
    /// The name of the active step, if one could be determined.
    pub active_step: Option<String>,
}

/// One step of the presented run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepView {
    pub name: String,
    pub status: StepStatus,
    /// The smoothed counter value currently being displayed.
    pub display_count: u64,
    /// The raw target count the display is converging to.
    pub raw_count: u64,
}

/// A controller tracking the progress of one pipeline.
pub struct TrackerCtl {
    /// The application's runtime config.
    config: Arc<Config>,
    /// The backend API client.
    client: Arc<dyn BackendApi>,

    /// A channel of control messages and internal fetch results.
    msgs_tx: mpsc::Sender<TrackerCtlMsg>,
    /// A channel of control messages and internal fetch results.
    msgs_rx: ReceiverStream<TrackerCtlMsg>,
    /// The progress view, published for the UI.
    progress_tx: watch::Sender<ProgressView>,

    /// The pipeline being tracked, if any.
    pipeline_id: Option<String>,
    /// The run currently being presented.
    run_id: Option<String>,
    /// The normalized overall status of that run.
    run_status: RunStatus,
    /// The last fetched steps, in pipeline order.
    steps: Vec<StepSnapshot>,
    /// The last fetched cumulative statistics.
    stats: Option<DataStats>,
    /// Baseline captured when the current run was first observed; written
    /// only by this controller.
    baseline: BaselineCounts,
    /// Independent counter interpolations, keyed by step name.
    anims: HashMap<String, CounterAnim>,

    /// A bool indicating if a fast (counts) fetch is in flight.
    fetching_counts: bool,
    /// A bool indicating if a slow (full snapshot) fetch is in flight.
    fetching_snapshot: bool,

    /// A channel used for triggering graceful shutdown.
    shutdown_rx: BroadcastStream<()>,
}

impl TrackerCtl {
    /// Create a new instance.
    pub fn new(
        config: Arc<Config>, client: Arc<dyn BackendApi>, msgs_tx: mpsc::Sender<TrackerCtlMsg>, msgs_rx: mpsc::Receiver<TrackerCtlMsg>,
        shutdown_tx: broadcast::Sender<()>,
    ) -> (Self, watch::Receiver<ProgressView>) {
        let (progress_tx, progress_rx) = watch::channel(ProgressView::default());
        (
            Self {
                config,
                client,
                msgs_tx,
                msgs_rx: ReceiverStream::new(msgs_rx),
                progress_tx,
                pipeline_id: None,
                run_id: None,
                run_status: RunStatus::Pending,
                steps: Vec::new(),
                stats: None,
                baseline: BaselineCounts::default(),
                anims: HashMap::new(),
                fetching_counts: false,
                fetching_snapshot: false,
                shutdown_rx: BroadcastStream::new(shutdown_tx.subscribe()),
            },
            progress_rx,
        )
    }

    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) -> Result<()> {
        tracing::debug!("pipeline progress tracker has started");

        let mut fast_timer = tokio::time::interval(self.config.fast_poll_interval());
        let mut slow_timer = tokio::time::interval(self.config.slow_poll_interval());
        loop {
            tokio::select! {
                Some(msg) = self.msgs_rx.next() => self.handle_msg(msg),
                _ = fast_timer.tick() => self.handle_fast_tick(),
                _ = slow_timer.tick() => self.spawn_snapshot_fetch(),
                _ = self.shutdown_rx.next() => break,
            }
        }

        tracing::debug!("pipeline progress tracker has shutdown");
        Ok(())
    }

    /// Handle a controller message.
    #[tracing::instrument(level = "trace", skip(self, msg))]
    fn handle_msg(&mut self, msg: TrackerCtlMsg) {
        match msg {
            TrackerCtlMsg::Track(id) => self.handle_track(id),
            TrackerCtlMsg::Untrack => self.handle_untrack(),
            TrackerCtlMsg::SnapshotResult(res) => self.handle_snapshot_result(res),
            TrackerCtlMsg::CountsResult(res) => self.handle_counts_result(res),
        }
    }

    /// Begin tracking the given pipeline, discarding any previous state.
    fn handle_track(&mut self, id: String) {
        self.clear_run_state();
        self.pipeline_id = Some(id);
        self.spawn_snapshot_fetch();
    }

    /// Stop tracking and publish the empty view.
    fn handle_untrack(&mut self) {
        self.pipeline_id = None;
        self.clear_run_state();
        self.publish();
    }

    fn clear_run_state(&mut self) {
        self.run_id = None;
        self.run_status = RunStatus::Pending;
        self.steps.clear();
        self.stats = None;
        self.baseline = BaselineCounts::default();
        self.anims.clear();
    }

    /// The fast tick: kick off a counts fetch and re-publish the view so
    /// in-flight counter interpolations stay visually live.
    fn handle_fast_tick(&mut self) {
        self.spawn_counts_fetch();
        if self.pipeline_id.is_some() {
            self.publish();
        }
    }

    /// Begin a fast counts-only fetch, if one is due.
    fn spawn_counts_fetch(&mut self) {
        if self.fetching_counts {
            return;
        }
        let id = match self.pipeline_id.clone() {
            Some(id) => id,
            None => return,
        };
        self.fetching_counts = true;
        let (client, msgs_tx) = (self.client.clone(), self.msgs_tx.clone());
        tokio::spawn(async move {
            let res = client.fetch_pipeline_stats(&id).await;
            let _res = msgs_tx.send(TrackerCtlMsg::CountsResult(res)).await;
        });
    }

    /// Begin a full snapshot fetch, if one is due.
    #[tracing::instrument(level = "trace", skip(self))]
    fn spawn_snapshot_fetch(&mut self) {
        if self.fetching_snapshot {
            return;
        }
        let id = match self.pipeline_id.clone() {
            Some(id) => id,
            None => return,
        };
        self.fetching_snapshot = true;
        let (client, msgs_tx) = (self.client.clone(), self.msgs_tx.clone());
        tokio::spawn(async move {
            let res = client.fetch_pipeline(&id).await;
            let _res = msgs_tx.send(TrackerCtlMsg::SnapshotResult(res)).await;
        });
    }

    /// Handle the result of a counts-only fetch.
    fn handle_counts_result(&mut self, res: ApiResult<Option<DataStats>>) {
        self.fetching_counts = false;
        match res {
            Ok(stats) => {
                if stats.is_some() {
                    self.stats = stats;
                }
                self.apply_counts(tokio::time::Instant::now().into_std());
                self.publish();
            }
            // Polling errors are non-fatal; the next tick retries.
            Err(err) => tracing::warn!(error = %err, "error fetching pipeline counts"),
        }
    }

    /// Handle the result of a full snapshot fetch.
    #[tracing::instrument(level = "trace", skip(self, res))]
    fn handle_snapshot_result(&mut self, res: ApiResult<PipelineSnapshot>) {
        self.fetching_snapshot = false;
        let snap = match res {
            Ok(snap) => snap,
            Err(err) => {
                tracing::warn!(error = %err, "error fetching pipeline snapshot");
                return;
            }
        };
        if snap.data_stats.is_some() {
            self.stats = snap.data_stats;
        }
        let run = match snap.run.or_else(|| snap.history.first().cloned()) {
            Some(run) => run,
            None => {
                self.publish();
                return;
            }
        };
        if self.run_id.as_deref() != Some(run.run_id.as_str()) {
            // A new run: capture the then-current cumulative totals as the
            // baseline and restart all counters from zero.
            tracing::debug!(run = %run.run_id, "new pipeline run observed, capturing baseline");
            self.baseline = BaselineCounts::capture(self.stats.as_ref());
            for anim in self.anims.values_mut() {
                anim.snap(0.0);
            }
            self.run_id = Some(run.run_id.clone());
        }
        self.run_status = run.status.as_deref().map(StepStatus::normalize).unwrap_or_default();
        self.steps = run.steps;
        self.apply_counts(tokio::time::Instant::now().into_std());
        self.publish();
    }

    /// Retarget the per-step counter interpolations onto fresh raw counts.
    fn apply_counts(&mut self, now: Instant) {
        for step in &self.steps {
            let raw = raw_count_for_step(step, self.stats.as_ref(), &self.baseline);
            self.anims
                .entry(step.name.clone())
                .or_insert_with(|| CounterAnim::idle(0.0))
                .retarget(now, raw as f64);
        }
    }

    /// Publish the current progress view.
    fn publish(&mut self) {
        let now = tokio::time::Instant::now().into_std();
        let active = counts::active_step_with(&self.steps, self.run_status);
        let steps = self
            .steps
            .iter()
            .enumerate()
            .map(|(idx, step)| {
                let anim = self.anims.get(&step.name);
                let mut status = derived_status(step);
                if active == Some(idx) && status == StepStatus::Pending {
                    status = StepStatus::Running;
                }
                StepView {
                    name: step.name.clone(),
                    status,
                    display_count: anim.map(|a| a.value(now).round().max(0.0) as u64).unwrap_or(0),
                    raw_count: anim.map(|a| a.target().round().max(0.0) as u64).unwrap_or(0),
                }
            })
            .collect();
        let view = ProgressView {
            run_id: self.run_id.clone(),
            run_status: self.run_status,
            steps,
            active_step: active.and_then(|idx| self.steps.get(idx)).map(|step| step.name.clone()),
        };
        let _res = self.progress_tx.send(view);
    }
}

/// A message bound for the progress tracker.
pub enum TrackerCtlMsg {
    /// Begin tracking the given pipeline.
    Track(String),
    /// Stop tracking and clear the view.
    Untrack,
    /// A full snapshot fetch has finished.
    SnapshotResult(ApiResult<PipelineSnapshot>),
    /// A counts-only fetch has finished.
    CountsResult(ApiResult<Option<DataStats>>),
}

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::prelude::*;
use serde_json::json;

use crate::client::BackendApi;
use crate::error::{ApiResult, AppError};
use syncline_core::connector::{AuthSpec, ConnectorSpec};
use syncline_core::pipeline::{DataStats, PipelineInfo, PipelineSnapshot, RunSnapshot, StepSnapshot};
use syncline_core::record::RawRecord;

/// Build a raw data record with the given ID.
pub fn raw_record(id: &str) -> RawRecord {
    let ts = time::OffsetDateTime::now_utc().unix_timestamp();
    RawRecord {
        kind: Some("data".into()),
        id: Some(id.into()),
        source_id: Some("binance".into()),
        connector_id: Some("conn-test-1".into()),
        timestamp: Some(json!(ts)),
        exchange: Some("binance".into()),
        instrument: Some("BTC-USD".into()),
        price: Some(json!(rand::thread_rng().gen_range(10_000.0..90_000.0))),
        data: Some(json!({"ok": true})),
        message_type: Some("ticker".into()),
        status_code: Some(200),
        response_time_ms: Some(12),
    }
}

/// Build a batch of raw records with unique IDs, newest-first.
pub fn raw_records(count: usize) -> Vec<RawRecord> {
    (0..count).map(|idx| raw_record(&format!("rec-{}", idx))).collect()
}

/// Build a valid connector spec with real-looking credentials.
pub fn connector_spec() -> ConnectorSpec {
    ConnectorSpec {
        url: "https://api.exchange.test/v1/ticker".into(),
        method: "GET".into(),
        headers: Default::default(),
        query_params: Default::default(),
        auth: AuthSpec {
            kind: "bearer-token".into(),
            fields: [("token".to_string(), "sk-live-2f4a9c81d7".to_string())].into_iter().collect(),
        },
        polling_interval_secs: 60,
    }
}

/// Build a step snapshot.
pub fn step(name: &str, status: Option<&str>, started_at: Option<&str>, completed_at: Option<&str>) -> StepSnapshot {
    StepSnapshot {
        name: name.into(),
        status: status.map(String::from),
        started_at: started_at.map(String::from),
        completed_at: completed_at.map(String::from),
        details: None,
    }
}

/// Build a run snapshot with the conventional extract/transform/load steps.
pub fn etl_run(run_id: &str, status: &str) -> RunSnapshot {
    RunSnapshot {
        run_id: run_id.into(),
        status: Some(status.into()),
        steps: vec![
            step("extract", Some("running"), Some("t0"), None),
            step("transform", None, None, None),
            step("load", None, None, None),
        ],
    }
}

/// Build cumulative data stats.
pub fn stats(total_records: u64, items_processed: u64) -> DataStats {
    DataStats {
        total_records: Some(total_records),
        items_processed: Some(items_processed),
    }
}

/// A scriptable in-memory backend used in controller tests.
///
/// Records every call it receives; individual methods can be made to fail
/// with a transport error.
#[derive(Default)]
pub struct MockBackend {
    calls: Mutex<Vec<String>>,
    records: Mutex<Vec<RawRecord>>,
    snapshot: Mutex<PipelineSnapshot>,
    failing: Mutex<HashSet<String>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// All backend calls made so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("mock calls lock poisoned").clone()
    }

    pub fn set_records(&self, records: Vec<RawRecord>) {
        *self.records.lock().expect("mock records lock poisoned") = records;
    }

    pub fn set_snapshot(&self, snapshot: PipelineSnapshot) {
        *self.snapshot.lock().expect("mock snapshot lock poisoned") = snapshot;
    }

    /// Make the given method fail with a transport error.
    pub fn set_failing(&self, method: &str) {
        self.failing.lock().expect("mock failing lock poisoned").insert(method.into());
    }

    fn observe(&self, call: String, method: &str) -> ApiResult<()> {
        self.calls.lock().expect("mock calls lock poisoned").push(call);
        if self.failing.lock().expect("mock failing lock poisoned").contains(method) {
            return Err(AppError::Transport(format!("mock backend failure in {}", method)));
        }
        Ok(())
    }
}

#[async_trait]
impl BackendApi for MockBackend {
    async fn create_connector(&self, _spec: &ConnectorSpec) -> ApiResult<String> {
        self.observe("create".into(), "create")?;
        Ok("conn-test-1".into())
    }

    async fn start_connector(&self, id: &str) -> ApiResult<()> {
        self.observe(format!("start:{}", id), "start")
    }

    async fn stop_connector(&self, id: &str) -> ApiResult<()> {
        self.observe(format!("stop:{}", id), "stop")
    }

    async fn fetch_records(&self, id: &str, _limit: u32) -> ApiResult<Vec<RawRecord>> {
        self.observe(format!("fetch_records:{}", id), "fetch_records")?;
        Ok(self.records.lock().expect("mock records lock poisoned").clone())
    }

    async fn fetch_pipeline(&self, id: &str) -> ApiResult<PipelineSnapshot> {
        self.observe(format!("fetch_pipeline:{}", id), "fetch_pipeline")?;
        Ok(self.snapshot.lock().expect("mock snapshot lock poisoned").clone())
    }

    async fn fetch_pipeline_stats(&self, id: &str) -> ApiResult<Option<DataStats>> {
        self.observe(format!("fetch_stats:{}", id), "fetch_stats")?;
        Ok(self.snapshot.lock().expect("mock snapshot lock poisoned").data_stats)
    }

    async fn list_pipelines(&self) -> ApiResult<Vec<PipelineInfo>> {
        self.observe("list_pipelines".into(), "list_pipelines")?;
        Ok(Vec::new())
    }

    async fn run_job(&self, id: &str) -> ApiResult<()> {
        self.observe(format!("run_job:{}", id), "run_job")
    }
}

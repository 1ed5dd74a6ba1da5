//! Pipeline run wire models.
//!
//! These are serde views of the backend's pipeline snapshot endpoints. The
//! backend exposes counts and fields under inconsistent conventions
//! (snake_case vs camelCase, several fallback field names); serde aliases
//! absorb all of that here so downstream logic sees one shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A pipeline known to the backend, for selection.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PipelineInfo {
    #[serde(alias = "pipeline_id", alias = "pipelineId", alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// The full snapshot returned by `GET /api/etl/pipeline/{id}`:
/// current run, run history and cumulative data statistics.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct PipelineSnapshot {
    /// The currently active or most recent run.
    #[serde(default, alias = "current_run", alias = "currentRun", alias = "latest_run", alias = "latestRun")]
    pub run: Option<RunSnapshot>,
    /// Terminal runs retained in history, most recent first.
    #[serde(default)]
    pub history: Vec<RunSnapshot>,
    /// Cumulative data statistics for the connector.
    #[serde(default, alias = "dataStats", alias = "stats")]
    pub data_stats: Option<DataStats>,
}

/// One execution instance of a pipeline. Read-only: the engine never mutates
/// a run, only reads re-fetched snapshots of it.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct RunSnapshot {
    #[serde(default, alias = "runId", alias = "_id")]
    pub run_id: String,
    /// Raw provider status; normalized via `StepStatus::normalize`.
    #[serde(default)]
    pub status: Option<String>,
    /// The run's steps, in pipeline order (commonly extract, transform, load).
    #[serde(default)]
    pub steps: Vec<StepSnapshot>,
}

/// One stage within a run.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct StepSnapshot {
    pub name: String,
    /// Raw provider status; absent when the backend has not set one yet.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "startedAt", alias = "start_time", alias = "startTime")]
    pub started_at: Option<String>,
    #[serde(default, alias = "completedAt", alias = "end_time", alias = "endTime")]
    pub completed_at: Option<String>,
    /// Free-form detail blob; sometimes the only place a count is reported.
    #[serde(default)]
    pub details: Option<Value>,
}

/// Cumulative record counters for a connector.
///
/// These counters are cumulative since the connector was created, not per
/// run; per-run deltas are derived by the progress tracker via baselines.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct DataStats {
    #[serde(default, alias = "totalRecords", alias = "records_total", alias = "total_records_processed")]
    pub total_records: Option<u64>,
    #[serde(default, alias = "itemsProcessed", alias = "processed_items", alias = "items")]
    pub items_processed: Option<u64>,
}

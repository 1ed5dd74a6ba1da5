//! Backend REST client.
//!
//! The backend is an external collaborator; everything the engine needs from
//! it goes through the [`BackendApi`] trait so controllers never couple to a
//! concrete transport. [`HttpBackendClient`] is the production
//! implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::config::Config;
use crate::error::{transport_err, ApiResult, AppError};
use syncline_core::connector::ConnectorSpec;
use syncline_core::pipeline::{DataStats, PipelineInfo, PipelineSnapshot};
use syncline_core::record::RawRecord;

/// The sort field requested for pull batches.
const PULL_SORT_BY: &str = "timestamp";
/// Descending sort order, which yields records newest-first.
const PULL_SORT_ORDER: i32 = -1;

/// The backend API surface consumed by the engine.
#[async_trait]
pub trait BackendApi: Send + Sync + 'static {
    /// Create a connector, returning its backend-assigned ID.
    async fn create_connector(&self, spec: &ConnectorSpec) -> ApiResult<String>;
    /// Begin ingestion for the given connector. 2xx = accepted.
    async fn start_connector(&self, id: &str) -> ApiResult<()>;
    /// Stop ingestion for the given connector. 2xx = accepted.
    async fn stop_connector(&self, id: &str) -> ApiResult<()>;
    /// Fetch a pull batch of ingested records, newest-first.
    async fn fetch_records(&self, id: &str, limit: u32) -> ApiResult<Vec<RawRecord>>;
    /// Fetch the full run + history + data stats snapshot for a pipeline.
    async fn fetch_pipeline(&self, id: &str) -> ApiResult<PipelineSnapshot>;
    /// Fetch only the cumulative data stats for a pipeline (fast poll path).
    async fn fetch_pipeline_stats(&self, id: &str) -> ApiResult<Option<DataStats>>;
    /// List the pipelines known to the backend.
    async fn list_pipelines(&self) -> ApiResult<Vec<PipelineInfo>>;
    /// Trigger a job run directly; fallback when connector start is unavailable.
    async fn run_job(&self, id: &str) -> ApiResult<()>;
}

/// Response body of `POST /api/connectors`.
#[derive(Debug, Deserialize)]
struct CreateConnectorResponse {
    #[serde(alias = "connectorId", alias = "id")]
    connector_id: String,
}

/// Response body of the records pull endpoint.
#[derive(Debug, Default, Deserialize)]
struct RecordsPage {
    #[serde(default, alias = "records", alias = "items")]
    data: Vec<RawRecord>,
}

/// Stats-only view of the pipeline snapshot, used by the fast poll so count
/// freshness is decoupled from full-state freshness.
#[derive(Debug, Default, Deserialize)]
struct StatsOnlySnapshot {
    #[serde(default, alias = "dataStats", alias = "stats")]
    data_stats: Option<DataStats>,
}

/// A `reqwest`-backed implementation of the backend API.
pub struct HttpBackendClient {
    base: String,
    client: reqwest::Client,
}

impl HttpBackendClient {
    /// Create a new instance.
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("error building backend HTTP client")?;
        Ok(Self {
            base: config.backend_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Check a response status, mapping non-2xx onto the transport variant.
    async fn check(res: reqwest::Response) -> ApiResult<reqwest::Response> {
        if res.status().is_success() {
            return Ok(res);
        }
        let status = res.status();
        let path = res.url().path().to_string();
        Err(AppError::Transport(format!("backend returned {} for {}", status, path)))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let res = self.client.get(self.url(path)).send().await.map_err(transport_err)?;
        Self::check(res).await?.json().await.map_err(transport_err)
    }

    async fn post_empty(&self, path: &str) -> ApiResult<()> {
        let res = self.client.post(self.url(path)).send().await.map_err(transport_err)?;
        Self::check(res).await.map(|_| ())
    }

    /// Fetch the pipeline snapshot from the ETL endpoint, falling back to the
    /// plain pipeline endpoint when the former is not deployed.
    async fn fetch_pipeline_raw<T: serde::de::DeserializeOwned>(&self, id: &str) -> ApiResult<T> {
        let res = self
            .client
            .get(self.url(&format!("/api/etl/pipeline/{}", id)))
            .send()
            .await
            .map_err(transport_err)?;
        if res.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(pipeline = id, "ETL pipeline endpoint not found, falling back to /api/pipeline");
            return self.get_json(&format!("/api/pipeline/{}", id)).await;
        }
        Self::check(res).await?.json().await.map_err(transport_err)
    }
}

#[async_trait]
impl BackendApi for HttpBackendClient {
    async fn create_connector(&self, spec: &ConnectorSpec) -> ApiResult<String> {
        let res = self
            .client
            .post(self.url("/api/connectors"))
            .json(spec)
            .send()
            .await
            .map_err(transport_err)?;
        let body: CreateConnectorResponse = Self::check(res).await?.json().await.map_err(transport_err)?;
        Ok(body.connector_id)
    }

    async fn start_connector(&self, id: &str) -> ApiResult<()> {
        self.post_empty(&format!("/api/connectors/{}/start", id)).await
    }

    async fn stop_connector(&self, id: &str) -> ApiResult<()> {
        self.post_empty(&format!("/api/connectors/{}/stop", id)).await
    }

    async fn fetch_records(&self, id: &str, limit: u32) -> ApiResult<Vec<RawRecord>> {
        let path = format!("/api/connectors/{}/data?limit={}&sort_by={}&sort_order={}", id, limit, PULL_SORT_BY, PULL_SORT_ORDER);
        let page: RecordsPage = self.get_json(&path).await?;
        Ok(page.data)
    }

    async fn fetch_pipeline(&self, id: &str) -> ApiResult<PipelineSnapshot> {
        self.fetch_pipeline_raw(id).await
    }

    async fn fetch_pipeline_stats(&self, id: &str) -> ApiResult<Option<DataStats>> {
        let snap: StatsOnlySnapshot = self.fetch_pipeline_raw(id).await?;
        Ok(snap.data_stats)
    }

    async fn list_pipelines(&self) -> ApiResult<Vec<PipelineInfo>> {
        self.get_json("/api/pipeline").await
    }

    async fn run_job(&self, id: &str) -> ApiResult<()> {
        self.post_empty(&format!("/api/jobs/{}/run", id)).await
    }
}

//! BigQuery `jobs.query` client.
//!
//! Statements run as standard SQL with the configured dataset as default, so
//! unqualified table names resolve there. Each request carries a `requestId`;
//! BigQuery runs a query at most once per id, which makes retries safe.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::info;

use super::{QueryResult, Warehouse, post_json};
use crate::config::{GoogleConfig, WarehouseConfig};
use crate::errors::{ShiftlineError, ShiftlineResult};

const SERVICE: &str = "warehouse";
const BASE_URL: &str = "https://bigquery.googleapis.com";
/// How long BigQuery holds the request open waiting for the job.
const QUERY_TIMEOUT_MS: u64 = 10_000;

pub struct BigQueryWarehouse {
    access_token: String,
    base_url: String,
    project_id: String,
    dataset: String,
    client: Client,
}

impl BigQueryWarehouse {
    pub fn new(config: &WarehouseConfig, google: &GoogleConfig) -> Self {
        Self::with_base_url(config, google, BASE_URL.to_string())
    }

    pub(crate) fn with_base_url(
        config: &WarehouseConfig,
        google: &GoogleConfig,
        base_url: String,
    ) -> Self {
        Self {
            access_token: google.access_token.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            project_id: config.project_id.clone(),
            dataset: config.dataset.clone(),
            client: crate::utils::http::default_http_client(),
        }
    }

    fn request_body(&self, statement: &str, request_id: &str) -> Value {
        json!({
            "query": statement,
            "requestId": request_id,
            "useLegacySql": false,
            "timeoutMs": QUERY_TIMEOUT_MS,
            "defaultDataset": {
                "projectId": self.project_id,
                "datasetId": self.dataset,
            },
        })
    }

    fn parse_response(json: &Value) -> ShiftlineResult<QueryResult> {
        if let Some(first) = json["errors"].as_array().and_then(|e| e.first()) {
            return Err(ShiftlineError::collaborator(
                SERVICE,
                first["message"].as_str().unwrap_or("query failed").to_string(),
            ));
        }
        let job_id = json["jobReference"]["jobId"].as_str().map(str::to_string);
        if json["jobComplete"] == json!(false) {
            // Accepted and still running; rows and counts are not known yet.
            return Ok(QueryResult {
                job_id,
                pending: true,
                ..QueryResult::default()
            });
        }

        let rows: Vec<Vec<Value>> = json["rows"]
            .as_array()
            .map(|rows| {
                rows.iter()
                    .map(|row| {
                        row["f"]
                            .as_array()
                            .map(|cells| cells.iter().map(|cell| cell["v"].clone()).collect())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .unwrap_or_default();

        // int64 values arrive as JSON strings
        let affected_rows = match &json["numDmlAffectedRows"] {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_u64(),
            _ => None,
        };

        Ok(QueryResult {
            rows,
            affected_rows,
            job_id,
            pending: false,
        })
    }
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    async fn execute(&self, statement: &str, request_id: &str) -> ShiftlineResult<QueryResult> {
        let url = format!(
            "{}/bigquery/v2/projects/{}/queries",
            self.base_url, self.project_id
        );
        let json = post_json(
            SERVICE,
            &self.client,
            &url,
            &self.access_token,
            &self.request_body(statement, request_id),
        )
        .await?;
        let result = Self::parse_response(&json)?;
        if result.pending {
            info!(
                "warehouse job {} still running after {} ms",
                result.job_id.as_deref().unwrap_or("-"),
                QUERY_TIMEOUT_MS
            );
            return Ok(result);
        }
        info!(
            "warehouse statement done: rows={} affected={:?}",
            result.rows.len(),
            result.affected_rows
        );
        Ok(result)
    }
}

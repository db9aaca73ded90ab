//! Timeseries query (`GET /api/v1/query`)

use ddexport_core::{RawPoint, Series, SeriesSource, TimeRange, TransportError};
use serde::Deserialize;

use crate::client::DatadogClient;

pub const QUERY_PATH: &str = "/api/v1/query";
/// Daily BigQuery upload volume per project
pub const DEFAULT_METRICS_QUERY: &str =
    "sum:gcp.bigquery.storage.uploaded_bytes{*} by {project_id}.as_count()";

pub struct MetricsApi {
    client: DatadogClient,
}

impl MetricsApi {
    pub fn new(client: DatadogClient) -> Self {
        Self { client }
    }
}

impl SeriesSource for MetricsApi {
    async fn query(&self, range: TimeRange, query: &str) -> Result<Vec<Series>, TransportError> {
        let params = [
            ("from", range.from.to_string()),
            ("to", range.to.to_string()),
            ("query", query.to_string()),
        ];
        let body = self.client.get(QUERY_PATH, &params).await?;
        parse_query_response(&body)
    }
}

#[derive(Deserialize)]
struct QueryResponse {
    status: Option<String>,
    error: Option<String>,
    #[serde(default)]
    series: Vec<SeriesBody>,
}

#[derive(Deserialize)]
struct SeriesBody {
    #[serde(default)]
    scope: String,
    #[serde(default)]
    pointlist: Vec<RawPoint>,
}

/// Decode a query response. A body with `"status": "error"` is a failure
/// even when the HTTP status was 200.
pub fn parse_query_response(body: &str) -> Result<Vec<Series>, TransportError> {
    let resp: QueryResponse = serde_json::from_str(body)?;
    if resp.status.as_deref() == Some("error") {
        return Err(TransportError::Api(
            resp.error.unwrap_or_else(|| "query failed".to_string()),
        ));
    }
    Ok(resp
        .series
        .into_iter()
        .map(|s| Series {
            scope: s.scope,
            points: s.pointlist,
        })
        .collect())
}

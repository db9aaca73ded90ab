//! Authenticated JSON GETs against the Datadog API

use std::fmt;

use ddexport_core::{ExportError, TransportError, http_client};
use reqwest::header::ACCEPT;
use serde::Deserialize;

/// Environment variable holding the API key
pub const API_KEY_VAR: &str = "DD_API_KEY";
/// Environment variable holding the application key
pub const APP_KEY_VAR: &str = "DD_APP_KEY";
/// Environment variable selecting the Datadog site
pub const SITE_VAR: &str = "DD_SITE";
pub const DEFAULT_SITE: &str = "datadoghq.com";

/// API key plus application key. Both are required for every call.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    app_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("app_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Build credentials, rejecting missing or blank keys.
    pub fn new(api_key: Option<String>, app_key: Option<String>) -> Result<Self, ExportError> {
        let api_key = require(api_key, API_KEY_VAR)?;
        let app_key = require(app_key, APP_KEY_VAR)?;
        Ok(Self { api_key, app_key })
    }

    pub fn from_env() -> Result<Self, ExportError> {
        Self::new(
            std::env::var(API_KEY_VAR).ok(),
            std::env::var(APP_KEY_VAR).ok(),
        )
    }
}

fn require(value: Option<String>, var: &str) -> Result<String, ExportError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ExportError::Configuration(format!(
            "{var} environment variable is required"
        ))),
    }
}

/// Base URL for a site name. A value with a scheme is used as-is.
pub fn site_base_url(site: &str) -> String {
    let site = site.trim().trim_end_matches('/');
    if site.starts_with("http://") || site.starts_with("https://") {
        site.to_string()
    } else if site.is_empty() {
        format!("https://api.{DEFAULT_SITE}")
    } else {
        format!("https://api.{site}")
    }
}

#[derive(Clone, Debug)]
pub struct DatadogClient {
    base_url: String,
    credentials: Credentials,
}

impl DatadogClient {
    pub fn new(site: &str, credentials: Credentials) -> Self {
        Self {
            base_url: site_base_url(site),
            credentials,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` with `query` and return the body of a 2xx response.
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<String, TransportError> {
        let url = format!("{}{path}", self.base_url);
        log::debug!("GET {path} {query:?}");

        let resp = http_client()
            .get(&url)
            .query(query)
            .header("DD-API-KEY", &self.credentials.api_key)
            .header("DD-APPLICATION-KEY", &self.credentials.app_key)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;

        if !status.is_success() {
            return Err(TransportError::Http {
                status: Some(status.as_u16()),
                message: error_message(&body)
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string()),
            });
        }
        Ok(body)
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

/// Datadog reports failures as `{"errors": [...]}`; entries are strings
/// (v1) or objects with a `detail`/`title` (v2).
fn error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let parts: Vec<String> = parsed
        .errors
        .iter()
        .filter_map(|e| match e {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(o) => o
                .get("detail")
                .or_else(|| o.get("title"))
                .and_then(|v| v.as_str())
                .map(str::to_string),
            _ => None,
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join("; "))
}

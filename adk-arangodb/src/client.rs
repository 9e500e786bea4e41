//! HTTP [`GraphQueryExecutor`] over the ArangoDB REST cursor API.
//!
//! This module is only available when the `arangodb` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::ArangoConfig;
use crate::error::{ArangoError, Result};
use crate::graph::{BindVars, GraphQueryExecutor, Row, into_row};

/// A connection to one ArangoDB database.
///
/// [`connect`](ArangoGraph::connect) checks that the server is reachable and
/// the credentials are accepted, so a constructed `ArangoGraph` is known to
/// have worked at least once.
///
/// # Example
///
/// ```rust,ignore
/// use adk_arangodb::{ArangoConfig, ArangoGraph, GraphQueryExecutor};
///
/// let graph = ArangoGraph::connect(ArangoConfig::from_env()).await?;
/// let rows = graph.execute("FOR p IN Person RETURN p", &Default::default()).await?;
/// graph.close().await?;
/// ```
pub struct ArangoGraph {
    client: reqwest::Client,
    config: ArangoConfig,
    server_version: String,
}

#[derive(Serialize)]
struct CursorRequest<'a> {
    query: &'a str,
    #[serde(rename = "bindVars")]
    bind_vars: &'a BindVars,
    #[serde(rename = "batchSize", skip_serializing_if = "Option::is_none")]
    batch_size: Option<u32>,
}

#[derive(Deserialize)]
struct CursorResponse {
    #[serde(default)]
    result: Vec<Value>,
    #[serde(rename = "hasMore", default)]
    has_more: bool,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Deserialize)]
struct VersionResponse {
    version: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(rename = "errorNum")]
    error_num: i64,
    #[serde(rename = "errorMessage")]
    error_message: String,
}

impl ArangoGraph {
    /// Connect to the database named in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Config`] for invalid settings and
    /// [`ArangoError::Execution`] if the server cannot be reached or rejects
    /// the credentials.
    pub async fn connect(config: ArangoConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::new();
        let mut graph = Self { client, config, server_version: String::new() };

        let response = graph
            .request(reqwest::Method::GET, "_api/version")
            .send()
            .await
            .map_err(|e| request_failed("version request failed", e))?;
        let response = check_status(response).await?;
        let version: VersionResponse = response
            .json()
            .await
            .map_err(|e| request_failed("failed to parse version response", e))?;
        graph.server_version = version.version;

        info!(
            url = %graph.config.url,
            database = %graph.config.database,
            version = %graph.server_version,
            "connected to ArangoDB"
        );
        Ok(graph)
    }

    /// Version string reported by the server at connect time.
    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    pub fn config(&self) -> &ArangoConfig {
        &self.config
    }

    /// Release the connection.
    pub async fn close(self) -> Result<()> {
        GraphQueryExecutor::close(&self).await
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!(
            "{}/_db/{}/{path}",
            self.config.url.trim_end_matches('/'),
            self.config.database
        );
        self.client
            .request(method, url)
            .basic_auth(&self.config.username, self.config.password.as_deref())
    }

    async fn read_cursor(response: reqwest::Response) -> Result<CursorResponse> {
        let response = check_status(response).await?;
        response.json().await.map_err(|e| request_failed("failed to parse cursor response", e))
    }

    async fn discard_cursor(&self, id: &str) {
        let path = format!("_api/cursor/{id}");
        if let Err(e) = self.request(reqwest::Method::DELETE, &path).send().await {
            warn!(cursor = id, error = %e, "failed to discard cursor");
        }
    }
}

#[async_trait]
impl GraphQueryExecutor for ArangoGraph {
    async fn execute(&self, query: &str, bind_vars: &BindVars) -> Result<Vec<Row>> {
        debug!(query, "executing AQL");
        let body = CursorRequest { query, bind_vars, batch_size: self.config.batch_size };
        let response = self
            .request(reqwest::Method::POST, "_api/cursor")
            .json(&body)
            .send()
            .await
            .map_err(|e| request_failed("cursor request failed", e))?;
        let mut cursor = Self::read_cursor(response).await?;

        let mut rows: Vec<Row> = cursor.result.drain(..).map(into_row).collect();
        while cursor.has_more {
            let Some(id) = cursor.id.take() else {
                return Err(ArangoError::execution("cursor has more results but no id"));
            };
            let path = format!("_api/cursor/{id}");
            let next = match self.request(reqwest::Method::PUT, &path).send().await {
                Ok(response) => Self::read_cursor(response).await,
                Err(e) => Err(request_failed("cursor continuation failed", e)),
            };
            cursor = match next {
                Ok(next) => next,
                Err(e) => {
                    self.discard_cursor(&id).await;
                    return Err(e);
                }
            };
            rows.extend(cursor.result.drain(..).map(into_row));
        }

        debug!(row_count = rows.len(), "AQL completed");
        Ok(rows)
    }

    async fn close(&self) -> Result<()> {
        debug!(url = %self.config.url, "closing ArangoDB connection");
        Ok(())
    }
}

fn request_failed(message: &str, e: reqwest::Error) -> ArangoError {
    error!(error = %e, "{message}");
    ArangoError::execution_with_source(format!("{message}: {e}"), e)
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(e) => format!("[{}] {}", e.error_num, e.error_message),
        Err(_) => body,
    };
    error!(%status, detail = %detail, "ArangoDB returned an error");
    Err(ArangoError::execution(format!("ArangoDB returned {status}: {detail}")))
}

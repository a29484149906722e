//! Gremlin Server graph store over HTTP.
//!
//! Each query is posted as `{"gremlin": ..., "bindings": ...}` to the
//! server's HTTP endpoint and the response is requested in `GraphSON` 1.0,
//! whose untyped vertex and edge objects map directly onto
//! [`Vertex`] and [`Edge`]. The HTTP endpoint answers with a single result
//! page per request.

use futures::StreamExt as _;
use serde_json::Value;
use tracing::debug;
use twingraph_types::{Edge, Record, Vertex};

use crate::error::StoreError;
use crate::query::{GraphQuery, Script};
use crate::store::{GraphStore, ResultPages};

/// Media type requesting untyped `GraphSON` 1.0 results.
const GRAPHSON_V1: &str = "application/vnd.gremlin-v1.0+json";

/// Gremlin response status: success with results.
const STATUS_SUCCESS: u64 = 200;

/// Gremlin response status: success without results.
const STATUS_NO_CONTENT: u64 = 204;

/// Status code some servers use for uniqueness violations.
const STATUS_CONFLICT: u64 = 409;

/// Graph store backed by a Gremlin Server HTTP endpoint.
#[derive(Debug, Clone)]
pub struct GremlinHttpStore {
    client: reqwest::Client,
    url: String,
}

impl GremlinHttpStore {
    /// Create a store posting to `url` (e.g. `http://localhost:8182/gremlin`).
    pub fn new(url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_owned(),
        }
    }

    async fn post(&self, script: Script) -> Result<Vec<Record>, StoreError> {
        let body = serde_json::json!({
            "gremlin": script.gremlin,
            "bindings": script.bindings,
        });

        let response = self
            .client
            .post(&self.url)
            .header("Accept", GRAPHSON_V1)
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Backend {
                message: format!("Gremlin request to {} failed: {e}", self.url),
            })?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| StoreError::Backend {
            message: format!("failed to read Gremlin response body: {e}"),
        })?;
        debug!(status, bytes = text.len(), "Gremlin response received");

        parse_response(u64::from(status), &text)
    }
}

impl GraphStore for GremlinHttpStore {
    fn submit<'a>(&'a self, query: &'a GraphQuery) -> ResultPages<'a> {
        futures::stream::once(self.post(query.to_script())).boxed()
    }
}

/// Interpret a Gremlin Server HTTP response.
///
/// The Gremlin status inside the body takes precedence over the HTTP
/// status when both are present.
fn parse_response(http_status: u64, body: &str) -> Result<Vec<Record>, StoreError> {
    let json: Value = match serde_json::from_str(body) {
        Ok(json) => json,
        Err(_) if body.trim().is_empty() && http_status == STATUS_NO_CONTENT => {
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(StoreError::Backend {
                message: format!("unparseable Gremlin response (HTTP {http_status}): {e}"),
            });
        }
    };

    let status = json
        .pointer("/status/code")
        .and_then(Value::as_u64)
        .unwrap_or(http_status);
    let message = json
        .pointer("/status/message")
        .or_else(|| json.get("message"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    match status {
        STATUS_SUCCESS => Ok(json
            .pointer("/result/data")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(parse_element).collect())
            .unwrap_or_default()),
        STATUS_NO_CONTENT => Ok(Vec::new()),
        _ if is_conflict(status, &message) => Err(StoreError::Conflict { message }),
        _ => Err(StoreError::Backend {
            message: format!("Gremlin status {status}: {message}"),
        }),
    }
}

fn is_conflict(status: u64, message: &str) -> bool {
    status == STATUS_CONFLICT || message.to_lowercase().contains("already exists")
}

/// Parse one `GraphSON` 1.0 element. Scalars and unknown shapes are skipped.
fn parse_element(item: &Value) -> Option<Record> {
    let id = element_id(item.get("id")?)?;
    let label = item
        .get("label")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    match item.get("type").and_then(Value::as_str)? {
        "vertex" => {
            let properties = item
                .get("properties")
                .and_then(Value::as_object)
                .map(|props| {
                    props
                        .iter()
                        .map(|(name, values)| (name.clone(), vertex_property_values(values)))
                        .collect()
                })
                .unwrap_or_default();
            Some(Record::Vertex(Vertex {
                id,
                label,
                properties,
            }))
        }
        "edge" => Some(Record::Edge(Edge {
            id,
            label,
            out_v: element_id(item.get("outV")?)?,
            in_v: element_id(item.get("inV")?)?,
        })),
        _ => None,
    }
}

/// Vertex properties are arrays of `{id, value}` objects.
fn vertex_property_values(values: &Value) -> Vec<Value> {
    values
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.get("value").cloned())
                .collect()
        })
        .unwrap_or_default()
}

/// Element ids may be strings or numbers depending on the graph provider.
fn element_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

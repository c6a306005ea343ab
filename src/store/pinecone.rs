//! Pinecone REST client implementing [`VectorIndex`].
//!
//! Control-plane calls (describe/create) go to the controller URL; data-plane
//! calls go to the per-index host returned by describe. All calls block.

use std::thread;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::index::{IndexDescription, Metric, ScoredRecord, VectorIndex};
use super::{StoreError, StoreResult};
use crate::types::{RecordMetadata, VectorRecord};

const API_VERSION: &str = "2024-07";
const READY_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Connection parameters for [`PineconeIndex`].
#[derive(Debug, Clone)]
pub struct PineconeOptions {
    pub api_key: String,
    /// Environment string such as `us-east-1-aws`; decides where new indexes live.
    pub environment: String,
    pub index_name: String,
    pub controller_url: String,
    pub timeout: Duration,
    pub ready_timeout: Duration,
}

/// Handle on one Pinecone index.
pub struct PineconeIndex {
    client: Client,
    controller_url: String,
    index_name: String,
    environment: String,
    ready_timeout: Duration,
    host: RwLock<Option<String>>,
}

impl PineconeIndex {
    pub fn new(options: PineconeOptions) -> StoreResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Api-Key",
            HeaderValue::from_str(options.api_key.trim())
                .map_err(|_| StoreError::Service("invalid Pinecone API key".into()))?,
        );
        headers.insert(
            "X-Pinecone-API-Version",
            HeaderValue::from_static(API_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(options.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| StoreError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            controller_url: options.controller_url.trim_end_matches('/').to_string(),
            index_name: options.index_name,
            environment: options.environment,
            ready_timeout: options.ready_timeout,
            host: RwLock::new(None),
        })
    }

    fn fetch_description(&self) -> StoreResult<Option<IndexModel>> {
        let url = format!("{}/indexes/{}", self.controller_url, self.index_name);
        let response = self.client.get(&url).send().map_err(transport)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let model: IndexModel = parse(response)?;
        if !model.host.is_empty() {
            *self.host.write() = Some(model.host.clone());
        }
        Ok(Some(model))
    }

    fn data_url(&self, path: &str) -> StoreResult<String> {
        if let Some(host) = self.host.read().as_deref() {
            return Ok(data_plane_url(host, path));
        }
        match self.fetch_description()? {
            Some(model) if !model.host.is_empty() => Ok(data_plane_url(&model.host, path)),
            _ => Err(StoreError::IndexNotFound(self.index_name.clone())),
        }
    }

    fn wait_until_ready(&self) -> StoreResult<IndexModel> {
        let started = Instant::now();
        loop {
            if let Some(model) = self.fetch_description()? {
                if model.status.ready {
                    return Ok(model);
                }
                tracing::debug!(
                    target: "store",
                    "index {} state {}, waiting",
                    self.index_name,
                    model.status.state
                );
            }
            if started.elapsed() >= self.ready_timeout {
                return Err(StoreError::IndexNotReady(
                    self.index_name.clone(),
                    self.ready_timeout.as_secs(),
                ));
            }
            thread::sleep(READY_POLL_INTERVAL);
        }
    }
}

impl VectorIndex for PineconeIndex {
    fn name(&self) -> &str {
        &self.index_name
    }

    fn describe(&self) -> StoreResult<Option<IndexDescription>> {
        Ok(self.fetch_description()?.map(IndexModel::into_description))
    }

    fn create(&self, dimension: usize, metric: Metric) -> StoreResult<IndexDescription> {
        let (cloud, region) = serverless_location(&self.environment);
        tracing::info!(
            target: "store",
            "creating index {} ({dimension} dims, {cloud}/{region})",
            self.index_name
        );

        let body = CreateIndexRequest {
            name: &self.index_name,
            dimension,
            metric,
            spec: IndexSpec {
                serverless: ServerlessSpec {
                    cloud: &cloud,
                    region: &region,
                },
            },
        };
        let url = format!("{}/indexes", self.controller_url);
        let response = self.client.post(&url).json(&body).send().map_err(transport)?;
        let _: Value = parse(response)?;

        Ok(self.wait_until_ready()?.into_description())
    }

    fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> StoreResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let url = self.data_url("/vectors/upsert")?;
        let body = UpsertRequest {
            vectors: records,
            namespace,
        };
        let response = self.client.post(&url).json(&body).send().map_err(transport)?;
        let parsed: UpsertResponse = parse(response)?;
        Ok(parsed.upserted_count)
    }

    fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> StoreResult<Vec<ScoredRecord>> {
        let url = self.data_url("/query")?;
        let body = QueryRequest {
            namespace,
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
        };
        let response = self.client.post(&url).json(&body).send().map_err(transport)?;
        let parsed: QueryResponse = parse(response)?;
        Ok(parsed
            .matches
            .into_iter()
            .map(|m| ScoredRecord {
                metadata: m.metadata.as_ref().and_then(metadata_from_value),
                id: m.id,
                score: m.score,
            })
            .collect())
    }

    fn delete_namespace(&self, namespace: &str) -> StoreResult<()> {
        let url = self.data_url("/vectors/delete")?;
        let body = DeleteRequest {
            delete_all: true,
            namespace,
        };
        let response = self.client.post(&url).json(&body).send().map_err(transport)?;
        // Deleting a namespace that was never written is not an error.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        let _: Value = parse(response)?;
        Ok(())
    }

    fn namespace_count(&self, namespace: &str) -> StoreResult<usize> {
        let url = self.data_url("/describe_index_stats")?;
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({}))
            .send()
            .map_err(transport)?;
        let stats: IndexStats = parse(response)?;
        Ok(stats
            .namespaces
            .get(namespace)
            .map_or(0, |ns| ns.vector_count))
    }
}

/// Split an environment such as `us-east-1-aws` into `("aws", "us-east-1")`.
///
/// Strings without a recognised cloud suffix are taken as an AWS region.
pub fn serverless_location(environment: &str) -> (String, String) {
    let environment = environment.trim();
    for cloud in ["aws", "gcp", "azure"] {
        if let Some(region) = environment.strip_suffix(&format!("-{cloud}")) {
            if !region.is_empty() {
                return (cloud.to_string(), region.to_string());
            }
        }
    }
    let region = if environment.is_empty() {
        "us-east-1"
    } else {
        environment
    };
    ("aws".to_string(), region.to_string())
}

fn data_plane_url(host: &str, path: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{}{path}", host.trim_end_matches('/'))
    } else {
        format!("https://{}{path}", host.trim_end_matches('/'))
    }
}

/// Read stored metadata, accepting both this crate's field names and the
/// `page_content`/`chunk_id` names older ingestion wrote.
fn metadata_from_value(value: &Value) -> Option<RecordMetadata> {
    let map = value.as_object()?;
    let content = map
        .get("content")
        .or_else(|| map.get("page_content"))
        .and_then(Value::as_str)?
        .to_string();
    let source = map
        .get("source")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let chunk_index = map
        .get("chunk_index")
        .or_else(|| map.get("chunk_id"))
        .and_then(|v| match v {
            Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
            Value::String(s) => s.parse().ok(),
            _ => None,
        })
        .unwrap_or_default();
    let truncated = map
        .get("truncated")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Some(RecordMetadata {
        content,
        source,
        chunk_index,
        truncated,
    })
}

fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Transport(err.to_string())
}

fn parse<T: for<'de> Deserialize<'de>>(response: Response) -> StoreResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .unwrap_or_else(|_| "<body unavailable>".to_string());
        return Err(StoreError::Service(format!("{status}: {body}")));
    }
    response
        .json()
        .map_err(|e| StoreError::Service(format!("invalid response body: {e}")))
}

#[derive(Debug, Deserialize)]
struct IndexModel {
    name: String,
    dimension: usize,
    #[serde(default)]
    metric: Metric,
    #[serde(default)]
    host: String,
    #[serde(default)]
    status: IndexStatus,
}

impl IndexModel {
    fn into_description(self) -> IndexDescription {
        IndexDescription {
            name: self.name,
            dimension: self.dimension,
            metric: self.metric,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    state: String,
}

#[derive(Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: Metric,
    spec: IndexSpec<'a>,
}

#[derive(Serialize)]
struct IndexSpec<'a> {
    serverless: ServerlessSpec<'a>,
}

#[derive(Serialize)]
struct ServerlessSpec<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
    namespace: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    namespace: &'a str,
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatchBody>,
}

#[derive(Deserialize)]
struct QueryMatchBody {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest<'a> {
    delete_all: bool,
    namespace: &'a str,
}

#[derive(Deserialize)]
struct IndexStats {
    #[serde(default)]
    namespaces: std::collections::HashMap<String, NamespaceStats>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceStats {
    #[serde(default)]
    vector_count: usize,
}

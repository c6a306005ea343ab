//! Cloud embedding provider speaking the OpenAI `/embeddings` protocol.
//!
//! Calls are blocking and single-shot. An unreachable endpoint, a 429 or a 5xx
//! surfaces as [`EmbeddingError::Unavailable`]; any other rejection as
//! [`EmbeddingError::Provider`]. Neither is retried or rerouted to another
//! backend, because vectors from two providers cannot share one index.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use super::provider::{EmbeddingProvider, ProviderInfo};
use super::{EmbeddingError, EmbeddingResult};
use crate::types::Embedding;

/// Provider name reported in [`ProviderInfo`].
pub const OPENAI_PROVIDER_NAME: &str = "openai";

const PROBE_TEXT: &str = "ping";

/// Connection parameters for [`OpenAiProvider`].
#[derive(Debug, Clone)]
pub struct OpenAiOptions {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub dimension: usize,
    pub timeout: Duration,
}

/// Blocking client for an OpenAI-compatible embeddings endpoint.
pub struct OpenAiProvider {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl OpenAiProvider {
    /// Build the client without contacting the service.
    pub fn new(options: OpenAiOptions) -> EmbeddingResult<Self> {
        let api_key = options.api_key.trim();
        if api_key.is_empty() {
            return Err(EmbeddingError::Unavailable("missing API key".into()));
        }
        if options.model.trim().is_empty() {
            return Err(EmbeddingError::Unavailable("missing model name".into()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|_| EmbeddingError::Unavailable("invalid API key".into()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(options.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| EmbeddingError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", options.base_url.trim_end_matches('/')),
            model: options.model,
            dimension: options.dimension,
        })
    }

    /// Build the client and run the liveness/capability probe.
    ///
    /// Fails with [`EmbeddingError::Unavailable`] if the endpoint cannot embed
    /// a probe string at the configured dimension.
    pub fn connect(options: OpenAiOptions) -> EmbeddingResult<Self> {
        let provider = Self::new(options)?;
        provider.probe()?;
        Ok(provider)
    }

    fn probe(&self) -> EmbeddingResult<()> {
        let vectors = self
            .request(&[PROBE_TEXT])
            .map_err(|e| EmbeddingError::Unavailable(e.to_string()))?;
        match vectors.first() {
            Some(v) if v.len() == self.dimension => {
                tracing::debug!(target: "embedding", "probe succeeded against {}", self.endpoint);
                Ok(())
            }
            Some(v) => Err(EmbeddingError::Unavailable(format!(
                "model {} returned {} dims, expected {}",
                self.model,
                v.len(),
                self.dimension
            ))),
            None => Err(EmbeddingError::Unavailable(
                "probe returned no embeddings".into(),
            )),
        }
    }

    fn request(&self, inputs: &[&str]) -> EmbeddingResult<Vec<Embedding>> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: inputs,
            dimensions: Some(self.dimension),
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|e| EmbeddingError::Unavailable(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            let message = format!("embeddings request failed ({status}): {text}");
            return Err(if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                EmbeddingError::Unavailable(message)
            } else {
                EmbeddingError::Provider(message)
            });
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .map_err(|e| EmbeddingError::Provider(format!("invalid response body: {e}")))?;
        parsed.data.sort_by_key(|entry| entry.index);
        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

impl EmbeddingProvider for OpenAiProvider {
    fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Embedding>> {
        self.request(texts)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo {
            provider_name: OPENAI_PROVIDER_NAME.to_string(),
            model_identifier: self.model.clone(),
            dimension: self.dimension,
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(api_key: &str) -> OpenAiOptions {
        OpenAiOptions {
            api_key: api_key.to_string(),
            base_url: "https://api.openai.com/v1/".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_missing_key_is_unavailable() {
        let err = OpenAiProvider::new(options("   ")).unwrap_err();
        assert!(matches!(err, EmbeddingError::Unavailable(_)));
    }

    #[test]
    fn test_unreachable_endpoint_is_unavailable() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let provider = OpenAiProvider::new(OpenAiOptions {
            base_url: format!("http://127.0.0.1:{port}/v1"),
            timeout: Duration::from_secs(2),
            ..options("sk-test")
        })
        .unwrap();

        let err = provider.embed_batch(&["hello"]).unwrap_err();
        assert!(matches!(err, EmbeddingError::Unavailable(_)), "{err}");
    }

    #[test]
    fn test_endpoint_normalised() {
        let provider = OpenAiProvider::new(options("sk-test")).unwrap();
        assert_eq!(provider.endpoint, "https://api.openai.com/v1/embeddings");
        assert_eq!(provider.dimension(), 1536);
        assert_eq!(provider.provider_info().provider_name, OPENAI_PROVIDER_NAME);
    }

    #[test]
    fn test_response_sorted_by_index() {
        let body = r#"{"data":[
            {"embedding":[0.2],"index":1},
            {"embedding":[0.1],"index":0}
        ]}"#;
        let mut parsed: EmbeddingResponse = serde_json::from_str(body).unwrap();
        parsed.data.sort_by_key(|entry| entry.index);
        assert_eq!(parsed.data[0].embedding, vec![0.1]);
        assert_eq!(parsed.data[1].embedding, vec![0.2]);
    }

    #[test]
    fn test_request_serialisation() {
        let body = EmbeddingRequest {
            model: "m",
            input: &["a", "b"],
            dimensions: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["input"][1], "b");
        assert!(json.get("dimensions").is_none());
    }
}

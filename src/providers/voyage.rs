//! Voyage AI client implementing the embedding and rerank contracts.
//!
//! Thin wrapper over the Voyage REST API (`/v1/embeddings`, `/v1/rerank`)
//! using `reqwest`. The base URL is overridable so tests can point the client
//! at a local mock server.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use super::{EmbeddingMode, EmbeddingProvider, RerankProvider, RerankResult};
use crate::config::LibraryConfig;
use crate::error::LibraryError;

const DEFAULT_BASE_URL: &str = "https://api.voyageai.com/";
const DEFAULT_EMBED_MODEL: &str = "voyage-3-large";
const DEFAULT_RERANK_MODEL: &str = "rerank-2.5";
/// Output dimensionality of `voyage-3-large`.
const DEFAULT_DIMENSION: usize = 1024;

/// Builder-configured Voyage API client.
#[derive(Clone)]
pub struct VoyageClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
    embed_model: String,
    rerank_model: String,
    dimension: usize,
}

impl VoyageClient {
    /// Create a client with default models and a bounded request timeout.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, LibraryError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| LibraryError::provider("voyage", err.to_string()))?;
        let base_url = Url::parse(DEFAULT_BASE_URL)
            .map_err(|err| LibraryError::provider("voyage", err.to_string()))?;
        Ok(Self {
            http,
            base_url,
            api_key: api_key.into(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            rerank_model: DEFAULT_RERANK_MODEL.to_string(),
            dimension: DEFAULT_DIMENSION,
        })
    }

    /// Create a client whose request timeout and embedding dimensionality
    /// come from the library configuration.
    pub fn from_config(
        api_key: impl Into<String>,
        config: &LibraryConfig,
    ) -> Result<Self, LibraryError> {
        let mut client = Self::new(api_key, config.provider_timeout())?;
        client.dimension = config.embedding_dimension;
        Ok(client)
    }

    /// Point the client at a different API host (tests, proxies).
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, LibraryError> {
        self.base_url = Url::parse(base_url)
            .map_err(|err| LibraryError::provider("voyage", err.to_string()))?;
        Ok(self)
    }

    /// Override the embedding model and its output dimensionality.
    pub fn with_embed_model(mut self, model: impl Into<String>, dimension: usize) -> Self {
        self.embed_model = model.into();
        self.dimension = dimension;
        self
    }

    /// Override the rerank model.
    pub fn with_rerank_model(mut self, model: impl Into<String>) -> Self {
        self.rerank_model = model.into();
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, LibraryError> {
        self.base_url
            .join(path)
            .map_err(|err| LibraryError::provider("voyage", err.to_string()))
    }

    async fn post<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Resp, LibraryError> {
        let url = self.endpoint(path)?;
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|err| LibraryError::provider("voyage", err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LibraryError::provider(
                "voyage",
                format!("{path} returned {status}: {detail}"),
            ));
        }
        response
            .json()
            .await
            .map_err(|err| LibraryError::provider("voyage", err.to_string()))
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    input: &'a [String],
    model: &'a str,
    input_type: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDatum>,
}

#[derive(Deserialize)]
struct EmbedDatum {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for VoyageClient {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(
        &self,
        texts: &[String],
        mode: EmbeddingMode,
    ) -> Result<Vec<Vec<f32>>, LibraryError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = EmbedRequest {
            input: texts,
            model: &self.embed_model,
            input_type: mode.as_str(),
        };
        let response: EmbedResponse = self.post("v1/embeddings", &request).await?;
        if response.data.len() != texts.len() {
            return Err(LibraryError::provider(
                "voyage",
                format!(
                    "embedding count mismatch: sent {} texts, got {} vectors",
                    texts.len(),
                    response.data.len()
                ),
            ));
        }
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    documents: &'a [String],
    model: &'a str,
    top_k: usize,
}

#[derive(Deserialize)]
struct RerankResponse {
    data: Vec<RerankDatum>,
}

#[derive(Deserialize)]
struct RerankDatum {
    index: usize,
    relevance_score: f32,
}

#[async_trait]
impl RerankProvider for VoyageClient {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_k: usize,
    ) -> Result<Vec<RerankResult>, LibraryError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let request = RerankRequest {
            query,
            documents,
            model: &self.rerank_model,
            top_k,
        };
        let response: RerankResponse = self.post("v1/rerank", &request).await?;
        Ok(response
            .data
            .into_iter()
            .map(|d| RerankResult {
                index: d.index,
                relevance_score: d.relevance_score,
            })
            .collect())
    }
}

//! Semantic retrieval: query → embed → vector search → rerank → hydrate.
//!
//! The vector index only stores a reduced payload per slide, so the pipeline
//! finishes by hydrating full records from the metadata store. Rerank order
//! is authoritative: the final ordering comes from the reranker, not from
//! vector scores.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::error::LibraryError;
use crate::providers::{EmbeddingMode, EmbeddingProvider, RerankProvider};
use crate::storage::SlideStorageAdapter;
use crate::stores::filter_eq;
use crate::types::{RetrievalCandidate, SlideRecord};

/// Natural-language search over the slide library.
pub struct SlideRetrievalService {
    storage: Arc<SlideStorageAdapter>,
    embeddings: Arc<dyn EmbeddingProvider>,
    reranker: Arc<dyn RerankProvider>,
}

impl SlideRetrievalService {
    pub fn new(
        storage: Arc<SlideStorageAdapter>,
        embeddings: Arc<dyn EmbeddingProvider>,
        reranker: Arc<dyn RerankProvider>,
    ) -> Self {
        Self {
            storage,
            embeddings,
            reranker,
        }
    }

    /// Search with the configured default candidate pool.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<(SlideRecord, f32)>, LibraryError> {
        let retrieval_limit = self.storage.config().retrieval_limit.max(limit);
        self.search_with_pool(query, limit, retrieval_limit).await
    }

    /// Search for slides matching `query`.
    ///
    /// `retrieval_limit` candidates are pulled from the vector index, then
    /// reranked down to `limit`. Zero vector hits return an empty result
    /// immediately, with no rerank call and no hydration. Candidates whose payload
    /// lost its id or description (a partially failed payload write) are
    /// dropped rather than crashing retrieval, and a hydration miss is
    /// skipped with a warning instead of failing the search.
    #[instrument(skip(self))]
    pub async fn search_with_pool(
        &self,
        query: &str,
        limit: usize,
        retrieval_limit: usize,
    ) -> Result<Vec<(SlideRecord, f32)>, LibraryError> {
        if limit == 0 {
            return Err(LibraryError::Validation("limit must be at least 1".into()));
        }
        if retrieval_limit < limit {
            return Err(LibraryError::Validation(format!(
                "retrieval_limit ({retrieval_limit}) must be >= limit ({limit})"
            )));
        }
        let expected = self.storage.config().embedding_dimension;
        let declared = self.embeddings.dimension();
        if declared != expected {
            return Err(LibraryError::Validation(format!(
                "embedding provider produces {declared}-dimensional vectors, index expects {expected}"
            )));
        }

        // Step 1: query-mode embedding.
        let vectors = self
            .embeddings
            .embed(std::slice::from_ref(&query.to_string()), EmbeddingMode::Query)
            .await?;
        let query_vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| LibraryError::provider("embedding", "empty embedding response"))?;

        // Step 2: nearest neighbors.
        let config = self.storage.config();
        let hits = self
            .storage
            .vectors()
            .query(
                &config.vector_collection,
                &query_vector,
                retrieval_limit,
                None,
            )
            .await?;
        if hits.is_empty() {
            debug!("no vector hits, returning empty");
            return Ok(Vec::new());
        }

        // Step 3: defensive candidate extraction.
        let candidates: Vec<RetrievalCandidate> = hits
            .into_iter()
            .filter_map(|hit| {
                let slide_id = hit.payload.get("slide_id")?.as_str()?.to_string();
                let description = hit.payload.get("description")?.as_str()?.to_string();
                Some(RetrievalCandidate {
                    slide_id,
                    description,
                    vector_score: hit.score,
                })
            })
            .collect();
        if candidates.is_empty() {
            warn!("all vector hits had incomplete payloads");
            return Ok(Vec::new());
        }

        // Step 4: rerank. Output order from here on is rerank order.
        let documents: Vec<String> = candidates
            .iter()
            .map(|candidate| candidate.description.clone())
            .collect();
        let reranked = self
            .reranker
            .rerank(query, &documents, limit.min(candidates.len()))
            .await?;

        // Step 5: hydrate winners from the metadata store.
        let mut results = Vec::with_capacity(reranked.len());
        for entry in reranked {
            let Some(candidate) = candidates.get(entry.index) else {
                warn!(index = entry.index, "reranker returned out-of-range index");
                continue;
            };
            match self.hydrate(&candidate.slide_id).await? {
                Some(record) => results.push((record, entry.relevance_score)),
                None => {
                    warn!(slide_id = %candidate.slide_id, "candidate vanished before hydration");
                }
            }
        }

        debug!(results = results.len(), "search complete");
        Ok(results)
    }

    /// Same pipeline, scores discarded.
    pub async fn search_simple(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SlideRecord>, LibraryError> {
        Ok(self
            .search(query, limit)
            .await?
            .into_iter()
            .map(|(record, _)| record)
            .collect())
    }

    /// The single best match for `description`, if any.
    pub async fn find_by_description(
        &self,
        description: &str,
    ) -> Result<Option<SlideRecord>, LibraryError> {
        Ok(self.search_simple(description, 1).await?.into_iter().next())
    }

    async fn hydrate(&self, slide_id: &str) -> Result<Option<SlideRecord>, LibraryError> {
        let config = self.storage.config();
        let doc = self
            .storage
            .metadata()
            .find_one(&config.metadata_collection, &filter_eq("slide_id", slide_id))
            .await?;
        match doc {
            Some(doc) => Ok(Some(serde_json::from_value(doc).map_err(|err| {
                LibraryError::Integrity {
                    slide_id: slide_id.to_string(),
                    detail: format!("undecodable metadata document: {err}"),
                }
            })?)),
            None => Ok(None),
        }
    }
}

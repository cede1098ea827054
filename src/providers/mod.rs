//! AI provider contracts: embedding, reranking, description generation.
//!
//! The library never talks to a model directly; it goes through these traits
//! so tests can substitute deterministic doubles and deployments can swap
//! providers without touching the pipelines. [`voyage::VoyageClient`]
//! implements [`EmbeddingProvider`] and [`RerankProvider`] over the Voyage
//! REST API.
//!
//! Document-mode and query-mode embeddings are distinct: ingestion embeds
//! descriptions in document mode, retrieval embeds queries in query mode, and
//! the provider is told which is which via [`EmbeddingMode`].

pub mod voyage;

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::LibraryError;
use crate::types::SlideStructure;

pub use voyage::VoyageClient;

/// Whether a text is being embedded as a stored document or a search query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingMode {
    Document,
    Query,
}

impl EmbeddingMode {
    /// Wire value used by providers that take an `input_type` parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Query => "query",
        }
    }
}

/// Turns texts into fixed-length vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Output dimensionality, declared up front so the vector collection can
    /// be created to match.
    fn dimension(&self) -> usize;

    /// Embed `texts`, one vector per input, in input order.
    async fn embed(
        &self,
        texts: &[String],
        mode: EmbeddingMode,
    ) -> Result<Vec<Vec<f32>>, LibraryError>;
}

/// One reranked document: an index into the caller's document list plus a
/// relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankResult {
    pub index: usize,
    pub relevance_score: f32,
}

/// Second-stage relevance scorer over an initial candidate set.
#[async_trait]
pub trait RerankProvider: Send + Sync {
    /// Rerank `documents` against `query`, returning up to `top_k` results,
    /// most relevant first. Results address documents by index.
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_k: usize,
    ) -> Result<Vec<RerankResult>, LibraryError>;
}

/// Generates a slide description from its structural summary.
///
/// The summary carries element types, positions, and sizes but no literal
/// slide text, keeping descriptions template-like rather than
/// instance-specific.
#[async_trait]
pub trait DescriptionGenerator: Send + Sync {
    async fn describe(&self, structure: &SlideStructure) -> Result<String, LibraryError>;
}

/// Deterministic embedding provider for tests and offline runs.
///
/// Produces a vector derived from a stable hash of the input text, so equal
/// texts embed equally and different texts almost always differ.
pub struct MockEmbeddingProvider {
    dimension: usize,
    calls: AtomicUsize,
}

impl MockEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `embed` calls made so far. Used by dedup tests to assert no
    /// embedding work happened on the fast path.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        // FNV-1a seeded walk; cheap, stable across runs.
        let mut state: u64 = 0xcbf29ce484222325;
        for byte in text.bytes() {
            state ^= u64::from(byte);
            state = state.wrapping_mul(0x100000001b3);
        }
        (0..self.dimension)
            .map(|i| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407 ^ i as u64);
                ((state >> 33) as f32 / u32::MAX as f32) * 2.0 - 1.0
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(
        &self,
        texts: &[String],
        _mode: EmbeddingMode,
    ) -> Result<Vec<Vec<f32>>, LibraryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }
}

/// Rerank provider that replays a scripted ordering, or falls back to
/// identity order when no script is set.
pub struct MockRerankProvider {
    /// Scripted output as (index, relevance_score) pairs.
    script: Mutex<Option<Vec<(usize, f32)>>>,
}

impl MockRerankProvider {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(None),
        }
    }

    /// Fix the next rerank output to the given (index, score) pairs.
    pub fn with_script(script: Vec<(usize, f32)>) -> Self {
        Self {
            script: Mutex::new(Some(script)),
        }
    }
}

impl Default for MockRerankProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RerankProvider for MockRerankProvider {
    async fn rerank(
        &self,
        _query: &str,
        documents: &[String],
        top_k: usize,
    ) -> Result<Vec<RerankResult>, LibraryError> {
        if let Some(script) = self.script.lock().as_ref() {
            return Ok(script
                .iter()
                .take(top_k)
                .map(|&(index, relevance_score)| RerankResult {
                    index,
                    relevance_score,
                })
                .collect());
        }
        Ok((0..documents.len().min(top_k))
            .map(|index| RerankResult {
                index,
                relevance_score: 1.0 - index as f32 * 0.01,
            })
            .collect())
    }
}

/// Description generator that summarizes the structure without a model call.
///
/// Useful as a test double and as an offline fallback.
pub struct StructuralDescriptionGenerator;

#[async_trait]
impl DescriptionGenerator for StructuralDescriptionGenerator {
    async fn describe(&self, structure: &SlideStructure) -> Result<String, LibraryError> {
        let mut counts: std::collections::BTreeMap<&str, usize> = Default::default();
        for element in &structure.elements {
            *counts.entry(element.content_type.as_str()).or_default() += 1;
        }
        let parts: Vec<String> = counts
            .iter()
            .map(|(kind, count)| format!("{count} {} element(s)", kind.to_lowercase()))
            .collect();
        if parts.is_empty() {
            Ok("Blank slide layout".to_string())
        } else {
            Ok(format!("Slide layout with {}", parts.join(", ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ElementSummary, SlideDimensions};

    #[tokio::test]
    async fn mock_embeddings_are_stable() {
        let provider = MockEmbeddingProvider::new(8);
        let a = provider
            .embed(&["hello".into()], EmbeddingMode::Document)
            .await
            .unwrap();
        let b = provider
            .embed(&["hello".into()], EmbeddingMode::Query)
            .await
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].len(), 8);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn mock_embeddings_differ_across_texts() {
        let provider = MockEmbeddingProvider::new(8);
        let out = provider
            .embed(&["alpha".into(), "beta".into()], EmbeddingMode::Document)
            .await
            .unwrap();
        assert_ne!(out[0], out[1]);
    }

    #[tokio::test]
    async fn scripted_rerank_replays_order() {
        let provider = MockRerankProvider::with_script(vec![(2, 0.9), (0, 0.5)]);
        let docs = vec!["a".into(), "b".into(), "c".into()];
        let out = provider.rerank("q", &docs, 5).await.unwrap();
        assert_eq!(out[0].index, 2);
        assert_eq!(out[1].index, 0);
    }

    #[tokio::test]
    async fn structural_generator_names_element_types() {
        let structure = SlideStructure {
            dimensions: SlideDimensions {
                width: 1280,
                height: 720,
            },
            elements: vec![
                ElementSummary {
                    content_type: "TEXT".into(),
                    x: 0.0,
                    y: 0.0,
                    width: 100.0,
                    height: 40.0,
                    content_description: String::new(),
                },
                ElementSummary {
                    content_type: "TABLE".into(),
                    x: 0.0,
                    y: 60.0,
                    width: 400.0,
                    height: 200.0,
                    content_description: String::new(),
                },
            ],
        };
        let description = StructuralDescriptionGenerator
            .describe(&structure)
            .await
            .unwrap();
        assert!(description.contains("table"));
        assert!(description.contains("text"));
    }
}

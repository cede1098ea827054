//! Shared fixtures: deck sources, instrumented providers, adapter builders.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use deckweave::config::LibraryConfig;
use deckweave::error::LibraryError;
use deckweave::ingestion::{ExtractedSlide, SlideSource};
use deckweave::providers::{
    DescriptionGenerator, EmbeddingMode, EmbeddingProvider, RerankProvider, RerankResult,
    StructuralDescriptionGenerator,
};
use deckweave::storage::SlideStorageAdapter;
use deckweave::stores::{MemoryContentStore, MemoryMetadataStore, MemoryVectorIndex};
use deckweave::types::{ElementSummary, SlideDimensions, SlideStructure};

/// Small config tuned for tests: tiny vectors, fast backoff.
#[allow(dead_code)]
pub fn test_config(dimension: usize) -> LibraryConfig {
    LibraryConfig {
        embedding_dimension: dimension,
        ..LibraryConfig::default()
    }
}

/// Adapter over fresh in-memory stores, already initialized.
#[allow(dead_code)]
pub async fn memory_adapter(config: LibraryConfig) -> Arc<SlideStorageAdapter> {
    let adapter = Arc::new(SlideStorageAdapter::new(
        Arc::new(MemoryContentStore::new()),
        Arc::new(MemoryMetadataStore::new()),
        Arc::new(MemoryVectorIndex::new()),
        config,
    ));
    adapter.initialize().await.expect("initialize stores");
    adapter
}

/// One scripted slide in a [`StaticSource`].
#[derive(Clone)]
pub struct StaticSlide {
    pub artifact: Vec<u8>,
    pub notes: Option<String>,
    pub element_count: usize,
}

impl StaticSlide {
    #[allow(dead_code)]
    pub fn bytes(artifact: &[u8]) -> Self {
        Self {
            artifact: artifact.to_vec(),
            notes: None,
            element_count: 1,
        }
    }

    #[allow(dead_code)]
    pub fn with_notes(artifact: &[u8], notes: &str) -> Self {
        Self {
            artifact: artifact.to_vec(),
            notes: Some(notes.to_string()),
            element_count: 1,
        }
    }
}

/// In-memory deck source; optionally fails extraction at one index.
pub struct StaticSource {
    pub name: String,
    pub slides: Vec<StaticSlide>,
    pub fail_at: Option<usize>,
}

impl StaticSource {
    #[allow(dead_code)]
    pub fn new(name: &str, slides: Vec<StaticSlide>) -> Self {
        Self {
            name: name.to_string(),
            slides,
            fail_at: None,
        }
    }

    #[allow(dead_code)]
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }
}

#[async_trait]
impl SlideSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimensions(&self) -> SlideDimensions {
        SlideDimensions {
            width: 1280,
            height: 720,
        }
    }

    fn slide_count(&self) -> usize {
        self.slides.len()
    }

    async fn extract(&self, index: usize) -> Result<ExtractedSlide, LibraryError> {
        if self.fail_at == Some(index) {
            return Err(LibraryError::provider("extractor", "induced extract failure"));
        }
        let slide = self
            .slides
            .get(index)
            .ok_or_else(|| LibraryError::Validation(format!("no slide at index {index}")))?;
        Ok(ExtractedSlide {
            index,
            artifact: slide.artifact.clone(),
            notes: slide.notes.clone(),
            structure: SlideStructure {
                dimensions: self.dimensions(),
                elements: (0..slide.element_count)
                    .map(|i| ElementSummary {
                        content_type: "TEXT".into(),
                        x: 10.0,
                        y: 10.0 + i as f64 * 50.0,
                        width: 400.0,
                        height: 40.0,
                        content_description: String::new(),
                    })
                    .collect(),
            },
            element_count: slide.element_count,
        })
    }
}

/// Description generator that counts calls and can be switched to fail.
pub struct CountingDescriptionGenerator {
    inner: StructuralDescriptionGenerator,
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl CountingDescriptionGenerator {
    #[allow(dead_code)]
    pub fn new() -> Self {
        Self {
            inner: StructuralDescriptionGenerator,
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    #[allow(dead_code)]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[allow(dead_code)]
    pub fn fail(&self, on: bool) {
        self.fail.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl DescriptionGenerator for CountingDescriptionGenerator {
    async fn describe(&self, structure: &SlideStructure) -> Result<String, LibraryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(LibraryError::provider("generator", "induced describe failure"));
        }
        self.inner.describe(structure).await
    }
}

/// Embedding provider returning preassigned vectors per exact text, with a
/// default for everything else. Counts calls.
pub struct FixedEmbeddingProvider {
    dimension: usize,
    vectors: HashMap<String, Vec<f32>>,
    default: Vec<f32>,
    fail_texts: Vec<String>,
    calls: AtomicUsize,
}

impl FixedEmbeddingProvider {
    #[allow(dead_code)]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: HashMap::new(),
            default: vec![1.0; dimension],
            fail_texts: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    #[allow(dead_code)]
    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        assert_eq!(vector.len(), self.dimension);
        self.vectors.insert(text.to_string(), vector);
        self
    }

    /// Fail any embed call containing this exact text.
    #[allow(dead_code)]
    pub fn failing_on(mut self, text: &str) -> Self {
        self.fail_texts.push(text.to_string());
        self
    }

    #[allow(dead_code)]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for FixedEmbeddingProvider {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(
        &self,
        texts: &[String],
        _mode: EmbeddingMode,
    ) -> Result<Vec<Vec<f32>>, LibraryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if texts.iter().any(|text| self.fail_texts.contains(text)) {
            return Err(LibraryError::provider("embedding", "induced embed failure"));
        }
        Ok(texts
            .iter()
            .map(|text| self.vectors.get(text).cloned().unwrap_or_else(|| self.default.clone()))
            .collect())
    }
}

/// Rerank provider that counts calls around an optional scripted ordering.
pub struct CountingRerankProvider {
    script: Option<Vec<(usize, f32)>>,
    calls: AtomicUsize,
}

impl CountingRerankProvider {
    #[allow(dead_code)]
    pub fn identity() -> Self {
        Self {
            script: None,
            calls: AtomicUsize::new(0),
        }
    }

    #[allow(dead_code)]
    pub fn scripted(script: Vec<(usize, f32)>) -> Self {
        Self {
            script: Some(script),
            calls: AtomicUsize::new(0),
        }
    }

    #[allow(dead_code)]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RerankProvider for CountingRerankProvider {
    async fn rerank(
        &self,
        _query: &str,
        documents: &[String],
        top_k: usize,
    ) -> Result<Vec<RerankResult>, LibraryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(script) = &self.script {
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

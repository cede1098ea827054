//! Content-addressable ingestion of multi-slide decks.
//!
//! For every slide in a source deck the pipeline extracts a standalone
//! artifact, hashes it, and checks the library before paying for anything
//! expensive: byte-identical slides are reused as-is, with no description or
//! embedding work, even across different source decks. New slides get a
//! description (author notes win over generation), a document-mode embedding,
//! and an atomic write through the storage adapter.
//!
//! Slides are processed concurrently under a semaphore bound, and each slide
//! fails alone: one bad slide is logged and skipped, never aborting the
//! batch.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::error::LibraryError;
use crate::providers::{DescriptionGenerator, EmbeddingMode, EmbeddingProvider};
use crate::storage::SlideStorageAdapter;
use crate::types::{SlideDimensions, SlideRecord, SlideStructure, content_hash};

/// One slide extracted from a source deck, ready for ingestion.
#[derive(Debug, Clone)]
pub struct ExtractedSlide {
    /// 0-based index in the source deck.
    pub index: usize,
    /// Standalone single-slide artifact, exact bytes.
    pub artifact: Vec<u8>,
    /// Author notes, if the slide carries any. Ground truth for the
    /// description when present.
    pub notes: Option<String>,
    /// Structural summary (element types, positions, sizes; no literal
    /// text), fed to description generation.
    pub structure: SlideStructure,
    pub element_count: usize,
}

/// A source deck the pipeline can extract slides from.
///
/// Deck parsing and PPTX surgery live behind this trait; the pipeline only
/// sees opaque artifact bytes plus structure.
#[async_trait]
pub trait SlideSource: Send + Sync {
    /// Source file name, recorded as provenance on each record.
    fn name(&self) -> &str;

    /// Slide dimensions of the deck.
    fn dimensions(&self) -> SlideDimensions;

    /// Number of slides in the deck.
    fn slide_count(&self) -> usize;

    /// Extract the slide at `index` as a standalone artifact.
    async fn extract(&self, index: usize) -> Result<ExtractedSlide, LibraryError>;
}

/// How one slide fared during ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideDisposition {
    /// Newly stored.
    Ingested,
    /// Byte-identical slide already in the library; record reused.
    Deduplicated,
}

/// Outcome of ingesting one deck: per-slide records in source order plus
/// counts. `failed` slides are absent from `records`.
#[derive(Debug)]
pub struct IngestReport {
    pub records: Vec<(SlideRecord, SlideDisposition)>,
    pub ingested: usize,
    pub deduplicated: usize,
    pub failed: usize,
}

impl IngestReport {
    /// Records only, source order, dispositions dropped.
    pub fn into_records(self) -> Vec<SlideRecord> {
        self.records.into_iter().map(|(record, _)| record).collect()
    }
}

/// Turns a multi-slide deck into zero or more deduplicated [`SlideRecord`]s.
pub struct SlideIngestionService {
    storage: Arc<SlideStorageAdapter>,
    embeddings: Arc<dyn EmbeddingProvider>,
    descriptions: Arc<dyn DescriptionGenerator>,
    concurrency: Arc<Semaphore>,
}

impl SlideIngestionService {
    pub fn new(
        storage: Arc<SlideStorageAdapter>,
        embeddings: Arc<dyn EmbeddingProvider>,
        descriptions: Arc<dyn DescriptionGenerator>,
    ) -> Self {
        let permits = storage.config().ingest_concurrency.max(1);
        Self {
            storage,
            embeddings,
            descriptions,
            concurrency: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Ingest every slide of `source`.
    ///
    /// Per-slide work runs concurrently bounded by the configured permit
    /// count; one slide's failure never cancels its siblings. The report
    /// preserves source order and is possibly shorter than the slide count.
    #[instrument(skip_all, fields(source = %source.name(), slides = source.slide_count()))]
    pub async fn ingest(&self, source: &dyn SlideSource) -> Result<IngestReport, LibraryError> {
        let expected = self.storage.config().embedding_dimension;
        let declared = self.embeddings.dimension();
        if declared != expected {
            return Err(LibraryError::Validation(format!(
                "embedding provider produces {declared}-dimensional vectors, index expects {expected}"
            )));
        }

        let slide_count = source.slide_count();
        info!("starting ingestion");

        let tasks = (0..slide_count).map(|index| async move {
            let _permit = self
                .concurrency
                .acquire()
                .await
                .map_err(|_| LibraryError::provider("ingestion", "semaphore closed"))?;
            self.ingest_slide(source, index).await
        });
        let outcomes = join_all(tasks).await;

        let mut report = IngestReport {
            records: Vec::with_capacity(slide_count),
            ingested: 0,
            deduplicated: 0,
            failed: 0,
        };
        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok((record, disposition)) => {
                    match disposition {
                        SlideDisposition::Ingested => report.ingested += 1,
                        SlideDisposition::Deduplicated => report.deduplicated += 1,
                    }
                    report.records.push((record, disposition));
                }
                Err(err) => {
                    warn!(slide = index, %err, "slide ingestion failed, continuing");
                    report.failed += 1;
                }
            }
        }

        info!(
            ingested = report.ingested,
            deduplicated = report.deduplicated,
            failed = report.failed,
            "ingestion complete"
        );
        Ok(report)
    }

    async fn ingest_slide(
        &self,
        source: &dyn SlideSource,
        index: usize,
    ) -> Result<(SlideRecord, SlideDisposition), LibraryError> {
        let slide = source.extract(index).await?;
        let hash = content_hash(&slide.artifact);

        // Dedup fast path: the hash check must complete before any
        // description/embedding work is considered.
        if let Some(existing) = self.storage.get_slide_by_hash(&hash).await? {
            debug!(
                slide = index,
                existing_id = %existing.slide_id,
                "byte-identical slide already in library"
            );
            return Ok((existing, SlideDisposition::Deduplicated));
        }

        let description = self.describe(&slide, source.name()).await;

        let vectors = self
            .embeddings
            .embed(std::slice::from_ref(&description), EmbeddingMode::Document)
            .await?;
        let embedding = vectors
            .into_iter()
            .next()
            .ok_or_else(|| LibraryError::provider("embedding", "empty embedding response"))?;

        let mut record = SlideRecord::new(
            hash,
            description,
            source.dimensions(),
            slide.element_count,
            source.name(),
            index,
        );
        let storage_ref = self
            .storage
            .store_slide(&slide.artifact, &record, &embedding)
            .await?;
        record.storage_ref = storage_ref;

        debug!(slide = index, slide_id = %record.slide_id, "slide ingested");
        Ok((record, SlideDisposition::Ingested))
    }

    /// Derive the slide's description. Author notes are ground truth and
    /// bypass generation entirely; a generator failure degrades to a basic
    /// provenance description rather than failing the slide.
    async fn describe(&self, slide: &ExtractedSlide, source_name: &str) -> String {
        if let Some(notes) = slide.notes.as_deref() {
            let trimmed = notes.trim();
            if !trimmed.is_empty() {
                debug!(slide = slide.index, "using author notes as description");
                return trimmed.to_string();
            }
        }

        match self.descriptions.describe(&slide.structure).await {
            Ok(description) => description.trim().to_string(),
            Err(err) => {
                warn!(slide = slide.index, %err, "description generation failed, using fallback");
                format!("Slide {} from {source_name}", slide.index + 1)
            }
        }
    }
}

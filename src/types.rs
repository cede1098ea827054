//! Core data types for the slide library.
//!
//! [`SlideRecord`] is the durable unit of the library: one single-slide
//! artifact plus the metadata and references needed to find it again. The
//! remaining types are either plan inputs ([`PresentationPlan`],
//! [`SlidePlanItem`]), structural summaries fed to description generation
//! ([`SlideStructure`]), or ephemeral mid-pipeline values
//! ([`RetrievalCandidate`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Pixel dimensions of a slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideDimensions {
    pub width: u32,
    pub height: u32,
}

/// References to one slide across the three backing stores.
///
/// Populated incrementally during the write transaction: the content key is
/// derived from the hash up front, the metadata id only exists after insert,
/// and the vector id equals the slide id by convention.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageRef {
    /// Content-store key for the artifact blob.
    pub content_key: String,
    /// Metadata-store document id, assigned by the store at insert time.
    pub metadata_id: String,
    /// Vector-index point id; always the slide id.
    pub vector_id: String,
}

/// One entry in the slide library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideRecord {
    /// Globally unique id, generated once at creation, immutable. Doubles as
    /// the vector-index point id and the primary metadata lookup key.
    pub slide_id: String,
    /// SHA-256 hex of the artifact's exact bytes; the dedup key. Never
    /// recomputed after creation.
    pub content_hash: String,
    /// Semantic search surface. Author notes when present, generated text
    /// otherwise.
    pub description: String,
    pub dimensions: SlideDimensions,
    pub element_count: usize,
    /// File name of the deck this slide was extracted from.
    pub source_presentation: String,
    /// 0-based index of the slide in its source deck.
    pub slide_index: usize,
    pub storage_ref: StorageRef,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SlideRecord {
    /// Create a record for a freshly extracted slide. The storage reference
    /// starts empty and is filled in by the storage adapter's transaction.
    pub fn new(
        content_hash: impl Into<String>,
        description: impl Into<String>,
        dimensions: SlideDimensions,
        element_count: usize,
        source_presentation: impl Into<String>,
        slide_index: usize,
    ) -> Self {
        Self {
            slide_id: Uuid::new_v4().to_string(),
            content_hash: content_hash.into(),
            description: description.into(),
            dimensions,
            element_count,
            source_presentation: source_presentation.into(),
            slide_index,
            storage_ref: StorageRef::default(),
            updated_at: Utc::now(),
            tags: Vec::new(),
        }
    }
}

/// SHA-256 over artifact bytes, hex-encoded lowercase.
///
/// Identical bytes always map to the same key, which is what makes the
/// content store's `put` a safe no-op on re-upload.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// One slot in a composition plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlidePlanItem {
    /// 1-based position, unique within a plan.
    pub position: u32,
    /// Natural-language retrieval query for this slot.
    pub description: String,
    /// Passed through to downstream content generation; opaque here.
    #[serde(default)]
    pub content_guidelines: String,
}

/// A complete presentation plan, as produced by an upstream planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresentationPlan {
    pub overall_theme: String,
    pub target_audience: String,
    pub slides: Vec<SlidePlanItem>,
}

/// Layout summary of one element on a slide: type tag, position, size.
///
/// Deliberately excludes the element's literal text so generated descriptions
/// stay template-like rather than instance-specific.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementSummary {
    /// Content-type tag: "TEXT", "TABLE", "CHART", ...
    pub content_type: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Optional hint about what the element holds, if upstream extraction
    /// produced one.
    #[serde(default)]
    pub content_description: String,
}

/// Structural summary of a slide, the input to description generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideStructure {
    pub dimensions: SlideDimensions,
    pub elements: Vec<ElementSummary>,
}

/// Ephemeral candidate produced between vector search and rerank. Never
/// persisted.
#[derive(Debug, Clone)]
pub struct RetrievalCandidate {
    pub slide_id: String,
    pub description: String,
    pub vector_score: f32,
}

//! Capability contracts for the three backing stores.
//!
//! The slide library persists each slide across three independent systems:
//!
//! ```text
//!                  ┌──────────────────────┐
//!                  │  SlideStorageAdapter │
//!                  └──────────┬───────────┘
//!                             │
//!        ┌────────────────────┼────────────────────┐
//!        ▼                    ▼                    ▼
//! ┌──────────────┐    ┌───────────────┐    ┌──────────────┐
//! │ ContentStore │    │ MetadataStore │    │ VectorIndex  │
//! │ (blob by key)│    │ (documents)   │    │ (embeddings) │
//! └──────────────┘    └───────────────┘    └──────────────┘
//! ```
//!
//! These traits are the whole contract: the adapter never assumes a cross-store
//! transaction exists, and correctness under concurrent writers to the same
//! key relies on each store's own per-key atomicity. Production deployments
//! supply network-backed implementations (S3/MinIO, MongoDB, Qdrant);
//! [`memory`] provides in-process implementations used in tests and embedded
//! setups.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LibraryError;

pub use memory::{MemoryContentStore, MemoryMetadataStore, MemoryVectorIndex};

/// Key-addressed binary blob storage.
///
/// Keys are derived from content hashes, so re-putting an existing key with
/// the same bytes is a safe no-op.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store `bytes` under `key`, overwriting any existing value.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), LibraryError>;

    /// Fetch the blob at `key`, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LibraryError>;

    /// Delete the blob at `key`. Returns whether a blob existed.
    async fn delete(&self, key: &str) -> Result<bool, LibraryError>;

    /// Whether a blob exists at `key`.
    async fn exists(&self, key: &str) -> Result<bool, LibraryError>;
}

/// Equality filter over document fields, e.g. `{"slide_id": "..."}`.
pub type DocumentFilter = serde_json::Map<String, serde_json::Value>;

/// Build a single-field equality filter.
pub fn filter_eq(field: &str, value: impl Into<serde_json::Value>) -> DocumentFilter {
    let mut filter = DocumentFilter::new();
    filter.insert(field.to_string(), value.into());
    filter
}

/// Document storage scoped to one logical database.
///
/// Documents are JSON objects; the store assigns an opaque id at insert time.
/// Filters are field-equality maps, the only query shape this crate needs.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Find one document matching `filter`, or `None`.
    async fn find_one(
        &self,
        collection: &str,
        filter: &DocumentFilter,
    ) -> Result<Option<serde_json::Value>, LibraryError>;

    /// Insert a document and return its store-assigned id.
    async fn insert_one(
        &self,
        collection: &str,
        doc: serde_json::Value,
    ) -> Result<String, LibraryError>;

    /// Merge `patch` (top-level fields) into the first document matching
    /// `filter`.
    async fn update_one(
        &self,
        collection: &str,
        filter: &DocumentFilter,
        patch: serde_json::Value,
    ) -> Result<(), LibraryError>;

    /// Delete the first document matching `filter`; returns the number of
    /// documents removed (0 or 1).
    async fn delete_one(
        &self,
        collection: &str,
        filter: &DocumentFilter,
    ) -> Result<u64, LibraryError>;
}

/// Similarity metric for a vector collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    Cosine,
    Euclidean,
    Dot,
}

/// One point to upsert into a vector collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    /// Reduced projection of the record, enough for candidate inspection
    /// without a metadata-store round trip.
    pub payload: serde_json::Value,
}

/// One similarity hit returned from a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorHit {
    pub id: String,
    pub score: f32,
    pub payload: serde_json::Value,
}

/// Vector similarity index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create `collection` with the given dimensionality and metric if it
    /// does not already exist.
    async fn ensure_collection(
        &self,
        collection: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<(), LibraryError>;

    /// Insert or replace one point.
    async fn upsert(&self, collection: &str, point: VectorPoint) -> Result<(), LibraryError>;

    /// Return up to `limit` nearest neighbors of `vector`, best first.
    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<VectorHit>, LibraryError>;

    /// Delete points by id. Ids that do not exist are ignored.
    async fn delete(&self, collection: &str, ids: &[String]) -> Result<(), LibraryError>;
}

//! In-process store backends.
//!
//! Each backend keeps its data in a `parking_lot` RwLock'd map and implements
//! the same contract a network-backed store would. They are used as test
//! doubles and for embedded single-process deployments; the vector index
//! scores with true cosine similarity so retrieval behavior matches a real
//! index.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use super::{
    ContentStore, DistanceMetric, DocumentFilter, MetadataStore, VectorHit, VectorIndex,
    VectorPoint,
};
use crate::error::LibraryError;

/// Blob store over a `HashMap<String, Vec<u8>>`.
#[derive(Default)]
pub struct MemoryContentStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), LibraryError> {
        self.blobs.write().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LibraryError> {
        Ok(self.blobs.read().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<bool, LibraryError> {
        Ok(self.blobs.write().remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool, LibraryError> {
        Ok(self.blobs.read().contains_key(key))
    }
}

#[derive(Clone)]
struct StoredDoc {
    id: String,
    doc: serde_json::Value,
}

fn matches(stored: &StoredDoc, filter: &DocumentFilter) -> bool {
    filter.iter().all(|(field, expected)| {
        if field == "_id" {
            expected.as_str() == Some(stored.id.as_str())
        } else {
            stored.doc.get(field) == Some(expected)
        }
    })
}

/// Document store over per-collection vectors of JSON documents.
///
/// The logical database scoping of the contract is satisfied by construction:
/// one instance is one database.
#[derive(Default)]
pub struct MemoryMetadataStore {
    collections: RwLock<HashMap<String, Vec<StoredDoc>>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in `collection`.
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, |docs| docs.len())
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn find_one(
        &self,
        collection: &str,
        filter: &DocumentFilter,
    ) -> Result<Option<serde_json::Value>, LibraryError> {
        let collections = self.collections.read();
        let Some(docs) = collections.get(collection) else {
            return Ok(None);
        };
        Ok(docs
            .iter()
            .find(|stored| matches(stored, filter))
            .map(|stored| stored.doc.clone()))
    }

    async fn insert_one(
        &self,
        collection: &str,
        doc: serde_json::Value,
    ) -> Result<String, LibraryError> {
        let id = Uuid::new_v4().simple().to_string();
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(StoredDoc {
                id: id.clone(),
                doc,
            });
        Ok(id)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &DocumentFilter,
        patch: serde_json::Value,
    ) -> Result<(), LibraryError> {
        let mut collections = self.collections.write();
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(());
        };
        if let Some(stored) = docs.iter_mut().find(|stored| matches(stored, filter))
            && let (Some(target), Some(fields)) = (stored.doc.as_object_mut(), patch.as_object())
        {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }

    async fn delete_one(
        &self,
        collection: &str,
        filter: &DocumentFilter,
    ) -> Result<u64, LibraryError> {
        let mut collections = self.collections.write();
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        if let Some(pos) = docs.iter().position(|stored| matches(stored, filter)) {
            docs.remove(pos);
        }
        Ok((before - docs.len()) as u64)
    }
}

struct MemoryCollection {
    dimension: usize,
    metric: DistanceMetric,
    points: HashMap<String, VectorPoint>,
}

/// Vector index over in-memory points with exact similarity scoring.
#[derive(Default)]
pub struct MemoryVectorIndex {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points in `collection`.
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, |c| c.points.len())
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn score(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        DistanceMetric::Cosine => cosine(a, b),
        DistanceMetric::Dot => a.iter().zip(b).map(|(x, y)| x * y).sum(),
        DistanceMetric::Euclidean => {
            let dist: f32 = a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt();
            -dist
        }
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn ensure_collection(
        &self,
        collection: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<(), LibraryError> {
        let mut collections = self.collections.write();
        if let Some(existing) = collections.get(collection) {
            if existing.dimension != dimension {
                return Err(LibraryError::Validation(format!(
                    "collection {collection} exists with dimension {}, requested {dimension}",
                    existing.dimension
                )));
            }
            return Ok(());
        }
        collections.insert(
            collection.to_string(),
            MemoryCollection {
                dimension,
                metric,
                points: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn upsert(&self, collection: &str, point: VectorPoint) -> Result<(), LibraryError> {
        let mut collections = self.collections.write();
        let coll = collections.get_mut(collection).ok_or_else(|| {
            LibraryError::provider("vector-index", format!("unknown collection {collection}"))
        })?;
        if point.vector.len() != coll.dimension {
            return Err(LibraryError::Validation(format!(
                "vector has {} dimensions, collection {collection} expects {}",
                point.vector.len(),
                coll.dimension
            )));
        }
        coll.points.insert(point.id.clone(), point);
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<VectorHit>, LibraryError> {
        let collections = self.collections.read();
        let Some(coll) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        let mut hits: Vec<VectorHit> = coll
            .points
            .values()
            .map(|point| VectorHit {
                id: point.id.clone(),
                score: score(coll.metric, vector, &point.vector),
                payload: point.payload.clone(),
            })
            .filter(|hit| score_threshold.is_none_or(|threshold| hit.score >= threshold))
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<(), LibraryError> {
        let mut collections = self.collections.write();
        if let Some(coll) = collections.get_mut(collection) {
            for id in ids {
                coll.points.remove(id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::filter_eq;
    use serde_json::json;

    #[tokio::test]
    async fn content_store_roundtrip() {
        let store = MemoryContentStore::new();
        store.put("k1", b"bytes".to_vec()).await.unwrap();
        assert!(store.exists("k1").await.unwrap());
        assert_eq!(store.get("k1").await.unwrap(), Some(b"bytes".to_vec()));
        assert!(store.delete("k1").await.unwrap());
        assert!(!store.delete("k1").await.unwrap());
        assert_eq!(store.get("k1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn metadata_update_merges_top_level_fields() {
        let store = MemoryMetadataStore::new();
        store
            .insert_one("slides", json!({"slide_id": "a", "tags": []}))
            .await
            .unwrap();
        store
            .update_one(
                "slides",
                &filter_eq("slide_id", "a"),
                json!({"tags": ["intro"]}),
            )
            .await
            .unwrap();
        let doc = store
            .find_one("slides", &filter_eq("slide_id", "a"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["tags"], json!(["intro"]));
    }

    #[tokio::test]
    async fn vector_query_orders_by_cosine() {
        let index = MemoryVectorIndex::new();
        index
            .ensure_collection("c", 2, DistanceMetric::Cosine)
            .await
            .unwrap();
        for (id, vector) in [("x", vec![1.0, 0.0]), ("y", vec![0.0, 1.0]), ("z", vec![0.7, 0.7])] {
            index
                .upsert(
                    "c",
                    VectorPoint {
                        id: id.into(),
                        vector,
                        payload: json!({}),
                    },
                )
                .await
                .unwrap();
        }
        let hits = index.query("c", &[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "x");
        assert_eq!(hits[1].id, "z");
    }

    #[tokio::test]
    async fn vector_dimension_mismatch_rejected() {
        let index = MemoryVectorIndex::new();
        index
            .ensure_collection("c", 3, DistanceMetric::Cosine)
            .await
            .unwrap();
        let err = index
            .upsert(
                "c",
                VectorPoint {
                    id: "p".into(),
                    vector: vec![1.0, 2.0],
                    payload: json!({}),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LibraryError::Validation(_)));
    }

    #[tokio::test]
    async fn query_against_missing_collection_is_empty() {
        let index = MemoryVectorIndex::new();
        assert!(index.query("nope", &[1.0], 5, None).await.unwrap().is_empty());
    }
}

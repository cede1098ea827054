//! Failure-injecting store wrappers for atomicity testing.
//!
//! Each wrapper delegates to an in-memory backend and fails a chosen
//! operation on demand, so tests can break any single step of the storage
//! adapter's write transaction and inspect what the rollback left behind.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

use deckweave::error::LibraryError;
use deckweave::stores::{
    ContentStore, DistanceMetric, DocumentFilter, MemoryContentStore, MemoryMetadataStore,
    MemoryVectorIndex, MetadataStore, VectorHit, VectorIndex, VectorPoint,
};

fn induced(op: &'static str) -> LibraryError {
    LibraryError::provider("chaos", format!("induced {op} failure"))
}

#[derive(Default)]
pub struct ChaosContentStore {
    pub inner: MemoryContentStore,
    pub fail_put: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl ChaosContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_put(&self, on: bool) {
        self.fail_put.store(on, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, on: bool) {
        self.fail_delete.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContentStore for ChaosContentStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), LibraryError> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(induced("put"));
        }
        self.inner.put(key, bytes).await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LibraryError> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<bool, LibraryError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(induced("delete"));
        }
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, LibraryError> {
        self.inner.exists(key).await
    }
}

#[derive(Default)]
pub struct ChaosMetadataStore {
    pub inner: MemoryMetadataStore,
    pub fail_insert: AtomicBool,
    pub fail_update: AtomicBool,
}

impl ChaosMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_insert(&self, on: bool) {
        self.fail_insert.store(on, Ordering::SeqCst);
    }

    pub fn fail_update(&self, on: bool) {
        self.fail_update.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl MetadataStore for ChaosMetadataStore {
    async fn find_one(
        &self,
        collection: &str,
        filter: &DocumentFilter,
    ) -> Result<Option<serde_json::Value>, LibraryError> {
        self.inner.find_one(collection, filter).await
    }

    async fn insert_one(
        &self,
        collection: &str,
        doc: serde_json::Value,
    ) -> Result<String, LibraryError> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(induced("insert"));
        }
        self.inner.insert_one(collection, doc).await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &DocumentFilter,
        patch: serde_json::Value,
    ) -> Result<(), LibraryError> {
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(induced("update"));
        }
        self.inner.update_one(collection, filter, patch).await
    }

    async fn delete_one(
        &self,
        collection: &str,
        filter: &DocumentFilter,
    ) -> Result<u64, LibraryError> {
        self.inner.delete_one(collection, filter).await
    }
}

#[derive(Default)]
pub struct ChaosVectorIndex {
    pub inner: MemoryVectorIndex,
    pub fail_upsert: AtomicBool,
}

impl ChaosVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_upsert(&self, on: bool) {
        self.fail_upsert.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl VectorIndex for ChaosVectorIndex {
    async fn ensure_collection(
        &self,
        collection: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<(), LibraryError> {
        self.inner.ensure_collection(collection, dimension, metric).await
    }

    async fn upsert(&self, collection: &str, point: VectorPoint) -> Result<(), LibraryError> {
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(induced("upsert"));
        }
        self.inner.upsert(collection, point).await
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<VectorHit>, LibraryError> {
        self.inner
            .query(collection, vector, limit, score_threshold)
            .await
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<(), LibraryError> {
        self.inner.delete(collection, ids).await
    }
}

//! Atomic multi-store persistence for slide records.
//!
//! A slide lives in three places at once: its artifact bytes in the content
//! store, its metadata document in the metadata store, and its embedding in
//! the vector index. No cross-store transaction exists, so
//! [`SlideStorageAdapter::store_slide`] runs the three writes in a strict
//! order and keeps a [`CompensationLog`], a stack of undo actions pushed
//! after each successful step. If a later step fails, the log unwinds in
//! reverse and the original error propagates. The write is never retried in
//! place; a half-completed write always rolls back.
//!
//! The invariant this module maintains: a slide is either fully absent from
//! all three stores or fully present and consistent.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::config::LibraryConfig;
use crate::error::LibraryError;
use crate::stores::{
    ContentStore, DistanceMetric, MetadataStore, VectorIndex, VectorPoint, filter_eq,
};
use crate::types::{SlideRecord, StorageRef};

/// One undo action for a completed write step.
///
/// Kept as data rather than closures so the rollback order and scope are
/// auditable and testable independent of the happy path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compensation {
    /// Delete the artifact blob at `key`.
    ContentBlob { key: String },
    /// Delete the metadata document for `slide_id`.
    MetadataDoc { slide_id: String },
    /// Delete the vector point `id`.
    VectorPoint { id: String },
}

/// Stack of undo actions, unwound in reverse push order.
#[derive(Debug, Default)]
pub struct CompensationLog {
    entries: Vec<Compensation>,
}

impl CompensationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: Compensation) {
        self.entries.push(entry);
    }

    /// Entries in push order, for inspection.
    pub fn entries(&self) -> &[Compensation] {
        &self.entries
    }

    /// Undo every recorded step, most recent first. Each undo is best-effort:
    /// a failed undo is logged and skipped so it cannot mask the error that
    /// triggered the rollback.
    pub async fn unwind(
        self,
        content: &dyn ContentStore,
        metadata: &dyn MetadataStore,
        vectors: &dyn VectorIndex,
        metadata_collection: &str,
        vector_collection: &str,
    ) {
        for entry in self.entries.into_iter().rev() {
            let outcome = match &entry {
                Compensation::VectorPoint { id } => vectors
                    .delete(vector_collection, std::slice::from_ref(id))
                    .await
                    .map(|_| ()),
                Compensation::MetadataDoc { slide_id } => metadata
                    .delete_one(metadata_collection, &filter_eq("slide_id", slide_id.as_str()))
                    .await
                    .map(|_| ()),
                Compensation::ContentBlob { key } => {
                    content.delete(key).await.map(|_| ())
                }
            };
            match outcome {
                Ok(()) => debug!(?entry, "rolled back"),
                Err(err) => warn!(?entry, %err, "rollback step failed; store may need repair"),
            }
        }
    }
}

/// All-or-nothing persistence of [`SlideRecord`]s across the three stores.
///
/// Store handles are injected at construction; the adapter holds no global
/// state and each test can build one over isolated doubles.
pub struct SlideStorageAdapter {
    content: Arc<dyn ContentStore>,
    metadata: Arc<dyn MetadataStore>,
    vectors: Arc<dyn VectorIndex>,
    config: LibraryConfig,
}

impl SlideStorageAdapter {
    pub fn new(
        content: Arc<dyn ContentStore>,
        metadata: Arc<dyn MetadataStore>,
        vectors: Arc<dyn VectorIndex>,
        config: LibraryConfig,
    ) -> Self {
        Self {
            content,
            metadata,
            vectors,
            config,
        }
    }

    /// Ensure the vector collection exists with the configured dimensionality
    /// and cosine similarity. Call once before first use.
    pub async fn initialize(&self) -> Result<(), LibraryError> {
        self.vectors
            .ensure_collection(
                &self.config.vector_collection,
                self.config.embedding_dimension,
                DistanceMetric::Cosine,
            )
            .await?;
        info!(
            collection = %self.config.vector_collection,
            dimension = self.config.embedding_dimension,
            "storage backends ready"
        );
        Ok(())
    }

    /// Content-store key for a given content hash.
    pub fn content_key(&self, content_hash: &str) -> String {
        format!("slides/{content_hash}.pptx")
    }

    /// Persist a slide across all three stores, rolling back on any failure.
    ///
    /// The caller is expected to have checked [`Self::get_slide_by_hash`]
    /// first; duplicate hashes are not re-checked here.
    ///
    /// Step order (each gates the next):
    /// 1. put artifact bytes, keyed by content hash
    /// 2. insert the metadata document
    /// 3. patch the document with its own store-assigned id
    /// 4. upsert the vector point (id = slide id, reduced payload)
    #[instrument(skip_all, fields(slide_id = %record.slide_id))]
    pub async fn store_slide(
        &self,
        artifact: &[u8],
        record: &SlideRecord,
        embedding: &[f32],
    ) -> Result<StorageRef, LibraryError> {
        if embedding.len() != self.config.embedding_dimension {
            return Err(LibraryError::Validation(format!(
                "embedding has {} dimensions, index expects {}",
                embedding.len(),
                self.config.embedding_dimension
            )));
        }

        let mut log = CompensationLog::new();
        match self.try_store(artifact, record, embedding, &mut log).await {
            Ok(storage_ref) => {
                info!(content_key = %storage_ref.content_key, "slide stored");
                Ok(storage_ref)
            }
            Err(err) => {
                warn!(%err, "store failed, rolling back {} step(s)", log.entries().len());
                log.unwind(
                    self.content.as_ref(),
                    self.metadata.as_ref(),
                    self.vectors.as_ref(),
                    &self.config.metadata_collection,
                    &self.config.vector_collection,
                )
                .await;
                Err(err)
            }
        }
    }

    async fn try_store(
        &self,
        artifact: &[u8],
        record: &SlideRecord,
        embedding: &[f32],
        log: &mut CompensationLog,
    ) -> Result<StorageRef, LibraryError> {
        // Step 1: content blob, keyed by hash. Re-uploading an existing key
        // is a no-op thanks to content addressing.
        let content_key = self.content_key(&record.content_hash);
        self.content.put(&content_key, artifact.to_vec()).await?;
        log.push(Compensation::ContentBlob {
            key: content_key.clone(),
        });

        // Step 2: metadata document. The record cannot know its own
        // store-assigned id before insertion, so storage_ref goes in with an
        // empty metadata_id.
        let mut doc = serde_json::to_value(record)
            .map_err(|err| LibraryError::provider("metadata-store", err.to_string()))?;
        doc["storage_ref"] = json!({
            "content_key": content_key,
            "metadata_id": "",
            "vector_id": record.slide_id,
        });
        let metadata_id = self
            .metadata
            .insert_one(&self.config.metadata_collection, doc)
            .await?;
        log.push(Compensation::MetadataDoc {
            slide_id: record.slide_id.clone(),
        });

        // Step 3: patch the document with its own id.
        let storage_ref = StorageRef {
            content_key,
            metadata_id,
            vector_id: record.slide_id.clone(),
        };
        self.metadata
            .update_one(
                &self.config.metadata_collection,
                &filter_eq("slide_id", record.slide_id.as_str()),
                json!({ "storage_ref": storage_ref }),
            )
            .await?;

        // Step 4: vector point. Payload is a reduced projection, enough for
        // candidate inspection without a metadata round trip.
        self.vectors
            .upsert(
                &self.config.vector_collection,
                VectorPoint {
                    id: record.slide_id.clone(),
                    vector: embedding.to_vec(),
                    payload: json!({
                        "slide_id": record.slide_id,
                        "description": record.description,
                        "source_presentation": record.source_presentation,
                        "element_count": record.element_count,
                    }),
                },
            )
            .await?;
        log.push(Compensation::VectorPoint {
            id: record.slide_id.clone(),
        });

        Ok(storage_ref)
    }

    /// Look up a slide by content hash. The dedup fast path: a miss is a
    /// normal outcome, not an error.
    pub async fn get_slide_by_hash(
        &self,
        content_hash: &str,
    ) -> Result<Option<SlideRecord>, LibraryError> {
        let doc = self
            .metadata
            .find_one(
                &self.config.metadata_collection,
                &filter_eq("content_hash", content_hash),
            )
            .await?;
        doc.map(decode_record).transpose()
    }

    /// Fetch a slide's record and artifact bytes by id.
    ///
    /// A metadata miss is [`LibraryError::NotFound`]; a metadata hit whose
    /// blob is gone is [`LibraryError::Integrity`]; the two are never
    /// conflated.
    pub async fn get_slide_by_id(
        &self,
        slide_id: &str,
    ) -> Result<(SlideRecord, Vec<u8>), LibraryError> {
        let doc = self
            .metadata
            .find_one(
                &self.config.metadata_collection,
                &filter_eq("slide_id", slide_id),
            )
            .await?
            .ok_or_else(|| LibraryError::not_found("slide", slide_id))?;
        let record = decode_record(doc)?;

        let artifact = self
            .content
            .get(&record.storage_ref.content_key)
            .await?
            .ok_or_else(|| LibraryError::Integrity {
                slide_id: slide_id.to_string(),
                detail: format!(
                    "metadata references missing blob {}",
                    record.storage_ref.content_key
                ),
            })?;
        Ok((record, artifact))
    }

    /// Remove a slide from all three stores.
    ///
    /// Deletion order: vector point, metadata document, content blob. Partial
    /// deletes are not rolled back: each per-store delete is idempotent, so
    /// retrying converges.
    #[instrument(skip(self))]
    pub async fn delete_slide(&self, slide_id: &str) -> Result<bool, LibraryError> {
        let Some(doc) = self
            .metadata
            .find_one(
                &self.config.metadata_collection,
                &filter_eq("slide_id", slide_id),
            )
            .await?
        else {
            debug!("slide absent, nothing to delete");
            return Ok(false);
        };
        let record = decode_record(doc)?;

        self.vectors
            .delete(
                &self.config.vector_collection,
                std::slice::from_ref(&record.slide_id),
            )
            .await?;
        self.metadata
            .delete_one(
                &self.config.metadata_collection,
                &filter_eq("slide_id", slide_id),
            )
            .await?;
        self.content
            .delete(&record.storage_ref.content_key)
            .await?;

        info!("slide deleted");
        Ok(true)
    }

    /// The configuration this adapter was built with.
    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    /// Metadata store handle, shared with the retrieval pipeline.
    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        Arc::clone(&self.metadata)
    }

    /// Vector index handle, shared with the retrieval pipeline.
    pub fn vectors(&self) -> Arc<dyn VectorIndex> {
        Arc::clone(&self.vectors)
    }
}

fn decode_record(doc: serde_json::Value) -> Result<SlideRecord, LibraryError> {
    let slide_id = doc
        .get("slide_id")
        .and_then(|v| v.as_str())
        .unwrap_or("<unknown>")
        .to_string();
    serde_json::from_value(doc).map_err(|err| LibraryError::Integrity {
        slide_id,
        detail: format!("undecodable metadata document: {err}"),
    })
}

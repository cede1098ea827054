//! # deckweave
//!
//! Content-addressed slide library with atomic multi-store persistence,
//! semantic retrieval, and presentation composition.
//!
//! A library entry is one single-slide artifact plus its metadata and a
//! vector embedding of its description, spread across three independent
//! stores and kept consistent by compensating rollback:
//!
//! ```text
//! Source deck ──► ingestion (hash, dedup, describe, embed)
//!                     │
//!                     ▼
//!              storage adapter ──┬─► ContentStore   (artifact blob)
//!              (all-or-nothing)  ├─► MetadataStore  (slide document)
//!                                └─► VectorIndex    (embedding + payload)
//!
//! Query ──► retrieval (embed, vector search, rerank, hydrate)
//!                     ▲
//! Plan ───► composition orchestrator (retry/backoff, fallback, merge order)
//! ```
//!
//! External collaborators (blob/document/vector stores, embedding and rerank
//! providers, description generation, deck extraction and merging) appear
//! only as trait contracts; in-process implementations back the stores for
//! tests and embedded use.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use deckweave::config::LibraryConfig;
//! use deckweave::providers::{MockEmbeddingProvider, MockRerankProvider};
//! use deckweave::retrieval::SlideRetrievalService;
//! use deckweave::storage::SlideStorageAdapter;
//! use deckweave::stores::{MemoryContentStore, MemoryMetadataStore, MemoryVectorIndex};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), deckweave::error::LibraryError> {
//! let config = LibraryConfig {
//!     embedding_dimension: 8,
//!     ..LibraryConfig::default()
//! };
//! let storage = Arc::new(SlideStorageAdapter::new(
//!     Arc::new(MemoryContentStore::new()),
//!     Arc::new(MemoryMetadataStore::new()),
//!     Arc::new(MemoryVectorIndex::new()),
//!     config,
//! ));
//! storage.initialize().await?;
//!
//! let retrieval = SlideRetrievalService::new(
//!     Arc::clone(&storage),
//!     Arc::new(MockEmbeddingProvider::new(8)),
//!     Arc::new(MockRerankProvider::new()),
//! );
//! assert!(retrieval.search("title slide", 5).await?.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod compose;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod storage;
pub mod stores;
pub mod telemetry;
pub mod types;

pub use compose::{CancelToken, ComposedSlide, CompositionOrchestrator, CompositionReport};
pub use config::LibraryConfig;
pub use error::LibraryError;
pub use ingestion::{IngestReport, SlideIngestionService, SlideSource};
pub use retrieval::SlideRetrievalService;
pub use storage::SlideStorageAdapter;
pub use types::{PresentationPlan, SlidePlanItem, SlideRecord, StorageRef};

//! Library configuration.
//!
//! Compiled defaults cover local development; every knob can be overridden
//! through `DECKWEAVE_*` environment variables (a `.env` file is honored via
//! `dotenvy`). The config travels by value into each service at construction
//! time; there is no process-global configuration state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunable parameters for the slide library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Metadata collection holding slide documents.
    pub metadata_collection: String,
    /// Vector-index collection holding slide embeddings.
    pub vector_collection: String,
    /// Embedding dimensionality; must match the vector collection and the
    /// embedding provider's declared output size.
    pub embedding_dimension: usize,
    /// Total attempts per composition slot before falling back.
    pub max_retries: u32,
    /// Base of the exponential backoff between attempts, in seconds.
    pub backoff_base_secs: f64,
    /// Maximum concurrent per-slide ingestion tasks.
    pub ingest_concurrency: usize,
    /// Candidates pulled from the vector index before reranking.
    pub retrieval_limit: usize,
    /// Per-call timeout for provider HTTP requests, in seconds.
    pub provider_timeout_secs: u64,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            metadata_collection: "slides".into(),
            vector_collection: "slide_library".into(),
            embedding_dimension: 1024,
            max_retries: 3,
            backoff_base_secs: 2.0,
            ingest_concurrency: 4,
            retrieval_limit: 20,
            provider_timeout_secs: 30,
        }
    }
}

impl LibraryConfig {
    /// Load configuration from the environment on top of defaults.
    ///
    /// Unset variables keep their defaults; unparseable values are ignored
    /// with a warning rather than failing startup.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("DECKWEAVE_METADATA_COLLECTION") {
            cfg.metadata_collection = v;
        }
        if let Ok(v) = std::env::var("DECKWEAVE_VECTOR_COLLECTION") {
            cfg.vector_collection = v;
        }
        read_parsed(
            "DECKWEAVE_EMBEDDING_DIMENSION",
            &mut cfg.embedding_dimension,
        );
        read_parsed("DECKWEAVE_MAX_RETRIES", &mut cfg.max_retries);
        read_parsed("DECKWEAVE_BACKOFF_BASE_SECS", &mut cfg.backoff_base_secs);
        read_parsed("DECKWEAVE_INGEST_CONCURRENCY", &mut cfg.ingest_concurrency);
        read_parsed("DECKWEAVE_RETRIEVAL_LIMIT", &mut cfg.retrieval_limit);
        read_parsed(
            "DECKWEAVE_PROVIDER_TIMEOUT_SECS",
            &mut cfg.provider_timeout_secs,
        );

        cfg
    }

    /// Backoff delay before retry `attempt` (0-based): `base^attempt` seconds.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        Duration::from_secs_f64(self.backoff_base_secs.powi(attempt as i32))
    }

    /// Provider request timeout as a [`Duration`].
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}

fn read_parsed<T: std::str::FromStr>(var: &str, slot: &mut T) {
    if let Ok(raw) = std::env::var(var) {
        match raw.parse() {
            Ok(value) => *slot = value,
            Err(_) => tracing::warn!(var, raw, "ignoring unparseable config override"),
        }
    }
}

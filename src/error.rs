//! Error taxonomy for the slide library.
//!
//! Four families of failure flow through the crate, and callers react to each
//! differently:
//!
//! - [`LibraryError::NotFound`]: a lookup missed. Expected in normal flow
//!   (the dedup check misses on every new slide) and never logged as an error.
//! - [`LibraryError::Integrity`]: the stores disagree with each other, e.g. a
//!   metadata document whose referenced blob is gone. Indicates a prior
//!   partial failure that escaped rollback; surfaced distinctly so it is never
//!   mistaken for a plain miss.
//! - [`LibraryError::Provider`]: a transient fault from an external store or
//!   AI provider (network, timeout, rate limit). The composition
//!   orchestrator retries these with backoff; the storage adapter rolls back
//!   and re-raises instead of retrying in place.
//! - [`LibraryError::Validation`]: malformed input (embedding dimension
//!   mismatch, empty plan, zero limit). Fails fast, never retried.

use thiserror::Error;

/// Unified error type for slide library operations.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// A requested entity does not exist. Recoverable and expected in normal
    /// flow; reserved for lookups where the caller asked for a specific id.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// What kind of entity was looked up ("slide", "blob", ...).
        entity: &'static str,
        /// The key that missed.
        key: String,
    },

    /// Cross-store inconsistency: one store holds a reference the others
    /// cannot satisfy. A detectable, repairable anomaly, never papered over.
    #[error("integrity violation for slide {slide_id}: {detail}")]
    Integrity {
        /// The slide whose stores disagree.
        slide_id: String,
        /// What is missing or mismatched.
        detail: String,
    },

    /// Transient fault from an external store or AI provider.
    #[error("provider {provider} failed: {message}")]
    Provider {
        /// Which collaborator failed ("content-store", "voyage", ...).
        provider: &'static str,
        /// Underlying failure description.
        message: String,
    },

    /// Malformed input rejected before any I/O.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Every slot of a composition plan ended unresolved. A presentation
    /// with zero slides is not a valid result.
    #[error("composition produced no slides ({slots} slots, all unresolved)")]
    EmptyComposition {
        /// Number of plan slots that all failed to resolve.
        slots: usize,
    },
}

impl LibraryError {
    /// Shorthand for a provider failure.
    pub fn provider(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
        }
    }

    /// Shorthand for a not-found miss.
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    /// True for faults worth retrying (transient provider/store errors).
    ///
    /// Validation and integrity failures are deterministic; retrying them
    /// cannot succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Provider { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(LibraryError::provider("voyage", "timeout").is_transient());
        assert!(!LibraryError::Validation("bad limit".into()).is_transient());
        assert!(!LibraryError::not_found("slide", "abc").is_transient());
    }

    #[test]
    fn display_includes_key() {
        let err = LibraryError::not_found("slide", "123");
        assert_eq!(err.to_string(), "slide not found: 123");
    }
}

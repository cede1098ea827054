//! Composition orchestration: plan slots → concrete slide artifacts.
//!
//! Each slot of a [`PresentationPlan`] resolves independently through the
//! retrieval pipeline with exponential backoff between attempts:
//!
//! ```text
//! ATTEMPT(n) ──success──► RESOLVED
//!     │ empty / error
//!     ▼
//! BACKOFF(base^n) ──► ATTEMPT(n+1)        (n+1 < max_retries)
//!     │ retries exhausted
//!     ▼
//! default template? ──yes──► FALLBACK
//!     │ no
//!     ▼
//! UNRESOLVED (slot dropped)
//! ```
//!
//! Slots resolve concurrently; each slot's own retry loop is sequential.
//! Backoff sleeps race against a [`CancelToken`], so an overall deadline
//! short-circuits straight to fallback/unresolved instead of completing the
//! retry budget. The whole operation fails only when every slot ends
//! unresolved.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::error::LibraryError;
use crate::retrieval::SlideRetrievalService;
use crate::storage::SlideStorageAdapter;
use crate::types::{PresentationPlan, SlidePlanItem, SlideRecord};

/// Clonable cancellation signal for a composition run.
///
/// Cancelling immediately wakes every pending backoff sleep; slots then
/// settle to fallback or unresolved without finishing their retry budget.
#[derive(Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Signal cancellation. Idempotent.
    ///
    /// Uses `send_replace` so the flag is recorded even when no receiver is
    /// currently subscribed; a plain `send` would be dropped whenever every
    /// slot happens to be between backoff sleeps.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.subscribe().borrow()
    }

    /// Resolves once [`Self::cancel`] has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender gone without a cancel; nothing will ever fire.
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Terminal state of one plan slot.
#[derive(Debug)]
pub enum SlotOutcome {
    /// A library slide matched the slot's description.
    Resolved {
        position: u32,
        record: SlideRecord,
        artifact: Vec<u8>,
    },
    /// Retries exhausted; the configured default template fills the slot.
    Fallback { position: u32, artifact: Vec<u8> },
    /// Retries exhausted and no default configured; slot dropped.
    Unresolved { position: u32 },
}

impl SlotOutcome {
    pub fn position(&self) -> u32 {
        match self {
            Self::Resolved { position, .. }
            | Self::Fallback { position, .. }
            | Self::Unresolved { position } => *position,
        }
    }
}

/// One slide in the composed output.
#[derive(Debug, Clone)]
pub struct ComposedSlide {
    pub position: u32,
    /// `None` when the slot fell back to the default template.
    pub record: Option<SlideRecord>,
    pub artifact: Vec<u8>,
}

/// Ordered composition result plus per-slot accounting.
#[derive(Debug)]
pub struct CompositionReport {
    /// Resolved slides in plan-position order; may be shorter than the plan.
    pub slides: Vec<ComposedSlide>,
    pub resolved: usize,
    pub fallback: usize,
    pub unresolved: usize,
}

/// Merges ordered single-slide artifacts into one deck. External collaborator;
/// PPTX surgery is not this crate's concern.
#[async_trait]
pub trait DeckAssembler: Send + Sync {
    async fn assemble(&self, slides: &[ComposedSlide]) -> Result<Vec<u8>, LibraryError>;
}

/// Resolves an ordered slide plan into concrete artifacts under partial
/// failure.
pub struct CompositionOrchestrator {
    retrieval: Arc<SlideRetrievalService>,
    storage: Arc<SlideStorageAdapter>,
    /// Artifact used when a slot exhausts its retries. Injected as bytes so
    /// the orchestrator stays free of filesystem coupling.
    default_template: Option<Vec<u8>>,
}

impl CompositionOrchestrator {
    pub fn new(
        retrieval: Arc<SlideRetrievalService>,
        storage: Arc<SlideStorageAdapter>,
        default_template: Option<Vec<u8>>,
    ) -> Self {
        Self {
            retrieval,
            storage,
            default_template,
        }
    }

    /// Resolve `plan` with a fresh, never-fired cancellation token.
    pub async fn compose(
        &self,
        plan: &PresentationPlan,
    ) -> Result<CompositionReport, LibraryError> {
        self.compose_with_cancel(plan, &CancelToken::new()).await
    }

    /// Resolve every slot of `plan`, concurrently, honoring `cancel`.
    ///
    /// Fails with [`LibraryError::EmptyComposition`] only when all slots end
    /// unresolved; otherwise returns the ordered resolved subsequence.
    #[instrument(skip_all, fields(theme = %plan.overall_theme, slots = plan.slides.len()))]
    pub async fn compose_with_cancel(
        &self,
        plan: &PresentationPlan,
        cancel: &CancelToken,
    ) -> Result<CompositionReport, LibraryError> {
        if plan.slides.is_empty() {
            return Err(LibraryError::Validation("plan has no slides".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for item in &plan.slides {
            if !seen.insert(item.position) {
                return Err(LibraryError::Validation(format!(
                    "duplicate plan position {}",
                    item.position
                )));
            }
        }

        info!("resolving plan");
        let outcomes = join_all(
            plan.slides
                .iter()
                .map(|item| self.resolve_slot(item, cancel)),
        )
        .await;

        let mut report = CompositionReport {
            slides: Vec::with_capacity(outcomes.len()),
            resolved: 0,
            fallback: 0,
            unresolved: 0,
        };
        let mut settled: Vec<SlotOutcome> = outcomes;
        settled.sort_by_key(|outcome| outcome.position());
        for outcome in settled {
            match outcome {
                SlotOutcome::Resolved {
                    position,
                    record,
                    artifact,
                } => {
                    report.resolved += 1;
                    report.slides.push(ComposedSlide {
                        position,
                        record: Some(record),
                        artifact,
                    });
                }
                SlotOutcome::Fallback { position, artifact } => {
                    report.fallback += 1;
                    report.slides.push(ComposedSlide {
                        position,
                        record: None,
                        artifact,
                    });
                }
                SlotOutcome::Unresolved { position } => {
                    warn!(position, "slot unresolved, dropped from output");
                    report.unresolved += 1;
                }
            }
        }

        if report.slides.is_empty() {
            return Err(LibraryError::EmptyComposition {
                slots: plan.slides.len(),
            });
        }
        info!(
            resolved = report.resolved,
            fallback = report.fallback,
            unresolved = report.unresolved,
            "plan resolved"
        );
        Ok(report)
    }

    /// Resolve the plan and merge the surviving artifacts with `assembler`.
    pub async fn compose_and_assemble(
        &self,
        plan: &PresentationPlan,
        assembler: &dyn DeckAssembler,
        cancel: &CancelToken,
    ) -> Result<(Vec<u8>, CompositionReport), LibraryError> {
        let report = self.compose_with_cancel(plan, cancel).await?;
        let deck = assembler.assemble(&report.slides).await?;
        Ok((deck, report))
    }

    /// One slot's full retry loop. Attempts are sequential; the backoff sleep
    /// between them races the cancellation signal.
    async fn resolve_slot(&self, item: &SlidePlanItem, cancel: &CancelToken) -> SlotOutcome {
        let config = self.storage.config();
        let max_retries = config.max_retries.max(1);

        for attempt in 0..max_retries {
            if cancel.is_cancelled() {
                debug!(position = item.position, "cancelled before attempt");
                break;
            }

            match self.attempt(item).await {
                Ok(Some((record, artifact))) => {
                    debug!(
                        position = item.position,
                        slide_id = %record.slide_id,
                        attempt,
                        "slot resolved"
                    );
                    return SlotOutcome::Resolved {
                        position: item.position,
                        record,
                        artifact,
                    };
                }
                Ok(None) => {
                    debug!(position = item.position, attempt, "no match");
                }
                Err(err) => {
                    warn!(position = item.position, attempt, %err, "attempt failed");
                }
            }

            if attempt + 1 < max_retries {
                let delay = config.backoff_delay(attempt);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {
                        debug!(position = item.position, "cancelled during backoff");
                        break;
                    }
                }
            }
        }

        match &self.default_template {
            Some(template) => {
                debug!(position = item.position, "falling back to default template");
                SlotOutcome::Fallback {
                    position: item.position,
                    artifact: template.clone(),
                }
            }
            None => SlotOutcome::Unresolved {
                position: item.position,
            },
        }
    }

    /// A single attempt: top retrieval hit, then artifact download.
    async fn attempt(
        &self,
        item: &SlidePlanItem,
    ) -> Result<Option<(SlideRecord, Vec<u8>)>, LibraryError> {
        let matches = self.retrieval.search_simple(&item.description, 1).await?;
        let Some(top) = matches.into_iter().next() else {
            return Ok(None);
        };
        let (record, artifact) = self.storage.get_slide_by_id(&top.slide_id).await?;
        Ok(Some((record, artifact)))
    }
}

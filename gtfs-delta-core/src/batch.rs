//! Bounded-size writes with per-record fallback.
//!
//! Each batch moves `Pending -> Committed` on a successful bulk call, or
//! `Pending -> Degraded` when the bulk call fails and every record of that
//! batch is retried alone. Record failures are counted and logged; nothing
//! here aborts the caller.

use std::num::NonZeroUsize;

use log::{debug, info, warn};
use thiserror::Error;

use crate::{
    entity::EntityType,
    key::KeyPredicate,
    record::Record,
    reference::SkipReason,
    store::TransitStore,
};

/// Maximum number of rows or keys handled per batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BatchSize(NonZeroUsize);

/// Raised when a batch size of zero is requested.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("batch size must be at least one")]
pub struct ZeroBatchSize;

impl BatchSize {
    /// Default rows per upsert call.
    pub const DEFAULT_UPSERT: Self = Self(NonZeroUsize::MIN.saturating_add(9_999));
    /// Default keys per delete batch.
    pub const DEFAULT_DELETE: Self = Self(NonZeroUsize::MIN.saturating_add(99));

    /// Wrap `size`, rejecting zero.
    ///
    /// # Errors
    ///
    /// Returns [`ZeroBatchSize`] when `size` is zero.
    pub const fn new(size: usize) -> Result<Self, ZeroBatchSize> {
        match NonZeroUsize::new(size) {
            Some(size) => Ok(Self(size)),
            None => Err(ZeroBatchSize),
        }
    }

    /// The size as a plain count.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0.get()
    }
}

impl TryFrom<usize> for BatchSize {
    type Error = ZeroBatchSize;

    fn try_from(size: usize) -> Result<Self, Self::Error> {
        Self::new(size)
    }
}

/// Result for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The record reached the store.
    Written,
    /// The record was filtered out before any write.
    Skipped(SkipReason),
    /// The store rejected the record.
    Failed(String),
}

/// Result for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Every record in the batch succeeded.
    Committed {
        /// Records written or deleted.
        written: usize,
    },
    /// Some records were handled one at a time and at least the bulk call
    /// or one record failed.
    Degraded {
        /// Records that succeeded.
        written: usize,
        /// Records that failed.
        failed: usize,
    },
}

impl BatchOutcome {
    /// Records that succeeded.
    #[must_use]
    pub const fn written(self) -> usize {
        match self {
            Self::Committed { written } | Self::Degraded { written, .. } => written,
        }
    }

    /// Records that failed.
    #[must_use]
    pub const fn failed(self) -> usize {
        match self {
            Self::Committed { .. } => 0,
            Self::Degraded { failed, .. } => failed,
        }
    }
}

/// Totals across every batch of one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Per-batch outcomes in submission order.
    pub batches: Vec<BatchOutcome>,
}

impl BatchReport {
    /// Records that succeeded.
    #[must_use]
    pub fn written(&self) -> usize {
        self.batches.iter().map(|batch| batch.written()).sum()
    }

    /// Records that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.batches.iter().map(|batch| batch.failed()).sum()
    }

    /// Batches that fell back to per-record calls.
    #[must_use]
    pub fn degraded(&self) -> usize {
        self.batches
            .iter()
            .filter(|batch| matches!(batch, BatchOutcome::Degraded { .. }))
            .count()
    }
}

fn tally(outcomes: impl Iterator<Item = RecordOutcome>) -> (usize, usize) {
    outcomes.fold((0, 0), |(written, failed), outcome| match outcome {
        RecordOutcome::Written => (written + 1, failed),
        RecordOutcome::Failed(_) => (written, failed + 1),
        RecordOutcome::Skipped(_) => (written, failed),
    })
}

fn upsert_one<S: TransitStore>(store: &mut S, entity: EntityType, record: &Record) -> RecordOutcome {
    match store.upsert(entity, std::slice::from_ref(record)) {
        Ok(_) => RecordOutcome::Written,
        Err(err) => {
            warn!("Failed to upsert {entity} {}: {err}", record.key());
            RecordOutcome::Failed(err.to_string())
        }
    }
}

fn delete_one<S: TransitStore>(store: &mut S, predicate: &KeyPredicate) -> RecordOutcome {
    match store.delete(predicate) {
        Ok(()) => RecordOutcome::Written,
        Err(err) => {
            warn!(
                "Failed to delete {} where {predicate}: {err}",
                predicate.entity()
            );
            RecordOutcome::Failed(err.to_string())
        }
    }
}

/// Upsert `records` in batches of `size`, retrying a failed batch one record
/// at a time.
pub fn batch_upsert<S: TransitStore>(
    store: &mut S,
    entity: EntityType,
    records: &[Record],
    size: BatchSize,
) -> BatchReport {
    let total = records.len().div_ceil(size.get());
    let mut report = BatchReport::default();
    for (number, chunk) in (1..).zip(records.chunks(size.get())) {
        info!("Processing batch {number}/{total} for {}", entity.table());
        let outcome = match store.upsert(entity, chunk) {
            Ok(written) => {
                debug!("Upserted {written} {entity} records");
                BatchOutcome::Committed { written }
            }
            Err(err) => {
                warn!(
                    "Batch {number}/{total} for {} failed, retrying {} records individually: {err}",
                    entity.table(),
                    chunk.len()
                );
                let (written, failed) =
                    tally(chunk.iter().map(|record| upsert_one(store, entity, record)));
                BatchOutcome::Degraded { written, failed }
            }
        };
        report.batches.push(outcome);
    }
    if !records.is_empty() {
        info!(
            "Completed {}: {} written, {} failed",
            entity.table(),
            report.written(),
            report.failed()
        );
    }
    report
}

/// Delete `predicates` one key at a time, grouped into batches of `size` for
/// progress reporting.
pub fn batch_delete<S: TransitStore>(
    store: &mut S,
    predicates: &[KeyPredicate],
    size: BatchSize,
) -> BatchReport {
    let total = predicates.len().div_ceil(size.get());
    let mut report = BatchReport::default();
    for (number, chunk) in (1..).zip(predicates.chunks(size.get())) {
        if let Some(first) = chunk.first() {
            info!(
                "Processing deletion batch {number}/{total} for {}",
                first.entity().table()
            );
        }
        let (written, failed) = tally(chunk.iter().map(|predicate| delete_one(store, predicate)));
        report.batches.push(if failed == 0 {
            BatchOutcome::Committed { written }
        } else {
            BatchOutcome::Degraded { written, failed }
        });
    }
    report
}

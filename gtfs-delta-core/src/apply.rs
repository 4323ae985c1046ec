//! Dependency-ordered application of a diff package to a store.
//!
//! Tiers run strictly in order: agencies and stops, then routes, then every
//! dependent type. Within a type, changed rows are validated against the
//! reference cache, surviving rows are upserted, and only then are the
//! deleted keys removed. A failure in one type never stops the others and is
//! never rolled back.
//!
//! The reference cache is read once, before the run. A parent written earlier
//! in the same run is not visible to later tiers until the cache is reloaded.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info, warn};
use thiserror::Error;

use crate::{
    batch::{BatchSize, RecordOutcome, batch_delete, batch_upsert},
    entity::{EntityType, Tier},
    key::KeyPredicate,
    package::{DiffPackage, PackageFormatError, PackageTable, deletions_member},
    record::{ColumnIndex, Record, canonical_key},
    reference::{ReferenceCache, ReferenceCacheProvider, SkipReason, check_references},
    store::TransitStore,
};

/// Batch sizing for one apply run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyConfig {
    /// Rows per upsert call.
    pub upsert_batch_size: BatchSize,
    /// Keys per delete batch.
    pub delete_batch_size: BatchSize,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            upsert_batch_size: BatchSize::DEFAULT_UPSERT,
            delete_batch_size: BatchSize::DEFAULT_DELETE,
        }
    }
}

/// Counts for one entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityApplyReport {
    /// Changed rows that passed validation.
    pub validated: usize,
    /// Changed rows dropped before writing, by reason.
    pub skipped: BTreeMap<SkipReason, usize>,
    /// Rows the store accepted.
    pub upserted: usize,
    /// Rows the store rejected.
    pub upsert_failed: usize,
    /// Keys deleted.
    pub deleted: usize,
    /// Keys whose deletion failed.
    pub delete_failed: usize,
}

impl EntityApplyReport {
    /// Total skipped rows across every reason.
    #[must_use]
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    fn note_skip(&mut self, outcome: &RecordOutcome) {
        if let RecordOutcome::Skipped(reason) = outcome {
            *self.skipped.entry(*reason).or_default() += 1;
        }
    }

    fn absorb(&mut self, other: &Self) {
        self.validated += other.validated;
        for (reason, count) in &other.skipped {
            *self.skipped.entry(*reason).or_default() += count;
        }
        self.upserted += other.upserted;
        self.upsert_failed += other.upsert_failed;
        self.deleted += other.deleted;
        self.delete_failed += other.delete_failed;
    }
}

/// Counts for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Whether the package carried changes and was applied.
    pub applied: bool,
    /// Per-type counts in apply order.
    pub entities: BTreeMap<EntityType, EntityApplyReport>,
}

impl ApplyReport {
    /// Counts summed across every type.
    #[must_use]
    pub fn totals(&self) -> EntityApplyReport {
        let mut totals = EntityApplyReport::default();
        for report in self.entities.values() {
            totals.absorb(report);
        }
        totals
    }

    /// Counts for `entity`, when the package listed it.
    #[must_use]
    pub fn entity(&self, entity: EntityType) -> Option<&EntityApplyReport> {
        self.entities.get(&entity)
    }
}

/// Structural failures that abort a run.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// The package is internally inconsistent.
    #[error("diff package is malformed")]
    Package(#[from] PackageFormatError),
    /// The reference cache could not be loaded.
    #[error("failed to load reference cache")]
    ReferenceCache {
        /// Provider error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Load the cache from `provider` and apply `package`.
///
/// # Errors
///
/// Returns [`ApplyError::ReferenceCache`] when the provider fails, otherwise
/// as [`apply_package`].
pub fn load_and_apply<S, P>(
    store: &mut S,
    package: &DiffPackage,
    provider: &P,
    config: ApplyConfig,
) -> Result<ApplyReport, ApplyError>
where
    S: TransitStore,
    P: ReferenceCacheProvider + ?Sized,
{
    if !package.has_changes() {
        info!("No changes found in diff package");
        return Ok(ApplyReport::default());
    }
    info!("Loading reference cache");
    let cache = provider.load().map_err(|source| ApplyError::ReferenceCache {
        source: Box::new(source),
    })?;
    apply_package(store, package, &cache, config)
}

/// Apply `package` to `store`, validating references against `cache`.
///
/// Data-level problems (missing references, malformed rows, store failures)
/// are counted in the report and never returned as errors.
///
/// # Errors
///
/// Returns [`ApplyError::Package`] when a deletion key does not cover its
/// entity's primary key. No table is written in that case.
pub fn apply_package<S: TransitStore>(
    store: &mut S,
    package: &DiffPackage,
    cache: &ReferenceCache,
    config: ApplyConfig,
) -> Result<ApplyReport, ApplyError> {
    if !package.has_changes() {
        info!("No changes found in diff package");
        return Ok(ApplyReport::default());
    }
    let deletions = package
        .tables()
        .map(|table| deletion_predicates(table).map(|predicates| (table.entity, predicates)))
        .collect::<Result<BTreeMap<_, _>, _>>()?;

    let mut report = ApplyReport {
        applied: true,
        entities: BTreeMap::new(),
    };
    for tier in Tier::ALL {
        info!("Applying {tier} entities");
        for entity in EntityType::in_tier(tier) {
            let Some(table) = package.table(entity) else {
                continue;
            };
            let predicates = deletions.get(&entity).map_or(&[][..], Vec::as_slice);
            let entity_report = apply_table(store, table, predicates, cache, config);
            report.entities.insert(entity, entity_report);
        }
    }
    let totals = report.totals();
    info!(
        "Diff applied: {} upserted, {} skipped, {} upsert failures, {} deleted, {} delete failures",
        totals.upserted,
        totals.skipped_total(),
        totals.upsert_failed,
        totals.deleted,
        totals.delete_failed
    );
    Ok(report)
}

fn deletion_predicates(table: &PackageTable) -> Result<Vec<KeyPredicate>, PackageFormatError> {
    let Some(set) = &table.deletions else {
        return Ok(Vec::new());
    };
    (1..)
        .zip(&set.keys)
        .map(|(line, key)| {
            KeyPredicate::new(table.entity, key.clone()).map_err(|err| {
                PackageFormatError::MalformedKey {
                    member: deletions_member(table.entity),
                    line,
                    expected: err.expected,
                    actual: err.actual,
                }
            })
        })
        .collect()
}

fn validate(
    entity: EntityType,
    index: &ColumnIndex,
    row: &[String],
    cache: &ReferenceCache,
) -> Result<Record, RecordOutcome> {
    let record = Record::parse(entity, &index.row(entity, row)).map_err(|err| {
        debug!("Dropping malformed {entity} row: {err}");
        RecordOutcome::Skipped(SkipReason::Malformed)
    })?;
    check_references(&record, cache).map_err(RecordOutcome::Skipped)?;
    Ok(record)
}

/// Drop deletions of keys that an accepted row writes again.
///
/// A key respelled between feeds (`07` becoming `7`) appears both as a change
/// and as a deletion; deleting it after the upsert would remove the new row.
fn without_rewritten_keys(
    entity: EntityType,
    predicates: &[KeyPredicate],
    accepted: &[Record],
) -> Vec<KeyPredicate> {
    if accepted.is_empty() {
        return predicates.to_vec();
    }
    let written: BTreeSet<_> = accepted
        .iter()
        .map(|record| canonical_key(entity, &record.key()))
        .collect();
    let retained: Vec<KeyPredicate> = predicates
        .iter()
        .filter(|predicate| !written.contains(&canonical_key(entity, predicate.key())))
        .cloned()
        .collect();
    let kept = predicates.len() - retained.len();
    if kept > 0 {
        debug!("Keeping {kept} {entity} rows whose keys were rewritten in the same package");
    }
    retained
}

fn apply_table<S: TransitStore>(
    store: &mut S,
    table: &PackageTable,
    predicates: &[KeyPredicate],
    cache: &ReferenceCache,
    config: ApplyConfig,
) -> EntityApplyReport {
    let entity = table.entity;
    let mut report = EntityApplyReport::default();
    let mut accepted = Vec::new();
    if let Some(changes) = &table.changes {
        let index = ColumnIndex::new(&changes.header);
        for row in &changes.rows {
            match validate(entity, &index, row, cache) {
                Ok(record) => accepted.push(record),
                Err(outcome) => report.note_skip(&outcome),
            }
        }
    }
    report.validated = accepted.len();
    for (reason, count) in &report.skipped {
        warn!("Skipped {count} {entity} rows: {reason}");
    }

    if !accepted.is_empty() {
        let upserts = batch_upsert(store, entity, &accepted, config.upsert_batch_size);
        report.upserted = upserts.written();
        report.upsert_failed = upserts.failed();
    }
    let retained = without_rewritten_keys(entity, predicates, &accepted);
    if !retained.is_empty() {
        let deletes = batch_delete(store, &retained, config.delete_batch_size);
        report.deleted = deletes.written();
        report.delete_failed = deletes.failed();
        info!("Deleted {} records from {}", report.deleted, entity.table());
    }
    report
}

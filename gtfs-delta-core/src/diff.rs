//! Per-table comparison of two snapshots.
//!
//! Entity types are compared independently; dependency order only matters at
//! apply time. A changed row is always reported as the new row in full and a
//! deleted row as its bare primary-key tuple, so no key can be both.

use std::{collections::BTreeMap, fmt};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    entity::EntityType,
    key::KeyTuple,
    snapshot::{FeedSnapshot, Snapshot},
};

/// Outcome of comparing one table across two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffStatus {
    /// Only the new feed carries the table.
    NewFile,
    /// Only the old feed carries the table.
    DeletedFile,
    /// Both feeds carry the table and at least one row differs.
    Modified,
    /// Both feeds carry identical tables.
    Unchanged,
}

impl fmt::Display for DiffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NewFile => "new_file",
            Self::DeletedFile => "deleted_file",
            Self::Modified => "modified",
            Self::Unchanged => "unchanged",
        })
    }
}

/// A changed row with its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedRow {
    /// Primary-key tuple of the row.
    pub key: KeyTuple,
    /// Full row in header order.
    pub values: Vec<String>,
}

/// Row counts gathered while diffing one table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    /// Rows in the old table.
    pub old_total: usize,
    /// Rows in the new table.
    pub new_total: usize,
    /// Keys only in the new table.
    pub added: usize,
    /// Keys in both tables whose content differs.
    pub modified: usize,
    /// Keys only in the old table.
    pub deleted: usize,
}

/// Differences for one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDiff {
    /// Entity compared.
    pub entity: EntityType,
    /// Header of the changed rows.
    pub header: Vec<String>,
    /// Added or modified rows, in key order.
    pub changed: Vec<KeyedRow>,
    /// Keys absent from the new table, in key order.
    pub deleted: Vec<KeyTuple>,
    /// Table-level status.
    pub status: DiffStatus,
    /// Row counts.
    pub stats: DiffStats,
}

impl TableDiff {
    /// Whether the diff carries rows to write or delete.
    #[must_use]
    pub fn has_rows(&self) -> bool {
        !self.changed.is_empty() || !self.deleted.is_empty()
    }
}

/// Errors raised while diffing one table.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiffError {
    /// Both tables hold rows but their headers differ.
    #[error("{entity} headers differ: old {old:?}, new {new:?}")]
    SchemaMismatch {
        /// Entity compared.
        entity: EntityType,
        /// Old header.
        old: Vec<String>,
        /// New header.
        new: Vec<String>,
    },
    /// The two snapshots belong to different entity types.
    #[error("cannot diff {old} against {new}")]
    EntityMismatch {
        /// Entity of the old snapshot.
        old: EntityType,
        /// Entity of the new snapshot.
        new: EntityType,
    },
    /// One side's member could not be loaded.
    #[error("{entity} could not be loaded from the {side} feed: {message}")]
    Unreadable {
        /// Entity that failed.
        entity: EntityType,
        /// Which feed held the bad member.
        side: FeedSide,
        /// Loader error text.
        message: String,
    },
}

/// Identifies one of the two compared feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedSide {
    /// The earlier feed.
    Old,
    /// The later feed.
    New,
}

impl fmt::Display for FeedSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Old => "old",
            Self::New => "new",
        })
    }
}

/// Compare two snapshots of `entity`. An absent side counts as empty.
///
/// # Errors
///
/// Returns [`DiffError::EntityMismatch`] when a snapshot belongs to another
/// entity and [`DiffError::SchemaMismatch`] when both sides hold rows under
/// different headers.
pub fn diff_snapshots(
    entity: EntityType,
    old: Option<&Snapshot>,
    new: Option<&Snapshot>,
) -> Result<TableDiff, DiffError> {
    for snapshot in [old, new].into_iter().flatten() {
        if snapshot.entity() != entity {
            return Err(DiffError::EntityMismatch {
                old: entity,
                new: snapshot.entity(),
            });
        }
    }
    if let (Some(before), Some(after)) = (old, new)
        && !before.is_empty()
        && !after.is_empty()
        && before.header() != after.header()
    {
        return Err(DiffError::SchemaMismatch {
            entity,
            old: before.header().to_vec(),
            new: after.header().to_vec(),
        });
    }

    let header = new
        .or(old)
        .map_or_else(
            || entity.primary_key().iter().map(|c| (*c).to_owned()).collect(),
            |snapshot| snapshot.header().to_vec(),
        );
    let mut stats = DiffStats {
        old_total: old.map_or(0, Snapshot::len),
        new_total: new.map_or(0, Snapshot::len),
        ..DiffStats::default()
    };

    let mut changed = Vec::new();
    if let Some(after) = new {
        for (key, row) in after.rows() {
            match old.and_then(|before| before.get(key)) {
                None => stats.added += 1,
                Some(previous) if previous.hash() != row.hash() => stats.modified += 1,
                Some(_) => continue,
            }
            changed.push(KeyedRow {
                key: key.clone(),
                values: row.values().to_vec(),
            });
        }
    }

    let deleted: Vec<KeyTuple> = old
        .map(|before| {
            before
                .keys()
                .filter(|key| !new.is_some_and(|after| after.contains_key(key)))
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    stats.deleted = deleted.len();

    let status = match (old, new) {
        (None, Some(_)) => DiffStatus::NewFile,
        (Some(_), None) => DiffStatus::DeletedFile,
        _ if !changed.is_empty() || !deleted.is_empty() => DiffStatus::Modified,
        _ => DiffStatus::Unchanged,
    };

    Ok(TableDiff {
        entity,
        header,
        changed,
        deleted,
        status,
        stats,
    })
}

/// A table that could not be diffed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffFailure {
    /// Entity that failed.
    pub entity: EntityType,
    /// Cause.
    pub error: DiffError,
}

/// Differences across every entity type of two feeds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedDiff {
    /// Successful per-table diffs in apply order.
    pub tables: BTreeMap<EntityType, TableDiff>,
    /// Tables skipped because loading or comparison failed.
    pub failures: Vec<DiffFailure>,
}

impl FeedDiff {
    /// Whether any table was added, removed or modified.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.tables
            .values()
            .any(|table| table.status != DiffStatus::Unchanged)
    }

    /// Whether every table present in either feed was diffed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

fn unreadable(feed: &FeedSnapshot, entity: EntityType, side: FeedSide) -> Option<DiffError> {
    feed.unreadable(entity).map(|err| DiffError::Unreadable {
        entity,
        side,
        message: err.to_string(),
    })
}

/// Diff every entity type present in either feed.
///
/// A table that fails to load or compare is recorded in
/// [`FeedDiff::failures`]; the remaining tables are still diffed.
#[must_use]
pub fn diff_feeds(old: &FeedSnapshot, new: &FeedSnapshot) -> FeedDiff {
    let mut result = FeedDiff::default();
    for entity in EntityType::ALL {
        if !old.mentions(entity) && !new.mentions(entity) {
            continue;
        }
        let outcome = match unreadable(old, entity, FeedSide::Old)
            .or_else(|| unreadable(new, entity, FeedSide::New))
        {
            Some(err) => Err(err),
            None => diff_snapshots(entity, old.get(entity), new.get(entity)),
        };
        match outcome {
            Ok(table) => {
                let stats = table.stats;
                info!(
                    "{entity}: {} old, {} new, {} added, {} modified, {} deleted ({})",
                    stats.old_total,
                    stats.new_total,
                    stats.added,
                    stats.modified,
                    stats.deleted,
                    table.status,
                );
                result.tables.insert(entity, table);
            }
            Err(error) => {
                warn!("Skipping {entity}: {error}");
                result.failures.push(DiffFailure { entity, error });
            }
        }
    }
    result
}

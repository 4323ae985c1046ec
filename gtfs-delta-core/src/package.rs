//! The diff package: change and deletion sets plus a JSON summary.
//!
//! Containers are handled elsewhere; this module defines the member names,
//! the summary document and the structural checks applied when a package is
//! reassembled from its members.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    diff::{DiffStatus, FeedDiff, TableDiff},
    entity::EntityType,
    key::KeyTuple,
};

/// Name of the summary member.
pub const SUMMARY_MEMBER: &str = "summary.json";

const CHANGES_SUFFIX: &str = ".changes.csv";
const DELETIONS_SUFFIX: &str = ".deletions.csv";

/// Member holding the changed rows of `entity`.
#[must_use]
pub fn changes_member(entity: EntityType) -> String {
    format!("{}{CHANGES_SUFFIX}", entity.stem())
}

/// Member holding the deleted keys of `entity`.
#[must_use]
pub fn deletions_member(entity: EntityType) -> String {
    format!("{}{DELETIONS_SUFFIX}", entity.stem())
}

/// Kind of data member inside a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// `<stem>.changes.csv`
    Changes,
    /// `<stem>.deletions.csv`
    Deletions,
}

/// Split a member name into its entity stem and kind.
///
/// Returns `None` for the summary and for names without a known suffix.
#[must_use]
pub fn parse_member_name(name: &str) -> Option<(&str, MemberKind)> {
    name.strip_suffix(CHANGES_SUFFIX)
        .map(|stem| (stem, MemberKind::Changes))
        .or_else(|| {
            name.strip_suffix(DELETIONS_SUFFIX)
                .map(|stem| (stem, MemberKind::Deletions))
        })
}

/// Per-type entry of the summary document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    /// Table-level status.
    pub status: DiffStatus,
    /// Rows in the changes member.
    #[serde(default)]
    pub changed_records: usize,
    /// Keys in the deletions member.
    #[serde(default)]
    pub deleted_records: usize,
}

/// The `summary.json` document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSummary {
    /// Whether any table was added, removed or modified.
    pub has_changes: bool,
    /// Entries keyed by entity type, written as its stem.
    #[serde(default)]
    pub files: BTreeMap<EntityType, FileSummary>,
}

/// Changed rows of one table, header included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Full header of the new table.
    pub header: Vec<String>,
    /// Full rows in header order.
    pub rows: Vec<Vec<String>>,
}

/// Deleted keys of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionSet {
    /// Primary-key column names.
    pub header: Vec<String>,
    /// Deleted primary-key tuples.
    pub keys: Vec<KeyTuple>,
}

impl DeletionSet {
    /// Empty deletion set for `entity`.
    #[must_use]
    pub fn for_entity(entity: EntityType) -> Self {
        Self {
            header: entity.primary_key().iter().map(|c| (*c).to_owned()).collect(),
            keys: Vec::new(),
        }
    }
}

/// One entity type's slice of a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageTable {
    /// Entity type.
    pub entity: EntityType,
    /// Status recorded in the summary.
    pub status: DiffStatus,
    /// Changed rows, when any.
    pub changes: Option<ChangeSet>,
    /// Deleted keys, when any.
    pub deletions: Option<DeletionSet>,
}

impl PackageTable {
    fn from_table_diff(table: &TableDiff) -> Self {
        let changes = (!table.changed.is_empty()).then(|| ChangeSet {
            header: table.header.clone(),
            rows: table.changed.iter().map(|row| row.values.clone()).collect(),
        });
        let deletions = (!table.deleted.is_empty()).then(|| DeletionSet {
            keys: table.deleted.clone(),
            ..DeletionSet::for_entity(table.entity)
        });
        Self {
            entity: table.entity,
            status: table.status,
            changes,
            deletions,
        }
    }

    /// Number of changed rows.
    #[must_use]
    pub fn changed_records(&self) -> usize {
        self.changes.as_ref().map_or(0, |set| set.rows.len())
    }

    /// Number of deleted keys.
    #[must_use]
    pub fn deleted_records(&self) -> usize {
        self.deletions.as_ref().map_or(0, |set| set.keys.len())
    }
}

/// Structural problems that make a package unusable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PackageFormatError {
    /// The summary document is not valid JSON of the expected shape.
    #[error("summary is not valid: {message}")]
    InvalidSummary {
        /// Parser message.
        message: String,
    },
    /// A member names an entity type that is not supported.
    #[error("package names unknown entity type '{name}'")]
    UnknownEntity {
        /// Unrecognised stem.
        name: String,
    },
    /// The summary claims rows for a member the package lacks.
    #[error("package lacks member '{member}'")]
    MissingMember {
        /// Absent member name.
        member: String,
    },
    /// A member exists for a type the summary does not list.
    #[error("member '{member}' is not listed in the summary")]
    UnlistedMember {
        /// Unexpected member name.
        member: String,
    },
    /// A member's row count disagrees with the summary.
    #[error("member '{member}' holds {actual} rows but the summary records {expected}")]
    CountMismatch {
        /// Member name.
        member: String,
        /// Count from the summary.
        expected: usize,
        /// Rows found.
        actual: usize,
    },
    /// A deletions header differs from the entity's primary key.
    #[error("member '{member}' has key header {actual:?}, expected {expected:?}")]
    KeyHeaderMismatch {
        /// Member name.
        member: String,
        /// Primary-key columns.
        expected: Vec<String>,
        /// Header found.
        actual: Vec<String>,
    },
    /// A changes header does not name a primary-key column.
    #[error("member '{member}' lacks primary-key column '{column}'")]
    MissingKeyColumn {
        /// Member name.
        member: String,
        /// Absent key column.
        column: &'static str,
    },
    /// A deletions row does not carry one value per key column.
    #[error("member '{member}' row {line} has {actual} values, expected {expected}")]
    MalformedKey {
        /// Member name.
        member: String,
        /// One-based data row number.
        line: usize,
        /// Key column count.
        expected: usize,
        /// Values found.
        actual: usize,
    },
}

/// A complete diff package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffPackage {
    summary: PackageSummary,
    tables: BTreeMap<EntityType, PackageTable>,
}

impl DiffPackage {
    /// Package every successfully diffed table of `diff`.
    ///
    /// Unchanged tables appear in the summary with zero counts and emit no
    /// members.
    #[must_use]
    pub fn from_feed_diff(diff: &FeedDiff) -> Self {
        let tables: BTreeMap<_, _> = diff
            .tables
            .iter()
            .map(|(entity, table)| (*entity, PackageTable::from_table_diff(table)))
            .collect();
        let files = tables
            .values()
            .map(|table| {
                (
                    table.entity,
                    FileSummary {
                        status: table.status,
                        changed_records: table.changed_records(),
                        deleted_records: table.deleted_records(),
                    },
                )
            })
            .collect();
        Self {
            summary: PackageSummary {
                has_changes: diff.has_changes(),
                files,
            },
            tables,
        }
    }

    /// Reassemble a package from a summary and its members, checking that
    /// the members agree with the summary.
    ///
    /// # Errors
    ///
    /// Returns [`PackageFormatError`] when a claimed member is missing, an
    /// unlisted member is present, a count disagrees or a header does not
    /// match the entity's key.
    pub fn from_parts(
        summary: PackageSummary,
        mut changes: BTreeMap<EntityType, ChangeSet>,
        mut deletions: BTreeMap<EntityType, DeletionSet>,
    ) -> Result<Self, PackageFormatError> {
        let mut tables = BTreeMap::new();
        for (&entity, file) in &summary.files {
            let change_set = changes.remove(&entity);
            let deletion_set = deletions.remove(&entity);
            check_changes(entity, file.changed_records, change_set.as_ref())?;
            check_deletions(entity, file.deleted_records, deletion_set.as_ref())?;
            tables.insert(
                entity,
                PackageTable {
                    entity,
                    status: file.status,
                    changes: change_set.filter(|set| !set.rows.is_empty()),
                    deletions: deletion_set.filter(|set| !set.keys.is_empty()),
                },
            );
        }
        if let Some(entity) = changes.keys().next() {
            return Err(PackageFormatError::UnlistedMember {
                member: changes_member(*entity),
            });
        }
        if let Some(entity) = deletions.keys().next() {
            return Err(PackageFormatError::UnlistedMember {
                member: deletions_member(*entity),
            });
        }
        Ok(Self { summary, tables })
    }

    /// The summary document.
    #[must_use]
    pub const fn summary(&self) -> &PackageSummary {
        &self.summary
    }

    /// Whether the package carries anything to apply.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        self.summary.has_changes
    }

    /// Slice for `entity`, when the summary lists it.
    #[must_use]
    pub fn table(&self, entity: EntityType) -> Option<&PackageTable> {
        self.tables.get(&entity)
    }

    /// Every listed table in apply order.
    pub fn tables(&self) -> impl Iterator<Item = &PackageTable> {
        self.tables.values()
    }
}

fn check_changes(
    entity: EntityType,
    expected: usize,
    set: Option<&ChangeSet>,
) -> Result<(), PackageFormatError> {
    let member = changes_member(entity);
    let Some(set) = set else {
        return if expected == 0 {
            Ok(())
        } else {
            Err(PackageFormatError::MissingMember { member })
        };
    };
    if let Some(column) = entity
        .primary_key()
        .iter()
        .find(|column| !set.header.iter().any(|name| name == *column))
    {
        return Err(PackageFormatError::MissingKeyColumn { member, column });
    }
    if set.rows.len() != expected {
        return Err(PackageFormatError::CountMismatch {
            member,
            expected,
            actual: set.rows.len(),
        });
    }
    Ok(())
}

fn check_deletions(
    entity: EntityType,
    expected: usize,
    set: Option<&DeletionSet>,
) -> Result<(), PackageFormatError> {
    let member = deletions_member(entity);
    let Some(set) = set else {
        return if expected == 0 {
            Ok(())
        } else {
            Err(PackageFormatError::MissingMember { member })
        };
    };
    if set.header != entity.primary_key() {
        return Err(PackageFormatError::KeyHeaderMismatch {
            member,
            expected: entity.primary_key().iter().map(|c| (*c).to_owned()).collect(),
            actual: set.header.clone(),
        });
    }
    let arity = entity.primary_key().len();
    if let Some((line, key)) = (1..)
        .zip(&set.keys)
        .find(|(_, key)| key.arity() != arity)
    {
        return Err(PackageFormatError::MalformedKey {
            member,
            line,
            expected: arity,
            actual: key.arity(),
        });
    }
    if set.keys.len() != expected {
        return Err(PackageFormatError::CountMismatch {
            member,
            expected,
            actual: set.keys.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{diff::diff_feeds, snapshot::FeedSnapshot, snapshot::Snapshot};
    use rstest::{fixture, rstest};

    fn table(entity: EntityType, header: &[&str], rows: &[&[&str]]) -> Snapshot {
        Snapshot::from_rows(
            entity,
            header.iter().map(|c| (*c).to_owned()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|v| (*v).to_owned()).collect()),
        )
        .expect("valid table")
    }

    #[fixture]
    fn package() -> DiffPackage {
        let calendar_header = ["service_id", "monday", "start_date", "end_date"];
        let calendar_rows: &[&[&str]] = &[&["WK", "1", "20240101", "20241231"]];
        let old: FeedSnapshot = [
            table(EntityType::Stop, &["stop_id", "stop_name"], &[&["S1", "A"], &["S2", "B"]]),
            table(EntityType::Calendar, &calendar_header, calendar_rows),
        ]
        .into_iter()
        .collect();
        let new: FeedSnapshot = [
            table(
                EntityType::Stop,
                &["stop_id", "stop_name"],
                &[&["S2", "B-modified"], &["S3", "C"]],
            ),
            table(EntityType::Calendar, &calendar_header, calendar_rows),
        ]
        .into_iter()
        .collect();
        DiffPackage::from_feed_diff(&diff_feeds(&old, &new))
    }

    #[rstest]
    fn summary_counts_match_members(package: DiffPackage) {
        let summary = package.summary();
        assert!(summary.has_changes);
        assert_eq!(
            summary.files[&EntityType::Stop],
            FileSummary {
                status: DiffStatus::Modified,
                changed_records: 2,
                deleted_records: 1,
            }
        );
        let stops = package.table(EntityType::Stop).expect("stops listed");
        assert_eq!(stops.changed_records(), 2);
        assert_eq!(stops.deleted_records(), 1);
    }

    #[rstest]
    fn unchanged_tables_emit_no_members(package: DiffPackage) {
        let calendar = package.table(EntityType::Calendar).expect("calendar listed");
        assert_eq!(calendar.status, DiffStatus::Unchanged);
        assert!(calendar.changes.is_none());
        assert!(calendar.deletions.is_none());
        assert_eq!(package.summary().files[&EntityType::Calendar].changed_records, 0);
    }

    #[rstest]
    fn summary_serialises_in_snake_case(package: DiffPackage) {
        let json = serde_json::to_value(package.summary()).expect("serialisable");
        assert_eq!(json["has_changes"], serde_json::Value::Bool(true));
        assert_eq!(json["files"]["stops"]["status"], "modified");
        assert_eq!(json["files"]["calendar"]["status"], "unchanged");
    }

    #[rstest]
    fn reassembly_accepts_consistent_parts(package: DiffPackage) {
        let stops = package.table(EntityType::Stop).expect("stops listed");
        let changes = BTreeMap::from([(EntityType::Stop, stops.changes.clone().expect("rows"))]);
        let deletions =
            BTreeMap::from([(EntityType::Stop, stops.deletions.clone().expect("keys"))]);
        let rebuilt = DiffPackage::from_parts(package.summary().clone(), changes, deletions)
            .expect("consistent parts");
        assert_eq!(rebuilt, package);
    }

    #[rstest]
    fn missing_member_is_rejected(package: DiffPackage) {
        let stops = package.table(EntityType::Stop).expect("stops listed");
        let changes = BTreeMap::from([(EntityType::Stop, stops.changes.clone().expect("rows"))]);
        let err = DiffPackage::from_parts(package.summary().clone(), changes, BTreeMap::new())
            .expect_err("deletions absent");
        assert_eq!(
            err,
            PackageFormatError::MissingMember {
                member: "stops.deletions.csv".to_owned()
            }
        );
    }

    #[rstest]
    fn count_mismatch_is_rejected(package: DiffPackage) {
        let stops = package.table(EntityType::Stop).expect("stops listed");
        let mut change_set = stops.changes.clone().expect("rows");
        change_set.rows.pop();
        let changes = BTreeMap::from([(EntityType::Stop, change_set)]);
        let deletions =
            BTreeMap::from([(EntityType::Stop, stops.deletions.clone().expect("keys"))]);
        let err = DiffPackage::from_parts(package.summary().clone(), changes, deletions)
            .expect_err("one row short");
        assert!(matches!(
            err,
            PackageFormatError::CountMismatch { expected: 2, actual: 1, .. }
        ));
    }

    #[rstest]
    fn summary_keys_parse_as_entity_types() {
        let json = r#"{"has_changes": true, "files": {"stop_times": {"status": "new_file", "changed_records": 3}}}"#;
        let summary: PackageSummary = serde_json::from_str(json).expect("valid summary");
        assert_eq!(
            summary.files.get(&EntityType::StopTime),
            Some(&FileSummary {
                status: DiffStatus::NewFile,
                changed_records: 3,
                deleted_records: 0,
            })
        );
    }

    #[rstest]
    fn summary_with_unknown_entity_is_rejected() {
        let json = r#"{"has_changes": true, "files": {"fare_rules": {"status": "new_file"}}}"#;
        let err = serde_json::from_str::<PackageSummary>(json).expect_err("unknown stem");
        assert!(err.to_string().contains("fare_rules"), "{err}");
    }

    #[rstest]
    fn key_header_must_match_primary_key(package: DiffPackage) {
        let stops = package.table(EntityType::Stop).expect("stops listed");
        let changes = BTreeMap::from([(EntityType::Stop, stops.changes.clone().expect("rows"))]);
        let mut deletion_set = stops.deletions.clone().expect("keys");
        deletion_set.header = vec!["stop_code".to_owned()];
        let deletions = BTreeMap::from([(EntityType::Stop, deletion_set)]);
        let err = DiffPackage::from_parts(package.summary().clone(), changes, deletions)
            .expect_err("wrong key header");
        assert!(matches!(err, PackageFormatError::KeyHeaderMismatch { .. }));
    }

    #[rstest]
    #[case("stop_times.changes.csv", Some(("stop_times", MemberKind::Changes)))]
    #[case("agency.deletions.csv", Some(("agency", MemberKind::Deletions)))]
    #[case("summary.json", None)]
    fn member_names_split_into_stem_and_kind(
        #[case] name: &str,
        #[case] expected: Option<(&str, MemberKind)>,
    ) {
        assert_eq!(parse_member_name(name), expected);
    }
}

//! Core domain for GTFS snapshot diffing and dependency-ordered apply.
//!
//! The crate is free of filesystem and database I/O. Snapshots are loaded
//! from any reader, compared table by table, bundled into a [`DiffPackage`]
//! and applied to any [`TransitStore`] in dependency tiers, validating
//! foreign keys against a [`ReferenceCache`].

pub mod apply;
pub mod batch;
pub mod diff;
pub mod entity;
pub mod hash;
pub mod key;
pub mod package;
pub mod record;
pub mod reference;
pub mod snapshot;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use apply::{ApplyConfig, ApplyError, ApplyReport, EntityApplyReport, apply_package, load_and_apply};
pub use batch::{
    BatchOutcome, BatchReport, BatchSize, RecordOutcome, ZeroBatchSize, batch_delete, batch_upsert,
};
pub use diff::{
    DiffError, DiffFailure, DiffStats, DiffStatus, FeedDiff, FeedSide, KeyedRow, TableDiff,
    diff_feeds, diff_snapshots,
};
pub use entity::{EntityType, Tier, UnknownEntityError};
pub use hash::ContentHash;
pub use key::{KeyArityError, KeyPredicate, KeyTuple};
pub use package::{
    ChangeSet, DeletionSet, DiffPackage, FileSummary, MemberKind, PackageFormatError,
    PackageSummary, PackageTable, SUMMARY_MEMBER, changes_member, deletions_member,
    parse_member_name,
};
pub use record::{
    Column, ColumnIndex, ColumnKind, FieldValue, Record, RecordError, RowView, canonical_key, columns,
};
pub use reference::{
    ForeignKey, ReferenceCache, ReferenceCacheProvider, ReferenceSet, SkipReason, check_references,
};
pub use snapshot::{FeedSnapshot, Snapshot, SnapshotError, SnapshotRow};
pub use store::TransitStore;

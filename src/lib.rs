//! Facade crate for the GTFS delta engine.
//!
//! This crate re-exports the core diff and apply types and exposes the SQLite
//! store and archive adapters behind the `store-sqlite` feature.

#![forbid(unsafe_code)]

pub use gtfs_delta_core::{
    ApplyConfig, ApplyError, ApplyReport, BatchSize, DiffFailure, DiffPackage, DiffStatus,
    EntityApplyReport, EntityType, FeedDiff, FeedSnapshot, PackageFormatError, PackageSummary,
    ReferenceCache, ReferenceCacheProvider, SkipReason, Snapshot, TransitStore, apply_package,
    diff_feeds, diff_snapshots, load_and_apply,
};

#[cfg(feature = "store-sqlite")]
pub use gtfs_delta_data::{
    FeedArchiveError, PackageArchiveError, SqliteReferenceCacheProvider, SqliteStoreError,
    SqliteTransitStore, load_feed, load_package, save_package,
};

//! Storage and archive adapters for the GTFS delta engine.
//!
//! Responsibilities:
//! - Read GTFS feed archives into [`gtfs_delta_core::FeedSnapshot`]s.
//! - Write and read diff package archives.
//! - Provide a SQLite [`gtfs_delta_core::TransitStore`] and reference cache
//!   provider.
//!
//! Boundaries:
//! - Do not encode diff or apply rules (live in `gtfs-delta-core`).
//!
//! Invariants:
//! - No global mutable state.

pub mod feed;
pub mod package_archive;
pub mod sqlite;

pub use feed::{FeedArchiveError, load_feed, read_feed};
pub use package_archive::{
    PackageArchiveError, load_package, read_package, save_package, write_package,
};
pub use sqlite::{
    SCHEMA_VERSION, SchemaError, SqliteReferenceCacheProvider, SqliteStoreError,
    SqliteTransitStore, initialise_schema,
};

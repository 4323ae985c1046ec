//! SQLite backend for the transit store.
//!
//! - [`schema`] creates one table per entity type and records the schema
//!   version.
//! - [`store`] implements [`gtfs_delta_core::TransitStore`] and reads the
//!   reference cache back out of the same tables.
#![forbid(unsafe_code)]

mod schema;
mod store;

pub use schema::{SCHEMA_VERSION, SchemaError, initialise_schema};
pub use store::{SqliteReferenceCacheProvider, SqliteStoreError, SqliteTransitStore};

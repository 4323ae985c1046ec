//! Write interface of the transit schedule store.
//!
//! The apply engine only needs two operations: an idempotent upsert keyed by
//! primary key, and a delete that matches every key column of one row.
//! Backends own their transaction semantics; the engine never assumes a
//! multi-call transaction.

use crate::{entity::EntityType, key::KeyPredicate, record::Record};

/// A store that can receive typed GTFS records.
pub trait TransitStore {
    /// Backend error for a failed call.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Insert or replace `records` of `entity` by primary key.
    ///
    /// Implementations should treat a call as one unit: when it fails, the
    /// batch executor retries every record individually, so partial writes
    /// are tolerated but redundant.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the call fails.
    fn upsert(&mut self, entity: EntityType, records: &[Record]) -> Result<usize, Self::Error>;

    /// Delete the row `predicate` selects. Deleting an absent row succeeds.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the call fails.
    fn delete(&mut self, predicate: &KeyPredicate) -> Result<(), Self::Error>;
}

impl<S: TransitStore + ?Sized> TransitStore for &mut S {
    type Error = S::Error;

    fn upsert(&mut self, entity: EntityType, records: &[Record]) -> Result<usize, Self::Error> {
        (**self).upsert(entity, records)
    }

    fn delete(&mut self, predicate: &KeyPredicate) -> Result<(), Self::Error> {
        (**self).delete(predicate)
    }
}

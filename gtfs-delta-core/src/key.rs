//! Primary-key tuples and storage delete predicates.

use std::fmt;

use thiserror::Error;

use crate::entity::EntityType;

/// Ordered values of an entity type's primary-key columns.
///
/// Values are kept as the raw strings read from the feed so that keys from
/// two snapshots compare exactly as the files spell them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyTuple(Vec<String>);

impl KeyTuple {
    /// Wrap already-ordered key values.
    #[must_use]
    pub const fn new(values: Vec<String>) -> Self {
        Self(values)
    }

    /// Borrow the key values in primary-key column order.
    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.0
    }

    /// Number of key columns represented.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.0.len()
    }

    /// Consume the tuple and return its values.
    #[must_use]
    pub fn into_values(self) -> Vec<String> {
        self.0
    }
}

impl<S: Into<String>> FromIterator<S> for KeyTuple {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for KeyTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (idx, value) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            f.write_str(value)?;
        }
        f.write_str(")")
    }
}

/// Raised when a key tuple does not cover the entity's primary key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{entity} key {key} has {actual} values but the primary key has {expected} columns")]
pub struct KeyArityError {
    /// Entity whose key was being built.
    pub entity: EntityType,
    /// Offending key.
    pub key: KeyTuple,
    /// Number of primary-key columns.
    pub expected: usize,
    /// Number of supplied values.
    pub actual: usize,
}

/// Equality match on every primary-key column of one row.
///
/// Deletions are always issued one predicate at a time; composite keys need
/// every column to match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPredicate {
    entity: EntityType,
    key: KeyTuple,
}

impl KeyPredicate {
    /// Build a predicate for `key`, checking it names every key column.
    ///
    /// # Errors
    ///
    /// Returns [`KeyArityError`] when the tuple length differs from the
    /// entity's primary-key column count.
    pub fn new(entity: EntityType, key: KeyTuple) -> Result<Self, KeyArityError> {
        let expected = entity.primary_key().len();
        let actual = key.arity();
        if expected != actual {
            return Err(KeyArityError {
                entity,
                key,
                expected,
                actual,
            });
        }
        Ok(Self { entity, key })
    }

    /// Entity the predicate targets.
    #[must_use]
    pub const fn entity(&self) -> EntityType {
        self.entity
    }

    /// Key being matched.
    #[must_use]
    pub const fn key(&self) -> &KeyTuple {
        &self.key
    }

    /// `(column, value)` pairs in primary-key order.
    pub fn columns(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.entity
            .primary_key()
            .iter()
            .copied()
            .zip(self.key.values().iter().map(String::as_str))
    }
}

impl fmt::Display for KeyPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (column, value)) in self.columns().enumerate() {
            if idx > 0 {
                f.write_str(" AND ")?;
            }
            write!(f, "{column} = '{value}'")?;
        }
        Ok(())
    }
}

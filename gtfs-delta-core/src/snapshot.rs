//! Keyed, hashed snapshots of GTFS tables.
//!
//! A [`Snapshot`] maps every primary-key tuple of one table to its raw row and
//! content hash. Key columns are located by header name, so two snapshots of
//! the same table may order their columns differently. Loading never touches
//! a store.

use std::{
    collections::{BTreeMap, btree_map},
    io::Read,
};

use thiserror::Error;

use crate::{
    entity::EntityType,
    hash::ContentHash,
    key::KeyTuple,
    record::{ColumnIndex, Record, RecordError},
};

const BOM: char = '\u{feff}';

/// Errors raised while loading a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The header does not name one of the entity's primary-key columns.
    #[error("{entity} header lacks primary-key column '{column}'")]
    MissingKeyColumn {
        /// Entity being loaded.
        entity: EntityType,
        /// Absent key column.
        column: &'static str,
    },
    /// A non-blank row ends before one of its key columns.
    #[error("{entity} row {line} has {len} values and ends before its primary key")]
    ShortRow {
        /// Entity being loaded.
        entity: EntityType,
        /// One-based data row number.
        line: u64,
        /// Number of values in the row.
        len: usize,
    },
    /// The source has no header row.
    #[error("{entity} source is empty")]
    MissingHeader {
        /// Entity being loaded.
        entity: EntityType,
    },
    /// The CSV reader failed.
    #[error("failed to read {entity} CSV")]
    Csv {
        /// Entity being loaded.
        entity: EntityType,
        /// Error from the CSV reader.
        #[source]
        source: csv::Error,
    },
}

/// One raw row and its digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRow {
    values: Vec<String>,
    hash: ContentHash,
}

impl SnapshotRow {
    /// Hash `values` and keep them.
    #[must_use]
    pub fn new(values: Vec<String>) -> Self {
        let hash = ContentHash::of_row(&values);
        Self { values, hash }
    }

    /// Raw values in header order.
    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Content digest of the raw values.
    #[must_use]
    pub const fn hash(&self) -> ContentHash {
        self.hash
    }
}

/// Every row of one table keyed by primary-key tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    entity: EntityType,
    header: Vec<String>,
    key_positions: Vec<usize>,
    rows: BTreeMap<KeyTuple, SnapshotRow>,
}

impl Snapshot {
    /// Start an empty snapshot with `header`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::MissingKeyColumn`] when a primary-key column
    /// is not named in `header`.
    pub fn new(entity: EntityType, mut header: Vec<String>) -> Result<Self, SnapshotError> {
        if let Some(first) = header.first_mut()
            && first.starts_with(BOM)
        {
            *first = first.trim_start_matches(BOM).to_owned();
        }
        let key_positions = entity
            .primary_key()
            .iter()
            .map(|column| {
                header
                    .iter()
                    .position(|name| name == column)
                    .ok_or(SnapshotError::MissingKeyColumn { entity, column })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            entity,
            header,
            key_positions,
            rows: BTreeMap::new(),
        })
    }

    /// Build a snapshot from in-memory rows.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] when the header lacks a key column or a row
    /// is too short to carry its key.
    pub fn from_rows<I>(
        entity: EntityType,
        header: Vec<String>,
        rows: I,
    ) -> Result<Self, SnapshotError>
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        let mut snapshot = Self::new(entity, header)?;
        for (line, values) in (1_u64..).zip(rows) {
            snapshot.insert_row(line, values)?;
        }
        Ok(snapshot)
    }

    /// Parse CSV text for `entity` from `reader`.
    ///
    /// Rows whose every cell is blank are skipped. When a key repeats, the
    /// later row replaces the earlier one.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] for unreadable CSV, a missing header, a
    /// missing key column or a row too short to carry its key.
    pub fn from_reader<R: Read>(entity: EntityType, reader: R) -> Result<Self, SnapshotError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut records = csv_reader.records();
        let header = records
            .next()
            .ok_or(SnapshotError::MissingHeader { entity })?
            .map_err(|source| SnapshotError::Csv { entity, source })?;
        let mut snapshot = Self::new(entity, header.iter().map(str::to_owned).collect())?;
        for (line, record) in (1_u64..).zip(records) {
            let record = record.map_err(|source| SnapshotError::Csv { entity, source })?;
            snapshot.insert_row(line, record.iter().map(str::to_owned).collect())?;
        }
        Ok(snapshot)
    }

    /// Add one row, replacing any earlier row with the same key.
    ///
    /// Returns `false` when the row is blank and was skipped.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::ShortRow`] when the row ends before a key
    /// column.
    pub fn insert_row(&mut self, line: u64, values: Vec<String>) -> Result<bool, SnapshotError> {
        if values.iter().all(|value| value.trim().is_empty()) {
            return Ok(false);
        }
        let key = self
            .key_positions
            .iter()
            .map(|position| values.get(*position).cloned())
            .collect::<Option<Vec<_>>>()
            .ok_or(SnapshotError::ShortRow {
                entity: self.entity,
                line,
                len: values.len(),
            })?;
        self.rows.insert(KeyTuple::new(key), SnapshotRow::new(values));
        Ok(true)
    }

    /// Entity type of the table.
    #[must_use]
    pub const fn entity(&self) -> EntityType {
        self.entity
    }

    /// Column names in file order.
    #[must_use]
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Position of `column` in the header.
    #[must_use]
    pub fn column_position(&self, column: &str) -> Option<usize> {
        self.header.iter().position(|name| name == column)
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row stored under `key`.
    #[must_use]
    pub fn get(&self, key: &KeyTuple) -> Option<&SnapshotRow> {
        self.rows.get(key)
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &KeyTuple) -> bool {
        self.rows.contains_key(key)
    }

    /// Rows in key order.
    pub fn rows(&self) -> btree_map::Iter<'_, KeyTuple, SnapshotRow> {
        self.rows.iter()
    }

    /// Keys in order.
    pub fn keys(&self) -> btree_map::Keys<'_, KeyTuple, SnapshotRow> {
        self.rows.keys()
    }

    /// Parse every row into a typed record, in key order.
    pub fn records(&self) -> impl Iterator<Item = Result<Record, RecordError>> + '_ {
        let index = ColumnIndex::new(&self.header);
        self.rows
            .values()
            .map(move |row| Record::parse(self.entity, &index.row(self.entity, row.values())))
    }
}

/// All tables of one feed, plus the members that failed to load.
#[derive(Debug, Default)]
pub struct FeedSnapshot {
    tables: BTreeMap<EntityType, Snapshot>,
    unreadable: BTreeMap<EntityType, SnapshotError>,
}

impl FeedSnapshot {
    /// An empty feed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a table.
    pub fn insert(&mut self, snapshot: Snapshot) {
        self.unreadable.remove(&snapshot.entity());
        self.tables.insert(snapshot.entity(), snapshot);
    }

    /// Record that `entity`'s member could not be loaded.
    pub fn mark_unreadable(&mut self, entity: EntityType, error: SnapshotError) {
        self.tables.remove(&entity);
        self.unreadable.insert(entity, error);
    }

    /// Table for `entity`, if the feed carries it.
    #[must_use]
    pub fn get(&self, entity: EntityType) -> Option<&Snapshot> {
        self.tables.get(&entity)
    }

    /// Load error for `entity`, if its member was unreadable.
    #[must_use]
    pub fn unreadable(&self, entity: EntityType) -> Option<&SnapshotError> {
        self.unreadable.get(&entity)
    }

    /// Whether any member failed to load.
    #[must_use]
    pub fn has_unreadable(&self) -> bool {
        !self.unreadable.is_empty()
    }

    /// Whether `entity` is present or was attempted.
    #[must_use]
    pub fn mentions(&self, entity: EntityType) -> bool {
        self.tables.contains_key(&entity) || self.unreadable.contains_key(&entity)
    }

    /// Tables in apply order.
    pub fn tables(&self) -> impl Iterator<Item = &Snapshot> {
        self.tables.values()
    }

    /// Total rows across every table.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.tables.values().map(Snapshot::len).sum()
    }
}

impl FromIterator<Snapshot> for FeedSnapshot {
    fn from_iter<I: IntoIterator<Item = Snapshot>>(iter: I) -> Self {
        let mut feed = Self::new();
        for snapshot in iter {
            feed.insert(snapshot);
        }
        feed
    }
}

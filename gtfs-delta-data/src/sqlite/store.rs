#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use gtfs_delta_core::{
    EntityType, FieldValue, KeyPredicate, Record, ReferenceCache, ReferenceCacheProvider,
    ReferenceSet, TransitStore, columns,
};
use log::debug;
use rusqlite::{Connection, Error as SqliteError, params_from_iter, types::Value};
use std::num::TryFromIntError;
use thiserror::Error;

use super::schema::{SchemaError, initialise_schema};

/// Errors raised by the SQLite transit store.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Failed to create the parent directory of the database file.
    #[error("failed to create parent directory for {path}")]
    CreateDirectory {
        /// Database path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Opening the database failed.
    #[error("failed to open SQLite database at {path}")]
    Open {
        /// Database path.
        path: Utf8PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// The schema could not be initialised.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// A statement against one entity table failed.
    #[error("failed to {operation} {entity}")]
    Sqlite {
        /// Operation being performed.
        operation: &'static str,
        /// Table's entity type.
        entity: EntityType,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// A row count does not fit in `usize`.
    #[error("{entity} reported an invalid row count of {count}")]
    InvalidCount {
        /// Table's entity type.
        entity: EntityType,
        /// Value returned by SQLite.
        count: i64,
        /// Conversion failure.
        #[source]
        source: TryFromIntError,
    },
}

/// [`TransitStore`] backed by one SQLite database.
///
/// Every upsert call runs in its own transaction, so a failed call leaves
/// no partial writes behind.
#[derive(Debug)]
pub struct SqliteTransitStore {
    connection: Connection,
}

impl SqliteTransitStore {
    /// Open or create the database at `path` and initialise its schema.
    ///
    /// Parent directories are created when missing.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the file cannot be opened or the
    /// schema version does not match.
    pub fn open(path: &Utf8Path) -> Result<Self, SqliteStoreError> {
        gtfs_delta_fs::ensure_parent_dir(path).map_err(|source| {
            SqliteStoreError::CreateDirectory {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let connection =
            Connection::open(path.as_std_path()).map_err(|source| SqliteStoreError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_connection(connection)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when SQLite cannot allocate the database.
    pub fn open_in_memory() -> Result<Self, SqliteStoreError> {
        let connection =
            Connection::open_in_memory().map_err(|source| SqliteStoreError::Open {
                path: Utf8PathBuf::from(":memory:"),
                source,
            })?;
        Self::from_connection(connection)
    }

    /// Wrap an existing connection, initialising the schema.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Schema`] when the schema cannot be
    /// created or its version does not match.
    pub fn from_connection(mut connection: Connection) -> Result<Self, SqliteStoreError> {
        initialise_schema(&mut connection)?;
        Ok(Self { connection })
    }

    /// The underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Number of rows held for `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Sqlite`] when the count query fails and
    /// [`SqliteStoreError::InvalidCount`] when SQLite reports a negative count.
    pub fn count(&self, entity: EntityType) -> Result<usize, SqliteStoreError> {
        let count: i64 = self
            .connection
            .query_row(&format!("SELECT COUNT(*) FROM {}", entity.table()), [], |row| {
                row.get(0)
            })
            .map_err(|source| SqliteStoreError::Sqlite {
                operation: "count",
                entity,
                source,
            })?;
        row_count(entity, count)
    }

    /// Read the parent key sets currently held by the store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Sqlite`] when a key query fails.
    pub fn reference_cache(&self) -> Result<ReferenceCache, SqliteStoreError> {
        let mut cache = ReferenceCache::new();
        for set in ReferenceSet::ALL {
            let (entity, column) = set.source();
            let read_error = |source| SqliteStoreError::Sqlite {
                operation: "read reference keys from",
                entity,
                source,
            };
            let mut statement = self
                .connection
                .prepare(&format!("SELECT DISTINCT {column} FROM {}", entity.table()))
                .map_err(read_error)?;
            let keys = statement
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(read_error)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(read_error)?;
            debug!("Reference cache holds {} {entity} keys", keys.len());
            cache.extend(set, keys);
        }
        Ok(cache)
    }
}

impl TransitStore for SqliteTransitStore {
    type Error = SqliteStoreError;

    fn upsert(&mut self, entity: EntityType, records: &[Record]) -> Result<usize, Self::Error> {
        if records.is_empty() {
            return Ok(0);
        }
        let write_error = |operation| {
            move |source| SqliteStoreError::Sqlite {
                operation,
                entity,
                source,
            }
        };
        let transaction = self
            .connection
            .transaction()
            .map_err(write_error("begin upsert into"))?;
        {
            let mut statement = transaction
                .prepare_cached(&upsert_sql(entity))
                .map_err(write_error("prepare upsert into"))?;
            for record in records {
                let values: Vec<Value> = record.values().into_iter().map(sql_value).collect();
                statement
                    .execute(params_from_iter(values))
                    .map_err(write_error("upsert into"))?;
            }
        }
        transaction
            .commit()
            .map_err(write_error("commit upsert into"))?;
        Ok(records.len())
    }

    fn delete(&mut self, predicate: &KeyPredicate) -> Result<(), Self::Error> {
        let entity = predicate.entity();
        let delete_error = |source| SqliteStoreError::Sqlite {
            operation: "delete from",
            entity,
            source,
        };
        let mut statement = self
            .connection
            .prepare_cached(&delete_sql(entity))
            .map_err(delete_error)?;
        statement
            .execute(params_from_iter(predicate.columns().map(|(_, value)| value)))
            .map(|_| ())
            .map_err(delete_error)
    }
}

/// Loads the reference cache from a database file at apply time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteReferenceCacheProvider {
    path: Utf8PathBuf,
}

impl SqliteReferenceCacheProvider {
    /// Provider reading the database at `path`.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ReferenceCacheProvider for SqliteReferenceCacheProvider {
    type Error = SqliteStoreError;

    fn load(&self) -> Result<ReferenceCache, Self::Error> {
        SqliteTransitStore::open(&self.path)?.reference_cache()
    }
}

fn sql_value(value: FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Text(text) => Value::Text(text),
        FieldValue::Integer(number) => Value::Integer(number),
        FieldValue::Real(number) => Value::Real(number),
        FieldValue::Bool(flag) => Value::Integer(i64::from(flag)),
    }
}

pub(crate) fn row_count(entity: EntityType, count: i64) -> Result<usize, SqliteStoreError> {
    usize::try_from(count).map_err(|source| SqliteStoreError::InvalidCount {
        entity,
        count,
        source,
    })
}

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn upsert_sql(entity: EntityType) -> String {
    let names: Vec<&str> = columns(entity).iter().map(|column| column.name).collect();
    let key = entity.primary_key();
    let updates: Vec<String> = names
        .iter()
        .filter(|name| !key.contains(*name))
        .map(|name| format!("{name} = excluded.{name}"))
        .collect();
    let conflict = if updates.is_empty() {
        "DO NOTHING".to_owned()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };
    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) {conflict}",
        entity.table(),
        names.join(", "),
        placeholders(names.len()),
        key.join(", "),
    )
}

pub(crate) fn delete_sql(entity: EntityType) -> String {
    let conditions: Vec<String> = entity
        .primary_key()
        .iter()
        .zip(1..)
        .map(|(column, index)| format!("{column} = ?{index}"))
        .collect();
    format!(
        "DELETE FROM {} WHERE {}",
        entity.table(),
        conditions.join(" AND ")
    )
}

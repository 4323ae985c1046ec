#![forbid(unsafe_code)]

use gtfs_delta_core::{ColumnKind, EntityType, columns};
use rusqlite::{Connection, Error as SqliteError, OptionalExtension, Transaction};
use thiserror::Error;

/// Version recorded in `gtfs_delta_schema_version`.
pub const SCHEMA_VERSION: i64 = 1;

/// Initialise the transit tables inside an existing SQLite database.
///
/// One table is created per entity type, keyed by its primary key. The
/// schema version is recorded on first use; an existing database must
/// already match [`SCHEMA_VERSION`].
///
/// No foreign-key constraints are declared. Referential checks happen
/// before writes, against the reference cache.
///
/// # Examples
/// ```
/// use rusqlite::Connection;
/// use gtfs_delta_data::sqlite::initialise_schema;
///
/// let mut conn = Connection::open_in_memory().expect("create in-memory database");
/// initialise_schema(&mut conn).expect("create transit schema");
///
/// let tables: i64 = conn
///     .query_row(
///         "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'stop_times'",
///         [],
///         |row| row.get(0),
///     )
///     .expect("query tables");
/// assert_eq!(tables, 1);
/// ```
pub fn initialise_schema(connection: &mut Connection) -> Result<(), SchemaError> {
    let transaction = connection
        .transaction()
        .map_err(|source| SchemaError::Migration {
            step: "begin schema transaction",
            source,
        })?;

    for entity in EntityType::ALL {
        run_migration_step(&transaction, entity.table(), &create_table_sql(entity))?;
    }
    ensure_schema_version(&transaction)?;

    transaction
        .commit()
        .map_err(|source| SchemaError::Migration {
            step: "commit schema transaction",
            source,
        })
}

/// `CREATE TABLE` statement for `entity`.
pub(crate) fn create_table_sql(entity: EntityType) -> String {
    let mut definitions: Vec<String> = columns(entity)
        .iter()
        .map(|column| {
            let affinity = match column.kind {
                ColumnKind::Text => "TEXT",
                ColumnKind::Integer | ColumnKind::Bool => "INTEGER",
                ColumnKind::Real => "REAL",
            };
            let null = if column.nullable { "" } else { " NOT NULL" };
            format!("{} {affinity}{null}", column.name)
        })
        .collect();
    definitions.push(format!("PRIMARY KEY ({})", entity.primary_key().join(", ")));
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n) WITHOUT ROWID",
        entity.table(),
        definitions.join(",\n    ")
    )
}

fn ensure_schema_version(transaction: &Transaction<'_>) -> Result<(), SchemaError> {
    run_migration_step(
        transaction,
        "create schema version table",
        "CREATE TABLE IF NOT EXISTS gtfs_delta_schema_version (
            version INTEGER PRIMARY KEY CHECK (version > 0),
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        ) WITHOUT ROWID",
    )?;

    let existing_version: Option<i64> = transaction
        .query_row(
            "SELECT version FROM gtfs_delta_schema_version LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|source| SchemaError::Migration {
            step: "read schema version",
            source,
        })?;

    match existing_version {
        Some(version) if version == SCHEMA_VERSION => Ok(()),
        Some(found) => Err(SchemaError::VersionMismatch {
            expected: SCHEMA_VERSION,
            found,
        }),
        None => transaction
            .execute(
                "INSERT INTO gtfs_delta_schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )
            .map(|_| ())
            .map_err(|source| SchemaError::Migration {
                step: "record schema version",
                source,
            }),
    }
}

fn run_migration_step(
    transaction: &Transaction<'_>,
    step: &'static str,
    sql: &str,
) -> Result<(), SchemaError> {
    transaction
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| SchemaError::Migration { step, source })
}

/// Errors raised when initialising the transit schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A DDL statement failed.
    #[error("failed to execute migration step '{step}'")]
    Migration {
        /// Step being executed, usually the table name.
        step: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// The database was created by a different schema version.
    #[error(
        "expected transit schema version {expected} but found {found}; apply migrations before retrying"
    )]
    VersionMismatch {
        /// Version this build understands.
        expected: i64,
        /// Version recorded in the database.
        found: i64,
    },
}

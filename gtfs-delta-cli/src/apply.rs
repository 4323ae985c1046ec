//! Apply command implementation for the GTFS delta CLI.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use gtfs_delta_core::{ApplyConfig, ApplyReport, DiffPackage, load_and_apply};
use gtfs_delta_data::{SqliteReferenceCacheProvider, SqliteTransitStore};
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::{
    ARG_DATABASE, ARG_DELETE_BATCH_SIZE, ARG_PACKAGE, ARG_UPSERT_BATCH_SIZE, CliError,
    ENV_APPLY_DATABASE, ENV_APPLY_PACKAGE, batch_config, report::write_apply_report,
    require_existing,
};

/// CLI arguments for the `apply` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Apply a diff package to a SQLite transit database. Parent \
                 tables are written before their dependants, and each table's \
                 deletions run straight after its upserts. Rows referring to \
                 parents the database does not hold are skipped and reported.",
    about = "Apply a diff package to a transit database"
)]
#[ortho_config(prefix = "GTFS_DELTA")]
pub(crate) struct ApplyArgs {
    /// Path to the diff package archive.
    #[arg(long = ARG_PACKAGE, value_name = "path")]
    #[serde(default)]
    pub(crate) package: Option<Utf8PathBuf>,
    /// Path to the SQLite transit database (created when absent).
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Rows written per upsert batch.
    #[arg(long = ARG_UPSERT_BATCH_SIZE, value_name = "rows")]
    #[serde(default)]
    pub(crate) upsert_batch_size: Option<usize>,
    /// Keys removed per delete batch.
    #[arg(long = ARG_DELETE_BATCH_SIZE, value_name = "keys")]
    #[serde(default)]
    pub(crate) delete_batch_size: Option<usize>,
}

impl ApplyArgs {
    pub(crate) fn into_config(self) -> Result<ApplyCommandConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ApplyCommandConfig::try_from(merged)
    }
}

/// Resolved `apply` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ApplyCommandConfig {
    pub(crate) package: Utf8PathBuf,
    pub(crate) database: Utf8PathBuf,
    pub(crate) batches: ApplyConfig,
}

impl TryFrom<ApplyArgs> for ApplyCommandConfig {
    type Error = CliError;

    fn try_from(args: ApplyArgs) -> Result<Self, Self::Error> {
        let package = args.package.ok_or(CliError::MissingArgument {
            field: ARG_PACKAGE,
            env: ENV_APPLY_PACKAGE,
        })?;
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_APPLY_DATABASE,
        })?;
        let batches = batch_config(args.upsert_batch_size, args.delete_batch_size)?;
        Ok(Self {
            package,
            database,
            batches,
        })
    }
}

pub(crate) fn run_apply(args: ApplyArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    run_apply_with(&config, writer).map(|_| ())
}

/// Read the configured package and apply it to the database.
pub(crate) fn run_apply_with(
    config: &ApplyCommandConfig,
    writer: &mut dyn Write,
) -> Result<ApplyReport, CliError> {
    require_existing(&config.package, ARG_PACKAGE)?;
    let package = gtfs_delta_data::load_package(&config.package).map_err(|source| {
        CliError::ReadPackage {
            path: config.package.clone(),
            source,
        }
    })?;
    let report = apply_to_database(&package, &config.database, config.batches)?;
    write_apply_report(writer, &report)?;
    Ok(report)
}

/// Apply `package` to the database at `database`, loading the reference
/// cache from the same file.
pub(crate) fn apply_to_database(
    package: &DiffPackage,
    database: &Utf8Path,
    batches: ApplyConfig,
) -> Result<ApplyReport, CliError> {
    let mut store = open_store(database)?;
    info!("Applying diff package to {database}");
    let provider = SqliteReferenceCacheProvider::new(database.to_path_buf());
    Ok(load_and_apply(&mut store, package, &provider, batches)?)
}

pub(crate) fn open_store(database: &Utf8Path) -> Result<SqliteTransitStore, CliError> {
    SqliteTransitStore::open(database).map_err(|source| CliError::OpenStore {
        path: database.to_path_buf(),
        source,
    })
}

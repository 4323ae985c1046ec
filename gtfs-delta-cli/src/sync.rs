//! Sync command: bring a transit database up to date with the latest feed.
//!
//! The cached snapshot is the feed the database was last synced from. When
//! it is absent the database is reset from the latest feed; otherwise only
//! the differences are applied. The cached snapshot is replaced only after
//! the database has been brought up to date.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use gtfs_delta_core::{ApplyConfig, diff_feeds};
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::{
    ARG_CACHED, ARG_DATABASE, ARG_DELETE_BATCH_SIZE, ARG_LATEST, ARG_UPSERT_BATCH_SIZE,
    ARG_WORK_DIR, CliError, DEFAULT_PACKAGE_NAME, ENV_SYNC_CACHED, ENV_SYNC_DATABASE,
    ENV_SYNC_LATEST,
    apply::apply_to_database,
    batch_config,
    diff::{ensure_complete, load_feed_at, write_diff_package},
    report::{write_apply_report, write_diff_summary},
    require_existing,
    reset::reset_database,
};

/// CLI arguments for the `sync` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Synchronise a SQLite transit database with the latest GTFS \
                 feed. Without a cached snapshot the whole feed is loaded; \
                 otherwise the cached and latest feeds are diffed and the \
                 changes applied. On success the cached snapshot is replaced \
                 by the latest feed.",
    about = "Bring a transit database up to date with the latest feed"
)]
#[ortho_config(prefix = "GTFS_DELTA")]
pub(crate) struct SyncArgs {
    /// Path to the freshly obtained GTFS feed archive.
    #[arg(long = ARG_LATEST, value_name = "path")]
    #[serde(default)]
    pub(crate) latest: Option<Utf8PathBuf>,
    /// Path to the feed archive the database was last synced from.
    #[arg(long = ARG_CACHED, value_name = "path")]
    #[serde(default)]
    pub(crate) cached: Option<Utf8PathBuf>,
    /// Path to the SQLite transit database (created when absent).
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Directory for the intermediate diff package (defaults to the cached
    /// snapshot's directory).
    #[arg(long = ARG_WORK_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) work_dir: Option<Utf8PathBuf>,
    /// Rows written per upsert batch.
    #[arg(long = ARG_UPSERT_BATCH_SIZE, value_name = "rows")]
    #[serde(default)]
    pub(crate) upsert_batch_size: Option<usize>,
    /// Keys removed per delete batch.
    #[arg(long = ARG_DELETE_BATCH_SIZE, value_name = "keys")]
    #[serde(default)]
    pub(crate) delete_batch_size: Option<usize>,
}

impl SyncArgs {
    pub(crate) fn into_config(self) -> Result<SyncConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        SyncConfig::try_from(merged)
    }
}

/// Resolved `sync` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SyncConfig {
    pub(crate) latest: Utf8PathBuf,
    pub(crate) cached: Utf8PathBuf,
    pub(crate) database: Utf8PathBuf,
    pub(crate) work_dir: Utf8PathBuf,
    pub(crate) batches: ApplyConfig,
}

impl SyncConfig {
    pub(crate) fn package_path(&self) -> Utf8PathBuf {
        self.work_dir.join(DEFAULT_PACKAGE_NAME)
    }
}

impl TryFrom<SyncArgs> for SyncConfig {
    type Error = CliError;

    fn try_from(args: SyncArgs) -> Result<Self, Self::Error> {
        let latest = args.latest.ok_or(CliError::MissingArgument {
            field: ARG_LATEST,
            env: ENV_SYNC_LATEST,
        })?;
        let cached = args.cached.ok_or(CliError::MissingArgument {
            field: ARG_CACHED,
            env: ENV_SYNC_CACHED,
        })?;
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_SYNC_DATABASE,
        })?;
        let work_dir = args.work_dir.unwrap_or_else(|| {
            cached
                .parent()
                .filter(|parent| !parent.as_str().is_empty())
                .map_or_else(|| Utf8PathBuf::from("."), Utf8Path::to_path_buf)
        });
        let batches = batch_config(args.upsert_batch_size, args.delete_batch_size)?;
        Ok(Self {
            latest,
            cached,
            database,
            work_dir,
            batches,
        })
    }
}

/// What a sync run did to the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SyncOutcome {
    /// No cached snapshot existed; the whole feed was loaded.
    Reset,
    /// Differences were applied.
    Applied,
    /// The feeds were identical.
    Unchanged,
}

pub(crate) fn run_sync(args: SyncArgs, writer: &mut dyn Write) -> Result<SyncOutcome, CliError> {
    let config = args.into_config()?;
    run_sync_with(&config, writer)
}

pub(crate) fn run_sync_with(
    config: &SyncConfig,
    writer: &mut dyn Write,
) -> Result<SyncOutcome, CliError> {
    require_existing(&config.latest, ARG_LATEST)?;
    let has_cache = gtfs_delta_fs::is_regular_file(&config.cached).map_err(|source| {
        CliError::InspectSourcePath {
            field: ARG_CACHED,
            path: config.cached.clone(),
            source,
        }
    })?;

    let outcome = if has_cache {
        apply_differences(config, writer)?
    } else {
        info!("No cached snapshot at {}; performing a full reset", config.cached);
        reset_database(&config.latest, &config.database, config.batches, writer)?;
        SyncOutcome::Reset
    };

    gtfs_delta_fs::replace_atomically(&config.latest, &config.cached).map_err(|source| {
        CliError::ReplaceCachedSnapshot {
            path: config.cached.clone(),
            source,
        }
    })?;
    info!("Cached snapshot {} updated", config.cached);
    Ok(outcome)
}

fn apply_differences(
    config: &SyncConfig,
    writer: &mut dyn Write,
) -> Result<SyncOutcome, CliError> {
    let cached = load_feed_at(&config.cached)?;
    let latest = load_feed_at(&config.latest)?;
    let diff = diff_feeds(&cached, &latest);
    let package = write_diff_package(&diff, &config.package_path())?;
    write_diff_summary(writer, &package, &diff.failures)?;
    ensure_complete(&diff)?;

    if !package.has_changes() {
        info!("No changes found between {} and {}", config.cached, config.latest);
        return Ok(SyncOutcome::Unchanged);
    }
    let report = apply_to_database(&package, &config.database, config.batches)?;
    write_apply_report(writer, &report)?;
    Ok(SyncOutcome::Applied)
}

//! Reset command: load a whole feed into the transit database.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use gtfs_delta_core::{
    ApplyConfig, ApplyReport, DiffPackage, FeedSnapshot, ReferenceCache, apply_package,
    diff_feeds,
};
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::{
    ARG_DATABASE, ARG_DELETE_BATCH_SIZE, ARG_FEED, ARG_UPSERT_BATCH_SIZE, CliError,
    ENV_RESET_DATABASE, ENV_RESET_FEED,
    apply::open_store,
    batch_config,
    diff::{ensure_complete, load_feed_at},
    report::write_apply_report,
    require_existing,
};

/// CLI arguments for the `reset` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Load every table of a GTFS feed into a SQLite transit \
                 database by diffing the feed against an empty one. \
                 References are checked against the feed itself. Existing \
                 rows with the same keys are replaced; other rows are kept.",
    about = "Load a whole GTFS feed into a transit database"
)]
#[ortho_config(prefix = "GTFS_DELTA")]
pub(crate) struct ResetArgs {
    /// Path to the GTFS feed archive.
    #[arg(long = ARG_FEED, value_name = "path")]
    #[serde(default)]
    pub(crate) feed: Option<Utf8PathBuf>,
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

impl ResetArgs {
    pub(crate) fn into_config(self) -> Result<ResetConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ResetConfig::try_from(merged)
    }
}

/// Resolved `reset` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResetConfig {
    pub(crate) feed: Utf8PathBuf,
    pub(crate) database: Utf8PathBuf,
    pub(crate) batches: ApplyConfig,
}

impl TryFrom<ResetArgs> for ResetConfig {
    type Error = CliError;

    fn try_from(args: ResetArgs) -> Result<Self, Self::Error> {
        let feed = args.feed.ok_or(CliError::MissingArgument {
            field: ARG_FEED,
            env: ENV_RESET_FEED,
        })?;
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_RESET_DATABASE,
        })?;
        let batches = batch_config(args.upsert_batch_size, args.delete_batch_size)?;
        Ok(Self {
            feed,
            database,
            batches,
        })
    }
}

pub(crate) fn run_reset(args: ResetArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    require_existing(&config.feed, ARG_FEED)?;
    reset_database(&config.feed, &config.database, config.batches, writer).map(|_| ())
}

/// Load every readable table of `feed` into `database`.
///
/// The report is written before completeness is checked, so tables that did
/// load are reported even when the command then fails.
pub(crate) fn reset_database(
    feed: &Utf8Path,
    database: &Utf8Path,
    batches: ApplyConfig,
    writer: &mut dyn Write,
) -> Result<ApplyReport, CliError> {
    let snapshot = load_feed_at(feed)?;
    let diff = diff_feeds(&FeedSnapshot::new(), &snapshot);
    let package = DiffPackage::from_feed_diff(&diff);
    let cache = ReferenceCache::from_feed(&snapshot);
    let mut store = open_store(database)?;
    info!("Loading {feed} into {database}");
    let report = apply_package(&mut store, &package, &cache, batches)?;
    write_apply_report(writer, &report)?;
    ensure_complete(&diff)?;
    Ok(report)
}

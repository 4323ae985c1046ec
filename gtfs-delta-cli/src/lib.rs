//! Command-line interface for GTFS snapshot diffing and database sync.
#![forbid(unsafe_code)]

use camino::Utf8Path;
use clap::{Parser, Subcommand};
use gtfs_delta_core::{ApplyConfig, BatchSize};

mod apply;
mod diff;
mod error;
mod report;
mod reset;
mod sync;

pub use error::CliError;

use apply::ApplyArgs;
use diff::DiffArgs;
use reset::ResetArgs;
use sync::SyncArgs;

pub(crate) const ARG_OLD: &str = "old";
pub(crate) const ARG_NEW: &str = "new";
pub(crate) const ARG_OUTPUT: &str = "output";
pub(crate) const ARG_PACKAGE: &str = "package";
pub(crate) const ARG_DATABASE: &str = "database";
pub(crate) const ARG_FEED: &str = "feed";
pub(crate) const ARG_LATEST: &str = "latest";
pub(crate) const ARG_CACHED: &str = "cached";
pub(crate) const ARG_WORK_DIR: &str = "work-dir";
pub(crate) const ARG_UPSERT_BATCH_SIZE: &str = "upsert-batch-size";
pub(crate) const ARG_DELETE_BATCH_SIZE: &str = "delete-batch-size";
pub(crate) const ENV_DIFF_OLD: &str = "GTFS_DELTA_CMDS_DIFF_OLD";
pub(crate) const ENV_DIFF_NEW: &str = "GTFS_DELTA_CMDS_DIFF_NEW";
pub(crate) const ENV_APPLY_PACKAGE: &str = "GTFS_DELTA_CMDS_APPLY_PACKAGE";
pub(crate) const ENV_APPLY_DATABASE: &str = "GTFS_DELTA_CMDS_APPLY_DATABASE";
pub(crate) const ENV_RESET_FEED: &str = "GTFS_DELTA_CMDS_RESET_FEED";
pub(crate) const ENV_RESET_DATABASE: &str = "GTFS_DELTA_CMDS_RESET_DATABASE";
pub(crate) const ENV_SYNC_LATEST: &str = "GTFS_DELTA_CMDS_SYNC_LATEST";
pub(crate) const ENV_SYNC_CACHED: &str = "GTFS_DELTA_CMDS_SYNC_CACHED";
pub(crate) const ENV_SYNC_DATABASE: &str = "GTFS_DELTA_CMDS_SYNC_DATABASE";

/// File name of the diff package when no output path is given.
pub(crate) const DEFAULT_PACKAGE_NAME: &str = "gtfs_diff.zip";

/// Run the GTFS delta CLI with the current process arguments and environment.
///
/// # Errors
///
/// Returns [`CliError`] when argument parsing, configuration layering or the
/// selected command fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Command::Diff(args) => diff::run_diff(args, &mut stdout),
        Command::Apply(args) => apply::run_apply(args, &mut stdout),
        Command::Reset(args) => reset::run_reset(args, &mut stdout),
        Command::Sync(args) => sync::run_sync(args, &mut stdout).map(|_| ()),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "gtfs-delta",
    about = "Diff GTFS snapshots and apply the differences to a transit database",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compare two GTFS feeds and write a diff package.
    Diff(DiffArgs),
    /// Apply a diff package to a transit database.
    Apply(ApplyArgs),
    /// Load a whole feed into a transit database.
    Reset(ResetArgs),
    /// Bring a transit database up to date with the latest feed.
    Sync(SyncArgs),
}

/// Check that `path` names an existing regular file.
pub(crate) fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match gtfs_delta_fs::is_regular_file(path) {
        Ok(true) => Ok(()),
        Ok(false) if path.exists() => Err(CliError::SourcePathNotFile {
            field,
            path: path.to_path_buf(),
        }),
        Ok(false) => Err(CliError::MissingSourceFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Build batch sizing from optional overrides, keeping defaults otherwise.
pub(crate) fn batch_config(
    upsert: Option<usize>,
    delete: Option<usize>,
) -> Result<ApplyConfig, CliError> {
    let defaults = ApplyConfig::default();
    let size = |value: Option<usize>, fallback: BatchSize, field: &'static str| match value {
        Some(value) => BatchSize::new(value).map_err(|_| CliError::ZeroBatchSize { field }),
        None => Ok(fallback),
    };
    Ok(ApplyConfig {
        upsert_batch_size: size(upsert, defaults.upsert_batch_size, ARG_UPSERT_BATCH_SIZE)?,
        delete_batch_size: size(delete, defaults.delete_batch_size, ARG_DELETE_BATCH_SIZE)?,
    })
}

#[cfg(test)]
mod tests;

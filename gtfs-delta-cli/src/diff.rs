//! Diff command implementation for the GTFS delta CLI.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use gtfs_delta_core::{DiffPackage, FeedDiff, FeedSnapshot, diff_feeds};
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::{
    ARG_NEW, ARG_OLD, ARG_OUTPUT, CliError, DEFAULT_PACKAGE_NAME, ENV_DIFF_NEW, ENV_DIFF_OLD,
    report::write_diff_summary, require_existing,
};

/// CLI arguments for the `diff` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Compare two GTFS feed archives table by table and write a \
                 diff package holding the changed rows, the deleted keys and \
                 a summary. The command fails when any table could not be \
                 loaded or compared; the package is still written.",
    about = "Compare two GTFS feeds and write a diff package"
)]
#[ortho_config(prefix = "GTFS_DELTA")]
pub(crate) struct DiffArgs {
    /// Path to the earlier GTFS feed archive.
    #[arg(long = ARG_OLD, value_name = "path")]
    #[serde(default)]
    pub(crate) old: Option<Utf8PathBuf>,
    /// Path to the later GTFS feed archive.
    #[arg(long = ARG_NEW, value_name = "path")]
    #[serde(default)]
    pub(crate) new: Option<Utf8PathBuf>,
    /// Where to write the diff package (defaults to `gtfs_diff.zip`).
    #[arg(long = ARG_OUTPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
}

impl DiffArgs {
    pub(crate) fn into_config(self) -> Result<DiffConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        DiffConfig::try_from(merged)
    }
}

/// Resolved `diff` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DiffConfig {
    pub(crate) old: Utf8PathBuf,
    pub(crate) new: Utf8PathBuf,
    pub(crate) output: Utf8PathBuf,
}

impl DiffConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        require_existing(&self.old, ARG_OLD)?;
        require_existing(&self.new, ARG_NEW)?;
        Ok(())
    }
}

impl TryFrom<DiffArgs> for DiffConfig {
    type Error = CliError;

    fn try_from(args: DiffArgs) -> Result<Self, Self::Error> {
        let old = args.old.ok_or(CliError::MissingArgument {
            field: ARG_OLD,
            env: ENV_DIFF_OLD,
        })?;
        let new = args.new.ok_or(CliError::MissingArgument {
            field: ARG_NEW,
            env: ENV_DIFF_NEW,
        })?;
        let output = args
            .output
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_PACKAGE_NAME));
        Ok(Self { old, new, output })
    }
}

pub(crate) fn run_diff(args: DiffArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    run_diff_with(&config, writer).map(|_| ())
}

/// Diff the configured feeds, write the package and report it.
pub(crate) fn run_diff_with(
    config: &DiffConfig,
    writer: &mut dyn Write,
) -> Result<DiffPackage, CliError> {
    config.validate_sources()?;
    let old = load_feed_at(&config.old)?;
    let new = load_feed_at(&config.new)?;
    let diff = diff_feeds(&old, &new);
    let package = write_diff_package(&diff, &config.output)?;
    write_diff_summary(writer, &package, &diff.failures)?;
    ensure_complete(&diff)?;
    Ok(package)
}

pub(crate) fn load_feed_at(path: &Utf8Path) -> Result<FeedSnapshot, CliError> {
    info!("Loading GTFS feed from {path}");
    gtfs_delta_data::load_feed(path).map_err(|source| CliError::LoadFeed {
        path: path.to_path_buf(),
        source,
    })
}

/// Bundle `diff` into a package and save it to `path`.
pub(crate) fn write_diff_package(
    diff: &FeedDiff,
    path: &Utf8Path,
) -> Result<DiffPackage, CliError> {
    let package = DiffPackage::from_feed_diff(diff);
    gtfs_delta_data::save_package(&package, path).map_err(|source| CliError::WritePackage {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(package)
}

pub(crate) fn ensure_complete(diff: &FeedDiff) -> Result<(), CliError> {
    if diff.is_complete() {
        Ok(())
    } else {
        Err(CliError::IncompleteDiff {
            failures: diff.failures.len(),
        })
    }
}

//! Error types emitted by the GTFS delta CLI.
//!
//! Keep this error type reasonably small, as every command helper returns
//! `Result<_, CliError>`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use gtfs_delta_core::ApplyError;
use gtfs_delta_data::{FeedArchiveError, PackageArchiveError, SqliteStoreError};
use thiserror::Error;

/// Errors emitted by the GTFS delta CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// A batch size option was zero.
    #[error("{field} must be at least 1")]
    ZeroBatchSize { field: &'static str },
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A GTFS feed archive could not be loaded.
    #[error("failed to load GTFS feed from {path:?}: {source}")]
    LoadFeed {
        path: Utf8PathBuf,
        #[source]
        source: FeedArchiveError,
    },
    /// One or more entity types could not be diffed.
    #[error("{failures} entity type(s) could not be diffed; see the log for details")]
    IncompleteDiff { failures: usize },
    /// Writing the diff package failed.
    #[error("failed to write diff package to {path:?}: {source}")]
    WritePackage {
        path: Utf8PathBuf,
        #[source]
        source: PackageArchiveError,
    },
    /// Reading the diff package failed.
    #[error("failed to read diff package from {path:?}: {source}")]
    ReadPackage {
        path: Utf8PathBuf,
        #[source]
        source: PackageArchiveError,
    },
    /// Opening the transit database failed.
    #[error("failed to open transit database at {path:?}: {source}")]
    OpenStore {
        path: Utf8PathBuf,
        #[source]
        source: SqliteStoreError,
    },
    /// The apply run aborted.
    #[error("failed to apply diff package: {0}")]
    Apply(#[from] ApplyError),
    /// Replacing the cached snapshot failed.
    #[error("failed to replace cached snapshot {path:?}: {source}")]
    ReplaceCachedSnapshot {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Writing the command report failed.
    #[error("failed to write command output: {0}")]
    WriteOutput(#[source] std::io::Error),
}

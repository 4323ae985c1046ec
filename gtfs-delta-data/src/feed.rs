//! Load a GTFS feed archive into a [`FeedSnapshot`].
#![forbid(unsafe_code)]

use std::io::{Read, Seek};

use camino::{Utf8Path, Utf8PathBuf};
use gtfs_delta_core::{EntityType, FeedSnapshot, Snapshot};
use log::{debug, info, warn};
use thiserror::Error;
use zip::{ZipArchive, result::ZipError};

/// Errors raised when a feed archive as a whole cannot be read.
///
/// A single unparseable member is not an error here; it is recorded on the
/// returned [`FeedSnapshot`] instead.
#[derive(Debug, Error)]
pub enum FeedArchiveError {
    /// The archive file could not be opened.
    #[error("failed to open GTFS feed at {path}")]
    Open {
        /// Archive path.
        path: Utf8PathBuf,
        /// Source I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The bytes are not a readable zip archive.
    #[error("GTFS feed is not a valid zip archive")]
    Archive {
        /// Source error returned by `zip`.
        #[source]
        source: ZipError,
    },
    /// A member could not be extracted.
    #[error("failed to read feed member {index}")]
    Member {
        /// Zero-based member index.
        index: usize,
        /// Source error returned by `zip`.
        #[source]
        source: ZipError,
    },
}

/// Load every recognised GTFS file from the archive at `path`.
///
/// # Errors
///
/// Returns [`FeedArchiveError`] when the file cannot be opened or is not a
/// zip archive.
pub fn load_feed(path: &Utf8Path) -> Result<FeedSnapshot, FeedArchiveError> {
    let file = gtfs_delta_fs::open_file(path).map_err(|source| FeedArchiveError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Loading GTFS feed from {path}");
    read_feed(file)
}

/// Load every recognised GTFS file from a zip archive.
///
/// Members are matched by file name, ignoring any directory prefix. Files
/// that are not one of the supported entity types are ignored. A member
/// whose CSV cannot be parsed is marked unreadable so the remaining types
/// still load.
///
/// # Errors
///
/// Returns [`FeedArchiveError`] when the archive or one of its members
/// cannot be decompressed.
pub fn read_feed<R: Read + Seek>(reader: R) -> Result<FeedSnapshot, FeedArchiveError> {
    let mut archive =
        ZipArchive::new(reader).map_err(|source| FeedArchiveError::Archive { source })?;
    let mut feed = FeedSnapshot::new();
    for index in 0..archive.len() {
        let member = archive
            .by_index(index)
            .map_err(|source| FeedArchiveError::Member { index, source })?;
        if member.is_dir() {
            continue;
        }
        let name = member.name().rsplit('/').next().unwrap_or_default().to_owned();
        let Some(entity) = EntityType::from_file_name(&name) else {
            debug!("Ignoring feed member {name}");
            continue;
        };
        match Snapshot::from_reader(entity, member) {
            Ok(snapshot) => {
                debug!("Loaded {} {entity} rows", snapshot.len());
                feed.insert(snapshot);
            }
            Err(err) => {
                warn!("Could not parse {name}: {err}");
                feed.mark_unreadable(entity, err);
            }
        }
    }
    info!("Loaded {} rows across the feed", feed.row_count());
    Ok(feed)
}

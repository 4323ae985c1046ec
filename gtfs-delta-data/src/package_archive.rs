//! Zip container for [`DiffPackage`]s.
//!
//! A package archive holds `summary.json` plus, per entity type with rows to
//! apply, `<stem>.changes.csv` and `<stem>.deletions.csv`. Members are
//! deflate-compressed.
#![forbid(unsafe_code)]

use std::{
    collections::BTreeMap,
    io::{Read, Seek, Write},
};

use camino::{Utf8Path, Utf8PathBuf};
use gtfs_delta_core::{
    ChangeSet, DeletionSet, DiffPackage, EntityType, KeyTuple, MemberKind, PackageFormatError,
    PackageSummary, SUMMARY_MEMBER, changes_member, deletions_member, parse_member_name,
};
use log::{debug, info};
use thiserror::Error;
use zip::{
    CompressionMethod, ZipArchive, ZipWriter, result::ZipError, write::SimpleFileOptions,
};

/// Errors raised while writing or reading a package archive.
#[derive(Debug, Error)]
pub enum PackageArchiveError {
    /// Opening or creating the archive file failed.
    #[error("failed to access package archive at {path}")]
    Io {
        /// Archive path.
        path: Utf8PathBuf,
        /// Source I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The container itself could not be read or written.
    #[error("package archive is not a readable zip container")]
    Archive {
        /// Source error returned by `zip`.
        #[source]
        source: ZipError,
    },
    /// A member could not be read or written.
    #[error("failed to process package member '{member}'")]
    Member {
        /// Member name.
        member: String,
        /// Source error returned by `zip`.
        #[source]
        source: ZipError,
    },
    /// A member's CSV could not be encoded or decoded.
    #[error("invalid CSV in package member '{member}'")]
    Csv {
        /// Member name.
        member: String,
        /// Source error returned by `csv`.
        #[source]
        source: csv::Error,
    },
    /// Writing raw member bytes failed.
    #[error("failed to write package member '{member}'")]
    Write {
        /// Member name.
        member: String,
        /// Source I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The summary document could not be encoded.
    #[error("failed to encode package summary")]
    EncodeSummary {
        /// Source error returned by `serde_json`.
        #[source]
        source: serde_json::Error,
    },
    /// The members do not form a valid package.
    #[error(transparent)]
    Format(#[from] PackageFormatError),
}

/// Write `package` to a new archive at `path`, creating parent directories.
///
/// # Errors
///
/// Returns [`PackageArchiveError`] when the file cannot be created or a
/// member cannot be written.
pub fn save_package(package: &DiffPackage, path: &Utf8Path) -> Result<(), PackageArchiveError> {
    let file = gtfs_delta_fs::create_file(path).map_err(|source| PackageArchiveError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    write_package(package, file)?;
    info!("Diff package written to {path}");
    Ok(())
}

/// Write `package` into `writer` as a zip archive and return the writer.
///
/// # Errors
///
/// Returns [`PackageArchiveError`] when a member cannot be encoded.
pub fn write_package<W: Write + Seek>(
    package: &DiffPackage,
    writer: W,
) -> Result<W, PackageArchiveError> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(writer);

    let summary = serde_json::to_vec_pretty(package.summary())
        .map_err(|source| PackageArchiveError::EncodeSummary { source })?;
    start_member(&mut zip, SUMMARY_MEMBER, options)?;
    zip.write_all(&summary)
        .map_err(|source| PackageArchiveError::Write {
            member: SUMMARY_MEMBER.to_owned(),
            source,
        })?;

    for table in package.tables() {
        if let Some(changes) = &table.changes {
            let member = changes_member(table.entity);
            start_member(&mut zip, &member, options)?;
            write_csv(&mut zip, &member, &changes.header, &changes.rows)?;
        }
        if let Some(deletions) = &table.deletions {
            let member = deletions_member(table.entity);
            start_member(&mut zip, &member, options)?;
            let keys: Vec<&[String]> = deletions.keys.iter().map(KeyTuple::values).collect();
            write_csv(&mut zip, &member, &deletions.header, &keys)?;
        }
    }

    zip.finish()
        .map_err(|source| PackageArchiveError::Archive { source })
}

fn start_member<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    member: &str,
    options: SimpleFileOptions,
) -> Result<(), PackageArchiveError> {
    debug!("Writing package member {member}");
    zip.start_file(member, options)
        .map_err(|source| PackageArchiveError::Member {
            member: member.to_owned(),
            source,
        })
}

fn write_csv<W, R>(
    writer: W,
    member: &str,
    header: &[String],
    rows: &[R],
) -> Result<(), PackageArchiveError>
where
    W: Write,
    R: AsRef<[String]>,
{
    let csv_error = |source| PackageArchiveError::Csv {
        member: member.to_owned(),
        source,
    };
    let mut csv_writer = csv::WriterBuilder::new().flexible(true).from_writer(writer);
    csv_writer.write_record(header).map_err(csv_error)?;
    for row in rows {
        csv_writer.write_record(row.as_ref()).map_err(csv_error)?;
    }
    csv_writer
        .flush()
        .map_err(|source| PackageArchiveError::Write {
            member: member.to_owned(),
            source,
        })
}

/// Read and validate the package archive at `path`.
///
/// # Errors
///
/// Returns [`PackageArchiveError`] when the file is unreadable or the
/// package is structurally invalid.
pub fn load_package(path: &Utf8Path) -> Result<DiffPackage, PackageArchiveError> {
    let file = gtfs_delta_fs::open_file(path).map_err(|source| PackageArchiveError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Reading diff package from {path}");
    read_package(file)
}

/// Read and validate a package archive.
///
/// Members that are neither the summary nor a changes/deletions file are
/// ignored.
///
/// # Errors
///
/// Returns [`PackageArchiveError::Format`] when the summary is missing or
/// invalid, a member names an unknown entity type or the members disagree
/// with the summary; other variants when the container is unreadable.
pub fn read_package<R: Read + Seek>(reader: R) -> Result<DiffPackage, PackageArchiveError> {
    let mut archive =
        ZipArchive::new(reader).map_err(|source| PackageArchiveError::Archive { source })?;
    let summary = read_summary(&mut archive)?;

    let names: Vec<String> = archive.file_names().map(str::to_owned).collect();
    let mut changes = BTreeMap::new();
    let mut deletions = BTreeMap::new();
    for name in names {
        let Some((stem, kind)) = parse_member_name(&name) else {
            continue;
        };
        let entity = EntityType::from_stem(stem).ok_or_else(|| {
            PackageFormatError::UnknownEntity {
                name: stem.to_owned(),
            }
        })?;
        let (header, rows) = read_csv_member(&mut archive, &name)?;
        match kind {
            MemberKind::Changes => {
                changes.insert(entity, ChangeSet { header, rows });
            }
            MemberKind::Deletions => {
                let keys = rows.into_iter().map(KeyTuple::new).collect();
                deletions.insert(entity, DeletionSet { header, keys });
            }
        }
    }
    Ok(DiffPackage::from_parts(summary, changes, deletions)?)
}

fn read_summary<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<PackageSummary, PackageArchiveError> {
    let member = match archive.by_name(SUMMARY_MEMBER) {
        Ok(member) => member,
        Err(ZipError::FileNotFound) => {
            return Err(PackageFormatError::MissingMember {
                member: SUMMARY_MEMBER.to_owned(),
            }
            .into());
        }
        Err(source) => {
            return Err(PackageArchiveError::Member {
                member: SUMMARY_MEMBER.to_owned(),
                source,
            });
        }
    };
    serde_json::from_reader(member).map_err(|err| {
        PackageFormatError::InvalidSummary {
            message: err.to_string(),
        }
        .into()
    })
}

fn read_csv_member<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<(Vec<String>, Vec<Vec<String>>), PackageArchiveError> {
    let member = archive
        .by_name(name)
        .map_err(|source| PackageArchiveError::Member {
            member: name.to_owned(),
            source,
        })?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(member);
    let mut records = reader.records().map(|record| {
        record
            .map(|values| values.iter().map(str::to_owned).collect::<Vec<_>>())
            .map_err(|source| PackageArchiveError::Csv {
                member: name.to_owned(),
                source,
            })
    });
    let header = records.next().transpose()?.unwrap_or_default();
    let rows = records.collect::<Result<Vec<_>, _>>()?;
    Ok((header, rows))
}

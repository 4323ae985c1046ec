//! Capability-style filesystem helpers for feed archives, diff packages and
//! snapshot caches, built on `cap-std` and `camino`.
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use std::io;
use std::path::Component;

const PARTIAL_SUFFIX: &str = ".partial";

/// Open an existing file for reading.
pub fn open_file(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    fs_utf8::File::open_ambient(path, ambient_authority())
}

/// Create or truncate `path` for writing, creating missing parent
/// directories first.
pub fn create_file(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    let (dir, name) = parent_dir_and_name(path)?;
    dir.create(name.as_str())
}

/// Create the parent directories of `path` when they are missing.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    parent_dir_and_name(path).map(|_| ())
}

/// Whether `path` names an existing regular file. A missing file or parent
/// directory reads as `false`.
pub fn is_regular_file(path: &Utf8Path) -> io::Result<bool> {
    let (dir, name) = match open_parent(path) {
        Ok(found) => found,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    match dir.metadata(name.as_str()) {
        Ok(meta) => Ok(meta.is_file()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Copy `source` over `target` so readers never observe a half-written
/// target.
///
/// The bytes land in a sibling `.partial` file first, which is then renamed
/// into place. Missing parent directories of `target` are created.
pub fn replace_atomically(source: &Utf8Path, target: &Utf8Path) -> io::Result<u64> {
    let (dir, name) = parent_dir_and_name(target)?;
    let partial = format!("{name}{PARTIAL_SUFFIX}");
    let mut reader = open_file(source)?;
    let copied = {
        let mut writer = dir.create(partial.as_str())?;
        let copied = io::copy(&mut reader, &mut writer)?;
        writer.sync_all()?;
        copied
    };
    if let Err(err) = dir.rename(partial.as_str(), &dir, name.as_str()) {
        let _cleanup = dir.remove_file(partial.as_str());
        return Err(err);
    }
    Ok(copied)
}

fn open_parent(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, String)> {
    let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    let parent = if parent.as_str().is_empty() {
        Utf8Path::new(".")
    } else {
        parent
    };
    let name = file_name(path)?;
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, name))
}

fn parent_dir_and_name(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, String)> {
    let name = file_name(path)?;
    let parent = path.parent().filter(|parent| !parent.as_str().is_empty());
    let Some(parent) = parent else {
        let dir = fs_utf8::Dir::open_ambient_dir(".", ambient_authority())?;
        return Ok((dir, name));
    };
    let (base, relative) = split_base(parent)?;
    if relative.as_str().is_empty() {
        return Ok((base, name));
    }
    base.create_dir_all(&relative)?;
    Ok((base.open_dir(&relative)?, name))
}

fn file_name(path: &Utf8Path) -> io::Result<String> {
    path.file_name()
        .map(str::to_owned)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("{path} has no file name")))
}

/// Split a directory path into an ambient base directory and the relative
/// remainder beneath it.
fn split_base(parent: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let std_parent = parent.as_std_path();

    let (base, relative) = match std_parent.components().next() {
        // Windows absolute path with a drive or UNC prefix.
        Some(Component::Prefix(prefix)) => {
            let prefix_str = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;
            let base = Utf8PathBuf::from(prefix_str).join(std::path::MAIN_SEPARATOR.to_string());
            let relative = std_parent
                .strip_prefix(base.as_std_path())
                .or_else(|_| std_parent.strip_prefix(prefix.as_os_str()))
                .map_err(|_| io::Error::other("failed to strip prefix from parent path"))?
                .to_path_buf();
            (base, relative)
        }
        Some(Component::RootDir) => {
            let base = Utf8PathBuf::from(std::path::MAIN_SEPARATOR.to_string());
            let relative = std_parent
                .strip_prefix(base.as_std_path())
                .map_err(|_| io::Error::other("failed to strip root from absolute path"))?
                .to_path_buf();
            (base, relative)
        }
        _ => (Utf8PathBuf::from("."), std_parent.to_path_buf()),
    };

    let dir = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    let relative = Utf8PathBuf::from_path_buf(relative)
        .map_err(|_| io::Error::other("non-UTF-8 parent path"))?;
    Ok((dir, relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::io::{Read, Write};
    use tempfile::TempDir;

    #[fixture]
    fn temp_dir() -> TempDir {
        TempDir::new().expect("create temp dir")
    }

    fn utf8(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("UTF-8 temp dir")
    }

    fn read(path: &Utf8Path) -> String {
        let mut text = String::new();
        open_file(path)
            .expect("open file")
            .read_to_string(&mut text)
            .expect("read file");
        text
    }

    #[rstest]
    fn create_file_makes_missing_parents(temp_dir: TempDir) {
        let target = utf8(&temp_dir).join("nested/deeper/delta.zip");
        let mut file = create_file(&target).expect("create nested file");
        file.write_all(b"payload").expect("write payload");
        assert_eq!(read(&target), "payload");
        assert!(is_regular_file(&target).expect("stat file"));
    }

    #[rstest]
    fn ensure_parent_dir_leaves_the_file_absent(temp_dir: TempDir) {
        let root = utf8(&temp_dir);
        let target = root.join("db/transit.sqlite");
        ensure_parent_dir(&target).expect("create parent");
        assert!(root.join("db").as_std_path().is_dir());
        assert!(!is_regular_file(&target).expect("stat target"));
    }

    #[rstest]
    fn missing_paths_are_not_regular_files(temp_dir: TempDir) {
        let root = utf8(&temp_dir);
        assert!(!is_regular_file(&root.join("absent.zip")).expect("stat missing file"));
        assert!(!is_regular_file(&root.join("absent/feed.zip")).expect("stat missing dir"));
        assert!(!is_regular_file(&root).expect("directories are not files"));
    }

    #[rstest]
    fn replace_atomically_overwrites_target(temp_dir: TempDir) {
        let root = utf8(&temp_dir);
        let source = root.join("latest.zip");
        let target = root.join("cache/gtfs.zip");
        create_file(&source)
            .and_then(|mut file| file.write_all(b"new"))
            .expect("write source");
        create_file(&target)
            .and_then(|mut file| file.write_all(b"old contents"))
            .expect("write target");

        let copied = replace_atomically(&source, &target).expect("replace target");

        assert_eq!(copied, 3);
        assert_eq!(read(&target), "new");
        assert!(!is_regular_file(&root.join("cache/gtfs.zip.partial")).expect("stat partial"));
        assert_eq!(read(&source), "new");
    }

    #[rstest]
    fn replace_atomically_reports_missing_source(temp_dir: TempDir) {
        let root = utf8(&temp_dir);
        let err = replace_atomically(&root.join("missing.zip"), &root.join("gtfs.zip"))
            .expect_err("source is missing");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[rstest]
    fn paths_without_file_names_are_rejected() {
        let err = create_file(Utf8Path::new("/")).expect_err("root has no file name");
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}

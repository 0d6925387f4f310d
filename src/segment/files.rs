//! Segment file management: creation, enumeration, and archival.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

use super::header::SegmentHeader;

/// Filename prefix for segment files.
pub const SEGMENT_PREFIX: &str = "wal-segment-";

/// Filename suffix for segment files.
pub const SEGMENT_SUFFIX: &str = ".wal";

/// Build the filename for a segment index.
pub fn segment_file_name(index: u32) -> String {
    format!("{}{}{}", SEGMENT_PREFIX, index, SEGMENT_SUFFIX)
}

/// Build the full path for a segment index in the given directory.
pub fn segment_file_path(dir: &Path, index: u32) -> PathBuf {
    dir.join(segment_file_name(index))
}

/// Create a directory (and parents) if it doesn't exist.
pub fn create_dir_if_missing(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    Ok(())
}

/// Enumerate segment files in a directory.
pub fn list_segment_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if name.starts_with(SEGMENT_PREFIX) && name.ends_with(SEGMENT_SUFFIX) {
            files.push(entry.path());
        }
    }

    Ok(files)
}

/// Extract the segment index from a segment file path.
pub fn parse_segment_index(path: &Path) -> Result<u32> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::BadSegmentName(path.display().to_string()))?;

    name.strip_prefix(SEGMENT_PREFIX)
        .and_then(|s| s.strip_suffix(SEGMENT_SUFFIX))
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or_else(|| Error::BadSegmentName(name.to_string()))
}

/// Largest segment index among the given paths, 0 if empty.
pub fn max_segment_index(paths: &[PathBuf]) -> Result<u32> {
    let mut max = 0;
    for path in paths {
        max = max.max(parse_segment_index(path)?);
    }
    Ok(max)
}

/// Path with the smallest segment index, `None` if empty.
pub fn oldest_segment_file(paths: &[PathBuf]) -> Result<Option<PathBuf>> {
    let mut oldest: Option<(u32, &PathBuf)> = None;

    for path in paths {
        let index = parse_segment_index(path)?;
        match oldest {
            Some((min, _)) if min <= index => {}
            _ => oldest = Some((index, path)),
        }
    }

    Ok(oldest.map(|(_, path)| path.clone()))
}

/// Create a segment file and write its header.
///
/// The returned handle is positioned just past the header.
pub fn create_segment_file(dir: &Path, index: u32) -> Result<File> {
    let path = segment_file_path(dir, index);
    let mut file = File::create(&path)?;

    let header = SegmentHeader::new(index);
    file.write_all(&header.encode())?;

    Ok(file)
}

/// Open an existing segment file for appending.
pub fn open_segment_for_append(dir: &Path, index: u32) -> Result<File> {
    let path = segment_file_path(dir, index);
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(file)
}

/// Move a segment file into the archival directory, preserving its name.
pub fn archive_segment(path: &Path, archive_dir: &Path) -> Result<PathBuf> {
    create_dir_if_missing(archive_dir)?;

    let name = path
        .file_name()
        .ok_or_else(|| Error::BadSegmentName(path.display().to_string()))?;
    let target = archive_dir.join(name);

    fs::rename(path, &target)?;
    Ok(target)
}

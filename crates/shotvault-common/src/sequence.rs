//! Sequence discovery.
//!
//! Partitions the regular files of one resolution folder into frame
//! sequences and single files. Files are grouped by `(base, extension,
//! padding)`, so `shot_001.exr` and `shot_0001.exr` never merge.

use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::error::{Error, Result};
use crate::types::{FileSequence, Frame, ShotTags, SingleFile};

static FRAME_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)_(\d+)\.([a-zA-Z0-9]+)$").expect("frame file regex is valid")
});

/// Result of discovering one or more directories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    pub files: Vec<SingleFile>,
    pub sequences: Vec<FileSequence>,
}

impl Discovery {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.sequences.is_empty()
    }

    fn extend(&mut self, other: Discovery) {
        self.files.extend(other.files);
        self.sequences.extend(other.sequences);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct GroupKey {
    base: String,
    extension: String,
    padding: usize,
}

/// Parse `<base>_<digits>.<ext>` into its parts.
///
/// Returns `None` for names that do not match. A frame token wider than 64
/// bits is logged and also yields `None`, leaving the file a single file.
pub fn parse_frame_name(name: &str) -> Option<(String, Frame, usize, String)> {
    let caps = FRAME_FILE.captures(name)?;
    let digits = &caps[2];
    let Ok(frame) = digits.parse::<Frame>() else {
        tracing::warn!(name, "Frame token out of range, treating as a single file");
        return None;
    };
    Some((
        caps[1].to_string(),
        frame,
        digits.len(),
        caps[3].to_lowercase(),
    ))
}

/// Discover sequences and single files in one directory.
///
/// The listing is non-recursive and only regular files are considered.
/// Output is sorted, so traversal order never affects the result.
pub fn discover(dir: &Path, tags: &ShotTags) -> Result<Discovery> {
    let entries = std::fs::read_dir(dir).map_err(|source| Error::Discovery {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut singles: Vec<PathBuf> = Vec::new();
    let mut groups: BTreeMap<GroupKey, Vec<(Frame, PathBuf)>> = BTreeMap::new();

    for entry in entries {
        let entry = entry.map_err(|source| Error::Discovery {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        match parse_frame_name(&name) {
            Some((base, frame, padding, extension)) => {
                groups
                    .entry(GroupKey {
                        base,
                        extension,
                        padding,
                    })
                    .or_default()
                    .push((frame, path));
            }
            None => singles.push(path),
        }
    }

    let mut discovery = Discovery::default();
    for (key, mut members) in groups {
        // `take_1001.EXR` and `take_1001.exr` share a key; keep one per frame.
        members.sort();
        let mut unique: Vec<(Frame, PathBuf)> = Vec::with_capacity(members.len());
        for (frame, path) in members {
            if unique.last().is_some_and(|(prev, _)| *prev == frame) {
                singles.push(path);
            } else {
                unique.push((frame, path));
            }
        }
        let members = unique;

        if members.len() == 1 {
            if let Some((_, path)) = members.into_iter().next() {
                singles.push(path);
            }
            continue;
        }
        let sequence = FileSequence::from_members(
            tags.clone(),
            key.base,
            key.extension,
            key.padding,
            members,
        )?;
        tracing::debug!(sequence = %sequence.label(), "Discovered sequence");
        discovery.sequences.push(sequence);
    }

    singles.sort();
    discovery.files = singles
        .into_iter()
        .map(|path| SingleFile::new(tags.clone(), path))
        .collect();

    Ok(discovery)
}

/// Discover several directories sharing the same tags.
///
/// A directory that cannot be listed is reported in the returned error list;
/// its siblings are still discovered.
pub fn discover_all<P: AsRef<Path>>(dirs: &[P], tags: &ShotTags) -> (Discovery, Vec<Error>) {
    let mut discovery = Discovery::default();
    let mut errors = Vec::new();

    for dir in dirs {
        match discover(dir.as_ref(), tags) {
            Ok(found) => discovery.extend(found),
            Err(e) => {
                tracing::warn!(path = %dir.as_ref().display(), error = %e, "Discovery failed");
                errors.push(e);
            }
        }
    }

    (discovery, errors)
}

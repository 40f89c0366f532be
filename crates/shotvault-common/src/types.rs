//! Core units of ingestion work: frame sequences and single files.
//!
//! Both are created once by the sequence discoverer from a directory
//! snapshot and are read-only afterwards.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Frame number as parsed from a filename or assigned at the destination.
pub type Frame = u64;

/// Output frame number assigned to files that did not group into a sequence.
pub const SINGLE_FILE_FRAME: Frame = 1001;

/// Scene, shot and resolution tags taken from the vendor folder layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ShotTags {
    pub scene: String,
    pub shot: String,
    pub resolution: String,
}

impl ShotTags {
    pub fn new(
        scene: impl Into<String>,
        shot: impl Into<String>,
        resolution: impl Into<String>,
    ) -> Self {
        Self {
            scene: scene.into(),
            shot: shot.into(),
            resolution: resolution.into(),
        }
    }
}

impl fmt::Display for ShotTags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {}", self.scene, self.shot, self.resolution)
    }
}

/// A run of same-named, same-extension, same-padding frames.
///
/// Members are stored in ascending frame order. A sequence always has at
/// least two members; a lone frame is a [`SingleFile`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSequence {
    tags: ShotTags,
    base_name: String,
    extension: String,
    padding: usize,
    frames: Vec<Frame>,
    paths: Vec<PathBuf>,
}

impl FileSequence {
    /// Build a sequence from `(frame, path)` members.
    ///
    /// Members are sorted by frame. Fails when fewer than two members are
    /// given, when a frame number repeats, or when `padding` is zero.
    pub fn from_members(
        tags: ShotTags,
        base_name: impl Into<String>,
        extension: impl Into<String>,
        padding: usize,
        mut members: Vec<(Frame, PathBuf)>,
    ) -> Result<Self> {
        let base_name = base_name.into();
        if members.len() < 2 {
            return Err(Error::configuration(format!(
                "sequence {base_name} needs at least two frames, got {}",
                members.len()
            )));
        }
        if padding == 0 {
            return Err(Error::configuration(format!(
                "sequence {base_name} has zero padding"
            )));
        }

        members.sort_by_key(|(frame, _)| *frame);
        if members.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(Error::configuration(format!(
                "sequence {base_name} has duplicate frame numbers"
            )));
        }

        let (frames, paths) = members.into_iter().unzip();
        Ok(Self {
            tags,
            base_name,
            extension: extension.into().to_lowercase(),
            padding,
            frames,
            paths,
        })
    }

    pub fn tags(&self) -> &ShotTags {
        &self.tags
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Lowercase extension without the leading dot.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Digit width of the frame token in the source filenames.
    pub fn padding(&self) -> usize {
        self.padding
    }

    pub fn start_frame(&self) -> Frame {
        self.frames[0]
    }

    pub fn end_frame(&self) -> Frame {
        self.frames[self.frames.len() - 1]
    }

    /// Source frame numbers in ascending order.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Source paths in ascending frame order.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Iterate `(frame, path)` pairs in ascending frame order.
    pub fn members(&self) -> impl Iterator<Item = (Frame, &Path)> {
        self.frames
            .iter()
            .copied()
            .zip(self.paths.iter().map(PathBuf::as_path))
    }

    /// Display label such as `take_####.exr [1001-1005]`.
    pub fn label(&self) -> String {
        format!(
            "{}_{}.{} [{}-{}]",
            self.base_name,
            "#".repeat(self.padding),
            self.extension,
            self.start_frame(),
            self.end_frame()
        )
    }
}

/// A source file that did not group into a sequence of two or more frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SingleFile {
    tags: ShotTags,
    path: PathBuf,
}

impl SingleFile {
    pub fn new(tags: ShotTags, path: impl Into<PathBuf>) -> Self {
        Self {
            tags,
            path: path.into(),
        }
    }

    pub fn tags(&self) -> &ShotTags {
        &self.tags
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lowercase extension without the leading dot, empty when there is none.
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }

    /// Output frame number used for path resolution.
    pub fn frame(&self) -> Frame {
        SINGLE_FILE_FRAME
    }

    pub fn label(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Anything the path resolver can place in the project layout.
pub trait ShotUnit {
    fn tags(&self) -> &ShotTags;

    /// Lowercase extension used in the destination filename.
    fn output_extension(&self) -> String;

    /// Label used in logs and reports.
    fn unit_label(&self) -> String;
}

impl ShotUnit for FileSequence {
    fn tags(&self) -> &ShotTags {
        &self.tags
    }

    fn output_extension(&self) -> String {
        self.extension.clone()
    }

    fn unit_label(&self) -> String {
        format!("{} {}", self.tags, self.label())
    }
}

impl ShotUnit for SingleFile {
    fn tags(&self) -> &ShotTags {
        &self.tags
    }

    fn output_extension(&self) -> String {
        self.extension()
    }

    fn unit_label(&self) -> String {
        format!("{} {}", self.tags, self.label())
    }
}

/// Destination triad for one unit at one frame number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputPathSet {
    /// Full path of the plate file.
    pub plate_file: PathBuf,
    /// Directory receiving proxy images.
    pub proxy_dir: PathBuf,
    /// Directory receiving the review movie.
    pub mov_dir: PathBuf,
}

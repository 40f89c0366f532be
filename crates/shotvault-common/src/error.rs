//! Unified error type for shotvault.
//!
//! Every failure mode of an ingestion run funnels into [`Error`]. Most
//! variants are scoped to a single unit of work (one file or one sequence);
//! only [`Error::Configuration`] is fatal for a whole run.

use std::path::PathBuf;

use crate::frames::{format_ranges, FrameRange};

/// Unified error type covering all failure modes in shotvault.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A source directory is missing or unreadable.
    #[error("Discovery error at {}: {source}", path.display())]
    Discovery {
        /// Directory that could not be listed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// No scene/shot mapping matched the unit, or project fields are unset.
    #[error("Missing metadata for {unit}: {reason}")]
    MissingMetadata {
        /// Human-readable label of the unit being resolved.
        unit: String,
        /// Why resolution failed.
        reason: String,
    },

    /// A sequence has gaps in its frame range.
    #[error("Missing frames in {sequence}: [{}]", format_ranges(.missing))]
    MissingFrames {
        /// Label of the sequence.
        sequence: String,
        /// Runs of frame numbers absent from the range.
        missing: Vec<FrameRange>,
    },

    /// Copying a single file failed.
    #[error("Copy failed {} -> {}: {source}", src.display(), dst.display())]
    CopyIo {
        /// Source path.
        src: PathBuf,
        /// Destination path.
        dst: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The copied file's length differs from the source.
    #[error(
        "Size mismatch {} -> {}: source={src_len}, destination={dst_len}",
        src.display(),
        dst.display()
    )]
    SizeMismatch {
        /// Source path.
        src: PathBuf,
        /// Destination path.
        dst: PathBuf,
        /// Source length in bytes.
        src_len: u64,
        /// Destination length in bytes.
        dst_len: u64,
    },

    /// A destination file is already claimed by another unit of the run.
    #[error("Destination {} for {unit} is already claimed by {owner}", dst.display())]
    DestinationCollision {
        /// Label of the unit that lost the claim.
        unit: String,
        /// The contested destination path.
        dst: PathBuf,
        /// Label of the unit that owns the destination.
        owner: String,
    },

    /// An external tool (oiiotool, ffmpeg) failed or is unavailable.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// A proxy format other than jpeg/png was requested.
    #[error("Unsupported proxy format: {0}")]
    UnsupportedFormat(String),

    /// Run-level configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The run was cancelled before this work started or finished.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Convenience constructor for [`Error::MissingMetadata`].
    pub fn missing_metadata(unit: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MissingMetadata {
            unit: unit.into(),
            reason: reason.into(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Configuration`].
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    /// Convenience constructor for [`Error::Cancelled`].
    pub fn cancelled(what: impl Into<String>) -> Self {
        Error::Cancelled(what.into())
    }

    /// Whether the error is policy-gated or observational rather than a hard
    /// failure of the unit.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::MissingFrames { .. }
                | Error::SizeMismatch { .. }
                | Error::Tool { .. }
                | Error::UnsupportedFormat(_)
        )
    }

    /// Whether the error ends the whole run rather than a single unit.
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

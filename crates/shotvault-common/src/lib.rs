//! Shotvault-Common: shared types and pure ingestion logic.
//!
//! This crate provides the parts of shotvault that never spawn processes or
//! copy bytes:
//!
//! - **Core Types**: frame sequences, single files, shot tags and output paths
//! - **Context**: the read-only project context and scene/shot metadata map
//! - **Discovery**: grouping a directory listing into sequences and files
//! - **Continuity**: detecting gaps in a sequence's frame range
//! - **Paths**: resolving destination plate/proxy/mov locations
//! - **Error Handling**: the unified error type and result alias
//!
//! # Examples
//!
//! ```
//! use shotvault_common::frames::{find_missing_frames, FrameRange};
//! use shotvault_common::context::TypeToken;
//!
//! assert_eq!(
//!     find_missing_frames(&[1001, 1002, 1006]),
//!     vec![FrameRange::new(1003, 1005)]
//! );
//!
//! let token = TypeToken::parse("main_plate_v001").unwrap();
//! assert_eq!(token.product_type, "plate");
//! ```

pub mod context;
pub mod error;
pub mod frames;
pub mod paths;
pub mod sequence;
pub mod types;

pub use context::{
    FrameNumbering, ProjectContext, SceneShotEntry, SceneShotMap, SizeMismatchPolicy, TypeToken,
};
pub use error::{Error, Result};
pub use paths::{resolve, ShotLayout};
pub use sequence::{discover, discover_all, Discovery};
pub use types::*;

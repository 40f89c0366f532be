//! # shotvault-av
//!
//! External tool plumbing for deriving artifacts from ingested plates.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to
//!   `oiiotool` and `ffmpeg`.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout and
//!   cancellation support for running external processes.
//! - **Proxy derivation** ([`ProxyDeriver`], [`OiioProxyDeriver`]) -- one
//!   jpeg/png preview per plate frame.
//! - **Movie derivation** ([`MovieDeriver`], [`FfmpegMovieDeriver`]) -- one
//!   ProRes review movie per sequence.

pub mod command;
pub mod movie;
pub mod proxy;
pub mod tools;

pub use command::{ToolCommand, ToolOutput};
pub use movie::{FfmpegMovieDeriver, FramePattern, MovieDeriver};
pub use proxy::{OiioProxyDeriver, ProxyDeriver, ProxyFormat};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry, ToolsConfig};

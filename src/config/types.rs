use serde::{Deserialize, Serialize};
use shotvault_common::context::{DEFAULT_FPS, DEFAULT_START_FRAME};
use shotvault_common::{FrameNumbering, SizeMismatchPolicy};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub use shotvault_av::ToolsConfig;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub project: ProjectConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    /// Static scene/shot map: `"scene/shot" = ["canonicalId", "typeToken"]`.
    #[serde(default)]
    pub shots: BTreeMap<String, [String; 2]>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ProjectConfig {
    /// Project name, the first directory under the destination root
    #[serde(default)]
    pub name: Option<String>,

    /// Destination root for the project layout
    #[serde(default)]
    pub destination: Option<PathBuf>,

    /// Source root holding `{project}/vault/to_mvl/{vendor}/{date}`
    #[serde(default)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IngestConfig {
    /// Re-copy destinations that already exist
    #[serde(default)]
    pub overwrite: bool,

    /// Copy sequences with missing frames
    #[serde(default)]
    pub force: bool,

    /// Proxy image format (`jpeg` or `png`)
    #[serde(default)]
    pub proxy_format: Option<String>,

    /// Generate proxies when a proxy format is set (default: true)
    #[serde(default = "default_true")]
    pub generate_proxy: bool,

    #[serde(default)]
    pub generate_mov: bool,

    /// Run proxy and movie generation concurrently
    #[serde(default)]
    pub parallel_proxy: bool,

    #[serde(default = "default_fps")]
    pub fps: u32,

    #[serde(default = "default_start_frame")]
    pub start_frame: u32,

    #[serde(default)]
    pub frame_numbering: FrameNumbering,

    #[serde(default)]
    pub size_mismatch: SizeMismatchPolicy,

    /// Worker pool size (default: number of CPUs, at least 4)
    #[serde(default)]
    pub workers: Option<usize>,

    /// Cancel the run after this many seconds
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

fn default_true() -> bool {
    true
}

fn default_fps() -> u32 {
    DEFAULT_FPS
}

fn default_start_frame() -> u32 {
    DEFAULT_START_FRAME
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            overwrite: false,
            force: false,
            proxy_format: None,
            generate_proxy: true,
            generate_mov: false,
            parallel_proxy: false,
            fps: default_fps(),
            start_frame: default_start_frame(),
            frame_numbering: FrameNumbering::default(),
            size_mismatch: SizeMismatchPolicy::default(),
            workers: None,
            deadline_secs: None,
        }
    }
}

impl IngestConfig {
    /// Worker pool size: configured value, else host parallelism with a floor of 4.
    pub fn worker_count(&self) -> usize {
        self.workers
            .filter(|w| *w > 0)
            .unwrap_or_else(|| num_cpus::get().max(4))
    }

    /// Proxy format to derive with, if proxies are enabled.
    pub fn effective_proxy_format(&self) -> Option<&str> {
        if self.generate_proxy {
            self.proxy_format.as_deref()
        } else {
            None
        }
    }
}

//! Project-wide, read-only ingestion context.
//!
//! A [`ProjectContext`] is resolved once before a run starts and shared
//! immutably (behind an `Arc`) by every worker task.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Default output frame for the first frame of a renumbered sequence.
pub const DEFAULT_START_FRAME: u32 = 1001;

/// Default review movie frame rate.
pub const DEFAULT_FPS: u32 = 24;

/// One scene/shot mapping row: the canonical shot id and its type token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneShotEntry {
    /// Canonical scene-shot id, e.g. `GEN63_SC_48_SH_0160`.
    pub scene_shot_id: String,
    /// Type token, e.g. `main_plate_v001`.
    pub type_token: String,
}

impl SceneShotEntry {
    pub fn new(scene_shot_id: impl Into<String>, type_token: impl Into<String>) -> Self {
        Self {
            scene_shot_id: scene_shot_id.into(),
            type_token: type_token.into(),
        }
    }

    /// Last underscore-delimited segment of the canonical id (`0160`).
    pub fn shot_tail(&self) -> &str {
        self.scene_shot_id
            .rsplit('_')
            .next()
            .unwrap_or(&self.scene_shot_id)
    }
}

/// Scene/shot metadata keyed by composite `"scene/shot"` strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneShotMap {
    entries: BTreeMap<String, SceneShotEntry>,
}

impl SceneShotMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, entry: SceneShotEntry) {
        self.entries.insert(key.into(), entry);
    }

    /// Add every entry of `other` whose key is not already present.
    pub fn merge_missing(&mut self, other: SceneShotMap) {
        for (key, entry) in other.entries {
            self.entries.entry(key).or_insert(entry);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SceneShotEntry)> {
        self.entries.iter()
    }

    /// Find the entry for a scene/shot pair.
    ///
    /// Keys must have exactly two `/`-separated segments and the second
    /// segment must equal `shot`. A key whose first segment equals `scene` is
    /// preferred; otherwise the first key containing `scene` anywhere wins.
    pub fn lookup(&self, scene: &str, shot: &str) -> Option<(&str, &SceneShotEntry)> {
        let mut fallback = None;

        for (key, entry) in &self.entries {
            let Some((key_scene, key_shot)) = key.split_once('/') else {
                continue;
            };
            if key_shot.contains('/') || key_shot != shot {
                continue;
            }
            if key_scene == scene {
                return Some((key.as_str(), entry));
            }
            if fallback.is_none() && key.contains(scene) {
                fallback = Some((key.as_str(), entry));
            }
        }

        fallback
    }
}

impl FromIterator<(String, SceneShotEntry)> for SceneShotMap {
    fn from_iter<I: IntoIterator<Item = (String, SceneShotEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// A type token split into its path segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeToken {
    pub variant: String,
    /// Empty when the token carries no product type.
    pub product_type: String,
    pub version: String,
}

impl TypeToken {
    /// Split `variant[_productType]_version` on underscores.
    ///
    /// Empty segments are ignored, so `_main_plate_v001` parses the same as
    /// `main_plate_v001`. Returns `None` for any other segment count.
    pub fn parse(token: &str) -> Option<Self> {
        let parts: Vec<&str> = token.split('_').filter(|p| !p.is_empty()).collect();
        match parts.as_slice() {
            [variant, product_type, version] => Some(Self {
                variant: (*variant).to_string(),
                product_type: (*product_type).to_string(),
                version: (*version).to_string(),
            }),
            [variant, version] => Some(Self {
                variant: (*variant).to_string(),
                product_type: String::new(),
                version: (*version).to_string(),
            }),
            _ => None,
        }
    }
}

/// How destination frame numbers are assigned to sequence members.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameNumbering {
    /// Members are numbered `start_frame, start_frame + 1, ...` in order.
    #[default]
    Renumber,
    /// Members keep their source frame numbers.
    Source,
}

/// What to do when a copied file's length differs from its source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeMismatchPolicy {
    /// Log a warning and count the copy as completed.
    #[default]
    Warn,
    /// Report the copy as failed.
    Fail,
}

/// Immutable configuration consulted by every unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectContext {
    pub project: Option<String>,
    pub destination: Option<PathBuf>,
    pub scene_shots: SceneShotMap,
    /// Re-copy destinations that already exist and are non-empty.
    pub overwrite: bool,
    /// Copy sequences even when frames are missing.
    pub force: bool,
    /// Proxy image format; `None` disables proxy derivation.
    pub proxy_format: Option<String>,
    pub generate_mov: bool,
    /// Run proxy and movie derivation concurrently.
    pub parallel_proxy: bool,
    pub fps: u32,
    pub start_frame: u32,
    pub frame_numbering: FrameNumbering,
    pub size_mismatch: SizeMismatchPolicy,
}

impl Default for ProjectContext {
    fn default() -> Self {
        Self {
            project: None,
            destination: None,
            scene_shots: SceneShotMap::default(),
            overwrite: false,
            force: false,
            proxy_format: None,
            generate_mov: false,
            parallel_proxy: false,
            fps: DEFAULT_FPS,
            start_frame: DEFAULT_START_FRAME,
            frame_numbering: FrameNumbering::default(),
            size_mismatch: SizeMismatchPolicy::default(),
        }
    }
}

impl ProjectContext {
    pub fn new(
        project: impl Into<String>,
        destination: impl Into<PathBuf>,
        scene_shots: SceneShotMap,
    ) -> Self {
        Self {
            project: Some(project.into()),
            destination: Some(destination.into()),
            scene_shots,
            ..Self::default()
        }
    }

    /// Whether proxy derivation is requested.
    pub fn wants_proxies(&self) -> bool {
        self.proxy_format.is_some()
    }
}

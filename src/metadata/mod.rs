//! Scene/shot metadata resolution.
//!
//! Each `SC_<scene>` folder is asked for its scene/shot map once, before any
//! copy starts. Resolvers are consulted in order; earlier resolvers win on
//! key collisions. The merged [`SceneShotMap`] is immutable afterwards.
//!
//! - [`csv`] -- reads the vendor CSV shipped inside the scene folder.
//! - [`StaticMetadataResolver`] -- entries from the `[shots]` config table.

pub mod csv;

pub use self::csv::CsvMetadataResolver;

use shotvault_common::{Result, SceneShotEntry, SceneShotMap};
use std::collections::BTreeMap;
use std::path::Path;

/// Source of scene/shot metadata for one scene folder.
pub trait MetadataResolver: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Entries for `scene`, read from (or alongside) `scene_dir`.
    ///
    /// An empty map means this resolver knows nothing about the scene.
    fn resolve(&self, scene: &str, scene_dir: &Path) -> Result<SceneShotMap>;
}

/// Resolver backed by a fixed table, typically the config `[shots]` section.
#[derive(Debug, Clone, Default)]
pub struct StaticMetadataResolver {
    entries: SceneShotMap,
}

impl StaticMetadataResolver {
    pub fn new(entries: SceneShotMap) -> Self {
        Self { entries }
    }

    /// Build from `"scene/shot" = [id, typeToken]` config rows.
    pub fn from_table(table: &BTreeMap<String, [String; 2]>) -> Self {
        Self {
            entries: table
                .iter()
                .map(|(key, [id, token])| (key.clone(), SceneShotEntry::new(id, token)))
                .collect(),
        }
    }
}

impl MetadataResolver for StaticMetadataResolver {
    fn name(&self) -> &str {
        "static"
    }

    fn resolve(&self, scene: &str, _scene_dir: &Path) -> Result<SceneShotMap> {
        Ok(self
            .entries
            .iter()
            .filter(|(key, _)| key.contains(scene))
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect())
    }
}

/// Ask every resolver about `scene` and merge the answers, earlier first.
///
/// A failing resolver is logged and skipped; the others still contribute.
pub fn resolve_scene(
    resolvers: &[Box<dyn MetadataResolver>],
    scene: &str,
    scene_dir: &Path,
) -> SceneShotMap {
    let mut merged = SceneShotMap::new();

    for resolver in resolvers {
        match resolver.resolve(scene, scene_dir) {
            Ok(map) => {
                tracing::debug!(
                    resolver = resolver.name(),
                    scene,
                    entries = map.len(),
                    "Resolved scene metadata"
                );
                merged.merge_missing(map);
            }
            Err(e) => {
                tracing::warn!(
                    resolver = resolver.name(),
                    scene,
                    "Metadata resolver failed: {}",
                    e
                );
            }
        }
    }

    if merged.is_empty() {
        tracing::info!(scene, dir = %scene_dir.display(), "No scene/shot metadata found");
    }

    merged
}

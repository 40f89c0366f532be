//! Vendor CSV metadata.
//!
//! The first `*.csv` file (by name) in a scene folder maps composite keys to
//! the canonical shot id and type token, one row per shot:
//!
//! ```text
//! # key,        canonical id,         type token
//! 48/0160,      GEN63_SC_48_SH_0160,  main_plate_v001
//! ```

use shotvault_common::{Error, Result, SceneShotEntry, SceneShotMap};
use std::path::{Path, PathBuf};

use super::MetadataResolver;

/// Reads scene/shot rows from the CSV inside a scene folder.
#[derive(Debug, Clone, Default)]
pub struct CsvMetadataResolver;

impl CsvMetadataResolver {
    pub fn new() -> Self {
        Self
    }

    /// First `.csv` file in `dir`, sorted by name.
    pub fn find_csv(dir: &Path) -> Result<Option<PathBuf>> {
        let entries = std::fs::read_dir(dir).map_err(|source| Error::Discovery {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut found: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
            })
            .collect();
        found.sort();
        Ok(found.into_iter().next())
    }
}

impl MetadataResolver for CsvMetadataResolver {
    fn name(&self) -> &str {
        "csv"
    }

    fn resolve(&self, scene: &str, scene_dir: &Path) -> Result<SceneShotMap> {
        let Some(path) = Self::find_csv(scene_dir)? else {
            tracing::debug!(scene, dir = %scene_dir.display(), "No csv file in scene folder");
            return Ok(SceneShotMap::new());
        };

        let content = std::fs::read_to_string(&path)?;
        let map = parse_csv(&content, &path);
        tracing::debug!(scene, file = %path.display(), entries = map.len(), "Loaded shot csv");
        Ok(map)
    }
}

fn clean_field(field: &str) -> &str {
    field.trim().trim_matches('"').trim()
}

/// Parse CSV rows of `key,canonicalId,typeToken[,...]`.
///
/// Blank lines and `#` comments are ignored; short rows are skipped with a
/// warning. Extra columns are ignored. A later row replaces an earlier one
/// with the same key.
pub fn parse_csv(content: &str, origin: &Path) -> SceneShotMap {
    let mut map = SceneShotMap::new();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split(',').map(clean_field).collect();
        match fields.as_slice() {
            [key, id, token, ..] if !key.is_empty() && !id.is_empty() && !token.is_empty() => {
                map.insert(*key, SceneShotEntry::new(*id, *token));
            }
            _ => {
                tracing::warn!(
                    file = %origin.display(),
                    line = index + 1,
                    "Skipping csv row without key, id and type token"
                );
            }
        }
    }

    map
}

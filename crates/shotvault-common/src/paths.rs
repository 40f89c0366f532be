//! Destination path resolution.
//!
//! Every destination lives under
//! `{destination}/{project}/work/sequences/SC_{scene}/SH_{shotTail}/{variant}`,
//! with plates in `{productType}/{version}`, proxies in `proxy/{version}` and
//! review movies in `mov/{version}`. Filenames follow
//! `{sceneShotId}_{typeToken}_{frame:04}_f{resolution}.{ext}`.

use std::path::{Path, PathBuf};

use crate::context::{FrameNumbering, ProjectContext, TypeToken};
use crate::error::{Error, Result};
use crate::types::{FileSequence, Frame, OutputPathSet, ShotUnit};

/// Resolved destination layout for one unit of work.
///
/// Built once per unit; every per-frame path is derived from it without
/// touching the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShotLayout {
    scene_shot_id: String,
    type_token: String,
    resolution: String,
    extension: String,
    plate_dir: PathBuf,
    proxy_dir: PathBuf,
    mov_dir: PathBuf,
}

impl ShotLayout {
    /// Resolve the layout for `unit`.
    ///
    /// Fails with [`Error::MissingMetadata`] when the project or destination
    /// is unset, when no scene/shot entry matches, or when the entry's type
    /// token cannot be decomposed.
    pub fn for_unit<U: ShotUnit + ?Sized>(unit: &U, ctx: &ProjectContext) -> Result<Self> {
        let label = unit.unit_label();
        let tags = unit.tags();

        let project = ctx
            .project
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::missing_metadata(&label, "project name is not set"))?;
        let destination = ctx
            .destination
            .as_deref()
            .filter(|d| !d.as_os_str().is_empty())
            .ok_or_else(|| Error::missing_metadata(&label, "destination root is not set"))?;

        let (_, entry) = ctx
            .scene_shots
            .lookup(&tags.scene, &tags.shot)
            .ok_or_else(|| {
                Error::missing_metadata(
                    &label,
                    format!("no scene/shot mapping for {}/{}", tags.scene, tags.shot),
                )
            })?;

        let token = TypeToken::parse(&entry.type_token).ok_or_else(|| {
            Error::missing_metadata(
                &label,
                format!("type token '{}' is not variant[_product]_version", entry.type_token),
            )
        })?;

        let variant_dir = destination
            .join(project)
            .join("work")
            .join("sequences")
            .join(format!("SC_{}", tags.scene))
            .join(format!("SH_{}", entry.shot_tail()))
            .join(&token.variant);

        let mut plate_dir = variant_dir.clone();
        if !token.product_type.is_empty() {
            plate_dir.push(&token.product_type);
        }
        plate_dir.push(&token.version);

        Ok(Self {
            scene_shot_id: entry.scene_shot_id.clone(),
            type_token: entry.type_token.trim_matches('_').to_string(),
            resolution: tags.resolution.clone(),
            extension: unit.output_extension(),
            plate_dir,
            proxy_dir: variant_dir.join("proxy").join(&token.version),
            mov_dir: variant_dir.join("mov").join(&token.version),
        })
    }

    pub fn plate_dir(&self) -> &Path {
        &self.plate_dir
    }

    pub fn proxy_dir(&self) -> &Path {
        &self.proxy_dir
    }

    pub fn mov_dir(&self) -> &Path {
        &self.mov_dir
    }

    fn stem(&self, frame_token: &str) -> String {
        format!(
            "{}_{}_{}_f{}",
            self.scene_shot_id, self.type_token, frame_token, self.resolution
        )
    }

    fn with_extension(&self, stem: String) -> String {
        if self.extension.is_empty() {
            stem
        } else {
            format!("{stem}.{}", self.extension)
        }
    }

    /// Plate filename for `frame`, always rendered with four digits.
    pub fn plate_filename(&self, frame: Frame) -> String {
        self.with_extension(self.stem(&format!("{frame:04}")))
    }

    /// Full plate path for `frame`.
    pub fn plate_path(&self, frame: Frame) -> PathBuf {
        self.plate_dir.join(self.plate_filename(frame))
    }

    /// printf-style pattern matching every plate of this layout.
    pub fn plate_pattern(&self) -> PathBuf {
        self.plate_dir.join(self.with_extension(self.stem("%04d")))
    }

    /// Proxy path for a plate frame in the given image extension.
    pub fn proxy_path(&self, frame: Frame, proxy_extension: &str) -> PathBuf {
        self.proxy_dir.join(format!(
            "{}.{proxy_extension}",
            self.stem(&format!("{frame:04}"))
        ))
    }

    /// Review movie path; one movie per sequence.
    pub fn movie_path(&self) -> PathBuf {
        self.mov_dir.join(format!(
            "{}_{}_f{}.mov",
            self.scene_shot_id, self.type_token, self.resolution
        ))
    }

    /// The destination triad for `frame`.
    pub fn output_paths(&self, frame: Frame) -> OutputPathSet {
        OutputPathSet {
            plate_file: self.plate_path(frame),
            proxy_dir: self.proxy_dir.clone(),
            mov_dir: self.mov_dir.clone(),
        }
    }
}

/// Resolve the destination triad for `unit` at `frame`.
pub fn resolve<U: ShotUnit + ?Sized>(
    unit: &U,
    ctx: &ProjectContext,
    frame: Frame,
) -> Result<OutputPathSet> {
    Ok(ShotLayout::for_unit(unit, ctx)?.output_paths(frame))
}

/// Destination frame number for every member of `sequence`, in member order.
pub fn destination_frames(sequence: &FileSequence, ctx: &ProjectContext) -> Vec<Frame> {
    match ctx.frame_numbering {
        FrameNumbering::Renumber => {
            let start = Frame::from(ctx.start_frame);
            (0..sequence.len() as Frame).map(|i| start + i).collect()
        }
        FrameNumbering::Source => sequence.frames().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{SceneShotEntry, SceneShotMap};
    use crate::types::{ShotTags, SingleFile};

    fn ctx() -> ProjectContext {
        let mut shots = SceneShotMap::new();
        shots.insert(
            "48/0160",
            SceneShotEntry::new("GEN63_SC_48_SH_0160", "main_plate_v001"),
        );
        shots.insert("48/0170", SceneShotEntry::new("GEN63_SC_48_SH_0170", "bg_v002"));
        ProjectContext::new("GEN63", "/studio", shots)
    }

    fn sequence(shot: &str, frames: &[Frame]) -> FileSequence {
        FileSequence::from_members(
            ShotTags::new("48", shot, "4448x3096"),
            "take",
            "exr",
            4,
            frames
                .iter()
                .map(|f| (*f, PathBuf::from(format!("/v/take_{f:04}.exr"))))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn resolves_plate_proxy_and_mov() {
        let paths = resolve(&sequence("0160", &[1, 2]), &ctx(), 1001).unwrap();
        let base = PathBuf::from("/studio/GEN63/work/sequences/SC_48/SH_0160/main");

        assert_eq!(
            paths.plate_file,
            base.join("plate/v001/GEN63_SC_48_SH_0160_main_plate_v001_1001_f4448x3096.exr")
        );
        assert_eq!(paths.proxy_dir, base.join("proxy/v001"));
        assert_eq!(paths.mov_dir, base.join("mov/v001"));
    }

    #[test]
    fn two_segment_token_has_no_product_dir() {
        let layout = ShotLayout::for_unit(&sequence("0170", &[1, 2]), &ctx()).unwrap();
        assert_eq!(
            layout.plate_dir(),
            Path::new("/studio/GEN63/work/sequences/SC_48/SH_0170/bg/v002")
        );
    }

    #[test]
    fn frame_is_always_four_digits() {
        let layout = ShotLayout::for_unit(&sequence("0160", &[1, 2]), &ctx()).unwrap();
        assert!(layout.plate_filename(7).contains("_0007_"));
        assert!(layout.plate_filename(12345).contains("_12345_"));
    }

    #[test]
    fn pattern_and_movie_names() {
        let layout = ShotLayout::for_unit(&sequence("0160", &[1, 2]), &ctx()).unwrap();
        assert_eq!(
            layout.plate_pattern().file_name().unwrap(),
            "GEN63_SC_48_SH_0160_main_plate_v001_%04d_f4448x3096.exr"
        );
        assert_eq!(
            layout.movie_path().file_name().unwrap(),
            "GEN63_SC_48_SH_0160_main_plate_v001_f4448x3096.mov"
        );
        assert_eq!(
            layout.proxy_path(1001, "jpg").file_name().unwrap(),
            "GEN63_SC_48_SH_0160_main_plate_v001_1001_f4448x3096.jpg"
        );
    }

    #[test]
    fn missing_mapping_is_missing_metadata() {
        let err = resolve(&sequence("0999", &[1, 2]), &ctx(), 1001).unwrap_err();
        assert!(matches!(err, Error::MissingMetadata { .. }));
    }

    #[test]
    fn unset_project_is_missing_metadata() {
        let mut ctx = ctx();
        ctx.project = None;
        let err = resolve(&sequence("0160", &[1, 2]), &ctx, 1001).unwrap_err();
        assert!(matches!(err, Error::MissingMetadata { .. }));

        let mut ctx = self::ctx();
        ctx.destination = None;
        assert!(resolve(&sequence("0160", &[1, 2]), &ctx, 1001).is_err());
    }

    #[test]
    fn single_file_uses_its_own_extension() {
        let file = SingleFile::new(ShotTags::new("48", "0160", "4448x3096"), "/v/Notes.TXT");
        let paths = resolve(&file, &ctx(), file.frame()).unwrap();
        assert!(paths
            .plate_file
            .to_string_lossy()
            .ends_with("_1001_f4448x3096.txt"));
    }

    #[test]
    fn destination_frame_numbering() {
        let seq = sequence("0160", &[1, 2, 4]);
        let mut ctx = ctx();
        assert_eq!(destination_frames(&seq, &ctx), vec![1001, 1002, 1003]);

        ctx.frame_numbering = FrameNumbering::Source;
        assert_eq!(destination_frames(&seq, &ctx), vec![1, 2, 4]);
    }
}

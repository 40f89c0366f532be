//! Ingestion coordinator.
//!
//! Walks the source trees for `SC_<scene>/<scene>_<shot>/<W>x<H>` folders,
//! discovers their contents, and fans every sequence and file out onto a
//! bounded unit pool. Units are independent: one failing or being skipped
//! never affects another.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use shotvault_av::{MovieDeriver, ProxyDeriver};
use shotvault_common::frames::has_gaps;
use shotvault_common::sequence::discover;
use shotvault_common::{
    Error, FileSequence, ProjectContext, SceneShotMap, ShotLayout, ShotTags, ShotUnit, SingleFile,
};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use super::artifacts::DerivedArtifactPipeline;
use super::builder::{file_task, ingest_file, ingest_sequence, sequence_tasks, UnitEnv};
use super::copy::CopyOrchestrator;
use super::report::{IngestReport, UnitKind, UnitReport};
use crate::metadata::{resolve_scene, MetadataResolver};

static SCENE_DIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^SC_(\d+)$").expect("scene regex is valid"));

static RESOLUTION_DIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+x\d+").expect("resolution regex is valid"));

/// One independent unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkUnit {
    Sequence(FileSequence),
    File(SingleFile),
}

impl WorkUnit {
    pub fn kind(&self) -> UnitKind {
        match self {
            WorkUnit::Sequence(_) => UnitKind::Sequence,
            WorkUnit::File(_) => UnitKind::File,
        }
    }

    pub fn label(&self) -> String {
        match self {
            WorkUnit::Sequence(s) => s.unit_label(),
            WorkUnit::File(f) => f.unit_label(),
        }
    }
}

/// Everything found in the source trees.
#[derive(Debug, Default)]
pub struct WalkResult {
    pub units: Vec<WorkUnit>,
    /// Scene/shot metadata merged across every scene folder.
    pub scene_shots: SceneShotMap,
    pub errors: Vec<Error>,
}

/// Shot folder name `<scene>_<shot>` for the given scene.
fn shot_from_dir(scene: &str, name: &str) -> Option<String> {
    let shot = name.strip_prefix(scene)?.strip_prefix('_')?;
    let valid = !shot.is_empty()
        && shot
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    valid.then(|| shot.to_string())
}

fn sorted_subdirs(dir: &Path) -> Result<Vec<(String, PathBuf)>, Error> {
    let entries = std::fs::read_dir(dir).map_err(|source| Error::Discovery {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut dirs: Vec<(String, PathBuf)> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .map(|e| (e.file_name().to_string_lossy().to_string(), e.path()))
        .collect();
    dirs.sort();
    Ok(dirs)
}

/// Walk one scene folder's shot and resolution folders.
fn walk_scene(scene: &str, scene_dir: &Path, result: &mut WalkResult) {
    let shot_dirs = match sorted_subdirs(scene_dir) {
        Ok(dirs) => dirs,
        Err(e) => {
            result.errors.push(e);
            return;
        }
    };

    for (name, shot_dir) in shot_dirs {
        let Some(shot) = shot_from_dir(scene, &name) else {
            continue;
        };
        let resolution_dirs = match sorted_subdirs(&shot_dir) {
            Ok(dirs) => dirs,
            Err(e) => {
                result.errors.push(e);
                continue;
            }
        };

        for (resolution, dir) in resolution_dirs {
            if !RESOLUTION_DIR.is_match(&resolution) {
                continue;
            }
            let tags = ShotTags::new(scene, shot.clone(), resolution);
            match discover(&dir, &tags) {
                Ok(found) => {
                    tracing::debug!(
                        dir = %dir.display(),
                        sequences = found.sequences.len(),
                        files = found.files.len(),
                        "Discovered resolution folder"
                    );
                    result
                        .units
                        .extend(found.sequences.into_iter().map(WorkUnit::Sequence));
                    result.units.extend(found.files.into_iter().map(WorkUnit::File));
                }
                Err(e) => {
                    tracing::warn!("{}", e);
                    result.errors.push(e);
                }
            }
        }
    }
}

/// Walk every source root, resolving metadata for each scene folder found.
pub fn walk_sources(roots: &[PathBuf], resolvers: &[Box<dyn MetadataResolver>]) -> WalkResult {
    let mut result = WalkResult::default();

    for root in roots {
        let mut it = WalkDir::new(root).sort_by_file_name().into_iter();
        while let Some(entry) = it.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(root.as_path()).to_path_buf();
                    result.errors.push(Error::Discovery {
                        path,
                        source: e.into(),
                    });
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            let Some(caps) = SCENE_DIR.captures(&name) else {
                if name.starts_with("SC_") {
                    tracing::debug!(
                        dir = %entry.path().display(),
                        "Folder is not named SC_<digits>, not treating it as a scene"
                    );
                }
                continue;
            };
            let scene = caps[1].to_string();
            tracing::info!(scene = %scene, dir = %entry.path().display(), "Found scene folder");

            let map = resolve_scene(resolvers, &scene, entry.path());
            result.scene_shots.merge_missing(map);
            walk_scene(&scene, entry.path(), &mut result);
            it.skip_current_dir();
        }
    }

    result
}

/// Plate paths a unit will write, empty when it will not copy at all.
fn planned_destinations(unit: &WorkUnit, ctx: &ProjectContext) -> Vec<PathBuf> {
    match unit {
        WorkUnit::Sequence(seq) => {
            if !ctx.force && has_gaps(seq.frames()) {
                return Vec::new();
            }
            match ShotLayout::for_unit(seq, ctx) {
                Ok(layout) => sequence_tasks(seq, &layout, ctx)
                    .into_iter()
                    .map(|t| t.dst)
                    .collect(),
                Err(_) => Vec::new(),
            }
        }
        WorkUnit::File(file) => match ShotLayout::for_unit(file, ctx) {
            Ok(layout) => vec![file_task(file, &layout).dst],
            Err(_) => Vec::new(),
        },
    }
}

/// Destinations owned by units earlier in the run.
///
/// Units claim in walk order, so within a folder sequences win over loose
/// files. A unit whose destinations overlap an earlier claim gets none of
/// them and is never started.
#[derive(Debug, Default)]
struct DestinationClaims {
    owners: HashMap<PathBuf, String>,
}

impl DestinationClaims {
    fn claim(&mut self, unit: &WorkUnit, ctx: &ProjectContext) -> Result<(), Error> {
        let label = unit.label();
        let dsts = planned_destinations(unit, ctx);
        let taken = dsts
            .iter()
            .find_map(|dst| self.owners.get(dst).map(|owner| (dst, owner)));
        if let Some((dst, owner)) = taken {
            return Err(Error::DestinationCollision {
                unit: label,
                dst: dst.clone(),
                owner: owner.clone(),
            });
        }
        for dst in dsts {
            self.owners.insert(dst, label.clone());
        }
        Ok(())
    }
}

enum PendingUnit {
    Rejected(UnitReport),
    Running(UnitKind, String, JoinHandle<UnitReport>),
}

/// Run-level knobs that are not part of the project context.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Size of both the unit pool and the frame pool.
    pub workers: usize,
    pub deadline: Option<Duration>,
    pub dry_run: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().max(4),
            deadline: None,
            dry_run: false,
        }
    }
}

/// Runs discovered units to completion.
pub struct Coordinator {
    ctx: Arc<ProjectContext>,
    proxy: Arc<dyn ProxyDeriver>,
    movie: Arc<dyn MovieDeriver>,
    options: IngestOptions,
    cancel: CancellationToken,
}

impl Coordinator {
    pub fn new(
        ctx: ProjectContext,
        proxy: Arc<dyn ProxyDeriver>,
        movie: Arc<dyn MovieDeriver>,
        options: IngestOptions,
    ) -> Self {
        Self {
            ctx: Arc::new(ctx),
            proxy,
            movie,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned token, e.g. one cancelled on Ctrl-C.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Fail fast on problems that would break every unit.
    pub fn check_context(&self) -> shotvault_common::Result<()> {
        if self.ctx.project.as_deref().map_or(true, str::is_empty) {
            return Err(Error::configuration("project name is not set"));
        }
        if self.ctx.destination.is_none() {
            return Err(Error::configuration("destination root is not set"));
        }
        Ok(())
    }

    /// Process every unit and return the aggregated report.
    pub async fn run(&self, units: Vec<WorkUnit>) -> IngestReport {
        let workers = self.options.workers.max(1);
        let frame_pool = Arc::new(Semaphore::new(workers));
        let unit_pool = Arc::new(Semaphore::new(workers));

        let env = Arc::new(UnitEnv {
            ctx: self.ctx.clone(),
            copier: CopyOrchestrator::new(
                frame_pool.clone(),
                self.ctx.overwrite,
                self.ctx.size_mismatch,
                self.cancel.clone(),
            ),
            artifacts: DerivedArtifactPipeline::new(
                self.proxy.clone(),
                self.movie.clone(),
                frame_pool,
                self.cancel.clone(),
            ),
            cancel: self.cancel.clone(),
            dry_run: self.options.dry_run,
        });

        let deadline = self.options.deadline.map(|limit| {
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(limit) => {
                        tracing::warn!(?limit, "Ingest deadline reached, cancelling");
                        cancel.cancel();
                    }
                    _ = cancel.cancelled() => {}
                }
            })
        });

        tracing::info!(units = units.len(), workers, "Starting ingest");

        let mut claims = DestinationClaims::default();
        let mut pending = Vec::with_capacity(units.len());
        for unit in units {
            let kind = unit.kind();
            let label = unit.label();
            if let Err(e) = claims.claim(&unit, &self.ctx) {
                tracing::warn!(unit = %label, "{}", e);
                pending.push(PendingUnit::Rejected(UnitReport::failed(kind, label, &e)));
                continue;
            }

            let pool = unit_pool.clone();
            let env = env.clone();

            let handle = tokio::spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = env.cancel.cancelled() => None,
                    permit = pool.acquire_owned() => permit.ok(),
                };
                let Some(_permit) = permit else {
                    return UnitReport::cancelled(unit.kind(), unit.label());
                };
                match unit {
                    WorkUnit::Sequence(seq) => ingest_sequence(seq, &env).await,
                    WorkUnit::File(file) => ingest_file(file, &env).await,
                }
            });
            pending.push(PendingUnit::Running(kind, label, handle));
        }

        let mut report = IngestReport::default();
        for unit in pending {
            let (kind, label, handle) = match unit {
                PendingUnit::Rejected(unit_report) => {
                    report.units.push(unit_report);
                    continue;
                }
                PendingUnit::Running(kind, label, handle) => (kind, label, handle),
            };
            let unit_report = match handle.await {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!(unit = %label, "Unit task failed: {}", e);
                    UnitReport::failed(
                        kind,
                        label,
                        &Error::Io(std::io::Error::other(e.to_string())),
                    )
                }
            };
            report.units.push(unit_report);
        }

        if let Some(timer) = deadline {
            timer.abort();
        }

        tracing::info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            skipped = report.skipped().len(),
            copied = report.total_copied(),
            "Ingest finished"
        );
        report
    }
}

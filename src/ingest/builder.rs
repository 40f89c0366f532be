//! Per-unit build pipelines.
//!
//! A sequence goes through: metadata resolution, continuity check, path
//! resolution for every member, the copy barrier, then derivations. A
//! single file is resolved and copied only.

use std::sync::Arc;

use shotvault_common::frames::check_continuity;
use shotvault_common::paths::destination_frames;
use shotvault_common::{Error, FileSequence, ProjectContext, ShotLayout, ShotUnit, SingleFile};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::artifacts::DerivedArtifactPipeline;
use super::copy::{CopyBatch, CopyOrchestrator, CopyTask};
use super::report::{PlannedCopy, UnitKind, UnitReport, UnitStatus};

/// Everything a unit task needs, shared read-only across tasks.
#[derive(Debug, Clone)]
pub struct UnitEnv {
    pub ctx: Arc<ProjectContext>,
    pub copier: CopyOrchestrator,
    pub artifacts: DerivedArtifactPipeline,
    pub cancel: CancellationToken,
    pub dry_run: bool,
}

/// Ingest one frame sequence.
pub async fn ingest_sequence(sequence: FileSequence, env: &UnitEnv) -> UnitReport {
    let tags = sequence.tags().clone();
    let span = tracing::info_span!(
        "sequence",
        scene = %tags.scene,
        shot = %tags.shot,
        base = %sequence.base_name(),
    );
    build_sequence(sequence, env).instrument(span).await
}

async fn build_sequence(sequence: FileSequence, env: &UnitEnv) -> UnitReport {
    let label = sequence.unit_label();
    let ctx = env.ctx.as_ref();

    if env.cancel.is_cancelled() {
        return UnitReport::cancelled(UnitKind::Sequence, label);
    }

    let layout = match ShotLayout::for_unit(&sequence, ctx) {
        Ok(layout) => layout,
        Err(e) => {
            tracing::warn!("Skipping sequence: {}", e);
            return UnitReport::skipped(UnitKind::Sequence, label, &e);
        }
    };

    let mut report = UnitReport::new(UnitKind::Sequence, label.clone());

    let continuity = check_continuity(sequence.frames());
    if continuity.has_gaps() {
        let gaps = Error::MissingFrames {
            sequence: label.clone(),
            missing: continuity.missing,
        };
        if !ctx.force {
            tracing::warn!("{}; skipping (use --force to copy anyway)", gaps);
            return UnitReport::skipped(UnitKind::Sequence, label, &gaps);
        }
        tracing::warn!("{}; copying anyway", gaps);
        report.warnings.push(gaps.to_string());
    }

    // Every destination is fixed before the first copy is dispatched.
    let tasks = sequence_tasks(&sequence, &layout, ctx);

    if env.dry_run {
        report.status = UnitStatus::Planned;
        report.planned = planned(&tasks);
        return report;
    }

    tracing::info!(frames = tasks.len(), dir = %layout.plate_dir().display(), "Copying sequence");
    let batch = env.copier.run(tasks).await;
    apply_copy_batch(&mut report, &batch);

    if batch.was_cancelled() {
        report.status = UnitStatus::Cancelled;
        return report;
    }

    let plates = batch.materialised();
    let mut artifacts_cancelled = false;
    if !plates.is_empty() && !env.cancel.is_cancelled() {
        let artifacts = env
            .artifacts
            .run(ctx, &layout, &plates, batch.all_materialised())
            .await;
        report.proxies = artifacts.proxies.len();
        report.movie = artifacts.movie;
        report.warnings.extend(artifacts.skipped);
        for e in &artifacts.errors {
            artifacts_cancelled |= matches!(e, Error::Cancelled(_));
            report.record_error(e);
        }
    }

    report.status = if artifacts_cancelled {
        UnitStatus::Cancelled
    } else if batch.failed() == 0 && report.errors.is_empty() {
        UnitStatus::Completed
    } else if report.materialised() > 0 {
        UnitStatus::Partial
    } else {
        UnitStatus::Failed
    };

    tracing::info!(
        status = ?report.status,
        copied = report.copied,
        skipped = report.skipped_existing,
        failed = report.failed,
        proxies = report.proxies,
        "Sequence done"
    );
    report
}

/// Ingest one file that did not belong to a sequence.
pub async fn ingest_file(file: SingleFile, env: &UnitEnv) -> UnitReport {
    let span = tracing::info_span!(
        "file",
        scene = %file.tags().scene,
        shot = %file.tags().shot,
        name = %file.label(),
    );
    build_file(file, env).instrument(span).await
}

async fn build_file(file: SingleFile, env: &UnitEnv) -> UnitReport {
    let label = file.unit_label();

    if env.cancel.is_cancelled() {
        return UnitReport::cancelled(UnitKind::File, label);
    }

    let layout = match ShotLayout::for_unit(&file, env.ctx.as_ref()) {
        Ok(layout) => layout,
        Err(e) => {
            tracing::warn!("Skipping file: {}", e);
            return UnitReport::skipped(UnitKind::File, label, &e);
        }
    };

    let tasks = vec![file_task(&file, &layout)];

    let mut report = UnitReport::new(UnitKind::File, label);
    if env.dry_run {
        report.status = UnitStatus::Planned;
        report.planned = planned(&tasks);
        return report;
    }

    let batch = env.copier.run(tasks).await;
    apply_copy_batch(&mut report, &batch);
    report.status = if batch.was_cancelled() {
        UnitStatus::Cancelled
    } else if batch.failed() == 0 {
        UnitStatus::Completed
    } else {
        UnitStatus::Failed
    };
    report
}

/// One copy per member, in frame order, onto the resolved plate paths.
pub(crate) fn sequence_tasks(
    sequence: &FileSequence,
    layout: &ShotLayout,
    ctx: &ProjectContext,
) -> Vec<CopyTask> {
    sequence
        .members()
        .zip(destination_frames(sequence, ctx))
        .map(|((_, src), frame)| CopyTask {
            src: src.to_path_buf(),
            dst: layout.plate_path(frame),
            frame,
        })
        .collect()
}

pub(crate) fn file_task(file: &SingleFile, layout: &ShotLayout) -> CopyTask {
    CopyTask {
        src: file.path().to_path_buf(),
        dst: layout.plate_path(file.frame()),
        frame: file.frame(),
    }
}

fn planned(tasks: &[CopyTask]) -> Vec<PlannedCopy> {
    tasks
        .iter()
        .map(|t| PlannedCopy {
            src: t.src.clone(),
            dst: t.dst.clone(),
        })
        .collect()
}

fn apply_copy_batch(report: &mut UnitReport, batch: &CopyBatch) {
    report.copied = batch.copied();
    report.skipped_existing = batch.skipped_existing();
    report.failed = batch.failed();
    if batch.size_mismatches() > 0 {
        let n = batch.size_mismatches();
        report
            .warnings
            .push(format!("{n} copies differ in size from their source"));
    }
    for e in batch.errors() {
        report.record_error(e);
    }
}

//! Bounded, cancellable plate copying.
//!
//! A [`CopyOrchestrator`] copies a batch of `(source, destination)` pairs on
//! a shared worker pool and returns only once every pair has finished. One
//! pair failing never aborts its siblings.

use std::ffi::OsString;
use std::fs::{self, File, FileTimes};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use shotvault_common::{Error, Frame, Result, SizeMismatchPolicy};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// One file to copy, with the destination frame it lands on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyTask {
    pub src: PathBuf,
    pub dst: PathBuf,
    pub frame: Frame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    /// Bytes were written. `size_mismatch` is set when the lengths differed
    /// under the warn policy.
    Copied { bytes: u64, size_mismatch: bool },
    /// Destination already held a non-empty file and overwrite is off.
    SkippedExisting,
}

#[derive(Debug)]
pub struct CopyResult {
    pub task: CopyTask,
    pub outcome: Result<CopyOutcome>,
}

/// All results of one batch, sorted by destination frame.
#[derive(Debug, Default)]
pub struct CopyBatch {
    pub results: Vec<CopyResult>,
}

impl CopyBatch {
    pub fn copied(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, Ok(CopyOutcome::Copied { .. })))
            .count()
    }

    pub fn skipped_existing(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, Ok(CopyOutcome::SkippedExisting)))
            .count()
    }

    pub fn size_mismatches(&self) -> usize {
        self.results
            .iter()
            .filter(|r| {
                matches!(
                    r.outcome,
                    Ok(CopyOutcome::Copied {
                        size_mismatch: true,
                        ..
                    })
                )
            })
            .count()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Error> {
        self.results.iter().filter_map(|r| r.outcome.as_ref().err())
    }

    pub fn failed(&self) -> usize {
        self.errors().count()
    }

    pub fn was_cancelled(&self) -> bool {
        self.errors().any(|e| matches!(e, Error::Cancelled(_)))
    }

    /// `(frame, destination)` of every plate now in place, ascending by frame.
    pub fn materialised(&self) -> Vec<(Frame, PathBuf)> {
        self.results
            .iter()
            .filter(|r| r.outcome.is_ok())
            .map(|r| (r.task.frame, r.task.dst.clone()))
            .collect()
    }

    pub fn all_materialised(&self) -> bool {
        self.results.iter().all(|r| r.outcome.is_ok())
    }
}

/// Copies batches of files on a bounded pool of blocking workers.
#[derive(Debug, Clone)]
pub struct CopyOrchestrator {
    pool: Arc<Semaphore>,
    overwrite: bool,
    size_mismatch: SizeMismatchPolicy,
    cancel: CancellationToken,
}

impl CopyOrchestrator {
    /// `pool` bounds concurrent copies and may be shared with other batches.
    pub fn new(
        pool: Arc<Semaphore>,
        overwrite: bool,
        size_mismatch: SizeMismatchPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            pool,
            overwrite,
            size_mismatch,
            cancel,
        }
    }

    /// Copy every task and wait for all of them.
    ///
    /// Tasks still waiting for a worker when the token is cancelled are
    /// reported as [`Error::Cancelled`]; copies already running finish.
    pub async fn run(&self, tasks: Vec<CopyTask>) -> CopyBatch {
        let mut handles = Vec::with_capacity(tasks.len());

        for task in tasks {
            let pool = self.pool.clone();
            let cancel = self.cancel.clone();
            let overwrite = self.overwrite;
            let policy = self.size_mismatch;
            let spawned = task.clone();

            let handle = tokio::spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    permit = pool.acquire_owned() => permit.ok(),
                };
                let Some(_permit) = permit else {
                    return Err(Error::cancelled(format!("copy of {}", spawned.src.display())));
                };
                if cancel.is_cancelled() {
                    return Err(Error::cancelled(format!("copy of {}", spawned.src.display())));
                }

                tokio::task::spawn_blocking(move || {
                    copy_file(&spawned.src, &spawned.dst, overwrite, policy)
                })
                .await
                .map_err(|e| Error::Io(std::io::Error::other(e)))?
            });
            handles.push((task, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (task, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(Error::Io(std::io::Error::other(e))),
            };
            if let Err(e) = &outcome {
                if !matches!(e, Error::Cancelled(_)) {
                    tracing::error!(src = %task.src.display(), "Copy failed: {}", e);
                }
            }
            results.push(CopyResult { task, outcome });
        }

        results.sort_by_key(|r| r.task.frame);
        CopyBatch { results }
    }
}

fn file_len(path: &Path) -> Option<u64> {
    fs::metadata(path).ok().filter(|m| m.is_file()).map(|m| m.len())
}

/// Hidden sibling a copy is written to before it replaces `dst`.
fn staging_path(dst: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(dst.file_name().unwrap_or_default());
    name.push(".part");
    dst.with_file_name(name)
}

fn discard(staged: &Path) {
    if let Err(e) = fs::remove_file(staged) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %staged.display(), "Could not remove partial copy: {}", e);
        }
    }
}

/// Compare source and copied lengths under `policy`.
///
/// Returns whether the lengths differ. Under [`SizeMismatchPolicy::Fail`] a
/// difference is an error instead.
pub fn check_len(
    src: &Path,
    dst: &Path,
    src_len: u64,
    dst_len: u64,
    policy: SizeMismatchPolicy,
) -> Result<bool> {
    if src_len == dst_len {
        return Ok(false);
    }
    let mismatch = Error::SizeMismatch {
        src: src.to_path_buf(),
        dst: dst.to_path_buf(),
        src_len,
        dst_len,
    };
    match policy {
        SizeMismatchPolicy::Warn => {
            tracing::warn!("{}", mismatch);
            Ok(true)
        }
        SizeMismatchPolicy::Fail => Err(mismatch),
    }
}

/// Copy one file, preserving permissions and timestamps.
///
/// An existing non-empty destination is left alone when the source is also
/// non-empty and `overwrite` is off.
pub fn copy_file(
    src: &Path,
    dst: &Path,
    overwrite: bool,
    policy: SizeMismatchPolicy,
) -> Result<CopyOutcome> {
    let src_meta = fs::metadata(src).map_err(|source| Error::CopyIo {
        src: src.to_path_buf(),
        dst: dst.to_path_buf(),
        source,
    })?;
    let src_len = src_meta.len();

    if !overwrite && src_len > 0 && file_len(dst).is_some_and(|len| len > 0) {
        tracing::debug!(dst = %dst.display(), "Destination already exists, skipping");
        return Ok(CopyOutcome::SkippedExisting);
    }

    copy_staged(src, dst, &src_meta, src_len, policy)
}

/// Copy `src` to a staging file and move it onto `dst` once its length
/// checks out against `expected_len`.
///
/// On any failure the staging file is removed and `dst` is left as it was,
/// so a failed copy is never mistaken for a materialised plate later.
fn copy_staged(
    src: &Path,
    dst: &Path,
    src_meta: &fs::Metadata,
    expected_len: u64,
    policy: SizeMismatchPolicy,
) -> Result<CopyOutcome> {
    let io_err = |source: std::io::Error| Error::CopyIo {
        src: src.to_path_buf(),
        dst: dst.to_path_buf(),
        source,
    };

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let staged = staging_path(dst);
    let written = (|| -> Result<(u64, bool)> {
        // Permissions come along with fs::copy.
        let bytes = fs::copy(src, &staged).map_err(io_err)?;
        preserve_times(src_meta, &staged);
        let staged_len = fs::metadata(&staged).map_err(io_err)?.len();
        let size_mismatch = check_len(src, dst, expected_len, staged_len, policy)?;
        fs::rename(&staged, dst).map_err(io_err)?;
        Ok((bytes, size_mismatch))
    })();

    let (bytes, size_mismatch) = match written {
        Ok(done) => done,
        Err(e) => {
            discard(&staged);
            return Err(e);
        }
    };

    tracing::debug!(src = %src.display(), dst = %dst.display(), bytes, "Copied");
    Ok(CopyOutcome::Copied {
        bytes,
        size_mismatch,
    })
}

fn preserve_times(src_meta: &fs::Metadata, dst: &Path) {
    let mut times = FileTimes::new();
    if let Ok(accessed) = src_meta.accessed() {
        times = times.set_accessed(accessed);
    }
    if let Ok(modified) = src_meta.modified() {
        times = times.set_modified(modified);
    }

    let result = File::options()
        .write(true)
        .open(dst)
        .and_then(|f| f.set_times(times));
    if let Err(e) = result {
        tracing::warn!(dst = %dst.display(), "Could not preserve timestamps: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn orchestrator(overwrite: bool) -> CopyOrchestrator {
        CopyOrchestrator::new(
            Arc::new(Semaphore::new(4)),
            overwrite,
            SizeMismatchPolicy::Warn,
            CancellationToken::new(),
        )
    }

    fn tasks(tmp: &TempDir, count: Frame) -> Vec<CopyTask> {
        let src_dir = tmp.path().join("src");
        fs::create_dir_all(&src_dir).unwrap();
        (0..count)
            .map(|i| {
                let src = src_dir.join(format!("take_{:04}.exr", i + 1));
                fs::write(&src, vec![b'x'; 100 + i as usize]).unwrap();
                CopyTask {
                    src,
                    dst: tmp.path().join("dst/nested").join(format!("plate_{}.exr", 1001 + i)),
                    frame: 1001 + i,
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn copies_and_creates_parents() {
        let tmp = TempDir::new().unwrap();
        let batch = orchestrator(false).run(tasks(&tmp, 3)).await;

        assert_eq!(batch.copied(), 3);
        assert_eq!(batch.failed(), 0);
        for r in &batch.results {
            assert_eq!(
                fs::metadata(&r.task.dst).unwrap().len(),
                fs::metadata(&r.task.src).unwrap().len()
            );
        }
        let frames: Vec<Frame> = batch.materialised().iter().map(|(f, _)| *f).collect();
        assert_eq!(frames, vec![1001, 1002, 1003]);
    }

    #[tokio::test]
    async fn second_run_skips_everything() {
        let tmp = TempDir::new().unwrap();
        let tasks = tasks(&tmp, 3);
        let copier = orchestrator(false);

        copier.run(tasks.clone()).await;
        let second = copier.run(tasks).await;
        assert_eq!(second.copied(), 0);
        assert_eq!(second.skipped_existing(), 3);
        assert!(second.all_materialised());
    }

    #[tokio::test]
    async fn overwrite_recopies() {
        let tmp = TempDir::new().unwrap();
        let tasks = tasks(&tmp, 2);
        orchestrator(false).run(tasks.clone()).await;
        let again = orchestrator(true).run(tasks).await;
        assert_eq!(again.copied(), 2);
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_siblings() {
        let tmp = TempDir::new().unwrap();
        let mut tasks = tasks(&tmp, 3);
        tasks[1].src = tmp.path().join("vanished.exr");

        let batch = orchestrator(false).run(tasks).await;
        assert_eq!(batch.copied(), 2);
        assert_eq!(batch.failed(), 1);
        assert!(matches!(
            batch.results[1].outcome,
            Err(Error::CopyIo { .. })
        ));
        assert!(!batch.all_materialised());
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let tmp = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let copier = CopyOrchestrator::new(
            Arc::new(Semaphore::new(2)),
            false,
            SizeMismatchPolicy::Warn,
            cancel,
        );
        let batch = copier.run(tasks(&tmp, 3)).await;
        assert_eq!(batch.copied(), 0);
        assert!(batch.was_cancelled());
        assert!(!tmp.path().join("dst").exists());
    }

    #[test]
    fn empty_destination_is_recopied() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a.exr");
        let dst = tmp.path().join("b.exr");
        fs::write(&src, b"plate").unwrap();
        fs::write(&dst, b"").unwrap();

        let outcome = copy_file(&src, &dst, false, SizeMismatchPolicy::Fail).unwrap();
        assert_eq!(
            outcome,
            CopyOutcome::Copied {
                bytes: 5,
                size_mismatch: false
            }
        );
    }

    #[test]
    fn equal_lengths_are_not_a_mismatch() {
        let (src, dst) = (Path::new("/a.exr"), Path::new("/b.exr"));
        assert!(!check_len(src, dst, 10, 10, SizeMismatchPolicy::Fail).unwrap());
        assert!(!check_len(src, dst, 10, 10, SizeMismatchPolicy::Warn).unwrap());
    }

    #[test]
    fn length_mismatch_follows_policy() {
        let (src, dst) = (Path::new("/a.exr"), Path::new("/b.exr"));
        assert!(check_len(src, dst, 10, 7, SizeMismatchPolicy::Warn).unwrap());
        assert!(matches!(
            check_len(src, dst, 10, 7, SizeMismatchPolicy::Fail),
            Err(Error::SizeMismatch {
                src_len: 10,
                dst_len: 7,
                ..
            })
        ));
    }

    // A source that changed length between stat and copy.
    #[test]
    fn short_copy_is_kept_under_warn() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a.exr");
        let dst = tmp.path().join("out/b.exr");
        fs::write(&src, b"plate").unwrap();
        let meta = fs::metadata(&src).unwrap();

        let outcome = copy_staged(&src, &dst, &meta, 9, SizeMismatchPolicy::Warn).unwrap();
        assert_eq!(
            outcome,
            CopyOutcome::Copied {
                bytes: 5,
                size_mismatch: true
            }
        );
        assert_eq!(fs::read(&dst).unwrap(), b"plate");
        assert!(!staging_path(&dst).exists());
    }

    #[test]
    fn short_copy_leaves_nothing_under_fail() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a.exr");
        let dst = tmp.path().join("out/b.exr");
        fs::write(&src, b"plate").unwrap();
        let meta = fs::metadata(&src).unwrap();

        let err = copy_staged(&src, &dst, &meta, 9, SizeMismatchPolicy::Fail).unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { .. }));
        assert!(!dst.exists());
        assert!(!staging_path(&dst).exists());

        // The next run copies again instead of trusting a bad plate.
        let outcome = copy_file(&src, &dst, false, SizeMismatchPolicy::Fail).unwrap();
        assert!(matches!(outcome, CopyOutcome::Copied { .. }));
    }

    #[test]
    fn failed_overwrite_keeps_previous_plate() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a.exr");
        let dst = tmp.path().join("b.exr");
        fs::write(&src, b"new plate").unwrap();
        fs::write(&dst, b"old plate").unwrap();
        let meta = fs::metadata(&src).unwrap();

        assert!(copy_staged(&src, &dst, &meta, 1, SizeMismatchPolicy::Fail).is_err());
        assert_eq!(fs::read(&dst).unwrap(), b"old plate");
    }

    #[test]
    fn staging_file_is_hidden_sibling() {
        assert_eq!(
            staging_path(Path::new("/p/plate_1001.exr")),
            PathBuf::from("/p/.plate_1001.exr.part")
        );
    }

    #[test]
    fn modification_time_is_preserved() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a.exr");
        let dst = tmp.path().join("out/b.exr");
        fs::write(&src, b"plate").unwrap();
        let old = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        File::options()
            .write(true)
            .open(&src)
            .unwrap()
            .set_modified(old)
            .unwrap();

        copy_file(&src, &dst, false, SizeMismatchPolicy::Warn).unwrap();
        assert_eq!(fs::metadata(&dst).unwrap().modified().unwrap(), old);
    }
}

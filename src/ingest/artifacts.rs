//! Proxy and review movie derivation for a copied sequence.
//!
//! Runs after the sequence's copy barrier. Proxies fan out one task per
//! plate on the shared frame pool; the movie is a single encode per
//! sequence. In parallel mode both derivations run at once.

use std::path::PathBuf;
use std::sync::Arc;

use shotvault_av::{FramePattern, MovieDeriver, ProxyDeriver, ProxyFormat};
use shotvault_common::frames::{find_missing_frames, format_ranges};
use shotvault_common::{Error, Frame, ProjectContext, ShotLayout};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// What the derivation stage produced for one sequence.
#[derive(Debug, Default)]
pub struct ArtifactReport {
    pub proxies: Vec<PathBuf>,
    pub movie: Option<PathBuf>,
    pub errors: Vec<Error>,
    /// Derivations deliberately not attempted, with the reason.
    pub skipped: Vec<String>,
}

/// Derives proxies and movies through injected backends.
#[derive(Clone)]
pub struct DerivedArtifactPipeline {
    proxy: Arc<dyn ProxyDeriver>,
    movie: Arc<dyn MovieDeriver>,
    pool: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for DerivedArtifactPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedArtifactPipeline").finish_non_exhaustive()
    }
}

impl DerivedArtifactPipeline {
    pub fn new(
        proxy: Arc<dyn ProxyDeriver>,
        movie: Arc<dyn MovieDeriver>,
        pool: Arc<Semaphore>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            proxy,
            movie,
            pool,
            cancel,
        }
    }

    /// Derive the requested artifacts for a sequence.
    ///
    /// `plates` are the materialised `(frame, path)` plates in ascending
    /// frame order; `complete` is whether every member reached the
    /// destination.
    pub async fn run(
        &self,
        ctx: &ProjectContext,
        layout: &ShotLayout,
        plates: &[(Frame, PathBuf)],
        complete: bool,
    ) -> ArtifactReport {
        let mut report = ArtifactReport::default();

        let proxy_format = match ctx.proxy_format.as_deref().map(str::parse::<ProxyFormat>) {
            None => None,
            Some(Ok(format)) => Some(format),
            Some(Err(e)) => {
                tracing::warn!("{}", e);
                report.errors.push(e);
                None
            }
        };

        let movie_input = if ctx.generate_mov {
            match self.movie_input(layout, plates, complete) {
                Ok(input) => Some(input),
                Err(reason) => {
                    tracing::warn!(reason = %reason, "Skipping review movie");
                    report.skipped.push(reason);
                    None
                }
            }
        } else {
            None
        };

        let proxies = async {
            match proxy_format {
                Some(format) => self.derive_proxies(layout, plates, format).await,
                None => (Vec::new(), Vec::new()),
            }
        };
        let movie = async {
            match &movie_input {
                Some(input) => Some(self.derive_movie(layout, input, ctx.fps).await),
                None => None,
            }
        };

        let ((proxy_paths, proxy_errors), movie_result) = if ctx.parallel_proxy {
            tokio::join!(proxies, movie)
        } else {
            let p = proxies.await;
            (p, movie.await)
        };

        report.proxies = proxy_paths;
        report.errors.extend(proxy_errors);
        match movie_result {
            Some(Ok(path)) => report.movie = Some(path),
            Some(Err(e)) => report.errors.push(e),
            None => {}
        }

        report
    }

    /// The movie's input pattern, or why no movie should be made.
    fn movie_input(
        &self,
        layout: &ShotLayout,
        plates: &[(Frame, PathBuf)],
        complete: bool,
    ) -> std::result::Result<FramePattern, String> {
        if !complete {
            return Err("not every frame reached the destination".to_string());
        }
        let Some(&(first, _)) = plates.first() else {
            return Err("no plates to encode".to_string());
        };
        let frames: Vec<Frame> = plates.iter().map(|(f, _)| *f).collect();
        let missing = find_missing_frames(&frames);
        if !missing.is_empty() {
            return Err(format!(
                "destination frames have gaps: [{}]",
                format_ranges(&missing)
            ));
        }
        Ok(FramePattern::new(layout.plate_pattern(), first))
    }

    async fn derive_proxies(
        &self,
        layout: &ShotLayout,
        plates: &[(Frame, PathBuf)],
        format: ProxyFormat,
    ) -> (Vec<PathBuf>, Vec<Error>) {
        let mut handles = Vec::with_capacity(plates.len());

        for (frame, plate) in plates {
            let deriver = self.proxy.clone();
            let pool = self.pool.clone();
            let cancel = self.cancel.clone();
            let input = plate.clone();
            let output = layout.proxy_path(*frame, format.extension());

            handles.push(tokio::spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    permit = pool.acquire_owned() => permit.ok(),
                };
                if permit.is_none() {
                    return Err(Error::cancelled(format!("proxy for {}", input.display())));
                }
                deriver.derive(&input, &output, format, &cancel).await?;
                Ok(output)
            }));
        }

        let mut paths = Vec::new();
        let mut errors = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(Ok(path)) => paths.push(path),
                Ok(Err(e)) => {
                    tracing::warn!("Proxy generation failed: {}", e);
                    errors.push(e);
                }
                Err(e) => errors.push(Error::tool("proxy", format!("task failed: {e}"))),
            }
        }

        tracing::info!(generated = paths.len(), failed = errors.len(), %format, "Proxies done");
        (paths, errors)
    }

    async fn derive_movie(
        &self,
        layout: &ShotLayout,
        input: &FramePattern,
        fps: u32,
    ) -> shotvault_common::Result<PathBuf> {
        let output = layout.movie_path();
        self.movie.derive(input, &output, fps, &self.cancel).await?;
        Ok(output)
    }
}

mod cli;

use shotvault::config::{self, Config};
use shotvault::ingest::{
    locate_sources, walk_sources, Coordinator, IngestOptions, IngestReport, SourceRequest,
    UnitStatus,
};
use shotvault::metadata::{CsvMetadataResolver, MetadataResolver, StaticMetadataResolver};
use shotvault_av::{FfmpegMovieDeriver, OiioProxyDeriver, ToolRegistry};
use shotvault_common::frames::{check_continuity, format_ranges};
use shotvault_common::{sequence, ShotTags};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, IngestArgs};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "shotvault=debug,shotvault_av=debug,shotvault_common=debug".to_string()
        } else {
            "shotvault=info,shotvault_av=info,shotvault_common=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Ingest(args) => {
            let rt = tokio::runtime::Runtime::new()?;
            let failed = rt.block_on(run_ingest(args, cli.config.as_deref()))?;
            if failed {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Scan {
            dir,
            scene,
            shot,
            resolution,
            json,
        } => scan_dir(&dir, ShotTags::new(scene, shot, resolution), json),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
    }
}

/// Command-line flags win over the config file.
fn apply_ingest_args(config: &mut Config, args: &IngestArgs) {
    if let Some(source) = &args.source {
        config.project.source = Some(source.clone());
    }
    if let Some(destination) = &args.destination {
        config.project.destination = Some(destination.clone());
    }
    if let Some(project) = &args.project {
        config.project.name = Some(project.clone());
    }
    if let Some(format) = &args.proxy_format {
        config.ingest.proxy_format = Some(format.clone());
        config.ingest.generate_proxy = true;
    }
    if let Some(fps) = args.fps {
        config.ingest.fps = fps;
    }
    if let Some(workers) = args.workers {
        config.ingest.workers = Some(workers);
    }
    config.ingest.overwrite |= args.overwrite;
    config.ingest.force |= args.force;
    config.ingest.generate_mov |= args.mov;
    config.ingest.parallel_proxy |= args.parallel_proxy;
}

async fn run_ingest(args: IngestArgs, config_path: Option<&Path>) -> Result<bool> {
    let mut config = config::load_config_or_default(config_path)?;
    apply_ingest_args(&mut config, &args);
    for warning in config::validate_config(&config)? {
        tracing::warn!("{}", warning);
    }

    let sources = locate_sources(&SourceRequest {
        root: config.project.source.clone(),
        project: config.project.name.clone(),
        input_date: args.input_date.clone(),
        vendor: args.vendor.clone(),
    })
    .context("Failed to locate source folders")?;

    let resolvers: Vec<Box<dyn MetadataResolver>> = vec![
        Box::new(CsvMetadataResolver::new()),
        Box::new(StaticMetadataResolver::from_table(&config.shots)),
    ];
    let walk = tokio::task::spawn_blocking(move || walk_sources(&sources, &resolvers)).await?;
    tracing::info!(
        units = walk.units.len(),
        shots = walk.scene_shots.len(),
        errors = walk.errors.len(),
        "Source walk finished"
    );

    let registry = ToolRegistry::discover(&config.tools);
    let ctx = config.project_context(walk.scene_shots);
    if ctx.wants_proxies() && !registry.is_available(shotvault_av::tools::OIIOTOOL) {
        tracing::warn!("oiiotool not found; proxies will fail");
    }
    if ctx.generate_mov && !registry.is_available(shotvault_av::tools::FFMPEG) {
        tracing::warn!("ffmpeg not found; review movies will fail");
    }

    let options = IngestOptions {
        workers: config.ingest.worker_count(),
        deadline: config.ingest.deadline_secs.map(Duration::from_secs),
        dry_run: args.dry_run,
    };
    let coordinator = Coordinator::new(
        ctx,
        Arc::new(OiioProxyDeriver::new(registry.clone())),
        Arc::new(FfmpegMovieDeriver::new(registry)),
        options,
    );
    coordinator
        .check_context()
        .context("Cannot start ingest")?;

    let cancel = coordinator.cancellation();
    let signal = tokio::spawn(shutdown_signal(cancel.clone()));

    let mut report = coordinator.run(walk.units).await;
    report.discovery_errors = walk.errors.iter().map(|e| e.to_string()).collect();
    signal.abort();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(report.has_failures())
}

/// Cancel `cancel` on Ctrl-C or SIGTERM.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => return,
    }

    tracing::warn!("Shutdown signal received, cancelling ingest");
    cancel.cancel();
}

fn print_report(report: &IngestReport) {
    for unit in &report.units {
        let status = match unit.status {
            UnitStatus::Completed => "✓",
            UnitStatus::Planned => "·",
            UnitStatus::Skipped => "-",
            UnitStatus::Partial => "~",
            UnitStatus::Failed | UnitStatus::Cancelled => "✗",
        };
        println!(
            "{} {} (copied {}, existing {}, failed {}, proxies {})",
            status, unit.label, unit.copied, unit.skipped_existing, unit.failed, unit.proxies
        );
        for planned in &unit.planned {
            println!("    {} -> {}", planned.src.display(), planned.dst.display());
        }
        if let Some(movie) = &unit.movie {
            println!("    movie: {}", movie.display());
        }
        for warning in &unit.warnings {
            println!("    warning: {}", warning);
        }
        for error in &unit.errors {
            println!("    error: {}", error);
        }
    }

    for error in &report.discovery_errors {
        println!("discovery error: {}", error);
    }

    println!();
    println!(
        "{} succeeded, {} failed, {} skipped, {} files copied",
        report.succeeded(),
        report.failed(),
        report.skipped().len(),
        report.total_copied()
    );
    if report.was_cancelled() {
        println!("Ingest was cancelled before every unit finished.");
    }
}

fn scan_dir(dir: &Path, tags: ShotTags, json: bool) -> Result<()> {
    let found = sequence::discover(dir, &tags)
        .with_context(|| format!("Failed to scan {:?}", dir))?;

    if json {
        let value = serde_json::json!({
            "sequences": found.sequences.iter().map(|s| {
                let continuity = check_continuity(s.frames());
                serde_json::json!({
                    "base_name": s.base_name(),
                    "extension": s.extension(),
                    "padding": s.padding(),
                    "start_frame": s.start_frame(),
                    "end_frame": s.end_frame(),
                    "count": s.len(),
                    "missing": continuity.missing,
                })
            }).collect::<Vec<_>>(),
            "files": found.files.iter().map(|f| f.path()).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Sequences: {}", found.sequences.len());
    for seq in &found.sequences {
        print!("  {} ({} frames)", seq.label(), seq.len());
        let continuity = check_continuity(seq.frames());
        if continuity.has_gaps() {
            print!(" missing [{}]", format_ranges(&continuity.missing));
        }
        println!();
    }

    println!("\nFiles: {}", found.files.len());
    for file in &found.files {
        println!("  {}", file.label());
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install them to enable proxies and review movies.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            config::load_config(p)?
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    let warnings = config::validate_config(&config)?;
    println!("✓ Configuration is valid");
    println!(
        "  Project: {}",
        config.project.name.as_deref().unwrap_or("(unset)")
    );
    println!(
        "  Destination: {}",
        config
            .project
            .destination
            .as_ref()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| "(unset)".to_string())
    );
    println!(
        "  Proxy format: {}",
        config.ingest.effective_proxy_format().unwrap_or("none")
    );
    println!("  Review movie: {}", config.ingest.generate_mov);
    println!("  Workers: {}", config.ingest.worker_count());
    println!("  Static shots: {}", config.shots.len());
    for warning in &warnings {
        println!("  warning: {}", warning);
    }

    Ok(())
}

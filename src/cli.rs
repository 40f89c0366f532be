use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shotvault")]
#[command(author, version, about = "Vendor plate ingestion into a studio project layout")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ingest a vendor delivery into the project layout
    Ingest(IngestArgs),

    /// Discover sequences and files in a single folder
    Scan {
        /// Folder to scan
        #[arg(required = true)]
        dir: PathBuf,

        /// Scene tag for the folder
        #[arg(long, default_value = "")]
        scene: String,

        /// Shot tag for the folder
        #[arg(long, default_value = "")]
        shot: String,

        /// Resolution tag for the folder (e.g. 4448x3096)
        #[arg(long, default_value = "")]
        resolution: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug, Default)]
pub struct IngestArgs {
    /// Source root (overrides `project.source`)
    #[arg(short, long)]
    pub source: Option<PathBuf>,

    /// Destination root (overrides `project.destination`)
    #[arg(short, long)]
    pub destination: Option<PathBuf>,

    /// Project name (overrides `project.name`)
    #[arg(short, long)]
    pub project: Option<String>,

    /// Delivery date as YYYYMMDD; selects `{project}/vault/to_mvl/{vendor}/{date}`
    #[arg(long)]
    pub input_date: Option<String>,

    /// Vendor folder under `to_mvl` (all vendors if omitted)
    #[arg(long)]
    pub vendor: Option<String>,

    /// Re-copy files that already exist at the destination
    #[arg(long)]
    pub overwrite: bool,

    /// Copy sequences even when frames are missing
    #[arg(long)]
    pub force: bool,

    /// Generate proxies in this format (jpeg or png)
    #[arg(long)]
    pub proxy_format: Option<String>,

    /// Generate a review movie per sequence
    #[arg(long)]
    pub mov: bool,

    /// Generate proxies and movie concurrently
    #[arg(long)]
    pub parallel_proxy: bool,

    /// Review movie frame rate
    #[arg(long)]
    pub fps: Option<u32>,

    /// Worker pool size
    #[arg(long)]
    pub workers: Option<usize>,

    /// Show what would be copied without copying
    #[arg(long)]
    pub dry_run: bool,

    /// Output the report as JSON
    #[arg(long)]
    pub json: bool,
}

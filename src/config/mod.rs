mod types;

pub use types::*;

use anyhow::{Context, Result};
use shotvault_av::ProxyFormat;
use shotvault_common::{ProjectContext, SceneShotMap};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    for warning in validate_config(&config)? {
        tracing::warn!("{}", warning);
    }

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./shotvault.toml",
        "~/.config/shotvault/config.toml",
        "/etc/shotvault/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration.
///
/// Hard errors fail; soft problems are returned as warnings.
pub fn validate_config(config: &Config) -> Result<Vec<String>> {
    let mut warnings = Vec::new();

    if let Some(format) = &config.ingest.proxy_format {
        if format.parse::<ProxyFormat>().is_err() {
            warnings.push(format!(
                "Proxy format '{}' is not supported (use jpeg or png); proxies will be skipped",
                format
            ));
        }
    }

    if config.ingest.fps == 0 {
        anyhow::bail!("ingest.fps cannot be 0");
    }

    if config.ingest.workers == Some(0) {
        warnings.push("ingest.workers is 0; using the default pool size".to_string());
    }

    if config.ingest.deadline_secs == Some(0) {
        anyhow::bail!("ingest.deadline_secs cannot be 0");
    }

    if let Some(source) = &config.project.source {
        if !source.exists() {
            warnings.push(format!("Source root does not exist: {:?}", source));
        }
    }

    for (key, [id, token]) in &config.shots {
        if key.split('/').count() != 2 {
            warnings.push(format!("Shot key '{}' is not of the form scene/shot", key));
        }
        if id.is_empty() || token.is_empty() {
            anyhow::bail!("Shot '{}' has an empty id or type token", key);
        }
    }

    Ok(warnings)
}

impl Config {
    /// Build the read-only context for a run from this config and a resolved
    /// scene/shot map.
    pub fn project_context(&self, scene_shots: SceneShotMap) -> ProjectContext {
        ProjectContext {
            project: self.project.name.clone(),
            destination: self.project.destination.clone(),
            scene_shots,
            overwrite: self.ingest.overwrite,
            force: self.ingest.force,
            proxy_format: self.ingest.effective_proxy_format().map(str::to_string),
            generate_mov: self.ingest.generate_mov,
            parallel_proxy: self.ingest.parallel_proxy,
            fps: self.ingest.fps,
            start_frame: self.ingest.start_frame,
            frame_numbering: self.ingest.frame_numbering,
            size_mismatch: self.ingest.size_mismatch,
        }
    }
}

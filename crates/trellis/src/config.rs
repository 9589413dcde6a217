//! Configuration loading and management.

use crate::cli::Args;
use indexmap::IndexMap;
use miette::{IntoDiagnostic, Result, WrapErr};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use trellis_cache::CacheMode;
use trellis_registry::DiscoveryOptions;
use trellis_render::RenderMode;

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = "trellis.json";

/// The on-disk configuration surface.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileConfig {
    /// Root directory for page templates; always the first search path.
    pub views_root: Option<PathBuf>,
    /// Directory for the persistent compile cache.
    pub cache_root: Option<PathBuf>,
    /// Additional component search directories, in priority order.
    pub component_search_paths: Vec<PathBuf>,
    /// Explicit alias → template path registrations.
    pub explicit_components: IndexMap<String, PathBuf>,
    /// Compile cache invalidation policy.
    pub cache_mode: Option<CacheMode>,
    /// Render failure policy.
    pub render_mode: Option<RenderMode>,
    /// Template file extension, without the leading dot.
    pub extension: Option<String>,
    /// Discovery ignore globs, relative to each search root.
    pub ignore_patterns: Vec<String>,
}

impl FileConfig {
    /// Find the nearest `trellis.json`, walking up from `start`.
    pub fn find(start: &Path) -> Option<PathBuf> {
        let mut current = Some(start);
        while let Some(dir) = current {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.is_file() {
                return Some(candidate);
            }
            current = dir.parent();
        }
        None
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        let mut config: FileConfig = serde_json::from_str(&text)
            .into_diagnostic()
            .wrap_err_with(|| format!("invalid configuration in {}", path.display()))?;

        // Paths in the file are relative to the file's own directory.
        if let Some(base) = path.parent() {
            config.views_root = config.views_root.map(|p| resolve(base, p));
            config.cache_root = config.cache_root.map(|p| resolve(base, p));
            config.component_search_paths = config
                .component_search_paths
                .into_iter()
                .map(|p| resolve(base, p))
                .collect();
            config.explicit_components = config
                .explicit_components
                .into_iter()
                .map(|(alias, p)| (alias, resolve(base, p)))
                .collect();
        }
        Ok(config)
    }
}

fn resolve(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// The merged, effective configuration. CLI flags override file values.
#[derive(Debug, Clone)]
pub struct Config {
    pub search_paths: Vec<PathBuf>,
    pub explicit_components: IndexMap<String, PathBuf>,
    pub cache_root: Option<PathBuf>,
    pub cache_mode: CacheMode,
    pub render_mode: RenderMode,
    pub discovery: DiscoveryOptions,
}

impl Config {
    /// Load configuration from the workspace and CLI arguments.
    pub fn load(workspace: &Path, args: &Args) -> Result<Self> {
        let file = match FileConfig::find(workspace) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading configuration file");
                FileConfig::load(&path)?
            }
            None => FileConfig::default(),
        };

        let mut search_paths = Vec::new();
        if let Some(views_root) = args.views_root.clone().or(file.views_root) {
            search_paths.push(views_root);
        }
        search_paths.extend(file.component_search_paths);
        search_paths.extend(args.search_paths.iter().cloned());

        let mut explicit_components = file.explicit_components;
        for (alias, path) in &args.components {
            explicit_components.insert(alias.clone(), path.clone());
        }

        Ok(Self {
            search_paths,
            explicit_components,
            cache_root: args.cache_root.clone().or(file.cache_root),
            cache_mode: args
                .cache_mode
                .map(CacheMode::from)
                .or(file.cache_mode)
                .unwrap_or_default(),
            render_mode: args.render_mode().or(file.render_mode).unwrap_or_default(),
            discovery: DiscoveryOptions {
                extension: args
                    .extension
                    .clone()
                    .or(file.extension)
                    .unwrap_or_else(|| DiscoveryOptions::default().extension),
                ignore: file.ignore_patterns,
            },
        })
    }
}

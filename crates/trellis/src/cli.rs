//! Command-line argument parsing.

use clap::Parser;
use std::path::PathBuf;
use trellis_cache::CacheMode;
use trellis_render::RenderMode;

/// Component-template compiler and renderer
#[derive(Parser, Debug, Clone)]
#[command(name = "trellis")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Name of the template to render (e.g. `pages.home`)
    pub name: Option<String>,

    /// Root directory for page templates (highest-priority search path)
    #[arg(long)]
    pub views_root: Option<PathBuf>,

    /// Additional component search directories (repeatable)
    #[arg(long = "search-path")]
    pub search_paths: Vec<PathBuf>,

    /// Explicit component registrations as `alias=path` (repeatable)
    #[arg(long = "component", value_parser = parse_component)]
    pub components: Vec<(String, PathBuf)>,

    /// Directory for the persistent compile cache
    #[arg(long)]
    pub cache_root: Option<PathBuf>,

    /// Compile cache invalidation policy
    #[arg(long, value_enum)]
    pub cache_mode: Option<CacheModeArg>,

    /// Propagate render errors instead of emitting placeholders
    #[arg(long)]
    pub strict: bool,

    /// Swallow render errors into placeholder markers
    #[arg(long, conflicts_with = "strict")]
    pub lenient: bool,

    /// Scope data as inline JSON
    #[arg(long)]
    pub data: Option<String>,

    /// Scope data from a JSON file
    #[arg(long, conflicts_with = "data")]
    pub data_file: Option<PathBuf>,

    /// Render only the named fragment(s) of the output (repeatable)
    #[arg(long = "fragment")]
    pub fragments: Vec<String>,

    /// Template file extension
    #[arg(long)]
    pub extension: Option<String>,

    /// List discovered components and exit
    #[arg(long)]
    pub list: bool,

    /// Compile every discovered component and exit
    #[arg(long)]
    pub precompile: bool,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Cache policy flag values.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CacheModeArg {
    /// Recompile when the source file changes (development)
    AlwaysCheck,
    /// Compile once, never invalidate (production)
    NeverExpire,
}

impl From<CacheModeArg> for CacheMode {
    fn from(arg: CacheModeArg) -> Self {
        match arg {
            CacheModeArg::AlwaysCheck => CacheMode::AlwaysCheck,
            CacheModeArg::NeverExpire => CacheMode::NeverExpire,
        }
    }
}

impl Args {
    /// The render mode implied by the flags, if any.
    pub fn render_mode(&self) -> Option<RenderMode> {
        if self.strict {
            Some(RenderMode::Strict)
        } else if self.lenient {
            Some(RenderMode::Lenient)
        } else {
            None
        }
    }
}

fn parse_component(raw: &str) -> Result<(String, PathBuf), String> {
    let (alias, path) = raw
        .split_once('=')
        .ok_or_else(|| format!("`{raw}` is not of the form alias=path"))?;
    if alias.is_empty() {
        return Err("component alias may not be empty".to_string());
    }
    Ok((alias.to_string(), PathBuf::from(path)))
}

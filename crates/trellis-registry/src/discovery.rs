//! Directory discovery of component templates.

use globset::{Glob, GlobSet, GlobSetBuilder};
use indexmap::IndexMap;
use smol_str::SmolStr;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Options controlling how a search root is scanned.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Template file extension, without the leading dot.
    pub extension: String,
    /// Glob patterns (relative to the root) to skip during discovery.
    pub ignore: Vec<String>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            extension: "html".to_string(),
            ignore: Vec::new(),
        }
    }
}

impl DiscoveryOptions {
    fn ignore_set(&self) -> GlobSet {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.ignore {
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(err) => {
                    tracing::warn!(pattern, %err, "skipping invalid discovery ignore pattern");
                }
            }
        }
        builder.build().unwrap_or_else(|_| GlobSet::empty())
    }
}

/// Walk one search root and derive component names for every template file.
///
/// A file at `root/a/b/name.<ext>` maps to the component name `a.b.name`.
/// Hidden directories and files are skipped. Unreadable entries are skipped,
/// not fatal.
pub fn discover_root(root: &Path, options: &DiscoveryOptions) -> IndexMap<SmolStr, PathBuf> {
    let mut components = IndexMap::new();
    let ignore = options.ignore_set();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().map_or(true, |e| e != options.extension.as_str()) {
            continue;
        }

        let rel = match path.strip_prefix(root) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        if rel
            .components()
            .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
        {
            continue;
        }
        if ignore.is_match(rel) {
            continue;
        }

        let Some(name) = derive_name(rel) else {
            continue;
        };
        // Within one root the first file seen keeps the name.
        components.entry(name).or_insert_with(|| path.to_path_buf());
    }

    components
}

/// Derive the dotted component name from a root-relative template path.
fn derive_name(rel: &Path) -> Option<SmolStr> {
    let stem = rel.file_stem()?.to_str()?;
    let mut parts: Vec<&str> = rel
        .parent()
        .into_iter()
        .flat_map(|p| p.components())
        .filter_map(|c| c.as_os_str().to_str())
        .collect();
    parts.push(stem);
    Some(SmolStr::from(parts.join(".")))
}

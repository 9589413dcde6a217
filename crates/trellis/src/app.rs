//! Wires configuration into a ready renderer and runs CLI commands.

use crate::config::Config;
use miette::{miette, IntoDiagnostic, Result};
use rayon::prelude::*;
use std::sync::Arc;
use trellis_cache::CompileCache;
use trellis_registry::Registry;
use trellis_render::Renderer;

pub struct App {
    renderer: Renderer,
}

impl App {
    /// Build registry, cache, and renderer from the merged configuration.
    pub fn new(config: Config) -> Self {
        let registry = Arc::new(Registry::new(config.discovery));
        for root in &config.search_paths {
            registry.add_search_root(root);
        }
        for (alias, path) in &config.explicit_components {
            registry.register(alias.as_str(), path);
        }

        let cache = Arc::new(CompileCache::new(config.cache_root, config.cache_mode));
        let renderer = Renderer::new(registry, cache, config.render_mode);
        Self { renderer }
    }

    /// Render a named template, optionally filtered to fragments.
    pub fn render(
        &self,
        name: &str,
        data: serde_json::Value,
        fragments: &[String],
    ) -> Result<String> {
        let result = if fragments.is_empty() {
            self.renderer.render(name, data)
        } else {
            self.renderer.render_fragment(name, data, fragments)
        };
        result.into_diagnostic()
    }

    /// Print the discovered component map.
    pub fn list(&self) {
        let components = self.renderer.discovered_components();
        if components.is_empty() {
            println!("no components discovered");
            return;
        }
        let width = components.keys().map(|n| n.len()).max().unwrap_or(0);
        for (name, path) in &components {
            println!("{name:width$}  {}", path.display());
        }
    }

    /// Compile every discovered component in parallel. Returns the number of
    /// failures after reporting each one.
    pub fn precompile(&self) -> Result<usize> {
        let components = self.renderer.discovered_components();
        if components.is_empty() {
            return Err(miette!("no components discovered; nothing to precompile"));
        }

        let names: Vec<&str> = components.keys().map(|name| name.as_str()).collect();
        let failures: Vec<(String, String)> = names
            .par_iter()
            .filter_map(|name| {
                self.renderer
                    .precompile(name)
                    .err()
                    .map(|err| (name.to_string(), err.to_string()))
            })
            .collect();

        for (name, err) in &failures {
            eprintln!("error: {name}: {err}");
        }
        println!(
            "compiled {} component(s), {} failure(s)",
            components.len() - failures.len(),
            failures.len()
        );
        Ok(failures.len())
    }
}

//! The renderer façade.

use crate::fragments;
use crate::handlers::{self, RenderState};
use indexmap::IndexMap;
use smol_str::SmolStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use trellis_cache::{CompileCache, LookupError, TemplateSource};
use trellis_compiler::SyntaxError;
use trellis_engine::{Engine, EngineError, Program, Scope, Value};
use trellis_registry::Registry;

/// Hard ceiling on component nesting, so a component cycle fails loudly
/// instead of overflowing the stack.
pub const MAX_DEPTH: usize = 64;

/// What happens when a render fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderMode {
    /// Errors propagate to the caller (development).
    #[default]
    Strict,
    /// Errors are logged and replaced with a placeholder marker (production).
    Lenient,
}

/// An error raised while rendering a named template.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The name resolved to no registered or discovered component.
    #[error("component `{0}` is not registered")]
    ComponentNotFound(SmolStr),

    /// A malformed tag in a template source.
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// The template file could not be read.
    #[error("failed to read template `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The rewritten template did not compile to a program.
    #[error("failed to compile template `{}`: {source}", path.display())]
    Compile {
        path: PathBuf,
        #[source]
        source: EngineError,
    },

    /// Executing the compiled program failed.
    #[error("failed to execute template `{}`: {source}", path.display())]
    Execution {
        path: PathBuf,
        #[source]
        source: EngineError,
    },

    /// Component nesting exceeded [`MAX_DEPTH`] levels.
    #[error("component nesting exceeded {MAX_DEPTH} levels (component cycle?)")]
    DepthExceeded,
}

/// Renders named component templates to strings.
///
/// The registry and cache are constructed by the host and injected here; the
/// renderer owns no global state, so independent renderers (and tests) never
/// observe each other.
pub struct Renderer {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    registry: Arc<Registry>,
    cache: Arc<CompileCache>,
    engine: Engine<RenderState>,
    mode: RenderMode,
}

impl Renderer {
    pub fn new(registry: Arc<Registry>, cache: Arc<CompileCache>, mode: RenderMode) -> Self {
        // The directive handlers need to re-enter the renderer for nested
        // components; a weak back-reference avoids a leaked cycle.
        let inner = Arc::new_cyclic(|weak| Inner {
            engine: handlers::build_engine(weak.clone()),
            registry,
            cache,
            mode,
        });
        Self { inner }
    }

    /// Render a named template against a data scope.
    pub fn render(&self, name: &str, data: Value) -> Result<String, RenderError> {
        let Some(path) = self.inner.registry.resolve(name) else {
            return Err(RenderError::ComponentNotFound(SmolStr::from(name)));
        };

        match self.inner.render_resource(&path, Scope::from_value(data), 0) {
            Ok(output) => Ok(output),
            Err(err) => {
                tracing::error!(template = name, error = %err, "render failed");
                match self.inner.mode {
                    RenderMode::Strict => Err(err),
                    RenderMode::Lenient => Ok("<!-- trellis: render error -->".to_string()),
                }
            }
        }
    }

    /// Render a named template and extract the requested fragments from the
    /// output. When no fragment marker matches, the full output is returned.
    pub fn render_fragment(
        &self,
        name: &str,
        data: Value,
        fragment_names: &[String],
    ) -> Result<String, RenderError> {
        let output = self.render(name, data)?;
        Ok(fragments::extract(&output, fragment_names).unwrap_or(output))
    }

    /// Compile a named component into the cache without rendering it.
    pub fn precompile(&self, name: &str) -> Result<(), RenderError> {
        let Some(path) = self.inner.registry.resolve(name) else {
            return Err(RenderError::ComponentNotFound(SmolStr::from(name)));
        };
        self.inner.fetch_program(&path).map(|_| ())
    }

    /// Register an explicit component alias.
    pub fn register_component(&self, alias: &str, path: impl Into<PathBuf>) {
        self.inner.registry.register(alias, path.into());
    }

    /// Add a component search directory.
    pub fn add_search_path(&self, path: impl Into<PathBuf>) {
        self.inner.registry.add_search_root(path);
    }

    /// Rebuild discovered components from the search paths.
    pub fn refresh_discovery(&self) {
        self.inner.registry.refresh();
    }

    /// The current name → path mapping, for diagnostics.
    pub fn discovered_components(&self) -> IndexMap<SmolStr, PathBuf> {
        self.inner.registry.list_all()
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn cache(&self) -> &CompileCache {
        &self.inner.cache
    }
}

impl Inner {
    pub(crate) fn is_lenient(&self) -> bool {
        self.mode == RenderMode::Lenient
    }

    /// Render a nested component invocation: resolve the name now (so
    /// registrations made after compilation take effect), assemble the scope,
    /// and recurse.
    pub(crate) fn render_component(
        &self,
        name: &str,
        attrs: crate::bag::AttributeBag,
        ambient: Scope,
        slots: crate::slots::SlotSet,
        depth: usize,
    ) -> Result<String, RenderError> {
        let Some(path) = self.registry.resolve(name) else {
            return Err(RenderError::ComponentNotFound(SmolStr::from(name)));
        };

        // Merge order: ambient scope, then explicit attributes (attributes
        // win), then captured slots, then the bag itself.
        let mut scope = ambient;
        for (key, value) in attrs.iter() {
            scope.set(key.clone(), value.clone());
        }
        for (slot_name, content) in slots.iter() {
            scope.set(slot_name.clone(), Value::String(content.clone()));
        }
        scope.set("attributes", attrs.to_value());

        self.render_resource(&path, scope, depth)
    }

    pub(crate) fn render_resource(
        &self,
        path: &Path,
        mut scope: Scope,
        depth: usize,
    ) -> Result<String, RenderError> {
        if depth >= MAX_DEPTH {
            return Err(RenderError::DepthExceeded);
        }

        let program = self.fetch_program(path)?;
        let mut state = RenderState::new(depth);
        self.engine
            .execute(&program, &mut scope, &mut state)
            .map_err(|err| unwrap_engine_error(err, path))
    }

    /// The compiled program for a resource, through the cache.
    fn fetch_program(&self, path: &Path) -> Result<Arc<Program>, RenderError> {
        self.cache
            .get_or_compile(path, |source| self.compile_template(source))
            .map_err(|err| match err {
                LookupError::Source { path, source } => RenderError::Io { path, source },
                LookupError::Compile(err) => err,
            })
    }

    /// Tag rewrite plus engine compilation. Fails before the cache ever sees
    /// an artifact, so a broken template cannot poison the cache.
    fn compile_template(&self, source: &TemplateSource) -> Result<Program, RenderError> {
        let rewritten = trellis_codegen::compile_source(&source.text, &source.path)?;
        self.engine
            .compile(&rewritten)
            .map_err(|err| RenderError::Compile {
                path: source.path.clone(),
                source: err,
            })
    }
}

/// Recover typed render errors tunneled through directive handlers.
fn unwrap_engine_error(err: EngineError, path: &Path) -> RenderError {
    match err {
        EngineError::Handler(boxed) => match boxed.downcast::<RenderError>() {
            Ok(render_err) => *render_err,
            Err(boxed) => RenderError::Execution {
                path: path.to_path_buf(),
                source: EngineError::Handler(boxed),
            },
        },
        other => RenderError::Execution {
            path: path.to_path_buf(),
            source: other,
        },
    }
}

//! Component registry: name → template-resource mapping.
//!
//! Names come from two sources: directory discovery (`root/a/b/name.html`
//! becomes `a.b.name`) and explicit registration. Explicit registrations win
//! over discovered entries, always; across multiple search roots the first
//! root wins on a name collision.
//!
//! Reads are snapshot-based: `resolve` clones an `Arc` out of an `RwLock`,
//! so a rediscovery or registration in another thread can never expose a
//! partially rebuilt map to an in-flight render.

pub mod discovery;

pub use discovery::DiscoveryOptions;

use indexmap::IndexMap;
use smol_str::SmolStr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

/// The immutable name → path view shared with readers.
#[derive(Debug, Default)]
struct Snapshot {
    explicit: IndexMap<SmolStr, PathBuf>,
    discovered: IndexMap<SmolStr, PathBuf>,
}

impl Snapshot {
    fn resolve(&self, name: &str) -> Option<&PathBuf> {
        self.explicit.get(name).or_else(|| self.discovered.get(name))
    }
}

/// Mutable registry internals, serialized behind one writer lock.
#[derive(Debug)]
struct Inner {
    roots: Vec<PathBuf>,
    options: DiscoveryOptions,
}

/// Component name → template resource registry.
pub struct Registry {
    snapshot: RwLock<Arc<Snapshot>>,
    inner: Mutex<Inner>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(DiscoveryOptions::default())
    }
}

impl Registry {
    pub fn new(options: DiscoveryOptions) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            inner: Mutex::new(Inner {
                roots: Vec::new(),
                options,
            }),
        }
    }

    /// Resolve a component name to its template resource path.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let snapshot = self.snapshot.read().unwrap().clone();
        snapshot.resolve(name).cloned()
    }

    /// Register an explicit name → path mapping.
    ///
    /// Idempotent overwrite; takes precedence over any discovered entry with
    /// the same name, and discovery never clobbers it.
    pub fn register(&self, name: impl Into<SmolStr>, path: impl Into<PathBuf>) {
        // Writer lock first: registrations and rediscoveries are serialized.
        let _writers = self.inner.lock().unwrap();
        let name = name.into();
        let path = path.into();
        tracing::debug!(name = %name, path = %path.display(), "registering component");
        self.swap_snapshot(|snapshot| {
            snapshot.explicit.insert(name, path);
        });
    }

    /// Add a directory to scan for components and rediscover.
    ///
    /// A path that is not a readable directory is logged and ignored.
    pub fn add_search_root(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let mut inner = self.inner.lock().unwrap();
        if !path.is_dir() {
            tracing::warn!(
                path = %path.display(),
                "ignoring component search root: not a readable directory"
            );
            return;
        }
        if !inner.roots.contains(&path) {
            inner.roots.push(path);
        }
        let discovered = Self::discover_all(&inner);
        self.swap_snapshot(|snapshot| snapshot.discovered = discovered);
    }

    /// Clear and rebuild all discovered entries. Explicit registrations are
    /// untouched.
    pub fn refresh(&self) {
        let inner = self.inner.lock().unwrap();
        let discovered = Self::discover_all(&inner);
        self.swap_snapshot(|snapshot| snapshot.discovered = discovered);
    }

    /// The current merged name → path mapping, for diagnostics. Explicit
    /// entries shadow discovered ones.
    pub fn list_all(&self) -> IndexMap<SmolStr, PathBuf> {
        let snapshot = self.snapshot.read().unwrap().clone();
        let mut all = snapshot.discovered.clone();
        for (name, path) in &snapshot.explicit {
            all.insert(name.clone(), path.clone());
        }
        all
    }

    /// The configured search roots, in priority order.
    pub fn search_roots(&self) -> Vec<PathBuf> {
        self.inner.lock().unwrap().roots.clone()
    }

    fn discover_all(inner: &Inner) -> IndexMap<SmolStr, PathBuf> {
        let mut discovered: IndexMap<SmolStr, PathBuf> = IndexMap::new();
        for root in &inner.roots {
            for (name, path) in discovery::discover_root(root, &inner.options) {
                // First root wins on collisions.
                discovered.entry(name).or_insert(path);
            }
        }
        tracing::debug!(count = discovered.len(), "component discovery complete");
        discovered
    }

    /// Build the next snapshot from the current one and publish it atomically.
    fn swap_snapshot(&self, mutate: impl FnOnce(&mut Snapshot)) {
        let mut guard = self.snapshot.write().unwrap();
        let mut next = Snapshot {
            explicit: guard.explicit.clone(),
            discovered: guard.discovered.clone(),
        };
        mutate(&mut next);
        *guard = Arc::new(next);
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot.read().unwrap();
        f.debug_struct("Registry")
            .field("explicit", &snapshot.explicit.len())
            .field("discovered", &snapshot.discovered.len())
            .finish()
    }
}

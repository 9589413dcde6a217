//! Compile cache: maps a template resource path to its compiled program.
//!
//! Two layers back the cache: a per-process memory layer and an optional
//! JSON disk layer under a configured cache root. Entries are keyed by
//! resource path, never by content hash — two paths with identical content
//! compile independently.
//!
//! Invalidation policy is explicit: [`CacheMode::AlwaysCheck`] recompiles
//! when the live mtime exceeds the stored one (development);
//! [`CacheMode::NeverExpire`] treats an entry as permanently valid once
//! created, even if the backing file changes — a deliberate
//! throughput/staleness trade-off for production.
//!
//! Concurrent first compiles of one path are collapsed: each path has a
//! compute-once slot, so at most one compile is in flight per resource and
//! every concurrent caller receives the same program.

pub mod source;

pub use source::TemplateSource;

use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use trellis_engine::Program;

/// Cache invalidation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheMode {
    /// Recompile whenever the source mtime moves past the cached one.
    #[default]
    AlwaysCheck,
    /// Compile once, serve forever.
    NeverExpire,
}

/// A cache-internal failure. Never fatal: the cache degrades to
/// compile-always / persist-never and logs instead of propagating.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache root `{}` is not usable: {source}", path.display())]
    Init {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write cache entry `{}`: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An error surfaced from [`CompileCache::get_or_compile`].
#[derive(Debug, thiserror::Error)]
pub enum LookupError<E> {
    /// The template source could not be read.
    #[error("failed to read template `{}`: {source}", path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The caller's compile function failed.
    #[error("{0}")]
    Compile(E),
}

/// One persisted cache entry.
#[derive(serde::Serialize, serde::Deserialize)]
struct DiskEntry {
    source_path: String,
    mtime_secs: u64,
    mtime_nanos: u32,
    program: Program,
}

/// A compiled program plus the source mtime observed at compile time.
#[derive(Clone)]
struct Cached {
    program: Arc<Program>,
    mtime: SystemTime,
}

#[derive(Default)]
struct Slot {
    state: Mutex<Option<Cached>>,
}

/// The compile cache.
pub struct CompileCache {
    mode: CacheMode,
    /// Disk root; `None` once persistence has degraded.
    root: Option<PathBuf>,
    persist: AtomicBool,
    /// Cleared when a requested cache root turns out unusable: the degraded
    /// cache recompiles on every lookup instead of serving stale entries.
    enabled: bool,
    slots: Mutex<FxHashMap<PathBuf, Arc<Slot>>>,
}

impl CompileCache {
    /// Create a cache. The root directory is created and write-checked once,
    /// here; an unusable root degrades the cache to always-recompile /
    /// never-persist with a warning rather than failing startup.
    pub fn new(root: Option<PathBuf>, mode: CacheMode) -> Self {
        let mut enabled = true;
        let root = root.and_then(|root| match prepare_root(&root) {
            Ok(()) => Some(root),
            Err(err) => {
                tracing::warn!(%err, "compile cache disabled, recompiling on every render");
                enabled = false;
                None
            }
        });
        let persist = AtomicBool::new(root.is_some());
        Self {
            mode,
            root,
            persist,
            enabled,
            slots: Mutex::new(FxHashMap::default()),
        }
    }

    /// A memory-only cache.
    pub fn in_memory(mode: CacheMode) -> Self {
        Self::new(None, mode)
    }

    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    /// Whether entries are still being persisted to disk.
    pub fn is_persistent(&self) -> bool {
        self.persist.load(Ordering::Relaxed)
    }

    /// Fetch the compiled program for `path`, compiling at most once per
    /// path across all concurrent callers.
    pub fn get_or_compile<E>(
        &self,
        path: &Path,
        compile: impl FnOnce(&TemplateSource) -> Result<Program, E>,
    ) -> Result<Arc<Program>, LookupError<E>> {
        if !self.enabled {
            let source = TemplateSource::read(path).map_err(|err| LookupError::Source {
                path: path.to_path_buf(),
                source: err,
            })?;
            return compile(&source).map(Arc::new).map_err(LookupError::Compile);
        }

        let slot = {
            let mut slots = self.slots.lock().unwrap();
            slots.entry(path.to_path_buf()).or_default().clone()
        };

        // Holding the slot lock serializes compiles of this one path while
        // leaving every other path untouched.
        let mut state = slot.state.lock().unwrap();

        if let Some(cached) = state.as_ref() {
            match self.mode {
                CacheMode::NeverExpire => return Ok(cached.program.clone()),
                CacheMode::AlwaysCheck => {
                    if live_mtime(path).is_some_and(|live| live <= cached.mtime) {
                        return Ok(cached.program.clone());
                    }
                }
            }
        }

        let source = TemplateSource::read(path).map_err(|err| LookupError::Source {
            path: path.to_path_buf(),
            source: err,
        })?;

        if state.is_none() {
            if let Some(cached) = self.load_from_disk(&source) {
                let program = cached.program.clone();
                *state = Some(cached);
                return Ok(program);
            }
        }

        tracing::debug!(path = %path.display(), "compiling template");
        let program = Arc::new(compile(&source).map_err(LookupError::Compile)?);
        *state = Some(Cached {
            program: program.clone(),
            mtime: source.mtime,
        });
        // Only a successful compile is ever persisted.
        self.persist_to_disk(&source, &program);
        Ok(program)
    }

    fn entry_path(&self, source_path: &Path) -> Option<PathBuf> {
        let root = self.root.as_ref()?;
        let safe_name: String = source_path
            .to_string_lossy()
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
            .collect();
        Some(root.join(format!("{safe_name}.json")))
    }

    fn load_from_disk(&self, source: &TemplateSource) -> Option<Cached> {
        let entry_path = self.entry_path(&source.path)?;
        let data = std::fs::read_to_string(&entry_path).ok()?;
        let entry: DiskEntry = match serde_json::from_str(&data) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(path = %entry_path.display(), %err, "dropping corrupt cache entry");
                std::fs::remove_file(&entry_path).ok();
                return None;
            }
        };
        if entry.source_path.as_str() != source.path.to_string_lossy().as_ref() {
            return None;
        }
        let stored_mtime = UNIX_EPOCH + Duration::new(entry.mtime_secs, entry.mtime_nanos);
        if self.mode == CacheMode::AlwaysCheck && source.mtime > stored_mtime {
            return None;
        }
        Some(Cached {
            program: Arc::new(entry.program),
            mtime: stored_mtime,
        })
    }

    fn persist_to_disk(&self, source: &TemplateSource, program: &Arc<Program>) {
        if !self.persist.load(Ordering::Relaxed) {
            return;
        }
        let Some(entry_path) = self.entry_path(&source.path) else {
            return;
        };
        let since_epoch = source
            .mtime
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        let entry = DiskEntry {
            source_path: source.path.to_string_lossy().into_owned(),
            mtime_secs: since_epoch.as_secs(),
            mtime_nanos: since_epoch.subsec_nanos(),
            program: (**program).clone(),
        };
        let data = match serde_json::to_string(&entry) {
            Ok(data) => data,
            Err(_) => return,
        };
        if let Err(err) = std::fs::write(&entry_path, data) {
            let err = CacheError::Write {
                path: entry_path,
                source: err,
            };
            // Warn once, then stop trying.
            if self.persist.swap(false, Ordering::Relaxed) {
                tracing::warn!(%err, "cache persistence disabled");
            }
        }
    }
}

fn prepare_root(root: &Path) -> Result<(), CacheError> {
    let init_err = |source| CacheError::Init {
        path: root.to_path_buf(),
        source,
    };
    std::fs::create_dir_all(root).map_err(init_err)?;
    // Probe writability once, at startup, not per render.
    let probe = root.join(".trellis-probe");
    std::fs::write(&probe, b"").map_err(init_err)?;
    std::fs::remove_file(&probe).ok();
    Ok(())
}

fn live_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).ok()?.modified().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;
    use trellis_engine::Op;

    fn write_template(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    fn compile_counting(counter: &AtomicUsize) -> impl Fn(&TemplateSource) -> Result<Program, String> + '_ {
        move |source| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Program::new(vec![Op::Text(source.text.clone())]))
        }
    }

    fn text_of(program: &Program) -> String {
        program
            .ops
            .iter()
            .map(|op| match op {
                Op::Text(t) => t.as_str(),
                _ => "",
            })
            .collect()
    }

    fn touch_later(path: &Path) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(5))
            .unwrap();
    }

    #[test]
    fn test_second_lookup_serves_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_template(dir.path(), "a.html", "hello");
        let cache = CompileCache::in_memory(CacheMode::AlwaysCheck);
        let count = AtomicUsize::new(0);

        cache.get_or_compile(&path, compile_counting(&count)).unwrap();
        cache.get_or_compile(&path, compile_counting(&count)).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_always_check_recompiles_on_touch() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_template(dir.path(), "a.html", "v1");
        let cache = CompileCache::in_memory(CacheMode::AlwaysCheck);
        let count = AtomicUsize::new(0);

        let first = cache.get_or_compile(&path, compile_counting(&count)).unwrap();
        assert_eq!(text_of(&first), "v1");

        std::fs::write(&path, "v2").unwrap();
        touch_later(&path);
        let second = cache.get_or_compile(&path, compile_counting(&count)).unwrap();
        assert_eq!(text_of(&second), "v2");
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_never_expire_ignores_touch() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_template(dir.path(), "a.html", "v1");
        let cache = CompileCache::in_memory(CacheMode::NeverExpire);
        let count = AtomicUsize::new(0);

        cache.get_or_compile(&path, compile_counting(&count)).unwrap();
        std::fs::write(&path, "v2").unwrap();
        touch_later(&path);
        let again = cache.get_or_compile(&path, compile_counting(&count)).unwrap();
        assert_eq!(text_of(&again), "v1");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_distinct_paths_compile_independently() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_template(dir.path(), "a.html", "same");
        let b = write_template(dir.path(), "b.html", "same");
        let cache = CompileCache::in_memory(CacheMode::AlwaysCheck);
        let count = AtomicUsize::new(0);

        cache.get_or_compile(&a, compile_counting(&count)).unwrap();
        cache.get_or_compile(&b, compile_counting(&count)).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_disk_persistence_survives_new_cache() {
        let templates = tempfile::tempdir().unwrap();
        let cache_root = tempfile::tempdir().unwrap();
        let path = write_template(templates.path(), "a.html", "persisted");
        let count = AtomicUsize::new(0);

        let cache = CompileCache::new(Some(cache_root.path().to_path_buf()), CacheMode::AlwaysCheck);
        cache.get_or_compile(&path, compile_counting(&count)).unwrap();
        assert!(cache.is_persistent());

        // A fresh cache instance over the same root reuses the disk entry.
        let cache = CompileCache::new(Some(cache_root.path().to_path_buf()), CacheMode::AlwaysCheck);
        let program = cache.get_or_compile(&path, compile_counting(&count)).unwrap();
        assert_eq!(text_of(&program), "persisted");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unusable_root_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = write_template(dir.path(), "file.txt", "");
        let path = write_template(dir.path(), "a.html", "still works");

        let cache = CompileCache::new(Some(not_a_dir), CacheMode::AlwaysCheck);
        assert!(!cache.is_persistent());

        let count = AtomicUsize::new(0);
        let program = cache.get_or_compile(&path, compile_counting(&count)).unwrap();
        assert_eq!(text_of(&program), "still works");

        // Degraded means uncached: every lookup recompiles.
        cache.get_or_compile(&path, compile_counting(&count)).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_compile_writes_nothing() {
        let templates = tempfile::tempdir().unwrap();
        let cache_root = tempfile::tempdir().unwrap();
        let path = write_template(templates.path(), "a.html", "broken");

        let cache = CompileCache::new(Some(cache_root.path().to_path_buf()), CacheMode::AlwaysCheck);
        let result = cache.get_or_compile(&path, |_| Err("compile failed".to_string()));
        assert!(matches!(result, Err(LookupError::Compile(_))));
        assert_eq!(std::fs::read_dir(cache_root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_concurrent_first_compile_happens_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_template(dir.path(), "a.html", "shared");
        let cache = Arc::new(CompileCache::in_memory(CacheMode::AlwaysCheck));
        let count = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let count = count.clone();
                let path = path.clone();
                std::thread::spawn(move || {
                    let program = cache
                        .get_or_compile(&path, |source| {
                            count.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(Duration::from_millis(10));
                            Ok::<_, String>(Program::new(vec![Op::Text(source.text.clone())]))
                        })
                        .unwrap();
                    text_of(&program)
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), "shared");
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}

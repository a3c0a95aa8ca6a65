//! Memoized, invalidation-aware store of compiled units
//!
//! Keyed by resolved absolute path; at most one compiled unit per path per
//! cache generation. A present entry is returned without re-invoking the
//! processor. Invalidation is external only: the caller drops an entry when
//! it learns that content or mtime changed, and the next access lazily
//! recomputes. There is no time-based expiry.

use crate::error::Result;
use crate::fs::FileSystem;
use crate::parser;
use crate::processor::{CompiledUnit, Processor};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::SystemTime;

/// Hook that may replace the derived namespace for a file: `(path, derived)
/// -> Some(replacement)`.
pub type NamespaceHook = Box<dyn Fn(&Path, &str) -> Option<String>>;

pub struct FileCache {
    fs: Rc<dyn FileSystem>,
    entries: RefCell<HashMap<PathBuf, CacheEntry>>,
    generation: Cell<u64>,
    namespace_hook: Option<NamespaceHook>,
}

struct CacheEntry {
    unit: Rc<CompiledUnit>,
    mtime: Option<SystemTime>,
}

impl FileCache {
    pub fn new(fs: Rc<dyn FileSystem>) -> Self {
        Self {
            fs,
            entries: RefCell::new(HashMap::new()),
            generation: Cell::new(0),
            namespace_hook: None,
        }
    }

    pub fn with_namespace_hook(mut self, hook: NamespaceHook) -> Self {
        self.namespace_hook = Some(hook);
        self
    }

    /// Fetch and process a file, memoized. A cached unit is returned as-is.
    pub fn process(&self, path: &Path) -> Result<Rc<CompiledUnit>> {
        if let Some(entry) = self.entries.borrow().get(path) {
            return Ok(entry.unit.clone());
        }

        let text = self.fs.read_to_string(path)?;
        let mtime = self.fs.mtime(path).ok();
        let unit = Rc::new(self.run_processor(&text, path));
        log::debug!("cache miss for {} (generation {})", path.display(), self.generation.get());

        self.entries
            .borrow_mut()
            .insert(path.to_path_buf(), CacheEntry { unit: Rc::clone(&unit), mtime });
        Ok(unit)
    }

    /// Process in-memory content for a path and seed the cache with it,
    /// replacing any previous entry.
    pub fn process_content(&self, text: &str, path: &Path) -> Rc<CompiledUnit> {
        let unit = Rc::new(self.run_processor(text, path));
        self.add(path, Rc::clone(&unit));
        unit
    }

    /// Seed the cache with an already-compiled unit.
    pub fn add(&self, path: &Path, unit: Rc<CompiledUnit>) {
        self.entries
            .borrow_mut()
            .insert(path.to_path_buf(), CacheEntry { unit, mtime: None });
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.borrow().contains_key(path)
    }

    /// Drop one entry; the next access recomputes it.
    pub fn invalidate(&self, path: &Path) {
        self.entries.borrow_mut().remove(path);
    }

    /// Drop everything and start a new cache generation.
    pub fn invalidate_all(&self) {
        self.entries.borrow_mut().clear();
        self.generation.set(self.generation.get() + 1);
    }

    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    /// Whether the cached entry is older than the file on disk. Callers use
    /// this to decide when to invalidate; the cache never expires entries on
    /// its own.
    pub fn is_stale(&self, path: &Path) -> bool {
        let entries = self.entries.borrow();
        match entries.get(path) {
            Some(CacheEntry { mtime: Some(cached), .. }) => match self.fs.mtime(path) {
                Ok(current) => current > *cached,
                Err(_) => true,
            },
            Some(_) => false,
            None => false,
        }
    }

    fn run_processor(&self, text: &str, path: &Path) -> CompiledUnit {
        let (sheet, diagnostics) = parser::parse(text);
        let mut unit = Processor::new().process(sheet, path, diagnostics);
        if let Some(hook) = &self.namespace_hook {
            if let Some(namespace) = hook(path, &unit.namespace) {
                unit.namespace = namespace;
            }
        }
        unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;

    fn memory_cache(files: &[(&str, &str)]) -> (Rc<MemoryFileSystem>, FileCache) {
        let fs = Rc::new(MemoryFileSystem::new());
        for (path, content) in files {
            fs.add_file(*path, *content);
        }
        let cache = FileCache::new(fs.clone() as Rc<dyn FileSystem>);
        (fs, cache)
    }

    #[test]
    fn test_same_unit_returned_without_reprocessing() {
        let (_fs, cache) = memory_cache(&[("/a.css", ".root { color: red; }")]);
        let first = cache.process(Path::new("/a.css")).unwrap();
        let second = cache.process(Path::new("/a.css")).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_invalidate_recomputes_lazily() {
        let (fs, cache) = memory_cache(&[("/a.css", ".root { color: red; }")]);
        let before = cache.process(Path::new("/a.css")).unwrap();

        fs.set_content(Path::new("/a.css"), ".root { color: blue; }\n.extra {}");
        // Still cached until the caller signals the change.
        let still = cache.process(Path::new("/a.css")).unwrap();
        assert!(Rc::ptr_eq(&before, &still));

        cache.invalidate(Path::new("/a.css"));
        let after = cache.process(Path::new("/a.css")).unwrap();
        assert!(!Rc::ptr_eq(&before, &after));
        assert!(after.get_symbol("extra").is_some());
    }

    #[test]
    fn test_generation_bumps_on_full_invalidation() {
        let (_fs, cache) = memory_cache(&[("/a.css", "")]);
        cache.process(Path::new("/a.css")).unwrap();
        assert_eq!(cache.generation(), 0);
        cache.invalidate_all();
        assert_eq!(cache.generation(), 1);
        assert!(!cache.contains(Path::new("/a.css")));
    }

    #[test]
    fn test_staleness_reporting() {
        let (fs, cache) = memory_cache(&[("/a.css", ".root {}")]);
        cache.process(Path::new("/a.css")).unwrap();
        assert!(!cache.is_stale(Path::new("/a.css")));

        std::thread::sleep(std::time::Duration::from_millis(5));
        fs.set_content(Path::new("/a.css"), ".root { color: red; }");
        assert!(cache.is_stale(Path::new("/a.css")));
    }

    #[test]
    fn test_namespace_hook() {
        let fs = Rc::new(MemoryFileSystem::new());
        fs.add_file("/a.css", "");
        let cache = FileCache::new(fs as Rc<dyn FileSystem>).with_namespace_hook(Box::new(
            |path, _derived| {
                (path == Path::new("/a.css")).then(|| "fixed".to_string())
            },
        ));
        let unit = cache.process(Path::new("/a.css")).unwrap();
        assert_eq!(unit.namespace, "fixed");
    }

    #[test]
    fn test_process_content_seeds_cache() {
        let (_fs, cache) = memory_cache(&[]);
        let unit = cache.process_content(".root {}", Path::new("/virtual.css"));
        assert!(cache.contains(Path::new("/virtual.css")));
        let cached = cache.process(Path::new("/virtual.css")).unwrap();
        assert!(Rc::ptr_eq(&unit, &cached));
    }
}

//! Collaborator interfaces: file access and host-module loading
//!
//! The compiler core never assumes a storage medium. [`FileSystem`] is the
//! only seam through which source text enters the pipeline, and
//! [`ModuleLoader`] is how symbols imported from non-styling modules resolve
//! to concrete values.

use crate::error::{CompilerError, Result};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub trait FileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn mtime(&self, path: &Path) -> Result<SystemTime>;
}

/// Loader for symbols that live in non-styling modules. Returns the module's
/// export map; the `default` key holds the default export.
pub trait ModuleLoader {
    fn load(&self, path: &Path) -> Result<HashMap<String, String>>;
}

/// Standard-library backed file system.
#[derive(Debug, Default)]
pub struct NativeFileSystem;

impl FileSystem for NativeFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|e| CompilerError::FileNotFound {
            path: format!("{}: {}", path.display(), e),
        })
    }

    fn mtime(&self, path: &Path) -> Result<SystemTime> {
        let metadata = std::fs::metadata(path)?;
        Ok(metadata.modified()?)
    }
}

/// In-memory file system for tests and embedded hosts.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: RefCell<HashMap<PathBuf, MemoryFile>>,
}

#[derive(Debug, Clone)]
struct MemoryFile {
    content: String,
    mtime: SystemTime,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.files.borrow_mut().insert(
            path.into(),
            MemoryFile {
                content: content.into(),
                mtime: SystemTime::now(),
            },
        );
    }

    /// Replace a file's content, bumping its modification time.
    pub fn set_content(&self, path: &Path, content: impl Into<String>) {
        self.files.borrow_mut().insert(
            path.to_path_buf(),
            MemoryFile {
                content: content.into(),
                mtime: SystemTime::now(),
            },
        );
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.borrow().contains_key(path)
    }
}

impl FileSystem for MemoryFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.files
            .borrow()
            .get(path)
            .map(|f| f.content.clone())
            .ok_or_else(|| CompilerError::FileNotFound {
                path: path.display().to_string(),
            })
    }

    fn mtime(&self, path: &Path) -> Result<SystemTime> {
        self.files
            .borrow()
            .get(path)
            .map(|f| f.mtime)
            .ok_or_else(|| CompilerError::FileNotFound {
                path: path.display().to_string(),
            })
    }
}

/// Default loader for hosts without module support.
#[derive(Debug, Default)]
pub struct NoModules;

impl ModuleLoader for NoModules {
    fn load(&self, path: &Path) -> Result<HashMap<String, String>> {
        Err(CompilerError::ModuleLoad {
            path: path.display().to_string(),
            message: "non-styling modules are not supported without a module loader".to_string(),
        })
    }
}

/// Fixed export maps keyed by path, for tests and static hosts.
#[derive(Debug, Default)]
pub struct StaticModules {
    modules: HashMap<PathBuf, HashMap<String, String>>,
}

impl StaticModules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_module(
        &mut self,
        path: impl Into<PathBuf>,
        exports: impl IntoIterator<Item = (&'static str, &'static str)>,
    ) {
        self.modules.insert(
            path.into(),
            exports
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
    }
}

impl ModuleLoader for StaticModules {
    fn load(&self, path: &Path) -> Result<HashMap<String, String>> {
        self.modules
            .get(path)
            .cloned()
            .ok_or_else(|| CompilerError::ModuleLoad {
                path: path.display().to_string(),
                message: "module not found".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_fs_roundtrip() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/a.css", ".root {}");
        assert_eq!(fs.read_to_string(Path::new("/a.css")).unwrap(), ".root {}");
        assert!(fs.read_to_string(Path::new("/missing.css")).is_err());
    }

    #[test]
    fn test_memory_fs_mtime_bumps_on_change() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/a.css", ".root {}");
        let before = fs.mtime(Path::new("/a.css")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        fs.set_content(Path::new("/a.css"), ".root { color: red; }");
        let after = fs.mtime(Path::new("/a.css")).unwrap();
        assert!(after > before);
    }

    #[test]
    fn test_native_fs_reads_real_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.css");
        std::fs::write(&path, ".root {}").unwrap();

        let fs = NativeFileSystem;
        assert_eq!(fs.read_to_string(&path).unwrap(), ".root {}");
        assert!(fs.mtime(&path).is_ok());
    }

    #[test]
    fn test_static_modules() {
        let mut loader = StaticModules::new();
        loader.add_module("/consts.js", [("mainColor", "#336699")]);
        let exports = loader.load(Path::new("/consts.js")).unwrap();
        assert_eq!(exports.get("mainColor").map(String::as_str), Some("#336699"));
        assert!(loader.load(Path::new("/other.js")).is_err());
    }
}

//! stylc - a compiler for a CSS-superset styling language
//!
//! Source files written in ordinary CSS syntax extended with cross-file
//! imports, symbolic variables, mixins and theme inheritance compile to
//! plain scoped CSS plus a mapping from authored names to generated,
//! collision-free identifiers.
//!
//! # Features
//!
//! - Pseudo-import rules with default, named and renamed bindings
//! - `value(...)` variable references resolved across files
//! - Mixins spliced from stylesheet classes or host-language modules
//! - Theme inheritance with per-import overrides and cascade-correct
//!   multi-entry bundling
//! - Deterministic namespacing so two files never collide on a class name
//! - Non-fatal diagnostics with line numbers; parsing never aborts a file
//!   on one bad declaration
//!
//! # Basic Usage
//!
//! ```rust
//! use stylc::{Compiler, CompilerConfig, MemoryFileSystem};
//! use std::path::Path;
//! use std::rc::Rc;
//!
//! let fs = Rc::new(MemoryFileSystem::new());
//! fs.add_file("/button.css", ".root { color: red; }");
//!
//! let compiler = Compiler::new(CompilerConfig::new(fs));
//! let result = compiler.transform(Path::new("/button.css")).unwrap();
//! assert!(result.ast.to_string().contains("--root"));
//! ```
//!
//! # Compilation Pipeline
//!
//! 1. **Lexer & Parser** - tokenize and build a postcss-shaped AST
//! 2. **Processor** - single-file pass producing a compiled unit (symbol
//!    table, imports, diagnostics)
//! 3. **Resolver** - cross-file symbol resolution over the import graph
//! 4. **Transformer** - scoping, value substitution, mixins, export maps
//! 5. **Bundler** - multi-entry composition with theme overrides and
//!    dead-rule elimination
//!
//! Compiled units are cached per path and shared; invalidation is external
//! and lazy, so editors and watch modes control staleness explicitly.

pub mod ast;
pub mod error;
pub mod lexer;
pub mod utils;

pub mod bundler;
pub mod cache;
pub mod cli;
pub mod fs;
pub mod parser;
pub mod processor;
pub mod resolver;
pub mod transformer;
pub mod values;

use std::path::{Path, PathBuf};
use std::rc::Rc;

// Re-export commonly used types and functions
pub use bundler::Bundler;
pub use cache::{FileCache, NamespaceHook};
pub use cli::Cli;
pub use error::{CompilerError, Diagnostic, Diagnostics, Result, Severity};
pub use fs::{
    FileSystem, MemoryFileSystem, ModuleLoader, NativeFileSystem, NoModules, StaticModules,
};
pub use processor::{CompiledUnit, Processor, Symbol, SymbolKind};
pub use resolver::{Resolution, Resolver};
pub use transformer::{CompilationResult, Transformer, DEFAULT_DELIMITER};
pub use values::ValueTemplate;

/// Compiler version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Everything a compilation session is built from. The file system and
/// module loader are injected so tests and editor integrations can run
/// fully in memory.
pub struct CompilerConfig {
    pub file_system: Rc<dyn FileSystem>,
    pub module_loader: Rc<dyn ModuleLoader>,
    /// Separator between a unit's namespace and a local name in scoped
    /// output identifiers.
    pub delimiter: String,
    /// Optional replacement for the derived per-file namespace.
    pub namespace_hook: Option<NamespaceHook>,
}

impl CompilerConfig {
    pub fn new(file_system: Rc<dyn FileSystem>) -> Self {
        Self {
            file_system,
            module_loader: Rc::new(NoModules),
            delimiter: DEFAULT_DELIMITER.to_string(),
            namespace_hook: None,
        }
    }

    pub fn with_module_loader(mut self, loader: Rc<dyn ModuleLoader>) -> Self {
        self.module_loader = loader;
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn with_namespace_hook(mut self, hook: NamespaceHook) -> Self {
        self.namespace_hook = Some(hook);
        self
    }
}

/// One compilation session: a shared file cache plus the loader and
/// delimiter every phase agrees on. There are no process-wide singletons;
/// two sessions never share state.
pub struct Compiler {
    cache: FileCache,
    loader: Rc<dyn ModuleLoader>,
    delimiter: String,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        let mut cache = FileCache::new(config.file_system);
        if let Some(hook) = config.namespace_hook {
            cache = cache.with_namespace_hook(hook);
        }
        Self {
            cache,
            loader: config.module_loader,
            delimiter: config.delimiter,
        }
    }

    /// The session's file cache, for staleness checks and seeding.
    pub fn cache(&self) -> &FileCache {
        &self.cache
    }

    /// Process one file into its compiled unit (cached).
    pub fn process(&self, path: &Path) -> Result<Rc<CompiledUnit>> {
        self.cache.process(path)
    }

    /// Compile one file to scoped CSS plus its export map.
    pub fn transform(&self, path: &Path) -> Result<CompilationResult> {
        let unit = self.cache.process(path)?;
        Ok(self.transformer().transform(&unit))
    }

    /// Compile in-memory source under the given path identity, seeding the
    /// cache so later imports of `path` see this content.
    pub fn transform_source(&self, text: &str, path: &Path) -> CompilationResult {
        let unit = self.cache.process_content(text, path);
        self.transformer().transform(&unit)
    }

    /// Compose the ordered entry list into one cascade-correct document.
    pub fn bundle(&self, entries: &[PathBuf]) -> Result<String> {
        Bundler::new(&self.cache, self.loader.as_ref(), &self.delimiter).bundle(entries)
    }

    /// Drop one cached unit; the next access recomputes it.
    pub fn invalidate(&self, path: &Path) {
        self.cache.invalidate(path);
    }

    /// Drop all cached units and start a new cache generation.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    fn transformer(&self) -> Transformer<'_> {
        Transformer::new(&self.cache, self.loader.as_ref(), &self.delimiter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::SystemTime;

    fn session(files: &[(&str, &str)]) -> Compiler {
        let fs = Rc::new(MemoryFileSystem::new());
        for (path, content) in files {
            fs.add_file(*path, *content);
        }
        Compiler::new(CompilerConfig::new(fs))
    }

    #[test]
    fn test_transform_through_session() {
        let compiler = session(&[("/a.css", ".root { color: red; }")]);
        let result = compiler.transform(Path::new("/a.css")).unwrap();
        assert!(result.exports.contains_key("root"));
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_transform_source_seeds_cache_for_imports() {
        let compiler = session(&[(
            "/a.css",
            ":import { -st-from: \"./virtual.css\"; -st-named: main; }\n.root { color: value(main); }",
        )]);
        compiler.transform_source(":vars { main: teal; }", Path::new("/virtual.css"));
        let result = compiler.transform(Path::new("/a.css")).unwrap();
        assert!(result.ast.to_string().contains("color: teal;"));
    }

    #[test]
    fn test_sessions_are_isolated() {
        let first = session(&[("/a.css", ".root {}")]);
        let second = session(&[("/a.css", ".root {}")]);
        first.process(Path::new("/a.css")).unwrap();
        assert!(first.cache().contains(Path::new("/a.css")));
        assert!(!second.cache().contains(Path::new("/a.css")));
    }

    struct CountingFs {
        inner: MemoryFileSystem,
        reads: Cell<usize>,
    }

    impl FileSystem for CountingFs {
        fn read_to_string(&self, path: &Path) -> Result<String> {
            self.reads.set(self.reads.get() + 1);
            self.inner.read_to_string(path)
        }

        fn mtime(&self, path: &Path) -> Result<SystemTime> {
            self.inner.mtime(path)
        }
    }

    #[test]
    fn test_bundle_reads_shared_import_once_per_generation() {
        let fs = Rc::new(CountingFs {
            inner: MemoryFileSystem::new(),
            reads: Cell::new(0),
        });
        fs.inner.add_file("/c.css", ":vars { shared: red; }");
        fs.inner.add_file(
            "/a.css",
            ":import { -st-from: \"./c.css\"; -st-named: shared; }\n.root { color: value(shared); }",
        );
        fs.inner.add_file(
            "/b.css",
            ":import { -st-from: \"./c.css\"; -st-named: shared; }\n.root { background: value(shared); }",
        );
        let counter = Rc::clone(&fs);
        let compiler = Compiler::new(CompilerConfig::new(fs));

        let entries = [PathBuf::from("/a.css"), PathBuf::from("/b.css")];
        let css = compiler.bundle(&entries).unwrap();
        assert!(css.contains("color: red;"));
        assert_eq!(counter.reads.get(), 3);

        counter
            .inner
            .set_content(Path::new("/c.css"), ":vars { shared: blue; }");
        compiler.invalidate(Path::new("/c.css"));
        // Only the invalidated file is re-read; a and b stay cached.
        let css = compiler.bundle(&entries).unwrap();
        assert!(css.contains("color: blue;"));
        assert_eq!(counter.reads.get(), 4);
    }

    #[test]
    fn test_custom_delimiter() {
        let fs = Rc::new(MemoryFileSystem::new());
        fs.add_file("/a.css", ".root {}");
        let compiler = Compiler::new(CompilerConfig::new(fs).with_delimiter("__"));
        let result = compiler.transform(Path::new("/a.css")).unwrap();
        assert!(result.exports.get("root").unwrap().contains("__root"));
    }
}

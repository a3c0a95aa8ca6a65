//! Cross-file symbol resolution
//!
//! Walks one import hop at a time: an import binding fetches the target
//! through the file cache and recurses into that unit's table under the
//! (possibly renamed) exported name, so re-exports chain naturally. Symbols
//! from non-styling modules resolve to concrete values through the module
//! loader. Cycle detection uses a per-call visited list of `(path, name)`
//! pairs; the list never outlives a single top-level call.

use crate::cache::FileCache;
use crate::fs::ModuleLoader;
use crate::processor::{CompiledUnit, ImportTarget, Symbol, SymbolKind};
use crate::utils;
use std::path::PathBuf;
use std::rc::Rc;

/// Outcome of resolving a local name against the reachable import graph.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// A concrete styling symbol, owned by `unit` (which may be the unit
    /// resolution started from, or any unit reached through imports).
    Local { unit: Rc<CompiledUnit>, symbol: Symbol },
    /// A value imported from a non-styling module.
    Js { value: String },
    /// Nothing found; `trail` lists the `(path, name)` hops taken, which
    /// includes the full cycle when one was detected.
    Unresolved { name: String, trail: Vec<String> },
}

impl Resolution {
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Resolution::Unresolved { .. })
    }
}

pub struct Resolver<'a> {
    cache: &'a FileCache,
    loader: &'a dyn ModuleLoader,
}

impl<'a> Resolver<'a> {
    pub fn new(cache: &'a FileCache, loader: &'a dyn ModuleLoader) -> Self {
        Self { cache, loader }
    }

    /// Resolve `name` in `unit`, walking imports as needed. Each call owns a
    /// fresh visited list.
    pub fn resolve(&self, unit: &Rc<CompiledUnit>, name: &str) -> Resolution {
        let mut visited = Vec::new();
        self.resolve_step(Rc::clone(unit), name, &mut visited)
    }

    fn resolve_step(
        &self,
        unit: Rc<CompiledUnit>,
        name: &str,
        visited: &mut Vec<(PathBuf, String)>,
    ) -> Resolution {
        let key = (unit.source.clone(), name.to_string());
        if visited.contains(&key) {
            visited.push(key);
            log::warn!(
                "cyclic import while resolving '{}': {}",
                name,
                format_trail(visited).join(" -> ")
            );
            return Resolution::Unresolved {
                name: name.to_string(),
                trail: format_trail(visited),
            };
        }
        visited.push(key);

        let symbol = match unit.get_symbol(name) {
            Some(symbol) => symbol,
            None => {
                return Resolution::Unresolved {
                    name: name.to_string(),
                    trail: format_trail(visited),
                }
            }
        };

        let binding = match &symbol.kind {
            SymbolKind::Import(binding) => binding.clone(),
            _ => {
                let symbol = symbol.clone();
                return Resolution::Local { unit, symbol };
            }
        };

        if utils::is_styling_path(&binding.from_path) {
            let target = match self.cache.process(&binding.from_path) {
                Ok(target) => target,
                Err(e) => {
                    log::warn!(
                        "failed to load '{}' while resolving '{}': {}",
                        binding.from_path.display(),
                        name,
                        e
                    );
                    return Resolution::Unresolved {
                        name: name.to_string(),
                        trail: format_trail(visited),
                    };
                }
            };
            let remote = match &binding.target {
                ImportTarget::Default => target.root.clone(),
                ImportTarget::Named(remote) => remote.clone(),
            };
            self.resolve_step(target, &remote, visited)
        } else {
            let export_key = match &binding.target {
                ImportTarget::Default => "default",
                ImportTarget::Named(remote) => remote.as_str(),
            };
            match self.loader.load(&binding.from_path) {
                Ok(exports) => match exports.get(export_key) {
                    Some(value) => Resolution::Js {
                        value: value.clone(),
                    },
                    None => Resolution::Unresolved {
                        name: name.to_string(),
                        trail: format_trail(visited),
                    },
                },
                Err(e) => {
                    log::warn!("module loader failed for '{}': {}", binding.from_path.display(), e);
                    Resolution::Unresolved {
                        name: name.to_string(),
                        trail: format_trail(visited),
                    }
                }
            }
        }
    }
}

fn format_trail(visited: &[(PathBuf, String)]) -> Vec<String> {
    visited
        .iter()
        .map(|(path, name)| format!("{}#{}", path.display(), name))
        .collect()
}

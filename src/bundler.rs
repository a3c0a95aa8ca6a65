//! Multi-entry bundle assembly with theme composition
//!
//! Entries are transformed in order while their import graphs are walked for
//! theme relationships. Each theme reached this way becomes a transient
//! theme entry that accumulates override contributions; at assembly time the
//! theme's output is spliced into the document together with one clone per
//! contribution, and the whole segment sequence is reversed so base
//! dependencies precede their dependents in final source order.

use crate::ast::{self, AtRule, Declaration, Node, Rule, SelectorPart, Stylesheet};
use crate::cache::FileCache;
use crate::error::{CompilerError, Result};
use crate::fs::ModuleLoader;
use crate::processor::{CompiledUnit, SymbolKind};
use crate::transformer::{CompilationResult, Transformer};
use crate::utils;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Override declarations contributed by one bundle entry. Clone selectors
/// rebind the theme's root to `entry_root`.
struct OverrideSet {
    entry_root: String,
    declarations: Vec<(String, String)>,
}

/// Transient per-theme state: pending on first encounter, accumulating while
/// later entries contribute overrides, consumed exactly once at assembly.
struct ThemeEntry {
    /// Position of the last entry that required this theme; the finalized
    /// block is spliced right after that entry's segment.
    index: usize,
    result: Rc<CompilationResult>,
    /// Most recent contribution first.
    overrides: Vec<OverrideSet>,
}

/// Working state for one bundle call. Never survives the call; staleness
/// across calls is the file cache's concern.
struct BundleState {
    /// Theme entries in first-encounter order, keyed by theme path.
    themes: Vec<(PathBuf, ThemeEntry)>,
    /// Paths imported without a theme marker anywhere in the walked graph.
    plain_dependencies: HashSet<PathBuf>,
    generated: HashMap<PathBuf, Rc<CompilationResult>>,
}

pub struct Bundler<'a> {
    cache: &'a FileCache,
    loader: &'a dyn ModuleLoader,
    delimiter: &'a str,
}

impl<'a> Bundler<'a> {
    pub fn new(cache: &'a FileCache, loader: &'a dyn ModuleLoader, delimiter: &'a str) -> Self {
        Self {
            cache,
            loader,
            delimiter,
        }
    }

    /// Compose the ordered entry list into one CSS document.
    pub fn bundle(&self, entries: &[PathBuf]) -> Result<String> {
        for path in entries {
            if !utils::is_styling_path(path) {
                return Err(CompilerError::theme(format!(
                    "'{}' is not a stylesheet: themes are not importable from non-styling entries",
                    path.display()
                )));
            }
        }

        let transformer = Transformer::new(self.cache, self.loader, self.delimiter);
        let mut state = BundleState {
            themes: Vec::new(),
            plain_dependencies: HashSet::new(),
            generated: HashMap::new(),
        };
        let mut segments: Vec<Stylesheet> = Vec::new();

        for (index, path) in entries.iter().enumerate() {
            let result = self.generate(path, &transformer, &mut state)?;
            let entry_root = result.scoped_root(self.delimiter);
            self.collect_themes(&result, index, &entry_root, &[], entries, &mut state, &transformer)?;

            let mut segment = result.ast.clone();
            remove_unused_rules(&mut segment, &result.unit, entries);
            segments.push(segment);
        }

        // Reverse first-encounter order, so a theme that later turns out to
        // be another theme's base lands deeper in the document.
        for position in (0..state.themes.len()).rev() {
            let (_, theme) = &state.themes[position];
            let mut base = theme.result.ast.clone();
            remove_unused_rules(&mut base, &theme.result.unit, entries);
            let theme_root = theme.result.scoped_root(self.delimiter);

            let mut block: Vec<Stylesheet> = Vec::with_capacity(theme.overrides.len() + 1);
            for set in theme.overrides.iter().rev() {
                block.push(self.override_clone(&base, &theme_root, set, &theme.result, &transformer));
            }
            block.push(base);

            let at = (theme.index + 1).min(segments.len());
            segments.splice(at..at, block);
        }

        segments.reverse();
        let rendered: Vec<String> = segments
            .iter()
            .map(|segment| segment.to_string())
            .filter(|css| !css.trim().is_empty())
            .collect();
        log::info!(
            "bundled {} entries ({} themes) into {} segments",
            entries.len(),
            state.themes.len(),
            rendered.len()
        );
        Ok(rendered.join("\n\n"))
    }

    fn generate(
        &self,
        path: &Path,
        transformer: &Transformer,
        state: &mut BundleState,
    ) -> Result<Rc<CompilationResult>> {
        if let Some(result) = state.generated.get(path) {
            return Ok(Rc::clone(result));
        }
        let unit = self.cache.process(path)?;
        let result = Rc::new(transformer.transform(&unit));
        state.generated.insert(path.to_path_buf(), Rc::clone(&result));
        Ok(result)
    }

    /// Walk a unit's imports, registering theme entries and accumulating
    /// override contributions. `ancestor` carries override declarations from
    /// imports closer to the entry; clones rebind to `entry_root`.
    fn collect_themes(
        &self,
        result: &Rc<CompilationResult>,
        index: usize,
        entry_root: &str,
        ancestor: &[(String, String)],
        entries: &[PathBuf],
        state: &mut BundleState,
        transformer: &Transformer,
    ) -> Result<()> {
        for import in &result.unit.imports {
            let known = state
                .themes
                .iter()
                .position(|(path, _)| path == &import.from_path);

            if !import.theme && known.is_none() {
                state.plain_dependencies.insert(import.from_path.clone());
                continue;
            }
            if !import.theme || state.plain_dependencies.contains(&import.from_path) {
                return Err(CompilerError::theme(format!(
                    "'{}' is required both as a plain dependency and as a theme",
                    import.from_path.display()
                )));
            }
            // A theme that is itself a bundle entry would land in the
            // document twice with no single correct cascade position.
            if entries.iter().any(|entry| entry == &import.from_path) {
                return Err(CompilerError::theme(format!(
                    "'{}' is a bundle entry and cannot also be used as a theme",
                    import.from_path.display()
                )));
            }

            let mut merged: Vec<(String, String)> = import.overrides.clone();
            for (prop, value) in ancestor {
                let aliases_theme = match result.unit.get_symbol(prop).map(|s| &s.kind) {
                    Some(SymbolKind::Import(binding)) => binding.from_path == import.from_path,
                    _ => false,
                };
                if !aliases_theme {
                    continue;
                }
                // Nearest ancestor to the entry wins over deeper overrides.
                match merged.iter_mut().find(|(existing, _)| existing == prop) {
                    Some(slot) => slot.1 = value.clone(),
                    None => merged.push((prop.clone(), value.clone())),
                }
            }

            match known {
                Some(position) => {
                    let theme = &mut state.themes[position].1;
                    theme.index = index;
                    if !import.overrides.is_empty() {
                        theme.overrides.insert(
                            0,
                            OverrideSet {
                                entry_root: entry_root.to_string(),
                                declarations: merged,
                            },
                        );
                    }
                }
                None => {
                    let dep = self.generate(&import.from_path, transformer, state)?;
                    let overrides = if merged.is_empty() {
                        Vec::new()
                    } else {
                        vec![OverrideSet {
                            entry_root: entry_root.to_string(),
                            declarations: merged.clone(),
                        }]
                    };
                    state.themes.push((
                        import.from_path.clone(),
                        ThemeEntry {
                            index,
                            result: Rc::clone(&dep),
                            overrides,
                        },
                    ));
                    self.collect_themes(&dep, index, entry_root, &merged, entries, state, transformer)?;
                }
            }
        }
        Ok(())
    }

    /// Clone of the theme output keeping only declarations the override set
    /// actually changes, rebound from the theme root to the contributing
    /// entry's root. A no-op override yields an empty stylesheet.
    fn override_clone(
        &self,
        base: &Stylesheet,
        theme_root: &str,
        set: &OverrideSet,
        theme: &CompilationResult,
        transformer: &Transformer,
    ) -> Stylesheet {
        Stylesheet {
            nodes: self.override_nodes(&base.nodes, theme_root, set, theme, transformer),
        }
    }

    fn override_nodes(
        &self,
        nodes: &[Node],
        theme_root: &str,
        set: &OverrideSet,
        theme: &CompilationResult,
        transformer: &Transformer,
    ) -> Vec<Node> {
        let mut out = Vec::new();
        for node in nodes {
            match node {
                Node::Rule(rule) => {
                    let mut declarations = Vec::new();
                    for decl in &rule.declarations {
                        let substituted = transformer
                            .substitute_overrides(&decl.source_value, &theme.unit, &set.declarations)
                            .map(|value| {
                                if decl.prop == "animation" || decl.prop == "animation-name" {
                                    transformer.scope_animation_value(&value, &theme.unit)
                                } else {
                                    value
                                }
                            });
                        if let Some(value) = substituted {
                            if value != decl.value {
                                declarations.push(Declaration {
                                    value,
                                    ..decl.clone()
                                });
                            }
                        }
                    }
                    if !declarations.is_empty() {
                        out.push(Node::Rule(Rule {
                            selector: rebind_root(&rule.selector, theme_root, &set.entry_root),
                            source_selector: rule.source_selector.clone(),
                            declarations,
                            line: rule.line,
                        }));
                    }
                }
                Node::AtRule(at) => {
                    let body = at
                        .body
                        .as_ref()
                        .map(|inner| self.override_nodes(inner, theme_root, set, theme, transformer));
                    if matches!(&body, Some(inner) if !inner.is_empty()) {
                        out.push(Node::AtRule(AtRule {
                            name: at.name.clone(),
                            params: at.params.clone(),
                            body,
                            line: at.line,
                        }));
                    }
                }
            }
        }
        out
    }
}

/// Rewrite class segments that are exactly the theme's scoped root to the
/// contributing entry's root, leaving other segments (including ones that
/// merely share the prefix) alone.
fn rebind_root(selector: &str, theme_root: &str, entry_root: &str) -> String {
    let parts: Vec<SelectorPart> = ast::parse_selector(selector)
        .into_iter()
        .map(|part| match part {
            SelectorPart::Class(name) if name == theme_root => {
                SelectorPart::Class(entry_root.to_string())
            }
            other => other,
        })
        .collect();
    ast::selector_to_string(&parts)
}

/// Drop rules that only style symbols bound by imports whose target is
/// outside the working entry set; those selectors cannot match once the
/// import's output is absent from the document.
fn remove_unused_rules(sheet: &mut Stylesheet, unit: &CompiledUnit, entries: &[PathBuf]) {
    for import in &unit.imports {
        if entries.iter().any(|entry| entry == &import.from_path) {
            continue;
        }
        let bound = import.bound_names();
        if bound.is_empty() {
            continue;
        }
        remove_referencing_rules(&mut sheet.nodes, &bound);
    }
}

fn remove_referencing_rules(nodes: &mut Vec<Node>, bound: &[&str]) {
    nodes.retain_mut(|node| match node {
        Node::Rule(rule) => !selector_references(&rule.source_selector, bound),
        Node::AtRule(at) => {
            if let Some(body) = &mut at.body {
                remove_referencing_rules(body, bound);
            }
            true
        }
    });
}

fn selector_references(selector: &str, names: &[&str]) -> bool {
    ast::parse_selector(selector).iter().any(|part| match part {
        SelectorPart::Class(name) | SelectorPart::Element(name) => {
            names.iter().any(|bound| bound == name)
        }
        _ => false,
    })
}

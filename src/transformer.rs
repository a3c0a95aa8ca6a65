//! AST transformation: scoping, value substitution, mixins, exports
//!
//! The transformer consumes a compiled unit plus the resolver and produces a
//! compilation result with a brand-new AST; the compiled unit itself is
//! never mutated, so several transforms (with different override contexts
//! downstream) can share one unit. Scoping always binds a selector segment
//! to the symbol's point of declaration: an imported class is rewritten with
//! the *owning* unit's namespace, not the importer's.

use crate::ast::{self, AtRule, Declaration, Node, Rule, SelectorPart, Stylesheet};
use crate::cache::FileCache;
use crate::error::Diagnostics;
use crate::fs::ModuleLoader;
use crate::processor::{CompiledUnit, SymbolKind, IMPORT_SELECTOR, MIXIN_PROP, VARS_SELECTOR};
use crate::resolver::{Resolution, Resolver};
use crate::values::ValueTemplate;
use std::collections::BTreeMap;
use std::rc::Rc;

pub const DEFAULT_DELIMITER: &str = "--";

/// Bound on cross-file variable chains during value lookup.
const MAX_VAR_DEPTH: usize = 16;

/// Output of one transform: the scoped AST plus the export map. The source
/// compiled unit rides along for consumers (the bundler) that need the
/// symbol table and import list next to the transformed tree.
#[derive(Debug, Clone)]
pub struct CompilationResult {
    pub unit: Rc<CompiledUnit>,
    pub ast: Stylesheet,
    /// Authored local name -> scoped identifier (classes, keyframes) or
    /// resolved literal value (variables). Sorted for determinism.
    pub exports: BTreeMap<String, String>,
    pub diagnostics: Diagnostics,
}

impl CompilationResult {
    /// The unit's scoped root selector name.
    pub fn scoped_root(&self, delimiter: &str) -> String {
        format!("{}{}{}", self.unit.namespace, delimiter, self.unit.root)
    }
}

pub struct Transformer<'a> {
    cache: &'a FileCache,
    loader: &'a dyn ModuleLoader,
    delimiter: &'a str,
    template: ValueTemplate,
}

impl<'a> Transformer<'a> {
    pub fn new(cache: &'a FileCache, loader: &'a dyn ModuleLoader, delimiter: &'a str) -> Self {
        Self {
            cache,
            loader,
            delimiter,
            template: ValueTemplate::new(),
        }
    }

    pub fn transform(&self, unit: &Rc<CompiledUnit>) -> CompilationResult {
        let resolver = Resolver::new(self.cache, self.loader);
        let mut diagnostics = Diagnostics::new();

        let nodes = self.transform_nodes(&unit.ast.nodes, unit, &resolver, &mut diagnostics);
        let exports = self.build_exports(unit, &resolver, &mut diagnostics);

        log::debug!(
            "transformed {}: {} exports, {} diagnostics",
            unit.source.display(),
            exports.len(),
            diagnostics.len()
        );

        CompilationResult {
            unit: Rc::clone(unit),
            ast: Stylesheet { nodes },
            exports,
            diagnostics,
        }
    }

    pub fn scope(&self, namespace: &str, name: &str) -> String {
        format!("{}{}{}", namespace, self.delimiter, name)
    }

    fn transform_nodes(
        &self,
        nodes: &[Node],
        unit: &Rc<CompiledUnit>,
        resolver: &Resolver,
        diagnostics: &mut Diagnostics,
    ) -> Vec<Node> {
        let mut out = Vec::new();
        for node in nodes {
            match node {
                Node::Rule(rule) => {
                    if rule.selector == IMPORT_SELECTOR || rule.selector == VARS_SELECTOR {
                        continue;
                    }
                    out.push(Node::Rule(
                        self.transform_rule(rule, unit, resolver, diagnostics),
                    ));
                }
                Node::AtRule(at) => match at.name.as_str() {
                    "namespace" => {}
                    "keyframes" => {
                        let name = at.params.split_whitespace().next().unwrap_or("");
                        let params = if unit.get_symbol(name).is_some() {
                            self.scope(&unit.namespace, name)
                        } else {
                            at.params.clone()
                        };
                        let body = at.body.as_ref().map(|frames| {
                            frames
                                .iter()
                                .map(|frame| match frame {
                                    Node::Rule(rule) => {
                                        let mut frame_rule = rule.clone();
                                        frame_rule.declarations = self.transform_declarations(
                                            rule,
                                            unit,
                                            resolver,
                                            diagnostics,
                                        );
                                        Node::Rule(frame_rule)
                                    }
                                    other => other.clone(),
                                })
                                .collect()
                        });
                        out.push(Node::AtRule(AtRule {
                            name: at.name.clone(),
                            params,
                            body,
                            line: at.line,
                        }));
                    }
                    _ => {
                        let body = at
                            .body
                            .as_ref()
                            .map(|inner| self.transform_nodes(inner, unit, resolver, diagnostics));
                        out.push(Node::AtRule(AtRule {
                            name: at.name.clone(),
                            params: at.params.clone(),
                            body,
                            line: at.line,
                        }));
                    }
                },
            }
        }
        out
    }

    fn transform_rule(
        &self,
        rule: &Rule,
        unit: &Rc<CompiledUnit>,
        resolver: &Resolver,
        diagnostics: &mut Diagnostics,
    ) -> Rule {
        Rule {
            selector: self.scope_selector(&rule.selector, unit, resolver, diagnostics, rule.line),
            source_selector: rule.source_selector.clone(),
            declarations: self.transform_declarations(rule, unit, resolver, diagnostics),
            line: rule.line,
        }
    }

    /// Rewrite every class/tag segment to its declaring unit's scoped name.
    fn scope_selector(
        &self,
        selector: &str,
        unit: &Rc<CompiledUnit>,
        resolver: &Resolver,
        diagnostics: &mut Diagnostics,
        line: usize,
    ) -> String {
        let parts = ast::parse_selector(selector);
        let scoped: Vec<SelectorPart> = parts
            .into_iter()
            .map(|part| match part {
                SelectorPart::Class(name) => {
                    match self.scoped_symbol_name(&name, unit, resolver) {
                        Some((scoped_name, _)) => SelectorPart::Class(scoped_name),
                        None => {
                            diagnostics
                                .warn(line, format!("could not scope class '{}'", name));
                            SelectorPart::Class(name)
                        }
                    }
                }
                SelectorPart::Element(name) => {
                    let selector_symbol = matches!(
                        unit.get_symbol(&name).map(|s| &s.kind),
                        Some(SymbolKind::Class | SymbolKind::Element | SymbolKind::Import(_))
                    );
                    if !selector_symbol {
                        // Native tag, or a name owned by a non-selector
                        // symbol: pass through untouched.
                        return SelectorPart::Element(name);
                    }
                    match self.scoped_symbol_name(&name, unit, resolver) {
                        Some((scoped_name, SymbolKind::Element)) => {
                            SelectorPart::Element(scoped_name)
                        }
                        Some((scoped_name, _)) => SelectorPart::Class(scoped_name),
                        None => {
                            diagnostics
                                .warn(line, format!("could not scope element '{}'", name));
                            SelectorPart::Element(name)
                        }
                    }
                }
                other => other,
            })
            .collect();
        ast::selector_to_string(&scoped)
    }

    /// Scoped output name for a selector symbol, bound to its declaring
    /// unit. Returns the declared kind alongside so element symbols keep
    /// tag-selector syntax.
    fn scoped_symbol_name(
        &self,
        name: &str,
        unit: &Rc<CompiledUnit>,
        resolver: &Resolver,
    ) -> Option<(String, SymbolKind)> {
        match resolver.resolve(unit, name) {
            Resolution::Local { unit: owner, symbol } => match symbol.kind {
                SymbolKind::Class | SymbolKind::Element => Some((
                    self.scope(&owner.namespace, &symbol.name),
                    symbol.kind.clone(),
                )),
                _ => None,
            },
            _ => None,
        }
    }

    fn transform_declarations(
        &self,
        rule: &Rule,
        unit: &Rc<CompiledUnit>,
        resolver: &Resolver,
        diagnostics: &mut Diagnostics,
    ) -> Vec<Declaration> {
        let mut out = Vec::new();
        for decl in &rule.declarations {
            if decl.prop == MIXIN_PROP {
                for name in decl.value.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                    out.extend(self.apply_mixin(name, unit, resolver, diagnostics, decl.line));
                }
                continue;
            }
            if decl.prop.starts_with("-st-") {
                diagnostics.warn(
                    decl.line,
                    format!("unknown directive '{}' dropped from output", decl.prop),
                );
                continue;
            }

            let mut value = self.expand_value(&decl.value, unit, resolver, diagnostics, decl.line);
            if decl.prop == "animation" || decl.prop == "animation-name" {
                value = self.scope_animation_value(&value, unit);
            }
            out.push(Declaration {
                prop: decl.prop.clone(),
                value,
                source_value: decl.source_value.clone(),
                line: decl.line,
            });
        }
        out
    }

    /// Expand `value(...)` references against the unit's resolvable graph.
    fn expand_value(
        &self,
        raw: &str,
        unit: &Rc<CompiledUnit>,
        resolver: &Resolver,
        diagnostics: &mut Diagnostics,
        line: usize,
    ) -> String {
        let (value, unresolved) = self
            .template
            .expand(raw, &mut |name| self.lookup_var(name, unit, resolver, 0));
        for name in unresolved {
            diagnostics.warn(line, format!("unresolved value reference '{}'", name));
        }
        value
    }

    /// Resolve a variable reference to its literal value, expanding nested
    /// references in the scope of the unit that declares them.
    fn lookup_var(
        &self,
        name: &str,
        unit: &Rc<CompiledUnit>,
        resolver: &Resolver,
        depth: usize,
    ) -> Option<String> {
        if depth >= MAX_VAR_DEPTH {
            return None;
        }
        match resolver.resolve(unit, name) {
            Resolution::Local { unit: owner, symbol } => match &symbol.kind {
                SymbolKind::Var { value } => {
                    let (expanded, unresolved) = self.template.expand(value, &mut |nested| {
                        self.lookup_var(nested, &owner, resolver, depth + 1)
                    });
                    unresolved.is_empty().then_some(expanded)
                }
                _ => None,
            },
            Resolution::Js { value } => Some(value),
            Resolution::Unresolved { .. } => None,
        }
    }

    /// Re-expand an authored value through an override map, falling back to
    /// the unit's own resolvable variables. `None` when references remain
    /// unresolved (the caller treats the value as unchanged).
    pub(crate) fn substitute_overrides(
        &self,
        source_value: &str,
        unit: &Rc<CompiledUnit>,
        overrides: &[(String, String)],
    ) -> Option<String> {
        let resolver = Resolver::new(self.cache, self.loader);
        let (value, unresolved) = self.template.expand(source_value, &mut |name| {
            overrides
                .iter()
                .find(|(prop, _)| prop == name)
                .map(|(_, v)| v.clone())
                .or_else(|| self.lookup_var(name, unit, &resolver, 0))
        });
        unresolved.is_empty().then_some(value)
    }

    /// Splice a mixin target's declaration block, inheriting the target's
    /// own scoping and variable context.
    fn apply_mixin(
        &self,
        name: &str,
        unit: &Rc<CompiledUnit>,
        resolver: &Resolver,
        diagnostics: &mut Diagnostics,
        line: usize,
    ) -> Vec<Declaration> {
        match resolver.resolve(unit, name) {
            Resolution::Local { unit: owner, symbol } => match symbol.kind {
                SymbolKind::Class => {
                    let decls =
                        self.class_declarations(&symbol.name, &owner, resolver, diagnostics, line);
                    if decls.is_empty() {
                        diagnostics.warn(
                            line,
                            format!("mixin '{}' contributes no declarations", name),
                        );
                    }
                    decls
                }
                _ => {
                    diagnostics.warn(line, format!("'{}' is not usable as a mixin", name));
                    Vec::new()
                }
            },
            Resolution::Js { value } => parse_declaration_block(&value, line),
            Resolution::Unresolved { trail, .. } => {
                diagnostics.warn(
                    line,
                    format!("unresolved mixin '{}' ({})", name, trail.join(" -> ")),
                );
                Vec::new()
            }
        }
    }

    /// All declarations of rules whose selector is exactly `.name` in the
    /// owning unit, values expanded in that unit's context.
    fn class_declarations(
        &self,
        class: &str,
        owner: &Rc<CompiledUnit>,
        resolver: &Resolver,
        diagnostics: &mut Diagnostics,
        line: usize,
    ) -> Vec<Declaration> {
        let wanted = vec![SelectorPart::Class(class.to_string())];
        let mut out = Vec::new();
        for node in &owner.ast.nodes {
            let rule = match node {
                Node::Rule(rule) => rule,
                Node::AtRule(_) => continue,
            };
            if ast::parse_selector(&rule.selector) != wanted {
                continue;
            }
            for decl in &rule.declarations {
                if decl.prop.starts_with("-st-") {
                    continue;
                }
                out.push(Declaration {
                    prop: decl.prop.clone(),
                    value: self.expand_value(&decl.value, owner, resolver, diagnostics, line),
                    source_value: decl.source_value.clone(),
                    line,
                });
            }
        }
        out
    }

    /// Rewrite animation-name words that reference local keyframes.
    pub(crate) fn scope_animation_value(&self, value: &str, unit: &Rc<CompiledUnit>) -> String {
        value
            .split(' ')
            .map(|word| {
                match unit.get_symbol(word.trim_end_matches(',')) {
                    Some(symbol) if matches!(symbol.kind, SymbolKind::Keyframes) => {
                        let trimmed = word.trim_end_matches(',');
                        let commas = &word[trimmed.len()..];
                        format!("{}{}", self.scope(&unit.namespace, trimmed), commas)
                    }
                    _ => word.to_string(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn build_exports(
        &self,
        unit: &Rc<CompiledUnit>,
        resolver: &Resolver,
        diagnostics: &mut Diagnostics,
    ) -> BTreeMap<String, String> {
        let mut exports = BTreeMap::new();
        for name in &unit.symbol_order {
            let symbol = match unit.get_symbol(name) {
                Some(symbol) => symbol,
                None => continue,
            };
            match &symbol.kind {
                SymbolKind::Class | SymbolKind::Keyframes => {
                    exports.insert(name.clone(), self.scope(&unit.namespace, name));
                }
                SymbolKind::Var { value } => {
                    let resolved = self.expand_value(value, unit, resolver, diagnostics, 0);
                    exports.insert(name.clone(), resolved);
                }
                SymbolKind::Element | SymbolKind::Import(_) => {}
            }
        }
        exports
    }
}

/// Parse a `prop: value; prop: value` block, as produced by host-module
/// mixins.
fn parse_declaration_block(block: &str, line: usize) -> Vec<Declaration> {
    block
        .split(';')
        .filter_map(|entry| {
            let (prop, value) = entry.split_once(':')?;
            let prop = prop.trim();
            let value = value.trim();
            (!prop.is_empty() && !value.is_empty())
                .then(|| Declaration::new(prop, value, line))
        })
        .collect()
}

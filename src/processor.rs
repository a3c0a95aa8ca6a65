//! Per-file processing: one AST in, one compiled unit out
//!
//! The processor is purely local. A single pass over the parsed tree builds
//! the symbol table (classes, elements, variables, keyframes, import
//! bindings), records pseudo-imports with their theme markers and override
//! declarations, and derives the file's namespace. It never touches other
//! files; cross-file concerns belong to the resolver.

use crate::ast::{self, Node, SelectorPart, Stylesheet};
use crate::error::Diagnostics;
use crate::utils;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Name of the default top-level class symbol, always present.
pub const ROOT_CLASS: &str = "root";

pub const IMPORT_SELECTOR: &str = ":import";
pub const VARS_SELECTOR: &str = ":vars";
pub const FROM_PROP: &str = "-st-from";
pub const DEFAULT_PROP: &str = "-st-default";
pub const NAMED_PROP: &str = "-st-named";
pub const THEME_PROP: &str = "-st-theme";
pub const MIXIN_PROP: &str = "-st-mixin";

/// The processed, single-file representation: symbol table + AST +
/// diagnostics, before any cross-file resolution. Created once and never
/// mutated downstream; transforms produce new structures.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledUnit {
    pub source: PathBuf,
    pub namespace: String,
    /// Local name of the default top-level class.
    pub root: String,
    pub symbols: HashMap<String, Symbol>,
    /// Declaration order of symbol names, for deterministic iteration.
    pub symbol_order: Vec<String>,
    pub imports: Vec<Import>,
    /// Mixin applications found during processing; resolved by the
    /// transformer.
    pub mixin_refs: Vec<MixinRef>,
    pub ast: Stylesheet,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Declaring file, used for lookup only.
    pub declared_in: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    Class,
    Element,
    Var { value: String },
    Keyframes,
    Import(ImportBinding),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportBinding {
    pub from_path: PathBuf,
    pub target: ImportTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportTarget {
    /// The imported file's default export: its root class for stylesheets,
    /// the `default` export for host modules.
    Default,
    Named(String),
}

/// One `:import` rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub from_path: PathBuf,
    pub default_binding: Option<String>,
    /// local name -> remote name
    pub named: Vec<(String, String)>,
    pub theme: bool,
    /// Per-import variable overrides `{prop, value}`.
    pub overrides: Vec<(String, String)>,
    pub line: usize,
}

impl Import {
    /// All local names this import binds.
    pub fn bound_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.named.iter().map(|(local, _)| local.as_str()).collect();
        if let Some(default) = &self.default_binding {
            names.push(default.as_str());
        }
        names
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MixinRef {
    pub names: Vec<String>,
    pub line: usize,
}

impl CompiledUnit {
    pub fn get_symbol(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }
}

#[derive(Debug, Default)]
pub struct Processor;

impl Processor {
    pub fn new() -> Self {
        Self
    }

    /// Build a compiled unit from a parsed stylesheet. `diagnostics` carries
    /// over parse-stage reports; processing appends its own.
    pub fn process(
        &self,
        ast: Stylesheet,
        source: &Path,
        mut diagnostics: Diagnostics,
    ) -> CompiledUnit {
        let mut unit = CompiledUnit {
            source: source.to_path_buf(),
            namespace: derive_namespace(source),
            root: ROOT_CLASS.to_string(),
            symbols: HashMap::new(),
            symbol_order: Vec::new(),
            imports: Vec::new(),
            mixin_refs: Vec::new(),
            ast: Stylesheet::default(),
            diagnostics: Diagnostics::new(),
        };

        add_symbol(&mut unit, ROOT_CLASS, SymbolKind::Class, 0, &mut diagnostics);

        self.walk_nodes(&ast.nodes, &mut unit, &mut diagnostics);

        unit.ast = ast;
        unit.diagnostics = diagnostics;
        log::debug!(
            "processed {}: {} symbols, {} imports, {} diagnostics",
            source.display(),
            unit.symbol_order.len(),
            unit.imports.len(),
            unit.diagnostics.len()
        );
        unit
    }

    fn walk_nodes(&self, nodes: &[Node], unit: &mut CompiledUnit, diags: &mut Diagnostics) {
        for node in nodes {
            match node {
                Node::Rule(rule) => match rule.selector.as_str() {
                    IMPORT_SELECTOR => self.process_import(rule, unit, diags),
                    VARS_SELECTOR => self.process_vars(rule, unit, diags),
                    _ => self.process_rule(rule, unit, diags),
                },
                Node::AtRule(at) => match at.name.as_str() {
                    "keyframes" => {
                        let name = at.params.split_whitespace().next().unwrap_or("");
                        if utils::is_valid_identifier(name) {
                            add_symbol(unit, name, SymbolKind::Keyframes, at.line, diags);
                        } else {
                            diags.warn(at.line, format!("invalid @keyframes name '{}'", at.params));
                        }
                    }
                    "namespace" => {
                        let ns = utils::strip_quotes(&at.params);
                        if utils::is_valid_identifier(ns) {
                            unit.namespace = ns.to_string();
                        } else {
                            diags.warn(at.line, format!("invalid @namespace '{}'", at.params));
                        }
                    }
                    _ => {
                        if let Some(body) = &at.body {
                            self.walk_nodes(body, unit, diags);
                        }
                    }
                },
            }
        }
    }

    fn process_import(&self, rule: &ast::Rule, unit: &mut CompiledUnit, diags: &mut Diagnostics) {
        let mut from = None;
        let mut default_binding = None;
        let mut named = Vec::new();
        let mut theme = false;
        let mut overrides = Vec::new();

        for decl in &rule.declarations {
            match decl.prop.as_str() {
                FROM_PROP => from = Some(utils::strip_quotes(&decl.value).to_string()),
                DEFAULT_PROP => {
                    let name = decl.value.trim();
                    if utils::is_valid_identifier(name) {
                        default_binding = Some(name.to_string());
                    } else {
                        diags.warn(decl.line, format!("invalid default import name '{}'", name));
                    }
                }
                NAMED_PROP => {
                    for part in decl.value.split(',') {
                        let part = part.trim();
                        if part.is_empty() {
                            continue;
                        }
                        let (remote, local) = match part.split_once(" as ") {
                            Some((remote, local)) => (remote.trim(), local.trim()),
                            None => (part, part),
                        };
                        if utils::is_valid_identifier(remote) && utils::is_valid_identifier(local) {
                            named.push((local.to_string(), remote.to_string()));
                        } else {
                            diags.warn(decl.line, format!("invalid named import '{}'", part));
                        }
                    }
                }
                THEME_PROP => theme = decl.value.trim() == "true",
                prop => overrides.push((prop.to_string(), decl.value.clone())),
            }
        }

        let from = match from {
            Some(from) if !from.is_empty() => from,
            _ => {
                diags.error(rule.line, "':import' rule is missing '-st-from'");
                return;
            }
        };

        let from_path = utils::resolve_import_path(&unit.source, &from);
        let import = Import {
            from_path: from_path.clone(),
            default_binding: default_binding.clone(),
            named: named.clone(),
            theme,
            overrides,
            line: rule.line,
        };

        if let Some(local) = default_binding {
            add_symbol(
                unit,
                &local,
                SymbolKind::Import(ImportBinding {
                    from_path: from_path.clone(),
                    target: ImportTarget::Default,
                }),
                rule.line,
                diags,
            );
        }
        for (local, remote) in named {
            add_symbol(
                unit,
                &local,
                SymbolKind::Import(ImportBinding {
                    from_path: from_path.clone(),
                    target: ImportTarget::Named(remote),
                }),
                rule.line,
                diags,
            );
        }

        unit.imports.push(import);
    }

    fn process_vars(&self, rule: &ast::Rule, unit: &mut CompiledUnit, diags: &mut Diagnostics) {
        for decl in &rule.declarations {
            if !utils::is_valid_identifier(&decl.prop) {
                diags.warn(decl.line, format!("invalid variable name '{}'", decl.prop));
                continue;
            }
            add_symbol(
                unit,
                &decl.prop,
                SymbolKind::Var {
                    value: decl.value.clone(),
                },
                decl.line,
                diags,
            );
        }
    }

    fn process_rule(&self, rule: &ast::Rule, unit: &mut CompiledUnit, diags: &mut Diagnostics) {
        for part in ast::parse_selector(&rule.selector) {
            match part {
                // Selector use of an already-bound name (an import, usually)
                // is a reference, not a redeclaration.
                SelectorPart::Class(name) => {
                    if !unit.symbols.contains_key(&name) {
                        add_symbol(unit, &name, SymbolKind::Class, rule.line, diags);
                    }
                }
                SelectorPart::Element(name) => {
                    // Native tags stay untyped; custom elements become
                    // scoped symbols like classes do.
                    if is_custom_element(&name) && !unit.symbols.contains_key(&name) {
                        add_symbol(unit, &name, SymbolKind::Element, rule.line, diags);
                    }
                }
                _ => {}
            }
        }

        for decl in &rule.declarations {
            if decl.prop == MIXIN_PROP {
                let names: Vec<String> = decl
                    .value
                    .split(',')
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .collect();
                if names.is_empty() {
                    diags.warn(decl.line, "'-st-mixin' with no mixin names");
                } else {
                    unit.mixin_refs.push(MixinRef {
                        names,
                        line: decl.line,
                    });
                }
            }
        }
    }
}

/// Custom elements are scoped like classes; native lowercase tags pass
/// through to output untouched.
pub fn is_custom_element(name: &str) -> bool {
    name.chars().next().map(|c| c.is_ascii_uppercase()).unwrap_or(false)
}

fn add_symbol(
    unit: &mut CompiledUnit,
    name: &str,
    kind: SymbolKind,
    line: usize,
    diags: &mut Diagnostics,
) {
    if let Some(existing) = unit.symbols.get(name) {
        let reusable = matches!(
            (&existing.kind, &kind),
            (SymbolKind::Class, SymbolKind::Class) | (SymbolKind::Element, SymbolKind::Element)
        );
        if !reusable {
            diags.error(line, format!("redeclaration of symbol '{}'", name));
        }
        return;
    }
    unit.symbols.insert(
        name.to_string(),
        Symbol {
            name: name.to_string(),
            kind,
            declared_in: unit.source.clone(),
        },
    );
    unit.symbol_order.push(name.to_string());
}

/// Deterministic namespace from file identity: sanitized stem plus a short
/// content-independent hash of the absolute path.
pub fn derive_namespace(source: &Path) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "stylesheet".to_string());
    let stem = stem.strip_suffix(".st").unwrap_or(&stem);
    let digest = hex::encode(md5::compute(source.to_string_lossy().as_bytes()).0);
    format!("{}-{}", utils::sanitize_identifier(stem), &digest[..6])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    fn process(source: &str, path: &str) -> CompiledUnit {
        let (sheet, diags) = parser::parse(source);
        Processor::new().process(sheet, Path::new(path), diags)
    }

    #[test]
    fn test_root_always_present() {
        let unit = process("", "/a.css");
        assert!(matches!(
            unit.get_symbol("root").map(|s| &s.kind),
            Some(SymbolKind::Class)
        ));
    }

    #[test]
    fn test_class_and_var_symbols() {
        let unit = process(
            ".root { color: red; }\n.part {}\n:vars { main: green; }",
            "/a.css",
        );
        assert!(matches!(
            unit.get_symbol("part").map(|s| &s.kind),
            Some(SymbolKind::Class)
        ));
        match unit.get_symbol("main").map(|s| &s.kind) {
            Some(SymbolKind::Var { value }) => assert_eq!(value, "green"),
            other => panic!("expected var symbol, got {:?}", other),
        }
        assert!(unit.diagnostics.is_empty());
    }

    #[test]
    fn test_import_parsing() {
        let unit = process(
            ":import {\n    -st-from: \"./theme.css\";\n    -st-default: Theme;\n    -st-named: color1, color2 as accent;\n    -st-theme: true;\n    color1: blue;\n}",
            "/src/comp.css",
        );
        assert_eq!(unit.imports.len(), 1);
        let import = &unit.imports[0];
        assert_eq!(import.from_path, PathBuf::from("/src/theme.css"));
        assert!(import.theme);
        assert_eq!(import.default_binding.as_deref(), Some("Theme"));
        assert_eq!(
            import.named,
            vec![
                ("color1".to_string(), "color1".to_string()),
                ("accent".to_string(), "color2".to_string()),
            ]
        );
        assert_eq!(
            import.overrides,
            vec![("color1".to_string(), "blue".to_string())]
        );

        match unit.get_symbol("accent").map(|s| &s.kind) {
            Some(SymbolKind::Import(binding)) => {
                assert_eq!(binding.target, ImportTarget::Named("color2".to_string()));
            }
            other => panic!("expected import binding, got {:?}", other),
        }
    }

    #[test]
    fn test_import_without_from_is_diagnostic() {
        let unit = process(":import { -st-default: X; }", "/a.css");
        assert!(unit.imports.is_empty());
        assert!(unit.diagnostics.has_errors());
    }

    #[test]
    fn test_redeclaration_diagnostic() {
        let unit = process(
            ":vars { main: red; }\n:vars { main: blue; }",
            "/a.css",
        );
        assert!(unit.diagnostics.has_errors());
        // First declaration wins.
        match unit.get_symbol("main").map(|s| &s.kind) {
            Some(SymbolKind::Var { value }) => assert_eq!(value, "red"),
            other => panic!("expected var symbol, got {:?}", other),
        }
    }

    #[test]
    fn test_class_reuse_is_not_redeclaration() {
        let unit = process(".a { color: red; }\n.a:hover { color: blue; }", "/a.css");
        assert!(unit.diagnostics.is_empty());
    }

    #[test]
    fn test_keyframes_and_custom_elements() {
        let unit = process(
            "@keyframes spin { from { opacity: 0; } }\nIcon {}\ndiv {}",
            "/a.css",
        );
        assert!(matches!(
            unit.get_symbol("spin").map(|s| &s.kind),
            Some(SymbolKind::Keyframes)
        ));
        assert!(matches!(
            unit.get_symbol("Icon").map(|s| &s.kind),
            Some(SymbolKind::Element)
        ));
        assert!(unit.get_symbol("div").is_none());
    }

    #[test]
    fn test_namespace_derivation() {
        let a = process("", "/project/button.st.css");
        let b = process("", "/other/button.st.css");
        assert!(a.namespace.starts_with("button-"));
        assert!(b.namespace.starts_with("button-"));
        assert_ne!(a.namespace, b.namespace);

        // Stable across runs.
        let again = process("", "/project/button.st.css");
        assert_eq!(a.namespace, again.namespace);
    }

    #[test]
    fn test_namespace_override() {
        let unit = process("@namespace \"buttons\";", "/a.css");
        assert_eq!(unit.namespace, "buttons");
    }

    #[test]
    fn test_mixin_refs_recorded() {
        let unit = process(".a { -st-mixin: emphasis, frame; }", "/a.css");
        assert_eq!(unit.mixin_refs.len(), 1);
        assert_eq!(unit.mixin_refs[0].names, vec!["emphasis", "frame"]);
    }

    #[test]
    fn test_processing_is_idempotent() {
        let source = ":import { -st-from: \"./t.css\"; -st-default: T; }\n:vars { a: 1px; }\n.root { width: value(a); }";
        let first = process(source, "/a.css");
        let second = process(source, "/a.css");
        assert_eq!(first, second);
    }
}

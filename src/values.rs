//! Value-template expansion for `value(name)` references
//!
//! Expansion is iterative: each pass rewrites every resolvable reference,
//! and repeats while the output still changes, so values whose replacements
//! themselves contain references (including through imports) settle within
//! a bounded number of passes. References the lookup cannot supply are left
//! in place and reported to the caller as unresolved names.

use regex::Regex;

/// Bound on expansion passes; protects against self-referential variables.
pub const MAX_EXPANSION_DEPTH: usize = 16;

pub struct ValueTemplate {
    reference: Regex,
}

impl Default for ValueTemplate {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueTemplate {
    pub fn new() -> Self {
        Self {
            reference: Regex::new(r"value\(\s*([\w-]+)\s*\)").expect("valid reference pattern"),
        }
    }

    /// True if the text contains at least one `value(...)` reference.
    pub fn has_references(&self, input: &str) -> bool {
        self.reference.is_match(input)
    }

    /// Names referenced by the text, in order of appearance.
    pub fn references<'t>(&self, input: &'t str) -> Vec<&'t str> {
        self.reference
            .captures_iter(input)
            .map(|caps| caps.get(1).expect("reference capture").as_str())
            .collect()
    }

    /// Expand all references through `lookup`. Returns the expanded text and
    /// the names that could not be resolved (deduplicated, in first-seen
    /// order).
    pub fn expand(
        &self,
        input: &str,
        lookup: &mut dyn FnMut(&str) -> Option<String>,
    ) -> (String, Vec<String>) {
        let mut current = input.to_string();
        let mut unresolved: Vec<String> = Vec::new();

        for _ in 0..MAX_EXPANSION_DEPTH {
            let mut changed = false;
            let next = self
                .reference
                .replace_all(&current, |caps: &regex::Captures| {
                    let name = caps.get(1).expect("reference capture").as_str();
                    match lookup(name) {
                        Some(value) => {
                            changed = true;
                            value
                        }
                        None => {
                            if !unresolved.iter().any(|n| n == name) {
                                unresolved.push(name.to_string());
                            }
                            caps.get(0).expect("whole match").as_str().to_string()
                        }
                    }
                })
                .into_owned();
            current = next;
            if !changed {
                break;
            }
            // A fresh pass may resolve names that failed before expansion.
            unresolved.retain(|name| self.references(&current).contains(&name.as_str()));
        }

        (current, unresolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_simple_expansion() {
        let template = ValueTemplate::new();
        let vars = lookup_from(&[("main", "red")]);
        let (out, unresolved) =
            template.expand("1px solid value(main)", &mut |name| vars.get(name).cloned());
        assert_eq!(out, "1px solid red");
        assert!(unresolved.is_empty());
    }

    #[test]
    fn test_nested_expansion() {
        let template = ValueTemplate::new();
        let vars = lookup_from(&[("border", "1px solid value(main)"), ("main", "red")]);
        let (out, unresolved) =
            template.expand("value(border)", &mut |name| vars.get(name).cloned());
        assert_eq!(out, "1px solid red");
        assert!(unresolved.is_empty());
    }

    #[test]
    fn test_multiple_references_in_function() {
        let template = ValueTemplate::new();
        let vars = lookup_from(&[("a", "10px"), ("b", "2px")]);
        let (out, _) = template.expand("calc(value(a) + value(b))", &mut |name| {
            vars.get(name).cloned()
        });
        assert_eq!(out, "calc(10px + 2px)");
    }

    #[test]
    fn test_unresolved_left_in_place() {
        let template = ValueTemplate::new();
        let (out, unresolved) = template.expand("value(ghost)", &mut |_| None);
        assert_eq!(out, "value(ghost)");
        assert_eq!(unresolved, vec!["ghost"]);
    }

    #[test]
    fn test_self_reference_terminates() {
        let template = ValueTemplate::new();
        let vars = lookup_from(&[("loop", "value(loop)")]);
        let (out, _) = template.expand("value(loop)", &mut |name| vars.get(name).cloned());
        assert_eq!(out, "value(loop)");
    }

    #[test]
    fn test_no_references_is_identity() {
        let template = ValueTemplate::new();
        let (out, unresolved) = template.expand("red", &mut |_| None);
        assert_eq!(out, "red");
        assert!(unresolved.is_empty());
        assert!(!template.has_references("red"));
    }

    #[test]
    fn test_reference_listing() {
        let template = ValueTemplate::new();
        assert_eq!(
            template.references("value(a) value( b ) value(a)"),
            vec!["a", "b", "a"]
        );
    }
}

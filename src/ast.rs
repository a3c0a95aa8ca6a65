//! CSS AST: a postcss-shaped tree of rules, at-rules and declarations
//!
//! Selectors and declaration values are carried as strings; `source_selector`
//! and `source_value` keep the authored (pre-transform) text so later stages
//! can re-resolve against a different override context.

use std::fmt;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stylesheet {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Rule(Rule),
    AtRule(AtRule),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub selector: String,
    /// Authored selector, untouched by scoping.
    pub source_selector: String,
    pub declarations: Vec<Declaration>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AtRule {
    /// Name without the leading `@`.
    pub name: String,
    pub params: String,
    /// `None` for statement-style at-rules terminated by `;`.
    pub body: Option<Vec<Node>>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub prop: String,
    pub value: String,
    /// Authored value, before variable resolution.
    pub source_value: String,
    pub line: usize,
}

impl Rule {
    pub fn new(selector: impl Into<String>, line: usize) -> Self {
        let selector = selector.into();
        Self {
            source_selector: selector.clone(),
            selector,
            declarations: Vec::new(),
            line,
        }
    }
}

impl Declaration {
    pub fn new(prop: impl Into<String>, value: impl Into<String>, line: usize) -> Self {
        let value = value.into();
        Self {
            prop: prop.into(),
            source_value: value.clone(),
            value,
            line,
        }
    }
}

impl Stylesheet {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl fmt::Display for Stylesheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for node in &self.nodes {
            if !first {
                writeln!(f)?;
            }
            first = false;
            write_node(f, node, 0)?;
        }
        Ok(())
    }
}

fn write_node(f: &mut fmt::Formatter<'_>, node: &Node, indent: usize) -> fmt::Result {
    let pad = "    ".repeat(indent);
    match node {
        Node::Rule(rule) => {
            writeln!(f, "{}{} {{", pad, rule.selector)?;
            for decl in &rule.declarations {
                writeln!(f, "{}    {}: {};", pad, decl.prop, decl.value)?;
            }
            write!(f, "{}}}", pad)
        }
        Node::AtRule(at) => {
            if at.params.is_empty() {
                write!(f, "{}@{}", pad, at.name)?;
            } else {
                write!(f, "{}@{} {}", pad, at.name, at.params)?;
            }
            match &at.body {
                Some(nodes) => {
                    writeln!(f, " {{")?;
                    for inner in nodes {
                        write_node(f, inner, indent + 1)?;
                        writeln!(f)?;
                    }
                    write!(f, "{}}}", pad)
                }
                None => write!(f, ";"),
            }
        }
    }
}

/// One segment of a parsed selector.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectorPart {
    Class(String),
    Element(String),
    /// `:name` or `:name(args)`, args kept raw.
    PseudoClass(String),
    /// `::name`
    PseudoElement(String),
    /// `[attr=...]`, kept raw including brackets.
    Attribute(String),
    /// Whitespace or `>`/`+`/`~`/`,` runs, kept raw.
    Combinator(String),
    Universal,
}

/// Split a selector into rewritable segments. Unknown syntax degrades to
/// raw combinator text rather than failing.
pub fn parse_selector(selector: &str) -> Vec<SelectorPart> {
    let chars: Vec<char> = selector.chars().collect();
    let mut parts = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '.' => {
                let (name, next) = read_identifier(&chars, i + 1);
                parts.push(SelectorPart::Class(name));
                i = next;
            }
            ':' => {
                let pseudo_element = i + 1 < chars.len() && chars[i + 1] == ':';
                let start = if pseudo_element { i + 2 } else { i + 1 };
                let (mut name, mut next) = read_identifier(&chars, start);
                if next < chars.len() && chars[next] == '(' {
                    let end = matching_paren(&chars, next);
                    name.push_str(&chars[next..end].iter().collect::<String>());
                    next = end;
                }
                if pseudo_element {
                    parts.push(SelectorPart::PseudoElement(name));
                } else {
                    parts.push(SelectorPart::PseudoClass(name));
                }
                i = next;
            }
            '[' => {
                let mut end = i + 1;
                while end < chars.len() && chars[end] != ']' {
                    end += 1;
                }
                end = (end + 1).min(chars.len());
                parts.push(SelectorPart::Attribute(
                    chars[i..end].iter().collect::<String>(),
                ));
                i = end;
            }
            '*' => {
                parts.push(SelectorPart::Universal);
                i += 1;
            }
            c if c.is_whitespace() || c == '>' || c == '+' || c == '~' || c == ',' => {
                let mut end = i;
                while end < chars.len()
                    && (chars[end].is_whitespace()
                        || chars[end] == '>'
                        || chars[end] == '+'
                        || chars[end] == '~'
                        || chars[end] == ',')
                {
                    end += 1;
                }
                parts.push(SelectorPart::Combinator(
                    chars[i..end].iter().collect::<String>(),
                ));
                i = end;
            }
            _ => {
                let (name, next) = read_identifier(&chars, i);
                if name.is_empty() {
                    // Unrecognized character, pass through untouched.
                    parts.push(SelectorPart::Combinator(c.to_string()));
                    i += 1;
                } else {
                    parts.push(SelectorPart::Element(name));
                    i = next;
                }
            }
        }
    }

    parts
}

/// Reassemble a selector from its parts.
pub fn selector_to_string(parts: &[SelectorPart]) -> String {
    let mut out = String::new();
    for part in parts {
        match part {
            SelectorPart::Class(name) => {
                out.push('.');
                out.push_str(name);
            }
            SelectorPart::Element(name) => out.push_str(name),
            SelectorPart::PseudoClass(name) => {
                out.push(':');
                out.push_str(name);
            }
            SelectorPart::PseudoElement(name) => {
                out.push_str("::");
                out.push_str(name);
            }
            SelectorPart::Attribute(raw) | SelectorPart::Combinator(raw) => out.push_str(raw),
            SelectorPart::Universal => out.push('*'),
        }
    }
    out
}

fn read_identifier(chars: &[char], start: usize) -> (String, usize) {
    let mut end = start;
    while end < chars.len()
        && (chars[end].is_ascii_alphanumeric() || chars[end] == '_' || chars[end] == '-')
    {
        end += 1;
    }
    (chars[start..end].iter().collect(), end)
}

fn matching_paren(chars: &[char], open: usize) -> usize {
    let mut depth = 0;
    let mut i = open;
    while i < chars.len() {
        match chars[i] {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    chars.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_selector() {
        let parts = parse_selector(".root");
        assert_eq!(parts, vec![SelectorPart::Class("root".to_string())]);
    }

    #[test]
    fn test_parse_compound_selector() {
        let parts = parse_selector(".btn:hover > Icon");
        assert_eq!(
            parts,
            vec![
                SelectorPart::Class("btn".to_string()),
                SelectorPart::PseudoClass("hover".to_string()),
                SelectorPart::Combinator(" > ".to_string()),
                SelectorPart::Element("Icon".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_pseudo_with_args() {
        let parts = parse_selector(".a:not(.b)");
        assert_eq!(
            parts,
            vec![
                SelectorPart::Class("a".to_string()),
                SelectorPart::PseudoClass("not(.b)".to_string()),
            ]
        );
    }

    #[test]
    fn test_selector_round_trip() {
        for selector in [".a .b", "div.item::after", ".x:nth-child(2n+1), .y", "*[href]"] {
            let parts = parse_selector(selector);
            assert_eq!(selector_to_string(&parts), selector);
        }
    }

    #[test]
    fn test_stylesheet_display() {
        let sheet = Stylesheet {
            nodes: vec![
                Node::Rule(Rule {
                    selector: ".ns--root".to_string(),
                    source_selector: ".root".to_string(),
                    declarations: vec![Declaration::new("color", "red", 1)],
                    line: 1,
                }),
                Node::AtRule(AtRule {
                    name: "keyframes".to_string(),
                    params: "ns--spin".to_string(),
                    body: Some(vec![Node::Rule(Rule {
                        selector: "from".to_string(),
                        source_selector: "from".to_string(),
                        declarations: vec![Declaration::new("opacity", "0", 5)],
                        line: 5,
                    })]),
                    line: 4,
                }),
            ],
        };
        let text = sheet.to_string();
        assert!(text.contains(".ns--root {\n    color: red;\n}"));
        assert!(text.contains("@keyframes ns--spin {"));
    }
}

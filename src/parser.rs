//! Rule parser for the CSS superset
//!
//! Builds the [`crate::ast`] tree from the token stream. Parsing is safe:
//! a malformed construct is recorded as a diagnostic and skipped, it never
//! aborts the rest of the file.

use crate::ast::{AtRule, Declaration, Node, Rule, Stylesheet};
use crate::error::Diagnostics;
use crate::lexer::{Lexer, Token, TokenType};

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    diagnostics: Diagnostics,
}

/// Parse source text into a stylesheet plus any parse diagnostics.
pub fn parse(input: &str) -> (Stylesheet, Diagnostics) {
    Parser::new(input).parse_stylesheet()
}

impl Parser {
    pub fn new(input: &str) -> Self {
        Self {
            tokens: Lexer::new(input).tokenize(),
            position: 0,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn parse_stylesheet(mut self) -> (Stylesheet, Diagnostics) {
        let nodes = self.parse_nodes(true);
        (Stylesheet { nodes }, self.diagnostics)
    }

    fn parse_nodes(&mut self, top_level: bool) -> Vec<Node> {
        let mut nodes = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek_type() {
                TokenType::Eof => break,
                TokenType::RightBrace => {
                    if top_level {
                        self.diagnostics
                            .warn(self.peek_line(), "unexpected '}' at top level");
                        self.advance();
                        continue;
                    }
                    break;
                }
                TokenType::AtKeyword(_) => {
                    if let Some(node) = self.parse_at_rule() {
                        nodes.push(node);
                    }
                }
                _ => {
                    if let Some(node) = self.parse_rule() {
                        nodes.push(node);
                    }
                }
            }
        }
        nodes
    }

    fn parse_at_rule(&mut self) -> Option<Node> {
        let line = self.peek_line();
        let name = match self.peek_type() {
            TokenType::AtKeyword(name) => name.trim_start_matches('@').to_string(),
            _ => return None,
        };
        self.advance();

        // Prelude runs to `{` or `;`.
        let mut params = String::new();
        loop {
            match self.peek_type() {
                TokenType::LeftBrace | TokenType::Semicolon | TokenType::Eof => break,
                TokenType::RightBrace => {
                    self.diagnostics
                        .warn(line, format!("unterminated @{} rule", name));
                    return Some(Node::AtRule(AtRule {
                        name,
                        params: params.trim().to_string(),
                        body: None,
                        line,
                    }));
                }
                _ => {
                    params.push_str(self.peek_raw());
                    self.advance();
                }
            }
        }

        let body = match self.peek_type() {
            TokenType::LeftBrace => {
                self.advance();
                let nodes = self.parse_nodes(false);
                self.expect_right_brace(line, &format!("@{}", name));
                Some(nodes)
            }
            _ => {
                // Statement at-rule: consume the `;` if present.
                if matches!(self.peek_type(), TokenType::Semicolon) {
                    self.advance();
                }
                None
            }
        };

        Some(Node::AtRule(AtRule {
            name,
            params: params.trim().to_string(),
            body,
            line,
        }))
    }

    fn parse_rule(&mut self) -> Option<Node> {
        let line = self.peek_line();
        let mut selector = String::new();
        loop {
            match self.peek_type() {
                TokenType::LeftBrace => break,
                TokenType::Eof | TokenType::RightBrace => {
                    self.diagnostics.warn(
                        line,
                        format!("expected '{{' after selector '{}'", selector.trim()),
                    );
                    self.advance_if_not_eof();
                    return None;
                }
                TokenType::Semicolon => {
                    self.diagnostics.warn(
                        line,
                        format!("unexpected ';' in selector '{}'", selector.trim()),
                    );
                    self.advance();
                    return None;
                }
                _ => {
                    selector.push_str(self.peek_raw());
                    self.advance();
                }
            }
        }
        self.advance(); // consume `{`

        let mut rule = Rule::new(collapse_whitespace(&selector), line);
        rule.declarations = self.parse_declarations(line, &rule.selector);
        Some(Node::Rule(rule))
    }

    fn parse_declarations(&mut self, rule_line: usize, selector: &str) -> Vec<Declaration> {
        let mut declarations = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek_type() {
                TokenType::RightBrace => {
                    self.advance();
                    break;
                }
                TokenType::Eof => {
                    self.diagnostics
                        .warn(rule_line, format!("unterminated rule '{}'", selector));
                    break;
                }
                TokenType::Semicolon => {
                    self.advance();
                }
                _ => {
                    if let Some(decl) = self.parse_declaration() {
                        declarations.push(decl);
                    }
                }
            }
        }
        declarations
    }

    fn parse_declaration(&mut self) -> Option<Declaration> {
        let line = self.peek_line();

        let mut prop = String::new();
        loop {
            match self.peek_type() {
                TokenType::Colon => break,
                TokenType::Semicolon | TokenType::RightBrace | TokenType::Eof => {
                    self.diagnostics.warn(
                        line,
                        format!("declaration '{}' is missing ':'", prop.trim()),
                    );
                    self.skip_to_declaration_end();
                    return None;
                }
                _ => {
                    prop.push_str(self.peek_raw());
                    self.advance();
                }
            }
        }
        self.advance(); // consume `:`

        let mut value = String::new();
        loop {
            match self.peek_type() {
                TokenType::Semicolon => {
                    self.advance();
                    break;
                }
                TokenType::RightBrace | TokenType::Eof => break,
                TokenType::LeftBrace => {
                    self.diagnostics
                        .warn(line, format!("unexpected '{{' in value of '{}'", prop.trim()));
                    self.skip_balanced_block();
                    return None;
                }
                _ => {
                    value.push_str(self.peek_raw());
                    self.advance();
                }
            }
        }

        let prop = prop.trim().to_string();
        if prop.is_empty() {
            self.diagnostics.warn(line, "declaration with empty property");
            return None;
        }
        Some(Declaration::new(prop, collapse_whitespace(&value), line))
    }

    fn skip_to_declaration_end(&mut self) {
        loop {
            match self.peek_type() {
                TokenType::Semicolon => {
                    self.advance();
                    return;
                }
                TokenType::RightBrace | TokenType::Eof => return,
                _ => self.advance(),
            }
        }
    }

    fn skip_balanced_block(&mut self) {
        // Positioned at `{`; consume through the matching `}`.
        let mut depth = 0;
        loop {
            match self.peek_type() {
                TokenType::LeftBrace => depth += 1,
                TokenType::RightBrace => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        return;
                    }
                }
                TokenType::Eof => return,
                _ => {}
            }
            self.advance();
        }
    }

    fn expect_right_brace(&mut self, line: usize, context: &str) {
        self.skip_trivia();
        if matches!(self.peek_type(), TokenType::RightBrace) {
            self.advance();
        } else {
            self.diagnostics
                .warn(line, format!("unterminated block for {}", context));
        }
    }

    fn skip_trivia(&mut self) {
        while self.tokens[self.position].is_trivia() {
            self.position += 1;
        }
    }

    fn peek_type(&self) -> &TokenType {
        &self.tokens[self.position].token_type
    }

    fn peek_raw(&self) -> &str {
        self.tokens[self.position].raw()
    }

    fn peek_line(&self) -> usize {
        self.tokens[self.position].line
    }

    fn advance(&mut self) {
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
    }

    fn advance_if_not_eof(&mut self) {
        if !matches!(self.peek_type(), TokenType::Eof) {
            self.advance();
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_ws = false;
    for c in text.trim().chars() {
        if c.is_whitespace() {
            in_ws = true;
        } else {
            if in_ws && !out.is_empty() {
                out.push(' ');
            }
            in_ws = false;
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_rule() {
        let (sheet, diags) = parse(".root { color: red; }");
        assert!(diags.is_empty());
        assert_eq!(sheet.nodes.len(), 1);
        match &sheet.nodes[0] {
            Node::Rule(rule) => {
                assert_eq!(rule.selector, ".root");
                assert_eq!(rule.declarations.len(), 1);
                assert_eq!(rule.declarations[0].prop, "color");
                assert_eq!(rule.declarations[0].value, "red");
            }
            other => panic!("expected rule, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_import_rule() {
        let (sheet, diags) = parse(
            ":import {\n    -st-from: \"./theme.css\";\n    -st-default: Theme;\n    -st-theme: true;\n}",
        );
        assert!(diags.is_empty());
        match &sheet.nodes[0] {
            Node::Rule(rule) => {
                assert_eq!(rule.selector, ":import");
                assert_eq!(rule.declarations.len(), 3);
                assert_eq!(rule.declarations[0].prop, "-st-from");
                assert_eq!(rule.declarations[0].value, "\"./theme.css\"");
            }
            other => panic!("expected rule, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_keyframes() {
        let (sheet, diags) = parse("@keyframes spin { from { opacity: 0; } to { opacity: 1; } }");
        assert!(diags.is_empty());
        match &sheet.nodes[0] {
            Node::AtRule(at) => {
                assert_eq!(at.name, "keyframes");
                assert_eq!(at.params, "spin");
                assert_eq!(at.body.as_ref().map(|b| b.len()), Some(2));
            }
            other => panic!("expected at-rule, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_statement_at_rule() {
        let (sheet, _) = parse("@namespace \"buttons\";\n.root {}");
        match &sheet.nodes[0] {
            Node::AtRule(at) => {
                assert_eq!(at.name, "namespace");
                assert_eq!(at.params, "\"buttons\"");
                assert!(at.body.is_none());
            }
            other => panic!("expected at-rule, got {:?}", other),
        }
        assert_eq!(sheet.nodes.len(), 2);
    }

    #[test]
    fn test_malformed_declaration_recovers() {
        let (sheet, diags) = parse(".a { nonsense; color: blue; }");
        assert_eq!(diags.len(), 1);
        match &sheet.nodes[0] {
            Node::Rule(rule) => {
                assert_eq!(rule.declarations.len(), 1);
                assert_eq!(rule.declarations[0].prop, "color");
            }
            other => panic!("expected rule, got {:?}", other),
        }
    }

    #[test]
    fn test_value_with_function_call() {
        let (sheet, _) = parse(".a { color: value(main); }");
        match &sheet.nodes[0] {
            Node::Rule(rule) => assert_eq!(rule.declarations[0].value, "value(main)"),
            other => panic!("expected rule, got {:?}", other),
        }
    }

    #[test]
    fn test_source_fields_match_authored_text() {
        let (sheet, _) = parse(".a .b { border: 1px solid   value(line); }");
        match &sheet.nodes[0] {
            Node::Rule(rule) => {
                assert_eq!(rule.source_selector, ".a .b");
                assert_eq!(rule.declarations[0].source_value, "1px solid value(line)");
                assert_eq!(rule.declarations[0].value, rule.declarations[0].source_value);
            }
            other => panic!("expected rule, got {:?}", other),
        }
    }

    #[test]
    fn test_unterminated_rule_is_diagnostic_not_panic() {
        let (sheet, diags) = parse(".a { color: red");
        assert!(!diags.is_empty());
        assert_eq!(sheet.nodes.len(), 1);
    }
}

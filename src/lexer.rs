//! Lexical analysis for the CSS superset
//!
//! The tokenizer is deliberately coarse: selectors and declaration values
//! stay as raw text runs, while the characters that drive rule structure
//! (`{`, `}`, `;`, `:`) become their own tokens. Parenthesized and quoted
//! runs are kept atomic so `value(...)` calls and `:not(...)` arguments
//! never split a declaration.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    LeftBrace,
    RightBrace,
    Semicolon,
    Colon,
    /// `@name`
    AtKeyword(String),
    /// Quoted string, quotes included.
    QuotedString(String),
    /// Balanced `(...)` run, parentheses included.
    Parens(String),
    /// `[...]` run, brackets included.
    Bracket(String),
    Whitespace(String),
    Comment(String),
    /// Any other run of characters.
    Word(String),
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub token_type: TokenType,
    pub line: usize,
}

impl Token {
    /// Raw source text of the token, used to reassemble selectors and values.
    pub fn raw(&self) -> &str {
        match &self.token_type {
            TokenType::LeftBrace => "{",
            TokenType::RightBrace => "}",
            TokenType::Semicolon => ";",
            TokenType::Colon => ":",
            TokenType::AtKeyword(s)
            | TokenType::QuotedString(s)
            | TokenType::Parens(s)
            | TokenType::Bracket(s)
            | TokenType::Whitespace(s)
            | TokenType::Comment(s)
            | TokenType::Word(s) => s,
            TokenType::Eof => "",
        }
    }

    pub fn is_trivia(&self) -> bool {
        matches!(
            self.token_type,
            TokenType::Whitespace(_) | TokenType::Comment(_)
        )
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::LeftBrace => write!(f, "{{"),
            TokenType::RightBrace => write!(f, "}}"),
            TokenType::Semicolon => write!(f, ";"),
            TokenType::Colon => write!(f, ":"),
            TokenType::AtKeyword(s) => write!(f, "at-keyword({})", s),
            TokenType::QuotedString(s) => write!(f, "string({})", s),
            TokenType::Parens(s) => write!(f, "parens({})", s),
            TokenType::Bracket(s) => write!(f, "bracket({})", s),
            TokenType::Whitespace(_) => write!(f, "whitespace"),
            TokenType::Comment(_) => write!(f, "comment"),
            TokenType::Word(s) => write!(f, "word({})", s),
            TokenType::Eof => write!(f, "EOF"),
        }
    }
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
        }
    }

    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while self.position < self.input.len() {
            let line = self.line;
            let token_type = self.next_token_type();
            tokens.push(Token { token_type, line });
        }
        tokens.push(Token {
            token_type: TokenType::Eof,
            line: self.line,
        });
        tokens
    }

    fn next_token_type(&mut self) -> TokenType {
        let c = self.input[self.position];
        match c {
            '{' => {
                self.advance();
                TokenType::LeftBrace
            }
            '}' => {
                self.advance();
                TokenType::RightBrace
            }
            ';' => {
                self.advance();
                TokenType::Semicolon
            }
            ':' => {
                self.advance();
                TokenType::Colon
            }
            '"' | '\'' => TokenType::QuotedString(self.read_string(c)),
            '(' => TokenType::Parens(self.read_balanced_parens()),
            '[' => TokenType::Bracket(self.read_until_inclusive(']')),
            '@' => {
                self.advance();
                let mut name = String::from("@");
                while self.position < self.input.len() && is_ident_char(self.input[self.position]) {
                    name.push(self.input[self.position]);
                    self.advance();
                }
                TokenType::AtKeyword(name)
            }
            '/' if self.peek(1) == Some('*') => TokenType::Comment(self.read_comment()),
            c if c.is_whitespace() => {
                let mut ws = String::new();
                while self.position < self.input.len() && self.input[self.position].is_whitespace()
                {
                    ws.push(self.input[self.position]);
                    self.advance();
                }
                TokenType::Whitespace(ws)
            }
            _ => {
                let mut word = String::new();
                while self.position < self.input.len() {
                    let c = self.input[self.position];
                    if c == '{'
                        || c == '}'
                        || c == ';'
                        || c == ':'
                        || c == '('
                        || c == '['
                        || c == '"'
                        || c == '\''
                        || c == '@'
                        || c.is_whitespace()
                        || (c == '/' && self.peek(1) == Some('*'))
                    {
                        break;
                    }
                    word.push(c);
                    self.advance();
                }
                TokenType::Word(word)
            }
        }
    }

    fn read_string(&mut self, quote: char) -> String {
        let mut out = String::new();
        out.push(quote);
        self.advance();
        while self.position < self.input.len() {
            let c = self.input[self.position];
            out.push(c);
            self.advance();
            if c == '\\' && self.position < self.input.len() {
                out.push(self.input[self.position]);
                self.advance();
            } else if c == quote {
                break;
            }
        }
        out
    }

    fn read_balanced_parens(&mut self) -> String {
        let mut out = String::new();
        let mut depth = 0;
        while self.position < self.input.len() {
            let c = self.input[self.position];
            if c == '"' || c == '\'' {
                out.push_str(&self.read_string(c));
                continue;
            }
            out.push(c);
            self.advance();
            if c == '(' {
                depth += 1;
            } else if c == ')' {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
        }
        out
    }

    fn read_until_inclusive(&mut self, end: char) -> String {
        let mut out = String::new();
        while self.position < self.input.len() {
            let c = self.input[self.position];
            out.push(c);
            self.advance();
            if c == end {
                break;
            }
        }
        out
    }

    fn read_comment(&mut self) -> String {
        let mut out = String::new();
        while self.position < self.input.len() {
            let c = self.input[self.position];
            out.push(c);
            self.advance();
            if c == '/' && out.len() > 2 && out.ends_with("*/") {
                break;
            }
        }
        out
    }

    fn advance(&mut self) {
        if self.input[self.position] == '\n' {
            self.line += 1;
        }
        self.position += 1;
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenType> {
        Lexer::new(input)
            .tokenize()
            .into_iter()
            .map(|t| t.token_type)
            .collect()
    }

    #[test]
    fn test_rule_tokens() {
        let tokens = kinds(".a{color:red;}");
        assert_eq!(
            tokens,
            vec![
                TokenType::Word(".a".to_string()),
                TokenType::LeftBrace,
                TokenType::Word("color".to_string()),
                TokenType::Colon,
                TokenType::Word("red".to_string()),
                TokenType::Semicolon,
                TokenType::RightBrace,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_parens_stay_atomic() {
        let tokens = kinds("value(color1)");
        assert_eq!(
            tokens,
            vec![
                TokenType::Word("value".to_string()),
                TokenType::Parens("(color1)".to_string()),
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_string_with_semicolon() {
        let tokens = kinds("\"a;b\"");
        assert_eq!(
            tokens,
            vec![
                TokenType::QuotedString("\"a;b\"".to_string()),
                TokenType::Eof
            ]
        );
    }

    #[test]
    fn test_at_keyword_and_comment() {
        let tokens = kinds("@namespace /* note */ \"x\";");
        assert!(matches!(tokens[0], TokenType::AtKeyword(ref s) if s == "@namespace"));
        assert!(matches!(tokens[2], TokenType::Comment(_)));
    }

    #[test]
    fn test_line_tracking() {
        let tokens = Lexer::new(".a {\n}\n.b {\n}").tokenize();
        let b = tokens
            .iter()
            .find(|t| t.raw() == ".b")
            .expect("missing .b token");
        assert_eq!(b.line, 3);
    }
}

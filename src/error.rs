//! Error types and diagnostics for the stylc compiler

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompilerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error in {file} at line {line}: {message}")]
    Parse { file: String, line: usize, message: String },

    #[error("Resolution error in {file}: {message}")]
    Resolve { file: String, message: String },

    #[error("Bundle error: {message}")]
    Bundle { message: String },

    #[error("Theme error: {message}")]
    Theme { message: String },

    #[error("Module load error for {path}: {message}")]
    ModuleLoad { path: String, message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },
}

pub type Result<T> = std::result::Result<T, CompilerError>;

impl CompilerError {
    pub fn parse(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    pub fn resolve(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolve {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn bundle(message: impl Into<String>) -> Self {
        Self::Bundle {
            message: message.into(),
        }
    }

    pub fn theme(message: impl Into<String>) -> Self {
        Self::Theme {
            message: message.into(),
        }
    }
}

/// Diagnostic severity. Errors still allow best-effort output; the adapter
/// layer decides whether they fail the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Warning,
    Error,
}

/// A single non-fatal issue attached to a compiled unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub line: usize,
}

/// Accumulated non-fatal issues for one compilation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    reports: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, line: usize, message: impl Into<String>) {
        self.reports.push(Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            line,
        });
    }

    pub fn error(&mut self, line: usize, message: impl Into<String>) {
        self.reports.push(Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            line,
        });
    }

    pub fn extend(&mut self, other: &Diagnostics) {
        self.reports.extend(other.reports.iter().cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.reports.iter()
    }

    pub fn has_errors(&self) -> bool {
        self.reports.iter().any(|r| r.severity == Severity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_accumulation() {
        let mut diags = Diagnostics::new();
        assert!(diags.is_empty());

        diags.warn(3, "suspicious declaration");
        diags.error(7, "redeclared symbol");

        assert_eq!(diags.len(), 2);
        assert!(diags.has_errors());

        let messages: Vec<_> = diags.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["suspicious declaration", "redeclared symbol"]);
    }

    #[test]
    fn test_error_constructors() {
        let err = CompilerError::parse("a.css", 4, "unexpected '}'");
        assert_eq!(
            err.to_string(),
            "Parse error in a.css at line 4: unexpected '}'"
        );

        let err = CompilerError::theme("theme imported from non-styling entry");
        assert!(err.to_string().contains("non-styling"));
    }
}

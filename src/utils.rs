//! Small shared helpers: path resolution, quoting, identifier checks

use std::path::{Component, Path, PathBuf};

/// Strip a single layer of matching quotes from a value.
pub fn strip_quotes(value: &str) -> &str {
    let trimmed = value.trim();
    if trimmed.len() >= 2 {
        let bytes = trimmed.as_bytes();
        if (bytes[0] == b'"' && bytes[trimmed.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[trimmed.len() - 1] == b'\'')
        {
            return &trimmed[1..trimmed.len() - 1];
        }
    }
    trimmed
}

/// Whether a path names a styling source file (as opposed to a host-language
/// module that must go through the module loader).
pub fn is_styling_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("css"))
        .unwrap_or(false)
}

/// Resolve an import specifier against the importing file's directory and
/// normalize `.`/`..` components without touching the file system.
pub fn resolve_import_path(importing_file: &Path, specifier: &str) -> PathBuf {
    let spec = Path::new(specifier);
    let joined = if spec.is_absolute() {
        spec.to_path_buf()
    } else {
        importing_file
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(spec)
    };
    normalize_path(&joined)
}

/// Lexically normalize a path: resolve `.` and `..` components.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(Component::ParentDir);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '-' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Replace characters that cannot appear in a CSS identifier.
pub fn sanitize_identifier(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("\"./theme.css\""), "./theme.css");
        assert_eq!(strip_quotes("'./theme.css'"), "./theme.css");
        assert_eq!(strip_quotes("  plain  "), "plain");
        assert_eq!(strip_quotes("\"unbalanced'"), "\"unbalanced'");
    }

    #[test]
    fn test_resolve_import_path() {
        let from = Path::new("/project/src/comp.css");
        assert_eq!(
            resolve_import_path(from, "./theme.css"),
            PathBuf::from("/project/src/theme.css")
        );
        assert_eq!(
            resolve_import_path(from, "../base/reset.css"),
            PathBuf::from("/project/base/reset.css")
        );
        assert_eq!(
            resolve_import_path(from, "/abs/x.css"),
            PathBuf::from("/abs/x.css")
        );
    }

    #[test]
    fn test_is_styling_path() {
        assert!(is_styling_path(Path::new("/a/b.css")));
        assert!(is_styling_path(Path::new("/a/b.st.CSS")));
        assert!(!is_styling_path(Path::new("/a/b.js")));
        assert!(!is_styling_path(Path::new("/a/b")));
    }

    #[test]
    fn test_identifiers() {
        assert!(is_valid_identifier("root"));
        assert!(is_valid_identifier("my-class_2"));
        assert!(!is_valid_identifier("2fast"));
        assert!(!is_valid_identifier(""));
        assert_eq!(sanitize_identifier("comp.st"), "comp-st");
    }
}

//! Parser Types and Constants
//!
//! Shared error type and limits used across parser modules.

use thiserror::Error;

// Parser limits to prevent hangs and resource exhaustion
pub const MAX_INPUT_SIZE: usize = 1_000_000; // 1MB max input
pub const MAX_TOKENS: usize = 100_000;
pub const MAX_PARSER_DEPTH: usize = 200; // Max recursion depth for nested constructs

/// A lexical or syntax error. One error aborts the whole parse.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct ParseException {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseException {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self { message: message.into(), line, column }
    }

    /// `syntax error near unexpected token `X'`
    pub fn unexpected(token: &str, line: usize, column: usize) -> Self {
        Self::new(format!("syntax error near unexpected token `{}'", token), line, column)
    }

    pub fn unexpected_eof(line: usize, column: usize) -> Self {
        Self::new("syntax error: unexpected end of file", line, column)
    }
}

pub type ParseResult<T> = Result<T, ParseException>;

/// Check if a string is a valid variable name
pub fn is_valid_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub const RESERVED_WORDS: &[&str] = &[
    "if", "then", "else", "elif", "fi", "for", "while", "until", "do", "done", "case", "esac",
    "in", "function", "{", "}", "!", "[[", "]]", "select", "time",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("foo"));
        assert!(is_valid_name("_x1"));
        assert!(!is_valid_name("1x"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("a-b"));
    }

    #[test]
    fn test_display() {
        let e = ParseException::unexpected("fi", 3, 1);
        assert_eq!(e.to_string(), "line 3: syntax error near unexpected token `fi'");
    }
}

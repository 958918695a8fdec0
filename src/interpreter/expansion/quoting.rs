//! Quoting Helpers
//!
//! Produce shell-reusable renderings of values for `${x@Q}`, `printf %q`,
//! `declare -p`, `set` listings and `trap -p`.

/// Characters that never need quoting in `%q` output.
fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ',' | ':' | '@' | '%' | '+' | '=')
}

fn needs_ansi_c(s: &str) -> bool {
    s.chars().any(|c| c.is_control())
}

/// `$'...'` rendering with C escapes.
fn ansi_c_quote(s: &str) -> String {
    let mut out = String::from("$'");
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\x1b' => out.push_str("\\E"),
            '\x07' => out.push_str("\\a"),
            '\x08' => out.push_str("\\b"),
            '\x0c' => out.push_str("\\f"),
            '\x0b' => out.push_str("\\v"),
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            c if c.is_control() => out.push_str(&format!("\\{:03o}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// `${x@Q}`: single quotes, `'\''` for embedded quotes, `$'...'` when the
/// value holds control characters.
pub fn quote_for_reuse(s: &str) -> String {
    if needs_ansi_c(s) {
        return ansi_c_quote(s);
    }
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// `printf %q`: backslash escapes, `''` for the empty string.
pub fn printf_quote(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    if needs_ansi_c(s) {
        return ansi_c_quote(s);
    }
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if !is_shell_safe(c) && c.is_ascii() {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Double-quoted form used by `declare -p`.
pub fn double_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Quotes only when needed, as `set` and `trap -p` print values.
pub fn quote_if_needed(s: &str) -> String {
    if !s.is_empty() && s.chars().all(is_shell_safe) {
        s.to_string()
    } else {
        quote_for_reuse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_for_reuse() {
        assert_eq!(quote_for_reuse("abc"), "'abc'");
        assert_eq!(quote_for_reuse("it's"), "'it'\\''s'");
        assert_eq!(quote_for_reuse(""), "''");
        assert_eq!(quote_for_reuse("a\nb"), "$'a\\nb'");
    }

    #[test]
    fn test_printf_quote() {
        assert_eq!(printf_quote("a b"), "a\\ b");
        assert_eq!(printf_quote("x'y"), "x\\'y");
        assert_eq!(printf_quote(""), "''");
        assert_eq!(printf_quote("safe-path/file.txt"), "safe-path/file.txt");
    }

    #[test]
    fn test_double_quote_and_conditional() {
        assert_eq!(double_quote("a\"$b"), "\"a\\\"\\$b\"");
        assert_eq!(quote_if_needed("plain"), "plain");
        assert_eq!(quote_if_needed("two words"), "'two words'");
    }
}

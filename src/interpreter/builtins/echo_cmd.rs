//! echo - Display a line of text
//!
//! echo [-neE] [arg ...]
//!
//! Options are recognized only while every character of the argument is
//! one of `n`, `e`, `E`. `-e` (or `shopt -s xpg_echo`) turns on backslash
//! escapes; `\c` suppresses all further output.

use crate::interpreter::types::{ExecResult, InterpreterState};

fn octal_digits(chars: &[char], start: usize, max: usize) -> (u32, usize) {
    let mut value = 0;
    let mut n = 0;
    while n < max && start + n < chars.len() && chars[start + n].is_digit(8) {
        value = value * 8 + chars[start + n].to_digit(8).unwrap_or(0);
        n += 1;
    }
    (value, n)
}

fn hex_digits(chars: &[char], start: usize, max: usize) -> (u32, usize) {
    let mut value = 0;
    let mut n = 0;
    while n < max && start + n < chars.len() && chars[start + n].is_ascii_hexdigit() {
        value = value * 16 + chars[start + n].to_digit(16).unwrap_or(0);
        n += 1;
    }
    (value, n)
}

/// Backslash escapes as `echo -e` and `printf %b` understand them.
/// The flag is true when `\c` cut the output short.
pub fn expand_escapes(s: &str) -> (String, bool) {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '\\' || i + 1 >= chars.len() {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let c = chars[i + 1];
        i += 2;
        match c {
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'c' => return (out, true),
            'e' | 'E' => out.push('\x1b'),
            'f' => out.push('\x0c'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\x0b'),
            '\\' => out.push('\\'),
            '0' => {
                let (value, n) = octal_digits(&chars, i, 3);
                i += n;
                out.push(char::from_u32(value).unwrap_or('\0'));
            }
            'x' => {
                let (value, n) = hex_digits(&chars, i, 2);
                if n == 0 {
                    out.push_str("\\x");
                } else {
                    i += n;
                    out.push(char::from_u32(value).unwrap_or('\u{fffd}'));
                }
            }
            'u' | 'U' => {
                let (value, n) = hex_digits(&chars, i, if c == 'u' { 4 } else { 8 });
                if n == 0 {
                    out.push('\\');
                    out.push(c);
                } else {
                    i += n;
                    out.push(char::from_u32(value).unwrap_or('\u{fffd}'));
                }
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    (out, false)
}

pub fn handle_echo(state: &mut InterpreterState, args: &[String]) -> ExecResult {
    let mut newline = true;
    let mut escapes = state.shopt_options.xpg_echo;
    let mut start = 0;
    for arg in args {
        let Some(flags) = arg.strip_prefix('-') else { break };
        if flags.is_empty() || !flags.chars().all(|c| matches!(c, 'n' | 'e' | 'E')) {
            break;
        }
        for c in flags.chars() {
            match c {
                'n' => newline = false,
                'e' => escapes = true,
                _ => escapes = false,
            }
        }
        start += 1;
    }

    let text = args[start..].join(" ");
    if !escapes {
        let mut out = text;
        if newline {
            out.push('\n');
        }
        return ExecResult::success(out);
    }
    let (mut out, stopped) = expand_escapes(&text);
    if newline && !stopped {
        out.push('\n');
    }
    ExecResult::success(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn echo(args: &[&str]) -> String {
        let mut state = InterpreterState::default();
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        handle_echo(&mut state, &args).stdout
    }

    #[test]
    fn test_flags() {
        assert_eq!(echo(&["a", "b"]), "a b\n");
        assert_eq!(echo(&["-n", "a"]), "a");
        assert_eq!(echo(&["-nx", "a"]), "-nx a\n");
        assert_eq!(echo(&["-", "a"]), "- a\n");
        assert_eq!(echo(&["a", "-n"]), "a -n\n");
    }

    #[test]
    fn test_escapes() {
        assert_eq!(echo(&["-e", "a\\tb\\n"]), "a\tb\n\n");
        assert_eq!(echo(&["-e", "x\\cy"]), "x");
        assert_eq!(echo(&["-e", "\\x41\\0101\\u00e9"]), "AAé\n");
        assert_eq!(echo(&["-eE", "a\\n"]), "a\\n\n");
        assert_eq!(echo(&["a\\n"]), "a\\n\n");
    }
}

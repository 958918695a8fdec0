//! printf - Format and print data
//!
//! printf [-v var] format [arguments]
//!
//! The format is reused until all arguments are consumed. Missing
//! arguments read as empty strings or zero.
//!
//! Conversions: %s %b %q %c %d %i %u %o %x %X %f %F %e %E %g %G %%
//! and `%(strftime)T`. Flags `-+ 0#`, width and precision (either may be
//! `*`).

use std::fmt::Write as _;

use chrono::{Local, TimeZone};

use crate::interpreter::builtins::echo_cmd::expand_escapes;
use crate::interpreter::errors::InterpreterResult;
use crate::interpreter::expansion::quoting::printf_quote;
use crate::interpreter::types::{ExecResult, InterpreterState};
use crate::interpreter::variables::is_assignable;

#[derive(Debug, Default, Clone, Copy)]
struct Spec {
    left: bool,
    plus: bool,
    space: bool,
    zero: bool,
    alt: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

/// Output plus bookkeeping for one run over the format.
struct Formatter<'a> {
    args: &'a [String],
    next: usize,
    out: String,
    errors: String,
    /// `\c` or `%b` with `\c` ends all output
    stopped: bool,
}

impl<'a> Formatter<'a> {
    fn take(&mut self) -> Option<&'a str> {
        let arg = self.args.get(self.next).map(String::as_str);
        if arg.is_some() {
            self.next += 1;
        }
        arg
    }

    fn take_number(&mut self) -> i64 {
        let arg = self.take().unwrap_or("");
        match parse_integer(arg) {
            Ok(n) => n,
            Err(partial) => {
                let _ = writeln!(self.errors, "bash: printf: {}: invalid number", arg);
                partial
            }
        }
    }

    fn take_float(&mut self) -> f64 {
        let arg = self.take().unwrap_or("");
        match parse_float(arg) {
            Some(f) => f,
            None => {
                let _ = writeln!(self.errors, "bash: printf: {}: invalid number", arg);
                0.0
            }
        }
    }

    /// Processes the format once. Returns false when the format has no
    /// conversion that consumes an argument.
    fn run(&mut self, format: &[char]) -> bool {
        let mut consumed = false;
        let mut i = 0;
        while i < format.len() && !self.stopped {
            let c = format[i];
            if c == '\\' {
                i += self.format_escape(format, i + 1) + 1;
                continue;
            }
            if c != '%' {
                self.out.push(c);
                i += 1;
                continue;
            }
            i += 1;
            if i >= format.len() {
                self.out.push('%');
                break;
            }
            if format[i] == '%' {
                self.out.push('%');
                i += 1;
                continue;
            }

            let mut spec = Spec::default();
            while i < format.len() {
                match format[i] {
                    '-' => spec.left = true,
                    '+' => spec.plus = true,
                    ' ' => spec.space = true,
                    '0' => spec.zero = true,
                    '#' => spec.alt = true,
                    _ => break,
                }
                i += 1;
            }
            if i < format.len() && format[i] == '*' {
                consumed = true;
                let w = self.take_number();
                if w < 0 {
                    spec.left = true;
                }
                spec.width = Some(w.unsigned_abs() as usize);
                i += 1;
            } else {
                let (n, len) = read_digits(format, i);
                spec.width = n;
                i += len;
            }
            if i < format.len() && format[i] == '.' {
                i += 1;
                if i < format.len() && format[i] == '*' {
                    consumed = true;
                    spec.precision = Some(self.take_number().max(0) as usize);
                    i += 1;
                } else {
                    let (n, len) = read_digits(format, i);
                    spec.precision = Some(n.unwrap_or(0));
                    i += len;
                }
            }
            // Length modifiers are accepted and ignored.
            while i < format.len() && matches!(format[i], 'h' | 'l' | 'L' | 'j' | 'z' | 't') {
                i += 1;
            }
            if i >= format.len() {
                let _ = writeln!(self.errors, "bash: printf: `%': missing format character");
                break;
            }

            let conv = format[i];
            i += 1;
            if conv == '(' {
                let Some(close) = format[i..].iter().position(|&c| c == ')') else {
                    let _ = writeln!(self.errors, "bash: printf: `(': missing format character");
                    break;
                };
                let time_format: String = format[i..i + close].iter().collect();
                i += close + 1;
                if i < format.len() && format[i] == 'T' {
                    i += 1;
                }
                consumed = true;
                let arg = self.take();
                let text = format_time(&time_format, arg);
                self.out.push_str(&pad(&truncate(&text, spec.precision), &spec));
                continue;
            }
            consumed = true;
            self.convert(conv, &spec);
        }
        consumed
    }

    fn convert(&mut self, conv: char, spec: &Spec) {
        match conv {
            's' => {
                let arg = self.take().unwrap_or("");
                self.out.push_str(&pad(&truncate(arg, spec.precision), spec));
            }
            'b' => {
                let arg = self.take().unwrap_or("");
                let (text, stop) = expand_escapes(arg);
                self.out.push_str(&pad(&truncate(&text, spec.precision), spec));
                self.stopped = stop;
            }
            'q' => {
                let arg = self.take().unwrap_or("");
                self.out.push_str(&pad(&printf_quote(arg), spec));
            }
            'c' => {
                let arg = self.take().unwrap_or("");
                let first: String = arg.chars().take(1).collect();
                self.out.push_str(&pad(&first, spec));
            }
            'd' | 'i' => {
                let n = self.take_number();
                self.out.push_str(&format_signed(n, spec));
            }
            'u' | 'o' | 'x' | 'X' => {
                let n = self.take_number() as u64;
                self.out.push_str(&format_unsigned(n, conv, spec));
            }
            'f' | 'F' | 'e' | 'E' | 'g' | 'G' => {
                let f = self.take_float();
                self.out.push_str(&format_float(f, conv, spec));
            }
            other => {
                let _ = writeln!(self.errors, "bash: printf: `{}': invalid format character", other);
                self.stopped = true;
            }
        }
    }

    /// Escape in the format string itself. `\NNN` takes up to three octal
    /// digits without a leading zero. Returns the characters consumed
    /// after the backslash.
    fn format_escape(&mut self, format: &[char], at: usize) -> usize {
        let Some(&c) = format.get(at) else {
            self.out.push('\\');
            return 0;
        };
        if c.is_digit(8) {
            let mut value = 0u32;
            let mut n = 0;
            while n < 3 && at + n < format.len() && format[at + n].is_digit(8) {
                value = value * 8 + format[at + n].to_digit(8).unwrap_or(0);
                n += 1;
            }
            self.out.push(char::from_u32(value).unwrap_or('\0'));
            return n;
        }
        let mut end = at + 1;
        if matches!(c, 'x' | 'u' | 'U') {
            let max = match c {
                'x' => 2,
                'u' => 4,
                _ => 8,
            };
            while end < format.len() && end - at - 1 < max && format[end].is_ascii_hexdigit() {
                end += 1;
            }
        }
        let piece: String = std::iter::once('\\').chain(format[at..end].iter().copied()).collect();
        let (text, stop) = expand_escapes(&piece);
        self.out.push_str(&text);
        if stop {
            self.stopped = true;
        }
        end - at
    }
}

fn read_digits(format: &[char], start: usize) -> (Option<usize>, usize) {
    let mut len = 0;
    let mut value: usize = 0;
    while start + len < format.len() && format[start + len].is_ascii_digit() {
        value = value.saturating_mul(10).saturating_add(format[start + len].to_digit(10).unwrap_or(0) as usize);
        len += 1;
    }
    if len == 0 {
        (None, 0)
    } else {
        (Some(value), len)
    }
}

/// Numeric argument: decimal, `0x` hex, leading-zero octal, or `'c`
/// for a character code. On error returns the value parsed so far.
fn parse_integer(arg: &str) -> Result<i64, i64> {
    let s = arg.trim_start();
    if s.is_empty() {
        return Ok(0);
    }
    if let Some(rest) = s.strip_prefix('\'').or_else(|| s.strip_prefix('"')) {
        return Ok(rest.chars().next().map_or(0, |c| c as i64));
    }
    let (negative, body) = match s.as_bytes()[0] {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    let (radix, digits) = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        (16, hex)
    } else if body.len() > 1 && body.starts_with('0') {
        (8, &body[1..])
    } else {
        (10, body)
    };
    let mut value: i64 = 0;
    let mut seen = false;
    for c in digits.chars() {
        let Some(d) = c.to_digit(radix) else {
            let partial = if negative { -value } else { value };
            return Err(partial);
        };
        seen = true;
        value = value.wrapping_mul(radix as i64).wrapping_add(d as i64);
    }
    if !seen && radix != 8 {
        return Err(0);
    }
    Ok(if negative { value.wrapping_neg() } else { value })
}

fn parse_float(arg: &str) -> Option<f64> {
    let s = arg.trim();
    if s.is_empty() {
        return Some(0.0);
    }
    if let Some(rest) = s.strip_prefix('\'').or_else(|| s.strip_prefix('"')) {
        return Some(rest.chars().next().map_or(0.0, |c| c as u32 as f64));
    }
    if let Ok(f) = s.parse::<f64>() {
        return Some(f);
    }
    parse_integer(s).ok().map(|n| n as f64)
}

fn truncate(s: &str, precision: Option<usize>) -> String {
    match precision {
        Some(p) => s.chars().take(p).collect(),
        None => s.to_string(),
    }
}

fn pad(s: &str, spec: &Spec) -> String {
    let len = s.chars().count();
    let width = spec.width.unwrap_or(0);
    if len >= width {
        return s.to_string();
    }
    let fill = " ".repeat(width - len);
    if spec.left {
        format!("{}{}", s, fill)
    } else {
        format!("{}{}", fill, s)
    }
}

/// Pads a number, putting zero fill between sign/prefix and digits.
fn pad_number(sign: &str, digits: &str, spec: &Spec, zero_ok: bool) -> String {
    let width = spec.width.unwrap_or(0);
    let len = sign.len() + digits.len();
    if len >= width {
        return format!("{}{}", sign, digits);
    }
    if spec.zero && !spec.left && zero_ok {
        return format!("{}{}{}", sign, "0".repeat(width - len), digits);
    }
    pad(&format!("{}{}", sign, digits), spec)
}

fn with_min_digits(digits: String, precision: Option<usize>) -> String {
    match precision {
        Some(0) if digits == "0" => String::new(),
        Some(p) if digits.len() < p => format!("{}{}", "0".repeat(p - digits.len()), digits),
        _ => digits,
    }
}

fn format_signed(n: i64, spec: &Spec) -> String {
    let sign = if n < 0 {
        "-"
    } else if spec.plus {
        "+"
    } else if spec.space {
        " "
    } else {
        ""
    };
    let digits = with_min_digits(n.unsigned_abs().to_string(), spec.precision);
    pad_number(sign, &digits, spec, spec.precision.is_none())
}

fn format_unsigned(n: u64, conv: char, spec: &Spec) -> String {
    let (prefix, digits) = match conv {
        'o' => (if spec.alt && n != 0 { "0" } else { "" }, format!("{:o}", n)),
        'x' => (if spec.alt && n != 0 { "0x" } else { "" }, format!("{:x}", n)),
        'X' => (if spec.alt && n != 0 { "0X" } else { "" }, format!("{:X}", n)),
        _ => ("", n.to_string()),
    };
    let digits = with_min_digits(digits, spec.precision);
    pad_number(prefix, &digits, spec, spec.precision.is_none())
}

/// `%e` in C form: at least two exponent digits, explicit sign.
fn exponent_form(f: f64, precision: usize, upper: bool) -> String {
    let raw = format!("{:.*e}", precision, f);
    let (mantissa, exp) = raw.split_once('e').unwrap_or((raw.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let sign = if exp < 0 { '-' } else { '+' };
    let e = if upper { 'E' } else { 'e' };
    format!("{}{}{}{:02}", mantissa, e, sign, exp.abs())
}

fn strip_trailing_zeros(s: &str) -> String {
    let (body, exp) = match s.find(['e', 'E']) {
        Some(pos) => (&s[..pos], &s[pos..]),
        None => (s, ""),
    };
    if !body.contains('.') {
        return s.to_string();
    }
    let trimmed = body.trim_end_matches('0').trim_end_matches('.');
    format!("{}{}", trimmed, exp)
}

fn format_float(f: f64, conv: char, spec: &Spec) -> String {
    let upper = conv.is_ascii_uppercase();
    let magnitude = f.abs();
    let body = if magnitude.is_infinite() {
        if upper { "INF" } else { "inf" }.to_string()
    } else if magnitude.is_nan() {
        if upper { "NAN" } else { "nan" }.to_string()
    } else {
        let precision = spec.precision.unwrap_or(6);
        match conv {
            'f' | 'F' => format!("{:.*}", precision, magnitude),
            'e' | 'E' => exponent_form(magnitude, precision, upper),
            _ => {
                let p = precision.max(1);
                let exp_text = exponent_form(magnitude, p - 1, upper);
                let exp: i32 = exp_text.rsplit(['e', 'E']).next().and_then(|e| e.parse().ok()).unwrap_or(0);
                let text = if exp < -4 || exp >= p as i32 {
                    exp_text
                } else {
                    format!("{:.*}", (p as i32 - 1 - exp).max(0) as usize, magnitude)
                };
                if spec.alt {
                    text
                } else {
                    strip_trailing_zeros(&text)
                }
            }
        }
    };
    let sign = if f.is_sign_negative() && !f.is_nan() && f != 0.0 {
        "-"
    } else if spec.plus {
        "+"
    } else if spec.space {
        " "
    } else {
        ""
    };
    pad_number(sign, &body, spec, magnitude.is_finite())
}

/// `%(fmt)T`: the argument is seconds since the epoch; empty or `-1`
/// means now.
fn format_time(time_format: &str, arg: Option<&str>) -> String {
    let time_format = if time_format.is_empty() { "%X" } else { time_format };
    let secs = arg.and_then(|a| parse_integer(a).ok()).unwrap_or(-1);
    let when = if secs < 0 {
        Local::now()
    } else {
        match Local.timestamp_opt(secs, 0).single() {
            Some(t) => t,
            None => Local::now(),
        }
    };
    let mut out = String::new();
    if write!(out, "{}", when.format(time_format)).is_err() {
        return time_format.to_string();
    }
    out
}

pub fn handle_printf(state: &mut InterpreterState, args: &[String]) -> InterpreterResult<ExecResult> {
    let mut rest = args;
    let mut target: Option<&str> = None;
    loop {
        match rest.first().map(String::as_str) {
            Some("-v") => {
                let Some(name) = rest.get(1) else {
                    return Ok(ExecResult::failure_with_code("bash: printf: -v: option requires an argument\n", 2));
                };
                if !is_assignable(name) {
                    return Ok(ExecResult::failure_with_code(
                        format!("bash: printf: `{}': not a valid identifier\n", name),
                        2,
                    ));
                }
                target = Some(name.as_str());
                rest = &rest[2..];
            }
            Some("--") => {
                rest = &rest[1..];
                break;
            }
            _ => break,
        }
    }
    let Some((format, values)) = rest.split_first() else {
        return Ok(ExecResult::failure_with_code("printf: usage: printf [-v var] format [arguments]\n", 2));
    };

    let format: Vec<char> = format.chars().collect();
    let mut fmt = Formatter { args: values, next: 0, out: String::new(), errors: String::new(), stopped: false };
    loop {
        let consumed = fmt.run(&format);
        if !consumed || fmt.stopped || fmt.next >= values.len() {
            break;
        }
    }

    let code = if fmt.errors.is_empty() { 0 } else { 1 };
    match target {
        Some(name) => {
            state.assign_scalar(name, &fmt.out, false)?;
            Ok(ExecResult::new(String::new(), fmt.errors, code))
        }
        None => Ok(ExecResult::new(fmt.out, fmt.errors, code)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn printf(args: &[&str]) -> ExecResult {
        let mut state = InterpreterState::default();
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        handle_printf(&mut state, &args).unwrap()
    }

    fn out(args: &[&str]) -> String {
        printf(args).stdout
    }

    #[test]
    fn test_strings_and_reuse() {
        assert_eq!(out(&["%s-%s\\n", "a", "b", "c"]), "a-b\nc-\n");
        assert_eq!(out(&["[%5s][%-5s][%.2s]", "ab", "cd", "xyz"]), "[   ab][cd   ][xy]");
        assert_eq!(out(&["plain\\n"]), "plain\n");
        assert_eq!(out(&["%%\\101"]), "%A");
    }

    #[test]
    fn test_integers() {
        assert_eq!(out(&["%d %i %5d|%-4d|%05d", "42", "-7", "3", "4", "-12"]), "42 -7     3|4   |-0012");
        assert_eq!(out(&["%x %X %o %#x %#o", "255", "255", "8", "255", "8"]), "ff FF 10 0xff 010");
        assert_eq!(out(&["%d %d %d", "0x10", "010", "'A"]), "16 8 65");
        assert_eq!(out(&["%+d % d %.3d", "5", "5", "7"]), "+5  5 007");
        assert_eq!(out(&["%*d|%.*s", "4", "1", "2", "abc"]), "   1|ab");
    }

    #[test]
    fn test_invalid_number() {
        let r = printf(&["%d\\n", "12abc"]);
        assert_eq!(r.stdout, "12\n");
        assert_eq!(r.stderr, "bash: printf: 12abc: invalid number\n");
        assert_eq!(r.exit_code, 1);
    }

    #[test]
    fn test_floats() {
        assert_eq!(out(&["%.2f %f", "3.14159", "1"]), "3.14 1.000000");
        assert_eq!(out(&["%e", "12345.678"]), "1.234568e+04");
        assert_eq!(out(&["%g %g %g", "0.0001", "123456789", "2.5"]), "0.0001 1.23457e+08 2.5");
        assert_eq!(out(&["%8.3f|%-8.1f|", "-2.5", "2"]), "  -2.500|2.0     |");
    }

    #[test]
    fn test_b_q_c() {
        assert_eq!(out(&["%b|", "a\\tb"]), "a\tb|");
        assert_eq!(out(&["%b%s", "x\\cy", "never"]), "x");
        assert_eq!(out(&["%q", "a b'c"]), "a\\ b\\'c");
        assert_eq!(out(&["%q\\n", "a b"]), "a\\ b\n");
        assert_eq!(out(&["%lq|%ld", "x", "4"]), "x|4");
        assert_eq!(out(&["%c%c", "hello", "w"]), "hw");
    }

    #[test]
    fn test_assign_to_variable() {
        let mut state = InterpreterState::default();
        let args: Vec<String> = ["-v", "out", "%03d", "7"].iter().map(|s| s.to_string()).collect();
        let r = handle_printf(&mut state, &args).unwrap();
        assert_eq!(r.stdout, "");
        assert_eq!(state.vars.get_scalar("out").as_deref(), Some("007"));
    }

    #[test]
    fn test_time_format() {
        let s = out(&["%(%Y)T", "0"]);
        assert!(s == "1970" || s == "1969", "got {}", s);
        assert_eq!(out(&["%(%%)T", "-1"]), "%");
    }
}

//! Word Parser
//!
//! Turns the raw text of a word token into `WordPart`s: quoting, parameter
//! expansions, command and arithmetic substitutions, brace and tilde
//! expansion markers. The same routines parse heredoc bodies and the words
//! nested inside `${...}` operators.

use crate::ast::types::*;
use crate::parser::lexer::{scan_len, ScanKind};
use crate::parser::types::{is_valid_name, ParseException, ParseResult};

/// Where a word appears; controls which expansions are recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordContext {
    /// Command word: brace expansion and leading tilde
    Normal,
    /// Right side of `NAME=`: tilde after `=` and `:`, no brace expansion
    Assignment,
    /// Word inside `${...}` operators: leading tilde, no brace expansion
    Parameter,
    /// Heredoc body or other double-quote-like text: only `$`, `` ` `` and `\`
    Heredoc,
}

pub fn parse_word(raw: &str, line: usize) -> ParseResult<WordNode> {
    WordParser::new(raw, line, WordContext::Normal).parse_unquoted()
}

pub fn parse_word_in(raw: &str, line: usize, context: WordContext) -> ParseResult<WordNode> {
    let mut parser = WordParser::new(raw, line, context);
    if context == WordContext::Heredoc {
        let parts = parser.parse_double_quoted_body(false)?;
        return Ok(WordNode { parts });
    }
    parser.parse_unquoted()
}

struct WordParser {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    context: WordContext,
}

impl WordParser {
    fn new(raw: &str, line: usize, context: WordContext) -> Self {
        Self { chars: raw.chars().collect(), pos: 0, line, context }
    }

    fn error(&self, message: impl Into<String>) -> ParseException {
        ParseException::new(message, self.line, self.pos + 1)
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn text(&self, start: usize, end: usize) -> String {
        self.chars[start..end].iter().collect()
    }

    fn scan(&self, kind: ScanKind) -> ParseResult<usize> {
        scan_len(&self.chars[self.pos..], kind).map_err(|e| self.error(e.message))
    }

    fn parse_unquoted(&mut self) -> ParseResult<WordNode> {
        let mut parts = Vec::new();
        let mut literal = String::new();

        while let Some(c) = self.peek(0) {
            match c {
                '\\' => {
                    flush(&mut literal, &mut parts);
                    self.pos += 1;
                    match self.peek(0) {
                        Some(n) => {
                            parts.push(WordPart::Escaped(n.to_string()));
                            self.pos += 1;
                        }
                        None => literal.push('\\'),
                    }
                }
                '\'' => {
                    flush(&mut literal, &mut parts);
                    let len = self.scan(ScanKind::SingleQuoted)?;
                    parts.push(WordPart::SingleQuoted(self.text(self.pos + 1, self.pos + len - 1)));
                    self.pos += len;
                }
                '"' => {
                    flush(&mut literal, &mut parts);
                    let len = self.scan(ScanKind::DoubleQuoted)?;
                    let end = self.pos + len - 1;
                    self.pos += 1;
                    let inner = self.parse_double_quoted_until(end, true)?;
                    parts.push(WordPart::DoubleQuoted(inner));
                    self.pos = end + 1;
                }
                '$' if self.peek(1) == Some('\'') => {
                    flush(&mut literal, &mut parts);
                    let len = self.scan(ScanKind::AnsiC)?;
                    let raw = self.text(self.pos + 2, self.pos + len - 1);
                    parts.push(WordPart::SingleQuoted(process_ansi_c(&raw)));
                    self.pos += len;
                }
                '$' if self.peek(1) == Some('"') => {
                    // Locale translation is not supported; behaves like "..."
                    self.pos += 1;
                }
                '$' => match self.parse_dollar()? {
                    Some(part) => {
                        flush(&mut literal, &mut parts);
                        parts.push(part);
                    }
                    None => literal.push('$'),
                },
                '`' => {
                    flush(&mut literal, &mut parts);
                    parts.push(self.parse_backtick()?);
                }
                '~' if self.tilde_allowed() => {
                    match self.try_parse_tilde() {
                        Some(part) => {
                            flush(&mut literal, &mut parts);
                            parts.push(part);
                        }
                        None => {
                            literal.push('~');
                            self.pos += 1;
                        }
                    }
                }
                '{' if self.context == WordContext::Normal => match self.try_parse_brace()? {
                    Some(part) => {
                        flush(&mut literal, &mut parts);
                        parts.push(part);
                    }
                    None => {
                        literal.push('{');
                        self.pos += 1;
                    }
                },
                _ => {
                    literal.push(c);
                    self.pos += 1;
                }
            }
        }
        flush(&mut literal, &mut parts);
        Ok(WordNode { parts })
    }

    fn tilde_allowed(&self) -> bool {
        match self.context {
            WordContext::Normal | WordContext::Parameter => self.pos == 0,
            WordContext::Assignment => self.pos == 0 || matches!(self.chars.get(self.pos - 1), Some(':')),
            WordContext::Heredoc => false,
        }
    }

    fn try_parse_tilde(&mut self) -> Option<WordPart> {
        let start = self.pos + 1;
        let mut end = start;
        while end < self.chars.len() {
            let c = self.chars[end];
            if c == '/' || (self.context == WordContext::Assignment && c == ':') {
                break;
            }
            if !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '+')) {
                return None;
            }
            end += 1;
        }
        let user = self.text(start, end);
        self.pos = end;
        Some(WordPart::TildeExpansion(if user.is_empty() { None } else { Some(user) }))
    }

    /// Parses double-quoted content up to (not including) `end`.
    fn parse_double_quoted_until(&mut self, end: usize, in_quotes: bool) -> ParseResult<Vec<WordPart>> {
        let saved = std::mem::take(&mut self.chars);
        self.chars = saved[..end].to_vec();
        let result = self.parse_double_quoted_body(in_quotes);
        self.chars = saved;
        result
    }

    /// Double-quote rules until the end of `self.chars`. Inside real double
    /// quotes `\"` is an escape; in heredoc bodies it is not.
    fn parse_double_quoted_body(&mut self, in_quotes: bool) -> ParseResult<Vec<WordPart>> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        while let Some(c) = self.peek(0) {
            match c {
                '\\' => {
                    match self.peek(1) {
                        Some(n @ ('$' | '`' | '\\')) => {
                            literal.push(n);
                            self.pos += 2;
                        }
                        Some('"') if in_quotes => {
                            literal.push('"');
                            self.pos += 2;
                        }
                        Some('\n') => self.pos += 2,
                        _ => {
                            literal.push('\\');
                            self.pos += 1;
                        }
                    }
                }
                '$' => match self.parse_dollar()? {
                    Some(part) => {
                        flush(&mut literal, &mut parts);
                        parts.push(part);
                    }
                    None => literal.push('$'),
                },
                '`' => {
                    flush(&mut literal, &mut parts);
                    parts.push(self.parse_backtick()?);
                }
                _ => {
                    literal.push(c);
                    self.pos += 1;
                }
            }
        }
        flush(&mut literal, &mut parts);
        Ok(parts)
    }

    /// At a `$`. Returns None (consuming the `$`) when it is a literal dollar.
    fn parse_dollar(&mut self) -> ParseResult<Option<WordPart>> {
        match self.peek(1) {
            Some('(') | Some('{') => {
                let len = self.scan(ScanKind::Dollar)?;
                let start = self.pos;
                self.pos += len;
                let inner_is_arith = self.chars.get(start + 2) == Some(&'(')
                    && len >= 6
                    && self.chars[start + len - 2] == ')'
                    && self.chars[start + len - 1] == ')';
                if self.chars[start + 1] == '{' {
                    let inner = self.text(start + 2, start + len - 1);
                    let part = parse_braced_parameter(&inner, self.line)?;
                    return Ok(Some(WordPart::ParameterExpansion(part)));
                }
                if inner_is_arith && is_arith_span(&self.chars[start + 1..start + len]) {
                    let expr = self.text(start + 3, start + len - 2);
                    return Ok(Some(WordPart::ArithmeticExpansion(expr)));
                }
                let inner = self.text(start + 2, start + len - 1);
                let body = crate::parser::parse(&inner).map_err(|e| ParseException::new(e.message, self.line, e.column))?;
                Ok(Some(WordPart::CommandSubstitution(CommandSubstitutionPart { body, backtick: false })))
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let start = self.pos + 1;
                let mut end = start;
                while end < self.chars.len() && (self.chars[end].is_ascii_alphanumeric() || self.chars[end] == '_') {
                    end += 1;
                }
                let name = self.text(start, end);
                self.pos = end;
                Ok(Some(WordPart::ParameterExpansion(ParameterExpansionPart::simple(name))))
            }
            Some(c) if c.is_ascii_digit() || matches!(c, '@' | '*' | '#' | '?' | '$' | '!' | '-') => {
                self.pos += 2;
                Ok(Some(WordPart::ParameterExpansion(ParameterExpansionPart::simple(c.to_string()))))
            }
            _ => {
                self.pos += 1;
                Ok(None)
            }
        }
    }

    fn parse_backtick(&mut self) -> ParseResult<WordPart> {
        let len = self.scan(ScanKind::Backtick)?;
        let raw = self.text(self.pos + 1, self.pos + len - 1);
        self.pos += len;
        let mut script = String::new();
        let mut chars = raw.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\\' {
                match chars.peek() {
                    Some(&n @ ('$' | '`' | '\\')) => {
                        script.push(n);
                        chars.next();
                        continue;
                    }
                    _ => {}
                }
            }
            script.push(c);
        }
        let body = crate::parser::parse(&script).map_err(|e| ParseException::new(e.message, self.line, e.column))?;
        Ok(WordPart::CommandSubstitution(CommandSubstitutionPart { body, backtick: true }))
    }

    /// `{` at the current position: brace expansion when the braces hold a
    /// top-level comma or a valid sequence expression.
    fn try_parse_brace(&mut self) -> ParseResult<Option<WordPart>> {
        let Some(close) = find_brace_close(&self.chars, self.pos) else {
            return Ok(None);
        };
        let inner: Vec<char> = self.chars[self.pos + 1..close].to_vec();
        let inner_text: String = inner.iter().collect();

        if let Some(range) = parse_brace_range(&inner_text) {
            self.pos = close + 1;
            return Ok(Some(WordPart::BraceExpansion(vec![BraceItem::Range(range)])));
        }

        let pieces = split_top_level_commas(&inner);
        if pieces.len() < 2 {
            return Ok(None);
        }
        let mut items = Vec::with_capacity(pieces.len());
        for piece in pieces {
            let word = WordParser::new(&piece, self.line, WordContext::Normal).parse_unquoted()?;
            items.push(BraceItem::Word(word));
        }
        self.pos = close + 1;
        Ok(Some(WordPart::BraceExpansion(items)))
    }
}

fn flush(literal: &mut String, parts: &mut Vec<WordPart>) {
    if !literal.is_empty() {
        parts.push(WordPart::Literal(std::mem::take(literal)));
    }
}

/// `((...))` where the first unmatched `)` is doubled: arithmetic, not a
/// command substitution starting with a subshell.
fn is_arith_span(span: &[char]) -> bool {
    // span is `((...))`
    let mut depth = 0usize;
    for (i, &c) in span.iter().enumerate().skip(2) {
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => return i == span.len() - 2,
            ')' => depth -= 1,
            _ => {}
        }
    }
    false
}

fn find_brace_close(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '\'' | '"' | '`' => {
                let kind = match chars[i] {
                    '\'' => ScanKind::SingleQuoted,
                    '"' => ScanKind::DoubleQuoted,
                    _ => ScanKind::Backtick,
                };
                let len = scan_len(&chars[i..], kind).ok()?;
                i += len;
                continue;
            }
            '$' if matches!(chars.get(i + 1), Some('{') | Some('(')) => {
                let len = scan_len(&chars[i..], ScanKind::Dollar).ok()?;
                i += len;
                continue;
            }
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn split_top_level_commas(chars: &[char]) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                current.push(c);
                if let Some(&n) = chars.get(i + 1) {
                    current.push(n);
                }
                i += 2;
                continue;
            }
            '\'' | '"' | '`' | '$' => {
                let kind = match c {
                    '\'' => ScanKind::SingleQuoted,
                    '"' => ScanKind::DoubleQuoted,
                    '`' => ScanKind::Backtick,
                    _ => ScanKind::Dollar,
                };
                let len = scan_len(&chars[i..], kind).unwrap_or(1).max(1);
                current.extend(&chars[i..(i + len).min(chars.len())]);
                i += len;
                continue;
            }
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                pieces.push(std::mem::take(&mut current));
                i += 1;
                continue;
            }
            _ => {}
        }
        current.push(c);
        i += 1;
    }
    pieces.push(current);
    pieces
}

/// `{1..5}`, `{a..e}`, `{10..1..2}`, `{01..10}`
fn parse_brace_range(text: &str) -> Option<BraceRange> {
    let pieces: Vec<&str> = text.split("..").collect();
    if pieces.len() != 2 && pieces.len() != 3 {
        return None;
    }
    let is_num = |s: &str| s.parse::<i64>().is_ok();
    let is_char = |s: &str| s.chars().count() == 1 && s.chars().all(|c| c.is_ascii_alphabetic());
    let (start, end) = (pieces[0], pieces[1]);
    if !((is_num(start) && is_num(end)) || (is_char(start) && is_char(end))) {
        return None;
    }
    let step = match pieces.get(2) {
        Some(s) => Some(s.parse::<i64>().ok()?),
        None => None,
    };
    Some(BraceRange { start: start.to_string(), end: end.to_string(), step })
}

/// Index of the first char in `chars[from..]` equal to `target` that sits at
/// nesting depth zero and outside quotes.
fn find_top_level(chars: &[char], from: usize, target: char) -> Option<usize> {
    let mut i = from;
    let mut depth = 0usize;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                i += 2;
                continue;
            }
            '\'' | '"' | '`' => {
                let kind = match c {
                    '\'' => ScanKind::SingleQuoted,
                    '"' => ScanKind::DoubleQuoted,
                    _ => ScanKind::Backtick,
                };
                i += scan_len(&chars[i..], kind).unwrap_or(1).max(1);
                continue;
            }
            '$' if matches!(chars.get(i + 1), Some('{') | Some('(')) => {
                i += scan_len(&chars[i..], ScanKind::Dollar).unwrap_or(1).max(1);
                continue;
            }
            _ if c == target && depth == 0 => return Some(i),
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            _ => {}
        }
        i += 1;
    }
    None
}

fn sub_word(chars: &[char], line: usize) -> ParseResult<WordNode> {
    let text: String = chars.iter().collect();
    parse_word_in(&text, line, WordContext::Parameter)
}

/// Parses the inside of `${...}`.
pub fn parse_braced_parameter(inner: &str, line: usize) -> ParseResult<ParameterExpansionPart> {
    let chars: Vec<char> = inner.chars().collect();
    let bad = || ParameterExpansionPart {
        parameter: String::new(),
        index: None,
        indirect: false,
        operation: Some(ParameterOperation::BadSubstitution(format!("${{{}}}", inner))),
    };
    if chars.is_empty() {
        return Ok(bad());
    }

    // ${#name} / ${#arr[@]}: length
    if chars[0] == '#' && chars.len() > 1 {
        let (name, after) = read_parameter_name(&chars, 1);
        if !name.is_empty() {
            let (index, after) = read_index(&chars, after);
            if after == chars.len() {
                return Ok(ParameterExpansionPart {
                    parameter: name,
                    index,
                    indirect: false,
                    operation: Some(ParameterOperation::Length),
                });
            }
            if chars.get(after) == Some(&':') && name != "#" {
                return Ok(bad());
            }
        }
    }

    let mut pos = 0;
    let mut indirect = false;
    if chars[0] == '!' && chars.len() > 1 {
        indirect = true;
        pos = 1;
    }

    let (name, after_name) = read_parameter_name(&chars, pos);
    if name.is_empty() {
        return Ok(bad());
    }
    pos = after_name;

    if indirect && pos + 1 == chars.len() && matches!(chars[pos], '*' | '@') && is_valid_name(&name) {
        return Ok(ParameterExpansionPart {
            parameter: name,
            index: None,
            indirect: false,
            operation: Some(ParameterOperation::NamePrefix { star: chars[pos] == '*' }),
        });
    }

    let (index, after_index) = read_index(&chars, pos);
    pos = after_index;

    if indirect && pos == chars.len() {
        if let Some(idx @ (ParameterIndex::All | ParameterIndex::Star)) = &index {
            return Ok(ParameterExpansionPart {
                parameter: name,
                index: None,
                indirect: false,
                operation: Some(ParameterOperation::Keys { star: *idx == ParameterIndex::Star }),
            });
        }
    }

    let operation = if pos >= chars.len() {
        None
    } else {
        Some(parse_operation(&chars, pos, line, inner)?)
    };

    Ok(ParameterExpansionPart { parameter: name, index, indirect, operation })
}

fn read_parameter_name(chars: &[char], pos: usize) -> (String, usize) {
    let Some(&c) = chars.get(pos) else {
        return (String::new(), pos);
    };
    if c.is_ascii_alphabetic() || c == '_' {
        let mut end = pos;
        while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
            end += 1;
        }
        return (chars[pos..end].iter().collect(), end);
    }
    if c.is_ascii_digit() {
        let mut end = pos;
        while end < chars.len() && chars[end].is_ascii_digit() {
            end += 1;
        }
        return (chars[pos..end].iter().collect(), end);
    }
    if matches!(c, '@' | '*' | '#' | '?' | '$' | '!' | '-') {
        return (c.to_string(), pos + 1);
    }
    (String::new(), pos)
}

fn read_index(chars: &[char], pos: usize) -> (Option<ParameterIndex>, usize) {
    if chars.get(pos) != Some(&'[') {
        return (None, pos);
    }
    let Some(close) = find_top_level(chars, pos + 1, ']') else {
        return (None, pos);
    };
    let text: String = chars[pos + 1..close].iter().collect();
    let index = match text.as_str() {
        "@" => ParameterIndex::All,
        "*" => ParameterIndex::Star,
        _ => ParameterIndex::Expr(text),
    };
    (Some(index), close + 1)
}

fn parse_operation(chars: &[char], pos: usize, line: usize, inner: &str) -> ParseResult<ParameterOperation> {
    let rest = &chars[pos..];
    let bad = || Ok(ParameterOperation::BadSubstitution(format!("${{{}}}", inner)));
    let c = rest[0];
    let next = rest.get(1).copied();

    match c {
        ':' => match next {
            Some('-') => Ok(ParameterOperation::Default { word: sub_word(&rest[2..], line)?, check_empty: true }),
            Some('=') => Ok(ParameterOperation::AssignDefault { word: sub_word(&rest[2..], line)?, check_empty: true }),
            Some('+') => Ok(ParameterOperation::Alternative { word: sub_word(&rest[2..], line)?, check_empty: true }),
            Some('?') => {
                let word = if rest.len() > 2 { Some(sub_word(&rest[2..], line)?) } else { None };
                Ok(ParameterOperation::ErrorIfUnset { word, check_empty: true })
            }
            _ => {
                let body = &rest[1..];
                match find_top_level(body, 0, ':') {
                    Some(split) => Ok(ParameterOperation::Substring {
                        offset: body[..split].iter().collect(),
                        length: Some(body[split + 1..].iter().collect()),
                    }),
                    None => Ok(ParameterOperation::Substring { offset: body.iter().collect(), length: None }),
                }
            }
        },
        '-' => Ok(ParameterOperation::Default { word: sub_word(&rest[1..], line)?, check_empty: false }),
        '=' => Ok(ParameterOperation::AssignDefault { word: sub_word(&rest[1..], line)?, check_empty: false }),
        '+' => Ok(ParameterOperation::Alternative { word: sub_word(&rest[1..], line)?, check_empty: false }),
        '?' => {
            let word = if rest.len() > 1 { Some(sub_word(&rest[1..], line)?) } else { None };
            Ok(ParameterOperation::ErrorIfUnset { word, check_empty: false })
        }
        '#' | '%' => {
            let greedy = next == Some(c);
            let skip = if greedy { 2 } else { 1 };
            let side = if c == '#' { PatternSide::Prefix } else { PatternSide::Suffix };
            Ok(ParameterOperation::RemovePattern { pattern: sub_word(&rest[skip..], line)?, side, greedy })
        }
        '/' => {
            let (all, anchor, skip) = match next {
                Some('/') => (true, None, 2),
                Some('#') => (false, Some(PatternAnchor::Start), 2),
                Some('%') => (false, Some(PatternAnchor::End), 2),
                _ => (false, None, 1),
            };
            let body = &rest[skip..];
            let (pattern, replacement) = match find_top_level(body, 0, '/') {
                Some(split) => (sub_word(&body[..split], line)?, Some(sub_word(&body[split + 1..], line)?)),
                None => (sub_word(body, line)?, None),
            };
            Ok(ParameterOperation::Replace { pattern, replacement, all, anchor })
        }
        '^' | ',' => {
            let all = next == Some(c);
            let skip = if all { 2 } else { 1 };
            let direction = if c == '^' { CaseDirection::Upper } else { CaseDirection::Lower };
            let pattern = if rest.len() > skip { Some(sub_word(&rest[skip..], line)?) } else { None };
            Ok(ParameterOperation::CaseModify { direction, all, pattern })
        }
        '@' if rest.len() == 2 => match next.and_then(TransformOperator::from_char) {
            Some(op) => Ok(ParameterOperation::Transform(op)),
            None => bad(),
        },
        _ => bad(),
    }
}

/// Expands the escapes of `$'...'` strings.
pub fn process_ansi_c(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c != '\\' || i + 1 >= chars.len() {
            out.push(c);
            i += 1;
            continue;
        }
        i += 1;
        let e = chars[i];
        i += 1;
        match e {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'e' | 'E' => out.push('\x1b'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            '?' => out.push('?'),
            'c' => {
                if let Some(&ctl) = chars.get(i) {
                    out.push(((ctl.to_ascii_uppercase() as u8) ^ 0x40) as char);
                    i += 1;
                }
            }
            'x' | 'u' | 'U' => {
                let max = match e {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let start = i;
                while i < chars.len() && i - start < max && chars[i].is_ascii_hexdigit() {
                    i += 1;
                }
                if i == start {
                    out.push('\\');
                    out.push(e);
                } else {
                    let hex: String = chars[start..i].iter().collect();
                    if let Some(ch) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                        out.push(ch);
                    }
                }
            }
            '0'..='7' => {
                let start = i - 1;
                while i < chars.len() && i - start < 3 && ('0'..='7').contains(&chars[i]) {
                    i += 1;
                }
                let oct: String = chars[start..i].iter().collect();
                if let Ok(v) = u32::from_str_radix(&oct, 8) {
                    out.push(char::from_u32(v & 0xff).unwrap_or('?'));
                }
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lit(s: &str) -> WordPart {
        WordPart::Literal(s.to_string())
    }

    #[test]
    fn test_plain_and_quoted_parts() {
        let w = parse_word(r#"a'b c'"d $x"\*"#, 1).unwrap();
        assert_eq!(w.parts, vec![
            lit("a"),
            WordPart::SingleQuoted("b c".into()),
            WordPart::DoubleQuoted(vec![lit("d "), WordPart::ParameterExpansion(ParameterExpansionPart::simple("x"))]),
            WordPart::Escaped("*".into()),
        ]);
    }

    #[test]
    fn test_special_parameters() {
        let w = parse_word("$1$@$#$?", 1).unwrap();
        let names: Vec<_> = w
            .parts
            .iter()
            .map(|p| match p {
                WordPart::ParameterExpansion(pe) => pe.parameter.clone(),
                _ => panic!("unexpected part"),
            })
            .collect();
        assert_eq!(names, vec!["1", "@", "#", "?"]);
    }

    #[test]
    fn test_lone_dollar_is_literal() {
        assert_eq!(parse_word("a$", 1).unwrap().parts, vec![lit("a$")]);
        assert_eq!(parse_word("$ x", 1).unwrap().parts, vec![lit("$ x")]);
    }

    #[test]
    fn test_braced_operations() {
        let p = parse_braced_parameter("x:-def", 1).unwrap();
        assert!(matches!(p.operation, Some(ParameterOperation::Default { check_empty: true, .. })));
        let p = parse_braced_parameter("#arr[@]", 1).unwrap();
        assert_eq!(p.index, Some(ParameterIndex::All));
        assert_eq!(p.operation, Some(ParameterOperation::Length));
        let p = parse_braced_parameter("x##*/", 1).unwrap();
        assert!(matches!(p.operation, Some(ParameterOperation::RemovePattern { greedy: true, side: PatternSide::Prefix, .. })));
        let p = parse_braced_parameter("x/#/X", 1).unwrap();
        match p.operation {
            Some(ParameterOperation::Replace { pattern, replacement, anchor, all }) => {
                assert!(pattern.parts.is_empty());
                assert_eq!(replacement.unwrap().parts, vec![lit("X")]);
                assert_eq!(anchor, Some(PatternAnchor::Start));
                assert!(!all);
            }
            other => panic!("unexpected {:?}", other),
        }
        let p = parse_braced_parameter("s:1:-2", 1).unwrap();
        assert_eq!(p.operation, Some(ParameterOperation::Substring { offset: "1".into(), length: Some("-2".into()) }));
        let p = parse_braced_parameter("v@Q", 1).unwrap();
        assert_eq!(p.operation, Some(ParameterOperation::Transform(TransformOperator::Quote)));
    }

    #[test]
    fn test_subscripts_close_at_bracket() {
        let p = parse_braced_parameter("a[-1]", 1).unwrap();
        assert_eq!(p.parameter, "a");
        assert_eq!(p.index, Some(ParameterIndex::Expr("-1".into())));
        assert_eq!(p.operation, None);
        let p = parse_braced_parameter("m[k]", 1).unwrap();
        assert_eq!(p.index, Some(ParameterIndex::Expr("k".into())));
        let p = parse_braced_parameter("#PIPESTATUS[@]", 1).unwrap();
        assert_eq!(p.parameter, "PIPESTATUS");
        assert_eq!(p.operation, Some(ParameterOperation::Length));
        let p = parse_braced_parameter("a[b[1]]", 1).unwrap();
        assert_eq!(p.index, Some(ParameterIndex::Expr("b[1]".into())));
        let p = parse_braced_parameter("a[1]:0:2", 1).unwrap();
        assert_eq!(p.operation, Some(ParameterOperation::Substring { offset: "0".into(), length: Some("2".into()) }));

        let w = parse_word("\"${a[@]}\"", 1).unwrap();
        match &w.parts[..] {
            [WordPart::DoubleQuoted(inner)] => match &inner[..] {
                [WordPart::ParameterExpansion(pe)] => {
                    assert_eq!(pe.parameter, "a");
                    assert_eq!(pe.index, Some(ParameterIndex::All));
                    assert_eq!(pe.operation, None);
                }
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_indirection_forms() {
        let p = parse_braced_parameter("!ref", 1).unwrap();
        assert!(p.indirect);
        let p = parse_braced_parameter("!arr[@]", 1).unwrap();
        assert_eq!(p.operation, Some(ParameterOperation::Keys { star: false }));
        let p = parse_braced_parameter("!BASH*", 1).unwrap();
        assert_eq!(p.operation, Some(ParameterOperation::NamePrefix { star: true }));
    }

    #[test]
    fn test_bad_substitution_is_deferred() {
        let p = parse_braced_parameter("x!y", 1).unwrap();
        assert!(matches!(p.operation, Some(ParameterOperation::BadSubstitution(_))));
    }

    #[test]
    fn test_brace_expansion_detection() {
        let w = parse_word("a{b,c}d", 1).unwrap();
        assert!(matches!(&w.parts[1], WordPart::BraceExpansion(items) if items.len() == 2));
        let w = parse_word("{1..3}", 1).unwrap();
        assert!(matches!(&w.parts[0], WordPart::BraceExpansion(items) if matches!(items[0], BraceItem::Range(_))));
        assert_eq!(parse_word("{a}", 1).unwrap().parts, vec![lit("{a}")]);
        assert_eq!(parse_word("'{a,b}'", 1).unwrap().parts, vec![WordPart::SingleQuoted("{a,b}".into())]);
    }

    #[test]
    fn test_tilde() {
        let w = parse_word("~/x", 1).unwrap();
        assert_eq!(w.parts[0], WordPart::TildeExpansion(None));
        let w = parse_word_in("~/a:~bob/b", 1, WordContext::Assignment).unwrap();
        assert_eq!(w.parts[0], WordPart::TildeExpansion(None));
        assert!(w.parts.contains(&WordPart::TildeExpansion(Some("bob".into()))));
        assert_eq!(parse_word("a~", 1).unwrap().parts, vec![lit("a~")]);
    }

    #[test]
    fn test_command_and_arith_substitution() {
        let w = parse_word("$(echo hi)$((1+2))`pwd`", 1).unwrap();
        assert!(matches!(&w.parts[0], WordPart::CommandSubstitution(c) if !c.backtick));
        assert_eq!(w.parts[1], WordPart::ArithmeticExpansion("1+2".into()));
        assert!(matches!(&w.parts[2], WordPart::CommandSubstitution(c) if c.backtick));
    }

    #[test]
    fn test_heredoc_context_keeps_quotes() {
        let w = parse_word_in("say \"$x\" 'y'\n", 1, WordContext::Heredoc).unwrap();
        assert_eq!(w.parts[0], lit("say \""));
        assert_eq!(w.parts[2], lit("\" 'y'\n"));
    }

    #[test]
    fn test_ansi_c() {
        assert_eq!(process_ansi_c(r"a\tb\n\x41\101\'"), "a\tb\nAA'");
        let w = parse_word(r"$'x\ny'", 1).unwrap();
        assert_eq!(w.parts, vec![WordPart::SingleQuoted("x\ny".into())]);
    }
}

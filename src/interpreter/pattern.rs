//! Pattern Matching
//!
//! Shell glob matcher shared by pathname expansion, `case`, `[[ == ]]` and
//! the pattern operators of parameter expansion (`#`, `%`, `/`).
//!
//! Patterns compile to a token list and are matched by backtracking with
//! memoization, so extglob alternatives and negation compose without
//! going through a regex engine.
//!
//! ## Edge cases
//!
//! - A reversed range (`[z-a]`) matches nothing
//! - An unclosed `[` or extglob `(` is literal
//! - A backslash makes the next character literal; the expander escapes
//!   quoted characters this way before handing the pattern over

use std::collections::HashMap;

use crate::ast::types::PatternAnchor;

lazy_static::lazy_static! {
    /// POSIX character class names accepted inside `[...]`
    static ref POSIX_CLASSES: HashMap<&'static str, fn(char) -> bool> = {
        let mut m: HashMap<&'static str, fn(char) -> bool> = HashMap::new();
        m.insert("alnum", |c| c.is_alphanumeric());
        m.insert("alpha", |c| c.is_alphabetic());
        m.insert("ascii", |c| c.is_ascii());
        m.insert("blank", |c| c == ' ' || c == '\t');
        m.insert("cntrl", |c| c.is_control());
        m.insert("digit", |c| c.is_ascii_digit());
        m.insert("graph", |c| c.is_ascii_graphic());
        m.insert("lower", |c| c.is_lowercase());
        m.insert("print", |c| c.is_ascii_graphic() || c == ' ');
        m.insert("punct", |c| c.is_ascii_punctuation());
        m.insert("space", |c| c.is_whitespace());
        m.insert("upper", |c| c.is_uppercase());
        m.insert("word", |c| c.is_alphanumeric() || c == '_');
        m.insert("xdigit", |c| c.is_ascii_hexdigit());
        m
    };
}

/// Matching options taken from `shopt`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchFlags {
    pub extglob: bool,
    pub nocase: bool,
}

#[derive(Debug, Clone)]
enum ClassItem {
    Char(char),
    Range(char, char),
    Named(fn(char) -> bool),
    /// Unknown `[:name:]` never matches
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExtKind {
    /// `@(...)` exactly one
    One,
    /// `?(...)` zero or one
    ZeroOrOne,
    /// `*(...)` zero or more
    ZeroOrMore,
    /// `+(...)` one or more
    OneOrMore,
    /// `!(...)` anything except
    Not,
}

#[derive(Debug, Clone)]
enum Token {
    Char(char),
    Any,
    Star,
    Class { negated: bool, items: Vec<ClassItem> },
    Ext { kind: ExtKind, alts: Vec<Vec<Token>> },
}

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    tokens: Vec<Token>,
    flags: MatchFlags,
}

fn find_closing_paren(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0;
    let mut i = open;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '(' => depth += 1,
            ')' => {
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

/// Splits extglob contents on top-level `|`.
fn split_alternatives(chars: &[char]) -> Vec<Vec<char>> {
    let mut alts = vec![Vec::new()];
    let mut depth = 0;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' if i + 1 < chars.len() => {
                if let Some(last) = alts.last_mut() {
                    last.push(c);
                    last.push(chars[i + 1]);
                }
                i += 2;
                continue;
            }
            '(' => depth += 1,
            ')' => depth -= 1,
            '|' if depth == 0 => {
                alts.push(Vec::new());
                i += 1;
                continue;
            }
            _ => {}
        }
        if let Some(last) = alts.last_mut() {
            last.push(c);
        }
        i += 1;
    }
    alts
}

/// Parses a bracket expression starting at `[`. Returns the token and the
/// index just past `]`, or None when the bracket is unclosed.
fn parse_class(chars: &[char], start: usize) -> Option<(Token, usize)> {
    let mut i = start + 1;
    let negated = matches!(chars.get(i), Some('!') | Some('^'));
    if negated {
        i += 1;
    }
    let mut items = Vec::new();
    let mut first = true;
    loop {
        let c = *chars.get(i)?;
        if c == ']' && !first {
            return Some((Token::Class { negated, items }, i + 1));
        }
        first = false;
        if c == '[' && chars.get(i + 1) == Some(&':') {
            let rest: String = chars[i + 2..].iter().collect();
            if let Some(end) = rest.find(":]") {
                let name = &rest[..end];
                items.push(POSIX_CLASSES.get(name).map_or(ClassItem::Never, |f| ClassItem::Named(*f)));
                i += 2 + name.chars().count() + 2;
                continue;
            }
        }
        let (lo, next) = if c == '\\' && i + 1 < chars.len() { (chars[i + 1], i + 2) } else { (c, i + 1) };
        if chars.get(next) == Some(&'-') && chars.get(next + 1).map_or(false, |&h| h != ']') {
            let (hi, after) = if chars[next + 1] == '\\' && next + 2 < chars.len() {
                (chars[next + 2], next + 3)
            } else {
                (chars[next + 1], next + 2)
            };
            items.push(ClassItem::Range(lo, hi));
            i = after;
        } else {
            items.push(ClassItem::Char(lo));
            i = next;
        }
    }
}

fn compile(chars: &[char], extglob: bool) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if extglob && matches!(c, '@' | '?' | '*' | '+' | '!') && chars.get(i + 1) == Some(&'(') {
            if let Some(close) = find_closing_paren(chars, i + 1) {
                let kind = match c {
                    '@' => ExtKind::One,
                    '?' => ExtKind::ZeroOrOne,
                    '*' => ExtKind::ZeroOrMore,
                    '+' => ExtKind::OneOrMore,
                    _ => ExtKind::Not,
                };
                let alts = split_alternatives(&chars[i + 2..close])
                    .iter()
                    .map(|alt| compile(alt, extglob))
                    .collect();
                tokens.push(Token::Ext { kind, alts });
                i = close + 1;
                continue;
            }
        }
        match c {
            '\\' => {
                tokens.push(Token::Char(chars.get(i + 1).copied().unwrap_or('\\')));
                i += 2;
            }
            '*' => {
                if !matches!(tokens.last(), Some(Token::Star)) {
                    tokens.push(Token::Star);
                }
                i += 1;
            }
            '?' => {
                tokens.push(Token::Any);
                i += 1;
            }
            '[' => match parse_class(chars, i) {
                Some((token, next)) => {
                    tokens.push(token);
                    i = next;
                }
                None => {
                    tokens.push(Token::Char('['));
                    i += 1;
                }
            },
            _ => {
                tokens.push(Token::Char(c));
                i += 1;
            }
        }
    }
    tokens
}

fn chars_eq(a: char, b: char, nocase: bool) -> bool {
    a == b || (nocase && a.to_lowercase().eq(b.to_lowercase()))
}

fn class_matches(negated: bool, items: &[ClassItem], c: char, nocase: bool) -> bool {
    let test = |c: char| {
        items.iter().any(|item| match item {
            ClassItem::Char(x) => *x == c,
            ClassItem::Range(lo, hi) => *lo <= c && c <= *hi,
            ClassItem::Named(f) => f(c),
            ClassItem::Never => false,
        })
    };
    let mut hit = test(c);
    if !hit && nocase {
        hit = c.to_lowercase().any(&test) || c.to_uppercase().any(&test);
    }
    hit != negated
}

/// Backtracking matcher over one candidate string. Memo keys are
/// (token list address, token index, start, end).
struct Matcher<'a> {
    chars: &'a [char],
    nocase: bool,
    memo: HashMap<(usize, usize, usize, usize), bool>,
    repeat_memo: HashMap<(usize, usize, usize, usize), bool>,
}

impl<'a> Matcher<'a> {
    fn new(chars: &'a [char], nocase: bool) -> Self {
        Self { chars, nocase, memo: HashMap::new(), repeat_memo: HashMap::new() }
    }

    /// Whether `tokens[ti..]` matches exactly `chars[ci..end]`.
    fn match_from(&mut self, tokens: &[Token], ti: usize, ci: usize, end: usize) -> bool {
        let key = (tokens.as_ptr() as usize, ti, ci, end);
        if let Some(&hit) = self.memo.get(&key) {
            return hit;
        }
        let result = self.match_uncached(tokens, ti, ci, end);
        self.memo.insert(key, result);
        result
    }

    fn match_uncached(&mut self, tokens: &[Token], ti: usize, ci: usize, end: usize) -> bool {
        let Some(token) = tokens.get(ti) else {
            return ci == end;
        };
        match token {
            Token::Char(c) => ci < end && chars_eq(self.chars[ci], *c, self.nocase) && self.match_from(tokens, ti + 1, ci + 1, end),
            Token::Any => ci < end && self.match_from(tokens, ti + 1, ci + 1, end),
            Token::Class { negated, items } => {
                ci < end
                    && class_matches(*negated, items, self.chars[ci], self.nocase)
                    && self.match_from(tokens, ti + 1, ci + 1, end)
            }
            Token::Star => (ci..=end).any(|k| self.match_from(tokens, ti + 1, k, end)),
            Token::Ext { kind, alts } => match kind {
                ExtKind::One => self.one_then_rest(alts, tokens, ti, ci, end),
                ExtKind::ZeroOrOne => {
                    self.match_from(tokens, ti + 1, ci, end) || self.one_then_rest(alts, tokens, ti, ci, end)
                }
                ExtKind::ZeroOrMore => self.repeat(alts, tokens, ti, ci, end),
                ExtKind::OneOrMore => (ci..=end).any(|mid| {
                    self.any_alt(alts, ci, mid) && self.repeat(alts, tokens, ti, mid, end)
                }),
                ExtKind::Not => {
                    (ci..=end).any(|mid| !self.any_alt(alts, ci, mid) && self.match_from(tokens, ti + 1, mid, end))
                }
            },
        }
    }

    fn any_alt(&mut self, alts: &[Vec<Token>], start: usize, end: usize) -> bool {
        alts.iter().any(|alt| self.match_from(alt, 0, start, end))
    }

    fn one_then_rest(&mut self, alts: &[Vec<Token>], tokens: &[Token], ti: usize, ci: usize, end: usize) -> bool {
        (ci..=end).any(|mid| self.any_alt(alts, ci, mid) && self.match_from(tokens, ti + 1, mid, end))
    }

    /// Zero or more non-empty repetitions of `alts`, then `tokens[ti + 1..]`.
    fn repeat(&mut self, alts: &[Vec<Token>], tokens: &[Token], ti: usize, ci: usize, end: usize) -> bool {
        let key = (tokens.as_ptr() as usize, ti, ci, end);
        if let Some(&hit) = self.repeat_memo.get(&key) {
            return hit;
        }
        let result = self.match_from(tokens, ti + 1, ci, end)
            || (ci + 1..=end).any(|mid| self.any_alt(alts, ci, mid) && self.repeat(alts, tokens, ti, mid, end));
        self.repeat_memo.insert(key, result);
        result
    }
}

impl Pattern {
    pub fn new(pattern: &str, flags: MatchFlags) -> Self {
        let chars: Vec<char> = pattern.chars().collect();
        Self { tokens: compile(&chars, flags.extglob), flags }
    }

    /// Whole-string match.
    pub fn is_match(&self, s: &str) -> bool {
        let chars: Vec<char> = s.chars().collect();
        Matcher::new(&chars, self.flags.nocase).match_from(&self.tokens, 0, 0, chars.len())
    }

    /// Length in chars of the shortest or longest matching prefix.
    pub fn prefix_len(&self, chars: &[char], longest: bool) -> Option<usize> {
        let mut m = Matcher::new(chars, self.flags.nocase);
        let mut ends: Box<dyn Iterator<Item = usize>> =
            if longest { Box::new((0..=chars.len()).rev()) } else { Box::new(0..=chars.len()) };
        ends.find(|&end| m.match_from(&self.tokens, 0, 0, end))
    }

    /// Start (in chars) of the shortest or longest matching suffix.
    pub fn suffix_start(&self, chars: &[char], longest: bool) -> Option<usize> {
        let mut m = Matcher::new(chars, self.flags.nocase);
        let len = chars.len();
        let mut starts: Box<dyn Iterator<Item = usize>> =
            if longest { Box::new(0..=len) } else { Box::new((0..=len).rev()) };
        starts.find(|&start| m.match_from(&self.tokens, 0, start, len))
    }

    /// Earliest, then longest, non-empty match starting at or after `from`.
    /// Returns a char range.
    pub fn find(&self, chars: &[char], from: usize) -> Option<(usize, usize)> {
        let mut m = Matcher::new(chars, self.flags.nocase);
        for start in from..chars.len() {
            for end in (start + 1..=chars.len()).rev() {
                if m.match_from(&self.tokens, 0, start, end) {
                    return Some((start, end));
                }
            }
        }
        None
    }
}

/// Whole-string match of `s` against `pattern`.
pub fn matches(pattern: &str, s: &str, flags: MatchFlags) -> bool {
    Pattern::new(pattern, flags).is_match(s)
}

/// First match span as byte offsets: earliest start, longest match there.
pub fn match_span(pattern: &str, s: &str, flags: MatchFlags) -> Option<(usize, usize)> {
    let chars: Vec<char> = s.chars().collect();
    let (start, end) = Pattern::new(pattern, flags).find(&chars, 0)?;
    let byte = |ci: usize| chars[..ci].iter().map(|c| c.len_utf8()).sum::<usize>();
    Some((byte(start), byte(end)))
}

/// `${v#pat}` / `${v##pat}`
pub fn remove_prefix(value: &str, pattern: &str, longest: bool, flags: MatchFlags) -> String {
    let chars: Vec<char> = value.chars().collect();
    match Pattern::new(pattern, flags).prefix_len(&chars, longest) {
        Some(n) => chars[n..].iter().collect(),
        None => value.to_string(),
    }
}

/// `${v%pat}` / `${v%%pat}`
pub fn remove_suffix(value: &str, pattern: &str, longest: bool, flags: MatchFlags) -> String {
    let chars: Vec<char> = value.chars().collect();
    match Pattern::new(pattern, flags).suffix_start(&chars, longest) {
        Some(start) => chars[..start].iter().collect(),
        None => value.to_string(),
    }
}

/// `${v/pat/rep}` and its `//`, `/#`, `/%` forms. An empty pattern only
/// does something when anchored: it inserts at the start or end.
pub fn replace_pattern(
    value: &str,
    pattern: &str,
    replacement: &str,
    all: bool,
    anchor: Option<PatternAnchor>,
    flags: MatchFlags,
) -> String {
    let chars: Vec<char> = value.chars().collect();
    let compiled = Pattern::new(pattern, flags);
    match anchor {
        Some(PatternAnchor::Start) => match compiled.prefix_len(&chars, true) {
            Some(n) => format!("{}{}", replacement, chars[n..].iter().collect::<String>()),
            None => value.to_string(),
        },
        Some(PatternAnchor::End) => match compiled.suffix_start(&chars, true) {
            Some(start) => format!("{}{}", chars[..start].iter().collect::<String>(), replacement),
            None => value.to_string(),
        },
        None => {
            if pattern.is_empty() {
                return value.to_string();
            }
            let mut out = String::new();
            let mut pos = 0;
            while let Some((start, end)) = compiled.find(&chars, pos) {
                out.extend(&chars[pos..start]);
                out.push_str(replacement);
                pos = end;
                if !all {
                    break;
                }
            }
            out.extend(&chars[pos..]);
            out
        }
    }
}

/// Whether the text contains an unescaped glob metacharacter.
pub fn has_glob_chars(s: &str, extglob: bool) -> bool {
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '*' | '?' => return true,
            '[' if parse_class(&chars, i).is_some() => return true,
            '@' | '+' | '!' if extglob && chars.get(i + 1) == Some(&'(') => return true,
            _ => {}
        }
        i += 1;
    }
    false
}

/// Backslash-escapes every character the matcher treats specially.
pub fn escape_pattern(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\' | '(' | ')' | '|' | '@' | '+' | '!' | '^') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Removes backslash escapes, giving the literal text a pattern stands for.
pub fn unescape_pattern(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}

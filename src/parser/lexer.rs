//! Lexer for Bash Scripts
//!
//! The lexer tokenizes input into a stream of tokens that the parser consumes.
//! Words keep their raw text (quotes included); the word parser splits them
//! into parts later. It handles:
//! - Operators and delimiters
//! - Quoting and `$(...)`, `${...}`, `$((...))`, backtick nesting inside words
//! - Comments and line continuations
//! - Here-documents (bodies are attached to their delimiter token)
//! - `(( ))` arithmetic commands vs nested subshells

use crate::parser::types::{ParseException, ParseResult, MAX_INPUT_SIZE, MAX_TOKENS};

/// Token types for bash lexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    Eof,
    Newline,
    Semicolon,
    Amp, // &

    Pipe,    // |
    PipeAmp, // |&
    AndAnd,  // &&
    OrOr,    // ||

    LParen, // (
    RParen, // )

    DSemi,       // ;;
    SemiAnd,     // ;&
    SemiSemiAnd, // ;;&

    Less,      // <
    Great,     // >
    DLess,     // <<
    DGreat,    // >>
    LessAnd,   // <&
    GreatAnd,  // >&
    LessGreat, // <>
    DLessDash, // <<-
    Clobber,   // >|
    TLess,     // <<<
    AndGreat,  // &>
    AndDGreat, // &>>

    Word,
    /// Digits directly in front of a redirection operator
    IoNumber,
    /// `(( expr ))`; the value holds the expression text
    ArithCommand,
}

impl TokenType {
    pub fn is_redirection(&self) -> bool {
        matches!(
            self,
            Self::Less
                | Self::Great
                | Self::DLess
                | Self::DGreat
                | Self::LessAnd
                | Self::GreatAnd
                | Self::LessGreat
                | Self::DLessDash
                | Self::Clobber
                | Self::TLess
                | Self::AndGreat
                | Self::AndDGreat
        )
    }
}

/// Here-document body captured after the line that introduced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeredocBody {
    pub delimiter: String,
    pub content: String,
    pub quoted: bool,
    pub strip_tabs: bool,
}

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub value: String,
    pub line: usize,
    pub column: usize,
    /// For WORD tokens: the raw text contains quoting
    pub quoted: bool,
    /// For heredoc delimiter words: the captured body
    pub heredoc: Option<HeredocBody>,
}

impl Token {
    pub fn new(token_type: TokenType, value: impl Into<String>, line: usize, column: usize) -> Self {
        Self { token_type, value: value.into(), line, column, quoted: false, heredoc: None }
    }

    /// Unquoted word with exactly this text (reserved word check).
    pub fn is_word(&self, text: &str) -> bool {
        self.token_type == TokenType::Word && !self.quoted && self.value == text
    }
}

#[derive(Debug, Clone)]
struct PendingHeredoc {
    token_index: usize,
    delimiter: String,
    strip_tabs: bool,
    quoted: bool,
}

/// Three-character operators
const THREE_CHAR_OPS: &[(&str, TokenType)] = &[
    (";;&", TokenType::SemiSemiAnd),
    ("<<<", TokenType::TLess),
    ("&>>", TokenType::AndDGreat),
    ("<<-", TokenType::DLessDash),
];

/// Two-character operators
const TWO_CHAR_OPS: &[(&str, TokenType)] = &[
    ("&&", TokenType::AndAnd),
    ("||", TokenType::OrOr),
    (";;", TokenType::DSemi),
    (";&", TokenType::SemiAnd),
    ("|&", TokenType::PipeAmp),
    (">>", TokenType::DGreat),
    ("<<", TokenType::DLess),
    ("<&", TokenType::LessAnd),
    (">&", TokenType::GreatAnd),
    ("<>", TokenType::LessGreat),
    (">|", TokenType::Clobber),
    ("&>", TokenType::AndGreat),
];

const SINGLE_CHAR_OPS: &[(char, TokenType)] = &[
    ('|', TokenType::Pipe),
    ('&', TokenType::Amp),
    (';', TokenType::Semicolon),
    ('(', TokenType::LParen),
    (')', TokenType::RParen),
    ('<', TokenType::Less),
    ('>', TokenType::Great),
];

fn is_word_boundary(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | ';' | '&' | '|' | '<' | '>' | '(' | ')')
}

/// Convenience wrapper: tokenize a whole script.
pub fn tokenize(input: &str) -> ParseResult<Vec<Token>> {
    Lexer::new(input).tokenize()
}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
    pending_heredocs: Vec<PendingHeredoc>,
    expect_heredoc_delimiter: Option<bool>,
    in_dbracket: bool,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
            pending_heredocs: Vec::new(),
            expect_heredoc_delimiter: None,
            in_dbracket: false,
        }
    }

    pub fn tokenize(mut self) -> ParseResult<Vec<Token>> {
        if self.chars.len() > MAX_INPUT_SIZE {
            return Err(ParseException::new("input too large", 1, 1));
        }
        loop {
            if self.tokens.len() > MAX_TOKENS {
                return Err(ParseException::new("too many tokens", self.line, self.column));
            }
            self.skip_blanks();
            let Some(c) = self.current() else {
                if !self.pending_heredocs.is_empty() {
                    self.read_heredoc_bodies();
                }
                self.tokens.push(Token::new(TokenType::Eof, "", self.line, self.column));
                break;
            };
            let (line, column) = (self.line, self.column);

            if c == '#' {
                while let Some(c) = self.current() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
                continue;
            }

            if c == '\n' {
                self.advance();
                self.tokens.push(Token::new(TokenType::Newline, "\n", line, column));
                if !self.pending_heredocs.is_empty() {
                    self.read_heredoc_bodies();
                }
                continue;
            }

            // The operand of `=~` is a regex; `(` and `|` there are not operators.
            let regex_operand = self.in_dbracket
                && !matches!(c, ';' | '&' | ')')
                && self.tokens.last().map_or(false, |t| t.is_word("=~"));
            if regex_operand {
                let token = self.read_regex_word(line, column)?;
                self.tokens.push(token);
                continue;
            }

            if c == '(' && self.peek(1) == Some('(') && !self.in_dbracket {
                if let Some(text) = self.try_read_arith_command()? {
                    self.tokens.push(Token::new(TokenType::ArithCommand, text, line, column));
                    continue;
                }
            }

            if let Some(tt) = self.read_operator() {
                if matches!(tt, TokenType::DLess | TokenType::DLessDash) {
                    self.expect_heredoc_delimiter = Some(tt == TokenType::DLessDash);
                }
                let text = self.tokens_text_for(tt);
                self.tokens.push(Token::new(tt, text, line, column));
                continue;
            }

            if c.is_ascii_digit() {
                if let Some(digits) = self.try_read_io_number() {
                    self.tokens.push(Token::new(TokenType::IoNumber, digits, line, column));
                    continue;
                }
            }

            let token = self.read_word(line, column)?;
            if let Some(strip_tabs) = self.expect_heredoc_delimiter.take() {
                let delimiter = remove_quotes(&token.value);
                self.pending_heredocs.push(PendingHeredoc {
                    token_index: self.tokens.len(),
                    delimiter,
                    strip_tabs,
                    quoted: token.quoted,
                });
            }
            if token.is_word("[[") {
                self.in_dbracket = true;
            } else if token.is_word("]]") {
                self.in_dbracket = false;
            }
            self.tokens.push(token);
        }
        Ok(self.tokens)
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn starts_with(&self, s: &str) -> bool {
        s.chars().enumerate().all(|(i, c)| self.peek(i) == Some(c))
    }

    fn skip_blanks(&mut self) {
        loop {
            match self.current() {
                Some(' ') | Some('\t') | Some('\r') => {
                    self.advance();
                }
                Some('\\') if self.peek(1) == Some('\n') => {
                    self.advance();
                    self.advance();
                }
                _ => break,
            }
        }
    }

    fn tokens_text_for(&self, tt: TokenType) -> &'static str {
        THREE_CHAR_OPS
            .iter()
            .chain(TWO_CHAR_OPS.iter())
            .find(|(_, t)| *t == tt)
            .map(|(s, _)| *s)
            .or_else(|| match tt {
                TokenType::Pipe => Some("|"),
                TokenType::Amp => Some("&"),
                TokenType::Semicolon => Some(";"),
                TokenType::LParen => Some("("),
                TokenType::RParen => Some(")"),
                TokenType::Less => Some("<"),
                TokenType::Great => Some(">"),
                _ => None,
            })
            .unwrap_or("")
    }

    fn read_operator(&mut self) -> Option<TokenType> {
        for (text, tt) in THREE_CHAR_OPS.iter().chain(TWO_CHAR_OPS.iter()) {
            if self.starts_with(text) {
                for _ in 0..text.len() {
                    self.advance();
                }
                return Some(*tt);
            }
        }
        let c = self.current()?;
        let tt = SINGLE_CHAR_OPS.iter().find(|(ch, _)| *ch == c).map(|(_, t)| *t)?;
        self.advance();
        Some(tt)
    }

    fn try_read_io_number(&mut self) -> Option<String> {
        let mut end = self.pos;
        while end < self.chars.len() && self.chars[end].is_ascii_digit() {
            end += 1;
        }
        match self.chars.get(end) {
            Some('<') | Some('>') => {
                let digits: String = self.chars[self.pos..end].iter().collect();
                while self.pos < end {
                    self.advance();
                }
                Some(digits)
            }
            _ => None,
        }
    }

    /// `((` at a token boundary: arithmetic command unless the parens
    /// close as two separate subshells.
    fn try_read_arith_command(&mut self) -> ParseResult<Option<String>> {
        if !arith_closes_double(&self.chars, self.pos + 2) {
            return Ok(None);
        }
        let (line, column) = (self.line, self.column);
        self.advance();
        self.advance();
        let mut depth = 0usize;
        let mut text = String::new();
        loop {
            let Some(c) = self.advance() else {
                return Err(ParseException::new(
                    "unexpected EOF while looking for matching `))'",
                    line,
                    column,
                ));
            };
            match c {
                '(' => depth += 1,
                ')' if depth == 0 && self.current() == Some(')') => {
                    self.advance();
                    return Ok(Some(text));
                }
                ')' => depth = depth.saturating_sub(1),
                _ => {}
            }
            text.push(c);
        }
    }

    fn read_heredoc_bodies(&mut self) {
        let pending = std::mem::take(&mut self.pending_heredocs);
        for heredoc in pending {
            let mut content = String::new();
            loop {
                if self.current().is_none() {
                    break;
                }
                let mut line = String::new();
                while let Some(c) = self.current() {
                    if c == '\n' {
                        break;
                    }
                    line.push(c);
                    self.advance();
                }
                let had_newline = self.current() == Some('\n');
                if had_newline {
                    self.advance();
                }
                let check = if heredoc.strip_tabs { line.trim_start_matches('\t') } else { line.as_str() };
                if check == heredoc.delimiter {
                    break;
                }
                content.push_str(check);
                if had_newline {
                    content.push('\n');
                }
            }
            if let Some(tok) = self.tokens.get_mut(heredoc.token_index) {
                tok.heredoc = Some(HeredocBody {
                    delimiter: heredoc.delimiter,
                    content,
                    quoted: heredoc.quoted,
                    strip_tabs: heredoc.strip_tabs,
                });
            }
        }
    }

    fn unterminated(&self, what: &str, line: usize, column: usize) -> ParseException {
        ParseException::new(format!("unexpected EOF while looking for matching `{}'", what), line, column)
    }

    fn read_word(&mut self, line: usize, column: usize) -> ParseResult<Token> {
        let mut value = String::new();
        let mut quoted = false;

        while let Some(c) = self.current() {
            match c {
                '\\' => {
                    if self.peek(1) == Some('\n') {
                        self.advance();
                        self.advance();
                        continue;
                    }
                    quoted = true;
                    value.push(c);
                    self.advance();
                    if let Some(n) = self.advance() {
                        value.push(n);
                    }
                }
                '\'' => {
                    quoted = true;
                    self.scan_single_quoted(&mut value)?;
                }
                '"' => {
                    quoted = true;
                    self.scan_double_quoted(&mut value)?;
                }
                '$' => {
                    if self.peek(1) == Some('\'') {
                        quoted = true;
                        value.push('$');
                        self.advance();
                        self.scan_ansi_c(&mut value)?;
                    } else {
                        self.scan_dollar(&mut value)?;
                    }
                }
                '`' => self.scan_backtick(&mut value)?,
                '(' if matches!(value.chars().last(), Some('@' | '?' | '*' | '+' | '!')) => {
                    self.scan_parens(&mut value)?;
                }
                '(' if is_array_assignment_prefix(&value) => {
                    self.scan_parens(&mut value)?;
                }
                _ if is_word_boundary(c) => break,
                _ => {
                    value.push(c);
                    self.advance();
                }
            }
        }

        let mut token = Token::new(TokenType::Word, value, line, column);
        token.quoted = quoted;
        Ok(token)
    }

    /// Right-hand side of `=~`: parentheses and `|` belong to the regex.
    fn read_regex_word(&mut self, line: usize, column: usize) -> ParseResult<Token> {
        let mut value = String::new();
        let mut quoted = false;
        let mut depth = 0usize;
        while let Some(c) = self.current() {
            match c {
                '\\' => {
                    value.push(c);
                    self.advance();
                    if let Some(n) = self.advance() {
                        value.push(n);
                    }
                }
                '\'' => {
                    quoted = true;
                    self.scan_single_quoted(&mut value)?;
                }
                '"' => {
                    quoted = true;
                    self.scan_double_quoted(&mut value)?;
                }
                '$' => self.scan_dollar(&mut value)?,
                '(' => {
                    depth += 1;
                    value.push(c);
                    self.advance();
                }
                ')' if depth > 0 => {
                    depth -= 1;
                    value.push(c);
                    self.advance();
                }
                ' ' | '\t' | '\n' if depth == 0 => break,
                ';' | '&' | ')' if depth == 0 => break,
                _ => {
                    value.push(c);
                    self.advance();
                }
            }
        }
        let mut token = Token::new(TokenType::Word, value, line, column);
        token.quoted = quoted;
        Ok(token)
    }

    fn scan_single_quoted(&mut self, out: &mut String) -> ParseResult<()> {
        let (line, column) = (self.line, self.column);
        out.push('\'');
        self.advance();
        loop {
            match self.advance() {
                Some('\'') => {
                    out.push('\'');
                    return Ok(());
                }
                Some(c) => out.push(c),
                None => return Err(self.unterminated("'", line, column)),
            }
        }
    }

    fn scan_ansi_c(&mut self, out: &mut String) -> ParseResult<()> {
        let (line, column) = (self.line, self.column);
        out.push('\'');
        self.advance();
        loop {
            match self.advance() {
                Some('\\') => {
                    out.push('\\');
                    if let Some(n) = self.advance() {
                        out.push(n);
                    }
                }
                Some('\'') => {
                    out.push('\'');
                    return Ok(());
                }
                Some(c) => out.push(c),
                None => return Err(self.unterminated("'", line, column)),
            }
        }
    }

    fn scan_double_quoted(&mut self, out: &mut String) -> ParseResult<()> {
        let (line, column) = (self.line, self.column);
        out.push('"');
        self.advance();
        loop {
            match self.current() {
                None => return Err(self.unterminated("\"", line, column)),
                Some('"') => {
                    out.push('"');
                    self.advance();
                    return Ok(());
                }
                Some('\\') => {
                    out.push('\\');
                    self.advance();
                    if let Some(n) = self.advance() {
                        out.push(n);
                    }
                }
                Some('$') => self.scan_dollar(out)?,
                Some('`') => self.scan_backtick(out)?,
                Some(c) => {
                    out.push(c);
                    self.advance();
                }
            }
        }
    }

    fn scan_backtick(&mut self, out: &mut String) -> ParseResult<()> {
        let (line, column) = (self.line, self.column);
        out.push('`');
        self.advance();
        loop {
            match self.advance() {
                Some('\\') => {
                    out.push('\\');
                    if let Some(n) = self.advance() {
                        out.push(n);
                    }
                }
                Some('`') => {
                    out.push('`');
                    return Ok(());
                }
                Some(c) => out.push(c),
                None => return Err(self.unterminated("`", line, column)),
            }
        }
    }

    /// `$` at the current position: substitution forms are copied whole.
    fn scan_dollar(&mut self, out: &mut String) -> ParseResult<()> {
        match self.peek(1) {
            Some('(') if self.peek(2) == Some('(') && arith_closes_double(&self.chars, self.pos + 3) => {
                self.scan_arith_expansion(out)
            }
            Some('(') => {
                out.push('$');
                self.advance();
                self.scan_command_sub_body(out)
            }
            Some('{') => self.scan_braced(out),
            _ => {
                out.push('$');
                self.advance();
                Ok(())
            }
        }
    }

    fn scan_arith_expansion(&mut self, out: &mut String) -> ParseResult<()> {
        let (line, column) = (self.line, self.column);
        for _ in 0..3 {
            if let Some(c) = self.advance() {
                out.push(c);
            }
        }
        let mut depth = 0usize;
        loop {
            let Some(c) = self.current() else {
                return Err(self.unterminated("))", line, column));
            };
            match c {
                '(' => depth += 1,
                ')' if depth == 0 && self.peek(1) == Some(')') => {
                    out.push_str("))");
                    self.advance();
                    self.advance();
                    return Ok(());
                }
                ')' => depth = depth.saturating_sub(1),
                '$' => {
                    self.scan_dollar(out)?;
                    continue;
                }
                '"' => {
                    self.scan_double_quoted(out)?;
                    continue;
                }
                '\'' => {
                    self.scan_single_quoted(out)?;
                    continue;
                }
                _ => {}
            }
            out.push(c);
            self.advance();
        }
    }

    /// Scans `( ... )` of a command substitution; the current char is `(`.
    fn scan_command_sub_body(&mut self, out: &mut String) -> ParseResult<()> {
        let (line, column) = (self.line, self.column);
        out.push('(');
        self.advance();
        let mut depth = 1usize;
        let mut case_depth = 0usize;
        let mut bare_word = String::new();
        loop {
            let Some(c) = self.current() else {
                return Err(self.unterminated(")", line, column));
            };
            if !(c.is_ascii_alphanumeric() || c == '_') {
                match bare_word.as_str() {
                    "case" => case_depth += 1,
                    "esac" => case_depth = case_depth.saturating_sub(1),
                    _ => {}
                }
                bare_word.clear();
            }
            match c {
                '\\' => {
                    out.push(c);
                    self.advance();
                    if let Some(n) = self.advance() {
                        out.push(n);
                    }
                }
                '\'' => self.scan_single_quoted(out)?,
                '"' => self.scan_double_quoted(out)?,
                '`' => self.scan_backtick(out)?,
                '$' => self.scan_dollar(out)?,
                '#' if out.ends_with(|ch: char| ch == ' ' || ch == '\t' || ch == '\n' || ch == '(') => {
                    while let Some(ch) = self.current() {
                        if ch == '\n' {
                            break;
                        }
                        out.push(ch);
                        self.advance();
                    }
                }
                '(' => {
                    depth += 1;
                    out.push(c);
                    self.advance();
                }
                ')' => {
                    out.push(c);
                    self.advance();
                    if case_depth > 0 && depth == 1 {
                        continue;
                    }
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        bare_word.push(c);
                    }
                    out.push(c);
                    self.advance();
                }
            }
        }
    }

    fn scan_braced(&mut self, out: &mut String) -> ParseResult<()> {
        let (line, column) = (self.line, self.column);
        out.push_str("${");
        self.advance();
        self.advance();
        let mut depth = 1usize;
        loop {
            let Some(c) = self.current() else {
                return Err(self.unterminated("}", line, column));
            };
            match c {
                '\\' => {
                    out.push(c);
                    self.advance();
                    if let Some(n) = self.advance() {
                        out.push(n);
                    }
                }
                '\'' => self.scan_single_quoted(out)?,
                '"' => self.scan_double_quoted(out)?,
                '`' => self.scan_backtick(out)?,
                '$' => self.scan_dollar(out)?,
                '{' => {
                    depth += 1;
                    out.push(c);
                    self.advance();
                }
                '}' => {
                    out.push(c);
                    self.advance();
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {
                    out.push(c);
                    self.advance();
                }
            }
        }
    }

    /// Balanced `( ... )` copied into the current word (extglob groups and
    /// array literals).
    fn scan_parens(&mut self, out: &mut String) -> ParseResult<()> {
        let (line, column) = (self.line, self.column);
        let mut depth = 0usize;
        loop {
            let Some(c) = self.current() else {
                return Err(self.unterminated(")", line, column));
            };
            match c {
                '\\' => {
                    out.push(c);
                    self.advance();
                    if let Some(n) = self.advance() {
                        out.push(n);
                    }
                }
                '\'' => self.scan_single_quoted(out)?,
                '"' => self.scan_double_quoted(out)?,
                '`' => self.scan_backtick(out)?,
                '$' => self.scan_dollar(out)?,
                '(' => {
                    depth += 1;
                    out.push(c);
                    self.advance();
                }
                ')' => {
                    out.push(c);
                    self.advance();
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {
                    out.push(c);
                    self.advance();
                }
            }
        }
    }
}

/// Quoted or substituted construct whose extent the word parser needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScanKind {
    /// `$(...)`, `$((...))`, `${...}` or a bare `$`
    Dollar,
    Backtick,
    DoubleQuoted,
    SingleQuoted,
    AnsiC,
    Parens,
}

/// Number of chars taken by the construct starting at `text[0]`, using
/// the same nesting rules as tokenization.
pub(crate) fn scan_len(text: &[char], kind: ScanKind) -> ParseResult<usize> {
    let mut lexer = Lexer {
        chars: text.to_vec(),
        pos: 0,
        line: 1,
        column: 1,
        tokens: Vec::new(),
        pending_heredocs: Vec::new(),
        expect_heredoc_delimiter: None,
        in_dbracket: false,
    };
    let mut sink = String::new();
    match kind {
        ScanKind::Dollar => lexer.scan_dollar(&mut sink)?,
        ScanKind::Backtick => lexer.scan_backtick(&mut sink)?,
        ScanKind::DoubleQuoted => lexer.scan_double_quoted(&mut sink)?,
        ScanKind::SingleQuoted => lexer.scan_single_quoted(&mut sink)?,
        ScanKind::AnsiC => {
            lexer.advance();
            lexer.scan_ansi_c(&mut sink)?
        }
        ScanKind::Parens => lexer.scan_parens(&mut sink)?,
    }
    Ok(lexer.pos)
}

/// Looks ahead from just after `((` to see whether the first unmatched `)`
/// is immediately followed by another `)`.
fn arith_closes_double(chars: &[char], start: usize) -> bool {
    let mut depth = 0usize;
    let mut i = start;
    while i < chars.len() {
        match chars[i] {
            '(' => depth += 1,
            ')' => {
                if depth == 0 {
                    return chars.get(i + 1) == Some(&')');
                }
                depth -= 1;
            }
            '\'' | '"' => {
                let q = chars[i];
                i += 1;
                while i < chars.len() && chars[i] != q {
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    true
}

fn is_array_assignment_prefix(word: &str) -> bool {
    let Some(lhs) = word.strip_suffix('=') else {
        return false;
    };
    let lhs = lhs.strip_suffix('+').unwrap_or(lhs);
    crate::parser::types::is_valid_name(lhs)
}

/// Strip quoting from a heredoc delimiter word.
fn remove_quotes(raw: &str) -> String {
    let mut out = String::new();
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {}
            '\\' => {
                if let Some(n) = chars.next() {
                    out.push(n);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(input: &str) -> Vec<TokenType> {
        tokenize(input).unwrap().into_iter().map(|t| t.token_type).collect()
    }

    fn words(input: &str) -> Vec<String> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .filter(|t| t.token_type == TokenType::Word)
            .map(|t| t.value)
            .collect()
    }

    #[test]
    fn test_simple_command() {
        assert_eq!(words("echo hello world"), vec!["echo", "hello", "world"]);
        assert_eq!(types("echo hi"), vec![TokenType::Word, TokenType::Word, TokenType::Eof]);
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            types("a | b && c || d; e &"),
            vec![
                TokenType::Word,
                TokenType::Pipe,
                TokenType::Word,
                TokenType::AndAnd,
                TokenType::Word,
                TokenType::OrOr,
                TokenType::Word,
                TokenType::Semicolon,
                TokenType::Word,
                TokenType::Amp,
                TokenType::Eof
            ]
        );
        assert_eq!(types(";;&")[0], TokenType::SemiSemiAnd);
    }

    #[test]
    fn test_redirection_and_io_number() {
        let toks = tokenize("cmd 2>&1 >>out").unwrap();
        assert_eq!(toks[1].token_type, TokenType::IoNumber);
        assert_eq!(toks[1].value, "2");
        assert_eq!(toks[2].token_type, TokenType::GreatAnd);
        assert_eq!(toks[4].token_type, TokenType::DGreat);
    }

    #[test]
    fn test_quotes_stay_in_word() {
        assert_eq!(words(r#"echo "a b" 'c d' e\ f"#), vec!["echo", "\"a b\"", "'c d'", "e\\ f"]);
        let toks = tokenize("echo 'x'").unwrap();
        assert!(toks[1].quoted);
    }

    #[test]
    fn test_substitutions_are_one_word() {
        assert_eq!(words("echo $(ls -l | wc) ${x:-a b} $((1 + 2))"), vec![
            "echo",
            "$(ls -l | wc)",
            "${x:-a b}",
            "$((1 + 2))"
        ]);
        assert_eq!(words("echo `date`x"), vec!["echo", "`date`x"]);
    }

    #[test]
    fn test_arith_command_vs_subshell() {
        let toks = tokenize("(( x = 1 + 2 ))").unwrap();
        assert_eq!(toks[0].token_type, TokenType::ArithCommand);
        assert_eq!(toks[0].value.trim(), "x = 1 + 2");
        let toks = tokenize("((echo a); echo b)").unwrap();
        assert_eq!(toks[0].token_type, TokenType::LParen);
        assert_eq!(toks[1].token_type, TokenType::LParen);
    }

    #[test]
    fn test_dollar_paren_paren_subshell() {
        assert_eq!(words("echo $((echo a); (echo b))"), vec!["echo", "$((echo a); (echo b))"]);
    }

    #[test]
    fn test_heredoc_body_attached() {
        let toks = tokenize("cat <<EOF\nhello\n  world\nEOF\necho done").unwrap();
        let delim = toks.iter().find(|t| t.heredoc.is_some()).unwrap();
        let body = delim.heredoc.as_ref().unwrap();
        assert_eq!(body.content, "hello\n  world\n");
        assert!(!body.quoted);
        assert!(words("cat <<EOF\nx\nEOF\necho done").contains(&"done".to_string()));
    }

    #[test]
    fn test_heredoc_strip_tabs_and_quoted() {
        let toks = tokenize("cat <<-'END'\n\tone $x\n\tEND\n").unwrap();
        let body = toks.iter().find_map(|t| t.heredoc.clone()).unwrap();
        assert_eq!(body.content, "one $x\n");
        assert!(body.quoted);
        assert_eq!(body.delimiter, "END");
    }

    #[test]
    fn test_two_heredocs_one_line() {
        let toks = tokenize("cat <<A <<B\na\nA\nb\nB\n").unwrap();
        let bodies: Vec<_> = toks.iter().filter_map(|t| t.heredoc.clone()).collect();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[0].content, "a\n");
        assert_eq!(bodies[1].content, "b\n");
    }

    #[test]
    fn test_comment_and_continuation() {
        assert_eq!(words("echo a # trailing\necho \\\nb"), vec!["echo", "a", "echo", "b"]);
    }

    #[test]
    fn test_extglob_and_array_literal() {
        assert_eq!(words("echo @(a|b).c"), vec!["echo", "@(a|b).c"]);
        assert_eq!(words("arr=(1 2 3)"), vec!["arr=(1 2 3)"]);
    }

    #[test]
    fn test_regex_in_dbracket() {
        assert_eq!(words("[[ $x =~ ^(a|b)+$ ]]"), vec!["[[", "$x", "=~", "^(a|b)+$", "]]"]);
        assert_eq!(words("[[ ab =~ (a)(b) ]]"), vec!["[[", "ab", "=~", "(a)(b)", "]]"]);
        assert_eq!(words("[[ x =~ (x|y) ]] && echo ok"), vec!["[[", "x", "=~", "(x|y)", "]]", "echo", "ok"]);
    }

    #[test]
    fn test_unterminated_quote_errors() {
        let err = tokenize("echo 'abc").unwrap_err();
        assert!(err.message.contains("unexpected EOF"));
        assert!(tokenize("echo \"abc").is_err());
        assert!(tokenize("echo $(ls").is_err());
    }

    #[test]
    fn test_case_inside_command_substitution() {
        assert_eq!(words("echo $(case x in x) echo y;; esac)"), vec![
            "echo",
            "$(case x in x) echo y;; esac)"
        ]);
    }
}

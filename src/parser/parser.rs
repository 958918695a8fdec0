//! Recursive Descent Parser for Bash
//!
//! Consumes the lexer's token vector and builds the AST. Compound commands
//! live in `compound_parser`, `[[ ]]` in `conditional_parser`.
//!
//! Grammar (simplified):
//!   script     ::= statement*
//!   statement  ::= pipeline (('&&' | '||') pipeline)* ['&']
//!   pipeline   ::= ['!'] command ('|' command)*
//!   command    ::= simple_command | compound_command | function_def

use crate::ast::types::*;
use crate::parser::lexer::{tokenize, Token, TokenType};
use crate::parser::types::{is_valid_name, ParseException, ParseResult, MAX_PARSER_DEPTH};
use crate::parser::word_parser::{parse_word, parse_word_in, WordContext};

/// Builtins whose `name=(...)` arguments keep their raw text so the
/// builtin can parse the array literal itself.
const DECLARATION_BUILTINS: &[&str] = &["declare", "typeset", "local", "export", "readonly"];

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

/// Parse a complete script.
pub fn parse(input: &str) -> ParseResult<ScriptNode> {
    let tokens = tokenize(input)?;
    Parser::new(tokens).parse_script()
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0, depth: 0 }
    }

    // -------------------------------------------------------------------------
    // Token helpers
    // -------------------------------------------------------------------------

    pub(crate) fn current(&self) -> &Token {
        let idx = self.pos.min(self.tokens.len().saturating_sub(1));
        &self.tokens[idx]
    }

    pub(crate) fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    pub(crate) fn advance(&mut self) -> Token {
        let tok = self.current().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    pub(crate) fn check(&self, tt: TokenType) -> bool {
        self.current().token_type == tt
    }

    pub(crate) fn is_word(&self, text: &str) -> bool {
        self.current().is_word(text)
    }

    pub(crate) fn skip_newlines(&mut self) {
        while self.check(TokenType::Newline) {
            self.advance();
        }
    }

    pub(crate) fn skip_separators(&mut self) {
        while self.check(TokenType::Newline) || self.check(TokenType::Semicolon) {
            self.advance();
        }
    }

    pub(crate) fn unexpected(&self) -> ParseException {
        let tok = self.current();
        match tok.token_type {
            TokenType::Eof => ParseException::unexpected_eof(tok.line, tok.column),
            TokenType::Newline => ParseException::unexpected("newline", tok.line, tok.column),
            TokenType::ArithCommand => ParseException::unexpected("((", tok.line, tok.column),
            _ => ParseException::unexpected(&tok.value, tok.line, tok.column),
        }
    }

    pub(crate) fn expect_word(&mut self, text: &str) -> ParseResult<()> {
        if self.is_word(text) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    pub(crate) fn expect(&mut self, tt: TokenType) -> ParseResult<Token> {
        if self.check(tt) {
            Ok(self.advance())
        } else {
            Err(self.unexpected())
        }
    }

    pub(crate) fn word_from_token(&self, tok: &Token) -> ParseResult<WordNode> {
        parse_word(&tok.value, tok.line)
    }

    // -------------------------------------------------------------------------
    // Script, statements, pipelines
    // -------------------------------------------------------------------------

    pub fn parse_script(&mut self) -> ParseResult<ScriptNode> {
        let mut statements = Vec::new();
        self.skip_separators();
        while !self.check(TokenType::Eof) {
            statements.push(self.parse_statement()?);
            match self.current().token_type {
                TokenType::Semicolon | TokenType::Newline => self.skip_separators(),
                TokenType::Eof => {}
                _ if statements.last().map_or(false, |s| s.background) => self.skip_separators(),
                _ => return Err(self.unexpected()),
            }
        }
        Ok(ScriptNode { statements })
    }

    /// Statements up to one of the terminator words (or `)`, `;;`, EOF).
    pub(crate) fn parse_compound_list(&mut self, terminators: &[&str]) -> ParseResult<Vec<StatementNode>> {
        let mut statements = Vec::new();
        self.skip_separators();
        loop {
            if self.at_list_end(terminators) {
                break;
            }
            statements.push(self.parse_statement()?);
            match self.current().token_type {
                TokenType::Semicolon | TokenType::Newline => self.skip_separators(),
                _ if statements.last().map_or(false, |s| s.background) => self.skip_separators(),
                _ if self.at_list_end(terminators) => break,
                _ => return Err(self.unexpected()),
            }
        }
        Ok(statements)
    }

    fn at_list_end(&self, terminators: &[&str]) -> bool {
        let tok = self.current();
        match tok.token_type {
            TokenType::Eof
            | TokenType::RParen
            | TokenType::DSemi
            | TokenType::SemiAnd
            | TokenType::SemiSemiAnd => true,
            TokenType::Word => terminators.iter().any(|t| tok.is_word(t)),
            _ => false,
        }
    }

    pub(crate) fn parse_statement(&mut self) -> ParseResult<StatementNode> {
        let line = self.current().line;
        let mut pipelines = vec![self.parse_pipeline()?];
        let mut operators = Vec::new();
        loop {
            let op = match self.current().token_type {
                TokenType::AndAnd => StatementOperator::And,
                TokenType::OrOr => StatementOperator::Or,
                _ => break,
            };
            self.advance();
            self.skip_newlines();
            operators.push(op);
            pipelines.push(self.parse_pipeline()?);
        }
        let background = if self.check(TokenType::Amp) {
            self.advance();
            true
        } else {
            false
        };
        Ok(StatementNode { pipelines, operators, background, line })
    }

    fn parse_pipeline(&mut self) -> ParseResult<PipelineNode> {
        let mut negated = false;
        while self.is_word("!") {
            self.advance();
            negated = !negated;
        }
        let mut commands = vec![self.parse_command()?];
        let mut pipe_stderr = Vec::new();
        while self.check(TokenType::Pipe) || self.check(TokenType::PipeAmp) {
            pipe_stderr.push(self.check(TokenType::PipeAmp));
            self.advance();
            self.skip_newlines();
            commands.push(self.parse_command()?);
        }
        Ok(PipelineNode { commands, negated, pipe_stderr })
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    fn parse_command(&mut self) -> ParseResult<CommandNode> {
        if self.depth >= MAX_PARSER_DEPTH {
            let tok = self.current();
            return Err(ParseException::new("maximum nesting depth exceeded", tok.line, tok.column));
        }
        self.depth += 1;
        let result = self.parse_command_inner();
        self.depth -= 1;
        result
    }

    fn parse_command_inner(&mut self) -> ParseResult<CommandNode> {
        let tok = self.current().clone();
        let compound = match tok.token_type {
            TokenType::ArithCommand => Some(self.parse_arithmetic_command()?),
            TokenType::LParen => Some(self.parse_subshell()?),
            TokenType::Word if !tok.quoted => match tok.value.as_str() {
                "if" => Some(self.parse_if()?),
                "while" => Some(self.parse_while(false)?),
                "until" => Some(self.parse_while(true)?),
                "for" => Some(self.parse_for()?),
                "case" => Some(self.parse_case()?),
                "{" => Some(self.parse_group()?),
                "[[" => Some(self.parse_conditional_command()?),
                "function" => return self.parse_function_keyword(),
                "then" | "else" | "elif" | "fi" | "do" | "done" | "esac" | "}" | "in" | "]]" => {
                    return Err(self.unexpected())
                }
                _ => None,
            },
            _ => None,
        };

        if let Some(mut compound) = compound {
            let redirections = self.parse_trailing_redirections()?;
            compound.redirections_mut().extend(redirections);
            return Ok(CommandNode::Compound(compound));
        }

        if tok.token_type == TokenType::Word
            && !tok.quoted
            && is_valid_function_name(&tok.value)
            && self.peek_at(1).map_or(false, |t| t.token_type == TokenType::LParen)
            && self.peek_at(2).map_or(false, |t| t.token_type == TokenType::RParen)
        {
            self.advance();
            self.advance();
            self.advance();
            return self.parse_function_body(tok.value);
        }

        self.parse_simple_command().map(CommandNode::Simple)
    }

    fn parse_function_keyword(&mut self) -> ParseResult<CommandNode> {
        self.advance();
        let name_tok = self.current().clone();
        if name_tok.token_type != TokenType::Word || !is_valid_function_name(&name_tok.value) {
            return Err(self.unexpected());
        }
        self.advance();
        if self.check(TokenType::LParen) {
            self.advance();
            self.expect(TokenType::RParen)?;
        }
        self.parse_function_body(name_tok.value)
    }

    fn parse_function_body(&mut self, name: String) -> ParseResult<CommandNode> {
        self.skip_newlines();
        match self.parse_command()? {
            CommandNode::Compound(mut body) => {
                let redirections = std::mem::take(body.redirections_mut());
                Ok(CommandNode::FunctionDef(FunctionDefNode { name, body: Box::new(body), redirections }))
            }
            _ => {
                let tok = self.current();
                Err(ParseException::new(
                    format!("syntax error: function body for `{}' must be a compound command", name),
                    tok.line,
                    tok.column,
                ))
            }
        }
    }

    fn parse_simple_command(&mut self) -> ParseResult<SimpleCommandNode> {
        let line = self.current().line;
        let mut node = SimpleCommandNode { line, ..Default::default() };
        let mut declaration = false;

        loop {
            let tok = self.current().clone();
            match tok.token_type {
                TokenType::IoNumber => {
                    let redirection = self.parse_redirection()?;
                    node.redirections.push(redirection);
                }
                t if t.is_redirection() => {
                    let redirection = self.parse_redirection()?;
                    node.redirections.push(redirection);
                }
                TokenType::Word => {
                    if node.words.is_empty() {
                        if let Some(assignment) = self.try_parse_assignment(&tok)? {
                            self.advance();
                            node.assignments.push(assignment);
                            continue;
                        }
                        declaration = !tok.quoted && DECLARATION_BUILTINS.contains(&tok.value.as_str());
                    }
                    self.advance();
                    if declaration && split_assignment_word(&tok.value).map_or(false, |(_, _, v)| is_array_literal(v)) {
                        node.words.push(WordNode::literal(tok.value.clone()));
                    } else {
                        node.words.push(self.word_from_token(&tok)?);
                    }
                }
                _ => break,
            }
        }

        if node.words.is_empty() && node.assignments.is_empty() && node.redirections.is_empty() {
            return Err(self.unexpected());
        }
        Ok(node)
    }

    fn try_parse_assignment(&self, tok: &Token) -> ParseResult<Option<AssignmentNode>> {
        let Some((lhs, append, value)) = split_assignment_word(&tok.value) else {
            return Ok(None);
        };
        let (name, index) = match lhs.find('[') {
            Some(open) => (lhs[..open].to_string(), Some(lhs[open + 1..lhs.len() - 1].to_string())),
            None => (lhs.to_string(), None),
        };
        if index.is_none() && is_array_literal(value) {
            let elements = parse_array_literal(&value[1..value.len() - 1], tok.line)?;
            return Ok(Some(AssignmentNode { name, index, value: None, append, array: Some(elements) }));
        }
        let value = parse_word_in(value, tok.line, WordContext::Assignment)?;
        Ok(Some(AssignmentNode { name, index, value: Some(value), append, array: None }))
    }

    pub(crate) fn parse_trailing_redirections(&mut self) -> ParseResult<Vec<RedirectionNode>> {
        let mut redirections = Vec::new();
        while self.check(TokenType::IoNumber) || self.current().token_type.is_redirection() {
            redirections.push(self.parse_redirection()?);
        }
        Ok(redirections)
    }

    fn parse_redirection(&mut self) -> ParseResult<RedirectionNode> {
        let mut fd = None;
        if self.check(TokenType::IoNumber) {
            let tok = self.advance();
            fd = tok.value.parse::<i32>().ok();
        }
        let op_tok = self.advance();
        let operator = match op_tok.token_type {
            TokenType::Less => RedirectionOperator::Less,
            TokenType::Great => RedirectionOperator::Great,
            TokenType::DGreat => RedirectionOperator::DGreat,
            TokenType::GreatAnd => RedirectionOperator::GreatAnd,
            TokenType::LessAnd => RedirectionOperator::LessAnd,
            TokenType::LessGreat => RedirectionOperator::LessGreat,
            TokenType::Clobber => RedirectionOperator::Clobber,
            TokenType::AndGreat => RedirectionOperator::AndGreat,
            TokenType::AndDGreat => RedirectionOperator::AndDGreat,
            TokenType::TLess => RedirectionOperator::TLess,
            TokenType::DLess => RedirectionOperator::DLess,
            TokenType::DLessDash => RedirectionOperator::DLessDash,
            _ => return Err(ParseException::unexpected(&op_tok.value, op_tok.line, op_tok.column)),
        };
        if !self.check(TokenType::Word) {
            return Err(self.unexpected());
        }
        let target_tok = self.advance();

        if matches!(operator, RedirectionOperator::DLess | RedirectionOperator::DLessDash) {
            let body = target_tok.heredoc.clone().unwrap_or_else(|| crate::parser::lexer::HeredocBody {
                delimiter: target_tok.value.clone(),
                content: String::new(),
                quoted: target_tok.quoted,
                strip_tabs: operator == RedirectionOperator::DLessDash,
            });
            let content = if body.quoted {
                WordNode { parts: vec![WordPart::SingleQuoted(body.content.clone())] }
            } else {
                parse_word_in(&body.content, target_tok.line, WordContext::Heredoc)?
            };
            return Ok(RedirectionNode {
                fd,
                operator,
                target: RedirectionTarget::HereDoc(HereDocNode {
                    delimiter: body.delimiter,
                    content,
                    strip_tabs: body.strip_tabs,
                    quoted: body.quoted,
                }),
            });
        }

        let word = self.word_from_token(&target_tok)?;
        Ok(RedirectionNode { fd, operator, target: RedirectionTarget::Word(word) })
    }
}

fn is_valid_function_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(['$', '=', '/', '\'', '"', '`', '\\'])
        && !crate::parser::types::RESERVED_WORDS.contains(&name)
        && !name.chars().all(|c| c.is_ascii_digit())
}

/// `name=`, `name+=`, `name[sub]=` prefix of an assignment word.
/// Returns (lhs, append, value).
pub(crate) fn split_assignment_word(raw: &str) -> Option<(&str, bool, &str)> {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
    }
    if i == 0 || !is_valid_name(&raw[..i]) {
        return None;
    }
    if i < bytes.len() && bytes[i] == b'[' {
        let mut depth = 0usize;
        let mut j = i;
        while j < bytes.len() {
            match bytes[j] {
                b'[' => depth += 1,
                b']' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            j += 1;
        }
        if j >= bytes.len() {
            return None;
        }
        i = j + 1;
    }
    let lhs_end = i;
    let append = bytes.get(i) == Some(&b'+');
    if append {
        i += 1;
    }
    if bytes.get(i) != Some(&b'=') {
        return None;
    }
    Some((&raw[..lhs_end], append, &raw[i + 1..]))
}

fn is_array_literal(value: &str) -> bool {
    value.len() >= 2 && value.starts_with('(') && value.ends_with(')')
}

/// Parses the inside of `name=( ... )` into elements.
pub fn parse_array_literal(inner: &str, line: usize) -> ParseResult<Vec<ArrayElementNode>> {
    let tokens = tokenize(inner)?;
    let mut elements = Vec::new();
    for tok in tokens {
        match tok.token_type {
            TokenType::Word => {
                if tok.value.starts_with('[') {
                    if let Some((key, append, value)) = split_keyed_element(&tok.value) {
                        elements.push(ArrayElementNode {
                            key: Some(key.to_string()),
                            value: parse_word_in(value, line, WordContext::Assignment)?,
                            append,
                        });
                        continue;
                    }
                }
                elements.push(ArrayElementNode { key: None, value: parse_word(&tok.value, line)?, append: false });
            }
            TokenType::Newline | TokenType::Eof => {}
            _ => return Err(ParseException::unexpected(&tok.value, line, tok.column)),
        }
    }
    Ok(elements)
}

/// `[key]=value` or `[key]+=value`
fn split_keyed_element(raw: &str) -> Option<(&str, bool, &str)> {
    let close = raw.find("]")?;
    let key = &raw[1..close];
    let rest = &raw[close + 1..];
    if let Some(value) = rest.strip_prefix("+=") {
        return Some((key, true, value));
    }
    rest.strip_prefix('=').map(|value| (key, false, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn simple(script: &ScriptNode, idx: usize) -> &SimpleCommandNode {
        match &script.statements[idx].pipelines[0].commands[0] {
            CommandNode::Simple(s) => s,
            other => panic!("expected simple command, got {:?}", other),
        }
    }

    #[test]
    fn test_simple_command_words() {
        let ast = parse("echo hello world").unwrap();
        let cmd = simple(&ast, 0);
        assert_eq!(cmd.words.len(), 3);
        assert_eq!(cmd.words[0].as_plain_literal().as_deref(), Some("echo"));
    }

    #[test]
    fn test_lists_and_pipelines() {
        let ast = parse("a | b |& c && d || e; f &\ng").unwrap();
        assert_eq!(ast.statements.len(), 3);
        let first = &ast.statements[0];
        assert_eq!(first.pipelines[0].commands.len(), 3);
        assert_eq!(first.pipelines[0].pipe_stderr, vec![false, true]);
        assert_eq!(first.operators, vec![StatementOperator::And, StatementOperator::Or]);
        assert!(ast.statements[1].background);
    }

    #[test]
    fn test_negated_pipeline() {
        let ast = parse("! false | true").unwrap();
        assert!(ast.statements[0].pipelines[0].negated);
    }

    #[test]
    fn test_assignments() {
        let ast = parse("A=1 B+=2 C[3]=x cmd arg=4").unwrap();
        let cmd = simple(&ast, 0);
        assert_eq!(cmd.assignments.len(), 3);
        assert!(cmd.assignments[1].append);
        assert_eq!(cmd.assignments[2].index.as_deref(), Some("3"));
        assert_eq!(cmd.words.len(), 2);
    }

    #[test]
    fn test_array_assignment() {
        let ast = parse("arr=(one \"two three\" [5]=five)").unwrap();
        let cmd = simple(&ast, 0);
        let elems = cmd.assignments[0].array.as_ref().unwrap();
        assert_eq!(elems.len(), 3);
        assert_eq!(elems[2].key.as_deref(), Some("5"));
    }

    #[test]
    fn test_declaration_keeps_array_literal_raw() {
        let ast = parse("declare -a arr=(1 2)").unwrap();
        let cmd = simple(&ast, 0);
        assert_eq!(cmd.words[2], WordNode::literal("arr=(1 2)"));
    }

    #[test]
    fn test_redirections() {
        let ast = parse("cmd >out 2>&1 <in").unwrap();
        let cmd = simple(&ast, 0);
        assert_eq!(cmd.redirections.len(), 3);
        assert_eq!(cmd.redirections[1].fd, Some(2));
        assert_eq!(cmd.redirections[1].operator, RedirectionOperator::GreatAnd);
    }

    #[test]
    fn test_heredoc_redirection() {
        let ast = parse("cat <<EOF\nhi $x\nEOF\n").unwrap();
        let cmd = simple(&ast, 0);
        match &cmd.redirections[0].target {
            RedirectionTarget::HereDoc(h) => {
                assert!(!h.quoted);
                assert_eq!(h.content.parts.len(), 3);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_function_definitions() {
        let ast = parse("f() { echo a; }\nfunction g { echo b; } > out").unwrap();
        match &ast.statements[1].pipelines[0].commands[0] {
            CommandNode::FunctionDef(f) => {
                assert_eq!(f.name, "g");
                assert_eq!(f.redirections.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse("if true; then echo").unwrap_err().message.contains("unexpected end of file"));
        assert!(parse("echo a; fi").unwrap_err().message.contains("`fi'"));
        assert!(parse("| echo").is_err());
        assert!(parse("echo >").is_err());
    }

    #[test]
    fn test_split_assignment_word() {
        assert_eq!(split_assignment_word("a=1"), Some(("a", false, "1")));
        assert_eq!(split_assignment_word("a+=1"), Some(("a", true, "1")));
        assert_eq!(split_assignment_word("a[x+1]=1"), Some(("a[x+1]", false, "1")));
        assert_eq!(split_assignment_word("1a=1"), None);
        assert_eq!(split_assignment_word("a"), None);
    }
}

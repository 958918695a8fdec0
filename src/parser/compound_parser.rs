//! Compound Command Parser
//!
//! if, while/until, for (both forms), case, `{ }`, `( )` and `(( ))`.

use crate::ast::types::*;
use crate::parser::lexer::TokenType;
use crate::parser::parser::Parser;
use crate::parser::types::{is_valid_name, ParseException, ParseResult};

impl Parser {
    /// Like `parse_compound_list` but rejects an empty body.
    fn parse_required_list(&mut self, terminators: &[&str]) -> ParseResult<Vec<StatementNode>> {
        let body = self.parse_compound_list(terminators)?;
        if body.is_empty() {
            return Err(self.unexpected());
        }
        Ok(body)
    }

    pub(crate) fn parse_if(&mut self) -> ParseResult<CompoundCommandNode> {
        self.expect_word("if")?;
        let mut clauses = Vec::new();
        let condition = self.parse_required_list(&["then"])?;
        self.expect_word("then")?;
        let body = self.parse_required_list(&["elif", "else", "fi"])?;
        clauses.push(IfClause { condition, body });

        let mut else_body = None;
        loop {
            if self.is_word("elif") {
                self.advance();
                let condition = self.parse_required_list(&["then"])?;
                self.expect_word("then")?;
                let body = self.parse_required_list(&["elif", "else", "fi"])?;
                clauses.push(IfClause { condition, body });
            } else if self.is_word("else") {
                self.advance();
                else_body = Some(self.parse_required_list(&["fi"])?);
            } else {
                break;
            }
        }
        self.expect_word("fi")?;
        Ok(CompoundCommandNode::If(IfNode { clauses, else_body, redirections: Vec::new() }))
    }

    pub(crate) fn parse_while(&mut self, until: bool) -> ParseResult<CompoundCommandNode> {
        self.advance();
        let condition = self.parse_required_list(&["do"])?;
        let body = self.parse_do_group()?;
        let node = WhileNode { condition, body, redirections: Vec::new() };
        Ok(if until { CompoundCommandNode::Until(node) } else { CompoundCommandNode::While(node) })
    }

    /// `do list done`, or a `{ list }` group as bash also accepts.
    fn parse_do_group(&mut self) -> ParseResult<Vec<StatementNode>> {
        self.skip_separators();
        if self.is_word("{") {
            self.advance();
            let body = self.parse_required_list(&["}"])?;
            self.expect_word("}")?;
            return Ok(body);
        }
        self.expect_word("do")?;
        let body = self.parse_required_list(&["done"])?;
        self.expect_word("done")?;
        Ok(body)
    }

    pub(crate) fn parse_for(&mut self) -> ParseResult<CompoundCommandNode> {
        self.expect_word("for")?;

        if self.check(TokenType::ArithCommand) {
            let tok = self.advance();
            let parts = split_c_for_header(&tok.value);
            if parts.len() != 3 {
                return Err(ParseException::new(
                    format!("syntax error: arithmetic expression required in for (( {} ))", tok.value.trim()),
                    tok.line,
                    tok.column,
                ));
            }
            let clause = |s: &str| {
                let t = s.trim();
                if t.is_empty() {
                    None
                } else {
                    Some(t.to_string())
                }
            };
            let (init, condition, update) = (clause(&parts[0]), clause(&parts[1]), clause(&parts[2]));
            let body = self.parse_do_group()?;
            return Ok(CompoundCommandNode::CStyleFor(CStyleForNode {
                init,
                condition,
                update,
                body,
                redirections: Vec::new(),
                line: tok.line,
            }));
        }

        let name_tok = self.current().clone();
        if name_tok.token_type != TokenType::Word || !is_valid_name(&name_tok.value) {
            return Err(ParseException::new(
                format!("`{}': not a valid identifier", name_tok.value),
                name_tok.line,
                name_tok.column,
            ));
        }
        self.advance();
        self.skip_newlines();

        let mut words = None;
        if self.is_word("in") {
            self.advance();
            let mut list = Vec::new();
            while self.check(TokenType::Word) {
                let tok = self.advance();
                list.push(self.word_from_token(&tok)?);
            }
            words = Some(list);
            if !(self.check(TokenType::Semicolon) || self.check(TokenType::Newline)) {
                return Err(self.unexpected());
            }
        }

        let body = self.parse_do_group()?;
        Ok(CompoundCommandNode::For(ForNode { variable: name_tok.value, words, body, redirections: Vec::new() }))
    }

    pub(crate) fn parse_case(&mut self) -> ParseResult<CompoundCommandNode> {
        self.expect_word("case")?;
        if !self.check(TokenType::Word) {
            return Err(self.unexpected());
        }
        let word_tok = self.advance();
        let word = self.word_from_token(&word_tok)?;
        self.skip_newlines();
        self.expect_word("in")?;
        self.skip_separators();

        let mut items = Vec::new();
        while !self.is_word("esac") {
            if self.check(TokenType::Eof) {
                return Err(self.unexpected());
            }
            if self.check(TokenType::LParen) {
                self.advance();
            }
            let mut patterns = Vec::new();
            loop {
                if !self.check(TokenType::Word) {
                    return Err(self.unexpected());
                }
                let tok = self.advance();
                patterns.push(self.word_from_token(&tok)?);
                if self.check(TokenType::Pipe) {
                    self.advance();
                    continue;
                }
                break;
            }
            self.expect(TokenType::RParen)?;

            let body = self.parse_compound_list(&["esac"])?;
            let terminator = match self.current().token_type {
                TokenType::DSemi => CaseTerminator::DoubleSemi,
                TokenType::SemiAnd => CaseTerminator::SemiAnd,
                TokenType::SemiSemiAnd => CaseTerminator::SemiSemiAnd,
                _ if self.is_word("esac") => {
                    items.push(CaseItemNode { patterns, body, terminator: CaseTerminator::DoubleSemi });
                    break;
                }
                _ => return Err(self.unexpected()),
            };
            self.advance();
            self.skip_separators();
            items.push(CaseItemNode { patterns, body, terminator });
        }
        self.expect_word("esac")?;
        Ok(CompoundCommandNode::Case(CaseNode { word, items, redirections: Vec::new() }))
    }

    pub(crate) fn parse_group(&mut self) -> ParseResult<CompoundCommandNode> {
        self.expect_word("{")?;
        let body = self.parse_required_list(&["}"])?;
        self.expect_word("}")?;
        Ok(CompoundCommandNode::Group(BlockNode { body, redirections: Vec::new() }))
    }

    pub(crate) fn parse_subshell(&mut self) -> ParseResult<CompoundCommandNode> {
        self.expect(TokenType::LParen)?;
        let body = self.parse_required_list(&[])?;
        self.expect(TokenType::RParen)?;
        Ok(CompoundCommandNode::Subshell(BlockNode { body, redirections: Vec::new() }))
    }

    pub(crate) fn parse_arithmetic_command(&mut self) -> ParseResult<CompoundCommandNode> {
        let tok = self.expect(TokenType::ArithCommand)?;
        Ok(CompoundCommandNode::Arithmetic(ArithmeticCommandNode {
            expression: tok.value,
            redirections: Vec::new(),
            line: tok.line,
        }))
    }
}

/// Split `init; cond; update` on top-level semicolons.
fn split_c_for_header(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in text.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ';' if depth == 0 => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    parts.push(current);
    parts
}

#[cfg(test)]
mod tests {
    use crate::ast::types::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn compound(src: &str) -> CompoundCommandNode {
        let ast = parse(src).unwrap();
        match ast.statements[0].pipelines[0].commands[0].clone() {
            CommandNode::Compound(c) => c,
            other => panic!("expected compound, got {:?}", other),
        }
    }

    #[test]
    fn test_if_elif_else() {
        match compound("if a; then b; elif c; then d; else e; fi") {
            CompoundCommandNode::If(node) => {
                assert_eq!(node.clauses.len(), 2);
                assert!(node.else_body.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_while_and_until() {
        assert!(matches!(compound("while true; do break; done"), CompoundCommandNode::While(_)));
        assert!(matches!(compound("until false\ndo\n:\ndone"), CompoundCommandNode::Until(_)));
    }

    #[test]
    fn test_for_forms() {
        match compound("for x in a b c; do echo $x; done") {
            CompoundCommandNode::For(node) => {
                assert_eq!(node.variable, "x");
                assert_eq!(node.words.unwrap().len(), 3);
            }
            other => panic!("unexpected {:?}", other),
        }
        match compound("for x; do :; done") {
            CompoundCommandNode::For(node) => assert!(node.words.is_none()),
            other => panic!("unexpected {:?}", other),
        }
        match compound("for ((i=0; i<3; i++)); do :; done") {
            CompoundCommandNode::CStyleFor(node) => {
                assert_eq!(node.init.as_deref(), Some("i=0"));
                assert_eq!(node.condition.as_deref(), Some("i<3"));
                assert_eq!(node.update.as_deref(), Some("i++"));
            }
            other => panic!("unexpected {:?}", other),
        }
        match compound("for ((;;)); do break; done") {
            CompoundCommandNode::CStyleFor(node) => assert!(node.condition.is_none()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_case_terminators() {
        match compound("case $x in a|b) echo 1;; (c) echo 2;& d) echo 3;;& *) echo 4\nesac") {
            CompoundCommandNode::Case(node) => {
                assert_eq!(node.items.len(), 4);
                assert_eq!(node.items[0].patterns.len(), 2);
                assert_eq!(node.items[1].terminator, CaseTerminator::SemiAnd);
                assert_eq!(node.items[2].terminator, CaseTerminator::SemiSemiAnd);
                assert_eq!(node.items[3].terminator, CaseTerminator::DoubleSemi);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_empty_case() {
        match compound("case x in esac") {
            CompoundCommandNode::Case(node) => assert!(node.items.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_group_subshell_redirections() {
        match compound("{ echo a; echo b; } > out 2>&1") {
            CompoundCommandNode::Group(block) => {
                assert_eq!(block.body.len(), 2);
                assert_eq!(block.redirections.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(compound("(cd /tmp; pwd)"), CompoundCommandNode::Subshell(_)));
    }

    #[test]
    fn test_arithmetic_command() {
        match compound("(( x += 2 ))") {
            CompoundCommandNode::Arithmetic(node) => assert_eq!(node.expression.trim(), "x += 2"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_compound_errors() {
        assert!(parse("if; then :; fi").is_err());
        assert!(parse("while true; do done").is_err());
        assert!(parse("for 1x in a; do :; done").is_err());
        assert!(parse("case x in a) echo").is_err());
        assert!(parse("{ echo a").is_err());
    }
}

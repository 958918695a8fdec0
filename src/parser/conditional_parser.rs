//! Conditional Expression Parser
//!
//! Handles `[[ ... ]]` conditional commands. Precedence, loosest first:
//! `||`, `&&`, `!`, then primaries (groups, unary tests, binary tests, bare words).

use crate::ast::types::*;
use crate::parser::lexer::TokenType;
use crate::parser::parser::Parser;
use crate::parser::types::{ParseException, ParseResult};

pub const UNARY_OPS: &[&str] = &[
    "-a", "-b", "-c", "-d", "-e", "-f", "-g", "-h", "-k", "-p", "-r", "-s", "-t", "-u", "-w",
    "-x", "-G", "-L", "-N", "-O", "-S", "-z", "-n", "-o", "-v", "-R",
];

pub const BINARY_OPS: &[&str] = &[
    "==", "=", "!=", "=~", "<", ">", "-eq", "-ne", "-lt", "-le", "-gt", "-ge", "-nt", "-ot", "-ef",
];

impl Parser {
    pub(crate) fn parse_conditional_command(&mut self) -> ParseResult<CompoundCommandNode> {
        let start = self.expect(TokenType::Word)?;
        self.skip_newlines();
        if self.is_word("]]") {
            return Err(self.unexpected());
        }
        let expression = self.parse_cond_or()?;
        self.skip_newlines();
        if !self.is_word("]]") {
            let tok = self.current();
            if tok.token_type == TokenType::Eof {
                return Err(ParseException::unexpected_eof(tok.line, tok.column));
            }
            return Err(ParseException::new(
                format!("syntax error in conditional expression: unexpected token `{}'", tok.value),
                tok.line,
                tok.column,
            ));
        }
        self.advance();
        Ok(CompoundCommandNode::Conditional(ConditionalCommandNode {
            expression,
            redirections: Vec::new(),
            line: start.line,
        }))
    }

    fn parse_cond_or(&mut self) -> ParseResult<ConditionalExpressionNode> {
        let mut left = self.parse_cond_and()?;
        while self.check(TokenType::OrOr) {
            self.advance();
            self.skip_newlines();
            let right = self.parse_cond_and()?;
            left = ConditionalExpressionNode::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_cond_and(&mut self) -> ParseResult<ConditionalExpressionNode> {
        let mut left = self.parse_cond_not()?;
        while self.check(TokenType::AndAnd) {
            self.advance();
            self.skip_newlines();
            let right = self.parse_cond_not()?;
            left = ConditionalExpressionNode::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_cond_not(&mut self) -> ParseResult<ConditionalExpressionNode> {
        if self.is_word("!") {
            self.advance();
            let inner = self.parse_cond_not()?;
            return Ok(ConditionalExpressionNode::Not(Box::new(inner)));
        }
        self.parse_cond_primary()
    }

    fn parse_cond_primary(&mut self) -> ParseResult<ConditionalExpressionNode> {
        if self.check(TokenType::LParen) {
            self.advance();
            let inner = self.parse_cond_or()?;
            self.expect(TokenType::RParen)?;
            return Ok(ConditionalExpressionNode::Group(Box::new(inner)));
        }

        let tok = self.current().clone();
        if tok.token_type != TokenType::Word || tok.is_word("]]") {
            return Err(self.unexpected());
        }

        if !tok.quoted && UNARY_OPS.contains(&tok.value.as_str()) {
            let operand_follows = self
                .peek_at(1)
                .map_or(false, |t| t.token_type == TokenType::Word && !t.is_word("]]"));
            if operand_follows {
                self.advance();
                let operand_tok = self.advance();
                let operand = self.word_from_token(&operand_tok)?;
                return Ok(ConditionalExpressionNode::Unary { operator: tok.value, operand });
            }
        }

        self.advance();
        let left = self.word_from_token(&tok)?;

        let op = match self.current().token_type {
            TokenType::Less => Some("<".to_string()),
            TokenType::Great => Some(">".to_string()),
            TokenType::Word => {
                let cur = self.current();
                if !cur.quoted && BINARY_OPS.contains(&cur.value.as_str()) {
                    Some(cur.value.clone())
                } else {
                    None
                }
            }
            _ => None,
        };

        let Some(operator) = op else {
            return Ok(ConditionalExpressionNode::Word(left));
        };
        self.advance();
        let right_tok = self.current().clone();
        if right_tok.token_type != TokenType::Word || right_tok.is_word("]]") {
            return Err(ParseException::new(
                format!("unexpected argument `{}' to conditional binary operator", right_tok.value),
                right_tok.line,
                right_tok.column,
            ));
        }
        self.advance();
        let right = self.word_from_token(&right_tok)?;
        Ok(ConditionalExpressionNode::Binary { operator, left, right })
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::types::*;
    use crate::parser::parse;

    fn cond(src: &str) -> ConditionalExpressionNode {
        let ast = parse(src).unwrap();
        match ast.statements[0].pipelines[0].commands[0].clone() {
            CommandNode::Compound(CompoundCommandNode::Conditional(c)) => c.expression,
            other => panic!("expected conditional, got {:?}", other),
        }
    }

    #[test]
    fn test_unary_and_binary() {
        assert!(matches!(cond("[[ -f /etc/passwd ]]"), ConditionalExpressionNode::Unary { .. }));
        match cond("[[ $a == b* ]]") {
            ConditionalExpressionNode::Binary { operator, .. } => assert_eq!(operator, "=="),
            other => panic!("unexpected {:?}", other),
        }
        match cond("[[ a < b ]]") {
            ConditionalExpressionNode::Binary { operator, .. } => assert_eq!(operator, "<"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_logical_precedence() {
        match cond("[[ a || b && c ]]") {
            ConditionalExpressionNode::Or(_, right) => {
                assert!(matches!(*right, ConditionalExpressionNode::And(_, _)))
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(cond("[[ ! ( -n x ) ]]"), ConditionalExpressionNode::Not(_)));
    }

    #[test]
    fn test_bare_word_and_operator_as_operand() {
        assert!(matches!(cond("[[ -n ]]"), ConditionalExpressionNode::Word(_)));
        assert!(matches!(cond("[[ foo ]]"), ConditionalExpressionNode::Word(_)));
    }

    #[test]
    fn test_regex_operand() {
        match cond("[[ $x =~ ^(a|b)+$ ]]") {
            ConditionalExpressionNode::Binary { operator, right, .. } => {
                assert_eq!(operator, "=~");
                assert!(!right.parts.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_conditional_errors() {
        assert!(parse("[[ ]]").is_err());
        assert!(parse("[[ a == ]]").is_err());
        assert!(parse("[[ a b ]]").is_err());
    }
}

//! Arithmetic Expression Parser
//!
//! Precedence-climbing parser for `$(( ))`, `(( ))`, `let` and array
//! subscripts. Input is the arithmetic text after `$` expansions have been
//! applied; the result is an `ArithExpr` tree.

use crate::ast::types::{ArithBinaryOp, ArithExpr, ArithLValue, ArithUnaryOp};
use thiserror::Error;

/// Syntax or literal error inside an arithmetic expression.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message} (error token is \"{token}\")")]
pub struct ArithSyntaxError {
    pub message: String,
    pub token: String,
}

impl ArithSyntaxError {
    fn new(message: impl Into<String>, token: impl Into<String>) -> Self {
        Self { message: message.into(), token: token.into() }
    }
}

type Result<T> = std::result::Result<T, ArithSyntaxError>;

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(String),
    Ident(String, Option<String>),
    Op(&'static str),
    LParen,
    RParen,
}

/// Longest operators first so `<<=` wins over `<<` and `<`.
const OPERATORS: &[&str] = &[
    "<<=", ">>=", "**", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "+=", "-=", "*=",
    "/=", "%=", "&=", "|=", "^=", "+", "-", "*", "/", "%", "<", ">", "=", "!", "~", "&", "|", "^", "?",
    ":", ",",
];

fn tokenize(text: &str) -> Result<Vec<(Tok, usize)>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        if c.is_ascii_digit() {
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || matches!(chars[i], '#' | '@' | '_')) {
                i += 1;
            }
            tokens.push((Tok::Num(chars[start..i].iter().collect()), start));
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let name: String = chars[start..i].iter().collect();
            let mut index = None;
            let mut j = i;
            while j < chars.len() && chars[j] == ' ' {
                j += 1;
            }
            if j < chars.len() && chars[j] == '[' {
                let mut depth = 0usize;
                let mut k = j;
                while k < chars.len() {
                    match chars[k] {
                        '[' => depth += 1,
                        ']' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    k += 1;
                }
                if k >= chars.len() {
                    return Err(ArithSyntaxError::new("syntax error: invalid arithmetic operator", chars[j..].iter().collect::<String>()));
                }
                index = Some(chars[j + 1..k].iter().collect());
                i = k + 1;
            }
            tokens.push((Tok::Ident(name, index), start));
            continue;
        }
        if c == '(' {
            tokens.push((Tok::LParen, start));
            i += 1;
            continue;
        }
        if c == ')' {
            tokens.push((Tok::RParen, start));
            i += 1;
            continue;
        }
        let rest: String = chars[i..chars.len().min(i + 3)].iter().collect();
        match OPERATORS.iter().find(|op| rest.starts_with(**op)) {
            Some(op) => {
                tokens.push((Tok::Op(*op), start));
                i += op.len();
            }
            None => {
                return Err(ArithSyntaxError::new(
                    "syntax error: invalid arithmetic operator",
                    chars[i..].iter().collect::<String>(),
                ))
            }
        }
    }
    Ok(tokens)
}

/// Parses a full arithmetic expression. Empty text evaluates as 0.
pub fn parse_arithmetic(text: &str) -> Result<ArithExpr> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Ok(ArithExpr::Number(0));
    }
    let mut parser = ArithParser { tokens, pos: 0, text };
    let expr = parser.parse_comma()?;
    if parser.pos < parser.tokens.len() {
        return Err(ArithSyntaxError::new("syntax error in expression", parser.remaining()));
    }
    Ok(expr)
}

struct ArithParser<'a> {
    tokens: Vec<(Tok, usize)>,
    pos: usize,
    text: &'a str,
}

impl<'a> ArithParser<'a> {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_op(&self) -> Option<&'static str> {
        match self.peek() {
            Some(Tok::Op(op)) => Some(*op),
            _ => None,
        }
    }

    fn remaining(&self) -> String {
        match self.tokens.get(self.pos) {
            Some((_, offset)) => self.text.chars().skip(*offset).collect::<String>().trim().to_string(),
            None => String::new(),
        }
    }

    fn operand_expected(&self) -> ArithSyntaxError {
        ArithSyntaxError::new("syntax error: operand expected", self.remaining())
    }

    fn parse_comma(&mut self) -> Result<ArithExpr> {
        let mut left = self.parse_assign()?;
        while self.peek_op() == Some(",") {
            self.pos += 1;
            let right = self.parse_assign()?;
            left = ArithExpr::Binary { op: ArithBinaryOp::Comma, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_assign(&mut self) -> Result<ArithExpr> {
        let start = self.pos;
        let left = self.parse_ternary()?;
        let Some(op) = self.peek_op() else {
            return Ok(left);
        };
        let compound = match op {
            "=" => None,
            "+=" => Some(ArithBinaryOp::Add),
            "-=" => Some(ArithBinaryOp::Sub),
            "*=" => Some(ArithBinaryOp::Mul),
            "/=" => Some(ArithBinaryOp::Div),
            "%=" => Some(ArithBinaryOp::Mod),
            "&=" => Some(ArithBinaryOp::BitAnd),
            "|=" => Some(ArithBinaryOp::BitOr),
            "^=" => Some(ArithBinaryOp::BitXor),
            "<<=" => Some(ArithBinaryOp::Shl),
            ">>=" => Some(ArithBinaryOp::Shr),
            _ => return Ok(left),
        };
        let ArithExpr::Variable(target) = left else {
            self.pos = start;
            return Err(ArithSyntaxError::new("attempted assignment to non-variable", self.remaining()));
        };
        self.pos += 1;
        let value = self.parse_assign()?;
        Ok(ArithExpr::Assign { op: compound, target, value: Box::new(value) })
    }

    fn parse_ternary(&mut self) -> Result<ArithExpr> {
        let condition = self.parse_binary(0)?;
        if self.peek_op() != Some("?") {
            return Ok(condition);
        }
        self.pos += 1;
        let then_branch = self.parse_comma()?;
        if self.peek_op() != Some(":") {
            return Err(ArithSyntaxError::new("syntax error: `:' expected for conditional expression", self.remaining()));
        }
        self.pos += 1;
        let else_branch = self.parse_ternary()?;
        Ok(ArithExpr::Ternary {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    /// Left-associative binary levels, loosest first.
    fn parse_binary(&mut self, level: usize) -> Result<ArithExpr> {
        const LEVELS: &[&[(&str, ArithBinaryOp)]] = &[
            &[("||", ArithBinaryOp::LogicalOr)],
            &[("&&", ArithBinaryOp::LogicalAnd)],
            &[("|", ArithBinaryOp::BitOr)],
            &[("^", ArithBinaryOp::BitXor)],
            &[("&", ArithBinaryOp::BitAnd)],
            &[("==", ArithBinaryOp::Eq), ("!=", ArithBinaryOp::Ne)],
            &[("<=", ArithBinaryOp::Le), (">=", ArithBinaryOp::Ge), ("<", ArithBinaryOp::Lt), (">", ArithBinaryOp::Gt)],
            &[("<<", ArithBinaryOp::Shl), (">>", ArithBinaryOp::Shr)],
            &[("+", ArithBinaryOp::Add), ("-", ArithBinaryOp::Sub)],
            &[("*", ArithBinaryOp::Mul), ("/", ArithBinaryOp::Div), ("%", ArithBinaryOp::Mod)],
        ];
        if level >= LEVELS.len() {
            return self.parse_power();
        }
        let mut left = self.parse_binary(level + 1)?;
        loop {
            let Some(op) = self.peek_op() else { break };
            let Some((_, bin)) = LEVELS[level].iter().find(|(s, _)| *s == op) else { break };
            self.pos += 1;
            let right = self.parse_binary(level + 1)?;
            left = ArithExpr::Binary { op: *bin, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_power(&mut self) -> Result<ArithExpr> {
        let base = self.parse_unary()?;
        if self.peek_op() == Some("**") {
            self.pos += 1;
            let exponent = self.parse_power()?;
            return Ok(ArithExpr::Binary { op: ArithBinaryOp::Pow, left: Box::new(base), right: Box::new(exponent) });
        }
        Ok(base)
    }

    fn parse_unary(&mut self) -> Result<ArithExpr> {
        let op = match self.peek_op() {
            Some("-") => Some(ArithUnaryOp::Negate),
            Some("+") => Some(ArithUnaryOp::Plus),
            Some("!") => Some(ArithUnaryOp::Not),
            Some("~") => Some(ArithUnaryOp::BitNot),
            Some(op @ ("++" | "--")) => {
                self.pos += 1;
                let target = self.expect_lvalue()?;
                return Ok(ArithExpr::IncDec { target, increment: op == "++", prefix: true });
            }
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            let operand = self.parse_unary()?;
            return Ok(ArithExpr::Unary { op, operand: Box::new(operand) });
        }
        self.parse_postfix()
    }

    fn expect_lvalue(&mut self) -> Result<ArithLValue> {
        match self.peek().cloned() {
            Some(Tok::Ident(name, index)) => {
                self.pos += 1;
                Ok(ArithLValue { name, index })
            }
            _ => Err(self.operand_expected()),
        }
    }

    fn parse_postfix(&mut self) -> Result<ArithExpr> {
        let primary = self.parse_primary()?;
        if let ArithExpr::Variable(target) = &primary {
            if let Some(op @ ("++" | "--")) = self.peek_op() {
                self.pos += 1;
                return Ok(ArithExpr::IncDec { target: target.clone(), increment: op == "++", prefix: false });
            }
        }
        Ok(primary)
    }

    fn parse_primary(&mut self) -> Result<ArithExpr> {
        match self.peek().cloned() {
            Some(Tok::Num(text)) => {
                self.pos += 1;
                parse_number(&text).map(ArithExpr::Number)
            }
            Some(Tok::Ident(name, index)) => {
                self.pos += 1;
                Ok(ArithExpr::Variable(ArithLValue { name, index }))
            }
            Some(Tok::LParen) => {
                self.pos += 1;
                let inner = self.parse_comma()?;
                if self.peek() != Some(&Tok::RParen) {
                    return Err(ArithSyntaxError::new("syntax error: `)' expected", self.remaining()));
                }
                self.pos += 1;
                Ok(inner)
            }
            _ => Err(self.operand_expected()),
        }
    }
}

/// Parses an integer literal: decimal, `0x` hex, leading-zero octal, or
/// `base#digits` with bases 2 through 64. Overflow wraps like bash.
pub fn parse_number(text: &str) -> Result<i64> {
    let too_great = || ArithSyntaxError::new("value too great for base", text);

    if let Some((base_text, digits)) = text.split_once('#') {
        let base: u32 = base_text
            .parse()
            .ok()
            .filter(|b| (2..=64).contains(b))
            .ok_or_else(|| ArithSyntaxError::new("invalid arithmetic base", text))?;
        if digits.is_empty() {
            return Err(ArithSyntaxError::new("invalid integer constant", text));
        }
        let mut value: i64 = 0;
        for c in digits.chars() {
            let d = match c {
                '0'..='9' => c as u32 - '0' as u32,
                'a'..='z' => c as u32 - 'a' as u32 + 10,
                'A'..='Z' if base <= 36 => c as u32 - 'A' as u32 + 10,
                'A'..='Z' => c as u32 - 'A' as u32 + 36,
                '@' => 62,
                '_' => 63,
                _ => return Err(too_great()),
            };
            if d >= base {
                return Err(too_great());
            }
            value = value.wrapping_mul(base as i64).wrapping_add(d as i64);
        }
        return Ok(value);
    }

    let (digits, radix) = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        (hex, 16)
    } else if text.len() > 1 && text.starts_with('0') {
        (&text[1..], 8)
    } else {
        (text, 10)
    };
    if digits.is_empty() {
        return Err(ArithSyntaxError::new("invalid integer constant", text));
    }
    let mut value: i64 = 0;
    for c in digits.chars() {
        let d = c.to_digit(radix).ok_or_else(|| {
            if c.is_ascii_alphanumeric() && radix != 10 || c.is_ascii_digit() {
                too_great()
            } else {
                ArithSyntaxError::new("invalid number", text)
            }
        })?;
        value = value.wrapping_mul(radix as i64).wrapping_add(d as i64);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: i64) -> ArithExpr {
        ArithExpr::Number(n)
    }

    #[test]
    fn test_literals() {
        assert_eq!(parse_number("42").unwrap(), 42);
        assert_eq!(parse_number("010").unwrap(), 8);
        assert_eq!(parse_number("0x1F").unwrap(), 31);
        assert_eq!(parse_number("2#101").unwrap(), 5);
        assert_eq!(parse_number("16#ff").unwrap(), 255);
        assert_eq!(parse_number("64#_").unwrap(), 63);
        assert_eq!(parse_number("36#Z").unwrap(), 35);
        assert!(parse_number("08").unwrap_err().message.contains("too great"));
        assert!(parse_number("1#1").is_err());
    }

    #[test]
    fn test_precedence() {
        let e = parse_arithmetic("1 + 2 * 3").unwrap();
        assert_eq!(
            e,
            ArithExpr::Binary {
                op: ArithBinaryOp::Add,
                left: Box::new(num(1)),
                right: Box::new(ArithExpr::Binary { op: ArithBinaryOp::Mul, left: Box::new(num(2)), right: Box::new(num(3)) }),
            }
        );
    }

    #[test]
    fn test_power_is_right_associative() {
        let e = parse_arithmetic("2 ** 3 ** 2").unwrap();
        match e {
            ArithExpr::Binary { op: ArithBinaryOp::Pow, right, .. } => {
                assert!(matches!(*right, ArithExpr::Binary { op: ArithBinaryOp::Pow, .. }))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_assignment_and_incdec() {
        let e = parse_arithmetic("x += 2").unwrap();
        assert!(matches!(e, ArithExpr::Assign { op: Some(ArithBinaryOp::Add), .. }));
        let e = parse_arithmetic("x++").unwrap();
        assert!(matches!(e, ArithExpr::IncDec { increment: true, prefix: false, .. }));
        let e = parse_arithmetic("--a[1]").unwrap();
        match e {
            ArithExpr::IncDec { target, increment: false, prefix: true } => assert_eq!(target.index.as_deref(), Some("1")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_ternary_and_comma() {
        assert!(matches!(parse_arithmetic("a ? 1 : 2").unwrap(), ArithExpr::Ternary { .. }));
        assert!(matches!(
            parse_arithmetic("a = 1, b = 2").unwrap(),
            ArithExpr::Binary { op: ArithBinaryOp::Comma, .. }
        ));
    }

    #[test]
    fn test_errors() {
        let err = parse_arithmetic("1 +").unwrap_err();
        assert!(err.message.contains("operand expected"));
        assert!(parse_arithmetic("(1 + 2").is_err());
        assert!(parse_arithmetic("1 = 2").is_err());
        assert!(parse_arithmetic("1 2").is_err());
    }

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(parse_arithmetic("  ").unwrap(), num(0));
    }
}

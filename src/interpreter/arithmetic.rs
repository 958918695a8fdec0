//! Arithmetic Evaluation
//!
//! Evaluates `ArithExpr` trees over 64-bit signed integers with wrapping
//! overflow, the way bash does. Variables are read through the state:
//! unset or empty values count as 0, values that are themselves
//! expressions are evaluated recursively.
//!
//! `$` expansions inside arithmetic text are resolved by the expander
//! before the text reaches this module.

use crate::ast::types::{ArithBinaryOp, ArithExpr, ArithLValue, ArithUnaryOp};
use crate::interpreter::errors::{InterpreterError, InterpreterResult};
use crate::interpreter::types::InterpreterState;
use crate::interpreter::variables::VarValue;
use crate::parser::arithmetic_parser::parse_number;
use crate::parser::parse_arithmetic;
use crate::parser::types::is_valid_name;

/// Nesting bound for variables whose values are themselves expressions.
const MAX_ARITH_RECURSION: u32 = 64;

fn bool_to_int(b: bool) -> i64 {
    if b {
        1
    } else {
        0
    }
}

/// Pure binary operator evaluation. `&&`, `||` and `,` never get here.
fn apply_binary_op(left: i64, right: i64, op: ArithBinaryOp) -> Result<i64, &'static str> {
    Ok(match op {
        ArithBinaryOp::Add => left.wrapping_add(right),
        ArithBinaryOp::Sub => left.wrapping_sub(right),
        ArithBinaryOp::Mul => left.wrapping_mul(right),
        ArithBinaryOp::Div => {
            if right == 0 {
                return Err("division by 0");
            }
            left.wrapping_div(right)
        }
        ArithBinaryOp::Mod => {
            if right == 0 {
                return Err("division by 0");
            }
            left.wrapping_rem(right)
        }
        ArithBinaryOp::Pow => {
            if right < 0 {
                return Err("exponent less than 0");
            }
            left.wrapping_pow(right.min(u32::MAX as i64) as u32)
        }
        ArithBinaryOp::Shl => left.wrapping_shl((right & 63) as u32),
        ArithBinaryOp::Shr => left.wrapping_shr((right & 63) as u32),
        ArithBinaryOp::Lt => bool_to_int(left < right),
        ArithBinaryOp::Le => bool_to_int(left <= right),
        ArithBinaryOp::Gt => bool_to_int(left > right),
        ArithBinaryOp::Ge => bool_to_int(left >= right),
        ArithBinaryOp::Eq => bool_to_int(left == right),
        ArithBinaryOp::Ne => bool_to_int(left != right),
        ArithBinaryOp::BitAnd => left & right,
        ArithBinaryOp::BitOr => left | right,
        ArithBinaryOp::BitXor => left ^ right,
        ArithBinaryOp::Comma | ArithBinaryOp::LogicalAnd | ArithBinaryOp::LogicalOr => right,
    })
}

fn apply_unary_op(operand: i64, op: ArithUnaryOp) -> i64 {
    match op {
        ArithUnaryOp::Negate => operand.wrapping_neg(),
        ArithUnaryOp::Plus => operand,
        ArithUnaryOp::Not => bool_to_int(operand == 0),
        ArithUnaryOp::BitNot => !operand,
    }
}

struct ArithEval<'s> {
    state: &'s mut InterpreterState,
    /// Source text, for diagnostics
    text: String,
    depth: u32,
}

impl<'s> ArithEval<'s> {
    fn error(&self, message: impl Into<String>) -> InterpreterError {
        InterpreterError::arithmetic(&self.text, message)
    }

    fn eval(&mut self, expr: &ArithExpr) -> InterpreterResult<i64> {
        match expr {
            ArithExpr::Number(n) => Ok(*n),
            ArithExpr::Variable(lvalue) => self.read_lvalue(lvalue),
            ArithExpr::Unary { op, operand } => {
                let v = self.eval(operand)?;
                Ok(apply_unary_op(v, *op))
            }
            ArithExpr::Binary { op: ArithBinaryOp::LogicalAnd, left, right } => {
                if self.eval(left)? == 0 {
                    return Ok(0);
                }
                Ok(bool_to_int(self.eval(right)? != 0))
            }
            ArithExpr::Binary { op: ArithBinaryOp::LogicalOr, left, right } => {
                if self.eval(left)? != 0 {
                    return Ok(1);
                }
                Ok(bool_to_int(self.eval(right)? != 0))
            }
            ArithExpr::Binary { op: ArithBinaryOp::Comma, left, right } => {
                self.eval(left)?;
                self.eval(right)
            }
            ArithExpr::Binary { op, left, right } => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                apply_binary_op(l, r, *op).map_err(|m| self.error(m))
            }
            ArithExpr::Ternary { condition, then_branch, else_branch } => {
                if self.eval(condition)? != 0 {
                    self.eval(then_branch)
                } else {
                    self.eval(else_branch)
                }
            }
            ArithExpr::Assign { op, target, value } => {
                let rhs = self.eval(value)?;
                let new_value = match op {
                    None => rhs,
                    Some(op) => {
                        let current = self.read_lvalue(target)?;
                        apply_binary_op(current, rhs, *op).map_err(|m| self.error(m))?
                    }
                };
                self.write_lvalue(target, new_value)?;
                Ok(new_value)
            }
            ArithExpr::IncDec { target, increment, prefix } => {
                let current = self.read_lvalue(target)?;
                let new_value = if *increment { current.wrapping_add(1) } else { current.wrapping_sub(1) };
                self.write_lvalue(target, new_value)?;
                Ok(if *prefix { new_value } else { current })
            }
        }
    }

    fn is_assoc(&self, name: &str) -> bool {
        self.state.vars.get(name).map_or(false, |v| v.is_assoc())
    }

    /// Element index for an indexed-array subscript; negative indices count
    /// back from the end.
    fn element_index(&mut self, name: &str, subscript: &str) -> InterpreterResult<i64> {
        let index = self.nested(subscript)?;
        if index >= 0 {
            return Ok(index);
        }
        let len = self.state.vars.next_index(name);
        Ok(len + index)
    }

    fn read_lvalue(&mut self, lvalue: &ArithLValue) -> InterpreterResult<i64> {
        let raw = match &lvalue.index {
            None => self.state.get_var_value(&lvalue.name),
            Some(sub) if self.is_assoc(&lvalue.name) => {
                let key = sub.trim().to_string();
                match self.state.vars.get(&lvalue.name).and_then(|v| v.value.as_ref()) {
                    Some(VarValue::Assoc(map)) => map.get(&key).cloned(),
                    _ => None,
                }
            }
            Some(sub) => {
                let index = self.element_index(&lvalue.name, sub)?;
                match self.state.vars.get(&lvalue.name).and_then(|v| v.value.as_ref()) {
                    Some(VarValue::Indexed(map)) => map.get(&index).cloned(),
                    Some(VarValue::Scalar(s)) if index == 0 => Some(s.clone()),
                    _ => None,
                }
            }
        };
        match raw {
            None if self.state.options.nounset => Err(InterpreterError::Unbound(lvalue.name.clone())),
            None => Ok(0),
            Some(value) => self.value_of(&value),
        }
    }

    /// Numeric value of a variable's text: a literal, another variable
    /// name, or an expression evaluated recursively.
    fn value_of(&mut self, value: &str) -> InterpreterResult<i64> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Ok(0);
        }
        if let Ok(n) = parse_number(trimmed) {
            return Ok(n);
        }
        if is_valid_name(trimmed) {
            self.enter()?;
            let v = self.read_lvalue(&ArithLValue { name: trimmed.to_string(), index: None });
            self.depth -= 1;
            return v;
        }
        self.nested(trimmed)
    }

    fn enter(&mut self) -> InterpreterResult<()> {
        self.depth += 1;
        if self.depth > MAX_ARITH_RECURSION {
            return Err(self.error("expression recursion level exceeded"));
        }
        Ok(())
    }

    fn nested(&mut self, text: &str) -> InterpreterResult<i64> {
        self.enter()?;
        let result = parse_arithmetic(text)
            .map_err(|e| InterpreterError::arithmetic(text, e.to_string()))
            .and_then(|expr| self.eval(&expr));
        self.depth -= 1;
        result
    }

    fn write_lvalue(&mut self, lvalue: &ArithLValue, value: i64) -> InterpreterResult<()> {
        match &lvalue.index {
            None => self.state.assign_scalar(&lvalue.name, &value.to_string(), false),
            Some(sub) if self.is_assoc(&lvalue.name) => {
                self.state.vars.set_assoc_element(&lvalue.name, sub.trim(), value.to_string())
            }
            Some(sub) => {
                let index = self.element_index(&lvalue.name, sub)?;
                if index < 0 {
                    return Err(InterpreterError::Runtime(format!("{}[{}]: bad array subscript", lvalue.name, sub)));
                }
                self.state.vars.set_element(&lvalue.name, index, value.to_string())
            }
        }
    }
}

impl InterpreterState {
    /// Evaluates an already-parsed expression.
    pub fn eval_arith(&mut self, expr: &ArithExpr, text: &str) -> InterpreterResult<i64> {
        ArithEval { state: self, text: text.to_string(), depth: 0 }.eval(expr)
    }

    /// Parses and evaluates arithmetic text whose `$` expansions have
    /// already been applied.
    pub fn eval_arith_text(&mut self, text: &str) -> InterpreterResult<i64> {
        let expr = parse_arithmetic(text).map_err(|e| InterpreterError::arithmetic(text, e.to_string()))?;
        self.eval_arith(&expr, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn eval(state: &mut InterpreterState, text: &str) -> InterpreterResult<i64> {
        state.eval_arith_text(text)
    }

    #[test]
    fn test_precedence_and_operators() {
        let mut state = InterpreterState::default();
        assert_eq!(eval(&mut state, "1 + 2 * 3"), Ok(7));
        assert_eq!(eval(&mut state, "(1 + 2) * 3"), Ok(9));
        assert_eq!(eval(&mut state, "2 ** 10"), Ok(1024));
        assert_eq!(eval(&mut state, "-7 / 2"), Ok(-3));
        assert_eq!(eval(&mut state, "-7 % 2"), Ok(-1));
        assert_eq!(eval(&mut state, "1 << 4 | 1"), Ok(17));
        assert_eq!(eval(&mut state, "!0 && ~0 == -1"), Ok(1));
        assert_eq!(eval(&mut state, "0x1f + 010 + 2#101"), Ok(31 + 8 + 5));
        assert_eq!(eval(&mut state, ""), Ok(0));
    }

    #[test]
    fn test_errors() {
        let mut state = InterpreterState::default();
        assert_eq!(
            eval(&mut state, "1/0"),
            Err(InterpreterError::arithmetic("1/0", "division by 0"))
        );
        assert!(matches!(eval(&mut state, "5 % 0"), Err(InterpreterError::Arithmetic { .. })));
        assert_eq!(
            eval(&mut state, "2 ** -1"),
            Err(InterpreterError::arithmetic("2 ** -1", "exponent less than 0"))
        );
        assert!(eval(&mut state, "1 +").is_err());
    }

    #[test]
    fn test_wrapping_overflow() {
        let mut state = InterpreterState::default();
        assert_eq!(eval(&mut state, "9223372036854775807 + 1"), Ok(i64::MIN));
    }

    #[test]
    fn test_variables_and_assignment() {
        let mut state = InterpreterState::default();
        assert_eq!(eval(&mut state, "x = 5, x += 2, x"), Ok(7));
        assert_eq!(state.vars.get_scalar("x").as_deref(), Some("7"));
        assert_eq!(eval(&mut state, "x++"), Ok(7));
        assert_eq!(eval(&mut state, "++x"), Ok(9));
        assert_eq!(eval(&mut state, "unset_var + 1"), Ok(1));
        state.vars.set_scalar("e", "x * 2").unwrap();
        assert_eq!(eval(&mut state, "e"), Ok(18));
        state.vars.set_scalar("r", "q").unwrap();
        state.vars.set_scalar("q", "4").unwrap();
        assert_eq!(eval(&mut state, "r"), Ok(4));
    }

    #[test]
    fn test_short_circuit_and_ternary_skip_side_effects() {
        let mut state = InterpreterState::default();
        assert_eq!(eval(&mut state, "0 && (a = 1)"), Ok(0));
        assert_eq!(eval(&mut state, "1 || (b = 1)"), Ok(1));
        assert_eq!(eval(&mut state, "1 ? (c = 2) : (d = 3)"), Ok(2));
        assert!(!state.vars.is_set("a"));
        assert!(!state.vars.is_set("b"));
        assert!(!state.vars.is_set("d"));
    }

    #[test]
    fn test_array_elements() {
        let mut state = InterpreterState::default();
        assert_eq!(eval(&mut state, "a[2] = 5"), Ok(5));
        assert_eq!(eval(&mut state, "a[1+1] * 2"), Ok(10));
        assert_eq!(eval(&mut state, "a[-1]"), Ok(5));
        state.vars.set_assoc_element("m", "k", "3").unwrap();
        assert_eq!(eval(&mut state, "m[k] + 1"), Ok(4));
    }

    #[test]
    fn test_nounset_and_self_reference() {
        let mut state = InterpreterState::default();
        state.vars.set_scalar("loop", "loop").unwrap();
        state.vars.set_scalar("loop2", "loop2 + 1").unwrap();
        assert!(eval(&mut state, "loop").is_err());
        assert!(eval(&mut state, "loop2").is_err());
        state.vars.set_scalar("chain", "chain2 * 2").unwrap();
        state.vars.set_scalar("chain2", "3 + 1").unwrap();
        assert_eq!(eval(&mut state, "chain + 1"), Ok(9));
        state.options.nounset = true;
        assert_eq!(eval(&mut state, "missing"), Err(InterpreterError::Unbound("missing".into())));
    }

    proptest! {
        #[test]
        fn prop_division_law(a in -100_000i64..100_000, b in -1000i64..1000) {
            prop_assume!(b != 0);
            let mut state = InterpreterState::default();
            let q = eval(&mut state, &format!("{} / {}", a, b)).unwrap();
            let r = eval(&mut state, &format!("{} % {}", a, b)).unwrap();
            prop_assert_eq!(q * b + r, a);
            prop_assert!(r.abs() < b.abs());
        }
    }
}

//! let - Evaluate arithmetic expressions
//!
//! let expr [expr ...]
//!
//! Status is 0 when the last expression is non-zero, 1 otherwise.

use crate::interpreter::errors::InterpreterResult;
use crate::interpreter::types::{ExecResult, InterpreterState};

pub fn handle_let(state: &mut InterpreterState, args: &[String]) -> InterpreterResult<ExecResult> {
    if args.is_empty() {
        return Ok(ExecResult::failure("bash: let: expression expected\n"));
    }
    let mut last = 0;
    for expr in args {
        last = state.eval_arith_text(expr)?;
    }
    Ok(ExecResult::with_code(if last != 0 { 0 } else { 1 }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::errors::InterpreterError;
    use pretty_assertions::assert_eq;

    fn let_(state: &mut InterpreterState, list: &[&str]) -> InterpreterResult<ExecResult> {
        let args: Vec<String> = list.iter().map(|s| s.to_string()).collect();
        handle_let(state, &args)
    }

    #[test]
    fn test_let_assigns_and_reports() {
        let mut state = InterpreterState::default();
        assert_eq!(let_(&mut state, &["a=3", "b=a*2"]).unwrap().exit_code, 0);
        assert_eq!(state.vars.get_scalar("b").as_deref(), Some("6"));
        assert_eq!(let_(&mut state, &["a-3"]).unwrap().exit_code, 1);
        assert_eq!(let_(&mut state, &[]).unwrap().stderr, "bash: let: expression expected\n");
    }

    #[test]
    fn test_let_division_by_zero() {
        let mut state = InterpreterState::default();
        let err = let_(&mut state, &["1/0"]).unwrap_err();
        assert!(matches!(err, InterpreterError::Arithmetic { .. }));
    }
}

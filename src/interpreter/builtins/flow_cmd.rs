//! exit, return, break, continue and shift
//!
//! The first four do not unwind anything themselves: they return a result
//! carrying a `ControlSignal` that enclosing constructs consume.

use crate::interpreter::types::{ControlSignal, ExecResult, InterpreterState};

fn parse_status(arg: &str) -> Option<i32> {
    arg.trim().parse::<i64>().ok().map(|n| n.rem_euclid(256) as i32)
}

/// exit [n]
pub fn handle_exit(state: &mut InterpreterState, args: &[String]) -> ExecResult {
    let code = match args.first() {
        None => state.last_exit_code,
        Some(arg) => match parse_status(arg) {
            Some(code) => code,
            None => {
                return ExecResult::failure_with_code(format!("bash: exit: {}: numeric argument required\n", arg), 2)
                    .with_signal(ControlSignal::Exit(2));
            }
        },
    };
    tracing::debug!(code, "exit");
    ExecResult::with_code(code).with_signal(ControlSignal::Exit(code))
}

/// return [n]
pub fn handle_return(state: &mut InterpreterState, args: &[String]) -> ExecResult {
    if state.call_depth == 0 && state.source_depth == 0 {
        return ExecResult::failure("bash: return: can only `return' from a function or sourced script\n");
    }
    let code = match args.first() {
        None => state.last_exit_code,
        Some(arg) => match parse_status(arg) {
            Some(code) => code,
            None => {
                return ExecResult::failure_with_code(format!("bash: return: {}: numeric argument required\n", arg), 2)
                    .with_signal(ControlSignal::Return(2));
            }
        },
    };
    ExecResult::with_code(code).with_signal(ControlSignal::Return(code))
}

/// Level argument of break/continue, capped at the loop depth.
fn loop_level(state: &InterpreterState, name: &str, args: &[String]) -> Result<u32, ExecResult> {
    let Some(arg) = args.first() else {
        return Ok(1);
    };
    match arg.trim().parse::<i64>() {
        Ok(n) if n >= 1 => Ok((n.min(u32::MAX as i64) as u32).min(state.loop_depth)),
        Ok(_) => Err(ExecResult::failure(format!("bash: {}: {}: loop count out of range\n", name, arg))),
        Err(_) => Err(ExecResult::failure_with_code(
            format!("bash: {}: {}: numeric argument required\n", name, arg),
            128,
        )),
    }
}

fn loop_builtin(state: &InterpreterState, name: &str, args: &[String]) -> Result<u32, ExecResult> {
    if state.loop_depth == 0 {
        return Err(ExecResult::new(
            String::new(),
            format!("bash: {}: only meaningful in a `for', `while', or `until' loop\n", name),
            0,
        ));
    }
    loop_level(state, name, args)
}

/// break [n]
pub fn handle_break(state: &mut InterpreterState, args: &[String]) -> ExecResult {
    match loop_builtin(state, "break", args) {
        Ok(n) => ExecResult::ok().with_signal(ControlSignal::Break(n)),
        Err(result) => result,
    }
}

/// continue [n]
pub fn handle_continue(state: &mut InterpreterState, args: &[String]) -> ExecResult {
    match loop_builtin(state, "continue", args) {
        Ok(n) => ExecResult::ok().with_signal(ControlSignal::Continue(n)),
        Err(result) => result,
    }
}

/// shift [n]
pub fn handle_shift(state: &mut InterpreterState, args: &[String]) -> ExecResult {
    let n = match args.first() {
        None => 1,
        Some(arg) => match arg.trim().parse::<i64>() {
            Ok(n) if n >= 0 => n as usize,
            Ok(_) => return ExecResult::failure(format!("bash: shift: {}: shift count out of range\n", arg)),
            Err(_) => return ExecResult::failure(format!("bash: shift: {}: numeric argument required\n", arg)),
        },
    };
    if n > state.positional.len() {
        return ExecResult::with_code(1);
    }
    state.positional.drain(..n);
    ExecResult::ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exit_codes() {
        let mut state = InterpreterState::default();
        state.last_exit_code = 3;
        assert_eq!(handle_exit(&mut state, &[]).signal, ControlSignal::Exit(3));
        assert_eq!(handle_exit(&mut state, &args(&["257"])).signal, ControlSignal::Exit(1));
        assert_eq!(handle_exit(&mut state, &args(&["-1"])).signal, ControlSignal::Exit(255));
        let r = handle_exit(&mut state, &args(&["abc"]));
        assert_eq!(r.signal, ControlSignal::Exit(2));
        assert!(r.stderr.contains("numeric argument required"));
    }

    #[test]
    fn test_return_outside_function() {
        let mut state = InterpreterState::default();
        let r = handle_return(&mut state, &[]);
        assert_eq!(r.exit_code, 1);
        assert_eq!(r.signal, ControlSignal::Normal);
        state.call_depth = 1;
        assert_eq!(handle_return(&mut state, &args(&["4"])).signal, ControlSignal::Return(4));
    }

    #[test]
    fn test_break_levels() {
        let mut state = InterpreterState::default();
        let r = handle_break(&mut state, &[]);
        assert_eq!(r.signal, ControlSignal::Normal);
        assert_eq!(r.exit_code, 0);
        assert!(r.stderr.contains("only meaningful"));

        state.loop_depth = 2;
        assert_eq!(handle_break(&mut state, &args(&["5"])).signal, ControlSignal::Break(2));
        assert_eq!(handle_continue(&mut state, &[]).signal, ControlSignal::Continue(1));
        assert!(handle_break(&mut state, &args(&["0"])).stderr.contains("loop count out of range"));
    }

    #[test]
    fn test_shift() {
        let mut state = InterpreterState::default();
        state.positional = args(&["a", "b", "c"]);
        assert_eq!(handle_shift(&mut state, &[]).exit_code, 0);
        assert_eq!(state.positional, args(&["b", "c"]));
        assert_eq!(handle_shift(&mut state, &args(&["5"])).exit_code, 1);
        assert_eq!(state.positional.len(), 2);
        assert_eq!(handle_shift(&mut state, &args(&["2"])).exit_code, 0);
        assert!(state.positional.is_empty());
    }
}

//! unset - Unset variables or functions
//!
//! unset [-f] [-v] [-n] [name ...]
//!
//! Without options a name is tried as a variable first and as a function
//! when no such variable exists. `name[sub]` removes a single element.

use crate::interpreter::errors::{InterpreterError, InterpreterResult};
use crate::interpreter::types::{ExecResult, InterpreterState};
use crate::interpreter::variables::{split_subscript, Variable};
use crate::parser::types::is_valid_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Either,
    Variable,
    Function,
    Nameref,
}

fn unset_element(state: &mut InterpreterState, name: &str, sub: &str) -> InterpreterResult<()> {
    if sub == "@" || sub == "*" {
        return state.vars.unset(name);
    }
    if state.vars.get(name).map_or(false, Variable::is_assoc) {
        return state.vars.unset_assoc_element(name, sub);
    }
    let mut index = state.eval_arith_text(sub)?;
    if index < 0 {
        index += state.vars.next_index(name);
        if index < 0 {
            return Err(InterpreterError::Runtime(format!("{}[{}]: bad array subscript", name, sub)));
        }
    }
    state.vars.unset_element(name, index)
}

fn unset_one(state: &mut InterpreterState, target: Target, name: &str) -> InterpreterResult<()> {
    if target == Target::Function {
        state.functions.remove(name);
        return Ok(());
    }
    if let Some((base, sub)) = split_subscript(name) {
        if !is_valid_name(base) {
            return Err(InterpreterError::Runtime(format!("`{}': not a valid identifier", name)));
        }
        return unset_element(state, base, sub);
    }
    if !is_valid_name(name) {
        return Err(InterpreterError::Runtime(format!("`{}': not a valid identifier", name)));
    }
    if target == Target::Nameref {
        return state.vars.unset_raw(name);
    }
    if target == Target::Either && state.vars.get(name).is_none() && state.functions.contains_key(name) {
        state.functions.remove(name);
        return Ok(());
    }
    state.vars.unset(name).map_err(|err| match err {
        InterpreterError::Readonly(var) => {
            InterpreterError::Runtime(format!("{}: cannot unset: readonly variable", var))
        }
        other => other,
    })
}

pub fn handle_unset(state: &mut InterpreterState, args: &[String]) -> InterpreterResult<ExecResult> {
    let mut target = Target::Either;
    let mut rest = args;
    while let Some(arg) = rest.first() {
        if arg == "--" {
            rest = &rest[1..];
            break;
        }
        if !arg.starts_with('-') || arg.len() < 2 {
            break;
        }
        for c in arg[1..].chars() {
            target = match c {
                'f' => Target::Function,
                'v' => Target::Variable,
                'n' => Target::Nameref,
                _ => {
                    return Ok(ExecResult::failure_with_code(
                        format!("bash: unset: -{}: invalid option\n", c),
                        2,
                    ));
                }
            };
        }
        rest = &rest[1..];
    }

    let mut stderr = String::new();
    for name in rest {
        if let Err(err) = unset_one(state, target, name) {
            if err.is_fatal() {
                return Err(err);
            }
            stderr.push_str(&format!("bash: unset: {}\n", err));
        }
    }
    let code = if stderr.is_empty() { 0 } else { 1 };
    Ok(ExecResult::new(String::new(), stderr, code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn unset(state: &mut InterpreterState, list: &[&str]) -> ExecResult {
        let args: Vec<String> = list.iter().map(|s| s.to_string()).collect();
        handle_unset(state, &args).unwrap()
    }

    #[test]
    fn test_unset_variables_and_elements() {
        let mut state = InterpreterState::default();
        state.vars.set_scalar("x", "1").unwrap();
        for (i, v) in ["a", "b", "c"].iter().enumerate() {
            state.vars.set_element("arr", i as i64, *v).unwrap();
        }
        assert_eq!(unset(&mut state, &["x", "arr[1]"]).exit_code, 0);
        assert!(!state.vars.is_set("x"));
        assert_eq!(state.vars.get("arr").unwrap().values(), vec!["a", "c"]);
        unset(&mut state, &["arr[-1]"]);
        assert_eq!(state.vars.get("arr").unwrap().values(), vec!["a"]);
        unset(&mut state, &["arr[@]"]);
        assert!(state.vars.get("arr").is_none());
    }

    #[test]
    fn test_unset_assoc_key() {
        let mut state = InterpreterState::default();
        state.vars.set_assoc_element("m", "k", "v").unwrap();
        state.vars.set_assoc_element("m", "j", "w").unwrap();
        unset(&mut state, &["m[k]"]);
        assert_eq!(state.vars.get("m").unwrap().keys(), vec!["j"]);
    }

    #[test]
    fn test_unset_readonly_and_invalid() {
        let mut state = InterpreterState::default();
        state.vars.set_scalar("r", "1").unwrap();
        state.vars.declare_global("r").attrs.readonly = true;
        let r = unset(&mut state, &["r", "1bad"]);
        assert_eq!(r.exit_code, 1);
        assert_eq!(
            r.stderr,
            "bash: unset: r: cannot unset: readonly variable\nbash: unset: `1bad': not a valid identifier\n"
        );
    }

    #[test]
    fn test_unset_nameref_itself() {
        let mut state = InterpreterState::default();
        state.vars.set_scalar("target", "v").unwrap();
        let r = state.vars.declare_global("ref");
        r.attrs.nameref = true;
        r.value = Some(crate::interpreter::variables::VarValue::Scalar("target".into()));
        unset(&mut state, &["-n", "ref"]);
        assert!(state.vars.get_raw("ref").is_none());
        assert!(state.vars.is_set("target"));
    }
}

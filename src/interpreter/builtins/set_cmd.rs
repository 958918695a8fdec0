//! set and shopt
//!
//! set [-aCefnux] [-o option] [--] [arg ...]
//! shopt [-pqsuo] [optname ...]

use crate::interpreter::expansion::parameter::declare_statement;
use crate::interpreter::expansion::quoting::quote_if_needed;
use crate::interpreter::types::{ExecResult, InterpreterState, ShellOptions, SET_OPTION_NAMES, SHOPT_NAMES};
use crate::interpreter::variables::VarValue;

/// Flags accepted for compatibility that change nothing here.
const IGNORED_FLAGS: &[char] = &['h', 'B', 'v', 'm', 'b', 'H', 'P', 'T', 'E', 'k', 't'];

fn list_variables(state: &InterpreterState) -> String {
    let mut out = String::new();
    for (name, var) in state.vars.visible() {
        match &var.value {
            Some(VarValue::Scalar(s)) => out.push_str(&format!("{}={}\n", name, quote_if_needed(s))),
            Some(_) => {
                let full = declare_statement(&name, var);
                let tail = full.splitn(3, ' ').nth(2).unwrap_or(&full).to_string();
                out.push_str(&tail);
                out.push('\n');
            }
            None => {}
        }
    }
    out
}

fn list_set_options(options: &ShellOptions, reusable: bool) -> String {
    let mut out = String::new();
    for (name, _) in SET_OPTION_NAMES {
        let on = options.get(name).unwrap_or(false);
        if reusable {
            out.push_str(&format!("set {}o {}\n", if on { '-' } else { '+' }, name));
        } else {
            out.push_str(&format!("{:<15}\t{}\n", name, if on { "on" } else { "off" }));
        }
    }
    out
}

pub fn handle_set(state: &mut InterpreterState, args: &[String]) -> ExecResult {
    if args.is_empty() {
        return ExecResult::success(list_variables(state));
    }

    let mut i = 0;
    let mut new_positional: Option<Vec<String>> = None;
    while i < args.len() {
        let arg = &args[i];
        if arg == "--" {
            new_positional = Some(args[i + 1..].to_vec());
            break;
        }
        if arg == "-" {
            state.options.xtrace = false;
            if i + 1 < args.len() {
                new_positional = Some(args[i + 1..].to_vec());
            }
            break;
        }
        let on = match arg.chars().next() {
            Some('-') => true,
            Some('+') => false,
            _ => {
                new_positional = Some(args[i..].to_vec());
                break;
            }
        };
        for flag in arg[1..].chars() {
            if flag == 'o' {
                i += 1;
                let Some(name) = args.get(i) else {
                    return ExecResult::success(list_set_options(&state.options, !on));
                };
                if !state.options.set(name, on) {
                    return ExecResult::failure(format!("bash: set: {}: invalid option name\n", name));
                }
                continue;
            }
            match ShellOptions::name_for_flag(flag) {
                Some(name) => {
                    state.options.set(name, on);
                }
                None if IGNORED_FLAGS.contains(&flag) => {}
                None => {
                    return ExecResult::failure_with_code(
                        format!("bash: set: {}{}: invalid option\n", if on { '-' } else { '+' }, flag),
                        2,
                    );
                }
            }
        }
        i += 1;
    }

    if let Some(positional) = new_positional {
        state.positional = positional;
    }
    tracing::trace!(flags = %state.options.flags(), "set");
    ExecResult::ok()
}

pub fn handle_shopt(state: &mut InterpreterState, args: &[String]) -> ExecResult {
    let mut enable: Option<bool> = None;
    let mut print = false;
    let mut quiet = false;
    let mut set_options = false;
    let mut rest = args;
    while let Some(arg) = rest.first() {
        if !arg.starts_with('-') || arg.len() < 2 {
            break;
        }
        for c in arg[1..].chars() {
            match c {
                's' => enable = Some(true),
                'u' => enable = Some(false),
                'p' => print = true,
                'q' => quiet = true,
                'o' => set_options = true,
                _ => return ExecResult::failure_with_code(format!("bash: shopt: -{}: invalid option\n", c), 2),
            }
        }
        rest = &rest[1..];
    }

    let get = |state: &InterpreterState, name: &str| {
        if set_options {
            state.options.get(name)
        } else {
            state.shopt_options.get(name)
        }
    };
    let line = |name: &str, on: bool| match (print, set_options) {
        (true, true) => format!("set {}o {}\n", if on { '-' } else { '+' }, name),
        (true, false) => format!("shopt -{} {}\n", if on { 's' } else { 'u' }, name),
        _ => format!("{:<15}\t{}\n", name, if on { "on" } else { "off" }),
    };

    if rest.is_empty() {
        let names: Vec<&str> = if set_options {
            SET_OPTION_NAMES.iter().map(|(n, _)| *n).collect()
        } else {
            SHOPT_NAMES.to_vec()
        };
        let mut out = String::new();
        for name in names {
            let on = get(&*state, name).unwrap_or(false);
            if enable.map_or(true, |want| want == on) {
                out.push_str(&line(name, on));
            }
        }
        return ExecResult::success(if quiet { String::new() } else { out });
    }

    let mut out = String::new();
    let mut err = String::new();
    let mut all_on = true;
    for name in rest {
        match enable {
            Some(value) => {
                let known = if set_options {
                    state.options.set(name, value)
                } else {
                    state.shopt_options.set(name, value)
                };
                if !known {
                    err.push_str(&format!("bash: shopt: {}: invalid shell option name\n", name));
                }
            }
            None => match get(&*state, name) {
                Some(on) => {
                    all_on &= on;
                    if !quiet {
                        out.push_str(&line(name, on));
                    }
                }
                None => {
                    all_on = false;
                    err.push_str(&format!("bash: shopt: {}: invalid shell option name\n", name));
                }
            },
        }
    }
    let code = if !err.is_empty() || !all_on { 1 } else { 0 };
    ExecResult::new(out, err, code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_set_flags_and_positional() {
        let mut state = InterpreterState::default();
        assert_eq!(handle_set(&mut state, &args(&["-eu", "-o", "pipefail", "a", "b"])).exit_code, 0);
        assert!(state.options.errexit && state.options.nounset && state.options.pipefail);
        assert_eq!(state.positional, args(&["a", "b"]));
        handle_set(&mut state, &args(&["+e", "--"]));
        assert!(!state.options.errexit);
        assert!(state.positional.is_empty());
        handle_set(&mut state, &args(&["--", "-x", "y"]));
        assert_eq!(state.positional, args(&["-x", "y"]));
        assert!(!state.options.xtrace);
    }

    #[test]
    fn test_set_errors_and_listing() {
        let mut state = InterpreterState::default();
        let r = handle_set(&mut state, &args(&["-o", "bogus"]));
        assert_eq!(r.exit_code, 1);
        assert_eq!(r.stderr, "bash: set: bogus: invalid option name\n");
        assert_eq!(handle_set(&mut state, &args(&["-q"])).exit_code, 2);

        state.options.errexit = true;
        let listing = handle_set(&mut state, &args(&["-o"])).stdout;
        assert!(listing.contains("errexit        \ton\n"));
        assert!(handle_set(&mut state, &args(&["+o"])).stdout.contains("set -o errexit\n"));

        state.vars.set_scalar("greeting", "hello world").unwrap();
        assert!(handle_set(&mut state, &[]).stdout.contains("greeting='hello world'\n"));
    }

    #[test]
    fn test_shopt() {
        let mut state = InterpreterState::default();
        assert_eq!(handle_shopt(&mut state, &args(&["-s", "extglob", "nullglob"])).exit_code, 0);
        assert!(state.shopt_options.extglob && state.shopt_options.nullglob);
        let r = handle_shopt(&mut state, &args(&["-q", "extglob", "dotglob"]));
        assert_eq!(r.exit_code, 1);
        assert_eq!(r.stdout, "");
        assert_eq!(handle_shopt(&mut state, &args(&["-p", "extglob"])).stdout, "shopt -s extglob\n");
        let r = handle_shopt(&mut state, &args(&["-s", "nope"]));
        assert_eq!(r.stderr, "bash: shopt: nope: invalid shell option name\n");
        handle_shopt(&mut state, &args(&["-so", "pipefail"]));
        assert!(state.options.pipefail);
    }
}

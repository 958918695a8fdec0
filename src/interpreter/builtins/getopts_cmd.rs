//! getopts - Parse positional options
//!
//! getopts optstring name [arg ...]
//!
//! Keeps its place in `OPTIND` plus a character offset for clustered
//! options (`-abc`). A leading `:` in optstring selects silent error
//! reporting: `name` becomes `?` or `:` and `OPTARG` holds the option.

use crate::interpreter::types::{ExecResult, InterpreterState};
use crate::interpreter::variables::is_assignable;

enum Parsed {
    Option(char),
    WithArgument(char, String),
    Illegal(char),
    MissingArgument(char),
    End,
}

fn next_option(state: &mut InterpreterState, spec: &str, args: &[String], optind: &mut usize) -> Parsed {
    if state.getopts_charpos == 0 {
        let Some(arg) = args.get(*optind - 1) else {
            return Parsed::End;
        };
        if arg == "--" {
            *optind += 1;
            return Parsed::End;
        }
        if !arg.starts_with('-') || arg == "-" {
            return Parsed::End;
        }
        state.getopts_charpos = 1;
    }

    let chars: Vec<char> = args.get(*optind - 1).map(|a| a.chars().collect()).unwrap_or_default();
    let Some(&c) = chars.get(state.getopts_charpos) else {
        state.getopts_charpos = 0;
        return Parsed::End;
    };
    state.getopts_charpos += 1;
    let rest: String = chars[state.getopts_charpos..].iter().collect();
    if rest.is_empty() {
        *optind += 1;
        state.getopts_charpos = 0;
    }

    let position = if c == ':' { None } else { spec.find(c) };
    let Some(position) = position else {
        return Parsed::Illegal(c);
    };
    if !spec[position + c.len_utf8()..].starts_with(':') {
        return Parsed::Option(c);
    }
    if !rest.is_empty() {
        *optind += 1;
        state.getopts_charpos = 0;
        return Parsed::WithArgument(c, rest);
    }
    match args.get(*optind - 1) {
        Some(value) => {
            *optind += 1;
            Parsed::WithArgument(c, value.clone())
        }
        None => Parsed::MissingArgument(c),
    }
}

pub fn handle_getopts(state: &mut InterpreterState, args: &[String]) -> ExecResult {
    let (Some(optstring), Some(name)) = (args.first(), args.get(1)) else {
        return ExecResult::failure_with_code("getopts: usage: getopts optstring name [arg ...]\n", 2);
    };
    if !is_assignable(name) {
        return ExecResult::failure(format!("bash: getopts: `{}': not a valid identifier\n", name));
    }
    let params: Vec<String> = if args.len() > 2 { args[2..].to_vec() } else { state.positional.clone() };
    let silent = optstring.starts_with(':');
    let spec = optstring.trim_start_matches(':');

    let mut optind = state.vars.get_scalar("OPTIND").and_then(|v| v.trim().parse::<usize>().ok()).unwrap_or(1).max(1);
    if optind == 1 && state.getopts_charpos > 0 && params.first().map_or(true, |a| !a.starts_with('-')) {
        state.getopts_charpos = 0;
    }

    let parsed = next_option(state, spec, &params, &mut optind);
    let mut stderr = String::new();
    let (value, optarg, code) = match parsed {
        Parsed::Option(c) => (c.to_string(), None, 0),
        Parsed::WithArgument(c, arg) => (c.to_string(), Some(arg), 0),
        Parsed::Illegal(c) => {
            if silent {
                ("?".to_string(), Some(c.to_string()), 0)
            } else {
                stderr = format!("bash: illegal option -- {}\n", c);
                ("?".to_string(), None, 0)
            }
        }
        Parsed::MissingArgument(c) => {
            if silent {
                (":".to_string(), Some(c.to_string()), 0)
            } else {
                stderr = format!("bash: option requires an argument -- {}\n", c);
                ("?".to_string(), None, 0)
            }
        }
        Parsed::End => ("?".to_string(), None, 1),
    };

    let mut assign = || -> crate::interpreter::errors::InterpreterResult<()> {
        state.vars.set_scalar("OPTIND", optind.to_string())?;
        state.assign_scalar(name, &value, false)?;
        match &optarg {
            Some(arg) => state.vars.set_scalar("OPTARG", arg.clone())?,
            None => state.vars.unset("OPTARG")?,
        }
        Ok(())
    };
    if let Err(err) = assign() {
        return ExecResult::failure(err.to_stderr());
    }
    ExecResult::new(String::new(), stderr, code)
}

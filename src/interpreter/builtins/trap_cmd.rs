//! trap - Register commands to run on shell conditions
//!
//! trap [-lp] [[action] condition ...]
//!
//! EXIT fires when the shell (or a subshell) ends and ERR after a failing
//! command. Signal conditions are recorded and listed but never fire,
//! since no signals are delivered.

use crate::interpreter::expansion::quoting::quote_for_reuse;
use crate::interpreter::types::{ExecResult, InterpreterState};

const SIGNALS: &[(i32, &str)] = &[
    (1, "HUP"),
    (2, "INT"),
    (3, "QUIT"),
    (6, "ABRT"),
    (9, "KILL"),
    (10, "USR1"),
    (12, "USR2"),
    (13, "PIPE"),
    (14, "ALRM"),
    (15, "TERM"),
    (17, "CHLD"),
    (18, "CONT"),
    (19, "STOP"),
    (20, "TSTP"),
    (28, "WINCH"),
];

const PSEUDO_SIGNALS: &[&str] = &["EXIT", "ERR", "DEBUG", "RETURN"];

/// Canonical condition name: `SIGINT`, `int` and `2` all become `INT`.
pub fn normalize_condition(spec: &str) -> Option<String> {
    if let Ok(n) = spec.parse::<i32>() {
        if n == 0 {
            return Some("EXIT".to_string());
        }
        return SIGNALS.iter().find(|(num, _)| *num == n).map(|(_, name)| name.to_string());
    }
    let upper = spec.to_ascii_uppercase();
    let name = upper.strip_prefix("SIG").unwrap_or(&upper);
    if PSEUDO_SIGNALS.contains(&name) || SIGNALS.iter().any(|(_, s)| *s == name) {
        Some(name.to_string())
    } else {
        None
    }
}

fn display_name(condition: &str) -> String {
    if PSEUDO_SIGNALS.contains(&condition) {
        condition.to_string()
    } else {
        format!("SIG{}", condition)
    }
}

fn trap_line(condition: &str, action: &str) -> String {
    format!("trap -- {} {}\n", quote_for_reuse(action), display_name(condition))
}

pub fn handle_trap(state: &mut InterpreterState, args: &[String]) -> ExecResult {
    let mut rest = args;
    let mut print = false;
    match rest.first().map(String::as_str) {
        Some("-l") => {
            let out: Vec<String> = SIGNALS.iter().map(|(n, s)| format!("{}) SIG{}", n, s)).collect();
            return ExecResult::success(format!("{}\n", out.join(" ")));
        }
        Some("-p") => {
            print = true;
            rest = &rest[1..];
        }
        Some("--") => rest = &rest[1..],
        _ => {}
    }

    if rest.is_empty() || print {
        let mut names: Vec<String> = if rest.is_empty() {
            state.traps.keys().cloned().collect()
        } else {
            rest.iter().filter_map(|s| normalize_condition(s)).collect()
        };
        names.sort();
        let mut out = String::new();
        for name in names {
            if let Some(action) = state.traps.get(&name) {
                out.push_str(&trap_line(&name, action));
            }
        }
        return ExecResult::success(out);
    }

    // A lone condition, or `-` as the action, resets.
    let (action, conditions) = if rest.len() == 1 || rest[0] == "-" {
        let conditions = if rest[0] == "-" { &rest[1..] } else { rest };
        (None, conditions)
    } else {
        (Some(rest[0].as_str()), &rest[1..])
    };

    let mut stderr = String::new();
    for spec in conditions {
        match normalize_condition(spec) {
            Some(name) => {
                tracing::debug!(condition = %name, action = ?action, "trap");
                match action {
                    Some(action) => {
                        state.traps.insert(name, action.to_string());
                    }
                    None => {
                        state.traps.remove(&name);
                    }
                }
            }
            None => stderr.push_str(&format!("bash: trap: {}: invalid signal specification\n", spec)),
        }
    }
    let code = if stderr.is_empty() { 0 } else { 1 };
    ExecResult::new(String::new(), stderr, code)
}

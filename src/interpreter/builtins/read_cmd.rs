//! read and mapfile/readarray
//!
//! Both consume the shell's current input (`state.stdin`): whatever a
//! pipeline, here-document or `<` redirection provided. Without input
//! they see end of file.

use std::collections::BTreeMap;

use crate::interpreter::errors::InterpreterResult;
use crate::interpreter::expansion::word_split::{split_for_read, DEFAULT_IFS};
use crate::interpreter::types::{ExecResult, InterpreterState};
use crate::interpreter::variables::{is_assignable, VarValue};
use crate::parser::types::is_valid_name;

#[derive(Debug)]
struct ReadOptions {
    raw: bool,
    array: Option<String>,
    delimiter: char,
    /// -n: stop after this many characters or at the delimiter
    max_chars: Option<usize>,
    /// -N: exactly this many characters, delimiter ignored
    exact_chars: Option<usize>,
    names: Vec<String>,
}

/// Splits `-abc value` style option clusters. `with_value` lists the
/// letters that take an argument.
fn parse_cluster<'a>(
    args: &'a [String],
    with_value: &str,
    mut on_option: impl FnMut(char, Option<&'a str>) -> Result<(), String>,
) -> Result<usize, String> {
    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        if arg == "--" {
            return Ok(i + 1);
        }
        if !arg.starts_with('-') || arg.len() < 2 {
            break;
        }
        let body = &arg[1..];
        for (pos, c) in body.char_indices() {
            if with_value.contains(c) {
                let inline = &body[pos + c.len_utf8()..];
                let value = if !inline.is_empty() {
                    inline
                } else {
                    i += 1;
                    match args.get(i) {
                        Some(v) => v.as_str(),
                        None => return Err(format!("-{}: option requires an argument", c)),
                    }
                };
                on_option(c, Some(value))?;
                break;
            }
            on_option(c, None)?;
        }
        i += 1;
    }
    Ok(i)
}

fn parse_count(value: &str) -> Result<usize, String> {
    value.trim().parse::<usize>().map_err(|_| format!("{}: invalid number", value))
}

fn parse_read_options(args: &[String]) -> Result<ReadOptions, String> {
    let mut opts = ReadOptions {
        raw: false,
        array: None,
        delimiter: '\n',
        max_chars: None,
        exact_chars: None,
        names: Vec::new(),
    };
    let consumed = parse_cluster(args, "adnNptu", |c, value| {
        let value = value.unwrap_or("");
        match c {
            'r' => opts.raw = true,
            's' => {}
            'a' => opts.array = Some(value.to_string()),
            'd' => opts.delimiter = value.chars().next().unwrap_or('\0'),
            'n' => opts.max_chars = Some(parse_count(value)?),
            'N' => opts.exact_chars = Some(parse_count(value)?),
            // Prompt, timeout and descriptor have no effect on captured input.
            'p' | 't' | 'u' => {}
            _ => return Err(format!("-{}: invalid option", c)),
        }
        Ok(())
    })?;
    opts.names = args[consumed..].to_vec();
    Ok(opts)
}

/// Takes one record from `input`. Returns the text, the unconsumed rest,
/// and whether the record ended at its delimiter (false at end of file).
fn take_record(input: &str, opts: &ReadOptions) -> (String, String, bool) {
    let mut out = String::new();
    let mut chars = input.char_indices();
    let mut count = 0;
    let limit = opts.exact_chars.or(opts.max_chars);
    while let Some((pos, c)) = chars.next() {
        if limit.map_or(false, |n| count >= n) {
            return (out, input[pos..].to_string(), true);
        }
        if opts.exact_chars.is_none() && c == opts.delimiter {
            let rest = input[pos + c.len_utf8()..].to_string();
            return (out, rest, true);
        }
        if c == '\\' && !opts.raw {
            match chars.next() {
                // Line continuation
                Some((_, '\n')) => continue,
                Some((_, escaped)) => {
                    out.push(escaped);
                    count += 1;
                    continue;
                }
                None => break,
            }
        }
        out.push(c);
        count += 1;
    }
    let complete = limit.map_or(false, |n| count >= n);
    (out, String::new(), complete)
}

pub fn handle_read(state: &mut InterpreterState, args: &[String]) -> InterpreterResult<ExecResult> {
    let opts = match parse_read_options(args) {
        Ok(opts) => opts,
        Err(msg) => return Ok(ExecResult::failure_with_code(format!("bash: read: {}\n", msg), 2)),
    };
    for name in opts.names.iter().chain(opts.array.iter()) {
        if !is_assignable(name) {
            return Ok(ExecResult::failure(format!("bash: read: `{}': not a valid identifier\n", name)));
        }
    }

    let input = state.stdin.take().unwrap_or_default();
    let at_eof = input.is_empty();
    let (line, rest, complete) = take_record(&input, &opts);
    state.stdin = Some(rest);

    let ifs = match state.vars.get("IFS") {
        Some(var) if var.is_set() => state.vars.get_scalar("IFS").unwrap_or_default(),
        _ => DEFAULT_IFS.to_string(),
    };

    if let Some(array) = &opts.array {
        let fields = split_for_read(&line, &ifs, usize::MAX);
        let map: BTreeMap<i64, String> = fields.into_iter().enumerate().map(|(i, f)| (i as i64, f)).collect();
        state.vars.set_value(array, VarValue::Indexed(map))?;
    } else if opts.names.is_empty() {
        state.assign_scalar("REPLY", &line, false)?;
    } else {
        let mut fields = split_for_read(&line, &ifs, opts.names.len()).into_iter();
        for name in &opts.names {
            let value = fields.next().unwrap_or_default();
            state.assign_scalar(name, &value, false)?;
        }
    }

    Ok(ExecResult::with_code(if at_eof || !complete { 1 } else { 0 }))
}

/// mapfile [-t] [-d delim] [-n count] [-O origin] [-s count] [array]
pub fn handle_mapfile(state: &mut InterpreterState, args: &[String]) -> InterpreterResult<ExecResult> {
    let mut strip = false;
    let mut delimiter = '\n';
    let mut max_lines = 0usize;
    let mut skip = 0usize;
    let mut origin: Option<i64> = None;
    let parsed = parse_cluster(args, "dnOsuCc", |c, value| {
        let value = value.unwrap_or("");
        match c {
            't' => strip = true,
            'd' => delimiter = value.chars().next().unwrap_or('\0'),
            'n' => max_lines = parse_count(value)?,
            's' => skip = parse_count(value)?,
            'O' => origin = Some(parse_count(value)? as i64),
            'u' | 'C' | 'c' => {}
            _ => return Err(format!("-{}: invalid option", c)),
        }
        Ok(())
    });
    let consumed = match parsed {
        Ok(n) => n,
        Err(msg) => return Ok(ExecResult::failure_with_code(format!("bash: mapfile: {}\n", msg), 2)),
    };
    let name = args.get(consumed).map(String::as_str).unwrap_or("MAPFILE");
    if !is_valid_name(name) {
        return Ok(ExecResult::failure(format!("bash: mapfile: `{}': not a valid identifier\n", name)));
    }

    let input = state.stdin.take().unwrap_or_default();
    let mut records = Vec::new();
    let mut current = String::new();
    for c in input.chars() {
        if c == delimiter {
            if !strip {
                current.push(c);
            }
            records.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        records.push(current);
    }
    state.stdin = Some(String::new());

    let records = records.into_iter().skip(skip);
    let records: Vec<String> = if max_lines > 0 { records.take(max_lines).collect() } else { records.collect() };

    let start = origin.unwrap_or(0);
    if origin.is_none() {
        state.vars.set_value(name, VarValue::Indexed(BTreeMap::new()))?;
    }
    for (i, record) in records.into_iter().enumerate() {
        state.vars.set_element(name, start + i as i64, record)?;
    }
    Ok(ExecResult::ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn with_input(input: &str) -> InterpreterState {
        let mut state = InterpreterState::default();
        state.stdin = Some(input.to_string());
        state
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn var(state: &InterpreterState, name: &str) -> String {
        state.vars.get_scalar(name).unwrap_or_default()
    }

    #[test]
    fn test_read_splits_into_names() {
        let mut state = with_input("  one two three four\nnext\n");
        let r = handle_read(&mut state, &args(&["a", "b"])).unwrap();
        assert_eq!(r.exit_code, 0);
        assert_eq!(var(&state, "a"), "one");
        assert_eq!(var(&state, "b"), "two three four");
        assert_eq!(state.stdin.as_deref(), Some("next\n"));
        handle_read(&mut state, &[]).unwrap();
        assert_eq!(var(&state, "REPLY"), "next");
        assert_eq!(handle_read(&mut state, &args(&["x"])).unwrap().exit_code, 1);
    }

    #[test]
    fn test_read_backslashes() {
        let mut state = with_input("a\\qb c\\\nd\n");
        handle_read(&mut state, &args(&["x", "y"])).unwrap();
        assert_eq!(var(&state, "x"), "aqb");
        assert_eq!(var(&state, "y"), "cd");

        let mut state = with_input("a\\tb\n");
        handle_read(&mut state, &args(&["-r", "x"])).unwrap();
        assert_eq!(var(&state, "x"), "a\\tb");
    }

    #[test]
    fn test_read_options() {
        let mut state = with_input("x:y:z");
        state.vars.set_scalar("IFS", ":").unwrap();
        let r = handle_read(&mut state, &args(&["-a", "parts"])).unwrap();
        assert_eq!(r.exit_code, 1);
        assert_eq!(state.vars.get("parts").unwrap().values(), vec!["x", "y", "z"]);

        let mut state = with_input("abcdef");
        handle_read(&mut state, &args(&["-n3", "v"])).unwrap();
        assert_eq!(var(&state, "v"), "abc");
        assert_eq!(state.stdin.as_deref(), Some("def"));

        let mut state = with_input("a;b");
        assert_eq!(handle_read(&mut state, &args(&["-d", ";", "v"])).unwrap().exit_code, 0);
        assert_eq!(var(&state, "v"), "a");
    }

    #[test]
    fn test_read_partial_line_at_eof() {
        let mut state = with_input("last");
        let r = handle_read(&mut state, &args(&["v"])).unwrap();
        assert_eq!(r.exit_code, 1);
        assert_eq!(var(&state, "v"), "last");
    }

    #[test]
    fn test_mapfile() {
        let mut state = with_input("a\nb\nc\n");
        handle_mapfile(&mut state, &args(&["-t", "lines"])).unwrap();
        assert_eq!(state.vars.get("lines").unwrap().values(), vec!["a", "b", "c"]);

        let mut state = with_input("a\nb\nc\n");
        handle_mapfile(&mut state, &args(&["-s", "1", "-n", "1"])).unwrap();
        assert_eq!(state.vars.get("MAPFILE").unwrap().values(), vec!["b\n"]);
    }
}

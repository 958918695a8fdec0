//! declare, typeset, local, export and readonly
//!
//! declare [-aAfFgilnprux] [name[=value] ...]
//!
//! `-` sets an attribute and `+` removes it. Attributes are applied
//! before the value (so `-i` and `-A` shape the assignment) and
//! `readonly` after it. Inside a function, `declare` and `local` create
//! locals unless `-g` is given.

use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::interpreter::errors::{InterpreterError, InterpreterResult};
use crate::interpreter::execution_engine::Interpreter;
use crate::interpreter::expansion::parameter::declare_statement;
use crate::interpreter::expansion::quoting::quote_if_needed;
use crate::interpreter::types::ExecResult;
use crate::interpreter::variables::{split_subscript, VarValue, Variable};
use crate::parser::parse_array_literal;
use crate::parser::parser::split_assignment_word;
use crate::parser::types::is_valid_name;

/// Requested attribute changes: `Some(true)` sets, `Some(false)` clears.
#[derive(Debug, Default, Clone, Copy)]
struct AttrChanges {
    indexed: bool,
    assoc: bool,
    integer: Option<bool>,
    lowercase: Option<bool>,
    uppercase: Option<bool>,
    nameref: Option<bool>,
    readonly: Option<bool>,
    exported: Option<bool>,
}

impl AttrChanges {
    fn any(&self) -> bool {
        self.indexed
            || self.assoc
            || self.integer.is_some()
            || self.lowercase.is_some()
            || self.uppercase.is_some()
            || self.nameref.is_some()
            || self.readonly.is_some()
            || self.exported.is_some()
    }

    /// Listing filter: every requested attribute must be present.
    fn matches(&self, var: &Variable) -> bool {
        let a = &var.attrs;
        (!self.indexed || var.is_indexed())
            && (!self.assoc || var.is_assoc())
            && self.integer.map_or(true, |on| a.integer == on)
            && self.lowercase.map_or(true, |on| a.lowercase == on)
            && self.uppercase.map_or(true, |on| a.uppercase == on)
            && self.nameref.map_or(true, |on| a.nameref == on)
            && self.readonly.map_or(true, |on| a.readonly == on)
            && self.exported.map_or(true, |on| a.exported == on)
    }
}

#[derive(Debug, Default)]
struct DeclareOptions {
    changes: AttrChanges,
    global: bool,
    print: bool,
    functions: bool,
    function_names: bool,
}

fn parse_options<'a>(builtin: &str, args: &'a [String]) -> Result<(DeclareOptions, &'a [String]), ExecResult> {
    let mut opts = DeclareOptions::default();
    match builtin {
        "export" => opts.changes.exported = Some(true),
        "readonly" => opts.changes.readonly = Some(true),
        _ => {}
    }
    let mut rest = args;
    while let Some(arg) = rest.first() {
        if arg == "--" {
            rest = &rest[1..];
            break;
        }
        let on = match arg.chars().next() {
            Some('-') => true,
            Some('+') => false,
            _ => break,
        };
        if arg.len() < 2 {
            break;
        }
        for c in arg[1..].chars() {
            if builtin == "export" && c == 'n' {
                opts.changes.exported = Some(false);
                continue;
            }
            match c {
                'a' => opts.changes.indexed = on,
                'A' => opts.changes.assoc = on,
                'i' => opts.changes.integer = Some(on),
                'l' => {
                    opts.changes.lowercase = Some(on);
                    if on {
                        opts.changes.uppercase = Some(false);
                    }
                }
                'u' => {
                    opts.changes.uppercase = Some(on);
                    if on {
                        opts.changes.lowercase = Some(false);
                    }
                }
                'n' => opts.changes.nameref = Some(on),
                'r' => opts.changes.readonly = Some(on),
                'x' => opts.changes.exported = Some(on),
                'g' => opts.global = true,
                'p' => opts.print = true,
                'f' => opts.functions = true,
                'F' => opts.function_names = true,
                _ => {
                    return Err(ExecResult::failure_with_code(
                        format!("bash: {}: {}{}: invalid option\n", builtin, if on { '-' } else { '+' }, c),
                        2,
                    ));
                }
            }
        }
        rest = &rest[1..];
    }
    Ok((opts, rest))
}

fn listing_line(name: &str, var: &Variable, as_statement: bool) -> String {
    if as_statement {
        return format!("{}\n", declare_statement(name, var));
    }
    match &var.value {
        Some(VarValue::Scalar(s)) => format!("{}={}\n", name, quote_if_needed(s)),
        Some(_) => {
            let full = declare_statement(name, var);
            // "declare -a name=(...)" -> "name=(...)"
            let tail = full.splitn(3, ' ').nth(2).unwrap_or(&full).to_string();
            format!("{}\n", tail)
        }
        None => String::new(),
    }
}

impl Interpreter {
    pub(crate) async fn builtin_declare(&mut self, builtin: &'static str, args: &[String]) -> InterpreterResult<ExecResult> {
        let (opts, operands) = match parse_options(builtin, args) {
            Ok(parsed) => parsed,
            Err(result) => return Ok(result),
        };
        let in_function = self.state.vars.in_function();
        if builtin == "local" && !in_function {
            return Ok(ExecResult::failure("bash: local: can only be used in a function\n"));
        }

        if opts.functions || opts.function_names {
            return Ok(self.declare_functions(builtin, operands));
        }
        if operands.is_empty() {
            return Ok(self.declare_listing(builtin, &opts));
        }
        if opts.print {
            return Ok(self.declare_print(builtin, operands));
        }

        let make_local = in_function && !opts.global && matches!(builtin, "declare" | "typeset" | "local");
        let mut stderr = String::new();
        let mut status = 0;
        for operand in operands {
            if let Err(err) = self.declare_one(operand, &opts, make_local).await {
                if err.is_fatal() {
                    return Err(err);
                }
                stderr.push_str(&format!("bash: {}: {}\n", builtin, err));
                status = 1;
            }
        }
        Ok(ExecResult::new(String::new(), stderr, status))
    }

    async fn declare_one(
        &mut self,
        operand: &str,
        opts: &DeclareOptions,
        make_local: bool,
    ) -> InterpreterResult<()> {
        let (lhs, append, value) = match split_assignment_word(operand) {
            Some((lhs, append, value)) => (lhs, append, Some(value)),
            None => (operand, false, None),
        };
        let base = split_subscript(lhs).map_or(lhs, |(base, _)| base);
        if !is_valid_name(base) {
            return Err(InterpreterError::Runtime(format!("`{}': not a valid identifier", operand)));
        }

        let changes = opts.changes;
        if self.state.vars.attrs(base).readonly && (value.is_some() || changes.readonly == Some(false)) {
            return Err(InterpreterError::Readonly(base.to_string()));
        }

        let binding = if make_local {
            self.state.vars.declare_local(base)
        } else if opts.global {
            self.state.vars.global_frame(base)
        } else if changes.nameref.is_some() {
            self.state.vars.declare_global_raw(base)
        } else {
            self.state.vars.declare_global(base)
        };
        apply_attributes(binding, &changes);

        if let Some(value) = value {
            if binding.attrs.nameref {
                binding.value = Some(VarValue::Scalar(value.to_string()));
            } else if value.len() >= 2 && value.starts_with('(') && value.ends_with(')') && lhs == base {
                let elements = parse_array_literal(&value[1..value.len() - 1], self.state.current_line)
                    .map_err(|e| InterpreterError::Syntax(e.to_string()))?;
                self.assign_array(base, &elements, append).await?;
            } else {
                self.state.assign_scalar(lhs, value, append)?;
            }
        }

        if changes.readonly == Some(true) {
            self.state.vars.declare_global(base).attrs.readonly = true;
        }
        Ok(())
    }

    fn declare_listing(&mut self, builtin: &str, opts: &DeclareOptions) -> ExecResult {
        let locals_only = builtin == "local";
        let as_statement = opts.print || opts.changes.any();
        let mut out = String::new();
        for (name, var) in self.state.vars.visible() {
            if locals_only && !self.state.vars.is_local(&name) {
                continue;
            }
            if !opts.changes.matches(var) {
                continue;
            }
            out.push_str(&listing_line(&name, var, as_statement));
        }
        ExecResult::success(out)
    }

    fn declare_print(&mut self, builtin: &str, names: &[String]) -> ExecResult {
        let mut out = String::new();
        let mut err = String::new();
        for name in names {
            match self.state.vars.get_raw(name) {
                Some(var) => {
                    out.push_str(&declare_statement(name, var));
                    out.push('\n');
                }
                None => err.push_str(&format!("bash: {}: {}: not found\n", builtin, name)),
            }
        }
        let code = if err.is_empty() { 0 } else { 1 };
        ExecResult::new(out, err, code)
    }

    /// `declare -f`/`-F`: function names only; bodies are not kept as text.
    fn declare_functions(&mut self, builtin: &str, names: &[String]) -> ExecResult {
        let mut out = String::new();
        let mut status = 0;
        if names.is_empty() {
            let mut all: Vec<&String> = self.state.functions.keys().collect();
            all.sort();
            for name in all {
                out.push_str(&format!("declare -f {}\n", name));
            }
            return ExecResult::success(out);
        }
        for name in names {
            if self.state.functions.contains_key(name.as_str()) {
                if builtin == "declare" || builtin == "typeset" {
                    out.push_str(&format!("{}\n", name));
                }
            } else {
                status = 1;
            }
        }
        ExecResult::new(out, String::new(), status)
    }
}

fn apply_attributes(var: &mut Variable, changes: &AttrChanges) {
    if changes.assoc {
        match var.value.take() {
            Some(VarValue::Assoc(map)) => var.value = Some(VarValue::Assoc(map)),
            Some(VarValue::Scalar(s)) if !s.is_empty() => {
                var.value = Some(VarValue::Assoc(IndexMap::from([("0".to_string(), s)])));
            }
            _ => var.value = Some(VarValue::Assoc(IndexMap::new())),
        }
    } else if changes.indexed {
        match var.value.take() {
            Some(VarValue::Scalar(s)) => var.value = Some(VarValue::Indexed(BTreeMap::from([(0, s)]))),
            Some(other) => var.value = Some(other),
            None => var.value = Some(VarValue::Indexed(BTreeMap::new())),
        }
    }
    let attrs = &mut var.attrs;
    if let Some(on) = changes.integer {
        attrs.integer = on;
    }
    if let Some(on) = changes.lowercase {
        attrs.lowercase = on;
    }
    if let Some(on) = changes.uppercase {
        attrs.uppercase = on;
    }
    if let Some(on) = changes.nameref {
        attrs.nameref = on;
    }
    if let Some(on) = changes.exported {
        attrs.exported = on;
    }
    // readonly is set after the value; clearing it is refused earlier.
}

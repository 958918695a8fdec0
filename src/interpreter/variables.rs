//! Variable Store
//!
//! Scoped variable table. `scopes[0]` is the global scope; every function
//! call pushes a frame. Lookups walk the frames top-down (dynamic scoping),
//! so a callee sees its caller's locals. `local` inserts into the top frame,
//! shadowing outer definitions until the frame is popped.
//!
//! Assignments to names that exist nowhere create globals. Namerefs are
//! followed on every access except the `*_raw` methods.

use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::interpreter::errors::{InterpreterError, InterpreterResult};
use crate::interpreter::types::InterpreterState;
use crate::parser::types::is_valid_name;

const MAX_NAMEREF_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarValue {
    Scalar(String),
    /// Sparse, ordered by index
    Indexed(BTreeMap<i64, String>),
    /// Ordered by insertion
    Assoc(IndexMap<String, String>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VarAttributes {
    pub exported: bool,
    pub readonly: bool,
    pub integer: bool,
    pub uppercase: bool,
    pub lowercase: bool,
    pub nameref: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variable {
    /// None: declared (or local) but unset
    pub value: Option<VarValue>,
    pub attrs: VarAttributes,
}

impl Variable {
    pub fn scalar(value: impl Into<String>) -> Self {
        Self { value: Some(VarValue::Scalar(value.into())), attrs: VarAttributes::default() }
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self.value, Some(VarValue::Indexed(_)))
    }

    pub fn is_assoc(&self) -> bool {
        matches!(self.value, Some(VarValue::Assoc(_)))
    }

    /// Scalar view: arrays decay to element `0` (key "0" for assoc).
    pub fn as_scalar(&self) -> Option<String> {
        match &self.value {
            Some(VarValue::Scalar(s)) => Some(s.clone()),
            Some(VarValue::Indexed(map)) => map.get(&0).cloned(),
            Some(VarValue::Assoc(map)) => map.get("0").cloned(),
            None => None,
        }
    }

    /// All element values in index/insertion order; a scalar is one element.
    pub fn values(&self) -> Vec<String> {
        match &self.value {
            Some(VarValue::Scalar(s)) => vec![s.clone()],
            Some(VarValue::Indexed(map)) => map.values().cloned().collect(),
            Some(VarValue::Assoc(map)) => map.values().cloned().collect(),
            None => Vec::new(),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        match &self.value {
            Some(VarValue::Scalar(_)) => vec!["0".to_string()],
            Some(VarValue::Indexed(map)) => map.keys().map(|k| k.to_string()).collect(),
            Some(VarValue::Assoc(map)) => map.keys().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// `-a`/`-A`/`-i`... flags in the order `declare -p` prints them.
    pub fn attribute_flags(&self) -> String {
        let mut out = String::new();
        if self.is_indexed() {
            out.push('a');
        }
        if self.is_assoc() {
            out.push('A');
        }
        let a = &self.attrs;
        for (on, c) in [(a.integer, 'i'), (a.lowercase, 'l'), (a.nameref, 'n'), (a.readonly, 'r'), (a.uppercase, 'u'), (a.exported, 'x')] {
            if on {
                out.push(c);
            }
        }
        out
    }
}

fn apply_case(attrs: &VarAttributes, value: String) -> String {
    if attrs.uppercase {
        value.to_uppercase()
    } else if attrs.lowercase {
        value.to_lowercase()
    } else {
        value
    }
}

#[derive(Debug, Clone)]
pub struct VariableStore {
    scopes: Vec<HashMap<String, Variable>>,
}

impl Default for VariableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableStore {
    pub fn new() -> Self {
        Self { scopes: vec![HashMap::new()] }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// True inside a function call frame.
    pub fn in_function(&self) -> bool {
        self.scopes.len() > 1
    }

    fn frame_of(&self, name: &str) -> Option<usize> {
        (0..self.scopes.len()).rev().find(|&i| self.scopes[i].contains_key(name))
    }

    /// Lookup without following namerefs.
    pub fn get_raw(&self, name: &str) -> Option<&Variable> {
        self.frame_of(name).and_then(|i| self.scopes[i].get(name))
    }

    /// Follow a nameref chain to the name that actually holds the value.
    pub fn resolve_name(&self, name: &str) -> String {
        let mut current = name.to_string();
        for _ in 0..MAX_NAMEREF_DEPTH {
            match self.get_raw(&current) {
                Some(var) if var.attrs.nameref => match &var.value {
                    Some(VarValue::Scalar(target)) if !target.is_empty() && target != &current => {
                        current = target.clone();
                    }
                    _ => break,
                },
                _ => break,
            }
        }
        current
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.get_raw(&self.resolve_name(name))
    }

    pub fn get_scalar(&self, name: &str) -> Option<String> {
        self.get(name).and_then(Variable::as_scalar)
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).map_or(false, Variable::is_set)
    }

    pub fn attrs(&self, name: &str) -> VarAttributes {
        self.get(name).map(|v| v.attrs).unwrap_or_default()
    }

    /// The variable a write should land in: existing binding in the
    /// nearest frame, otherwise a new global.
    fn writable(&mut self, name: &str) -> InterpreterResult<&mut Variable> {
        let resolved = self.resolve_name(name);
        let frame = self.frame_of(&resolved).unwrap_or(0);
        let var = self.scopes[frame].entry(resolved.clone()).or_default();
        if var.attrs.readonly {
            return Err(InterpreterError::Readonly(resolved));
        }
        Ok(var)
    }

    /// Scalar assignment. Arrays keep their type and get element 0 replaced.
    pub fn set_scalar(&mut self, name: &str, value: impl Into<String>) -> InterpreterResult<()> {
        let var = self.writable(name)?;
        let value = apply_case(&var.attrs, value.into());
        match &mut var.value {
            Some(VarValue::Indexed(map)) => {
                map.insert(0, value);
            }
            Some(VarValue::Assoc(map)) => {
                map.insert("0".to_string(), value);
            }
            slot => *slot = Some(VarValue::Scalar(value)),
        }
        Ok(())
    }

    /// `name+=value` on a scalar (or element 0 of an array).
    pub fn append_scalar(&mut self, name: &str, suffix: &str) -> InterpreterResult<()> {
        let current = self.get_scalar(name).unwrap_or_default();
        self.set_scalar(name, format!("{}{}", current, suffix))
    }

    pub fn set_element(&mut self, name: &str, index: i64, value: impl Into<String>) -> InterpreterResult<()> {
        let var = self.writable(name)?;
        let value = apply_case(&var.attrs, value.into());
        match &mut var.value {
            Some(VarValue::Indexed(map)) => {
                map.insert(index, value);
            }
            Some(VarValue::Assoc(map)) => {
                map.insert(index.to_string(), value);
            }
            slot => {
                let mut map = BTreeMap::new();
                if let Some(VarValue::Scalar(s)) = slot.take() {
                    map.insert(0, s);
                }
                map.insert(index, value);
                *slot = Some(VarValue::Indexed(map));
            }
        }
        Ok(())
    }

    pub fn set_assoc_element(&mut self, name: &str, key: &str, value: impl Into<String>) -> InterpreterResult<()> {
        let var = self.writable(name)?;
        let value = apply_case(&var.attrs, value.into());
        match &mut var.value {
            Some(VarValue::Assoc(map)) => {
                map.insert(key.to_string(), value);
            }
            slot => {
                let mut map = IndexMap::new();
                map.insert(key.to_string(), value);
                *slot = Some(VarValue::Assoc(map));
            }
        }
        Ok(())
    }

    /// Replace the whole value (array literal assignment).
    pub fn set_value(&mut self, name: &str, value: VarValue) -> InterpreterResult<()> {
        let var = self.writable(name)?;
        let attrs = var.attrs;
        var.value = Some(match value {
            VarValue::Scalar(s) => VarValue::Scalar(apply_case(&attrs, s)),
            VarValue::Indexed(map) => {
                VarValue::Indexed(map.into_iter().map(|(k, v)| (k, apply_case(&attrs, v))).collect())
            }
            VarValue::Assoc(map) => {
                VarValue::Assoc(map.into_iter().map(|(k, v)| (k, apply_case(&attrs, v))).collect())
            }
        });
        Ok(())
    }

    /// `arr+=(a b)`: append after the highest index.
    pub fn append_elements(&mut self, name: &str, values: Vec<String>) -> InterpreterResult<()> {
        let mut next = self.next_index(name);
        for value in values {
            self.set_element(name, next, value)?;
            next += 1;
        }
        Ok(())
    }

    /// One past the highest index; a scalar counts as element 0.
    pub fn next_index(&self, name: &str) -> i64 {
        match self.get(name).and_then(|v| v.value.as_ref()) {
            Some(VarValue::Indexed(map)) => map.keys().next_back().map_or(0, |k| k + 1),
            Some(VarValue::Scalar(_)) => 1,
            Some(VarValue::Assoc(map)) => map.len() as i64,
            None => 0,
        }
    }

    pub fn unset(&mut self, name: &str) -> InterpreterResult<()> {
        let resolved = self.resolve_name(name);
        self.unset_exact(&resolved)
    }

    /// `unset -n`: remove the nameref itself.
    pub fn unset_raw(&mut self, name: &str) -> InterpreterResult<()> {
        self.unset_exact(name)
    }

    fn unset_exact(&mut self, name: &str) -> InterpreterResult<()> {
        let Some(frame) = self.frame_of(name) else {
            return Ok(());
        };
        let top = self.scopes.len() - 1;
        let scope = &mut self.scopes[frame];
        if scope.get(name).map_or(false, |v| v.attrs.readonly) {
            return Err(InterpreterError::Readonly(name.to_string()));
        }
        if frame > 0 && frame == top {
            // A local stays declared so the outer binding remains hidden.
            if let Some(var) = scope.get_mut(name) {
                var.value = None;
            }
        } else {
            scope.remove(name);
        }
        Ok(())
    }

    pub fn unset_element(&mut self, name: &str, index: i64) -> InterpreterResult<()> {
        if self.get(name).is_none() {
            return Ok(());
        }
        let var = self.writable(name)?;
        match &mut var.value {
            Some(VarValue::Indexed(map)) => {
                map.remove(&index);
            }
            Some(VarValue::Scalar(_)) if index == 0 => var.value = None,
            _ => {}
        }
        Ok(())
    }

    pub fn unset_assoc_element(&mut self, name: &str, key: &str) -> InterpreterResult<()> {
        if self.get(name).is_none() {
            return Ok(());
        }
        let var = self.writable(name)?;
        if let Some(VarValue::Assoc(map)) = &mut var.value {
            map.shift_remove(key);
        }
        Ok(())
    }

    /// Binding in the top frame for `local`/`declare` inside a function,
    /// created unset when missing.
    pub fn declare_local(&mut self, name: &str) -> &mut Variable {
        let top = self.scopes.len() - 1;
        self.scopes[top].entry(name.to_string()).or_default()
    }

    /// Binding in the nearest frame holding it, or a new global.
    pub fn declare_global(&mut self, name: &str) -> &mut Variable {
        let resolved = self.resolve_name(name);
        let frame = self.frame_of(&resolved).unwrap_or(0);
        self.scopes[frame].entry(resolved).or_default()
    }

    /// Like `declare_global` but without following namerefs (`declare -n`).
    pub fn declare_global_raw(&mut self, name: &str) -> &mut Variable {
        let frame = self.frame_of(name).unwrap_or(0);
        self.scopes[frame].entry(name.to_string()).or_default()
    }

    /// Binding in the global frame only (`declare -g`).
    pub fn global_frame(&mut self, name: &str) -> &mut Variable {
        self.scopes[0].entry(name.to_string()).or_default()
    }

    /// Whether the name is declared in the current function frame.
    pub fn is_local(&self, name: &str) -> bool {
        self.in_function() && self.scopes.last().map_or(false, |s| s.contains_key(name))
    }

    /// Visible bindings (innermost wins), sorted by name.
    pub fn visible(&self) -> BTreeMap<String, &Variable> {
        let mut out = BTreeMap::new();
        for scope in &self.scopes {
            for (name, var) in scope {
                out.insert(name.clone(), var);
            }
        }
        out
    }

    /// Environment handed to external commands: exported, set scalars.
    /// Arrays are never exported.
    pub fn exported_env(&self) -> HashMap<String, String> {
        self.visible()
            .into_iter()
            .filter(|(_, v)| v.attrs.exported)
            .filter_map(|(name, v)| match &v.value {
                Some(VarValue::Scalar(s)) => Some((name, s.clone())),
                _ => None,
            })
            .collect()
    }
}

/// Splits `name[sub]` into its parts.
pub fn split_subscript(name: &str) -> Option<(&str, &str)> {
    let open = name.find('[')?;
    let inner = name[open + 1..].strip_suffix(']')?;
    Some((&name[..open], inner))
}

/// `name` or `name[sub]`, as accepted by `read`, `printf -v` and friends.
pub fn is_assignable(name: &str) -> bool {
    match split_subscript(name) {
        Some((base, _)) => is_valid_name(base),
        None => is_valid_name(name),
    }
}

impl InterpreterState {
    /// Value of a parameter as a single string: special parameters,
    /// dynamic variables, positionals, then the variable store.
    pub fn get_var_value(&mut self, name: &str) -> Option<String> {
        match name {
            "?" => return Some(self.last_exit_code.to_string()),
            "#" => return Some(self.positional.len().to_string()),
            "$" => return Some(self.shell_pid.to_string()),
            "!" => return self.last_background_pid.map(|p| p.to_string()),
            "-" => return Some(self.options.flags()),
            "0" => return Some(self.script_name.clone()),
            "_" => return Some(self.last_arg.clone()),
            "@" | "*" => return Some(self.positional.join(" ")),
            _ => {}
        }
        if let Ok(n) = name.parse::<usize>() {
            return self.positional.get(n.wrapping_sub(1)).cloned();
        }
        if self.vars.get(name).map_or(false, |v| v.is_set()) {
            return self.vars.get_scalar(name);
        }
        match name {
            "RANDOM" => Some(self.rng.gen_range(0..32768).to_string()),
            "SECONDS" => Some(self.seconds().to_string()),
            "LINENO" => Some(self.current_line.to_string()),
            "BASHPID" => Some(self.bash_pid.to_string()),
            "EPOCHSECONDS" => Some(chrono::Utc::now().timestamp().to_string()),
            "EPOCHREALTIME" => {
                let now = chrono::Utc::now();
                Some(format!("{}.{:06}", now.timestamp(), now.timestamp_subsec_micros()))
            }
            _ => None,
        }
    }

    /// Whether `name` is set, counting special and dynamic parameters.
    pub fn is_var_set(&mut self, name: &str) -> bool {
        self.get_var_value(name).is_some()
    }

    /// Scalar assignment with attribute handling: integer evaluation,
    /// `RANDOM`/`SECONDS` side effects, `set -a` export. Accepts `name[sub]`.
    pub fn assign_scalar(&mut self, name: &str, value: &str, append: bool) -> InterpreterResult<()> {
        if let Some((base, sub)) = split_subscript(name) {
            return self.assign_element(base, sub, value, append);
        }
        match name {
            "RANDOM" => {
                let seed = value.trim().parse::<u64>().unwrap_or(0);
                self.rng = StdRng::seed_from_u64(seed);
                return Ok(());
            }
            "SECONDS" => {
                let base = value.trim().parse::<i64>().unwrap_or(0);
                self.reset_seconds(base);
                return Ok(());
            }
            _ => {}
        }
        let attrs = self.vars.attrs(name);
        if attrs.integer {
            let mut n = self.eval_arith_text(value)?;
            if append {
                let current = self.vars.get_scalar(name).unwrap_or_default();
                n = n.wrapping_add(self.eval_arith_text(&current)?);
            }
            self.vars.set_scalar(name, n.to_string())?;
        } else if append {
            self.vars.append_scalar(name, value)?;
        } else {
            self.vars.set_scalar(name, value)?;
        }
        if self.options.allexport {
            self.vars.declare_global(name).attrs.exported = true;
        }
        Ok(())
    }

    /// `name[sub]=value`. Associative arrays use `sub` as the key; indexed
    /// arrays evaluate it arithmetically, negative indices counting back
    /// from the end.
    pub fn assign_element(&mut self, name: &str, sub: &str, value: &str, append: bool) -> InterpreterResult<()> {
        let attrs = self.vars.attrs(name);
        let is_assoc = self.vars.get(name).map_or(false, Variable::is_assoc);
        let value = if attrs.integer { self.eval_arith_text(value)?.to_string() } else { value.to_string() };
        if is_assoc {
            let value = if append {
                let current = match self.vars.get(name).and_then(|v| v.value.as_ref()) {
                    Some(VarValue::Assoc(map)) => map.get(sub).cloned().unwrap_or_default(),
                    _ => String::new(),
                };
                format!("{}{}", current, value)
            } else {
                value
            };
            return self.vars.set_assoc_element(name, sub, value);
        }
        let mut index = self.eval_arith_text(sub)?;
        if index < 0 {
            index += self.vars.next_index(name);
            if index < 0 {
                return Err(InterpreterError::Runtime(format!("{}[{}]: bad array subscript", name, sub)));
            }
        }
        let value = if append {
            let current = match self.vars.get(name).and_then(|v| v.value.as_ref()) {
                Some(VarValue::Indexed(map)) => map.get(&index).cloned().unwrap_or_default(),
                Some(VarValue::Scalar(s)) if index == 0 => s.clone(),
                _ => String::new(),
            };
            format!("{}{}", current, value)
        } else {
            value
        };
        self.vars.set_element(name, index, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scalar_set_get_unset() {
        let mut store = VariableStore::new();
        store.set_scalar("x", "1").unwrap();
        assert_eq!(store.get_scalar("x").as_deref(), Some("1"));
        store.append_scalar("x", "2").unwrap();
        assert_eq!(store.get_scalar("x").as_deref(), Some("12"));
        store.unset("x").unwrap();
        assert!(!store.is_set("x"));
    }

    #[test]
    fn test_sparse_indexed_array() {
        let mut store = VariableStore::new();
        store.set_element("a", 5, "x").unwrap();
        store.set_element("a", 10, "y").unwrap();
        let var = store.get("a").unwrap();
        assert_eq!(var.values(), vec!["x", "y"]);
        assert_eq!(var.keys(), vec!["5", "10"]);
        assert_eq!(store.next_index("a"), 11);
        store.append_elements("a", vec!["z".into()]).unwrap();
        assert_eq!(store.get("a").unwrap().keys(), vec!["5", "10", "11"]);
    }

    #[test]
    fn test_scalar_becomes_array_on_element_assignment() {
        let mut store = VariableStore::new();
        store.set_scalar("s", "zero").unwrap();
        store.set_element("s", 2, "two").unwrap();
        assert_eq!(store.get("s").unwrap().values(), vec!["zero", "two"]);
        store.set_scalar("s", "new").unwrap();
        assert_eq!(store.get_scalar("s").as_deref(), Some("new"));
        assert!(store.get("s").unwrap().is_indexed());
    }

    #[test]
    fn test_assoc_keeps_insertion_order() {
        let mut store = VariableStore::new();
        store.set_assoc_element("m", "b", "2").unwrap();
        store.set_assoc_element("m", "a", "1").unwrap();
        assert_eq!(store.get("m").unwrap().keys(), vec!["b", "a"]);
        store.unset_assoc_element("m", "b").unwrap();
        assert_eq!(store.get("m").unwrap().keys(), vec!["a"]);
    }

    #[test]
    fn test_local_shadowing_and_restore() {
        let mut store = VariableStore::new();
        store.set_scalar("x", "global").unwrap();
        store.push_scope();
        store.declare_local("x").value = Some(VarValue::Scalar("local".into()));
        assert_eq!(store.get_scalar("x").as_deref(), Some("local"));
        store.unset("x").unwrap();
        assert!(!store.is_set("x"));
        store.set_scalar("y", "leaks").unwrap();
        store.pop_scope();
        assert_eq!(store.get_scalar("x").as_deref(), Some("global"));
        assert_eq!(store.get_scalar("y").as_deref(), Some("leaks"));
    }

    #[test]
    fn test_dynamic_scoping_writes_to_caller_local() {
        let mut store = VariableStore::new();
        store.push_scope();
        store.declare_local("v").value = Some(VarValue::Scalar("outer".into()));
        store.push_scope();
        store.set_scalar("v", "inner").unwrap();
        store.pop_scope();
        assert_eq!(store.get_scalar("v").as_deref(), Some("inner"));
        store.pop_scope();
        assert!(!store.is_set("v"));
    }

    #[test]
    fn test_readonly_rejects_writes() {
        let mut store = VariableStore::new();
        store.set_scalar("r", "1").unwrap();
        store.declare_global("r").attrs.readonly = true;
        assert_eq!(store.set_scalar("r", "2"), Err(InterpreterError::Readonly("r".into())));
        assert!(store.unset("r").is_err());
    }

    #[test]
    fn test_nameref_resolution() {
        let mut store = VariableStore::new();
        store.set_scalar("target", "v").unwrap();
        let r = store.declare_global("ref");
        r.value = Some(VarValue::Scalar("target".into()));
        r.attrs.nameref = true;
        assert_eq!(store.get_scalar("ref").as_deref(), Some("v"));
        store.set_scalar("ref", "w").unwrap();
        assert_eq!(store.get_scalar("target").as_deref(), Some("w"));
        store.unset_raw("ref").unwrap();
        assert_eq!(store.get_scalar("target").as_deref(), Some("w"));
    }

    #[test]
    fn test_case_attributes() {
        let mut store = VariableStore::new();
        store.declare_global("u").attrs.uppercase = true;
        store.set_scalar("u", "abc").unwrap();
        assert_eq!(store.get_scalar("u").as_deref(), Some("ABC"));
    }

    #[test]
    fn test_exported_env_only_exported_scalars() {
        let mut store = VariableStore::new();
        store.set_scalar("A", "1").unwrap();
        store.set_scalar("B", "2").unwrap();
        store.declare_global("A").attrs.exported = true;
        let env = store.exported_env();
        assert_eq!(env.get("A").map(String::as_str), Some("1"));
        assert!(!env.contains_key("B"));
        let mut flagged = Variable::scalar("x");
        flagged.attrs.exported = true;
        flagged.attrs.integer = true;
        assert_eq!(flagged.attribute_flags(), "ix");
    }

    #[test]
    fn test_state_integer_and_element_assignment() {
        let mut state = InterpreterState::default();
        state.vars.declare_global("n").attrs.integer = true;
        state.assign_scalar("n", "2+3", false).unwrap();
        assert_eq!(state.vars.get_scalar("n").as_deref(), Some("5"));
        state.assign_scalar("n", "1", true).unwrap();
        assert_eq!(state.vars.get_scalar("n").as_deref(), Some("6"));

        state.assign_scalar("arr[1+1]", "two", false).unwrap();
        state.assign_element("arr", "-1", "!", true).unwrap();
        assert_eq!(state.vars.get("arr").unwrap().values(), vec!["two!"]);
        assert!(state.assign_element("empty", "-1", "x", false).is_err());
    }

    #[test]
    fn test_special_parameters() {
        let mut state = InterpreterState::default();
        state.positional = vec!["a".into(), "b".into()];
        state.last_exit_code = 3;
        assert_eq!(state.get_var_value("#").as_deref(), Some("2"));
        assert_eq!(state.get_var_value("2").as_deref(), Some("b"));
        assert_eq!(state.get_var_value("3"), None);
        assert_eq!(state.get_var_value("?").as_deref(), Some("3"));
        state.assign_scalar("RANDOM", "42", false).unwrap();
        let first = state.get_var_value("RANDOM");
        state.assign_scalar("RANDOM", "42", false).unwrap();
        assert_eq!(state.get_var_value("RANDOM"), first);
    }
}

//! Parameter Expansion
//!
//! Resolves `$name`, `${name[sub]}`, `${!ref}` and every `${...}` operator.
//! Multi-valued parameters (`$@`, `$*`, `${arr[@]}`, `${arr[*]}`) keep
//! their elements apart so the caller can form one field per element;
//! operators apply per element.

use crate::ast::types::{
    CaseDirection, ParameterExpansionPart, ParameterIndex, ParameterOperation, PatternSide, TransformOperator, WordNode,
};
use crate::interpreter::errors::{InterpreterError, InterpreterResult};
use crate::interpreter::execution_engine::Interpreter;
use crate::interpreter::pattern::{remove_prefix, remove_suffix, replace_pattern, MatchFlags, Pattern};
use crate::interpreter::types::BoxFuture;
use crate::interpreter::variables::{split_subscript, VarValue, Variable};
use crate::parser::types::is_valid_name;
use crate::parser::word_parser::process_ansi_c;

use super::quoting::{double_quote, quote_for_reuse};
use super::Field;

/// Result of expanding one parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Expanded {
    Scalar(String),
    /// Elements of a multi-valued parameter; `true` for the `*` form
    Fields(Vec<String>, bool),
    /// Already-expanded operand word (`${x:-word}` and friends)
    Segments(Vec<Field>),
}

/// Value of the parameter before any operator runs.
#[derive(Debug, Clone, PartialEq)]
enum ParamValue {
    Unset,
    Scalar(String),
    /// Elements with their keys, in order
    Array { entries: Vec<(String, String)>, star: bool },
}

impl ParamValue {
    /// Unset, or null when `check_empty` is requested.
    fn is_null(&self, check_empty: bool) -> bool {
        match self {
            ParamValue::Unset => true,
            ParamValue::Scalar(s) => check_empty && s.is_empty(),
            ParamValue::Array { entries, .. } => {
                entries.is_empty() || (check_empty && entries.iter().all(|(_, v)| v.is_empty()))
            }
        }
    }
}

fn is_positional_or_special(name: &str) -> bool {
    name.chars().all(|c| c.is_ascii_digit()) || matches!(name, "@" | "*" | "#" | "?" | "$" | "!" | "-" | "_")
}

/// Whether the expansion yields separate elements.
pub fn is_multi_value(p: &ParameterExpansionPart) -> bool {
    match &p.operation {
        Some(ParameterOperation::Length) => false,
        Some(ParameterOperation::Keys { .. }) | Some(ParameterOperation::NamePrefix { .. }) => true,
        Some(ParameterOperation::Default { .. })
        | Some(ParameterOperation::AssignDefault { .. })
        | Some(ParameterOperation::Alternative { .. })
        | Some(ParameterOperation::Transform(TransformOperator::KeyValueQuoted))
        | Some(ParameterOperation::Transform(TransformOperator::Assignment)) => false,
        _ => !p.indirect && (matches!(p.parameter.as_str(), "@" | "*") || matches!(p.index, Some(ParameterIndex::All | ParameterIndex::Star))),
    }
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn case_modify(value: &str, direction: CaseDirection, all: bool, pattern: Option<&Pattern>) -> String {
    let mut out = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        let selected = (all || i == 0) && pattern.map_or(true, |p| p.is_match(&c.to_string()));
        if selected {
            match direction {
                CaseDirection::Upper => out.extend(c.to_uppercase()),
                CaseDirection::Lower => out.extend(c.to_lowercase()),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Substring by char offsets with bash's negative offset/length rules.
fn substring(value: &str, offset: i64, length: Option<i64>) -> InterpreterResult<String> {
    let chars: Vec<char> = value.chars().collect();
    let len = chars.len() as i64;
    let start = if offset < 0 { len + offset } else { offset };
    if start < 0 || start > len {
        return Ok(String::new());
    }
    let end = match length {
        None => len,
        Some(l) if l < 0 => {
            let end = len + l;
            if end < start {
                return Err(InterpreterError::Runtime(format!("{}: substring expression < 0", l)));
            }
            end
        }
        Some(l) => (start + l).min(len),
    };
    Ok(chars[start as usize..end as usize].iter().collect())
}

impl Interpreter {
    fn match_flags(&self) -> MatchFlags {
        MatchFlags { extglob: self.state.shopt_options.extglob, nocase: false }
    }

    /// Elements of a variable as (key, value) pairs.
    fn array_entries(&self, name: &str) -> Vec<(String, String)> {
        match self.state.vars.get(name) {
            Some(var) => var.keys().into_iter().zip(var.values()).collect(),
            None => Vec::new(),
        }
    }

    /// Evaluates an indexed subscript; negative counts from the end.
    async fn resolve_index(&mut self, name: &str, sub: &str) -> InterpreterResult<Option<i64>> {
        let text = self.expand_arith_text(sub).await?;
        let index = self.state.eval_arith_text(&text)?;
        if index >= 0 {
            return Ok(Some(index));
        }
        let shifted = self.state.vars.next_index(name) + index;
        if shifted < 0 {
            if self.state.vars.get(name).map_or(false, Variable::is_set) {
                return Err(InterpreterError::Runtime(format!("{}[{}]: bad array subscript", name, sub)));
            }
            return Ok(None);
        }
        Ok(Some(shifted))
    }

    /// Looks up `name` with an optional subscript.
    async fn lookup(&mut self, name: &str, index: Option<&ParameterIndex>) -> InterpreterResult<ParamValue> {
        if matches!(name, "@" | "*") {
            let entries = self
                .state
                .positional
                .iter()
                .enumerate()
                .map(|(i, v)| ((i + 1).to_string(), v.clone()))
                .collect();
            return Ok(ParamValue::Array { entries, star: name == "*" });
        }
        match index {
            None => Ok(match self.state.get_var_value(name) {
                Some(v) => ParamValue::Scalar(v),
                None => ParamValue::Unset,
            }),
            Some(ParameterIndex::All) | Some(ParameterIndex::Star) => {
                let star = matches!(index, Some(ParameterIndex::Star));
                if !self.state.vars.get(name).map_or(false, Variable::is_set) {
                    return Ok(ParamValue::Array { entries: Vec::new(), star });
                }
                Ok(ParamValue::Array { entries: self.array_entries(name), star })
            }
            Some(ParameterIndex::Expr(sub)) => {
                let value = self.state.vars.get(name).and_then(|v| v.value.clone());
                Ok(match value {
                    Some(VarValue::Assoc(map)) => {
                        let key = self.expand_subscript_key(sub).await?;
                        map.get(&key).cloned().map_or(ParamValue::Unset, ParamValue::Scalar)
                    }
                    Some(VarValue::Indexed(map)) => match self.resolve_index(name, sub).await? {
                        Some(i) => map.get(&i).cloned().map_or(ParamValue::Unset, ParamValue::Scalar),
                        None => ParamValue::Unset,
                    },
                    Some(VarValue::Scalar(s)) => match self.resolve_index(name, sub).await? {
                        Some(0) => ParamValue::Scalar(s),
                        _ => ParamValue::Unset,
                    },
                    None => {
                        // special arrays and unset names still evaluate the subscript
                        self.resolve_index(name, sub).await?;
                        ParamValue::Unset
                    }
                })
            }
        }
    }

    /// Associative subscript text: expanded without splitting.
    pub(crate) async fn expand_subscript_key(&mut self, sub: &str) -> InterpreterResult<String> {
        if !sub.contains(['$', '`', '\'', '"', '\\']) {
            return Ok(sub.to_string());
        }
        let word = crate::parser::parse_word_in(sub, self.state.current_line, crate::parser::WordContext::Parameter)
            .map_err(|e| InterpreterError::BadSubstitution(format!("{}: {}", sub, e.message)))?;
        self.expand_word_string(&word).await
    }

    /// `${!ref}`: the value of `ref` names the parameter to expand.
    async fn lookup_indirect(&mut self, p: &ParameterExpansionPart) -> InterpreterResult<ParamValue> {
        let raw_var = self.state.vars.get_raw(&p.parameter).cloned();
        if let Some(var) = raw_var.filter(|v| v.attrs.nameref) {
            return Ok(var.as_scalar().map_or(ParamValue::Unset, ParamValue::Scalar));
        }
        let target = match self.lookup(&p.parameter, p.index.as_ref()).await? {
            ParamValue::Scalar(s) => s,
            ParamValue::Unset => return Ok(ParamValue::Unset),
            ParamValue::Array { entries, .. } => {
                entries.into_iter().map(|(_, v)| v).collect::<Vec<_>>().join(" ")
            }
        };
        if target.is_empty() {
            return Ok(ParamValue::Unset);
        }
        let (name, index) = match split_subscript(&target) {
            Some((base, "@")) => (base.to_string(), Some(ParameterIndex::All)),
            Some((base, "*")) => (base.to_string(), Some(ParameterIndex::Star)),
            Some((base, sub)) => (base.to_string(), Some(ParameterIndex::Expr(sub.to_string()))),
            None => (target.clone(), None),
        };
        if !is_valid_name(&name) && !is_positional_or_special(&name) {
            return Err(InterpreterError::BadSubstitution(format!("${{!{}}}", p.parameter)));
        }
        self.lookup(&name, index.as_ref()).await
    }

    /// Expands an operand word in the current quoting context. Unquoted
    /// text of the operand is subject to splitting like any expansion.
    async fn expand_operand(&mut self, word: &WordNode, in_dquote: bool) -> InterpreterResult<Vec<Field>> {
        let mut fields = self.expand_parts(&word.parts, in_dquote).await?;
        if !in_dquote {
            for seg in fields.iter_mut().flatten() {
                if !seg.quoted {
                    seg.splittable = true;
                }
            }
        }
        Ok(fields)
    }

    pub(crate) fn expand_parameter<'a>(
        &'a mut self,
        p: &'a ParameterExpansionPart,
        in_dquote: bool,
    ) -> BoxFuture<'a, InterpreterResult<Expanded>> {
        Box::pin(async move {
            let op = p.operation.as_ref();

            // Operators that look at names rather than values.
            match op {
                Some(ParameterOperation::BadSubstitution(text)) => {
                    return Err(InterpreterError::BadSubstitution(text.clone()));
                }
                Some(ParameterOperation::NamePrefix { star }) => {
                    let names: Vec<String> = self
                        .state
                        .vars
                        .visible()
                        .into_iter()
                        .filter(|(name, var)| name.starts_with(&p.parameter) && var.is_set())
                        .map(|(name, _)| name)
                        .collect();
                    return Ok(Expanded::Fields(names, *star));
                }
                Some(ParameterOperation::Keys { star }) => {
                    let keys = match p.parameter.as_str() {
                        "@" | "*" => (1..=self.state.positional.len()).map(|i| i.to_string()).collect(),
                        name => self.array_entries(name).into_iter().map(|(k, _)| k).collect(),
                    };
                    return Ok(Expanded::Fields(keys, *star));
                }
                _ => {}
            }

            let value = if p.indirect { self.lookup_indirect(p).await? } else { self.lookup(&p.parameter, p.index.as_ref()).await? };

            let tolerates_unset = matches!(
                op,
                Some(ParameterOperation::Default { .. })
                    | Some(ParameterOperation::AssignDefault { .. })
                    | Some(ParameterOperation::ErrorIfUnset { .. })
                    | Some(ParameterOperation::Alternative { .. })
            );
            if value == ParamValue::Unset && self.state.options.nounset && !tolerates_unset {
                return Err(InterpreterError::Unbound(p.parameter.clone()));
            }

            let Some(op) = op else {
                return Ok(match value {
                    ParamValue::Unset => Expanded::Scalar(String::new()),
                    ParamValue::Scalar(s) => Expanded::Scalar(s),
                    ParamValue::Array { entries, star } => Expanded::Fields(entries.into_iter().map(|(_, v)| v).collect(), star),
                });
            };

            match op {
                ParameterOperation::Default { word, check_empty } => {
                    if value.is_null(*check_empty) {
                        return Ok(Expanded::Segments(self.expand_operand(word, in_dquote).await?));
                    }
                    Ok(self.plain(value))
                }
                ParameterOperation::Alternative { word, check_empty } => {
                    if value.is_null(*check_empty) {
                        return Ok(Expanded::Scalar(String::new()));
                    }
                    Ok(Expanded::Segments(self.expand_operand(word, in_dquote).await?))
                }
                ParameterOperation::AssignDefault { word, check_empty } => {
                    if !value.is_null(*check_empty) {
                        return Ok(self.plain(value));
                    }
                    if p.indirect || is_positional_or_special(&p.parameter) {
                        return Err(InterpreterError::Runtime(format!("${}: cannot assign in this way", p.parameter)));
                    }
                    let fields = self.expand_parts(&word.parts, in_dquote).await?;
                    let text = fields.iter().map(super::field_text).collect::<Vec<_>>().join(" ");
                    match &p.index {
                        Some(ParameterIndex::Expr(sub)) => {
                            let is_assoc = self.state.vars.get(&p.parameter).map_or(false, Variable::is_assoc);
                            let sub = if is_assoc { self.expand_subscript_key(sub).await? } else { self.expand_arith_text(sub).await? };
                            self.state.assign_element(&p.parameter, &sub, &text, false)?;
                        }
                        _ => self.state.assign_scalar(&p.parameter, &text, false)?,
                    }
                    Ok(Expanded::Scalar(text))
                }
                ParameterOperation::ErrorIfUnset { word, check_empty } => {
                    if !value.is_null(*check_empty) {
                        return Ok(self.plain(value));
                    }
                    let message = match word {
                        Some(w) => self.expand_word_string(w).await?,
                        None => "parameter null or not set".to_string(),
                    };
                    Err(InterpreterError::ParameterUnset { name: p.parameter.clone(), message })
                }
                ParameterOperation::Length => Ok(Expanded::Scalar(match value {
                    ParamValue::Unset => "0".to_string(),
                    ParamValue::Scalar(s) => s.chars().count().to_string(),
                    ParamValue::Array { entries, .. } => entries.len().to_string(),
                })),
                ParameterOperation::Substring { offset, length } => {
                    let offset_text = self.expand_arith_text(offset).await?;
                    let offset = self.state.eval_arith_text(&offset_text)?;
                    let length = match length {
                        Some(l) => {
                            let text = self.expand_arith_text(l).await?;
                            Some(self.state.eval_arith_text(&text)?)
                        }
                        None => None,
                    };
                    match value {
                        ParamValue::Unset => Ok(Expanded::Scalar(String::new())),
                        ParamValue::Scalar(s) => Ok(Expanded::Scalar(substring(&s, offset, length)?)),
                        ParamValue::Array { entries, star } => {
                            Ok(Expanded::Fields(self.slice_elements(&p.parameter, entries, offset, length)?, star))
                        }
                    }
                }
                ParameterOperation::RemovePattern { pattern, side, greedy } => {
                    let pat = self.expand_word_pattern(pattern).await?;
                    let flags = self.match_flags();
                    Ok(self.map_values(value, |v| match side {
                        PatternSide::Prefix => remove_prefix(v, &pat, *greedy, flags),
                        PatternSide::Suffix => remove_suffix(v, &pat, *greedy, flags),
                    }))
                }
                ParameterOperation::Replace { pattern, replacement, all, anchor } => {
                    let pat = self.expand_word_pattern(pattern).await?;
                    let rep = match replacement {
                        Some(w) => self.expand_word_string(w).await?,
                        None => String::new(),
                    };
                    let flags = self.match_flags();
                    Ok(self.map_values(value, |v| replace_pattern(v, &pat, &rep, *all, *anchor, flags)))
                }
                ParameterOperation::CaseModify { direction, all, pattern } => {
                    let compiled = match pattern {
                        Some(w) => Some(Pattern::new(&self.expand_word_pattern(w).await?, self.match_flags())),
                        None => None,
                    };
                    Ok(self.map_values(value, |v| case_modify(v, *direction, *all, compiled.as_ref())))
                }
                ParameterOperation::Transform(t) => self.transform(p, value, *t),
                ParameterOperation::Keys { .. }
                | ParameterOperation::NamePrefix { .. }
                | ParameterOperation::BadSubstitution(_) => Ok(Expanded::Scalar(String::new())),
            }
        })
    }

    fn plain(&self, value: ParamValue) -> Expanded {
        match value {
            ParamValue::Unset => Expanded::Scalar(String::new()),
            ParamValue::Scalar(s) => Expanded::Scalar(s),
            ParamValue::Array { entries, star } => Expanded::Fields(entries.into_iter().map(|(_, v)| v).collect(), star),
        }
    }

    fn map_values(&self, value: ParamValue, f: impl Fn(&str) -> String) -> Expanded {
        match value {
            ParamValue::Unset => Expanded::Scalar(f("")),
            ParamValue::Scalar(s) => Expanded::Scalar(f(&s)),
            ParamValue::Array { entries, star } => Expanded::Fields(entries.iter().map(|(_, v)| f(v)).collect(), star),
        }
    }

    /// `${@:off:len}` and `${arr[@]:off:len}`. Positional slices count `$0`
    /// as element 0; arrays select by index, skipping holes.
    fn slice_elements(
        &self,
        name: &str,
        entries: Vec<(String, String)>,
        offset: i64,
        length: Option<i64>,
    ) -> InterpreterResult<Vec<String>> {
        if let Some(l) = length {
            if l < 0 {
                return Err(InterpreterError::Runtime(format!("{}: substring expression < 0", l)));
            }
        }
        let take = length.map_or(usize::MAX, |l| l as usize);
        if matches!(name, "@" | "*") {
            let mut all = vec![self.state.script_name.clone()];
            all.extend(entries.into_iter().map(|(_, v)| v));
            let count = all.len() as i64;
            let start = if offset < 0 { count + offset } else { offset };
            if start < 0 || start >= count {
                return Ok(Vec::new());
            }
            return Ok(all.into_iter().skip(start as usize).take(take).collect());
        }
        let indexed: Vec<(i64, String)> =
            entries.into_iter().map(|(k, v)| (k.parse::<i64>().unwrap_or(0), v)).collect();
        let start = if offset < 0 {
            let end = indexed.last().map_or(0, |(k, _)| k + 1);
            end + offset
        } else {
            offset
        };
        if start < 0 {
            return Ok(Vec::new());
        }
        Ok(indexed.into_iter().filter(|(k, _)| *k >= start).map(|(_, v)| v).take(take).collect())
    }

    fn transform(&mut self, p: &ParameterExpansionPart, value: ParamValue, t: TransformOperator) -> InterpreterResult<Expanded> {
        let var = self.state.vars.get(&p.parameter).cloned();
        match t {
            TransformOperator::Quote => Ok(match value {
                ParamValue::Unset => Expanded::Scalar(String::new()),
                other => self.map_values(other, quote_for_reuse),
            }),
            TransformOperator::Escape => Ok(self.map_values(value, process_ansi_c)),
            TransformOperator::Prompt => Ok(self.map_values(value, |v| v.to_string())),
            TransformOperator::Upper => Ok(self.map_values(value, |v| v.to_uppercase())),
            TransformOperator::Lower => Ok(self.map_values(value, |v| v.to_lowercase())),
            TransformOperator::UpperFirst => Ok(self.map_values(value, upper_first)),
            TransformOperator::Attributes => {
                let flags = var.map(|v| v.attribute_flags()).unwrap_or_default();
                Ok(match value {
                    ParamValue::Array { entries, star } => Expanded::Fields(entries.iter().map(|_| flags.clone()).collect(), star),
                    _ => Expanded::Scalar(flags),
                })
            }
            TransformOperator::Assignment => {
                let Some(var) = var.filter(|v| v.is_set()) else {
                    return Ok(Expanded::Scalar(String::new()));
                };
                Ok(Expanded::Scalar(declare_statement(&p.parameter, &var)))
            }
            TransformOperator::KeyValueQuoted | TransformOperator::KeyValue => {
                let quoted = t == TransformOperator::KeyValueQuoted;
                let pairs: Vec<(String, String)> = match value {
                    ParamValue::Unset => Vec::new(),
                    ParamValue::Scalar(s) => {
                        return Ok(Expanded::Scalar(quote_for_reuse(&s)));
                    }
                    ParamValue::Array { entries, .. } => entries,
                };
                if quoted {
                    let text = pairs
                        .iter()
                        .map(|(k, v)| format!("{} {}", k, double_quote(v)))
                        .collect::<Vec<_>>()
                        .join(" ");
                    Ok(Expanded::Scalar(text))
                } else {
                    Ok(Expanded::Fields(pairs.into_iter().flat_map(|(k, v)| [k, v]).collect(), false))
                }
            }
        }
    }
}

/// `declare -x name="value"` style statement, as printed by `declare -p`
/// and `${name@A}`.
pub fn declare_statement(name: &str, var: &Variable) -> String {
    let flags = var.attribute_flags();
    let flag_text = if flags.is_empty() { "--".to_string() } else { format!("-{}", flags) };
    match &var.value {
        None => format!("declare {} {}", flag_text, name),
        Some(VarValue::Scalar(s)) => format!("declare {} {}={}", flag_text, name, double_quote(s)),
        Some(VarValue::Indexed(map)) => {
            let body = map.iter().map(|(k, v)| format!("[{}]={}", k, double_quote(v))).collect::<Vec<_>>().join(" ");
            format!("declare {} {}=({})", flag_text, name, body)
        }
        Some(VarValue::Assoc(map)) => {
            let body = map
                .iter()
                .map(|(k, v)| format!("[{}]={}", crate::interpreter::expansion::quoting::quote_if_needed(k), double_quote(v)))
                .collect::<Vec<_>>()
                .join(" ");
            if body.is_empty() {
                format!("declare {} {}=()", flag_text, name)
            } else {
                format!("declare {} {}=({} )", flag_text, name, body)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;
    use crate::parser::parse_word;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn interp() -> Interpreter {
        Interpreter::with_fs(Arc::new(InMemoryFs::new()))
    }

    async fn expand(it: &mut Interpreter, raw: &str) -> InterpreterResult<Vec<String>> {
        let word = parse_word(raw, 1).unwrap();
        it.expand_word_fields(&word).await
    }

    async fn one(it: &mut Interpreter, raw: &str) -> String {
        expand(it, raw).await.unwrap().join(" ")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_default_assign_alternative() {
        let mut it = interp();
        it.state.vars.set_scalar("empty", "").unwrap();
        assert_eq!(one(&mut it, "${unset:-dflt}").await, "dflt");
        assert_eq!(one(&mut it, "${empty:-dflt}").await, "dflt");
        assert_eq!(one(&mut it, "${empty-dflt}").await, "");
        assert_eq!(one(&mut it, "${unset:=set}").await, "set");
        assert_eq!(it.state.vars.get_scalar("unset").as_deref(), Some("set"));
        assert_eq!(one(&mut it, "${unset:+alt}").await, "alt");
        assert_eq!(one(&mut it, "${nothing:+alt}").await, "");
        assert_eq!(expand(&mut it, "${nothing:-a b}").await.unwrap(), vec!["a", "b"]);
        assert_eq!(expand(&mut it, "\"${nothing:-a b}\"").await.unwrap(), vec!["a b"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_error_if_unset_is_fatal() {
        let mut it = interp();
        let err = expand(&mut it, "${missing:?custom message}").await.unwrap_err();
        assert_eq!(err, InterpreterError::ParameterUnset { name: "missing".into(), message: "custom message".into() });
        assert!(err.is_fatal());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_length_and_substring() {
        let mut it = interp();
        it.state.vars.set_scalar("s", "hello world").unwrap();
        assert_eq!(one(&mut it, "${#s}").await, "11");
        assert_eq!(one(&mut it, "${s:6}").await, "world");
        assert_eq!(one(&mut it, "${s:0:5}").await, "hello");
        assert_eq!(one(&mut it, "${s: -5}").await, "world");
        assert_eq!(one(&mut it, "${s:1:-1}").await, "ello worl");
        assert_eq!(one(&mut it, "${s:20}").await, "");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_arrays() {
        let mut it = interp();
        it.state.vars.set_element("a", 5, "x").unwrap();
        it.state.vars.set_element("a", 10, "y").unwrap();
        assert_eq!(one(&mut it, "${#a[@]}").await, "2");
        assert_eq!(one(&mut it, "${a[-1]}").await, "y");
        assert_eq!(one(&mut it, "${!a[@]}").await, "5 10");
        assert_eq!(expand(&mut it, "\"${a[@]:6}\"").await.unwrap(), vec!["y"]);
        assert_eq!(one(&mut it, "${a}").await, "");
        it.state.vars.set_assoc_element("m", "k1", "v1").unwrap();
        assert_eq!(one(&mut it, "${m[k1]}").await, "v1");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pattern_operators() {
        let mut it = interp();
        it.state.vars.set_scalar("f", "/a/b/c.tar.gz").unwrap();
        assert_eq!(one(&mut it, "${f##*/}").await, "c.tar.gz");
        assert_eq!(one(&mut it, "${f%.*}").await, "/a/b/c.tar");
        assert_eq!(one(&mut it, "${f%%.*}").await, "/a/b/c");
        assert_eq!(one(&mut it, "${f/b/B}").await, "/a/B/c.tar.gz");
        assert_eq!(one(&mut it, "${f//\\//:}").await, ":a:b:c.tar.gz");
        it.state.vars.set_scalar("v", "abc").unwrap();
        assert_eq!(one(&mut it, "${v/#/x}").await, "xabc");
        assert_eq!(one(&mut it, "${v/%/x}").await, "abcx");
        assert_eq!(one(&mut it, "${v^}").await, "Abc");
        assert_eq!(one(&mut it, "${v^^}").await, "ABC");
        assert_eq!(one(&mut it, "${v^^[ab]}").await, "ABc");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_indirection_and_prefix_names() {
        let mut it = interp();
        it.state.vars.set_scalar("target", "value").unwrap();
        it.state.vars.set_scalar("ref", "target").unwrap();
        assert_eq!(one(&mut it, "${!ref}").await, "value");
        it.state.vars.set_scalar("pre_a", "1").unwrap();
        it.state.vars.set_scalar("pre_b", "2").unwrap();
        assert_eq!(one(&mut it, "${!pre_@}").await, "pre_a pre_b");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_transforms() {
        let mut it = interp();
        it.state.vars.set_scalar("q", "it's").unwrap();
        assert_eq!(one(&mut it, "${q@Q}").await, "'it'\\''s'");
        it.state.vars.declare_global("i").attrs.integer = true;
        it.state.assign_scalar("i", "3", false).unwrap();
        assert_eq!(one(&mut it, "${i@a}").await, "i");
        assert_eq!(one(&mut it, "${i@A}").await, "declare -i i=\"3\"");
        it.state.vars.set_scalar("e", "a\\tb").unwrap();
        assert_eq!(one(&mut it, "\"${e@E}\"").await, "a\tb");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_nounset() {
        let mut it = interp();
        it.state.options.nounset = true;
        assert_eq!(expand(&mut it, "$nope").await, Err(InterpreterError::Unbound("nope".into())));
        assert_eq!(one(&mut it, "${nope:-ok}").await, "ok");
        assert_eq!(one(&mut it, "\"$@\"").await, "");
    }
}

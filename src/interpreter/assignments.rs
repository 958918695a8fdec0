//! Assignment Words
//!
//! `name=value`, `name+=value`, `name[sub]=value` and `name=(...)`.
//! Values are expanded without word splitting or globbing; elements of
//! an array literal are expanded like command arguments.

use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::ast::types::{ArrayElementNode, AssignmentNode};
use crate::interpreter::errors::InterpreterResult;
use crate::interpreter::execution_engine::Interpreter;
use crate::interpreter::expansion::quoting::quote_if_needed;
use crate::interpreter::variables::{VarValue, Variable};

fn trace_value(value: &str) -> String {
    if value.is_empty() {
        String::new()
    } else {
        quote_if_needed(value)
    }
}

impl Interpreter {
    /// Performs one assignment and returns its `set -x` rendering.
    pub(crate) async fn apply_assignment(&mut self, assignment: &AssignmentNode) -> InterpreterResult<String> {
        let op = if assignment.append { "+=" } else { "=" };
        if let Some(elements) = &assignment.array {
            let values = self.assign_array(&assignment.name, elements, assignment.append).await?;
            let rendered: Vec<String> = values.iter().map(|v| trace_value(v)).collect();
            return Ok(format!("{}{}({})", assignment.name, op, rendered.join(" ")));
        }
        let value = match &assignment.value {
            Some(word) => self.expand_word_string(word).await?,
            None => String::new(),
        };
        match &assignment.index {
            Some(sub) => {
                let key = self.expand_subscript(&assignment.name, sub).await?;
                self.state.assign_element(&assignment.name, &key, &value, assignment.append)?;
                Ok(format!("{}[{}]{}{}", assignment.name, key, op, trace_value(&value)))
            }
            None => {
                self.state.assign_scalar(&assignment.name, &value, assignment.append)?;
                Ok(format!("{}{}{}", assignment.name, op, trace_value(&value)))
            }
        }
    }

    /// Subscript text ready for `assign_element`: associative keys are
    /// expanded as words, indexed subscripts as arithmetic text.
    pub(crate) async fn expand_subscript(&mut self, name: &str, sub: &str) -> InterpreterResult<String> {
        if self.state.vars.get(name).map_or(false, Variable::is_assoc) {
            self.expand_subscript_key(sub).await
        } else {
            self.expand_arith_text(sub).await
        }
    }

    /// `name=(...)` and `name+=(...)`. Returns the assigned values.
    pub(crate) async fn assign_array(
        &mut self,
        name: &str,
        elements: &[ArrayElementNode],
        append: bool,
    ) -> InterpreterResult<Vec<String>> {
        let existing = self.state.vars.get(name).cloned();
        let integer = existing.as_ref().map_or(false, |v| v.attrs.integer);
        let is_assoc = existing.as_ref().map_or(false, Variable::is_assoc);

        if is_assoc {
            let mut map = match (append, existing.and_then(|v| v.value)) {
                (true, Some(VarValue::Assoc(map))) => map,
                _ => IndexMap::new(),
            };
            let mut pending_key: Option<String> = None;
            for element in elements {
                match &element.key {
                    Some(raw) => {
                        let key = self.expand_subscript_key(raw).await?;
                        let value = self.element_value(&element.value, integer).await?;
                        if element.append {
                            map.entry(key).or_default().push_str(&value);
                        } else {
                            map.insert(key, value);
                        }
                    }
                    // Unsubscripted words pair up as key, value.
                    None => {
                        for word in self.expand_word_fields(&element.value).await? {
                            match pending_key.take() {
                                Some(key) => {
                                    map.insert(key, word);
                                }
                                None => pending_key = Some(word),
                            }
                        }
                    }
                }
            }
            if let Some(key) = pending_key {
                map.insert(key, String::new());
            }
            let values = map.values().cloned().collect();
            self.state.vars.set_value(name, VarValue::Assoc(map))?;
            return Ok(values);
        }

        let (mut map, mut next) = match (append, existing.and_then(|v| v.value)) {
            (true, Some(VarValue::Indexed(map))) => {
                let next = map.keys().next_back().map_or(0, |k| k + 1);
                (map, next)
            }
            (true, Some(VarValue::Scalar(s))) => (BTreeMap::from([(0, s)]), 1),
            _ => (BTreeMap::new(), 0),
        };
        for element in elements {
            match &element.key {
                Some(raw) => {
                    let text = self.expand_arith_text(raw).await?;
                    let index = self.state.eval_arith_text(&text)?;
                    let value = self.element_value(&element.value, integer).await?;
                    if element.append {
                        map.entry(index).or_default().push_str(&value);
                    } else {
                        map.insert(index, value);
                    }
                    next = index + 1;
                }
                None => {
                    for word in self.expand_word_fields(&element.value).await? {
                        let value = if integer { self.state.eval_arith_text(&word)?.to_string() } else { word };
                        map.insert(next, value);
                        next += 1;
                    }
                }
            }
        }
        let values = map.values().cloned().collect();
        self.state.vars.set_value(name, VarValue::Indexed(map))?;
        Ok(values)
    }

    async fn element_value(&mut self, word: &crate::ast::types::WordNode, integer: bool) -> InterpreterResult<String> {
        let value = self.expand_word_string(word).await?;
        if integer {
            return Ok(self.state.eval_arith_text(&value)?.to_string());
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use crate::fs::InMemoryFs;
    use crate::interpreter::execution_engine::Interpreter;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    async fn run(script: &str) -> String {
        let mut it = Interpreter::with_fs(Arc::new(InMemoryFs::new()));
        let ast = parse(script).unwrap();
        it.execute_script(&ast).await.stdout
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_array_literals() {
        assert_eq!(run("a=(x y z); echo ${a[1]} ${#a[@]}").await, "y 3\n");
        assert_eq!(run("a=([3]=c d); echo ${!a[@]}").await, "3 4\n");
        assert_eq!(run("a=(1 2); a+=(3); echo ${a[@]}").await, "1 2 3\n");
        assert_eq!(run("s=one; s+=(two); echo ${s[@]}").await, "one two\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_assoc_literals() {
        assert_eq!(run("declare -A m=([a]=1 [b]=2); echo ${m[b]} ${!m[@]}").await, "2 a b\n");
        assert_eq!(run("declare -A m; m=(k1 v1 k2 v2); echo ${m[k2]}").await, "v2\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_scalar_and_element_assignment() {
        assert_eq!(run("x=a; x+=b; echo $x").await, "ab\n");
        assert_eq!(run("i=2; a[i+1]=v; echo ${!a[@]} ${a[3]}").await, "3 v\n");
        assert_eq!(run("v='a  b'; w=$v; echo \"$w\"").await, "a  b\n");
    }
}

//! Word Expansion
//!
//! Handles the expansion pipeline in POSIX order:
//! - Brace expansion: {a,b}, {1..10}
//! - Tilde expansion: ~, ~user, ~+, ~-
//! - Parameter expansion: $VAR, ${VAR:-default}, ${arr[@]}, ...
//! - Command substitution: $(cmd), `cmd`
//! - Arithmetic expansion: $((expr))
//! - Word splitting on IFS
//! - Pathname expansion (globbing)
//! - Quote removal
//!
//! Expansion results are fields made of segments. Each segment remembers
//! whether it came from quoted text and whether it may be split, so quoting
//! survives down to the splitter and the glob matcher.

pub mod brace;
pub mod glob;
pub mod parameter;
pub mod quoting;
pub mod tilde;
pub mod word_split;

use crate::ast::types::{BraceItem, WordNode, WordPart};
use crate::interpreter::errors::{InterpreterError, InterpreterResult};
use crate::interpreter::execution_engine::Interpreter;
use crate::interpreter::pattern::{escape_pattern, has_glob_chars};
use crate::interpreter::types::BoxFuture;
use crate::parser::{parse_word_in, WordContext};

use self::parameter::Expanded;
use self::word_split::{split_field, DEFAULT_IFS};

/// A run of expanded text with its quoting state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    /// From quoted text: no splitting, no globbing
    pub quoted: bool,
    /// Unquoted expansion result: subject to word splitting
    pub splittable: bool,
}

impl Segment {
    pub fn quoted(text: impl Into<String>) -> Self {
        Self { text: text.into(), quoted: true, splittable: false }
    }

    pub fn literal(text: impl Into<String>) -> Self {
        Self { text: text.into(), quoted: false, splittable: false }
    }

    /// Expansion result; quoted inside double quotes, splittable outside.
    pub fn expanded(text: impl Into<String>, in_dquote: bool) -> Self {
        Self { text: text.into(), quoted: in_dquote, splittable: !in_dquote }
    }
}

/// One word in the making.
pub type Field = Vec<Segment>;

pub fn field_text(field: &Field) -> String {
    field.iter().map(|s| s.text.as_str()).collect()
}

/// Accumulates fields; multi-valued expansions break between fields.
#[derive(Debug, Default)]
pub(crate) struct FieldBuilder {
    fields: Vec<Field>,
}

impl FieldBuilder {
    fn new() -> Self {
        Self { fields: vec![Vec::new()] }
    }

    fn push(&mut self, seg: Segment) {
        if let Some(current) = self.fields.last_mut() {
            current.push(seg);
        }
    }

    fn break_field(&mut self) {
        self.fields.push(Vec::new());
    }

    /// First incoming field continues the current one, the rest follow.
    fn merge(&mut self, incoming: Vec<Field>) {
        for (i, field) in incoming.into_iter().enumerate() {
            if i > 0 {
                self.break_field();
            }
            for seg in field {
                self.push(seg);
            }
        }
    }

    fn finish(self) -> Vec<Field> {
        self.fields
    }
}

/// `"$@"` or `"${arr[@]}"` alone inside double quotes: zero elements give
/// zero words instead of one empty word.
fn is_lone_multi(parts: &[WordPart]) -> bool {
    match parts {
        [WordPart::ParameterExpansion(p)] => parameter::is_multi_value(p),
        _ => false,
    }
}

impl Interpreter {
    /// Expands parts into raw fields (before splitting and globbing).
    pub(crate) fn expand_parts<'a>(
        &'a mut self,
        parts: &'a [WordPart],
        in_dquote: bool,
    ) -> BoxFuture<'a, InterpreterResult<Vec<Field>>> {
        Box::pin(async move {
            let mut builder = FieldBuilder::new();
            for part in parts {
                match part {
                    WordPart::Literal(s) => builder.push(Segment { text: s.clone(), quoted: in_dquote, splittable: false }),
                    WordPart::SingleQuoted(s) | WordPart::Escaped(s) => builder.push(Segment::quoted(s.clone())),
                    WordPart::DoubleQuoted(inner) => {
                        if !is_lone_multi(inner) {
                            builder.push(Segment::quoted(""));
                        }
                        let fields = self.expand_parts(inner, true).await?;
                        builder.merge(fields);
                    }
                    WordPart::ParameterExpansion(p) => match self.expand_parameter(p, in_dquote).await? {
                        Expanded::Scalar(s) => builder.push(Segment::expanded(s, in_dquote)),
                        Expanded::Fields(values, star) => {
                            if in_dquote && star {
                                let sep = self.ifs_join_separator();
                                builder.push(Segment::quoted(values.join(&sep)));
                            } else {
                                for (i, v) in values.into_iter().enumerate() {
                                    if i > 0 {
                                        builder.break_field();
                                    }
                                    builder.push(Segment::expanded(v, in_dquote));
                                }
                            }
                        }
                        Expanded::Segments(fields) => builder.merge(fields),
                    },
                    WordPart::CommandSubstitution(cs) => {
                        let out = self.run_command_substitution(&cs.body).await?;
                        builder.push(Segment::expanded(out, in_dquote));
                    }
                    WordPart::ArithmeticExpansion(text) => {
                        let expanded = self.expand_arith_text(text).await?;
                        let value = self.state.eval_arith_text(&expanded)?;
                        builder.push(Segment::expanded(value.to_string(), in_dquote));
                    }
                    WordPart::TildeExpansion(user) => {
                        let home = self.state.expand_tilde(user.as_deref());
                        builder.push(Segment::quoted(home));
                    }
                    WordPart::BraceExpansion(items) => {
                        // Only reached where brace expansion does not apply.
                        builder.push(Segment::literal("{"));
                        for (i, item) in items.iter().enumerate() {
                            if i > 0 {
                                builder.push(Segment::literal(","));
                            }
                            match item {
                                BraceItem::Word(word) => {
                                    let fields = self.expand_parts(&word.parts, in_dquote).await?;
                                    builder.merge(fields);
                                }
                                BraceItem::Range(range) => {
                                    let text = brace::render_range(range);
                                    builder.push(Segment::literal(&text[1..text.len() - 1]));
                                }
                            }
                        }
                        builder.push(Segment::literal("}"));
                    }
                }
            }
            Ok(builder.finish())
        })
    }

    /// Current `$IFS`, defaulting when unset.
    pub(crate) fn ifs(&self) -> String {
        self.state.vars.get_scalar("IFS").unwrap_or_else(|| DEFAULT_IFS.to_string())
    }

    /// Separator for `"$*"`: first IFS char, space when IFS is unset.
    pub(crate) fn ifs_join_separator(&self) -> String {
        match self.state.vars.get_scalar("IFS") {
            Some(ifs) => ifs.chars().next().map(String::from).unwrap_or_default(),
            None => " ".to_string(),
        }
    }

    /// Full expansion of one word into argument strings.
    pub async fn expand_word_fields(&mut self, word: &WordNode) -> InterpreterResult<Vec<String>> {
        let alternatives = if brace::has_braces(&word.parts) {
            brace::expand_braces(&word.parts)?
        } else {
            vec![word.parts.clone()]
        };
        let ifs = self.ifs();
        let mut out = Vec::new();
        for parts in alternatives {
            let fields = self.expand_parts(&parts, false).await?;
            for field in fields {
                for word in split_field(field, &ifs) {
                    out.extend(self.glob_field(word).await?);
                }
            }
        }
        tracing::trace!(?out, "expanded word");
        Ok(out)
    }

    /// Expands a list of words (command arguments, `for` lists).
    pub async fn expand_words(&mut self, words: &[WordNode]) -> InterpreterResult<Vec<String>> {
        let mut out = Vec::new();
        for word in words {
            out.extend(self.expand_word_fields(word).await?);
        }
        Ok(out)
    }

    /// Pathname expansion and quote removal for one split word.
    async fn glob_field(&mut self, field: Field) -> InterpreterResult<Vec<String>> {
        let literal = field_text(&field);
        if self.state.options.noglob {
            return Ok(vec![literal]);
        }
        let extglob = self.state.shopt_options.extglob;
        let pattern: String = field
            .iter()
            .map(|s| if s.quoted { escape_pattern(&s.text) } else { s.text.clone() })
            .collect();
        let globbable = field.iter().any(|s| !s.quoted && has_glob_chars(&s.text, extglob));
        if !globbable || !has_glob_chars(&pattern, extglob) {
            return Ok(vec![literal]);
        }
        let matches = self.glob_expand(&pattern).await;
        if !matches.is_empty() {
            return Ok(matches);
        }
        if self.state.shopt_options.failglob {
            return Err(InterpreterError::Glob(literal));
        }
        if self.state.shopt_options.nullglob {
            return Ok(Vec::new());
        }
        Ok(vec![literal])
    }

    /// Expansion without splitting or globbing, as for assignment values,
    /// `case` words and `[[ ]]` operands. Multiple fields join with a space.
    pub async fn expand_word_string(&mut self, word: &WordNode) -> InterpreterResult<String> {
        let fields = self.expand_parts(&word.parts, false).await?;
        Ok(fields.iter().map(field_text).collect::<Vec<_>>().join(" "))
    }

    /// Expansion into a pattern for the matcher: quoted text is escaped so
    /// it matches literally.
    pub async fn expand_word_pattern(&mut self, word: &WordNode) -> InterpreterResult<String> {
        let fields = self.expand_parts(&word.parts, false).await?;
        Ok(fields
            .iter()
            .map(|f| f.iter().map(|s| if s.quoted { escape_pattern(&s.text) } else { s.text.clone() }).collect::<String>())
            .collect::<Vec<_>>()
            .join(" "))
    }

    /// Expansion into a regex for `=~`: quoted text matches literally.
    pub async fn expand_word_regex(&mut self, word: &WordNode) -> InterpreterResult<String> {
        let fields = self.expand_parts(&word.parts, false).await?;
        Ok(fields
            .iter()
            .map(|f| {
                f.iter()
                    .map(|s| if s.quoted { regex_lite::escape(&s.text) } else { s.text.clone() })
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join(" "))
    }

    /// Heredoc bodies expand like double-quoted text.
    pub async fn expand_heredoc(&mut self, word: &WordNode) -> InterpreterResult<String> {
        let fields = self.expand_parts(&word.parts, true).await?;
        Ok(fields.iter().map(field_text).collect())
    }

    /// Resolves `$` and backquote expansions inside arithmetic text.
    pub fn expand_arith_text<'a>(&'a mut self, text: &'a str) -> BoxFuture<'a, InterpreterResult<String>> {
        Box::pin(async move {
            if !text.contains('$') && !text.contains('`') {
                return Ok(text.to_string());
            }
            let line = self.state.current_line;
            let word = parse_word_in(text, line, WordContext::Heredoc)
                .map_err(|e| InterpreterError::BadSubstitution(format!("{}: {}", text, e.message)))?;
            let fields = self.expand_parts(&word.parts, true).await?;
            Ok(fields.iter().map(field_text).collect())
        })
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
        let fs = Arc::new(InMemoryFs::with_files([("/d/a.txt", ""), ("/d/b.txt", ""), ("/d/c.md", "")]));
        let mut it = Interpreter::with_fs(fs);
        it.state.cwd = "/d".to_string();
        it
    }

    async fn fields(it: &mut Interpreter, raw: &str) -> Vec<String> {
        let word = parse_word(raw, 1).unwrap();
        it.expand_word_fields(&word).await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_quoting_controls_splitting() {
        let mut it = interp();
        it.state.vars.set_scalar("s", "  a   b  ").unwrap();
        assert_eq!(fields(&mut it, "$s").await, vec!["a", "b"]);
        assert_eq!(fields(&mut it, "\"$s\"").await, vec!["  a   b  "]);
        assert_eq!(fields(&mut it, "x$s'y'").await, vec!["x", "a", "b", "y"]);
        assert_eq!(fields(&mut it, "\"\"").await, vec![""]);
        assert!(fields(&mut it, "$unset").await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_positional_at_and_star() {
        let mut it = interp();
        it.state.positional = vec!["a b".into(), "c".into()];
        assert_eq!(fields(&mut it, "\"$@\"").await, vec!["a b", "c"]);
        assert_eq!(fields(&mut it, "\"x$@y\"").await, vec!["xa b", "cy"]);
        assert_eq!(fields(&mut it, "\"$*\"").await, vec!["a b c"]);
        assert_eq!(fields(&mut it, "$@").await, vec!["a", "b", "c"]);
        it.state.vars.set_scalar("IFS", ":").unwrap();
        assert_eq!(fields(&mut it, "\"$*\"").await, vec!["a b:c"]);
        it.state.positional.clear();
        assert!(fields(&mut it, "\"$@\"").await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_globbing_respects_quotes() {
        let mut it = interp();
        assert_eq!(fields(&mut it, "*.txt").await, vec!["a.txt", "b.txt"]);
        assert_eq!(fields(&mut it, "'*'.txt").await, vec!["*.txt"]);
        assert_eq!(fields(&mut it, "*.zip").await, vec!["*.zip"]);
        it.state.shopt_options.nullglob = true;
        assert!(fields(&mut it, "*.zip").await.is_empty());
        it.state.shopt_options.nullglob = false;
        it.state.shopt_options.failglob = true;
        let word = parse_word("*.zip", 1).unwrap();
        assert_eq!(it.expand_word_fields(&word).await, Err(InterpreterError::Glob("*.zip".into())));
        it.state.shopt_options.failglob = false;
        it.state.options.noglob = true;
        assert_eq!(fields(&mut it, "*.txt").await, vec!["*.txt"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_brace_then_arith() {
        let mut it = interp();
        assert_eq!(fields(&mut it, "f{1..3}").await, vec!["f1", "f2", "f3"]);
        assert_eq!(fields(&mut it, "$((2*3))").await, vec!["6"]);
        it.state.vars.set_scalar("n", "4").unwrap();
        assert_eq!(fields(&mut it, "$(( $n + 1 ))").await, vec!["5"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pattern_and_string_modes() {
        let mut it = interp();
        it.state.vars.set_scalar("p", "*").unwrap();
        let w = parse_word("\"$p\"x*", 1).unwrap();
        assert_eq!(it.expand_word_pattern(&w).await.unwrap(), "\\*x*");
        assert_eq!(it.expand_word_string(&w).await.unwrap(), "*x*");
    }
}

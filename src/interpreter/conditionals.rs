//! Conditional Expression Evaluation
//!
//! One evaluator serves `[[ ... ]]` and `test`/`[`. They differ in how
//! operands are treated:
//!
//! - `[[ ]]` expands operands without splitting, matches `==`/`!=` as
//!   patterns, supports `=~` and evaluates integer comparisons as
//!   arithmetic
//! - `test` gets already-expanded argv, compares strings literally and
//!   requires plain integers
//!
//! File tests go through the injected filesystem.

use std::time::SystemTime;

use regex_lite::Regex;

use crate::ast::types::{ConditionalExpressionNode, WordNode};
use crate::interpreter::errors::{InterpreterError, InterpreterResult};
use crate::interpreter::execution_engine::Interpreter;
use crate::interpreter::pattern::{self, MatchFlags};
use crate::interpreter::types::{BoxFuture, ExecResult};
use crate::interpreter::variables::{split_subscript, VarValue, Variable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CondMode {
    Extended,
    Test,
}

const UNARY_OPERATORS: &[&str] = &[
    "-a", "-b", "-c", "-d", "-e", "-f", "-g", "-h", "-k", "-n", "-o", "-p", "-r", "-s", "-t", "-u", "-v", "-w", "-x",
    "-z", "-G", "-L", "-N", "-O", "-S",
];

const BINARY_OPERATORS: &[&str] = &[
    "=", "==", "!=", "<", ">", "-eq", "-ne", "-lt", "-le", "-gt", "-ge", "-nt", "-ot", "-ef",
];

fn is_unary(op: &str) -> bool {
    UNARY_OPERATORS.contains(&op)
}

fn is_binary(op: &str) -> bool {
    BINARY_OPERATORS.contains(&op)
}

fn compare_ints(op: &str, a: i64, b: i64) -> bool {
    match op {
        "-eq" => a == b,
        "-ne" => a != b,
        "-lt" => a < b,
        "-le" => a <= b,
        "-gt" => a > b,
        _ => a >= b,
    }
}

fn parse_strict_int(text: &str) -> InterpreterResult<i64> {
    text.trim()
        .parse::<i64>()
        .map_err(|_| InterpreterError::Runtime(format!("{}: integer expression expected", text)))
}

impl Interpreter {
    /// Evaluates a `[[ ]]` expression.
    pub(crate) fn eval_conditional<'a>(
        &'a mut self,
        expr: &'a ConditionalExpressionNode,
    ) -> BoxFuture<'a, InterpreterResult<bool>> {
        self.eval_cond(expr, CondMode::Extended)
    }

    fn eval_cond<'a>(
        &'a mut self,
        expr: &'a ConditionalExpressionNode,
        mode: CondMode,
    ) -> BoxFuture<'a, InterpreterResult<bool>> {
        Box::pin(async move {
            match expr {
                ConditionalExpressionNode::And(left, right) => {
                    if !self.eval_cond(left, mode).await? {
                        return Ok(false);
                    }
                    self.eval_cond(right, mode).await
                }
                ConditionalExpressionNode::Or(left, right) => {
                    if self.eval_cond(left, mode).await? {
                        return Ok(true);
                    }
                    self.eval_cond(right, mode).await
                }
                ConditionalExpressionNode::Not(inner) => Ok(!self.eval_cond(inner, mode).await?),
                ConditionalExpressionNode::Group(inner) => self.eval_cond(inner, mode).await,
                ConditionalExpressionNode::Word(word) => Ok(!self.cond_operand(word, mode).await?.is_empty()),
                ConditionalExpressionNode::Unary { operator, operand } => {
                    let value = self.cond_operand(operand, mode).await?;
                    self.eval_unary(operator, &value).await
                }
                ConditionalExpressionNode::Binary { operator, left, right } => {
                    self.eval_binary(operator, left, right, mode).await
                }
            }
        })
    }

    async fn cond_operand(&mut self, word: &WordNode, mode: CondMode) -> InterpreterResult<String> {
        match mode {
            CondMode::Test => Ok(word.as_plain_literal().unwrap_or_default()),
            CondMode::Extended => self.expand_word_string(word).await,
        }
    }

    async fn eval_binary(
        &mut self,
        op: &str,
        left: &WordNode,
        right: &WordNode,
        mode: CondMode,
    ) -> InterpreterResult<bool> {
        let lhs = self.cond_operand(left, mode).await?;
        match op {
            "==" | "=" | "!=" => {
                let equal = match mode {
                    CondMode::Test => lhs == self.cond_operand(right, mode).await?,
                    CondMode::Extended => {
                        let pat = self.expand_word_pattern(right).await?;
                        let flags = MatchFlags { extglob: true, nocase: self.state.shopt_options.nocasematch };
                        pattern::matches(&pat, &lhs, flags)
                    }
                };
                Ok(equal == (op != "!="))
            }
            "=~" => {
                let re = self.expand_word_regex(right).await?;
                self.regex_match(&lhs, &re)
            }
            "<" => Ok(lhs < self.cond_operand(right, mode).await?),
            ">" => Ok(lhs > self.cond_operand(right, mode).await?),
            "-eq" | "-ne" | "-lt" | "-le" | "-gt" | "-ge" => {
                let rhs = self.cond_operand(right, mode).await?;
                let (a, b) = match mode {
                    CondMode::Test => (parse_strict_int(&lhs)?, parse_strict_int(&rhs)?),
                    CondMode::Extended => (self.state.eval_arith_text(&lhs)?, self.state.eval_arith_text(&rhs)?),
                };
                Ok(compare_ints(op, a, b))
            }
            "-nt" | "-ot" => {
                let rhs = self.cond_operand(right, mode).await?;
                let a = self.mtime_of(&lhs).await;
                let b = self.mtime_of(&rhs).await;
                Ok(match (op, a, b) {
                    ("-nt", Some(a), Some(b)) => a > b,
                    ("-nt", Some(_), None) => true,
                    ("-ot", Some(a), Some(b)) => a < b,
                    ("-ot", None, Some(_)) => true,
                    _ => false,
                })
            }
            "-ef" => {
                let rhs = self.cond_operand(right, mode).await?;
                let a = self.fs.realpath(&self.fs.resolve_path(&self.state.cwd, &lhs)).await;
                let b = self.fs.realpath(&self.fs.resolve_path(&self.state.cwd, &rhs)).await;
                Ok(matches!((a, b), (Ok(a), Ok(b)) if a == b))
            }
            _ => Err(InterpreterError::Runtime(format!("{}: binary operator expected", op))),
        }
    }

    /// `=~`: sets `BASH_REMATCH` to the match and its groups.
    fn regex_match(&mut self, value: &str, re: &str) -> InterpreterResult<bool> {
        let source = if self.state.shopt_options.nocasematch { format!("(?i){}", re) } else { re.to_string() };
        let regex = Regex::new(&source)
            .map_err(|_| InterpreterError::Runtime(format!("invalid regular expression `{}'", re)))?;
        let slot = self.state.vars.global_frame("BASH_REMATCH");
        match regex.captures(value) {
            Some(caps) => {
                let groups = caps
                    .iter()
                    .enumerate()
                    .map(|(i, m)| (i as i64, m.map_or(String::new(), |m| m.as_str().to_string())))
                    .collect();
                slot.value = Some(VarValue::Indexed(groups));
                Ok(true)
            }
            None => {
                slot.value = Some(VarValue::Indexed(Default::default()));
                Ok(false)
            }
        }
    }

    async fn mtime_of(&self, path: &str) -> Option<SystemTime> {
        let resolved = self.fs.resolve_path(&self.state.cwd, path);
        self.fs.stat(&resolved).await.ok().map(|s| s.mtime)
    }

    async fn eval_unary(&mut self, op: &str, operand: &str) -> InterpreterResult<bool> {
        match op {
            "-z" => return Ok(operand.is_empty()),
            "-n" => return Ok(!operand.is_empty()),
            "-o" => return Ok(self.state.options.get(operand).unwrap_or(false)),
            "-v" => return self.variable_is_set(operand).await,
            "-t" => return Ok(false),
            _ => {}
        }
        if !is_unary(op) {
            return Err(InterpreterError::Runtime(format!("{}: unary operator expected", op)));
        }
        let resolved = self.fs.resolve_path(&self.state.cwd, operand);
        if op == "-L" || op == "-h" {
            return Ok(self.fs.lstat(&resolved).await.map_or(false, |s| s.is_symlink));
        }
        let Ok(stat) = self.fs.stat(&resolved).await else {
            return Ok(false);
        };
        Ok(match op {
            "-e" | "-a" | "-O" | "-G" => true,
            "-f" => stat.is_file,
            "-d" => stat.is_directory,
            "-s" => stat.size > 0 || stat.is_directory,
            "-r" => stat.mode & 0o444 != 0,
            "-w" => stat.mode & 0o222 != 0,
            "-x" => stat.is_executable(),
            "-u" => stat.mode & 0o4000 != 0,
            "-g" => stat.mode & 0o2000 != 0,
            "-k" => stat.mode & 0o1000 != 0,
            // No devices, pipes or sockets in the virtual filesystem
            _ => false,
        })
    }

    /// `-v name` or `-v name[sub]`.
    async fn variable_is_set(&mut self, operand: &str) -> InterpreterResult<bool> {
        let Some((name, sub)) = split_subscript(operand) else {
            return Ok(self.state.is_var_set(operand));
        };
        if sub == "@" || sub == "*" {
            return Ok(self.state.vars.get(name).map_or(false, |v| !v.values().is_empty()));
        }
        let is_assoc = self.state.vars.get(name).map_or(false, Variable::is_assoc);
        let key = self.expand_subscript(name, sub).await?;
        if is_assoc {
            let value = self.state.vars.get(name).and_then(|v| v.value.as_ref());
            return Ok(matches!(value, Some(VarValue::Assoc(map)) if map.contains_key(&key)));
        }
        let mut index = self.state.eval_arith_text(&key)?;
        if index < 0 {
            index += self.state.vars.next_index(name);
        }
        Ok(match self.state.vars.get(name).and_then(|v| v.value.as_ref()) {
            Some(VarValue::Indexed(map)) => map.contains_key(&index),
            Some(VarValue::Scalar(_)) => index == 0,
            _ => false,
        })
    }

    /// `test ARGS` and `[ ARGS ]`. Status 0 true, 1 false, 2 on a usage
    /// error.
    pub(crate) async fn run_test_command(&mut self, name: &str, args: &[String]) -> ExecResult {
        let args = if name == "[" {
            match args.split_last() {
                Some((last, rest)) if last == "]" => rest,
                _ => return ExecResult::failure_with_code("bash: [: missing `]'\n", 2),
            }
        } else {
            args
        };
        let expr = match parse_test_args(args) {
            Ok(expr) => expr,
            Err(msg) => return ExecResult::failure_with_code(format!("bash: {}: {}\n", name, msg), 2),
        };
        match self.eval_cond(&expr, CondMode::Test).await {
            Ok(true) => ExecResult::ok(),
            Ok(false) => ExecResult::with_code(1),
            Err(err) if err.is_fatal() => self.fail(err),
            Err(err) => ExecResult::failure_with_code(format!("bash: {}: {}\n", name, err), 2),
        }
    }
}

fn word(text: &str) -> WordNode {
    WordNode::literal(text)
}

fn unary(op: &str, operand: &str) -> ConditionalExpressionNode {
    ConditionalExpressionNode::Unary { operator: op.to_string(), operand: word(operand) }
}

fn binary(op: &str, left: &str, right: &str) -> ConditionalExpressionNode {
    ConditionalExpressionNode::Binary { operator: op.to_string(), left: word(left), right: word(right) }
}

fn not(inner: ConditionalExpressionNode) -> ConditionalExpressionNode {
    ConditionalExpressionNode::Not(Box::new(inner))
}

/// Builds an expression from `test` arguments. Up to four arguments
/// follow the POSIX count-based rules; longer lists use `!`, `-a`, `-o`
/// and parentheses with the usual precedence.
fn parse_test_args(args: &[String]) -> Result<ConditionalExpressionNode, String> {
    let a: Vec<&str> = args.iter().map(String::as_str).collect();
    match a.as_slice() {
        [] => Ok(ConditionalExpressionNode::Word(word(""))),
        [x] => Ok(ConditionalExpressionNode::Word(word(x))),
        ["!", x] => Ok(not(ConditionalExpressionNode::Word(word(x)))),
        [op, x] if is_unary(op) => Ok(unary(op, x)),
        [op, _] => Err(format!("{}: unary operator expected", op)),
        [l, op, r] if is_binary(op) => Ok(binary(op, l, r)),
        [l, "-a", r] => Ok(ConditionalExpressionNode::And(
            Box::new(ConditionalExpressionNode::Word(word(l))),
            Box::new(ConditionalExpressionNode::Word(word(r))),
        )),
        [l, "-o", r] => Ok(ConditionalExpressionNode::Or(
            Box::new(ConditionalExpressionNode::Word(word(l))),
            Box::new(ConditionalExpressionNode::Word(word(r))),
        )),
        ["!", rest @ ..] if rest.len() == 2 => Ok(not(parse_test_args(&args[1..])?)),
        ["(", x, ")"] => Ok(ConditionalExpressionNode::Group(Box::new(ConditionalExpressionNode::Word(word(x))))),
        [_, op, _] => Err(format!("{}: binary operator expected", op)),
        ["!", rest @ ..] if rest.len() == 3 => Ok(not(parse_test_args(&args[1..])?)),
        ["(", _, _, ")"] => parse_test_args(&args[1..3]),
        _ => {
            let mut parser = TestParser { args: &a, pos: 0 };
            let expr = parser.or_expr()?;
            match parser.args.get(parser.pos) {
                None => Ok(expr),
                Some(extra) => Err(format!("{}: too many arguments", extra)),
            }
        }
    }
}

struct TestParser<'a> {
    args: &'a [&'a str],
    pos: usize,
}

impl<'a> TestParser<'a> {
    fn peek(&self, offset: usize) -> Option<&'a str> {
        self.args.get(self.pos + offset).copied()
    }

    fn or_expr(&mut self) -> Result<ConditionalExpressionNode, String> {
        let mut left = self.and_expr()?;
        while self.peek(0) == Some("-o") {
            self.pos += 1;
            let right = self.and_expr()?;
            left = ConditionalExpressionNode::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<ConditionalExpressionNode, String> {
        let mut left = self.not_expr()?;
        while self.peek(0) == Some("-a") {
            self.pos += 1;
            let right = self.not_expr()?;
            left = ConditionalExpressionNode::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<ConditionalExpressionNode, String> {
        if self.peek(0) == Some("!") {
            self.pos += 1;
            return Ok(not(self.not_expr()?));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<ConditionalExpressionNode, String> {
        let Some(first) = self.peek(0) else {
            return Err("argument expected".to_string());
        };
        if first == "(" {
            self.pos += 1;
            let inner = self.or_expr()?;
            if self.peek(0) != Some(")") {
                return Err("`)' expected".to_string());
            }
            self.pos += 1;
            return Ok(ConditionalExpressionNode::Group(Box::new(inner)));
        }
        if let (Some(op), Some(right)) = (self.peek(1), self.peek(2)) {
            if is_binary(op) {
                self.pos += 3;
                return Ok(binary(op, first, right));
            }
        }
        if is_unary(first) {
            if let Some(operand) = self.peek(1) {
                self.pos += 2;
                return Ok(unary(first, operand));
            }
        }
        self.pos += 1;
        Ok(ConditionalExpressionNode::Word(word(first)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    async fn run(script: &str) -> ExecResult {
        let fs = InMemoryFs::with_files([("/tmp/file.txt", "data"), ("/tmp/empty", "")])
            .with_dirs(["/tmp/dir"])
            .with_executable("/tmp/run.sh", "echo hi");
        let mut it = Interpreter::with_fs(Arc::new(fs));
        it.state.cwd = "/tmp".to_string();
        let ast = parse(script).unwrap();
        it.execute_script(&ast).await
    }

    async fn status(script: &str) -> i32 {
        run(script).await.exit_code
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_string_and_pattern_operators() {
        assert_eq!(status("[[ abc == a* ]]").await, 0);
        assert_eq!(status("[[ abc == 'a*' ]]").await, 1);
        assert_eq!(status("[[ abc != b* ]]").await, 0);
        assert_eq!(status("[[ a < b && ! b < a ]]").await, 0);
        assert_eq!(status("[[ -z '' && -n x ]]").await, 0);
        assert_eq!(status("shopt -s nocasematch; [[ ABC == abc ]]").await, 0);
        assert_eq!(status("[[ x.tar.gz == *.@(gz|bz2) ]]").await, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_regex_and_rematch() {
        let r = run("[[ 'key=value' =~ ^([a-z]+)=(.*)$ ]] && echo ${BASH_REMATCH[1]} ${BASH_REMATCH[2]}").await;
        assert_eq!(r.stdout, "key value\n");
        assert_eq!(status("[[ a.c =~ 'a.c' ]] && [[ abc =~ 'a.c' ]]").await, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_integer_comparisons() {
        assert_eq!(status("x=3; [[ x+1 -eq 4 ]]").await, 0);
        assert_eq!(status("[ 10 -gt 9 ]").await, 0);
        let r = run("[ abc -eq 1 ]").await;
        assert_eq!(r.exit_code, 2);
        assert_eq!(r.stderr, "bash: [: abc: integer expression expected\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_file_tests() {
        let r = run("for t in -e -f -d -s -x; do for f in file.txt empty dir run.sh missing; do [ $t $f ] && echo -n 1 || echo -n 0; done; echo; done").await;
        assert_eq!(r.stdout, "11110\n11010\n00100\n10110\n00110\n");
        assert_eq!(status("[[ missing -ot file.txt ]]").await, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_variable_and_option_tests() {
        assert_eq!(status("x=; [[ -v x ]]").await, 0);
        assert_eq!(status("[[ -v nope ]]").await, 1);
        assert_eq!(status("a=(1 2); [[ -v a[1] && ! -v a[5] ]]").await, 0);
        assert_eq!(status("set -o pipefail; [[ -o pipefail ]]").await, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_test_builtin_argument_forms() {
        assert_eq!(status("test").await, 1);
        assert_eq!(status("test x").await, 0);
        assert_eq!(status("[ ! '' ]").await, 0);
        assert_eq!(status("[ a = a -a b != c ]").await, 0);
        assert_eq!(status("[ \\( a = b \\) -o -d dir ]").await, 0);
        assert_eq!(status("[ a == 'a*' ]").await, 1);
        let r = run("[ a = a").await;
        assert_eq!(r.exit_code, 2);
        assert_eq!(r.stderr, "bash: [: missing `]'\n");
    }
}

//! Execution Engine
//!
//! Walks the command tree:
//!
//! execute_script -> execute_statement -> execute_pipeline -> execute_command
//!
//! Every level returns an `ExecResult`; `break`, `continue`, `return` and
//! `exit` travel upwards in its `signal` until a construct consumes them.
//! Expansion errors are turned into a failed result at the command that
//! raised them, fatal ones additionally carry `ControlSignal::Exit`.

use std::sync::Arc;

use crate::ast::types::{
    CommandNode, CompoundCommandNode, PipelineNode, RedirectionOperator, RedirectionTarget, ScriptNode,
    SimpleCommandNode, StatementNode, StatementOperator, WordNode, WordPart,
};
use crate::commands::{CommandRegistry, ExecFn};
use crate::fs::FileSystem;
use crate::interpreter::errors::{InterpreterError, InterpreterResult};
use crate::interpreter::expansion::quoting::quote_if_needed;
use crate::interpreter::types::{BoxFuture, ControlSignal, ExecResult, ExecutionLimits, InterpreterState};
use crate::interpreter::variables::{VarValue, Variable};
use crate::parser::parse;
use crate::parser::parser::split_assignment_word;

/// Builtins whose `name=value` arguments are expanded like assignments.
const DECLARATION_BUILTINS: &[&str] = &["declare", "typeset", "local", "export", "readonly"];

/// A shell: mutable state plus the collaborators it runs against.
/// Cloning yields an independent subshell sharing the filesystem and
/// command registry.
#[derive(Clone)]
pub struct Interpreter {
    pub state: InterpreterState,
    pub(crate) fs: Arc<dyn FileSystem>,
    pub(crate) commands: Arc<CommandRegistry>,
    pub(crate) limits: ExecutionLimits,
    pub(crate) exec_fn: Option<ExecFn>,
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("cwd", &self.state.cwd)
            .field("commands", &self.commands)
            .field("limits", &self.limits)
            .finish()
    }
}

impl Interpreter {
    pub fn new(fs: Arc<dyn FileSystem>, commands: Arc<CommandRegistry>, limits: ExecutionLimits) -> Self {
        Self { state: InterpreterState::default(), fs, commands, limits, exec_fn: None }
    }

    /// Interpreter over `fs` with the default registry and limits.
    pub fn with_fs(fs: Arc<dyn FileSystem>) -> Self {
        Self::new(fs, Arc::new(CommandRegistry::with_defaults()), ExecutionLimits::default())
    }

    /// Installs the callback external commands use to run nested scripts.
    pub fn set_exec_fn(&mut self, exec_fn: ExecFn) {
        self.exec_fn = Some(exec_fn);
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    // =========================================================================
    // Scripts and statements
    // =========================================================================

    /// Runs a parsed script in the current shell.
    pub async fn execute_script(&mut self, script: &ScriptNode) -> ExecResult {
        self.execute_statements(&script.statements).await
    }

    pub(crate) fn execute_statements<'a>(&'a mut self, statements: &'a [StatementNode]) -> BoxFuture<'a, ExecResult> {
        Box::pin(async move {
            let mut acc = ExecResult::ok();
            for statement in statements {
                if self.state.options.noexec {
                    break;
                }
                let result = self.execute_statement(statement).await;
                acc.absorb(result);
                self.state.last_exit_code = acc.exit_code;
                if !acc.signal.is_normal() {
                    break;
                }
            }
            acc
        })
    }

    /// One and-or list. Only the last pipeline of the list is subject to
    /// errexit and the ERR trap, and only when it is not negated.
    async fn execute_statement(&mut self, statement: &StatementNode) -> ExecResult {
        self.state.current_line = statement.line;
        if statement.background {
            return self.execute_background(statement).await;
        }
        let outer_condition = self.state.in_condition;
        let last = statement.pipelines.len().saturating_sub(1);
        let mut acc = ExecResult::ok();
        let mut checked = false;

        for (i, pipeline) in statement.pipelines.iter().enumerate() {
            if i > 0 {
                let skip = match statement.operators[i - 1] {
                    StatementOperator::And => acc.exit_code != 0,
                    StatementOperator::Or => acc.exit_code == 0,
                };
                if skip {
                    checked = false;
                    continue;
                }
            }
            self.state.in_condition = outer_condition || i < last;
            let result = self.execute_pipeline(pipeline).await;
            self.state.in_condition = outer_condition;
            acc.absorb(result);
            self.state.last_exit_code = acc.exit_code;
            if !acc.signal.is_normal() {
                return acc;
            }
            checked = i == last && !pipeline.negated;
        }

        if checked && acc.exit_code != 0 && !self.state.in_condition {
            self.on_command_failure(&mut acc).await;
        }
        acc
    }

    /// ERR trap, then `set -e`.
    async fn on_command_failure(&mut self, acc: &mut ExecResult) {
        let code = acc.exit_code;
        if self.state.traps.contains_key("ERR") {
            let trap = self.run_trap("ERR").await;
            acc.stdout.push_str(&trap.stdout);
            acc.stderr.push_str(&trap.stderr);
            if !trap.signal.is_normal() {
                acc.signal = trap.signal;
                return;
            }
        }
        if self.state.errexit_active() {
            tracing::debug!(exit_code = code, line = self.state.current_line, "errexit");
            acc.signal = ControlSignal::Exit(code);
        }
    }

    /// `cmd &`: runs to completion in a subshell, records a synthetic `$!`.
    async fn execute_background(&mut self, statement: &StatementNode) -> ExecResult {
        let foreground = StatementNode { background: false, ..statement.clone() };
        let pid = self.state.allocate_pid();
        let mut sub = self.subshell();
        sub.state.bash_pid = pid;
        let result = sub.execute_statements(std::slice::from_ref(&foreground)).await;
        let trap = sub.run_trap("EXIT").await;
        self.state.command_count = sub.state.command_count;
        self.state.last_background_pid = Some(pid);
        if let Some(msg) = sub.state.limit_error.take() {
            return self.fail(InterpreterError::ExecutionLimit(msg));
        }
        ExecResult::new(result.stdout + &trap.stdout, result.stderr + &trap.stderr, 0)
    }

    // =========================================================================
    // Pipelines
    // =========================================================================

    pub(crate) async fn execute_pipeline(&mut self, pipeline: &PipelineNode) -> ExecResult {
        let mut result = if pipeline.commands.len() == 1 {
            let result = self.execute_command(&pipeline.commands[0]).await;
            self.set_pipestatus(&[result.exit_code]);
            result
        } else {
            self.execute_multi_stage(pipeline).await
        };
        if pipeline.negated {
            result.exit_code = if result.exit_code == 0 { 1 } else { 0 };
        }
        result
    }

    /// Stages run one after another; each stage's stdout becomes the next
    /// stage's stdin. All stages run in subshells except the last one
    /// under `lastpipe`.
    async fn execute_multi_stage(&mut self, pipeline: &PipelineNode) -> ExecResult {
        let count = pipeline.commands.len();
        let lastpipe = self.state.shopt_options.lastpipe;
        let mut input = self.state.stdin.clone();
        let mut stderr = String::new();
        let mut codes = Vec::with_capacity(count);
        let mut last = ExecResult::ok();

        for (i, command) in pipeline.commands.iter().enumerate() {
            let is_last = i + 1 == count;
            let result = if is_last && lastpipe {
                let saved = std::mem::replace(&mut self.state.stdin, input.take());
                let result = self.execute_command(command).await;
                self.state.stdin = saved;
                result
            } else {
                let mut sub = self.subshell();
                sub.state.stdin = input.take();
                if !is_last {
                    sub.state.fd_targets.remove(&1);
                }
                let mut result = sub.execute_command(command).await;
                if let ControlSignal::Exit(code) | ControlSignal::Return(code) = result.signal {
                    result.exit_code = code;
                }
                result.signal = ControlSignal::Normal;
                let trap = sub.run_trap("EXIT").await;
                result.stdout.push_str(&trap.stdout);
                result.stderr.push_str(&trap.stderr);
                self.state.command_count = sub.state.command_count;
                if let Some(msg) = sub.state.limit_error.take() {
                    return self.fail(InterpreterError::ExecutionLimit(msg));
                }
                result
            };
            codes.push(result.exit_code);
            if is_last {
                stderr.push_str(&result.stderr);
                last = result;
            } else {
                let mut piped = result.stdout;
                if pipeline.pipe_stderr.get(i).copied().unwrap_or(false) {
                    piped.push_str(&result.stderr);
                } else {
                    stderr.push_str(&result.stderr);
                }
                input = Some(piped);
            }
        }

        self.set_pipestatus(&codes);
        last.stderr = stderr;
        if self.state.options.pipefail {
            last.exit_code = codes.iter().rev().find(|c| **c != 0).copied().unwrap_or(0);
        }
        last
    }

    pub(crate) fn set_pipestatus(&mut self, codes: &[i32]) {
        let map = codes.iter().enumerate().map(|(i, c)| (i as i64, c.to_string())).collect();
        self.state.vars.global_frame("PIPESTATUS").value = Some(VarValue::Indexed(map));
    }

    // =========================================================================
    // Commands
    // =========================================================================

    pub(crate) fn execute_command<'a>(&'a mut self, command: &'a CommandNode) -> BoxFuture<'a, ExecResult> {
        Box::pin(async move {
            let mut result = match command {
                CommandNode::Simple(node) => match self.execute_simple_command(node).await {
                    Ok(result) => result,
                    Err(err) => self.fail(err),
                },
                CommandNode::Compound(node) => self.execute_compound(node).await,
                CommandNode::FunctionDef(def) => self.define_function(def),
            };
            let pending = std::mem::take(&mut self.state.pending_stderr);
            if !pending.is_empty() {
                result.stderr.insert_str(0, &pending);
            }
            result
        })
    }

    /// Turns an expansion or builtin error into the command's result.
    pub(crate) fn fail(&mut self, err: InterpreterError) -> ExecResult {
        let code = err.exit_code();
        let result = ExecResult::failure_with_code(err.to_stderr(), code);
        if !err.is_fatal() {
            return result;
        }
        if let InterpreterError::ExecutionLimit(msg) = &err {
            tracing::warn!(limit = %msg, "execution limit exceeded");
            self.state.limit_error = Some(msg.clone());
        }
        result.with_signal(ControlSignal::Exit(code))
    }

    pub(crate) fn count_command(&mut self) -> InterpreterResult<()> {
        self.state.command_count += 1;
        if self.state.command_count > self.limits.max_command_count {
            return Err(InterpreterError::ExecutionLimit(format!(
                "too many commands executed (>{}), increase max_command_count",
                self.limits.max_command_count
            )));
        }
        Ok(())
    }

    pub(crate) async fn execute_compound(&mut self, node: &CompoundCommandNode) -> ExecResult {
        let plan = match self.open_redirections(node.redirections()).await {
            Ok(plan) => plan,
            Err(err) => return self.fail(err),
        };
        let saved_stdin = self.enter_redirections(&plan);
        let result = match self.execute_compound_body(node).await {
            Ok(result) => result,
            Err(err) => self.fail(err),
        };
        self.leave_redirections(saved_stdin);
        self.route_output(&plan, result).await
    }

    async fn execute_compound_body(&mut self, node: &CompoundCommandNode) -> InterpreterResult<ExecResult> {
        match node {
            CompoundCommandNode::If(n) => self.execute_if(n).await,
            CompoundCommandNode::For(n) => self.execute_for(n).await,
            CompoundCommandNode::CStyleFor(n) => self.execute_cstyle_for(n).await,
            CompoundCommandNode::While(n) => self.execute_while(n, false).await,
            CompoundCommandNode::Until(n) => self.execute_while(n, true).await,
            CompoundCommandNode::Case(n) => self.execute_case(n).await,
            CompoundCommandNode::Group(n) => Ok(self.execute_statements(&n.body).await),
            CompoundCommandNode::Subshell(n) => self.run_subshell(&n.body).await,
            CompoundCommandNode::Arithmetic(n) => {
                self.state.current_line = n.line;
                self.count_command()?;
                let text = self.expand_arith_text(&n.expression).await?;
                if self.state.options.xtrace {
                    let prefix = self.xtrace_prefix();
                    self.state.pending_stderr.push_str(&format!("{}(( {} ))\n", prefix, text.trim()));
                }
                let value = self.state.eval_arith_text(&text)?;
                Ok(ExecResult::with_code(if value != 0 { 0 } else { 1 }))
            }
            CompoundCommandNode::Conditional(n) => {
                self.state.current_line = n.line;
                self.count_command()?;
                match self.eval_conditional(&n.expression).await {
                    Ok(true) => Ok(ExecResult::ok()),
                    Ok(false) => Ok(ExecResult::with_code(1)),
                    Err(err) if err.is_fatal() => Err(err),
                    Err(err) => Ok(ExecResult::failure_with_code(err.to_stderr(), 2)),
                }
            }
        }
    }

    // =========================================================================
    // Simple commands
    // =========================================================================

    async fn execute_simple_command(&mut self, node: &SimpleCommandNode) -> InterpreterResult<ExecResult> {
        self.state.current_line = node.line;
        self.count_command()?;
        self.state.last_subst_status = None;

        let args = if node.words.is_empty() { Vec::new() } else { self.expand_command_words(&node.words).await? };

        if args.is_empty() {
            return self.execute_assignments_only(node).await;
        }

        let plan = self.open_redirections(&node.redirections).await?;
        if args[0] == "exec" && args.len() == 1 {
            self.make_redirections_permanent(&plan);
            for assignment in &node.assignments {
                self.apply_assignment(assignment).await?;
            }
            return Ok(ExecResult::ok());
        }

        let mut saved_vars = Vec::with_capacity(node.assignments.len());
        let mut trace_words = Vec::new();
        for assignment in &node.assignments {
            let name = assignment.name.clone();
            saved_vars.push((name.clone(), self.state.vars.get_raw(&name).cloned()));
            trace_words.push(self.apply_assignment(assignment).await?);
            self.state.vars.declare_global(&name).attrs.exported = true;
        }

        if self.state.options.xtrace {
            trace_words.extend(args.iter().map(|a| quote_if_needed(a)));
            let line = format!("{}{}\n", self.xtrace_prefix(), trace_words.join(" "));
            self.state.pending_stderr.push_str(&line);
        }

        let saved_stdin = self.enter_redirections(&plan);
        let invokable = self.resolve_command(&args[0]);
        tracing::debug!(command = %args[0], kind = invokable.kind(), "dispatch");
        let outcome = self.invoke(invokable, args.clone()).await;
        self.leave_redirections(saved_stdin);

        for (name, saved) in saved_vars.into_iter().rev() {
            self.restore_variable(&name, saved);
        }
        if let Some(last) = args.last() {
            self.state.last_arg = last.clone();
        }

        let result = match outcome {
            Ok(result) => result,
            Err(err) => self.fail(err),
        };
        Ok(self.route_output(&plan, result).await)
    }

    /// `a=1 b=2` or `>file` alone: assignments persist, redirections
    /// only open their files. Status is that of the last command
    /// substitution, or 0.
    async fn execute_assignments_only(&mut self, node: &SimpleCommandNode) -> InterpreterResult<ExecResult> {
        let mut trace = Vec::new();
        for assignment in &node.assignments {
            trace.push(self.apply_assignment(assignment).await?);
        }
        let plan = self.open_redirections(&node.redirections).await?;
        if self.state.options.xtrace && !trace.is_empty() {
            let line = format!("{}{}\n", self.xtrace_prefix(), trace.join(" "));
            self.state.pending_stderr.push_str(&line);
        }
        let code = self.state.last_subst_status.unwrap_or(0);
        Ok(self.route_output(&plan, ExecResult::with_code(code)).await)
    }

    /// Puts a prefix-assigned variable back the way it was.
    pub(crate) fn restore_variable(&mut self, name: &str, saved: Option<Variable>) {
        match saved {
            Some(var) => *self.state.vars.declare_global(name) = var,
            None => {
                let _ = self.state.vars.unset(name);
            }
        }
    }

    /// Expands command words. Arguments of declaration builtins that look
    /// like assignments are not split or globbed.
    async fn expand_command_words(&mut self, words: &[WordNode]) -> InterpreterResult<Vec<String>> {
        let declaration = words
            .first()
            .and_then(WordNode::as_plain_literal)
            .map_or(false, |name| DECLARATION_BUILTINS.contains(&name.as_str()));
        if !declaration {
            return self.expand_words(words).await;
        }
        let mut args = Vec::with_capacity(words.len());
        for word in words {
            let assignment_like = matches!(
                word.parts.first(),
                Some(WordPart::Literal(text)) if split_assignment_word(text).is_some()
            );
            if assignment_like {
                args.push(self.expand_word_string(word).await?);
            } else {
                args.extend(self.expand_word_fields(word).await?);
            }
        }
        Ok(args)
    }

    pub(crate) fn xtrace_prefix(&self) -> String {
        self.state.vars.get_scalar("PS4").unwrap_or_else(|| "+ ".to_string())
    }

    // =========================================================================
    // Subshells, substitutions and nested source text
    // =========================================================================

    /// Copy of this shell for `( )`, pipeline stages and substitutions.
    /// Traps other than ignored ones are reset.
    pub(crate) fn subshell(&mut self) -> Interpreter {
        let pid = self.state.allocate_pid();
        let mut sub = self.clone();
        sub.state.traps.retain(|_, action| action.is_empty());
        sub.state.subshell_level += 1;
        sub.state.bash_pid = pid;
        sub
    }

    /// `( list )`
    pub(crate) async fn run_subshell(&mut self, body: &[StatementNode]) -> InterpreterResult<ExecResult> {
        let mut sub = self.subshell();
        let mut result = sub.execute_statements(body).await;
        if let ControlSignal::Exit(code) | ControlSignal::Return(code) = result.signal {
            result.exit_code = code;
        }
        result.signal = ControlSignal::Normal;
        let trap = sub.run_trap("EXIT").await;
        result.stdout.push_str(&trap.stdout);
        result.stderr.push_str(&trap.stderr);
        self.state.command_count = sub.state.command_count;
        if let Some(msg) = sub.state.limit_error.take() {
            return Err(InterpreterError::ExecutionLimit(msg));
        }
        Ok(result)
    }

    /// `$(...)`: runs the body in a subshell and returns its stdout with
    /// trailing newlines removed. Its stderr is queued for the enclosing
    /// command and its status becomes `$?`.
    pub(crate) async fn run_command_substitution(&mut self, body: &ScriptNode) -> InterpreterResult<String> {
        if self.state.substitution_depth >= self.limits.max_substitution_depth {
            return Err(InterpreterError::ExecutionLimit(format!(
                "command substitution nesting too deep (>{})",
                self.limits.max_substitution_depth
            )));
        }
        if let Some(path) = file_read_shortcut(body) {
            let path = self.expand_word_string(path).await?;
            let resolved = self.fs.resolve_path(&self.state.cwd, &path);
            return match self.fs.read_file(&resolved).await {
                Ok(content) => {
                    self.state.last_subst_status = Some(0);
                    Ok(content.trim_end_matches('\n').to_string())
                }
                Err(e) => {
                    self.state.pending_stderr.push_str(&format!("bash: {}: {}\n", path, e.shell_message()));
                    self.state.last_exit_code = 1;
                    self.state.last_subst_status = Some(1);
                    Ok(String::new())
                }
            };
        }

        let mut sub = self.subshell();
        sub.state.substitution_depth += 1;
        sub.state.fd_targets.clear();
        let result = sub.execute_statements(&body.statements).await;
        let code = match result.signal {
            ControlSignal::Exit(code) | ControlSignal::Return(code) => code,
            _ => result.exit_code,
        };
        let trap = sub.run_trap("EXIT").await;
        self.state.command_count = sub.state.command_count;
        if let Some(msg) = sub.state.limit_error.take() {
            return Err(InterpreterError::ExecutionLimit(msg));
        }
        self.state.last_exit_code = code;
        self.state.last_subst_status = Some(code);
        self.state.pending_stderr.push_str(&result.stderr);
        self.state.pending_stderr.push_str(&trap.stderr);
        let mut out = result.stdout + &trap.stdout;
        let trimmed = out.trim_end_matches('\n').len();
        out.truncate(trimmed);
        Ok(out)
    }

    /// Parses and runs text in the current shell (`eval`, `source`,
    /// traps). A syntax error gives status 2 and runs nothing.
    pub(crate) async fn execute_text(&mut self, text: &str, label: &str) -> ExecResult {
        match parse(text) {
            Ok(script) => {
                tracing::debug!(label, statements = script.statements.len(), "parsed nested source");
                self.execute_statements(&script.statements).await
            }
            Err(e) => ExecResult::failure_with_code(format!("bash: {}: {}\n", label, e), 2),
        }
    }

    /// Runs the action registered for a trap condition, if any. `$?` is
    /// preserved across the action and traps do not nest.
    pub(crate) async fn run_trap(&mut self, condition: &str) -> ExecResult {
        let Some(action) = self.state.traps.get(condition).cloned() else {
            return ExecResult::ok();
        };
        if action.is_empty() || self.state.in_trap {
            return ExecResult::ok();
        }
        tracing::debug!(condition, "running trap");
        let status = self.state.last_exit_code;
        self.state.in_trap = true;
        let mut result = self.execute_text(&action, "trap").await;
        self.state.in_trap = false;
        self.state.last_exit_code = status;
        if result.signal.is_normal() {
            result.exit_code = status;
        }
        result
    }
}

/// `$(< file)` reads the file without running a command.
fn file_read_shortcut(body: &ScriptNode) -> Option<&WordNode> {
    let [statement] = body.statements.as_slice() else {
        return None;
    };
    let [pipeline] = statement.pipelines.as_slice() else {
        return None;
    };
    let [CommandNode::Simple(cmd)] = pipeline.commands.as_slice() else {
        return None;
    };
    if !cmd.words.is_empty() || !cmd.assignments.is_empty() || pipeline.negated || statement.background {
        return None;
    }
    match cmd.redirections.as_slice() {
        [r] if r.operator == RedirectionOperator::Less && r.fd.map_or(true, |fd| fd == 0) => match &r.target {
            RedirectionTarget::Word(word) => Some(word),
            RedirectionTarget::HereDoc(_) => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;
    use pretty_assertions::assert_eq;

    async fn run(script: &str) -> (ExecResult, Interpreter) {
        let fs = Arc::new(InMemoryFs::with_files([("/tmp/data.txt", "line1\nline2\n")]));
        let mut it = Interpreter::with_fs(fs);
        it.state.cwd = "/tmp".to_string();
        let ast = parse(script).unwrap();
        let result = it.execute_script(&ast).await;
        (result, it)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_and_or_lists() {
        let (r, _) = run("true && echo a || echo b; false && echo c || echo d").await;
        assert_eq!(r.stdout, "a\nd\n");
        assert_eq!(r.exit_code, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pipestatus_and_pipefail() {
        let (r, it) = run("false | true | (exit 3) | true; echo ${#PIPESTATUS[@]}").await;
        assert_eq!(r.stdout, "4\n");
        assert_eq!(it.state.vars.get("PIPESTATUS").map(|v| v.values()), Some(vec!["0".to_string()]));
        let (r, _) = run("set -o pipefail; true | (exit 3) | true; echo $?").await;
        assert_eq!(r.stdout, "3\n");
        let (r, _) = run("true | false; echo ${PIPESTATUS[@]}").await;
        assert_eq!(r.stdout, "0 1\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_negation() {
        let (r, _) = run("! false; echo $?; ! true; echo $?").await;
        assert_eq!(r.stdout, "0\n1\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_errexit_stops_script() {
        let (r, _) = run("set -e; echo before; false; echo after").await;
        assert_eq!(r.stdout, "before\n");
        assert_eq!(r.signal, ControlSignal::Exit(1));
        let (r, _) = run("set -e; if false; then :; fi; false || true; ! true; echo survived").await;
        assert_eq!(r.stdout, "survived\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_err_trap() {
        let (r, _) = run("trap 'echo caught $?' ERR; false; echo next").await;
        assert_eq!(r.stdout, "caught 1\nnext\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_subshell_isolation() {
        let (r, _) = run("x=1; (x=2; echo $x); echo $x; echo a | read y; echo \"[$y]\"").await;
        assert_eq!(r.stdout, "2\n1\n[]\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_lastpipe_keeps_variables() {
        let (r, _) = run("shopt -s lastpipe; echo hi | read y; echo $y").await;
        assert_eq!(r.stdout, "hi\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_command_substitution() {
        let (r, _) = run("x=$(echo a; echo b); echo \"$x\"; echo $(false); echo $?").await;
        assert_eq!(r.stdout, "a\nb\n\n0\n");
        let (r, _) = run("x=$(false); echo $?").await;
        assert_eq!(r.stdout, "1\n");
        let (r, _) = run("echo \"$(< data.txt)\"").await;
        assert_eq!(r.stdout, "line1\nline2\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_prefix_assignment_is_temporary() {
        let (r, _) = run("f() { echo $v; }; v=1; v=2 f; echo $v").await;
        assert_eq!(r.stdout, "2\n1\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_assignment_status_from_substitution() {
        let (r, _) = run("x=$(exit 4); echo $?").await;
        assert_eq!(r.stdout, "4\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_background_sets_pid() {
        let (r, it) = run("echo bg & wait; echo $!").await;
        assert!(r.stdout.starts_with("bg\n"));
        assert_eq!(it.state.last_background_pid.map(|p| p.to_string()), Some(r.stdout[3..].trim().to_string()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_nounset_is_fatal() {
        let (r, _) = run("set -u; echo $missing; echo after").await;
        assert_eq!(r.stdout, "");
        assert!(r.stderr.contains("missing: unbound variable"));
        assert_eq!(r.signal, ControlSignal::Exit(1));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_xtrace() {
        let (r, _) = run("set -x; echo 'a b' c").await;
        assert_eq!(r.stdout, "a b c\n");
        assert_eq!(r.stderr, "+ echo 'a b' c\n");
        let (r, _) = run("set -x; (( 1 + 2 ))").await;
        assert_eq!(r.stderr, "+ (( 1 + 2 ))\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_command_limit() {
        let fs = Arc::new(InMemoryFs::new());
        let limits = ExecutionLimits { max_command_count: 10, ..Default::default() };
        let mut it = Interpreter::new(fs, Arc::new(CommandRegistry::new()), limits);
        let ast = parse("while true; do :; done; echo unreachable").unwrap();
        let r = it.execute_script(&ast).await;
        assert_eq!(r.exit_code, 126);
        assert!(r.stderr.contains("too many commands"));
        assert!(!r.stdout.contains("unreachable"));
    }
}

//! Control Flow Execution
//!
//! if/elif/else, for, C-style for, while, until and case.
//!
//! Loops consume `Break(1)` and `Continue(1)`; deeper levels are
//! decremented and passed on to the enclosing loop.

use crate::ast::types::{CStyleForNode, CaseNode, CaseTerminator, ForNode, IfNode, StatementNode, WhileNode};
use crate::interpreter::errors::{InterpreterError, InterpreterResult};
use crate::interpreter::execution_engine::Interpreter;
use crate::interpreter::pattern::{self, MatchFlags};
use crate::interpreter::types::{ControlSignal, ExecResult};

/// What a loop does after one body run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopStep {
    Next,
    Stop,
    Propagate,
}

/// Consumes the loop's own break/continue from `result.signal`.
fn loop_control(result: &mut ExecResult) -> LoopStep {
    match result.signal {
        ControlSignal::Normal => LoopStep::Next,
        ControlSignal::Break(n) if n <= 1 => {
            result.signal = ControlSignal::Normal;
            LoopStep::Stop
        }
        ControlSignal::Break(n) => {
            result.signal = ControlSignal::Break(n - 1);
            LoopStep::Propagate
        }
        ControlSignal::Continue(n) if n <= 1 => {
            result.signal = ControlSignal::Normal;
            LoopStep::Next
        }
        ControlSignal::Continue(n) => {
            result.signal = ControlSignal::Continue(n - 1);
            LoopStep::Propagate
        }
        ControlSignal::Return(_) | ControlSignal::Exit(_) => LoopStep::Propagate,
    }
}

impl Interpreter {
    /// Condition lists are exempt from errexit.
    async fn run_condition(&mut self, condition: &[StatementNode]) -> ExecResult {
        let outer = self.state.in_condition;
        self.state.in_condition = true;
        let result = self.execute_statements(condition).await;
        self.state.in_condition = outer;
        result
    }

    fn tick_loop(&mut self, iterations: &mut u64) -> InterpreterResult<()> {
        *iterations += 1;
        if *iterations > self.limits.max_loop_iterations {
            return Err(InterpreterError::ExecutionLimit(format!(
                "too many loop iterations (>{}), increase max_loop_iterations",
                self.limits.max_loop_iterations
            )));
        }
        Ok(())
    }

    /// Error inside a loop: keep what was already produced.
    fn fail_after(&mut self, mut acc: ExecResult, err: InterpreterError) -> ExecResult {
        let failed = self.fail(err);
        acc.absorb(failed);
        acc
    }

    pub(crate) async fn execute_if(&mut self, node: &IfNode) -> InterpreterResult<ExecResult> {
        let mut acc = ExecResult::ok();
        for clause in &node.clauses {
            let cond = self.run_condition(&clause.condition).await;
            let passed = cond.exit_code == 0;
            acc.absorb(cond);
            if !acc.signal.is_normal() {
                return Ok(acc);
            }
            if passed {
                let body = self.execute_statements(&clause.body).await;
                acc.absorb(body);
                return Ok(acc);
            }
        }
        match &node.else_body {
            Some(body) => {
                let body = self.execute_statements(body).await;
                acc.absorb(body);
            }
            None => acc.exit_code = 0,
        }
        Ok(acc)
    }

    pub(crate) async fn execute_for(&mut self, node: &ForNode) -> InterpreterResult<ExecResult> {
        let items = match &node.words {
            Some(words) => self.expand_words(words).await?,
            None => self.state.positional.clone(),
        };
        let mut acc = ExecResult::ok();
        let mut iterations = 0;
        self.state.loop_depth += 1;
        for item in items {
            if let Err(err) = self.tick_loop(&mut iterations) {
                self.state.loop_depth -= 1;
                return Ok(self.fail_after(acc, err));
            }
            if let Err(err) = self.state.assign_scalar(&node.variable, &item, false) {
                self.state.loop_depth -= 1;
                return Ok(self.fail_after(acc, err));
            }
            let mut body = self.execute_statements(&node.body).await;
            let step = loop_control(&mut body);
            acc.absorb(body);
            if step != LoopStep::Next {
                break;
            }
        }
        self.state.loop_depth -= 1;
        Ok(acc)
    }

    async fn arith_clause(&mut self, clause: &Option<String>) -> InterpreterResult<i64> {
        match clause {
            Some(text) if !text.trim().is_empty() => {
                let expanded = self.expand_arith_text(text).await?;
                self.state.eval_arith_text(&expanded)
            }
            // An empty condition is true
            _ => Ok(1),
        }
    }

    pub(crate) async fn execute_cstyle_for(&mut self, node: &CStyleForNode) -> InterpreterResult<ExecResult> {
        self.state.current_line = node.line;
        self.arith_clause(&node.init).await?;
        let mut acc = ExecResult::ok();
        let mut iterations = 0;
        self.state.loop_depth += 1;
        let outcome = async {
            loop {
                if self.arith_clause(&node.condition).await? == 0 {
                    break;
                }
                self.tick_loop(&mut iterations)?;
                let mut body = self.execute_statements(&node.body).await;
                let step = loop_control(&mut body);
                acc.absorb(body);
                if step != LoopStep::Next {
                    break;
                }
                self.arith_clause(&node.update).await?;
            }
            Ok::<(), InterpreterError>(())
        }
        .await;
        self.state.loop_depth -= 1;
        match outcome {
            Ok(()) => Ok(acc),
            Err(err) => Ok(self.fail_after(acc, err)),
        }
    }

    /// `while` runs the body while the condition succeeds, `until` while
    /// it fails. Status is the last body's, or 0 if it never ran.
    pub(crate) async fn execute_while(&mut self, node: &WhileNode, until: bool) -> InterpreterResult<ExecResult> {
        let mut acc = ExecResult::ok();
        let mut iterations = 0;
        let mut status = 0;
        self.state.loop_depth += 1;
        loop {
            let mut cond = self.run_condition(&node.condition).await;
            let passed = (cond.exit_code == 0) != until;
            let step = loop_control(&mut cond);
            acc.stdout.push_str(&cond.stdout);
            acc.stderr.push_str(&cond.stderr);
            if step == LoopStep::Propagate {
                acc.exit_code = cond.exit_code;
                acc.signal = cond.signal;
                break;
            }
            if step == LoopStep::Stop || !passed {
                break;
            }
            if let Err(err) = self.tick_loop(&mut iterations) {
                self.state.loop_depth -= 1;
                return Ok(self.fail_after(acc, err));
            }
            let mut body = self.execute_statements(&node.body).await;
            let step = loop_control(&mut body);
            status = body.exit_code;
            acc.absorb(body);
            if step != LoopStep::Next {
                break;
            }
        }
        self.state.loop_depth -= 1;
        if acc.signal.is_normal() {
            acc.exit_code = status;
        }
        Ok(acc)
    }

    pub(crate) async fn execute_case(&mut self, node: &CaseNode) -> InterpreterResult<ExecResult> {
        let word = self.expand_word_string(&node.word).await?;
        let flags = MatchFlags { extglob: true, nocase: self.state.shopt_options.nocasematch };
        let mut acc = ExecResult::ok();
        let mut fall_through = false;

        for item in &node.items {
            if !fall_through {
                let mut matched = false;
                for pat in &item.patterns {
                    let pat = self.expand_word_pattern(pat).await?;
                    if pattern::matches(&pat, &word, flags) {
                        matched = true;
                        break;
                    }
                }
                if !matched {
                    continue;
                }
            }
            let body = self.execute_statements(&item.body).await;
            acc.absorb(body);
            if !acc.signal.is_normal() {
                return Ok(acc);
            }
            match item.terminator {
                CaseTerminator::DoubleSemi => return Ok(acc),
                CaseTerminator::SemiAnd => fall_through = true,
                CaseTerminator::SemiSemiAnd => fall_through = false,
            }
        }
        Ok(acc)
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::CommandRegistry;
    use crate::fs::InMemoryFs;
    use crate::interpreter::execution_engine::Interpreter;
    use crate::interpreter::types::{ExecResult, ExecutionLimits};
    use crate::parser::parse;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    async fn run_with(limits: ExecutionLimits, script: &str) -> ExecResult {
        let mut it = Interpreter::new(Arc::new(InMemoryFs::new()), Arc::new(CommandRegistry::new()), limits);
        let ast = parse(script).unwrap();
        it.execute_script(&ast).await
    }

    async fn run(script: &str) -> String {
        run_with(ExecutionLimits::default(), script).await.stdout
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_if_elif_else() {
        let script = "for n in 1 2 3; do if [[ $n == 1 ]]; then echo one; elif (( n == 2 )); then echo two; else echo other; fi; done";
        assert_eq!(run(script).await, "one\ntwo\nother\n");
        assert_eq!(run("if false; then :; fi; echo $?").await, "0\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_for_splits_on_ifs() {
        assert_eq!(run("s='  a   b  '; for w in $s; do echo \"[$w]\"; done").await, "[a]\n[b]\n");
        assert_eq!(run("set -- x 'y z'; for a; do echo $a; done").await, "x\ny z\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_break_and_continue_levels() {
        let script = "for i in 1 2 3; do for j in a b c; do [[ $j == b ]] && continue 2; [[ $i == 3 ]] && break 2; echo $i$j; done; done; echo end";
        assert_eq!(run(script).await, "1a\n2a\nend\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cstyle_for_and_while() {
        assert_eq!(run("for ((i=0; i<3; i++)); do echo $i; done").await, "0\n1\n2\n");
        assert_eq!(run("for ((i=0; i<4; i++)); do (( i % 2 )) && continue; echo $i; done").await, "0\n2\n");
        assert_eq!(run("n=0; while (( n < 3 )); do n=$((n+1)); done; echo $n").await, "3\n");
        assert_eq!(run("n=3; until (( n == 0 )); do echo $n; n=$((n-1)); done").await, "3\n2\n1\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_case_terminators() {
        let script = "case abc in a*) echo one ;& x) echo two ;; *) echo three ;; esac";
        assert_eq!(run(script).await, "one\ntwo\n");
        let script = "case abc in a*) echo one ;;& *c) echo two ;;& z) echo no ;; esac";
        assert_eq!(run(script).await, "one\ntwo\n");
        assert_eq!(run("case x.txt in *.@(md|txt)) echo doc ;; esac").await, "doc\n");
        assert_eq!(run("p='*'; case abc in \"$p\") echo lit ;; $p) echo glob ;; esac").await, "glob\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_loop_limit() {
        let limits = ExecutionLimits { max_loop_iterations: 5, ..Default::default() };
        let r = run_with(limits, "i=0; while true; do echo $i; i=$((i+1)); done; echo never").await;
        assert_eq!(r.stdout, "0\n1\n2\n3\n4\n");
        assert_eq!(r.exit_code, 126);
        assert!(r.stderr.contains("too many loop iterations"));
    }
}

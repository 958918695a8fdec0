//! Function Handling
//!
//! Definition stores the body in the function table; a call pushes a
//! variable scope, swaps in the call's positional parameters and runs the
//! body as a compound command. `return` unwinds to here.

use std::sync::Arc;

use crate::ast::types::FunctionDefNode;
use crate::interpreter::errors::{InterpreterError, InterpreterResult};
use crate::interpreter::execution_engine::Interpreter;
use crate::interpreter::types::{ControlSignal, ExecResult};
use crate::interpreter::variables::VarValue;

impl Interpreter {
    pub(crate) fn define_function(&mut self, def: &FunctionDefNode) -> ExecResult {
        tracing::debug!(name = %def.name, "function defined");
        self.state.functions.insert(def.name.clone(), Arc::new(def.clone()));
        ExecResult::ok()
    }

    /// Invokes a function with `args[1..]` as `$1..$N`.
    pub(crate) async fn call_function(&mut self, func: Arc<FunctionDefNode>, args: Vec<String>) -> InterpreterResult<ExecResult> {
        if self.state.call_depth >= self.limits.max_call_depth {
            return Err(InterpreterError::ExecutionLimit(format!(
                "{}: maximum recursion depth ({}) exceeded",
                func.name, self.limits.max_call_depth
            )));
        }
        let plan = self.open_redirections(&func.redirections).await?;
        let saved_stdin = self.enter_redirections(&plan);

        self.state.call_depth += 1;
        self.state.vars.push_scope();
        let saved_positional = std::mem::replace(&mut self.state.positional, args.into_iter().skip(1).collect());
        self.state.func_name_stack.push(func.name.clone());
        self.sync_funcname();
        let saved_loop_depth = std::mem::replace(&mut self.state.loop_depth, 0);

        let mut result = self.execute_compound(&func.body).await;

        self.state.loop_depth = saved_loop_depth;
        self.state.func_name_stack.pop();
        self.sync_funcname();
        self.state.positional = saved_positional;
        self.state.vars.pop_scope();
        self.state.call_depth -= 1;
        self.leave_redirections(saved_stdin);

        match result.signal {
            ControlSignal::Return(code) => {
                result.exit_code = code;
                result.signal = ControlSignal::Normal;
            }
            // break/continue do not cross a function boundary
            ControlSignal::Break(_) | ControlSignal::Continue(_) => result.signal = ControlSignal::Normal,
            _ => {}
        }
        Ok(self.route_output(&plan, result).await)
    }

    /// `FUNCNAME`: innermost call first, `main` last.
    fn sync_funcname(&mut self) {
        let slot = self.state.vars.global_frame("FUNCNAME");
        if self.state.func_name_stack.is_empty() {
            slot.value = None;
            return;
        }
        let names = self.state.func_name_stack.iter().rev().cloned().chain(std::iter::once("main".to_string()));
        slot.value = Some(VarValue::Indexed(names.enumerate().map(|(i, n)| (i as i64, n)).collect()));
    }
}

#[cfg(test)]
mod tests {
    use crate::fs::InMemoryFs;
    use crate::interpreter::execution_engine::Interpreter;
    use crate::interpreter::types::{ExecResult, ExecutionLimits};
    use crate::commands::CommandRegistry;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    async fn run_with(limits: ExecutionLimits, script: &str) -> ExecResult {
        let mut it = Interpreter::new(Arc::new(InMemoryFs::new()), Arc::new(CommandRegistry::new()), limits);
        let ast = parse(script).unwrap();
        it.execute_script(&ast).await
    }

    async fn run(script: &str) -> ExecResult {
        run_with(ExecutionLimits::default(), script).await
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_positional_and_return() {
        let r = run("f() { echo \"$# $1 $2\"; return 3; echo no; }; set -- outer; f a b; echo $? $1").await;
        assert_eq!(r.stdout, "2 a b\n3 outer\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_locals_and_dynamic_scope() {
        let r = run("x=g; inner() { echo $x; x=changed; }; outer() { local x=l; inner; echo $x; }; outer; echo $x").await;
        assert_eq!(r.stdout, "l\nchanged\ng\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_funcname_stack() {
        let r = run("a() { b; }; b() { echo ${FUNCNAME[@]}; }; a; echo \"[${FUNCNAME[*]}]\"").await;
        assert_eq!(r.stdout, "b a main\n[]\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_recursion_and_depth_limit() {
        let r = run("fact() { if (( $1 <= 1 )); then echo 1; else echo $(( $1 * $(fact $(( $1 - 1 ))) )); fi; }; fact 5").await;
        assert_eq!(r.stdout, "120\n");
        let limits = ExecutionLimits { max_call_depth: 20, ..Default::default() };
        let r = run_with(limits, "f() { f; }; f; echo after").await;
        assert!(r.stderr.contains("maximum recursion depth (20) exceeded"));
        assert_eq!(r.stdout, "");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_function_redirections() {
        let fs = Arc::new(InMemoryFs::new());
        let mut it = Interpreter::with_fs(fs.clone());
        let ast = parse("log() { echo \"$@\"; } >> /log.txt; log one; log two").unwrap();
        let r = it.execute_script(&ast).await;
        assert_eq!(r.stdout, "");
        use crate::fs::FileSystem;
        assert_eq!(fs.read_file("/log.txt").await.unwrap(), "one\ntwo\n");
    }
}

//! eval, source and exec
//!
//! eval and source run text in the current shell, so variable changes,
//! function definitions and `return` behave as if written inline.

use crate::interpreter::errors::{InterpreterError, InterpreterResult};
use crate::interpreter::execution_engine::Interpreter;
use crate::interpreter::types::{ControlSignal, ExecResult};

impl Interpreter {
    /// eval [arg ...]
    pub(crate) async fn builtin_eval(&mut self, args: &[String]) -> ExecResult {
        let text = args.join(" ");
        if text.trim().is_empty() {
            return ExecResult::ok();
        }
        self.execute_text(&text, "eval").await
    }

    /// Finds a sourced file: names with a slash are taken relative to the
    /// working directory, others are searched in `$PATH` first.
    async fn find_source_file(&mut self, file: &str) -> Option<String> {
        if !file.contains('/') {
            let path = self.state.vars.get_scalar("PATH").unwrap_or_default();
            for dir in path.split(':').filter(|d| !d.is_empty()) {
                let candidate = self.fs.resolve_path(&self.state.cwd, &format!("{}/{}", dir, file));
                if matches!(self.fs.stat(&candidate).await, Ok(stat) if stat.is_file) {
                    return Some(candidate);
                }
            }
        }
        let candidate = self.fs.resolve_path(&self.state.cwd, file);
        match self.fs.stat(&candidate).await {
            Ok(stat) if stat.is_file => Some(candidate),
            _ => None,
        }
    }

    /// source file [arg ...]
    pub(crate) async fn builtin_source(&mut self, name: &str, args: &[String]) -> InterpreterResult<ExecResult> {
        let Some((file, rest)) = args.split_first() else {
            return Ok(ExecResult::failure_with_code(
                format!("bash: {}: filename argument required\n", name),
                2,
            ));
        };
        if self.state.source_depth >= self.limits.max_call_depth {
            return Err(InterpreterError::ExecutionLimit(format!(
                "{}: maximum source depth ({}) exceeded",
                file, self.limits.max_call_depth
            )));
        }
        let content = match self.find_source_file(file).await {
            Some(path) => match self.fs.read_file(&path).await {
                Ok(content) => content,
                Err(e) => return Ok(ExecResult::failure(format!("bash: {}: {}\n", file, e.shell_message()))),
            },
            None => return Ok(ExecResult::failure(format!("bash: {}: No such file or directory\n", file))),
        };
        tracing::debug!(file = %file, bytes = content.len(), "source");

        let saved_positional = if rest.is_empty() {
            None
        } else {
            Some(std::mem::replace(&mut self.state.positional, rest.to_vec()))
        };
        self.state.source_depth += 1;
        let mut result = self.execute_text(&content, file).await;
        self.state.source_depth -= 1;
        if let Some(positional) = saved_positional {
            self.state.positional = positional;
        }

        // Functions consume their own `return`, so one arriving here ends the file.
        if let ControlSignal::Return(code) = result.signal {
            result.exit_code = code;
            result.signal = ControlSignal::Normal;
        }
        Ok(result)
    }

    /// exec command [arg ...]: runs the command, then ends the shell with
    /// its status. Redirection-only `exec` is handled by the caller.
    pub(crate) async fn builtin_exec(&mut self, args: &[String]) -> InterpreterResult<ExecResult> {
        if args.is_empty() {
            return Ok(ExecResult::ok());
        }
        let invokable = self.resolve_command(&args[0]);
        let mut result = self.invoke(invokable, args.to_vec()).await?;
        let code = match result.signal {
            ControlSignal::Exit(code) => code,
            _ => result.exit_code,
        };
        result.exit_code = code;
        result.signal = ControlSignal::Exit(code);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use crate::fs::InMemoryFs;
    use crate::interpreter::execution_engine::Interpreter;
    use crate::interpreter::types::{ControlSignal, ExecResult};
    use crate::parser::parse;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    async fn run(script: &str) -> ExecResult {
        let fs = InMemoryFs::with_files([
            ("/work/lib.sh", "greet() { echo \"hi $1\"; }\nloaded=yes\n"),
            ("/work/args.sh", "echo \"$# $1\"\nreturn 3\necho unreachable\n"),
            ("/usr/share/tool.sh", "echo from-path\n"),
        ]);
        let mut it = Interpreter::with_fs(Arc::new(fs));
        it.state.cwd = "/work".to_string();
        it.state.vars.set_scalar("PATH", "/usr/share").unwrap();
        it.execute_script(&parse(script).unwrap()).await
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_eval_runs_in_current_shell() {
        let r = run("cmd='x=5; echo $x'; eval \"$cmd\"; echo $x; eval 'f() { return 4; }'; f; echo $?").await;
        assert_eq!(r.stdout, "5\n5\n4\n");
        let r = run("eval 'if'; echo $?").await;
        assert_eq!(r.stdout, "2\n");
        assert!(r.stderr.starts_with("bash: eval: "));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_source_defines_in_current_shell() {
        let r = run("source ./lib.sh; greet bob; echo $loaded").await;
        assert_eq!(r.stdout, "hi bob\nyes\n");
        let r = run(". tool.sh").await;
        assert_eq!(r.stdout, "from-path\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_source_args_and_return() {
        let r = run("set -- outer; . ./args.sh a b; echo \"$? $1\"").await;
        assert_eq!(r.stdout, "2 a\n3 outer\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_source_missing_file() {
        let r = run("source nope.sh; echo $?").await;
        assert_eq!(r.stdout, "1\n");
        assert_eq!(r.stderr, "bash: nope.sh: No such file or directory\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_exec_ends_shell() {
        let r = run("exec echo done; echo never").await;
        assert_eq!(r.stdout, "done\n");
        assert_eq!(r.signal, ControlSignal::Exit(0));
    }
}

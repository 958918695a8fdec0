//! Bash Environment
//!
//! Main entry point for embedding the shell. Ties together the parser,
//! the interpreter, the filesystem and the command registry.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::commands::{CommandRegistry, CommandResult, ExecFn, ExecRequest};
use crate::fs::{FileSystem, FsError, InMemoryFs};
use crate::interpreter::execution_engine::Interpreter;
use crate::interpreter::expansion::word_split::DEFAULT_IFS;
use crate::interpreter::types::{ControlSignal, ExecutionLimits};
use crate::parser::parse;

pub const BASH_VERSION: &str = "5.2.15(1)-release";

const DEFAULT_HOME: &str = "/home/user";

/// Options for creating a Bash environment.
#[derive(Default)]
pub struct BashOptions {
    /// Environment variables, exported to commands
    pub env: Option<HashMap<String, String>>,
    /// Working directory
    pub cwd: Option<String>,
    /// File system instance (defaults to InMemoryFs)
    pub fs: Option<Arc<dyn FileSystem>>,
    /// Execution limits
    pub limits: Option<ExecutionLimits>,
    /// External commands (defaults to `bash` and `sh`)
    pub commands: Option<Arc<CommandRegistry>>,
    /// `$1..$N`
    pub args: Vec<String>,
    /// `$0`
    pub script_name: Option<String>,
}

/// Per-execution options.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Variables exported for this run only
    pub env: Option<HashMap<String, String>>,
    /// Working directory for this run only
    pub cwd: Option<String>,
    /// Standard input of the script
    pub stdin: Option<String>,
}

/// Outcome of one `exec` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BashExecResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl From<BashExecResult> for CommandResult {
    fn from(r: BashExecResult) -> Self {
        CommandResult::with_exit_code(r.stdout, r.stderr, r.exit_code)
    }
}

/// The main Bash shell environment. State (variables, functions, cwd,
/// options) persists across `exec` calls.
pub struct Bash {
    pub fs: Arc<dyn FileSystem>,
    interpreter: Interpreter,
}

impl Bash {
    /// Create a new Bash environment.
    pub async fn new(options: BashOptions) -> Self {
        let cwd = options.cwd.unwrap_or_else(|| DEFAULT_HOME.to_string());
        let fs: Arc<dyn FileSystem> = options.fs.unwrap_or_else(|| Arc::new(InMemoryFs::new()));
        let limits = options.limits.unwrap_or_default();
        let commands = options.commands.unwrap_or_else(|| Arc::new(CommandRegistry::with_defaults()));

        init_filesystem(&*fs, &cwd).await;

        let mut interpreter = Interpreter::new(Arc::clone(&fs), Arc::clone(&commands), limits.clone());
        interpreter.set_exec_fn(make_exec_fn(Arc::clone(&fs), commands, limits));

        let mut env: Vec<(String, String, bool)> = vec![
            ("HOME".into(), DEFAULT_HOME.into(), true),
            ("PATH".into(), "/usr/bin:/bin".into(), true),
            ("PWD".into(), cwd.clone(), true),
            ("OLDPWD".into(), cwd.clone(), true),
            ("SHLVL".into(), "1".into(), true),
            ("IFS".into(), DEFAULT_IFS.into(), false),
            ("OPTIND".into(), "1".into(), false),
            ("PPID".into(), std::process::id().to_string(), false),
            ("BASH_VERSION".into(), BASH_VERSION.into(), false),
            ("HOSTNAME".into(), "localhost".into(), false),
            ("OSTYPE".into(), "linux-gnu".into(), false),
        ];
        if let Some(user_env) = options.env {
            let mut user_env: Vec<_> = user_env.into_iter().collect();
            user_env.sort();
            env.extend(user_env.into_iter().map(|(k, v)| (k, v, true)));
        }

        let state = &mut interpreter.state;
        state.cwd = cwd;
        state.positional = options.args;
        state.script_name = options.script_name.unwrap_or_else(|| "bash".to_string());
        for (name, value, exported) in env {
            if let Err(e) = state.vars.set_scalar(&name, value) {
                tracing::warn!(name = %name, error = %e, "cannot set initial variable");
                continue;
            }
            if exported {
                state.vars.declare_global(&name).attrs.exported = true;
            }
        }

        Self { fs, interpreter }
    }

    /// Execute a bash script.
    pub async fn exec(&mut self, script: &str, options: Option<ExecOptions>) -> BashExecResult {
        let options = options.unwrap_or_default();
        self.interpreter.state.command_count = 0;

        let saved_cwd = options.cwd.as_ref().map(|cwd| std::mem::replace(&mut self.interpreter.state.cwd, cwd.clone()));
        let mut saved_vars = Vec::new();
        if let Some(env) = &options.env {
            for (name, value) in env {
                saved_vars.push((name.clone(), self.interpreter.state.vars.get_raw(name).cloned()));
                if self.interpreter.state.vars.set_scalar(name, value.clone()).is_ok() {
                    self.interpreter.state.vars.declare_global(name).attrs.exported = true;
                }
            }
        }
        self.interpreter.state.stdin = options.stdin;

        let result = run_script(&mut self.interpreter, script).await;

        for (name, saved) in saved_vars.into_iter().rev() {
            self.interpreter.restore_variable(&name, saved);
        }
        if let Some(cwd) = saved_cwd {
            self.interpreter.state.cwd = cwd;
        }
        self.interpreter.state.stdin = None;
        result
    }

    /// Read a file relative to cwd.
    pub async fn read_file(&self, path: &str) -> Result<String, FsError> {
        let resolved = self.fs.resolve_path(&self.interpreter.state.cwd, path);
        self.fs.read_file(&resolved).await
    }

    /// Write a file relative to cwd.
    pub async fn write_file(&self, path: &str, content: &str) -> Result<(), FsError> {
        let resolved = self.fs.resolve_path(&self.interpreter.state.cwd, path);
        self.fs.write_file(&resolved, content.as_bytes()).await
    }

    /// Get current working directory.
    pub fn get_cwd(&self) -> &str {
        &self.interpreter.state.cwd
    }

    /// Scalar value of a shell variable.
    pub fn get_var(&self, name: &str) -> Option<String> {
        self.interpreter.state.vars.get_scalar(name)
    }

    /// Exported variables, as external commands see them.
    pub fn get_env(&self) -> HashMap<String, String> {
        self.interpreter.state.vars.exported_env()
    }
}

/// Parses and runs one script in `interpreter`, then fires its EXIT
/// trap. A syntax error runs nothing and gives status 2.
async fn run_script(interpreter: &mut Interpreter, script: &str) -> BashExecResult {
    if script.trim().is_empty() {
        return BashExecResult::default();
    }
    let ast = match parse(script) {
        Ok(ast) => ast,
        Err(e) => {
            tracing::debug!(error = %e, "parse failed");
            return BashExecResult { stdout: String::new(), stderr: format!("bash: {}\n", e), exit_code: 2 };
        }
    };
    tracing::debug!(statements = ast.statements.len(), "parsed script");

    let result = interpreter.execute_script(&ast).await;
    let mut exit_code = match result.signal {
        ControlSignal::Exit(code) | ControlSignal::Return(code) => code,
        _ => result.exit_code,
    };
    let mut stdout = result.stdout;
    let mut stderr = result.stderr;
    stderr.push_str(&std::mem::take(&mut interpreter.state.pending_stderr));

    interpreter.state.last_exit_code = exit_code;
    let trap = interpreter.run_trap("EXIT").await;
    interpreter.state.traps.remove("EXIT");
    stdout.push_str(&trap.stdout);
    stderr.push_str(&trap.stderr);
    if let ControlSignal::Exit(code) = trap.signal {
        exit_code = code;
    }
    interpreter.state.last_exit_code = exit_code;

    BashExecResult { stdout, stderr, exit_code }
}

/// Callback handed to commands such as `bash -c`: every request runs in
/// a fresh interpreter over the same filesystem and registry.
pub fn make_exec_fn(fs: Arc<dyn FileSystem>, commands: Arc<CommandRegistry>, limits: ExecutionLimits) -> ExecFn {
    Arc::new(move |request: ExecRequest| {
        let fs = Arc::clone(&fs);
        let commands = Arc::clone(&commands);
        let limits = limits.clone();
        Box::pin(async move { run_nested(fs, commands, limits, request).await })
    })
}

async fn run_nested(
    fs: Arc<dyn FileSystem>,
    commands: Arc<CommandRegistry>,
    limits: ExecutionLimits,
    request: ExecRequest,
) -> CommandResult {
    let level = request.env.get("SHLVL").and_then(|v| v.trim().parse::<usize>().ok()).unwrap_or(0) + 1;
    if level > limits.max_call_depth as usize {
        tracing::warn!(level, "nested shell limit reached");
        return CommandResult::with_exit_code(
            String::new(),
            format!("bash: maximum shell nesting level ({}) exceeded\n", limits.max_call_depth),
            126,
        );
    }

    let mut interpreter = Interpreter::new(Arc::clone(&fs), Arc::clone(&commands), limits.clone());
    interpreter.set_exec_fn(make_exec_fn(fs, commands, limits));
    let state = &mut interpreter.state;
    state.cwd = request.cwd;
    state.positional = request.args;
    state.script_name = request.script_name.unwrap_or_else(|| "bash".to_string());
    state.stdin = Some(request.stdin);
    let mut env: Vec<_> = request.env.into_iter().collect();
    env.push(("SHLVL".to_string(), level.to_string()));
    for (name, value) in env {
        if state.vars.set_scalar(&name, value).is_ok() {
            state.vars.declare_global(&name).attrs.exported = true;
        }
    }
    if state.vars.get("IFS").is_none() {
        let _ = state.vars.set_scalar("IFS", DEFAULT_IFS);
    }

    run_script(&mut interpreter, &request.script).await.into()
}

/// Standard directories and device files.
async fn init_filesystem(fs: &dyn FileSystem, cwd: &str) {
    for dir in ["/bin", "/usr/bin", "/tmp", "/dev", DEFAULT_HOME, cwd] {
        if let Err(e) = fs.mkdir(dir, true).await {
            tracing::debug!(dir, error = %e, "mkdir during setup failed");
        }
    }
    if !fs.exists("/dev/null").await {
        let _ = fs.write_file("/dev/null", b"").await;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{Command, CommandContext};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    async fn bash() -> Bash {
        Bash::new(BashOptions::default()).await
    }

    async fn run(script: &str) -> BashExecResult {
        bash().await.exec(script, None).await
    }

    /// Echoes its stdin upper-cased, plus its args and one env var.
    struct Shout;

    #[async_trait]
    impl Command for Shout {
        fn name(&self) -> &'static str {
            "shout"
        }

        async fn execute(&self, ctx: CommandContext) -> CommandResult {
            let greeting = ctx.env.get("GREETING").cloned().unwrap_or_default();
            CommandResult::success(format!("{}{}{}\n", ctx.stdin.to_uppercase(), greeting, ctx.args.join(",")))
        }
    }

    /// Runs its first argument as a nested script through `exec_fn`.
    struct Nest;

    #[async_trait]
    impl Command for Nest {
        fn name(&self) -> &'static str {
            "nest"
        }

        async fn execute(&self, ctx: CommandContext) -> CommandResult {
            let Some(exec_fn) = ctx.exec_fn.clone() else {
                return CommandResult::error("no exec_fn\n".to_string());
            };
            exec_fn(ExecRequest {
                script: ctx.args.first().cloned().unwrap_or_default(),
                script_name: Some("nest".to_string()),
                args: ctx.args.iter().skip(1).cloned().collect(),
                stdin: ctx.stdin,
                cwd: ctx.cwd,
                env: ctx.env,
            })
            .await
        }
    }

    async fn bash_with_commands() -> Bash {
        let mut registry = CommandRegistry::with_defaults();
        registry.register(Box::new(Shout));
        registry.register(Box::new(Nest));
        Bash::new(BashOptions { commands: Some(Arc::new(registry)), ..Default::default() }).await
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_defaults() {
        let bash = bash().await;
        assert_eq!(bash.get_cwd(), "/home/user");
        assert_eq!(bash.get_var("HOME").as_deref(), Some("/home/user"));
        assert_eq!(bash.get_env().get("PATH").map(String::as_str), Some("/usr/bin:/bin"));
        assert!(!bash.get_env().contains_key("IFS"));
        assert!(bash.fs.exists("/tmp").await);
        assert!(bash.fs.exists("/dev/null").await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_state_persists_across_exec() {
        let mut bash = bash().await;
        bash.exec("x=1; f() { echo f$x; }; cd /tmp", None).await;
        let r = bash.exec("f; pwd", None).await;
        assert_eq!(r.stdout, "f1\n/tmp\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_exec_options_are_temporary() {
        let mut bash = bash_with_commands().await;
        let opts = ExecOptions {
            env: Some(HashMap::from([("GREETING".to_string(), "hey ".to_string())])),
            cwd: Some("/tmp".to_string()),
            stdin: Some("in\n".to_string()),
        };
        let r = bash.exec("shout a; pwd", Some(opts)).await;
        assert_eq!(r.stdout, "IN\nhey a\n/tmp\n");
        let r = bash.exec("echo \"[$GREETING]\"; pwd", None).await;
        assert_eq!(r.stdout, "[]\n/home/user\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_syntax_error_runs_nothing() {
        let r = run("echo before; if then").await;
        assert_eq!(r.exit_code, 2);
        assert_eq!(r.stdout, "");
        assert!(r.stderr.starts_with("bash: "));
        assert!(r.stderr.contains("syntax error"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_exit_and_exit_trap() {
        let r = run("trap 'echo bye $?' EXIT; echo hi; exit 3; echo never").await;
        assert_eq!(r.stdout, "hi\nbye 3\n");
        assert_eq!(r.exit_code, 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_registry_pipes_and_exports() {
        let mut bash = bash_with_commands().await;
        let r = bash.exec("GREETING='yo ' shout x <<< abc; echo abc | shout; shout", None).await;
        assert_eq!(r.stdout, "ABC\nyo x\nABC\n\n\n");
        let r = bash.exec("export GREETING=hi; echo q | shout 1 2", None).await;
        assert_eq!(r.stdout, "Q\nhi1,2\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_nested_shells() {
        let mut bash = bash_with_commands().await;
        let r = bash.exec("export V=outer; nest 'echo $0 $1 $V $SHLVL; x=inner' arg; echo \"${x-unset}\"", None).await;
        assert_eq!(r.stdout, "nest arg outer 2\nunset\n");
        let r = bash.exec("bash -c 'echo $1; exit 4' name one; echo $?", None).await;
        assert_eq!(r.stdout, "one\n4\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_script_files_in_filesystem() {
        let mut bash = bash().await;
        bash.write_file("/tmp/s.sh", "#!/bin/bash\necho \"script $1\"\n").await.unwrap();
        let r = bash.exec("/tmp/s.sh a; echo $?; /tmp; echo $?; /nope; echo $?", None).await;
        assert_eq!(r.stdout, "126\n126\n127\n");
        bash.fs.chmod("/tmp/s.sh", 0o755).await.unwrap();
        let r = bash.exec("/tmp/s.sh a", None).await;
        assert_eq!(r.stdout, "script a\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_scenarios() {
        let cases: &[(&str, &str, i32)] = &[
            ("x=5; echo $((x * 2 + 1))", "11\n", 0),
            ("a=(one two three); echo ${#a[@]} ${a[1]}", "3 two\n", 0),
            ("s=hello.tar.gz; echo ${s%%.*} ${s#*.} ${s/l/L}", "hello tar.gz heLlo.tar.gz\n", 0),
            ("for i in 1 2 3; do [[ $i == 2 ]] && continue; echo $i; done", "1\n3\n", 0),
            ("f() { local v=in; echo $v; return 7; }; v=out; f; echo $? $v", "in\n7 out\n", 0),
            ("case abc in a*) echo A;; *) echo B;; esac", "A\n", 0),
            ("false | true; echo ${PIPESTATUS[@]}", "1 0\n", 0),
            ("set -o pipefail; false | true; echo $?", "1\n", 0),
            ("set -e; false; echo never", "", 1),
            ("echo $(( 7 / 0 )); echo after", "after\n", 0),
            ("read v <<EOF\nv=$((1+1))\nEOF\necho \"$v\"", "v=2\n", 0),
            ("read a b <<< 'x y z'; echo \"$b\"", "y z\n", 0),
            ("i=0; while (( i < 3 )); do i=$((i+1)); done; echo $i", "3\n", 0),
            ("echo {a,b}{1,2}", "a1 a2 b1 b2\n", 0),
            ("[[ foo123 =~ ^([a-z]+)([0-9]+)$ ]] && echo ${BASH_REMATCH[2]}", "123\n", 0),
            ("printf '%-3s|%03d\\n' ab 7", "ab |007\n", 0),
            ("x=$(echo out; exit 3); echo $? $x", "3 out\n", 0),
            ("(exit 9); echo $?", "9\n", 0),
            ("echo $((-5 % 3)) $((-7 / 2))", "-2 -3\n", 0),
            ("x=5; echo $((x++)); echo $x", "5\n6\n", 0),
            ("a[5]=x; a[10]=y; echo \"${#a[@]}\"", "2\n", 0),
            ("v=\"it's \\$x\"; eval \"w=${v@Q}\"; [[ $w == \"$v\" ]] && echo same", "same\n", 0),
            ("true | false | true; echo ${#PIPESTATUS[@]}", "3\n", 0),
            ("IFS=:; v=a::b; set -- $v; echo $#", "3\n", 0),
            ("a=(a b c); echo \"${a[-1]}\" \"${a[@]}\"", "c a b c\n", 0),
            ("declare -A m; m[k]=v; echo ${m[k]} ${!m[@]}", "v k\n", 0),
            ("printf '%q\\n' \"a b\"", "a\\ b\n", 0),
            ("[[ ab =~ (a)(b) ]] && echo ${BASH_REMATCH[2]}", "b\n", 0),
            ("echo $(false); echo $?", "\n0\n", 0),
        ];
        for (script, stdout, code) in cases {
            let r = run(script).await;
            assert_eq!((r.stdout.as_str(), r.exit_code), (*stdout, *code), "script: {}", script);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_nounset_and_limits() {
        let r = run("set -u; echo $missing; echo never").await;
        assert_eq!(r.exit_code, 1);
        assert_eq!(r.stdout, "");
        assert!(r.stderr.contains("missing: unbound variable"));

        let mut bash = Bash::new(BashOptions {
            limits: Some(ExecutionLimits { max_call_depth: 20, ..Default::default() }),
            ..Default::default()
        })
        .await;
        let r = bash.exec("f() { f; }; f; echo never", None).await;
        assert_eq!(r.exit_code, 126);
        assert!(r.stderr.contains("maximum recursion depth"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_self_referencing_arithmetic_recovers() {
        let r = run("x=\"x+1\"; echo $((x)); echo after").await;
        assert!(r.stderr.contains("expression recursion level exceeded"), "stderr: {}", r.stderr);
        assert_eq!(r.stdout, "after\n");
        assert_eq!(r.exit_code, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_args_and_script_name() {
        let mut bash = Bash::new(BashOptions {
            args: vec!["a b".to_string(), "c".to_string()],
            script_name: Some("prog".to_string()),
            ..Default::default()
        })
        .await;
        let r = bash.exec("echo $0 $#; for x in \"$@\"; do echo \"<$x>\"; done", None).await;
        assert_eq!(r.stdout, "prog 2\n<a b>\n<c>\n");
    }
}

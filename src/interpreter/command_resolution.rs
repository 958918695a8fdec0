//! Command Resolution
//!
//! Maps a command name to what runs it: a shell function, a builtin, a
//! registered external command or a script file (names containing `/`).
//! Lookup order is function, builtin, registry.
//!
//! Also home to the builtins that inspect this lookup: `type`, `command`
//! and `builtin`.

use std::sync::Arc;

use crate::ast::types::FunctionDefNode;
use crate::commands::{CommandContext, ExecRequest};
use crate::interpreter::builtins::BUILTIN_NAMES;
use crate::interpreter::errors::InterpreterResult;
use crate::interpreter::execution_engine::Interpreter;
use crate::interpreter::types::{ControlSignal, ExecResult};
use crate::interpreter::variables::VariableStore;
use crate::parser::parse;
use crate::parser::types::RESERVED_WORDS;

/// Default PATH value when not set in environment
pub const DEFAULT_PATH: &str = "/usr/bin:/bin";

/// Something a simple command can run.
#[derive(Debug, Clone)]
pub(crate) enum Invokable {
    Function(Arc<FunctionDefNode>),
    Builtin(&'static str),
    External(String),
    Script(String),
    NotFound(String),
}

impl Invokable {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Invokable::Function(_) => "function",
            Invokable::Builtin(_) => "builtin",
            Invokable::External(_) => "external",
            Invokable::Script(_) => "script",
            Invokable::NotFound(_) => "not-found",
        }
    }
}

fn builtin_name(name: &str) -> Option<&'static str> {
    BUILTIN_NAMES.iter().copied().find(|b| *b == name)
}

fn strip_shebang(script: &str) -> &str {
    if script.starts_with("#!") {
        return script.find('\n').map_or("", |idx| &script[idx + 1..]);
    }
    script
}

impl Interpreter {
    pub(crate) fn resolve_command(&self, name: &str) -> Invokable {
        if name.contains('/') {
            return Invokable::Script(name.to_string());
        }
        if let Some(func) = self.state.functions.get(name) {
            return Invokable::Function(Arc::clone(func));
        }
        if let Some(builtin) = builtin_name(name) {
            return Invokable::Builtin(builtin);
        }
        if self.commands.contains(name) {
            return Invokable::External(name.to_string());
        }
        Invokable::NotFound(name.to_string())
    }

    /// Runs a resolved command. `args[0]` is the command name.
    pub(crate) async fn invoke(&mut self, invokable: Invokable, args: Vec<String>) -> InterpreterResult<ExecResult> {
        match invokable {
            Invokable::Function(func) => self.call_function(func, args).await,
            Invokable::Builtin(name) => self.run_builtin(name, &args[1..]).await,
            Invokable::External(name) => Ok(self.run_external(&name, args).await),
            Invokable::Script(path) => self.run_script_file(&path, args).await,
            Invokable::NotFound(name) => {
                Ok(ExecResult::failure_with_code(format!("bash: {}: command not found\n", name), 127))
            }
        }
    }

    /// Where `type` and `command -v` claim a registry command lives.
    fn command_path(&mut self, name: &str) -> String {
        let path = self.state.vars.get_scalar("PATH").unwrap_or_else(|| DEFAULT_PATH.to_string());
        let dir = path.split(':').find(|d| !d.is_empty()).unwrap_or("/usr/bin").trim_end_matches('/').to_string();
        format!("{}/{}", dir, name)
    }

    async fn run_external(&mut self, name: &str, args: Vec<String>) -> ExecResult {
        let commands = Arc::clone(&self.commands);
        let Some(command) = commands.get(name) else {
            return ExecResult::failure_with_code(format!("bash: {}: command not found\n", name), 127);
        };
        let ctx = CommandContext {
            args: args.into_iter().skip(1).collect(),
            stdin: self.state.stdin.take().unwrap_or_default(),
            cwd: self.state.cwd.clone(),
            env: self.state.vars.exported_env(),
            fs: Arc::clone(&self.fs),
            exec_fn: self.exec_fn.clone(),
        };
        tracing::debug!(command = name, args = ctx.args.len(), "running external command");
        let result = command.execute(ctx).await;
        ExecResult::new(result.stdout, result.stderr, result.exit_code)
    }

    /// `./script.sh args`: a missing file is 127, a directory or a file
    /// without an execute bit is 126. The script runs as a new shell that
    /// only sees exported variables.
    async fn run_script_file(&mut self, path: &str, args: Vec<String>) -> InterpreterResult<ExecResult> {
        let resolved = self.fs.resolve_path(&self.state.cwd, path);
        let stat = match self.fs.stat(&resolved).await {
            Ok(stat) => stat,
            Err(_) => {
                return Ok(ExecResult::failure_with_code(format!("bash: {}: No such file or directory\n", path), 127));
            }
        };
        if stat.is_directory {
            return Ok(ExecResult::failure_with_code(format!("bash: {}: Is a directory\n", path), 126));
        }
        if !stat.is_executable() {
            return Ok(ExecResult::failure_with_code(format!("bash: {}: Permission denied\n", path), 126));
        }
        let content = match self.fs.read_file(&resolved).await {
            Ok(content) => content,
            Err(e) => return Ok(ExecResult::failure_with_code(format!("bash: {}: {}\n", path, e.shell_message()), 126)),
        };
        let script = strip_shebang(&content);
        let script_args: Vec<String> = args.into_iter().skip(1).collect();

        if let Some(exec_fn) = self.exec_fn.clone() {
            let result = exec_fn(ExecRequest {
                script: script.to_string(),
                script_name: Some(path.to_string()),
                args: script_args,
                stdin: self.state.stdin.take().unwrap_or_default(),
                cwd: self.state.cwd.clone(),
                env: self.state.vars.exported_env(),
            })
            .await;
            return Ok(ExecResult::new(result.stdout, result.stderr, result.exit_code));
        }

        let ast = match parse(script) {
            Ok(ast) => ast,
            Err(e) => return Ok(ExecResult::failure_with_code(format!("bash: {}: {}\n", path, e), 2)),
        };
        let env = self.state.vars.exported_env();
        let mut sub = self.subshell();
        sub.state.functions.clear();
        sub.state.vars = VariableStore::new();
        for (name, value) in env {
            sub.state.vars.set_scalar(&name, value)?;
            sub.state.vars.declare_global(&name).attrs.exported = true;
        }
        sub.state.positional = script_args;
        sub.state.script_name = path.to_string();
        let mut result = sub.execute_script(&ast).await;
        if let ControlSignal::Exit(code) | ControlSignal::Return(code) = result.signal {
            result.exit_code = code;
        }
        result.signal = ControlSignal::Normal;
        self.state.command_count = sub.state.command_count;
        Ok(result)
    }

    /// `type [-a] [-t] [-p] name...`
    pub(crate) fn builtin_type(&mut self, args: &[String]) -> ExecResult {
        let mut all = false;
        let mut terse = false;
        let mut path_only = false;
        let mut names = Vec::new();
        for arg in args {
            match arg.as_str() {
                a if a.starts_with('-') && a.len() > 1 && names.is_empty() => {
                    for c in a[1..].chars() {
                        match c {
                            'a' => all = true,
                            't' => terse = true,
                            'p' | 'P' => path_only = true,
                            _ => {
                                return ExecResult::failure_with_code(
                                    format!("bash: type: -{}: invalid option\n", c),
                                    2,
                                )
                            }
                        }
                    }
                }
                name => names.push(name.to_string()),
            }
        }

        let mut out = ExecResult::ok();
        for name in &names {
            let mut found = Vec::new();
            if RESERVED_WORDS.contains(&name.as_str()) {
                found.push(("keyword", format!("{} is a shell keyword", name)));
            }
            if self.state.functions.contains_key(name) {
                found.push(("function", format!("{} is a function", name)));
            }
            if builtin_name(name).is_some() {
                found.push(("builtin", format!("{} is a shell builtin", name)));
            }
            if self.commands.contains(name) {
                let path = self.command_path(name);
                found.push(("file", format!("{} is {}", name, path)));
            }
            if found.is_empty() {
                out.exit_code = 1;
                if !terse && !path_only {
                    out.stderr.push_str(&format!("bash: type: {}: not found\n", name));
                }
                continue;
            }
            if !all {
                found.truncate(1);
            }
            for (kind, line) in found {
                if path_only {
                    if kind == "file" {
                        out.stdout.push_str(&format!("{}\n", self.command_path(name)));
                    }
                } else if terse {
                    out.stdout.push_str(&format!("{}\n", kind));
                } else {
                    out.stdout.push_str(&format!("{}\n", line));
                }
            }
        }
        out
    }

    /// `command [-pVv] name [args...]`: runs a builtin or external
    /// command, bypassing functions.
    pub(crate) async fn builtin_command(&mut self, args: &[String]) -> InterpreterResult<ExecResult> {
        let mut describe = None;
        let mut rest = args;
        while let Some(first) = rest.first() {
            match first.as_str() {
                "-v" => describe = Some(false),
                "-V" => describe = Some(true),
                "-p" => {}
                "--" => {
                    rest = &rest[1..];
                    break;
                }
                _ => break,
            }
            rest = &rest[1..];
        }
        let Some(name) = rest.first() else {
            return Ok(ExecResult::ok());
        };

        match describe {
            Some(true) => Ok(self.builtin_type(rest)),
            Some(false) => {
                let mut out = ExecResult::ok();
                for name in rest {
                    let line = if name.contains('/') {
                        let resolved = self.fs.resolve_path(&self.state.cwd, name);
                        if self.fs.exists(&resolved).await {
                            Some(name.clone())
                        } else {
                            None
                        }
                    } else if self.state.functions.contains_key(name)
                        || builtin_name(name).is_some()
                        || RESERVED_WORDS.contains(&name.as_str())
                    {
                        Some(name.clone())
                    } else if self.commands.contains(name) {
                        Some(self.command_path(name))
                    } else {
                        None
                    };
                    match line {
                        Some(line) => out.stdout.push_str(&format!("{}\n", line)),
                        None => out.exit_code = 1,
                    }
                }
                Ok(out)
            }
            None => {
                let invokable = match self.resolve_command(name) {
                    Invokable::Function(_) => match builtin_name(name) {
                        Some(b) => Invokable::Builtin(b),
                        None if self.commands.contains(name) => Invokable::External(name.clone()),
                        None => Invokable::NotFound(name.clone()),
                    },
                    other => other,
                };
                self.invoke(invokable, rest.to_vec()).await
            }
        }
    }

    /// `builtin name [args...]`
    pub(crate) async fn builtin_builtin(&mut self, args: &[String]) -> InterpreterResult<ExecResult> {
        let Some(name) = args.first() else {
            return Ok(ExecResult::ok());
        };
        match builtin_name(name) {
            Some(builtin) => self.run_builtin(builtin, &args[1..]).await,
            None => Ok(ExecResult::failure(format!("bash: builtin: {}: not a shell builtin\n", name))),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::{Command, CommandContext, CommandRegistry, CommandResult};
    use crate::fs::InMemoryFs;
    use crate::interpreter::execution_engine::Interpreter;
    use crate::interpreter::types::{ExecResult, ExecutionLimits};
    use crate::parser::parse;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    struct Upper;

    #[async_trait]
    impl Command for Upper {
        fn name(&self) -> &'static str {
            "upper"
        }

        async fn execute(&self, ctx: CommandContext) -> CommandResult {
            let mut out = ctx.stdin.to_uppercase();
            out.push_str(&ctx.args.join(","));
            if let Some(v) = ctx.env.get("GREETING") {
                out.push_str(v);
            }
            CommandResult::success(out)
        }
    }

    async fn run(script: &str) -> ExecResult {
        let fs = InMemoryFs::with_files([("/tmp/plain.sh", "echo plain")])
            .with_dirs(["/tmp/dir"])
            .with_executable("/tmp/hello.sh", "#!/bin/bash\necho \"hello $1 [$secret] $GREETING\"\nexit 3\n");
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(Upper));
        let mut it = Interpreter::new(Arc::new(fs), Arc::new(registry), ExecutionLimits::default());
        it.state.cwd = "/tmp".to_string();
        let ast = parse(script).unwrap();
        it.execute_script(&ast).await
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_lookup_order_and_not_found() {
        let r = run("echo() { builtin echo fn \"$@\"; }; echo x; command echo y; nosuch; echo $?").await;
        assert_eq!(r.stdout, "fn x\ny\nfn 127\n");
        assert_eq!(r.stderr, "bash: nosuch: command not found\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_external_gets_stdin_args_and_env() {
        let r = run("export GREETING=hi; echo abc | upper 1 2").await;
        assert_eq!(r.stdout, "ABC\n1,2hi");
        let r = run("GREETING=tmp upper; echo \"[$GREETING]\"").await;
        assert_eq!(r.stdout, "tmp[]\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_script_files() {
        let r = run("secret=s; export GREETING=g; ./hello.sh you; echo $?").await;
        assert_eq!(r.stdout, "hello you [] g\n3\n");
        let r = run("./plain.sh; echo $?; ./dir; echo $?; ./missing.sh; echo $?").await;
        assert_eq!(r.stdout, "126\n126\n127\n");
        assert_eq!(
            r.stderr,
            "bash: ./plain.sh: Permission denied\nbash: ./dir: Is a directory\nbash: ./missing.sh: No such file or directory\n"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_type_and_command_v() {
        let r = run("f() { :; }; type f echo if upper; type -t f echo upper; type nope; echo $?").await;
        assert_eq!(
            r.stdout,
            "f is a function\necho is a shell builtin\nif is a shell keyword\nupper is /usr/bin/upper\nfunction\nbuiltin\nfile\n1\n"
        );
        assert_eq!(r.stderr, "bash: type: nope: not found\n");
        let r = run("command -v echo upper nope; echo $?").await;
        assert_eq!(r.stdout, "echo\n/usr/bin/upper\n1\n");
    }
}

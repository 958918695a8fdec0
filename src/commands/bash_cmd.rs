use async_trait::async_trait;
use crate::commands::types::{ExecFn, ExecRequest};
use crate::commands::{Command, CommandContext, CommandResult};

/// `bash` and `sh` share everything but their name.
async fn run_shell(shell: &str, ctx: CommandContext) -> CommandResult {
    if ctx.args.iter().any(|a| a == "--help") {
        return CommandResult::success(format!(
            "{shell} - execute shell commands or scripts\n\nUsage: {shell} [OPTIONS] [SCRIPT_FILE] [ARGUMENTS...]\n\nOptions:\n  -c COMMAND  execute COMMAND string\n"
        ));
    }

    let exec_fn = match &ctx.exec_fn {
        Some(f) => f.clone(),
        None => return CommandResult::error(format!("{}: internal error: exec function not available\n", shell)),
    };

    if ctx.args.first().map(String::as_str) == Some("-c") {
        let Some(command) = ctx.args.get(1) else {
            return CommandResult::with_exit_code(String::new(), format!("{}: -c: option requires an argument\n", shell), 2);
        };
        let script_name = ctx.args.get(2).cloned().unwrap_or_else(|| shell.to_string());
        let script_args: Vec<_> = ctx.args.iter().skip(3).cloned().collect();
        return execute_script(command, &script_name, &script_args, &ctx, exec_fn).await;
    }

    if ctx.args.is_empty() {
        if !ctx.stdin.trim().is_empty() {
            let script = strip_shebang(&ctx.stdin).to_string();
            let ctx = CommandContext { stdin: String::new(), ..ctx };
            return execute_script(&script, shell, &[], &ctx, exec_fn).await;
        }
        return CommandResult::success(String::new());
    }

    let script_path = &ctx.args[0];
    let script_args: Vec<_> = ctx.args.iter().skip(1).cloned().collect();
    let full_path = ctx.fs.resolve_path(&ctx.cwd, script_path);

    match ctx.fs.read_file(&full_path).await {
        Ok(content) => execute_script(strip_shebang(&content), script_path, &script_args, &ctx, exec_fn).await,
        Err(_) => CommandResult::with_exit_code(
            String::new(),
            format!("{}: {}: No such file or directory\n", shell, script_path),
            127,
        ),
    }
}

fn strip_shebang(script: &str) -> &str {
    if script.starts_with("#!") {
        return script.find('\n').map_or("", |idx| &script[idx + 1..]);
    }
    script
}

async fn execute_script(
    script: &str,
    script_name: &str,
    script_args: &[String],
    ctx: &CommandContext,
    exec_fn: ExecFn,
) -> CommandResult {
    exec_fn(ExecRequest {
        script: script.to_string(),
        script_name: Some(script_name.to_string()),
        args: script_args.to_vec(),
        stdin: ctx.stdin.clone(),
        cwd: ctx.cwd.clone(),
        env: ctx.env.clone(),
    })
    .await
}

pub struct BashCommand;

#[async_trait]
impl Command for BashCommand {
    fn name(&self) -> &'static str { "bash" }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        run_shell("bash", ctx).await
    }
}

pub struct ShCommand;

#[async_trait]
impl Command for ShCommand {
    fn name(&self) -> &'static str { "sh" }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        run_shell("sh", ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    fn recording_exec(seen: Arc<Mutex<Vec<ExecRequest>>>) -> ExecFn {
        Arc::new(move |req: ExecRequest| {
            let seen = seen.clone();
            Box::pin(async move {
                let out = format!("{}|{}|{}\n", req.script_name.clone().unwrap_or_default(), req.args.join(","), req.script);
                seen.lock().unwrap().push(req);
                CommandResult::success(out)
            })
        })
    }

    fn ctx(args: &[&str], fs: Arc<InMemoryFs>, exec_fn: Option<ExecFn>) -> CommandContext {
        CommandContext {
            args: args.iter().map(|s| s.to_string()).collect(),
            stdin: String::new(),
            cwd: "/".to_string(),
            env: HashMap::new(),
            fs,
            exec_fn,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dash_c_passes_name_and_args() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let fs = Arc::new(InMemoryFs::new());
        let result = BashCommand
            .execute(ctx(&["-c", "echo $1", "prog", "a", "b"], fs, Some(recording_exec(seen.clone()))))
            .await;
        assert_eq!(result.stdout, "prog|a,b|echo $1\n");
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_script_file_and_missing_file() {
        let fs = Arc::new(InMemoryFs::with_files([("/s.sh", "#!/bin/bash\necho hi\n")]));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let result = ShCommand.execute(ctx(&["/s.sh", "x"], fs.clone(), Some(recording_exec(seen)))).await;
        assert_eq!(result.stdout, "/s.sh|x|echo hi\n\n");

        let missing = ShCommand.execute(ctx(&["/nope.sh"], fs, Some(recording_exec(Arc::new(Mutex::new(Vec::new())))))).await;
        assert_eq!(missing.exit_code, 127);
        assert_eq!(missing.stderr, "sh: /nope.sh: No such file or directory\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_without_exec_fn_fails() {
        let result = BashCommand.execute(ctx(&["-c", "true"], Arc::new(InMemoryFs::new()), None)).await;
        assert_eq!(result.exit_code, 1);
    }
}

//! cd and pwd
//!
//! cd [-L|-P] [dir]
//!
//! Paths are resolved logically (`..` removes the previous component)
//! unless `-P` asks for the physical path through `realpath`. `cd -`
//! returns to `$OLDPWD` and prints it.

use crate::interpreter::errors::InterpreterResult;
use crate::interpreter::execution_engine::Interpreter;
use crate::interpreter::types::ExecResult;

impl Interpreter {
    pub(crate) async fn builtin_cd(&mut self, args: &[String]) -> InterpreterResult<ExecResult> {
        let mut physical = false;
        let mut operands = Vec::new();
        let mut options_done = false;
        for arg in args {
            if !options_done && arg.len() > 1 && arg.starts_with('-') {
                match arg.as_str() {
                    "--" => options_done = true,
                    "-P" => physical = true,
                    "-L" => physical = false,
                    _ => {
                        return Ok(ExecResult::failure_with_code(format!("bash: cd: {}: invalid option\n", arg), 2));
                    }
                }
                continue;
            }
            options_done = true;
            operands.push(arg.as_str());
        }
        if operands.len() > 1 {
            return Ok(ExecResult::failure("bash: cd: too many arguments\n"));
        }

        let mut print_dir = false;
        let target = match operands.first() {
            None | Some(&"~") => match self.state.vars.get_scalar("HOME") {
                Some(home) if !home.is_empty() => home,
                _ => return Ok(ExecResult::failure("bash: cd: HOME not set\n")),
            },
            Some(&"-") => match self.state.vars.get_scalar("OLDPWD") {
                Some(old) if !old.is_empty() => {
                    print_dir = true;
                    old
                }
                _ => return Ok(ExecResult::failure("bash: cd: OLDPWD not set\n")),
            },
            Some(dir) => dir.to_string(),
        };

        let mut resolved = self.fs.resolve_path(&self.state.cwd, &target);
        match self.fs.stat(&resolved).await {
            Ok(stat) if stat.is_directory => {}
            Ok(_) => return Ok(ExecResult::failure(format!("bash: cd: {}: Not a directory\n", target))),
            Err(e) => return Ok(ExecResult::failure(format!("bash: cd: {}: {}\n", target, e.shell_message()))),
        }
        if physical {
            if let Ok(real) = self.fs.realpath(&resolved).await {
                resolved = real;
            }
        }

        let old = std::mem::replace(&mut self.state.cwd, resolved.clone());
        tracing::debug!(from = %old, to = %resolved, "cd");
        self.state.vars.set_scalar("OLDPWD", old)?;
        self.state.vars.set_scalar("PWD", resolved.clone())?;
        if print_dir {
            return Ok(ExecResult::success(format!("{}\n", resolved)));
        }
        Ok(ExecResult::ok())
    }

    pub(crate) async fn builtin_pwd(&mut self, args: &[String]) -> ExecResult {
        let mut physical = false;
        for arg in args {
            match arg.as_str() {
                "-P" => physical = true,
                "-L" => physical = false,
                other if other.starts_with('-') => {
                    return ExecResult::failure_with_code(format!("bash: pwd: {}: invalid option\n", other), 2);
                }
                _ => {}
            }
        }
        let mut dir = self.state.cwd.clone();
        if physical {
            if let Ok(real) = self.fs.realpath(&dir).await {
                dir = real;
            }
        }
        ExecResult::success(format!("{}\n", dir))
    }
}

#[cfg(test)]
mod tests {
    use crate::fs::{FileSystem, InMemoryFs};
    use crate::interpreter::execution_engine::Interpreter;
    use crate::interpreter::types::ExecResult;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    async fn run(script: &str) -> ExecResult {
        let fs = InMemoryFs::with_files([("/home/user/file.txt", "x")]).with_dirs(["/home/user/src/lib", "/real"]);
        fs.symlink("/real", "/link").await.unwrap();
        let mut it = Interpreter::with_fs(Arc::new(fs));
        it.state.cwd = "/home/user".to_string();
        it.state.vars.set_scalar("HOME", "/home/user").unwrap();
        it.execute_script(&parse(script).unwrap()).await
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cd_updates_pwd_and_oldpwd() {
        let r = run("cd src/lib; pwd; echo $PWD $OLDPWD; cd ..; pwd; cd; pwd").await;
        assert_eq!(r.stdout, "/home/user/src/lib\n/home/user/src/lib /home/user\n/home/user/src\n/home/user\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cd_dash() {
        let r = run("cd /tmp 2>/dev/null; cd src; cd -; pwd").await;
        assert_eq!(r.stdout, "/home/user\n/home/user\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cd_errors() {
        let r = run("cd nowhere; echo $?; cd file.txt; echo $?").await;
        assert_eq!(r.stdout, "1\n1\n");
        assert_eq!(
            r.stderr,
            "bash: cd: nowhere: No such file or directory\nbash: cd: file.txt: Not a directory\n"
        );
        let r = run("unset HOME; cd").await;
        assert_eq!(r.stderr, "bash: cd: HOME not set\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_physical_paths() {
        let r = run("cd /link; pwd; pwd -P; cd -P /link; pwd").await;
        assert_eq!(r.stdout, "/link\n/real\n/real\n");
    }
}

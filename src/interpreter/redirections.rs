//! Redirections
//!
//! Redirections are resolved before the command runs into a plan: an
//! optional new stdin (file, heredoc or here-string) and a table telling
//! where each output descriptor points. Output files are created or
//! truncated at that point. Once the command finishes, its captured
//! stdout and stderr are routed through the table.
//!
//! Descriptors made permanent with `exec` seed every table.

use std::collections::BTreeMap;

use crate::ast::types::{RedirectionNode, RedirectionOperator, RedirectionTarget, WordNode};
use crate::interpreter::errors::{InterpreterError, InterpreterResult};
use crate::interpreter::execution_engine::Interpreter;
use crate::interpreter::types::{ExecResult, OutputTarget};

#[derive(Debug, Clone, Default)]
pub(crate) struct RedirectPlan {
    stdin: Option<String>,
    fds: BTreeMap<i32, OutputTarget>,
    /// Descriptors changed by this plan, for `exec`
    changed: Vec<i32>,
}

impl RedirectPlan {
    fn new(persistent: &std::collections::HashMap<i32, OutputTarget>) -> Self {
        Self { stdin: None, fds: persistent.iter().map(|(k, v)| (*k, v.clone())).collect(), changed: Vec::new() }
    }

    fn target(&self, fd: i32) -> OutputTarget {
        match self.fds.get(&fd) {
            Some(target) => target.clone(),
            None => match fd {
                1 => OutputTarget::Stdout,
                2 => OutputTarget::Stderr,
                _ => OutputTarget::Discard,
            },
        }
    }

    fn set(&mut self, fd: i32, target: OutputTarget) {
        self.fds.insert(fd, target);
        self.changed.push(fd);
    }

    fn is_identity(&self) -> bool {
        self.target(1) == OutputTarget::Stdout && self.target(2) == OutputTarget::Stderr
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenMode {
    Truncate,
    Clobber,
    Append,
}

impl Interpreter {
    /// Target of a redirection: one word after expansion.
    async fn redirect_path(&mut self, word: &WordNode) -> InterpreterResult<String> {
        let mut fields = self.expand_word_fields(word).await?;
        if fields.len() != 1 {
            let text = self.expand_word_string(word).await?;
            return Err(InterpreterError::Runtime(format!("{}: ambiguous redirect", text)));
        }
        Ok(fields.remove(0))
    }

    async fn open_output(&mut self, path: &str, mode: OpenMode) -> InterpreterResult<OutputTarget> {
        match path {
            "/dev/null" => return Ok(OutputTarget::Discard),
            "/dev/stdout" => return Ok(OutputTarget::Stdout),
            "/dev/stderr" => return Ok(OutputTarget::Stderr),
            _ => {}
        }
        let resolved = self.fs.resolve_path(&self.state.cwd, path);
        let existing = self.fs.stat(&resolved).await.ok();
        if existing.as_ref().map_or(false, |s| s.is_directory) {
            return Err(InterpreterError::Runtime(format!("{}: Is a directory", path)));
        }
        if mode == OpenMode::Truncate && self.state.options.noclobber && existing.as_ref().map_or(false, |s| s.is_file) {
            return Err(InterpreterError::Runtime(format!("{}: cannot overwrite existing file", path)));
        }
        let opened = match mode {
            OpenMode::Truncate | OpenMode::Clobber => self.fs.write_file(&resolved, b"").await,
            OpenMode::Append => self.fs.append_file(&resolved, b"").await,
        };
        opened.map_err(|e| InterpreterError::Runtime(format!("{}: {}", path, e.shell_message())))?;
        Ok(OutputTarget::File(resolved))
    }

    async fn read_input(&mut self, path: &str) -> InterpreterResult<Option<String>> {
        match path {
            "/dev/null" => return Ok(Some(String::new())),
            "/dev/stdin" => return Ok(None),
            _ => {}
        }
        let resolved = self.fs.resolve_path(&self.state.cwd, path);
        self.fs
            .read_file(&resolved)
            .await
            .map(Some)
            .map_err(|e| InterpreterError::Runtime(format!("{}: {}", path, e.shell_message())))
    }

    /// Resolves redirections left to right into a plan.
    pub(crate) async fn open_redirections(&mut self, redirections: &[RedirectionNode]) -> InterpreterResult<RedirectPlan> {
        let mut plan = RedirectPlan::new(&self.state.fd_targets);
        for redirection in redirections {
            let fd = redirection.fd.unwrap_or_else(|| redirection.operator.default_fd());
            let word = match &redirection.target {
                RedirectionTarget::HereDoc(doc) => {
                    let body = self.expand_heredoc(&doc.content).await?;
                    if fd == 0 {
                        plan.stdin = Some(body);
                    }
                    continue;
                }
                RedirectionTarget::Word(word) => word,
            };
            match redirection.operator {
                RedirectionOperator::TLess => {
                    let text = self.expand_word_string(word).await?;
                    if fd == 0 {
                        plan.stdin = Some(format!("{}\n", text));
                    }
                }
                RedirectionOperator::Less => {
                    let path = self.redirect_path(word).await?;
                    let content = self.read_input(&path).await?;
                    if fd == 0 {
                        if let Some(content) = content {
                            plan.stdin = Some(content);
                        }
                    }
                }
                RedirectionOperator::LessGreat => {
                    let path = self.redirect_path(word).await?;
                    let target = self.open_output(&path, OpenMode::Append).await?;
                    if fd == 0 {
                        plan.stdin = self.read_input(&path).await?;
                    } else {
                        plan.set(fd, target);
                    }
                }
                RedirectionOperator::Great | RedirectionOperator::Clobber | RedirectionOperator::DGreat => {
                    let path = self.redirect_path(word).await?;
                    let mode = match redirection.operator {
                        RedirectionOperator::DGreat => OpenMode::Append,
                        RedirectionOperator::Clobber => OpenMode::Clobber,
                        _ => OpenMode::Truncate,
                    };
                    let target = self.open_output(&path, mode).await?;
                    plan.set(fd, target);
                }
                RedirectionOperator::AndGreat | RedirectionOperator::AndDGreat => {
                    let path = self.redirect_path(word).await?;
                    let mode =
                        if redirection.operator == RedirectionOperator::AndDGreat { OpenMode::Append } else { OpenMode::Truncate };
                    let target = self.open_output(&path, mode).await?;
                    plan.set(1, target.clone());
                    plan.set(2, target);
                }
                RedirectionOperator::GreatAnd => {
                    let text = self.expand_word_string(word).await?;
                    if text == "-" {
                        plan.set(fd, OutputTarget::Discard);
                    } else if let Ok(source) = text.parse::<i32>() {
                        let target = plan.target(source);
                        plan.set(fd, target);
                    } else if redirection.fd.is_none() {
                        // `>&file` is `&>file`
                        let target = self.open_output(&text, OpenMode::Truncate).await?;
                        plan.set(1, target.clone());
                        plan.set(2, target);
                    } else {
                        return Err(InterpreterError::Runtime(format!("{}: ambiguous redirect", text)));
                    }
                }
                RedirectionOperator::LessAnd => {
                    let text = self.expand_word_string(word).await?;
                    if text == "-" && fd == 0 {
                        plan.stdin = Some(String::new());
                    } else if text != "-" && text.parse::<i32>().is_err() {
                        return Err(InterpreterError::Runtime(format!("{}: ambiguous redirect", text)));
                    }
                }
                RedirectionOperator::DLess | RedirectionOperator::DLessDash => {}
            }
        }
        Ok(plan)
    }

    /// Installs the plan's stdin; returns what to restore afterwards.
    pub(crate) fn enter_redirections(&mut self, plan: &RedirectPlan) -> Option<Option<String>> {
        plan.stdin.clone().map(|stdin| std::mem::replace(&mut self.state.stdin, Some(stdin)))
    }

    pub(crate) fn leave_redirections(&mut self, saved: Option<Option<String>>) {
        if let Some(stdin) = saved {
            self.state.stdin = stdin;
        }
    }

    /// `exec` without a command: the plan outlives the command.
    pub(crate) fn make_redirections_permanent(&mut self, plan: &RedirectPlan) {
        for fd in &plan.changed {
            let target = plan.target(*fd);
            let default = match fd {
                1 => Some(OutputTarget::Stdout),
                2 => Some(OutputTarget::Stderr),
                _ => None,
            };
            if default.as_ref() == Some(&target) {
                self.state.fd_targets.remove(fd);
            } else {
                self.state.fd_targets.insert(*fd, target);
            }
        }
        if let Some(stdin) = &plan.stdin {
            self.state.stdin = Some(stdin.clone());
        }
    }

    /// Sends a finished command's output where the plan says.
    pub(crate) async fn route_output(&mut self, plan: &RedirectPlan, result: ExecResult) -> ExecResult {
        if plan.is_identity() {
            return result;
        }
        let ExecResult { stdout, stderr, exit_code, signal } = result;
        let mut routed = ExecResult { stdout: String::new(), stderr: String::new(), exit_code, signal };
        for (fd, text) in [(1, stdout), (2, stderr)] {
            if text.is_empty() {
                continue;
            }
            match plan.target(fd) {
                OutputTarget::Stdout => routed.stdout.push_str(&text),
                OutputTarget::Stderr => routed.stderr.push_str(&text),
                OutputTarget::Discard => {}
                OutputTarget::File(path) => {
                    if let Err(e) = self.fs.append_file(&path, text.as_bytes()).await {
                        routed.stderr.push_str(&format!("bash: {}: {}\n", path, e.shell_message()));
                    }
                }
            }
        }
        routed
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

    async fn run(fs: Arc<InMemoryFs>, script: &str) -> ExecResult {
        let mut it = Interpreter::with_fs(fs);
        it.state.cwd = "/tmp".to_string();
        let ast = parse(script).unwrap();
        it.execute_script(&ast).await
    }

    fn fs() -> Arc<InMemoryFs> {
        Arc::new(InMemoryFs::with_files([("/tmp/in.txt", "alpha\nbeta\n")]))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_output_files() {
        let fs = fs();
        let r = run(fs.clone(), "echo one > out; echo two >> out; echo three >| other").await;
        assert_eq!(r.stdout, "");
        assert_eq!(fs.read_file("/tmp/out").await.unwrap(), "one\ntwo\n");
        assert_eq!(fs.read_file("/tmp/other").await.unwrap(), "three\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_descriptor_duplication_order() {
        let fs = fs();
        let r = run(fs.clone(), "{ echo out; echo err >&2; } > both 2>&1; { echo err >&2; } 2>&1 >/dev/null").await;
        assert_eq!(fs.read_file("/tmp/both").await.unwrap(), "out\nerr\n");
        assert_eq!(r.stdout, "err\n");
        assert_eq!(r.stderr, "");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_input_sources() {
        let fs = fs();
        let r = run(fs.clone(), "while read l; do echo \"<$l>\"; done < in.txt; read w <<< 'here string'; echo $w").await;
        assert_eq!(r.stdout, "<alpha>\n<beta>\nhere string\n");
        let r = run(fs, "cat_like() { read a; echo $a; }; v=x; cat_like <<EOF\nbody $v\nEOF\n").await;
        assert_eq!(r.stdout, "body x\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_errors() {
        let fs = fs();
        let r = run(fs.clone(), "echo x < missing; echo $?").await;
        assert_eq!(r.stdout, "1\n");
        assert_eq!(r.stderr, "bash: missing: No such file or directory\n");
        fs.mkdir("/tmp/dir", false).await.unwrap();
        let r = run(fs.clone(), "echo x > dir").await;
        assert_eq!(r.stderr, "bash: dir: Is a directory\n");
        let r = run(fs.clone(), "set -C; echo a > in.txt; echo $?; echo b >| in.txt").await;
        assert_eq!(r.stdout, "1\n");
        assert_eq!(fs.read_file("/tmp/in.txt").await.unwrap(), "b\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_exec_redirection_persists() {
        let fs = fs();
        let r = run(fs.clone(), "exec > log; echo a; echo b; exec >/dev/stdout; echo c").await;
        assert_eq!(r.stdout, "c\n");
        assert_eq!(fs.read_file("/tmp/log").await.unwrap(), "a\nb\n");
    }
}

// src/commands/types.rs
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use crate::fs::FileSystem;

/// A nested interpreter run requested by a command (`bash -c`, script files).
#[derive(Debug, Clone, Default)]
pub struct ExecRequest {
    pub script: String,
    /// `$0` for the nested run
    pub script_name: Option<String>,
    /// `$1..$N`
    pub args: Vec<String>,
    pub stdin: String,
    pub cwd: String,
    pub env: HashMap<String, String>,
}

/// Callback that runs a script in a fresh interpreter sharing the
/// filesystem and command registry of the caller.
pub type ExecFn = Arc<dyn Fn(ExecRequest) -> Pin<Box<dyn Future<Output = CommandResult> + Send>> + Send + Sync>;

/// Result of an external command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success(stdout: String) -> Self {
        Self { stdout, stderr: String::new(), exit_code: 0 }
    }

    pub fn error(stderr: String) -> Self {
        Self { stdout: String::new(), stderr, exit_code: 1 }
    }

    pub fn with_exit_code(stdout: String, stderr: String, exit_code: i32) -> Self {
        Self { stdout, stderr, exit_code }
    }
}

/// Everything an external command sees of the shell.
pub struct CommandContext {
    pub args: Vec<String>,
    pub stdin: String,
    pub cwd: String,
    /// Exported variables plus prefix assignments
    pub env: HashMap<String, String>,
    pub fs: Arc<dyn FileSystem>,
    pub exec_fn: Option<ExecFn>,
}

/// An external command plugged into the registry.
#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &'static str;
    async fn execute(&self, ctx: CommandContext) -> CommandResult;
}

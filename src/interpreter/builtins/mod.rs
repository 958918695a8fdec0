//! Builtin Commands
//!
//! Builtins run inside the shell and may change its state. Handlers that
//! only touch `InterpreterState` are plain functions named `handle_*`;
//! the ones that run code or touch the filesystem are `Interpreter`
//! methods.

pub mod cd_cmd;
pub mod declare_cmd;
pub mod echo_cmd;
pub mod eval_cmd;
pub mod flow_cmd;
pub mod getopts_cmd;
pub mod let_cmd;
pub mod printf_cmd;
pub mod read_cmd;
pub mod set_cmd;
pub mod trap_cmd;
pub mod unset_cmd;

use crate::interpreter::errors::InterpreterResult;
use crate::interpreter::execution_engine::Interpreter;
use crate::interpreter::types::{BoxFuture, ExecResult};

pub use echo_cmd::handle_echo;
pub use flow_cmd::{handle_break, handle_continue, handle_exit, handle_return, handle_shift};
pub use getopts_cmd::handle_getopts;
pub use let_cmd::handle_let;
pub use printf_cmd::handle_printf;
pub use read_cmd::{handle_mapfile, handle_read};
pub use set_cmd::{handle_set, handle_shopt};
pub use trap_cmd::handle_trap;
pub use unset_cmd::handle_unset;

pub const BUILTIN_NAMES: &[&str] = &[
    ":", ".", "[", "break", "builtin", "cd", "command", "continue", "declare", "echo", "eval", "exec", "exit",
    "export", "false", "getopts", "let", "local", "mapfile", "printf", "pwd", "read", "readarray", "readonly",
    "return", "set", "shift", "shopt", "source", "test", "trap", "true", "type", "typeset", "unset", "wait",
];

impl Interpreter {
    /// Runs builtin `name` with its arguments (command name excluded).
    pub(crate) fn run_builtin<'a>(
        &'a mut self,
        name: &'static str,
        args: &'a [String],
    ) -> BoxFuture<'a, InterpreterResult<ExecResult>> {
        Box::pin(async move {
            let state = &mut self.state;
            match name {
                ":" | "true" | "wait" => Ok(ExecResult::ok()),
                "false" => Ok(ExecResult::with_code(1)),
                "echo" => Ok(handle_echo(state, args)),
                "printf" => handle_printf(state, args),
                "cd" => self.builtin_cd(args).await,
                "pwd" => Ok(self.builtin_pwd(args).await),
                "declare" | "typeset" | "local" | "export" | "readonly" => self.builtin_declare(name, args).await,
                "unset" => handle_unset(state, args),
                "set" => Ok(handle_set(state, args)),
                "shopt" => Ok(handle_shopt(state, args)),
                "shift" => Ok(handle_shift(state, args)),
                "exit" => Ok(handle_exit(state, args)),
                "return" => Ok(handle_return(state, args)),
                "break" => Ok(handle_break(state, args)),
                "continue" => Ok(handle_continue(state, args)),
                "trap" => Ok(handle_trap(state, args)),
                "let" => handle_let(state, args),
                "read" => handle_read(state, args),
                "mapfile" | "readarray" => handle_mapfile(state, args),
                "getopts" => Ok(handle_getopts(state, args)),
                "eval" => Ok(self.builtin_eval(args).await),
                "source" | "." => self.builtin_source(name, args).await,
                "exec" => self.builtin_exec(args).await,
                "test" | "[" => Ok(self.run_test_command(name, args).await),
                "type" => Ok(self.builtin_type(args)),
                "command" => self.builtin_command(args).await,
                "builtin" => self.builtin_builtin(args).await,
                _ => Ok(ExecResult::failure_with_code(format!("bash: {}: command not found\n", name), 127)),
            }
        })
    }
}

//! bashlet - an embeddable bash interpreter
//!
//! Parses bash scripts into an AST and runs them in-process against a
//! virtual filesystem and a registry of pluggable commands. Nothing is
//! forked; builtins and shell state live inside the interpreter.
//!
//! ```no_run
//! # async fn demo() {
//! use bashlet::{Bash, BashOptions};
//!
//! let mut bash = Bash::new(BashOptions::default()).await;
//! let result = bash.exec("echo $((6 * 7))", None).await;
//! assert_eq!(result.stdout, "42\n");
//! # }
//! ```

pub mod ast;
pub mod bash;
pub mod commands;
pub mod fs;
pub mod interpreter;
pub mod parser;

pub use ast::types::*;
pub use bash::{Bash, BashExecResult, BashOptions, ExecOptions};
pub use commands::{Command, CommandContext, CommandRegistry, CommandResult, ExecFn, ExecRequest};
pub use fs::{FileSystem, FsError, InMemoryFs};
pub use interpreter::{ExecResult, ExecutionLimits, Interpreter, InterpreterError};
pub use parser::{parse, ParseException, Parser};

//! Interpreter module
//!
//! Executes parsed scripts: word expansion, arithmetic, pattern matching,
//! the variable store, builtins and the execution engine that ties them
//! together.

pub mod arithmetic;
pub mod assignments;
pub mod builtins;
pub mod command_resolution;
pub mod conditionals;
pub mod control_flow;
pub mod errors;
pub mod execution_engine;
pub mod expansion;
pub mod functions;
pub mod pattern;
pub mod redirections;
pub mod types;
pub mod variables;

pub use errors::{InterpreterError, InterpreterResult};
pub use execution_engine::Interpreter;
pub use types::{ControlSignal, ExecResult, ExecutionLimits, InterpreterState, ShellOptions, ShoptOptions};
pub use variables::{VarAttributes, VarValue, Variable, VariableStore};

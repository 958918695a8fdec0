//! Interpreter Errors
//!
//! Errors raised while expanding or evaluating a command. Control flow
//! (break, continue, return, exit) is not an error; it travels in
//! `ExecResult::signal`.
//!
//! Fatal errors end the whole script the way `exit` does. The rest abort
//! only the command being expanded, which then reports status 1.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InterpreterError {
    /// Division by zero, negative exponent, malformed numbers or syntax
    #[error("{expr}: {message}")]
    Arithmetic { expr: String, message: String },

    #[error("{0}: bad substitution")]
    BadSubstitution(String),

    /// Reading an unset variable under `set -u`
    #[error("{0}: unbound variable")]
    Unbound(String),

    /// `${name:?message}`
    #[error("{name}: {message}")]
    ParameterUnset { name: String, message: String },

    /// No match under `shopt -s failglob`
    #[error("no match: {0}")]
    Glob(String),

    #[error("{0}: readonly variable")]
    Readonly(String),

    #[error("{0}")]
    ExecutionLimit(String),

    /// Parse failure of nested source text (eval, source, traps)
    #[error("{0}")]
    Syntax(String),

    /// Anything else that should fail the command with a plain message
    #[error("{0}")]
    Runtime(String),
}

impl InterpreterError {
    pub fn arithmetic(expr: &str, message: impl Into<String>) -> Self {
        Self::Arithmetic { expr: expr.trim().to_string(), message: message.into() }
    }

    /// Whether the error terminates the shell instead of just the command.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unbound(_) | Self::ParameterUnset { .. } | Self::ExecutionLimit(_))
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Syntax(_) => 2,
            Self::ExecutionLimit(_) => 126,
            _ => 1,
        }
    }

    /// Diagnostic line as written to stderr.
    pub fn to_stderr(&self) -> String {
        format!("bash: {}\n", self)
    }
}

pub type InterpreterResult<T> = Result<T, InterpreterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(InterpreterError::Unbound("x".into()).to_stderr(), "bash: x: unbound variable\n");
        assert_eq!(
            InterpreterError::arithmetic(" 1/0 ", "division by 0").to_string(),
            "1/0: division by 0"
        );
        assert_eq!(InterpreterError::BadSubstitution("${x!}".into()).to_string(), "${x!}: bad substitution");
    }

    #[test]
    fn test_fatality_and_codes() {
        assert!(InterpreterError::Unbound("x".into()).is_fatal());
        assert!(!InterpreterError::Readonly("x".into()).is_fatal());
        assert_eq!(InterpreterError::Syntax("bad".into()).exit_code(), 2);
        assert_eq!(InterpreterError::Glob("*.z".into()).exit_code(), 1);
    }
}

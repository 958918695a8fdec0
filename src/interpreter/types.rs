//! Interpreter Types
//!
//! Type definitions for the interpreter state, options, limits and results.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::ast::types::FunctionDefNode;
use crate::interpreter::variables::VariableStore;

/// Boxed future used wherever execution recurses (commands, expansions).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Shell options (set -e, etc.)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOptions {
    /// set -e: Exit immediately if a command exits with non-zero status
    pub errexit: bool,
    /// set -u: Treat unset variables as an error when substituting
    pub nounset: bool,
    /// set -o pipefail: Return the rightmost non-zero status of a pipeline
    pub pipefail: bool,
    /// set -x: Print commands and their arguments as they are executed
    pub xtrace: bool,
    /// set -f: Disable filename expansion (globbing)
    pub noglob: bool,
    /// set -C: Prevent overwriting files with `>`
    pub noclobber: bool,
    /// set -a: Export all variables
    pub allexport: bool,
    /// set -n: Read commands but do not execute them
    pub noexec: bool,
}

/// Long names accepted by `set -o` with their single-letter flag.
pub const SET_OPTION_NAMES: &[(&str, Option<char>)] = &[
    ("allexport", Some('a')),
    ("errexit", Some('e')),
    ("noclobber", Some('C')),
    ("noexec", Some('n')),
    ("noglob", Some('f')),
    ("nounset", Some('u')),
    ("pipefail", None),
    ("xtrace", Some('x')),
];

impl ShellOptions {
    pub fn get(&self, name: &str) -> Option<bool> {
        Some(match name {
            "allexport" => self.allexport,
            "errexit" => self.errexit,
            "noclobber" => self.noclobber,
            "noexec" => self.noexec,
            "noglob" => self.noglob,
            "nounset" => self.nounset,
            "pipefail" => self.pipefail,
            "xtrace" => self.xtrace,
            _ => return None,
        })
    }

    /// Returns false for unknown names.
    pub fn set(&mut self, name: &str, value: bool) -> bool {
        let slot = match name {
            "allexport" => &mut self.allexport,
            "errexit" => &mut self.errexit,
            "noclobber" => &mut self.noclobber,
            "noexec" => &mut self.noexec,
            "noglob" => &mut self.noglob,
            "nounset" => &mut self.nounset,
            "pipefail" => &mut self.pipefail,
            "xtrace" => &mut self.xtrace,
            _ => return false,
        };
        *slot = value;
        true
    }

    pub fn name_for_flag(flag: char) -> Option<&'static str> {
        SET_OPTION_NAMES.iter().find(|(_, f)| *f == Some(flag)).map(|(n, _)| *n)
    }

    /// Value of `$-`
    pub fn flags(&self) -> String {
        let table = [
            (self.allexport, 'a'),
            (self.errexit, 'e'),
            (self.noglob, 'f'),
            (true, 'h'),
            (self.noexec, 'n'),
            (self.nounset, 'u'),
            (self.xtrace, 'x'),
            (true, 'B'),
            (self.noclobber, 'C'),
        ];
        table.iter().filter(|(on, _)| *on).map(|(_, c)| *c).collect()
    }
}

/// Shopt options (shopt -s, etc.)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShoptOptions {
    /// Extended globbing patterns @(), *(), +(), ?(), !()
    pub extglob: bool,
    /// Non-matching globs expand to nothing
    pub nullglob: bool,
    /// Non-matching globs are an error
    pub failglob: bool,
    /// Globs match dotfiles
    pub dotglob: bool,
    /// `**` matches across directories
    pub globstar: bool,
    pub nocaseglob: bool,
    /// Case-insensitive matching in `case` and `[[ ]]`
    pub nocasematch: bool,
    /// Last pipeline stage runs in the current shell
    pub lastpipe: bool,
    /// echo interprets backslash escapes by default
    pub xpg_echo: bool,
}

pub const SHOPT_NAMES: &[&str] = &[
    "dotglob",
    "extglob",
    "failglob",
    "globstar",
    "lastpipe",
    "nocaseglob",
    "nocasematch",
    "nullglob",
    "xpg_echo",
];

impl ShoptOptions {
    pub fn get(&self, name: &str) -> Option<bool> {
        Some(match name {
            "dotglob" => self.dotglob,
            "extglob" => self.extglob,
            "failglob" => self.failglob,
            "globstar" => self.globstar,
            "lastpipe" => self.lastpipe,
            "nocaseglob" => self.nocaseglob,
            "nocasematch" => self.nocasematch,
            "nullglob" => self.nullglob,
            "xpg_echo" => self.xpg_echo,
            _ => return None,
        })
    }

    pub fn set(&mut self, name: &str, value: bool) -> bool {
        let slot = match name {
            "dotglob" => &mut self.dotglob,
            "extglob" => &mut self.extglob,
            "failglob" => &mut self.failglob,
            "globstar" => &mut self.globstar,
            "lastpipe" => &mut self.lastpipe,
            "nocaseglob" => &mut self.nocaseglob,
            "nocasematch" => &mut self.nocasematch,
            "nullglob" => &mut self.nullglob,
            "xpg_echo" => &mut self.xpg_echo,
            _ => return false,
        };
        *slot = value;
        true
    }
}

/// Where an output file descriptor currently points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    Stderr,
    /// Already truncated when opened; writes append.
    File(String),
    /// `/dev/null` or a closed descriptor
    Discard,
}

/// Non-local control flow carried alongside a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlSignal {
    #[default]
    Normal,
    Break(u32),
    Continue(u32),
    Return(i32),
    Exit(i32),
}

impl ControlSignal {
    pub fn is_normal(&self) -> bool {
        matches!(self, ControlSignal::Normal)
    }
}

/// Execution result from a command or script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub signal: ControlSignal,
}

impl ExecResult {
    pub fn new(stdout: String, stderr: String, exit_code: i32) -> Self {
        Self { stdout, stderr, exit_code, signal: ControlSignal::Normal }
    }

    /// Success result with no output
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn success(stdout: impl Into<String>) -> Self {
        Self::new(stdout.into(), String::new(), 0)
    }

    pub fn with_code(exit_code: i32) -> Self {
        Self::new(String::new(), String::new(), exit_code)
    }

    /// Failure result with stderr message
    pub fn failure(stderr: impl Into<String>) -> Self {
        Self::new(String::new(), stderr.into(), 1)
    }

    /// Failure result with stderr message and custom exit code
    pub fn failure_with_code(stderr: impl Into<String>, exit_code: i32) -> Self {
        Self::new(String::new(), stderr.into(), exit_code)
    }

    pub fn with_signal(mut self, signal: ControlSignal) -> Self {
        self.signal = signal;
        self
    }

    /// Append another result's output and take over its status and signal.
    pub fn absorb(&mut self, other: ExecResult) {
        self.stdout.push_str(&other.stdout);
        self.stderr.push_str(&other.stderr);
        self.exit_code = other.exit_code;
        self.signal = other.signal;
    }
}

/// Execution limits configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Maximum nesting of function calls (and `source`)
    pub max_call_depth: u32,
    /// Maximum number of commands one `exec` may run
    pub max_command_count: u64,
    /// Maximum iterations of a single loop
    pub max_loop_iterations: u64,
    /// Maximum nesting of command substitutions and nested shells
    pub max_substitution_depth: u32,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_call_depth: 256,
            max_command_count: 1_000_000,
            max_loop_iterations: 1_000_000,
            max_substitution_depth: 64,
        }
    }
}

/// Complete interpreter state for script execution. Cloning it yields an
/// isolated subshell environment.
#[derive(Debug, Clone)]
pub struct InterpreterState {
    // ---- Variables and functions ----
    pub vars: VariableStore,
    pub functions: HashMap<String, Arc<FunctionDefNode>>,
    /// `$1..$N`
    pub positional: Vec<String>,
    /// `$0`
    pub script_name: String,

    // ---- Environment ----
    pub cwd: String,

    // ---- Execution tracking ----
    pub last_exit_code: i32,
    /// Last argument of previous command, for `$_`
    pub last_arg: String,
    /// Current line number being executed (for `$LINENO`)
    pub current_line: usize,
    /// Status of the most recent command substitution in the current command
    pub last_subst_status: Option<i32>,

    // ---- Options ----
    pub options: ShellOptions,
    pub shopt_options: ShoptOptions,

    // ---- Traps ----
    /// Condition name (EXIT, ERR, INT, ...) -> command text
    pub traps: HashMap<String, String>,
    pub in_trap: bool,

    // ---- Call stack ----
    pub func_name_stack: Vec<String>,
    pub call_depth: u32,
    pub source_depth: u32,

    // ---- Control flow ----
    pub loop_depth: u32,
    /// True while running an if/while/until condition or a non-final `&&`/`||` element
    pub in_condition: bool,

    // ---- Limits bookkeeping ----
    pub command_count: u64,
    pub substitution_depth: u32,
    pub subshell_level: u32,
    /// Set when a limit tripped, so nested shells can hand it upwards
    pub limit_error: Option<String>,

    // ---- I/O ----
    /// Input available to the running command; `read` consumes lines from it
    pub stdin: Option<String>,
    /// Diagnostics produced while expanding words, flushed with the command's stderr
    pub pending_stderr: String,
    /// Descriptors redirected persistently with `exec N>file`
    pub fd_targets: HashMap<i32, OutputTarget>,

    // ---- Process ----
    pub start_time: Instant,
    pub seconds_offset: i64,
    pub shell_pid: u32,
    pub bash_pid: u32,
    pub last_background_pid: Option<u32>,
    pub next_virtual_pid: u32,
    pub rng: StdRng,
    /// Character offset inside the current `getopts` argument
    pub getopts_charpos: usize,
}

impl Default for InterpreterState {
    fn default() -> Self {
        let pid = std::process::id();
        Self {
            vars: VariableStore::new(),
            functions: HashMap::new(),
            positional: Vec::new(),
            script_name: "bash".to_string(),
            cwd: "/".to_string(),
            last_exit_code: 0,
            last_arg: String::new(),
            current_line: 1,
            last_subst_status: None,
            options: ShellOptions::default(),
            shopt_options: ShoptOptions::default(),
            traps: HashMap::new(),
            in_trap: false,
            func_name_stack: Vec::new(),
            call_depth: 0,
            source_depth: 0,
            loop_depth: 0,
            in_condition: false,
            command_count: 0,
            substitution_depth: 0,
            subshell_level: 0,
            limit_error: None,
            stdin: None,
            pending_stderr: String::new(),
            fd_targets: HashMap::new(),
            start_time: Instant::now(),
            seconds_offset: 0,
            shell_pid: pid,
            bash_pid: pid,
            last_background_pid: None,
            next_virtual_pid: pid.wrapping_add(1000),
            rng: StdRng::from_entropy(),
            getopts_charpos: 0,
        }
    }
}

impl InterpreterState {
    /// Next synthetic pid for subshells and background jobs.
    pub fn allocate_pid(&mut self) -> u32 {
        self.next_virtual_pid = self.next_virtual_pid.wrapping_add(1);
        self.next_virtual_pid
    }

    /// `$SECONDS`
    pub fn seconds(&self) -> i64 {
        self.start_time.elapsed().as_secs() as i64 + self.seconds_offset
    }

    pub fn reset_seconds(&mut self, value: i64) {
        self.start_time = Instant::now();
        self.seconds_offset = value;
    }

    /// Whether errexit applies to a failure right now.
    pub fn errexit_active(&self) -> bool {
        self.options.errexit && !self.in_condition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_flags() {
        let mut opts = ShellOptions::default();
        assert_eq!(opts.flags(), "hB");
        opts.set("errexit", true);
        opts.set("nounset", true);
        assert_eq!(opts.flags(), "ehuB");
        assert!(!opts.set("bogus", true));
        assert_eq!(ShellOptions::name_for_flag('x'), Some("xtrace"));
    }

    #[test]
    fn test_absorb_keeps_output_order() {
        let mut acc = ExecResult::success("a");
        acc.absorb(ExecResult::new("b".into(), "e".into(), 3).with_signal(ControlSignal::Break(1)));
        assert_eq!(acc.stdout, "ab");
        assert_eq!(acc.stderr, "e");
        assert_eq!(acc.exit_code, 3);
        assert_eq!(acc.signal, ControlSignal::Break(1));
    }

    #[test]
    fn test_pid_allocation_increments() {
        let mut state = InterpreterState::default();
        let a = state.allocate_pid();
        assert_eq!(state.allocate_pid(), a.wrapping_add(1));
    }
}

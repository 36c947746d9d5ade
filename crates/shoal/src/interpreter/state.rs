//! Interpreter state types

use std::fmt;

/// Exit status of a command: `0` is success, anything else failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ExitStatus(pub i32);

impl ExitStatus {
    pub const SUCCESS: ExitStatus = ExitStatus(0);
    pub const FAILURE: ExitStatus = ExitStatus(1);
    /// Command could not be executed (found but not runnable).
    pub const NOT_EXECUTABLE: ExitStatus = ExitStatus(126);
    pub const NOT_FOUND: ExitStatus = ExitStatus(127);
    /// Writer of a pipeline stage whose reader went away (128 + SIGPIPE).
    pub const BROKEN_PIPE: ExitStatus = ExitStatus(141);

    pub fn from_bool(ok: bool) -> Self {
        if ok {
            Self::SUCCESS
        } else {
            Self::FAILURE
        }
    }

    pub fn code(self) -> i32 {
        self.0
    }

    pub fn is_success(self) -> bool {
        self.0 == 0
    }
}

impl From<i32> for ExitStatus {
    fn from(code: i32) -> Self {
        ExitStatus(code)
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a statement finished.
///
/// `break` and `continue` unwind to the innermost loop as values instead
/// of errors; the loop consumes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Normal(ExitStatus),
    Break,
    Continue,
}

impl Flow {
    /// Status of the statement; loop control counts as success.
    pub fn status(self) -> ExitStatus {
        match self {
            Flow::Normal(status) => status,
            Flow::Break | Flow::Continue => ExitStatus::SUCCESS,
        }
    }
}

/// Result of executing a script with captured streams.
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// Exit code
    pub exit_code: i32,
}

impl ExecResult {
    /// Check if the result indicates success.
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

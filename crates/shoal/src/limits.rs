//! Fuel for running scripts
//!
//! A script can loop forever or recurse through aliases and command
//! substitutions. [`ExecutionLimits`] bounds how much work a [`Shell`]
//! does before the run is aborted with [`LimitExceeded`].
//!
//! [`Shell`]: crate::Shell

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Upper bounds for one shell and every subshell it starts.
///
/// ```
/// let limits = shoal::ExecutionLimits::new()
///     .max_commands(10_000)
///     .max_subshell_depth(8);
/// assert_eq!(limits.max_loop_iterations, 100_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Simple commands and assignments run, across all subshells
    pub max_commands: usize,
    /// Iterations of any single `for`, `while` or `until`
    pub max_loop_iterations: usize,
    /// Nesting of subshells, pipeline stages and `$( )`
    pub max_subshell_depth: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_commands: 100_000,
            max_loop_iterations: 100_000,
            max_subshell_depth: 64,
        }
    }
}

impl ExecutionLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_commands(self, max_commands: usize) -> Self {
        Self {
            max_commands,
            ..self
        }
    }

    pub fn max_loop_iterations(self, max_loop_iterations: usize) -> Self {
        Self {
            max_loop_iterations,
            ..self
        }
    }

    pub fn max_subshell_depth(self, max_subshell_depth: usize) -> Self {
        Self {
            max_subshell_depth,
            ..self
        }
    }

    /// `iteration` counts from 1.
    pub fn check_loop(&self, iteration: usize) -> Result<(), LimitExceeded> {
        if iteration > self.max_loop_iterations {
            return Err(LimitExceeded::MaxLoopIterations(self.max_loop_iterations));
        }
        Ok(())
    }
}

/// Work done so far.
///
/// Clones share the command count, so a subshell spends its parent's
/// budget. The depth belongs to each copy.
#[derive(Debug, Clone, Default)]
pub struct ExecutionCounters {
    commands: Arc<AtomicUsize>,
    pub subshell_depth: usize,
}

impl ExecutionCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> usize {
        self.commands.load(Ordering::Relaxed)
    }

    /// Count one command against the budget.
    pub fn tick_command(&self, limits: &ExecutionLimits) -> Result<(), LimitExceeded> {
        let spent = self.commands.fetch_add(1, Ordering::Relaxed) + 1;
        if spent > limits.max_commands {
            return Err(LimitExceeded::MaxCommands(limits.max_commands));
        }
        Ok(())
    }

    /// Go one subshell deeper. On failure the depth is unchanged.
    pub fn enter_subshell(&mut self, limits: &ExecutionLimits) -> Result<(), LimitExceeded> {
        if self.subshell_depth >= limits.max_subshell_depth {
            return Err(LimitExceeded::MaxSubshellDepth(limits.max_subshell_depth));
        }
        self.subshell_depth += 1;
        Ok(())
    }
}

/// A bound in [`ExecutionLimits`] was reached.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LimitExceeded {
    #[error("too many commands (limit {0})")]
    MaxCommands(usize),

    #[error("too many loop iterations (limit {0})")]
    MaxLoopIterations(usize),

    #[error("subshells nested too deeply (limit {0})")]
    MaxSubshellDepth(usize),
}

//! Shoal - an embeddable POSIX-style shell interpreter
//!
//! Scripts are lexed, parsed into an AST and interpreted directly. Pipeline
//! stages run concurrently on the tokio runtime, builtins run in-process,
//! and everything else is spawned as a host process.
//!
//! # Example
//!
//! ```rust
//! use shoal::Shell;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut shell = Shell::new();
//!     let result = shell.exec("x=world; echo hello $x").await?;
//!     assert_eq!(result.stdout, "hello world\n");
//!     assert_eq!(result.exit_code, 0);
//!     Ok(())
//! }
//! ```
//!
//! # Embedding
//!
//! [`ShellBuilder`] configures variables, the working directory, extra
//! [`Builtin`]s, how commands are found ([`CommandFinder`]) and how
//! patterns are globbed ([`Globber`]). [`Shell::exec`] captures output;
//! [`Shell::run`] streams to caller supplied [`Io`] handles.

mod builtins;
mod error;
mod expand;
mod glob;
mod interpreter;
mod io;
mod limits;
mod logging_impl;
mod parser;
mod process;
mod shell;

pub use async_trait::async_trait;
pub use builtins::{default_builtins, resolve_path, Builtin, Context};
pub use error::{
    Error, ExecutionError, ExpansionError, LexError, ParseError, Result, TestError,
};
pub use expand::evaluate;
pub use glob::{FsGlobber, Globber};
pub use interpreter::{ExecResult, ExitStatus, Flow};
pub use io::{pipe, Capture, InputHandle, Io, OutputHandle};
pub use limits::{ExecutionLimits, LimitExceeded};
pub use logging_impl::LogConfig;
pub use parser::{parse_arithmetic, Expr, Parser, Script};
pub use process::{CommandFinder, CommandKind, CommandRunner, Invocation, PathFinder, ProcessRunner};
pub use shell::{Environment, Scope, Shell};

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use limits::ExecutionCounters;
use shell::LastCommand;

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}

impl Shell {
    /// Create a shell with default settings.
    pub fn new() -> Self {
        ShellBuilder::new().build()
    }

    /// Create a new ShellBuilder for customized configuration.
    pub fn builder() -> ShellBuilder {
        ShellBuilder::new()
    }

    /// Run a script with stdin closed, capturing stdout and stderr.
    ///
    /// Lex and parse errors are returned before anything runs. An error
    /// raised while running stops the script; output produced up to that
    /// point is discarded along with the result.
    pub async fn exec(&mut self, script: &str) -> Result<ExecResult> {
        let stdout = Capture::new();
        let stderr = Capture::new();
        let io = Io {
            stdin: InputHandle::Null,
            stdout: stdout.handle(),
            stderr: stderr.handle(),
        };
        let status = self.run(script, &io).await?;
        drop(io);
        Ok(ExecResult {
            stdout: stdout.text(),
            stderr: stderr.text(),
            exit_code: status.code(),
        })
    }

    /// Run a script against the given streams.
    pub async fn run(&mut self, script: &str, io: &Io) -> Result<ExitStatus> {
        debug!(script = %self.log.script(script), "run");
        let parsed = Parser::new(script).parse()?;
        self.run_script(&parsed, io).await
    }
}

/// Builder for customized Shell configuration.
pub struct ShellBuilder {
    vars: Vec<(String, String)>,
    inherit_env: bool,
    cwd: Option<PathBuf>,
    args: Vec<String>,
    name: String,
    builtins: HashMap<String, Arc<dyn Builtin>>,
    finder: Arc<dyn CommandFinder>,
    globber: Arc<dyn Globber>,
    limits: ExecutionLimits,
    log: LogConfig,
}

impl Default for ShellBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellBuilder {
    pub fn new() -> Self {
        Self {
            vars: Vec::new(),
            inherit_env: false,
            cwd: None,
            args: Vec::new(),
            name: "shoal".to_string(),
            builtins: default_builtins(),
            finder: Arc::new(PathFinder),
            globber: Arc::new(FsGlobber),
            limits: ExecutionLimits::default(),
            log: LogConfig::default(),
        }
    }

    /// Set and export an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.push((key.into(), value.into()));
        self
    }

    /// Start with the host process environment, exported.
    ///
    /// Variables set with [`env`](Self::env) take precedence.
    pub fn inherit_env(mut self) -> Self {
        self.inherit_env = true;
        self
    }

    /// Set the current working directory. Defaults to the host process's.
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set the positional parameters `$1`, `$2`, ...
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set `$0`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Register a custom builtin command, replacing any of the same name.
    pub fn builtin(mut self, name: impl Into<String>, builtin: Box<dyn Builtin>) -> Self {
        self.builtins.insert(name.into(), Arc::from(builtin));
        self
    }

    /// Replace how command names are resolved and external commands run.
    pub fn finder(mut self, finder: Arc<dyn CommandFinder>) -> Self {
        self.finder = finder;
        self
    }

    pub fn globber(mut self, globber: Arc<dyn Globber>) -> Self {
        self.globber = globber;
        self
    }

    /// Set resource limits.
    pub fn limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Configure how values and scripts appear in logs.
    pub fn log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Build the Shell instance.
    pub fn build(self) -> Shell {
        let cwd = self
            .cwd
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("/"));

        let host = self.inherit_env.then(|| std::env::vars().collect::<Vec<_>>());
        let mut scope = Scope::new();
        let mut exported = BTreeSet::new();
        for (key, value) in host.into_iter().flatten().chain(self.vars) {
            scope.set(&key, vec![value]);
            exported.insert(key);
        }
        scope.set("PWD", vec![cwd.to_string_lossy().into_owned()]);

        Shell {
            scope,
            exported,
            aliases: HashMap::new(),
            builtins: Arc::new(self.builtins),
            dirs: vec![cwd],
            last: LastCommand {
                args: self.args,
                name: self.name,
                ..LastCommand::default()
            },
            finder: self.finder,
            globber: self.globber,
            limits: Arc::new(self.limits),
            counters: ExecutionCounters::new(),
            log: Arc::new(self.log),
            subst_status: None,
        }
    }
}

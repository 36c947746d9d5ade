//! Built-in shell commands
//!
//! This module provides the [`Builtin`] trait for implementing custom commands
//! and the [`Context`] struct they run with.
//!
//! # Custom Builtins
//!
//! Implement the [`Builtin`] trait to create custom commands:
//!
//! ```rust
//! use shoal::{async_trait, Builtin, Context, ExitStatus};
//!
//! struct Hello;
//!
//! #[async_trait]
//! impl Builtin for Hello {
//!     async fn execute(&self, ctx: Context<'_>) -> shoal::Result<ExitStatus> {
//!         ctx.stdout.write_str("Hello!\n").await?;
//!         Ok(ExitStatus::SUCCESS)
//!     }
//! }
//! ```
//!
//! Register via [`ShellBuilder::builtin`](crate::ShellBuilder::builtin).
//! A registered builtin shadows any external program of the same name.

mod alias;
mod cat;
mod dirstack;
mod echo;
mod export;
mod flow;
mod navigation;
mod read;
mod vars;

pub use alias::{Alias, Unalias};
pub use cat::Cat;
pub use dirstack::{Dirs, Popd, Pushd};
pub use echo::Echo;
pub use export::Export;
pub use flow::{Colon, False, True};
pub use navigation::{Cd, Pwd};
pub use read::Read;
pub use vars::Unset;

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;
use crate::interpreter::ExitStatus;
use crate::io::{InputHandle, OutputHandle};
use crate::shell::Shell;

/// Resolve a path relative to the current working directory.
///
/// If the path is absolute, it is normalized as-is.
/// If relative, it is joined with `cwd` and normalized.
///
/// # Example
///
/// ```ignore
/// let abs = resolve_path(Path::new("/home"), "/tmp/file.txt");
/// assert_eq!(abs, PathBuf::from("/tmp/file.txt"));
///
/// let rel = resolve_path(Path::new("/home"), "file.txt");
/// assert_eq!(rel, PathBuf::from("/home/file.txt"));
/// ```
pub fn resolve_path(cwd: &Path, path_str: &str) -> PathBuf {
    let path = Path::new(path_str);
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };
    normalize_path(&joined)
}

/// Lexically resolve `.` and `..` components; symlinks are not consulted.
fn normalize_path(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::RootDir => result.push("/"),
            Component::Normal(name) => result.push(name),
            Component::ParentDir => {
                result.pop();
            }
            Component::CurDir | Component::Prefix(_) => {}
        }
    }

    // "/.." and friends
    if result.as_os_str().is_empty() {
        result.push("/");
    }
    result
}

/// Execution context for builtin commands.
///
/// A builtin runs inside the shell that invoked it, so changes it makes
/// through [`Context::shell`] (variables, directory, aliases) persist.
/// Its streams are whatever the command's redirections and pipeline
/// position resolved to.
pub struct Context<'a> {
    /// Command arguments (not including the command name).
    pub args: &'a [String],

    /// The invoking shell.
    pub shell: &'a mut Shell,

    /// Standard input, possibly the read end of a pipe.
    pub stdin: InputHandle,

    pub stdout: OutputHandle,

    pub stderr: OutputHandle,
}

impl Context<'_> {
    /// Report `message` on stderr and return a failure status.
    pub async fn fail(&self, message: impl AsRef<str>) -> Result<ExitStatus> {
        self.stderr
            .write_str(&format!("{}\n", message.as_ref()))
            .await?;
        Ok(ExitStatus::FAILURE)
    }
}

/// Trait for implementing builtin commands.
///
/// All custom builtins must implement this trait. The trait requires `Send + Sync`
/// because a builtin may run as any stage of a concurrent pipeline.
///
/// Returning `Err` aborts the whole statement sequence. Ordinary failures
/// (bad arguments, missing files) should be reported on stderr with a
/// nonzero [`ExitStatus`] instead; see [`Context::fail`].
#[async_trait]
pub trait Builtin: Send + Sync {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExitStatus>;
}

/// The builtins every shell starts with.
pub fn default_builtins() -> HashMap<String, Arc<dyn Builtin>> {
    let mut builtins: HashMap<String, Arc<dyn Builtin>> = HashMap::new();
    builtins.insert("echo".to_string(), Arc::new(Echo));
    builtins.insert("true".to_string(), Arc::new(True));
    builtins.insert("false".to_string(), Arc::new(False));
    builtins.insert(":".to_string(), Arc::new(Colon));
    builtins.insert("cat".to_string(), Arc::new(Cat));
    builtins.insert("read".to_string(), Arc::new(Read));
    builtins.insert("cd".to_string(), Arc::new(Cd));
    builtins.insert("pwd".to_string(), Arc::new(Pwd));
    builtins.insert("pushd".to_string(), Arc::new(Pushd));
    builtins.insert("popd".to_string(), Arc::new(Popd));
    builtins.insert("dirs".to_string(), Arc::new(Dirs));
    builtins.insert("export".to_string(), Arc::new(Export));
    builtins.insert("unset".to_string(), Arc::new(Unset));
    builtins.insert("alias".to_string(), Arc::new(Alias));
    builtins.insert("unalias".to_string(), Arc::new(Unalias));
    builtins
}

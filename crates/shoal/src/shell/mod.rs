//! Shell state
//!
//! A [`Shell`] owns everything a script can change: variables, the set of
//! exported names, aliases, the directory stack and the status of the last
//! command. Pluggable capabilities (builtins, command lookup, globbing) are
//! shared behind `Arc`s so a subshell is a cheap clone.

mod scope;

pub use scope::Scope;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::trace;

use crate::builtins::Builtin;
use crate::error::{ExpansionError, Result};
use crate::glob::Globber;
use crate::interpreter::ExitStatus;
use crate::limits::{ExecutionCounters, ExecutionLimits};
use crate::logging_impl::LogConfig;
use crate::process::CommandFinder;

/// Field separators used when `IFS` is unset.
pub const DEFAULT_IFS: &str = " \t\n";

/// Variable lookup and assignment.
///
/// Arithmetic evaluation only needs this much of a shell, so it is written
/// against the trait and can run over a plain map.
pub trait Environment {
    /// Fields of a variable, `None` when unset.
    fn resolve(&self, name: &str) -> Option<Vec<String>>;

    fn define(&mut self, name: &str, fields: Vec<String>) -> Result<()>;

    fn delete(&mut self, name: &str) -> Result<()>;
}

impl Environment for HashMap<String, Vec<String>> {
    fn resolve(&self, name: &str) -> Option<Vec<String>> {
        self.get(name).cloned()
    }

    fn define(&mut self, name: &str, fields: Vec<String>) -> Result<()> {
        self.insert(name.to_string(), fields);
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<()> {
        self.remove(name);
        Ok(())
    }
}

/// `$?`, `$!`, `$0` and the positional parameters.
#[derive(Debug, Clone, Default)]
pub(crate) struct LastCommand {
    pub status: ExitStatus,
    /// Process id of the most recent external command
    pub pid: Option<u32>,
    pub args: Vec<String>,
    pub name: String,
}

/// Interpreter state.
#[derive(Clone)]
pub struct Shell {
    pub(crate) scope: Scope,
    pub(crate) exported: BTreeSet<String>,
    pub(crate) aliases: HashMap<String, String>,
    pub(crate) builtins: Arc<HashMap<String, Arc<dyn Builtin>>>,
    /// Directory stack, the working directory on top
    pub(crate) dirs: Vec<PathBuf>,
    pub(crate) last: LastCommand,
    pub(crate) finder: Arc<dyn CommandFinder>,
    pub(crate) globber: Arc<dyn Globber>,
    pub(crate) limits: Arc<ExecutionLimits>,
    pub(crate) counters: ExecutionCounters,
    pub(crate) log: Arc<LogConfig>,
    /// Status of the last command substitution, reported by assignments
    pub(crate) subst_status: Option<ExitStatus>,
}

impl std::fmt::Debug for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shell")
            .field("cwd", &self.cwd())
            .field("status", &self.last.status)
            .field("depth", &self.counters.subshell_depth)
            .finish_non_exhaustive()
    }
}

/// Names the shell maintains itself.
fn is_special(name: &str) -> bool {
    matches!(name, "?" | "$" | "!" | "#" | "@" | "*" | "-")
        || (!name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()))
}

impl Environment for Shell {
    fn resolve(&self, name: &str) -> Option<Vec<String>> {
        let single = |s: String| Some(vec![s]);
        match name {
            "?" => single(self.last.status.to_string()),
            "$" => single(std::process::id().to_string()),
            "!" => self.last.pid.map(|pid| vec![pid.to_string()]),
            "#" => single(self.last.args.len().to_string()),
            "@" | "*" => Some(self.last.args.clone()),
            "-" => single(String::new()),
            "0" => single(self.last.name.clone()),
            _ if is_special(name) => {
                let index: usize = name.parse().ok()?;
                match index.checked_sub(1) {
                    Some(i) => self.last.args.get(i).map(|a| vec![a.clone()]),
                    None => single(self.last.name.clone()),
                }
            }
            _ => self.scope.get(name).cloned(),
        }
    }

    fn define(&mut self, name: &str, fields: Vec<String>) -> Result<()> {
        if is_special(name) {
            return Err(ExpansionError::ReadOnly(name.to_string()).into());
        }
        trace!(
            name,
            value = %self.log.assignment(name, &fields.join(" ")),
            "define"
        );
        self.scope.set(name, fields);
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<()> {
        if is_special(name) {
            return Err(ExpansionError::ReadOnly(name.to_string()).into());
        }
        self.scope.unset(name);
        self.exported.remove(name);
        Ok(())
    }
}

impl Shell {
    /// Value of a variable, multiple fields joined by a space.
    pub fn var(&self, name: &str) -> Option<String> {
        self.resolve(name).map(|fields| fields.join(" "))
    }

    pub fn set_var(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        self.define(name, vec![value.into()])
    }

    pub fn unset_var(&mut self, name: &str) -> Result<()> {
        self.delete(name)
    }

    /// Mark a variable for export to external commands.
    pub fn export(&mut self, name: &str) {
        self.exported.insert(name.to_string());
    }

    pub fn is_exported(&self, name: &str) -> bool {
        self.exported.contains(name)
    }

    /// Exported variables that are set, sorted by name.
    pub fn environment(&self) -> Vec<(String, String)> {
        self.exported
            .iter()
            .filter_map(|name| self.var(name).map(|value| (name.clone(), value)))
            .collect()
    }

    /// Names of all set variables, sorted.
    pub fn var_names(&self) -> BTreeSet<String> {
        self.scope.names()
    }

    /// Current field separators.
    pub fn ifs(&self) -> String {
        self.var("IFS").unwrap_or_else(|| DEFAULT_IFS.to_string())
    }

    pub fn cwd(&self) -> &Path {
        self.dirs
            .last()
            .map(PathBuf::as_path)
            .unwrap_or_else(|| Path::new("/"))
    }

    /// Replace the top of the directory stack.
    pub fn set_cwd(&mut self, path: PathBuf) {
        let old = self.cwd().to_path_buf();
        match self.dirs.last_mut() {
            Some(top) => *top = path,
            None => self.dirs.push(path),
        }
        self.update_pwd(old);
    }

    pub fn push_dir(&mut self, path: PathBuf) {
        let old = self.cwd().to_path_buf();
        self.dirs.push(path);
        self.update_pwd(old);
    }

    /// Pop the directory stack; the last entry is never removed.
    pub fn pop_dir(&mut self) -> Option<PathBuf> {
        if self.dirs.len() < 2 {
            return None;
        }
        let popped = self.dirs.pop();
        if let Some(old) = &popped {
            self.update_pwd(old.clone());
        }
        popped
    }

    /// Exchange the top two directories; false when there is only one.
    pub fn swap_dirs(&mut self) -> bool {
        let len = self.dirs.len();
        if len < 2 {
            return false;
        }
        let old = self.cwd().to_path_buf();
        self.dirs.swap(len - 1, len - 2);
        self.update_pwd(old);
        true
    }

    /// The directory stack, top first.
    pub fn dirs(&self) -> impl Iterator<Item = &Path> {
        self.dirs.iter().rev().map(PathBuf::as_path)
    }

    fn update_pwd(&mut self, old: PathBuf) {
        let pwd = self.cwd().to_string_lossy().into_owned();
        self.scope.set("OLDPWD", vec![old.to_string_lossy().into_owned()]);
        self.scope.set("PWD", vec![pwd]);
    }

    pub fn alias(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(String::as_str)
    }

    pub fn set_alias(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.aliases.insert(name.into(), text.into());
    }

    pub fn remove_alias(&mut self, name: &str) -> bool {
        self.aliases.remove(name).is_some()
    }

    /// All aliases sorted by name.
    pub fn aliases(&self) -> Vec<(&str, &str)> {
        let mut aliases: Vec<(&str, &str)> = self
            .aliases
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        aliases.sort();
        aliases
    }

    /// Status of the last completed command.
    pub fn exit_status(&self) -> ExitStatus {
        self.last.status
    }

    pub fn positional(&self) -> &[String] {
        &self.last.args
    }

    pub fn set_positional(&mut self, args: Vec<String>) {
        self.last.args = args;
    }

    /// Registered builtin by name.
    pub fn builtin(&self, name: &str) -> Option<Arc<dyn Builtin>> {
        self.builtins.get(name).cloned()
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    pub fn commands_executed(&self) -> usize {
        self.counters.commands()
    }

    /// An isolated copy for a subshell or a pipeline stage.
    ///
    /// Variables are shared read-only; anything the child changes stays in
    /// the child. The command budget is shared with the parent.
    pub fn subshell(&self) -> Result<Shell> {
        let mut child = self.clone();
        child.scope = self.scope.child();
        child.counters.enter_subshell(&self.limits)?;
        child.subst_status = None;
        Ok(child)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn shell() -> Shell {
        crate::ShellBuilder::new()
            .cwd("/tmp")
            .args(["one", "two"])
            .name("script")
            .build()
    }

    #[test]
    fn test_special_parameters() {
        let sh = shell();
        assert_eq!(sh.var("#").as_deref(), Some("2"));
        assert_eq!(sh.var("1").as_deref(), Some("one"));
        assert_eq!(sh.var("3"), None);
        assert_eq!(sh.var("0").as_deref(), Some("script"));
        assert_eq!(sh.var("?").as_deref(), Some("0"));
        assert_eq!(sh.resolve("@"), Some(vec!["one".into(), "two".into()]));
        assert_eq!(sh.var("!"), None);
    }

    #[test]
    fn test_special_parameters_are_read_only() {
        let mut sh = shell();
        assert!(sh.set_var("1", "x").is_err());
        assert!(sh.set_var("?", "x").is_err());
        assert!(sh.unset_var("#").is_err());
    }

    #[test]
    fn test_subshell_isolation() {
        let mut sh = shell();
        sh.set_var("x", "outer").unwrap();
        let mut child = sh.subshell().unwrap();
        child.set_var("x", "inner").unwrap();
        child.set_alias("ll", "ls -l");
        child.push_dir(PathBuf::from("/"));

        assert_eq!(sh.var("x").as_deref(), Some("outer"));
        assert_eq!(child.var("x").as_deref(), Some("inner"));
        assert!(sh.alias("ll").is_none());
        assert_eq!(sh.cwd(), Path::new("/tmp"));
        assert_eq!(child.counters.subshell_depth, 1);
    }

    #[test]
    fn test_directory_stack() {
        let mut sh = shell();
        sh.push_dir(PathBuf::from("/usr"));
        assert_eq!(sh.cwd(), Path::new("/usr"));
        assert_eq!(sh.var("OLDPWD").as_deref(), Some("/tmp"));
        let dirs: Vec<&Path> = sh.dirs().collect();
        assert_eq!(dirs, vec![Path::new("/usr"), Path::new("/tmp")]);

        assert_eq!(sh.pop_dir(), Some(PathBuf::from("/usr")));
        assert_eq!(sh.pop_dir(), None);
        assert_eq!(sh.var("PWD").as_deref(), Some("/tmp"));
    }

    #[test]
    fn test_environment_lists_exported_set_variables() {
        let mut sh = shell();
        sh.set_var("A", "1").unwrap();
        sh.export("A");
        sh.export("UNSET");
        sh.set_var("B", "2").unwrap();
        assert_eq!(sh.environment(), vec![("A".to_string(), "1".to_string())]);
    }

    #[test]
    fn test_map_environment() {
        let mut env: HashMap<String, Vec<String>> = HashMap::new();
        env.define("x", vec!["5".into()]).unwrap();
        assert_eq!(env.resolve("x"), Some(vec!["5".to_string()]));
        env.delete("x").unwrap();
        assert_eq!(env.resolve("x"), None);
    }
}

//! Redirections
//!
//! A command's redirections are applied left to right to a table of its
//! three descriptors. `2>&1` copies whatever descriptor 1 refers to at
//! that point, so `> out 2>&1` sends both streams to `out` while
//! `2>&1 > out` leaves stderr on the old stdout.

use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tracing::trace;

use crate::builtins::resolve_path;
use crate::error::{ExecutionError, Result};
use crate::io::{InputHandle, Io, OutputHandle};
use crate::parser::{Redirect, RedirectOp};
use crate::shell::Shell;

/// What a descriptor refers to.
#[derive(Debug, Clone)]
enum Target {
    Input(InputHandle),
    Output(OutputHandle),
}

/// A redirection with its target expanded and resolved.
enum Planned {
    Read(PathBuf),
    Write { path: PathBuf, append: bool },
    Dup(usize),
}

impl Planned {
    /// Path and whether it is opened for writing.
    fn file(&self) -> Option<(&Path, bool)> {
        match self {
            Planned::Read(path) => Some((path, false)),
            Planned::Write { path, .. } => Some((path, true)),
            Planned::Dup(_) => None,
        }
    }
}

/// Descriptors 0, 1 and 2 of one command.
pub(super) struct FdTable {
    /// Streams the command inherited; redirection targets expand with these
    base: Io,
    slots: [Target; 3],
    /// Output files to flush and close when the command is done
    files: Vec<OutputHandle>,
}

impl FdTable {
    pub(super) fn new(io: &Io) -> Self {
        Self {
            base: io.clone(),
            slots: [
                Target::Input(io.stdin.clone()),
                Target::Output(io.stdout.clone()),
                Target::Output(io.stderr.clone()),
            ],
            files: Vec::new(),
        }
    }

    /// Apply redirections in order.
    ///
    /// Every target is expanded and checked before any file is opened,
    /// and inputs are opened before outputs, so a rejected command does
    /// not truncate or create anything.
    pub(super) async fn apply(&mut self, redirects: &[Redirect], shell: &mut Shell) -> Result<()> {
        let plan = self.plan(redirects, shell).await?;
        check_conflicts(&plan)?;

        let mut opened: Vec<Option<Target>> = Vec::with_capacity(plan.len());
        for (fd, planned) in &plan {
            opened.push(match planned {
                Planned::Read(path) => {
                    let file = tokio::fs::File::open(path)
                        .await
                        .map_err(|source| ExecutionError::Redirect {
                            path: path.clone(),
                            source,
                        })?;
                    trace!(fd, path = %path.display(), "redirect input");
                    Some(Target::Input(InputHandle::from_reader(file)))
                }
                _ => None,
            });
        }
        for ((fd, planned), slot) in plan.iter().zip(opened.iter_mut()) {
            if let Planned::Write { path, append } = planned {
                let file = OpenOptions::new()
                    .write(true)
                    .create(true)
                    .append(*append)
                    .truncate(!*append)
                    .open(path)
                    .await
                    .map_err(|source| ExecutionError::Redirect {
                        path: path.clone(),
                        source,
                    })?;
                trace!(fd, path = %path.display(), append, "redirect output");
                let handle = OutputHandle::from_writer(file);
                self.files.push(handle.clone());
                *slot = Some(Target::Output(handle));
            }
        }

        for ((fd, planned), target) in plan.iter().zip(opened) {
            self.slots[*fd] = match (target, planned) {
                (Some(target), _) => target,
                (None, Planned::Dup(source)) => {
                    trace!(fd, source, "duplicate descriptor");
                    self.slots[*source].clone()
                }
                (None, _) => continue,
            };
        }
        Ok(())
    }

    async fn plan(&self, redirects: &[Redirect], shell: &mut Shell) -> Result<Vec<(usize, Planned)>> {
        let mut plan = Vec::with_capacity(redirects.len());
        for redirect in redirects {
            let fd = usize::from(redirect.fd);
            if fd > 2 {
                return Err(ExecutionError::BadDescriptor(redirect.fd).into());
            }
            let planned = match &redirect.op {
                RedirectOp::Read(word) => {
                    let target = shell.expand_exactly_one(word, &self.base).await?;
                    Planned::Read(resolve_path(shell.cwd(), &target))
                }
                RedirectOp::Write(word) | RedirectOp::Append(word) => {
                    let target = shell.expand_exactly_one(word, &self.base).await?;
                    Planned::Write {
                        path: resolve_path(shell.cwd(), &target),
                        append: matches!(redirect.op, RedirectOp::Append(_)),
                    }
                }
                RedirectOp::Dup(from) => {
                    if *from > 2 {
                        return Err(ExecutionError::BadDescriptor(*from).into());
                    }
                    Planned::Dup(usize::from(*from))
                }
            };
            plan.push((fd, planned));
        }
        Ok(plan)
    }

    /// Streams for the command. A descriptor redirected to the wrong
    /// direction behaves as a null device.
    pub(super) fn io(&self) -> Io {
        let input = |target: &Target| match target {
            Target::Input(handle) => handle.clone(),
            Target::Output(_) => InputHandle::Null,
        };
        let output = |target: &Target| match target {
            Target::Output(handle) => handle.clone(),
            Target::Input(_) => OutputHandle::Null,
        };
        Io {
            stdin: input(&self.slots[0]),
            stdout: output(&self.slots[1]),
            stderr: output(&self.slots[2]),
        }
    }

    /// Flush and close every file this table opened.
    pub(super) async fn close(self) -> Result<()> {
        let mut first_error = None;
        for file in &self.files {
            if let Err(err) = file.shutdown().await {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}

/// The same file may not be both read and written by one command.
fn check_conflicts(plan: &[(usize, Planned)]) -> Result<()> {
    let files: Vec<(&Path, bool)> = plan.iter().filter_map(|(_, p)| p.file()).collect();
    for (i, (path, write)) in files.iter().enumerate() {
        if files[i + 1..]
            .iter()
            .any(|(other, other_write)| other == path && other_write != write)
        {
            return Err(ExecutionError::ReadWriteConflict(path.to_path_buf()).into());
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::error::ExecutionError;
    use crate::{Error, ShellBuilder};

    #[tokio::test]
    async fn test_output_redirect_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = ShellBuilder::new().cwd(dir.path()).build();
        shell.exec("echo one > out.txt; echo two >> out.txt").await.unwrap();
        let content = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(content, "one\ntwo\n");

        shell.exec("echo three > out.txt").await.unwrap();
        let content = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(content, "three\n");
    }

    #[tokio::test]
    async fn test_input_redirect() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("in.txt"), "from file\n").unwrap();
        let mut shell = ShellBuilder::new().cwd(dir.path()).build();
        let result = shell.exec("cat < in.txt").await.unwrap();
        assert_eq!(result.stdout, "from file\n");
    }

    #[tokio::test]
    async fn test_dup_order_matters() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = ShellBuilder::new().cwd(dir.path()).build();

        let result = shell.exec("nope-xyz > both.txt 2>&1").await.unwrap();
        assert_eq!(result.stderr, "");
        let content = std::fs::read_to_string(dir.path().join("both.txt")).unwrap();
        assert!(content.contains("command not found"));

        let result = shell.exec("nope-xyz 2>&1 > only.txt").await.unwrap();
        assert!(result.stdout.contains("command not found"));
        let content = std::fs::read_to_string(dir.path().join("only.txt")).unwrap();
        assert_eq!(content, "");
    }

    #[tokio::test]
    async fn test_redirect_both() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = ShellBuilder::new().cwd(dir.path()).build();
        shell.exec("{ echo out; nope-xyz; } &> all.txt").await.unwrap();
        let content = std::fs::read_to_string(dir.path().join("all.txt")).unwrap();
        assert!(content.starts_with("out\n"));
        assert!(content.contains("command not found"));
    }

    #[tokio::test]
    async fn test_compound_redirect() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = ShellBuilder::new().cwd(dir.path()).build();
        shell
            .exec("for i in 1 2 3; do echo $i; done > loop.txt")
            .await
            .unwrap();
        let content = std::fs::read_to_string(dir.path().join("loop.txt")).unwrap();
        assert_eq!(content, "1\n2\n3\n");
    }

    #[tokio::test]
    async fn test_read_write_conflict() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("same.txt"), "keep\n").unwrap();
        let mut shell = ShellBuilder::new().cwd(dir.path()).build();
        let err = shell.exec("cat < same.txt > same.txt").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Execution(ExecutionError::ReadWriteConflict(_))
        ));
        let content = std::fs::read_to_string(dir.path().join("same.txt")).unwrap();
        assert_eq!(content, "keep\n");
    }

    #[tokio::test]
    async fn test_write_before_read_conflict_leaves_file_intact() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("same.txt"), "keep\n").unwrap();
        let mut shell = ShellBuilder::new().cwd(dir.path()).build();
        let err = shell.exec("cat > same.txt < same.txt").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Execution(ExecutionError::ReadWriteConflict(_))
        ));
        let content = std::fs::read_to_string(dir.path().join("same.txt")).unwrap();
        assert_eq!(content, "keep\n");

        // nothing is created either
        let err = shell.exec("echo x > fresh.txt < missing.txt").await.unwrap_err();
        assert!(matches!(err, Error::Execution(ExecutionError::Redirect { .. })));
        assert!(!dir.path().join("fresh.txt").exists());
    }

    #[tokio::test]
    async fn test_missing_input_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = ShellBuilder::new().cwd(dir.path()).build();
        let err = shell.exec("cat < missing.txt").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Execution(ExecutionError::Redirect { .. })
        ));
    }

    #[tokio::test]
    async fn test_ambiguous_redirect() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = ShellBuilder::new().cwd(dir.path()).build();
        let err = shell.exec("f='a b'; echo x > $f").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Expansion(crate::error::ExpansionError::FieldCount { .. })
        ));
    }
}

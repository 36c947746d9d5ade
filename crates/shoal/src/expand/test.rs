//! `[[ ]]` evaluation
//!
//! Operands are expanded without field splitting or globbing. File
//! predicates on a path that does not exist are false rather than errors.

use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use futures_util::future::BoxFuture;
use regex::Regex;
use tracing::trace;

use crate::builtins::resolve_path;
use crate::error::{Result, TestError};
use crate::io::Io;
use crate::parser::{parse_arithmetic, BinaryTest, Tester, UnaryTest};
use crate::shell::{Environment, Shell};

/// Access bit a permission test looks for.
#[derive(Debug, Clone, Copy)]
enum Access {
    Read,
    Write,
    Execute,
}

/// Metadata of `path`, `None` when there is nothing at that path.
async fn stat(path: &Path, follow: bool) -> Result<Option<Metadata>> {
    let result = if follow {
        tokio::fs::metadata(path).await
    } else {
        tokio::fs::symlink_metadata(path).await
    };
    match result {
        Ok(meta) => Ok(Some(meta)),
        Err(err) if is_missing(&err) => Ok(None),
        Err(source) => Err(TestError::Stat {
            path: path.to_path_buf(),
            source,
        }
        .into()),
    }
}

fn is_missing(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::NotFound {
        return true;
    }
    #[cfg(unix)]
    {
        // a path component that is not a directory
        err.raw_os_error() == Some(nix::errno::Errno::ENOTDIR as i32)
    }
    #[cfg(not(unix))]
    {
        false
    }
}

#[cfg(unix)]
fn has_access(meta: &Metadata, access: Access) -> bool {
    use std::os::unix::fs::MetadataExt;

    let mode = meta.mode();
    let uid = nix::unistd::getuid().as_raw();
    let gid = nix::unistd::getgid().as_raw();
    if uid == 0 {
        // root reads and writes anything, executes if any x bit is set
        return match access {
            Access::Read | Access::Write => true,
            Access::Execute => mode & 0o111 != 0 || meta.is_dir(),
        };
    }
    let shift = if meta.uid() == uid {
        6
    } else if meta.gid() == gid {
        3
    } else {
        0
    };
    let bit = match access {
        Access::Read => 0o4,
        Access::Write => 0o2,
        Access::Execute => 0o1,
    };
    mode & (bit << shift) != 0
}

#[cfg(not(unix))]
fn has_access(meta: &Metadata, access: Access) -> bool {
    match access {
        Access::Read => true,
        Access::Write => !meta.permissions().readonly(),
        Access::Execute => meta.is_dir(),
    }
}

fn modified(meta: &Metadata) -> Option<SystemTime> {
    meta.modified().ok()
}

#[cfg(unix)]
fn same_file(a: &Metadata, b: &Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

impl Shell {
    /// Evaluate a `[[ ]]` condition.
    pub fn eval_test<'a>(&'a mut self, test: &'a Tester, io: &'a Io) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let result = match test {
                Tester::Single(word) => !self.expand_single(word, io).await?.is_empty(),
                Tester::Not(inner) => !self.eval_test(inner, io).await?,
                Tester::And(lhs, rhs) => {
                    self.eval_test(lhs, io).await? && self.eval_test(rhs, io).await?
                }
                Tester::Or(lhs, rhs) => {
                    self.eval_test(lhs, io).await? || self.eval_test(rhs, io).await?
                }
                Tester::Unary(op, word) => {
                    let operand = self.expand_single(word, io).await?;
                    self.unary_test(*op, &operand).await?
                }
                Tester::Binary(op, lhs, rhs) => {
                    let lhs = self.expand_single(lhs, io).await?;
                    let rhs = self.expand_single(rhs, io).await?;
                    self.binary_test(*op, &lhs, &rhs, io).await?
                }
            };
            trace!(result, "test");
            Ok(result)
        })
    }

    fn test_path(&self, operand: &str) -> PathBuf {
        resolve_path(self.cwd(), operand)
    }

    async fn unary_test(&mut self, op: UnaryTest, operand: &str) -> Result<bool> {
        let path = self.test_path(operand);
        let result = match op {
            UnaryTest::EmptyString => operand.is_empty(),
            UnaryTest::NonEmptyString => !operand.is_empty(),
            UnaryTest::VariableSet => self.resolve(operand).is_some(),
            UnaryTest::Symlink => {
                stat(&path, false).await?.is_some_and(|m| m.file_type().is_symlink())
            }
            UnaryTest::Exists => stat(&path, true).await?.is_some(),
            UnaryTest::RegularFile => stat(&path, true).await?.is_some_and(|m| m.is_file()),
            UnaryTest::Directory => stat(&path, true).await?.is_some_and(|m| m.is_dir()),
            UnaryTest::NonEmptyFile => stat(&path, true).await?.is_some_and(|m| m.len() > 0),
            UnaryTest::Readable => {
                stat(&path, true).await?.is_some_and(|m| has_access(&m, Access::Read))
            }
            UnaryTest::Writable => {
                stat(&path, true).await?.is_some_and(|m| has_access(&m, Access::Write))
            }
            UnaryTest::Executable => {
                stat(&path, true).await?.is_some_and(|m| has_access(&m, Access::Execute))
            }
        };
        Ok(result)
    }

    async fn binary_test(&mut self, op: BinaryTest, lhs: &str, rhs: &str, io: &Io) -> Result<bool> {
        let result = match op {
            BinaryTest::StrEq => lhs == rhs,
            BinaryTest::StrNe => lhs != rhs,
            BinaryTest::StrLt => lhs < rhs,
            BinaryTest::StrGt => lhs > rhs,
            BinaryTest::Matches => {
                let regex = Regex::new(rhs).map_err(|err| TestError::InvalidRegex {
                    pattern: rhs.to_string(),
                    message: err.to_string(),
                })?;
                regex.is_match(lhs)
            }
            BinaryTest::NumEq
            | BinaryTest::NumNe
            | BinaryTest::NumLt
            | BinaryTest::NumLe
            | BinaryTest::NumGt
            | BinaryTest::NumGe => {
                let a = self.eval_arith(&parse_arithmetic(lhs)?, io).await?;
                let b = self.eval_arith(&parse_arithmetic(rhs)?, io).await?;
                match op {
                    BinaryTest::NumEq => a == b,
                    BinaryTest::NumNe => a != b,
                    BinaryTest::NumLt => a < b,
                    BinaryTest::NumLe => a <= b,
                    BinaryTest::NumGt => a > b,
                    _ => a >= b,
                }
            }
            BinaryTest::NewerThan | BinaryTest::OlderThan => {
                let a = stat(&self.test_path(lhs), true).await?;
                let b = stat(&self.test_path(rhs), true).await?;
                let (newer, older) = match op {
                    BinaryTest::NewerThan => (a, b),
                    _ => (b, a),
                };
                match (newer, older) {
                    (Some(newer), Some(older)) => {
                        matches!((modified(&newer), modified(&older)), (Some(n), Some(o)) if n > o)
                    }
                    // an existing file is newer than a missing one
                    (Some(_), None) => true,
                    _ => false,
                }
            }
            BinaryTest::SameFile => {
                let a = stat(&self.test_path(lhs), true).await?;
                let b = stat(&self.test_path(rhs), true).await?;
                match (a, b) {
                    #[cfg(unix)]
                    (Some(a), Some(b)) => same_file(&a, &b),
                    #[cfg(not(unix))]
                    (Some(_), Some(_)) => {
                        tokio::fs::canonicalize(self.test_path(lhs)).await.ok()
                            == tokio::fs::canonicalize(self.test_path(rhs)).await.ok()
                    }
                    _ => false,
                }
            }
        };
        Ok(result)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::parser::{Executer, Parser};
    use crate::shell::Shell;
    use crate::{Io, ShellBuilder};

    async fn check(shell: &mut Shell, source: &str) -> bool {
        let script = Parser::new(source).parse().unwrap();
        let Some(Executer::Test(test)) = script.commands.first() else {
            panic!("expected a test");
        };
        shell.eval_test(test, &Io::default()).await.unwrap()
    }

    #[tokio::test]
    async fn test_string_tests() {
        let mut sh = ShellBuilder::new().build();
        sh.set_var("name", "shoal").unwrap();
        sh.set_var("empty", "").unwrap();
        assert!(check(&mut sh, "[[ $name == shoal ]]").await);
        assert!(check(&mut sh, "[[ $name != other ]]").await);
        assert!(check(&mut sh, "[[ abc < abd ]]").await);
        assert!(check(&mut sh, "[[ -z $empty ]]").await);
        assert!(check(&mut sh, "[[ -n $name ]]").await);
        assert!(!check(&mut sh, "[[ $empty ]]").await);
        assert!(check(&mut sh, "[[ -v name ]]").await);
        assert!(!check(&mut sh, "[[ -v nope ]]").await);
    }

    #[tokio::test]
    async fn test_numeric_and_regex() {
        let mut sh = ShellBuilder::new().build();
        sh.set_var("re", "^[a-z]+[0-9]+$").unwrap();
        sh.set_var("digits", "^[0-9]+$").unwrap();
        assert!(check(&mut sh, "[[ 10 -gt 9 ]]").await);
        assert!(check(&mut sh, "[[ 2+2 -eq 4 ]]").await);
        assert!(!check(&mut sh, "[[ 1 -ge 2 ]]").await);
        assert!(check(&mut sh, "[[ abc123 =~ $re ]]").await);
        assert!(!check(&mut sh, "[[ abc =~ $digits ]]").await);
    }

    #[tokio::test]
    async fn test_logical_operators() {
        let mut sh = ShellBuilder::new().build();
        assert!(check(&mut sh, "[[ a == a && b == b ]]").await);
        assert!(check(&mut sh, "[[ a == b || b == b ]]").await);
        assert!(check(&mut sh, "[[ ! a == b ]]").await);
    }

    #[tokio::test]
    async fn test_file_predicates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("full"), "data").unwrap();
        std::fs::write(dir.path().join("empty"), "").unwrap();
        let mut sh = ShellBuilder::new().cwd(dir.path()).build();

        assert!(check(&mut sh, "[[ -e full ]]").await);
        assert!(check(&mut sh, "[[ -f full ]]").await);
        assert!(!check(&mut sh, "[[ -d full ]]").await);
        assert!(check(&mut sh, "[[ -d . ]]").await);
        assert!(check(&mut sh, "[[ -s full ]]").await);
        assert!(!check(&mut sh, "[[ -s empty ]]").await);
        assert!(check(&mut sh, "[[ -r full ]]").await);
        assert!(!check(&mut sh, "[[ -e missing ]]").await);
        assert!(!check(&mut sh, "[[ -f full/below ]]").await);
        assert!(check(&mut sh, "[[ full -ef ./full ]]").await);
        assert!(check(&mut sh, "[[ full -nt missing ]]").await);
        assert!(!check(&mut sh, "[[ full -ot missing ]]").await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("target"), "x").unwrap();
        std::os::unix::fs::symlink(dir.path().join("target"), dir.path().join("link")).unwrap();
        let mut sh = ShellBuilder::new().cwd(dir.path()).build();
        assert!(check(&mut sh, "[[ -L link ]]").await);
        assert!(!check(&mut sh, "[[ -L target ]]").await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dangling_symlink_is_a_link_but_does_not_exist() {
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("dangling")).unwrap();
        let mut sh = ShellBuilder::new().cwd(dir.path()).build();
        assert!(check(&mut sh, "[[ -L dangling ]]").await);
        assert!(!check(&mut sh, "[[ -e dangling ]]").await);
        assert!(!check(&mut sh, "[[ dangling -ef dangling ]]").await);
    }

    #[tokio::test]
    async fn test_invalid_regex_is_an_error() {
        let mut sh = ShellBuilder::new().build();
        sh.set_var("re", "(unclosed").unwrap();
        let script = Parser::new("[[ a =~ $re ]]").parse().unwrap();
        let Some(Executer::Test(test)) = script.commands.first() else {
            panic!("expected a test");
        };
        let err = sh.eval_test(test, &Io::default()).await.unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Test(crate::error::TestError::InvalidRegex { .. })
        ));
    }
}

//! Directory stack builtins - pushd, popd, dirs
//!
//! The stack lives in the shell; its top is always the working directory.

use async_trait::async_trait;

use super::navigation::check_dir;
use super::{Builtin, Context};
use crate::error::Result;
use crate::interpreter::ExitStatus;

/// Print the stack top first, on one line.
async fn print_stack(ctx: &Context<'_>) -> Result<()> {
    let line = ctx
        .shell
        .dirs()
        .map(|dir| dir.display().to_string())
        .collect::<Vec<_>>()
        .join(" ");
    ctx.stdout.write_str(&format!("{line}\n")).await?;
    Ok(())
}

/// The pushd builtin - push directory onto stack and cd.
///
/// Usage: pushd [dir]
///
/// Without args, swaps top two directories.
pub struct Pushd;

#[async_trait]
impl Builtin for Pushd {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExitStatus> {
        match ctx.args.first() {
            None => {
                if !ctx.shell.swap_dirs() {
                    return ctx.fail("pushd: no other directory").await;
                }
            }
            Some(target) => {
                let path = match check_dir(&ctx, "pushd", target).await? {
                    Ok(path) => path,
                    Err(status) => return Ok(status),
                };
                ctx.shell.push_dir(path);
            }
        }
        print_stack(&ctx).await?;
        Ok(ExitStatus::SUCCESS)
    }
}

/// The popd builtin - pop directory from stack and cd.
pub struct Popd;

#[async_trait]
impl Builtin for Popd {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExitStatus> {
        if ctx.shell.pop_dir().is_none() {
            return ctx.fail("popd: directory stack empty").await;
        }
        print_stack(&ctx).await?;
        Ok(ExitStatus::SUCCESS)
    }
}

/// The dirs builtin - display directory stack.
///
/// Usage: dirs [-c]
pub struct Dirs;

#[async_trait]
impl Builtin for Dirs {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExitStatus> {
        if ctx.args.first().is_some_and(|arg| arg == "-c") {
            while ctx.shell.dirs().nth(1).is_some() {
                // clearing keeps the working directory
                let cwd = ctx.shell.cwd().to_path_buf();
                ctx.shell.pop_dir();
                ctx.shell.set_cwd(cwd);
            }
            return Ok(ExitStatus::SUCCESS);
        }
        print_stack(&ctx).await?;
        Ok(ExitStatus::SUCCESS)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::ShellBuilder;

    #[tokio::test]
    async fn test_pushd_popd() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::create_dir(dir.path().join("b")).unwrap();
        let root = dir.path().display().to_string();
        let mut shell = ShellBuilder::new().cwd(dir.path()).build();

        let result = shell.exec("pushd a; pushd ../b; pwd").await.unwrap();
        assert_eq!(
            result.stdout,
            format!("{root}/a {root}\n{root}/b {root}/a {root}\n{root}/b\n")
        );

        let result = shell.exec("popd; pwd; dirs").await.unwrap();
        assert_eq!(
            result.stdout,
            format!("{root}/a {root}\n{root}/a\n{root}/a {root}\n")
        );

        let result = shell.exec("pushd; pwd").await.unwrap();
        assert_eq!(result.stdout, format!("{root} {root}/a\n{root}\n"));
    }

    #[tokio::test]
    async fn test_popd_empty_stack() {
        let mut shell = ShellBuilder::new().cwd("/").build();
        let result = shell.exec("popd").await.unwrap();
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.stderr, "popd: directory stack empty\n");
        let result = shell.exec("pushd").await.unwrap();
        assert_eq!(result.stderr, "pushd: no other directory\n");
    }

    #[tokio::test]
    async fn test_dirs_clear() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        let root = dir.path().display().to_string();
        let mut shell = ShellBuilder::new().cwd(dir.path()).build();
        let result = shell.exec("pushd a > /dev/null; dirs -c; dirs").await.unwrap();
        assert_eq!(result.stdout, format!("{root}/a\n"));
    }
}

//! Navigation builtins (cd, pwd)

use async_trait::async_trait;
use std::path::PathBuf;

use super::{resolve_path, Builtin, Context};
use crate::error::Result;
use crate::interpreter::ExitStatus;

/// The cd builtin - change directory.
///
/// With no argument changes to `$HOME`; `cd -` returns to `$OLDPWD` and
/// prints it. The shell updates `PWD` and `OLDPWD`.
pub struct Cd;

#[async_trait]
impl Builtin for Cd {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExitStatus> {
        let (target, announce) = match ctx.args.first().map(String::as_str) {
            Some("-") => match ctx.shell.var("OLDPWD") {
                Some(old) => (old, true),
                None => return ctx.fail("cd: OLDPWD not set").await,
            },
            Some(dir) => (dir.to_string(), false),
            None => match ctx.shell.var("HOME") {
                Some(home) => (home, false),
                None => return ctx.fail("cd: HOME not set").await,
            },
        };

        let path = match check_dir(&ctx, "cd", &target).await? {
            Ok(path) => path,
            Err(status) => return Ok(status),
        };
        if announce {
            ctx.stdout
                .write_str(&format!("{}\n", path.display()))
                .await?;
        }
        ctx.shell.set_cwd(path);
        Ok(ExitStatus::SUCCESS)
    }
}

/// Resolve `target` against the shell's directory and make sure it is a
/// directory. The inner error is the status after reporting why not.
pub(super) async fn check_dir(
    ctx: &Context<'_>,
    command: &str,
    target: &str,
) -> Result<std::result::Result<PathBuf, ExitStatus>> {
    let path = resolve_path(ctx.shell.cwd(), target);
    let message = match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_dir() => return Ok(Ok(path)),
        Ok(_) => "Not a directory".to_string(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            "No such file or directory".to_string()
        }
        Err(e) => e.to_string(),
    };
    let status = ctx.fail(format!("{command}: {target}: {message}")).await?;
    Ok(Err(status))
}

/// The pwd builtin - print working directory.
pub struct Pwd;

#[async_trait]
impl Builtin for Pwd {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExitStatus> {
        let cwd = ctx.shell.cwd().display().to_string();
        ctx.stdout.write_str(&format!("{cwd}\n")).await?;
        Ok(ExitStatus::SUCCESS)
    }
}

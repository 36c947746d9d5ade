//! Alias builtins (alias, unalias)

use async_trait::async_trait;

use super::{Builtin, Context};
use crate::error::Result;
use crate::interpreter::ExitStatus;

/// alias builtin - define or display aliases
///
/// Usage: alias [name[=text] ...]
pub struct Alias;

#[async_trait]
impl Builtin for Alias {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExitStatus> {
        if ctx.args.is_empty() {
            let mut output = String::new();
            for (name, text) in ctx.shell.aliases() {
                output.push_str(&format_alias(name, text));
            }
            ctx.stdout.write_str(&output).await?;
            return Ok(ExitStatus::SUCCESS);
        }

        let mut status = ExitStatus::SUCCESS;
        for arg in ctx.args {
            match arg.split_once('=') {
                Some((name, text)) if !name.is_empty() => ctx.shell.set_alias(name, text),
                _ => match ctx.shell.alias(arg) {
                    Some(text) => {
                        let line = format_alias(arg, text);
                        ctx.stdout.write_str(&line).await?;
                    }
                    None => status = ctx.fail(format!("alias: {arg}: not found")).await?,
                },
            }
        }
        Ok(status)
    }
}

fn format_alias(name: &str, text: &str) -> String {
    format!("alias {name}='{}'\n", text.replace('\'', "'\\''"))
}

/// unalias builtin - remove aliases
///
/// Usage: unalias -a | name ...
pub struct Unalias;

#[async_trait]
impl Builtin for Unalias {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExitStatus> {
        if ctx.args.first().is_some_and(|arg| arg == "-a") {
            let names: Vec<String> = ctx
                .shell
                .aliases()
                .into_iter()
                .map(|(name, _)| name.to_string())
                .collect();
            for name in names {
                ctx.shell.remove_alias(&name);
            }
            return Ok(ExitStatus::SUCCESS);
        }
        if ctx.args.is_empty() {
            return ctx.fail("unalias: usage: unalias [-a] name [name ...]").await;
        }

        let mut status = ExitStatus::SUCCESS;
        for name in ctx.args {
            if !ctx.shell.remove_alias(name) {
                status = ctx.fail(format!("unalias: {name}: not found")).await?;
            }
        }
        Ok(status)
    }
}

//! export builtin - mark variables for export

use async_trait::async_trait;

use super::{Builtin, Context};
use crate::error::Result;
use crate::interpreter::ExitStatus;
use crate::parser::is_identifier;

/// export builtin - mark variables for export to child processes
///
/// `export NAME=VALUE` assigns and exports, `export NAME` exports an
/// existing or future variable, and `export` or `export -p` lists the
/// exported variables in a form the shell can read back.
pub struct Export;

#[async_trait]
impl Builtin for Export {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExitStatus> {
        let names: Vec<&String> = ctx.args.iter().filter(|arg| *arg != "-p").collect();
        if names.is_empty() {
            let mut output = String::new();
            for (name, value) in ctx.shell.environment() {
                output.push_str(&format!("export {name}={}\n", single_quote(&value)));
            }
            ctx.stdout.write_str(&output).await?;
            return Ok(ExitStatus::SUCCESS);
        }

        let mut status = ExitStatus::SUCCESS;
        for arg in names {
            let (name, value) = match arg.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (arg.as_str(), None),
            };
            if !is_identifier(name) {
                status = ctx
                    .fail(format!("export: `{arg}': not a valid identifier"))
                    .await?;
                continue;
            }
            if let Some(value) = value {
                ctx.shell.set_var(name, value)?;
            }
            ctx.shell.export(name);
        }
        Ok(status)
    }
}

/// Quote `value` so that the shell reads it back unchanged.
fn single_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

//! Variable builtins

use async_trait::async_trait;

use super::{Builtin, Context};
use crate::error::{Error, ExpansionError, Result};
use crate::interpreter::ExitStatus;

/// unset builtin - remove variables
///
/// Unsetting a name that is not set succeeds. Special parameters such as
/// `$?` cannot be unset.
pub struct Unset;

#[async_trait]
impl Builtin for Unset {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExitStatus> {
        let mut status = ExitStatus::SUCCESS;
        for name in ctx.args.iter().filter(|arg| *arg != "-v") {
            match ctx.shell.unset_var(name) {
                Ok(()) => {}
                Err(Error::Expansion(ExpansionError::ReadOnly(_))) => {
                    status = ctx.fail(format!("unset: {name}: cannot unset")).await?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(status)
    }
}

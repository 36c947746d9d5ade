//! Status builtins (true, false, :)

use async_trait::async_trait;

use super::{Builtin, Context};
use crate::error::Result;
use crate::interpreter::ExitStatus;

/// The true builtin - always returns 0.
pub struct True;

#[async_trait]
impl Builtin for True {
    async fn execute(&self, _ctx: Context<'_>) -> Result<ExitStatus> {
        Ok(ExitStatus::SUCCESS)
    }
}

/// The false builtin - always returns 1.
pub struct False;

#[async_trait]
impl Builtin for False {
    async fn execute(&self, _ctx: Context<'_>) -> Result<ExitStatus> {
        Ok(ExitStatus::FAILURE)
    }
}

/// The colon builtin - ignores its arguments and succeeds.
///
/// Its arguments are still expanded, so `: ${x:=default}` assigns.
pub struct Colon;

#[async_trait]
impl Builtin for Colon {
    async fn execute(&self, _ctx: Context<'_>) -> Result<ExitStatus> {
        Ok(ExitStatus::SUCCESS)
    }
}

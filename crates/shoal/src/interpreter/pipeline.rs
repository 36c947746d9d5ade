//! Pipelines
//!
//! All stages run concurrently, connected by in-process pipes. Every stage
//! but the last runs in a subshell; the last runs in the current shell, so
//! `echo x | read v` leaves `v` set.

use futures_util::future::{join_all, BoxFuture};
use tracing::{debug, trace};

use super::{ExitStatus, Flow};
use crate::error::{Error, Result};
use crate::io::{pipe, Io};
use crate::parser::PipelineStage;
use crate::shell::Shell;

impl Shell {
    /// Status of a pipeline is the status of its last stage.
    pub(crate) async fn exec_pipeline(
        &mut self,
        stages: &[PipelineStage],
        io: &Io,
    ) -> Result<ExitStatus> {
        let Some((last, earlier)) = stages.split_last() else {
            return Ok(ExitStatus::SUCCESS);
        };
        debug!(stages = stages.len(), "pipeline");

        let mut futures: Vec<BoxFuture<'_, Result<Flow>>> = Vec::with_capacity(stages.len());
        let mut stdin = io.stdin.clone();
        for stage in earlier {
            let (writer, reader) = pipe();
            let stderr = if stage.merge_stderr {
                writer.clone()
            } else {
                io.stderr.clone()
            };
            let stage_io = Io {
                stdin: std::mem::replace(&mut stdin, reader),
                stdout: writer,
                stderr,
            };
            let mut shell = self.subshell()?;
            let command = &stage.command;
            futures.push(Box::pin(async move {
                let flow = shell.execute(command, &stage_io).await;
                // closes this stage's end of the pipe
                drop(stage_io);
                flow
            }));
        }

        let last_io = Io {
            stdin,
            stdout: io.stdout.clone(),
            stderr: io.stderr.clone(),
        };
        let this = &mut *self;
        futures.push(Box::pin(async move { this.execute(&last.command, &last_io).await }));

        let results = join_all(futures).await;
        let count = results.len();
        let mut status = ExitStatus::SUCCESS;
        for (index, result) in results.into_iter().enumerate() {
            let is_last = index + 1 == count;
            match result {
                Ok(flow) if is_last => status = flow.status(),
                Ok(_) => {}
                // the reader finished before this stage did
                Err(Error::Io(err)) if !is_last && err.kind() == std::io::ErrorKind::BrokenPipe => {
                    trace!(stage = index, status = %ExitStatus::BROKEN_PIPE, "broken pipe");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(status)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::ShellBuilder;

    #[tokio::test]
    async fn test_simple_pipeline() {
        let mut shell = ShellBuilder::new().build();
        let result = shell.exec("echo hello | cat").await.unwrap();
        assert_eq!(result.stdout, "hello\n");
    }

    #[tokio::test]
    async fn test_multi_stage_pipeline() {
        let mut shell = ShellBuilder::new().build();
        let result = shell.exec("echo data | cat | cat | cat").await.unwrap();
        assert_eq!(result.stdout, "data\n");
    }

    #[tokio::test]
    async fn test_status_is_last_stage() {
        let mut shell = ShellBuilder::new().build();
        assert_eq!(shell.exec("true | false").await.unwrap().exit_code, 1);
        assert_eq!(shell.exec("false | true").await.unwrap().exit_code, 0);
    }

    #[tokio::test]
    async fn test_last_stage_runs_in_current_shell() {
        let mut shell = ShellBuilder::new().build();
        let result = shell.exec("echo value | read v; echo $v").await.unwrap();
        assert_eq!(result.stdout, "value\n");
    }

    #[tokio::test]
    async fn test_earlier_stages_are_isolated() {
        let mut shell = ShellBuilder::new().build();
        let result = shell.exec("x=1; x=2 | true; echo $x").await.unwrap();
        assert_eq!(result.stdout, "1\n");
    }

    #[tokio::test]
    async fn test_merge_stderr() {
        let mut shell = ShellBuilder::new().build();
        let result = shell
            .exec("missing-command-xyz |& cat")
            .await
            .unwrap();
        assert!(result.stdout.contains("command not found"));
        assert_eq!(result.stderr, "");
    }

    #[tokio::test]
    async fn test_large_output_through_pipe() {
        let mut shell = ShellBuilder::new().build();
        let result = shell
            .exec("for i in {1..20000}; do echo line$i; done | cat")
            .await
            .unwrap();
        assert_eq!(result.stdout.lines().count(), 20000);
    }
}

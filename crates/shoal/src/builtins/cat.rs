//! cat builtin command

use async_trait::async_trait;

use super::{resolve_path, Builtin, Context};
use crate::error::Result;
use crate::interpreter::ExitStatus;
use crate::io::InputHandle;

const CHUNK: usize = 8 * 1024;

/// The cat builtin command.
///
/// Copies each file, or stdin for `-` and when no files are given, to
/// stdout as it is read. A missing file is reported and the rest are
/// still copied.
pub struct Cat;

#[async_trait]
impl Builtin for Cat {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExitStatus> {
        let mut number_lines = false;
        let mut files: Vec<&str> = Vec::new();
        let mut options_done = false;

        for arg in ctx.args {
            match arg.as_str() {
                "--" if !options_done => options_done = true,
                "-n" if !options_done => number_lines = true,
                "-u" if !options_done => {}
                _ => files.push(arg),
            }
        }
        if files.is_empty() {
            files.push("-");
        }

        let mut numbering = number_lines.then(LineNumbers::default);
        let mut status = ExitStatus::SUCCESS;
        for file in files {
            let input = if file == "-" {
                ctx.stdin.clone()
            } else {
                let path = resolve_path(ctx.shell.cwd(), file);
                match tokio::fs::File::open(&path).await {
                    Ok(handle) => InputHandle::from_reader(handle),
                    Err(e) => {
                        status = ctx.fail(format!("cat: {file}: {e}")).await?;
                        continue;
                    }
                }
            };
            if let Err(e) = copy(&ctx, &input, numbering.as_mut()).await {
                if e.kind() == std::io::ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
                status = ctx.fail(format!("cat: {file}: {e}")).await?;
            }
        }
        Ok(status)
    }
}

async fn copy(
    ctx: &Context<'_>,
    input: &InputHandle,
    mut numbering: Option<&mut LineNumbers>,
) -> std::io::Result<()> {
    let mut buf = vec![0u8; CHUNK];
    loop {
        let n = input.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        match numbering.as_deref_mut() {
            Some(numbers) => ctx.stdout.write_all(&numbers.apply(&buf[..n])).await?,
            None => ctx.stdout.write_all(&buf[..n]).await?,
        }
    }
}

/// `-n` state carried across chunks and files.
#[derive(Default)]
struct LineNumbers {
    line: usize,
    mid_line: bool,
}

impl LineNumbers {
    fn apply(&mut self, chunk: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(chunk.len() + 16);
        for &byte in chunk {
            if !self.mid_line {
                self.line += 1;
                out.extend_from_slice(format!("{:>6}\t", self.line).as_bytes());
                self.mid_line = true;
            }
            out.push(byte);
            if byte == b'\n' {
                self.mid_line = false;
            }
        }
        out
    }
}

//! External commands
//!
//! A command name that is not a builtin goes to the shell's
//! [`CommandFinder`]. The default [`PathFinder`] searches `$PATH` and runs
//! hits as host processes through [`ProcessRunner`]; an embedding host can
//! replace either half to sandbox or virtualize command execution.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::builtins::{resolve_path, Builtin};
use crate::interpreter::ExitStatus;
use crate::io::{pipe, InputHandle, OutputHandle};
use crate::shell::Shell;

/// What a command name refers to.
#[derive(Clone)]
pub enum CommandKind {
    Builtin(Arc<dyn Builtin>),
    /// Executable file on the host
    External(PathBuf),
}

impl std::fmt::Debug for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandKind::Builtin(_) => write!(f, "Builtin"),
            CommandKind::External(path) => write!(f, "External({})", path.display()),
        }
    }
}

/// Everything needed to start an external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    /// Name the command was invoked as
    pub name: String,
    pub args: Vec<String>,
    /// The complete environment; nothing is inherited from the host
    pub env: Vec<(String, String)>,
    pub cwd: PathBuf,
}

/// Resolves command names that are not registered builtins.
pub trait CommandFinder: Send + Sync {
    fn find(&self, name: &str, shell: &Shell) -> Option<CommandKind>;

    /// Runner for a command this finder resolved to [`CommandKind::External`].
    fn runner(&self, invocation: Invocation) -> Box<dyn CommandRunner> {
        Box::new(ProcessRunner::new(invocation))
    }
}

/// A started or startable external command.
#[async_trait]
pub trait CommandRunner: Send {
    fn set_stdin(&mut self, stdin: InputHandle);
    fn set_stdout(&mut self, stdout: OutputHandle);
    fn set_stderr(&mut self, stderr: OutputHandle);

    /// Route stdout into a fresh pipe and return its reading end.
    fn stdout_pipe(&mut self) -> InputHandle {
        let (writer, reader) = pipe();
        self.set_stdout(writer);
        reader
    }

    /// Route stderr into a fresh pipe and return its reading end.
    fn stderr_pipe(&mut self) -> InputHandle {
        let (writer, reader) = pipe();
        self.set_stderr(writer);
        reader
    }

    async fn start(&mut self) -> io::Result<()>;

    /// Wait for exit. All output is delivered when this returns.
    async fn wait(&mut self) -> io::Result<ExitStatus>;

    async fn run(&mut self) -> io::Result<ExitStatus> {
        self.start().await?;
        self.wait().await
    }

    /// Status once the command has been waited for.
    fn exit_status(&self) -> Option<ExitStatus>;

    fn pid(&self) -> Option<u32>;
}

/// Finder that searches the directories in the shell's `$PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathFinder;

impl CommandFinder for PathFinder {
    fn find(&self, name: &str, shell: &Shell) -> Option<CommandKind> {
        if name.is_empty() {
            return None;
        }
        if name.contains('/') {
            // an explicit path is taken as is; spawn reports why it fails
            let path = resolve_path(shell.cwd(), name);
            return path.is_file().then_some(CommandKind::External(path));
        }
        let search = shell.var("PATH")?;
        search
            .split(':')
            .map(|dir| if dir.is_empty() { "." } else { dir })
            .map(|dir| resolve_path(shell.cwd(), dir).join(name))
            .find(|candidate| is_executable(candidate))
            .map(CommandKind::External)
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Runs an external command as a host process.
///
/// Streams the host already owns are handed to the child directly; any
/// other handle is connected through a pipe and a copy task.
pub struct ProcessRunner {
    invocation: Invocation,
    stdin: InputHandle,
    stdout: OutputHandle,
    stderr: OutputHandle,
    child: Option<Child>,
    feeder: Option<JoinHandle<io::Result<()>>>,
    pumps: Vec<JoinHandle<io::Result<()>>>,
    status: Option<ExitStatus>,
    pid: Option<u32>,
}

impl ProcessRunner {
    pub fn new(invocation: Invocation) -> Self {
        Self {
            invocation,
            stdin: InputHandle::Null,
            stdout: OutputHandle::Null,
            stderr: OutputHandle::Null,
            child: None,
            feeder: None,
            pumps: Vec::new(),
            status: None,
            pid: None,
        }
    }
}

fn input_stdio(handle: &InputHandle) -> Stdio {
    match handle {
        InputHandle::Null => Stdio::null(),
        InputHandle::Inherit => Stdio::inherit(),
        InputHandle::Stream(_) => Stdio::piped(),
    }
}

/// `host` is the handle the child may inherit directly in this slot.
fn output_stdio(handle: &OutputHandle, host: &OutputHandle) -> Stdio {
    match (handle, host) {
        (OutputHandle::Null, _) => Stdio::null(),
        (OutputHandle::Stdout, OutputHandle::Stdout) | (OutputHandle::Stderr, OutputHandle::Stderr) => {
            Stdio::inherit()
        }
        _ => Stdio::piped(),
    }
}

async fn feed(input: InputHandle, mut pipe: tokio::process::ChildStdin) -> io::Result<()> {
    let mut buf = vec![0u8; 8192];
    loop {
        let n = input.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        pipe.write_all(&buf[..n]).await?;
    }
    pipe.shutdown().await
}

async fn pump(mut reader: impl AsyncRead + Unpin, output: OutputHandle) -> io::Result<()> {
    let mut buf = vec![0u8; 8192];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        output.write_all(&buf[..n]).await?;
    }
}

fn status_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or_else(|| {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            128 + status.signal().unwrap_or(0)
        }
        #[cfg(not(unix))]
        {
            -1
        }
    })
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    fn set_stdin(&mut self, stdin: InputHandle) {
        self.stdin = stdin;
    }

    fn set_stdout(&mut self, stdout: OutputHandle) {
        self.stdout = stdout;
    }

    fn set_stderr(&mut self, stderr: OutputHandle) {
        self.stderr = stderr;
    }

    async fn start(&mut self) -> io::Result<()> {
        let invocation = &self.invocation;
        debug!(
            program = %invocation.program.display(),
            args = invocation.args.len(),
            "spawning process"
        );

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .env_clear()
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&invocation.cwd)
            .stdin(input_stdio(&self.stdin))
            .stdout(output_stdio(&self.stdout, &OutputHandle::Stdout))
            .stderr(output_stdio(&self.stderr, &OutputHandle::Stderr))
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;
        self.pid = child.id();

        if let Some(pipe) = child.stdin.take() {
            self.feeder = Some(tokio::spawn(feed(self.stdin.clone(), pipe)));
        }
        if let Some(out) = child.stdout.take() {
            self.pumps.push(tokio::spawn(pump(out, self.stdout.clone())));
        }
        if let Some(err) = child.stderr.take() {
            self.pumps.push(tokio::spawn(pump(err, self.stderr.clone())));
        }
        self.child = Some(child);
        Ok(())
    }

    async fn wait(&mut self) -> io::Result<ExitStatus> {
        if let Some(status) = self.status {
            return Ok(status);
        }
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| io::Error::other("process was not started"))?;
        let exit = child.wait().await?;

        // whatever the child did not read stays in the handle
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
        for pump in self.pumps.drain(..) {
            match pump.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) if err.kind() == io::ErrorKind::BrokenPipe => {
                    trace!("output reader went away");
                }
                Ok(Err(err)) => return Err(err),
                Err(err) => warn!(error = %err, "output copy task failed"),
            }
        }

        let status = ExitStatus(status_code(exit));
        trace!(pid = ?self.pid, %status, "process exited");
        self.status = Some(status);
        Ok(status)
    }

    fn exit_status(&self) -> Option<ExitStatus> {
        self.status
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }
}

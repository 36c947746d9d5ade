//! Stream handles for commands
//!
//! Every command runs with three logical streams. A handle is either a
//! null device, the host process's own stream, or a shared async stream
//! (a pipe end, a redirected file, a capture buffer). Handles are cheap to
//! clone; a stream closes once the last clone of its handle is dropped,
//! which is how the reading end of a pipe sees EOF.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Buffer size of an in-process pipe.
pub const PIPE_CAPACITY: usize = 64 * 1024;

pub type BoxReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Where a command reads its input from.
#[derive(Clone, Default)]
pub enum InputHandle {
    /// Always at EOF
    #[default]
    Null,
    /// The host process's stdin
    Inherit,
    Stream(Arc<Mutex<BoxReader>>),
}

/// Where a command writes an output stream to.
#[derive(Clone, Default)]
pub enum OutputHandle {
    /// Discards everything
    #[default]
    Null,
    /// The host process's stdout
    Stdout,
    /// The host process's stderr
    Stderr,
    Stream(Arc<Mutex<BoxWriter>>),
}

impl std::fmt::Debug for InputHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputHandle::Null => write!(f, "Null"),
            InputHandle::Inherit => write!(f, "Inherit"),
            InputHandle::Stream(_) => write!(f, "Stream"),
        }
    }
}

impl std::fmt::Debug for OutputHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputHandle::Null => write!(f, "Null"),
            OutputHandle::Stdout => write!(f, "Stdout"),
            OutputHandle::Stderr => write!(f, "Stderr"),
            OutputHandle::Stream(_) => write!(f, "Stream"),
        }
    }
}

impl InputHandle {
    pub fn from_reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        InputHandle::Stream(Arc::new(Mutex::new(Box::new(reader))))
    }

    /// Read some bytes; `Ok(0)` is EOF.
    pub async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            InputHandle::Null => Ok(0),
            InputHandle::Inherit => tokio::io::stdin().read(buf).await,
            InputHandle::Stream(reader) => reader.lock().await.read(buf).await,
        }
    }

    /// Read everything up to EOF.
    pub async fn read_to_end(&self) -> io::Result<Vec<u8>> {
        let mut data = Vec::new();
        match self {
            InputHandle::Null => {}
            InputHandle::Inherit => {
                tokio::io::stdin().read_to_end(&mut data).await?;
            }
            InputHandle::Stream(reader) => {
                reader.lock().await.read_to_end(&mut data).await?;
            }
        }
        Ok(data)
    }
}

impl OutputHandle {
    pub fn from_writer(writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        OutputHandle::Stream(Arc::new(Mutex::new(Box::new(writer))))
    }

    /// Write all of `data` and flush it.
    pub async fn write_all(&self, data: &[u8]) -> io::Result<()> {
        match self {
            OutputHandle::Null => Ok(()),
            OutputHandle::Stdout => {
                let mut out = tokio::io::stdout();
                out.write_all(data).await?;
                out.flush().await
            }
            OutputHandle::Stderr => {
                let mut err = tokio::io::stderr();
                err.write_all(data).await?;
                err.flush().await
            }
            OutputHandle::Stream(writer) => {
                let mut writer = writer.lock().await;
                writer.write_all(data).await?;
                writer.flush().await
            }
        }
    }

    pub async fn write_str(&self, text: &str) -> io::Result<()> {
        self.write_all(text.as_bytes()).await
    }

    /// Flush and close the underlying stream. Other clones of the handle
    /// see later writes fail.
    pub async fn shutdown(&self) -> io::Result<()> {
        match self {
            OutputHandle::Stream(writer) => writer.lock().await.shutdown().await,
            _ => Ok(()),
        }
    }
}

/// Create an in-process pipe: the write end and the read end.
pub fn pipe() -> (OutputHandle, InputHandle) {
    let (writer, reader) = tokio::io::duplex(PIPE_CAPACITY);
    (
        OutputHandle::from_writer(writer),
        InputHandle::from_reader(reader),
    )
}

/// The three streams of a running command.
#[derive(Clone, Debug, Default)]
pub struct Io {
    pub stdin: InputHandle,
    pub stdout: OutputHandle,
    pub stderr: OutputHandle,
}

impl Io {
    /// The host process's own streams.
    pub fn inherit() -> Self {
        Self {
            stdin: InputHandle::Inherit,
            stdout: OutputHandle::Stdout,
            stderr: OutputHandle::Stderr,
        }
    }

    /// Same streams with stdout replaced.
    pub fn with_stdout(&self, stdout: OutputHandle) -> Self {
        Self {
            stdout,
            ..self.clone()
        }
    }
}

/// In-memory sink that collects everything written to it.
#[derive(Clone, Default)]
pub struct Capture {
    buffer: Arc<std::sync::Mutex<Vec<u8>>>,
}

impl Capture {
    pub fn new() -> Self {
        Self::default()
    }

    /// An output handle writing into this capture.
    pub fn handle(&self) -> OutputHandle {
        OutputHandle::from_writer(self.clone())
    }

    /// Captured bytes so far.
    pub fn bytes(&self) -> Vec<u8> {
        self.buffer
            .lock()
            .map(|b| b.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Captured output as text, invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes()).into_owned()
    }
}

impl AsyncWrite for Capture {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut buffer = self
            .buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        buffer.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

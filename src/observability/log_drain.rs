//! nginx log drain.
//!
//! # Responsibilities
//! - Create the named pipe nginx logs into, if missing
//! - Hold the read end open for the controller's whole lifetime
//! - Forward every line to an injected sink
//!
//! # Design Decisions
//! - A pipe nobody reads fills up and blocks nginx workers mid-request, so the
//!   reader is opened before nginx is started and never voluntarily closed
//! - On Linux the pipe is opened read-write; the drain then never sees EOF
//!   when nginx closes its end during a reload
//! - Any read error ends the drain with `Error::LogDrain`, which is fatal

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::unix::pipe;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};

/// Destination for forwarded log lines.
pub trait LineSink: Send + 'static {
    fn forward(&mut self, line: &str);
}

/// Re-emits lines through `tracing` under the `nginx` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LineSink for TracingSink {
    fn forward(&mut self, line: &str) {
        tracing::info!(target: "nginx", "{}", line);
    }
}

impl LineSink for mpsc::UnboundedSender<String> {
    fn forward(&mut self, line: &str) {
        let _ = self.send(line.to_string());
    }
}

/// Continuously drains a named pipe into a sink.
#[derive(Debug)]
pub struct LogDrain<S> {
    path: PathBuf,
    sink: S,
}

impl<S: LineSink> LogDrain<S> {
    pub fn new(path: &Path, sink: S) -> Self {
        Self {
            path: path.to_path_buf(),
            sink,
        }
    }

    /// Open the pipe and start draining in a background task.
    ///
    /// The read end is open by the time this returns, so nginx may be started
    /// immediately afterwards. Must be called from within a Tokio runtime.
    ///
    /// Creating the pipe blocks the calling worker on filesystem calls; call
    /// this during startup, before the runtime carries other work.
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> Result<JoinHandle<Result<()>>> {
        ensure_pipe(&self.path).map_err(|e| self.error(format!("creating pipe: {}", e)))?;
        let receiver = open(&self.path).map_err(|e| self.error(format!("opening pipe: {}", e)))?;

        tracing::info!(path = ?self.path, "Log drain started");
        Ok(tokio::spawn(self.run(receiver, shutdown)))
    }

    async fn run(mut self, receiver: pipe::Receiver, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        let mut reader = BufReader::new(receiver);
        let mut buf = Vec::with_capacity(4096);

        loop {
            buf.clear();
            let read = tokio::select! {
                read = reader.read_until(b'\n', &mut buf) => read,
                _ = shutdown.recv() => {
                    tracing::info!(path = ?self.path, "Log drain received shutdown signal, exiting loop");
                    return Ok(());
                }
            };

            match read {
                Ok(0) => {
                    // every writer went away; reopen so the next nginx can attach
                    tracing::debug!(path = ?self.path, "Log pipe reached EOF, reopening");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    let receiver = open(&self.path).map_err(|e| self.error(format!("reopening pipe: {}", e)))?;
                    reader = BufReader::new(receiver);
                }
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']);
                    if !line.is_empty() {
                        self.sink.forward(line);
                    }
                }
                Err(e) => {
                    tracing::error!(path = ?self.path, error = %e, "Log drain read failed");
                    return Err(self.error(e.to_string()));
                }
            }
        }
    }

    fn error(&self, reason: String) -> Error {
        Error::LogDrain {
            path: self.path.clone(),
            reason,
        }
    }
}

/// Create a FIFO at `path` unless one already exists.
///
/// Blocking. From async code after startup, wrap it in `spawn_blocking`.
pub fn ensure_pipe(path: &Path) -> std::io::Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.file_type().is_fifo() => Ok(()),
        Ok(_) => Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{:?} exists and is not a named pipe", path),
        )),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let c_path = CString::new(path.as_os_str().as_bytes())?;
            // SAFETY: c_path is a valid NUL-terminated string that outlives the call.
            let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) };
            if rc == 0 {
                tracing::info!(path = ?path, "Created log pipe");
                Ok(())
            } else {
                Err(std::io::Error::last_os_error())
            }
        }
        Err(e) => Err(e),
    }
}

#[cfg(target_os = "linux")]
fn open(path: &Path) -> std::io::Result<pipe::Receiver> {
    pipe::OpenOptions::new().read_write(true).open_receiver(path)
}

#[cfg(not(target_os = "linux"))]
fn open(path: &Path) -> std::io::Result<pipe::Receiver> {
    pipe::OpenOptions::new().open_receiver(path)
}

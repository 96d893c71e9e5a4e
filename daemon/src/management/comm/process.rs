use futures::future::join_all;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::management::console::ConsoleSink;
use crate::management::AdapterError;
use satisfactory_protocol::management::instance::{ConsoleLine, StreamKind};

pub struct ProcessStartInfo {
    pub target: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// pipe stdio into the host console instead of inheriting it
    pub redirect: bool,
}

/// A process spawned for an instance, either the server itself or its installer.
///
/// Dropping it does not kill the process.
pub struct InstanceProcess {
    instance: Uuid,
    process_id: Option<u32>,
    child: Child,
    stdin: Option<ChildStdin>,
    readers: Vec<JoinHandle<usize>>,
}

impl InstanceProcess {
    pub fn spawn(
        start_info: ProcessStartInfo,
        instance: Uuid,
        console: Arc<dyn ConsoleSink>,
    ) -> std::io::Result<Self> {
        let mut cmd = Command::new(&start_info.target);
        cmd.args(&start_info.args)
            .current_dir(&start_info.working_dir);
        if start_info.redirect {
            cmd.stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
        }

        let mut child = cmd.spawn()?;
        let process_id = child.id();
        info!(
            "instance(uuid={}) spawned {} (pid={:?})",
            instance,
            start_info.target.display(),
            process_id
        );

        // readers start before returning so early output is not lost
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_line_reader(
                stdout,
                StreamKind::Stdout,
                instance,
                console.clone(),
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_line_reader(
                stderr,
                StreamKind::Stderr,
                instance,
                console,
            ));
        }
        let stdin = child.stdin.take();

        Ok(InstanceProcess {
            instance,
            process_id,
            child,
            stdin,
            readers,
        })
    }

    pub fn id(&self) -> Option<u32> {
        self.process_id
    }

    pub fn instance(&self) -> Uuid {
        self.instance
    }

    pub fn is_embedded(&self) -> bool {
        self.stdin.is_some() || !self.readers.is_empty()
    }

    /// Hands out the server's stdin for sending console commands.
    pub fn take_console_writer(&mut self) -> Result<ConsoleWriter, AdapterError> {
        self.stdin
            .take()
            .map(|stdin| ConsoleWriter { stdin })
            .ok_or(AdapterError::NotEmbedded)
    }

    pub fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Waits for exit only; output may still be in flight.
    pub async fn wait_exit(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Waits for exit and for every output line to reach the console.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        let status = self.child.wait().await?;
        self.drain_output(None).await;
        Ok(status)
    }

    pub async fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill().await
    }

    /// Joins the output readers, returning how many lines they delivered.
    ///
    /// With a `limit`, readers still running afterwards are aborted; a child
    /// of the server holding the pipes open would otherwise keep them alive.
    pub async fn drain_output(&mut self, limit: Option<Duration>) -> usize {
        let readers: Vec<_> = self.readers.drain(..).collect();
        if readers.is_empty() {
            return 0;
        }
        let aborts: Vec<_> = readers.iter().map(JoinHandle::abort_handle).collect();
        let joined = match limit {
            Some(limit) => match tokio::time::timeout(limit, join_all(readers)).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(
                        "instance(uuid={}) output still open after exit, detaching readers",
                        self.instance
                    );
                    aborts.iter().for_each(|abort| abort.abort());
                    return 0;
                }
            },
            None => join_all(readers).await,
        };
        let delivered = joined.into_iter().filter_map(Result::ok).sum();
        debug!(
            "instance(uuid={}) delivered {} output lines",
            self.instance, delivered
        );
        delivered
    }
}

/// Write side of an embedded server console.
pub struct ConsoleWriter {
    stdin: ChildStdin,
}

impl ConsoleWriter {
    pub async fn send_line(&mut self, line: &str) -> Result<(), AdapterError> {
        let mut buf = Vec::with_capacity(line.len() + 2);
        buf.extend_from_slice(line.trim_end_matches(['\r', '\n']).as_bytes());
        let newline: &[u8] = if cfg!(windows) { b"\r\n" } else { b"\n" };
        buf.extend_from_slice(newline);
        self.stdin
            .write_all(&buf)
            .await
            .map_err(AdapterError::Process)?;
        self.stdin.flush().await.map_err(AdapterError::Process)
    }
}

/// Forwards every line of `stream` to the console until the stream closes.
fn spawn_line_reader<R>(
    stream: R,
    kind: StreamKind,
    instance: Uuid,
    console: Arc<dyn ConsoleSink>,
) -> JoinHandle<usize>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        let mut delivered = 0;
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    while matches!(buf.last(), Some(b'\n' | b'\r')) {
                        buf.pop();
                    }
                    // servers are not guaranteed to print utf-8
                    let text = String::from_utf8_lossy(&buf);
                    console.add_output(ConsoleLine::new(instance, kind, text));
                    delivered += 1;
                }
                Err(err) => {
                    warn!(
                        "instance(uuid={}) failed to read {:?}: {}",
                        instance, kind, err
                    );
                    break;
                }
            }
        }
        delivered
    })
}

//! Server process lifecycle management.
//!
//! Owns the single MCP server child process: spawning it with piped stdio,
//! draining its stderr in the background, and shutting it down (graceful
//! first, forced after a grace period). At most one child is alive per
//! supervisor; `start` always stops the previous one first.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

use super::diagnostics::StderrBuffer;
use super::errors::McpError;
use super::types::ServerConfig;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Default wait after spawning before the liveness check.
pub const DEFAULT_STARTUP_GRACE: Duration = Duration::from_secs(2);

/// Default wait for a graceful exit before force-killing.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// How long to wait for the stderr drain task to finish after the child exits.
const DRAIN_JOIN_TIMEOUT: Duration = Duration::from_millis(500);

// ─── Process State ───────────────────────────────────────────────────────────

/// Lifecycle of the supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running,
    Stopped,
}

/// A live child with its pipes and the task draining its stderr.
struct RunningServer {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    drain: JoinHandle<()>,
    pid: Option<u32>,
}

// ─── ProcessSupervisor ───────────────────────────────────────────────────────

/// Owns the MCP server child process and its pipes.
pub struct ProcessSupervisor {
    config: ServerConfig,
    startup_grace: Duration,
    shutdown_grace: Duration,
    stderr: StderrBuffer,
    server: Option<RunningServer>,
    state: ProcessState,
    /// Incremented on every successful start; sessions are tied to it.
    generation: u64,
}

impl ProcessSupervisor {
    /// Create a supervisor that will launch `config`, logging stderr into `stderr`.
    pub fn new(config: ServerConfig, stderr: StderrBuffer) -> Self {
        Self {
            config,
            startup_grace: DEFAULT_STARTUP_GRACE,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            stderr,
            server: None,
            state: ProcessState::NotStarted,
            generation: 0,
        }
    }

    /// Override the startup and shutdown grace periods.
    pub fn with_grace_periods(mut self, startup: Duration, shutdown: Duration) -> Self {
        self.startup_grace = startup;
        self.shutdown_grace = shutdown;
        self
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Whether a child process is currently tracked.
    pub fn is_tracking(&self) -> bool {
        self.server.is_some()
    }

    /// Generation of the current process; 0 before the first start.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// OS pid of the tracked child, if any.
    pub fn pid(&self) -> Option<u32> {
        self.server.as_ref().and_then(|s| s.pid)
    }

    pub fn stderr(&self) -> &StderrBuffer {
        &self.stderr
    }

    /// Check whether the tracked child has exited.
    ///
    /// Returns `true` when no child is tracked.
    pub fn has_exited(&mut self) -> bool {
        match self.server.as_mut() {
            Some(server) => match server.child.try_wait() {
                Ok(None) => false,
                Ok(Some(_)) => true,
                Err(_) => true, // can't poll, assume dead
            },
            None => true,
        }
    }

    /// Mutable access to the child's stdin and buffered stdout.
    pub(crate) fn pipes(&mut self) -> Option<(&mut ChildStdin, &mut BufReader<ChildStdout>)> {
        self.server
            .as_mut()
            .map(|server| (&mut server.stdin, &mut server.stdout))
    }

    // ─── Start ───────────────────────────────────────────────────────────

    /// Spawn the server, stopping any previously tracked instance first.
    ///
    /// Waits the startup grace period and fails with `SpawnFailed` (carrying
    /// the captured stderr) if the child has already exited by then.
    pub async fn start(&mut self) -> Result<(), McpError> {
        if self.server.is_some() {
            self.stop().await;
        }

        let command_line = self.config.display_command();
        tracing::info!(command = %command_line, "starting MCP server");
        self.stderr.clear();

        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args);
        for (key, value) in &self.config.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &self.config.cwd {
            cmd.current_dir(dir);
        }

        // Windows: prevent console window from appearing for child processes
        #[cfg(target_os = "windows")]
        {
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        cmd.stdin(std::process::Stdio::piped());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        cmd.kill_on_drop(true);

        let spawn_failed = |reason: String| McpError::SpawnFailed {
            command: command_line.clone(),
            reason,
            stderr: String::new(),
        };

        let mut child = cmd.spawn().map_err(|e| spawn_failed(format!("{e}")))?;
        let pid = child.id();

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| spawn_failed("failed to capture stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_failed("failed to capture stdout".into()))?;
        let stderr_pipe = child
            .stderr
            .take()
            .ok_or_else(|| spawn_failed("failed to capture stderr".into()))?;

        let drain = tokio::spawn(drain_stderr(stderr_pipe, self.stderr.clone()));

        sleep(self.startup_grace).await;

        match child.try_wait() {
            Ok(None) => {}
            Ok(Some(status)) => {
                join_drain(drain).await;
                self.state = ProcessState::Stopped;
                let stderr = self.stderr.snapshot();
                tracing::error!(
                    command = %command_line,
                    %status,
                    stderr = %stderr,
                    "MCP server exited during startup"
                );
                return Err(McpError::SpawnFailed {
                    command: command_line,
                    reason: format!("server exited during startup ({status})"),
                    stderr,
                });
            }
            Err(e) => {
                let _ = child.kill().await;
                join_drain(drain).await;
                self.state = ProcessState::Stopped;
                return Err(McpError::SpawnFailed {
                    command: command_line,
                    reason: format!("failed to poll server status: {e}"),
                    stderr: self.stderr.snapshot(),
                });
            }
        }

        self.generation += 1;
        self.server = Some(RunningServer {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            drain,
            pid,
        });
        self.state = ProcessState::Running;

        tracing::info!(
            pid = ?pid,
            generation = self.generation,
            "MCP server started"
        );
        Ok(())
    }

    // ─── Stop ────────────────────────────────────────────────────────────

    /// Shut the tracked server down. No-op when nothing is tracked.
    ///
    /// Closing stdin is the graceful termination request; the child is
    /// force-killed if it has not exited within the shutdown grace period.
    /// The stderr buffer is left intact so callers can still report it.
    pub async fn stop(&mut self) {
        let Some(server) = self.server.take() else {
            return;
        };
        self.state = ProcessState::Stopped;

        let RunningServer {
            mut child,
            stdin,
            stdout,
            drain,
            pid,
        } = server;

        tracing::info!(pid = ?pid, "stopping MCP server");
        drop(stdin);

        match timeout(self.shutdown_grace, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(pid = ?pid, %status, "MCP server exited");
            }
            Ok(Err(e)) => {
                tracing::warn!(pid = ?pid, error = %e, "failed waiting for MCP server; killing");
                let _ = child.kill().await;
            }
            Err(_) => {
                tracing::warn!(
                    pid = ?pid,
                    grace_ms = self.shutdown_grace.as_millis() as u64,
                    "MCP server did not exit in time; killing"
                );
                if let Err(e) = child.kill().await {
                    tracing::warn!(pid = ?pid, error = %e, "failed to kill MCP server");
                }
            }
        }

        drop(stdout);
        join_drain(drain).await;
    }
}

// ─── Stderr Drain ────────────────────────────────────────────────────────────

/// Read the child's stderr line by line until EOF so a full pipe never stalls it.
///
/// Lines are decoded lossily; a stray non-UTF-8 byte must not end the drain.
async fn drain_stderr(stderr: ChildStderr, sink: StderrBuffer) {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                tracing::debug!(stderr = %line, "MCP server stderr");
                sink.push(line);
            }
            Err(e) => {
                tracing::debug!(error = %e, "stderr drain stopped");
                break;
            }
        }
    }
}

/// Wait briefly for the drain task; abort it if a grandchild still holds the pipe.
async fn join_drain(drain: JoinHandle<()>) {
    let abort = drain.abort_handle();
    if timeout(DRAIN_JOIN_TIMEOUT, drain).await.is_err() {
        tracing::debug!("stderr drain still running after shutdown; aborting");
        abort.abort();
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

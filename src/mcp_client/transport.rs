//! JSON-RPC over stdio transport.
//!
//! Handles one request/response exchange at a time with the supervised
//! server process:
//! - Writing a single-line JSON-RPC request to stdin
//! - Reading exactly one response line from stdout under a deadline
//! - Classifying transport, protocol, and server-reported failures
//!
//! Any failure tears the process down so the next request starts clean.
//! The dispatcher never retries.

use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout};

use super::errors::McpError;
use super::lifecycle::{ProcessState, ProcessSupervisor};
use super::types::{JsonRpcRequest, JsonRpcResponse, ResponseOutcome};

/// Default request deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ─── RequestDispatcher ───────────────────────────────────────────────────────

/// Sends JSON-RPC requests to the server, one outstanding request at a time.
pub struct RequestDispatcher {
    supervisor: ProcessSupervisor,
    /// Last id handed out; ids start at 1 and are never reused.
    last_id: u64,
    timeout: Duration,
}

impl RequestDispatcher {
    pub fn new(supervisor: ProcessSupervisor, timeout: Duration) -> Self {
        Self {
            supervisor,
            last_id: 0,
            timeout,
        }
    }

    /// Id of the most recently sent request, 0 if none yet.
    pub fn last_request_id(&self) -> u64 {
        self.last_id
    }

    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    pub fn state(&self) -> ProcessState {
        self.supervisor.state()
    }

    /// Whether `generation` names the process that is alive right now.
    pub fn is_live_generation(&self, generation: u64) -> bool {
        self.supervisor.is_tracking() && self.supervisor.generation() == generation
    }

    pub fn generation(&self) -> u64 {
        self.supervisor.generation()
    }

    /// Tear the server process down.
    pub async fn shutdown(&mut self) {
        self.supervisor.stop().await;
    }

    fn next_request_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    /// Send a request and return the `result` payload of its response.
    ///
    /// Starts the server if none is running. On any failure the server is
    /// stopped before the error is returned; transport errors carry the
    /// stderr captured up to that point.
    pub async fn send(&mut self, method: &str, params: Value) -> Result<Value, McpError> {
        if !self.supervisor.is_tracking() {
            self.supervisor.start().await?;
        }

        let id = self.next_request_id();
        let request = JsonRpcRequest::new(id, method, params);

        match self.exchange(&request).await {
            Ok(result) => Ok(result),
            Err(e) => {
                self.supervisor.stop().await;
                let stderr = self.supervisor.stderr().snapshot();
                tracing::error!(
                    id,
                    method,
                    error = %e,
                    stderr = %stderr,
                    "JSON-RPC request failed; server stopped"
                );
                Err(e.with_stderr(stderr))
            }
        }
    }

    /// Write the request, read one line under the deadline, and classify it.
    async fn exchange(&mut self, request: &JsonRpcRequest) -> Result<Value, McpError> {
        let mut line = serde_json::to_string(request).map_err(|e| {
            McpError::transport(format!("failed to serialize request: {e}"))
        })?;
        tracing::debug!(id = request.id, method = %request.method, request = %line, "sending JSON-RPC request");
        line.push('\n');

        let deadline = self.timeout;
        let (stdin, stdout) = self
            .supervisor
            .pipes()
            .ok_or_else(|| McpError::transport("server is not running"))?;

        // Dropping the round trip on expiry cancels the pending read itself.
        let raw = match tokio::time::timeout(deadline, round_trip(stdin, stdout, &line)).await {
            Ok(read) => read?,
            Err(_) => {
                return Err(McpError::Timeout {
                    method: request.method.clone(),
                    id: request.id,
                    timeout_ms: deadline.as_millis() as u64,
                })
            }
        };

        let raw = raw.trim();
        if raw.is_empty() {
            return Err(McpError::transport("server returned an empty response line"));
        }
        if self.supervisor.has_exited() {
            return Err(McpError::transport("server exited while handling the request"));
        }

        tracing::debug!(id = request.id, response = %raw, "received JSON-RPC response");
        parse_response(request.id, raw)
    }
}

/// Write one line and read one line back.
async fn round_trip(
    stdin: &mut ChildStdin,
    stdout: &mut BufReader<ChildStdout>,
    line: &str,
) -> Result<String, McpError> {
    stdin
        .write_all(line.as_bytes())
        .await
        .map_err(|e| McpError::transport(format!("failed to write to stdin: {e}")))?;
    stdin
        .flush()
        .await
        .map_err(|e| McpError::transport(format!("failed to flush stdin: {e}")))?;

    let mut buf = Vec::new();
    let bytes_read = stdout
        .read_until(b'\n', &mut buf)
        .await
        .map_err(|e| McpError::transport(format!("failed to read from stdout: {e}")))?;

    if bytes_read == 0 {
        return Err(McpError::transport(
            "server stdout closed (process may have exited)",
        ));
    }
    // Invalid UTF-8 is left for the JSON parser to reject with the raw line.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

// ─── Response Helpers ────────────────────────────────────────────────────────

/// Parse a response line and extract its result, converting errors to `McpError`.
///
/// A response without an `id` is accepted positionally; one with a different
/// `id` than the request is rejected.
pub fn parse_response(expected_id: u64, raw: &str) -> Result<Value, McpError> {
    let response: JsonRpcResponse =
        serde_json::from_str(raw).map_err(|e| McpError::ProtocolError {
            reason: format!("invalid JSON-RPC response: {e}"),
            raw: Some(raw.to_string()),
        })?;

    if let Some(id) = response.id {
        if id != expected_id {
            return Err(McpError::ProtocolError {
                reason: format!("response id {id} does not match request id {expected_id}"),
                raw: Some(raw.to_string()),
            });
        }
    }

    match response.outcome {
        ResponseOutcome::Failure { error } => Err(McpError::ServerError {
            code: error.code,
            message: error.message,
            data: error.data,
        }),
        ResponseOutcome::Success { result } => Ok(result),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

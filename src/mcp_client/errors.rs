//! MCP Client error types.

use thiserror::Error;

use super::types::error_codes;

/// Errors that can occur during MCP client operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// The server process failed to start or exited during startup.
    #[error("failed to spawn server '{command}': {reason}{}", stderr_suffix(.stderr))]
    SpawnFailed {
        command: String,
        reason: String,
        stderr: String,
    },

    /// Pipe write/read failure, or the server exited mid-exchange.
    #[error("transport error: {reason}{}", stderr_suffix(.stderr))]
    TransportError { reason: String, stderr: String },

    /// No response line arrived within the request deadline.
    #[error("request '{method}' (id {id}) timed out after {timeout_ms}ms")]
    Timeout {
        method: String,
        id: u64,
        timeout_ms: u64,
    },

    /// Malformed JSON, mismatched id, or a missing field in a success response.
    #[error("protocol error: {reason}{}", raw_suffix(.raw))]
    ProtocolError { reason: String, raw: Option<String> },

    /// Server returned a JSON-RPC error response.
    #[error("server error [{code}]: {message}")]
    ServerError {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// The server kept requesting tool calls past the configured bound.
    #[error("tool call loop for message '{message_id}' exceeded {limit} iterations")]
    ToolLoopExceeded { message_id: String, limit: u32 },

    /// Configuration error (unreadable or invalid config file).
    #[error("config error: {reason}")]
    ConfigError { reason: String },
}

impl McpError {
    /// Build a transport error; stderr is attached later by the dispatcher.
    pub(crate) fn transport(reason: impl Into<String>) -> Self {
        McpError::TransportError {
            reason: reason.into(),
            stderr: String::new(),
        }
    }

    /// The JSON-RPC error code this failure maps to, if any.
    pub fn code(&self) -> Option<i64> {
        match self {
            McpError::SpawnFailed { .. }
            | McpError::TransportError { .. }
            | McpError::Timeout { .. } => Some(error_codes::TRANSPORT_ERROR),
            McpError::ProtocolError { .. } => Some(error_codes::PARSE_ERROR),
            McpError::ServerError { code, .. } => Some(*code),
            McpError::ToolLoopExceeded { .. } | McpError::ConfigError { .. } => None,
        }
    }

    /// Fill in captured stderr on errors that carry it, if still empty.
    pub(crate) fn with_stderr(mut self, captured: String) -> Self {
        if let McpError::TransportError { stderr, .. } | McpError::SpawnFailed { stderr, .. } =
            &mut self
        {
            if stderr.is_empty() {
                *stderr = captured;
            }
        }
        self
    }
}

/// Format a stderr suffix for error messages (empty string if no stderr).
fn stderr_suffix(stderr: &str) -> String {
    if stderr.trim().is_empty() {
        String::new()
    } else {
        format!(" | stderr: {}", stderr.trim())
    }
}

fn raw_suffix(raw: &Option<String>) -> String {
    match raw {
        Some(line) => format!(" | raw: {line}"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_includes_stderr() {
        let err = McpError::transport("server closed stdout").with_stderr("Traceback: boom".into());
        let text = err.to_string();
        assert!(text.contains("server closed stdout"));
        assert!(text.contains("| stderr: Traceback: boom"));
    }

    #[test]
    fn test_with_stderr_keeps_existing_capture() {
        let err = McpError::TransportError {
            reason: "eof".into(),
            stderr: "first".into(),
        }
        .with_stderr("second".into());
        assert!(err.to_string().contains("first"));
        assert!(!err.to_string().contains("second"));
    }

    #[test]
    fn test_empty_stderr_has_no_suffix() {
        let err = McpError::transport("eof");
        assert_eq!(err.to_string(), "transport error: eof");
    }

    #[test]
    fn test_codes() {
        assert_eq!(McpError::transport("x").code(), Some(-32000));
        let timeout = McpError::Timeout {
            method: "getCompletion".into(),
            id: 4,
            timeout_ms: 30_000,
        };
        assert_eq!(timeout.code(), Some(-32000));
        let parse = McpError::ProtocolError {
            reason: "invalid JSON".into(),
            raw: Some("not json".into()),
        };
        assert_eq!(parse.code(), Some(-32700));
        let remote = McpError::ServerError {
            code: -1,
            message: "bad state".into(),
            data: None,
        };
        assert_eq!(remote.code(), Some(-1));
        let looped = McpError::ToolLoopExceeded {
            message_id: "m1".into(),
            limit: 10,
        };
        assert_eq!(looped.code(), None);
    }

    #[test]
    fn test_protocol_error_shows_raw_line() {
        let err = McpError::ProtocolError {
            reason: "invalid JSON-RPC response".into(),
            raw: Some("hello from print()".into()),
        };
        assert!(err.to_string().contains("raw: hello from print()"));
    }
}

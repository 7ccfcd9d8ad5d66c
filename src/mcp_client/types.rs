//! Shared types for the MCP client.
//!
//! JSON-RPC 2.0 envelopes, the server launch configuration, and the payloads
//! of the session protocol (`createSession`, `addMessage`, `getCompletion`,
//! `callTool`).

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::McpError;

// ─── JSON-RPC 2.0 ───────────────────────────────────────────────────────────

/// Protocol version stamped on every outgoing request.
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 request message.
///
/// Field order matters only for readability of the wire log: `id` goes last
/// so each line reads `method → params → id`.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub method: String,
    pub params: Value,
    pub id: u64,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request.
    pub fn new(id: u64, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: method.to_string(),
            params,
            id,
        }
    }
}

/// JSON-RPC 2.0 response message.
///
/// `jsonrpc` and `id` are tolerated when missing; correlation is positional
/// and `id` is only checked when the server sends one.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(flatten)]
    pub outcome: ResponseOutcome,
}

/// The mutually exclusive payload of a response.
///
/// `Failure` is tried first so a response carrying `error` alongside a
/// `"result": null` is still classified as an error.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ResponseOutcome {
    Failure { error: JsonRpcError },
    Success { result: Value },
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    #[serde(default = "default_error_code")]
    pub code: i64,
    #[serde(default = "default_error_message")]
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

fn default_error_code() -> i64 {
    -1
}

fn default_error_message() -> String {
    "unknown error".to_string()
}

// ─── Session Protocol ────────────────────────────────────────────────────────

/// Method names consumed from the server.
pub mod methods {
    pub const CREATE_SESSION: &str = "createSession";
    pub const ADD_MESSAGE: &str = "addMessage";
    pub const GET_COMPLETION: &str = "getCompletion";
    pub const CALL_TOOL: &str = "callTool";
}

/// Author of a conversation message. The client only ever speaks as `user`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

/// Message body sent with `addMessage`.
#[derive(Debug, Clone, Serialize)]
pub struct NewMessage<'a> {
    pub role: Role,
    pub content: &'a str,
}

/// `createSession` result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResult {
    pub session_id: String,
}

/// `addMessage` result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMessageResult {
    pub message_id: String,
}

/// `getCompletion` result.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResult {
    pub completion: Completion,
}

/// One poll of a pending message: final text, or a tool call to resolve first.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_call: Option<ToolCall>,
}

/// A server request to run a named tool before the conversation continues.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default = "empty_arguments")]
    pub arguments: Value,
}

fn empty_arguments() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Decode a success payload into the shape a method is expected to return.
///
/// A missing or mistyped field in an otherwise successful response is a
/// protocol violation.
pub fn decode_result<T: DeserializeOwned>(method: &str, result: Value) -> Result<T, McpError> {
    serde_json::from_value(result.clone()).map_err(|e| McpError::ProtocolError {
        reason: format!("unexpected '{method}' result: {e}"),
        raw: Some(result.to_string()),
    })
}

// ─── Server Launch ───────────────────────────────────────────────────────────

/// How to launch the MCP server process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Working directory for the server process.
    #[serde(default)]
    pub cwd: Option<String>,
}

impl ServerConfig {
    /// The full command line, for log messages.
    pub fn display_command(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: default_python_command().to_string(),
            args: vec!["mcp_server.py".to_string()],
            env: HashMap::new(),
            cwd: None,
        }
    }
}

/// Platform-correct Python command.
///
/// macOS 12.3+ removed the `python` symlink; only `python3` exists.
/// Windows installs Python as `python.exe` via the official installer.
fn default_python_command() -> &'static str {
    if cfg!(target_os = "windows") {
        "python"
    } else {
        "python3"
    }
}

// ─── Error Codes ─────────────────────────────────────────────────────────────

/// JSON-RPC error codes the client produces or recognises.
pub mod error_codes {
    /// Invalid JSON was received.
    pub const PARSE_ERROR: i64 = -32700;
    /// The method does not exist or is not available.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Client-synthesized transport or timeout failure.
    pub const TRANSPORT_ERROR: i64 = -32000;
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = JsonRpcRequest::new(1, methods::CREATE_SESSION, serde_json::json!({}));
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(
            json,
            r#"{"jsonrpc":"2.0","method":"createSession","params":{},"id":1}"#
        );
    }

    #[test]
    fn test_response_success() {
        let json = r#"{"jsonrpc": "2.0", "id": 3, "result": {"sessionId": "abc"}}"#;
        let resp: JsonRpcResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.id, Some(3));
        match resp.outcome {
            ResponseOutcome::Success { result } => assert_eq!(result["sessionId"], "abc"),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn test_response_error_wins_over_null_result() {
        let json = r#"{
            "jsonrpc": "2.0",
            "id": 2,
            "result": null,
            "error": {"code": -32601, "message": "Method not found"}
        }"#;
        let resp: JsonRpcResponse = serde_json::from_str(json).unwrap();
        match resp.outcome {
            ResponseOutcome::Failure { error } => {
                assert_eq!(error.code, error_codes::METHOD_NOT_FOUND);
                assert_eq!(error.message, "Method not found");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_response_without_envelope_fields() {
        let resp: JsonRpcResponse =
            serde_json::from_str(r#"{"error":{"message":"bad state","code":-1}}"#).unwrap();
        assert!(resp.id.is_none());
        assert!(resp.jsonrpc.is_none());
        assert!(matches!(resp.outcome, ResponseOutcome::Failure { .. }));
    }

    #[test]
    fn test_error_object_defaults() {
        let resp: JsonRpcResponse = serde_json::from_str(r#"{"id":1,"error":{}}"#).unwrap();
        match resp.outcome {
            ResponseOutcome::Failure { error } => {
                assert_eq!(error.code, -1);
                assert_eq!(error.message, "unknown error");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_response_missing_both_is_rejected() {
        let parsed = serde_json::from_str::<JsonRpcResponse>(r#"{"jsonrpc":"2.0","id":1}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_completion_with_null_tool_call() {
        let result: CompletionResult = serde_json::from_value(serde_json::json!({
            "completion": {"content": "Sunny", "toolCall": null}
        }))
        .unwrap();
        assert_eq!(result.completion.content.as_deref(), Some("Sunny"));
        assert!(result.completion.tool_call.is_none());
    }

    #[test]
    fn test_tool_call_arguments_default_to_empty_object() {
        let completion: Completion =
            serde_json::from_value(serde_json::json!({"toolCall": {"name": "get_weather_by_city"}}))
                .unwrap();
        let call = completion.tool_call.unwrap();
        assert_eq!(call.name, "get_weather_by_city");
        assert_eq!(call.arguments, serde_json::json!({}));
    }

    #[test]
    fn test_new_message_serialization() {
        let msg = NewMessage {
            role: Role::User,
            content: "weather in Beijing",
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "weather in Beijing"}));
    }

    #[test]
    fn test_decode_result_missing_field() {
        let err = decode_result::<CreateSessionResult>(
            methods::CREATE_SESSION,
            serde_json::json!({"id": "abc"}),
        )
        .unwrap_err();
        assert!(matches!(err, McpError::ProtocolError { .. }));
        assert!(err.to_string().contains("createSession"));
    }

    #[test]
    fn test_display_command() {
        let cfg = ServerConfig {
            command: "python3".into(),
            args: vec!["mcp_server.py".into(), "--quiet".into()],
            env: HashMap::new(),
            cwd: None,
        };
        assert_eq!(cfg.display_command(), "python3 mcp_server.py --quiet");
    }
}

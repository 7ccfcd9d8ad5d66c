//! High-level client interface for weather queries.
//!
//! Owns the dispatcher (and through it the server process) plus the session
//! cache, and exposes the two query entry points. Both entry points convert
//! every failure into text and always stop the server before returning.

use serde_json::{json, Value};

use super::conversation::ConversationDriver;
use super::diagnostics::StderrBuffer;
use super::errors::McpError;
use super::lifecycle::{ProcessState, ProcessSupervisor};
use super::session::SessionManager;
use super::tools::ToolInvoker;
use super::transport::RequestDispatcher;
use crate::config::ClientConfig;

/// Tool used by the direct query path.
pub const WEATHER_TOOL: &str = "get_weather_by_city";

// ─── McpClient ───────────────────────────────────────────────────────────────

/// Weather client bound to one MCP server process at a time.
pub struct McpClient {
    dispatcher: RequestDispatcher,
    sessions: SessionManager,
    max_tool_iterations: u32,
}

impl McpClient {
    /// Create a client from its configuration. No process is spawned yet.
    pub fn new(config: ClientConfig) -> Self {
        let stderr = StderrBuffer::new(config.stderr_buffer_lines);
        let supervisor = ProcessSupervisor::new(config.server.clone(), stderr)
            .with_grace_periods(config.startup_grace(), config.shutdown_grace());
        Self {
            dispatcher: RequestDispatcher::new(supervisor, config.request_timeout()),
            sessions: SessionManager::new(),
            max_tool_iterations: config.max_tool_iterations,
        }
    }

    // ─── Components ──────────────────────────────────────────────────────

    /// Conversation operations (`addMessage`, `getCompletion`).
    pub fn conversation(&mut self) -> ConversationDriver<'_> {
        ConversationDriver::new(
            &mut self.dispatcher,
            &mut self.sessions,
            self.max_tool_iterations,
        )
    }

    /// Direct tool invocation.
    pub fn tools(&mut self) -> ToolInvoker<'_> {
        ToolInvoker::new(&mut self.dispatcher, &mut self.sessions)
    }

    /// Create the session if there is none for the running server.
    pub async fn ensure_session(&mut self) -> Result<String, McpError> {
        self.sessions.ensure_session(&mut self.dispatcher).await
    }

    /// Stop the server process. The session dies with it.
    pub async fn stop(&mut self) {
        self.dispatcher.shutdown().await;
        self.sessions.invalidate();
    }

    // ─── Query Facades ───────────────────────────────────────────────────

    /// Ask the server a free-form weather question.
    ///
    /// Never fails: errors are returned as text. The server is stopped
    /// before returning on every path.
    pub async fn query_weather(&mut self, query: &str) -> String {
        let outcome = self.run_query(query).await;
        self.stop().await;

        match outcome {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "weather query failed");
                format!("weather query failed: {e}")
            }
        }
    }

    async fn run_query(&mut self, query: &str) -> Result<String, McpError> {
        let mut conversation = self.conversation();
        let message_id = conversation.add_message(query).await?;
        conversation.get_completion(&message_id).await
    }

    /// Call the weather tool for `city` directly, bypassing the conversation.
    ///
    /// Returns the tool result as pretty-printed JSON, or the error as text.
    /// The server is stopped before returning on every path.
    pub async fn direct_query_weather(&mut self, city: &str) -> String {
        let outcome = self.run_direct_query(city).await;
        self.stop().await;

        match outcome.and_then(|result| render_result(&result)) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, city, "direct weather query failed");
                format!("direct weather query failed: {e}")
            }
        }
    }

    async fn run_direct_query(&mut self, city: &str) -> Result<Value, McpError> {
        self.ensure_session().await?;
        self.tools()
            .call_tool(WEATHER_TOOL, json!({ "city": city }))
            .await
    }

    // ─── Status ──────────────────────────────────────────────────────────

    pub fn state(&self) -> ProcessState {
        self.dispatcher.state()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.sessions.session_id()
    }

    /// Id of the most recent request sent over the lifetime of this client.
    pub fn last_request_id(&self) -> u64 {
        self.dispatcher.last_request_id()
    }

    /// Stderr captured from the current (or last) server process.
    pub fn stderr(&self) -> &StderrBuffer {
        self.dispatcher.supervisor().stderr()
    }
}

/// Pretty-print a tool result, keeping non-ASCII text as-is.
fn render_result(result: &Value) -> Result<String, McpError> {
    serde_json::to_string_pretty(result).map_err(|e| McpError::ProtocolError {
        reason: format!("failed to render tool result: {e}"),
        raw: None,
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────

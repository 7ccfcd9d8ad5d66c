//! Conversation driver: posts user messages and resolves completions.
//!
//! `get_completion` polls the server for a message's completion. When the
//! server answers with a tool call instead of text, the tool is executed and
//! the same message is polled again. The loop is bounded: once the server
//! has been served `max_tool_iterations` tool calls and asks for another,
//! the driver gives up with `ToolLoopExceeded`.

use serde_json::json;

use super::errors::McpError;
use super::session::SessionManager;
use super::tools::ToolInvoker;
use super::transport::RequestDispatcher;
use super::types::{decode_result, methods, AddMessageResult, CompletionResult, NewMessage, Role};

/// Default bound on tool calls resolved for a single message.
pub const DEFAULT_MAX_TOOL_ITERATIONS: u32 = 10;

/// Returned when a final completion carries no `content`.
pub const NO_CONTENT: &str = "(no content)";

/// Drives one conversation turn against the server.
pub struct ConversationDriver<'a> {
    dispatcher: &'a mut RequestDispatcher,
    sessions: &'a mut SessionManager,
    max_tool_iterations: u32,
}

impl<'a> ConversationDriver<'a> {
    pub fn new(
        dispatcher: &'a mut RequestDispatcher,
        sessions: &'a mut SessionManager,
        max_tool_iterations: u32,
    ) -> Self {
        Self {
            dispatcher,
            sessions,
            max_tool_iterations,
        }
    }

    /// Post a user message to the session and return its server-assigned id.
    pub async fn add_message(&mut self, content: &str) -> Result<String, McpError> {
        let session_id = self.sessions.ensure_session(self.dispatcher).await?;

        tracing::info!(session_id = %session_id, chars = content.chars().count(), "adding message");
        let params = json!({
            "sessionId": session_id,
            "message": NewMessage {
                role: Role::User,
                content,
            },
        });
        let result = self.dispatcher.send(methods::ADD_MESSAGE, params).await?;
        let added: AddMessageResult = decode_result(methods::ADD_MESSAGE, result)?;

        tracing::debug!(message_id = %added.message_id, "message added");
        Ok(added.message_id)
    }

    /// Poll until the server produces final text for `message_id`.
    pub async fn get_completion(&mut self, message_id: &str) -> Result<String, McpError> {
        let mut tool_iterations: u32 = 0;

        loop {
            let session_id = self.sessions.ensure_session(self.dispatcher).await?;
            let params = json!({
                "sessionId": session_id,
                "messageId": message_id,
            });
            let result = self.dispatcher.send(methods::GET_COMPLETION, params).await?;
            let completion = decode_result::<CompletionResult>(methods::GET_COMPLETION, result)?
                .completion;

            let Some(tool_call) = completion.tool_call else {
                return Ok(completion.content.unwrap_or_else(|| NO_CONTENT.to_string()));
            };

            if tool_iterations >= self.max_tool_iterations {
                tracing::warn!(
                    message_id,
                    limit = self.max_tool_iterations,
                    tool = %tool_call.name,
                    "server kept requesting tool calls; giving up"
                );
                return Err(McpError::ToolLoopExceeded {
                    message_id: message_id.to_string(),
                    limit: self.max_tool_iterations,
                });
            }

            tracing::info!(
                message_id,
                tool = %tool_call.name,
                iteration = tool_iterations + 1,
                "completion requested a tool call"
            );
            // The server records the outcome itself; the result is not fed back.
            self.tools()
                .call_tool(&tool_call.name, tool_call.arguments)
                .await?;
            tool_iterations += 1;
        }
    }

    fn tools(&mut self) -> ToolInvoker<'_> {
        ToolInvoker::new(&mut *self.dispatcher, &mut *self.sessions)
    }
}

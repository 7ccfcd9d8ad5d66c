//! Single tool invocation against the server.

use serde_json::{json, Value};

use super::errors::McpError;
use super::session::SessionManager;
use super::transport::RequestDispatcher;
use super::types::methods;

/// Executes one named tool call inside the current session.
pub struct ToolInvoker<'a> {
    dispatcher: &'a mut RequestDispatcher,
    sessions: &'a mut SessionManager,
}

impl<'a> ToolInvoker<'a> {
    pub fn new(dispatcher: &'a mut RequestDispatcher, sessions: &'a mut SessionManager) -> Self {
        Self {
            dispatcher,
            sessions,
        }
    }

    /// Dispatch `callTool` and return the server's result verbatim.
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Value, McpError> {
        let session_id = self.sessions.ensure_session(self.dispatcher).await?;

        tracing::info!(tool = name, arguments = %arguments, "calling tool");
        let params = json!({
            "sessionId": session_id,
            "name": name,
            "arguments": arguments,
        });
        let result = self.dispatcher.send(methods::CALL_TOOL, params).await?;

        tracing::debug!(tool = name, result = %result, "tool call result");
        Ok(result)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::mcp_client::test_support::StubServer;

    #[tokio::test]
    async fn test_call_tool_creates_session_and_passes_result_through() {
        let stub = StubServer::builder()
            .result("createSession", r#"{"sessionId":"abc"}"#)
            .result("callTool", r#"{"temp":20,"unit":"C"}"#)
            .build();
        let mut dispatcher = stub.dispatcher();
        let mut sessions = SessionManager::new();

        let result = ToolInvoker::new(&mut dispatcher, &mut sessions)
            .call_tool("get_weather_by_city", json!({"city": "Beijing"}))
            .await
            .unwrap();

        assert_eq!(result, json!({"temp": 20, "unit": "C"}));
        assert_eq!(stub.calls(), vec!["createSession", "callTool"]);
        dispatcher.shutdown().await;
    }
}

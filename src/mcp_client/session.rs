//! Session bookkeeping.
//!
//! A session belongs to one server process. The cached id is tagged with the
//! supervisor generation that created it, so a restarted server transparently
//! gets a fresh session instead of being handed a stale id.

use serde_json::json;

use super::errors::McpError;
use super::transport::RequestDispatcher;
use super::types::{decode_result, methods, CreateSessionResult};

#[derive(Debug, Clone)]
struct CachedSession {
    id: String,
    generation: u64,
}

/// Lazily creates and remembers the server-side session id.
#[derive(Debug, Default)]
pub struct SessionManager {
    session: Option<CachedSession>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached session id, if one has been created.
    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.id.as_str())
    }

    /// Return the live session id, creating one with `createSession` if needed.
    pub async fn ensure_session(
        &mut self,
        dispatcher: &mut RequestDispatcher,
    ) -> Result<String, McpError> {
        if let Some(cached) = &self.session {
            if dispatcher.is_live_generation(cached.generation) {
                return Ok(cached.id.clone());
            }
            tracing::debug!(
                session_id = %cached.id,
                "server process changed since session was created; discarding it"
            );
            self.session = None;
        }

        tracing::info!("creating MCP session");
        let result = dispatcher.send(methods::CREATE_SESSION, json!({})).await?;
        let created: CreateSessionResult = decode_result(methods::CREATE_SESSION, result)?;

        tracing::info!(session_id = %created.session_id, "session created");
        self.session = Some(CachedSession {
            id: created.session_id.clone(),
            generation: dispatcher.generation(),
        });
        Ok(created.session_id)
    }

    /// Forget the cached session.
    pub fn invalidate(&mut self) {
        self.session = None;
    }
}

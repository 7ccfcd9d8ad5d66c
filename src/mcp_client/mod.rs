//! MCP client: JSON-RPC over stdio to a locally spawned weather server.
//!
//! This module handles:
//! - Spawning, supervising, and tearing down the server child process
//! - One-at-a-time JSON-RPC 2.0 exchanges with a per-request deadline
//! - Session creation and caching per server process
//! - Completion polling with bounded tool-call resolution
//! - Query entry points that always stop the server before returning

pub mod client;
pub mod conversation;
pub mod diagnostics;
pub mod errors;
pub mod lifecycle;
pub mod session;
pub mod tools;
pub mod transport;
pub mod types;

#[cfg(all(test, unix))]
pub(crate) mod test_support;

// Re-exports for convenience
pub use client::{McpClient, WEATHER_TOOL};
pub use conversation::ConversationDriver;
pub use diagnostics::StderrBuffer;
pub use errors::McpError;
pub use lifecycle::{ProcessState, ProcessSupervisor};
pub use session::SessionManager;
pub use tools::ToolInvoker;
pub use transport::RequestDispatcher;
pub use types::{Completion, ServerConfig, ToolCall};

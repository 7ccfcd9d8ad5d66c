pub mod config;
pub mod logging;
pub mod mcp_client;

pub use config::ClientConfig;
pub use mcp_client::{McpClient, McpError};

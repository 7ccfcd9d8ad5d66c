//! Client configuration loading and validation.
//!
//! Reads an optional `mcp-weather.yaml` and resolves environment variables.
//! Every field has a default, so running without a config file launches
//! `python3 mcp_server.py` with a 30s request deadline.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::mcp_client::conversation::DEFAULT_MAX_TOOL_ITERATIONS;
use crate::mcp_client::lifecycle::{DEFAULT_SHUTDOWN_GRACE, DEFAULT_STARTUP_GRACE};
use crate::mcp_client::transport::DEFAULT_REQUEST_TIMEOUT;
use crate::mcp_client::types::ServerConfig;
use crate::mcp_client::McpError;

/// File name searched for in the working directory and its parents.
pub const CONFIG_FILE_NAME: &str = "mcp-weather.yaml";

/// Env var naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "MCP_WEATHER_CONFIG";

// ─── Public Types ────────────────────────────────────────────────────────────

/// Top-level client configuration (mirrors `mcp-weather.yaml`).
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// How to launch the MCP server.
    #[serde(default)]
    pub server: ServerConfig,
    /// Deadline for a single JSON-RPC response.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Tool calls resolved per message before giving up.
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,
    /// Wait after spawning before checking the server is still alive.
    #[serde(default = "default_startup_grace_ms")]
    pub startup_grace_ms: u64,
    /// Wait for a graceful exit before killing the server.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
    /// Stderr lines kept for error reports.
    #[serde(default = "default_stderr_buffer_lines")]
    pub stderr_buffer_lines: usize,
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}
fn default_max_tool_iterations() -> u32 {
    DEFAULT_MAX_TOOL_ITERATIONS
}
fn default_startup_grace_ms() -> u64 {
    DEFAULT_STARTUP_GRACE.as_millis() as u64
}
fn default_shutdown_grace_ms() -> u64 {
    DEFAULT_SHUTDOWN_GRACE.as_millis() as u64
}
fn default_stderr_buffer_lines() -> usize {
    200
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            request_timeout_secs: default_request_timeout_secs(),
            max_tool_iterations: default_max_tool_iterations(),
            startup_grace_ms: default_startup_grace_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            stderr_buffer_lines: default_stderr_buffer_lines(),
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.startup_grace_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Reject configurations the client cannot run with.
    pub fn validate(&self) -> Result<(), McpError> {
        if self.server.command.trim().is_empty() {
            return Err(McpError::ConfigError {
                reason: "server.command must not be empty".into(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(McpError::ConfigError {
                reason: "request_timeout_secs must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Locate the config file, if any.
///
/// 1. `explicit` (from `--config`)
/// 2. `MCP_WEATHER_CONFIG` env var
/// 3. `mcp-weather.yaml` walking upward from `start`
/// 4. `<platform config dir>/mcp-weather/config.yaml`
pub fn find_config_path(explicit: Option<&Path>, start: &Path) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(expand_tilde(&path)));
        }
    }

    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.exists() {
            return Some(candidate);
        }
        if !dir.pop() {
            break;
        }
    }

    dirs::config_dir()
        .map(|d| d.join("mcp-weather").join("config.yaml"))
        .filter(|p| p.exists())
}

/// Load and parse a config file.
///
/// Performs environment-variable interpolation on `${VAR_NAME}` and
/// `${VAR_NAME:-default}` before parsing.
pub fn load_config(path: &Path) -> Result<ClientConfig, McpError> {
    let raw = std::fs::read_to_string(path).map_err(|e| McpError::ConfigError {
        reason: format!("failed to read {}: {e}", path.display()),
    })?;

    let interpolated = interpolate_env_vars(&raw);

    let config: ClientConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| McpError::ConfigError {
            reason: format!("failed to parse {}: {e}", path.display()),
        })?;

    config.validate()?;
    Ok(config)
}

/// Find and load the config, falling back to defaults when no file exists.
pub fn resolve_config(explicit: Option<&Path>) -> Result<ClientConfig, McpError> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    match find_config_path(explicit, &cwd) {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading client config");
            load_config(&path)
        }
        None => {
            tracing::debug!("no config file found; using defaults");
            Ok(ClientConfig::default())
        }
    }
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Substitute `${VAR}` and `${VAR:-default}` references.
///
/// An unset variable without a default becomes the empty string. An
/// unterminated `${` is kept verbatim.
fn interpolate_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find("${") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        match after.find('}') {
            Some(close) => {
                out.push_str(&lookup_var(&after[..close]));
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Value of `NAME` or `NAME:-fallback`; fallbacks get tilde expansion.
fn lookup_var(reference: &str) -> String {
    let (name, fallback) = match reference.split_once(":-") {
        Some((name, fallback)) => (name, Some(fallback)),
        None => (reference, None),
    };
    match (std::env::var(name), fallback) {
        (Ok(value), _) => value,
        (Err(_), Some(fallback)) => expand_tilde(fallback),
        (Err(_), None) => String::new(),
    }
}

/// Expand `~` or a leading `~/` to the home directory.
fn expand_tilde(path: &str) -> String {
    let home = || dirs::home_dir().map(|h| h.to_string_lossy().into_owned());
    if path == "~" {
        return home().unwrap_or_else(|| path.to_string());
    }
    match (path.strip_prefix("~/"), home()) {
        (Some(rest), Some(home)) => format!("{}/{rest}", home.trim_end_matches('/')),
        _ => path.to_string(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

//! Scripted stub servers for process-level tests.
//!
//! Each stub is a POSIX `sh` script in a temp dir. It reads one request per
//! line, pulls out `method` and `id` with `sed`, appends the method to a call
//! log, and answers from a per-method `case` table.

use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;

use super::diagnostics::StderrBuffer;
use super::lifecycle::ProcessSupervisor;
use super::transport::RequestDispatcher;
use super::types::ServerConfig;
use crate::config::ClientConfig;

pub(crate) struct StubServer {
    _dir: TempDir,
    script: PathBuf,
    log: PathBuf,
}

#[derive(Default)]
pub(crate) struct StubBuilder {
    startup: Vec<String>,
    cases: Vec<String>,
}

impl StubBuilder {
    /// Shell statements run once before the request loop.
    pub fn on_startup(mut self, statements: &str) -> Self {
        self.startup.push(statements.to_string());
        self
    }

    /// Answer `method` with a success envelope around `result_json`.
    pub fn result(self, method: &str, result_json: &str) -> Self {
        let action = format!(
            r#"printf '{{"jsonrpc":"2.0","id":%s,"result":{result_json}}}\n' "$id""#
        );
        self.on(method, &action)
    }

    /// Answer `method` with an error object and no `id`.
    pub fn error(self, method: &str, code: i64, message: &str) -> Self {
        let action =
            format!(r#"printf '{{"error":{{"message":"{message}","code":{code}}}}}\n'"#);
        self.on(method, &action)
    }

    /// Answer `method` with its own request id as the result.
    pub fn echo_id(self, method: &str) -> Self {
        self.on(
            method,
            r#"printf '{"jsonrpc":"2.0","id":%s,"result":{"id":%s}}\n' "$id" "$id""#,
        )
    }

    /// Run arbitrary shell statements for `method`.
    pub fn on(mut self, method: &str, statements: &str) -> Self {
        self.cases.push(format!("    {method}) {statements} ;;"));
        self
    }

    pub fn build(self) -> StubServer {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("stub_server.sh");
        let log = dir.path().join("calls.log");

        let body = format!(
            r##"#!/bin/sh
LOG="$1"
echo "#start" >> "$LOG"
{startup}
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\)}}$/\1/p')
  method=$(printf '%s\n' "$line" | sed -n 's/.*"method":"\([^"]*\)".*/\1/p')
  echo "$method" >> "$LOG"
  case "$method" in
{cases}
    *) printf '{{"jsonrpc":"2.0","id":%s,"error":{{"code":-32601,"message":"Method not found"}}}}\n' "$id" ;;
  esac
done
echo "#exit" >> "$LOG"
"##,
            startup = self.startup.join("\n"),
            cases = self.cases.join("\n"),
        );
        std::fs::write(&script, body).unwrap();
        std::fs::write(&log, "").unwrap();

        StubServer {
            _dir: dir,
            script,
            log,
        }
    }
}

impl StubServer {
    pub fn builder() -> StubBuilder {
        StubBuilder::default()
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            command: "sh".to_string(),
            args: vec![
                self.script.to_string_lossy().into_owned(),
                self.log.to_string_lossy().into_owned(),
            ],
            env: Default::default(),
            cwd: None,
        }
    }

    /// A client config with short grace periods and a 5s request deadline.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            server: self.server_config(),
            request_timeout_secs: 5,
            startup_grace_ms: 100,
            shutdown_grace_ms: 200,
            ..ClientConfig::default()
        }
    }

    /// A dispatcher over this stub with a 5s request deadline.
    pub fn dispatcher(&self) -> RequestDispatcher {
        self.dispatcher_with_timeout(Duration::from_secs(5))
    }

    pub fn dispatcher_with_timeout(&self, timeout: Duration) -> RequestDispatcher {
        let supervisor = ProcessSupervisor::new(self.server_config(), StderrBuffer::new(50))
            .with_grace_periods(Duration::from_millis(100), Duration::from_millis(200));
        RequestDispatcher::new(supervisor, timeout)
    }

    fn log_lines(&self) -> Vec<String> {
        std::fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Methods received, in order, across all process instances.
    pub fn calls(&self) -> Vec<String> {
        self.log_lines()
            .into_iter()
            .filter(|l| !l.starts_with('#'))
            .collect()
    }

    /// How many times `method` was received.
    pub fn count(&self, method: &str) -> usize {
        self.calls().iter().filter(|m| *m == method).count()
    }

    /// Number of process instances that started.
    pub fn starts(&self) -> usize {
        self.log_lines().iter().filter(|l| *l == "#start").count()
    }

    /// Number of process instances that left the request loop on stdin EOF.
    pub fn exits(&self) -> usize {
        self.log_lines().iter().filter(|l| *l == "#exit").count()
    }
}

/// Short request deadline for timeout tests.
pub(crate) const SHORT_TIMEOUT: Duration = Duration::from_millis(300);

//! Tracing setup for the `mcp-weather` binary.
//!
//! Logs go to stderr by default so stdout carries only the query result.
//! With a log file, existing logs are rotated and every line is flushed
//! to disk as it is written.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Rotations kept next to the active log file.
const KEEP_ROTATIONS: u32 = 3;

/// Filter used when `RUST_LOG` is not set.
fn default_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("mcp_weather_client=debug,mcp_weather=debug,warn")
    } else {
        EnvFilter::new("warn")
    }
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` overrides the verbosity chosen by `verbose`.
pub fn init_tracing(verbose: bool, log_file: Option<&Path>) -> io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbose));

    match log_file {
        Some(path) => {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
            rotate_log_file(path, KEEP_ROTATIONS);
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(SyncedLogFile::new(file))
                .with_ansi(false)
                .with_target(true)
                .init();

            tracing::info!(
                version = env!("CARGO_PKG_VERSION"),
                log_file = %path.display(),
                pid = std::process::id(),
                "=== mcp-weather starting ==="
            );
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .init();
        }
    }
    Ok(())
}

/// Path of the `n`th rotation of `base`, e.g. `weather.log.2`.
fn rotated_path(base: &Path, n: u32) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(format!(".{n}"));
    PathBuf::from(name)
}

/// Shift `weather.log` into `weather.log.1`, `.1` into `.2`, and so on.
///
/// Only `keep` rotations survive. Gaps in the chain are fine.
fn rotate_log_file(base: &Path, keep: u32) {
    if keep == 0 {
        let _ = fs::remove_file(base);
        return;
    }
    let _ = fs::remove_file(rotated_path(base, keep));
    for n in (1..keep).rev() {
        let _ = fs::rename(rotated_path(base, n), rotated_path(base, n + 1));
    }
    if base.exists() {
        let _ = fs::rename(base, rotated_path(base, 1));
    }
}

/// Log file handle shared by every tracing writer; each write hits disk
/// before returning so a killed process still leaves a complete log.
#[derive(Clone)]
struct SyncedLogFile {
    file: Arc<Mutex<File>>,
}

impl SyncedLogFile {
    fn new(file: File) -> Self {
        Self {
            file: Arc::new(Mutex::new(file)),
        }
    }

    fn locked(&self) -> io::Result<MutexGuard<'_, File>> {
        self.file
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))
    }
}

impl Write for SyncedLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self.locked()?;
        let written = file.write(buf)?;
        file.flush()?;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.locked()?.flush()
    }
}

impl<'a> MakeWriter<'a> for SyncedLogFile {
    type Writer = SyncedLogFile;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

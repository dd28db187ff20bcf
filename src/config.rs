//! Runtime configuration — data directory, timeouts, repair policy.
//!
//! Defaults work out of the box; every knob can be overridden through a
//! `VIGIL_*` environment variable.

use std::path::PathBuf;

/// Consecutive failures before repair is attempted.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Timeout for plain HTTP fetches.
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 10_000;

/// Timeout for one repair-collaborator call.
pub const DEFAULT_REPAIR_TIMEOUT_MS: u64 = 20_000;

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the database (default `~/.vigil`).
    pub data_dir: PathBuf,
    /// Plain-HTTP fetch timeout.
    pub http_timeout_ms: u64,
    /// Failures before the repair orchestrator runs.
    pub failure_threshold: u32,
    /// Endpoint of the external repair collaborator, if configured.
    pub repair_url: Option<String>,
    /// Caller-side bound on one repair call.
    pub repair_timeout_ms: u64,
}

impl Config {
    /// Load configuration from the environment, falling back to defaults.
    pub fn load() -> Self {
        let data_dir = std::env::var("VIGIL_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".vigil")
            });

        Self {
            data_dir,
            http_timeout_ms: env_u64("VIGIL_HTTP_TIMEOUT_MS", DEFAULT_HTTP_TIMEOUT_MS),
            failure_threshold: env_u64("VIGIL_FAILURE_THRESHOLD", DEFAULT_FAILURE_THRESHOLD as u64)
                as u32,
            repair_url: std::env::var("VIGIL_REPAIR_URL").ok().filter(|s| !s.is_empty()),
            repair_timeout_ms: env_u64("VIGIL_REPAIR_TIMEOUT_MS", DEFAULT_REPAIR_TIMEOUT_MS),
        }
    }

    /// Path of the SQLite database file.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("vigil.db")
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

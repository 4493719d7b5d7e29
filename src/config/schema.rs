//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the scan
//! gateway. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the scan gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ScanConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Request size and concurrency limits.
    pub limits: LimitsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// External inspection engine invocation.
    pub engine: EngineConfig,

    /// Buffer pool sizing.
    pub buffers: BufferConfig,

    /// Cross-origin caller policy.
    pub cors: CorsConfig,

    /// Static page served at `/`.
    pub ui: UiConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8081").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8081".to_string(),
        }
    }
}

/// Request size and concurrency limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum accepted request body in bytes.
    pub max_body_size: usize,

    /// Maximum inspections running at once.
    /// Defaults to twice the available parallelism.
    pub max_concurrent_scans: Option<usize>,

    /// Upper bound on how long a request may wait for a scan slot.
    /// `None` waits indefinitely.
    pub admission_timeout_secs: Option<u64>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: 500 * 1024 * 1024,
            max_concurrent_scans: None,
            admission_timeout_secs: None,
        }
    }
}

impl LimitsConfig {
    /// Resolve the effective concurrency limit.
    pub fn effective_concurrency(&self) -> usize {
        self.max_concurrent_scans.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                * 2
        })
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Whole-request ceiling in seconds (upload + scan + response).
    pub request_secs: u64,

    /// Deadline for a single engine run in seconds.
    pub scan_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 15 * 60,
            scan_secs: 10 * 60,
        }
    }
}

/// External inspection engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Executable to launch.
    pub program: String,

    /// Full argument list. When unset the standard clamscan flags are used.
    pub args: Option<Vec<String>>,

    /// Value passed as `--max-filesize`.
    pub max_filesize: String,

    /// Value passed as `--max-scansize`.
    pub max_scansize: String,

    /// Engine label reported in scan results.
    pub label: String,

    /// Exit status meaning "threat found".
    pub infected_exit_code: i32,

    /// Exit status meaning "engine misconfigured".
    pub config_error_exit_code: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: "clamscan".to_string(),
            args: None,
            max_filesize: "500M".to_string(),
            max_scansize: "500M".to_string(),
            label: "ClamAV".to_string(),
            infected_exit_code: 1,
            config_error_exit_code: 2,
        }
    }
}

impl EngineConfig {
    /// Arguments handed to the engine process.
    pub fn command_args(&self) -> Vec<String> {
        match &self.args {
            Some(args) => args.clone(),
            None => vec![
                "--no-summary".to_string(),
                "--infected".to_string(),
                "--stdout".to_string(),
                format!("--max-filesize={}", self.max_filesize),
                format!("--max-scansize={}", self.max_scansize),
                "-".to_string(),
            ],
        }
    }
}

/// Buffer pool sizing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Initial capacity of a freshly allocated content buffer.
    pub content_capacity: usize,

    /// Buffers that grew beyond this are shrunk back before being pooled.
    pub max_retained_capacity: usize,

    /// Maximum idle buffers kept per pool.
    pub max_pooled: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            content_capacity: 64 * 1024,
            max_retained_capacity: 8 * 1024 * 1024,
            max_pooled: 64,
        }
    }
}

/// Cross-origin caller policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins echoed back in `Access-Control-Allow-Origin`.
    pub allowed_origins: Vec<String>,

    /// Send `Access-Control-Allow-Credentials: true`.
    pub allow_credentials: bool,

    /// Preflight cache lifetime in seconds.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:3001".to_string(),
                "http://localhost:8080".to_string(),
                "http://localhost:8081".to_string(),
            ],
            allow_credentials: true,
            max_age_secs: 86_400,
        }
    }
}

/// Static page configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UiConfig {
    /// Path of the HTML page served at `/`.
    pub index_path: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            index_path: "index.html".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_engine_args_read_stdin() {
        let args = EngineConfig::default().command_args();
        assert_eq!(
            args,
            vec![
                "--no-summary",
                "--infected",
                "--stdout",
                "--max-filesize=500M",
                "--max-scansize=500M",
                "-",
            ]
        );
    }

    #[test]
    fn explicit_args_replace_defaults() {
        let engine = EngineConfig {
            args: Some(vec!["-c".into(), "exit 0".into()]),
            ..EngineConfig::default()
        };
        assert_eq!(engine.command_args(), vec!["-c", "exit 0"]);
    }

    #[test]
    fn concurrency_defaults_to_twice_parallelism() {
        let limits = LimitsConfig::default();
        let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        assert_eq!(limits.effective_concurrency(), cpus * 2);

        let pinned = LimitsConfig { max_concurrent_scans: Some(3), ..LimitsConfig::default() };
        assert_eq!(pinned.effective_concurrency(), 3);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ScanConfig = toml::from_str(
            r#"
            [engine]
            program = "/usr/local/bin/clamscan"

            [limits]
            max_concurrent_scans = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.program, "/usr/local/bin/clamscan");
        assert_eq!(config.engine.label, "ClamAV");
        assert_eq!(config.limits.max_concurrent_scans, Some(4));
        assert_eq!(config.timeouts.scan_secs, 600);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8081");
    }
}

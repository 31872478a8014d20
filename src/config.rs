// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `BANK_DATA_DIR` | Directory holding the sealed state file and audit logs | `.` |
//! | `BANK_SOCKET_PATH` | Unix socket the server listens on | `/tmp/sgx_bank.sock` |
//! | `BANK_AUDIT` | Write the JSONL audit log (`true`/`false`) | `true` |
//! | `BANK_READ_TIMEOUT_MS` | How long to wait for a complete request | `5000` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::path::PathBuf;
use std::time::Duration;

use crate::storage::StoragePaths;

/// Environment variable name for the host data directory.
pub const DATA_DIR_ENV: &str = "BANK_DATA_DIR";

/// Environment variable name for the server socket path.
pub const SOCKET_PATH_ENV: &str = "BANK_SOCKET_PATH";

/// Environment variable name for enabling the audit log.
pub const AUDIT_ENV: &str = "BANK_AUDIT";

/// Environment variable name for the request read timeout.
pub const READ_TIMEOUT_ENV: &str = "BANK_READ_TIMEOUT_MS";

/// Environment variable name for the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Socket shared by the server and the client.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/sgx_bank.sock";

/// Default request read timeout.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(5000);

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(LogFormat::Json),
            "pretty" => Some(LogFormat::Pretty),
            _ => None,
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub paths: StoragePaths,
    pub socket_path: PathBuf,
    pub audit: bool,
    pub read_timeout: Duration,
    pub log_format: LogFormat,
    /// Variables whose values were rejected, as `(name, value)`. Collected
    /// here because tracing is set up from this config.
    pub rejected: Vec<(&'static str, String)>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            paths: StoragePaths::default(),
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            audit: true,
            read_timeout: DEFAULT_READ_TIMEOUT,
            log_format: LogFormat::default(),
            rejected: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` for variable values. Unparseable values fall back
    /// to the default and are recorded in `rejected`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let mut rejected = Vec::new();

        let paths = lookup(DATA_DIR_ENV)
            .map(StoragePaths::new)
            .unwrap_or(defaults.paths);

        let socket_path = lookup(SOCKET_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or(defaults.socket_path);

        let audit = match lookup(AUDIT_ENV).as_deref() {
            None => defaults.audit,
            Some("1" | "true" | "yes" | "on") => true,
            Some("0" | "false" | "no" | "off") => false,
            Some(other) => {
                rejected.push((AUDIT_ENV, other.to_string()));
                defaults.audit
            }
        };

        let read_timeout = match lookup(READ_TIMEOUT_ENV) {
            None => defaults.read_timeout,
            Some(raw) => match raw.parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => {
                    rejected.push((READ_TIMEOUT_ENV, raw));
                    defaults.read_timeout
                }
            },
        };

        let log_format = match lookup(LOG_FORMAT_ENV) {
            None => defaults.log_format,
            Some(raw) => LogFormat::parse(&raw).unwrap_or_else(|| {
                rejected.push((LOG_FORMAT_ENV, raw));
                defaults.log_format
            }),
        };

        Self {
            paths,
            socket_path,
            audit,
            read_timeout,
            log_format,
            rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;

    fn config_from(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = config_from(&[]);
        assert_eq!(config.paths.root(), Path::new("."));
        assert_eq!(config.socket_path, PathBuf::from(DEFAULT_SOCKET_PATH));
        assert!(config.audit);
        assert_eq!(config.read_timeout, DEFAULT_READ_TIMEOUT);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.rejected.is_empty());
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            (DATA_DIR_ENV, "/srv/bank"),
            (SOCKET_PATH_ENV, "/run/bank.sock"),
            (AUDIT_ENV, "false"),
            (READ_TIMEOUT_ENV, "250"),
            (LOG_FORMAT_ENV, "json"),
        ]);
        assert_eq!(
            config.paths.state_file(),
            PathBuf::from("/srv/bank/enclave_state.bin")
        );
        assert_eq!(config.socket_path, PathBuf::from("/run/bank.sock"));
        assert!(!config.audit);
        assert_eq!(config.read_timeout, Duration::from_millis(250));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = config_from(&[
            (AUDIT_ENV, "maybe"),
            (READ_TIMEOUT_ENV, "0"),
            (LOG_FORMAT_ENV, "xml"),
        ]);
        assert!(config.audit);
        assert_eq!(config.read_timeout, DEFAULT_READ_TIMEOUT);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(
            config.rejected,
            vec![
                (AUDIT_ENV, "maybe".to_string()),
                (READ_TIMEOUT_ENV, "0".to_string()),
                (LOG_FORMAT_ENV, "xml".to_string()),
            ]
        );
    }
}

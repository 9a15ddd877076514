//! Process configuration derived from environment variables.
//!
//! Settings are read once at startup and immutable afterwards. Malformed
//! values fail startup instead of being silently defaulted.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8099;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

const ENV_TRANSPORT: &str = "LIMNER_TRANSPORT";
const ENV_PORT: &str = "LIMNER_PORT";
const ENV_STATIC_DIR: &str = "LIMNER_STATIC_DIR";
const ENV_ALLOWED_DIRS: &str = "LIMNER_ALLOWED_DIRS";
const ENV_SHUTDOWN_GRACE: &str = "LIMNER_SHUTDOWN_GRACE_SECS";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("{ENV_TRANSPORT} must be 'stdio' or 'http', got '{0}'")]
    UnknownTransport(String),
    #[error("{ENV_PORT} must be an integer between 1 and 65535, got '{0}'")]
    InvalidPort(String),
    #[error("{ENV_SHUTDOWN_GRACE} must be a non-negative integer, got '{0}'")]
    InvalidShutdownGrace(String),
}

/// How the MCP service is exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    #[default]
    Stdio,
    Http,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub transport: Transport,
    /// Listen port for the HTTP transport; also used to build `link` URLs.
    pub port: u16,
    /// Temp directory for rendered artifacts, doubling as the `/static` root.
    pub static_dir: PathBuf,
    /// Directory prefixes caller-supplied output paths must fall under.
    /// Empty means unrestricted.
    pub allowed_dirs: Vec<PathBuf>,
    pub shutdown_grace: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            transport: Transport::Stdio,
            port: DEFAULT_PORT,
            static_dir: default_static_dir(),
            allowed_dirs: Vec::new(),
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
        }
    }
}

fn default_static_dir() -> PathBuf {
    env::temp_dir().join("limner-renders")
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let mut settings = Settings::default();

        if let Some(raw) = lookup(ENV_TRANSPORT) {
            settings.transport = match raw.trim().to_ascii_lowercase().as_str() {
                "stdio" => Transport::Stdio,
                "http" => Transport::Http,
                _ => return Err(SettingsError::UnknownTransport(raw)),
            };
        }

        if let Some(raw) = lookup(ENV_PORT) {
            let port: u16 = raw.trim().parse().map_err(|_| SettingsError::InvalidPort(raw.clone()))?;
            if port == 0 {
                return Err(SettingsError::InvalidPort(raw));
            }
            settings.port = port;
        }

        if let Some(raw) = lookup(ENV_STATIC_DIR) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                settings.static_dir = PathBuf::from(trimmed);
            }
        }

        if let Some(raw) = lookup(ENV_ALLOWED_DIRS) {
            settings.allowed_dirs = raw
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(PathBuf::from)
                .collect();
        }

        if let Some(raw) = lookup(ENV_SHUTDOWN_GRACE) {
            let secs: u64 =
                raw.trim().parse().map_err(|_| SettingsError::InvalidShutdownGrace(raw.clone()))?;
            settings.shutdown_grace = Duration::from_secs(secs);
        }

        Ok(settings)
    }

    /// Base URL used when building `link` delivery results.
    pub fn public_base_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_map(entries: &[(&str, &str)]) -> Result<Settings, SettingsError> {
        let map: HashMap<String, String> =
            entries.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let settings = from_map(&[]).expect("settings");
        assert_eq!(settings.transport, Transport::Stdio);
        assert_eq!(settings.port, DEFAULT_PORT);
        assert!(settings.allowed_dirs.is_empty());
        assert_eq!(settings.shutdown_grace, Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS));
        assert!(settings.static_dir.ends_with("limner-renders"));
    }

    #[test]
    fn parses_http_transport_and_port() {
        let settings =
            from_map(&[("LIMNER_TRANSPORT", "http"), ("LIMNER_PORT", "9000")]).expect("settings");
        assert_eq!(settings.transport, Transport::Http);
        assert_eq!(settings.port, 9000);
        assert_eq!(settings.public_base_url(), "http://localhost:9000");
    }

    #[test]
    fn rejects_unknown_transport() {
        from_map(&[("LIMNER_TRANSPORT", "websocket")]).unwrap_err();
    }

    #[test]
    fn rejects_port_zero_and_garbage() {
        from_map(&[("LIMNER_PORT", "0")]).unwrap_err();
        from_map(&[("LIMNER_PORT", "70000")]).unwrap_err();
        from_map(&[("LIMNER_PORT", "eight")]).unwrap_err();
    }

    #[test]
    fn splits_allowed_dirs_on_commas() {
        let settings =
            from_map(&[("LIMNER_ALLOWED_DIRS", "/tmp/out, /var/render ,,")]).expect("settings");
        assert_eq!(settings.allowed_dirs, vec![PathBuf::from("/tmp/out"), PathBuf::from("/var/render")]);
    }

    #[test]
    fn overrides_static_dir() {
        let settings = from_map(&[("LIMNER_STATIC_DIR", "/srv/limner")]).expect("settings");
        assert_eq!(settings.static_dir, PathBuf::from("/srv/limner"));
    }

    #[test]
    fn parses_shutdown_grace() {
        let settings = from_map(&[("LIMNER_SHUTDOWN_GRACE_SECS", "12")]).expect("settings");
        assert_eq!(settings.shutdown_grace, Duration::from_secs(12));
        from_map(&[("LIMNER_SHUTDOWN_GRACE_SECS", "soon")]).unwrap_err();
    }
}

//! Per-command run options

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default quiet period after the last output line before a result is final
pub const DEFAULT_COLLECT_TIMEOUT: Duration = Duration::from_millis(100);

/// Default number of JSON decode attempts
pub const DEFAULT_COLLECT_TRIES: u32 = 10;

/// Options for a single command execution
///
/// Every field is optional in serialized form and falls back to the
/// documented default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Working directory for the command
    pub cwd: Option<PathBuf>,
    /// Environment variable overrides
    pub env: BTreeMap<String, String>,
    /// Pseudo-terminal allocation (remote transports only)
    pub pty: PtyRequest,
    /// X11 display forwarding (remote transports only)
    pub x11: X11Request,
    /// Quiescence timeout, also used as the JSON retry interval
    #[serde(rename = "collect_timeout_ms", with = "duration_ms")]
    pub collect_timeout: Duration,
    /// Maximum JSON decode attempts
    pub collect_tries: u32,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            cwd: None,
            env: BTreeMap::new(),
            pty: PtyRequest::Off,
            x11: X11Request::Off,
            collect_timeout: DEFAULT_COLLECT_TIMEOUT,
            collect_tries: DEFAULT_COLLECT_TRIES,
        }
    }
}

impl RunOptions {
    /// Options with every default applied
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the working directory
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Add an environment variable override
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Request a pseudo-terminal
    pub fn pty(mut self, pty: PtyRequest) -> Self {
        self.pty = pty;
        self
    }

    /// Request X11 forwarding
    pub fn x11(mut self, x11: X11Request) -> Self {
        self.x11 = x11;
        self
    }

    /// Set the quiescence timeout
    pub fn collect_timeout(mut self, timeout: Duration) -> Self {
        self.collect_timeout = timeout;
        self
    }

    /// Set the JSON decode attempt bound (at least one attempt is always made)
    pub fn collect_tries(mut self, tries: u32) -> Self {
        self.collect_tries = tries;
        self
    }
}

/// Pseudo-terminal allocation request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PtyRequest {
    /// No pseudo-terminal
    #[default]
    Off,
    /// Allocate one with the transport's defaults
    Default,
    /// Allocate one with explicit settings
    Settings(PtySettings),
}

/// Explicit pseudo-terminal settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PtySettings {
    /// Terminal type advertised to the remote side
    pub term: String,
    /// Rows
    pub rows: u16,
    /// Columns
    pub cols: u16,
}

impl Default for PtySettings {
    fn default() -> Self {
        Self {
            term: "vt100".to_string(),
            rows: 24,
            cols: 80,
        }
    }
}

/// X11 forwarding request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum X11Request {
    /// No forwarding
    #[default]
    Off,
    /// Forward with the transport's defaults
    Default,
    /// Forward a specific screen number
    Screen(u32),
    /// Forward with explicit settings
    Settings(X11Settings),
}

/// Explicit X11 forwarding settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct X11Settings {
    /// Screen number
    pub screen: u32,
    /// Use trusted forwarding
    pub trusted: bool,
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = RunOptions::default();
        assert_eq!(options.collect_timeout, Duration::from_millis(100));
        assert_eq!(options.collect_tries, 10);
        assert_eq!(options.pty, PtyRequest::Off);
        assert_eq!(options.x11, X11Request::Off);
        assert!(options.cwd.is_none());
        assert!(options.env.is_empty());
    }

    #[test]
    fn test_builder() {
        let options = RunOptions::new()
            .cwd("/tmp")
            .env("LANG", "C")
            .pty(PtyRequest::Default)
            .collect_timeout(Duration::from_millis(5))
            .collect_tries(2);

        assert_eq!(options.cwd, Some(PathBuf::from("/tmp")));
        assert_eq!(options.env.get("LANG").map(String::as_str), Some("C"));
        assert_eq!(options.pty, PtyRequest::Default);
        assert_eq!(options.collect_timeout, Duration::from_millis(5));
        assert_eq!(options.collect_tries, 2);
    }

    #[test]
    fn test_deserialize_partial_json() {
        let options: RunOptions =
            serde_json::from_str(r#"{"collect_timeout_ms": 250, "env": {"A": "1"}}"#).unwrap();
        assert_eq!(options.collect_timeout, Duration::from_millis(250));
        assert_eq!(options.collect_tries, DEFAULT_COLLECT_TRIES);
        assert_eq!(options.env.len(), 1);
    }

    #[test]
    fn test_deserialize_requests() {
        let options: RunOptions = serde_json::from_str(
            r#"{"pty": {"settings": {"term": "xterm"}}, "x11": {"screen": 2}}"#,
        )
        .unwrap();
        assert_eq!(
            options.pty,
            PtyRequest::Settings(PtySettings {
                term: "xterm".into(),
                ..PtySettings::default()
            })
        );
        assert_eq!(options.x11, X11Request::Screen(2));

        let options: RunOptions = serde_json::from_str(r#"{"pty": "default"}"#).unwrap();
        assert_eq!(options.pty, PtyRequest::Default);
    }

    #[test]
    fn test_deserialize_yaml() {
        let options: RunOptions =
            serde_yaml::from_str("cwd: /srv/app\ncollect_tries: 3\nenv:\n  MODE: fast\n").unwrap();
        assert_eq!(options.cwd, Some(PathBuf::from("/srv/app")));
        assert_eq!(options.collect_tries, 3);
        assert_eq!(options.collect_timeout, DEFAULT_COLLECT_TIMEOUT);
        assert_eq!(options.env["MODE"], "fast");
    }
}

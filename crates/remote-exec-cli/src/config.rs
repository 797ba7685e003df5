//! YAML configuration for `rexec`
//!
//! ```yaml
//! connection:
//!   host: build-box
//!   user: deploy
//!   identity_file: ~/.ssh/deploy
//! run:
//!   cwd: /srv/app
//!   env:
//!     RUST_LOG: info
//!   collect_timeout_ms: 200
//!   collect_tries: 5
//! ```
//!
//! Without a `connection` section commands run locally.

use anyhow::{bail, Context, Result};
use remote_exec::{RunOptions, SshConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Contents of a `rexec` configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Remote host to connect to
    pub connection: Option<SshConfig>,
    /// Options applied to the command
    pub run: RunOptions,
}

impl FileConfig {
    /// Read and parse a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Parse configuration from a YAML string
    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// The connection, failing if none was configured
    pub fn connection_mut(&mut self, flag: &str) -> Result<&mut SshConfig> {
        match self.connection.as_mut() {
            Some(connection) => Ok(connection),
            None => bail!("{} requires --host or a connection in the config file", flag),
        }
    }
}

/// Parse a `KEY=VALUE` pair
pub fn parse_env(pair: &str) -> Result<(String, String)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => bail!("expected KEY=VALUE, got `{}`", pair),
    }
}

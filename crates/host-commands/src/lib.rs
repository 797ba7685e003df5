//! Host administration helpers built on remote-exec
//!
//! [`HostCommands`] wraps an [`Executor`] and runs common account, file,
//! key and interface commands on it, locally or on a remote host. Every
//! helper goes through the executor's collector, so a non-zero exit becomes
//! [`HostError::CommandFailed`] carrying the command's stderr.

#![warn(missing_docs)]

use regex::Regex;
use remote_exec::{Command, Executor, ProcessResult, RunOptions, SshConfig};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::debug;

/// Default key size for [`HostCommands::keygen`]
pub const DEFAULT_KEY_BITS: u32 = 4048;

/// Errors from host helpers
#[derive(Error, Debug)]
pub enum HostError {
    /// The command ran but exited unsuccessfully
    #[error("`{command}` failed: {message}")]
    CommandFailed {
        /// The command line that failed
        command: String,
        /// Exit code, absent when killed by a signal
        code: Option<i32>,
        /// Stderr lines joined by spaces
        message: String,
    },

    /// The command succeeded without printing the expected output
    #[error("`{command}` printed nothing")]
    MissingOutput {
        /// The command line that ran
        command: String,
    },

    /// Output pattern failed to compile
    #[error("invalid output pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// The command could not be run
    #[error(transparent)]
    Exec(#[from] remote_exec::Error),
}

/// Result type for host helpers
pub type Result<T> = std::result::Result<T, HostError>;

/// One interface block of `ifconfig` output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    /// Interface name, e.g. `eth0`
    pub name: String,
    /// IPv4 address
    pub inet_address: Option<String>,
    /// IPv6 address
    pub inet6_address: Option<String>,
    /// Broadcast address
    pub bcast_address: Option<String>,
    /// Network mask
    pub mask: Option<String>,
    /// The unparsed block
    pub raw: String,
}

/// Host helpers over an executor
#[derive(Debug, Clone)]
pub struct HostCommands {
    executor: Executor,
    options: RunOptions,
}

impl HostCommands {
    /// Wrap an executor
    pub fn new(executor: Executor) -> Self {
        Self {
            executor,
            options: RunOptions::default(),
        }
    }

    /// Run every helper with `options`
    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// The underlying executor
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    async fn run(&self, command: Command) -> Result<ProcessResult> {
        let command_line = command.to_command_line();
        debug!("host command `{}`", command_line);
        match self.executor.collect(command, &self.options).await {
            Ok(result) => Ok(result),
            Err(remote_exec::Error::NonZeroExit(result)) => Err(HostError::CommandFailed {
                command: command_line,
                code: result.code,
                message: result.err.join(" "),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Create a user with a home directory
    pub async fn add_user(&self, user: &str) -> Result<()> {
        self.run(Command::builder("useradd").args(["-m", user]).build())
            .await?;
        Ok(())
    }

    /// Delete a user
    pub async fn remove_user(&self, user: &str) -> Result<()> {
        self.run(Command::builder("deluser").arg(user).build()).await?;
        Ok(())
    }

    /// Names of all accounts in `/etc/passwd`
    pub async fn list_users(&self) -> Result<BTreeSet<String>> {
        let result = self
            .run(
                Command::builder("cut")
                    .args(["-d:", "-f1", "/etc/passwd"])
                    .build(),
            )
            .await?;
        Ok(parse_users(&result.out))
    }

    /// Contents of a file, lines joined by `\n`
    pub async fn cat(&self, file: &str) -> Result<String> {
        let result = self.run(Command::builder("cat").arg(file).build()).await?;
        Ok(result.stdout_text())
    }

    /// Change the mode of a file; `mode` is written in octal, e.g. `0o644`
    pub async fn chmod(&self, file: &str, mode: u32) -> Result<()> {
        self.run(
            Command::builder("chmod")
                .arg(format!("{:o}", mode))
                .arg(file)
                .build(),
        )
        .await?;
        Ok(())
    }

    /// Recursively change the owner of a path
    pub async fn chown(&self, path: &str, user: &str, group: &str) -> Result<()> {
        self.run(
            Command::builder("chown")
                .arg("-R")
                .arg(format!("{}:{}", user, group))
                .arg(path)
                .build(),
        )
        .await?;
        Ok(())
    }

    /// Create a directory
    pub async fn mkdir(&self, dir: &str) -> Result<()> {
        self.run(Command::builder("mkdir").arg(dir).build()).await?;
        Ok(())
    }

    /// Remove a file or directory tree
    pub async fn remove(&self, path: &str) -> Result<()> {
        self.run(Command::builder("rm").args(["-rf", path]).build())
            .await?;
        Ok(())
    }

    /// Host name of the target
    pub async fn hostname(&self) -> Result<String> {
        let result = self.run(Command::new("hostname")).await?;
        result
            .out
            .into_iter()
            .next()
            .ok_or_else(|| HostError::MissingOutput {
                command: "hostname".to_string(),
            })
    }

    /// Network interfaces of the target, keyed by name
    pub async fn ifconfig(&self) -> Result<BTreeMap<String, NetworkInterface>> {
        let result = self.run(Command::new("ifconfig")).await?;
        parse_ifconfig(&result.stdout_text())
    }

    /// Generate an SSH key pair at `destination`
    ///
    /// `bits` defaults to [`DEFAULT_KEY_BITS`]. An empty passphrase creates
    /// an unencrypted key.
    pub async fn keygen(
        &self,
        passphrase: &str,
        destination: &str,
        bits: Option<u32>,
    ) -> Result<()> {
        self.run(keygen_command(passphrase, destination, bits)).await?;
        Ok(())
    }
}

fn keygen_command(passphrase: &str, destination: &str, bits: Option<u32>) -> Command {
    Command::builder("ssh-keygen")
        .arg("-b")
        .arg(bits.unwrap_or(DEFAULT_KEY_BITS).to_string())
        .arg("-N")
        .arg(passphrase)
        .arg("-f")
        .arg(destination)
        .build()
}

/// Connect like [`remote_exec::executor`] and wrap the result
pub async fn host_commands(config: Option<SshConfig>) -> Result<HostCommands> {
    Ok(HostCommands::new(remote_exec::executor(config).await?))
}

/// Account names from `cut -d: -f1 /etc/passwd` output
pub fn parse_users<S: AsRef<str>>(lines: &[S]) -> BTreeSet<String> {
    lines
        .iter()
        .map(|line| line.as_ref().trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split `ifconfig` output into interface blocks
///
/// Blocks are separated by a blank line. The name is the text before the
/// first space, without a trailing colon. Addresses are read from the
/// net-tools `inet addr:`, `inet6 addr:`, `Bcast:` and `Mask:` fields.
pub fn parse_ifconfig(output: &str) -> Result<BTreeMap<String, NetworkInterface>> {
    let inet = Regex::new(r"inet addr:[ ]*([^ \n]*)")?;
    let inet6 = Regex::new(r"inet6 addr:[ ]*([^ \n]*)")?;
    let bcast = Regex::new(r"Bcast:[ ]*([^ \n]*)")?;
    let mask = Regex::new(r"Mask:[ ]*([^ \n]*)")?;

    let capture = |re: &Regex, block: &str| {
        re.captures(block)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    };

    let mut interfaces = BTreeMap::new();
    for block in output.split("\n\n") {
        if block.trim().is_empty() {
            continue;
        }
        let name = block
            .split(' ')
            .next()
            .unwrap_or_default()
            .trim()
            .trim_end_matches(':')
            .to_string();

        let interface = NetworkInterface {
            inet_address: capture(&inet, block),
            inet6_address: capture(&inet6, block),
            bcast_address: capture(&bcast, block),
            mask: capture(&mask, block),
            raw: block.to_string(),
            name: name.clone(),
        };
        interfaces.insert(name, interface);
    }
    Ok(interfaces)
}

//! `rexec`: run one command locally or over SSH

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use remote_exec::{Command, Error, Executor, ProcessEventType, RunOptions, SshConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{parse_env, FileConfig};

#[derive(Parser, Debug)]
#[command(name = "rexec")]
#[command(about = "Run a command locally or on a remote host over SSH")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Remote host; runs locally when neither this nor a config connection is given
    #[arg(long)]
    host: Option<String>,

    /// SSH user
    #[arg(short, long)]
    user: Option<String>,

    /// SSH port
    #[arg(short, long)]
    port: Option<u16>,

    /// SSH identity file
    #[arg(short, long)]
    identity: Option<PathBuf>,

    /// Quiescence timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// JSON decode attempts
    #[arg(long)]
    tries: Option<u32>,

    /// Decode stdout as JSON and pretty-print it
    #[arg(long)]
    json: bool,

    /// Working directory for the command
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Environment override, repeatable
    #[arg(short, long, value_name = "KEY=VALUE")]
    env: Vec<String>,

    /// The command and its arguments
    #[arg(last = true, required = true)]
    argv: Vec<String>,
}

impl Cli {
    /// Load the config file, then apply flags on top of it
    fn resolve(&self) -> Result<FileConfig> {
        let mut config = match &self.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        if let Some(host) = &self.host {
            match config.connection.as_mut() {
                Some(connection) => connection.host = host.clone(),
                None => config.connection = Some(SshConfig::new(host.clone())),
            }
        }
        if let Some(user) = &self.user {
            config.connection_mut("--user")?.user = Some(user.clone());
        }
        if let Some(port) = self.port {
            config.connection_mut("--port")?.port = Some(port);
        }
        if let Some(identity) = &self.identity {
            config.connection_mut("--identity")?.identity_file = Some(identity.clone());
        }

        if let Some(ms) = self.timeout_ms {
            config.run.collect_timeout = Duration::from_millis(ms);
        }
        if let Some(tries) = self.tries {
            config.run.collect_tries = tries;
        }
        if let Some(cwd) = &self.cwd {
            config.run.cwd = Some(cwd.clone());
        }
        for pair in &self.env {
            let (key, value) = parse_env(pair)?;
            config.run.env.insert(key, value);
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let code = smol::block_on(run(cli))?;
    std::process::exit(code)
}

async fn run(cli: Cli) -> Result<i32> {
    let config = cli.resolve()?;
    let command = Command::from_argv(cli.argv.iter().cloned())?;

    let executor = remote_exec::executor(config.connection.clone())
        .await
        .context("failed to create executor")?;
    debug!("running `{}` on {}", command, executor.description());

    let outcome = if cli.json {
        print_json(&executor, command, &config.run).await
    } else {
        stream(&executor, command, &config.run).await
    };

    let closed = executor.close().await;
    let code = outcome?;
    closed.context("failed to close connection")?;
    Ok(code)
}

/// Print output lines as they arrive and return the exit code
async fn stream(executor: &Executor, command: Command, options: &RunOptions) -> Result<i32> {
    let mut handle = executor.execute(command, options);
    handle.stdin_mut().close();

    while let Some(event) = handle.next().await {
        if let Some(err) = event.to_error() {
            return Err(err.into());
        }
        match event.event_type {
            ProcessEventType::Stdout => println!("{}", event.data.unwrap_or_default()),
            ProcessEventType::Stderr => eprintln!("{}", event.data.unwrap_or_default()),
            ProcessEventType::Exited { code, signal } => {
                if let Some(signal) = signal {
                    warn!("command terminated by {}", signal);
                }
                return Ok(code.unwrap_or(1));
            }
            ProcessEventType::Failed { .. } => {}
        }
    }
    Err(Error::Incomplete.into())
}

/// Collect stdout as JSON and pretty-print it
async fn print_json(executor: &Executor, command: Command, options: &RunOptions) -> Result<i32> {
    match executor.collect_json::<serde_json::Value>(command, options).await {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(0)
        }
        Err(Error::NonZeroExit(result)) => {
            for line in &result.err {
                eprintln!("{}", line);
            }
            Ok(result.code.unwrap_or(1))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_argv_after_separator() {
        let cli = parse(&["rexec", "--json", "--", "ls", "-l", "my dir"]);
        assert!(cli.json);
        assert_eq!(cli.argv, ["ls", "-l", "my dir"]);
    }

    #[test]
    fn test_argv_is_required() {
        assert!(Cli::try_parse_from(["rexec"]).is_err());
    }

    #[test]
    fn test_flags_without_config_run_locally() {
        let cli = parse(&["rexec", "--timeout-ms", "250", "-e", "A=1", "--", "true"]);
        let config = cli.resolve().unwrap();

        assert!(config.connection.is_none());
        assert_eq!(config.run.collect_timeout, Duration::from_millis(250));
        assert_eq!(config.run.env["A"], "1");
    }

    #[test]
    fn test_ssh_flags_need_a_host() {
        let cli = parse(&["rexec", "--user", "ops", "--", "true"]);
        assert!(cli.resolve().is_err());

        let cli = parse(&["rexec", "--host", "db-1", "--user", "ops", "-p", "2200", "--", "true"]);
        let connection = cli.resolve().unwrap().connection.unwrap();
        assert_eq!(connection.host_string(), "ops@db-1");
        assert_eq!(connection.port, Some(2200));
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rexec.yaml");
        std::fs::write(
            &path,
            "connection:\n  host: db-1\n  user: deploy\n\
             run:\n  collect_tries: 2\n  env:\n    A: file\n",
        )
        .unwrap();

        let cli = parse(&[
            "rexec",
            "--config",
            path.to_str().unwrap(),
            "--host",
            "db-2",
            "--tries",
            "7",
            "--env",
            "A=flag",
            "--",
            "uptime",
        ]);
        let config = cli.resolve().unwrap();

        assert_eq!(config.connection.unwrap().host_string(), "deploy@db-2");
        assert_eq!(config.run.collect_tries, 7);
        assert_eq!(config.run.env["A"], "flag");
    }

    #[cfg(unix)]
    #[test]
    fn test_stream_returns_exit_code() {
        let executor = Executor::local();
        let command = Command::builder("sh").arg("-c").arg("exit 3").build();

        let code = smol::block_on(stream(&executor, command, &RunOptions::default())).unwrap();
        assert_eq!(code, 3);
    }
}

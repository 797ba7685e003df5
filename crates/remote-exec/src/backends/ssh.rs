//! SSH transport using OpenSSH connection multiplexing
//!
//! One ControlMaster connection is opened up front; every command then runs
//! on its own session multiplexed over the master socket.

use async_process::Stdio;
use async_trait::async_trait;
use futures::io::{AsyncReadExt, AsyncWrite};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use super::remote::{Channel, ChannelExit, ChannelOpen, ExecRequest, Transport};
use super::signal_name;
use crate::error::{Error, Result};
use crate::options::{PtyRequest, X11Request};

/// Default session limit, matching the OpenSSH server's `MaxSessions`
pub const DEFAULT_MAX_SESSIONS: usize = 10;

/// SSH connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshConfig {
    /// Target host (hostname or IP)
    pub host: String,
    /// SSH user (optional, uses system default if not specified)
    #[serde(default)]
    pub user: Option<String>,
    /// SSH port (optional, defaults to 22)
    #[serde(default)]
    pub port: Option<u16>,
    /// Path to identity file (private key)
    #[serde(default)]
    pub identity_file: Option<PathBuf>,
    /// Additional SSH arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
    /// Concurrent sessions allowed on the connection
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// Control socket path, generated under the temp dir if unset
    #[serde(default)]
    pub control_path: Option<PathBuf>,
    /// The ssh client binary
    #[serde(default = "default_program")]
    pub program: String,
}

fn default_max_sessions() -> usize {
    DEFAULT_MAX_SESSIONS
}

fn default_program() -> String {
    "ssh".to_string()
}

impl SshConfig {
    /// Create a new SSH configuration for the given host
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: None,
            port: None,
            identity_file: None,
            extra_args: Vec::new(),
            max_sessions: DEFAULT_MAX_SESSIONS,
            control_path: None,
            program: default_program(),
        }
    }

    /// Set the SSH user
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the SSH port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the identity file (private key)
    pub fn with_identity_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity_file = Some(path.into());
        self
    }

    /// Add extra SSH arguments
    pub fn with_extra_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Set the concurrent session limit
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions.max(1);
        self
    }

    /// Use a specific control socket path
    pub fn with_control_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.control_path = Some(path.into());
        self
    }

    /// Use a different ssh client binary
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Get the host string (user@host if user is specified)
    pub fn host_string(&self) -> String {
        if let Some(user) = &self.user {
            format!("{}@{}", user, self.host)
        } else {
            self.host.clone()
        }
    }

    fn connection_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(port) = self.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        if let Some(identity) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity.to_string_lossy().to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// Transport running commands over an OpenSSH ControlMaster connection
pub struct OpenSshTransport {
    config: SshConfig,
    control_path: PathBuf,
    active: Arc<AtomicUsize>,
    closed: AtomicBool,
}

impl OpenSshTransport {
    /// Open the master connection
    ///
    /// Resolves once the connection is authenticated and the master went to
    /// the background.
    pub async fn connect(config: SshConfig) -> Result<Self> {
        let host = config.host_string();
        let control_path = config
            .control_path
            .clone()
            .unwrap_or_else(|| build_control_path(&host));

        let mut cmd = async_process::Command::new(&config.program);
        cmd.arg("-MNf")
            .arg("-o")
            .arg("ControlMaster=yes")
            .arg("-o")
            .arg("ControlPersist=yes")
            .arg("-o")
            .arg(format!("ControlPath={}", control_path.display()))
            .args(config.connection_args())
            .arg(&host);

        // The backgrounded master may keep stdout open, so only stderr is read
        // and only when the foreground process failed.
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());

        debug!("opening ssh master connection to {}", host);
        let mut child = cmd
            .spawn()
            .map_err(|e| Error::connect_failed(&host, e.to_string()))?;
        let status = child
            .status()
            .await
            .map_err(|e| Error::connect_failed(&host, e.to_string()))?;

        if !status.success() {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_string(&mut stderr).await;
            }
            let reason = match stderr.trim() {
                "" => format!("ssh exited with {}", status),
                message => message.to_string(),
            };
            return Err(Error::connect_failed(host, reason));
        }

        info!("connected to {}", host);
        Ok(Self {
            config,
            control_path,
            active: Arc::new(AtomicUsize::new(0)),
            closed: AtomicBool::new(false),
        })
    }

    /// The control socket of the master connection
    pub fn control_path(&self) -> &Path {
        &self.control_path
    }

    /// Number of sessions currently open
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Arguments for one multiplexed session running `request`
    fn session_args(&self, request: &ExecRequest) -> Vec<String> {
        let mut args = Vec::new();
        match request.pty {
            PtyRequest::Off => args.push("-T".to_string()),
            PtyRequest::Default | PtyRequest::Settings(_) => args.push("-tt".to_string()),
        }
        match &request.x11 {
            X11Request::Off => {}
            X11Request::Settings(settings) if settings.trusted => args.push("-Y".to_string()),
            _ => args.push("-X".to_string()),
        }
        args.push("-S".to_string());
        args.push(self.control_path.display().to_string());
        args.push("-o".to_string());
        args.push("ControlMaster=no".to_string());
        args.extend(self.config.connection_args());
        args.push(self.config.host_string());
        args.push(request.command_line.clone());
        args
    }

    /// Environment for the local ssh client of one session
    fn session_env(&self, request: &ExecRequest) -> Vec<(String, String)> {
        let mut env = Vec::new();
        if let PtyRequest::Settings(settings) = &request.pty {
            env.push(("TERM".to_string(), settings.term.clone()));
            env.push(("LINES".to_string(), settings.rows.to_string()));
            env.push(("COLUMNS".to_string(), settings.cols.to_string()));
        }
        let screen = match &request.x11 {
            X11Request::Screen(screen) => Some(*screen),
            X11Request::Settings(settings) => Some(settings.screen),
            _ => None,
        };
        if let Some(screen) = screen {
            let display = std::env::var("DISPLAY").unwrap_or_else(|_| ":0".to_string());
            env.push(("DISPLAY".to_string(), display_with_screen(&display, screen)));
        }
        env
    }

    fn try_acquire(&self) -> Option<SessionPermit> {
        let max = self.config.max_sessions;
        self.active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < max).then_some(n + 1))
            .ok()
            .map(|_| SessionPermit(self.active.clone()))
    }
}

#[async_trait]
impl Transport for OpenSshTransport {
    fn description(&self) -> String {
        format!("ssh://{}", self.config.host_string())
    }

    async fn open_channel(&self, request: &ExecRequest) -> Result<ChannelOpen> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }
        let Some(permit) = self.try_acquire() else {
            return Ok(ChannelOpen::Refused);
        };

        let mut cmd = async_process::Command::new(&self.config.program);
        cmd.args(self.session_args(request));
        cmd.envs(self.session_env(request));
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::channel_failed(format!("failed to start ssh session: {}", e)))?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(Error::channel_failed("ssh session has no output pipes"));
        };
        let stdin = child.stdin.take();

        let exit = async move {
            let status = child.status().await?;
            drop(permit);
            Ok::<_, Error>(ChannelExit {
                code: status.code(),
                signal: signal_name(&status),
            })
        }
        .boxed();

        Ok(ChannelOpen::Granted(Channel {
            stdout: Box::pin(stdout),
            stderr: Box::pin(stderr),
            stdin: stdin.map(|s| Box::pin(s) as Pin<Box<dyn AsyncWrite + Send>>),
            exit,
        }))
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let status = async_process::Command::new(&self.config.program)
            .arg("-S")
            .arg(&self.control_path)
            .arg("-O")
            .arg("exit")
            .arg(self.config.host_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;
        if !status.success() {
            warn!("ssh -O exit for {} returned {}", self.config.host_string(), status);
        }
        remove_socket(&self.control_path);
        Ok(())
    }
}

impl Drop for OpenSshTransport {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = std::process::Command::new(&self.config.program)
            .arg("-S")
            .arg(&self.control_path)
            .arg("-O")
            .arg("exit")
            .arg(self.config.host_string())
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status();
        remove_socket(&self.control_path);
    }
}

/// Releases a session slot when the session ends
struct SessionPermit(Arc<AtomicUsize>);

impl Drop for SessionPermit {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn remove_socket(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("failed to remove control socket {}: {}", path.display(), e);
        }
    }
}

fn build_control_path(host: &str) -> PathBuf {
    let mut hasher = DefaultHasher::new();
    host.hash(&mut hasher);
    std::process::id().hash(&mut hasher);
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .hash(&mut hasher);
    std::env::temp_dir().join(format!("rexec-{:x}.sock", hasher.finish()))
}

/// Replace the screen part of an X display name, `host:0.1` style
fn display_with_screen(display: &str, screen: u32) -> String {
    let (host, rest) = display.rsplit_once(':').unwrap_or(("", display));
    let number = rest.split('.').next().unwrap_or("0");
    let number = if number.is_empty() { "0" } else { number };
    format!("{}:{}.{}", host, number, screen)
}

// Convenience constructors for Executor over OpenSSH
impl crate::executor::Executor {
    /// Connect to `config` and create an executor for it
    pub async fn connect(config: SshConfig) -> Result<Self> {
        Ok(Self::remote(OpenSshTransport::connect(config).await?))
    }
}

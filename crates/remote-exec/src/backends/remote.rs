//! Remote execution over a multiplexed connection
//!
//! A [`Transport`] owns one established connection and hands out channels,
//! one per command. Channel allocation may be refused while the connection
//! is at capacity; [`RemoteLauncher`] retries refusals according to the
//! executor's [`RetryPolicy`](crate::retry::RetryPolicy) without surfacing
//! them.

use async_channel::{Receiver, Sender};
use async_trait::async_trait;
use futures::future::{self, BoxFuture, Either};
use futures::io::{AsyncRead, AsyncWrite};
use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::command::Command;
use crate::error::{Error, Result};
use crate::event::{FailureCause, ProcessEvent};
use crate::launcher::{LaunchContext, Launcher};
use crate::options::{PtyRequest, RunOptions, X11Request};
use crate::process::{pump_lines, EventSender, Launched, OutputChannel};
use crate::quote::quote_argument;
use crate::stdin;

/// A request to run one command on a new channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    /// Full remote command line, including any `cd` and env prefix
    pub command_line: String,
    /// Environment overrides, also offered to the transport directly
    pub env: BTreeMap<String, String>,
    /// Pseudo-terminal request
    pub pty: PtyRequest,
    /// X11 forwarding request
    pub x11: X11Request,
}

impl ExecRequest {
    /// Build a request, folding cwd and env into the command line
    ///
    /// Env overrides are exported before the command runs, so the remote
    /// shell sees them when it expands the command line.
    pub fn new(command_line: &str, options: &RunOptions) -> Self {
        let mut remote = String::new();
        if let Some(dir) = &options.cwd {
            remote.push_str(&format!("cd {} && ", quote_argument(&dir.to_string_lossy())));
        }
        if !options.env.is_empty() {
            let assignments: Vec<_> = options
                .env
                .iter()
                .map(|(key, value)| format!("{}={}", key, quote_argument(value)))
                .collect();
            remote.push_str(&format!("export {} && ", assignments.join(" ")));
        }
        remote.push_str(command_line);

        Self {
            command_line: remote,
            env: options.env.clone(),
            pty: options.pty.clone(),
            x11: options.x11.clone(),
        }
    }
}

/// How a channel finished
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelExit {
    /// Exit code
    pub code: Option<i32>,
    /// Terminating signal name
    pub signal: Option<String>,
}

/// One granted channel
pub struct Channel {
    /// Remote stdout
    pub stdout: Pin<Box<dyn AsyncRead + Send>>,
    /// Remote stderr
    pub stderr: Pin<Box<dyn AsyncRead + Send>>,
    /// Remote stdin, if the transport supports writing to it
    pub stdin: Option<Pin<Box<dyn AsyncWrite + Send>>>,
    /// Resolves with the exit status, possibly before output is drained
    pub exit: BoxFuture<'static, Result<ChannelExit>>,
}

/// Outcome of a channel allocation attempt
pub enum ChannelOpen {
    /// The channel was granted
    Granted(Channel),
    /// The connection is at capacity; try again later
    Refused,
}

/// A connection that can run commands on multiplexed channels
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Short description, e.g. `ssh://user@host`
    fn description(&self) -> String;

    /// Try to open a channel running `request`
    async fn open_channel(&self, request: &ExecRequest) -> Result<ChannelOpen>;

    /// Terminate the connection; must be idempotent
    async fn close(&self) -> Result<()>;
}

/// Launcher running commands on channels of a shared [`Transport`]
pub struct RemoteLauncher<T> {
    transport: Arc<T>,
    closed_tx: Sender<()>,
    closed_rx: Receiver<()>,
}

impl<T: Transport> RemoteLauncher<T> {
    /// Create a launcher over an established transport
    pub fn new(transport: T) -> Self {
        let (closed_tx, closed_rx) = async_channel::bounded(1);
        Self {
            transport: Arc::new(transport),
            closed_tx,
            closed_rx,
        }
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[async_trait]
impl<T: Transport> Launcher for RemoteLauncher<T> {
    fn description(&self) -> String {
        self.transport.description()
    }

    fn launch(&self, command: &Command, options: &RunOptions, ctx: &LaunchContext) -> Launched {
        if self.closed_tx.is_closed() {
            return Launched::failed(ProcessEvent::failed(
                FailureCause::ConnectionClosed,
                "executor is closed",
            ));
        }

        let request = ExecRequest::new(&command.to_command_line(), options);
        let transport = self.transport.clone();
        let closed = self.closed_rx.clone();
        // Only close() fires the signal, dropping the executor does not
        let open = self.closed_tx.clone();
        let spawner = ctx.spawner.clone();
        let ctx = ctx.clone();

        Launched::drive(spawner.as_ref(), move |events, stdin_queue| async move {
            let _open = open;
            let run = drive(transport, request, ctx, events.clone(), stdin_queue);
            let closed = closed.recv();
            futures::pin_mut!(run, closed);
            if let Either::Right(_) = future::select(run, closed).await {
                events.send(ProcessEvent::failed(
                    FailureCause::ConnectionClosed,
                    "connection closed while the command was running",
                ));
            }
        })
    }

    async fn close(&self) -> Result<()> {
        if !self.closed_tx.close() {
            return Ok(());
        }
        debug!("closing {}", self.transport.description());
        self.transport.close().await
    }
}

async fn drive<T: Transport>(
    transport: Arc<T>,
    request: ExecRequest,
    ctx: LaunchContext,
    events: EventSender,
    stdin_queue: Receiver<Vec<u8>>,
) {
    let (transport, request) = (&transport, &request);
    let opened = ctx
        .retry
        .run(ctx.clock.as_ref(), move || async move {
            Ok(match transport.open_channel(request).await? {
                ChannelOpen::Granted(channel) => Some(channel),
                ChannelOpen::Refused => None,
            })
        })
        .await;

    let channel = match opened {
        Ok(channel) => channel,
        Err(e) => {
            debug!("failed to open channel for `{}`: {}", request.command_line, e);
            let cause = match e {
                Error::ChannelRefused { attempts } => FailureCause::Refused { attempts },
                Error::ConnectionClosed => FailureCause::ConnectionClosed,
                _ => FailureCause::Channel,
            };
            events.send(ProcessEvent::failed(cause, e.to_string()));
            return;
        }
    };
    debug!("channel granted for `{}`", request.command_line);

    let Channel {
        stdout,
        stderr,
        stdin: channel_stdin,
        exit,
    } = channel;

    let finished = future::join3(
        pump_lines(stdout, OutputChannel::Stdout, &events),
        pump_lines(stderr, OutputChannel::Stderr, &events),
        exit,
    );
    let input = async move {
        if let Some(channel_stdin) = channel_stdin {
            stdin::forward(stdin_queue, channel_stdin).await;
        }
    };

    futures::pin_mut!(finished, input);
    let ((), (), exit) = match future::select(finished, input).await {
        Either::Left((done, _)) => done,
        Either::Right((_, finished)) => finished.await,
    };

    match exit {
        Ok(exit) => events.send(ProcessEvent::exited(exit.code, exit.signal)),
        Err(e) => {
            warn!("channel for `{}` ended without exit status: {}", request.command_line, e);
            events.send(ProcessEvent::failed(FailureCause::Channel, e.to_string()));
        }
    }
}

// Convenience constructor for Executor with RemoteLauncher
impl crate::executor::Executor {
    /// Create an executor over an established transport
    pub fn remote<T: Transport>(transport: T) -> Self {
        Self::new(RemoteLauncher::new(transport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_request_plain() {
        let request = ExecRequest::new("echo hi", &RunOptions::default());
        assert_eq!(request.command_line, "echo hi");
        assert_eq!(request.pty, PtyRequest::Off);
    }

    #[test]
    fn test_exec_request_folds_cwd_and_env() {
        let options = RunOptions::new()
            .cwd("/srv/my app")
            .env("A", "1")
            .env("B", "two words");
        let request = ExecRequest::new("ls", &options);

        assert_eq!(
            request.command_line,
            "cd \"/srv/my app\" && export A=1 B=\"two words\" && ls"
        );
        assert_eq!(request.env.len(), 2);
    }

    #[test]
    fn test_exec_request_env_precedes_expansion() {
        let options = RunOptions::new().env("NAME", "hi");
        let request = ExecRequest::new("echo $NAME", &options);

        assert_eq!(request.command_line, "export NAME=hi && echo $NAME");
    }
}

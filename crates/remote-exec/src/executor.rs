//! The executor: one front for local and remote command execution

use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

use crate::backends::{LocalLauncher, SshConfig};
use crate::clock::{Clock, SystemClock};
use crate::collect::{collect_events, decode_json};
use crate::command::Command;
use crate::error::Result;
use crate::launcher::{LaunchContext, Launcher};
use crate::options::RunOptions;
use crate::process::ProcessHandle;
use crate::result::ProcessResult;
use crate::retry::RetryPolicy;
use crate::spawn::{Spawner, ThreadSpawner};

pub(crate) struct ExecutorInner {
    launcher: Arc<dyn Launcher>,
    ctx: LaunchContext,
}

/// Runs commands through one launcher
///
/// Cloning is cheap and every clone shares the same transport. Handles keep
/// only a weak reference back to their executor.
#[derive(Clone)]
pub struct Executor {
    inner: Arc<ExecutorInner>,
}

impl Executor {
    /// Create an executor over any launcher
    pub fn new<L: Launcher>(launcher: L) -> Self {
        Self {
            inner: Arc::new(ExecutorInner {
                launcher: Arc::new(launcher),
                ctx: LaunchContext {
                    clock: Arc::new(SystemClock),
                    retry: RetryPolicy::default(),
                    spawner: Arc::new(ThreadSpawner),
                },
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ExecutorInner>) -> Self {
        Self { inner }
    }

    fn with_context(&self, ctx: LaunchContext) -> Self {
        Self {
            inner: Arc::new(ExecutorInner {
                launcher: self.inner.launcher.clone(),
                ctx,
            }),
        }
    }

    /// Use another time source for retry delays and quiescence
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        self.with_context(LaunchContext {
            clock,
            ..self.inner.ctx.clone()
        })
    }

    /// Use another policy for refused channel allocations
    pub fn with_retry_policy(self, retry: RetryPolicy) -> Self {
        self.with_context(LaunchContext {
            retry,
            ..self.inner.ctx.clone()
        })
    }

    /// Run command drivers on another spawner, e.g. the caller's runtime
    pub fn with_spawner(self, spawner: Arc<dyn Spawner>) -> Self {
        self.with_context(LaunchContext {
            spawner,
            ..self.inner.ctx.clone()
        })
    }

    /// Transport description, `local` or `ssh://user@host:port`
    pub fn description(&self) -> String {
        self.inner.launcher.description()
    }

    /// The time source used by this executor
    pub fn clock(&self) -> &dyn Clock {
        self.inner.ctx.clock.as_ref()
    }

    /// Start `command` and return a live handle
    ///
    /// The command is dispatched before this returns, whether or not the
    /// handle is ever polled. Never fails directly: launch problems arrive
    /// as the handle's terminal `Failed` event.
    pub fn execute(&self, command: Command, options: &RunOptions) -> ProcessHandle {
        let command_line = command.to_command_line();
        debug!(transport = %self.description(), "executing `{}`", command_line);

        let launched = self.inner.launcher.launch(&command, options, &self.inner.ctx);
        ProcessHandle::new(launched, command_line).with_executor(Arc::downgrade(&self.inner))
    }

    /// Run `command` to completion and collect its output
    ///
    /// Stdin is closed right away. Fails with
    /// [`Error::NonZeroExit`](crate::Error::NonZeroExit) unless the exit
    /// code is 0.
    pub async fn collect(&self, command: Command, options: &RunOptions) -> Result<ProcessResult> {
        let mut handle = self.execute(command, options);
        handle.stdin_mut().close();
        collect_events(&mut handle, options.collect_timeout, self.clock()).await
    }

    /// Run `command`, collect it, and decode its stdout as JSON
    pub async fn collect_json<T: DeserializeOwned>(
        &self,
        command: Command,
        options: &RunOptions,
    ) -> Result<T> {
        let result = self.collect(command, options).await?;
        decode_json(&result, options.collect_tries, options.collect_timeout, self.clock()).await
    }

    /// Release the transport
    ///
    /// Idempotent. Remote commands still running fail with
    /// [`Error::ConnectionClosed`](crate::Error::ConnectionClosed); commands
    /// started afterwards fail immediately.
    pub async fn close(&self) -> Result<()> {
        self.inner.launcher.close().await
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("transport", &self.description())
            .field("retry", &self.inner.ctx.retry)
            .finish()
    }
}

/// Create an executor: local without a config, remote over SSH with one
///
/// Resolves once the remote connection is established.
pub async fn executor(config: Option<SshConfig>) -> Result<Executor> {
    match config {
        None => Ok(Executor::new(LocalLauncher)),
        Some(config) => Executor::connect(config).await,
    }
}

//! Local process execution backend

use async_channel::Receiver;
use async_process::{Child, Stdio};
use async_trait::async_trait;
use futures::future::{self, Either};
use tracing::debug;

use crate::command::Command;
use crate::event::{FailureCause, ProcessEvent};
use crate::launcher::{LaunchContext, Launcher};
use crate::options::{PtyRequest, RunOptions, X11Request};
use crate::process::{pump_lines, EventSender, Launched, OutputChannel};
use crate::stdin;

use super::signal_name;

/// Launcher for executing processes locally
///
/// The program is spawned directly with its arguments, without a shell.
/// A program that cannot be found fails the launch.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalLauncher;

#[async_trait]
impl Launcher for LocalLauncher {
    fn description(&self) -> String {
        "local".to_string()
    }

    fn launch(&self, command: &Command, options: &RunOptions, ctx: &LaunchContext) -> Launched {
        if options.pty != PtyRequest::Off || options.x11 != X11Request::Off {
            debug!("pty and x11 requests are ignored for local processes");
        }

        let mut cmd = async_process::Command::new(command.get_program());
        cmd.args(command.get_args());
        cmd.envs(&options.env);
        if let Some(dir) = &options.cwd {
            cmd.current_dir(dir);
        }

        // Configure stdio for streaming
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                debug!("failed to spawn `{}`: {}", command, e);
                return Launched::failed(ProcessEvent::failed(FailureCause::Spawn, e.to_string()));
            }
        };
        debug!(pid = child.id(), "spawned `{}`", command);

        Launched::drive(ctx.spawner.as_ref(), move |events, stdin_queue| {
            drive(child, events, stdin_queue)
        })
    }
}

async fn drive(mut child: Child, events: EventSender, stdin_queue: Receiver<Vec<u8>>) {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let child_stdin = child.stdin.take();

    let output = future::join(
        async {
            if let Some(stdout) = stdout {
                pump_lines(stdout, OutputChannel::Stdout, &events).await;
            }
        },
        async {
            if let Some(stderr) = stderr {
                pump_lines(stderr, OutputChannel::Stderr, &events).await;
            }
        },
    );
    let input = async move {
        if let Some(child_stdin) = child_stdin {
            stdin::forward(stdin_queue, child_stdin).await;
        }
    };

    futures::pin_mut!(output, input);
    if let Either::Right((_, output)) = future::select(output, input).await {
        output.await;
    }

    match child.status().await {
        Ok(status) => events.send(ProcessEvent::exited(status.code(), signal_name(&status))),
        Err(e) => events.send(ProcessEvent::failed(
            FailureCause::Spawn,
            format!("failed to wait for process: {}", e),
        )),
    }
}

// Convenience constructor for Executor with LocalLauncher
impl crate::executor::Executor {
    /// Create an executor for local process execution
    pub fn local() -> Self {
        Self::new(LocalLauncher)
    }
}

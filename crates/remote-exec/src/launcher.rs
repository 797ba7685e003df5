//! Launcher trait for executing commands over one transport

use async_trait::async_trait;
use std::sync::Arc;

use crate::clock::Clock;
use crate::command::Command;
use crate::error::Result;
use crate::options::RunOptions;
use crate::process::Launched;
use crate::spawn::Spawner;

/// Shared state an executor passes to its launcher for every dispatch
#[derive(Clone)]
pub struct LaunchContext {
    /// Time source for retry delays
    pub clock: Arc<dyn Clock>,
    /// Policy for transient channel refusals
    pub retry: crate::retry::RetryPolicy,
    /// Runs the driver behind every handle
    pub spawner: Arc<dyn Spawner>,
}

/// A launcher that can start a command over a specific transport
#[async_trait]
pub trait Launcher: Send + Sync + 'static {
    /// Short transport description for logging
    fn description(&self) -> String;

    /// Start `command` and return its events and stdin
    ///
    /// Must not block: slow work is handed to `ctx.spawner` and starts
    /// right away. Failures are reported as a terminal `Failed` event.
    fn launch(&self, command: &Command, options: &RunOptions, ctx: &LaunchContext) -> Launched;

    /// Release the transport; must be idempotent
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

//! Runtime-agnostic local and remote command execution
//!
//! This crate runs a command and streams its output the same way whether it
//! runs as a local process or on a remote host over a multiplexed SSH
//! connection. On top of the live [`ProcessHandle`] stream it offers a
//! collector that reduces a run to a [`ProcessResult`], and a JSON variant
//! that decodes stdout.
//!
//! ```no_run
//! use remote_exec::{Command, Executor, RunOptions};
//!
//! # async fn run() -> remote_exec::Result<()> {
//! let executor = Executor::local();
//! let result = executor
//!     .collect(Command::builder("echo").arg("hello world").build(), &RunOptions::default())
//!     .await?;
//! assert_eq!(result.out, ["hello world"]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod backends;
pub mod clock;
pub mod collect;
pub mod command;
pub mod error;
pub mod event;
pub mod executor;
pub mod launcher;
pub mod line;
pub mod options;
pub mod process;
pub mod quote;
pub mod result;
pub mod retry;
pub mod spawn;
pub mod stdin;

pub use backends::{OpenSshTransport, SshConfig, Transport};
pub use clock::{Clock, SystemClock};
pub use command::Command;
pub use error::{Error, Result};
pub use event::{FailureCause, ProcessEvent, ProcessEventType};
pub use executor::{executor, Executor};
pub use launcher::Launcher;
pub use options::{PtyRequest, PtySettings, RunOptions, X11Request, X11Settings};
pub use process::ProcessHandle;
pub use result::{ExitStatus, ProcessResult};
pub use retry::RetryPolicy;
pub use spawn::{Spawner, ThreadSpawner};
pub use stdin::StdinHandle;

//! Process handles

use async_channel::Sender;
use futures::io::{AsyncRead, AsyncReadExt};
use futures::stream::{BoxStream, Stream, StreamExt};
use futures::FutureExt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};

use crate::error::{Error, Result};
use crate::event::{ProcessEvent, ProcessEventType};
use crate::executor::{Executor, ExecutorInner};
use crate::line::LineDemux;
use crate::result::ExitStatus;
use crate::spawn::Spawner;
use crate::stdin::StdinHandle;

/// A live command
///
/// A stream of [`ProcessEvent`]s: output lines for each channel, then
/// exactly one terminal event (`Exited` or `Failed`), after which the stream
/// ends. The command runs in the background; events are buffered until the
/// stream is polled.
pub struct ProcessHandle {
    events: BoxStream<'static, ProcessEvent>,
    stdin: StdinHandle,
    command_line: String,
    executor: Weak<ExecutorInner>,
    finished: bool,
}

impl ProcessHandle {
    /// Build a handle from a launched event stream
    pub fn new(launched: Launched, command_line: String) -> Self {
        Self {
            events: launched.events,
            stdin: launched.stdin,
            command_line,
            executor: Weak::new(),
            finished: false,
        }
    }

    pub(crate) fn with_executor(mut self, executor: Weak<ExecutorInner>) -> Self {
        self.executor = executor;
        self
    }

    /// The command line as dispatched to the transport
    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    /// Stdin of the process
    pub fn stdin_mut(&mut self) -> &mut StdinHandle {
        &mut self.stdin
    }

    /// The executor that started this process, if it is still alive
    pub fn executor(&self) -> Option<Executor> {
        self.executor.upgrade().map(Executor::from_inner)
    }

    /// Returns true once the terminal event was yielded
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Drain the remaining events and return the exit status
    ///
    /// Output lines are discarded; use the collector to keep them.
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        while let Some(event) = self.next().await {
            if let Some(err) = event.to_error() {
                return Err(err);
            }
            if let ProcessEventType::Exited { code, signal } = event.event_type {
                return Ok(ExitStatus { code, signal });
            }
        }
        Err(Error::Incomplete)
    }
}

impl Stream for ProcessHandle {
    type Item = ProcessEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match self.events.poll_next_unpin(cx) {
            Poll::Ready(Some(event)) => {
                if event.is_terminal() {
                    self.finished = true;
                }
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("command_line", &self.command_line)
            .field("finished", &self.finished)
            .finish()
    }
}

/// What a launcher hands back for one dispatched command
pub struct Launched {
    /// Events of the command
    pub events: BoxStream<'static, ProcessEvent>,
    /// Stdin of the command
    pub stdin: StdinHandle,
}

impl Launched {
    /// Start a driver that reports through `EventSender`
    ///
    /// The driver is spawned at once. The event stream ends after the
    /// driver finished and every event was read.
    pub fn drive<F, D>(spawner: &dyn Spawner, driver: F) -> Self
    where
        F: FnOnce(EventSender, async_channel::Receiver<Vec<u8>>) -> D,
        D: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = async_channel::unbounded();
        let (stdin, stdin_queue) = StdinHandle::channel();
        spawner.spawn_detached(driver(EventSender(tx), stdin_queue).boxed());
        Self {
            events: rx.boxed(),
            stdin,
        }
    }

    /// A launch that failed before anything ran
    pub fn failed(event: ProcessEvent) -> Self {
        let (stdin, _) = StdinHandle::channel();
        Self {
            events: futures::stream::iter([event]).boxed(),
            stdin,
        }
    }
}

/// Sending side of a process event stream
#[derive(Clone)]
pub struct EventSender(Sender<ProcessEvent>);

impl EventSender {
    /// Emit an event; a dropped handle is not an error
    pub fn send(&self, event: ProcessEvent) {
        let _ = self.0.try_send(event);
    }
}

/// Which output channel a reader belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputChannel {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

/// Read `reader` to end of file, emitting one event per complete line
pub async fn pump_lines<R>(mut reader: R, channel: OutputChannel, events: &EventSender)
where
    R: AsyncRead + Unpin,
{
    let mut demux = LineDemux::new();
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                for line in demux.push(&buf[..n]) {
                    events.send(match channel {
                        OutputChannel::Stdout => ProcessEvent::stdout(line),
                        OutputChannel::Stderr => ProcessEvent::stderr(line),
                    });
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!("{:?} read failed: {}", channel, e);
                break;
            }
        }
    }
    if !demux.pending().is_empty() {
        tracing::trace!(
            "{:?} closed with {} unterminated bytes",
            channel,
            demux.pending().len()
        );
    }
}

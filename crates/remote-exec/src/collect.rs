//! Reducing a live process into a single result
//!
//! Exit status and the final output flush are not ordered on every
//! transport, so completion is decided by a quiet period: after the exit
//! event, the collector keeps listening until no line has arrived for the
//! whole quiescence timeout.

use futures::future::{self, Either};
use futures::stream::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::event::{ProcessEvent, ProcessEventType};
use crate::result::ProcessResult;

#[derive(Default)]
struct Buffers {
    out: Vec<String>,
    err: Vec<String>,
    last_line: Option<Instant>,
}

impl Buffers {
    /// Record an output line; returns false for any other event
    fn record(&mut self, event: ProcessEvent, clock: &dyn Clock) -> bool {
        let buffer = match event.event_type {
            ProcessEventType::Stdout => &mut self.out,
            ProcessEventType::Stderr => &mut self.err,
            _ => return false,
        };
        buffer.push(event.data.unwrap_or_default());
        self.last_line = Some(clock.now());
        true
    }
}

/// Collect a process event stream into a [`ProcessResult`]
///
/// Resolves with the result if the exit code is 0, otherwise fails with
/// [`Error::NonZeroExit`] carrying the same result. A `Failed` event fails
/// immediately with the matching error.
pub async fn collect_events<S>(
    events: S,
    timeout: Duration,
    clock: &dyn Clock,
) -> Result<ProcessResult>
where
    S: Stream<Item = ProcessEvent>,
{
    let mut events = std::pin::pin!(events);
    let mut buffers = Buffers::default();

    let (code, signal) = loop {
        let Some(event) = events.next().await else {
            return Err(Error::Incomplete);
        };
        if let Some(err) = event.to_error() {
            return Err(err);
        }
        if let ProcessEventType::Exited { code, signal } = event.event_type {
            break (code, signal);
        }
        buffers.record(event, clock);
    };

    // One timer, re-armed only when it fires too early.
    let mut timer = clock.sleep(timeout);
    let mut open = true;
    loop {
        if open {
            match future::select(&mut timer, events.next()).await {
                Either::Left(_) => {}
                Either::Right((Some(event), _)) => {
                    buffers.record(event, clock);
                    continue;
                }
                Either::Right((None, _)) => {
                    open = false;
                    continue;
                }
            }
        } else {
            (&mut timer).await;
        }

        match buffers.last_line {
            Some(last) => {
                let since = clock.now().saturating_duration_since(last);
                if since >= timeout {
                    break;
                }
                timer = clock.sleep(timeout - since);
            }
            None => break,
        }
    }

    let result = ProcessResult {
        code,
        signal,
        out: buffers.out,
        err: buffers.err,
    };
    if result.success() {
        Ok(result)
    } else {
        Err(Error::NonZeroExit(Box::new(result)))
    }
}

/// Decode collected stdout as JSON, retrying up to `tries` attempts
///
/// Every attempt parses the same already collected text; the command is
/// not run again.
pub async fn decode_json<T: DeserializeOwned>(
    result: &ProcessResult,
    tries: u32,
    interval: Duration,
    clock: &dyn Clock,
) -> Result<T> {
    let text = result.stdout_text();
    let tries = tries.max(1);
    let mut attempts = 0;
    loop {
        attempts += 1;
        match serde_json::from_str(&text) {
            Ok(value) => return Ok(value),
            Err(source) if attempts >= tries => return Err(Error::JsonDecode { attempts, source }),
            Err(e) => {
                debug!(attempts, "output is not valid JSON yet: {}", e);
                clock.sleep(interval).await;
            }
        }
    }
}

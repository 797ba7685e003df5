//! Raw process events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A raw event from a process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessEvent {
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// The type of event
    pub event_type: ProcessEventType,
    /// The line for output events, the reason for failures
    pub data: Option<String>,
}

impl ProcessEvent {
    /// Create a new process event
    pub fn new(event_type: ProcessEventType) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            data: None,
        }
    }

    /// Create a new process event with data
    pub fn new_with_data(event_type: ProcessEventType, data: String) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            data: Some(data),
        }
    }

    /// A stdout line
    pub fn stdout(line: impl Into<String>) -> Self {
        Self::new_with_data(ProcessEventType::Stdout, line.into())
    }

    /// A stderr line
    pub fn stderr(line: impl Into<String>) -> Self {
        Self::new_with_data(ProcessEventType::Stderr, line.into())
    }

    /// Normal completion
    pub fn exited(code: Option<i32>, signal: Option<String>) -> Self {
        Self::new(ProcessEventType::Exited { code, signal })
    }

    /// Fatal failure before or instead of completion
    pub fn failed(cause: FailureCause, reason: impl Into<String>) -> Self {
        Self::new_with_data(ProcessEventType::Failed { cause }, reason.into())
    }

    /// Returns true for `Exited` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.event_type,
            ProcessEventType::Exited { .. } | ProcessEventType::Failed { .. }
        )
    }

    /// Convert a `Failed` event into the matching error
    pub fn to_error(&self) -> Option<Error> {
        let ProcessEventType::Failed { cause } = &self.event_type else {
            return None;
        };
        let reason = self.data.clone().unwrap_or_default();
        Some(match cause {
            FailureCause::Spawn => Error::SpawnFailed { reason },
            FailureCause::Channel => Error::ChannelFailed { reason },
            FailureCause::Refused { attempts } => Error::ChannelRefused {
                attempts: *attempts,
            },
            FailureCause::ConnectionClosed => Error::ConnectionClosed,
        })
    }
}

/// Types of raw process events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProcessEventType {
    /// Line from stdout
    Stdout,
    /// Line from stderr
    Stderr,
    /// Process has exited; always the last event
    Exited {
        /// Exit code, absent when killed by a signal
        code: Option<i32>,
        /// Terminating signal name
        signal: Option<String>,
    },
    /// The process could not be run; terminal, exclusive with `Exited`
    Failed {
        /// What went wrong
        cause: FailureCause,
    },
}

/// Why a process failed to run to completion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FailureCause {
    /// The local process could not be spawned
    Spawn,
    /// The transport failed to open a channel
    Channel,
    /// Channel allocation was refused on every allowed attempt
    Refused {
        /// Number of allocation attempts made
        attempts: u32,
    },
    /// The executor was closed while the command was in flight
    ConnectionClosed,
}

//! Error types for command execution

use crate::result::ProcessResult;
use thiserror::Error;

/// Unified error type for command execution
#[derive(Error, Debug)]
pub enum Error {
    /// A command was built from an empty argument vector
    #[error("command must contain at least one argument")]
    EmptyCommand,

    /// Failed to spawn a local process
    #[error("failed to spawn process: {reason}")]
    SpawnFailed {
        /// The reason for the spawn failure
        reason: String,
    },

    /// The remote connection could not be established
    #[error("connection to {host} failed: {reason}")]
    ConnectFailed {
        /// The destination that failed to connect
        host: String,
        /// The detailed reason for the connection failure
        reason: String,
    },

    /// The transport failed to open an execution channel
    #[error("failed to open channel: {reason}")]
    ChannelFailed {
        /// The reason reported by the transport
        reason: String,
    },

    /// Channel allocation kept being refused under a bounded retry policy
    #[error("channel allocation refused after {attempts} attempts")]
    ChannelRefused {
        /// Number of allocation attempts made
        attempts: u32,
    },

    /// The executor was closed while the command was in flight
    #[error("connection closed")]
    ConnectionClosed,

    /// The command ran to completion with a non-zero exit code
    #[error("command exited with code {:?}", .0.code)]
    NonZeroExit(Box<ProcessResult>),

    /// The event stream ended without a completion event
    #[error("process ended without reporting an exit status")]
    Incomplete,

    /// Collected standard output could not be decoded as JSON
    #[error("failed to decode output as JSON after {attempts} attempts: {source}")]
    JsonDecode {
        /// Number of decode attempts made
        attempts: u32,
        /// The last decode error
        #[source]
        source: serde_json::Error,
    },

    /// Stdin was already closed, or the process no longer reads it
    #[error("stdin is closed")]
    StdinClosed,

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a spawn failed error
    pub fn spawn_failed(reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            reason: reason.into(),
        }
    }

    /// Create a channel failed error
    pub fn channel_failed(reason: impl Into<String>) -> Self {
        Self::ChannelFailed {
            reason: reason.into(),
        }
    }

    /// Create a connect failed error
    pub fn connect_failed(host: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectFailed {
            host: host.into(),
            reason: reason.into(),
        }
    }

    /// The collected result carried by a non-zero exit, if any
    pub fn result(&self) -> Option<&ProcessResult> {
        match self {
            Error::NonZeroExit(result) => Some(result),
            _ => None,
        }
    }

    /// Consume the error, returning the collected result of a non-zero exit
    pub fn into_result(self) -> Option<ProcessResult> {
        match self {
            Error::NonZeroExit(result) => Some(*result),
            _ => None,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_zero_exit_carries_result() {
        let result = ProcessResult {
            code: Some(3),
            signal: None,
            out: vec!["partial".into()],
            err: vec!["boom".into()],
        };
        let err = Error::NonZeroExit(Box::new(result.clone()));

        assert!(err.to_string().contains("Some(3)"));
        assert_eq!(err.result(), Some(&result));
        assert_eq!(err.into_result(), Some(result));
    }

    #[test]
    fn test_constructors_display() {
        let err = Error::connect_failed("example.com", "timed out");
        assert!(err.to_string().contains("example.com"));
        assert!(err.to_string().contains("timed out"));
        assert!(err.result().is_none());

        let err = Error::spawn_failed("No such file or directory");
        assert!(err.to_string().contains("spawn"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}

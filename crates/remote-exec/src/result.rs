//! Exit statuses and collected results

use serde::{Deserialize, Serialize};

/// Process exit status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitStatus {
    /// Exit code if the process exited normally
    pub code: Option<i32>,
    /// Name of the signal that terminated the process, e.g. `SIGTERM`
    pub signal: Option<String>,
}

impl ExitStatus {
    /// Returns true if the process exited successfully (code 0)
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Returns true if the process was terminated by a signal
    pub fn terminated_by_signal(&self) -> bool {
        self.signal.is_some()
    }
}

/// The output and exit status of a finished command
///
/// Produced once by the collector, for both successful and failed
/// commands, and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResult {
    /// Exit code, absent if the process was killed by a signal
    pub code: Option<i32>,
    /// Terminating signal name
    pub signal: Option<String>,
    /// Captured stdout lines, in order
    pub out: Vec<String>,
    /// Captured stderr lines, in order
    pub err: Vec<String>,
}

impl ProcessResult {
    /// The exit status part of this result
    pub fn status(&self) -> ExitStatus {
        ExitStatus {
            code: self.code,
            signal: self.signal.clone(),
        }
    }

    /// Returns true if the command exited with code 0
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Stdout lines joined with `\n`
    pub fn stdout_text(&self) -> String {
        self.out.join("\n")
    }

    /// Stderr lines joined with `\n`
    pub fn stderr_text(&self) -> String {
        self.err.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_status() {
        let ok = ExitStatus {
            code: Some(0),
            signal: None,
        };
        assert!(ok.success());
        assert!(!ok.terminated_by_signal());

        let killed = ExitStatus {
            code: None,
            signal: Some("SIGKILL".into()),
        };
        assert!(!killed.success());
        assert!(killed.terminated_by_signal());
    }

    #[test]
    fn test_result_text() {
        let result = ProcessResult {
            code: Some(1),
            signal: None,
            out: vec!["a".into(), "b".into()],
            err: vec!["oops".into()],
        };
        assert_eq!(result.stdout_text(), "a\nb");
        assert_eq!(result.stderr_text(), "oops");
        assert!(!result.success());
        assert_eq!(result.status().code, Some(1));
    }
}

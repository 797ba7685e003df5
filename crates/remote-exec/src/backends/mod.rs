//! Backend implementations for different execution contexts
//!
//! This module provides the built-in launchers: local processes and remote
//! channels over a [`Transport`](remote::Transport), with OpenSSH
//! multiplexing as the bundled transport. Users can plug in their own
//! transport by implementing [`remote::Transport`].

pub mod local;
pub mod remote;
pub mod ssh;

pub use local::LocalLauncher;
pub use remote::{Channel, ChannelExit, ChannelOpen, ExecRequest, RemoteLauncher, Transport};
pub use ssh::{OpenSshTransport, SshConfig};

/// Name of the signal that terminated a process, e.g. `SIGTERM`
#[cfg(unix)]
pub(crate) fn signal_name(status: &std::process::ExitStatus) -> Option<String> {
    use nix::sys::signal::Signal;
    use std::os::unix::process::ExitStatusExt;

    let raw = status.signal()?;
    Some(
        Signal::try_from(raw)
            .map(|signal| signal.as_str().to_string())
            .unwrap_or_else(|_| format!("SIG{}", raw)),
    )
}

#[cfg(not(unix))]
pub(crate) fn signal_name(_status: &std::process::ExitStatus) -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    #[cfg(unix)]
    #[test]
    fn test_signal_name() {
        use super::signal_name;
        use std::os::unix::process::ExitStatusExt;

        let status = std::process::ExitStatus::from_raw(15);
        assert_eq!(signal_name(&status).as_deref(), Some("SIGTERM"));

        let status = std::process::ExitStatus::from_raw(0);
        assert_eq!(signal_name(&status), None);
    }
}

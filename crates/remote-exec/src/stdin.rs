//! Stdin handling for processes
//!
//! [`StdinHandle`] is available the moment a command is dispatched, even for
//! remote commands whose channel has not been granted yet. Writes are queued
//! and forwarded once the underlying stream exists.

use async_channel::{Receiver, Sender};
use futures::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::{Error, Result};

/// Handle for writing to a process's stdin
#[derive(Debug)]
pub struct StdinHandle {
    sender: Option<Sender<Vec<u8>>>,
}

impl StdinHandle {
    /// Create a handle and the receiving end consumed by the process driver
    pub(crate) fn channel() -> (Self, Receiver<Vec<u8>>) {
        let (sender, receiver) = async_channel::unbounded();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// Write a line to stdin (adds newline)
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');
        self.write(&data).await
    }

    /// Write raw bytes to stdin
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        let sender = self.sender.as_ref().ok_or(Error::StdinClosed)?;
        sender
            .send(data.to_vec())
            .await
            .map_err(|_| Error::StdinClosed)
    }

    /// Close stdin; the process sees end of file once queued data is written
    pub fn close(&mut self) {
        self.sender.take();
    }

    /// Returns true once [`close`](Self::close) was called
    pub fn is_closed(&self) -> bool {
        self.sender.is_none()
    }
}

/// Forward queued stdin data into `writer` until the handle is closed
///
/// Returns when the handle is closed or dropped, or when the process stops
/// reading. The writer is closed on return so the process sees end of file.
pub(crate) async fn forward<W>(queue: Receiver<Vec<u8>>, mut writer: W)
where
    W: AsyncWrite + Unpin,
{
    while let Ok(data) = queue.recv().await {
        if let Err(e) = writer.write_all(&data).await {
            debug!("stdin write failed: {}", e);
            queue.close();
            return;
        }
        if let Err(e) = writer.flush().await {
            debug!("stdin flush failed: {}", e);
            queue.close();
            return;
        }
    }
    let _ = writer.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queued_writes_are_forwarded_in_order() {
        futures::executor::block_on(async {
            let (mut stdin, queue) = StdinHandle::channel();
            stdin.write_line("first").await.unwrap();
            stdin.write(b"second").await.unwrap();
            stdin.close();
            assert!(stdin.is_closed());

            let mut sink = futures::io::Cursor::new(Vec::new());
            forward(queue, &mut sink).await;
            assert_eq!(sink.into_inner(), b"first\nsecond");
        });
    }

    #[test]
    fn test_write_after_close_fails() {
        futures::executor::block_on(async {
            let (mut stdin, _queue) = StdinHandle::channel();
            stdin.close();
            assert!(matches!(stdin.write_line("x").await, Err(Error::StdinClosed)));
        });
    }

    #[test]
    fn test_write_after_process_gone_fails() {
        futures::executor::block_on(async {
            let (mut stdin, queue) = StdinHandle::channel();
            drop(queue);
            assert!(matches!(stdin.write(b"x").await, Err(Error::StdinClosed)));
        });
    }
}

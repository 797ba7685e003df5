//! Background execution of command drivers
//!
//! A command starts when it is executed, not when its handle is first
//! polled. Launchers hand the work behind each handle to a [`Spawner`].

use futures::future::BoxFuture;
use tracing::warn;

/// Runs futures in the background until they complete
pub trait Spawner: Send + Sync + 'static {
    /// Spawn a future and detach it
    fn spawn_detached(&self, future: BoxFuture<'static, ()>);
}

/// Spawner that drives each future on its own thread with `async-io`
///
/// Needs no runtime from the caller, so it works under smol, tokio or a
/// plain `block_on`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSpawner;

impl Spawner for ThreadSpawner {
    fn spawn_detached(&self, future: BoxFuture<'static, ()>) {
        let spawned = std::thread::Builder::new()
            .name("remote-exec".to_string())
            .spawn(move || async_io::block_on(future));
        if let Err(e) = spawned {
            warn!("failed to start command thread: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[test]
    fn test_thread_spawner_runs_without_polling() {
        let (tx, rx) = async_channel::bounded(1);
        ThreadSpawner.spawn_detached(
            async move {
                let _ = tx.send(42).await;
            }
            .boxed(),
        );
        assert_eq!(rx.recv_blocking().unwrap(), 42);
    }
}

use crate::error::Error;

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

/// The runtime the shippers of one client run on.
///
/// Shippers keep making progress while an application thread is blocked on a flush, whatever
/// runtime that thread belongs to. The runtime is stopped on [`shutdown`](Self::shutdown) or
/// when the last handle to it goes away, without waiting for its worker.
pub(crate) struct ShipperRuntime {
    handle: Handle,
    runtime: Mutex<Option<Runtime>>,
}

impl ShipperRuntime {
    pub(crate) fn start() -> Result<Self, Error> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("googlelog-shipper")
            .enable_all()
            .build()
            .map_err(Error::RuntimeError)?;
        Ok(ShipperRuntime {
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
        })
    }

    /// Futures spawned after shutdown are dropped without being polled.
    pub(crate) fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    pub(crate) fn shutdown(&self) {
        let runtime = self
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(runtime) = runtime {
            runtime.shutdown_background();
        }
    }
}

impl Drop for ShipperRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::ShipperRuntime;

    #[test]
    fn spawned_work_runs_without_an_ambient_runtime() {
        let runtime = ShipperRuntime::start().unwrap();
        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        runtime.spawn(async move { tx.send(42).unwrap() });
        assert_eq!(Ok(42), rx.recv());
    }

    #[test]
    fn spawning_after_shutdown_drops_the_future() {
        let runtime = ShipperRuntime::start().unwrap();
        runtime.shutdown();
        let (tx, rx) = std::sync::mpsc::sync_channel::<()>(1);
        runtime.spawn(async move { drop(tx) });
        assert!(rx.recv().is_err());
    }
}

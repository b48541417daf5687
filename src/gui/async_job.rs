//! Background work polled from the GUI thread.
//!
//! Futures run on the app's tokio runtime; the result comes back over a
//! std channel so `update` can check it without blocking.

use anyhow::{anyhow, Result};
use std::future::Future;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use tokio::runtime::Handle;

pub struct AsyncJob<T> {
    receiver: Option<Receiver<Result<T>>>,
}

impl<T: Send + 'static> AsyncJob<T> {
    pub fn spawn<F>(handle: &Handle, future: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        handle.spawn(async move {
            let _ = tx.send(future.await);
        });
        Self { receiver: Some(rx) }
    }
}

impl<T> AsyncJob<T> {
    /// `Some` once, when the job has finished.
    pub fn poll(&mut self) -> Option<Result<T>> {
        let rx = self.receiver.as_ref()?;
        match rx.try_recv() {
            Ok(res) => {
                self.receiver = None;
                Some(res)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.receiver = None;
                Some(Err(anyhow!("Worker task disconnected")))
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.receiver.is_some()
    }
}

/// True while the optional job has not reported back.
pub fn is_running<T>(job: &Option<AsyncJob<T>>) -> bool {
    job.as_ref().map(AsyncJob::is_running).unwrap_or(false)
}

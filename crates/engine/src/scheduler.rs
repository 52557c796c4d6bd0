use std::sync::{Arc, Mutex};

use drift_core::DurationWindow;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;

use crate::sync::{lock, SharedRandom};

/// Cancels one timer chain. Clones share the chain; cancelling is
/// idempotent. Dropping every clone also ends the chain.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    inner: Arc<CancelInner>,
}

#[derive(Debug)]
struct CancelInner {
    stop: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CancelHandle {
    pub(crate) fn new(stop: watch::Sender<bool>, task: JoinHandle<()>) -> Self {
        Self {
            inner: Arc::new(CancelInner {
                stop,
                task: Mutex::new(Some(task)),
            }),
        }
    }

    pub fn cancel(&self) {
        self.inner.stop.send_replace(true);
        if let Some(task) = lock(&self.inner.task).take() {
            task.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.stop.borrow()
    }
}

/// Resolves once `rx` reads `true` or its sender is gone.
pub(crate) async fn stopped(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Drives periodic refresh ticks.
///
/// `schedule` fires the tick once right away (the initial load) and then
/// after every sample of the interval window. Whether a tick actually
/// starts a cycle is the caller's gate; the scheduler never waits for a
/// cycle to finish.
pub struct RefreshScheduler {
    handle: Handle,
    interval: DurationWindow,
    random: SharedRandom,
}

impl RefreshScheduler {
    pub fn new(handle: Handle, interval: DurationWindow, random: SharedRandom) -> Self {
        Self {
            handle,
            interval,
            random,
        }
    }

    pub fn schedule<F>(&self, tick: F) -> CancelHandle
    where
        F: Fn() + Send + Sync + 'static,
    {
        tick();

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let interval = self.interval;
        let random = self.random.clone();
        let task = self.handle.spawn(async move {
            loop {
                let wait = interval.sample(&mut *lock(&random));
                tokio::select! {
                    _ = sleep(wait) => {}
                    _ = stopped(&mut stop_rx) => break,
                }
                // A cancel racing the timer wins.
                if *stop_rx.borrow() {
                    break;
                }
                tick();
            }
            debug!("refresh timer stopped");
        });
        CancelHandle::new(stop_tx, task)
    }
}

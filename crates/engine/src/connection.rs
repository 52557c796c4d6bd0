use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use drift_core::DurationWindow;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::info;

use crate::scheduler::{stopped, CancelHandle};
use crate::sync::{lock, SharedRandom};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Simulated push channel that drops and recovers on its own.
///
/// Only one chain runs at a time: `start` cancels the previous chain and
/// bumps a generation counter, so a callback already in flight from the
/// old chain is discarded instead of reported.
pub struct ConnectionSimulator {
    handle: Handle,
    domain: &'static str,
    disconnect_after: DurationWindow,
    reconnect_after: DurationWindow,
    random: SharedRandom,
    chain: Mutex<Option<CancelHandle>>,
    epoch: Arc<AtomicU64>,
}

impl ConnectionSimulator {
    pub fn new(
        handle: Handle,
        domain: &'static str,
        disconnect_after: DurationWindow,
        reconnect_after: DurationWindow,
        random: SharedRandom,
    ) -> Self {
        Self {
            handle,
            domain,
            disconnect_after,
            reconnect_after,
            random,
            chain: Mutex::new(None),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Reports `Connected` right away, then alternates forever.
    pub fn start<F>(&self, sink: F) -> CancelHandle
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        if let Some(prev) = lock(&self.chain).take() {
            prev.cancel();
        }
        let generation = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        let domain = self.domain;
        let epoch = self.epoch.clone();
        let report = move |state: ConnectionState| {
            if epoch.load(Ordering::SeqCst) != generation {
                return;
            }
            info!(domain, ?state, "connection changed");
            sink(state);
        };
        report(ConnectionState::Connected);

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let disconnect_after = self.disconnect_after;
        let reconnect_after = self.reconnect_after;
        let random = self.random.clone();
        let task = self.handle.spawn(async move {
            loop {
                let up = disconnect_after.sample(&mut *lock(&random));
                tokio::select! {
                    _ = sleep(up) => {}
                    _ = stopped(&mut stop_rx) => return,
                }
                if *stop_rx.borrow() {
                    return;
                }
                report(ConnectionState::Disconnected);

                let down = reconnect_after.sample(&mut *lock(&random));
                tokio::select! {
                    _ = sleep(down) => {}
                    _ = stopped(&mut stop_rx) => return,
                }
                if *stop_rx.borrow() {
                    return;
                }
                report(ConnectionState::Connected);
            }
        });

        let cancel = CancelHandle::new(stop_tx, task);
        let mut chain = lock(&self.chain);
        if self.epoch.load(Ordering::SeqCst) == generation {
            *chain = Some(cancel.clone());
        } else {
            // A newer start or a stop overtook this one.
            cancel.cancel();
        }
        cancel
    }

    pub fn stop(&self) {
        // Silence any callback racing the cancel.
        self.epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(chain) = lock(&self.chain).take() {
            chain.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.chain)
            .as_ref()
            .is_some_and(|chain| !chain.is_cancelled())
    }
}

impl Drop for ConnectionSimulator {
    fn drop(&mut self) {
        self.stop();
    }
}

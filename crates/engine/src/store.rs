//! The externally visible store: one per domain.
//!
//! All state lives behind a `std::sync::Mutex` whose critical sections
//! are short and never span an `.await`. A cycle works on a copy of the
//! snapshot it started from; manual edits made meanwhile are applied to
//! the live snapshot right away and journaled, and the cycle replays the
//! journal onto its own result before publishing.

use std::sync::{Arc, Mutex};

use drift_core::{now_ms, CycleError, SeededRandom, Snapshot, SyncConfig};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::adapter::{advance, DomainAdapter, MutationContext};
use crate::connection::ConnectionSimulator;
use crate::error::EngineError;
use crate::scheduler::{stopped, CancelHandle, RefreshScheduler};
use crate::source::SeedSource;
use crate::subscribers::{Subscribers, Subscription};
use crate::sync::{lock, shared_random, SharedRandom};

/// What subscribers and `get_state` see.
#[derive(Clone, Debug)]
pub struct SyncState<D> {
    pub snapshot: Arc<Snapshot<D>>,
    pub is_loading: bool,
    pub is_connected: bool,
    /// Message of the last failed cycle; cleared when the next one starts.
    pub error: Option<String>,
    /// Bumped for every delivery to subscribers, including flag-only
    /// changes that keep `snapshot.version`. On a multi-thread runtime
    /// deliveries can arrive out of order; drop any view whose sequence
    /// is below the last one seen.
    pub sequence: u64,
}

impl<D> SyncState<D> {
    pub fn data(&self) -> &D {
        &self.snapshot.data
    }
}

/// Outcome of a refresh request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Refresh {
    Started,
    /// A cycle is already running; nothing was queued.
    InFlight,
    Disposed,
}

pub struct StoreBuilder<A: DomainAdapter> {
    adapter: A,
    config: Option<SyncConfig>,
    random: Option<SharedRandom>,
    source: Option<Box<dyn SeedSource<A::Data>>>,
}

impl<A: DomainAdapter> StoreBuilder<A> {
    /// Overrides the adapter's default timing.
    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn random(mut self, random: SharedRandom) -> Self {
        self.random = Some(random);
        self
    }

    /// Shorthand for a seeded ChaCha source.
    pub fn seed(self, seed: u64) -> Self {
        self.random(shared_random(SeededRandom::new(seed)))
    }

    /// Where the first snapshot comes from. Without one, or when it
    /// fails, the adapter's built-in dataset is used.
    pub fn source(mut self, source: impl SeedSource<A::Data> + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Builds the store and fires its initial load.
    pub fn start(self) -> Result<SyncStore<A>, EngineError> {
        let handle = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        let StoreBuilder {
            adapter,
            config,
            random,
            source,
        } = self;
        let config = config.unwrap_or_else(|| adapter.default_config());
        config.validate()?;
        let random = random.unwrap_or_else(|| shared_random(SeededRandom::from_entropy()));
        let domain = adapter.name();

        let mut data = match source.map(|s| s.load()) {
            Some(Ok(data)) => data,
            Some(Err(e)) => {
                warn!(domain, error = %e, "seed source failed; using built-in dataset");
                adapter.initial()
            }
            None => adapter.initial(),
        };
        adapter.reclassify(&mut data);

        let connection = ConnectionSimulator::new(
            handle.clone(),
            domain,
            config.disconnect_after,
            config.reconnect_after,
            random.clone(),
        );
        let (shutdown, _) = watch::channel(false);
        let shared = Arc::new(Shared {
            adapter,
            config,
            handle: handle.clone(),
            random: random.clone(),
            state: Mutex::new(Inner {
                snapshot: Arc::new(Snapshot::initial(data, now_ms())),
                is_loading: true,
                is_connected: false,
                error: None,
                pending: None,
                synced: false,
                sequence: 0,
                disposed: false,
            }),
            subscribers: Subscribers::new(),
            connection,
            shutdown,
        });

        let scheduler = RefreshScheduler::new(handle, config.interval, random);
        let weak = Arc::downgrade(&shared);
        let refresh_chain = scheduler.schedule(move || {
            if let Some(shared) = weak.upgrade() {
                shared.begin_cycle();
            }
        });
        debug!(domain, "store started");

        Ok(SyncStore {
            shared,
            refresh_chain,
        })
    }
}

/// A running store. Dropping it disposes it.
pub struct SyncStore<A: DomainAdapter> {
    shared: Arc<Shared<A>>,
    refresh_chain: CancelHandle,
}

impl<A: DomainAdapter> SyncStore<A> {
    pub fn builder(adapter: A) -> StoreBuilder<A> {
        StoreBuilder {
            adapter,
            config: None,
            random: None,
            source: None,
        }
    }

    pub fn adapter(&self) -> &A {
        &self.shared.adapter
    }

    pub fn config(&self) -> &SyncConfig {
        &self.shared.config
    }

    pub fn get_state(&self) -> SyncState<A::Data> {
        lock(&self.shared.state).view()
    }

    /// Registers `listener` for every later publish and flag change.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SyncState<A::Data>) + Send + Sync + 'static,
    {
        self.shared.subscribers.add(Arc::new(listener))
    }

    /// Starts a cycle now unless one is already running.
    pub fn refresh(&self) -> Refresh {
        self.shared.begin_cycle()
    }

    /// Applies a manual edit to the live snapshot and publishes it.
    /// Returns `false` when the edit matched nothing or the store is
    /// disposed.
    pub fn mutate(&self, mutation: A::Mutation) -> bool {
        let domain = self.shared.adapter.name();
        let ctx = MutationContext::new(now_ms());
        let state = {
            let mut inner = lock(&self.shared.state);
            if inner.disposed {
                return false;
            }
            let mut data = inner.snapshot.data.clone();
            if !self.shared.adapter.apply(&mut data, &mutation, &ctx) {
                debug!(domain, ?mutation, "mutation matched nothing");
                return false;
            }
            let next = inner.snapshot.succeed(data, ctx.at);
            inner.snapshot = Arc::new(next);
            if let Some(journal) = inner.pending.as_mut() {
                journal.push((mutation, ctx));
            }
            inner.deliver()
        };
        info!(domain, version = state.snapshot.version, "published manual edit");
        self.shared.subscribers.notify(&state);
        true
    }

    /// Restarts the simulated connection. Does nothing until a cycle has
    /// succeeded; the store stays disconnected until then.
    pub fn reconnect(&self) {
        if !lock(&self.shared.state).synced {
            debug!(
                domain = self.shared.adapter.name(),
                "no successful cycle yet; reconnect ignored"
            );
            return;
        }
        self.shared.start_connection();
    }

    /// Cancels the scheduler, the simulator and any cycle in flight.
    /// Idempotent; the store never publishes again.
    pub fn dispose(&self) {
        {
            let mut inner = lock(&self.shared.state);
            if inner.disposed {
                return;
            }
            inner.disposed = true;
            inner.pending = None;
        }
        self.refresh_chain.cancel();
        self.shared.shutdown.send_replace(true);
        self.shared.connection.stop();
        self.shared.subscribers.clear();
        debug!(domain = self.shared.adapter.name(), "store disposed");
    }

    pub fn is_disposed(&self) -> bool {
        lock(&self.shared.state).disposed
    }
}

impl<A: DomainAdapter> Drop for SyncStore<A> {
    fn drop(&mut self) {
        self.dispose();
    }
}

struct Shared<A: DomainAdapter> {
    adapter: A,
    config: SyncConfig,
    handle: Handle,
    random: SharedRandom,
    state: Mutex<Inner<A>>,
    subscribers: Arc<Subscribers<SyncState<A::Data>>>,
    connection: ConnectionSimulator,
    shutdown: watch::Sender<bool>,
}

struct Inner<A: DomainAdapter> {
    snapshot: Arc<Snapshot<A::Data>>,
    is_loading: bool,
    is_connected: bool,
    error: Option<String>,
    /// Journal of manual edits; `Some` exactly while a cycle is in flight.
    pending: Option<Vec<(A::Mutation, MutationContext)>>,
    /// Set by the first successful cycle.
    synced: bool,
    sequence: u64,
    disposed: bool,
}

impl<A: DomainAdapter> Inner<A> {
    fn view(&self) -> SyncState<A::Data> {
        SyncState {
            snapshot: self.snapshot.clone(),
            is_loading: self.is_loading,
            is_connected: self.is_connected,
            error: self.error.clone(),
            sequence: self.sequence,
        }
    }

    /// View for subscribers, stamped with the next delivery sequence.
    fn deliver(&mut self) -> SyncState<A::Data> {
        self.sequence += 1;
        self.view()
    }
}

impl<A: DomainAdapter> Shared<A> {
    fn begin_cycle(self: &Arc<Self>) -> Refresh {
        let domain = self.adapter.name();
        let (base, state) = {
            let mut inner = lock(&self.state);
            if inner.disposed {
                return Refresh::Disposed;
            }
            if inner.pending.is_some() {
                debug!(domain, "cycle in flight; tick skipped");
                return Refresh::InFlight;
            }
            inner.pending = Some(Vec::new());
            inner.is_loading = true;
            inner.error = None;
            (inner.snapshot.clone(), inner.deliver())
        };
        debug!(domain, version = base.version, "cycle started");
        self.subscribers.notify(&state);
        self.handle.spawn(run_cycle(self.clone(), base));
        Refresh::Started
    }

    /// Arms the simulated connection unless the store is disposed.
    fn start_connection(self: &Arc<Self>) {
        if lock(&self.state).disposed {
            return;
        }
        let weak = Arc::downgrade(self);
        self.connection.start(move |state| {
            if let Some(shared) = weak.upgrade() {
                shared.set_connected(state.is_connected());
            }
        });
        // dispose() may have run between the check and the start.
        if lock(&self.state).disposed {
            self.connection.stop();
        }
    }

    fn set_connected(&self, connected: bool) {
        let state = {
            let mut inner = lock(&self.state);
            if inner.disposed || inner.is_connected == connected {
                return;
            }
            inner.is_connected = connected;
            inner.deliver()
        };
        self.subscribers.notify(&state);
    }
}

async fn run_cycle<A: DomainAdapter>(shared: Arc<Shared<A>>, base: Arc<Snapshot<A::Data>>) {
    let domain = shared.adapter.name();
    let mut shutdown = shared.shutdown.subscribe();
    let latency = shared.config.latency.sample(&mut *lock(&shared.random));
    tokio::select! {
        _ = sleep(latency) => {}
        _ = stopped(&mut shutdown) => {
            debug!(domain, "cycle abandoned");
            return;
        }
    }

    let outcome = {
        let mut rng = lock(&shared.random);
        let rate = shared.config.failure_rate;
        if rate > 0.0 && rng.chance(rate) {
            Err(CycleError::Upstream("simulated upstream outage".to_string()))
        } else {
            advance(&shared.adapter, &base.data, &mut *rng, now_ms())
        }
    };

    let succeeded = outcome.is_ok();
    let state = {
        let mut inner = lock(&shared.state);
        if inner.disposed {
            debug!(domain, "store disposed mid-cycle; result dropped");
            return;
        }
        let journal = inner.pending.take().unwrap_or_default();
        match outcome {
            Ok(mut data) => {
                if !journal.is_empty() {
                    debug!(domain, edits = journal.len(), "replaying manual edits");
                }
                for (mutation, ctx) in &journal {
                    shared.adapter.apply(&mut data, mutation, ctx);
                }
                let next = inner.snapshot.succeed(data, now_ms());
                inner.snapshot = Arc::new(next);
                inner.is_connected = true;
                inner.synced = true;
                inner.error = None;
                info!(domain, version = inner.snapshot.version, "published snapshot");
            }
            Err(e) => {
                warn!(domain, error = %e, "refresh cycle failed");
                inner.error = Some(format!("failed to update {domain} data: {e}"));
            }
        }
        inner.is_loading = false;
        inner.deliver()
    };
    shared.subscribers.notify(&state);

    if succeeded && !shared.connection.is_running() {
        shared.start_connection();
    }
}

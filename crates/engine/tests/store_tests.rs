use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use drift_core::{
    field_rule, CycleError, Delta, DurationWindow, EpochMs, PerturbationRule, RandomSource,
    RuleSet, Sequence, StatusRules, SyncConfig,
};
use drift_engine::{
    shared_random, DomainAdapter, EngineError, JsonFileSource, MutationContext, Refresh,
    SyncStore,
};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum Level {
    Empty,
    Partial,
    Full,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Gauge {
    id: u32,
    value: f64,
    level: Level,
}

#[derive(Clone, Debug)]
enum Edit {
    Add { id: u32, amount: f64 },
}

/// Every cycle adds exactly 1 to each gauge, so results are predictable.
struct Gauges {
    rules: RuleSet<Gauge>,
    levels: StatusRules<Gauge, Level>,
    calls: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl Gauges {
    fn new() -> Self {
        let rules = RuleSet::new(vec![field_rule!(
            Gauge,
            value,
            PerturbationRule::new(Delta::Fixed(1.0)).within(0.0, 100.0)
        )])
        .unwrap();
        let levels = StatusRules::<Gauge, Level>::builder()
            .when(|g: &Gauge| g.value <= 0.0, Level::Empty)
            .when(|g: &Gauge| g.value >= 100.0, Level::Full)
            .otherwise(Level::Partial);
        Self {
            rules,
            levels,
            calls: Arc::new(AtomicUsize::new(0)),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DomainAdapter for Gauges {
    type Data = Vec<Gauge>;
    type Mutation = Edit;

    fn name(&self) -> &'static str {
        "gauges"
    }

    fn default_config(&self) -> SyncConfig {
        config(1_000)
    }

    fn initial(&self) -> Vec<Gauge> {
        vec![
            Gauge {
                id: 1,
                value: 10.0,
                level: Level::Partial,
            },
            Gauge {
                id: 2,
                value: 0.0,
                level: Level::Partial,
            },
        ]
    }

    fn reclassify(&self, data: &mut Vec<Gauge>) {
        for g in data.iter_mut() {
            g.level = self.levels.classify(g);
        }
    }

    fn perturb(
        &self,
        data: &mut Vec<Gauge>,
        rng: &mut dyn RandomSource,
        _now: EpochMs,
    ) -> Result<(), CycleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(CycleError::Upstream("gauge feed offline".to_string()));
        }
        self.rules.apply_all(data, rng);
        Ok(())
    }

    fn apply(&self, data: &mut Vec<Gauge>, mutation: &Edit, _ctx: &MutationContext) -> bool {
        match mutation {
            Edit::Add { id, amount } => {
                let Some(g) = data.iter_mut().find(|g| g.id == *id) else {
                    return false;
                };
                let Some(rule) = self.rules.get("value") else {
                    return false;
                };
                let next = g.value + amount;
                rule.assign(g, next);
                g.level = self.levels.classify(g);
                true
            }
        }
    }
}

fn config(interval_ms: u64) -> SyncConfig {
    SyncConfig {
        interval: DurationWindow::fixed(interval_ms),
        latency: DurationWindow::fixed(100),
        disconnect_after: DurationWindow::fixed(10_000),
        reconnect_after: DurationWindow::fixed(1_000),
        failure_rate: 0.0,
    }
}

fn start(adapter: Gauges, interval_ms: u64) -> SyncStore<Gauges> {
    SyncStore::builder(adapter)
        .config(config(interval_ms))
        .random(shared_random(Sequence::constant(0.5)))
        .start()
        .unwrap()
}

fn value(store: &SyncStore<Gauges>, id: u32) -> f64 {
    store
        .get_state()
        .data()
        .iter()
        .find(|g| g.id == id)
        .map(|g| g.value)
        .unwrap()
}

async fn advance_ms(ms: u64) {
    sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn test_initial_load_publishes_and_connects() {
    let store = start(Gauges::new(), 1_000);

    let state = store.get_state();
    assert!(state.is_loading);
    assert!(!state.is_connected);
    assert_eq!(state.snapshot.version, 0);
    assert_eq!(state.error, None);

    advance_ms(150).await;
    let state = store.get_state();
    assert!(!state.is_loading);
    assert!(state.is_connected);
    assert_eq!(state.snapshot.version, 1);
    assert_eq!(value(&store, 1), 11.0);
    assert_eq!(value(&store, 2), 1.0);
    assert_eq!(state.data()[1].level, Level::Partial);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_while_in_flight_is_a_noop() {
    let store = start(Gauges::new(), 1_000);

    assert_eq!(store.refresh(), Refresh::InFlight);
    assert_eq!(store.refresh(), Refresh::InFlight);
    advance_ms(150).await;
    assert_eq!(store.adapter().calls(), 1);
    assert_eq!(store.get_state().snapshot.version, 1);

    assert_eq!(store.refresh(), Refresh::Started);
    assert!(store.get_state().is_loading);
    advance_ms(150).await;
    assert_eq!(store.adapter().calls(), 2);
    assert_eq!(value(&store, 1), 12.0);
}

#[tokio::test(start_paused = true)]
async fn test_last_updated_strictly_increases() {
    let store = start(Gauges::new(), 1_000);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _sub = store.subscribe(move |state| {
        sink.lock()
            .unwrap()
            .push((state.snapshot.version, state.snapshot.last_updated));
    });

    advance_ms(5_500).await;
    store.mutate(Edit::Add { id: 1, amount: 1.0 });

    let mut published = seen.lock().unwrap().clone();
    published.dedup();
    assert!(published.len() >= 6, "{published:?}");
    for pair in published.windows(2) {
        assert!(pair[1].0 > pair[0].0, "{published:?}");
        assert!(pair[1].1 > pair[0].1, "{published:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_delivery_sequence_orders_flag_only_updates() {
    let store = start(Gauges::new(), 3_600_000);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _sub = store.subscribe(move |state| {
        sink.lock()
            .unwrap()
            .push((state.sequence, state.snapshot.version, state.is_loading));
    });

    advance_ms(150).await;
    assert_eq!(store.refresh(), Refresh::Started);
    advance_ms(150).await;

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 3, "{seen:?}");
    // Cycle start republishes version 1 with only the loading flag changed.
    assert_eq!((seen[0].1, seen[0].2), (1, false));
    assert_eq!((seen[1].1, seen[1].2), (1, true));
    assert_eq!((seen[2].1, seen[2].2), (2, false));
    for pair in seen.windows(2) {
        assert!(pair[1].0 > pair[0].0, "{seen:?}");
    }
    assert_eq!(store.get_state().sequence, seen[2].0);
}

#[tokio::test(start_paused = true)]
async fn test_manual_edit_during_cycle_is_folded_forward() {
    let store = start(Gauges::new(), 1_000);
    advance_ms(150).await;
    assert_eq!(value(&store, 1), 11.0);

    // The tick at t=1000 is still waiting out its latency.
    advance_ms(900).await;
    assert!(store.get_state().is_loading);
    assert!(store.mutate(Edit::Add { id: 1, amount: 5.0 }));
    assert_eq!(value(&store, 1), 16.0);
    assert!(!store.mutate(Edit::Add { id: 9, amount: 5.0 }));

    advance_ms(100).await;
    let state = store.get_state();
    assert!(!state.is_loading);
    assert_eq!(state.snapshot.version, 3);
    // Cycle result (11 + 1) with the edit replayed on top.
    assert_eq!(value(&store, 1), 17.0);
}

#[tokio::test(start_paused = true)]
async fn test_mutations_are_clamped_and_reclassified() {
    let store = start(Gauges::new(), 1_000);
    advance_ms(150).await;

    assert!(store.mutate(Edit::Add { id: 1, amount: 500.0 }));
    let state = store.get_state();
    assert_eq!(state.data()[0].value, 100.0);
    assert_eq!(state.data()[0].level, Level::Full);

    assert!(store.mutate(Edit::Add { id: 2, amount: -50.0 }));
    assert_eq!(store.get_state().data()[1].level, Level::Empty);
}

#[tokio::test(start_paused = true)]
async fn test_failed_cycle_keeps_snapshot_and_recovers() {
    let adapter = Gauges::new();
    adapter.failing.store(true, Ordering::SeqCst);
    let failing = adapter.failing.clone();
    let store = start(adapter, 1_000);

    advance_ms(150).await;
    let state = store.get_state();
    assert!(!state.is_loading);
    assert!(!state.is_connected);
    assert_eq!(state.snapshot.version, 0);
    assert_eq!(value(&store, 1), 10.0);
    let error = state.error.unwrap();
    assert!(error.contains("failed to update gauges data"), "{error}");

    failing.store(false, Ordering::SeqCst);
    advance_ms(900).await;
    let state = store.get_state();
    assert!(state.is_loading);
    assert_eq!(state.error, None);

    advance_ms(100).await;
    let state = store.get_state();
    assert_eq!(state.snapshot.version, 1);
    assert!(state.is_connected);
    assert_eq!(state.error, None);
}

#[tokio::test(start_paused = true)]
async fn test_edit_during_failed_cycle_stays_published() {
    let adapter = Gauges::new();
    let failing = adapter.failing.clone();
    let store = start(adapter, 1_000);
    advance_ms(150).await;
    assert_eq!(value(&store, 1), 11.0);

    failing.store(true, Ordering::SeqCst);
    advance_ms(900).await;
    assert!(store.get_state().is_loading);
    assert!(store.mutate(Edit::Add { id: 1, amount: 5.0 }));
    let edited = store.get_state();
    assert_eq!(edited.snapshot.version, 2);

    advance_ms(100).await;
    let state = store.get_state();
    assert!(!state.is_loading);
    assert!(state.error.is_some());
    assert!(Arc::ptr_eq(&state.snapshot, &edited.snapshot));
    assert_eq!(state.snapshot.last_updated, edited.snapshot.last_updated);
    assert_eq!(value(&store, 1), 16.0);

    // The next good cycle builds on the edited snapshot.
    failing.store(false, Ordering::SeqCst);
    advance_ms(1_000).await;
    let state = store.get_state();
    assert_eq!(state.error, None);
    assert_eq!(state.snapshot.version, 3);
    assert_eq!(value(&store, 1), 17.0);
}

#[tokio::test(start_paused = true)]
async fn test_failure_rate_one_fails_every_cycle() {
    let mut cfg = config(1_000);
    cfg.failure_rate = 1.0;
    let store = SyncStore::builder(Gauges::new())
        .config(cfg)
        .random(shared_random(Sequence::constant(0.5)))
        .start()
        .unwrap();

    advance_ms(3_500).await;
    let state = store.get_state();
    assert_eq!(state.snapshot.version, 0);
    assert!(state.error.is_some());
    // Simulated outages happen before the adapter is consulted.
    assert_eq!(store.adapter().calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dispose_freezes_state() {
    let store = start(Gauges::new(), 1_000);
    advance_ms(150).await;

    let notified = Arc::new(AtomicUsize::new(0));
    let counter = notified.clone();
    let _sub = store.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    // Dispose while the t=1000 cycle is in flight.
    advance_ms(900).await;
    assert!(store.get_state().is_loading);
    let before = notified.load(Ordering::SeqCst);
    store.dispose();
    store.dispose();

    advance_ms(30_000).await;
    let state = store.get_state();
    assert!(store.is_disposed());
    assert_eq!(state.snapshot.version, 1);
    assert_eq!(store.adapter().calls(), 1);
    assert_eq!(notified.load(Ordering::SeqCst), before);
    assert_eq!(store.refresh(), Refresh::Disposed);
    assert!(!store.mutate(Edit::Add { id: 1, amount: 1.0 }));
}

#[tokio::test(start_paused = true)]
async fn test_connection_drops_and_recovers() {
    let store = start(Gauges::new(), 3_600_000);
    advance_ms(150).await;
    assert!(store.get_state().is_connected);

    advance_ms(10_000).await;
    assert!(!store.get_state().is_connected);

    advance_ms(1_000).await;
    assert!(store.get_state().is_connected);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_restarts_the_channel() {
    let store = start(Gauges::new(), 3_600_000);
    advance_ms(10_150).await;
    assert!(!store.get_state().is_connected);

    store.reconnect();
    assert!(store.get_state().is_connected);

    // The old chain would have dropped again at 21_100.
    advance_ms(9_900).await;
    assert!(store.get_state().is_connected);
    advance_ms(200).await;
    assert!(!store.get_state().is_connected);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_before_first_success_stays_disconnected() {
    let mut cfg = config(1_000);
    cfg.failure_rate = 1.0;
    let store = SyncStore::builder(Gauges::new())
        .config(cfg)
        .random(shared_random(Sequence::constant(0.5)))
        .start()
        .unwrap();

    advance_ms(150).await;
    let state = store.get_state();
    assert_eq!(state.snapshot.version, 0);
    assert!(state.error.is_some());
    assert!(!state.is_connected);

    store.reconnect();
    assert!(!store.get_state().is_connected);

    advance_ms(5_000).await;
    let state = store.get_state();
    assert_eq!(state.snapshot.version, 0);
    assert!(!state.is_connected);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_subscription_stops_delivery() {
    let store = start(Gauges::new(), 1_000);
    let notified = Arc::new(AtomicUsize::new(0));
    let counter = notified.clone();
    let sub = store.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    advance_ms(150).await;
    let delivered = notified.load(Ordering::SeqCst);
    assert!(delivered >= 1);

    drop(sub);
    advance_ms(5_000).await;
    assert_eq!(notified.load(Ordering::SeqCst), delivered);
}

#[tokio::test(start_paused = true)]
async fn test_seed_file_supplies_the_first_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gauges.json");
    std::fs::write(&path, r#"[{"id": 1, "value": 40.0, "level": "empty"}]"#).unwrap();

    let store = SyncStore::builder(Gauges::new())
        .config(config(1_000))
        .source(JsonFileSource::new(&path))
        .start()
        .unwrap();
    let state = store.get_state();
    assert_eq!(state.data().len(), 1);
    assert_eq!(value(&store, 1), 40.0);
    // Seed statuses are re-derived.
    assert_eq!(state.data()[0].level, Level::Partial);
}

#[tokio::test(start_paused = true)]
async fn test_unreadable_seed_falls_back_to_builtin_data() {
    let dir = tempfile::tempdir().unwrap();
    let store = SyncStore::builder(Gauges::new())
        .config(config(1_000))
        .source(JsonFileSource::new(dir.path().join("missing.json")))
        .start()
        .unwrap();
    assert_eq!(store.get_state().data().len(), 2);
    assert_eq!(value(&store, 1), 10.0);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_config_is_rejected() {
    let mut cfg = config(1_000);
    cfg.failure_rate = 2.0;
    let result = SyncStore::builder(Gauges::new()).config(cfg).start();
    assert!(matches!(result, Err(EngineError::Config(_))));
}

#[test]
fn test_start_outside_a_runtime_fails() {
    let result = SyncStore::builder(Gauges::new()).start();
    assert!(matches!(result, Err(EngineError::NoRuntime)));
}

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use drift_core::RandomSource;

/// Random source shared by a store's scheduler, simulator and cycles.
pub type SharedRandom = Arc<Mutex<dyn RandomSource>>;

/// Wraps a source for sharing.
pub fn shared_random<R: RandomSource + 'static>(rng: R) -> SharedRandom {
    Arc::new(Mutex::new(rng))
}

/// Locks `m`, recovering the data if a holder panicked. Every critical
/// section in this crate leaves the data consistent before it can panic.
pub(crate) fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since UNIX epoch.
pub type EpochMs = i64;

/// Returns current unix epoch milliseconds.
pub fn now_ms() -> EpochMs {
    let dur = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    dur.as_millis() as i64
}

/// Next publish stamp after `prev`: wall clock time, bumped so stamps
/// strictly increase even when the clock stalls or steps backwards.
pub fn next_stamp(prev: EpochMs, now: EpochMs) -> EpochMs {
    now.max(prev.saturating_add(1))
}

use thiserror::Error;

/// A malformed perturbation rule. Raised while an adapter builds its
/// rule tables, never during a live cycle.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    /// `min` is greater than `max`.
    #[error("rule for `{field}` has inverted bounds: min {min} > max {max}")]
    InvertedBounds {
        /// Field the rule is bound to.
        field: String,
        /// Lower clamp bound.
        min: f64,
        /// Upper clamp bound.
        max: f64,
    },
    /// A bound is NaN or infinite.
    #[error("rule for `{field}` has a non-finite bound")]
    NonFiniteBound {
        /// Field the rule is bound to.
        field: String,
    },
    /// The delta parameters can produce NaN or have `lo > hi`.
    #[error("rule for `{field}` has a malformed delta: {reason}")]
    MalformedDelta {
        /// Field the rule is bound to.
        field: String,
        /// What is wrong with it.
        reason: String,
    },
    /// Two rules in one set target the same field.
    #[error("field `{0}` has more than one rule")]
    DuplicateField(String),
}

/// Invalid timing or failure-rate configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A window's lower bound exceeds its upper bound.
    #[error("window [{min_ms}, {max_ms}] is inverted")]
    InvertedWindow {
        /// Lower bound in milliseconds.
        min_ms: u64,
        /// Upper bound in milliseconds.
        max_ms: u64,
    },
    /// A window that must be positive allows a zero delay.
    #[error("`{0}` must be greater than zero")]
    ZeroWindow(&'static str),
    /// Failure rate outside `[0, 1]`.
    #[error("failure_rate must be within [0, 1], got {0}")]
    FailureRate(f64),
}

/// A refresh cycle that could not produce a new snapshot. The store
/// records it and keeps the last good snapshot.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CycleError {
    /// The (simulated) upstream did not answer.
    #[error("upstream unavailable: {0}")]
    Upstream(String),
    /// A record holds values the adapter cannot derive from.
    #[error("record `{id}` is inconsistent: {reason}")]
    Inconsistent {
        /// Record identifier.
        id: String,
        /// What could not be derived.
        reason: String,
    },
}

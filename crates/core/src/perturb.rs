//! Bounded random-walk perturbation of numeric record fields.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{RandomSource, RuleError};

/// How a new value is drawn from the old one.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Delta {
    /// `v * (1 + uniform(-spread, spread))`.
    Relative {
        /// Maximum relative change, e.g. `0.05` for ±5%.
        spread: f64,
    },
    /// `v + uniform(lo, hi)`.
    Additive {
        /// Smallest change.
        lo: f64,
        /// Largest change (exclusive).
        hi: f64,
    },
    /// `v + floor(uniform(lo, hi))`; keeps integral fields integral.
    Stepped {
        /// Smallest change.
        lo: f64,
        /// Largest change (exclusive).
        hi: f64,
    },
    /// Discards the old value: `uniform(lo, hi)`.
    Resample {
        /// Smallest value.
        lo: f64,
        /// Largest value (exclusive).
        hi: f64,
    },
    /// `v + amount`, no randomness.
    Fixed(f64),
}

impl Delta {
    /// Symmetric additive jitter of ±`spread`.
    pub const fn jitter(spread: f64) -> Self {
        Delta::Additive {
            lo: -spread,
            hi: spread,
        }
    }

    /// Symmetric integral steps of ±`spread`.
    pub const fn steps(spread: f64) -> Self {
        Delta::Stepped {
            lo: -spread,
            hi: spread,
        }
    }

    /// Relative jitter of ±`spread`.
    pub const fn relative(spread: f64) -> Self {
        Delta::Relative { spread }
    }

    /// Raw, unclamped result for `value`.
    pub fn apply(&self, value: f64, rng: &mut dyn RandomSource) -> f64 {
        match *self {
            Delta::Relative { spread } => value * (1.0 + rng.uniform(-spread, spread)),
            Delta::Additive { lo, hi } => value + rng.uniform(lo, hi),
            Delta::Stepped { lo, hi } => value + rng.uniform(lo, hi).floor(),
            Delta::Resample { lo, hi } => rng.uniform(lo, hi),
            Delta::Fixed(amount) => value + amount,
        }
    }

    fn check(&self) -> Result<(), String> {
        let finite = |xs: &[f64]| xs.iter().all(|x| x.is_finite());
        match *self {
            Delta::Relative { spread } => {
                if !finite(&[spread]) || spread < 0.0 {
                    return Err(format!("spread {spread} must be finite and non-negative"));
                }
            }
            Delta::Additive { lo, hi } | Delta::Stepped { lo, hi } | Delta::Resample { lo, hi } => {
                if !finite(&[lo, hi]) {
                    return Err("range must be finite".to_string());
                }
                if lo > hi {
                    return Err(format!("range [{lo}, {hi}) is inverted"));
                }
            }
            Delta::Fixed(amount) => {
                if !amount.is_finite() {
                    return Err("fixed amount must be finite".to_string());
                }
            }
        }
        Ok(())
    }
}

/// A delta plus optional clamp bounds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerturbationRule {
    /// Value generator.
    pub delta: Delta,
    /// Inclusive floor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Inclusive ceiling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl PerturbationRule {
    /// Unbounded rule.
    pub const fn new(delta: Delta) -> Self {
        Self {
            delta,
            min: None,
            max: None,
        }
    }

    /// Sets the inclusive floor.
    pub const fn floor(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    /// Sets the inclusive ceiling.
    pub const fn ceil(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    /// Sets both bounds.
    pub const fn within(self, min: f64, max: f64) -> Self {
        self.floor(min).ceil(max)
    }

    /// Same bounds, different delta. Used to force a change in scenarios.
    pub const fn with_delta(mut self, delta: Delta) -> Self {
        self.delta = delta;
        self
    }

    /// Clamps `value` into the rule's bounds. Non-finite input falls
    /// back to the floor (or ceiling, or zero).
    pub fn clamp(&self, value: f64) -> f64 {
        let mut v = if value.is_finite() {
            value
        } else {
            self.min.or(self.max).unwrap_or(0.0)
        };
        if let Some(min) = self.min {
            v = v.max(min);
        }
        if let Some(max) = self.max {
            v = v.min(max);
        }
        v
    }

    /// Rejects rules that could yield NaN or an empty range.
    pub fn validate(&self, field: &str) -> Result<(), RuleError> {
        for bound in [self.min, self.max].into_iter().flatten() {
            if !bound.is_finite() {
                return Err(RuleError::NonFiniteBound {
                    field: field.to_string(),
                });
            }
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(RuleError::InvertedBounds {
                    field: field.to_string(),
                    min,
                    max,
                });
            }
        }
        self.delta.check().map_err(|reason| RuleError::MalformedDelta {
            field: field.to_string(),
            reason,
        })
    }
}

/// Perturbs `value` by `rule`: draw, then clamp. When the draw is not
/// finite the previous value is kept.
pub fn perturb(value: f64, rule: &PerturbationRule, rng: &mut dyn RandomSource) -> f64 {
    let raw = rule.delta.apply(value, rng);
    if raw.is_finite() {
        rule.clamp(raw)
    } else {
        rule.clamp(value)
    }
}

/// A [`PerturbationRule`] bound to one numeric field of `T`.
pub struct FieldRule<T> {
    field: &'static str,
    get: fn(&T) -> f64,
    set: fn(&mut T, f64),
    rule: PerturbationRule,
    ceiling: Option<fn(&T) -> f64>,
}

impl<T> FieldRule<T> {
    /// Binds `rule` to the field read by `get` and written by `set`.
    pub fn new(
        field: &'static str,
        get: fn(&T) -> f64,
        set: fn(&mut T, f64),
        rule: PerturbationRule,
    ) -> Self {
        Self {
            field,
            get,
            set,
            rule,
            ceiling: None,
        }
    }

    /// Additionally caps the field at a per-record value, e.g. a
    /// location's capacity.
    pub fn capped_by(mut self, ceiling: fn(&T) -> f64) -> Self {
        self.ceiling = Some(ceiling);
        self
    }

    /// Field name.
    pub fn field(&self) -> &'static str {
        self.field
    }

    /// The bound rule.
    pub fn rule(&self) -> &PerturbationRule {
        &self.rule
    }

    /// Current value of the field.
    pub fn read(&self, record: &T) -> f64 {
        (self.get)(record)
    }

    /// Clamps `value` with the same bounds a cycle would use and writes
    /// it. Manual edits go through here.
    pub fn assign(&self, record: &mut T, value: f64) {
        let v = self.bounded(record, self.rule.clamp(value));
        (self.set)(record, v);
    }

    /// Perturbs the field in place.
    pub fn apply(&self, record: &mut T, rng: &mut dyn RandomSource) {
        let next = perturb((self.get)(record), &self.rule, rng);
        let next = self.bounded(record, next);
        (self.set)(record, next);
    }

    fn bounded(&self, record: &T, value: f64) -> f64 {
        match self.ceiling {
            Some(ceiling) => {
                let cap = ceiling(record);
                if cap.is_finite() {
                    // The rule floor still wins over a cap below it.
                    self.rule.clamp(value.min(cap))
                } else {
                    value
                }
            }
            None => value,
        }
    }
}

impl<T> fmt::Debug for FieldRule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRule")
            .field("field", &self.field)
            .field("rule", &self.rule)
            .field("capped", &self.ceiling.is_some())
            .finish()
    }
}

/// Validated list of field rules for one record type.
pub struct RuleSet<T> {
    rules: Vec<FieldRule<T>>,
}

impl<T> RuleSet<T> {
    /// Validates every rule; fails on the first malformed one.
    pub fn new(rules: Vec<FieldRule<T>>) -> Result<Self, RuleError> {
        let mut seen = HashSet::new();
        for r in &rules {
            r.rule.validate(r.field)?;
            if !seen.insert(r.field) {
                return Err(RuleError::DuplicateField(r.field.to_string()));
            }
        }
        Ok(Self { rules })
    }

    /// Rule bound to `field`, if any.
    pub fn get(&self, field: &str) -> Option<&FieldRule<T>> {
        self.rules.iter().find(|r| r.field == field)
    }

    /// Perturbs every field of one record, in rule order.
    pub fn apply(&self, record: &mut T, rng: &mut dyn RandomSource) {
        for rule in &self.rules {
            rule.apply(record, rng);
        }
    }

    /// Perturbs every record.
    pub fn apply_all(&self, records: &mut [T], rng: &mut dyn RandomSource) {
        for record in records {
            self.apply(record, rng);
        }
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// `true` when there are no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<T> fmt::Debug for RuleSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.rules).finish()
    }
}

/// Builds a [`FieldRule`] for a plain numeric field, converting through
/// `f64` with `as`.
///
/// ```
/// use drift_core::{field_rule, Delta, PerturbationRule};
///
/// struct Gauge { level: i64 }
///
/// let rule = field_rule!(Gauge, level, PerturbationRule::new(Delta::steps(10.0)).floor(0.0));
/// assert_eq!(rule.field(), "level");
/// ```
#[macro_export]
macro_rules! field_rule {
    ($ty:ty, $field:ident, $rule:expr) => {
        $crate::FieldRule::<$ty>::new(
            stringify!($field),
            |r: &$ty| r.$field as f64,
            |r: &mut $ty, v: f64| r.$field = v as _,
            $rule,
        )
    };
}

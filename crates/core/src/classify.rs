//! Ordered threshold rules that map a record to a status label.

use std::fmt;

/// Ordered `(predicate, label)` rules with a mandatory fallback. The
/// first matching predicate wins, so the order carries meaning when a
/// value sits exactly on a threshold.
///
/// Only [`StatusRulesBuilder::otherwise`] produces a value of this type,
/// so classification is total.
pub struct StatusRules<T, S> {
    rules: Vec<(fn(&T) -> bool, S)>,
    fallback: S,
}

impl<T, S: Clone> StatusRules<T, S> {
    /// Starts an empty rule list.
    pub fn builder() -> StatusRulesBuilder<T, S> {
        StatusRulesBuilder { rules: Vec::new() }
    }

    /// Label of the first matching rule, or the fallback.
    pub fn classify(&self, record: &T) -> S {
        self.rules
            .iter()
            .find(|(matches, _)| matches(record))
            .map(|(_, label)| label.clone())
            .unwrap_or_else(|| self.fallback.clone())
    }

    /// All labels in evaluation order, fallback last.
    pub fn labels(&self) -> impl Iterator<Item = &S> {
        self.rules
            .iter()
            .map(|(_, label)| label)
            .chain(std::iter::once(&self.fallback))
    }
}

impl<T, S: fmt::Debug> fmt::Debug for StatusRules<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusRules")
            .field("labels", &self.rules.iter().map(|(_, l)| l).collect::<Vec<_>>())
            .field("fallback", &self.fallback)
            .finish()
    }
}

/// Accumulates rules; finish with [`otherwise`](Self::otherwise).
pub struct StatusRulesBuilder<T, S> {
    rules: Vec<(fn(&T) -> bool, S)>,
}

impl<T, S> StatusRulesBuilder<T, S> {
    /// Appends a rule evaluated after all previously added ones.
    pub fn when(mut self, predicate: fn(&T) -> bool, label: S) -> Self {
        self.rules.push((predicate, label));
        self
    }

    /// Closes the list with the label used when nothing matched.
    pub fn otherwise(self, fallback: S) -> StatusRules<T, S> {
        StatusRules {
            rules: self.rules,
            fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq)]
    enum Level {
        Empty,
        Low,
        Full,
        Normal,
    }

    struct Tank {
        level: i64,
        low: i64,
        high: i64,
    }

    fn rules() -> StatusRules<Tank, Level> {
        StatusRules::<Tank, Level>::builder()
            .when(|t: &Tank| t.level <= 0, Level::Empty)
            .when(|t: &Tank| t.level <= t.low, Level::Low)
            .when(|t: &Tank| t.level >= t.high, Level::Full)
            .otherwise(Level::Normal)
    }

    #[test]
    fn first_match_wins_on_thresholds() {
        let r = rules();
        let tank = |level| Tank {
            level,
            low: 10,
            high: 10,
        };
        // Both `Low` and `Full` match at 10; order decides.
        assert_eq!(r.classify(&tank(10)), Level::Low);
        assert_eq!(r.classify(&tank(0)), Level::Empty);
        assert_eq!(r.classify(&tank(11)), Level::Full);
    }

    #[test]
    fn fallback_is_reached() {
        let r = rules();
        let t = Tank {
            level: 50,
            low: 10,
            high: 100,
        };
        assert_eq!(r.classify(&t), Level::Normal);
        assert_eq!(r.labels().count(), 4);
    }
}

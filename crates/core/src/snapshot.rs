use serde::{Deserialize, Serialize};

use crate::{next_stamp, EpochMs};

/// One published unit of domain data. Replaced wholesale on every
/// publish, never edited in place once shared.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<D> {
    /// The domain's record set.
    pub data: D,
    /// When this snapshot was published.
    pub last_updated: EpochMs,
    /// Publish counter; 0 for the seed snapshot.
    pub version: u64,
}

impl<D> Snapshot<D> {
    /// Seed snapshot, stamped at `now`.
    pub fn initial(data: D, now: EpochMs) -> Self {
        Self {
            data,
            last_updated: now,
            version: 0,
        }
    }

    /// Successor carrying `data`, stamped strictly after `self`.
    pub fn succeed(&self, data: D, now: EpochMs) -> Self {
        Self {
            data,
            last_updated: next_stamp(self.last_updated, now),
            version: self.version + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successors_advance_version_and_stamp() {
        let s0 = Snapshot::initial(vec![1, 2], 1_000);
        let s1 = s0.succeed(vec![3], 1_000);
        assert_eq!(s1.version, 1);
        assert_eq!(s1.last_updated, 1_001);
        let s2 = s1.succeed(vec![4], 5_000);
        assert_eq!((s2.version, s2.last_updated), (2, 5_000));
    }
}

use std::fmt;

use drift_core::{CycleError, EpochMs, RandomSource, SyncConfig};
use ulid::Ulid;

/// Identity of one manual mutation. Assigned once when the mutation is
/// submitted and reused if it is replayed onto a later cycle result, so
/// replays produce the same ids and timestamps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MutationContext {
    pub at: EpochMs,
    pub id: Ulid,
}

impl MutationContext {
    pub fn new(at: EpochMs) -> Self {
        Self { at, id: Ulid::new() }
    }
}

/// Per-domain configuration of the generic engine: seed data,
/// perturbation and status rules, and manual mutation handlers.
///
/// Rule tables are validated when the adapter is built; `perturb` only
/// fails for data-level problems.
pub trait DomainAdapter: Send + Sync + 'static {
    /// The domain's record set.
    type Data: Clone + Send + Sync + 'static;
    /// Manual edits accepted by [`apply`](Self::apply).
    type Mutation: Clone + fmt::Debug + Send + Sync + 'static;

    /// Short lowercase name used in logs and error messages.
    fn name(&self) -> &'static str;

    fn default_config(&self) -> SyncConfig;

    /// Locally held dataset used when no seed source answers.
    fn initial(&self) -> Self::Data;

    /// Re-derives every categorical field from the numeric ones.
    fn reclassify(&self, data: &mut Self::Data);

    /// Applies one cycle of drift to the numeric fields.
    fn perturb(
        &self,
        data: &mut Self::Data,
        rng: &mut dyn RandomSource,
        now: EpochMs,
    ) -> Result<(), CycleError>;

    /// Applies a manual edit, re-deriving dependent statuses with the
    /// same rules the cycle uses. Returns `false` (and leaves `data`
    /// alone) when the target does not exist.
    fn apply(&self, data: &mut Self::Data, mutation: &Self::Mutation, ctx: &MutationContext) -> bool;
}

/// One cycle's work on a copy of `data`: perturb, then reclassify.
pub fn advance<A: DomainAdapter>(
    adapter: &A,
    data: &A::Data,
    rng: &mut dyn RandomSource,
    now: EpochMs,
) -> Result<A::Data, CycleError> {
    let mut next = data.clone();
    adapter.perturb(&mut next, rng, now)?;
    adapter.reclassify(&mut next);
    Ok(next)
}

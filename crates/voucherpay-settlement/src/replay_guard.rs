//! Replay guard: consumed sequence numbers per (authorizer, domain).
//!
//! Like a spent-output set: once a sequence is consumed it stays consumed for
//! the lifetime of the settlement instance. There is no eviction; dropping an
//! old entry would make that voucher redeemable again.
//!
//! The guard itself is a plain data structure. The settlement engine holds it
//! behind a lock so that `is_fresh` and `mark_consumed` for one claim happen
//! inside a single critical section.

use std::collections::{HashMap, HashSet};

use voucherpay_types::{AuthorizerId, DomainId, Result, VoucherpayError};

/// Consumed sequence numbers, scoped per authorizer and domain.
#[derive(Debug, Default)]
pub struct ReplayGuard {
    /// `(AuthorizerId, DomainId) → Set<sequence>`.
    consumed: HashMap<(AuthorizerId, DomainId), HashSet<u64>>,
}

impl ReplayGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `sequence` has never been consumed in this scope.
    #[must_use]
    pub fn is_fresh(&self, authorizer: &AuthorizerId, domain: &DomainId, sequence: u64) -> bool {
        self.consumed
            .get(&(*authorizer, *domain))
            .is_none_or(|set| !set.contains(&sequence))
    }

    /// Record `sequence` as consumed.
    ///
    /// Callers must have checked [`Self::is_fresh`] in the same critical
    /// section; consuming twice is a bug and is reported as a replay.
    ///
    /// # Errors
    /// Returns [`VoucherpayError::ReplayedSequence`] if already consumed.
    pub fn mark_consumed(
        &mut self,
        authorizer: &AuthorizerId,
        domain: &DomainId,
        sequence: u64,
    ) -> Result<()> {
        let set = self.consumed.entry((*authorizer, *domain)).or_default();
        if !set.insert(sequence) {
            return Err(VoucherpayError::ReplayedSequence { sequence });
        }
        Ok(())
    }

    /// Number of consumed sequences in one scope.
    #[must_use]
    pub fn consumed_count(&self, authorizer: &AuthorizerId, domain: &DomainId) -> usize {
        self.consumed
            .get(&(*authorizer, *domain))
            .map_or(0, HashSet::len)
    }

    /// Total consumed sequences across all scopes.
    #[must_use]
    pub fn total_consumed(&self) -> usize {
        self.consumed.values().map(HashSet::len).sum()
    }
}

//! Register of claims that were debited but not paid out.
//!
//! When the payout after a successful debit fails, the sequence is already
//! consumed and the escrow already debited. Rolling back would un-consume a
//! sequence, so the claim is recorded here instead and resolved through
//! `ClaimSettlementEngine::retry_unpaid` or by an operator.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use voucherpay_types::{AccountId, MessageDigest, MessageKind, Result, VoucherpayError};

/// One debited-but-unpaid claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnpaidClaim {
    pub sequence: u64,
    pub kind: MessageKind,
    pub recipient: AccountId,
    pub amount: u64,
    pub digest: MessageDigest,
    /// Escrow balance right after the debit.
    pub balance_after: u64,
    /// Error reported by the last failed transfer attempt.
    pub last_error: String,
    /// Failed transfer attempts so far, including the original one.
    pub attempts: u32,
    pub recorded_at: DateTime<Utc>,
}

/// Outstanding unpaid claims keyed by sequence.
#[derive(Debug, Default)]
pub struct UnpaidClaims {
    entries: BTreeMap<u64, UnpaidClaim>,
}

impl UnpaidClaims {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a claim whose payout failed.
    ///
    /// # Errors
    /// Returns `Internal` if the sequence is already recorded; a consumed
    /// sequence can only be debited once.
    pub fn record(&mut self, claim: UnpaidClaim) -> Result<()> {
        if self.entries.contains_key(&claim.sequence) {
            return Err(VoucherpayError::Internal(format!(
                "unpaid claim for sequence {} already recorded",
                claim.sequence
            )));
        }
        self.entries.insert(claim.sequence, claim);
        Ok(())
    }

    /// Remove a claim for a retry attempt. While taken, a concurrent retry of
    /// the same sequence finds nothing and cannot pay twice.
    ///
    /// # Errors
    /// Returns [`VoucherpayError::UnknownUnpaidClaim`] if none is recorded.
    pub fn take(&mut self, sequence: u64) -> Result<UnpaidClaim> {
        self.entries
            .remove(&sequence)
            .ok_or(VoucherpayError::UnknownUnpaidClaim(sequence))
    }

    /// Put a claim back after another failed attempt.
    pub fn requeue(&mut self, mut claim: UnpaidClaim, error: String) {
        claim.attempts = claim.attempts.saturating_add(1);
        claim.last_error = error;
        self.entries.insert(claim.sequence, claim);
    }

    #[must_use]
    pub fn get(&self, sequence: u64) -> Option<&UnpaidClaim> {
        self.entries.get(&sequence)
    }

    /// All outstanding claims, ordered by sequence.
    #[must_use]
    pub fn list(&self) -> Vec<UnpaidClaim> {
        self.entries.values().cloned().collect()
    }

    /// Sum of all outstanding amounts.
    #[must_use]
    pub fn total_outstanding(&self) -> u128 {
        self.entries.values().map(|c| u128::from(c.amount)).sum()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

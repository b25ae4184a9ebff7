//! Payout seam to the external ledger.
//!
//! The settlement engine never moves funds itself; after a successful debit
//! it hands `(recipient, amount)` to a [`TransferSink`]. Implementations must
//! be idempotent per call site: the engine calls `transfer` at most once per
//! attempt and never while holding its settlement lock.

use std::collections::HashMap;

use parking_lot::Mutex;
use voucherpay_types::{AccountId, Result};

/// External collaborator that pays a recipient.
pub trait TransferSink: Send + Sync {
    /// Pay `amount` to `recipient`. Any error is surfaced by the engine as
    /// `TransferFailure` and the claim is recorded as unpaid.
    fn transfer(&self, recipient: &AccountId, amount: u64) -> Result<()>;
}

impl<T: TransferSink + ?Sized> TransferSink for std::sync::Arc<T> {
    fn transfer(&self, recipient: &AccountId, amount: u64) -> Result<()> {
        (**self).transfer(recipient, amount)
    }
}

/// In-process payout book: credits accumulate per recipient.
///
/// Stands in for the ledger when the engine is embedded in a single process
/// and in tests.
#[derive(Debug, Default)]
pub struct InMemoryPayouts {
    credited: Mutex<HashMap<AccountId, u64>>,
}

impl InMemoryPayouts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total paid to one recipient.
    #[must_use]
    pub fn credited(&self, recipient: &AccountId) -> u64 {
        self.credited.lock().get(recipient).copied().unwrap_or(0)
    }

    /// Total paid to everyone.
    #[must_use]
    pub fn total_paid(&self) -> u128 {
        self.credited.lock().values().map(|v| u128::from(*v)).sum()
    }
}

impl TransferSink for InMemoryPayouts {
    fn transfer(&self, recipient: &AccountId, amount: u64) -> Result<()> {
        let mut credited = self.credited.lock();
        let entry = credited.entry(*recipient).or_insert(0);
        *entry = entry.saturating_add(amount);
        Ok(())
    }
}

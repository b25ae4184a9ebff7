//! Escrow ledger: the single pre-funded balance claims are paid from.
//!
//! All mutations are compare-and-swap on one `AtomicU64`: either the full
//! operation applies or the balance is unchanged. A debit never takes the
//! balance below zero and never applies partially.

use std::sync::atomic::{AtomicU64, Ordering};

use voucherpay_types::{Result, VoucherpayError};

/// Lock-free escrow balance.
#[derive(Debug, Default)]
pub struct EscrowLedger {
    balance: AtomicU64,
}

impl EscrowLedger {
    /// Create an empty escrow.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increase the balance. Returns the new balance.
    ///
    /// # Errors
    /// - `InvalidAmount` if `amount` is zero
    /// - `BalanceOverflow` if the balance would exceed `u64::MAX`
    pub fn deposit(&self, amount: u64) -> Result<u64> {
        if amount == 0 {
            return Err(VoucherpayError::InvalidAmount);
        }
        let prev = self
            .balance
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |b| b.checked_add(amount))
            .map_err(|_| VoucherpayError::BalanceOverflow)?;
        Ok(prev + amount)
    }

    /// Debit `amount` if and only if `amount <= balance`. Returns the new balance.
    ///
    /// # Errors
    /// - `InvalidAmount` if `amount` is zero
    /// - `InsufficientFunds` if the balance is below `amount`; balance unchanged
    pub fn try_debit(&self, amount: u64) -> Result<u64> {
        if amount == 0 {
            return Err(VoucherpayError::InvalidAmount);
        }
        let prev = self
            .balance
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |b| b.checked_sub(amount))
            .map_err(|available| VoucherpayError::InsufficientFunds {
                needed: amount,
                available,
            })?;
        Ok(prev - amount)
    }

    /// Put back an amount that was debited in the same critical section.
    ///
    /// Deposits take that critical section too, so the balance is at most
    /// its pre-debit value here and the addition cannot overflow.
    pub(crate) fn restore(&self, amount: u64) {
        self.balance.fetch_add(amount, Ordering::AcqRel);
    }

    /// Funds currently available for claims.
    #[must_use]
    pub fn current_balance(&self) -> u64 {
        self.balance.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn deposit_increases_balance() {
        let escrow = EscrowLedger::new();
        assert_eq!(escrow.deposit(100).unwrap(), 100);
        assert_eq!(escrow.deposit(10).unwrap(), 110);
        assert_eq!(escrow.current_balance(), 110);
    }

    #[test]
    fn zero_deposit_rejected() {
        let escrow = EscrowLedger::new();
        assert!(matches!(escrow.deposit(0), Err(VoucherpayError::InvalidAmount)));
        assert_eq!(escrow.current_balance(), 0);
    }

    #[test]
    fn overflow_rejected() {
        let escrow = EscrowLedger::new();
        escrow.deposit(u64::MAX).unwrap();
        assert!(matches!(
            escrow.deposit(1),
            Err(VoucherpayError::BalanceOverflow)
        ));
        assert_eq!(escrow.current_balance(), u64::MAX);
    }

    #[test]
    fn debit_within_balance() {
        let escrow = EscrowLedger::new();
        escrow.deposit(100).unwrap();
        assert_eq!(escrow.try_debit(40).unwrap(), 60);
        assert_eq!(escrow.try_debit(60).unwrap(), 0);
    }

    #[test]
    fn debit_beyond_balance_leaves_it_untouched() {
        let escrow = EscrowLedger::new();
        escrow.deposit(30).unwrap();
        let err = escrow.try_debit(31).unwrap_err();
        assert!(matches!(
            err,
            VoucherpayError::InsufficientFunds {
                needed: 31,
                available: 30
            }
        ));
        assert_eq!(escrow.current_balance(), 30);
    }

    #[test]
    fn zero_debit_rejected() {
        let escrow = EscrowLedger::new();
        escrow.deposit(5).unwrap();
        assert!(matches!(escrow.try_debit(0), Err(VoucherpayError::InvalidAmount)));
    }

    #[test]
    fn restore_returns_funds() {
        let escrow = EscrowLedger::new();
        escrow.deposit(50).unwrap();
        escrow.try_debit(20).unwrap();
        escrow.restore(20);
        assert_eq!(escrow.current_balance(), 50);
    }

    #[test]
    fn restore_at_full_balance_does_not_wrap() {
        let escrow = EscrowLedger::new();
        escrow.deposit(u64::MAX).unwrap();
        escrow.try_debit(1).unwrap();
        escrow.restore(1);
        assert_eq!(escrow.current_balance(), u64::MAX);
    }

    #[test]
    fn concurrent_debits_never_overdraw() {
        let escrow = EscrowLedger::new();
        escrow.deposit(1_000).unwrap();

        let successes: usize = thread::scope(|s| {
            let handles: Vec<_> = (0..16)
                .map(|_| {
                    s.spawn(|| (0..100).filter(|_| escrow.try_debit(1).is_ok()).count())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(successes, 1_000);
        assert_eq!(escrow.current_balance(), 0);
    }
}

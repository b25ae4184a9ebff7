//! Escrow conservation invariant checker.
//!
//! Identity enforced after any sequence of operations:
//! ```text
//! balance == Σ(deposits) - Σ(claim debits) - Σ(withdrawal debits)
//! ```
//!
//! Debits are counted when the escrow is debited, whether or not the payout
//! later succeeded; unpaid claims are tracked separately.

use voucherpay_types::{MessageKind, Result, VoucherpayError};

/// Running totals since the instance was created. Kept in `u128` so that
/// lifetime volume can exceed the `u64` balance range.
#[derive(Debug, Default)]
pub struct SupplyConservation {
    deposits: u128,
    claims: u128,
    withdrawals: u128,
}

impl SupplyConservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_deposit(&mut self, amount: u64) {
        self.deposits += u128::from(amount);
    }

    /// Record an escrow debit for a settled message.
    pub fn record_debit(&mut self, kind: MessageKind, amount: u64) {
        match kind {
            MessageKind::Claim => self.claims += u128::from(amount),
            MessageKind::Withdrawal => self.withdrawals += u128::from(amount),
        }
    }

    /// Expected balance: deposits minus all debits. Negative means the
    /// totals themselves are corrupt.
    #[must_use]
    pub fn expected_balance(&self) -> i128 {
        i128::try_from(self.deposits).unwrap_or(i128::MAX)
            - i128::try_from(self.claims + self.withdrawals).unwrap_or(i128::MAX)
    }

    /// Compare the actual escrow balance against the recorded totals.
    ///
    /// # Errors
    /// Returns [`VoucherpayError::ConservationViolation`] if they differ.
    pub fn verify(&self, actual_balance: u64) -> Result<()> {
        let expected = self.expected_balance();
        if i128::from(actual_balance) != expected {
            return Err(VoucherpayError::ConservationViolation {
                reason: format!(
                    "balance {actual_balance} != expected {expected} \
                     (deposits={}, claims={}, withdrawals={})",
                    self.deposits, self.claims, self.withdrawals
                ),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn total_deposits(&self) -> u128 {
        self.deposits
    }

    #[must_use]
    pub fn total_claimed(&self) -> u128 {
        self.claims
    }

    #[must_use]
    pub fn total_withdrawn(&self) -> u128 {
        self.withdrawals
    }
}

//! Settlement receipts for the VoucherPay audit trail.
//!
//! Every settled claim or withdrawal produces a [`ClaimReceipt`] carrying the
//! digest that was verified, so an auditor can reconstruct the signed message
//! independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, MessageDigest, MessageKind, ReceiptId};

/// Proof that a voucher was settled and paid out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReceipt {
    /// Unique receipt identifier.
    pub id: ReceiptId,
    /// Claim or authorizer withdrawal.
    pub kind: MessageKind,
    /// The consumed sequence number.
    pub sequence: u64,
    /// Who was paid.
    pub recipient: AccountId,
    /// Amount paid, in the smallest currency unit.
    pub amount: u64,
    /// Digest of the encoded message that the signature covered.
    pub digest: MessageDigest,
    /// Escrow balance immediately after the debit.
    pub balance_after: u64,
    /// When the payout completed.
    pub settled_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_serde_roundtrip() {
        let receipt = ClaimReceipt {
            id: ReceiptId::new(),
            kind: MessageKind::Claim,
            sequence: 1,
            recipient: AccountId([1; 32]),
            amount: 40,
            digest: MessageDigest([2; 32]),
            balance_after: 60,
            settled_at: Utc::now(),
        };
        let json = serde_json::to_string(&receipt).unwrap();
        let back: ClaimReceipt = serde_json::from_str(&json).unwrap();
        assert_eq!(receipt, back);
    }
}

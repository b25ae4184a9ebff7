//! Error types for the VoucherPay engine.
//!
//! All errors use the `VP_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Authorization (signature, domain binding)
//! - 2xx: Replay protection
//! - 3xx: Escrow balance
//! - 4xx: Transfer / payout
//! - 9xx: General / internal errors

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The ordered checks a claim passes through. Every rejection maps to the
/// stage that failed so operators can tell a bad voucher from an empty escrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimStage {
    Encode,
    Verify,
    Freshness,
    Debit,
    Transfer,
}

impl fmt::Display for ClaimStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode => write!(f, "ENCODE"),
            Self::Verify => write!(f, "VERIFY"),
            Self::Freshness => write!(f, "FRESHNESS"),
            Self::Debit => write!(f, "DEBIT"),
            Self::Transfer => write!(f, "TRANSFER"),
        }
    }
}

/// Central error enum for all VoucherPay operations.
#[derive(Debug, Error)]
pub enum VoucherpayError {
    // =================================================================
    // Authorization Errors (1xx)
    // =================================================================
    /// Malformed signature, malformed authorizer key, or signed by someone else.
    #[error("VP_ERR_100: Invalid signature: {reason}")]
    InvalidSignature { reason: String },

    // =================================================================
    // Replay Errors (2xx)
    // =================================================================
    /// Sequence number already consumed (replay attempt).
    #[error("VP_ERR_200: Sequence {sequence} already consumed")]
    ReplayedSequence { sequence: u64 },

    /// The replay-guard lock could not be acquired in time. Nothing changed.
    #[error("VP_ERR_201: Settlement contended, gave up after {waited_ms}ms")]
    Contended { waited_ms: u64 },

    // =================================================================
    // Escrow Errors (3xx)
    // =================================================================
    /// Escrow balance below the requested amount.
    #[error("VP_ERR_300: Insufficient escrow funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    /// Zero-value deposit, claim, or withdrawal.
    #[error("VP_ERR_301: Amount must be greater than zero")]
    InvalidAmount,

    /// A deposit would overflow the escrow balance.
    #[error("VP_ERR_302: Escrow balance overflow")]
    BalanceOverflow,

    /// `deposits - debits != balance`. Critical safety alert.
    #[error("VP_ERR_303: Conservation invariant violation: {reason}")]
    ConservationViolation { reason: String },

    // =================================================================
    // Transfer Errors (4xx)
    // =================================================================
    /// Funds were debited and the sequence consumed, but the payout did not
    /// complete. The claim is recorded as unpaid; resubmitting the voucher
    /// will fail with `ReplayedSequence`.
    #[error("VP_ERR_400: Transfer failed after debit for sequence {sequence}: {reason}")]
    TransferFailure { sequence: u64, reason: String },

    /// No unpaid claim is recorded under this sequence.
    #[error("VP_ERR_401: No unpaid claim for sequence {0}")]
    UnknownUnpaidClaim(u64),

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("VP_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("VP_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config, missing fields, etc.).
    #[error("VP_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// Encoded message could not be decoded.
    #[error("VP_ERR_903: Codec error: {reason}")]
    Codec { reason: String },

    /// Identity could not be parsed.
    #[error("VP_ERR_904: Invalid identity: {reason}")]
    InvalidIdentity { reason: String },
}

impl VoucherpayError {
    /// Which claim check produced this error, if it came from the claim pipeline.
    #[must_use]
    pub fn stage(&self) -> Option<ClaimStage> {
        match self {
            Self::InvalidSignature { .. } => Some(ClaimStage::Verify),
            Self::ReplayedSequence { .. } | Self::Contended { .. } => Some(ClaimStage::Freshness),
            Self::InsufficientFunds { .. } | Self::InvalidAmount => Some(ClaimStage::Debit),
            Self::TransferFailure { .. } => Some(ClaimStage::Transfer),
            Self::Codec { .. } => Some(ClaimStage::Encode),
            _ => None,
        }
    }

    /// Whether resubmitting the same claim later can succeed.
    ///
    /// Only a short balance or a contended lock qualify. A transfer failure is
    /// not retryable by resubmission: the sequence is already consumed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientFunds { .. } | Self::Contended { .. }
        )
    }

    /// Whether escrow state was mutated before this error was raised.
    #[must_use]
    pub fn state_mutated(&self) -> bool {
        matches!(self, Self::TransferFailure { .. })
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, VoucherpayError>;

impl From<serde_json::Error> for VoucherpayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = VoucherpayError::ReplayedSequence { sequence: 7 };
        let msg = format!("{err}");
        assert!(msg.starts_with("VP_ERR_200"), "Got: {msg}");
        assert!(msg.contains('7'));
    }

    #[test]
    fn insufficient_funds_display() {
        let err = VoucherpayError::InsufficientFunds {
            needed: 100,
            available: 50,
        };
        let msg = format!("{err}");
        assert!(msg.contains("VP_ERR_300"));
        assert!(msg.contains("100"));
        assert!(msg.contains("50"));
    }

    #[test]
    fn stages_follow_claim_order() {
        let bad_sig = VoucherpayError::InvalidSignature {
            reason: "x".into(),
        };
        assert_eq!(bad_sig.stage(), Some(ClaimStage::Verify));
        assert_eq!(
            VoucherpayError::ReplayedSequence { sequence: 1 }.stage(),
            Some(ClaimStage::Freshness)
        );
        assert_eq!(
            VoucherpayError::InsufficientFunds {
                needed: 2,
                available: 1
            }
            .stage(),
            Some(ClaimStage::Debit)
        );
        assert_eq!(
            VoucherpayError::TransferFailure {
                sequence: 1,
                reason: "down".into()
            }
            .stage(),
            Some(ClaimStage::Transfer)
        );
        assert_eq!(VoucherpayError::Internal("x".into()).stage(), None);
    }

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(
            VoucherpayError::InsufficientFunds {
                needed: 2,
                available: 1
            }
            .is_retryable()
        );
        assert!(VoucherpayError::Contended { waited_ms: 50 }.is_retryable());
        assert!(!VoucherpayError::ReplayedSequence { sequence: 1 }.is_retryable());
        let transfer = VoucherpayError::TransferFailure {
            sequence: 1,
            reason: "x".into(),
        };
        assert!(!transfer.is_retryable());
        assert!(transfer.state_mutated());
    }

    #[test]
    fn all_errors_have_vp_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(VoucherpayError::InvalidAmount),
            Box::new(VoucherpayError::BalanceOverflow),
            Box::new(VoucherpayError::UnknownUnpaidClaim(3)),
            Box::new(VoucherpayError::Internal("test".into())),
            Box::new(VoucherpayError::InvalidSignature {
                reason: "test".into(),
            }),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("VP_ERR_"),
                "Error missing VP_ERR_ prefix: {msg}"
            );
        }
    }
}

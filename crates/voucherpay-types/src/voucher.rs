//! # Voucher: the off-chain payment authorization
//!
//! A `Voucher` is issued by the authorizer without touching the ledger. Any
//! holder of the voucher and its signature can redeem it exactly once against
//! the escrow of the settlement instance named by `domain`.
//!
//! ## Security Properties
//!
//! - **Signature-bound**: every field is inside the signed message
//! - **Sequence-bound**: each sequence number is redeemable once per domain
//! - **Domain-bound**: a voucher for one instance is useless against another

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{AccountId, DomainId, constants};

/// What a signed message authorizes. Encoded as a single byte so a claim
/// signature can never be replayed as a withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// Pay `amount` to a recipient.
    Claim,
    /// Return `amount` of escrow to the authorizer's payout account.
    Withdrawal,
}

impl MessageKind {
    #[must_use]
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Claim => 0x01,
            Self::Withdrawal => 0x02,
        }
    }

    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::Claim),
            0x02 => Some(Self::Withdrawal),
            _ => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Claim => write!(f, "CLAIM"),
            Self::Withdrawal => write!(f, "WITHDRAWAL"),
        }
    }
}

/// An authorization to pay `amount` to `recipient` from the escrow of `domain`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Voucher {
    /// Who receives the funds.
    pub recipient: AccountId,
    /// Amount in the smallest currency unit.
    pub amount: u64,
    /// Authorizer-chosen unique sequence number.
    pub sequence: u64,
    /// The settlement instance this voucher is valid against.
    pub domain: DomainId,
}

impl Voucher {
    #[must_use]
    pub fn new(recipient: AccountId, amount: u64, sequence: u64, domain: DomainId) -> Self {
        Self {
            recipient,
            amount,
            sequence,
            domain,
        }
    }
}

/// Opaque signature bytes as submitted by a claimant. Not validated on
/// construction; the verifier rejects malformed encodings.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoucherSignature(pub Vec<u8>);

impl VoucherSignature {
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Whether the length matches an ed25519 signature.
    #[must_use]
    pub fn is_well_sized(&self) -> bool {
        self.0.len() == constants::SIGNATURE_LEN
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Debug for VoucherSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VoucherSignature({})", self.to_hex())
    }
}

/// SHA-256 digest of an encoded message: the value actually signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageDigest(pub [u8; 32]);

impl MessageDigest {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for MessageDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Random voucher for testing. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl Voucher {
    /// Create a voucher with a random recipient and sequence.
    pub fn dummy(amount: u64, domain: DomainId) -> Self {
        Self {
            recipient: AccountId(rand::random::<[u8; 32]>()),
            amount,
            sequence: rand::random::<u64>(),
            domain,
        }
    }
}

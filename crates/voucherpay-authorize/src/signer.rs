//! Authorizer-side voucher signing.
//!
//! Key generation and custody belong to the deployment; this type only turns
//! a secret key into signatures the settlement engine will accept.

use std::fmt;

use ed25519_dalek::{Signer, SigningKey};
use voucherpay_types::{AuthorizerId, MessageDigest, MessageKind, Voucher, VoucherSignature};

use crate::digest::voucher_digest;

/// Signs vouchers on behalf of one authorizer.
pub struct VoucherSigner {
    key: SigningKey,
}

impl VoucherSigner {
    /// Build a signer from a 32-byte ed25519 secret.
    #[must_use]
    pub fn from_secret(secret: [u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(&secret),
        }
    }

    /// The public identity settlement instances must be configured with.
    #[must_use]
    pub fn authorizer_id(&self) -> AuthorizerId {
        AuthorizerId::from_pubkey(self.key.verifying_key().to_bytes())
    }

    #[must_use]
    pub fn sign_digest(&self, digest: &MessageDigest) -> VoucherSignature {
        VoucherSignature::from_bytes(self.key.sign(digest.as_bytes()).to_bytes())
    }

    /// Sign a payment voucher.
    #[must_use]
    pub fn sign_claim(&self, voucher: &Voucher) -> VoucherSignature {
        let digest = voucher_digest(MessageKind::Claim, voucher);
        tracing::debug!(
            authorizer = %self.authorizer_id(),
            recipient = %voucher.recipient,
            amount = voucher.amount,
            sequence = voucher.sequence,
            domain = %voucher.domain,
            "Voucher signed"
        );
        self.sign_digest(&digest)
    }

    /// Sign an escrow withdrawal to `voucher.recipient`.
    #[must_use]
    pub fn sign_withdrawal(&self, voucher: &Voucher) -> VoucherSignature {
        self.sign_digest(&voucher_digest(MessageKind::Withdrawal, voucher))
    }
}

/// Random signer for testing. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl VoucherSigner {
    pub fn generate() -> Self {
        Self {
            key: SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }
}

impl fmt::Debug for VoucherSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoucherSigner")
            .field("authorizer", &self.authorizer_id())
            .finish_non_exhaustive()
    }
}

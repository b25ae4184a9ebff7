//! Signature verifier.
//!
//! ed25519 has no public-key recovery, so authorship is established by
//! verifying the digest directly under the expected authorizer key. A
//! signature made by any other key fails the same way a recovered-address
//! mismatch would.
//!
//! `verify_strict` is used so that malleable encodings and small-order keys
//! are rejected, not just wrong signatures.

use ed25519_dalek::{Signature, VerifyingKey};
use voucherpay_types::{
    AuthorizerId, MessageDigest, Result, VoucherSignature, VoucherpayError, constants,
};

fn invalid(reason: impl Into<String>) -> VoucherpayError {
    VoucherpayError::InvalidSignature {
        reason: reason.into(),
    }
}

/// Check that `signature` over `digest` was produced by `expected`.
///
/// # Errors
/// Returns [`VoucherpayError::InvalidSignature`] naming the failed condition:
/// malformed authorizer key, malformed signature encoding, or mismatch.
pub fn check(
    digest: &MessageDigest,
    signature: &VoucherSignature,
    expected: &AuthorizerId,
) -> Result<()> {
    let key = VerifyingKey::from_bytes(expected.as_bytes())
        .map_err(|e| invalid(format!("authorizer key {expected} is not a valid point: {e}")))?;

    if !signature.is_well_sized() {
        return Err(invalid(format!(
            "expected {} signature bytes, got {}",
            constants::SIGNATURE_LEN,
            signature.as_bytes().len()
        )));
    }
    let sig = Signature::from_slice(signature.as_bytes())
        .map_err(|e| invalid(format!("malformed signature: {e}")))?;

    key.verify_strict(digest.as_bytes(), &sig)
        .map_err(|_| invalid(format!("not signed by {expected}")))
}

/// Boolean form of [`check`]. Never panics; every failure is `false`.
#[must_use]
pub fn verify(digest: &MessageDigest, signature: &VoucherSignature, expected: &AuthorizerId) -> bool {
    check(digest, signature, expected).is_ok()
}

/// Whether the key can ever verify anything (decompresses and is not weak).
#[must_use]
pub fn is_valid_authorizer(authorizer: &AuthorizerId) -> bool {
    VerifyingKey::from_bytes(authorizer.as_bytes()).is_ok_and(|k| !k.is_weak())
}

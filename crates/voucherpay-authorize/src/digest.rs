//! SHA-256 digest engine.

use sha2::{Digest, Sha256};
use voucherpay_types::{MessageDigest, MessageKind, Voucher};

use crate::codec;

/// Hash encoded message bytes.
#[must_use]
pub fn digest(bytes: &[u8]) -> MessageDigest {
    MessageDigest(Sha256::digest(bytes).into())
}

/// Encode then hash: the digest an authorizer signs for this voucher.
#[must_use]
pub fn voucher_digest(kind: MessageKind, voucher: &Voucher) -> MessageDigest {
    digest(&codec::encode_voucher(kind, voucher))
}

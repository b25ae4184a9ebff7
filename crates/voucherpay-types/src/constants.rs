//! System-wide constants for the VoucherPay engine.

/// Tag prepended to every signed message. Fixed width, so the encoded
/// message length never depends on field values.
pub const MESSAGE_TAG: &[u8; 14] = b"voucherpay:v1:";

/// Width of every identity (authorizer key, recipient, domain) in bytes.
pub const IDENTITY_LEN: usize = 32;

/// Width of the big-endian amount field.
pub const AMOUNT_LEN: usize = 8;

/// Width of the big-endian sequence field.
pub const SEQUENCE_LEN: usize = 8;

/// Total encoded message length:
/// `tag(14) || kind(1) || recipient(32) || amount(8) || sequence(8) || domain(32)`.
pub const MESSAGE_LEN: usize =
    MESSAGE_TAG.len() + 1 + IDENTITY_LEN + AMOUNT_LEN + SEQUENCE_LEN + IDENTITY_LEN;

/// Length of a well-formed ed25519 signature.
pub const SIGNATURE_LEN: usize = 64;

/// Prefix hashed together with a label in [`crate::DomainId::derive`].
pub const DOMAIN_DERIVATION_PREFIX: &[u8] = b"voucherpay:domain:v1:";

/// Default bound on how long a claim waits for the replay-guard lock.
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 50;

/// Upper bound accepted for `lock_timeout_ms` in configuration.
pub const MAX_LOCK_TIMEOUT_MS: u64 = 5_000;

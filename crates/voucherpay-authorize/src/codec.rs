//! Deterministic message codec.
//!
//! Layout (95 bytes, all fields fixed width):
//!
//! ```text
//! offset  width  field
//!      0     14  "voucherpay:v1:"
//!     14      1  message kind (0x01 claim, 0x02 withdrawal)
//!     15     32  recipient
//!     47      8  amount, big-endian
//!     55      8  sequence, big-endian
//!     63     32  domain
//! ```
//!
//! Because every field has a fixed offset and width, distinct inputs always
//! produce distinct bytes.

use voucherpay_types::{
    AccountId, DomainId, MessageKind, Result, Voucher, VoucherpayError,
    constants::{AMOUNT_LEN, IDENTITY_LEN, MESSAGE_LEN, MESSAGE_TAG, SEQUENCE_LEN},
};

const KIND_OFFSET: usize = MESSAGE_TAG.len();
const RECIPIENT_OFFSET: usize = KIND_OFFSET + 1;
const AMOUNT_OFFSET: usize = RECIPIENT_OFFSET + IDENTITY_LEN;
const SEQUENCE_OFFSET: usize = AMOUNT_OFFSET + AMOUNT_LEN;
const DOMAIN_OFFSET: usize = SEQUENCE_OFFSET + SEQUENCE_LEN;

/// Encode a message of any kind.
#[must_use]
pub fn encode(
    kind: MessageKind,
    recipient: &AccountId,
    amount: u64,
    sequence: u64,
    domain: &DomainId,
) -> [u8; MESSAGE_LEN] {
    let mut out = [0u8; MESSAGE_LEN];
    out[..KIND_OFFSET].copy_from_slice(MESSAGE_TAG);
    out[KIND_OFFSET] = kind.as_byte();
    out[RECIPIENT_OFFSET..AMOUNT_OFFSET].copy_from_slice(recipient.as_bytes());
    out[AMOUNT_OFFSET..SEQUENCE_OFFSET].copy_from_slice(&amount.to_be_bytes());
    out[SEQUENCE_OFFSET..DOMAIN_OFFSET].copy_from_slice(&sequence.to_be_bytes());
    out[DOMAIN_OFFSET..].copy_from_slice(domain.as_bytes());
    out
}

/// Encode a payment claim.
#[must_use]
pub fn encode_claim(
    recipient: &AccountId,
    amount: u64,
    sequence: u64,
    domain: &DomainId,
) -> [u8; MESSAGE_LEN] {
    encode(MessageKind::Claim, recipient, amount, sequence, domain)
}

#[must_use]
pub fn encode_voucher(kind: MessageKind, voucher: &Voucher) -> [u8; MESSAGE_LEN] {
    encode(
        kind,
        &voucher.recipient,
        voucher.amount,
        voucher.sequence,
        &voucher.domain,
    )
}

fn codec_err(reason: impl Into<String>) -> VoucherpayError {
    VoucherpayError::Codec {
        reason: reason.into(),
    }
}

fn array<const N: usize>(bytes: &[u8], from: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[from..from + N]);
    out
}

/// Decode an encoded message back into its kind and voucher.
///
/// # Errors
/// Returns [`VoucherpayError::Codec`] on wrong length, wrong tag, or an
/// unknown kind byte.
pub fn decode(bytes: &[u8]) -> Result<(MessageKind, Voucher)> {
    if bytes.len() != MESSAGE_LEN {
        return Err(codec_err(format!(
            "expected {MESSAGE_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    if &bytes[..KIND_OFFSET] != MESSAGE_TAG {
        return Err(codec_err("unknown message tag"));
    }
    let kind = MessageKind::from_byte(bytes[KIND_OFFSET])
        .ok_or_else(|| codec_err(format!("unknown message kind 0x{:02x}", bytes[KIND_OFFSET])))?;

    let voucher = Voucher {
        recipient: AccountId(array(bytes, RECIPIENT_OFFSET)),
        amount: u64::from_be_bytes(array(bytes, AMOUNT_OFFSET)),
        sequence: u64::from_be_bytes(array(bytes, SEQUENCE_OFFSET)),
        domain: DomainId(array(bytes, DOMAIN_OFFSET)),
    };
    Ok((kind, voucher))
}

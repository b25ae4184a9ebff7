//! # voucherpay-authorize
//!
//! **Authorization Plane**: everything needed to decide whether a voucher was
//! really issued by the trusted authorizer, without touching any balance.
//!
//! ## Architecture
//!
//! 1. **codec**: fixed-layout, injective encoding of (kind, recipient, amount, sequence, domain)
//! 2. **digest**: SHA-256 over the encoded bytes, the value that is signed
//! 3. **verifier**: ed25519 `verify_strict` of the digest under the expected authorizer key
//! 4. **signer**: authorizer-side voucher signing (tooling and tests)
//!
//! ## Verification Flow
//!
//! ```text
//! (recipient, amount, sequence) + this domain
//!     → codec::encode_claim() → digest::digest() → verifier::verify()
//! ```
//!
//! The encoding is the only externally visible byte layout: any independent
//! verifier computing the same digest must reproduce it bit for bit.

pub mod codec;
pub mod digest;
pub mod signer;
pub mod verifier;

pub use codec::{decode, encode, encode_claim, encode_voucher};
pub use digest::{digest, voucher_digest};
pub use signer::VoucherSigner;
pub use verifier::{check, is_valid_authorizer, verify};

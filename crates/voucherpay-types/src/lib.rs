//! # voucherpay-types
//!
//! Shared types, errors, and configuration for **VoucherPay**, an escrow-backed
//! payment voucher engine.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identities**: [`AuthorizerId`], [`AccountId`], [`DomainId`], [`ReceiptId`]
//! - **Voucher model**: [`Voucher`], [`MessageKind`], [`VoucherSignature`], [`MessageDigest`]
//! - **Receipt model**: [`ClaimReceipt`]
//! - **Configuration**: [`SettlementConfig`]
//! - **Errors**: [`VoucherpayError`] with `VP_ERR_` prefix codes, [`ClaimStage`]
//! - **Constants**: message layout and defaults

pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod receipt;
pub mod voucher;

// Re-export all primary types at crate root for ergonomic imports:
//   use voucherpay_types::{Voucher, AccountId, VoucherpayError, ...};

pub use config::*;
pub use error::*;
pub use ids::*;
pub use receipt::*;
pub use voucher::*;

// Constants are accessed via `voucherpay_types::constants::FOO`
// (not re-exported to avoid name collisions).

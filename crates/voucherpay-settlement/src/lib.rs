//! # voucherpay-settlement
//!
//! **Settlement Plane**: replay protection, escrow accounting, and atomic
//! settlement of authorized vouchers.
//!
//! ## Architecture
//!
//! The [`ClaimSettlementEngine`] receives `(recipient, amount, sequence, signature)` and:
//! 1. Rebuilds and verifies the signed message (via `voucherpay-authorize`)
//! 2. Checks the sequence against the [`ReplayGuard`]
//! 3. Debits the [`EscrowLedger`] and consumes the sequence in one critical section
//! 4. Pays the recipient through a [`TransferSink`]
//! 5. Records failed payouts in [`UnpaidClaims`] for retry
//!
//! [`SupplyConservation`] tracks deposits and debits so the escrow balance can
//! be audited at any time.

pub mod engine;
pub mod escrow;
pub mod replay_guard;
pub mod supply_conservation;
pub mod transfer;
pub mod unpaid;

pub use engine::ClaimSettlementEngine;
pub use escrow::EscrowLedger;
pub use replay_guard::ReplayGuard;
pub use supply_conservation::SupplyConservation;
pub use transfer::{InMemoryPayouts, TransferSink};
pub use unpaid::{UnpaidClaim, UnpaidClaims};

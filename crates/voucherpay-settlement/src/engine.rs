//! Claim settlement engine.
//!
//! Settles one voucher at a time, failing closed at the first unmet check:
//! 1. Encode (kind, recipient, amount, sequence, this domain)
//! 2. Digest the encoded bytes
//! 3. Verify the signature against the configured authorizer
//! 4. Check the sequence is fresh
//! 5. Debit the escrow
//! 6. Mark the sequence consumed
//! 7. Pay the recipient through the [`TransferSink`]
//!
//! Steps 4–6 run inside one bounded critical section. Steps 1–3 run before
//! it, so verification of unrelated claims proceeds in parallel, and step 7
//! runs after it, so a slow ledger never holds the lock.
//!
//! If step 7 fails the debit stands and the sequence stays consumed: the
//! claim is recorded in the [`UnpaidClaims`] register and
//! `VP_ERR_400 TransferFailure` is returned. [`ClaimSettlementEngine::retry_unpaid`]
//! is the retry path.

use chrono::Utc;
use parking_lot::{Mutex, MutexGuard};
use voucherpay_authorize::{codec, digest, verifier};
use voucherpay_types::{
    AccountId, AuthorizerId, ClaimReceipt, DomainId, MessageDigest, MessageKind, ReceiptId,
    Result, SettlementConfig, Voucher, VoucherSignature, VoucherpayError,
};

use crate::{
    escrow::EscrowLedger,
    replay_guard::ReplayGuard,
    supply_conservation::SupplyConservation,
    transfer::TransferSink,
    unpaid::{UnpaidClaim, UnpaidClaims},
};

/// State that must change together under the settlement lock.
#[derive(Debug, Default)]
struct SettlementState {
    replay: ReplayGuard,
    supply: SupplyConservation,
}

/// Output of the critical section, carried into the payout step.
struct Debited {
    digest: MessageDigest,
    balance_after: u64,
}

/// One settlement instance: a single escrow, a single trusted authorizer, a
/// single domain.
pub struct ClaimSettlementEngine<T: TransferSink> {
    config: SettlementConfig,
    escrow: EscrowLedger,
    state: Mutex<SettlementState>,
    unpaid: Mutex<UnpaidClaims>,
    sink: T,
}

impl<T: TransferSink> ClaimSettlementEngine<T> {
    /// Create an instance with an empty escrow.
    ///
    /// # Errors
    /// Returns `Configuration` if the config is invalid or the authorizer
    /// key could never verify a signature.
    pub fn new(config: SettlementConfig, sink: T) -> Result<Self> {
        config.validate()?;
        if !verifier::is_valid_authorizer(&config.authorizer) {
            return Err(VoucherpayError::Configuration(format!(
                "authorizer {} is not a usable ed25519 public key",
                config.authorizer
            )));
        }
        tracing::info!(
            authorizer = %config.authorizer,
            domain = %config.domain,
            lock_timeout_ms = config.lock_timeout_ms,
            "Settlement instance created"
        );
        Ok(Self {
            config,
            escrow: EscrowLedger::new(),
            state: Mutex::new(SettlementState::default()),
            unpaid: Mutex::new(UnpaidClaims::new()),
            sink,
        })
    }

    // ── Inbound ───────────────────────────────────────────────────────

    /// Fund the escrow. Returns the new balance.
    ///
    /// # Errors
    /// `InvalidAmount`, `BalanceOverflow`, or `Contended`.
    pub fn deposit(&self, amount: u64) -> Result<u64> {
        let mut state = self.lock_state()?;
        let balance = self.escrow.deposit(amount)?;
        state.supply.record_deposit(amount);
        tracing::debug!(amount, balance, "Escrow deposit");
        Ok(balance)
    }

    /// Redeem a voucher issued for this instance.
    ///
    /// # Errors
    /// `InvalidSignature`, `ReplayedSequence`, `Contended`, `InvalidAmount`,
    /// `InsufficientFunds` (no state change), or `TransferFailure` (debited,
    /// recorded as unpaid).
    pub fn claim(
        &self,
        recipient: AccountId,
        amount: u64,
        sequence: u64,
        signature: &VoucherSignature,
    ) -> Result<ClaimReceipt> {
        self.settle(MessageKind::Claim, recipient, amount, sequence, signature)
    }

    /// Redeem a voucher given as a whole.
    ///
    /// A voucher naming another domain cannot carry a signature valid here,
    /// so it is rejected as `InvalidSignature` without running the verifier.
    ///
    /// # Errors
    /// Anything [`Self::claim`] returns.
    pub fn claim_voucher(
        &self,
        voucher: &Voucher,
        signature: &VoucherSignature,
    ) -> Result<ClaimReceipt> {
        if voucher.domain != self.config.domain {
            tracing::warn!(
                expected = %self.config.domain,
                actual = %voucher.domain,
                sequence = voucher.sequence,
                "Claim rejected at VERIFY: voucher for another domain"
            );
            return Err(VoucherpayError::InvalidSignature {
                reason: format!(
                    "voucher domain {} is not this instance's domain {}",
                    voucher.domain, self.config.domain
                ),
            });
        }
        self.claim(voucher.recipient, voucher.amount, voucher.sequence, signature)
    }

    /// Authorizer-signed return of escrow funds to `payout`. Shares the
    /// sequence space with claims.
    ///
    /// # Errors
    /// Same as [`Self::claim`].
    pub fn withdraw(
        &self,
        payout: AccountId,
        amount: u64,
        sequence: u64,
        signature: &VoucherSignature,
    ) -> Result<ClaimReceipt> {
        self.settle(MessageKind::Withdrawal, payout, amount, sequence, signature)
    }

    /// Retry the payout of a debited-but-unpaid claim.
    ///
    /// # Errors
    /// `UnknownUnpaidClaim` if nothing is recorded under `sequence`, or
    /// `TransferFailure` if the payout failed again (claim stays recorded).
    pub fn retry_unpaid(&self, sequence: u64) -> Result<ClaimReceipt> {
        let claim = self.unpaid.lock().take(sequence)?;

        if let Err(err) = self.sink.transfer(&claim.recipient, claim.amount) {
            let reason = err.to_string();
            tracing::error!(
                sequence,
                recipient = %claim.recipient,
                amount = claim.amount,
                attempts = claim.attempts + 1,
                error = %reason,
                "Unpaid claim retry failed"
            );
            self.unpaid.lock().requeue(claim, reason.clone());
            return Err(VoucherpayError::TransferFailure { sequence, reason });
        }

        tracing::info!(
            sequence,
            recipient = %claim.recipient,
            amount = claim.amount,
            attempts = claim.attempts + 1,
            "Unpaid claim settled on retry"
        );
        Ok(ClaimReceipt {
            id: ReceiptId::new(),
            kind: claim.kind,
            sequence,
            recipient: claim.recipient,
            amount: claim.amount,
            digest: claim.digest,
            balance_after: claim.balance_after,
            settled_at: Utc::now(),
        })
    }

    // ── Outbound / observability ──────────────────────────────────────

    /// Funds available for claims. Never takes the settlement lock.
    #[must_use]
    pub fn current_balance(&self) -> u64 {
        self.escrow.current_balance()
    }

    /// Whether `sequence` has been consumed on this instance.
    ///
    /// # Errors
    /// `Contended` if the settlement lock could not be acquired in time.
    pub fn is_consumed(&self, sequence: u64) -> Result<bool> {
        let state = self.lock_state()?;
        Ok(!state
            .replay
            .is_fresh(&self.config.authorizer, &self.config.domain, sequence))
    }

    /// Outstanding debited-but-unpaid claims, ordered by sequence.
    #[must_use]
    pub fn unpaid_claims(&self) -> Vec<UnpaidClaim> {
        self.unpaid.lock().list()
    }

    /// Check `deposits - debits == balance`.
    ///
    /// # Errors
    /// `ConservationViolation` or `Contended`.
    pub fn verify_conservation(&self) -> Result<()> {
        let state = self.lock_state()?;
        state.supply.verify(self.escrow.current_balance())
    }

    #[must_use]
    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    #[must_use]
    pub fn domain(&self) -> DomainId {
        self.config.domain
    }

    #[must_use]
    pub fn authorizer(&self) -> AuthorizerId {
        self.config.authorizer
    }

    #[must_use]
    pub fn transfer_sink(&self) -> &T {
        &self.sink
    }

    // ── Pipeline ──────────────────────────────────────────────────────

    fn lock_state(&self) -> Result<MutexGuard<'_, SettlementState>> {
        self.state
            .try_lock_for(self.config.lock_timeout())
            .ok_or_else(|| {
                tracing::warn!(
                    waited_ms = self.config.lock_timeout_ms,
                    "Settlement lock contended"
                );
                VoucherpayError::Contended {
                    waited_ms: self.config.lock_timeout_ms,
                }
            })
    }

    fn settle(
        &self,
        kind: MessageKind,
        recipient: AccountId,
        amount: u64,
        sequence: u64,
        signature: &VoucherSignature,
    ) -> Result<ClaimReceipt> {
        let debited = self.authorize_and_debit(kind, recipient, amount, sequence, signature)?;

        // 7. Payout, outside the lock.
        if let Err(err) = self.sink.transfer(&recipient, amount) {
            return Err(self.record_unpaid(kind, recipient, amount, sequence, &debited, &err));
        }

        tracing::debug!(
            %kind,
            sequence,
            recipient = %recipient,
            amount,
            balance = debited.balance_after,
            "Voucher settled"
        );
        Ok(ClaimReceipt {
            id: ReceiptId::new(),
            kind,
            sequence,
            recipient,
            amount,
            digest: debited.digest,
            balance_after: debited.balance_after,
            settled_at: Utc::now(),
        })
    }

    /// Steps 1–6. Any error here leaves escrow and replay state untouched.
    fn authorize_and_debit(
        &self,
        kind: MessageKind,
        recipient: AccountId,
        amount: u64,
        sequence: u64,
        signature: &VoucherSignature,
    ) -> Result<Debited> {
        let authorizer = &self.config.authorizer;
        let domain = &self.config.domain;

        // 1–2. Reconstruct exactly what the authorizer signed.
        let message = codec::encode(kind, &recipient, amount, sequence, domain);
        let digest = digest::digest(&message);

        // 3. Authorship.
        verifier::check(&digest, signature, authorizer).inspect_err(|err| {
            tracing::warn!(%kind, sequence, amount, error = %err, "Claim rejected at VERIFY");
        })?;

        let mut state = self.lock_state()?;

        // 4. Freshness.
        if !state.replay.is_fresh(authorizer, domain, sequence) {
            tracing::warn!(%kind, sequence, "Claim rejected at FRESHNESS: sequence replayed");
            return Err(VoucherpayError::ReplayedSequence { sequence });
        }

        // 5. Funds.
        let balance_after = self.escrow.try_debit(amount).inspect_err(|err| {
            tracing::warn!(%kind, sequence, amount, error = %err, "Claim rejected at DEBIT");
        })?;

        // 6. Consume. Unreachable failure: freshness was checked under this
        // same guard. The debit is put back so the escrow stays whole.
        if let Err(err) = state.replay.mark_consumed(authorizer, domain, sequence) {
            self.escrow.restore(amount);
            tracing::error!(%kind, sequence, error = %err, "Fresh sequence failed to mark consumed");
            return Err(VoucherpayError::Internal(format!(
                "sequence {sequence} passed freshness but could not be consumed: {err}"
            )));
        }
        state.supply.record_debit(kind, amount);

        Ok(Debited {
            digest,
            balance_after,
        })
    }

    fn record_unpaid(
        &self,
        kind: MessageKind,
        recipient: AccountId,
        amount: u64,
        sequence: u64,
        debited: &Debited,
        err: &VoucherpayError,
    ) -> VoucherpayError {
        let reason = err.to_string();
        tracing::error!(
            %kind,
            sequence,
            recipient = %recipient,
            amount,
            error = %reason,
            "Transfer failed after debit; recorded as unpaid"
        );
        let claim = UnpaidClaim {
            sequence,
            kind,
            recipient,
            amount,
            digest: debited.digest,
            balance_after: debited.balance_after,
            last_error: reason.clone(),
            attempts: 1,
            recorded_at: Utc::now(),
        };
        if let Err(record_err) = self.unpaid.lock().record(claim) {
            // The caller still learns the payout failed after the debit.
            tracing::error!(sequence, error = %record_err, "Unpaid claim could not be recorded");
        }
        VoucherpayError::TransferFailure { sequence, reason }
    }
}

impl<T: TransferSink> std::fmt::Debug for ClaimSettlementEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimSettlementEngine")
            .field("authorizer", &self.config.authorizer)
            .field("domain", &self.config.domain)
            .field("balance", &self.escrow.current_balance())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use voucherpay_authorize::VoucherSigner;
    use voucherpay_types::ClaimStage;

    use super::*;
    use crate::transfer::InMemoryPayouts;

    /// Sink whose availability can be toggled.
    #[derive(Default)]
    struct SwitchableSink {
        down: AtomicBool,
        book: InMemoryPayouts,
    }

    impl TransferSink for SwitchableSink {
        fn transfer(&self, recipient: &AccountId, amount: u64) -> Result<()> {
            if self.down.load(Ordering::SeqCst) {
                return Err(VoucherpayError::Internal("ledger offline".into()));
            }
            self.book.transfer(recipient, amount)
        }
    }

    fn setup<S: TransferSink>(sink: S) -> (VoucherSigner, ClaimSettlementEngine<S>) {
        let signer = VoucherSigner::from_secret([42u8; 32]);
        let cfg = SettlementConfig::new(signer.authorizer_id(), DomainId::derive("escrow-a"));
        let engine = ClaimSettlementEngine::new(cfg, sink).unwrap();
        (signer, engine)
    }

    fn voucher(engine: &ClaimSettlementEngine<impl TransferSink>, amount: u64, seq: u64) -> Voucher {
        Voucher::new(AccountId([0xaa; 32]), amount, seq, engine.domain())
    }

    #[test]
    fn claim_debits_and_pays() {
        let (signer, engine) = setup(InMemoryPayouts::new());
        engine.deposit(100).unwrap();
        let v = voucher(&engine, 40, 1);

        let receipt = engine
            .claim(v.recipient, v.amount, v.sequence, &signer.sign_claim(&v))
            .unwrap();

        assert_eq!(receipt.balance_after, 60);
        assert_eq!(receipt.kind, MessageKind::Claim);
        assert_eq!(engine.current_balance(), 60);
        assert_eq!(engine.transfer_sink().credited(&v.recipient), 40);
        assert!(engine.is_consumed(1).unwrap());
        engine.verify_conservation().unwrap();
    }

    #[test]
    fn receipt_digest_matches_independent_encoding() {
        let (signer, engine) = setup(InMemoryPayouts::new());
        engine.deposit(10).unwrap();
        let v = voucher(&engine, 10, 3);
        let receipt = engine.claim_voucher(&v, &signer.sign_claim(&v)).unwrap();
        assert_eq!(
            receipt.digest,
            digest::voucher_digest(MessageKind::Claim, &v)
        );
    }

    #[test]
    fn invalid_signature_changes_nothing() {
        let (signer, engine) = setup(InMemoryPayouts::new());
        engine.deposit(100).unwrap();
        let v = voucher(&engine, 40, 1);
        let sig = signer.sign_claim(&v);

        let err = engine.claim(v.recipient, 41, v.sequence, &sig).unwrap_err();
        assert_eq!(err.stage(), Some(ClaimStage::Verify));
        assert_eq!(engine.current_balance(), 100);
        assert!(!engine.is_consumed(1).unwrap());
    }

    #[test]
    fn insufficient_funds_does_not_consume_sequence() {
        let (signer, engine) = setup(InMemoryPayouts::new());
        engine.deposit(10).unwrap();
        let v = voucher(&engine, 40, 2);
        let sig = signer.sign_claim(&v);

        let err = engine.claim(v.recipient, v.amount, v.sequence, &sig).unwrap_err();
        assert!(matches!(err, VoucherpayError::InsufficientFunds { needed: 40, available: 10 }));
        assert!(err.is_retryable());
        assert!(!engine.is_consumed(2).unwrap());

        // Same voucher succeeds once the escrow is topped up.
        engine.deposit(30).unwrap();
        engine.claim(v.recipient, v.amount, v.sequence, &sig).unwrap();
        assert_eq!(engine.current_balance(), 0);
    }

    #[test]
    fn zero_amount_claim_rejected_at_debit() {
        let (signer, engine) = setup(InMemoryPayouts::new());
        engine.deposit(10).unwrap();
        let v = voucher(&engine, 0, 1);
        let err = engine.claim_voucher(&v, &signer.sign_claim(&v)).unwrap_err();
        assert!(matches!(err, VoucherpayError::InvalidAmount));
        assert!(!engine.is_consumed(1).unwrap());
    }

    #[test]
    fn foreign_domain_voucher_rejected() {
        let (signer, engine) = setup(InMemoryPayouts::new());
        engine.deposit(100).unwrap();
        let v = Voucher::new(AccountId([1; 32]), 10, 1, DomainId::derive("escrow-b"));
        let err = engine.claim_voucher(&v, &signer.sign_claim(&v)).unwrap_err();
        assert!(matches!(err, VoucherpayError::InvalidSignature { .. }));
        assert_eq!(err.stage(), Some(ClaimStage::Verify));
        assert!(!engine.is_consumed(1).unwrap());
    }

    #[test]
    fn retargeted_voucher_keeps_invalid_signature() {
        let (signer, engine) = setup(InMemoryPayouts::new());
        engine.deposit(100).unwrap();
        let v = voucher(&engine, 10, 1);
        let sig = signer.sign_claim(&v);

        let mut moved = v;
        moved.domain = DomainId::derive("escrow-b");
        let err = engine.claim_voucher(&moved, &sig).unwrap_err();
        assert!(matches!(err, VoucherpayError::InvalidSignature { .. }));
        assert_eq!(engine.current_balance(), 100);

        engine.claim_voucher(&v, &sig).unwrap();
    }

    #[test]
    fn transfer_failure_reported_even_if_register_refuses() {
        let (signer, engine) = setup(SwitchableSink::default());
        engine.deposit(100).unwrap();
        let v = voucher(&engine, 40, 7);

        let earlier = UnpaidClaim {
            sequence: 7,
            kind: MessageKind::Claim,
            recipient: v.recipient,
            amount: 1,
            digest: MessageDigest([0; 32]),
            balance_after: 0,
            last_error: "earlier".into(),
            attempts: 1,
            recorded_at: Utc::now(),
        };
        engine.unpaid.lock().record(earlier).unwrap();

        engine.transfer_sink().down.store(true, Ordering::SeqCst);
        let err = engine.claim_voucher(&v, &signer.sign_claim(&v)).unwrap_err();
        assert!(matches!(err, VoucherpayError::TransferFailure { sequence: 7, .. }));
        assert!(err.state_mutated());
        assert_eq!(engine.current_balance(), 60);
        assert_eq!(engine.unpaid_claims()[0].last_error, "earlier");
    }

    #[test]
    fn transfer_failure_records_unpaid_and_retry_pays() {
        let (signer, engine) = setup(SwitchableSink::default());
        engine.deposit(100).unwrap();
        let v = voucher(&engine, 40, 7);
        let sig = signer.sign_claim(&v);

        engine.transfer_sink().down.store(true, Ordering::SeqCst);
        let err = engine.claim(v.recipient, v.amount, v.sequence, &sig).unwrap_err();
        assert!(matches!(err, VoucherpayError::TransferFailure { sequence: 7, .. }));
        assert!(err.state_mutated());
        assert_eq!(engine.current_balance(), 60);
        assert_eq!(engine.unpaid_claims().len(), 1);

        // Resubmission cannot pay twice.
        let err = engine.claim(v.recipient, v.amount, v.sequence, &sig).unwrap_err();
        assert!(matches!(err, VoucherpayError::ReplayedSequence { sequence: 7 }));

        // Retry while still down keeps it recorded.
        assert!(engine.retry_unpaid(7).is_err());
        assert_eq!(engine.unpaid_claims()[0].attempts, 2);

        engine.transfer_sink().down.store(false, Ordering::SeqCst);
        let receipt = engine.retry_unpaid(7).unwrap();
        assert_eq!(receipt.amount, 40);
        assert_eq!(receipt.balance_after, 60);
        assert!(engine.unpaid_claims().is_empty());
        assert_eq!(engine.transfer_sink().book.credited(&v.recipient), 40);

        let err = engine.retry_unpaid(7).unwrap_err();
        assert!(matches!(err, VoucherpayError::UnknownUnpaidClaim(7)));
        engine.verify_conservation().unwrap();
    }

    #[test]
    fn withdrawal_uses_its_own_signature_kind() {
        let (signer, engine) = setup(InMemoryPayouts::new());
        engine.deposit(100).unwrap();
        let payout = AccountId([0xbb; 32]);
        let v = Voucher::new(payout, 30, 9, engine.domain());

        // A claim signature is not a withdrawal authorization.
        let err = engine.withdraw(payout, 30, 9, &signer.sign_claim(&v)).unwrap_err();
        assert!(matches!(err, VoucherpayError::InvalidSignature { .. }));

        let receipt = engine.withdraw(payout, 30, 9, &signer.sign_withdrawal(&v)).unwrap();
        assert_eq!(receipt.kind, MessageKind::Withdrawal);
        assert_eq!(engine.current_balance(), 70);

        // Sequence 9 is now spent for claims too.
        let c = voucher(&engine, 1, 9);
        let err = engine.claim_voucher(&c, &signer.sign_claim(&c)).unwrap_err();
        assert!(matches!(err, VoucherpayError::ReplayedSequence { sequence: 9 }));
        engine.verify_conservation().unwrap();
    }

    #[test]
    fn contended_lock_times_out() {
        let (signer, engine) = setup(InMemoryPayouts::new());
        engine.deposit(100).unwrap();
        let v = voucher(&engine, 10, 1);
        let sig = signer.sign_claim(&v);

        let held = engine.state.lock();
        let err = engine.claim(v.recipient, v.amount, v.sequence, &sig).unwrap_err();
        drop(held);

        assert!(matches!(err, VoucherpayError::Contended { waited_ms: 50 }));
        assert!(err.is_retryable());
        assert_eq!(engine.current_balance(), 100);
        engine.claim(v.recipient, v.amount, v.sequence, &sig).unwrap();
    }

    #[test]
    fn weak_authorizer_rejected_at_construction() {
        let mut identity = [0u8; 32];
        identity[0] = 1;
        let cfg = SettlementConfig::new(AuthorizerId(identity), DomainId::derive("x"));
        let err = ClaimSettlementEngine::new(cfg, InMemoryPayouts::new()).unwrap_err();
        assert!(matches!(err, VoucherpayError::Configuration(_)));
    }
}

//! The ledger facade: every protocol operation, serialized against shared state.
//!
//! Each public method is one atomic unit. All preconditions are validated before the
//! first mutation, so a failure aborts with no partial write; in particular the
//! rate-limit timestamp is peeked early (error precedence follows the access ->
//! cooldown -> lifecycle order) but recorded only once the operation is certain to
//! succeed.

use crate::access::{AccessControl, Principal};
use crate::batch::{AccumulatorStore, BatchManager, BatchPhase, Metric};
use crate::errors::LedgerError;
use crate::events::Event;
use crate::oracle::{DecryptionOracleClient, ProofVerifier};
use crate::ratelimit::{RateAction, RateLimiter};
use chrono::{DateTime, Utc};
use enc_core::oracle::{state_digest, CleartextSummary};
use enc_core::value::EncryptedValue;
use tracing::info;

/// Correlation data handed back by a summary request.
#[derive(Debug)]
pub struct SummaryRequest {
    pub request_id: u64,
    pub batch_id: u64,
    pub state_hash_hex: String,
}

/// The accepted result of one oracle callback.
#[derive(Debug)]
pub struct DecryptedSummary {
    pub request_id: u64,
    pub batch_id: u64,
    pub contributions_total: u64,
    pub usage_total: u64,
}

/// Read-only snapshot of one batch's phase and ciphertexts.
#[derive(Debug)]
pub struct BatchView {
    pub batch_id: u64,
    pub phase: BatchPhase,
    pub contributions: EncryptedValue,
    pub usage: EncryptedValue,
}

#[derive(Debug)]
pub struct PendingRequestView {
    pub request_id: u64,
    pub batch_id: u64,
    pub state_hash_hex: String,
}

pub struct Ledger {
    identity: [u8; 32],
    access: AccessControl,
    limiter: RateLimiter,
    batches: BatchManager,
    accumulators: AccumulatorStore,
    oracle: DecryptionOracleClient,
    verifier: Box<dyn ProofVerifier>,
}

impl Ledger {
    pub fn new(
        owner: Principal,
        cooldown_seconds: u64,
        identity: [u8; 32],
        verifier: Box<dyn ProofVerifier>,
    ) -> Self {
        Self {
            identity,
            access: AccessControl::new(owner),
            limiter: RateLimiter::new(cooldown_seconds),
            batches: BatchManager::new(),
            accumulators: AccumulatorStore::new(),
            oracle: DecryptionOracleClient::new(),
            verifier,
        }
    }

    // --- Role administration (never gated by pause) ---

    pub fn transfer_ownership(&mut self, caller: &Principal, new_owner: Principal) -> Result<Event, LedgerError> {
        let previous = self.access.transfer_ownership(caller, new_owner.clone())?;
        info!(%previous, %new_owner, "ownership transferred");
        Ok(Event::OwnershipTransferred { previous, new_owner })
    }

    /// Idempotent: `Ok(None)` (no event) when the provider is already registered.
    pub fn add_provider(&mut self, caller: &Principal, provider: Principal) -> Result<Option<Event>, LedgerError> {
        if !self.access.add_provider(caller, provider.clone())? {
            return Ok(None);
        }
        info!(%provider, "provider added");
        Ok(Some(Event::ProviderAdded { provider }))
    }

    pub fn remove_provider(&mut self, caller: &Principal, provider: &Principal) -> Result<Option<Event>, LedgerError> {
        if !self.access.remove_provider(caller, provider)? {
            return Ok(None);
        }
        info!(%provider, "provider removed");
        Ok(Some(Event::ProviderRemoved { provider: provider.clone() }))
    }

    pub fn pause(&mut self, caller: &Principal) -> Result<Event, LedgerError> {
        self.access.pause(caller)?;
        info!(by = %caller, "ledger paused");
        Ok(Event::LedgerPaused { by: caller.clone() })
    }

    pub fn unpause(&mut self, caller: &Principal) -> Result<Event, LedgerError> {
        self.access.unpause(caller)?;
        info!(by = %caller, "ledger unpaused");
        Ok(Event::LedgerUnpaused { by: caller.clone() })
    }

    pub fn set_cooldown_seconds(&mut self, caller: &Principal, cooldown_seconds: u64) -> Result<Event, LedgerError> {
        self.access.require_owner(caller)?;
        self.limiter.set_cooldown_seconds(cooldown_seconds);
        info!(cooldown_seconds, "cooldown updated");
        Ok(Event::CooldownUpdated { cooldown_seconds })
    }

    // --- Batch lifecycle ---

    pub fn open_batch(&mut self, caller: &Principal) -> Result<(u64, Event), LedgerError> {
        self.access.require_owner(caller)?;
        self.access.require_unpaused()?;

        let batch_id = self.batches.open_batch();
        self.accumulators.init_zero(batch_id);

        info!(batch_id, "batch opened");
        Ok((batch_id, Event::BatchOpened { batch_id, by: caller.clone() }))
    }

    pub fn close_batch(&mut self, caller: &Principal, batch_id: u64) -> Result<Event, LedgerError> {
        self.access.require_owner(caller)?;
        self.access.require_unpaused()?;
        self.batches.close_batch(batch_id)?;

        info!(batch_id, "batch closed");
        Ok(Event::BatchClosed { batch_id, by: caller.clone() })
    }

    // --- Submissions ---

    pub fn submit_contribution(
        &mut self,
        caller: &Principal,
        batch_id: u64,
        delta: &EncryptedValue,
        now: DateTime<Utc>,
    ) -> Result<Event, LedgerError> {
        self.access.require_unpaused()?;
        self.limiter.check(caller, RateAction::Submission, now)?;
        if !self.batches.is_open(batch_id) {
            return Err(LedgerError::BatchNotOpen(batch_id));
        }

        self.accumulators.merge(batch_id, Metric::Contributions, delta);
        self.limiter.record(caller, RateAction::Submission, now);

        info!(batch_id, principal = %caller, "contribution accepted");
        Ok(Event::ContributionSubmitted { batch_id, principal: caller.clone() })
    }

    pub fn report_usage(
        &mut self,
        caller: &Principal,
        batch_id: u64,
        delta: &EncryptedValue,
        now: DateTime<Utc>,
    ) -> Result<Event, LedgerError> {
        self.access.require_unpaused()?;
        self.access.require_provider(caller)?;
        // Usage reports share the submission timestamp with contributions.
        self.limiter.check(caller, RateAction::Submission, now)?;
        if !self.batches.is_open(batch_id) {
            return Err(LedgerError::BatchNotOpen(batch_id));
        }

        self.accumulators.merge(batch_id, Metric::Usage, delta);
        self.limiter.record(caller, RateAction::Submission, now);

        info!(batch_id, provider = %caller, "usage report accepted");
        Ok(Event::UsageReported { batch_id, provider: caller.clone() })
    }

    // --- Decryption round trip ---

    pub fn request_summary(
        &mut self,
        caller: &Principal,
        batch_id: u64,
        now: DateTime<Utc>,
    ) -> Result<(SummaryRequest, Event), LedgerError> {
        self.access.require_unpaused()?;
        self.limiter.check(caller, RateAction::DecryptionRequest, now)?;

        // A summary covers immutable state only: the batch must be closed.
        match self.batches.phase(batch_id) {
            Some(BatchPhase::Open) => return Err(LedgerError::BatchStillOpen(batch_id)),
            Some(BatchPhase::Closed) => {}
            None => return Err(LedgerError::InvalidBatchId(batch_id)),
        }

        let handles = self.accumulators.handles(batch_id)?;
        let state_hash = state_digest(&handles, &self.identity);

        let request_id = self.oracle.register(batch_id, state_hash.clone());
        self.limiter.record(caller, RateAction::DecryptionRequest, now);

        info!(batch_id, request_id, requester = %caller, "summary decryption requested");
        let event = Event::SummaryRequested {
            batch_id,
            request_id,
            requester: caller.clone(),
            state_hash_hex: state_hash.hex.clone(),
        };
        Ok((
            SummaryRequest {
                request_id,
                batch_id,
                state_hash_hex: state_hash.hex,
            },
            event,
        ))
    }

    /// Oracle callback entry point. Caller authentication happens at the transport
    /// layer; everything here defends against replayed, stale, or forged deliveries.
    pub fn on_callback(
        &mut self,
        request_id: u64,
        cleartexts: &[u8],
        proof: &[u8],
    ) -> Result<(DecryptedSummary, Event), LedgerError> {
        let (batch_id, expected_hash) = {
            let ctx = self.oracle.pending_context(request_id)?;
            (ctx.batch_id, ctx.state_hash.clone())
        };

        // Recompute the digest from *current* accumulator state: a stale request must
        // never be satisfied against newer ciphertexts.
        let handles = self.accumulators.handles(batch_id)?;
        if state_digest(&handles, &self.identity) != expected_hash {
            return Err(LedgerError::StateMismatch(request_id));
        }

        self.verifier.verify(request_id, cleartexts, proof)?;

        let summary = CleartextSummary::decode(cleartexts).map_err(|e| LedgerError::InvalidProof {
            request_id,
            reason: e.to_string(),
        })?;

        self.oracle.mark_processed(request_id);

        info!(
            request_id,
            batch_id,
            contributions_total = summary.contributions_total,
            usage_total = summary.usage_total,
            "batch summary decrypted"
        );
        let event = Event::SummaryDecrypted {
            request_id,
            batch_id,
            contributions_total: summary.contributions_total,
            usage_total: summary.usage_total,
        };
        Ok((
            DecryptedSummary {
                request_id,
                batch_id,
                contributions_total: summary.contributions_total,
                usage_total: summary.usage_total,
            },
            event,
        ))
    }

    // --- Read-only views ---

    pub fn batch_view(&self, batch_id: u64) -> Result<BatchView, LedgerError> {
        let phase = self
            .batches
            .phase(batch_id)
            .ok_or(LedgerError::InvalidBatchId(batch_id))?;
        let (contributions, usage) = self.accumulators.ciphertexts(batch_id)?;
        Ok(BatchView {
            batch_id,
            phase,
            contributions: *contributions,
            usage: *usage,
        })
    }

    pub fn pending_requests(&self) -> Vec<PendingRequestView> {
        self.oracle
            .pending()
            .map(|(request_id, ctx)| PendingRequestView {
                request_id,
                batch_id: ctx.batch_id,
                state_hash_hex: ctx.state_hash.hex.clone(),
            })
            .collect()
    }

    pub fn owner(&self) -> &Principal {
        self.access.owner()
    }

    pub fn paused(&self) -> bool {
        self.access.paused()
    }

    pub fn cooldown_seconds(&self) -> u64 {
        self.limiter.cooldown_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::KeyedVerifier;
    use chrono::TimeZone;
    use enc_core::oracle::DecryptionOracle;
    use enc_core::value::Keypair;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    const AUTH_KEY: &[u8] = b"test-oracle-key";

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn owner() -> Principal {
        Principal::new("owner")
    }

    struct Harness {
        ledger: Ledger,
        oracle: DecryptionOracle,
        keys: enc_core::value::PublicKey,
        rng: ChaCha20Rng,
    }

    fn harness(cooldown_seconds: u64) -> Harness {
        let mut rng = ChaCha20Rng::from_seed([9u8; 32]);
        let keypair = Keypair::generate(&mut rng);

        let ledger = Ledger::new(
            owner(),
            cooldown_seconds,
            [3u8; 32],
            Box::new(KeyedVerifier::new(AUTH_KEY.to_vec())),
        );
        let oracle = DecryptionOracle::new(keypair.sk, AUTH_KEY.to_vec());

        Harness {
            ledger,
            oracle,
            keys: keypair.pk,
            rng,
        }
    }

    impl Harness {
        fn encrypt(&mut self, amount: u64) -> EncryptedValue {
            EncryptedValue::encrypt(&self.keys, amount, &mut self.rng).unwrap()
        }

        fn deliver(&mut self, request_id: u64, batch_id: u64) -> (Vec<u8>, Vec<u8>) {
            let view = self.ledger.batch_view(batch_id).unwrap();
            self.oracle
                .deliver(request_id, &view.contributions, &view.usage)
                .unwrap()
        }
    }

    #[test]
    fn end_to_end_decryption_round_trip() {
        let mut h = harness(60);

        // Counter starts at 1, first open pre-increments.
        let (batch_id, _) = h.ledger.open_batch(&owner()).unwrap();
        assert_eq!(batch_id, 2);

        let delta = h.encrypt(100);
        h.ledger
            .submit_contribution(&Principal::new("alice"), batch_id, &delta, at(0))
            .unwrap();

        h.ledger.close_batch(&owner(), batch_id).unwrap();

        let (req, _) = h
            .ledger
            .request_summary(&Principal::new("alice"), batch_id, at(0))
            .unwrap();
        assert_eq!(req.request_id, 1);

        let (cleartexts, proof) = h.deliver(req.request_id, batch_id);
        let (summary, _) = h.ledger.on_callback(req.request_id, &cleartexts, &proof).unwrap();
        assert_eq!(summary.contributions_total, 100);
        assert_eq!(summary.usage_total, 0);

        // A duplicated delivery must be rejected, whatever the payload.
        let err = h.ledger.on_callback(req.request_id, &cleartexts, &proof).unwrap_err();
        assert!(matches!(err, LedgerError::ReplayDetected(1)));
    }

    #[test]
    fn closed_batches_reject_merges_and_stay_immutable() {
        let mut h = harness(0);
        let (batch_id, _) = h.ledger.open_batch(&owner()).unwrap();
        h.ledger.close_batch(&owner(), batch_id).unwrap();

        let before = h.ledger.batch_view(batch_id).unwrap().contributions.handle();

        let delta = h.encrypt(5);
        let err = h
            .ledger
            .submit_contribution(&Principal::new("alice"), batch_id, &delta, at(0))
            .unwrap_err();
        assert!(matches!(err, LedgerError::BatchNotOpen(_)));

        // Accumulator unchanged after the rejected merge.
        let after = h.ledger.batch_view(batch_id).unwrap().contributions.handle();
        assert_eq!(before, after);
    }

    #[test]
    fn submissions_to_unknown_batches_fail() {
        let mut h = harness(0);
        let delta = h.encrypt(5);
        let err = h
            .ledger
            .submit_contribution(&Principal::new("alice"), 99, &delta, at(0))
            .unwrap_err();
        assert!(matches!(err, LedgerError::BatchNotOpen(99)));
    }

    #[test]
    fn cooldown_scenario() {
        let mut h = harness(60);
        let (batch_id, _) = h.ledger.open_batch(&owner()).unwrap();
        let p = Principal::new("alice");

        let d0 = h.encrypt(1);
        h.ledger.submit_contribution(&p, batch_id, &d0, at(0)).unwrap();

        let d1 = h.encrypt(2);
        let err = h.ledger.submit_contribution(&p, batch_id, &d1, at(30)).unwrap_err();
        assert!(matches!(err, LedgerError::CooldownActive { .. }));

        h.ledger.submit_contribution(&p, batch_id, &d1, at(61)).unwrap();
    }

    #[test]
    fn failed_submissions_do_not_consume_the_cooldown() {
        let mut h = harness(60);
        let (open_id, _) = h.ledger.open_batch(&owner()).unwrap();
        let p = Principal::new("alice");

        // Rejected by the batch gate, after the cooldown peek.
        let delta = h.encrypt(1);
        assert!(h.ledger.submit_contribution(&p, 99, &delta, at(0)).is_err());

        // The failure recorded nothing, so an immediate valid submission passes.
        h.ledger.submit_contribution(&p, open_id, &delta, at(1)).unwrap();
    }

    #[test]
    fn usage_reports_require_the_provider_role_and_share_the_submission_window() {
        let mut h = harness(60);
        let (batch_id, _) = h.ledger.open_batch(&owner()).unwrap();
        let p = Principal::new("clinic-1");

        let delta = h.encrypt(10);
        let err = h.ledger.report_usage(&p, batch_id, &delta, at(0)).unwrap_err();
        assert!(matches!(err, LedgerError::NotProvider));

        h.ledger.add_provider(&owner(), p.clone()).unwrap();
        h.ledger.report_usage(&p, batch_id, &delta, at(0)).unwrap();

        // A contribution from the same principal hits the shared submission window.
        let err = h
            .ledger
            .submit_contribution(&p, batch_id, &delta, at(30))
            .unwrap_err();
        assert!(matches!(err, LedgerError::CooldownActive { .. }));
    }

    #[test]
    fn pause_gates_batch_operations_but_not_administration() {
        let mut h = harness(0);
        let (batch_id, _) = h.ledger.open_batch(&owner()).unwrap();

        h.ledger.pause(&owner()).unwrap();

        let delta = h.encrypt(1);
        assert!(matches!(
            h.ledger.submit_contribution(&Principal::new("alice"), batch_id, &delta, at(0)),
            Err(LedgerError::Paused)
        ));
        assert!(matches!(h.ledger.open_batch(&owner()), Err(LedgerError::Paused)));
        assert!(matches!(
            h.ledger.close_batch(&owner(), batch_id),
            Err(LedgerError::Paused)
        ));

        // Role administration still works while paused.
        h.ledger.add_provider(&owner(), Principal::new("p")).unwrap();
        h.ledger.set_cooldown_seconds(&owner(), 5).unwrap();

        // Ids keep increasing across pause cycles.
        h.ledger.unpause(&owner()).unwrap();
        let (next_id, _) = h.ledger.open_batch(&owner()).unwrap();
        assert_eq!(next_id, batch_id + 1);
    }

    #[test]
    fn summary_requests_require_a_closed_batch() {
        let mut h = harness(0);
        let (batch_id, _) = h.ledger.open_batch(&owner()).unwrap();

        let err = h
            .ledger
            .request_summary(&Principal::new("alice"), batch_id, at(0))
            .unwrap_err();
        assert!(matches!(err, LedgerError::BatchStillOpen(_)));

        let err = h
            .ledger
            .request_summary(&Principal::new("alice"), 99, at(0))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidBatchId(99)));
    }

    #[test]
    fn callbacks_reject_state_drift() {
        let mut h = harness(0);
        let (batch_id, _) = h.ledger.open_batch(&owner()).unwrap();

        let delta = h.encrypt(100);
        h.ledger
            .submit_contribution(&Principal::new("alice"), batch_id, &delta, at(0))
            .unwrap();
        h.ledger.close_batch(&owner(), batch_id).unwrap();

        let (req, _) = h
            .ledger
            .request_summary(&Principal::new("alice"), batch_id, at(0))
            .unwrap();
        let (cleartexts, proof) = h.deliver(req.request_id, batch_id);

        // Simulate a rogue mutation between request and callback. No public path can
        // do this once the batch is closed; reach into the store directly.
        let rogue = h.encrypt(1);
        h.ledger.accumulators.merge(batch_id, Metric::Contributions, &rogue);

        let err = h.ledger.on_callback(req.request_id, &cleartexts, &proof).unwrap_err();
        assert!(matches!(err, LedgerError::StateMismatch(_)));

        // The request was not consumed: it stays visible as pending.
        assert_eq!(h.ledger.pending_requests().len(), 1);
    }

    #[test]
    fn callbacks_reject_forged_proofs_but_allow_a_correct_redelivery() {
        let mut h = harness(0);
        let (batch_id, _) = h.ledger.open_batch(&owner()).unwrap();
        h.ledger.close_batch(&owner(), batch_id).unwrap();

        let (req, _) = h
            .ledger
            .request_summary(&Principal::new("alice"), batch_id, at(0))
            .unwrap();
        let (cleartexts, proof) = h.deliver(req.request_id, batch_id);

        let mut bad_proof = proof.clone();
        bad_proof[0] ^= 1;
        let err = h
            .ledger
            .on_callback(req.request_id, &cleartexts, &bad_proof)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidProof { .. }));

        // The rejected delivery did not consume the request.
        h.ledger.on_callback(req.request_id, &cleartexts, &proof).unwrap();
    }

    #[test]
    fn callback_cleartexts_must_be_fixed_width() {
        let mut h = harness(0);
        let (batch_id, _) = h.ledger.open_batch(&owner()).unwrap();
        h.ledger.close_batch(&owner(), batch_id).unwrap();

        let (req, _) = h
            .ledger
            .request_summary(&Principal::new("alice"), batch_id, at(0))
            .unwrap();

        // A proof over a short buffer verifies as bytes but fails decoding.
        let short = vec![0u8; 8];
        let proof = enc_core::oracle::prove_decryption(AUTH_KEY, req.request_id, &short).unwrap();
        let err = h.ledger.on_callback(req.request_id, &short, &proof).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidProof { .. }));
    }

    #[test]
    fn decryption_requests_have_their_own_cooldown_window() {
        let mut h = harness(60);
        let (b1, _) = h.ledger.open_batch(&owner()).unwrap();
        let (b2, _) = h.ledger.open_batch(&owner()).unwrap();
        h.ledger.close_batch(&owner(), b1).unwrap();
        h.ledger.close_batch(&owner(), b2).unwrap();
        let p = Principal::new("alice");

        h.ledger.request_summary(&p, b1, at(0)).unwrap();

        let err = h.ledger.request_summary(&p, b2, at(30)).unwrap_err();
        assert!(matches!(err, LedgerError::CooldownActive { .. }));

        h.ledger.request_summary(&p, b2, at(61)).unwrap();
    }
}

//! Decryption request correlation: pending contexts, the replay guard, and the seam
//! to the external proof verifier.

use crate::errors::LedgerError;
use enc_core::types::FrHex;
use std::collections::BTreeMap;

/// Correlation record for one decryption request.
///
/// Never deleted; `processed` flips false -> true exactly once, at successful
/// callback time. A request the oracle never answers stays pending forever.
#[derive(Clone, Debug)]
pub struct DecryptionContext {
    pub batch_id: u64,
    pub state_hash: FrHex,
    pub processed: bool,
}

pub struct DecryptionOracleClient {
    next_request_id: u64,
    contexts: BTreeMap<u64, DecryptionContext>,
}

impl DecryptionOracleClient {
    pub fn new() -> Self {
        Self {
            next_request_id: 0,
            contexts: BTreeMap::new(),
        }
    }

    /// Register a pending request and return its correlation id (monotonic from 1).
    pub fn register(&mut self, batch_id: u64, state_hash: FrHex) -> u64 {
        self.next_request_id += 1;
        let request_id = self.next_request_id;
        self.contexts.insert(
            request_id,
            DecryptionContext {
                batch_id,
                state_hash,
                processed: false,
            },
        );
        request_id
    }

    /// Replay guard: the context must exist and must not already be processed.
    /// An unknown id and a replayed id are deliberately indistinguishable.
    pub fn pending_context(&self, request_id: u64) -> Result<&DecryptionContext, LedgerError> {
        match self.contexts.get(&request_id) {
            Some(ctx) if !ctx.processed => Ok(ctx),
            _ => Err(LedgerError::ReplayDetected(request_id)),
        }
    }

    /// Terminal transition. Call only after the callback fully validated.
    pub fn mark_processed(&mut self, request_id: u64) {
        if let Some(ctx) = self.contexts.get_mut(&request_id) {
            ctx.processed = true;
        }
    }

    /// Unprocessed requests, oldest first, for oracle pickup.
    pub fn pending(&self) -> impl Iterator<Item = (u64, &DecryptionContext)> {
        self.contexts
            .iter()
            .filter(|(_, ctx)| !ctx.processed)
            .map(|(id, ctx)| (*id, ctx))
    }
}

/// Boundary to the external proof verifier (trust anchor).
pub trait ProofVerifier: Send + Sync {
    fn verify(&self, request_id: u64, cleartexts: &[u8], proof: &[u8]) -> Result<(), LedgerError>;
}

/// Production verifier: the keyed transcript authenticator shared with the oracle.
pub struct KeyedVerifier {
    auth_key: Vec<u8>,
}

impl KeyedVerifier {
    pub fn new(auth_key: Vec<u8>) -> Self {
        Self { auth_key }
    }
}

impl ProofVerifier for KeyedVerifier {
    fn verify(&self, request_id: u64, cleartexts: &[u8], proof: &[u8]) -> Result<(), LedgerError> {
        // Surface the verifier's own failure text unchanged.
        enc_core::oracle::verify_decryption(&self.auth_key, request_id, cleartexts, proof).map_err(|e| {
            LedgerError::InvalidProof {
                request_id,
                reason: e.to_string(),
            }
        })
    }
}

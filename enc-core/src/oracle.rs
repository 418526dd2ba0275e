//! Oracle-side decryption and the callback proof transcript.
//!
//! The ledger never decrypts. An off-ledger oracle holding the secret key recovers the
//! two batch totals, encodes them into a fixed-width cleartext buffer, and authenticates
//! the delivery with a keyed Poseidon transcript over `(request id, cleartexts)`. The
//! ledger verifies that transcript before accepting a callback.
//!
//! SECURITY NOTE (prototype): the authenticator is a symmetric key shared between the
//! oracle and the ledger. A production deployment would replace it with the oracle
//! network's own proof system behind the same `verify` seam.

use crate::constants::{poseidon_config, CLEARTEXT_WIDTH, DECRYPT_BOUND, PROOF_DOMAIN, STATE_DOMAIN};
use crate::types::{CiphertextHandle, FrHex};
use crate::value::{absorb_bytes, CryptoError, EncryptedValue, SecretKey};
use ark_bn254::{Fr, G1Projective};
use ark_crypto_primitives::sponge::poseidon::PoseidonSponge;
use ark_crypto_primitives::sponge::CryptographicSponge;
use ark_ec::{CurveGroup, PrimeGroup};
use ark_serialize::CanonicalSerialize;
use ark_std::Zero;
use std::collections::HashMap;

/// The two decrypted batch totals carried by a callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CleartextSummary {
    pub contributions_total: u64,
    pub usage_total: u64,
}

impl CleartextSummary {
    /// Fixed-width wire encoding: two big-endian u64 values.
    pub fn encode(&self) -> [u8; CLEARTEXT_WIDTH] {
        let mut buf = [0u8; CLEARTEXT_WIDTH];
        buf[..8].copy_from_slice(&self.contributions_total.to_be_bytes());
        buf[8..].copy_from_slice(&self.usage_total.to_be_bytes());
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != CLEARTEXT_WIDTH {
            return Err(CryptoError::MalformedCleartexts {
                expected: CLEARTEXT_WIDTH,
                got: bytes.len(),
            });
        }

        let mut a = [0u8; 8];
        let mut b = [0u8; 8];
        a.copy_from_slice(&bytes[..8]);
        b.copy_from_slice(&bytes[8..]);

        Ok(Self {
            contributions_total: u64::from_be_bytes(a),
            usage_total: u64::from_be_bytes(b),
        })
    }
}

/// Digest binding a set of ciphertext handles to one ledger instance.
///
/// Recomputed from current state at callback time; any drift in the underlying
/// ciphertexts since the request was issued shows up as a digest mismatch.
pub fn state_digest(handles: &[CiphertextHandle], identity: &[u8]) -> FrHex {
    let cfg = poseidon_config();
    let mut sponge = PoseidonSponge::<Fr>::new(&cfg);

    sponge.absorb(&Fr::from(STATE_DOMAIN));
    for h in handles {
        sponge.absorb(&h.as_fr());
    }
    absorb_bytes(&mut sponge, identity);

    FrHex::from_fr(&sponge.squeeze_field_elements(1)[0])
}

/// Authenticate a delivery: keyed Poseidon transcript over the request id and the raw
/// cleartext buffer.
pub fn prove_decryption(auth_key: &[u8], request_id: u64, cleartexts: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let tag = proof_tag(auth_key, request_id, cleartexts);
    let mut out = Vec::new();
    tag.serialize_compressed(&mut out)
        .map_err(|e| CryptoError::Serialization(format!("{e}")))?;
    Ok(out)
}

/// Check a delivery proof. The cleartext buffer is verified as raw bytes, before any
/// decoding, so a malformed buffer with a valid proof is impossible.
pub fn verify_decryption(
    auth_key: &[u8],
    request_id: u64,
    cleartexts: &[u8],
    proof: &[u8],
) -> Result<(), CryptoError> {
    let expected = prove_decryption(auth_key, request_id, cleartexts)?;
    if expected != proof {
        return Err(CryptoError::VerificationFailed);
    }
    Ok(())
}

fn proof_tag(auth_key: &[u8], request_id: u64, cleartexts: &[u8]) -> Fr {
    let cfg = poseidon_config();
    let mut sponge = PoseidonSponge::<Fr>::new(&cfg);

    sponge.absorb(&Fr::from(PROOF_DOMAIN));
    absorb_bytes(&mut sponge, auth_key);
    sponge.absorb(&Fr::from(request_id));
    absorb_bytes(&mut sponge, cleartexts);

    sponge.squeeze_field_elements(1)[0]
}

/// The decryption oracle: holds the ElGamal secret key and the callback auth key.
pub struct DecryptionOracle {
    sk: SecretKey,
    auth_key: Vec<u8>,
}

impl DecryptionOracle {
    pub fn new(sk: SecretKey, auth_key: Vec<u8>) -> Self {
        Self { sk, auth_key }
    }

    /// Recover the plaintext total from one accumulator ciphertext.
    pub fn decrypt_value(&self, ct: &EncryptedValue) -> Result<u64, CryptoError> {
        // m·G = c2 - sk·c1
        let target = ct.c2 - ct.c1 * self.sk.0;
        discrete_log(target)
    }

    /// Decrypt both accumulators for a request and produce `(cleartexts, proof)` ready
    /// for the ledger's callback entry point.
    pub fn deliver(
        &self,
        request_id: u64,
        contributions: &EncryptedValue,
        usage: &EncryptedValue,
    ) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
        let summary = CleartextSummary {
            contributions_total: self.decrypt_value(contributions)?,
            usage_total: self.decrypt_value(usage)?,
        };

        let cleartexts = summary.encode().to_vec();
        let proof = prove_decryption(&self.auth_key, request_id, &cleartexts)?;
        Ok((cleartexts, proof))
    }
}

/// Baby-step giant-step discrete log, bounded by [`DECRYPT_BOUND`].
fn discrete_log(target: G1Projective) -> Result<u64, CryptoError> {
    let base = G1Projective::generator();
    let m = (DECRYPT_BOUND as f64).sqrt() as u64 + 1;

    let mut table = HashMap::with_capacity(m as usize);
    let mut baby = G1Projective::zero();
    for j in 0..m {
        table.insert(point_bytes(&baby)?, j);
        baby += base;
    }

    let giant_step = base * Fr::from(m);
    let mut gamma = target;
    for i in 0..=m {
        if let Some(j) = table.get(&point_bytes(&gamma)?) {
            let result = i * m + j;
            if result <= DECRYPT_BOUND {
                return Ok(result);
            }
        }
        gamma -= giant_step;
    }

    Err(CryptoError::TotalOutOfRange)
}

fn point_bytes(p: &G1Projective) -> Result<Vec<u8>, CryptoError> {
    let mut out = Vec::new();
    p.into_affine()
        .serialize_compressed(&mut out)
        .map_err(|e| CryptoError::Serialization(format!("{e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_PLAINTEXT;
    use crate::value::Keypair;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn rng() -> ChaCha20Rng {
        ChaCha20Rng::from_seed([7u8; 32])
    }

    #[test]
    fn summary_wire_roundtrip() {
        let s = CleartextSummary {
            contributions_total: 100,
            usage_total: 0,
        };
        assert_eq!(CleartextSummary::decode(&s.encode()).unwrap(), s);
    }

    #[test]
    fn decode_rejects_short_buffers() {
        let err = CleartextSummary::decode(&[0u8; 15]).unwrap_err();
        assert!(matches!(err, CryptoError::MalformedCleartexts { expected: 16, got: 15 }));
    }

    #[test]
    fn merged_ciphertexts_decrypt_to_the_sum() {
        let mut rng = rng();
        let keys = Keypair::generate(&mut rng);
        let oracle = DecryptionOracle::new(keys.sk, b"test-key".to_vec());

        let mut acc = EncryptedValue::zero();
        for amount in [100u64, 250, 7] {
            let ct = EncryptedValue::encrypt(&keys.pk, amount, &mut rng).unwrap();
            acc = acc.add(&ct);
        }

        assert_eq!(oracle.decrypt_value(&acc).unwrap(), 357);
    }

    #[test]
    fn zero_accumulator_decrypts_to_zero() {
        let mut rng = rng();
        let keys = Keypair::generate(&mut rng);
        let oracle = DecryptionOracle::new(keys.sk, b"test-key".to_vec());
        assert_eq!(oracle.decrypt_value(&EncryptedValue::zero()).unwrap(), 0);
    }

    #[test]
    fn totals_beyond_the_bound_are_rejected() {
        let mut rng = rng();
        let keys = Keypair::generate(&mut rng);
        let oracle = DecryptionOracle::new(keys.sk, b"test-key".to_vec());

        let mut acc = EncryptedValue::zero();
        for _ in 0..17 {
            let ct = EncryptedValue::encrypt(&keys.pk, MAX_PLAINTEXT, &mut rng).unwrap();
            acc = acc.add(&ct);
        }

        // 17 * 65535 > DECRYPT_BOUND
        let err = oracle.decrypt_value(&acc).unwrap_err();
        assert!(matches!(err, CryptoError::TotalOutOfRange));
    }

    #[test]
    fn delivery_proof_verifies_and_binds() {
        let mut rng = rng();
        let keys = Keypair::generate(&mut rng);
        let oracle = DecryptionOracle::new(keys.sk, b"shared".to_vec());

        let contributions = EncryptedValue::encrypt(&keys.pk, 42, &mut rng).unwrap();
        let usage = EncryptedValue::zero();

        let (cleartexts, proof) = oracle.deliver(9, &contributions, &usage).unwrap();
        assert!(verify_decryption(b"shared", 9, &cleartexts, &proof).is_ok());

        // Wrong request id.
        assert!(verify_decryption(b"shared", 10, &cleartexts, &proof).is_err());

        // Tampered cleartexts.
        let mut tampered = cleartexts.clone();
        tampered[7] ^= 1;
        assert!(verify_decryption(b"shared", 9, &tampered, &proof).is_err());

        // Wrong key.
        assert!(verify_decryption(b"other", 9, &cleartexts, &proof).is_err());
    }

    #[test]
    fn state_digest_tracks_handles_and_identity() {
        let mut rng = rng();
        let keys = Keypair::generate(&mut rng);

        let a = EncryptedValue::encrypt(&keys.pk, 1, &mut rng).unwrap();
        let b = EncryptedValue::encrypt(&keys.pk, 2, &mut rng).unwrap();

        let d1 = state_digest(&[a.handle(), b.handle()], b"instance-1");
        let d2 = state_digest(&[a.handle(), b.handle()], b"instance-1");
        assert_eq!(d1, d2);

        // Different instance identity.
        assert_ne!(d1, state_digest(&[a.handle(), b.handle()], b"instance-2"));

        // Mutated ciphertext state.
        let merged = a.add(&b);
        assert_ne!(d1, state_digest(&[merged.handle(), b.handle()], b"instance-1"));
    }
}

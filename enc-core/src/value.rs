//! Additively homomorphic encrypted values (exponential ElGamal over BN254 G1).
//!
//! A ciphertext is `(c1, c2) = (r·G, m·G + r·PK)`. Component-wise addition of two
//! ciphertexts yields a ciphertext of the plaintext sum, which is all the ledger ever
//! does with them. The oracle side recovers `m·G` with the secret key and extracts `m`
//! by a bounded discrete-log search (see [`crate::oracle`]).
//!
//! SECURITY NOTE (prototype): randomness comes from the caller's RNG and amounts are
//! bounded so batch totals stay recoverable. In production the scheme, bounds, and
//! key handling should be reviewed by cryptographers.

use crate::constants::{poseidon_config, HANDLE_DOMAIN, MAX_PLAINTEXT};
use crate::types::{field_elems_from_bytes, CiphertextHandle};
use ark_bn254::{Fr, G1Affine, G1Projective};
use ark_crypto_primitives::sponge::poseidon::PoseidonSponge;
use ark_crypto_primitives::sponge::CryptographicSponge;
use ark_ec::{CurveGroup, PrimeGroup};
use ark_ff::UniformRand;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::Zero;
use rand::RngCore;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("plaintext amount {got} exceeds bound {bound}")]
    PlaintextOutOfRange { got: u64, bound: u64 },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("cleartext buffer must be {expected} bytes, got {got}")]
    MalformedCleartexts { expected: usize, got: usize },

    #[error("recovered total outside the supported bound")]
    TotalOutOfRange,

    #[error("decryption proof rejected")]
    VerificationFailed,
}

/// Oracle-side decryption key.
#[derive(Clone, Debug)]
pub struct SecretKey(pub(crate) Fr);

/// Public encryption key distributed to contributing principals.
#[derive(Clone, Copy, Debug)]
pub struct PublicKey(pub(crate) G1Projective);

pub struct Keypair {
    pub sk: SecretKey,
    pub pk: PublicKey,
}

impl Keypair {
    pub fn generate(rng: &mut impl RngCore) -> Self {
        let sk = Fr::rand(rng);
        let pk = G1Projective::generator() * sk;
        Self {
            sk: SecretKey(sk),
            pk: PublicKey(pk),
        }
    }
}

/// An opaque encrypted amount.
///
/// The ledger only ever calls [`EncryptedValue::zero`], [`EncryptedValue::add`], and
/// [`EncryptedValue::handle`]; it never observes plaintext.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncryptedValue {
    pub(crate) c1: G1Projective,
    pub(crate) c2: G1Projective,
}

impl EncryptedValue {
    /// The additive identity: a deterministic encryption of zero.
    pub fn zero() -> Self {
        Self {
            c1: G1Projective::zero(),
            c2: G1Projective::zero(),
        }
    }

    /// Encrypt `amount` under `pk`. Fails when `amount` exceeds [`MAX_PLAINTEXT`].
    pub fn encrypt(pk: &PublicKey, amount: u64, rng: &mut impl RngCore) -> Result<Self, CryptoError> {
        if amount > MAX_PLAINTEXT {
            return Err(CryptoError::PlaintextOutOfRange {
                got: amount,
                bound: MAX_PLAINTEXT,
            });
        }

        let g = G1Projective::generator();
        let r = Fr::rand(rng);

        Ok(Self {
            c1: g * r,
            c2: g * Fr::from(amount) + pk.0 * r,
        })
    }

    /// Homomorphic addition: the returned ciphertext encrypts the sum of both plaintexts.
    pub fn add(&self, other: &Self) -> Self {
        Self {
            c1: self.c1 + other.c1,
            c2: self.c2 + other.c2,
        }
    }

    /// Canonical compressed encoding (c1 then c2).
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        let mut out = Vec::new();
        self.c1
            .into_affine()
            .serialize_compressed(&mut out)
            .map_err(|e| CryptoError::Serialization(format!("{e}")))?;
        self.c2
            .into_affine()
            .serialize_compressed(&mut out)
            .map_err(|e| CryptoError::Serialization(format!("{e}")))?;
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let mut reader = bytes;
        let c1 = G1Affine::deserialize_compressed(&mut reader)
            .map_err(|e| CryptoError::Serialization(format!("{e}")))?;
        let c2 = G1Affine::deserialize_compressed(&mut reader)
            .map_err(|e| CryptoError::Serialization(format!("{e}")))?;
        Ok(Self {
            c1: c1.into(),
            c2: c2.into(),
        })
    }

    /// Content-addressed handle: Poseidon over the canonical bytes.
    ///
    /// Any merge changes the canonical bytes, so the handle pins one exact ciphertext
    /// state. This is what makes the ledger's state digests drift-sensitive.
    pub fn handle(&self) -> CiphertextHandle {
        let cfg = poseidon_config();
        let mut sponge = PoseidonSponge::<Fr>::new(&cfg);

        sponge.absorb(&Fr::from(HANDLE_DOMAIN));
        let bytes = self.to_bytes().expect("in-memory serialization");
        absorb_bytes(&mut sponge, &bytes);

        CiphertextHandle(sponge.squeeze_field_elements(1)[0])
    }
}

/// Absorb arbitrary bytes into a sponge as packed field elements.
pub(crate) fn absorb_bytes(sponge: &mut PoseidonSponge<Fr>, bytes: &[u8]) {
    for fe in field_elems_from_bytes(bytes) {
        sponge.absorb(&fe);
    }
}

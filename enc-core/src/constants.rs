//! Crate-wide constants used by the encrypted-value arithmetic and the oracle transcript.

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::poseidon::{find_poseidon_ark_and_mds, PoseidonConfig};
use ark_ff::PrimeField;

/// Largest amount a single ciphertext may encrypt.
///
/// Exponential ElGamal recovers plaintexts by a bounded discrete-log search, so
/// per-contribution amounts must stay small enough that batch totals remain inside
/// [`DECRYPT_BOUND`].
pub const MAX_PLAINTEXT: u64 = 65_535;

/// Largest batch total the oracle will recover.
///
/// The baby-step/giant-step table scales with the square root of this bound.
pub const DECRYPT_BOUND: u64 = 1 << 20;

/// Width of the cleartext buffer delivered by the oracle: two big-endian u64 totals.
pub const CLEARTEXT_WIDTH: usize = 16;

// Domain separators absorbed as the first sponge element, so handle, state-digest,
// and proof transcripts can never collide.
pub const HANDLE_DOMAIN: u64 = 0x48414e444c455631; // "HANDLEV1"
pub const STATE_DOMAIN: u64 = 0x5354415445444947; // "STATEDIG"
pub const PROOF_DOMAIN: u64 = 0x4f5241434c455631; // "ORACLEV1"

// Poseidon sponge configuration.
//
// We use a width-3 sponge (rate=2, capacity=1) to efficiently absorb pairs of field elements.
// The specific round counts chosen here are consistent with widely used Poseidon instantiations.
//
// NOTE: This is a prototype. For production, parameters should be reviewed by cryptographers
// and ideally fixed via audited constants / standard sets.
pub const POSEIDON_RATE: usize = 2;
pub const POSEIDON_CAPACITY: usize = 1;

// Typical Poseidon parameters for width=3.
pub const POSEIDON_FULL_ROUNDS: usize = 8;
pub const POSEIDON_PARTIAL_ROUNDS: usize = 57;

/// Poseidon S-box exponent (alpha). Common choices are 5 or 17.
pub const POSEIDON_ALPHA: u64 = 5;

/// Deterministically derive Poseidon parameters for BN254::Fr.
///
/// This uses arkworks' parameter derivation helper (Ark + MDS) so every component that
/// recomputes a handle or digest agrees on the same constants.
pub fn poseidon_config() -> PoseidonConfig<Fr> {
    // The helper expects the prime field size in bits.
    let prime_bits = Fr::MODULUS_BIT_SIZE as u64;

    // Derive the round constants (ARK) and MDS matrix.
    let (ark, mds) = find_poseidon_ark_and_mds::<Fr>(
        prime_bits,
        POSEIDON_RATE,
        POSEIDON_FULL_ROUNDS as u64,
        POSEIDON_PARTIAL_ROUNDS as u64,
        0,
    );

    PoseidonConfig::new(
        POSEIDON_FULL_ROUNDS,
        POSEIDON_PARTIAL_ROUNDS,
        POSEIDON_ALPHA,
        mds,
        ark,
        POSEIDON_RATE,
        POSEIDON_CAPACITY,
    )
}

//! Confidential-arithmetic layer for the metering ledger.
//!
//! This crate contains:
//! - An additively homomorphic encrypted value type (exponential ElGamal over BN254 G1).
//! - Content-addressed ciphertext handles and state digests for drift detection.
//! - Oracle-side decryption (bounded discrete log) and the callback proof transcript.

pub mod constants;
pub mod oracle;
pub mod types;
pub mod value;

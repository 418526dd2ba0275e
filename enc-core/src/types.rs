//! Types shared between the encrypted-value arithmetic and the host-side ledger.

use ark_bn254::Fr;
use ark_ff::PrimeField;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use serde::{Deserialize, Serialize};

/// JSON-friendly representation of a field element.
///
/// We expose Fr values as hex strings to avoid ambiguities.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrHex {
    pub hex: String,
}

impl FrHex {
    pub fn from_fr(x: &Fr) -> Self {
        // Use arkworks' canonical compressed encoding so all components agree.
        let mut bytes = Vec::new();
        x.serialize_compressed(&mut bytes)
            .expect("in-memory serialization");
        Self { hex: hex::encode(bytes) }
    }

    pub fn to_fr(&self) -> Result<Fr, String> {
        let bytes = hex::decode(&self.hex).map_err(|e| format!("invalid hex: {e}"))?;
        Fr::deserialize_compressed(&bytes[..]).map_err(|e| format!("invalid field bytes: {e}"))
    }
}

/// Stable content-addressed reference to an encrypted value.
///
/// Two ciphertexts with the same canonical bytes share a handle; any homomorphic
/// merge changes the bytes and therefore the handle. Produced only by
/// [`crate::value::EncryptedValue::handle`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CiphertextHandle(pub(crate) Fr);

impl CiphertextHandle {
    pub fn as_fr(&self) -> Fr {
        self.0
    }

    pub fn hex(&self) -> String {
        FrHex::from_fr(&self.0).hex
    }
}

/// Pack arbitrary bytes into field elements for sponge absorption.
///
/// Chunks of 31 bytes interpreted little-endian always fit below the BN254 scalar
/// modulus, so the packing is injective for fixed-length inputs.
pub fn field_elems_from_bytes(bytes: &[u8]) -> Vec<Fr> {
    bytes
        .chunks(31)
        .map(Fr::from_le_bytes_mod_order)
        .collect()
}

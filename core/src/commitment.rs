// Layout commitments.
//
// The hash must match the circuit bit for bit: circom's Poseidon over the
// BN254 scalar field, six inputs. A fleet contributes one packed element per
// ship in canonical order (`x + 10*y + 100*dir`), a word one element per
// letter; the salt is always the last input. The result is the field element
// in 32 big-endian bytes, which is exactly what the ledger stores.

use std::fmt;

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use light_poseidon::{Poseidon, PoseidonHasher};
use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::GameError;
use crate::layout::{Salt, SecretLayout};

const POSEIDON_INPUTS: usize = 6;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Commitment(pub [u8; 32]);

impl Commitment {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, GameError> {
        let bytes = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| GameError::layout(format!("commitment is not hex: {e}")))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| GameError::layout("commitment must be 32 bytes"))?;
        Ok(Self(arr))
    }

    /// `(hi, lo)` 128-bit limbs, see [`split_limbs`].
    pub fn limbs(&self) -> (u128, u128) {
        split_limbs(&self.0)
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", self.to_hex())
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Commitment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Commitment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Commitment::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Splits a 256-bit big-endian value into two 128-bit limbs: the most
/// significant 16 bytes become `hi`, the least significant 16 bytes `lo`.
/// A field element cannot hold a full 256-bit value, so the verifier receives
/// commitments and hashes in this form.
pub fn split_limbs(value: &[u8; 32]) -> (u128, u128) {
    let mut hi = [0u8; 16];
    let mut lo = [0u8; 16];
    hi.copy_from_slice(&value[0..16]);
    lo.copy_from_slice(&value[16..32]);
    (u128::from_be_bytes(hi), u128::from_be_bytes(lo))
}

/// A limb right-aligned in a 32-byte big-endian field element, the way it
/// appears among the verifier's public inputs.
pub fn limb_field_bytes(limb: u128) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[16..32].copy_from_slice(&limb.to_be_bytes());
    out
}

/// BN254 scalar field modulus `r`.
pub fn field_modulus() -> BigUint {
    BigUint::from_bytes_be(&Fr::MODULUS.to_bytes_be())
}

fn salt_element(salt: &Salt) -> Result<Fr, GameError> {
    if salt.value() >= &field_modulus() {
        return Err(GameError::layout("salt is not a canonical field element"));
    }
    Ok(Fr::from_be_bytes_mod_order(&salt.to_bytes_be()))
}

fn layout_elements(layout: &SecretLayout) -> Result<Vec<Fr>, GameError> {
    layout.validate()?;
    let elements = match layout {
        SecretLayout::Fleet(fleet) => fleet
            .canonical()
            .into_iter()
            .map(|ship| Fr::from(ship.packed()))
            .collect(),
        SecretLayout::Word(word) => word.letters().iter().map(|l| Fr::from(*l as u64)).collect(),
    };
    Ok(elements)
}

/// Commits to `layout` under `salt`.
pub fn commit(layout: &SecretLayout, salt: &Salt) -> Result<Commitment, GameError> {
    let mut inputs = layout_elements(layout)?;
    inputs.push(salt_element(salt)?);
    debug_assert_eq!(inputs.len(), POSEIDON_INPUTS);

    let mut poseidon = Poseidon::<Fr>::new_circom(POSEIDON_INPUTS)
        .map_err(|e| GameError::layout(format!("poseidon setup: {e}")))?;
    let digest = poseidon
        .hash(&inputs)
        .map_err(|e| GameError::layout(format!("poseidon: {e}")))?;

    let bytes = digest.into_bigint().to_bytes_be();
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(Commitment(out))
}

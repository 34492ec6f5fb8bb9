use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::board::{Fleet, TOTAL_SHIP_CELLS};
use crate::error::GameError;
use crate::session::GameKind;
use crate::word::{Word, WORD_LENGTH};

#[cfg(feature = "rand")]
use rand::Rng;

/// The secret a player commits to. Never leaves the local machine except
/// as a commitment or inside a proof witness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecretLayout {
    Fleet(Fleet),
    Word(Word),
}

impl SecretLayout {
    pub fn kind(&self) -> GameKind {
        match self {
            SecretLayout::Fleet(_) => GameKind::Battleship,
            SecretLayout::Word(_) => GameKind::Wordle,
        }
    }

    /// Number of secret cells (ship cells or letters). Prior-outcome vectors
    /// handed to the prover have exactly this many entries.
    pub fn cell_count(&self) -> usize {
        match self {
            SecretLayout::Fleet(_) => TOTAL_SHIP_CELLS as usize,
            SecretLayout::Word(_) => WORD_LENGTH,
        }
    }

    pub fn validate(&self) -> Result<(), GameError> {
        match self {
            SecretLayout::Fleet(fleet) => fleet.check(),
            // Word construction already enforces the alphabet.
            SecretLayout::Word(_) => Ok(()),
        }
    }
}

/// Blinding value mixed into a commitment. Arbitrary precision on the way
/// in; `commit` rejects anything that is not a canonical field element.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Salt(BigUint);

impl Salt {
    pub fn new(value: BigUint) -> Self {
        Self(value)
    }

    pub fn from_decimal(s: &str) -> Result<Self, GameError> {
        BigUint::parse_bytes(s.trim().as_bytes(), 10)
            .map(Self)
            .ok_or_else(|| GameError::layout(format!("salt {:?} is not a decimal integer", s)))
    }

    /// 248 random bits: always below the BN254 scalar modulus.
    #[cfg(feature = "rand")]
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 31];
        rng.fill(&mut bytes[..]);
        Self(BigUint::from_bytes_be(&bytes))
    }

    pub fn value(&self) -> &BigUint {
        &self.0
    }

    pub fn to_bytes_be(&self) -> Vec<u8> {
        self.0.to_bytes_be()
    }
}

impl From<u64> for Salt {
    fn from(value: u64) -> Self {
        Self(BigUint::from(value))
    }
}

impl FromStr for Salt {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Salt::from_decimal(s)
    }
}

impl fmt::Display for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Salts are secret; keep them out of debug logs.
impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Salt(..)")
    }
}

impl Serialize for Salt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_str_radix(10))
    }
}

impl<'de> Deserialize<'de> for Salt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Salt::from_decimal(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn salt_serializes_as_decimal_string() {
        let salt = Salt::from_decimal("123456789012345678901234567890").unwrap();
        let json = serde_json::to_string(&salt).unwrap();
        assert_eq!(json, "\"123456789012345678901234567890\"");
        let back: Salt = serde_json::from_str(&json).unwrap();
        assert_eq!(back, salt);
    }

    #[test]
    fn salt_debug_hides_value() {
        let salt = Salt::from(42);
        assert_eq!(format!("{:?}", salt), "Salt(..)");
    }

    #[test]
    fn rejects_non_decimal_salt() {
        assert!(Salt::from_decimal("0xdeadbeef").is_err());
        assert!(Salt::from_decimal("").is_err());
    }
}

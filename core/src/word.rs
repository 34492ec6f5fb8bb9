use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GameError;

/// Letters per word.
pub const WORD_LENGTH: usize = 5;

/// Letters are encoded 0..=25 (A..Z).
pub const ALPHABET_SIZE: u32 = 26;

/// Five letters, each in `0..ALPHABET_SIZE`. Used both for the setter's
/// secret word and for guesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "[u8; WORD_LENGTH]", into = "[u8; WORD_LENGTH]")]
pub struct Word([u8; WORD_LENGTH]);

impl Word {
    pub fn new(letters: [u8; WORD_LENGTH]) -> Result<Self, GameError> {
        if let Some(bad) = letters.iter().find(|l| **l as u32 >= ALPHABET_SIZE) {
            return Err(GameError::layout(format!("letter value {} out of range", bad)));
        }
        Ok(Self(letters))
    }

    pub fn letters(&self) -> &[u8; WORD_LENGTH] {
        &self.0
    }
}

impl TryFrom<[u8; WORD_LENGTH]> for Word {
    type Error = GameError;

    fn try_from(value: [u8; WORD_LENGTH]) -> Result<Self, Self::Error> {
        Word::new(value)
    }
}

impl From<Word> for [u8; WORD_LENGTH] {
    fn from(value: Word) -> Self {
        value.0
    }
}

impl FromStr for Word {
    type Err = GameError;

    /// Parses an ASCII word such as `"ALLOY"` (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != WORD_LENGTH {
            return Err(GameError::layout(format!("expected {} letters, got {:?}", WORD_LENGTH, s)));
        }
        let mut letters = [0u8; WORD_LENGTH];
        for (slot, ch) in letters.iter_mut().zip(s.chars()) {
            if !ch.is_ascii_alphabetic() {
                return Err(GameError::layout(format!("{:?} is not a letter", ch)));
            }
            *slot = ch.to_ascii_uppercase() as u8 - b'A';
        }
        Word::new(letters)
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for l in self.0 {
            write!(f, "{}", (b'A' + l) as char)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays() {
        let w: Word = "alloy".parse().unwrap();
        assert_eq!(w.letters(), &[0, 11, 11, 14, 24]);
        assert_eq!(w.to_string(), "ALLOY");
    }

    #[test]
    fn rejects_bad_words() {
        assert!("ALLO".parse::<Word>().is_err());
        assert!("AL1OY".parse::<Word>().is_err());
        assert!(Word::new([0, 1, 2, 3, 26]).is_err());
    }

    #[test]
    fn serde_rejects_out_of_range_letters() {
        assert!(serde_json::from_str::<Word>("[0,1,2,3,4]").is_ok());
        assert!(serde_json::from_str::<Word>("[0,1,2,3,40]").is_err());
    }
}

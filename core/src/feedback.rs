// Move outcomes computed by the defender from their own secret.
//
// Both functions are what the circuit proves; the ledger never sees the
// secret, only the claimed outcome and the proof.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::board::{Fleet, Position};
use crate::session::Outcome;
use crate::word::{Word, WORD_LENGTH};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LetterStatus {
    /// Letter not in the word (or all its occurrences already matched).
    Absent,
    /// Letter in the word at another position.
    Present,
    /// Letter at this exact position.
    Correct,
}

impl LetterStatus {
    /// Wire value: 0 absent, 1 present, 2 correct.
    pub fn as_u32(self) -> u32 {
        match self {
            LetterStatus::Absent => 0,
            LetterStatus::Present => 1,
            LetterStatus::Correct => 2,
        }
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(LetterStatus::Absent),
            1 => Some(LetterStatus::Present),
            2 => Some(LetterStatus::Correct),
            _ => None,
        }
    }
}

/// Outcome of a shot at `target` against `fleet`.
///
/// `prior_hits` are the defender's cells already resolved as hits. A ship
/// is reported sunk only when every one of its cells is in
/// `prior_hits ∪ {target}`.
pub fn shot_outcome(fleet: &Fleet, target: Position, prior_hits: &BTreeSet<Position>) -> Outcome {
    match fleet.ship_at(target) {
        None => Outcome::Shot { hit: false, sunk: None },
        Some(ship) => {
            let sunk = ship
                .cells()
                .iter()
                .all(|cell| *cell == target || prior_hits.contains(cell));
            Outcome::Shot { hit: true, sunk: sunk.then_some(ship.ship_type) }
        }
    }
}

/// Classic two-pass letter feedback. Exact matches consume their secret
/// position first; remaining guess letters then claim unused secret
/// positions left to right, so repeated letters are never over-reported.
pub fn letter_feedback(guess: &Word, secret: &Word) -> [LetterStatus; WORD_LENGTH] {
    let g = guess.letters();
    let s = secret.letters();
    let mut out = [LetterStatus::Absent; WORD_LENGTH];
    let mut used = [false; WORD_LENGTH];

    for i in 0..WORD_LENGTH {
        if g[i] == s[i] {
            out[i] = LetterStatus::Correct;
            used[i] = true;
        }
    }

    for i in 0..WORD_LENGTH {
        if out[i] == LetterStatus::Correct {
            continue;
        }
        if let Some(j) = (0..WORD_LENGTH).find(|&j| !used[j] && s[j] == g[i]) {
            used[j] = true;
            out[i] = LetterStatus::Present;
        }
    }

    out
}

pub fn guess_outcome(guess: &Word, secret: &Word) -> Outcome {
    let feedback = letter_feedback(guess, secret);
    let is_correct = feedback.iter().all(|s| *s == LetterStatus::Correct);
    Outcome::Guess { feedback, is_correct }
}

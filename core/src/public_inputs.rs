// Public-inputs binding hash.
//
// The ledger recomputes this hash from its own view of the session before it
// asks the verifier anything, and the proof carries the same hash as public
// signals 2 and 3. Byte layout (all integers big-endian):
//
//   shot:  session_id u32 | x u32 | y u32 | is_hit u8 | sunk_id u32
//          | commitment[32] | defender | shooter
//   guess: session_id u32 | guess[5] | feedback[5] | is_correct u8
//          | commitment[32] | setter | guesser
//
// Addresses are appended as their UTF-8 string bytes.

use tiny_keccak::{Hasher, Keccak};

use crate::board::Position;
use crate::commitment::Commitment;
use crate::feedback::LetterStatus;
use crate::session::{Address, Move, Outcome, SessionId};
use crate::word::{Word, WORD_LENGTH};

fn keccak256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    for part in parts {
        hasher.update(part);
    }
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

#[allow(clippy::too_many_arguments)]
pub fn shot_hash(
    session_id: SessionId,
    defender: &Address,
    shooter: &Address,
    target: Position,
    is_hit: bool,
    sunk_id: u32,
    commitment: &Commitment,
) -> [u8; 32] {
    let mut fixed = [0u8; 17];
    fixed[0..4].copy_from_slice(&session_id.to_be_bytes());
    fixed[4..8].copy_from_slice(&target.x.to_be_bytes());
    fixed[8..12].copy_from_slice(&target.y.to_be_bytes());
    fixed[12] = is_hit as u8;
    fixed[13..17].copy_from_slice(&sunk_id.to_be_bytes());

    keccak256(&[
        &fixed,
        commitment.as_bytes(),
        defender.as_str().as_bytes(),
        shooter.as_str().as_bytes(),
    ])
}

pub fn guess_hash(
    session_id: SessionId,
    setter: &Address,
    guesser: &Address,
    guess: &Word,
    feedback: &[LetterStatus; WORD_LENGTH],
    is_correct: bool,
    commitment: &Commitment,
) -> [u8; 32] {
    let mut fixed = [0u8; 15];
    fixed[0..4].copy_from_slice(&session_id.to_be_bytes());
    fixed[4..9].copy_from_slice(guess.letters());
    for (i, status) in feedback.iter().enumerate() {
        fixed[9 + i] = status.as_u32() as u8;
    }
    fixed[14] = is_correct as u8;

    keccak256(&[
        &fixed,
        commitment.as_bytes(),
        setter.as_str().as_bytes(),
        guesser.as_str().as_bytes(),
    ])
}

/// Hash for resolving `mv` with `outcome`. `resolver` is the defender /
/// setter, `mover` the shooter / guesser. `None` when the outcome family
/// does not match the move.
pub fn binding_hash(
    session_id: SessionId,
    resolver: &Address,
    mover: &Address,
    mv: &Move,
    outcome: &Outcome,
    commitment: &Commitment,
) -> Option<[u8; 32]> {
    match (mv, outcome) {
        (Move::Shot(target), Outcome::Shot { hit, sunk }) => Some(shot_hash(
            session_id,
            resolver,
            mover,
            *target,
            *hit,
            sunk.map(|s| s.id()).unwrap_or(0),
            commitment,
        )),
        (Move::Guess(word), Outcome::Guess { feedback, is_correct }) => Some(guess_hash(
            session_id,
            resolver,
            mover,
            word,
            feedback,
            *is_correct,
            commitment,
        )),
        _ => None,
    }
}

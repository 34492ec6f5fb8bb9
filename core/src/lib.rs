// core: deterministic rules for commit-reveal-resolve duels.
//
// Everything in this crate is pure: no I/O, no clocks, no global state. The
// same code backs the client's advisory checks and the in-process ledger's
// authoritative transitions, so the two can never disagree about the rules.
// Fixed-size representations (u128 bitmaps, u32 coordinates, 32-byte
// commitments) keep the values stable across the prover/verifier boundary.

pub mod bitmap;
pub mod board;
pub mod commitment;
pub mod error;
pub mod feedback;
pub mod layout;
pub mod public_inputs;
pub mod session;
pub mod word;

pub use board::{Direction, Fleet, Position, Ship, ShipType, BOARD_SIZE, NUM_SHIPS, SHIP_SIZES, TOTAL_SHIP_CELLS};
pub use commitment::{commit, split_limbs, Commitment};
pub use error::{GameError, RuleViolation};
pub use feedback::{guess_outcome, letter_feedback, shot_outcome, LetterStatus};
pub use layout::{Salt, SecretLayout};
pub use session::{
    Address, GameKind, Move, Outcome, PendingMove, Phase, ResolvedOutcome, Seat, Session, SessionId,
    MAX_GUESSES,
};
pub use word::{Word, ALPHABET_SIZE, WORD_LENGTH};

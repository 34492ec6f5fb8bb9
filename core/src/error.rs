use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A turn, phase or outcome rule that an operation would break.
///
/// The ledger rejects these authoritatively; the client checks the same
/// rules before submitting so obviously illegal actions never leave the
/// machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
pub enum RuleViolation {
    #[error("session already ended")]
    GameEnded,
    #[error("operation not allowed in the current phase")]
    InvalidPhase,
    #[error("a player cannot duel themselves")]
    SelfPlayNotAllowed,
    #[error("commitment already stored for this player")]
    AlreadyCommitted,
    #[error("this player does not commit in this game")]
    CommitNotExpected,
    #[error("commitment missing for the defending player")]
    NotCommitted,
    #[error("not this player's turn")]
    NotYourTurn,
    #[error("a move is already pending")]
    PendingMoveExists,
    #[error("no move is pending")]
    NoPendingMove,
    #[error("only the defending player can resolve the pending move")]
    WrongResolver,
    #[error("move does not belong to this game")]
    WrongMoveKind,
    #[error("coordinate outside the board")]
    InvalidCoordinate,
    #[error("cell already targeted")]
    AlreadyTargeted,
    #[error("outcome does not match the pending move")]
    OutcomeMismatch,
    #[error("a sunk ship must also be a hit")]
    SunkWithoutHit,
    #[error("ship already reported sunk")]
    ShipAlreadySunk,
    #[error("more hits reported than ship cells exist")]
    TooManyHits,
    #[error("no guesses remaining")]
    MaxGuessesReached,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("invalid layout: {0}")]
    InvalidLayout(String),

    #[error("{0} is not a participant of this session")]
    NotAParticipant(String),

    #[error(transparent)]
    Rule(#[from] RuleViolation),
}

impl GameError {
    pub(crate) fn layout(msg: impl Into<String>) -> Self {
        GameError::InvalidLayout(msg.into())
    }
}

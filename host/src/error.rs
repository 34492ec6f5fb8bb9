use duel_core::{Commitment, GameError, RuleViolation, SessionId};
use thiserror::Error;

/// Everything a client action can fail with.
///
/// Invariant and commitment errors stop the action and are reported to the
/// caller as-is. Network errors are surfaced so the user can retry.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid layout: {0}")]
    InvalidLayout(String),

    #[error("local commitment {local} does not match on-chain commitment {chain}")]
    CommitmentMismatch { local: Commitment, chain: Commitment },

    #[error("no cached secret for {identity} in session {session}")]
    MissingSecret { session: SessionId, identity: String },

    #[error("proof generation failed: {0}")]
    ProofGenerationFailure(String),

    #[error("chain submission failed: {0}")]
    ChainSubmissionFailure(String),

    #[error("move rejected: {0}")]
    InvalidMoveState(RuleViolation),

    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("{0} is not a participant of this session")]
    NotAParticipant(String),

    #[error("no local key for identity {0}")]
    UnknownIdentity(String),

    #[error("local storage: {0}")]
    Storage(String),

    #[error("configuration: {0}")]
    Config(String),
}

impl From<GameError> for ClientError {
    fn from(err: GameError) -> Self {
        match err {
            GameError::InvalidLayout(msg) => ClientError::InvalidLayout(msg),
            GameError::NotAParticipant(who) => ClientError::NotAParticipant(who),
            GameError::Rule(rule) => ClientError::InvalidMoveState(rule),
        }
    }
}

impl From<RuleViolation> for ClientError {
    fn from(rule: RuleViolation) -> Self {
        ClientError::InvalidMoveState(rule)
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::ChainSubmissionFailure(err.to_string())
    }
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

// JSON shapes spoken with the ledger gateway.
//
// The gateway mirrors contract storage, so optional values arrive as
// `{"tag": "Some", "values": [v]}` / `{"tag": "None"}` and bitmaps as
// decimal strings. Everything is converted into core types once, here, and
// nothing past this module sees the loose encoding.

use duel_core::{
    Address, Commitment, GameKind, LetterStatus, Move, Outcome, PendingMove, Phase, Position, ResolvedOutcome,
    Session, SessionId, ShipType, Word,
};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};
use crate::wallet::Authorization;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", content = "values")]
pub enum ChainOption<T> {
    Some([T; 1]),
    None,
}

impl<T> ChainOption<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            ChainOption::Some([v]) => Some(v),
            ChainOption::None => None,
        }
    }
}

impl<T> From<Option<T>> for ChainOption<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => ChainOption::Some([v]),
            None => ChainOption::None,
        }
    }
}

impl<T> Default for ChainOption<T> {
    fn default() -> Self {
        ChainOption::None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MoveDto {
    Shot { x: u32, y: u32 },
    Guess { letters: [u8; 5] },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutcomeDto {
    Shot { is_hit: bool, sunk_ship: u32 },
    Guess { feedback: [u32; 5], is_correct: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDto {
    pub mover: String,
    pub action: MoveDto,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDto {
    pub mover: String,
    pub action: MoveDto,
    pub outcome: OutcomeDto,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDto {
    pub id: SessionId,
    pub kind: GameKind,
    pub player1: String,
    pub player2: String,
    pub phase: Phase,
    #[serde(default)]
    pub turn: ChainOption<String>,
    #[serde(default)]
    pub winner: ChainOption<String>,
    #[serde(default)]
    pub commitment1: ChainOption<String>,
    #[serde(default)]
    pub commitment2: ChainOption<String>,
    #[serde(default)]
    pub pending: ChainOption<PendingDto>,
    pub fired1: String,
    pub fired2: String,
    pub hits1: u32,
    pub hits2: u32,
    pub sunk1: u32,
    pub sunk2: u32,
    pub guess_count: u32,
    #[serde(default)]
    pub history: Vec<ResolvedDto>,
}

fn malformed(what: impl std::fmt::Display) -> ClientError {
    ClientError::ChainSubmissionFailure(format!("malformed gateway data: {}", what))
}

impl From<&Move> for MoveDto {
    fn from(value: &Move) -> Self {
        match value {
            Move::Shot(p) => MoveDto::Shot { x: p.x, y: p.y },
            Move::Guess(w) => MoveDto::Guess { letters: *w.letters() },
        }
    }
}

impl TryFrom<MoveDto> for Move {
    type Error = ClientError;

    fn try_from(value: MoveDto) -> Result<Self> {
        Ok(match value {
            MoveDto::Shot { x, y } => {
                let target = Position::new(x, y);
                if !target.in_bounds() {
                    return Err(malformed(format!("shot at ({}, {}) is off the board", x, y)));
                }
                Move::Shot(target)
            }
            MoveDto::Guess { letters } => Move::Guess(Word::new(letters).map_err(malformed)?),
        })
    }
}

impl From<&Outcome> for OutcomeDto {
    fn from(value: &Outcome) -> Self {
        match value {
            Outcome::Shot { hit, sunk } => OutcomeDto::Shot {
                is_hit: *hit,
                sunk_ship: sunk.map(|s| s.id()).unwrap_or(0),
            },
            Outcome::Guess { feedback, is_correct } => OutcomeDto::Guess {
                feedback: (*feedback).map(|s| s.as_u32()),
                is_correct: *is_correct,
            },
        }
    }
}

impl TryFrom<OutcomeDto> for Outcome {
    type Error = ClientError;

    fn try_from(value: OutcomeDto) -> Result<Self> {
        Ok(match value {
            OutcomeDto::Shot { is_hit, sunk_ship } => {
                let sunk = match sunk_ship {
                    0 => None,
                    id => Some(ShipType::from_id(id).ok_or_else(|| malformed(format!("ship id {}", id)))?),
                };
                Outcome::Shot { hit: is_hit, sunk }
            }
            OutcomeDto::Guess { feedback, is_correct } => {
                let mut statuses = [LetterStatus::Absent; 5];
                for (slot, v) in statuses.iter_mut().zip(feedback) {
                    *slot = LetterStatus::from_u32(v).ok_or_else(|| malformed(format!("letter status {}", v)))?;
                }
                Outcome::Guess { feedback: statuses, is_correct }
            }
        })
    }
}

fn commitment(opt: ChainOption<String>) -> Result<Option<Commitment>> {
    opt.into_option()
        .map(|hex| Commitment::from_hex(&hex).map_err(malformed))
        .transpose()
}

fn bitmap(s: &str) -> Result<u128> {
    s.trim().parse().map_err(|_| malformed(format!("bitmap {:?}", s)))
}

impl TryFrom<SessionDto> for Session {
    type Error = ClientError;

    fn try_from(dto: SessionDto) -> Result<Self> {
        let pending = match dto.pending.into_option() {
            Some(p) => Some(PendingMove { mover: Address::new(p.mover), action: p.action.try_into()? }),
            None => None,
        };
        let history = dto
            .history
            .into_iter()
            .map(|r| {
                Ok(ResolvedOutcome {
                    mover: Address::new(r.mover),
                    action: r.action.try_into()?,
                    outcome: r.outcome.try_into()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Session {
            id: dto.id,
            kind: dto.kind,
            player1: Address::new(dto.player1),
            player2: Address::new(dto.player2),
            phase: dto.phase,
            turn: dto.turn.into_option().map(Address::new),
            winner: dto.winner.into_option().map(Address::new),
            commitments: [commitment(dto.commitment1)?, commitment(dto.commitment2)?],
            pending,
            fired: [bitmap(&dto.fired1)?, bitmap(&dto.fired2)?],
            hits_taken: [dto.hits1, dto.hits2],
            sunk_ships: [dto.sunk1, dto.sunk2],
            guess_count: dto.guess_count,
            history,
        })
    }
}

impl From<&Session> for SessionDto {
    fn from(s: &Session) -> Self {
        SessionDto {
            id: s.id,
            kind: s.kind,
            player1: s.player1.to_string(),
            player2: s.player2.to_string(),
            phase: s.phase,
            turn: s.turn.as_ref().map(|a| a.to_string()).into(),
            winner: s.winner.as_ref().map(|a| a.to_string()).into(),
            commitment1: s.commitments[0].map(|c| c.to_hex()).into(),
            commitment2: s.commitments[1].map(|c| c.to_hex()).into(),
            pending: s
                .pending
                .as_ref()
                .map(|p| PendingDto { mover: p.mover.to_string(), action: (&p.action).into() })
                .into(),
            fired1: s.fired[0].to_string(),
            fired2: s.fired[1].to_string(),
            hits1: s.hits_taken[0],
            hits2: s.hits_taken[1],
            sunk1: s.sunk_ships[0],
            sunk2: s.sunk_ships[1],
            guess_count: s.guess_count,
            history: s
                .history
                .iter()
                .map(|r| ResolvedDto {
                    mover: r.mover.to_string(),
                    action: (&r.action).into(),
                    outcome: (&r.outcome).into(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRequest {
    pub kind: GameKind,
    pub player1: String,
    pub player2: String,
    pub auth: Authorization,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenResponse {
    pub session: SessionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRequest {
    pub identity: String,
    /// Hex.
    pub commitment: String,
    pub auth: Authorization,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    pub identity: String,
    pub action: MoveDto,
    pub auth: Authorization,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub identity: String,
    pub outcome: OutcomeDto,
    /// Base64 proof payload.
    pub payload: String,
    /// Hex.
    pub pi_hash: String,
    pub auth: Authorization,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub accepted: bool,
    #[serde(default)]
    pub error: ChainOption<String>,
}

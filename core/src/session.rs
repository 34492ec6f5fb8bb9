// Session model and the rules that move it forward.
//
// Phases: AwaitingCommit -> InProgress -> Ended (terminal). While in
// progress the session alternates between "await move" (no pending move, the
// turn owner may act) and "await resolution" (one pending move, only the
// defending player may resolve it, with a proof the ledger verifies).
//
// Every mutating transition has a `check_*` twin that performs the same
// validation without touching the session. The client runs the checks as
// advisory gating before it spends time on proofs or network calls; the
// ledger runs the `apply_*` transitions authoritatively. A rejected
// transition never mutates the session.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bitmap;
use crate::board::{Position, ShipType, BOARD_SIZE, TOTAL_SHIP_CELLS};
use crate::commitment::Commitment;
use crate::error::{GameError, RuleViolation};
use crate::feedback::LetterStatus;
use crate::word::{Word, ALPHABET_SIZE, WORD_LENGTH};

pub type SessionId = u32;

/// Guesses available to the guesser in the letter game.
pub const MAX_GUESSES: u32 = 6;

/// Participant identifier as the ledger knows it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameKind {
    /// Both players hide a fleet and fire at each other.
    Battleship,
    /// Player 1 hides a word, player 2 guesses it.
    Wordle,
}

impl GameKind {
    /// `(width, height)` of the already-targeted bitmap.
    pub fn bitmap_dims(self) -> (u32, u32) {
        match self {
            GameKind::Battleship => (BOARD_SIZE as u32, BOARD_SIZE as u32),
            GameKind::Wordle => (ALPHABET_SIZE, 1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    AwaitingCommit,
    InProgress,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Seat {
    Player1,
    Player2,
}

impl Seat {
    pub fn index(self) -> usize {
        match self {
            Seat::Player1 => 0,
            Seat::Player2 => 1,
        }
    }

    pub fn other(self) -> Seat {
        match self {
            Seat::Player1 => Seat::Player2,
            Seat::Player2 => Seat::Player1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Move {
    Shot(Position),
    Guess(Word),
}

impl Move {
    pub fn kind(&self) -> GameKind {
        match self {
            Move::Shot(_) => GameKind::Battleship,
            Move::Guess(_) => GameKind::Wordle,
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Move::Shot(p) => write!(f, "shot at ({}, {})", p.x, p.y),
            Move::Guess(w) => write!(f, "guess {}", w),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Shot { hit: bool, sunk: Option<ShipType> },
    Guess { feedback: [LetterStatus; WORD_LENGTH], is_correct: bool },
}

impl Outcome {
    pub fn kind(&self) -> GameKind {
        match self {
            Outcome::Shot { .. } => GameKind::Battleship,
            Outcome::Guess { .. } => GameKind::Wordle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMove {
    pub mover: Address,
    pub action: Move,
}

/// One accepted resolution. Immutable once appended to the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedOutcome {
    pub mover: Address,
    pub action: Move,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub kind: GameKind,
    pub player1: Address,
    pub player2: Address,
    pub phase: Phase,
    pub turn: Option<Address>,
    pub winner: Option<Address>,
    /// Indexed by seat.
    pub commitments: [Option<Commitment>; 2],
    pub pending: Option<PendingMove>,
    /// `fired[0]`: player 1 at player 2, `fired[1]`: player 2 at player 1.
    /// In the letter game `fired[1]` marks letters the guesser has used.
    pub fired: [u128; 2],
    /// Hits taken by each seat's fleet.
    pub hits_taken: [u32; 2],
    /// Sunk-ship mask per seat, see [`ShipType::mask_bit`].
    pub sunk_ships: [u32; 2],
    pub guess_count: u32,
    pub history: Vec<ResolvedOutcome>,
}

impl Session {
    pub fn new(id: SessionId, kind: GameKind, player1: Address, player2: Address) -> Result<Self, GameError> {
        if player1 == player2 {
            return Err(RuleViolation::SelfPlayNotAllowed.into());
        }
        Ok(Self {
            id,
            kind,
            player1,
            player2,
            phase: Phase::AwaitingCommit,
            turn: None,
            winner: None,
            commitments: [None, None],
            pending: None,
            fired: [0, 0],
            hits_taken: [0, 0],
            sunk_ships: [0, 0],
            guess_count: 0,
            history: Vec::new(),
        })
    }

    pub fn seat_of(&self, who: &Address) -> Option<Seat> {
        if *who == self.player1 {
            Some(Seat::Player1)
        } else if *who == self.player2 {
            Some(Seat::Player2)
        } else {
            None
        }
    }

    pub fn participant(&self, who: &Address) -> Result<Seat, GameError> {
        self.seat_of(who)
            .ok_or_else(|| GameError::NotAParticipant(who.to_string()))
    }

    pub fn player(&self, seat: Seat) -> &Address {
        match seat {
            Seat::Player1 => &self.player1,
            Seat::Player2 => &self.player2,
        }
    }

    pub fn opponent_of(&self, who: &Address) -> Result<&Address, GameError> {
        Ok(self.player(self.participant(who)?.other()))
    }

    pub fn commitment_of(&self, who: &Address) -> Option<&Commitment> {
        self.seat_of(who).and_then(|s| self.commitments[s.index()].as_ref())
    }

    /// Whether `seat` hides a secret in this game.
    pub fn must_commit(&self, seat: Seat) -> bool {
        match self.kind {
            GameKind::Battleship => true,
            GameKind::Wordle => seat == Seat::Player1,
        }
    }

    /// Bitmap of cells `who` has already targeted.
    pub fn fired_by(&self, who: &Address) -> u128 {
        self.seat_of(who).map(|s| self.fired[s.index()]).unwrap_or(0)
    }

    /// Bitmap of cells the opponent has already targeted on `who`'s board.
    pub fn fired_at(&self, who: &Address) -> u128 {
        self.seat_of(who).map(|s| self.fired[s.other().index()]).unwrap_or(0)
    }

    pub fn is_turn_of(&self, who: &Address) -> bool {
        self.turn.as_ref() == Some(who)
    }

    /// Who must resolve the pending move, if one exists.
    pub fn awaiting_resolution_by(&self) -> Option<&Address> {
        let pending = self.pending.as_ref()?;
        self.opponent_of(&pending.mover).ok()
    }

    fn ensure_phase(&self, expected: Phase) -> Result<(), GameError> {
        if self.phase == Phase::Ended {
            return Err(RuleViolation::GameEnded.into());
        }
        if self.phase != expected {
            return Err(RuleViolation::InvalidPhase.into());
        }
        Ok(())
    }

    pub fn check_commit(&self, who: &Address) -> Result<Seat, GameError> {
        self.ensure_phase(Phase::AwaitingCommit)?;
        let seat = self.participant(who)?;
        if !self.must_commit(seat) {
            return Err(RuleViolation::CommitNotExpected.into());
        }
        if self.commitments[seat.index()].is_some() {
            return Err(RuleViolation::AlreadyCommitted.into());
        }
        Ok(seat)
    }

    /// Stores `who`'s commitment. Once every committing seat has one the
    /// session starts: player 1 fires first, the guesser guesses first.
    pub fn apply_commit(&mut self, who: &Address, commitment: Commitment) -> Result<(), GameError> {
        let seat = self.check_commit(who)?;
        self.commitments[seat.index()] = Some(commitment);

        let ready = [Seat::Player1, Seat::Player2]
            .into_iter()
            .filter(|s| self.must_commit(*s))
            .all(|s| self.commitments[s.index()].is_some());
        if ready {
            self.phase = Phase::InProgress;
            self.turn = Some(match self.kind {
                GameKind::Battleship => self.player1.clone(),
                GameKind::Wordle => self.player2.clone(),
            });
        }
        Ok(())
    }

    pub fn check_move(&self, who: &Address, action: &Move) -> Result<(), GameError> {
        self.ensure_phase(Phase::InProgress)?;
        let seat = self.participant(who)?;
        if self.pending.is_some() {
            return Err(RuleViolation::PendingMoveExists.into());
        }
        if !self.is_turn_of(who) {
            return Err(RuleViolation::NotYourTurn.into());
        }
        if action.kind() != self.kind {
            return Err(RuleViolation::WrongMoveKind.into());
        }
        match action {
            Move::Shot(target) => {
                let (w, h) = self.kind.bitmap_dims();
                let bit = bitmap::bit(*target, w, h)?;
                if self.fired[seat.index()] & bit != 0 {
                    return Err(RuleViolation::AlreadyTargeted.into());
                }
            }
            Move::Guess(_) => {
                if self.guess_count >= MAX_GUESSES {
                    return Err(RuleViolation::MaxGuessesReached.into());
                }
            }
        }
        Ok(())
    }

    pub fn apply_move(&mut self, who: &Address, action: Move) -> Result<(), GameError> {
        self.check_move(who, &action)?;
        self.pending = Some(PendingMove { mover: who.clone(), action });
        Ok(())
    }

    /// Validates that `who` may resolve the pending move with `outcome`.
    /// Returns the pending move being resolved.
    pub fn check_resolution(&self, who: &Address, outcome: &Outcome) -> Result<&PendingMove, GameError> {
        self.ensure_phase(Phase::InProgress)?;
        let defender = self.participant(who)?;
        let pending = self.pending.as_ref().ok_or(RuleViolation::NoPendingMove)?;
        if self.seat_of(&pending.mover) != Some(defender.other()) {
            return Err(RuleViolation::WrongResolver.into());
        }
        if outcome.kind() != pending.action.kind() {
            return Err(RuleViolation::OutcomeMismatch.into());
        }
        if self.commitments[defender.index()].is_none() {
            return Err(RuleViolation::NotCommitted.into());
        }

        match (&pending.action, outcome) {
            (Move::Shot(target), Outcome::Shot { hit, sunk }) => {
                let (w, h) = self.kind.bitmap_dims();
                let bit = bitmap::bit(*target, w, h)?;
                if self.fired[defender.other().index()] & bit != 0 {
                    return Err(RuleViolation::AlreadyTargeted.into());
                }
                if sunk.is_some() && !hit {
                    return Err(RuleViolation::SunkWithoutHit.into());
                }
                if let Some(ship) = sunk {
                    if self.sunk_ships[defender.index()] & ship.mask_bit() != 0 {
                        return Err(RuleViolation::ShipAlreadySunk.into());
                    }
                }
                if *hit && self.hits_taken[defender.index()] >= TOTAL_SHIP_CELLS {
                    return Err(RuleViolation::TooManyHits.into());
                }
            }
            (Move::Guess(_), Outcome::Guess { feedback, is_correct }) => {
                let all_correct = feedback.iter().all(|s| *s == LetterStatus::Correct);
                if all_correct != *is_correct {
                    return Err(RuleViolation::OutcomeMismatch.into());
                }
            }
            _ => return Err(RuleViolation::OutcomeMismatch.into()),
        }
        Ok(pending)
    }

    /// Applies a verified resolution: marks the target, records the outcome,
    /// clears the pending move, and either hands the turn over or ends the
    /// session.
    pub fn apply_resolution(&mut self, who: &Address, outcome: Outcome) -> Result<ResolvedOutcome, GameError> {
        let pending = self.check_resolution(who, &outcome)?.clone();
        let defender = self.participant(who)?;
        let mover = defender.other();
        let (w, h) = self.kind.bitmap_dims();

        match (&pending.action, &outcome) {
            (Move::Shot(target), Outcome::Shot { hit, sunk }) => {
                self.fired[mover.index()] |= bitmap::bit(*target, w, h)?;
                if *hit {
                    self.hits_taken[defender.index()] += 1;
                }
                if let Some(ship) = sunk {
                    self.sunk_ships[defender.index()] |= ship.mask_bit();
                }
                if self.hits_taken[defender.index()] >= TOTAL_SHIP_CELLS {
                    self.finish(pending.mover.clone());
                } else {
                    self.turn = Some(who.clone());
                }
            }
            (Move::Guess(word), Outcome::Guess { is_correct, .. }) => {
                for letter in word.letters() {
                    self.fired[mover.index()] |= bitmap::bit(Position::new(*letter as u32, 0), w, h)?;
                }
                self.guess_count += 1;
                if *is_correct {
                    self.finish(pending.mover.clone());
                } else if self.guess_count >= MAX_GUESSES {
                    self.finish(who.clone());
                }
            }
            _ => return Err(RuleViolation::OutcomeMismatch.into()),
        }

        let resolved = ResolvedOutcome { mover: pending.mover, action: pending.action, outcome };
        self.pending = None;
        self.history.push(resolved.clone());
        Ok(resolved)
    }

    fn finish(&mut self, winner: Address) {
        self.phase = Phase::Ended;
        self.turn = None;
        self.winner = Some(winner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Address {
        Address::new("alice")
    }

    fn bob() -> Address {
        Address::new("bob")
    }

    fn started_battleship() -> Session {
        let mut s = Session::new(1, GameKind::Battleship, alice(), bob()).unwrap();
        s.apply_commit(&alice(), Commitment([1; 32])).unwrap();
        assert_eq!(s.phase, Phase::AwaitingCommit);
        s.apply_commit(&bob(), Commitment([2; 32])).unwrap();
        s
    }

    fn started_wordle() -> Session {
        let mut s = Session::new(2, GameKind::Wordle, alice(), bob()).unwrap();
        s.apply_commit(&alice(), Commitment([3; 32])).unwrap();
        s
    }

    const MISS: Outcome = Outcome::Shot { hit: false, sunk: None };
    const HIT: Outcome = Outcome::Shot { hit: true, sunk: None };

    #[test]
    fn self_play_rejected() {
        assert_eq!(
            Session::new(1, GameKind::Battleship, alice(), alice()).unwrap_err(),
            GameError::Rule(RuleViolation::SelfPlayNotAllowed)
        );
    }

    #[test]
    fn starts_once_both_committed() {
        let s = started_battleship();
        assert_eq!(s.phase, Phase::InProgress);
        assert_eq!(s.turn, Some(alice()));
    }

    #[test]
    fn commit_rules() {
        let mut s = Session::new(1, GameKind::Battleship, alice(), bob()).unwrap();
        s.apply_commit(&alice(), Commitment([1; 32])).unwrap();
        assert_eq!(
            s.apply_commit(&alice(), Commitment([9; 32])).unwrap_err(),
            GameError::Rule(RuleViolation::AlreadyCommitted)
        );
        assert!(matches!(
            s.apply_commit(&Address::new("mallory"), Commitment([9; 32])),
            Err(GameError::NotAParticipant(_))
        ));
        assert_eq!(s.commitment_of(&alice()), Some(&Commitment([1; 32])));
    }

    #[test]
    fn wordle_starts_on_setter_commit_only() {
        let mut s = Session::new(2, GameKind::Wordle, alice(), bob()).unwrap();
        assert_eq!(
            s.apply_commit(&bob(), Commitment([3; 32])).unwrap_err(),
            GameError::Rule(RuleViolation::CommitNotExpected)
        );
        s.apply_commit(&alice(), Commitment([3; 32])).unwrap();
        assert_eq!(s.phase, Phase::InProgress);
        assert_eq!(s.turn, Some(bob()));
    }

    #[test]
    fn second_move_while_pending_is_rejected_without_mutation() {
        let mut s = started_battleship();
        s.apply_move(&alice(), Move::Shot(Position::new(1, 1))).unwrap();
        let before = s.pending.clone();

        let err = s.apply_move(&alice(), Move::Shot(Position::new(2, 2))).unwrap_err();
        assert_eq!(err, GameError::Rule(RuleViolation::PendingMoveExists));
        assert_eq!(s.pending, before);
    }

    #[test]
    fn out_of_turn_move_rejected() {
        let s = started_battleship();
        assert_eq!(
            s.check_move(&bob(), &Move::Shot(Position::new(0, 0))).unwrap_err(),
            GameError::Rule(RuleViolation::NotYourTurn)
        );
    }

    #[test]
    fn move_kind_and_bounds_checked() {
        let s = started_battleship();
        assert_eq!(
            s.check_move(&alice(), &Move::Guess("CRANE".parse().unwrap())).unwrap_err(),
            GameError::Rule(RuleViolation::WrongMoveKind)
        );
        assert_eq!(
            s.check_move(&alice(), &Move::Shot(Position::new(10, 0))).unwrap_err(),
            GameError::Rule(RuleViolation::InvalidCoordinate)
        );
    }

    #[test]
    fn resolution_requires_pending_and_defender() {
        let mut s = started_battleship();
        assert_eq!(
            s.check_resolution(&bob(), &MISS).unwrap_err(),
            GameError::Rule(RuleViolation::NoPendingMove)
        );
        s.apply_move(&alice(), Move::Shot(Position::new(4, 4))).unwrap();
        assert_eq!(
            s.check_resolution(&alice(), &MISS).unwrap_err(),
            GameError::Rule(RuleViolation::WrongResolver)
        );
        assert_eq!(
            s.check_resolution(&bob(), &Outcome::Shot { hit: false, sunk: Some(ShipType::Carrier) }).unwrap_err(),
            GameError::Rule(RuleViolation::SunkWithoutHit)
        );
    }

    #[test]
    fn resolution_alternates_turns_and_marks_bitmap() {
        let mut s = started_battleship();
        let target = Position::new(3, 2);
        s.apply_move(&alice(), Move::Shot(target)).unwrap();
        let resolved = s.apply_resolution(&bob(), HIT).unwrap();

        assert_eq!(resolved.mover, alice());
        assert_eq!(s.pending, None);
        assert_eq!(s.history.len(), 1);
        assert_eq!(s.turn, Some(bob()));
        assert_eq!(s.fired_by(&alice()), 1u128 << target.index());
        assert_eq!(s.fired_at(&bob()), 1u128 << target.index());
        assert_eq!(s.hits_taken, [0, 1]);

        // Same cell cannot be targeted twice.
        s.apply_move(&bob(), Move::Shot(Position::new(0, 0))).unwrap();
        s.apply_resolution(&alice(), MISS).unwrap();
        assert_eq!(
            s.check_move(&alice(), &Move::Shot(target)).unwrap_err(),
            GameError::Rule(RuleViolation::AlreadyTargeted)
        );
    }

    #[test]
    fn game_ends_after_all_ship_cells_hit() {
        let mut s = started_battleship();
        let mut bob_cell = 0;
        let mut alice_cell = 50;
        loop {
            let t = Position::from_index(bob_cell);
            bob_cell += 1;
            s.apply_move(&alice(), Move::Shot(t)).unwrap();
            s.apply_resolution(&bob(), HIT).unwrap();
            if s.phase == Phase::Ended {
                break;
            }
            let t = Position::from_index(alice_cell);
            alice_cell += 1;
            s.apply_move(&bob(), Move::Shot(t)).unwrap();
            s.apply_resolution(&alice(), MISS).unwrap();
        }
        assert_eq!(s.winner, Some(alice()));
        assert_eq!(s.turn, None);
        assert_eq!(s.hits_taken[1], TOTAL_SHIP_CELLS);
        assert_eq!(
            s.check_move(&bob(), &Move::Shot(Position::new(9, 9))).unwrap_err(),
            GameError::Rule(RuleViolation::GameEnded)
        );
    }

    #[test]
    fn sunk_ship_only_once() {
        let mut s = started_battleship();
        s.apply_move(&alice(), Move::Shot(Position::new(0, 0))).unwrap();
        s.apply_resolution(&bob(), Outcome::Shot { hit: true, sunk: Some(ShipType::Destroyer) }).unwrap();
        s.apply_move(&bob(), Move::Shot(Position::new(0, 0))).unwrap();
        s.apply_resolution(&alice(), MISS).unwrap();
        s.apply_move(&alice(), Move::Shot(Position::new(0, 1))).unwrap();
        assert_eq!(
            s.check_resolution(&bob(), &Outcome::Shot { hit: true, sunk: Some(ShipType::Destroyer) }).unwrap_err(),
            GameError::Rule(RuleViolation::ShipAlreadySunk)
        );
    }

    #[test]
    fn wordle_guesses_until_max() {
        let mut s = started_wordle();
        let wrong = Outcome::Guess { feedback: [LetterStatus::Absent; 5], is_correct: false };
        for i in 0..MAX_GUESSES {
            s.apply_move(&bob(), Move::Guess("BRICK".parse().unwrap())).unwrap();
            s.apply_resolution(&alice(), wrong).unwrap();
            if i + 1 < MAX_GUESSES {
                assert_eq!(s.phase, Phase::InProgress);
                assert_eq!(s.turn, Some(bob()));
            }
        }
        assert_eq!(s.phase, Phase::Ended);
        assert_eq!(s.winner, Some(alice()));
        assert_ne!(s.fired[1], 0);
    }

    #[test]
    fn wordle_correct_guess_wins_and_feedback_must_agree() {
        let mut s = started_wordle();
        s.apply_move(&bob(), Move::Guess("ALLOY".parse().unwrap())).unwrap();
        let inconsistent = Outcome::Guess { feedback: [LetterStatus::Correct; 5], is_correct: false };
        assert_eq!(
            s.check_resolution(&alice(), &inconsistent).unwrap_err(),
            GameError::Rule(RuleViolation::OutcomeMismatch)
        );
        s.apply_resolution(&alice(), Outcome::Guess { feedback: [LetterStatus::Correct; 5], is_correct: true })
            .unwrap();
        assert_eq!(s.winner, Some(bob()));
    }
}

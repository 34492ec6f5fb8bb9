// Circuit inputs for a resolution proof.
//
// Nothing reaches the prover until the local secret has been re-committed
// and found equal to the commitment stored on chain. All values are decimal
// strings, which is what the circuit's input JSON expects.

use std::collections::BTreeSet;

use duel_core::{
    commit, feedback, split_limbs, Commitment, GameKind, Move, Outcome, Position, Salt, SecretLayout,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClientError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShotWitness {
    /// `[x, y, dir]` per ship, canonical order.
    pub ships: [[String; 3]; 5],
    pub salt: String,
    pub prior_hits: Vec<String>,
    pub shot_x: String,
    pub shot_y: String,
    pub is_hit: String,
    pub sunk_ship: String,
    pub commitment_hi: String,
    pub commitment_lo: String,
    pub pi_hash_hi: String,
    pub pi_hash_lo: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessWitness {
    pub word: [String; 5],
    pub salt: String,
    pub prior_correct: Vec<String>,
    pub guess: [String; 5],
    pub feedback: [String; 5],
    pub is_correct: String,
    pub commitment_hi: String,
    pub commitment_lo: String,
    pub pi_hash_hi: String,
    pub pi_hash_lo: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WitnessInput {
    Shot(ShotWitness),
    Guess(GuessWitness),
}

impl WitnessInput {
    pub fn kind(&self) -> GameKind {
        match self {
            WitnessInput::Shot(_) => GameKind::Battleship,
            WitnessInput::Guess(_) => GameKind::Wordle,
        }
    }

    /// Public signals the circuit must output, in the circuit's own order.
    ///
    /// shot:  `[is_hit, sunk_ship, c_hi, c_lo, h_hi, h_lo, x, y]`
    /// guess: `[fb0..fb4, is_correct, c_hi, c_lo, h_hi, h_lo, g0..g4]`
    pub fn claimed_signals(&self) -> Vec<String> {
        match self {
            WitnessInput::Shot(w) => vec![
                w.is_hit.clone(),
                w.sunk_ship.clone(),
                w.commitment_hi.clone(),
                w.commitment_lo.clone(),
                w.pi_hash_hi.clone(),
                w.pi_hash_lo.clone(),
                w.shot_x.clone(),
                w.shot_y.clone(),
            ],
            WitnessInput::Guess(w) => {
                let mut out: Vec<String> = w.feedback.to_vec();
                out.push(w.is_correct.clone());
                out.push(w.commitment_hi.clone());
                out.push(w.commitment_lo.clone());
                out.push(w.pi_hash_hi.clone());
                out.push(w.pi_hash_lo.clone());
                out.extend(w.guess.iter().cloned());
                out
            }
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ClientError::ProofGenerationFailure(e.to_string()))
    }
}

fn dec(v: impl ToString) -> String {
    v.to_string()
}

fn bit(b: bool) -> String {
    (b as u8).to_string()
}

/// Assembles the witness for resolving `action` with `outcome`.
///
/// `prior_outcome_bits` has one entry per secret cell (17 fleet cells or 5
/// word positions), `1` where that cell was already revealed by an earlier
/// move.
pub fn build(
    layout: &SecretLayout,
    salt: &Salt,
    prior_outcome_bits: &[u8],
    action: &Move,
    outcome: &Outcome,
    chain_commitment: &Commitment,
    public_inputs_hash: &[u8; 32],
) -> Result<WitnessInput> {
    let local = commit(layout, salt)?;
    if local != *chain_commitment {
        return Err(ClientError::CommitmentMismatch { local, chain: *chain_commitment });
    }

    if prior_outcome_bits.len() != layout.cell_count() {
        return Err(ClientError::InvalidLayout(format!(
            "expected {} prior outcome bits, got {}",
            layout.cell_count(),
            prior_outcome_bits.len()
        )));
    }
    if prior_outcome_bits.iter().any(|b| *b > 1) {
        return Err(ClientError::InvalidLayout("prior outcome bits must be 0 or 1".into()));
    }
    if action.kind() != layout.kind() || outcome.kind() != layout.kind() {
        return Err(ClientError::InvalidLayout(format!(
            "{:?} layout cannot resolve a {:?} move with a {:?} outcome",
            layout.kind(),
            action.kind(),
            outcome.kind()
        )));
    }

    let (c_hi, c_lo) = split_limbs(chain_commitment.as_bytes());
    let (h_hi, h_lo) = split_limbs(public_inputs_hash);
    let prior: Vec<String> = prior_outcome_bits.iter().map(|b| dec(*b)).collect();

    let witness = match (layout, action, outcome) {
        (SecretLayout::Fleet(fleet), Move::Shot(target), Outcome::Shot { hit, sunk }) => {
            let prior_hits: BTreeSet<Position> = fleet
                .cells()
                .into_iter()
                .zip(prior_outcome_bits)
                .filter(|(_, b)| **b == 1)
                .map(|(p, _)| p)
                .collect();
            if feedback::shot_outcome(fleet, *target, &prior_hits) != *outcome {
                return Err(ClientError::ProofGenerationFailure(
                    "claimed shot outcome does not follow from the layout".into(),
                ));
            }

            let canonical = fleet.canonical();
            let ships: [[String; 3]; 5] = std::array::from_fn(|i| {
                let s = canonical[i];
                [dec(s.position.x), dec(s.position.y), dec(s.direction.as_u32())]
            });
            WitnessInput::Shot(ShotWitness {
                ships,
                salt: salt.to_string(),
                prior_hits: prior,
                shot_x: dec(target.x),
                shot_y: dec(target.y),
                is_hit: bit(*hit),
                sunk_ship: dec(sunk.map(|s| s.id()).unwrap_or(0)),
                commitment_hi: dec(c_hi),
                commitment_lo: dec(c_lo),
                pi_hash_hi: dec(h_hi),
                pi_hash_lo: dec(h_lo),
            })
        }
        (SecretLayout::Word(secret), Move::Guess(guess), Outcome::Guess { feedback: fb, is_correct }) => {
            if feedback::guess_outcome(guess, secret) != *outcome {
                return Err(ClientError::ProofGenerationFailure(
                    "claimed letter feedback does not follow from the word".into(),
                ));
            }
            WitnessInput::Guess(GuessWitness {
                word: (*secret.letters()).map(dec),
                salt: salt.to_string(),
                prior_correct: prior,
                guess: (*guess.letters()).map(dec),
                feedback: (*fb).map(|s| dec(s.as_u32())),
                is_correct: bit(*is_correct),
                commitment_hi: dec(c_hi),
                commitment_lo: dec(c_lo),
                pi_hash_hi: dec(h_hi),
                pi_hash_lo: dec(h_lo),
            })
        }
        _ => return Err(ClientError::InvalidLayout("move and outcome families differ".into())),
    };

    debug!(kind = ?witness.kind(), "built proof witness");
    Ok(witness)
}

#[cfg(test)]
mod tests {
    use super::*;
    use duel_core::{guess_outcome, shot_outcome, Direction, Fleet, ShipType, Word};

    fn fleet() -> Fleet {
        let mut f = Fleet::new();
        assert!(f.place_ships(vec![
            (ShipType::Destroyer, Position::new(0, 8), Direction::Horizontal),
            (ShipType::Carrier, Position::new(0, 0), Direction::Horizontal),
            (ShipType::Battleship, Position::new(0, 2), Direction::Horizontal),
            (ShipType::Cruiser, Position::new(0, 4), Direction::Vertical),
            (ShipType::Submarine, Position::new(5, 6), Direction::Horizontal),
        ]));
        f
    }

    fn hash() -> [u8; 32] {
        let mut h = [0u8; 32];
        h[0] = 1;
        h[31] = 2;
        h
    }

    #[test]
    fn shot_witness_has_circuit_fields() {
        let layout = SecretLayout::Fleet(fleet());
        let salt = Salt::from(12345);
        let c = commit(&layout, &salt).unwrap();
        let target = Position::new(3, 0);
        let outcome = shot_outcome(&fleet(), target, &BTreeSet::new());

        let w = build(&layout, &salt, &[0; 17], &Move::Shot(target), &outcome, &c, &hash()).unwrap();
        let WitnessInput::Shot(shot) = &w else { panic!("expected shot witness") };
        // canonical order puts the carrier first regardless of placement order
        assert_eq!(shot.ships[0], ["0", "0", "0"]);
        assert_eq!(shot.ships[2], ["0", "4", "1"]);
        assert_eq!(shot.is_hit, "1");
        assert_eq!(shot.sunk_ship, "0");
        assert_eq!(shot.salt, "12345");
        assert_eq!(shot.pi_hash_hi, (1u128 << 120).to_string());
        assert_eq!(shot.pi_hash_lo, "2");

        let signals = w.claimed_signals();
        assert_eq!(signals.len(), 8);
        assert_eq!(signals[0], "1");
        assert_eq!(signals[6], "3");
        assert_eq!(signals[7], "0");

        let json: serde_json::Value = serde_json::from_str(&w.to_json().unwrap()).unwrap();
        assert_eq!(json["prior_hits"].as_array().unwrap().len(), 17);
        assert_eq!(json["shot_x"], "3");
    }

    #[test]
    fn commitment_mismatch_detected_first() {
        let layout = SecretLayout::Fleet(fleet());
        let salt = Salt::from(1);
        let other = commit(&layout, &Salt::from(2)).unwrap();
        let outcome = Outcome::Shot { hit: false, sunk: None };
        let err = build(&layout, &salt, &[0; 3], &Move::Shot(Position::new(9, 9)), &outcome, &other, &hash())
            .unwrap_err();
        // the bad bit count would also fail, but the commitment check runs first
        assert!(matches!(err, ClientError::CommitmentMismatch { .. }));
    }

    #[test]
    fn prior_bits_length_checked() {
        let layout = SecretLayout::Fleet(fleet());
        let salt = Salt::from(1);
        let c = commit(&layout, &salt).unwrap();
        let outcome = Outcome::Shot { hit: false, sunk: None };
        let err = build(&layout, &salt, &[0; 16], &Move::Shot(Position::new(9, 9)), &outcome, &c, &hash())
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidLayout(_)));
    }

    #[test]
    fn sunk_uses_prior_bits() {
        let layout = SecretLayout::Fleet(fleet());
        let salt = Salt::from(1);
        let c = commit(&layout, &salt).unwrap();
        // destroyer is the last two canonical cells: (0,8) and (1,8)
        let mut prior = [0u8; 17];
        prior[15] = 1;
        let sunk = Outcome::Shot { hit: true, sunk: Some(ShipType::Destroyer) };
        let w = build(&layout, &salt, &prior, &Move::Shot(Position::new(1, 8)), &sunk, &c, &hash()).unwrap();
        let WitnessInput::Shot(shot) = w else { panic!("expected shot witness") };
        assert_eq!(shot.sunk_ship, "5");

        // claiming a sink without the prior hit is caught before proving
        let err = build(&layout, &salt, &[0; 17], &Move::Shot(Position::new(1, 8)), &sunk, &c, &hash())
            .unwrap_err();
        assert!(matches!(err, ClientError::ProofGenerationFailure(_)));
    }

    #[test]
    fn guess_witness_signal_order() {
        let secret: Word = "ALLOY".parse().unwrap();
        let guess: Word = "LOLLY".parse().unwrap();
        let layout = SecretLayout::Word(secret);
        let salt = Salt::from(99);
        let c = commit(&layout, &salt).unwrap();
        let outcome = guess_outcome(&guess, &secret);

        let w = build(&layout, &salt, &[0; 5], &Move::Guess(guess), &outcome, &c, &hash()).unwrap();
        let signals = w.claimed_signals();
        assert_eq!(signals.len(), 15);
        // feedback P P C A C
        assert_eq!(&signals[0..5], &["1", "1", "2", "0", "2"]);
        assert_eq!(signals[5], "0");
        // guess letters L O L L Y
        assert_eq!(&signals[10..15], &["11", "14", "11", "11", "24"]);
    }

    #[test]
    fn family_mismatch_rejected() {
        let layout = SecretLayout::Word("ALLOY".parse().unwrap());
        let salt = Salt::from(99);
        let c = commit(&layout, &salt).unwrap();
        let err = build(
            &layout,
            &salt,
            &[0; 5],
            &Move::Shot(Position::new(0, 0)),
            &Outcome::Shot { hit: false, sunk: None },
            &c,
            &hash(),
        )
        .unwrap_err();
        assert!(matches!(err, ClientError::InvalidLayout(_)));
    }
}

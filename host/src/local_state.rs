// What one local identity knows about one session.
//
// The secret half (layout, salt, commitment) exists only on this machine.
// The derived half (own hits, observed outcomes, pending mirror) is rebuilt
// from the canonical session after every poll, so it can never drift from
// the chain for long.

use std::collections::{BTreeMap, BTreeSet};

use duel_core::{
    bitmap, commit, Address, Commitment, GameKind, LetterStatus, Move, Outcome, PendingMove, Position, Salt,
    SecretLayout, Session,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClientError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRecord {
    pub layout: SecretLayout,
    pub salt: Salt,
    pub commitment: Commitment,
}

impl SecretRecord {
    /// Commits to `layout` under `salt` and keeps all three together.
    pub fn seal(layout: SecretLayout, salt: Salt) -> Result<Self> {
        let commitment = commit(&layout, &salt)?;
        Ok(Self { layout, salt, commitment })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedMove {
    pub action: Move,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerIdentityState {
    /// `None` for a participant that does not commit (the guesser).
    pub secret: Option<SecretRecord>,
    /// Own fleet cells (board index) known hit, or own word positions
    /// already revealed correct.
    pub own_hits: BTreeSet<u32>,
    /// Own moves in the order they were resolved.
    pub observed: Vec<ObservedMove>,
    pub pending: Option<PendingMove>,
}

impl PerIdentityState {
    pub fn with_secret(secret: SecretRecord) -> Self {
        Self { secret: Some(secret), ..Default::default() }
    }

    pub fn secret(&self, session: &Session, identity: &Address) -> Result<&SecretRecord> {
        self.secret.as_ref().ok_or_else(|| ClientError::MissingSecret {
            session: session.id,
            identity: identity.to_string(),
        })
    }

    /// Rebuilds the derived fields from the canonical session.
    pub fn reconcile(&mut self, session: &Session, me: &Address) {
        self.own_hits = match (&self.secret, session.kind) {
            (Some(secret), GameKind::Battleship) => own_fleet_hits(session, me, &secret.layout),
            _ => revealed_positions(session, me),
        };
        self.observed = session
            .history
            .iter()
            .filter(|r| r.mover == *me)
            .map(|r| ObservedMove { action: r.action, outcome: r.outcome })
            .collect();
        self.pending = session.pending.clone();
        debug!(
            session = session.id,
            identity = %me,
            own_hits = self.own_hits.len(),
            observed = self.observed.len(),
            "reconciled local state"
        );
    }

    /// Own cells already hit as board positions, for outcome computation.
    pub fn prior_hit_positions(&self) -> BTreeSet<Position> {
        self.own_hits.iter().map(|i| Position::from_index(*i)).collect()
    }

    /// One bit per secret cell, in the order the circuit walks the layout:
    /// fleet cells in canonical ship order then segment order, or word
    /// positions left to right.
    pub fn prior_outcome_bits(&self, layout: &SecretLayout) -> Vec<u8> {
        match layout {
            SecretLayout::Fleet(fleet) => fleet
                .cells()
                .iter()
                .map(|p| self.own_hits.contains(&p.index()) as u8)
                .collect(),
            SecretLayout::Word(_) => (0..layout.cell_count() as u32)
                .map(|i| self.own_hits.contains(&i) as u8)
                .collect(),
        }
    }

    /// My shots at the opponent: target -> hit?
    pub fn shot_marks(&self) -> BTreeMap<Position, bool> {
        self.observed
            .iter()
            .filter_map(|o| match (o.action, o.outcome) {
                (Move::Shot(p), Outcome::Shot { hit, .. }) => Some((p, hit)),
                _ => None,
            })
            .collect()
    }
}

fn own_fleet_hits(session: &Session, me: &Address, layout: &SecretLayout) -> BTreeSet<u32> {
    let SecretLayout::Fleet(fleet) = layout else {
        return BTreeSet::new();
    };
    let (w, h) = session.kind.bitmap_dims();
    let ship_cells: BTreeSet<Position> = fleet.cells().into_iter().collect();
    bitmap::decode(session.fired_at(me), w, h)
        .into_iter()
        .filter(|p| ship_cells.contains(p))
        .map(|p| p.index())
        .collect()
}

// Without the layout we can still read the claims the defender made.
fn revealed_positions(session: &Session, me: &Address) -> BTreeSet<u32> {
    let mut out = BTreeSet::new();
    for resolved in session.history.iter().filter(|r| r.mover != *me) {
        match (resolved.action, resolved.outcome) {
            (Move::Shot(p), Outcome::Shot { hit: true, .. }) => {
                out.insert(p.index());
            }
            (Move::Guess(_), Outcome::Guess { feedback, .. }) => {
                for (i, status) in feedback.iter().enumerate() {
                    if *status == LetterStatus::Correct {
                        out.insert(i as u32);
                    }
                }
            }
            _ => {}
        }
    }
    out
}

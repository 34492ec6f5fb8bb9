// In-process ledger.
//
// Runs the same session rules a deployed contract runs and checks
// resolutions the way the on-chain verifier entry point does: the
// public-inputs hash is recomputed from the ledger's own view, the payload
// must bind to it and to the stored commitment, and the remaining public
// signals must spell out exactly the claimed outcome. The pairing check
// itself sits behind `ProofVerifier`.
//
// Handles are cheap clones over one shared ledger, so several local
// identities (and tests) can drive the same sessions.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use duel_core::commitment::field_modulus;
use duel_core::public_inputs::binding_hash;
use duel_core::{Address, Commitment, GameKind, Move, Outcome, Session, SessionId};
use num_bigint::BigUint;
use tracing::{debug, info, warn};

use crate::chain::{ChainClient, Submission};
use crate::error::{ClientError, Result};
use crate::payload::{self, PayloadParts, FR_BYTES};
use crate::wallet::{self, Authorization};

/// Accepts or rejects the proof points of a structurally valid payload.
pub trait ProofVerifier {
    fn verify(&self, kind: GameKind, parts: &PayloadParts) -> std::result::Result<(), String>;
}

/// Only checks that every proof coordinate is a canonical field element.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralVerifier;

impl ProofVerifier for StructuralVerifier {
    fn verify(&self, _kind: GameKind, parts: &PayloadParts) -> std::result::Result<(), String> {
        let modulus = field_modulus();
        let coords = parts.a.chunks(FR_BYTES).chain(parts.b.chunks(FR_BYTES)).chain(parts.c.chunks(FR_BYTES));
        for (i, chunk) in coords.enumerate() {
            if BigUint::from_bytes_be(chunk) >= modulus {
                return Err(format!("proof coordinate {} is not a field element", i));
            }
        }
        Ok(())
    }
}

struct Inner {
    sessions: BTreeMap<SessionId, Session>,
    next_id: SessionId,
    verifier: Box<dyn ProofVerifier>,
}

#[derive(Clone)]
pub struct LocalLedger {
    inner: Rc<RefCell<Inner>>,
}

impl Default for LocalLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn rejected(why: impl std::fmt::Display) -> ClientError {
    ClientError::ChainSubmissionFailure(format!("ledger rejected resolution: {}", why))
}

impl LocalLedger {
    pub fn new() -> Self {
        Self::with_verifier(StructuralVerifier)
    }

    pub fn with_verifier(verifier: impl ProofVerifier + 'static) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                sessions: BTreeMap::new(),
                next_id: 1,
                verifier: Box::new(verifier),
            })),
        }
    }

    /// Snapshot of a session.
    pub fn session(&self, id: SessionId) -> Option<Session> {
        self.inner.borrow().sessions.get(&id).cloned()
    }

    fn with_session<T>(&self, id: SessionId, f: impl FnOnce(&mut Session, &dyn ProofVerifier) -> Result<T>) -> Result<T> {
        let mut inner = self.inner.borrow_mut();
        let Inner { sessions, verifier, .. } = &mut *inner;
        let session = sessions.get_mut(&id).ok_or(ClientError::SessionNotFound(id))?;
        f(session, &**verifier)
    }
}

fn check_proof(
    session: &Session,
    identity: &Address,
    outcome: &Outcome,
    payload_bytes: &[u8],
    pi_hash: &[u8; 32],
    verifier: &dyn ProofVerifier,
) -> Result<()> {
    let pending = session.check_resolution(identity, outcome)?;
    let commitment: Commitment = *session
        .commitment_of(identity)
        .ok_or_else(|| rejected("resolver has no commitment"))?;

    let expected_hash = binding_hash(session.id, identity, &pending.mover, &pending.action, outcome, &commitment)
        .ok_or_else(|| rejected("outcome does not match the pending move"))?;
    if expected_hash != *pi_hash {
        return Err(rejected("public-inputs hash does not match the session"));
    }

    let parts = payload::parse(payload_bytes).map_err(rejected)?;
    let expected_count = payload::signal_count(session.kind);
    if parts.signals.len() != expected_count {
        return Err(rejected(format!("expected {} public signals, got {}", expected_count, parts.signals.len())));
    }
    payload::check_binding(&parts.signals, &commitment, pi_hash).map_err(rejected)?;
    let expected = payload::expected_wire_signals(&pending.action, outcome, &commitment, pi_hash).map_err(rejected)?;
    if parts.signals != expected {
        return Err(rejected("public signals do not match the claimed outcome"));
    }
    verifier.verify(session.kind, &parts).map_err(rejected)
}

impl ChainClient for LocalLedger {
    async fn open_session(
        &self,
        kind: GameKind,
        player1: &Address,
        player2: &Address,
        auth: &Authorization,
    ) -> Result<SessionId> {
        if auth.signer != *player1 && auth.signer != *player2 {
            return Err(ClientError::NotAParticipant(auth.signer.to_string()));
        }
        let message = Submission::Open { kind, player1, player2 }.canonical_bytes(&auth.signer);
        wallet::verify(auth, &auth.signer, &message)?;

        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        let session = Session::new(id, kind, player1.clone(), player2.clone())?;
        inner.sessions.insert(id, session);
        inner.next_id += 1;
        info!(session = id, ?kind, %player1, %player2, "session opened");
        Ok(id)
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>> {
        Ok(self.session(id))
    }

    async fn submit_commit(
        &self,
        id: SessionId,
        identity: &Address,
        commitment: &Commitment,
        auth: &Authorization,
    ) -> Result<()> {
        let message = Submission::Commit { session: id, commitment }.canonical_bytes(identity);
        wallet::verify(auth, identity, &message)?;
        self.with_session(id, |session, _| {
            session.apply_commit(identity, *commitment)?;
            info!(session = id, %identity, commitment = %commitment, phase = ?session.phase, "commitment stored");
            Ok(())
        })
    }

    async fn submit_move(&self, id: SessionId, identity: &Address, action: &Move, auth: &Authorization) -> Result<()> {
        let message = Submission::Move { session: id, action }.canonical_bytes(identity);
        wallet::verify(auth, identity, &message)?;
        self.with_session(id, |session, _| {
            session.apply_move(identity, *action)?;
            debug!(session = id, %identity, %action, "move accepted");
            Ok(())
        })
    }

    async fn submit_resolution(
        &self,
        id: SessionId,
        identity: &Address,
        outcome: &Outcome,
        payload: &[u8],
        pi_hash: &[u8; 32],
        auth: &Authorization,
    ) -> Result<()> {
        let message = Submission::Resolve { session: id, outcome, payload, pi_hash }.canonical_bytes(identity);
        wallet::verify(auth, identity, &message)?;
        self.with_session(id, |session, verifier| {
            if let Err(e) = check_proof(session, identity, outcome, payload, pi_hash, verifier) {
                warn!(session = id, %identity, error = %e, "resolution refused");
                return Err(e);
            }
            let resolved = session.apply_resolution(identity, *outcome)?;
            info!(
                session = id,
                mover = %resolved.mover,
                action = %resolved.action,
                outcome = ?resolved.outcome,
                phase = ?session.phase,
                "resolution accepted"
            );
            Ok(())
        })
    }
}

// Session coordinator.
//
// One coordinator drives one session for whichever local identity is
// active. Everything it does starts from a fresh read of the canonical
// session, is gated by the same rule checks the ledger applies, and ends
// with another read so the local mirror never runs ahead of the chain.
//
// Reactions are evaluated once per event through `dispatch`, which maps the
// current session and identity to a single `Decision`. Resolving a pending
// move is the only decision acted on automatically, and at most one
// resolution per session runs at a time (`InFlight`).

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;

use duel_core::public_inputs::binding_hash;
use duel_core::{
    guess_outcome, shot_outcome, Address, Commitment, GameKind, Move, Outcome, Phase, Position, RuleViolation, Salt,
    SecretLayout, Session, SessionId, Word,
};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::cache::IdentityCache;
use crate::chain::{ChainClient, Submission};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::local_state::{PerIdentityState, SecretRecord};
use crate::payload;
use crate::proofs::Prover;
use crate::visualize;
use crate::wallet::{Authorization, KeyBook, WalletSigner};
use crate::witness;

/// Sessions with a resolution under way. Shared by every coordinator of
/// one client.
#[derive(Debug, Clone, Default)]
pub struct InFlight(Rc<RefCell<HashSet<SessionId>>>);

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while another resolution for `session` holds a ticket.
    pub fn try_acquire(&self, session: SessionId) -> Option<InFlightTicket> {
        if self.0.borrow_mut().insert(session) {
            Some(InFlightTicket { registry: Rc::clone(&self.0), session })
        } else {
            None
        }
    }

    pub fn is_active(&self, session: SessionId) -> bool {
        self.0.borrow().contains(&session)
    }
}

/// Releases its session when dropped, whatever path the resolution took.
#[derive(Debug)]
pub struct InFlightTicket {
    registry: Rc<RefCell<HashSet<SessionId>>>,
    session: SessionId,
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        self.registry.borrow_mut().remove(&self.session);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Polled,
    IdentitySwitched,
    Submitted,
}

/// What the active identity should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Nothing to do until the session changes.
    Wait,
    Commit,
    Move,
    /// A pending move is aimed at the active identity.
    Resolve,
    Finished { winner: Option<Address> },
    /// The active identity is not a participant.
    Spectate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveReport {
    Resolved(Outcome),
    /// Another resolution for this session is already running.
    Coalesced,
}

#[derive(Debug, Clone)]
pub enum Command {
    Commit { layout: SecretLayout, salt: Salt },
    Fire(Position),
    Guess(Word),
    Resolve,
    SwitchIdentity(String),
    Export,
    Import(String),
    /// Forget an identity's cached state for this session.
    Discard(String),
    Refresh,
    Show,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Decision(Decision),
    Committed(Commitment),
    MoveSubmitted(Move),
    Resolved(Outcome),
    Coalesced,
    Switched(Address),
    Exported(String),
    Imported,
    Discarded(Address),
    Refreshed,
    View(String),
    Failed(String),
}

/// Opens a session signed by `signer`, who must be one of the players.
pub async fn open_session<C: ChainClient>(
    chain: &C,
    signer: &impl WalletSigner,
    kind: GameKind,
    player1: &Address,
    player2: &Address,
) -> Result<SessionId> {
    let me = signer.address();
    let auth = signer.sign(&Submission::Open { kind, player1, player2 }.canonical_bytes(&me))?;
    chain.open_session(kind, player1, player2, &auth).await
}

pub struct SessionCoordinator<C: ChainClient, P: Prover> {
    chain: C,
    prover: P,
    keys: KeyBook,
    cache: IdentityCache,
    config: ClientConfig,
    session_id: SessionId,
    session: Option<Session>,
    active: Address,
    live: PerIdentityState,
    in_flight: InFlight,
    auto_resolve: bool,
    auto_resolve_paused: bool,
}

impl<C: ChainClient, P: Prover> SessionCoordinator<C, P> {
    /// `active` names the starting identity by label or address.
    pub fn new(
        chain: C,
        prover: P,
        keys: KeyBook,
        mut cache: IdentityCache,
        config: ClientConfig,
        session_id: SessionId,
        active: &str,
    ) -> Result<Self> {
        let active = keys.resolve(active)?;
        let live = cache.load(session_id, &active)?.unwrap_or_default();
        Ok(Self {
            chain,
            prover,
            keys,
            cache,
            config,
            session_id,
            session: None,
            active,
            live,
            in_flight: InFlight::new(),
            auto_resolve: true,
            auto_resolve_paused: false,
        })
    }

    /// Shares an in-flight registry with other coordinators.
    pub fn with_in_flight(mut self, in_flight: InFlight) -> Self {
        self.in_flight = in_flight;
        self
    }

    pub fn set_auto_resolve(&mut self, enabled: bool) {
        self.auto_resolve = enabled;
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    pub fn active_identity(&self) -> &Address {
        &self.active
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn local_state(&self) -> &PerIdentityState {
        &self.live
    }

    pub fn keys(&self) -> &KeyBook {
        &self.keys
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    fn authorize(&self, submission: Submission<'_>) -> Result<Authorization> {
        let signer = self.keys.get(&self.active)?;
        signer.sign(&submission.canonical_bytes(&self.active))
    }

    async fn fetch(&self) -> Result<Session> {
        let attempts = self.config.poll_retries.max(1);
        let mut last_err = None;
        for attempt in 1..=attempts {
            match self.chain.get_session(self.session_id).await {
                Ok(Some(session)) => return Ok(session),
                Ok(None) => return Err(ClientError::SessionNotFound(self.session_id)),
                Err(e) => {
                    warn!(session = self.session_id, attempt, error = %e, "session read failed");
                    last_err = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or(ClientError::SessionNotFound(self.session_id)))
    }

    /// Reads the canonical session and rebuilds the active identity's
    /// derived state from it.
    pub async fn refresh(&mut self) -> Result<&Session> {
        let session = self.fetch().await?;
        let before = self.live.clone();
        self.live.reconcile(&session, &self.active);
        if self.live.secret.is_some() && self.live != before {
            self.cache.save(self.session_id, &self.active, &self.live)?;
        }
        debug!(session = self.session_id, phase = ?session.phase, turn = ?session.turn, "session refreshed");
        Ok(self.session.insert(session))
    }

    /// Commits `layout` for the active identity. The secret is cached
    /// before anything is submitted.
    pub async fn commit_layout(&mut self, layout: SecretLayout, salt: Salt) -> Result<Commitment> {
        let session = self.refresh().await?.clone();
        session.check_commit(&self.active)?;
        if layout.kind() != session.kind {
            return Err(ClientError::InvalidLayout(format!(
                "{:?} layout cannot be committed to a {:?} session",
                layout.kind(),
                session.kind
            )));
        }
        layout.validate()?;

        let record = SecretRecord::seal(layout, salt)?;
        let commitment = record.commitment;
        self.live = PerIdentityState::with_secret(record);
        self.cache.save(self.session_id, &self.active, &self.live)?;

        let auth = self.authorize(Submission::Commit { session: self.session_id, commitment: &commitment })?;
        self.chain.submit_commit(self.session_id, &self.active, &commitment, &auth).await?;
        info!(session = self.session_id, identity = %self.active, %commitment, "commitment submitted");
        self.refresh().await?;
        Ok(commitment)
    }

    pub async fn submit_move(&mut self, action: Move) -> Result<()> {
        let session = self.refresh().await?.clone();
        session.check_move(&self.active, &action)?;
        let auth = self.authorize(Submission::Move { session: self.session_id, action: &action })?;
        self.chain.submit_move(self.session_id, &self.active, &action, &auth).await?;
        info!(session = self.session_id, identity = %self.active, %action, "move submitted");
        self.refresh().await?;
        Ok(())
    }

    pub async fn fire(&mut self, target: Position) -> Result<()> {
        self.submit_move(Move::Shot(target)).await
    }

    pub async fn guess(&mut self, word: Word) -> Result<()> {
        self.submit_move(Move::Guess(word)).await
    }

    /// Computes, proves and submits the outcome of the move pending against
    /// the active identity.
    pub async fn resolve_pending(&mut self) -> Result<ResolveReport> {
        let session = self.refresh().await?.clone();
        let pending = session.pending.clone().ok_or(RuleViolation::NoPendingMove)?;

        let Some(_ticket) = self.in_flight.try_acquire(session.id) else {
            info!(session = session.id, "resolution already in flight, coalescing");
            return Ok(ResolveReport::Coalesced);
        };

        let secret = self.live.secret(&session, &self.active)?.clone();
        let outcome = match (&secret.layout, &pending.action) {
            (SecretLayout::Fleet(fleet), Move::Shot(target)) => {
                shot_outcome(fleet, *target, &self.live.prior_hit_positions())
            }
            (SecretLayout::Word(word), Move::Guess(guess)) => guess_outcome(guess, word),
            _ => {
                return Err(ClientError::InvalidLayout(format!(
                    "cached {:?} secret cannot answer a {:?} move",
                    secret.layout.kind(),
                    pending.action.kind()
                )))
            }
        };
        session.check_resolution(&self.active, &outcome)?;

        let chain_commitment = *session
            .commitment_of(&self.active)
            .ok_or(RuleViolation::NotCommitted)?;
        if secret.commitment != chain_commitment {
            return Err(ClientError::CommitmentMismatch { local: secret.commitment, chain: chain_commitment });
        }
        let pi_hash = binding_hash(
            session.id,
            &self.active,
            &pending.mover,
            &pending.action,
            &outcome,
            &chain_commitment,
        )
        .ok_or(RuleViolation::OutcomeMismatch)?;

        let prior = self.live.prior_outcome_bits(&secret.layout);
        let witness = witness::build(
            &secret.layout,
            &secret.salt,
            &prior,
            &pending.action,
            &outcome,
            &chain_commitment,
            &pi_hash,
        )?;
        let artifact = self.config.artifacts.for_kind(session.kind);
        let output = self.prover.prove(&witness, artifact).await?;

        let bytes = payload::serialize(session.kind, &output.proof, &output.public_signals)?;
        let parts = payload::parse(&bytes)?;
        payload::check_binding(&parts.signals, &chain_commitment, &pi_hash)?;

        let auth = self.authorize(Submission::Resolve {
            session: session.id,
            outcome: &outcome,
            payload: &bytes,
            pi_hash: &pi_hash,
        })?;
        self.chain
            .submit_resolution(session.id, &self.active, &outcome, &bytes, &pi_hash, &auth)
            .await?;
        info!(
            session = session.id,
            identity = %self.active,
            action = %pending.action,
            outcome = ?outcome,
            payload_bytes = bytes.len(),
            "resolution submitted"
        );
        self.refresh().await?;
        Ok(ResolveReport::Resolved(outcome))
    }

    /// Makes `name` the active identity. The outgoing identity's state is
    /// saved under its own key and the incoming one's restored from its
    /// key, or started empty.
    pub async fn switch_identity(&mut self, name: &str) -> Result<Address> {
        let incoming = self.keys.resolve(name)?;
        if incoming == self.active {
            return Ok(incoming);
        }
        if self.live.secret.is_some() {
            self.cache.save(self.session_id, &self.active, &self.live)?;
        }
        self.live = self.cache.load(self.session_id, &incoming)?.unwrap_or_default();
        let outgoing = std::mem::replace(&mut self.active, incoming.clone());
        self.auto_resolve_paused = false;
        info!(session = self.session_id, from = %outgoing, to = %incoming, "switched identity");
        if let Some(session) = &self.session {
            self.live.reconcile(session, &self.active);
        }
        Ok(incoming)
    }

    /// Snapshot of the active identity's secrets for another device.
    pub fn export_secret(&mut self) -> Result<String> {
        self.cache.export(self.session_id, &self.active)
    }

    /// Restores a snapshot made by [`export_secret`](Self::export_secret).
    /// It must match the commitment already on chain, if there is one.
    pub fn import_secret(&mut self, snapshot: &str) -> Result<()> {
        let state: PerIdentityState = serde_json::from_str(snapshot)?;
        let chain = self.session.as_ref().and_then(|s| s.commitment_of(&self.active)).copied();
        if let (Some(secret), Some(chain)) = (&state.secret, chain) {
            if secret.commitment != chain {
                return Err(ClientError::CommitmentMismatch { local: secret.commitment, chain });
            }
        }
        self.cache.import(self.session_id, &self.active, snapshot)?;
        self.live = state;
        if let Some(session) = &self.session {
            self.live.reconcile(session, &self.active);
        }
        info!(session = self.session_id, identity = %self.active, "imported secret snapshot");
        Ok(())
    }

    /// Drops the identity's cached state for this session.
    pub fn discard_identity(&mut self, name: &str) -> Result<Address> {
        let identity = self.keys.resolve(name)?;
        self.cache.remove(self.session_id, &identity)?;
        if identity == self.active {
            self.live = PerIdentityState::default();
        }
        Ok(identity)
    }

    /// The one decision this event leads to for the active identity.
    pub fn dispatch(&self, event: Event) -> Decision {
        let decision = match &self.session {
            None => Decision::Wait,
            Some(session) => decide(session, &self.active, &self.in_flight),
        };
        debug!(?event, ?decision, identity = %self.active, "dispatched");
        decision
    }

    /// Dispatches `event` and acts on it when the decision is an automatic
    /// one. Returns the decision that holds afterwards.
    pub async fn handle(&mut self, event: Event) -> Result<Decision> {
        let decision = self.dispatch(event);
        if decision != Decision::Resolve || !self.auto_resolve || self.auto_resolve_paused {
            return Ok(decision);
        }
        match self.resolve_pending().await {
            Ok(ResolveReport::Resolved(_)) => Ok(self.dispatch(Event::Submitted)),
            Ok(ResolveReport::Coalesced) => Ok(decision),
            Err(e) => {
                // Retried only on an explicit Resolve command.
                self.auto_resolve_paused = true;
                warn!(session = self.session_id, error = %e, "automatic resolution failed, pausing it");
                Err(e)
            }
        }
    }

    /// Runs one user command.
    pub async fn execute(&mut self, command: Command) -> Result<Notice> {
        Ok(match command {
            Command::Commit { layout, salt } => Notice::Committed(self.commit_layout(layout, salt).await?),
            Command::Fire(target) => {
                self.fire(target).await?;
                Notice::MoveSubmitted(Move::Shot(target))
            }
            Command::Guess(word) => {
                self.guess(word).await?;
                Notice::MoveSubmitted(Move::Guess(word))
            }
            Command::Resolve => {
                self.auto_resolve_paused = false;
                match self.resolve_pending().await? {
                    ResolveReport::Resolved(outcome) => Notice::Resolved(outcome),
                    ResolveReport::Coalesced => Notice::Coalesced,
                }
            }
            Command::SwitchIdentity(name) => Notice::Switched(self.switch_identity(&name).await?),
            Command::Export => Notice::Exported(self.export_secret()?),
            Command::Import(snapshot) => {
                self.import_secret(&snapshot)?;
                Notice::Imported
            }
            Command::Discard(name) => Notice::Discarded(self.discard_identity(&name)?),
            Command::Refresh => {
                self.refresh().await?;
                Notice::Refreshed
            }
            Command::Show => {
                let session = self.refresh().await?.clone();
                Notice::View(visualize::session_view(&session, &self.live, &self.active))
            }
        })
    }

    /// Polls on the configured interval and runs commands until shutdown,
    /// until the command channel closes, or until the session ends.
    pub async fn run(
        &mut self,
        mut commands: mpsc::Receiver<Command>,
        mut shutdown: watch::Receiver<bool>,
        notices: mpsc::UnboundedSender<Notice>,
    ) -> Result<()> {
        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last: Option<Decision> = None;
        info!(session = self.session_id, identity = %self.active, "coordinator started");

        loop {
            let event = tokio::select! {
                _ = shutdown.changed() => {
                    info!(session = self.session_id, "shutdown requested");
                    break;
                }
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    let switched = matches!(command, Command::SwitchIdentity(_));
                    match self.execute(command).await {
                        Ok(notice) => {
                            let _ = notices.send(notice);
                        }
                        Err(e) => {
                            let _ = notices.send(Notice::Failed(e.to_string()));
                            continue;
                        }
                    }
                    if switched { Event::IdentitySwitched } else { Event::Submitted }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh().await {
                        let _ = notices.send(Notice::Failed(e.to_string()));
                        continue;
                    }
                    Event::Polled
                }
            };

            let decision = match self.handle(event).await {
                Ok(decision) => decision,
                Err(e) => {
                    let _ = notices.send(Notice::Failed(e.to_string()));
                    continue;
                }
            };
            if last.as_ref() != Some(&decision) {
                let _ = notices.send(Notice::Decision(decision.clone()));
                last = Some(decision.clone());
            }
            if let Decision::Finished { winner } = decision {
                info!(session = self.session_id, winner = ?winner, "session ended, polling stopped");
                break;
            }
        }
        Ok(())
    }
}

fn decide(session: &Session, me: &Address, in_flight: &InFlight) -> Decision {
    if session.phase == Phase::Ended {
        return Decision::Finished { winner: session.winner.clone() };
    }
    let Some(seat) = session.seat_of(me) else {
        return Decision::Spectate;
    };
    match session.phase {
        Phase::AwaitingCommit => {
            if session.must_commit(seat) && session.commitments[seat.index()].is_none() {
                Decision::Commit
            } else {
                Decision::Wait
            }
        }
        _ => {
            if session.awaiting_resolution_by() == Some(me) {
                if in_flight.is_active(session.id) {
                    Decision::Wait
                } else {
                    Decision::Resolve
                }
            } else if session.pending.is_none() && session.is_turn_of(me) {
                Decision::Move
            } else {
                Decision::Wait
            }
        }
    }
}

// Ledger access.
//
// The chain owns the canonical session; the client only reads it and
// submits signed actions. `HttpChainClient` talks to a JSON gateway in front
// of the contracts, `LocalLedger` (see `ledger.rs`) runs the same rules in
// process.

use base64::{engine::general_purpose, Engine as _};
use duel_core::{Address, Commitment, GameKind, Move, Outcome, Session, SessionId};
use reqwest::StatusCode;
use tracing::{debug, info};

use crate::chain_protocol::{
    CommitRequest, MoveRequest, OpenRequest, OpenResponse, ResolveRequest, SessionDto, SubmitResponse,
};
use crate::error::{ClientError, Result};
use crate::wallet::Authorization;

#[allow(async_fn_in_trait)]
pub trait ChainClient {
    async fn open_session(
        &self,
        kind: GameKind,
        player1: &Address,
        player2: &Address,
        auth: &Authorization,
    ) -> Result<SessionId>;

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>>;

    async fn submit_commit(
        &self,
        id: SessionId,
        identity: &Address,
        commitment: &Commitment,
        auth: &Authorization,
    ) -> Result<()>;

    async fn submit_move(&self, id: SessionId, identity: &Address, action: &Move, auth: &Authorization) -> Result<()>;

    async fn submit_resolution(
        &self,
        id: SessionId,
        identity: &Address,
        outcome: &Outcome,
        payload: &[u8],
        pi_hash: &[u8; 32],
        auth: &Authorization,
    ) -> Result<()>;
}

/// An action as the signer sees it. Both sides derive the signed bytes from
/// this, so the ledger can check an authorization against what it received.
#[derive(Debug, Clone, Copy)]
pub enum Submission<'a> {
    Open { kind: GameKind, player1: &'a Address, player2: &'a Address },
    Commit { session: SessionId, commitment: &'a Commitment },
    Move { session: SessionId, action: &'a Move },
    Resolve { session: SessionId, outcome: &'a Outcome, payload: &'a [u8], pi_hash: &'a [u8; 32] },
}

fn push_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
}

impl Submission<'_> {
    /// Length-prefixed, tagged encoding of the action and the submitting
    /// identity.
    pub fn canonical_bytes(&self, identity: &Address) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Submission::Open { kind, player1, player2 } => {
                push_str(&mut out, "duel/open");
                push_str(&mut out, identity.as_str());
                out.push(match kind {
                    GameKind::Battleship => 0,
                    GameKind::Wordle => 1,
                });
                push_str(&mut out, player1.as_str());
                push_str(&mut out, player2.as_str());
            }
            Submission::Commit { session, commitment } => {
                push_str(&mut out, "duel/commit");
                push_str(&mut out, identity.as_str());
                out.extend_from_slice(&session.to_be_bytes());
                out.extend_from_slice(commitment.as_bytes());
            }
            Submission::Move { session, action } => {
                push_str(&mut out, "duel/move");
                push_str(&mut out, identity.as_str());
                out.extend_from_slice(&session.to_be_bytes());
                match action {
                    Move::Shot(p) => {
                        out.push(0);
                        out.extend_from_slice(&p.x.to_be_bytes());
                        out.extend_from_slice(&p.y.to_be_bytes());
                    }
                    Move::Guess(w) => {
                        out.push(1);
                        out.extend_from_slice(w.letters());
                    }
                }
            }
            Submission::Resolve { session, outcome, payload, pi_hash } => {
                push_str(&mut out, "duel/resolve");
                push_str(&mut out, identity.as_str());
                out.extend_from_slice(&session.to_be_bytes());
                match outcome {
                    Outcome::Shot { hit, sunk } => {
                        out.push(0);
                        out.push(*hit as u8);
                        out.extend_from_slice(&sunk.map(|s| s.id()).unwrap_or(0).to_be_bytes());
                    }
                    Outcome::Guess { feedback, is_correct } => {
                        out.push(1);
                        out.extend(feedback.iter().map(|s| s.as_u32() as u8));
                        out.push(*is_correct as u8);
                    }
                }
                out.extend_from_slice(*pi_hash);
                out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
                out.extend_from_slice(payload);
            }
        }
        out
    }
}

pub struct HttpChainClient {
    base: String,
    http: reqwest::Client,
}

impl HttpChainClient {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into().trim_end_matches('/').to_string(), http: reqwest::Client::new() }
    }

    async fn post<T: serde::Serialize>(&self, path: &str, body: &T) -> Result<()> {
        let url = format!("{}{}", self.base, path);
        debug!(%url, "submitting to gateway");
        let response = self.http.post(&url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::ChainSubmissionFailure(format!("{} returned {}: {}", url, status, text)));
        }
        let reply: SubmitResponse = response.json().await?;
        if reply.accepted {
            Ok(())
        } else {
            let why = reply.error.into_option().unwrap_or_else(|| "rejected".to_string());
            Err(ClientError::ChainSubmissionFailure(why))
        }
    }
}

impl ChainClient for HttpChainClient {
    async fn open_session(
        &self,
        kind: GameKind,
        player1: &Address,
        player2: &Address,
        auth: &Authorization,
    ) -> Result<SessionId> {
        let body = OpenRequest {
            kind,
            player1: player1.to_string(),
            player2: player2.to_string(),
            auth: auth.clone(),
        };
        let url = format!("{}/sessions", self.base);
        let response = self.http.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::ChainSubmissionFailure(format!("{} returned {}: {}", url, status, text)));
        }
        let opened: OpenResponse = response.json().await?;
        info!(session = opened.session, ?kind, "opened session");
        Ok(opened.session)
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>> {
        let url = format!("{}/sessions/{}", self.base, id);
        let response = self.http.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        let dto: SessionDto = response.json().await?;
        Ok(Some(Session::try_from(dto)?))
    }

    async fn submit_commit(
        &self,
        id: SessionId,
        identity: &Address,
        commitment: &Commitment,
        auth: &Authorization,
    ) -> Result<()> {
        let body = CommitRequest {
            identity: identity.to_string(),
            commitment: commitment.to_hex(),
            auth: auth.clone(),
        };
        self.post(&format!("/sessions/{}/commit", id), &body).await
    }

    async fn submit_move(&self, id: SessionId, identity: &Address, action: &Move, auth: &Authorization) -> Result<()> {
        let body = MoveRequest { identity: identity.to_string(), action: action.into(), auth: auth.clone() };
        self.post(&format!("/sessions/{}/move", id), &body).await
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
        let body = ResolveRequest {
            identity: identity.to_string(),
            outcome: outcome.into(),
            payload: general_purpose::STANDARD.encode(payload),
            pi_hash: hex::encode(pi_hash),
            auth: auth.clone(),
        };
        self.post(&format!("/sessions/{}/resolve", id), &body).await
    }
}

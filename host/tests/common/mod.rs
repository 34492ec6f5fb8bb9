// Shared fixtures for the integration suites.

#![allow(dead_code)]

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use duel_core::{Address, Direction, Fleet, GameKind, Position, SessionId, ShipType};
use duel_host::cache::IdentityCache;
use duel_host::config::{CircuitArtifact, ClientConfig};
use duel_host::coordinator::{open_session, SessionCoordinator};
use duel_host::error::{ClientError, Result};
use duel_host::ledger::LocalLedger;
use duel_host::proofs::{DevProver, Prover, ProverOutput};
use duel_host::wallet::{Ed25519Signer, KeyBook};
use duel_host::witness::WitnessInput;

/// Dev prover that counts calls and can be told to fail.
#[derive(Clone, Default)]
pub struct CountingProver {
    calls: Rc<Cell<usize>>,
    fail: Rc<Cell<bool>>,
}

impl CountingProver {
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.set(fail);
    }
}

impl Prover for CountingProver {
    async fn prove(&self, witness: &WitnessInput, artifact: &CircuitArtifact) -> Result<ProverOutput> {
        self.calls.set(self.calls.get() + 1);
        if self.fail.get() {
            return Err(ClientError::ProofGenerationFailure("prover offline".into()));
        }
        DevProver.prove(witness, artifact).await
    }
}

pub fn key_book() -> KeyBook {
    let mut keys = KeyBook::new();
    keys.insert("alice", Ed25519Signer::from_bytes(&[1u8; 32]));
    keys.insert("bob", Ed25519Signer::from_bytes(&[2u8; 32]));
    keys
}

pub fn address(label: &str) -> Address {
    key_book().resolve(label).unwrap()
}

pub fn temp_dir(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("duel-{}-{}", tag, uuid::Uuid::new_v4()))
}

pub fn config(cache_dir: PathBuf) -> ClientConfig {
    ClientConfig { cache_dir, poll_retries: 1, ..ClientConfig::default() }
}

/// Carrier..Destroyer on rows 0, 2, 4, 6, 8 starting at column 0.
pub fn stacked_fleet() -> Fleet {
    let mut fleet = Fleet::new();
    for (i, ship) in ShipType::ALL.into_iter().enumerate() {
        assert!(fleet.place_ship(ship, Position::new(0, 2 * i as u32), Direction::Horizontal));
    }
    fleet
}

/// Carrier..Destroyer in columns 9, 7, 5, 3, 1 starting at row 0.
pub fn column_fleet() -> Fleet {
    let mut fleet = Fleet::new();
    for (i, ship) in ShipType::ALL.into_iter().enumerate() {
        assert!(fleet.place_ship(ship, Position::new(9 - 2 * i as u32, 0), Direction::Vertical));
    }
    fleet
}

pub struct Table {
    pub ledger: LocalLedger,
    pub prover: CountingProver,
    pub session: SessionId,
    pub cache_dir: PathBuf,
    pub coordinator: SessionCoordinator<LocalLedger, CountingProver>,
}

/// Opens a session between alice (player 1) and bob on a fresh ledger and
/// returns one client holding both identities, alice active.
pub async fn table(kind: GameKind) -> Table {
    let ledger = LocalLedger::new();
    let keys = key_book();
    let (alice, bob) = (address("alice"), address("bob"));
    let session = open_session(&ledger, keys.get(&alice).unwrap(), kind, &alice, &bob).await.unwrap();

    let prover = CountingProver::default();
    let cache_dir = temp_dir("table");
    let cache = IdentityCache::open(&cache_dir).unwrap();
    let coordinator =
        SessionCoordinator::new(ledger.clone(), prover.clone(), keys, cache, config(cache_dir.clone()), session, "alice")
            .unwrap();
    Table { ledger, prover, session, cache_dir, coordinator }
}

// Durable per-identity secret cache.
//
// Layout on disk:
//
//   <cache_dir>/client_id                     this client's UUID
//   <cache_dir>/<client_id>/<session>/<identity>.json
//
// Entries are keyed by (session, identity) and nothing else, so a lookup
// can never return another identity's secrets. Every write goes through the
// in-memory map and is flushed to disk immediately via temp file + rename.
// The file is authoritative: a mirrored entry is served only while the file
// still has the modification time and length it had when the entry was
// recorded, so another instance over the same directory is never shadowed.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use duel_core::{Address, SessionId};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ClientError, Result};
use crate::local_state::PerIdentityState;

const CLIENT_ID_FILE: &str = "client_id";

/// File modification time and length.
type Stamp = (Option<SystemTime>, u64);

pub struct IdentityCache {
    client_id: Uuid,
    root: PathBuf,
    entries: HashMap<(SessionId, Address), (Stamp, PerIdentityState)>,
}

impl IdentityCache {
    /// Opens the cache under `cache_dir`, creating this client's id on first
    /// use.
    pub fn open(cache_dir: &Path) -> Result<Self> {
        fs::create_dir_all(cache_dir)?;
        let id_path = cache_dir.join(CLIENT_ID_FILE);
        let client_id = match fs::read_to_string(&id_path) {
            Ok(text) => Uuid::parse_str(text.trim())
                .map_err(|e| ClientError::Storage(format!("corrupt client id in {}: {}", id_path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let id = Uuid::new_v4();
                write_atomic(&id_path, id.to_string().as_bytes())?;
                info!(client_id = %id, "created new client id");
                id
            }
            Err(e) => return Err(e.into()),
        };
        Self::with_client_id(cache_dir, client_id)
    }

    /// Opens the cache for an explicit client id. Two ids never see each
    /// other's entries even when they share `cache_dir`.
    pub fn with_client_id(cache_dir: &Path, client_id: Uuid) -> Result<Self> {
        let root = cache_dir.join(client_id.to_string());
        fs::create_dir_all(&root)?;
        Ok(Self { client_id, root, entries: HashMap::new() })
    }

    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    fn path_for(&self, session: SessionId, identity: &Address) -> PathBuf {
        self.root
            .join(session.to_string())
            .join(format!("{}.json", file_stem(identity)))
    }

    pub fn save(&mut self, session: SessionId, identity: &Address, state: &PerIdentityState) -> Result<()> {
        let path = self.path_for(session, identity);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_vec_pretty(state)?;
        write_atomic(&path, &json)?;
        self.entries.insert((session, identity.clone()), (stamp(&fs::metadata(&path)?), state.clone()));
        debug!(session, identity = %identity, "saved identity state");
        Ok(())
    }

    pub fn load(&mut self, session: SessionId, identity: &Address) -> Result<Option<PerIdentityState>> {
        let key = (session, identity.clone());
        let path = self.path_for(session, identity);
        let current = match fs::metadata(&path) {
            Ok(meta) => stamp(&meta),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.entries.remove(&key);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        if let Some((seen, state)) = self.entries.get(&key) {
            if seen.0.is_some() && *seen == current {
                return Ok(Some(state.clone()));
            }
        }
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.entries.remove(&key);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let state: PerIdentityState = serde_json::from_slice(&bytes)?;
        self.entries.insert(key, (current, state.clone()));
        Ok(Some(state))
    }

    pub fn remove(&mut self, session: SessionId, identity: &Address) -> Result<()> {
        self.entries.remove(&(session, identity.clone()));
        match fs::remove_file(self.path_for(session, identity)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        info!(session, identity = %identity, "discarded identity state");
        Ok(())
    }

    /// Snapshot for moving a commitment's secrets to another device.
    pub fn export(&mut self, session: SessionId, identity: &Address) -> Result<String> {
        let state = self.load(session, identity)?.ok_or_else(|| ClientError::MissingSecret {
            session,
            identity: identity.to_string(),
        })?;
        Ok(serde_json::to_string(&state)?)
    }

    /// Inverse of [`export`](Self::export). Refuses snapshots without a
    /// secret, and snapshots whose secret does not hash to its recorded
    /// commitment.
    pub fn import(&mut self, session: SessionId, identity: &Address, snapshot: &str) -> Result<()> {
        let state: PerIdentityState = serde_json::from_str(snapshot)?;
        let secret = state.secret.as_ref().ok_or_else(|| ClientError::MissingSecret {
            session,
            identity: identity.to_string(),
        })?;
        let local = duel_core::commit(&secret.layout, &secret.salt)?;
        if local != secret.commitment {
            return Err(ClientError::CommitmentMismatch { local, chain: secret.commitment });
        }
        self.save(session, identity, &state)
    }
}

fn file_stem(identity: &Address) -> String {
    let s = identity.as_str();
    if !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        s.to_string()
    } else {
        format!("x{}", hex::encode(s.as_bytes()))
    }
}

fn stamp(meta: &fs::Metadata) -> Stamp {
    (meta.modified().ok(), meta.len())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_state::SecretRecord;
    use duel_core::{Salt, SecretLayout, Word};

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("duel-cache-{}-{}", tag, Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn word_state(word: &str, salt: u64) -> PerIdentityState {
        let layout = SecretLayout::Word(word.parse::<Word>().unwrap());
        PerIdentityState::with_secret(SecretRecord::seal(layout, Salt::from(salt)).unwrap())
    }

    #[test]
    fn load_under_another_identity_is_absent() {
        let dir = temp_dir("iso");
        let mut cache = IdentityCache::open(&dir).unwrap();
        let a = Address::new("alice");
        let b = Address::new("bob");

        cache.save(1, &a, &word_state("ALLOY", 1)).unwrap();
        assert!(cache.load(1, &a).unwrap().is_some());
        assert!(cache.load(1, &b).unwrap().is_none());
        assert!(cache.load(2, &a).unwrap().is_none());
    }

    #[test]
    fn survives_reopen_with_same_client_id() {
        let dir = temp_dir("reopen");
        let a = Address::new("alice");
        let state = word_state("CRANE", 4);
        let id = {
            let mut cache = IdentityCache::open(&dir).unwrap();
            cache.save(7, &a, &state).unwrap();
            cache.client_id()
        };
        let mut reopened = IdentityCache::open(&dir).unwrap();
        assert_eq!(reopened.client_id(), id);
        assert_eq!(reopened.load(7, &a).unwrap(), Some(state));
    }

    #[test]
    fn other_client_ids_do_not_share_entries() {
        let dir = temp_dir("clients");
        let a = Address::new("alice");
        let mut one = IdentityCache::with_client_id(&dir, Uuid::new_v4()).unwrap();
        let mut two = IdentityCache::with_client_id(&dir, Uuid::new_v4()).unwrap();
        one.save(1, &a, &word_state("ALLOY", 1)).unwrap();
        assert!(two.load(1, &a).unwrap().is_none());
    }

    #[test]
    fn writes_by_another_instance_are_seen() {
        let dir = temp_dir("shared");
        let a = Address::new("alice");
        let mut first = IdentityCache::open(&dir).unwrap();
        let mut second = IdentityCache::open(&dir).unwrap();
        assert_eq!(first.client_id(), second.client_id());

        first.save(5, &a, &word_state("ALLOY", 1)).unwrap();
        assert!(first.load(5, &a).unwrap().is_some());

        let mut newer = word_state("ALLOY", 1);
        newer.own_hits.extend([0, 3]);
        second.save(5, &a, &newer).unwrap();
        assert_eq!(first.load(5, &a).unwrap(), Some(newer));

        second.remove(5, &a).unwrap();
        assert!(first.load(5, &a).unwrap().is_none());
    }

    #[test]
    fn remove_discards_memory_and_disk() {
        let dir = temp_dir("remove");
        let a = Address::new("alice");
        let mut cache = IdentityCache::open(&dir).unwrap();
        cache.save(1, &a, &word_state("ALLOY", 1)).unwrap();
        cache.remove(1, &a).unwrap();
        assert!(cache.load(1, &a).unwrap().is_none());
        let mut reopened = IdentityCache::open(&dir).unwrap();
        assert!(reopened.load(1, &a).unwrap().is_none());
    }

    #[test]
    fn export_then_import_on_another_client() {
        let dir = temp_dir("backup");
        let a = Address::new("alice");
        let mut laptop = IdentityCache::with_client_id(&dir, Uuid::new_v4()).unwrap();
        let mut phone = IdentityCache::with_client_id(&dir, Uuid::new_v4()).unwrap();
        let state = word_state("ALLOY", 77);
        laptop.save(3, &a, &state).unwrap();

        let snapshot = laptop.export(3, &a).unwrap();
        phone.import(3, &a, &snapshot).unwrap();
        assert_eq!(phone.load(3, &a).unwrap(), Some(state));
    }

    #[test]
    fn import_rejects_tampered_snapshot() {
        let dir = temp_dir("tamper");
        let a = Address::new("alice");
        let mut cache = IdentityCache::open(&dir).unwrap();
        let mut state = word_state("ALLOY", 77);
        if let Some(secret) = state.secret.as_mut() {
            secret.salt = Salt::from(78);
        }
        let snapshot = serde_json::to_string(&state).unwrap();
        assert!(matches!(
            cache.import(3, &a, &snapshot),
            Err(ClientError::CommitmentMismatch { .. })
        ));
    }

    #[test]
    fn odd_identities_get_safe_file_names() {
        assert_eq!(file_stem(&Address::new("abc123")), "abc123");
        assert_eq!(file_stem(&Address::new("../x")), format!("x{}", hex::encode("../x")));
    }
}

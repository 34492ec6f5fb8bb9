// Local signing identities.
//
// An identity's address is the lowercase hex of its ed25519 verifying key,
// so anyone holding an authorization can check it without a key registry.
// What gets signed is sha256 of the submission's canonical bytes.

use std::collections::BTreeMap;
use std::path::Path;

use duel_core::Address;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::{ClientError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub signer: Address,
    /// Hex, 64 bytes.
    pub signature: String,
}

pub trait WalletSigner {
    fn address(&self) -> Address;
    fn sign(&self, message: &[u8]) -> Result<Authorization>;
}

pub struct Ed25519Signer {
    key: SigningKey,
    address: Address,
}

impl Ed25519Signer {
    pub fn from_bytes(secret: &[u8; 32]) -> Self {
        let key = SigningKey::from_bytes(secret);
        let address = Address::new(hex::encode(key.verifying_key().to_bytes()));
        Self { key, address }
    }

    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut secret = [0u8; 32];
        rng.fill_bytes(&mut secret);
        Self::from_bytes(&secret)
    }

    pub fn from_secret_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim()).map_err(|e| ClientError::Config(format!("bad secret key: {}", e)))?;
        let secret: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ClientError::Config("secret key must be 32 bytes".into()))?;
        Ok(Self::from_bytes(&secret))
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.key.to_bytes())
    }
}

fn digest(message: &[u8]) -> [u8; 32] {
    Sha256::digest(message).into()
}

impl WalletSigner for Ed25519Signer {
    fn address(&self) -> Address {
        self.address.clone()
    }

    fn sign(&self, message: &[u8]) -> Result<Authorization> {
        let signature = self.key.sign(&digest(message));
        Ok(Authorization { signer: self.address.clone(), signature: hex::encode(signature.to_bytes()) })
    }
}

/// Checks that `auth` is `expected`'s signature over `message`.
pub fn verify(auth: &Authorization, expected: &Address, message: &[u8]) -> Result<()> {
    let reject = |why: &str| ClientError::ChainSubmissionFailure(format!("authorization rejected: {}", why));
    if auth.signer != *expected {
        return Err(reject("signer is not the submitting identity"));
    }
    let key_bytes: [u8; 32] = hex::decode(expected.as_str())
        .ok()
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| reject("address is not an ed25519 key"))?;
    let key = VerifyingKey::from_bytes(&key_bytes).map_err(|_| reject("address is not an ed25519 key"))?;
    let sig_bytes = hex::decode(&auth.signature).map_err(|_| reject("signature is not hex"))?;
    let signature = Signature::from_slice(&sig_bytes).map_err(|_| reject("malformed signature"))?;
    key.verify(&digest(message), &signature).map_err(|_| reject("bad signature"))
}

/// Several local identities sharing one client, by label.
#[derive(Default)]
pub struct KeyBook {
    signers: BTreeMap<Address, Ed25519Signer>,
    labels: BTreeMap<String, Address>,
}

impl KeyBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: impl Into<String>, signer: Ed25519Signer) -> Address {
        let address = signer.address();
        self.labels.insert(label.into(), address.clone());
        self.signers.insert(address.clone(), signer);
        address
    }

    pub fn get(&self, identity: &Address) -> Result<&Ed25519Signer> {
        self.signers
            .get(identity)
            .ok_or_else(|| ClientError::UnknownIdentity(identity.to_string()))
    }

    /// Accepts either a label or a full address.
    pub fn resolve(&self, name: &str) -> Result<Address> {
        if let Some(address) = self.labels.get(name) {
            return Ok(address.clone());
        }
        let address = Address::new(name);
        if self.signers.contains_key(&address) {
            Ok(address)
        } else {
            Err(ClientError::UnknownIdentity(name.to_string()))
        }
    }

    pub fn label_of(&self, identity: &Address) -> Option<&str> {
        self.labels.iter().find(|(_, a)| *a == identity).map(|(l, _)| l.as_str())
    }

    pub fn identities(&self) -> impl Iterator<Item = (&str, &Address)> {
        self.labels.iter().map(|(l, a)| (l.as_str(), a))
    }

    /// Reads `{ "label": "<secret hex>" }`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let entries: BTreeMap<String, String> = serde_json::from_str(&text)?;
        let mut book = Self::new();
        for (label, secret) in entries {
            book.insert(label, Ed25519Signer::from_secret_hex(&secret)?);
        }
        info!(path = %path.display(), identities = book.labels.len(), "loaded key book");
        Ok(book)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let entries: BTreeMap<&str, String> = self
            .labels
            .iter()
            .filter_map(|(l, a)| self.signers.get(a).map(|s| (l.as_str(), s.secret_hex())))
            .collect();
        std::fs::write(path, serde_json::to_vec_pretty(&entries)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn signatures_verify_for_the_signer_only() {
        let mut rng = StdRng::seed_from_u64(3);
        let alice = Ed25519Signer::generate(&mut rng);
        let bob = Ed25519Signer::generate(&mut rng);

        let auth = alice.sign(b"commit 1").unwrap();
        verify(&auth, &alice.address(), b"commit 1").unwrap();
        assert!(verify(&auth, &alice.address(), b"commit 2").is_err());
        assert!(verify(&auth, &bob.address(), b"commit 1").is_err());
    }

    #[test]
    fn address_is_hex_verifying_key() {
        let signer = Ed25519Signer::from_bytes(&[7u8; 32]);
        assert_eq!(signer.address().as_str().len(), 64);
        let again = Ed25519Signer::from_secret_hex(&signer.secret_hex()).unwrap();
        assert_eq!(again.address(), signer.address());
    }

    #[test]
    fn key_book_resolves_labels_and_addresses() {
        let mut book = KeyBook::new();
        let a = book.insert("alice", Ed25519Signer::from_bytes(&[1u8; 32]));
        assert_eq!(book.resolve("alice").unwrap(), a);
        assert_eq!(book.resolve(a.as_str()).unwrap(), a);
        assert_eq!(book.label_of(&a), Some("alice"));
        assert!(matches!(book.resolve("carol"), Err(ClientError::UnknownIdentity(_))));
        assert!(book.get(&Address::new("nobody")).is_err());
    }

    #[test]
    fn key_book_file_round_trip() {
        let path = std::env::temp_dir().join(format!("duel-keys-{}.json", uuid::Uuid::new_v4()));
        let mut book = KeyBook::new();
        let a = book.insert("alice", Ed25519Signer::from_bytes(&[1u8; 32]));
        book.save(&path).unwrap();
        let loaded = KeyBook::load(&path).unwrap();
        assert_eq!(loaded.resolve("alice").unwrap(), a);
    }
}

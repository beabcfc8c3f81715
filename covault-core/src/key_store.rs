//! Key-store collaborator interface
//!
//! The workflow never touches private key material. Everything it needs
//! from the wallet's key storage is expressed through [`KeyStore`]: whether
//! a designated public key is controlled locally, and a signature over a
//! digest for a key that is.
//!
//! # Security Boundaries
//!
//! Implementations hold the secrets; this crate only ever sees public keys
//! and produced signatures. [`MemoryKeyStore`] is an in-process
//! implementation for tests and single-machine runs; production wallets
//! bind this trait to their own (typically encrypted) key storage.

use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::secp256k1::{All, Message, Secp256k1, SecretKey};
use bitcoin::PublicKey;
use std::collections::HashMap;

/// Access to the wallet's signing capability
pub trait KeyStore {
    /// Does the wallet hold the private key for this public key?
    fn is_mine(&self, key: &PublicKey) -> bool;

    /// Produce an ECDSA signature over `digest` with the private key behind
    /// `key`, or `None` when the key is not local
    fn sign(&self, key: &PublicKey, digest: &Message) -> Option<Signature>;
}

/// In-memory key store
///
/// Keys live unencrypted in process memory, which is acceptable for tests
/// and throwaway regtest wallets only.
pub struct MemoryKeyStore {
    secp: Secp256k1<All>,
    keys: HashMap<PublicKey, SecretKey>,
}

impl MemoryKeyStore {
    /// Create an empty key store
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
            keys: HashMap::new(),
        }
    }

    /// Add a private key, returning its compressed public key
    pub fn add_key(&mut self, secret: SecretKey) -> PublicKey {
        let public = PublicKey::new(secret.public_key(&self.secp));
        self.keys.insert(public, secret);
        public
    }

    /// Public keys this store can sign for
    pub fn public_keys(&self) -> Vec<PublicKey> {
        self.keys.keys().copied().collect()
    }
}

impl Default for MemoryKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStore for MemoryKeyStore {
    fn is_mine(&self, key: &PublicKey) -> bool {
        self.keys.contains_key(key)
    }

    fn sign(&self, key: &PublicKey, digest: &Message) -> Option<Signature> {
        let secret = self.keys.get(key)?;
        Some(self.secp.sign_ecdsa(digest, secret))
    }
}

use std::collections::BTreeMap;

use allyd_primitives::{hash160, OutputOwners, ShortId};
use secp256k1::{PublicKey, SecretKey};

use crate::secp::secp256k1_sign;

pub fn address_of(public_key: &PublicKey) -> ShortId {
    hash160(&public_key.serialize())
}

/// Secret keys indexed by the address they control.
#[derive(Clone, Default)]
pub struct Keychain {
    keys: BTreeMap<ShortId, SecretKey>,
}

impl Keychain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_keys(keys: impl IntoIterator<Item = SecretKey>) -> Self {
        let mut keychain = Self::new();
        for key in keys {
            keychain.add(key);
        }
        keychain
    }

    pub fn add(&mut self, key: SecretKey) -> ShortId {
        let address = address_of(&PublicKey::from_secret_key(secp256k1_sign(), &key));
        self.keys.insert(address, key);
        address
    }

    pub fn get(&self, address: &ShortId) -> Option<&SecretKey> {
        self.keys.get(address)
    }

    /// Controlled addresses, ascending.
    pub fn addresses(&self) -> Vec<ShortId> {
        self.keys.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Picks the lowest `threshold` owner indices this keychain can sign for,
    /// or `None` when the owner is still timelocked at `time` or out of reach.
    pub fn match_owners(
        &self,
        owners: &OutputOwners,
        time: u64,
    ) -> Option<(Vec<u32>, Vec<SecretKey>)> {
        if owners.locktime > time {
            return None;
        }
        let threshold = owners.threshold as usize;
        let mut indices = Vec::with_capacity(threshold);
        let mut keys = Vec::with_capacity(threshold);
        for (index, address) in owners.addresses.iter().enumerate() {
            if indices.len() == threshold {
                break;
            }
            if let Some(key) = self.keys.get(address) {
                indices.push(u32::try_from(index).ok()?);
                keys.push(*key);
            }
        }
        (indices.len() == threshold).then_some((indices, keys))
    }
}

impl std::fmt::Debug for Keychain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keychain")
            .field("addresses", &self.addresses())
            .finish()
    }
}

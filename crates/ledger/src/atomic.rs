//! Cross-chain shared memory used by import and export transactions.
//!
//! Each ordered pair of chains has its own inbox: a chain puts elements
//! into a peer's inbox and reads or removes elements from its own.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use allyd_primitives::Id;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AtomicError {
    MissingKey { peer_chain: Id, key: Vec<u8> },
    Poisoned,
}

impl std::fmt::Display for AtomicError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AtomicError::MissingKey { peer_chain, key } => write!(
                f,
                "shared memory from {peer_chain} has no element {}",
                hex_key(key)
            ),
            AtomicError::Poisoned => write!(f, "shared memory lock poisoned"),
        }
    }
}

impl std::error::Error for AtomicError {}

/// Writes one chain makes against one peer.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AtomicRequests {
    /// Elements put into the peer's inbox.
    pub puts: Vec<(Vec<u8>, Vec<u8>)>,
    /// Keys removed from this chain's inbox from the peer.
    pub removes: Vec<Vec<u8>>,
}

impl AtomicRequests {
    pub fn is_empty(&self) -> bool {
        self.puts.is_empty() && self.removes.is_empty()
    }
}

pub trait SharedMemory: Send + Sync {
    /// Values sent by `peer_chain` under `keys`, in key order given.
    fn get(&self, peer_chain: &Id, keys: &[Vec<u8>]) -> Result<Vec<Vec<u8>>, AtomicError>;

    /// Applies every request or none of them.
    fn apply(&self, requests: &BTreeMap<Id, AtomicRequests>) -> Result<(), AtomicError>;
}

type Inboxes = BTreeMap<(Id, Id), BTreeMap<Vec<u8>, Vec<u8>>>;

/// In-process shared memory. Handles created with [`MemorySharedMemory::for_chain`]
/// share the same inboxes.
#[derive(Clone)]
pub struct MemorySharedMemory {
    chain_id: Id,
    /// (source, destination) -> key -> value.
    inboxes: Arc<Mutex<Inboxes>>,
}

impl MemorySharedMemory {
    pub fn new(chain_id: Id) -> Self {
        Self {
            chain_id,
            inboxes: Arc::default(),
        }
    }

    /// A handle for another chain over the same memory.
    pub fn for_chain(&self, chain_id: Id) -> Self {
        Self {
            chain_id,
            inboxes: Arc::clone(&self.inboxes),
        }
    }

    pub fn chain_id(&self) -> Id {
        self.chain_id
    }
}

impl SharedMemory for MemorySharedMemory {
    fn get(&self, peer_chain: &Id, keys: &[Vec<u8>]) -> Result<Vec<Vec<u8>>, AtomicError> {
        let inboxes = self.inboxes.lock().map_err(|_| AtomicError::Poisoned)?;
        let inbox = inboxes.get(&(*peer_chain, self.chain_id));
        keys.iter()
            .map(|key| {
                inbox
                    .and_then(|inbox| inbox.get(key))
                    .cloned()
                    .ok_or_else(|| AtomicError::MissingKey {
                        peer_chain: *peer_chain,
                        key: key.clone(),
                    })
            })
            .collect()
    }

    fn apply(&self, requests: &BTreeMap<Id, AtomicRequests>) -> Result<(), AtomicError> {
        let mut inboxes = self.inboxes.lock().map_err(|_| AtomicError::Poisoned)?;
        for (peer_chain, request) in requests {
            let inbox = inboxes.get(&(*peer_chain, self.chain_id));
            for key in &request.removes {
                if !inbox.is_some_and(|inbox| inbox.contains_key(key)) {
                    return Err(AtomicError::MissingKey {
                        peer_chain: *peer_chain,
                        key: key.clone(),
                    });
                }
            }
        }
        for (peer_chain, request) in requests {
            if let Some(inbox) = inboxes.get_mut(&(*peer_chain, self.chain_id)) {
                for key in &request.removes {
                    inbox.remove(key);
                }
            }
            if !request.puts.is_empty() {
                let outbox = inboxes.entry((self.chain_id, *peer_chain)).or_default();
                for (key, value) in &request.puts {
                    outbox.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(())
    }
}

fn hex_key(key: &[u8]) -> String {
    key.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exported_elements_reach_only_the_destination() {
        let x_chain = MemorySharedMemory::new(Id([1; 32]));
        let p_chain = x_chain.for_chain(Id([2; 32]));
        let other = x_chain.for_chain(Id([3; 32]));

        let mut requests = BTreeMap::new();
        requests.insert(
            p_chain.chain_id(),
            AtomicRequests {
                puts: vec![(b"utxo".to_vec(), b"value".to_vec())],
                removes: Vec::new(),
            },
        );
        x_chain.apply(&requests).expect("export");

        let values = p_chain
            .get(&x_chain.chain_id(), &[b"utxo".to_vec()])
            .expect("get");
        assert_eq!(values, vec![b"value".to_vec()]);
        assert!(other.get(&x_chain.chain_id(), &[b"utxo".to_vec()]).is_err());
    }

    #[test]
    fn removing_a_missing_key_changes_nothing() {
        let x_chain = MemorySharedMemory::new(Id([1; 32]));
        let p_chain = x_chain.for_chain(Id([2; 32]));
        let mut export = BTreeMap::new();
        export.insert(
            p_chain.chain_id(),
            AtomicRequests {
                puts: vec![(b"a".to_vec(), b"1".to_vec())],
                removes: Vec::new(),
            },
        );
        x_chain.apply(&export).expect("export");

        let mut import = BTreeMap::new();
        import.insert(
            x_chain.chain_id(),
            AtomicRequests {
                puts: Vec::new(),
                removes: vec![b"a".to_vec(), b"b".to_vec()],
            },
        );
        assert!(p_chain.apply(&import).is_err());
        assert!(p_chain.get(&x_chain.chain_id(), &[b"a".to_vec()]).is_ok());

        import.insert(
            x_chain.chain_id(),
            AtomicRequests {
                puts: Vec::new(),
                removes: vec![b"a".to_vec()],
            },
        );
        p_chain.apply(&import).expect("import");
        assert!(p_chain.get(&x_chain.chain_id(), &[b"a".to_vec()]).is_err());
    }
}

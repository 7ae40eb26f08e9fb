//! UTXO set and address index backed by the storage trait.

use std::collections::BTreeSet;

use allyd_primitives::{decode_versioned, encode_versioned, Output, ShortId, Utxo, UtxoId};
use allyd_storage::{Column, KeyValueStore, StoreError, WriteBatch};

const ADDRESS_LEN: usize = 20;
const ADDRESS_UTXO_KEY_LEN: usize = ADDRESS_LEN + UtxoId::KEY_LEN;

/// Addresses that may sign for `output`, lock or no lock.
pub fn owner_addresses(output: &Output) -> &[ShortId] {
    &output.owners().addresses
}

pub fn address_utxo_key(address: &ShortId, utxo_id: &UtxoId) -> [u8; ADDRESS_UTXO_KEY_LEN] {
    let mut key = [0u8; ADDRESS_UTXO_KEY_LEN];
    key[..ADDRESS_LEN].copy_from_slice(address.as_bytes());
    key[ADDRESS_LEN..].copy_from_slice(&utxo_id.key());
    key
}

pub struct UtxoSet<S> {
    store: S,
}

impl<S> UtxoSet<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: KeyValueStore> UtxoSet<S> {
    pub fn get(&self, utxo_id: &UtxoId) -> Result<Option<Utxo>, StoreError> {
        match self.store.get(Column::Utxo, &utxo_id.key())? {
            Some(bytes) => Ok(Some(
                decode_versioned(&bytes).map_err(|err| StoreError::Backend(err.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    pub fn put(&self, batch: &mut WriteBatch, utxo: &Utxo) {
        batch.put(Column::Utxo, utxo.utxo_id.key(), encode_versioned(utxo));
    }

    pub fn delete(&self, batch: &mut WriteBatch, utxo_id: &UtxoId) {
        batch.delete(Column::Utxo, utxo_id.key());
    }
}

pub struct AddressIndex<S> {
    store: S,
}

impl<S> AddressIndex<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: KeyValueStore> AddressIndex<S> {
    pub fn insert(&self, batch: &mut WriteBatch, utxo: &Utxo) {
        for address in owner_addresses(&utxo.output) {
            batch.put(
                Column::AddressUtxo,
                address_utxo_key(address, &utxo.utxo_id),
                [],
            );
        }
    }

    pub fn delete(&self, batch: &mut WriteBatch, utxo: &Utxo) {
        for address in owner_addresses(&utxo.output) {
            batch.delete(Column::AddressUtxo, address_utxo_key(address, &utxo.utxo_id));
        }
    }

    pub fn scan(&self, address: &ShortId) -> Result<BTreeSet<UtxoId>, StoreError> {
        let entries = self
            .store
            .scan_prefix(Column::AddressUtxo, address.as_bytes())?;
        let mut utxo_ids = BTreeSet::new();
        for (key, _) in entries {
            if key.len() != ADDRESS_UTXO_KEY_LEN {
                continue;
            }
            if let Some(utxo_id) = UtxoId::from_key(&key[ADDRESS_LEN..]) {
                utxo_ids.insert(utxo_id);
            }
        }
        Ok(utxo_ids)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use allyd_primitives::{Id, OutputOwners};
    use allyd_storage::MemoryStore;

    use super::*;

    fn utxo(index: u32, owner: u8) -> Utxo {
        Utxo {
            utxo_id: UtxoId::new(Id([7; 32]), index),
            asset_id: Id([1; 32]),
            output: Output::transfer(10, OutputOwners::single(ShortId([owner; 20]))),
        }
    }

    #[test]
    fn address_index_scans_only_owned_utxos() {
        let store = Arc::new(MemoryStore::new());
        let utxos = UtxoSet::new(Arc::clone(&store));
        let index = AddressIndex::new(Arc::clone(&store));
        let mut batch = WriteBatch::new();
        for entry in [utxo(0, 1), utxo(1, 2), utxo(2, 1)] {
            utxos.put(&mut batch, &entry);
            index.insert(&mut batch, &entry);
        }
        store.write_batch(&batch).expect("write");

        let owned = index.scan(&ShortId([1; 20])).expect("scan");
        let indices: Vec<u32> = owned.iter().map(|id| id.output_index).collect();
        assert_eq!(indices, vec![0, 2]);
        assert_eq!(
            utxos.get(&UtxoId::new(Id([7; 32]), 1)).expect("get"),
            Some(utxo(1, 2))
        );

        let mut batch = WriteBatch::new();
        utxos.delete(&mut batch, &UtxoId::new(Id([7; 32]), 0));
        index.delete(&mut batch, &utxo(0, 1));
        store.write_batch(&batch).expect("write");
        assert_eq!(index.scan(&ShortId([1; 20])).expect("scan").len(), 1);
        assert!(utxos.get(&UtxoId::new(Id([7; 32]), 0)).expect("get").is_none());
    }
}

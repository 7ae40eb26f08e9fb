//! Accepted transactions and their status, backed by the storage trait.

use std::sync::Arc;

use allyd_primitives::{Id, Tx};
use allyd_storage::{Column, KeyValueStore, StoreError, WriteBatch};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TxStatus {
    /// Decision transaction accepted, or proposal accepted on its commit branch.
    Committed,
    /// Proposal accepted on its abort branch: fee paid, staking effect skipped.
    Aborted,
}

impl TxStatus {
    pub fn as_u8(self) -> u8 {
        match self {
            TxStatus::Committed => 1,
            TxStatus::Aborted => 2,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(TxStatus::Committed),
            2 => Some(TxStatus::Aborted),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TxStatus::Committed => "committed",
            TxStatus::Aborted => "aborted",
        }
    }
}

pub struct TxIndex<S> {
    store: S,
}

impl<S> TxIndex<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: KeyValueStore> TxIndex<S> {
    pub fn insert(&self, batch: &mut WriteBatch, tx: &Tx, status: TxStatus) {
        let mut value = Vec::with_capacity(1 + tx.bytes().len());
        value.push(status.as_u8());
        value.extend_from_slice(tx.bytes());
        batch.put(Column::Tx, tx.id().as_bytes(), value);
    }

    pub fn get(&self, tx_id: &Id) -> Result<Option<(Arc<Tx>, TxStatus)>, StoreError> {
        let bytes = match self.store.get(Column::Tx, tx_id.as_bytes())? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        let (status, tx_bytes) = bytes
            .split_first()
            .ok_or_else(|| StoreError::Backend("empty tx index entry".to_string()))?;
        let status = TxStatus::from_u8(*status)
            .ok_or_else(|| StoreError::Backend(format!("invalid tx status {status}")))?;
        let tx = Tx::decode(tx_bytes).map_err(|err| StoreError::Backend(err.to_string()))?;
        Ok(Some((Arc::new(tx), status)))
    }
}

#[cfg(test)]
mod tests {
    use allyd_primitives::{AdvanceTimeTx, UnsignedTx};
    use allyd_storage::MemoryStore;

    use super::*;

    #[test]
    fn stores_status_with_signed_bytes() {
        let store = Arc::new(MemoryStore::new());
        let index = TxIndex::new(Arc::clone(&store));
        let tx = Tx::new(UnsignedTx::AdvanceTime(AdvanceTimeTx { time: 9 }), Vec::new());
        let mut batch = WriteBatch::new();
        index.insert(&mut batch, &tx, TxStatus::Aborted);
        store.write_batch(&batch).expect("write");

        let (stored, status) = index.get(&tx.id()).expect("get").expect("present");
        assert_eq!(status, TxStatus::Aborted);
        assert_eq!(stored.id(), tx.id());
        assert!(index.get(&Id([3; 32])).expect("get").is_none());
    }
}

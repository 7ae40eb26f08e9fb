//! Column-oriented key/value persistence for ledger state.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

pub mod memory;

#[cfg(feature = "fjall")]
pub mod fjall;

pub use memory::MemoryStore;

#[derive(Debug)]
pub enum StoreError {
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Backend(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for StoreError {}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Column {
    /// UTXO id key -> encoded UTXO.
    Utxo,
    /// address ++ UTXO id key -> empty.
    AddressUtxo,
    /// tx id -> status byte ++ signed tx bytes.
    Tx,
    /// tx id -> current staker record.
    CurrentStaker,
    /// tx id -> signed staker tx bytes.
    PendingStaker,
    /// tx id ++ UTXO id key -> encoded reward UTXO.
    RewardUtxo,
    /// allychain id -> signed create-allychain tx bytes.
    Allychain,
    /// allychain id ++ chain id -> signed create-chain tx bytes.
    Chain,
    Meta,
}

impl Column {
    pub const ALL: [Column; 9] = [
        Column::Utxo,
        Column::AddressUtxo,
        Column::Tx,
        Column::CurrentStaker,
        Column::PendingStaker,
        Column::RewardUtxo,
        Column::Allychain,
        Column::Chain,
        Column::Meta,
    ];

    pub const fn index(self) -> usize {
        match self {
            Column::Utxo => 0,
            Column::AddressUtxo => 1,
            Column::Tx => 2,
            Column::CurrentStaker => 3,
            Column::PendingStaker => 4,
            Column::RewardUtxo => 5,
            Column::Allychain => 6,
            Column::Chain => 7,
            Column::Meta => 8,
        }
    }

    pub const fn bit(self) -> u32 {
        1 << self.index()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Column::Utxo => "utxo",
            Column::AddressUtxo => "address_utxo",
            Column::Tx => "tx",
            Column::CurrentStaker => "current_staker",
            Column::PendingStaker => "pending_staker",
            Column::RewardUtxo => "reward_utxo",
            Column::Allychain => "allychain",
            Column::Chain => "chain",
            Column::Meta => "meta",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WriteKey(SmallVec<[u8; 64]>);

impl WriteKey {
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl From<Vec<u8>> for WriteKey {
    fn from(value: Vec<u8>) -> Self {
        Self(SmallVec::from_vec(value))
    }
}

impl From<&[u8]> for WriteKey {
    fn from(value: &[u8]) -> Self {
        Self(SmallVec::from_slice(value))
    }
}

impl<const N: usize> From<[u8; N]> for WriteKey {
    fn from(value: [u8; N]) -> Self {
        Self(SmallVec::from_slice(&value))
    }
}

impl<const N: usize> From<&[u8; N]> for WriteKey {
    fn from(value: &[u8; N]) -> Self {
        Self(SmallVec::from_slice(value))
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WriteValue(SmallVec<[u8; 96]>);

impl WriteValue {
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl From<Vec<u8>> for WriteValue {
    fn from(value: Vec<u8>) -> Self {
        Self(SmallVec::from_vec(value))
    }
}

impl From<&[u8]> for WriteValue {
    fn from(value: &[u8]) -> Self {
        Self(SmallVec::from_slice(value))
    }
}

impl<const N: usize> From<[u8; N]> for WriteValue {
    fn from(value: [u8; N]) -> Self {
        Self(SmallVec::from_slice(&value))
    }
}

impl<const N: usize> From<&[u8; N]> for WriteValue {
    fn from(value: &[u8; N]) -> Self {
        Self(SmallVec::from_slice(value))
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WriteOp {
    Put {
        column: Column,
        key: WriteKey,
        value: WriteValue,
    },
    Delete {
        column: Column,
        key: WriteKey,
    },
}

impl WriteOp {
    pub fn column(&self) -> Column {
        match self {
            WriteOp::Put { column, .. } | WriteOp::Delete { column, .. } => *column,
        }
    }
}

/// Ordered write set committed atomically by [`KeyValueStore::write_batch`].
#[derive(Clone, Debug, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, column: Column, key: impl Into<WriteKey>, value: impl Into<WriteValue>) {
        self.ops.push(WriteOp::Put {
            column,
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn delete(&mut self, column: Column, key: impl Into<WriteKey>) {
        self.ops.push(WriteOp::Delete {
            column,
            key: key.into(),
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &WriteOp> {
        self.ops.iter()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Bitmask of the columns this batch touches.
    pub fn touched(&self) -> u32 {
        self.ops.iter().fold(0, |mask, op| mask | op.column().bit())
    }
}

pub type ScanResult = Vec<(Vec<u8>, Vec<u8>)>;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
    fn put(&self, column: Column, key: &[u8], value: &[u8]) -> Result<(), StoreError>;
    fn delete(&self, column: Column, key: &[u8]) -> Result<(), StoreError>;
    /// Entries whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, column: Column, prefix: &[u8]) -> Result<ScanResult, StoreError>;
    fn write_batch(&self, batch: &WriteBatch) -> Result<(), StoreError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.as_ref().get(column, key)
    }

    fn put(&self, column: Column, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.as_ref().put(column, key, value)
    }

    fn delete(&self, column: Column, key: &[u8]) -> Result<(), StoreError> {
        self.as_ref().delete(column, key)
    }

    fn scan_prefix(&self, column: Column, prefix: &[u8]) -> Result<ScanResult, StoreError> {
        self.as_ref().scan_prefix(column, prefix)
    }

    fn write_batch(&self, batch: &WriteBatch) -> Result<(), StoreError> {
        self.as_ref().write_batch(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_index_and_bit_are_stable() {
        let mut seen = 0u32;
        for (idx, column) in Column::ALL.iter().copied().enumerate() {
            assert_eq!(column.index(), idx);
            assert_eq!(column.bit(), 1u32 << idx);
            assert_eq!(seen & column.bit(), 0, "duplicate bit for {column:?}");
            seen |= column.bit();
        }
    }

    #[test]
    fn batch_tracks_touched_columns() {
        let mut batch = WriteBatch::new();
        assert!(batch.is_empty());
        batch.put(Column::Utxo, b"k", b"v");
        batch.delete(Column::Meta, b"k");
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.touched(), Column::Utxo.bit() | Column::Meta.bit());
    }
}

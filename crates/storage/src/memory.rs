use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::RwLock;

use crate::{Column, KeyValueStore, ScanResult, StoreError, WriteBatch, WriteOp};

type ColumnMap = BTreeMap<Vec<u8>, Vec<u8>>;

/// In-process store; one ordered map per column.
pub struct MemoryStore {
    columns: RwLock<Vec<ColumnMap>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            columns: RwLock::new(vec![ColumnMap::new(); Column::ALL.len()]),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, column: Column) -> usize {
        let guard = self.columns.read().expect("memory store lock");
        guard[column.index()].len()
    }

    pub fn is_empty(&self, column: Column) -> bool {
        self.len(column) == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let guard = self.columns.read().expect("memory store lock");
        Ok(guard[column.index()].get(key).cloned())
    }

    fn put(&self, column: Column, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut guard = self.columns.write().expect("memory store lock");
        guard[column.index()].insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, column: Column, key: &[u8]) -> Result<(), StoreError> {
        let mut guard = self.columns.write().expect("memory store lock");
        guard[column.index()].remove(key);
        Ok(())
    }

    fn scan_prefix(&self, column: Column, prefix: &[u8]) -> Result<ScanResult, StoreError> {
        let guard = self.columns.read().expect("memory store lock");
        let range = guard[column.index()].range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded));
        Ok(range
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    fn write_batch(&self, batch: &WriteBatch) -> Result<(), StoreError> {
        let mut guard = self.columns.write().expect("memory store lock");
        for op in batch.iter() {
            match op {
                WriteOp::Put { column, key, value } => {
                    guard[column.index()].insert(key.as_slice().to_vec(), value.as_slice().to_vec());
                }
                WriteOp::Delete { column, key } => {
                    guard[column.index()].remove(key.as_slice());
                }
            }
        }
        Ok(())
    }
}

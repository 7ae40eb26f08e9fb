use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use fjall::{Batch, Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};

use crate::{Column, KeyValueStore, ScanResult, StoreError, WriteBatch, WriteOp};

const SLOW_COMMIT_THRESHOLD: Duration = Duration::from_millis(500);
const SLOW_COMMIT_LOG_INTERVAL_SECS: u64 = 30;

static LAST_SLOW_COMMIT_LOG_SECS: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Debug, Default)]
pub struct FjallOptions {
    pub cache_bytes: Option<u64>,
    pub memtable_bytes: Option<u32>,
    pub fsync_ms: Option<u16>,
    /// Persist every batch to disk before returning instead of buffering.
    pub sync_writes: bool,
}

/// Durable store with one fjall partition per column.
pub struct FjallStore {
    keyspace: Keyspace,
    partitions: Vec<PartitionHandle>,
    persist_mode: PersistMode,
}

impl FjallStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_options(path, FjallOptions::default())
    }

    pub fn open_with_options(
        path: impl AsRef<Path>,
        options: FjallOptions,
    ) -> Result<Self, StoreError> {
        let mut config = Config::new(path);
        if let Some(bytes) = options.cache_bytes {
            config = config.cache_size(bytes);
        }
        if let Some(ms) = options.fsync_ms {
            config = config.fsync_ms(Some(ms));
        }
        let mut partition_options = PartitionCreateOptions::default();
        if let Some(bytes) = options.memtable_bytes {
            partition_options = partition_options.max_memtable_size(bytes);
        }

        let keyspace = config.open().map_err(map_err)?;
        let mut partitions = Vec::with_capacity(Column::ALL.len());
        for column in Column::ALL {
            let handle = keyspace
                .open_partition(column.as_str(), partition_options.clone())
                .map_err(map_err)?;
            partitions.push(handle);
        }
        allyd_log::log_debug!("opened fjall keyspace with {} partitions", partitions.len());
        Ok(Self {
            keyspace,
            partitions,
            persist_mode: if options.sync_writes {
                PersistMode::SyncAll
            } else {
                PersistMode::Buffer
            },
        })
    }

    fn partition(&self, column: Column) -> Result<&PartitionHandle, StoreError> {
        self.partitions
            .get(column.index())
            .ok_or_else(|| StoreError::Backend(format!("missing partition {}", column.as_str())))
    }

    pub fn persist(&self) -> Result<(), StoreError> {
        self.keyspace.persist(PersistMode::SyncAll).map_err(map_err)
    }

    fn log_slow_commit(&self, elapsed: Duration, batch: &WriteBatch) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let last = LAST_SLOW_COMMIT_LOG_SECS.load(Ordering::Relaxed);
        if now.saturating_sub(last) < SLOW_COMMIT_LOG_INTERVAL_SECS {
            return;
        }
        if LAST_SLOW_COMMIT_LOG_SECS
            .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        let columns: Vec<&str> = Column::ALL
            .into_iter()
            .filter(|column| batch.touched() & column.bit() != 0)
            .map(Column::as_str)
            .collect();
        allyd_log::log_warn!(
            "fjall batch commit took {}ms (ops {}, columns [{}], write_buffer {}B)",
            elapsed.as_millis(),
            batch.len(),
            columns.join(","),
            self.keyspace.write_buffer_size(),
        );
    }
}

impl KeyValueStore for FjallStore {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let partition = self.partition(column)?;
        let value = partition.get(key).map_err(map_err)?;
        Ok(value.map(|bytes| bytes.to_vec()))
    }

    fn put(&self, column: Column, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.partition(column)?.insert(key, value).map_err(map_err)
    }

    fn delete(&self, column: Column, key: &[u8]) -> Result<(), StoreError> {
        self.partition(column)?.remove(key).map_err(map_err)
    }

    fn scan_prefix(&self, column: Column, prefix: &[u8]) -> Result<ScanResult, StoreError> {
        let partition = self.partition(column)?;
        let mut results = Vec::new();
        for entry in partition.prefix(prefix) {
            let (key, value) = entry.map_err(map_err)?;
            results.push((key.to_vec(), value.to_vec()));
        }
        Ok(results)
    }

    fn write_batch(&self, batch: &WriteBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut fjall_batch = Batch::with_capacity(self.keyspace.clone(), batch.len())
            .durability(Some(self.persist_mode));
        for op in batch.iter() {
            match op {
                WriteOp::Put { column, key, value } => {
                    fjall_batch.insert(self.partition(*column)?, key.as_slice(), value.as_slice());
                }
                WriteOp::Delete { column, key } => {
                    fjall_batch.remove(self.partition(*column)?, key.as_slice());
                }
            }
        }
        let commit_start = Instant::now();
        fjall_batch.commit().map_err(map_err)?;
        let elapsed = commit_start.elapsed();
        if elapsed >= SLOW_COMMIT_THRESHOLD {
            self.log_slow_commit(elapsed, batch);
        }
        Ok(())
    }
}

fn map_err(err: fjall::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

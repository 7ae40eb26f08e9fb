//! Durable chain state and the read interface it shares with overlays.

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};

use allyd_consensus::{potential_reward, StakingParams};
use allyd_primitives::{decode_versioned, encode_versioned, DecodeError, Id, ShortId, Tx, Utxo, UtxoId};
use allyd_stakers::record::{decode_current, decode_pending, encode_current, encode_pending};
use allyd_stakers::{CurrentStakers, PendingStakers, StakerError};
use allyd_storage::{Column, KeyValueStore, StoreError, WriteBatch};

use crate::txindex::{TxIndex, TxStatus};
use crate::utxo::{AddressIndex, UtxoSet};

const META_TIMESTAMP_KEY: &[u8] = b"timestamp";
const META_SUPPLY_KEY: &[u8] = b"current_supply";
const META_INITIALIZED_KEY: &[u8] = b"initialized";

#[derive(Debug)]
pub enum StateError {
    Store(StoreError),
    Decode(DecodeError),
    Staker(StakerError),
    AlreadyInitialized,
    SupplyOverflow,
    CorruptIndex(&'static str),
}

impl std::fmt::Display for StateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateError::Store(err) => write!(f, "{err}"),
            StateError::Decode(err) => write!(f, "{err}"),
            StateError::Staker(err) => write!(f, "{err}"),
            StateError::AlreadyInitialized => write!(f, "chain state already initialized"),
            StateError::SupplyOverflow => write!(f, "current supply overflow"),
            StateError::CorruptIndex(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for StateError {}

impl From<StoreError> for StateError {
    fn from(err: StoreError) -> Self {
        StateError::Store(err)
    }
}

impl From<DecodeError> for StateError {
    fn from(err: DecodeError) -> Self {
        StateError::Decode(err)
    }
}

impl From<StakerError> for StateError {
    fn from(err: StakerError) -> Self {
        StateError::Staker(err)
    }
}

/// Read access to a chain state, durable or speculative.
pub trait StateView: Send + Sync {
    fn utxo(&self, utxo_id: &UtxoId) -> Result<Option<Utxo>, StateError>;

    /// Unspent outputs owned by any of `addresses`, ascending by UTXO id.
    fn utxos_for(&self, addresses: &BTreeSet<ShortId>) -> Result<Vec<Utxo>, StateError>;

    fn tx(&self, tx_id: &Id) -> Result<Option<(Arc<Tx>, TxStatus)>, StateError>;

    fn reward_utxos(&self, tx_id: &Id) -> Result<Vec<Utxo>, StateError>;

    /// The create-allychain transaction that defines `allychain_id`.
    fn allychain(&self, allychain_id: &Id) -> Result<Option<Arc<Tx>>, StateError>;

    /// Create-chain transactions of one allychain, ascending by tx id.
    fn chains(&self, allychain_id: &Id) -> Result<Vec<Arc<Tx>>, StateError>;

    fn timestamp(&self) -> u64;

    fn current_supply(&self) -> u64;

    fn current_stakers(&self) -> CurrentStakers;

    fn pending_stakers(&self) -> PendingStakers;
}

/// The next time the staker sets change on their own: the soonest current
/// end or pending start.
pub fn next_staker_change_time(current: &CurrentStakers, pending: &PendingStakers) -> Option<u64> {
    let current_end = current.first().map(|current| current.staker.end);
    let pending_start = pending.first().map(|pending| pending.start);
    match (current_end, pending_start) {
        (Some(end), Some(start)) => Some(end.min(start)),
        (end, start) => end.or(start),
    }
}

/// Initial contents of a fresh chain.
#[derive(Clone, Debug, Default)]
pub struct Genesis {
    pub timestamp: u64,
    pub initial_supply: u64,
    pub utxos: Vec<Utxo>,
    /// Add-validator transactions that are current from the start.
    pub validators: Vec<Arc<Tx>>,
}

#[derive(Clone, Debug, Default)]
struct Snapshot {
    timestamp: u64,
    current_supply: u64,
    current: CurrentStakers,
    pending: PendingStakers,
}

/// Everything an overlay hands back when it is applied.
pub(crate) struct ChainUpdate {
    pub timestamp: u64,
    pub current_supply: u64,
    pub current: CurrentStakers,
    pub pending: PendingStakers,
}

pub struct ChainState<S> {
    store: Arc<S>,
    utxos: UtxoSet<Arc<S>>,
    address_index: AddressIndex<Arc<S>>,
    tx_index: TxIndex<Arc<S>>,
    snapshot: RwLock<Snapshot>,
}

impl<S: KeyValueStore> ChainState<S> {
    /// Opens the state in `store`, rebuilding the staker sets from their columns.
    pub fn open(store: Arc<S>) -> Result<Self, StateError> {
        let timestamp = read_meta_u64(store.as_ref(), META_TIMESTAMP_KEY)?.unwrap_or(0);
        let current_supply = read_meta_u64(store.as_ref(), META_SUPPLY_KEY)?.unwrap_or(0);

        let mut current_records = Vec::new();
        for (_, value) in store.scan_prefix(Column::CurrentStaker, &[])? {
            current_records.push(decode_current(&value)?);
        }
        let mut pending_records = Vec::new();
        for (_, value) in store.scan_prefix(Column::PendingStaker, &[])? {
            pending_records.push(decode_pending(&value)?);
        }
        let current = CurrentStakers::from_stakers(current_records)?;
        let pending = PendingStakers::from_stakers(pending_records)?;

        allyd_log::log_info!(
            "opened chain state at time {} (supply {}, {} current stakers, {} pending stakers)",
            timestamp,
            current_supply,
            current.len(),
            pending.len()
        );

        Ok(Self {
            utxos: UtxoSet::new(Arc::clone(&store)),
            address_index: AddressIndex::new(Arc::clone(&store)),
            tx_index: TxIndex::new(Arc::clone(&store)),
            store,
            snapshot: RwLock::new(Snapshot {
                timestamp,
                current_supply,
                current,
                pending,
            }),
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn is_initialized(&self) -> Result<bool, StateError> {
        Ok(self
            .store
            .get(Column::Meta, META_INITIALIZED_KEY)?
            .is_some())
    }

    /// Seeds an empty chain. Genesis validators become current stakers
    /// and their potential rewards are added to the supply.
    pub fn initialize(&self, genesis: &Genesis, params: &StakingParams) -> Result<(), StateError> {
        if self.is_initialized()? {
            return Err(StateError::AlreadyInitialized);
        }

        let mut batch = WriteBatch::new();
        for utxo in &genesis.utxos {
            self.put_utxo(&mut batch, utxo);
        }

        let mut current_supply = genesis.initial_supply;
        let mut validators = Vec::with_capacity(genesis.validators.len());
        for tx in &genesis.validators {
            let reward = match tx.unsigned.validator() {
                Some(validator) => potential_reward(
                    &params.rewards,
                    validator.duration(),
                    validator.weight,
                    current_supply,
                ),
                None => return Err(StakerError::NotAStaker(tx.id()).into()),
            };
            current_supply = current_supply
                .checked_add(reward)
                .ok_or(StateError::SupplyOverflow)?;
            self.tx_index.insert(&mut batch, tx, TxStatus::Committed);
            validators.push((Arc::clone(tx), reward));
        }
        let current = CurrentStakers::new().update_stakers(validators, Vec::new(), Vec::new(), 0)?;
        batch.put(Column::Meta, META_INITIALIZED_KEY, [1u8]);

        allyd_log::log_info!(
            "initializing chain state with {} utxos and {} validators at time {}",
            genesis.utxos.len(),
            current.len(),
            genesis.timestamp
        );

        self.commit(
            batch,
            ChainUpdate {
                timestamp: genesis.timestamp,
                current_supply,
                current,
                pending: PendingStakers::new(),
            },
        )
    }

    pub(crate) fn put_utxo(&self, batch: &mut WriteBatch, utxo: &Utxo) {
        self.utxos.put(batch, utxo);
        self.address_index.insert(batch, utxo);
    }

    /// Deletes `utxo_id` and, when it is stored, its address index entries.
    pub(crate) fn delete_utxo(
        &self,
        batch: &mut WriteBatch,
        utxo_id: &UtxoId,
    ) -> Result<(), StateError> {
        if let Some(utxo) = self.utxos.get(utxo_id)? {
            self.address_index.delete(batch, &utxo);
        }
        self.utxos.delete(batch, utxo_id);
        Ok(())
    }

    pub(crate) fn put_tx(&self, batch: &mut WriteBatch, tx: &Tx, status: TxStatus) {
        self.tx_index.insert(batch, tx, status);
    }

    pub(crate) fn put_reward_utxo(&self, batch: &mut WriteBatch, tx_id: &Id, utxo: &Utxo) {
        let mut key = Vec::with_capacity(32 + UtxoId::KEY_LEN);
        key.extend_from_slice(tx_id.as_bytes());
        key.extend_from_slice(&utxo.utxo_id.key());
        batch.put(Column::RewardUtxo, key, encode_versioned(utxo));
    }

    pub(crate) fn put_allychain(&self, batch: &mut WriteBatch, tx: &Tx) {
        batch.put(Column::Allychain, tx.id().as_bytes(), tx.bytes());
    }

    pub(crate) fn put_chain(&self, batch: &mut WriteBatch, allychain_id: &Id, tx: &Tx) {
        let mut key = Vec::with_capacity(64);
        key.extend_from_slice(allychain_id.as_bytes());
        key.extend_from_slice(tx.id().as_bytes());
        batch.put(Column::Chain, key, tx.bytes());
    }

    /// Writes `batch` together with the staker changes and chain metadata of
    /// `update`, then publishes `update` as the new durable snapshot.
    pub(crate) fn commit(&self, mut batch: WriteBatch, update: ChainUpdate) -> Result<(), StateError> {
        for (tx_id, change) in update.current.changes() {
            match change {
                Some(current) => {
                    batch.put(Column::CurrentStaker, tx_id.as_bytes(), encode_current(current))
                }
                None => batch.delete(Column::CurrentStaker, tx_id.as_bytes()),
            }
        }
        for (tx_id, change) in update.pending.changes() {
            match change {
                Some(tx) => batch.put(Column::PendingStaker, tx_id.as_bytes(), encode_pending(tx)),
                None => batch.delete(Column::PendingStaker, tx_id.as_bytes()),
            }
        }
        batch.put(Column::Meta, META_TIMESTAMP_KEY, update.timestamp.to_be_bytes());
        batch.put(Column::Meta, META_SUPPLY_KEY, update.current_supply.to_be_bytes());

        self.store.write_batch(&batch)?;
        allyd_log::log_debug!(
            "committed {} writes; chain time {}, supply {}",
            batch.len(),
            update.timestamp,
            update.current_supply
        );

        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        *snapshot = Snapshot {
            timestamp: update.timestamp,
            current_supply: update.current_supply,
            current: update.current.flushed(),
            pending: update.pending.flushed(),
        };
        Ok(())
    }

    fn read_snapshot<T>(&self, read: impl FnOnce(&Snapshot) -> T) -> T {
        let snapshot = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        read(&snapshot)
    }
}

impl<S: KeyValueStore> StateView for ChainState<S> {
    fn utxo(&self, utxo_id: &UtxoId) -> Result<Option<Utxo>, StateError> {
        Ok(self.utxos.get(utxo_id)?)
    }

    fn utxos_for(&self, addresses: &BTreeSet<ShortId>) -> Result<Vec<Utxo>, StateError> {
        let mut utxo_ids = BTreeSet::new();
        for address in addresses {
            utxo_ids.extend(self.address_index.scan(address)?);
        }
        let mut utxos = Vec::with_capacity(utxo_ids.len());
        for utxo_id in utxo_ids {
            let utxo = self
                .utxos
                .get(&utxo_id)?
                .ok_or(StateError::CorruptIndex("address index points at missing utxo"))?;
            utxos.push(utxo);
        }
        Ok(utxos)
    }

    fn tx(&self, tx_id: &Id) -> Result<Option<(Arc<Tx>, TxStatus)>, StateError> {
        Ok(self.tx_index.get(tx_id)?)
    }

    fn reward_utxos(&self, tx_id: &Id) -> Result<Vec<Utxo>, StateError> {
        let entries = self.store.scan_prefix(Column::RewardUtxo, tx_id.as_bytes())?;
        let mut utxos = Vec::with_capacity(entries.len());
        for (_, value) in entries {
            utxos.push(decode_versioned(&value)?);
        }
        Ok(utxos)
    }

    fn allychain(&self, allychain_id: &Id) -> Result<Option<Arc<Tx>>, StateError> {
        match self.store.get(Column::Allychain, allychain_id.as_bytes())? {
            Some(bytes) => Ok(Some(Arc::new(Tx::decode(&bytes)?))),
            None => Ok(None),
        }
    }

    fn chains(&self, allychain_id: &Id) -> Result<Vec<Arc<Tx>>, StateError> {
        let entries = self.store.scan_prefix(Column::Chain, allychain_id.as_bytes())?;
        let mut chains = Vec::with_capacity(entries.len());
        for (_, value) in entries {
            chains.push(Arc::new(Tx::decode(&value)?));
        }
        Ok(chains)
    }

    fn timestamp(&self) -> u64 {
        self.read_snapshot(|snapshot| snapshot.timestamp)
    }

    fn current_supply(&self) -> u64 {
        self.read_snapshot(|snapshot| snapshot.current_supply)
    }

    fn current_stakers(&self) -> CurrentStakers {
        self.read_snapshot(|snapshot| snapshot.current.clone())
    }

    fn pending_stakers(&self) -> PendingStakers {
        self.read_snapshot(|snapshot| snapshot.pending.clone())
    }
}

fn read_meta_u64<S: KeyValueStore>(store: &S, key: &[u8]) -> Result<Option<u64>, StateError> {
    let Some(bytes) = store.get(Column::Meta, key)? else {
        return Ok(None);
    };
    let bytes: [u8; 8] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| StateError::CorruptIndex("invalid chain metadata entry"))?;
    Ok(Some(u64::from_be_bytes(bytes)))
}

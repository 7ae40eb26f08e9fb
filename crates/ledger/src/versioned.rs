//! Copy-on-write overlay over a parent state.
//!
//! Writes are buffered locally and reads fall through to the parent. An
//! overlay is discarded to reject whatever produced it, or applied to the
//! durable [`ChainState`] to accept it. Overlays may stack; a stacked
//! overlay is applied after every overlay beneath it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use allyd_primitives::encoding::Encoder;
use allyd_primitives::{Id, ShortId, TransferableInput, TransferableOutput, Tx, Utxo, UtxoId};
use allyd_stakers::{CurrentStakers, PendingStakers};
use allyd_storage::{KeyValueStore, WriteBatch};

use crate::state::{ChainState, ChainUpdate, StateError, StateView};
use crate::txindex::TxStatus;
use crate::utxo::owner_addresses;

/// Everything an overlay buffers for the durable store.
#[derive(Default)]
struct Buffers {
    current: CurrentStakers,
    pending: PendingStakers,
    /// `Some` for an added UTXO, `None` for a consumed one.
    modified_utxos: BTreeMap<UtxoId, Option<Utxo>>,
    added_txs: BTreeMap<Id, (Arc<Tx>, TxStatus)>,
    added_rewards: BTreeMap<Id, Vec<Utxo>>,
    added_allychains: BTreeMap<Id, Arc<Tx>>,
    /// allychain id -> create-chain txs, keyed by tx id.
    added_chains: BTreeMap<Id, BTreeMap<Id, Arc<Tx>>>,
    /// Set by `apply`, reset by any later write.
    applied: bool,
}

impl Buffers {
    fn is_empty(&self) -> bool {
        self.modified_utxos.is_empty()
            && self.added_txs.is_empty()
            && self.added_rewards.is_empty()
            && self.added_allychains.is_empty()
            && self.added_chains.is_empty()
            && !self.current.has_changes()
            && !self.pending.has_changes()
    }

    fn clear(&mut self) {
        self.modified_utxos.clear();
        self.added_txs.clear();
        self.added_rewards.clear();
        self.added_allychains.clear();
        self.added_chains.clear();
        self.current = self.current.flushed();
        self.pending = self.pending.flushed();
    }
}

/// Buffers sit behind a lock so an overlay shared as the parent of a
/// stacked overlay can still be applied.
pub struct VersionedState {
    parent: Arc<dyn StateView>,
    timestamp: u64,
    current_supply: u64,
    buffers: RwLock<Buffers>,
}

impl VersionedState {
    pub fn new(parent: Arc<dyn StateView>) -> Self {
        let buffers = Buffers {
            current: parent.current_stakers(),
            pending: parent.pending_stakers(),
            ..Buffers::default()
        };
        Self {
            timestamp: parent.timestamp(),
            current_supply: parent.current_supply(),
            parent,
            buffers: RwLock::new(buffers),
        }
    }

    pub fn parent(&self) -> &Arc<dyn StateView> {
        &self.parent
    }

    fn buffers(&self) -> RwLockReadGuard<'_, Buffers> {
        self.buffers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn buffers_mut(&mut self) -> &mut Buffers {
        let buffers = self.buffers.get_mut().unwrap_or_else(PoisonError::into_inner);
        buffers.applied = false;
        buffers
    }

    pub fn add_utxo(&mut self, utxo: Utxo) {
        self.buffers_mut()
            .modified_utxos
            .insert(utxo.utxo_id, Some(utxo));
    }

    pub fn delete_utxo(&mut self, utxo_id: UtxoId) {
        self.buffers_mut().modified_utxos.insert(utxo_id, None);
    }

    /// Marks every UTXO consumed by `inputs` as spent.
    pub fn consume_inputs(&mut self, inputs: &[TransferableInput]) {
        for input in inputs {
            self.delete_utxo(input.utxo_id);
        }
    }

    /// Adds `outputs` as UTXOs of `tx_id`, numbering them from `first_index`.
    pub fn produce_outputs<'a>(
        &mut self,
        tx_id: Id,
        first_index: u32,
        outputs: impl IntoIterator<Item = &'a TransferableOutput>,
    ) {
        for (output_index, output) in (first_index..).zip(outputs) {
            self.add_utxo(Utxo {
                utxo_id: UtxoId::new(tx_id, output_index),
                asset_id: output.asset_id,
                output: output.output.clone(),
            });
        }
    }

    pub fn add_tx(&mut self, tx: Arc<Tx>, status: TxStatus) {
        self.buffers_mut().added_txs.insert(tx.id(), (tx, status));
    }

    pub fn add_reward_utxo(&mut self, tx_id: Id, utxo: Utxo) {
        self.buffers_mut()
            .added_rewards
            .entry(tx_id)
            .or_default()
            .push(utxo);
    }

    pub fn add_allychain(&mut self, tx: Arc<Tx>) {
        self.buffers_mut().added_allychains.insert(tx.id(), tx);
    }

    pub fn add_chain(&mut self, allychain_id: Id, tx: Arc<Tx>) {
        self.buffers_mut()
            .added_chains
            .entry(allychain_id)
            .or_default()
            .insert(tx.id(), tx);
    }

    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.buffers_mut();
        self.timestamp = timestamp;
    }

    pub fn set_current_supply(&mut self, current_supply: u64) {
        self.buffers_mut();
        self.current_supply = current_supply;
    }

    pub fn set_current_stakers(&mut self, current: CurrentStakers) {
        self.buffers_mut().current = current;
    }

    pub fn set_pending_stakers(&mut self, pending: PendingStakers) {
        self.buffers_mut().pending = pending;
    }

    /// Buffered UTXO changes: `Some` added, `None` consumed.
    pub fn modified_utxos(&self) -> Vec<(UtxoId, Option<Utxo>)> {
        self.buffers()
            .modified_utxos
            .iter()
            .map(|(utxo_id, utxo)| (*utxo_id, utxo.clone()))
            .collect()
    }

    pub fn added_txs(&self) -> Vec<(Arc<Tx>, TxStatus)> {
        self.buffers().added_txs.values().cloned().collect()
    }

    /// Whether nothing is buffered for the durable store.
    pub fn is_empty(&self) -> bool {
        self.buffers().is_empty()
    }

    /// Canonical encoding of everything this overlay would write.
    pub fn encode_changes(&self) -> Vec<u8> {
        let buffers = self.buffers();
        let mut encoder = Encoder::with_version();
        encoder.write_u64(self.timestamp);
        encoder.write_u64(self.current_supply);
        encoder.write_u32(len_u32(buffers.modified_utxos.len()));
        for (utxo_id, utxo) in &buffers.modified_utxos {
            encoder.write_fixed(&utxo_id.key());
            match utxo {
                Some(utxo) => {
                    encoder.write_bool(true);
                    encoder.write_bytes(&allyd_primitives::encode(utxo));
                }
                None => encoder.write_bool(false),
            }
        }
        encoder.write_u32(len_u32(buffers.added_txs.len()));
        for (tx, status) in buffers.added_txs.values() {
            encoder.write_u8(status.as_u8());
            encoder.write_bytes(tx.bytes());
        }
        encoder.write_u32(len_u32(buffers.added_rewards.len()));
        for (tx_id, utxos) in &buffers.added_rewards {
            encoder.write_fixed(tx_id.as_bytes());
            encoder.write_list(utxos);
        }
        encoder.write_u32(len_u32(buffers.added_allychains.len()));
        for tx_id in buffers.added_allychains.keys() {
            encoder.write_fixed(tx_id.as_bytes());
        }
        encoder.write_u32(len_u32(buffers.added_chains.len()));
        for (allychain_id, chains) in &buffers.added_chains {
            encoder.write_fixed(allychain_id.as_bytes());
            encoder.write_u32(len_u32(chains.len()));
            for tx_id in chains.keys() {
                encoder.write_fixed(tx_id.as_bytes());
            }
        }
        let current: Vec<(Id, bool)> = buffers
            .current
            .changes()
            .map(|(tx_id, change)| (*tx_id, change.is_some()))
            .collect();
        let pending: Vec<(Id, bool)> = buffers
            .pending
            .changes()
            .map(|(tx_id, change)| (*tx_id, change.is_some()))
            .collect();
        for changes in [current, pending] {
            encoder.write_u32(len_u32(changes.len()));
            for (tx_id, added) in changes {
                encoder.write_fixed(tx_id.as_bytes());
                encoder.write_bool(added);
            }
        }
        encoder.into_inner()
    }

    /// Writes the buffered changes to `chain` in one batch, then clears
    /// them. Applying again is a no-op until the overlay is written to. A
    /// stacked overlay must be applied after every overlay beneath it.
    pub fn apply<S: KeyValueStore>(&self, chain: &ChainState<S>) -> Result<(), StateError> {
        let mut buffers = self.buffers.write().unwrap_or_else(PoisonError::into_inner);
        if buffers.applied {
            return Ok(());
        }
        let mut batch = WriteBatch::new();
        for (utxo_id, utxo) in &buffers.modified_utxos {
            match utxo {
                Some(utxo) => chain.put_utxo(&mut batch, utxo),
                None => chain.delete_utxo(&mut batch, utxo_id)?,
            }
        }
        for (tx, status) in buffers.added_txs.values() {
            chain.put_tx(&mut batch, tx, *status);
        }
        for (tx_id, utxos) in &buffers.added_rewards {
            for utxo in utxos {
                chain.put_reward_utxo(&mut batch, tx_id, utxo);
            }
        }
        for tx in buffers.added_allychains.values() {
            chain.put_allychain(&mut batch, tx);
        }
        for (allychain_id, chains) in &buffers.added_chains {
            for tx in chains.values() {
                chain.put_chain(&mut batch, allychain_id, tx);
            }
        }

        allyd_log::log_debug!(
            "applying overlay: {} utxo changes, {} txs, chain time {}",
            buffers.modified_utxos.len(),
            buffers.added_txs.len(),
            self.timestamp
        );
        chain.commit(
            batch,
            ChainUpdate {
                timestamp: self.timestamp,
                current_supply: self.current_supply,
                current: buffers.current.clone(),
                pending: buffers.pending.clone(),
            },
        )?;

        buffers.clear();
        buffers.applied = true;
        Ok(())
    }
}

impl StateView for VersionedState {
    fn utxo(&self, utxo_id: &UtxoId) -> Result<Option<Utxo>, StateError> {
        if let Some(utxo) = self.buffers().modified_utxos.get(utxo_id) {
            return Ok(utxo.clone());
        }
        self.parent.utxo(utxo_id)
    }

    fn utxos_for(&self, addresses: &BTreeSet<ShortId>) -> Result<Vec<Utxo>, StateError> {
        let mut utxos: BTreeMap<UtxoId, Utxo> = self
            .parent
            .utxos_for(addresses)?
            .into_iter()
            .map(|utxo| (utxo.utxo_id, utxo))
            .collect();
        for (utxo_id, utxo) in &self.buffers().modified_utxos {
            match utxo {
                Some(utxo)
                    if owner_addresses(&utxo.output)
                        .iter()
                        .any(|address| addresses.contains(address)) =>
                {
                    utxos.insert(*utxo_id, utxo.clone());
                }
                Some(_) => {}
                None => {
                    utxos.remove(utxo_id);
                }
            }
        }
        Ok(utxos.into_values().collect())
    }

    fn tx(&self, tx_id: &Id) -> Result<Option<(Arc<Tx>, TxStatus)>, StateError> {
        if let Some((tx, status)) = self.buffers().added_txs.get(tx_id) {
            return Ok(Some((Arc::clone(tx), *status)));
        }
        self.parent.tx(tx_id)
    }

    fn reward_utxos(&self, tx_id: &Id) -> Result<Vec<Utxo>, StateError> {
        if let Some(utxos) = self.buffers().added_rewards.get(tx_id) {
            return Ok(utxos.clone());
        }
        self.parent.reward_utxos(tx_id)
    }

    fn allychain(&self, allychain_id: &Id) -> Result<Option<Arc<Tx>>, StateError> {
        if let Some(tx) = self.buffers().added_allychains.get(allychain_id) {
            return Ok(Some(Arc::clone(tx)));
        }
        self.parent.allychain(allychain_id)
    }

    fn chains(&self, allychain_id: &Id) -> Result<Vec<Arc<Tx>>, StateError> {
        let mut chains: BTreeMap<Id, Arc<Tx>> = self
            .parent
            .chains(allychain_id)?
            .into_iter()
            .map(|tx| (tx.id(), tx))
            .collect();
        if let Some(added) = self.buffers().added_chains.get(allychain_id) {
            chains.extend(added.iter().map(|(tx_id, tx)| (*tx_id, Arc::clone(tx))));
        }
        Ok(chains.into_values().collect())
    }

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn current_supply(&self) -> u64 {
        self.current_supply
    }

    fn current_stakers(&self) -> CurrentStakers {
        self.buffers().current.clone()
    }

    fn pending_stakers(&self) -> PendingStakers {
        self.buffers().pending.clone()
    }
}

fn len_u32(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

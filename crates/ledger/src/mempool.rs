//! Transactions waiting for a block, and why rejected ones were dropped.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use allyd_primitives::{Id, Tx, UnsignedTx, UtxoId};

use crate::executor::{Executor, RejectKind};
use crate::state::StateView;

const MAX_DROPPED_REASONS: usize = 64;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MempoolErrorKind {
    AlreadyInMempool,
    ConflictingInput,
    MempoolFull,
    Invalid(RejectKind),
    Internal,
}

#[derive(Clone, Debug)]
pub struct MempoolError {
    pub kind: MempoolErrorKind,
    pub message: String,
}

impl MempoolError {
    pub fn new(kind: MempoolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for MempoolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for MempoolError {}

#[derive(Default)]
pub struct Mempool {
    entries: HashMap<Id, Arc<Tx>>,
    spent: HashMap<UtxoId, Id>,
    /// Proposals by the time they take effect, then tx id.
    proposals: BTreeSet<(u64, Id)>,
    /// Decisions in arrival order.
    decisions: VecDeque<Id>,
    dropped: VecDeque<(Id, String)>,
    total_bytes: usize,
    max_bytes: usize,
    revision: u64,
}

impl Mempool {
    /// A pool holding at most `max_bytes` of transactions; zero means unbounded.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            ..Self::default()
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn contains(&self, tx_id: &Id) -> bool {
        self.entries.contains_key(tx_id)
    }

    pub fn get(&self, tx_id: &Id) -> Option<&Arc<Tx>> {
        self.entries.get(tx_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn spender(&self, utxo_id: &UtxoId) -> Option<Id> {
        self.spent.get(utxo_id).copied()
    }

    pub fn has_proposals(&self) -> bool {
        !self.proposals.is_empty()
    }

    pub fn has_decisions(&self) -> bool {
        !self.decisions.is_empty()
    }

    /// Verifies `tx` against `state` and queues it. A transaction that fails
    /// verification is dropped and its reason kept for [`Mempool::drop_reason`].
    pub fn add_unverified_tx(
        &mut self,
        tx: Arc<Tx>,
        executor: &Executor<'_>,
        state: &Arc<dyn StateView>,
    ) -> Result<(), MempoolError> {
        let tx_id = tx.id();
        if self.entries.contains_key(&tx_id) {
            return Err(MempoolError::new(
                MempoolErrorKind::AlreadyInMempool,
                "transaction already in mempool",
            ));
        }
        let size = tx.bytes().len();
        if self.max_bytes > 0 && self.total_bytes.saturating_add(size) > self.max_bytes {
            return Err(MempoolError::new(
                MempoolErrorKind::MempoolFull,
                "mempool full",
            ));
        }
        let consumed = tx.unsigned.consumed_utxos();
        for utxo_id in &consumed {
            if let Some(conflict) = self.spent.get(utxo_id) {
                return Err(MempoolError::new(
                    MempoolErrorKind::ConflictingInput,
                    format!("input {utxo_id} already spent by {conflict}"),
                ));
            }
        }

        if let Err(err) = executor.semantic_verify(&tx, state) {
            let message = err.to_string();
            self.mark_dropped(tx_id, message.clone());
            return Err(MempoolError::new(
                MempoolErrorKind::Invalid(err.kind()),
                message,
            ));
        }

        for utxo_id in consumed {
            self.spent.insert(utxo_id, tx_id);
        }
        match proposal_time(&tx) {
            Some(time) => {
                self.proposals.insert((time, tx_id));
            }
            None => self.decisions.push_back(tx_id),
        }
        self.total_bytes = self.total_bytes.saturating_add(size);
        self.entries.insert(tx_id, tx);
        self.revision = self.revision.saturating_add(1);
        Ok(())
    }

    /// The proposal that takes effect soonest.
    pub fn pop_proposal(&mut self) -> Option<Arc<Tx>> {
        let (_, tx_id) = self.proposals.first().copied()?;
        self.remove(&tx_id)
    }

    /// Up to `max` decisions, oldest first.
    pub fn pop_decisions(&mut self, max: usize) -> Vec<Arc<Tx>> {
        let mut popped = Vec::new();
        while popped.len() < max {
            let Some(tx_id) = self.decisions.front().copied() else {
                break;
            };
            match self.remove(&tx_id) {
                Some(tx) => popped.push(tx),
                None => {
                    self.decisions.pop_front();
                }
            }
        }
        popped
    }

    pub fn remove(&mut self, tx_id: &Id) -> Option<Arc<Tx>> {
        let tx = self.entries.remove(tx_id)?;
        self.total_bytes = self.total_bytes.saturating_sub(tx.bytes().len());
        for utxo_id in tx.unsigned.consumed_utxos() {
            if self.spent.get(&utxo_id) == Some(tx_id) {
                self.spent.remove(&utxo_id);
            }
        }
        match proposal_time(&tx) {
            Some(time) => {
                self.proposals.remove(&(time, *tx_id));
            }
            None => self.decisions.retain(|queued| queued != tx_id),
        }
        self.revision = self.revision.saturating_add(1);
        Some(tx)
    }

    /// Removes `tx_id` and remembers why.
    pub fn mark_dropped(&mut self, tx_id: Id, reason: impl Into<String>) {
        let reason = reason.into();
        self.remove(&tx_id);
        allyd_log::log_debug!("dropped tx {}: {}", tx_id, reason);
        self.dropped.retain(|(dropped, _)| *dropped != tx_id);
        if self.dropped.len() == MAX_DROPPED_REASONS {
            self.dropped.pop_front();
        }
        self.dropped.push_back((tx_id, reason));
    }

    pub fn drop_reason(&self, tx_id: &Id) -> Option<&str> {
        self.dropped
            .iter()
            .rev()
            .find(|(dropped, _)| dropped == tx_id)
            .map(|(_, reason)| reason.as_str())
    }
}

fn proposal_time(tx: &Tx) -> Option<u64> {
    match &tx.unsigned {
        UnsignedTx::AdvanceTime(unsigned) => Some(unsigned.time),
        unsigned => unsigned.validator().map(|validator| validator.start),
    }
}

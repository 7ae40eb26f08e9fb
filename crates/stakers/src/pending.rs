//! Stakers that have not started yet, ordered by start time.

use std::collections::BTreeMap;
use std::sync::Arc;

use allyd_primitives::{Id, NodeId, Tx, TxKind};

use crate::staker::{Staker, StakerError};

/// Everything pending for one node.
#[derive(Clone, Debug, Default)]
pub struct PendingNode {
    pub validator: Option<Staker>,
    /// Sorted by start time, then tx id.
    pub nominators: Vec<Staker>,
    pub allychains: BTreeMap<Id, Staker>,
}

impl PendingNode {
    pub fn is_empty(&self) -> bool {
        self.validator.is_none() && self.nominators.is_empty() && self.allychains.is_empty()
    }

    fn insert(&mut self, staker: Staker) -> Result<(), StakerError> {
        match staker.kind {
            TxKind::AddValidator => {
                if self.validator.is_some() {
                    return Err(StakerError::DuplicateValidator(staker.node_id));
                }
                self.validator = Some(staker);
            }
            TxKind::AddNominator => {
                let key = (staker.start, staker.tx_id());
                let position = self
                    .nominators
                    .partition_point(|existing| (existing.start, existing.tx_id()) < key);
                self.nominators.insert(position, staker);
            }
            _ => {
                if self.allychains.contains_key(&staker.allychain_id) {
                    return Err(StakerError::DuplicateAllychainValidator {
                        node_id: staker.node_id,
                        allychain_id: staker.allychain_id,
                    });
                }
                self.allychains.insert(staker.allychain_id, staker);
            }
        }
        Ok(())
    }

    fn remove(&mut self, staker: &Staker) {
        let tx_id = staker.tx_id();
        match staker.kind {
            TxKind::AddValidator => {
                if self
                    .validator
                    .as_ref()
                    .is_some_and(|validator| validator.tx_id() == tx_id)
                {
                    self.validator = None;
                }
            }
            TxKind::AddNominator => self.nominators.retain(|nominator| nominator.tx_id() != tx_id),
            _ => {
                if self
                    .allychains
                    .get(&staker.allychain_id)
                    .is_some_and(|existing| existing.tx_id() == tx_id)
                {
                    self.allychains.remove(&staker.allychain_id);
                }
            }
        }
    }
}

/// Snapshot of the pending staker set.
///
/// Mutators return a new snapshot and leave `self` untouched. Every
/// snapshot also carries the net changes since it was last flushed to
/// durable storage.
#[derive(Clone, Debug, Default)]
pub struct PendingStakers {
    stakers: Arc<Vec<Staker>>,
    nodes: Arc<BTreeMap<NodeId, Arc<PendingNode>>>,
    changes: Arc<BTreeMap<Id, Option<Arc<Tx>>>>,
}

impl PendingStakers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a flushed snapshot from stored staker transactions.
    pub fn from_stakers(txs: impl IntoIterator<Item = Arc<Tx>>) -> Result<Self, StakerError> {
        let mut stakers = Vec::new();
        let mut nodes: BTreeMap<NodeId, PendingNode> = BTreeMap::new();
        for tx in txs {
            let staker = Staker::new(tx)?;
            nodes
                .entry(staker.node_id)
                .or_default()
                .insert(staker.clone())?;
            stakers.push(staker);
        }
        stakers.sort_by_key(Staker::pending_key);
        if let Some(pair) = stakers
            .windows(2)
            .find(|pair| pair[0].tx_id() == pair[1].tx_id())
        {
            return Err(StakerError::DuplicateStaker(pair[0].tx_id()));
        }
        Ok(Self {
            stakers: Arc::new(stakers),
            nodes: Arc::new(
                nodes
                    .into_iter()
                    .map(|(node_id, node)| (node_id, Arc::new(node)))
                    .collect(),
            ),
            changes: Arc::default(),
        })
    }

    pub fn stakers(&self) -> &[Staker] {
        &self.stakers
    }

    pub fn len(&self) -> usize {
        self.stakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stakers.is_empty()
    }

    /// The staker that starts soonest.
    pub fn first(&self) -> Option<&Staker> {
        self.stakers.first()
    }

    pub fn node(&self, node_id: &NodeId) -> Option<&PendingNode> {
        self.nodes.get(node_id).map(Arc::as_ref)
    }

    pub fn validator(&self, node_id: &NodeId) -> Option<&Staker> {
        self.node(node_id)?.validator.as_ref()
    }

    pub fn nominators(&self, node_id: &NodeId) -> &[Staker] {
        self.node(node_id)
            .map(|node| node.nominators.as_slice())
            .unwrap_or_default()
    }

    pub fn allychain_validator(&self, node_id: &NodeId, allychain_id: &Id) -> Option<&Staker> {
        self.node(node_id)?.allychains.get(allychain_id)
    }

    pub fn add_staker(&self, tx: Arc<Tx>) -> Result<Self, StakerError> {
        let staker = Staker::new(tx)?;
        let key = staker.pending_key();
        let position = match self
            .stakers
            .binary_search_by(|existing| existing.pending_key().cmp(&key))
        {
            Ok(_) => return Err(StakerError::DuplicateStaker(staker.tx_id())),
            Err(position) => position,
        };

        let mut node = self
            .nodes
            .get(&staker.node_id)
            .map(|node| PendingNode::clone(node))
            .unwrap_or_default();
        node.insert(staker.clone())?;
        let mut nodes = (*self.nodes).clone();
        nodes.insert(staker.node_id, Arc::new(node));

        let mut stakers = Vec::with_capacity(self.stakers.len() + 1);
        stakers.extend_from_slice(&self.stakers[..position]);
        stakers.push(staker.clone());
        stakers.extend_from_slice(&self.stakers[position..]);

        let mut changes = (*self.changes).clone();
        changes.insert(staker.tx_id(), Some(Arc::clone(&staker.tx)));

        Ok(Self {
            stakers: Arc::new(stakers),
            nodes: Arc::new(nodes),
            changes: Arc::new(changes),
        })
    }

    /// Removes the `count` stakers that start soonest.
    pub fn delete_stakers(&self, count: usize) -> Result<Self, StakerError> {
        if count > self.stakers.len() {
            return Err(StakerError::NotEnoughStakers {
                requested: count,
                available: self.stakers.len(),
            });
        }
        if count == 0 {
            return Ok(self.clone());
        }

        let mut nodes = (*self.nodes).clone();
        let mut changes = (*self.changes).clone();
        for removed in &self.stakers[..count] {
            let Some(existing) = nodes.get(&removed.node_id) else {
                return Err(StakerError::UnknownValidator(removed.node_id));
            };
            let mut node = PendingNode::clone(existing);
            node.remove(removed);
            if node.is_empty() {
                nodes.remove(&removed.node_id);
            } else {
                nodes.insert(removed.node_id, Arc::new(node));
            }
            changes.insert(removed.tx_id(), None);
        }

        Ok(Self {
            stakers: Arc::new(self.stakers[count..].to_vec()),
            nodes: Arc::new(nodes),
            changes: Arc::new(changes),
        })
    }

    /// Net writes since the last flush: `Some` to store, `None` to delete.
    pub fn changes(&self) -> impl Iterator<Item = (&Id, &Option<Arc<Tx>>)> {
        self.changes.iter()
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// The same snapshot with its change log cleared.
    pub fn flushed(&self) -> Self {
        Self {
            stakers: Arc::clone(&self.stakers),
            nodes: Arc::clone(&self.nodes),
            changes: Arc::default(),
        }
    }
}

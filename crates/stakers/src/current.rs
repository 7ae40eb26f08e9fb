//! Active stakers, ordered by the time they leave the set.

use std::collections::BTreeMap;
use std::sync::Arc;

use allyd_primitives::{Id, NodeId, Tx, TxKind};

use crate::staker::{Staker, StakerError};

#[derive(Clone, Debug)]
pub struct CurrentStaker {
    pub staker: Staker,
    /// Reward minted if the staker completes its period; zero for allychain validators.
    pub potential_reward: u64,
}

/// A primary-network validator with everything bonded to it.
#[derive(Clone, Debug)]
pub struct CurrentValidator {
    pub validator: Staker,
    pub potential_reward: u64,
    /// Sum of the weights in `nominators`.
    pub nominator_weight: u64,
    /// Sorted by end time, then tx id.
    pub nominators: Vec<Staker>,
    pub allychains: BTreeMap<Id, Staker>,
}

impl CurrentValidator {
    pub fn weight(&self) -> u64 {
        self.validator.weight
    }

    pub fn total_weight(&self) -> Result<u64, StakerError> {
        self.validator
            .weight
            .checked_add(self.nominator_weight)
            .ok_or(StakerError::WeightOverflow)
    }

    fn add_nominator(&mut self, staker: Staker) -> Result<(), StakerError> {
        self.nominator_weight = self
            .nominator_weight
            .checked_add(staker.weight)
            .ok_or(StakerError::WeightOverflow)?;
        let key = staker.current_key();
        let position = self
            .nominators
            .partition_point(|existing| existing.current_key() < key);
        self.nominators.insert(position, staker);
        Ok(())
    }

    fn remove_nominator(&mut self, staker: &Staker) -> Result<(), StakerError> {
        let tx_id = staker.tx_id();
        let before = self.nominators.len();
        self.nominators.retain(|nominator| nominator.tx_id() != tx_id);
        if self.nominators.len() != before {
            self.nominator_weight = self
                .nominator_weight
                .checked_sub(staker.weight)
                .ok_or(StakerError::WeightUnderflow)?;
        }
        Ok(())
    }
}

/// Snapshot of the current staker set; see [`crate::PendingStakers`] for
/// the copy-on-write and change-log conventions.
#[derive(Clone, Debug, Default)]
pub struct CurrentStakers {
    stakers: Arc<Vec<CurrentStaker>>,
    validators: Arc<BTreeMap<NodeId, Arc<CurrentValidator>>>,
    changes: Arc<BTreeMap<Id, Option<CurrentStaker>>>,
}

impl CurrentStakers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a flushed snapshot from stored `(tx, potential reward)` records.
    pub fn from_stakers(
        records: impl IntoIterator<Item = (Arc<Tx>, u64)>,
    ) -> Result<Self, StakerError> {
        let mut validators = Vec::new();
        let mut nominators = Vec::new();
        let mut allychain_validators = Vec::new();
        for (tx, reward) in records {
            match tx.kind() {
                TxKind::AddValidator => validators.push((tx, reward)),
                TxKind::AddNominator => nominators.push((tx, reward)),
                TxKind::AddAllychainValidator => allychain_validators.push(tx),
                _ => return Err(StakerError::NotAStaker(tx.id())),
            }
        }
        Ok(Self::default()
            .update_stakers(validators, nominators, allychain_validators, 0)?
            .flushed())
    }

    pub fn stakers(&self) -> &[CurrentStaker] {
        &self.stakers
    }

    pub fn len(&self) -> usize {
        self.stakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stakers.is_empty()
    }

    /// The staker that leaves soonest.
    pub fn first(&self) -> Option<&CurrentStaker> {
        self.stakers.first()
    }

    pub fn validator(&self, node_id: &NodeId) -> Option<&CurrentValidator> {
        self.validators.get(node_id).map(Arc::as_ref)
    }

    pub fn validators(&self) -> impl Iterator<Item = &CurrentValidator> {
        self.validators.values().map(Arc::as_ref)
    }

    pub fn potential_reward(&self, tx_id: &Id) -> Option<u64> {
        self.stakers
            .iter()
            .find(|current| current.staker.tx_id() == *tx_id)
            .map(|current| current.potential_reward)
    }

    /// Weight per node: validator plus nominators for the primary network
    /// (the empty id), or the allychain validation weight otherwise.
    pub fn validator_set(&self, allychain_id: &Id) -> Result<BTreeMap<NodeId, u64>, StakerError> {
        let mut set = BTreeMap::new();
        for (node_id, validator) in self.validators.iter() {
            if allychain_id.is_empty() {
                set.insert(*node_id, validator.total_weight()?);
            } else if let Some(allychain) = validator.allychains.get(allychain_id) {
                set.insert(*node_id, allychain.weight);
            }
        }
        Ok(set)
    }

    /// Adds newly started stakers, then removes the `remove` stakers that
    /// leave soonest.
    pub fn update_stakers(
        &self,
        validators: Vec<(Arc<Tx>, u64)>,
        nominators: Vec<(Arc<Tx>, u64)>,
        allychain_validators: Vec<Arc<Tx>>,
        remove: usize,
    ) -> Result<Self, StakerError> {
        let mut stakers = (*self.stakers).clone();
        let mut nodes = (*self.validators).clone();
        let mut changes = (*self.changes).clone();
        stakers.reserve(validators.len() + nominators.len() + allychain_validators.len());

        for (tx, potential_reward) in validators {
            let staker = Staker::new(tx)?;
            staker.expect_kind(TxKind::AddValidator)?;
            if nodes.contains_key(&staker.node_id) {
                return Err(StakerError::DuplicateValidator(staker.node_id));
            }
            nodes.insert(
                staker.node_id,
                Arc::new(CurrentValidator {
                    validator: staker.clone(),
                    potential_reward,
                    nominator_weight: 0,
                    nominators: Vec::new(),
                    allychains: BTreeMap::new(),
                }),
            );
            push_added(&mut stakers, &mut changes, staker, potential_reward);
        }

        for (tx, potential_reward) in nominators {
            let staker = Staker::new(tx)?;
            staker.expect_kind(TxKind::AddNominator)?;
            let node = nodes
                .get_mut(&staker.node_id)
                .ok_or(StakerError::UnknownValidator(staker.node_id))?;
            Arc::make_mut(node).add_nominator(staker.clone())?;
            push_added(&mut stakers, &mut changes, staker, potential_reward);
        }

        for tx in allychain_validators {
            let staker = Staker::new(tx)?;
            staker.expect_kind(TxKind::AddAllychainValidator)?;
            let node = nodes
                .get_mut(&staker.node_id)
                .ok_or(StakerError::UnknownValidator(staker.node_id))?;
            let node = Arc::make_mut(node);
            if node.allychains.contains_key(&staker.allychain_id) {
                return Err(StakerError::DuplicateAllychainValidator {
                    node_id: staker.node_id,
                    allychain_id: staker.allychain_id,
                });
            }
            node.allychains.insert(staker.allychain_id, staker.clone());
            push_added(&mut stakers, &mut changes, staker, 0);
        }

        stakers.sort_by_key(|current| current.staker.current_key());
        if let Some(pair) = stakers
            .windows(2)
            .find(|pair| pair[0].staker.tx_id() == pair[1].staker.tx_id())
        {
            return Err(StakerError::DuplicateStaker(pair[0].staker.tx_id()));
        }

        if remove > stakers.len() {
            return Err(StakerError::NotEnoughStakers {
                requested: remove,
                available: stakers.len(),
            });
        }
        for removed in stakers.drain(..remove) {
            remove_from_node(&mut nodes, &removed.staker)?;
            changes.insert(removed.staker.tx_id(), None);
        }

        Ok(Self {
            stakers: Arc::new(stakers),
            validators: Arc::new(nodes),
            changes: Arc::new(changes),
        })
    }

    /// Removes the `count` stakers that leave soonest.
    pub fn delete_stakers(&self, count: usize) -> Result<Self, StakerError> {
        self.update_stakers(Vec::new(), Vec::new(), Vec::new(), count)
    }

    /// Net writes since the last flush: `Some` to store, `None` to delete.
    pub fn changes(&self) -> impl Iterator<Item = (&Id, &Option<CurrentStaker>)> {
        self.changes.iter()
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn flushed(&self) -> Self {
        Self {
            stakers: Arc::clone(&self.stakers),
            validators: Arc::clone(&self.validators),
            changes: Arc::default(),
        }
    }
}

fn push_added(
    stakers: &mut Vec<CurrentStaker>,
    changes: &mut BTreeMap<Id, Option<CurrentStaker>>,
    staker: Staker,
    potential_reward: u64,
) {
    let current = CurrentStaker {
        staker,
        potential_reward,
    };
    changes.insert(current.staker.tx_id(), Some(current.clone()));
    stakers.push(current);
}

fn remove_from_node(
    nodes: &mut BTreeMap<NodeId, Arc<CurrentValidator>>,
    staker: &Staker,
) -> Result<(), StakerError> {
    let entry = nodes
        .get_mut(&staker.node_id)
        .ok_or(StakerError::UnknownValidator(staker.node_id))?;
    match staker.kind {
        TxKind::AddValidator => {
            if !entry.nominators.is_empty() || !entry.allychains.is_empty() {
                return Err(StakerError::ValidatorStillBonded(staker.node_id));
            }
            nodes.remove(&staker.node_id);
        }
        TxKind::AddNominator => Arc::make_mut(entry).remove_nominator(staker)?,
        _ => {
            Arc::make_mut(entry).allychains.remove(&staker.allychain_id);
        }
    }
    Ok(())
}

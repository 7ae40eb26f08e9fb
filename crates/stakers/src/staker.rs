use std::sync::Arc;

use allyd_primitives::{DecodeError, Id, NodeId, Tx, TxKind, UnsignedTx};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StakerError {
    NotAStaker(Id),
    WrongKind { tx_id: Id, kind: TxKind },
    DuplicateStaker(Id),
    DuplicateValidator(NodeId),
    DuplicateAllychainValidator { node_id: NodeId, allychain_id: Id },
    UnknownValidator(NodeId),
    ValidatorStillBonded(NodeId),
    NotEnoughStakers { requested: usize, available: usize },
    WeightOverflow,
    WeightUnderflow,
    Decode(DecodeError),
}

impl std::fmt::Display for StakerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StakerError::NotAStaker(tx_id) => write!(f, "tx {tx_id} is not a staker"),
            StakerError::WrongKind { tx_id, kind } => {
                write!(f, "tx {tx_id} of kind {} in wrong staker slot", kind.as_str())
            }
            StakerError::DuplicateStaker(tx_id) => write!(f, "staker {tx_id} already present"),
            StakerError::DuplicateValidator(node_id) => {
                write!(f, "{node_id} already has a validator")
            }
            StakerError::DuplicateAllychainValidator {
                node_id,
                allychain_id,
            } => write!(f, "{node_id} already validates allychain {allychain_id}"),
            StakerError::UnknownValidator(node_id) => write!(f, "{node_id} is not a validator"),
            StakerError::ValidatorStillBonded(node_id) => {
                write!(f, "{node_id} removed while stakers remain bonded")
            }
            StakerError::NotEnoughStakers {
                requested,
                available,
            } => write!(f, "cannot remove {requested} of {available} stakers"),
            StakerError::WeightOverflow => write!(f, "staker weight overflow"),
            StakerError::WeightUnderflow => write!(f, "staker weight underflow"),
            StakerError::Decode(err) => write!(f, "staker record: {err}"),
        }
    }
}

impl std::error::Error for StakerError {}

impl From<DecodeError> for StakerError {
    fn from(err: DecodeError) -> Self {
        StakerError::Decode(err)
    }
}

/// Ordering key; `rank` breaks ties between kinds at the same time.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct StakerKey {
    pub time: u64,
    pub rank: u8,
    pub tx_id: Id,
}

/// A staking transaction with its period unpacked.
#[derive(Clone, Debug)]
pub struct Staker {
    pub tx: Arc<Tx>,
    pub kind: TxKind,
    pub node_id: NodeId,
    pub start: u64,
    pub end: u64,
    pub weight: u64,
    /// Empty for the primary network.
    pub allychain_id: Id,
}

impl Staker {
    pub fn new(tx: Arc<Tx>) -> Result<Self, StakerError> {
        let (validator, allychain_id) = match &tx.unsigned {
            UnsignedTx::AddValidator(inner) => (&inner.validator, Id::EMPTY),
            UnsignedTx::AddNominator(inner) => (&inner.validator, Id::EMPTY),
            UnsignedTx::AddAllychainValidator(inner) => (&inner.validator, inner.allychain_id),
            _ => return Err(StakerError::NotAStaker(tx.id())),
        };
        Ok(Self {
            kind: tx.kind(),
            node_id: validator.node_id,
            start: validator.start,
            end: validator.end,
            weight: validator.weight,
            allychain_id,
            tx,
        })
    }

    pub fn tx_id(&self) -> Id {
        self.tx.id()
    }

    pub(crate) fn expect_kind(&self, kind: TxKind) -> Result<(), StakerError> {
        if self.kind != kind {
            return Err(StakerError::WrongKind {
                tx_id: self.tx_id(),
                kind: self.kind,
            });
        }
        Ok(())
    }

    /// Start time first; at equal starts validators activate before
    /// nominators, which activate before allychain validators.
    pub fn pending_key(&self) -> StakerKey {
        let rank = match self.kind {
            TxKind::AddValidator => 0,
            TxKind::AddNominator => 1,
            _ => 2,
        };
        StakerKey {
            time: self.start,
            rank,
            tx_id: self.tx_id(),
        }
    }

    /// End time first; at equal ends allychain validators leave before
    /// nominators, which leave before validators.
    pub fn current_key(&self) -> StakerKey {
        let rank = match self.kind {
            TxKind::AddAllychainValidator => 0,
            TxKind::AddNominator => 1,
            _ => 2,
        };
        StakerKey {
            time: self.end,
            rank,
            tx_id: self.tx_id(),
        }
    }
}

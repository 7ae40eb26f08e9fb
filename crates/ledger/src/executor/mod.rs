//! Semantic verification and execution of platform transactions.
//!
//! Proposal transactions (staker additions and time advancement) execute
//! into a commit and an abort overlay; decision transactions execute into
//! one overlay plus the shared-memory writes it implies. Nothing is written
//! to the durable state until the caller applies an outcome.

mod staking;
mod standard;
mod time;

use std::collections::BTreeMap;
use std::sync::Arc;

use allyd_consensus::StakingParams;
use allyd_credentials::{verify_credential, CredentialError};
use allyd_primitives::{
    AllychainAuth, BaseTx, Credential, Id, NodeId, SyntaxError, TransferableOutput, Tx, TxKind,
    UnsignedTx, UtxoId, Validator,
};
use allyd_stakers::StakerError;
use allyd_storage::KeyValueStore;

use crate::atomic::{AtomicError, AtomicRequests, SharedMemory};
use crate::spend::SpendError;
use crate::state::{ChainState, StateError, StateView};
use crate::txindex::TxStatus;
use crate::versioned::VersionedState;

/// Broad class of a rejection.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RejectKind {
    Malformed,
    InsufficientFunds,
    InsufficientAuthorization,
    StakingPeriod,
    OverDelegated,
    Duplicate,
    UnknownType,
    Internal,
}

impl RejectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectKind::Malformed => "malformed",
            RejectKind::InsufficientFunds => "insufficient_funds",
            RejectKind::InsufficientAuthorization => "insufficient_authorization",
            RejectKind::StakingPeriod => "staking_period",
            RejectKind::OverDelegated => "over_delegated",
            RejectKind::Duplicate => "duplicate",
            RejectKind::UnknownType => "unknown_type",
            RejectKind::Internal => "internal",
        }
    }
}

#[derive(Debug)]
pub enum ExecutionError {
    Syntax(SyntaxError),
    Spend(SpendError),
    State(StateError),
    Staker(StakerError),
    Atomic(AtomicError),
    Credential(CredentialError),
    UnexpectedKind(TxKind),
    WeightTooSmall { weight: u64, minimum: u64 },
    WeightTooLarge { weight: u64, maximum: u64 },
    NominationFeeTooSmall { shares: u32, minimum: u32 },
    DurationTooShort { duration: u64, minimum: u64 },
    DurationTooLong { duration: u64, maximum: u64 },
    StartsBeforeChainTime { start: u64, chain_time: u64 },
    StartsTooFarInFuture { start: u64, latest: u64 },
    NotValidatorSubset(NodeId),
    OverDelegated { node_id: NodeId, maximum: u64 },
    AlreadyValidator(NodeId),
    AlreadyValidatingAllychain { node_id: NodeId, allychain_id: Id },
    UnknownAllychain(Id),
    WrongCredentialCount { expected: usize, got: usize },
    TimeNotAfterChainTime { time: u64, chain_time: u64 },
    TimeTooFarAhead { time: u64, latest: u64 },
    TimePastStakerChange { time: u64, next_change: u64 },
    DuplicateTx(Id),
    ImportFromSelf,
    ExportToSelf,
    InvalidImportedUtxo(UtxoId),
    NoSharedMemory,
}

impl ExecutionError {
    pub fn kind(&self) -> RejectKind {
        match self {
            ExecutionError::Syntax(_)
            | ExecutionError::WeightTooSmall { .. }
            | ExecutionError::WeightTooLarge { .. }
            | ExecutionError::NominationFeeTooSmall { .. }
            | ExecutionError::UnknownAllychain(_)
            | ExecutionError::WrongCredentialCount { .. }
            | ExecutionError::ImportFromSelf
            | ExecutionError::ExportToSelf
            | ExecutionError::InvalidImportedUtxo(_) => RejectKind::Malformed,
            ExecutionError::Spend(err) => match err {
                SpendError::InsufficientFunds { .. }
                | SpendError::InsufficientUnlockedFunds { .. }
                | SpendError::InsufficientLockedFunds { .. }
                | SpendError::MissingUtxo(_) => RejectKind::InsufficientFunds,
                SpendError::Credential { .. } => RejectKind::InsufficientAuthorization,
                SpendError::State(_) => RejectKind::Internal,
                _ => RejectKind::Malformed,
            },
            ExecutionError::Atomic(AtomicError::MissingKey { .. }) => {
                RejectKind::InsufficientFunds
            }
            ExecutionError::Credential(_) => RejectKind::InsufficientAuthorization,
            ExecutionError::DurationTooShort { .. }
            | ExecutionError::DurationTooLong { .. }
            | ExecutionError::StartsBeforeChainTime { .. }
            | ExecutionError::StartsTooFarInFuture { .. }
            | ExecutionError::NotValidatorSubset(_)
            | ExecutionError::TimeNotAfterChainTime { .. }
            | ExecutionError::TimeTooFarAhead { .. }
            | ExecutionError::TimePastStakerChange { .. } => RejectKind::StakingPeriod,
            ExecutionError::OverDelegated { .. } => RejectKind::OverDelegated,
            ExecutionError::AlreadyValidator(_)
            | ExecutionError::AlreadyValidatingAllychain { .. }
            | ExecutionError::DuplicateTx(_) => RejectKind::Duplicate,
            ExecutionError::UnexpectedKind(_) => RejectKind::UnknownType,
            ExecutionError::State(_)
            | ExecutionError::Staker(_)
            | ExecutionError::Atomic(_)
            | ExecutionError::NoSharedMemory => RejectKind::Internal,
        }
    }
}

impl std::fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionError::Syntax(err) => write!(f, "{err}"),
            ExecutionError::Spend(err) => write!(f, "{err}"),
            ExecutionError::State(err) => write!(f, "{err}"),
            ExecutionError::Staker(err) => write!(f, "{err}"),
            ExecutionError::Atomic(err) => write!(f, "{err}"),
            ExecutionError::Credential(err) => write!(f, "allychain authorization: {err}"),
            ExecutionError::UnexpectedKind(kind) => {
                write!(f, "unexpected {} transaction", kind.as_str())
            }
            ExecutionError::WeightTooSmall { weight, minimum } => {
                write!(f, "weight {weight} below minimum {minimum}")
            }
            ExecutionError::WeightTooLarge { weight, maximum } => {
                write!(f, "weight {weight} above maximum {maximum}")
            }
            ExecutionError::NominationFeeTooSmall { shares, minimum } => {
                write!(f, "nomination fee {shares} below minimum {minimum}")
            }
            ExecutionError::DurationTooShort { duration, minimum } => {
                write!(f, "staking duration {duration} below minimum {minimum}")
            }
            ExecutionError::DurationTooLong { duration, maximum } => {
                write!(f, "staking duration {duration} above maximum {maximum}")
            }
            ExecutionError::StartsBeforeChainTime { start, chain_time } => {
                write!(f, "start time {start} not after chain time {chain_time}")
            }
            ExecutionError::StartsTooFarInFuture { start, latest } => {
                write!(f, "start time {start} after latest allowed {latest}")
            }
            ExecutionError::NotValidatorSubset(node_id) => {
                write!(f, "staking period not within the validation period of {node_id}")
            }
            ExecutionError::OverDelegated { node_id, maximum } => {
                write!(f, "{node_id} would carry more than {maximum}")
            }
            ExecutionError::AlreadyValidator(node_id) => {
                write!(f, "{node_id} is already a validator")
            }
            ExecutionError::AlreadyValidatingAllychain {
                node_id,
                allychain_id,
            } => write!(f, "{node_id} already validates allychain {allychain_id}"),
            ExecutionError::UnknownAllychain(allychain_id) => {
                write!(f, "allychain {allychain_id} does not exist")
            }
            ExecutionError::WrongCredentialCount { expected, got } => {
                write!(f, "expected {expected} credentials, got {got}")
            }
            ExecutionError::TimeNotAfterChainTime { time, chain_time } => {
                write!(f, "proposed time {time} not after chain time {chain_time}")
            }
            ExecutionError::TimeTooFarAhead { time, latest } => {
                write!(f, "proposed time {time} after local bound {latest}")
            }
            ExecutionError::TimePastStakerChange { time, next_change } => {
                write!(f, "proposed time {time} after next staker change {next_change}")
            }
            ExecutionError::DuplicateTx(tx_id) => write!(f, "tx {tx_id} already accepted"),
            ExecutionError::ImportFromSelf => write!(f, "import from this chain"),
            ExecutionError::ExportToSelf => write!(f, "export to this chain"),
            ExecutionError::InvalidImportedUtxo(utxo_id) => {
                write!(f, "imported utxo {utxo_id} is malformed")
            }
            ExecutionError::NoSharedMemory => write!(f, "shared memory unavailable"),
        }
    }
}

impl std::error::Error for ExecutionError {}

impl From<SyntaxError> for ExecutionError {
    fn from(err: SyntaxError) -> Self {
        ExecutionError::Syntax(err)
    }
}

impl From<SpendError> for ExecutionError {
    fn from(err: SpendError) -> Self {
        ExecutionError::Spend(err)
    }
}

impl From<StateError> for ExecutionError {
    fn from(err: StateError) -> Self {
        ExecutionError::State(err)
    }
}

impl From<StakerError> for ExecutionError {
    fn from(err: StakerError) -> Self {
        ExecutionError::Staker(err)
    }
}

impl From<AtomicError> for ExecutionError {
    fn from(err: AtomicError) -> Self {
        ExecutionError::Atomic(err)
    }
}

/// The two successor states of a proposal; exactly one is applied.
pub struct ProposalOutcome {
    pub on_commit: VersionedState,
    pub on_abort: VersionedState,
    /// This node's vote when the proposal is put to consensus.
    pub prefers_commit: bool,
}

pub struct DecisionOutcome {
    pub state: VersionedState,
    /// Shared-memory writes keyed by peer chain.
    pub atomic: BTreeMap<Id, AtomicRequests>,
}

impl DecisionOutcome {
    /// Applies the shared-memory writes, then the overlay. The overlay's
    /// parent must be `chain` or an overlay already applied to it.
    pub fn apply<S: KeyValueStore>(
        &mut self,
        chain: &ChainState<S>,
        shared_memory: Option<&dyn SharedMemory>,
    ) -> Result<(), ExecutionError> {
        if !self.atomic.is_empty() {
            let shared_memory = shared_memory.ok_or(ExecutionError::NoSharedMemory)?;
            shared_memory.apply(&self.atomic)?;
            self.atomic.clear();
        }
        self.state.apply(chain)?;
        Ok(())
    }
}

/// Executes transactions against a parent state.
#[derive(Clone, Copy)]
pub struct Executor<'a> {
    params: &'a StakingParams,
    /// This node's wall clock, in unix seconds.
    local_time: u64,
    shared_memory: Option<&'a dyn SharedMemory>,
}

impl<'a> Executor<'a> {
    /// `local_time` is this node's clock, in unix seconds.
    pub fn new(params: &'a StakingParams, local_time: u64) -> Self {
        Self {
            params,
            local_time,
            shared_memory: None,
        }
    }

    pub fn with_shared_memory(mut self, shared_memory: &'a dyn SharedMemory) -> Self {
        self.shared_memory = Some(shared_memory);
        self
    }

    pub fn params(&self) -> &'a StakingParams {
        self.params
    }

    pub fn local_time(&self) -> u64 {
        self.local_time
    }

    pub fn execute_proposal(
        &self,
        tx: &Arc<Tx>,
        parent: &Arc<dyn StateView>,
    ) -> Result<ProposalOutcome, ExecutionError> {
        let result = match &tx.unsigned {
            UnsignedTx::AddValidator(unsigned) => self.add_validator(tx, unsigned, parent),
            UnsignedTx::AddNominator(unsigned) => self.add_nominator(tx, unsigned, parent),
            UnsignedTx::AddAllychainValidator(unsigned) => {
                self.add_allychain_validator(tx, unsigned, parent)
            }
            UnsignedTx::AdvanceTime(unsigned) => self.advance_time(unsigned, parent),
            UnsignedTx::Base(_)
            | UnsignedTx::CreateAllychain(_)
            | UnsignedTx::CreateChain(_)
            | UnsignedTx::Import(_)
            | UnsignedTx::Export(_) => Err(ExecutionError::UnexpectedKind(tx.kind())),
        };
        log_rejection(tx, &result);
        result
    }

    pub fn execute_decision(
        &self,
        tx: &Arc<Tx>,
        parent: &Arc<dyn StateView>,
    ) -> Result<DecisionOutcome, ExecutionError> {
        let result = match &tx.unsigned {
            UnsignedTx::Base(unsigned) => self.base(tx, unsigned, parent),
            UnsignedTx::CreateAllychain(unsigned) => self.create_allychain(tx, unsigned, parent),
            UnsignedTx::CreateChain(unsigned) => self.create_chain(tx, unsigned, parent),
            UnsignedTx::Import(unsigned) => self.import(tx, unsigned, parent),
            UnsignedTx::Export(unsigned) => self.export(tx, unsigned, parent),
            UnsignedTx::AddValidator(_)
            | UnsignedTx::AddNominator(_)
            | UnsignedTx::AddAllychainValidator(_)
            | UnsignedTx::AdvanceTime(_) => Err(ExecutionError::UnexpectedKind(tx.kind())),
        };
        log_rejection(tx, &result);
        result
    }

    /// Executes `tx` and discards the result.
    pub fn semantic_verify(
        &self,
        tx: &Arc<Tx>,
        parent: &Arc<dyn StateView>,
    ) -> Result<(), ExecutionError> {
        if tx.kind().is_proposal() {
            self.execute_proposal(tx, parent).map(|_| ())
        } else {
            self.execute_decision(tx, parent).map(|_| ())
        }
    }

    fn native_asset(&self) -> Id {
        Id::from(self.params.asset_id)
    }

    fn chain_id(&self) -> Id {
        Id::from(self.params.chain_id)
    }

    /// Checks run before any transaction-specific rule.
    fn verify_fresh(&self, tx: &Tx, parent: &dyn StateView) -> Result<(), ExecutionError> {
        tx.syntactic_verify(self.params)?;
        if parent.tx(&tx.id())?.is_some() {
            return Err(ExecutionError::DuplicateTx(tx.id()));
        }
        Ok(())
    }

    fn verify_duration(&self, validator: &Validator) -> Result<(), ExecutionError> {
        let duration = validator.duration();
        if duration < self.params.min_stake_duration {
            return Err(ExecutionError::DurationTooShort {
                duration,
                minimum: self.params.min_stake_duration,
            });
        }
        if duration > self.params.max_stake_duration {
            return Err(ExecutionError::DurationTooLong {
                duration,
                maximum: self.params.max_stake_duration,
            });
        }
        Ok(())
    }

    /// A staker must start after chain time and within the scheduling window.
    fn verify_start_time(&self, start: u64, chain_time: u64) -> Result<(), ExecutionError> {
        if start <= chain_time {
            return Err(ExecutionError::StartsBeforeChainTime { start, chain_time });
        }
        let latest = chain_time.saturating_add(self.params.max_future_start_time);
        if start > latest {
            return Err(ExecutionError::StartsTooFarInFuture { start, latest });
        }
        Ok(())
    }

    /// Verifies the allychain owner's authorization, carried by the last
    /// credential, and returns the credentials left for the inputs.
    fn verify_allychain_auth<'t>(
        &self,
        tx: &'t Tx,
        base: &BaseTx,
        allychain_id: &Id,
        auth: &AllychainAuth,
        parent: &dyn StateView,
    ) -> Result<&'t [Credential], ExecutionError> {
        let expected = base.ins.len() + 1;
        if tx.creds.len() != expected {
            return Err(ExecutionError::WrongCredentialCount {
                expected,
                got: tx.creds.len(),
            });
        }
        let allychain = parent
            .allychain(allychain_id)?
            .ok_or(ExecutionError::UnknownAllychain(*allychain_id))?;
        let UnsignedTx::CreateAllychain(create) = &allychain.unsigned else {
            return Err(ExecutionError::UnknownAllychain(*allychain_id));
        };
        let Some((auth_credential, spend_credentials)) = tx.creds.split_last() else {
            return Err(ExecutionError::WrongCredentialCount { expected, got: 0 });
        };
        verify_credential(
            &create.owner,
            &auth.sig_indices,
            auth_credential,
            &tx.signature_digest(),
            parent.timestamp(),
        )
        .map_err(ExecutionError::Credential)?;
        Ok(spend_credentials)
    }
}

/// An overlay that consumes the inputs of `base` and produces its outputs,
/// followed by `extra_outputs`, and records `tx` with `status`.
fn spend_branch(
    parent: &Arc<dyn StateView>,
    tx: &Arc<Tx>,
    base: &BaseTx,
    extra_outputs: &[TransferableOutput],
    status: TxStatus,
) -> VersionedState {
    let mut state = VersionedState::new(Arc::clone(parent));
    state.consume_inputs(&base.ins);
    state.produce_outputs(tx.id(), 0, base.outs.iter().chain(extra_outputs));
    state.add_tx(Arc::clone(tx), status);
    state
}

fn log_rejection<T>(tx: &Tx, result: &Result<T, ExecutionError>) {
    if let Err(err) = result {
        allyd_log::log_debug!(
            "rejected {} tx {} ({}): {}",
            tx.kind().as_str(),
            tx.id(),
            err.kind().as_str(),
            err
        );
    }
}

//! Proposals that add stakers.

use std::sync::Arc;

use allyd_primitives::{
    AddAllychainValidatorTx, AddNominatorTx, AddValidatorTx, NodeId, Tx, Validator,
};
use allyd_stakers::{can_delegate, Staker};

use super::{spend_branch, ExecutionError, Executor, ProposalOutcome};
use crate::spend::{verify_spend, FlowCheck};
use crate::state::StateView;
use crate::txindex::TxStatus;

/// The primary validation a nominator or allychain validator attaches to.
struct Delegatee {
    validator: Validator,
    /// Validator weight plus the weight of its current nominators.
    current_weight: u64,
    current_nominators: Vec<Staker>,
}

impl<'a> Executor<'a> {
    pub(super) fn add_validator(
        &self,
        tx: &Arc<Tx>,
        unsigned: &AddValidatorTx,
        parent: &Arc<dyn StateView>,
    ) -> Result<ProposalOutcome, ExecutionError> {
        self.verify_fresh(tx, parent.as_ref())?;
        let validator = &unsigned.validator;
        self.verify_duration(validator)?;
        if validator.weight < self.params.min_validator_stake {
            return Err(ExecutionError::WeightTooSmall {
                weight: validator.weight,
                minimum: self.params.min_validator_stake,
            });
        }
        if validator.weight > self.params.max_validator_stake {
            return Err(ExecutionError::WeightTooLarge {
                weight: validator.weight,
                maximum: self.params.max_validator_stake,
            });
        }
        if unsigned.shares < self.params.min_nomination_fee {
            return Err(ExecutionError::NominationFeeTooSmall {
                shares: unsigned.shares,
                minimum: self.params.min_nomination_fee,
            });
        }

        let current = parent.current_stakers();
        let pending = parent.pending_stakers();
        if current.validator(&validator.node_id).is_some()
            || pending.validator(&validator.node_id).is_some()
        {
            return Err(ExecutionError::AlreadyValidator(validator.node_id));
        }

        let chain_time = parent.timestamp();
        let outs = tx.unsigned.produced_outputs();
        verify_spend(
            parent.as_ref(),
            &FlowCheck {
                ins: &unsigned.base.ins,
                outs: &outs,
                creds: &tx.creds,
                digest: tx.signature_digest(),
                time: chain_time,
                fee: self.params.add_staker_tx_fee,
                fee_asset: self.native_asset(),
            },
        )?;

        self.verify_start_time(validator.start, chain_time)?;

        let mut on_commit = spend_branch(parent, tx, &unsigned.base, &[], TxStatus::Committed);
        on_commit.set_pending_stakers(pending.add_staker(Arc::clone(tx))?);
        let on_abort = spend_branch(parent, tx, &unsigned.base, &unsigned.stake, TxStatus::Aborted);

        Ok(ProposalOutcome {
            on_commit,
            on_abort,
            prefers_commit: validator.start > self.local_time,
        })
    }

    pub(super) fn add_nominator(
        &self,
        tx: &Arc<Tx>,
        unsigned: &AddNominatorTx,
        parent: &Arc<dyn StateView>,
    ) -> Result<ProposalOutcome, ExecutionError> {
        self.verify_fresh(tx, parent.as_ref())?;
        let candidate = &unsigned.validator;
        self.verify_duration(candidate)?;
        if candidate.weight < self.params.min_nominator_stake {
            return Err(ExecutionError::WeightTooSmall {
                weight: candidate.weight,
                minimum: self.params.min_nominator_stake,
            });
        }

        let pending = parent.pending_stakers();
        let delegatee = find_delegatee(parent.as_ref(), &candidate.node_id)?;
        if !candidate.bounded_by(&delegatee.validator) {
            return Err(ExecutionError::NotValidatorSubset(candidate.node_id));
        }

        let chain_time = parent.timestamp();
        let maximum = self
            .params
            .max_delegation_weight(delegatee.validator.weight, chain_time);
        let fits = can_delegate(
            &delegatee.current_nominators,
            pending.nominators(&candidate.node_id),
            candidate,
            delegatee.current_weight,
            maximum,
        )?;
        if !fits {
            return Err(ExecutionError::OverDelegated {
                node_id: candidate.node_id,
                maximum,
            });
        }

        let outs = tx.unsigned.produced_outputs();
        verify_spend(
            parent.as_ref(),
            &FlowCheck {
                ins: &unsigned.base.ins,
                outs: &outs,
                creds: &tx.creds,
                digest: tx.signature_digest(),
                time: chain_time,
                fee: self.params.add_staker_tx_fee,
                fee_asset: self.native_asset(),
            },
        )?;

        self.verify_start_time(candidate.start, chain_time)?;

        let mut on_commit = spend_branch(parent, tx, &unsigned.base, &[], TxStatus::Committed);
        on_commit.set_pending_stakers(pending.add_staker(Arc::clone(tx))?);
        let on_abort = spend_branch(parent, tx, &unsigned.base, &unsigned.stake, TxStatus::Aborted);

        Ok(ProposalOutcome {
            on_commit,
            on_abort,
            prefers_commit: candidate.start > self.local_time,
        })
    }

    pub(super) fn add_allychain_validator(
        &self,
        tx: &Arc<Tx>,
        unsigned: &AddAllychainValidatorTx,
        parent: &Arc<dyn StateView>,
    ) -> Result<ProposalOutcome, ExecutionError> {
        self.verify_fresh(tx, parent.as_ref())?;
        let candidate = &unsigned.validator;
        self.verify_duration(candidate)?;

        let current = parent.current_stakers();
        let pending = parent.pending_stakers();
        let delegatee = find_delegatee(parent.as_ref(), &candidate.node_id)?;
        if !candidate.bounded_by(&delegatee.validator) {
            return Err(ExecutionError::NotValidatorSubset(candidate.node_id));
        }

        let already_current = current
            .validator(&candidate.node_id)
            .is_some_and(|node| node.allychains.contains_key(&unsigned.allychain_id));
        let already_pending = pending
            .allychain_validator(&candidate.node_id, &unsigned.allychain_id)
            .is_some();
        if already_current || already_pending {
            return Err(ExecutionError::AlreadyValidatingAllychain {
                node_id: candidate.node_id,
                allychain_id: unsigned.allychain_id,
            });
        }

        let spend_credentials = self.verify_allychain_auth(
            tx,
            &unsigned.base,
            &unsigned.allychain_id,
            &unsigned.allychain_auth,
            parent.as_ref(),
        )?;

        let chain_time = parent.timestamp();
        let outs = tx.unsigned.produced_outputs();
        verify_spend(
            parent.as_ref(),
            &FlowCheck {
                ins: &unsigned.base.ins,
                outs: &outs,
                creds: spend_credentials,
                digest: tx.signature_digest(),
                time: chain_time,
                fee: self.params.tx_fee,
                fee_asset: self.native_asset(),
            },
        )?;

        self.verify_start_time(candidate.start, chain_time)?;

        let mut on_commit = spend_branch(parent, tx, &unsigned.base, &[], TxStatus::Committed);
        on_commit.set_pending_stakers(pending.add_staker(Arc::clone(tx))?);
        let on_abort = spend_branch(parent, tx, &unsigned.base, &[], TxStatus::Aborted);

        Ok(ProposalOutcome {
            on_commit,
            on_abort,
            prefers_commit: candidate.start > self.local_time,
        })
    }
}

/// Looks up the primary validation of `node_id`, current first.
fn find_delegatee(parent: &dyn StateView, node_id: &NodeId) -> Result<Delegatee, ExecutionError> {
    if let Some(current) = parent.current_stakers().validator(node_id) {
        return Ok(Delegatee {
            validator: staker_period(&current.validator),
            current_weight: current.total_weight()?,
            current_nominators: current.nominators.clone(),
        });
    }
    match parent.pending_stakers().validator(node_id) {
        Some(pending) => Ok(Delegatee {
            validator: staker_period(pending),
            current_weight: pending.weight,
            current_nominators: Vec::new(),
        }),
        None => Err(ExecutionError::NotValidatorSubset(*node_id)),
    }
}

fn staker_period(staker: &Staker) -> Validator {
    Validator {
        node_id: staker.node_id,
        start: staker.start,
        end: staker.end,
        weight: staker.weight,
    }
}

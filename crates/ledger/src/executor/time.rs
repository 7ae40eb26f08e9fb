//! Chain time advancement.

use std::sync::Arc;

use allyd_consensus::potential_reward;
use allyd_primitives::{AdvanceTimeTx, TxKind};
use allyd_stakers::StakerError;

use super::{ExecutionError, Executor, ProposalOutcome};
use crate::state::{next_staker_change_time, StateError, StateView};
use crate::versioned::VersionedState;

impl<'a> Executor<'a> {
    /// Moves chain time to `unsigned.time`, starting every pending staker
    /// due by then and retiring allychain validators that have ended.
    pub(super) fn advance_time(
        &self,
        unsigned: &AdvanceTimeTx,
        parent: &Arc<dyn StateView>,
    ) -> Result<ProposalOutcome, ExecutionError> {
        let time = unsigned.time;
        let chain_time = parent.timestamp();
        if time <= chain_time {
            return Err(ExecutionError::TimeNotAfterChainTime { time, chain_time });
        }
        let latest = self.local_time.saturating_add(self.params.sync_bound);
        if time > latest {
            return Err(ExecutionError::TimeTooFarAhead { time, latest });
        }

        let current = parent.current_stakers();
        let pending = parent.pending_stakers();
        if let Some(next_change) = next_staker_change_time(&current, &pending) {
            if time > next_change {
                return Err(ExecutionError::TimePastStakerChange { time, next_change });
            }
        }

        let mut current_supply = parent.current_supply();
        let mut validators = Vec::new();
        let mut nominators = Vec::new();
        let mut allychain_validators = Vec::new();
        let mut started = 0;
        for staker in pending.stakers() {
            if staker.start > time {
                break;
            }
            started += 1;
            match staker.kind {
                TxKind::AddValidator | TxKind::AddNominator => {
                    let reward = potential_reward(
                        &self.params.rewards,
                        staker.end.saturating_sub(staker.start),
                        staker.weight,
                        current_supply,
                    );
                    current_supply = current_supply
                        .checked_add(reward)
                        .ok_or(StateError::SupplyOverflow)?;
                    let entry = (Arc::clone(&staker.tx), reward);
                    if staker.kind == TxKind::AddValidator {
                        validators.push(entry);
                    } else {
                        nominators.push(entry);
                    }
                }
                TxKind::AddAllychainValidator => {
                    // Skipped when it ended before it could start.
                    if staker.end > time {
                        allychain_validators.push(Arc::clone(&staker.tx));
                    }
                }
                kind => {
                    return Err(StakerError::WrongKind {
                        tx_id: staker.tx_id(),
                        kind,
                    }
                    .into())
                }
            }
        }

        let ended = current
            .stakers()
            .iter()
            .take_while(|current| {
                current.staker.end <= time && current.staker.kind == TxKind::AddAllychainValidator
            })
            .count();

        let mut on_commit = VersionedState::new(Arc::clone(parent));
        on_commit.set_timestamp(time);
        on_commit.set_current_supply(current_supply);
        on_commit.set_current_stakers(current.update_stakers(
            validators,
            nominators,
            allychain_validators,
            ended,
        )?);
        on_commit.set_pending_stakers(pending.delete_stakers(started)?);

        allyd_log::log_debug!(
            "advance time to {}: {} stakers start, {} allychain validators end",
            time,
            started,
            ended
        );

        Ok(ProposalOutcome {
            on_commit,
            on_abort: VersionedState::new(Arc::clone(parent)),
            prefers_commit: time <= self.local_time,
        })
    }
}

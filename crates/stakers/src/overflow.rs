//! Peak bonded weight of a validator over a delegation window.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use allyd_primitives::Validator;

use crate::staker::{Staker, StakerError};

/// Largest stake the validator carries at any instant of `[start, end]`.
///
/// `current` are the nominators bonded now and `pending` those scheduled,
/// sorted by start time. `current_stake` is the weight bonded now,
/// validator included.
pub fn max_stake_amount(
    current: &[Staker],
    pending: &[Staker],
    start: u64,
    end: u64,
    mut current_stake: u64,
) -> Result<u64, StakerError> {
    // Min-heap of (end time, weight) for nominators that will leave.
    let mut to_remove: BinaryHeap<Reverse<(u64, u64)>> = current
        .iter()
        .map(|nominator| Reverse((nominator.end, nominator.weight)))
        .collect();
    let mut max_stake = 0u64;

    for next in pending {
        if next.start > end {
            break;
        }

        while let Some(&Reverse((removal_end, weight))) = to_remove.peek() {
            if removal_end > next.start {
                break;
            }
            // Still bonded at some instant after the window opened.
            if removal_end > start {
                max_stake = max_stake.max(current_stake);
            }
            current_stake = current_stake
                .checked_sub(weight)
                .ok_or(StakerError::WeightUnderflow)?;
            to_remove.pop();
        }

        current_stake = current_stake
            .checked_add(next.weight)
            .ok_or(StakerError::WeightOverflow)?;
        if next.start >= start {
            max_stake = max_stake.max(current_stake);
        }
        to_remove.push(Reverse((next.end, next.weight)));
    }

    // Advance to the opening of the window.
    while let Some(&Reverse((removal_end, weight))) = to_remove.peek() {
        if removal_end > start {
            break;
        }
        current_stake = current_stake
            .checked_sub(weight)
            .ok_or(StakerError::WeightUnderflow)?;
        to_remove.pop();
    }

    Ok(max_stake.max(current_stake))
}

/// Whether adding `candidate` keeps the peak stake within `maximum_stake`.
pub fn can_delegate(
    current: &[Staker],
    pending: &[Staker],
    candidate: &Validator,
    current_stake: u64,
    maximum_stake: u64,
) -> Result<bool, StakerError> {
    let peak = max_stake_amount(
        current,
        pending,
        candidate.start,
        candidate.end,
        current_stake,
    )?;
    let with_candidate = peak
        .checked_add(candidate.weight)
        .ok_or(StakerError::WeightOverflow)?;
    Ok(with_candidate <= maximum_stake)
}

//! Staking reward curve.

use primitive_types::U256;

use crate::constants::PERCENT_DENOMINATOR;
use crate::money::Amount;
use crate::params::RewardParams;

/// Reward minted for staking `staked_amount` for `staked_duration` seconds
/// while `current_supply` units exist. Never exceeds the remaining supply.
pub fn potential_reward(
    params: &RewardParams,
    staked_duration: u64,
    staked_amount: Amount,
    current_supply: Amount,
) -> Amount {
    if current_supply == 0 || params.minting_period == 0 {
        return 0;
    }
    let remaining_supply = params.supply_cap.saturating_sub(current_supply);
    if remaining_supply == 0 {
        return 0;
    }

    let rate_spread = params
        .max_consumption_rate
        .saturating_sub(params.min_consumption_rate);
    let minting_period = U256::from(params.minting_period);
    let duration = U256::from(staked_duration);

    let rate_numerator = U256::from(rate_spread) * duration
        + U256::from(params.min_consumption_rate) * minting_period;
    let rate_denominator = minting_period * U256::from(PERCENT_DENOMINATOR);

    let reward = U256::from(remaining_supply)
        .saturating_mul(rate_numerator)
        .saturating_mul(U256::from(staked_amount))
        .saturating_mul(duration)
        / rate_denominator
        / U256::from(current_supply)
        / minting_period;

    if reward > U256::from(remaining_supply) {
        return remaining_supply;
    }
    reward.low_u64()
}

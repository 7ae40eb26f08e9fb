//! Staking parameters, monetary units, upgrade schedule, and reward curve.

pub mod constants;
pub mod money;
pub mod params;
pub mod rewards;
pub mod upgrades;

pub use params::{staking_params, Network, RewardParams, StakingParams};
pub use rewards::potential_reward;
pub use upgrades::{Hash256, UpgradeIndex};

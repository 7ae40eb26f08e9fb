//! Staking parameter definitions and per-network presets.

use crate::constants::MAX_VALIDATOR_WEIGHT_FACTOR;
use crate::money::{Amount, KILO, MEGA, MILLI, UNIT};
use crate::upgrades::{
    network_upgrade_active, Hash256, NetworkUpgrade, UpgradeIndex, MAX_NETWORK_UPGRADES,
};

const DAY: u64 = 24 * 60 * 60;
const WEEK: u64 = 7 * DAY;
const YEAR: u64 = 365 * DAY;

/// The platform chain is identified by the empty id on every network.
pub const PLATFORM_CHAIN_ID: Hash256 = [0u8; 32];

const MAINNET_ASSET_ID: Hash256 = [
    0x21, 0xe6, 0x73, 0x17, 0xcb, 0xc4, 0xbe, 0x2a, 0xeb, 0x00, 0x67, 0x7a, 0xd6, 0x46, 0x27,
    0x78, 0xa8, 0xf5, 0x22, 0x74, 0xb9, 0xd6, 0x05, 0xdf, 0x25, 0x91, 0xb2, 0x30, 0x27, 0xa8,
    0x7d, 0xff,
];
const TESTNET_ASSET_ID: Hash256 = [
    0x3d, 0x9b, 0xda, 0xc0, 0xed, 0x1d, 0x76, 0x13, 0x30, 0xcf, 0x68, 0x0e, 0xfd, 0xeb, 0x1a,
    0x42, 0x15, 0x9e, 0xb3, 0x87, 0xd6, 0xd2, 0x95, 0x0c, 0x96, 0xf7, 0xd2, 0x8f, 0x61, 0xbb,
    0xe2, 0xaa,
];
const LOCAL_ASSET_ID: Hash256 = [
    0x9a, 0x3e, 0x5f, 0x4c, 0x10, 0x02, 0x77, 0x81, 0x6b, 0x33, 0xd0, 0x4e, 0x8f, 0x1a, 0xc2,
    0x05, 0x61, 0x7e, 0x94, 0x2b, 0x0d, 0xee, 0x38, 0x54, 0xab, 0x19, 0x0f, 0x6c, 0x72, 0x88,
    0x3b, 0xc1,
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Network {
    Mainnet,
    Testnet,
    Local,
}

impl Network {
    pub fn network_id(self) -> u32 {
        match self {
            Network::Mainnet => 1,
            Network::Testnet => 5,
            Network::Local => 12_345,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Local => "local",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Some(Network::Mainnet),
            "testnet" => Some(Network::Testnet),
            "local" => Some(Network::Local),
            _ => None,
        }
    }
}

/// Minting curve: the consumption rate grows linearly from `min` to `max`
/// as the staking duration approaches `minting_period`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RewardParams {
    pub max_consumption_rate: u64,
    pub min_consumption_rate: u64,
    pub minting_period: u64,
    pub supply_cap: Amount,
}

#[derive(Clone, Debug)]
pub struct StakingParams {
    pub network: Network,
    pub network_id: u32,
    pub chain_id: Hash256,
    pub asset_id: Hash256,
    pub tx_fee: Amount,
    pub add_staker_tx_fee: Amount,
    pub create_allychain_tx_fee: Amount,
    pub create_chain_tx_fee: Amount,
    pub min_validator_stake: Amount,
    pub max_validator_stake: Amount,
    pub min_nominator_stake: Amount,
    /// Minimum nomination fee, in parts of `PERCENT_DENOMINATOR`.
    pub min_nomination_fee: u32,
    pub min_stake_duration: u64,
    pub max_stake_duration: u64,
    /// How far past chain time a staker may be scheduled to start.
    pub max_future_start_time: u64,
    /// How far past local time a proposed chain time may be.
    pub sync_bound: u64,
    pub rewards: RewardParams,
    pub upgrades: [NetworkUpgrade; MAX_NETWORK_UPGRADES],
}

impl StakingParams {
    pub fn stake_cap_active(&self, chain_time: u64) -> bool {
        network_upgrade_active(chain_time, &self.upgrades, UpgradeIndex::StakeCap)
    }

    /// Peak weight a validator of `validator_weight` may carry, nominations included.
    pub fn max_delegation_weight(&self, validator_weight: Amount, chain_time: u64) -> Amount {
        let by_factor = validator_weight.saturating_mul(MAX_VALIDATOR_WEIGHT_FACTOR);
        if self.stake_cap_active(chain_time) {
            by_factor.min(self.max_validator_stake)
        } else {
            by_factor
        }
    }
}

pub fn staking_params(network: Network) -> StakingParams {
    match network {
        Network::Mainnet => mainnet_params(),
        Network::Testnet => testnet_params(),
        Network::Local => local_params(),
    }
}

fn default_rewards() -> RewardParams {
    RewardParams {
        max_consumption_rate: 120_000,
        min_consumption_rate: 100_000,
        minting_period: YEAR,
        supply_cap: 720 * MEGA,
    }
}

fn mainnet_params() -> StakingParams {
    StakingParams {
        network: Network::Mainnet,
        network_id: Network::Mainnet.network_id(),
        chain_id: PLATFORM_CHAIN_ID,
        asset_id: MAINNET_ASSET_ID,
        tx_fee: MILLI,
        add_staker_tx_fee: 0,
        create_allychain_tx_fee: UNIT,
        create_chain_tx_fee: UNIT,
        min_validator_stake: 2 * KILO,
        max_validator_stake: 3 * MEGA,
        min_nominator_stake: 25 * UNIT,
        min_nomination_fee: 20_000,
        min_stake_duration: 2 * WEEK,
        max_stake_duration: YEAR,
        max_future_start_time: 2 * WEEK,
        sync_bound: 10,
        rewards: default_rewards(),
        upgrades: [
            NetworkUpgrade::at(NetworkUpgrade::ALWAYS_ACTIVE),
            NetworkUpgrade::at(1_638_468_000),
        ],
    }
}

fn testnet_params() -> StakingParams {
    StakingParams {
        network: Network::Testnet,
        network_id: Network::Testnet.network_id(),
        asset_id: TESTNET_ASSET_ID,
        min_validator_stake: UNIT,
        min_nominator_stake: UNIT,
        min_stake_duration: DAY,
        upgrades: [
            NetworkUpgrade::at(NetworkUpgrade::ALWAYS_ACTIVE),
            NetworkUpgrade::at(1_637_766_000),
        ],
        ..mainnet_params()
    }
}

fn local_params() -> StakingParams {
    StakingParams {
        network: Network::Local,
        network_id: Network::Local.network_id(),
        asset_id: LOCAL_ASSET_ID,
        create_allychain_tx_fee: 100 * MILLI,
        create_chain_tx_fee: 100 * MILLI,
        min_validator_stake: 2 * KILO,
        min_nominator_stake: 25 * UNIT,
        min_stake_duration: DAY,
        upgrades: [
            NetworkUpgrade::at(NetworkUpgrade::ALWAYS_ACTIVE),
            NetworkUpgrade::at(NetworkUpgrade::ALWAYS_ACTIVE),
        ],
        ..mainnet_params()
    }
}

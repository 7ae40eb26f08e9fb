//! Network upgrade schedule keyed by chain timestamp.

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum UpgradeIndex {
    Base = 0,
    StakeCap = 1,
}

pub const MAX_NETWORK_UPGRADES: usize = 2;

pub const ALL_UPGRADES: [UpgradeIndex; MAX_NETWORK_UPGRADES] =
    [UpgradeIndex::Base, UpgradeIndex::StakeCap];

impl UpgradeIndex {
    pub const fn as_usize(self) -> usize {
        self as usize
    }
}

pub type Hash256 = [u8; 32];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct NetworkUpgrade {
    pub activation_time: u64,
}

impl NetworkUpgrade {
    pub const ALWAYS_ACTIVE: u64 = 0;
    pub const NO_ACTIVATION_TIME: u64 = u64::MAX;

    pub const fn at(activation_time: u64) -> Self {
        Self { activation_time }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UpgradeState {
    Disabled,
    Pending,
    Active,
}

#[derive(Clone, Copy, Debug)]
pub struct UpgradeInfo {
    pub name: &'static str,
    pub info: &'static str,
}

pub const NETWORK_UPGRADE_INFO: [UpgradeInfo; MAX_NETWORK_UPGRADES] = [
    UpgradeInfo {
        name: "Base",
        info: "Staking ledger at launch",
    },
    UpgradeInfo {
        name: "StakeCap",
        info: "Delegation cap additionally clamped by the maximum validator stake",
    },
];

pub fn network_upgrade_state(
    time: u64,
    upgrades: &[NetworkUpgrade; MAX_NETWORK_UPGRADES],
    idx: UpgradeIndex,
) -> UpgradeState {
    let activation_time = upgrades[idx.as_usize()].activation_time;
    if activation_time == NetworkUpgrade::NO_ACTIVATION_TIME {
        UpgradeState::Disabled
    } else if time >= activation_time {
        UpgradeState::Active
    } else {
        UpgradeState::Pending
    }
}

pub fn network_upgrade_active(
    time: u64,
    upgrades: &[NetworkUpgrade; MAX_NETWORK_UPGRADES],
    idx: UpgradeIndex,
) -> bool {
    network_upgrade_state(time, upgrades, idx) == UpgradeState::Active
}

pub fn current_epoch(time: u64, upgrades: &[NetworkUpgrade; MAX_NETWORK_UPGRADES]) -> UpgradeIndex {
    ALL_UPGRADES
        .iter()
        .rev()
        .copied()
        .find(|idx| network_upgrade_active(time, upgrades, *idx))
        .unwrap_or(UpgradeIndex::Base)
}

pub fn next_activation_time(
    time: u64,
    upgrades: &[NetworkUpgrade; MAX_NETWORK_UPGRADES],
) -> Option<u64> {
    ALL_UPGRADES
        .iter()
        .skip(1)
        .find(|idx| network_upgrade_state(time, upgrades, **idx) == UpgradeState::Pending)
        .map(|idx| upgrades[idx.as_usize()].activation_time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{staking_params, Network};

    #[test]
    fn stake_cap_activation_edges() {
        let params = staking_params(Network::Mainnet);
        let activation = params.upgrades[UpgradeIndex::StakeCap.as_usize()].activation_time;

        assert!(!network_upgrade_active(
            activation - 1,
            &params.upgrades,
            UpgradeIndex::StakeCap
        ));
        assert!(network_upgrade_active(
            activation,
            &params.upgrades,
            UpgradeIndex::StakeCap
        ));
        assert_eq!(current_epoch(activation - 1, &params.upgrades), UpgradeIndex::Base);
        assert_eq!(current_epoch(activation, &params.upgrades), UpgradeIndex::StakeCap);
    }

    #[test]
    fn disabled_upgrade_never_activates() {
        let mut params = staking_params(Network::Local);
        params.upgrades[UpgradeIndex::StakeCap.as_usize()] =
            NetworkUpgrade::at(NetworkUpgrade::NO_ACTIVATION_TIME);
        assert_eq!(
            network_upgrade_state(u64::MAX - 1, &params.upgrades, UpgradeIndex::StakeCap),
            UpgradeState::Disabled
        );
        assert_eq!(next_activation_time(0, &params.upgrades), None);
    }

    #[test]
    fn next_activation_time_tracking() {
        let params = staking_params(Network::Testnet);
        let activation = params.upgrades[UpgradeIndex::StakeCap.as_usize()].activation_time;
        assert_eq!(next_activation_time(0, &params.upgrades), Some(activation));
        assert_eq!(next_activation_time(activation, &params.upgrades), None);
    }
}

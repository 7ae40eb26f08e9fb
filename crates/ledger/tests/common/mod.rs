#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;

use allyd_consensus::{staking_params, Network, StakingParams};
use allyd_credentials::{Keychain, SecretKey};
use allyd_ledger::{ChainState, Genesis, StateView};
use allyd_primitives::{
    AddValidatorTx, BaseTx, Id, NodeId, Output, OutputOwners, ShortId, Tx, UnsignedTx, Utxo,
    UtxoId, Validator,
};
use allyd_storage::MemoryStore;

pub const GENESIS_TIME: u64 = 1_000;
pub const GENESIS_BALANCE: u64 = 50_000;
pub const GENESIS_VALIDATOR_END: u64 = 100_000;

pub struct Fixture {
    pub params: StakingParams,
    pub chain: Arc<ChainState<MemoryStore>>,
    pub keychain: Keychain,
    pub address: ShortId,
    /// Validates from genesis until `GENESIS_VALIDATOR_END` with weight 2,000.
    pub genesis_node: NodeId,
}

impl Fixture {
    pub fn new() -> Self {
        let params = params();
        let mut keychain = Keychain::new();
        let address = keychain.add(secret(7));
        let genesis_node = node(1);

        let genesis_validator = Tx::new(
            UnsignedTx::AddValidator(AddValidatorTx {
                base: BaseTx {
                    network_id: params.network_id,
                    chain_id: Id::from(params.chain_id),
                    ..BaseTx::default()
                },
                validator: Validator {
                    node_id: genesis_node,
                    start: 0,
                    end: GENESIS_VALIDATOR_END,
                    weight: 2_000,
                },
                stake: Vec::new(),
                rewards_owner: OutputOwners::single(address),
                shares: params.min_nomination_fee,
            }),
            Vec::new(),
        );

        let chain = Arc::new(ChainState::open(Arc::new(MemoryStore::new())).expect("open"));
        let genesis = Genesis {
            timestamp: GENESIS_TIME,
            initial_supply: 1_000_000_000,
            utxos: vec![Utxo {
                utxo_id: UtxoId::new(Id([0xaa; 32]), 0),
                asset_id: Id::from(params.asset_id),
                output: Output::transfer(GENESIS_BALANCE, OutputOwners::single(address)),
            }],
            validators: vec![Arc::new(genesis_validator)],
        };
        chain.initialize(&genesis, &params).expect("initialize");

        Self {
            params,
            chain,
            keychain,
            address,
            genesis_node,
        }
    }

    pub fn parent(&self) -> Arc<dyn StateView> {
        self.chain.clone()
    }

    pub fn asset(&self) -> Id {
        Id::from(self.params.asset_id)
    }

    pub fn owner(&self) -> OutputOwners {
        OutputOwners::single(self.address)
    }

    /// Native balance of the fixture address in `state`.
    pub fn balance(&self, state: &dyn StateView) -> u64 {
        self.utxo_amounts(state).iter().sum()
    }

    /// Amounts of the fixture address's UTXOs, ascending by UTXO id.
    pub fn utxo_amounts(&self, state: &dyn StateView) -> Vec<u64> {
        state
            .utxos_for(&BTreeSet::from([self.address]))
            .expect("utxos")
            .iter()
            .map(Utxo::amount)
            .collect()
    }
}

pub fn params() -> StakingParams {
    let mut params = staking_params(Network::Local);
    params.tx_fee = 10;
    params.add_staker_tx_fee = 10;
    params.create_allychain_tx_fee = 10;
    params.create_chain_tx_fee = 10;
    params.min_validator_stake = 2_000;
    params.max_validator_stake = 1_000_000;
    params.min_nominator_stake = 1;
    params.min_stake_duration = 100;
    params.max_stake_duration = 1_000_000;
    params.max_future_start_time = 10_000;
    params.sync_bound = 10;
    params
}

pub fn secret(byte: u8) -> SecretKey {
    SecretKey::from_slice(&[byte; 32]).expect("secret key")
}

pub fn node(byte: u8) -> NodeId {
    NodeId::from(ShortId([byte; 20]))
}

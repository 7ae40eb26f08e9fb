//! Funds, assembles and signs platform transactions from a keychain.

use std::collections::BTreeMap;

use allyd_consensus::StakingParams;
use allyd_credentials::{sign_tx, Keychain, SecretKey};
use allyd_primitives::{
    AddAllychainValidatorTx, AddNominatorTx, AddValidatorTx, AdvanceTimeTx, AllychainAuth,
    BaseTx, CreateAllychainTx, CreateChainTx, ExportTx, Id, NodeId, Output, OutputOwners,
    SyntaxError, TransferableOutput, Tx, UnsignedTx, Validator,
};

use crate::spend::{spend, Spend, SpendError, SpendRequest};
use crate::state::{StateError, StateView};

#[derive(Debug)]
pub enum BuildError {
    Spend(SpendError),
    State(StateError),
    Syntax(SyntaxError),
    UnknownAllychain(Id),
    /// The keychain cannot satisfy the allychain owner.
    Unauthorized(Id),
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::Spend(err) => write!(f, "{err}"),
            BuildError::State(err) => write!(f, "{err}"),
            BuildError::Syntax(err) => write!(f, "built an invalid transaction: {err}"),
            BuildError::UnknownAllychain(allychain_id) => {
                write!(f, "allychain {allychain_id} does not exist")
            }
            BuildError::Unauthorized(allychain_id) => {
                write!(f, "keychain cannot sign for allychain {allychain_id}")
            }
        }
    }
}

impl std::error::Error for BuildError {}

impl From<SpendError> for BuildError {
    fn from(err: SpendError) -> Self {
        BuildError::Spend(err)
    }
}

impl From<StateError> for BuildError {
    fn from(err: StateError) -> Self {
        BuildError::State(err)
    }
}

impl From<SyntaxError> for BuildError {
    fn from(err: SyntaxError) -> Self {
        BuildError::Syntax(err)
    }
}

/// Builds transactions spending UTXOs of `keychain` as seen by `state`.
pub struct TxBuilder<'a> {
    params: &'a StakingParams,
    keychain: &'a Keychain,
    state: &'a dyn StateView,
    change_owner: Option<OutputOwners>,
}

impl<'a> TxBuilder<'a> {
    pub fn new(params: &'a StakingParams, keychain: &'a Keychain, state: &'a dyn StateView) -> Self {
        Self {
            params,
            keychain,
            state,
            change_owner: None,
        }
    }

    /// Sends change and unlocked stake to `owner` instead of the keychain's
    /// first address.
    pub fn with_change_owner(mut self, owner: OutputOwners) -> Self {
        self.change_owner = Some(owner);
        self
    }

    pub fn new_add_validator_tx(
        &self,
        weight: u64,
        start: u64,
        end: u64,
        node_id: NodeId,
        rewards_owner: OutputOwners,
        shares: u32,
    ) -> Result<Tx, BuildError> {
        let funds = self.fund(self.params.add_staker_tx_fee, weight)?;
        let unsigned = UnsignedTx::AddValidator(AddValidatorTx {
            base: self.base_tx(&funds),
            validator: Validator {
                node_id,
                start,
                end,
                weight,
            },
            stake: funds.stake,
            rewards_owner,
            shares,
        });
        self.sign(unsigned, &funds.signers)
    }

    pub fn new_add_nominator_tx(
        &self,
        weight: u64,
        start: u64,
        end: u64,
        node_id: NodeId,
        rewards_owner: OutputOwners,
    ) -> Result<Tx, BuildError> {
        let funds = self.fund(self.params.add_staker_tx_fee, weight)?;
        let unsigned = UnsignedTx::AddNominator(AddNominatorTx {
            base: self.base_tx(&funds),
            validator: Validator {
                node_id,
                start,
                end,
                weight,
            },
            stake: funds.stake,
            rewards_owner,
        });
        self.sign(unsigned, &funds.signers)
    }

    pub fn new_add_allychain_validator_tx(
        &self,
        weight: u64,
        start: u64,
        end: u64,
        node_id: NodeId,
        allychain_id: Id,
    ) -> Result<Tx, BuildError> {
        let funds = self.fund(self.params.tx_fee, 0)?;
        let (allychain_auth, auth_keys) = self.allychain_auth(&allychain_id)?;
        let mut signers = funds.signers.clone();
        signers.push(auth_keys);
        let unsigned = UnsignedTx::AddAllychainValidator(AddAllychainValidatorTx {
            base: self.base_tx(&funds),
            validator: Validator {
                node_id,
                start,
                end,
                weight,
            },
            allychain_id,
            allychain_auth,
        });
        self.sign(unsigned, &signers)
    }

    pub fn new_create_allychain_tx(&self, owner: OutputOwners) -> Result<Tx, BuildError> {
        let funds = self.fund(self.params.create_allychain_tx_fee, 0)?;
        let unsigned = UnsignedTx::CreateAllychain(CreateAllychainTx {
            base: self.base_tx(&funds),
            owner,
        });
        self.sign(unsigned, &funds.signers)
    }

    pub fn new_create_chain_tx(
        &self,
        allychain_id: Id,
        chain_name: &str,
        vm_id: Id,
        fx_ids: Vec<Id>,
        genesis_data: Vec<u8>,
    ) -> Result<Tx, BuildError> {
        let funds = self.fund(self.params.create_chain_tx_fee, 0)?;
        let (allychain_auth, auth_keys) = self.allychain_auth(&allychain_id)?;
        let mut signers = funds.signers.clone();
        signers.push(auth_keys);
        let unsigned = UnsignedTx::CreateChain(CreateChainTx {
            base: self.base_tx(&funds),
            allychain_id,
            chain_name: chain_name.to_string(),
            vm_id,
            fx_ids,
            genesis_data,
            allychain_auth,
        });
        self.sign(unsigned, &signers)
    }

    /// Exports `amount` of the native asset to `to` on `destination_chain`.
    pub fn new_export_tx(
        &self,
        destination_chain: Id,
        amount: u64,
        to: OutputOwners,
    ) -> Result<Tx, BuildError> {
        let total = self
            .params
            .tx_fee
            .checked_add(amount)
            .ok_or(SpendError::Overflow)?;
        let funds = self.fund(total, 0)?;
        let unsigned = UnsignedTx::Export(ExportTx {
            base: self.base_tx(&funds),
            destination_chain,
            exported_outputs: vec![TransferableOutput::new(
                Id::from(self.params.asset_id),
                Output::transfer(amount, to),
            )],
        });
        self.sign(unsigned, &funds.signers)
    }

    pub fn new_advance_time_tx(&self, time: u64) -> Result<Tx, BuildError> {
        self.sign(UnsignedTx::AdvanceTime(AdvanceTimeTx { time }), &[])
    }

    /// Selects inputs that burn `fee` and stake `stake` of the native asset.
    fn fund(&self, fee: u64, stake: u64) -> Result<Spend, BuildError> {
        let asset_id = Id::from(self.params.asset_id);
        let mut request = SpendRequest {
            burn: BTreeMap::new(),
            stake: BTreeMap::new(),
            min_issuance_time: self.state.timestamp(),
            change_owner: self.change_owner.clone(),
        };
        if fee > 0 {
            request.burn.insert(asset_id, fee);
        }
        if stake > 0 {
            request.stake.insert(asset_id, stake);
        }
        Ok(spend(self.state, self.keychain, &request)?)
    }

    fn base_tx(&self, funds: &Spend) -> BaseTx {
        BaseTx {
            network_id: self.params.network_id,
            chain_id: Id::from(self.params.chain_id),
            outs: funds.change.clone(),
            ins: funds.inputs.clone(),
            memo: Vec::new(),
        }
    }

    fn allychain_auth(
        &self,
        allychain_id: &Id,
    ) -> Result<(AllychainAuth, Vec<SecretKey>), BuildError> {
        let allychain = self
            .state
            .allychain(allychain_id)?
            .ok_or(BuildError::UnknownAllychain(*allychain_id))?;
        let UnsignedTx::CreateAllychain(create) = &allychain.unsigned else {
            return Err(BuildError::UnknownAllychain(*allychain_id));
        };
        let (sig_indices, keys) = self
            .keychain
            .match_owners(&create.owner, self.state.timestamp())
            .ok_or(BuildError::Unauthorized(*allychain_id))?;
        Ok((AllychainAuth { sig_indices }, keys))
    }

    fn sign(
        &self,
        unsigned: UnsignedTx,
        signers: &[Vec<SecretKey>],
    ) -> Result<Tx, BuildError> {
        let tx = sign_tx(unsigned, signers);
        tx.syntactic_verify(self.params)?;
        allyd_log::log_debug!("built {} tx {}", tx.kind().as_str(), tx.id());
        Ok(tx)
    }
}

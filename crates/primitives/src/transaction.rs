//! Platform transaction variants, credentials, and syntactic verification.

use std::sync::atomic::{AtomicBool, Ordering};

use allyd_consensus::constants::{
    MAX_CHAIN_NAME_LEN, MAX_GENESIS_DATA_SIZE, MAX_MEMO_SIZE, MAX_TX_ITEMS, MAX_TX_SIZE,
    PERCENT_DENOMINATOR,
};
use allyd_consensus::StakingParams;

use crate::encoding::{Decodable, DecodeError, Decoder, Encodable, Encoder};
use crate::hash::sha256;
use crate::ids::{Id, NodeId};
use crate::inputs::{verify_inputs, verify_sig_indices, Input, TransferableInput};
use crate::outputs::{
    decode_owner_tagged, encode_owner_tagged, verify_outputs, Output, OutputOwners,
    TransferableOutput,
};
use crate::syntax::{is_sorted_unique, SyntaxError};
use crate::utxo::UtxoId;

pub const ADD_VALIDATOR_TX_TYPE_ID: u32 = 12;
pub const ADD_ALLYCHAIN_VALIDATOR_TX_TYPE_ID: u32 = 13;
pub const ADD_NOMINATOR_TX_TYPE_ID: u32 = 14;
pub const CREATE_CHAIN_TX_TYPE_ID: u32 = 15;
pub const CREATE_ALLYCHAIN_TX_TYPE_ID: u32 = 16;
pub const IMPORT_TX_TYPE_ID: u32 = 17;
pub const EXPORT_TX_TYPE_ID: u32 = 18;
pub const ADVANCE_TIME_TX_TYPE_ID: u32 = 19;
pub const BASE_TX_TYPE_ID: u32 = 34;
pub const CREDENTIAL_TYPE_ID: u32 = 9;
pub const AUTH_TYPE_ID: u32 = 10;

pub const SIGNATURE_LEN: usize = 65;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BaseTx {
    pub network_id: u32,
    pub chain_id: Id,
    pub outs: Vec<TransferableOutput>,
    pub ins: Vec<TransferableInput>,
    pub memo: Vec<u8>,
}

impl BaseTx {
    pub fn verify(&self, params: &StakingParams) -> Result<(), SyntaxError> {
        if self.network_id != params.network_id {
            return Err(SyntaxError::WrongNetworkId {
                expected: params.network_id,
                got: self.network_id,
            });
        }
        let chain_id = Id::from(params.chain_id);
        if self.chain_id != chain_id {
            return Err(SyntaxError::WrongChainId {
                expected: chain_id,
                got: self.chain_id,
            });
        }
        if self.memo.len() > MAX_MEMO_SIZE {
            return Err(SyntaxError::MemoTooLarge(self.memo.len()));
        }
        if self.outs.len() > MAX_TX_ITEMS {
            return Err(SyntaxError::TooManyItems("outputs"));
        }
        if self.ins.len() > MAX_TX_ITEMS {
            return Err(SyntaxError::TooManyItems("inputs"));
        }
        verify_outputs(&self.outs)?;
        verify_inputs(&self.ins)
    }
}

impl Encodable for BaseTx {
    fn encode_to(&self, encoder: &mut Encoder) {
        encoder.write_u32(self.network_id);
        self.chain_id.encode_to(encoder);
        encoder.write_list(&self.outs);
        encoder.write_list(&self.ins);
        encoder.write_bytes(&self.memo);
    }
}

impl Decodable for BaseTx {
    fn decode_from(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        Ok(Self {
            network_id: decoder.read_u32()?,
            chain_id: Id::decode_from(decoder)?,
            outs: decoder.read_list()?,
            ins: decoder.read_list()?,
            memo: decoder.read_bytes()?,
        })
    }
}

/// A staking period and weight for one node.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Validator {
    pub node_id: NodeId,
    pub start: u64,
    pub end: u64,
    pub weight: u64,
}

impl Validator {
    pub fn duration(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Whether `[start, end]` lies within `other`'s period.
    pub fn bounded_by(&self, other: &Validator) -> bool {
        other.start <= self.start && self.end <= other.end
    }

    pub fn verify(&self) -> Result<(), SyntaxError> {
        if self.weight == 0 {
            return Err(SyntaxError::ZeroWeight);
        }
        if self.end <= self.start {
            return Err(SyntaxError::EmptyStakingPeriod);
        }
        Ok(())
    }
}

impl Encodable for Validator {
    fn encode_to(&self, encoder: &mut Encoder) {
        self.node_id.encode_to(encoder);
        encoder.write_u64(self.start);
        encoder.write_u64(self.end);
        encoder.write_u64(self.weight);
    }
}

impl Decodable for Validator {
    fn decode_from(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        Ok(Self {
            node_id: NodeId::decode_from(decoder)?,
            start: decoder.read_u64()?,
            end: decoder.read_u64()?,
            weight: decoder.read_u64()?,
        })
    }
}

/// Signature indices into an allychain owner's addresses.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AllychainAuth {
    pub sig_indices: Vec<u32>,
}

impl Encodable for AllychainAuth {
    fn encode_to(&self, encoder: &mut Encoder) {
        encoder.write_u32(AUTH_TYPE_ID);
        encoder.write_u32_list(&self.sig_indices);
    }
}

impl Decodable for AllychainAuth {
    fn decode_from(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        match decoder.read_u32()? {
            AUTH_TYPE_ID => Ok(Self {
                sig_indices: decoder.read_u32_list()?,
            }),
            other => Err(DecodeError::UnknownTypeId(other)),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AddValidatorTx {
    pub base: BaseTx,
    pub validator: Validator,
    pub stake: Vec<TransferableOutput>,
    pub rewards_owner: OutputOwners,
    /// Fee charged to nominators, in parts of `PERCENT_DENOMINATOR`.
    pub shares: u32,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AddNominatorTx {
    pub base: BaseTx,
    pub validator: Validator,
    pub stake: Vec<TransferableOutput>,
    pub rewards_owner: OutputOwners,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AddAllychainValidatorTx {
    pub base: BaseTx,
    pub validator: Validator,
    pub allychain_id: Id,
    pub allychain_auth: AllychainAuth,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreateAllychainTx {
    pub base: BaseTx,
    pub owner: OutputOwners,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreateChainTx {
    pub base: BaseTx,
    pub allychain_id: Id,
    pub chain_name: String,
    pub vm_id: Id,
    pub fx_ids: Vec<Id>,
    pub genesis_data: Vec<u8>,
    pub allychain_auth: AllychainAuth,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImportTx {
    pub base: BaseTx,
    pub source_chain: Id,
    pub imported_inputs: Vec<TransferableInput>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExportTx {
    pub base: BaseTx,
    pub destination_chain: Id,
    pub exported_outputs: Vec<TransferableOutput>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AdvanceTimeTx {
    pub time: u64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum TxKind {
    Base,
    AddValidator,
    AddNominator,
    AddAllychainValidator,
    CreateAllychain,
    CreateChain,
    Import,
    Export,
    AdvanceTime,
}

impl TxKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TxKind::Base => "base",
            TxKind::AddValidator => "add_validator",
            TxKind::AddNominator => "add_nominator",
            TxKind::AddAllychainValidator => "add_allychain_validator",
            TxKind::CreateAllychain => "create_allychain",
            TxKind::CreateChain => "create_chain",
            TxKind::Import => "import",
            TxKind::Export => "export",
            TxKind::AdvanceTime => "advance_time",
        }
    }

    /// Proposal transactions execute into a commit and an abort branch.
    pub fn is_proposal(self) -> bool {
        matches!(
            self,
            TxKind::AddValidator
                | TxKind::AddNominator
                | TxKind::AddAllychainValidator
                | TxKind::AdvanceTime
        )
    }

    pub fn is_staker(self) -> bool {
        matches!(
            self,
            TxKind::AddValidator | TxKind::AddNominator | TxKind::AddAllychainValidator
        )
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UnsignedTx {
    Base(BaseTx),
    AddValidator(AddValidatorTx),
    AddNominator(AddNominatorTx),
    AddAllychainValidator(AddAllychainValidatorTx),
    CreateAllychain(CreateAllychainTx),
    CreateChain(CreateChainTx),
    Import(ImportTx),
    Export(ExportTx),
    AdvanceTime(AdvanceTimeTx),
}

impl UnsignedTx {
    pub fn kind(&self) -> TxKind {
        match self {
            UnsignedTx::Base(_) => TxKind::Base,
            UnsignedTx::AddValidator(_) => TxKind::AddValidator,
            UnsignedTx::AddNominator(_) => TxKind::AddNominator,
            UnsignedTx::AddAllychainValidator(_) => TxKind::AddAllychainValidator,
            UnsignedTx::CreateAllychain(_) => TxKind::CreateAllychain,
            UnsignedTx::CreateChain(_) => TxKind::CreateChain,
            UnsignedTx::Import(_) => TxKind::Import,
            UnsignedTx::Export(_) => TxKind::Export,
            UnsignedTx::AdvanceTime(_) => TxKind::AdvanceTime,
        }
    }

    fn type_id(&self) -> u32 {
        match self {
            UnsignedTx::Base(_) => BASE_TX_TYPE_ID,
            UnsignedTx::AddValidator(_) => ADD_VALIDATOR_TX_TYPE_ID,
            UnsignedTx::AddNominator(_) => ADD_NOMINATOR_TX_TYPE_ID,
            UnsignedTx::AddAllychainValidator(_) => ADD_ALLYCHAIN_VALIDATOR_TX_TYPE_ID,
            UnsignedTx::CreateAllychain(_) => CREATE_ALLYCHAIN_TX_TYPE_ID,
            UnsignedTx::CreateChain(_) => CREATE_CHAIN_TX_TYPE_ID,
            UnsignedTx::Import(_) => IMPORT_TX_TYPE_ID,
            UnsignedTx::Export(_) => EXPORT_TX_TYPE_ID,
            UnsignedTx::AdvanceTime(_) => ADVANCE_TIME_TX_TYPE_ID,
        }
    }

    pub fn base(&self) -> Option<&BaseTx> {
        match self {
            UnsignedTx::Base(tx) => Some(tx),
            UnsignedTx::AddValidator(tx) => Some(&tx.base),
            UnsignedTx::AddNominator(tx) => Some(&tx.base),
            UnsignedTx::AddAllychainValidator(tx) => Some(&tx.base),
            UnsignedTx::CreateAllychain(tx) => Some(&tx.base),
            UnsignedTx::CreateChain(tx) => Some(&tx.base),
            UnsignedTx::Import(tx) => Some(&tx.base),
            UnsignedTx::Export(tx) => Some(&tx.base),
            UnsignedTx::AdvanceTime(_) => None,
        }
    }

    /// The staking period of a staker transaction.
    pub fn validator(&self) -> Option<&Validator> {
        match self {
            UnsignedTx::AddValidator(tx) => Some(&tx.validator),
            UnsignedTx::AddNominator(tx) => Some(&tx.validator),
            UnsignedTx::AddAllychainValidator(tx) => Some(&tx.validator),
            _ => None,
        }
    }

    /// Every UTXO this transaction consumes, local and imported.
    pub fn consumed_utxos(&self) -> Vec<UtxoId> {
        let mut consumed: Vec<UtxoId> = self
            .base()
            .map(|base| base.ins.iter().map(|input| input.utxo_id).collect())
            .unwrap_or_default();
        if let UnsignedTx::Import(tx) = self {
            consumed.extend(tx.imported_inputs.iter().map(|input| input.utxo_id));
        }
        consumed
    }

    /// Outputs created on this chain, in output-index order.
    pub fn produced_outputs(&self) -> Vec<&TransferableOutput> {
        let Some(base) = self.base() else {
            return Vec::new();
        };
        let mut produced: Vec<&TransferableOutput> = base.outs.iter().collect();
        match self {
            UnsignedTx::AddValidator(tx) => produced.extend(tx.stake.iter()),
            UnsignedTx::AddNominator(tx) => produced.extend(tx.stake.iter()),
            _ => {}
        }
        produced
    }

    pub fn syntactic_verify(&self, params: &StakingParams) -> Result<(), SyntaxError> {
        let native = Id::from(params.asset_id);
        match self {
            UnsignedTx::Base(tx) => tx.verify(params),
            UnsignedTx::AddValidator(tx) => {
                tx.base.verify(params)?;
                tx.validator.verify()?;
                if u64::from(tx.shares) > PERCENT_DENOMINATOR {
                    return Err(SyntaxError::TooManyShares(tx.shares));
                }
                verify_stake(&tx.stake, tx.validator.weight, native)?;
                tx.rewards_owner.verify()
            }
            UnsignedTx::AddNominator(tx) => {
                tx.base.verify(params)?;
                tx.validator.verify()?;
                verify_stake(&tx.stake, tx.validator.weight, native)?;
                tx.rewards_owner.verify()
            }
            UnsignedTx::AddAllychainValidator(tx) => {
                tx.base.verify(params)?;
                tx.validator.verify()?;
                if tx.allychain_id.is_empty() {
                    return Err(SyntaxError::PrimaryNetworkAllychain);
                }
                verify_sig_indices(&tx.allychain_auth.sig_indices)
            }
            UnsignedTx::CreateAllychain(tx) => {
                tx.base.verify(params)?;
                tx.owner.verify()
            }
            UnsignedTx::CreateChain(tx) => {
                tx.base.verify(params)?;
                if tx.allychain_id.is_empty() {
                    return Err(SyntaxError::PrimaryNetworkAllychain);
                }
                if tx.chain_name.len() > MAX_CHAIN_NAME_LEN {
                    return Err(SyntaxError::ChainNameTooLong(tx.chain_name.len()));
                }
                if !tx
                    .chain_name
                    .bytes()
                    .all(|byte| byte == b' ' || byte.is_ascii_graphic())
                {
                    return Err(SyntaxError::IllegalChainName);
                }
                if !is_sorted_unique(&tx.fx_ids) {
                    return Err(SyntaxError::FxIdsNotSortedUnique);
                }
                if tx.genesis_data.len() > MAX_GENESIS_DATA_SIZE {
                    return Err(SyntaxError::GenesisTooLarge(tx.genesis_data.len()));
                }
                verify_sig_indices(&tx.allychain_auth.sig_indices)
            }
            UnsignedTx::Import(tx) => {
                tx.base.verify(params)?;
                if tx.imported_inputs.is_empty() {
                    return Err(SyntaxError::NoImportInputs);
                }
                if tx.imported_inputs.len() > MAX_TX_ITEMS {
                    return Err(SyntaxError::TooManyItems("imported inputs"));
                }
                if tx
                    .imported_inputs
                    .iter()
                    .any(|input| matches!(input.input, Input::StakeableLock(_)))
                {
                    return Err(SyntaxError::LockedCrossChain);
                }
                verify_inputs(&tx.imported_inputs)
            }
            UnsignedTx::Export(tx) => {
                tx.base.verify(params)?;
                if tx.exported_outputs.is_empty() {
                    return Err(SyntaxError::NoExportOutputs);
                }
                if tx.exported_outputs.len() > MAX_TX_ITEMS {
                    return Err(SyntaxError::TooManyItems("exported outputs"));
                }
                if tx
                    .exported_outputs
                    .iter()
                    .any(|output| matches!(output.output, Output::StakeableLock(_)))
                {
                    return Err(SyntaxError::LockedCrossChain);
                }
                verify_outputs(&tx.exported_outputs)
            }
            UnsignedTx::AdvanceTime(_) => Ok(()),
        }
    }
}

fn verify_stake(
    stake: &[TransferableOutput],
    weight: u64,
    native: Id,
) -> Result<(), SyntaxError> {
    if stake.len() > MAX_TX_ITEMS {
        return Err(SyntaxError::TooManyItems("stake outputs"));
    }
    verify_outputs(stake)?;
    let mut staked = 0u64;
    for output in stake {
        if output.asset_id != native {
            return Err(SyntaxError::StakeNotNative(output.asset_id));
        }
        staked = staked
            .checked_add(output.amount())
            .ok_or(SyntaxError::Overflow)?;
    }
    if staked != weight {
        return Err(SyntaxError::StakeWeightMismatch { staked, weight });
    }
    Ok(())
}

impl Encodable for UnsignedTx {
    fn encode_to(&self, encoder: &mut Encoder) {
        encoder.write_u32(self.type_id());
        match self {
            UnsignedTx::Base(tx) => tx.encode_to(encoder),
            UnsignedTx::AddValidator(tx) => {
                tx.base.encode_to(encoder);
                tx.validator.encode_to(encoder);
                encoder.write_list(&tx.stake);
                encode_owner_tagged(&tx.rewards_owner, encoder);
                encoder.write_u32(tx.shares);
            }
            UnsignedTx::AddNominator(tx) => {
                tx.base.encode_to(encoder);
                tx.validator.encode_to(encoder);
                encoder.write_list(&tx.stake);
                encode_owner_tagged(&tx.rewards_owner, encoder);
            }
            UnsignedTx::AddAllychainValidator(tx) => {
                tx.base.encode_to(encoder);
                tx.validator.encode_to(encoder);
                tx.allychain_id.encode_to(encoder);
                tx.allychain_auth.encode_to(encoder);
            }
            UnsignedTx::CreateAllychain(tx) => {
                tx.base.encode_to(encoder);
                encode_owner_tagged(&tx.owner, encoder);
            }
            UnsignedTx::CreateChain(tx) => {
                tx.base.encode_to(encoder);
                tx.allychain_id.encode_to(encoder);
                encoder.write_str(&tx.chain_name);
                tx.vm_id.encode_to(encoder);
                encoder.write_list(&tx.fx_ids);
                encoder.write_bytes(&tx.genesis_data);
                tx.allychain_auth.encode_to(encoder);
            }
            UnsignedTx::Import(tx) => {
                tx.base.encode_to(encoder);
                tx.source_chain.encode_to(encoder);
                encoder.write_list(&tx.imported_inputs);
            }
            UnsignedTx::Export(tx) => {
                tx.base.encode_to(encoder);
                tx.destination_chain.encode_to(encoder);
                encoder.write_list(&tx.exported_outputs);
            }
            UnsignedTx::AdvanceTime(tx) => encoder.write_u64(tx.time),
        }
    }
}

impl Decodable for UnsignedTx {
    fn decode_from(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let tx = match decoder.read_u32()? {
            BASE_TX_TYPE_ID => UnsignedTx::Base(BaseTx::decode_from(decoder)?),
            ADD_VALIDATOR_TX_TYPE_ID => UnsignedTx::AddValidator(AddValidatorTx {
                base: BaseTx::decode_from(decoder)?,
                validator: Validator::decode_from(decoder)?,
                stake: decoder.read_list()?,
                rewards_owner: decode_owner_tagged(decoder)?,
                shares: decoder.read_u32()?,
            }),
            ADD_NOMINATOR_TX_TYPE_ID => UnsignedTx::AddNominator(AddNominatorTx {
                base: BaseTx::decode_from(decoder)?,
                validator: Validator::decode_from(decoder)?,
                stake: decoder.read_list()?,
                rewards_owner: decode_owner_tagged(decoder)?,
            }),
            ADD_ALLYCHAIN_VALIDATOR_TX_TYPE_ID => {
                UnsignedTx::AddAllychainValidator(AddAllychainValidatorTx {
                    base: BaseTx::decode_from(decoder)?,
                    validator: Validator::decode_from(decoder)?,
                    allychain_id: Id::decode_from(decoder)?,
                    allychain_auth: AllychainAuth::decode_from(decoder)?,
                })
            }
            CREATE_ALLYCHAIN_TX_TYPE_ID => UnsignedTx::CreateAllychain(CreateAllychainTx {
                base: BaseTx::decode_from(decoder)?,
                owner: decode_owner_tagged(decoder)?,
            }),
            CREATE_CHAIN_TX_TYPE_ID => UnsignedTx::CreateChain(CreateChainTx {
                base: BaseTx::decode_from(decoder)?,
                allychain_id: Id::decode_from(decoder)?,
                chain_name: decoder.read_str()?,
                vm_id: Id::decode_from(decoder)?,
                fx_ids: decoder.read_list()?,
                genesis_data: decoder.read_bytes()?,
                allychain_auth: AllychainAuth::decode_from(decoder)?,
            }),
            IMPORT_TX_TYPE_ID => UnsignedTx::Import(ImportTx {
                base: BaseTx::decode_from(decoder)?,
                source_chain: Id::decode_from(decoder)?,
                imported_inputs: decoder.read_list()?,
            }),
            EXPORT_TX_TYPE_ID => UnsignedTx::Export(ExportTx {
                base: BaseTx::decode_from(decoder)?,
                destination_chain: Id::decode_from(decoder)?,
                exported_outputs: decoder.read_list()?,
            }),
            ADVANCE_TIME_TX_TYPE_ID => UnsignedTx::AdvanceTime(AdvanceTimeTx {
                time: decoder.read_u64()?,
            }),
            other => return Err(DecodeError::UnknownTypeId(other)),
        };
        Ok(tx)
    }
}

/// One recoverable signature per signature index of the matching input.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Credential {
    pub signatures: Vec<[u8; SIGNATURE_LEN]>,
}

impl Encodable for Credential {
    fn encode_to(&self, encoder: &mut Encoder) {
        encoder.write_u32(CREDENTIAL_TYPE_ID);
        encoder.write_u32(u32::try_from(self.signatures.len()).unwrap_or(u32::MAX));
        for signature in &self.signatures {
            encoder.write_fixed(signature);
        }
    }
}

impl Decodable for Credential {
    fn decode_from(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        match decoder.read_u32()? {
            CREDENTIAL_TYPE_ID => {}
            other => return Err(DecodeError::UnknownTypeId(other)),
        }
        let count = decoder.read_u32()? as usize;
        if count.saturating_mul(SIGNATURE_LEN) > decoder.remaining() {
            return Err(DecodeError::SizeTooLarge);
        }
        let mut signatures = Vec::with_capacity(count);
        for _ in 0..count {
            signatures.push(decoder.read_fixed()?);
        }
        Ok(Self { signatures })
    }
}

/// A signed transaction with its canonical bytes fixed at construction.
pub struct Tx {
    pub unsigned: UnsignedTx,
    pub creds: Vec<Credential>,
    id: Id,
    unsigned_bytes: Vec<u8>,
    bytes: Vec<u8>,
    syntax_verified: AtomicBool,
}

impl Tx {
    pub fn new(unsigned: UnsignedTx, creds: Vec<Credential>) -> Self {
        let mut encoder = Encoder::with_version();
        unsigned.encode_to(&mut encoder);
        let unsigned_bytes = encoder.into_inner();
        let mut encoder = Encoder::new();
        encoder.write_fixed(&unsigned_bytes);
        encoder.write_list(&creds);
        let bytes = encoder.into_inner();
        Self {
            unsigned,
            creds,
            id: sha256(&bytes),
            unsigned_bytes,
            bytes,
            syntax_verified: AtomicBool::new(false),
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() > MAX_TX_SIZE {
            return Err(DecodeError::SizeTooLarge);
        }
        let mut decoder = Decoder::new(bytes);
        decoder.read_version()?;
        let unsigned = UnsignedTx::decode_from(&mut decoder)?;
        let unsigned_bytes = decoder.consumed_since(0).to_vec();
        let creds = decoder.read_list()?;
        if !decoder.is_empty() {
            return Err(DecodeError::TrailingBytes);
        }
        Ok(Self {
            unsigned,
            creds,
            id: sha256(bytes),
            unsigned_bytes,
            bytes: bytes.to_vec(),
            syntax_verified: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn kind(&self) -> TxKind {
        self.unsigned.kind()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn unsigned_bytes(&self) -> &[u8] {
        &self.unsigned_bytes
    }

    /// Digest every credential signs.
    pub fn signature_digest(&self) -> Id {
        sha256(&self.unsigned_bytes)
    }

    pub fn is_syntax_verified(&self) -> bool {
        self.syntax_verified.load(Ordering::Acquire)
    }

    /// Checks well-formedness once; later calls return immediately.
    pub fn syntactic_verify(&self, params: &StakingParams) -> Result<(), SyntaxError> {
        if self.is_syntax_verified() {
            return Ok(());
        }
        if self.bytes.len() > MAX_TX_SIZE {
            return Err(SyntaxError::TxTooLarge(self.bytes.len()));
        }
        if self.creds.len() > MAX_TX_ITEMS {
            return Err(SyntaxError::TooManyItems("credentials"));
        }
        self.unsigned.syntactic_verify(params)?;
        self.syntax_verified.store(true, Ordering::Release);
        Ok(())
    }
}

impl Clone for Tx {
    fn clone(&self) -> Self {
        Self {
            unsigned: self.unsigned.clone(),
            creds: self.creds.clone(),
            id: self.id,
            unsigned_bytes: self.unsigned_bytes.clone(),
            bytes: self.bytes.clone(),
            syntax_verified: AtomicBool::new(self.is_syntax_verified()),
        }
    }
}

impl PartialEq for Tx {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Tx {}

impl std::fmt::Debug for Tx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tx")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("creds", &self.creds.len())
            .finish()
    }
}

//! Output types and their canonical ordering.

use allyd_consensus::constants::MAX_OWNER_ADDRESSES;

use crate::encoding::{encode, Decodable, DecodeError, Decoder, Encodable, Encoder};
use crate::hash::sha256;
use crate::ids::{Id, ShortId};
use crate::syntax::{is_sorted_unique, SyntaxError};

pub const TRANSFER_OUTPUT_TYPE_ID: u32 = 7;
pub const STAKEABLE_LOCK_OUT_TYPE_ID: u32 = 22;
pub const OUTPUT_OWNERS_TYPE_ID: u32 = 11;

/// A threshold-of-addresses predicate, spendable once `locktime` has passed.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct OutputOwners {
    pub locktime: u64,
    pub threshold: u32,
    pub addresses: Vec<ShortId>,
}

impl OutputOwners {
    pub fn single(address: ShortId) -> Self {
        Self {
            locktime: 0,
            threshold: 1,
            addresses: vec![address],
        }
    }

    pub fn verify(&self) -> Result<(), SyntaxError> {
        if self.addresses.len() > MAX_OWNER_ADDRESSES {
            return Err(SyntaxError::TooManyItems("owner addresses"));
        }
        if self.threshold as usize > self.addresses.len() {
            return Err(SyntaxError::ThresholdTooHigh {
                threshold: self.threshold,
                addresses: self.addresses.len(),
            });
        }
        if self.threshold == 0 && !self.addresses.is_empty() {
            return Err(SyntaxError::UnoptimizedOwners);
        }
        if !is_sorted_unique(&self.addresses) {
            return Err(SyntaxError::AddressesNotSortedUnique);
        }
        Ok(())
    }

    /// Hash identifying an owner for grouping in flow checks.
    pub fn owner_key(&self) -> Id {
        sha256(&encode(self))
    }
}

impl Encodable for OutputOwners {
    fn encode_to(&self, encoder: &mut Encoder) {
        encoder.write_u64(self.locktime);
        encoder.write_u32(self.threshold);
        encoder.write_list(&self.addresses);
    }
}

impl Decodable for OutputOwners {
    fn decode_from(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        Ok(Self {
            locktime: decoder.read_u64()?,
            threshold: decoder.read_u32()?,
            addresses: decoder.read_list()?,
        })
    }
}

/// Owner predicate as carried standalone (rewards and allychain owners).
pub(crate) fn encode_owner_tagged(owners: &OutputOwners, encoder: &mut Encoder) {
    encoder.write_u32(OUTPUT_OWNERS_TYPE_ID);
    owners.encode_to(encoder);
}

pub(crate) fn decode_owner_tagged(decoder: &mut Decoder) -> Result<OutputOwners, DecodeError> {
    match decoder.read_u32()? {
        OUTPUT_OWNERS_TYPE_ID => OutputOwners::decode_from(decoder),
        other => Err(DecodeError::UnknownTypeId(other)),
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TransferOutput {
    pub amount: u64,
    pub owners: OutputOwners,
}

impl TransferOutput {
    pub fn verify(&self) -> Result<(), SyntaxError> {
        if self.amount == 0 {
            return Err(SyntaxError::ZeroAmount);
        }
        self.owners.verify()
    }
}

impl Encodable for TransferOutput {
    fn encode_to(&self, encoder: &mut Encoder) {
        encoder.write_u64(self.amount);
        self.owners.encode_to(encoder);
    }
}

impl Decodable for TransferOutput {
    fn decode_from(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        Ok(Self {
            amount: decoder.read_u64()?,
            owners: OutputOwners::decode_from(decoder)?,
        })
    }
}

/// Value usable only for staking until `locktime`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct StakeableLockOut {
    pub locktime: u64,
    pub inner: TransferOutput,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Output {
    Transfer(TransferOutput),
    StakeableLock(StakeableLockOut),
}

impl Output {
    pub fn transfer(amount: u64, owners: OutputOwners) -> Self {
        Output::Transfer(TransferOutput { amount, owners })
    }

    pub fn locked(locktime: u64, amount: u64, owners: OutputOwners) -> Self {
        Output::StakeableLock(StakeableLockOut {
            locktime,
            inner: TransferOutput { amount, owners },
        })
    }

    pub fn amount(&self) -> u64 {
        self.inner().amount
    }

    pub fn owners(&self) -> &OutputOwners {
        &self.inner().owners
    }

    pub fn inner(&self) -> &TransferOutput {
        match self {
            Output::Transfer(out) => out,
            Output::StakeableLock(out) => &out.inner,
        }
    }

    /// Stake locktime, or zero for a plain transfer.
    pub fn stake_locktime(&self) -> u64 {
        match self {
            Output::Transfer(_) => 0,
            Output::StakeableLock(out) => out.locktime,
        }
    }

    pub fn is_locked_at(&self, time: u64) -> bool {
        time < self.stake_locktime()
    }

    pub fn verify(&self) -> Result<(), SyntaxError> {
        match self {
            Output::Transfer(out) => out.verify(),
            Output::StakeableLock(out) => {
                if out.locktime == 0 {
                    return Err(SyntaxError::ZeroLocktime);
                }
                out.inner.verify()
            }
        }
    }

    pub fn type_id(&self) -> u32 {
        match self {
            Output::Transfer(_) => TRANSFER_OUTPUT_TYPE_ID,
            Output::StakeableLock(_) => STAKEABLE_LOCK_OUT_TYPE_ID,
        }
    }
}

impl Encodable for Output {
    fn encode_to(&self, encoder: &mut Encoder) {
        encoder.write_u32(self.type_id());
        match self {
            Output::Transfer(out) => out.encode_to(encoder),
            Output::StakeableLock(out) => {
                encoder.write_u64(out.locktime);
                encoder.write_u32(TRANSFER_OUTPUT_TYPE_ID);
                out.inner.encode_to(encoder);
            }
        }
    }
}

impl Decodable for Output {
    fn decode_from(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        match decoder.read_u32()? {
            TRANSFER_OUTPUT_TYPE_ID => Ok(Output::Transfer(TransferOutput::decode_from(decoder)?)),
            STAKEABLE_LOCK_OUT_TYPE_ID => {
                let locktime = decoder.read_u64()?;
                match decoder.read_u32()? {
                    TRANSFER_OUTPUT_TYPE_ID => Ok(Output::StakeableLock(StakeableLockOut {
                        locktime,
                        inner: TransferOutput::decode_from(decoder)?,
                    })),
                    STAKEABLE_LOCK_OUT_TYPE_ID => {
                        Err(DecodeError::InvalidData("nested stakeable lock output"))
                    }
                    other => Err(DecodeError::UnknownTypeId(other)),
                }
            }
            other => Err(DecodeError::UnknownTypeId(other)),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TransferableOutput {
    pub asset_id: Id,
    pub output: Output,
}

impl TransferableOutput {
    pub fn new(asset_id: Id, output: Output) -> Self {
        Self { asset_id, output }
    }

    pub fn amount(&self) -> u64 {
        self.output.amount()
    }

    fn sort_key(&self) -> (Id, Vec<u8>) {
        (self.asset_id, encode(&self.output))
    }
}

impl Encodable for TransferableOutput {
    fn encode_to(&self, encoder: &mut Encoder) {
        self.asset_id.encode_to(encoder);
        self.output.encode_to(encoder);
    }
}

impl Decodable for TransferableOutput {
    fn decode_from(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        Ok(Self {
            asset_id: Id::decode_from(decoder)?,
            output: Output::decode_from(decoder)?,
        })
    }
}

/// Canonical order: asset id, then encoded output bytes.
pub fn sort_outputs(outputs: &mut [TransferableOutput]) {
    outputs.sort_by_cached_key(TransferableOutput::sort_key);
}

pub fn outputs_sorted(outputs: &[TransferableOutput]) -> bool {
    outputs
        .windows(2)
        .all(|pair| pair[0].sort_key() <= pair[1].sort_key())
}

pub fn verify_outputs(outputs: &[TransferableOutput]) -> Result<(), SyntaxError> {
    for output in outputs {
        output.output.verify()?;
    }
    if !outputs_sorted(outputs) {
        return Err(SyntaxError::OutputsNotSorted);
    }
    Ok(())
}

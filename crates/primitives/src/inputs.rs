//! Input types and their canonical ordering.

use crate::encoding::{Decodable, DecodeError, Decoder, Encodable, Encoder};
use crate::ids::Id;
use crate::syntax::{is_sorted_unique, SyntaxError};
use crate::utxo::UtxoId;

pub const TRANSFER_INPUT_TYPE_ID: u32 = 5;
pub const STAKEABLE_LOCK_IN_TYPE_ID: u32 = 21;

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TransferInput {
    pub amount: u64,
    /// Indices into the spent owner's addresses, one credential signature each.
    pub sig_indices: Vec<u32>,
}

impl TransferInput {
    pub fn verify(&self) -> Result<(), SyntaxError> {
        if self.amount == 0 {
            return Err(SyntaxError::ZeroAmount);
        }
        verify_sig_indices(&self.sig_indices)
    }
}

pub fn verify_sig_indices(sig_indices: &[u32]) -> Result<(), SyntaxError> {
    if !is_sorted_unique(sig_indices) {
        return Err(SyntaxError::SigIndicesNotSortedUnique);
    }
    Ok(())
}

impl Encodable for TransferInput {
    fn encode_to(&self, encoder: &mut Encoder) {
        encoder.write_u64(self.amount);
        encoder.write_u32_list(&self.sig_indices);
    }
}

impl Decodable for TransferInput {
    fn decode_from(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        Ok(Self {
            amount: decoder.read_u64()?,
            sig_indices: decoder.read_u32_list()?,
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct StakeableLockIn {
    pub locktime: u64,
    pub inner: TransferInput,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Input {
    Transfer(TransferInput),
    StakeableLock(StakeableLockIn),
}

impl Input {
    pub fn amount(&self) -> u64 {
        self.inner().amount
    }

    pub fn sig_indices(&self) -> &[u32] {
        &self.inner().sig_indices
    }

    pub fn inner(&self) -> &TransferInput {
        match self {
            Input::Transfer(input) => input,
            Input::StakeableLock(input) => &input.inner,
        }
    }

    pub fn stake_locktime(&self) -> u64 {
        match self {
            Input::Transfer(_) => 0,
            Input::StakeableLock(input) => input.locktime,
        }
    }

    pub fn verify(&self) -> Result<(), SyntaxError> {
        match self {
            Input::Transfer(input) => input.verify(),
            Input::StakeableLock(input) => {
                if input.locktime == 0 {
                    return Err(SyntaxError::ZeroLocktime);
                }
                input.inner.verify()
            }
        }
    }
}

impl Encodable for Input {
    fn encode_to(&self, encoder: &mut Encoder) {
        match self {
            Input::Transfer(input) => {
                encoder.write_u32(TRANSFER_INPUT_TYPE_ID);
                input.encode_to(encoder);
            }
            Input::StakeableLock(input) => {
                encoder.write_u32(STAKEABLE_LOCK_IN_TYPE_ID);
                encoder.write_u64(input.locktime);
                encoder.write_u32(TRANSFER_INPUT_TYPE_ID);
                input.inner.encode_to(encoder);
            }
        }
    }
}

impl Decodable for Input {
    fn decode_from(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        match decoder.read_u32()? {
            TRANSFER_INPUT_TYPE_ID => Ok(Input::Transfer(TransferInput::decode_from(decoder)?)),
            STAKEABLE_LOCK_IN_TYPE_ID => {
                let locktime = decoder.read_u64()?;
                match decoder.read_u32()? {
                    TRANSFER_INPUT_TYPE_ID => Ok(Input::StakeableLock(StakeableLockIn {
                        locktime,
                        inner: TransferInput::decode_from(decoder)?,
                    })),
                    STAKEABLE_LOCK_IN_TYPE_ID => {
                        Err(DecodeError::InvalidData("nested stakeable lock input"))
                    }
                    other => Err(DecodeError::UnknownTypeId(other)),
                }
            }
            other => Err(DecodeError::UnknownTypeId(other)),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TransferableInput {
    pub utxo_id: UtxoId,
    pub asset_id: Id,
    pub input: Input,
}

impl TransferableInput {
    pub fn amount(&self) -> u64 {
        self.input.amount()
    }
}

impl Encodable for TransferableInput {
    fn encode_to(&self, encoder: &mut Encoder) {
        self.utxo_id.encode_to(encoder);
        self.asset_id.encode_to(encoder);
        self.input.encode_to(encoder);
    }
}

impl Decodable for TransferableInput {
    fn decode_from(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        Ok(Self {
            utxo_id: UtxoId::decode_from(decoder)?,
            asset_id: Id::decode_from(decoder)?,
            input: Input::decode_from(decoder)?,
        })
    }
}

pub fn sort_inputs(inputs: &mut [TransferableInput]) {
    inputs.sort_by_key(|input| input.utxo_id);
}

/// Sorts inputs by UTXO id, carrying each input's signer set along.
pub fn sort_inputs_with_signers<S>(inputs: &mut Vec<TransferableInput>, signers: &mut Vec<S>) {
    let mut paired: Vec<(TransferableInput, S)> =
        inputs.drain(..).zip(signers.drain(..)).collect();
    paired.sort_by_key(|(input, _)| input.utxo_id);
    for (input, signer) in paired {
        inputs.push(input);
        signers.push(signer);
    }
}

pub fn inputs_sorted_unique(inputs: &[TransferableInput]) -> bool {
    inputs
        .windows(2)
        .all(|pair| pair[0].utxo_id < pair[1].utxo_id)
}

pub fn verify_inputs(inputs: &[TransferableInput]) -> Result<(), SyntaxError> {
    for input in inputs {
        input.input.verify()?;
    }
    if !inputs_sorted_unique(inputs) {
        return Err(SyntaxError::InputsNotSortedUnique);
    }
    Ok(())
}

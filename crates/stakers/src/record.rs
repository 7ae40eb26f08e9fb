//! Stored form of staker entries.

use std::sync::Arc;

use allyd_primitives::encoding::{Decoder, Encoder};
use allyd_primitives::{DecodeError, Tx};

use crate::current::CurrentStaker;

/// Current staker record: potential reward followed by the signed tx.
pub fn encode_current(current: &CurrentStaker) -> Vec<u8> {
    let mut encoder = Encoder::with_version();
    encoder.write_u64(current.potential_reward);
    encoder.write_bytes(current.staker.tx.bytes());
    encoder.into_inner()
}

pub fn decode_current(bytes: &[u8]) -> Result<(Arc<Tx>, u64), DecodeError> {
    let mut decoder = Decoder::new(bytes);
    decoder.read_version()?;
    let potential_reward = decoder.read_u64()?;
    let tx = Tx::decode(&decoder.read_bytes()?)?;
    if !decoder.is_empty() {
        return Err(DecodeError::TrailingBytes);
    }
    Ok((Arc::new(tx), potential_reward))
}

/// Pending stakers are stored as their signed bytes.
pub fn encode_pending(tx: &Tx) -> Vec<u8> {
    tx.bytes().to_vec()
}

pub fn decode_pending(bytes: &[u8]) -> Result<Arc<Tx>, DecodeError> {
    Tx::decode(bytes).map(Arc::new)
}

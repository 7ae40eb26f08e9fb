use crate::encoding::{Decodable, DecodeError, Decoder, Encodable, Encoder};
use crate::ids::Id;
use crate::outputs::Output;

/// Reference to the `output_index`th output of transaction `tx_id`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct UtxoId {
    pub tx_id: Id,
    pub output_index: u32,
}

impl UtxoId {
    pub const KEY_LEN: usize = 36;

    pub fn new(tx_id: Id, output_index: u32) -> Self {
        Self {
            tx_id,
            output_index,
        }
    }

    /// Storage key; byte order matches the `Ord` impl.
    pub fn key(&self) -> [u8; Self::KEY_LEN] {
        let mut out = [0u8; Self::KEY_LEN];
        out[..32].copy_from_slice(&self.tx_id.0);
        out[32..].copy_from_slice(&self.output_index.to_be_bytes());
        out
    }

    pub fn from_key(key: &[u8]) -> Option<Self> {
        if key.len() != Self::KEY_LEN {
            return None;
        }
        let mut tx_id = [0u8; 32];
        tx_id.copy_from_slice(&key[..32]);
        let mut index = [0u8; 4];
        index.copy_from_slice(&key[32..]);
        Some(Self::new(Id(tx_id), u32::from_be_bytes(index)))
    }
}

impl std::fmt::Display for UtxoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.output_index)
    }
}

impl Encodable for UtxoId {
    fn encode_to(&self, encoder: &mut Encoder) {
        self.tx_id.encode_to(encoder);
        encoder.write_u32(self.output_index);
    }
}

impl Decodable for UtxoId {
    fn decode_from(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        Ok(Self {
            tx_id: Id::decode_from(decoder)?,
            output_index: decoder.read_u32()?,
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Utxo {
    pub utxo_id: UtxoId,
    pub asset_id: Id,
    pub output: Output,
}

impl Utxo {
    pub fn amount(&self) -> u64 {
        self.output.amount()
    }
}

impl Encodable for Utxo {
    fn encode_to(&self, encoder: &mut Encoder) {
        self.utxo_id.encode_to(encoder);
        self.asset_id.encode_to(encoder);
        self.output.encode_to(encoder);
    }
}

impl Decodable for Utxo {
    fn decode_from(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        Ok(Self {
            utxo_id: UtxoId::decode_from(decoder)?,
            asset_id: Id::decode_from(decoder)?,
            output: Output::decode_from(decoder)?,
        })
    }
}

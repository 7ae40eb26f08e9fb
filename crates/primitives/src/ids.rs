//! Fixed-width identifiers.

use std::fmt;

use allyd_consensus::Hash256;

use crate::encoding::{Decodable, DecodeError, Decoder, Encodable, Encoder};

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for byte in bytes {
        write!(f, "{byte:02x}")?;
    }
    Ok(())
}

fn parse_hex<const N: usize>(raw: &str) -> Option<[u8; N]> {
    let raw = raw.trim();
    if raw.len() != N * 2 || !raw.is_ascii() {
        return None;
    }
    let mut out = [0u8; N];
    for (index, slot) in out.iter_mut().enumerate() {
        *slot = u8::from_str_radix(&raw[index * 2..index * 2 + 2], 16).ok()?;
    }
    Some(out)
}

/// 32-byte identifier: transactions, assets, chains, allychains.
#[derive(Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Id(pub [u8; 32]);

impl Id {
    /// The primary network and the platform chain share the empty id.
    pub const EMPTY: Id = Id([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    pub fn from_hex(raw: &str) -> Option<Self> {
        parse_hex(raw).map(Self)
    }

    /// Derives the id of the `index`th child, e.g. an output created by a transaction.
    pub fn prefixed(&self, index: u64) -> Id {
        let mut data = Vec::with_capacity(40);
        data.extend_from_slice(&index.to_be_bytes());
        data.extend_from_slice(&self.0);
        crate::hash::sha256(&data)
    }
}

impl From<Hash256> for Id {
    fn from(value: Hash256) -> Self {
        Id(value)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex(f, &self.0)
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({self})")
    }
}

impl Encodable for Id {
    fn encode_to(&self, encoder: &mut Encoder) {
        encoder.write_fixed(&self.0);
    }
}

impl Decodable for Id {
    fn decode_from(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        Ok(Id(decoder.read_fixed()?))
    }
}

/// 20-byte identifier; addresses are the hash160 of a compressed public key.
#[derive(Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ShortId(pub [u8; 20]);

impl ShortId {
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn from_hex(raw: &str) -> Option<Self> {
        parse_hex(raw).map(Self)
    }
}

impl fmt::Display for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex(f, &self.0)
    }
}

impl fmt::Debug for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShortId({self})")
    }
}

impl Encodable for ShortId {
    fn encode_to(&self, encoder: &mut Encoder) {
        encoder.write_fixed(&self.0);
    }
}

impl Decodable for ShortId {
    fn decode_from(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        Ok(ShortId(decoder.read_fixed()?))
    }
}

/// Identity of a validating node.
#[derive(Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeId(pub [u8; 20]);

impl NodeId {
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl From<ShortId> for NodeId {
    fn from(value: ShortId) -> Self {
        NodeId(value.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NodeID-")?;
        write_hex(f, &self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl Encodable for NodeId {
    fn encode_to(&self, encoder: &mut Encoder) {
        encoder.write_fixed(&self.0);
    }
}

impl Decodable for NodeId {
    fn decode_from(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        Ok(NodeId(decoder.read_fixed()?))
    }
}

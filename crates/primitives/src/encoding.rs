//! Deterministic big-endian codec.
//!
//! Integers are fixed-width big-endian, byte strings and lists carry a `u32`
//! length prefix, and every top-level object is tagged with
//! [`CODEC_VERSION`].

use allyd_consensus::constants::CODEC_VERSION;

#[derive(Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version() -> Self {
        let mut encoder = Self::new();
        encoder.write_u16(CODEC_VERSION);
        encoder
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_fixed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn write_len(&mut self, len: usize) {
        // Lengths above u32::MAX never pass the size limits enforced upstream.
        self.write_u32(u32::try_from(len).unwrap_or(u32::MAX));
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_len(bytes.len());
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_str(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    pub fn write_list<T: Encodable>(&mut self, items: &[T]) {
        self.write_len(items.len());
        for item in items {
            item.encode_to(self);
        }
    }

    pub fn write_u32_list(&mut self, items: &[u32]) {
        self.write_len(items.len());
        for item in items {
            self.write_u32(*item);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    UnexpectedEof,
    SizeTooLarge,
    UnknownVersion(u16),
    UnknownTypeId(u32),
    InvalidData(&'static str),
    TrailingBytes,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::UnexpectedEof => write!(f, "unexpected end of input"),
            DecodeError::SizeTooLarge => write!(f, "length prefix exceeds remaining input"),
            DecodeError::UnknownVersion(version) => write!(f, "unknown codec version {version}"),
            DecodeError::UnknownTypeId(id) => write!(f, "unknown type id {id}"),
            DecodeError::InvalidData(message) => write!(f, "{message}"),
            DecodeError::TrailingBytes => write!(f, "trailing bytes after decode"),
        }
    }
}

impl std::error::Error for DecodeError {}

pub struct Decoder<'a> {
    input: &'a [u8],
    cursor: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, cursor: 0 }
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.input.len().saturating_sub(self.cursor)
    }

    pub fn is_empty(&self) -> bool {
        self.cursor >= self.input.len()
    }

    /// Bytes consumed between `start` and the cursor.
    pub fn consumed_since(&self, start: usize) -> &'a [u8] {
        &self.input[start.min(self.cursor)..self.cursor]
    }

    fn read_slice(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::UnexpectedEof);
        }
        let start = self.cursor;
        self.cursor += len;
        Ok(&self.input[start..start + len])
    }

    pub fn read_version(&mut self) -> Result<(), DecodeError> {
        let version = self.read_u16()?;
        if version != CODEC_VERSION {
            return Err(DecodeError::UnknownVersion(version));
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_slice(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(DecodeError::InvalidData("invalid bool")),
        }
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_be_bytes(self.read_fixed()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_be_bytes(self.read_fixed()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_be_bytes(self.read_fixed()?))
    }

    pub fn read_fixed<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let bytes = self.read_slice(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Reads a length prefix for items of at least `min_item_size` bytes.
    fn read_len(&mut self, min_item_size: usize) -> Result<usize, DecodeError> {
        let len = usize::try_from(self.read_u32()?).map_err(|_| DecodeError::SizeTooLarge)?;
        if len.saturating_mul(min_item_size.max(1)) > self.remaining() {
            return Err(DecodeError::SizeTooLarge);
        }
        Ok(len)
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = self.read_len(1)?;
        Ok(self.read_slice(len)?.to_vec())
    }

    pub fn read_str(&mut self) -> Result<String, DecodeError> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|_| DecodeError::InvalidData("invalid utf8 string"))
    }

    pub fn read_list<T: Decodable>(&mut self) -> Result<Vec<T>, DecodeError> {
        let len = self.read_len(1)?;
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(T::decode_from(self)?);
        }
        Ok(items)
    }

    pub fn read_u32_list(&mut self) -> Result<Vec<u32>, DecodeError> {
        let len = self.read_len(4)?;
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(self.read_u32()?);
        }
        Ok(items)
    }
}

pub trait Encodable {
    fn encode_to(&self, encoder: &mut Encoder);
}

pub trait Decodable: Sized {
    fn decode_from(decoder: &mut Decoder) -> Result<Self, DecodeError>;
}

/// Encodes without the version tag, for nested objects and ordering keys.
pub fn encode<T: Encodable>(value: &T) -> Vec<u8> {
    let mut encoder = Encoder::new();
    value.encode_to(&mut encoder);
    encoder.into_inner()
}

pub fn decode<T: Decodable>(bytes: &[u8]) -> Result<T, DecodeError> {
    let mut decoder = Decoder::new(bytes);
    let value = T::decode_from(&mut decoder)?;
    if !decoder.is_empty() {
        return Err(DecodeError::TrailingBytes);
    }
    Ok(value)
}

pub fn encode_versioned<T: Encodable>(value: &T) -> Vec<u8> {
    let mut encoder = Encoder::with_version();
    value.encode_to(&mut encoder);
    encoder.into_inner()
}

pub fn decode_versioned<T: Decodable>(bytes: &[u8]) -> Result<T, DecodeError> {
    let mut decoder = Decoder::new(bytes);
    decoder.read_version()?;
    let value = T::decode_from(&mut decoder)?;
    if !decoder.is_empty() {
        return Err(DecodeError::TrailingBytes);
    }
    Ok(value)
}

impl Encodable for u64 {
    fn encode_to(&self, encoder: &mut Encoder) {
        encoder.write_u64(*self);
    }
}

impl Decodable for u64 {
    fn decode_from(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        decoder.read_u64()
    }
}

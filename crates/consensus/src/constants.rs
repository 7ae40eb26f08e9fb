//! Consensus-wide constants shared across the ledger crates.

/// Schema tag prefixed to every encoded object.
pub const CODEC_VERSION: u16 = 0;
/// A validator may carry at most this multiple of its own weight, nominations included.
pub const MAX_VALIDATOR_WEIGHT_FACTOR: u64 = 5;
/// Denominator for nomination fee shares and consumption rates.
pub const PERCENT_DENOMINATOR: u64 = 1_000_000;
/// Maximum size of a transaction memo, in bytes.
pub const MAX_MEMO_SIZE: usize = 256;
/// Maximum length of a chain name.
pub const MAX_CHAIN_NAME_LEN: usize = 128;
/// Maximum number of addresses an owner predicate may list.
pub const MAX_OWNER_ADDRESSES: usize = 256;
/// Maximum number of inputs, outputs, or credentials in a single transaction.
pub const MAX_TX_ITEMS: usize = 4_096;
/// Maximum size of a serialized transaction.
pub const MAX_TX_SIZE: usize = 1 << 20;
/// Maximum size of the genesis payload carried by a chain creation.
pub const MAX_GENESIS_DATA_SIZE: usize = 512 * 1024;

//! Syntactic validation failures.

use crate::ids::Id;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    WrongNetworkId { expected: u32, got: u32 },
    WrongChainId { expected: Id, got: Id },
    MemoTooLarge(usize),
    TooManyItems(&'static str),
    TxTooLarge(usize),
    ZeroAmount,
    ZeroLocktime,
    NestedLock,
    ThresholdTooHigh { threshold: u32, addresses: usize },
    UnoptimizedOwners,
    AddressesNotSortedUnique,
    SigIndicesNotSortedUnique,
    OutputsNotSorted,
    InputsNotSortedUnique,
    ZeroWeight,
    EmptyStakingPeriod,
    StakeWeightMismatch { staked: u64, weight: u64 },
    StakeNotNative(Id),
    TooManyShares(u32),
    PrimaryNetworkAllychain,
    ChainNameTooLong(usize),
    IllegalChainName,
    FxIdsNotSortedUnique,
    GenesisTooLarge(usize),
    NoImportInputs,
    NoExportOutputs,
    LockedCrossChain,
    NoCredentials,
    Overflow,
}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyntaxError::WrongNetworkId { expected, got } => {
                write!(f, "wrong network id: expected {expected}, got {got}")
            }
            SyntaxError::WrongChainId { expected, got } => {
                write!(f, "wrong chain id: expected {expected}, got {got}")
            }
            SyntaxError::MemoTooLarge(len) => write!(f, "memo of {len} bytes is too large"),
            SyntaxError::TooManyItems(what) => write!(f, "too many {what}"),
            SyntaxError::TxTooLarge(len) => write!(f, "transaction of {len} bytes is too large"),
            SyntaxError::ZeroAmount => write!(f, "zero amount"),
            SyntaxError::ZeroLocktime => write!(f, "stakeable lock with zero locktime"),
            SyntaxError::NestedLock => write!(f, "nested stakeable lock"),
            SyntaxError::ThresholdTooHigh {
                threshold,
                addresses,
            } => write!(
                f,
                "threshold {threshold} exceeds {addresses} owner addresses"
            ),
            SyntaxError::UnoptimizedOwners => {
                write!(f, "owner with zero threshold lists addresses")
            }
            SyntaxError::AddressesNotSortedUnique => {
                write!(f, "owner addresses not sorted and unique")
            }
            SyntaxError::SigIndicesNotSortedUnique => {
                write!(f, "signature indices not sorted and unique")
            }
            SyntaxError::OutputsNotSorted => write!(f, "outputs not sorted"),
            SyntaxError::InputsNotSortedUnique => write!(f, "inputs not sorted and unique"),
            SyntaxError::ZeroWeight => write!(f, "staker weight is zero"),
            SyntaxError::EmptyStakingPeriod => write!(f, "staking end time not after start time"),
            SyntaxError::StakeWeightMismatch { staked, weight } => {
                write!(f, "staked {staked} does not match weight {weight}")
            }
            SyntaxError::StakeNotNative(asset) => write!(f, "stake of non-native asset {asset}"),
            SyntaxError::TooManyShares(shares) => write!(f, "shares {shares} exceed 100%"),
            SyntaxError::PrimaryNetworkAllychain => {
                write!(f, "primary network is not a valid allychain")
            }
            SyntaxError::ChainNameTooLong(len) => write!(f, "chain name of {len} bytes is too long"),
            SyntaxError::IllegalChainName => write!(f, "chain name has illegal characters"),
            SyntaxError::FxIdsNotSortedUnique => write!(f, "fx ids not sorted and unique"),
            SyntaxError::GenesisTooLarge(len) => write!(f, "genesis of {len} bytes is too large"),
            SyntaxError::NoImportInputs => write!(f, "import without inputs"),
            SyntaxError::NoExportOutputs => write!(f, "export without outputs"),
            SyntaxError::LockedCrossChain => write!(f, "locked value cannot cross chains"),
            SyntaxError::NoCredentials => write!(f, "credential count does not match inputs"),
            SyntaxError::Overflow => write!(f, "amount overflow"),
        }
    }
}

impl std::error::Error for SyntaxError {}

pub(crate) fn is_sorted_unique<T: Ord>(items: &[T]) -> bool {
    items.windows(2).all(|pair| pair[0] < pair[1])
}

//! Monetary units of the native asset.

pub type Amount = u64;

pub const NANO: Amount = 1;
pub const MICRO: Amount = 1_000 * NANO;
pub const MILLI: Amount = 1_000 * MICRO;
pub const UNIT: Amount = 1_000 * MILLI;
pub const KILO: Amount = 1_000 * UNIT;
pub const MEGA: Amount = 1_000 * KILO;

/// No supply larger than this (in nano units) is ever minted.
pub const MAX_SUPPLY: Amount = 720 * MEGA;

pub fn money_range(value: Amount) -> bool {
    value <= MAX_SUPPLY
}

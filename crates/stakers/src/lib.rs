//! Pending and current staker sets with copy-on-write snapshots.

pub mod current;
pub mod overflow;
pub mod pending;
pub mod record;
pub mod staker;

pub use current::{CurrentStaker, CurrentStakers, CurrentValidator};
pub use overflow::{can_delegate, max_stake_amount};
pub use pending::{PendingNode, PendingStakers};
pub use staker::{Staker, StakerError, StakerKey};

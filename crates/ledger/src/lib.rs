//! Platform chain ledger: durable state, versioned overlays, UTXO spending,
//! transaction execution and the mempool.

pub mod atomic;
pub mod builder;
pub mod executor;
pub mod mempool;
pub mod spend;
pub mod state;
pub mod txindex;
pub mod utxo;
pub mod versioned;

pub use atomic::{AtomicError, AtomicRequests, MemorySharedMemory, SharedMemory};
pub use builder::{BuildError, TxBuilder};
pub use executor::{DecisionOutcome, ExecutionError, Executor, ProposalOutcome, RejectKind};
pub use mempool::{Mempool, MempoolError, MempoolErrorKind};
pub use spend::{
    spend, verify_spend, verify_spend_utxos, FlowCheck, Spend, SpendError, SpendRequest,
};
pub use state::{ChainState, Genesis, StateError, StateView};
pub use txindex::TxStatus;
pub use versioned::VersionedState;

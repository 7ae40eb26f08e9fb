//! Identifiers, codec, outputs/inputs, and platform transaction types.

pub mod encoding;
pub mod hash;
pub mod ids;
pub mod inputs;
pub mod outputs;
pub mod syntax;
pub mod transaction;
pub mod utxo;

pub use encoding::{decode, decode_versioned, encode, encode_versioned, DecodeError};
pub use hash::{hash160, sha256};
pub use ids::{Id, NodeId, ShortId};
pub use inputs::{Input, StakeableLockIn, TransferInput, TransferableInput};
pub use outputs::{Output, OutputOwners, StakeableLockOut, TransferOutput, TransferableOutput};
pub use syntax::SyntaxError;
pub use transaction::{
    AddAllychainValidatorTx, AddNominatorTx, AddValidatorTx, AdvanceTimeTx, AllychainAuth,
    BaseTx, CreateAllychainTx, CreateChainTx, Credential, ExportTx, ImportTx, Tx, TxKind,
    UnsignedTx, Validator,
};
pub use utxo::{Utxo, UtxoId};

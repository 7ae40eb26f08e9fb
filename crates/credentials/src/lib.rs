//! Recoverable secp256k1 credentials over platform transactions.

pub mod keychain;
pub mod secp;
pub mod signer;
pub mod verify;

pub use keychain::{address_of, Keychain};
pub use secp256k1::SecretKey;
pub use signer::{sign_digest, sign_tx, unsigned_digest};
pub use verify::{recover_address, verify_credential, CredentialError};

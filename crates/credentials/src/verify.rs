use allyd_primitives::transaction::SIGNATURE_LEN;
use allyd_primitives::{Credential, Id, OutputOwners, ShortId};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::Message;

use crate::keychain::address_of;
use crate::secp::secp256k1_verify;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    Timelocked { locktime: u64, time: u64 },
    TooFewSigners { threshold: u32, signers: usize },
    TooManySigners { threshold: u32, signers: usize },
    SignatureCountMismatch { expected: usize, got: usize },
    IndexOutOfBounds(u32),
    InvalidSignature,
    WrongSigner { index: u32 },
}

impl std::fmt::Display for CredentialError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialError::Timelocked { locktime, time } => {
                write!(f, "owner timelocked until {locktime}, now {time}")
            }
            CredentialError::TooFewSigners { threshold, signers } => {
                write!(f, "{signers} signers below threshold {threshold}")
            }
            CredentialError::TooManySigners { threshold, signers } => {
                write!(f, "{signers} signers above threshold {threshold}")
            }
            CredentialError::SignatureCountMismatch { expected, got } => {
                write!(f, "expected {expected} signatures, got {got}")
            }
            CredentialError::IndexOutOfBounds(index) => {
                write!(f, "signature index {index} out of bounds")
            }
            CredentialError::InvalidSignature => write!(f, "malformed signature"),
            CredentialError::WrongSigner { index } => {
                write!(f, "signature for index {index} from wrong key")
            }
        }
    }
}

impl std::error::Error for CredentialError {}

pub fn recover_address(
    digest: &Id,
    signature: &[u8; SIGNATURE_LEN],
) -> Result<ShortId, CredentialError> {
    let recovery_id = RecoveryId::from_i32(i32::from(signature[64]))
        .map_err(|_| CredentialError::InvalidSignature)?;
    let recoverable = RecoverableSignature::from_compact(&signature[..64], recovery_id)
        .map_err(|_| CredentialError::InvalidSignature)?;
    let public_key = secp256k1_verify()
        .recover_ecdsa(&Message::from_digest(digest.0), &recoverable)
        .map_err(|_| CredentialError::InvalidSignature)?;
    Ok(address_of(&public_key))
}

/// Checks that `credential` satisfies `owners` through `sig_indices` at `time`.
pub fn verify_credential(
    owners: &OutputOwners,
    sig_indices: &[u32],
    credential: &Credential,
    digest: &Id,
    time: u64,
) -> Result<(), CredentialError> {
    if owners.locktime > time {
        return Err(CredentialError::Timelocked {
            locktime: owners.locktime,
            time,
        });
    }
    let signers = sig_indices.len();
    let threshold = owners.threshold as usize;
    if signers < threshold {
        return Err(CredentialError::TooFewSigners {
            threshold: owners.threshold,
            signers,
        });
    }
    if signers > threshold {
        return Err(CredentialError::TooManySigners {
            threshold: owners.threshold,
            signers,
        });
    }
    if credential.signatures.len() != signers {
        return Err(CredentialError::SignatureCountMismatch {
            expected: signers,
            got: credential.signatures.len(),
        });
    }
    for (index, signature) in sig_indices.iter().zip(&credential.signatures) {
        let expected = owners
            .addresses
            .get(*index as usize)
            .ok_or(CredentialError::IndexOutOfBounds(*index))?;
        if recover_address(digest, signature)? != *expected {
            return Err(CredentialError::WrongSigner { index: *index });
        }
    }
    Ok(())
}

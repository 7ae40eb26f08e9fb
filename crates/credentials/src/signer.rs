use allyd_primitives::transaction::SIGNATURE_LEN;
use allyd_primitives::{encode_versioned, sha256, Credential, Id, Tx, UnsignedTx};
use secp256k1::{Message, SecretKey};

use crate::secp::secp256k1_sign;

/// Digest signed by every credential of `unsigned`.
pub fn unsigned_digest(unsigned: &UnsignedTx) -> Id {
    sha256(&encode_versioned(unsigned))
}

/// Compact signature followed by the recovery id.
pub fn sign_digest(key: &SecretKey, digest: &Id) -> [u8; SIGNATURE_LEN] {
    let message = Message::from_digest(digest.0);
    let signature = secp256k1_sign().sign_ecdsa_recoverable(&message, key);
    let (recovery_id, compact) = signature.serialize_compact();
    let mut out = [0u8; SIGNATURE_LEN];
    out[..64].copy_from_slice(&compact);
    out[64] = recovery_id.to_i32() as u8;
    out
}

/// Signs `unsigned` with one credential per signer set, in input order.
pub fn sign_tx(unsigned: UnsignedTx, signers: &[Vec<SecretKey>]) -> Tx {
    let digest = unsigned_digest(&unsigned);
    let creds = signers
        .iter()
        .map(|keys| Credential {
            signatures: keys.iter().map(|key| sign_digest(key, &digest)).collect(),
        })
        .collect();
    Tx::new(unsigned, creds)
}

use allyd_credentials::{
    sign_digest, sign_tx, unsigned_digest, verify_credential, CredentialError, Keychain, SecretKey,
};
use allyd_primitives::{AdvanceTimeTx, Credential, Id, OutputOwners, UnsignedTx};

fn key(byte: u8) -> SecretKey {
    SecretKey::from_slice(&[byte; 32]).expect("secret key")
}

fn owners_for(keychain: &Keychain, threshold: u32) -> OutputOwners {
    OutputOwners {
        locktime: 0,
        threshold,
        addresses: keychain.addresses(),
    }
}

#[test]
fn signed_credential_verifies() {
    let keychain = Keychain::from_keys([key(1), key(2)]);
    let owners = owners_for(&keychain, 2);
    let digest = Id([5; 32]);
    let (indices, keys) = keychain.match_owners(&owners, 0).expect("match");
    let credential = Credential {
        signatures: keys.iter().map(|key| sign_digest(key, &digest)).collect(),
    };
    verify_credential(&owners, &indices, &credential, &digest, 0).expect("verify");
}

#[test]
fn wrong_digest_or_key_is_rejected() {
    let keychain = Keychain::from_keys([key(1)]);
    let owners = owners_for(&keychain, 1);
    let digest = Id([5; 32]);

    let other_digest = Credential {
        signatures: vec![sign_digest(&key(1), &Id([6; 32]))],
    };
    assert_eq!(
        verify_credential(&owners, &[0], &other_digest, &digest, 0),
        Err(CredentialError::WrongSigner { index: 0 })
    );

    let other_key = Credential {
        signatures: vec![sign_digest(&key(9), &digest)],
    };
    assert_eq!(
        verify_credential(&owners, &[0], &other_key, &digest, 0),
        Err(CredentialError::WrongSigner { index: 0 })
    );
}

#[test]
fn predicate_shape_errors() {
    let keychain = Keychain::from_keys([key(1)]);
    let digest = Id([5; 32]);
    let credential = Credential {
        signatures: vec![sign_digest(&key(1), &digest)],
    };

    let locked = OutputOwners {
        locktime: 10,
        ..owners_for(&keychain, 1)
    };
    assert_eq!(
        verify_credential(&locked, &[0], &credential, &digest, 9),
        Err(CredentialError::Timelocked {
            locktime: 10,
            time: 9
        })
    );

    let owners = owners_for(&keychain, 1);
    assert_eq!(
        verify_credential(&owners, &[], &credential, &digest, 0),
        Err(CredentialError::TooFewSigners {
            threshold: 1,
            signers: 0
        })
    );
    assert_eq!(
        verify_credential(&owners, &[3], &credential, &digest, 0),
        Err(CredentialError::IndexOutOfBounds(3))
    );
    assert_eq!(
        verify_credential(&owners, &[0], &Credential::default(), &digest, 0),
        Err(CredentialError::SignatureCountMismatch {
            expected: 1,
            got: 0
        })
    );
}

#[test]
fn sign_tx_uses_unsigned_digest() {
    let unsigned = UnsignedTx::AdvanceTime(AdvanceTimeTx { time: 7 });
    let tx = sign_tx(unsigned.clone(), &[vec![key(1)]]);
    assert_eq!(tx.signature_digest(), unsigned_digest(&unsigned));
    assert_eq!(tx.creds.len(), 1);
    assert_eq!(tx.creds[0].signatures.len(), 1);
}

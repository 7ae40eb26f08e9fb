use ripemd::{Digest as RipemdDigest, Ripemd160};
use sha2::Sha256;

use crate::ids::{Id, ShortId};

pub fn sha256(data: &[u8]) -> Id {
    let digest = Sha256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Id(out)
}

pub fn hash160(data: &[u8]) -> ShortId {
    let sha = Sha256::digest(data);
    let digest = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest);
    ShortId(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256(b"").to_string(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn hash160_of_empty_input() {
        assert_eq!(
            hash160(b"").to_string(),
            "b472a266d0bd89c13706a4132ccfb16f7c3b9fcb"
        );
    }
}

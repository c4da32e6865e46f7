//! Content fingerprints used to tell a new clipboard image from one already
//! uploaded in this session.

use std::fmt;

use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

pub fn fingerprint(data: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Fingerprint(hasher.finalize().into())
}

/// True when nothing has been uploaded yet or `fp` differs from the last upload.
pub fn is_new(fp: &Fingerprint, last: Option<&Fingerprint>) -> bool {
    last != Some(fp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_bytes_give_identical_fingerprints() {
        let a = vec![0x89, b'P', b'N', b'G', 1, 2, 3];
        assert_eq!(fingerprint(&a), fingerprint(&a.clone()));
    }

    #[test]
    fn single_byte_difference_changes_fingerprint() {
        let a = vec![7u8; 4096];
        let mut b = a.clone();
        b[2048] = 8;
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn novelty_against_last_upload() {
        let a = fingerprint(b"image a");
        let b = fingerprint(b"image b");
        assert!(is_new(&a, None));
        assert!(!is_new(&a, Some(&a)));
        assert!(is_new(&b, Some(&a)));
    }

    #[test]
    fn displays_as_lowercase_hex() {
        let fp = fingerprint(b"");
        assert_eq!(
            fp.to_string(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}

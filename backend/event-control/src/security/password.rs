//! Secret hashing and comparison.
//!
//! Event access passwords and admin passwords are stored as bcrypt digests.
//! Legacy event records that predate hashing hold the plaintext; those are
//! compared constant-time. A stored value is treated as a bcrypt digest iff
//! it carries the `$2` prefix.

use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};

pub fn hash(secret: &str, cost: u32) -> Result<String> {
    bcrypt::hash(secret, cost).map_err(Into::into)
}

/// Constant-time equality over byte strings of possibly differing length.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        // Burn comparable work before rejecting.
        let _ = a.ct_eq(a);
        return false;
    }
    a.ct_eq(b).into()
}

/// Verifies a submitted secret against a stored value, bcrypt or legacy
/// plaintext per the `$2` prefix policy.
pub fn verify(submitted: &str, stored: &str) -> Result<bool> {
    if stored.starts_with("$2") {
        bcrypt::verify(submitted, stored)
            .map_err(|e| AppError::Internal(format!("password verification error: {e}")))
    } else {
        Ok(constant_time_eq(submitted, stored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bcrypt_round_trip() {
        let digest = hash("P@ss", 4).unwrap();
        assert!(digest.starts_with("$2"));
        assert!(verify("P@ss", &digest).unwrap());
        assert!(!verify("WRONG", &digest).unwrap());
    }

    #[test]
    fn legacy_plaintext_compares_constant_time() {
        assert!(verify("P@ss", "P@ss").unwrap());
        assert!(!verify("P@ss", "other").unwrap());
        assert!(!verify("P@ss", "P@sS").unwrap());
    }
}

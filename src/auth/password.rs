//! Stored password format: `sha256$<iterations>$<salt-hex>$<digest-hex>`.
//!
//! Rows written before hashing was introduced hold the plain password.
//! They still verify (as `ValidLegacy`) so the caller can upgrade them.

use sha2::{Digest, Sha256};

const SCHEME: &str = "sha256";
const ITERATIONS: u32 = 10_000;
const SALT_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Valid,
    /// Matched a legacy plain-text row; should be rehashed.
    ValidLegacy,
    Invalid,
}

impl Verification {
    pub fn is_valid(self) -> bool {
        !matches!(self, Verification::Invalid)
    }
}

fn digest(password: &str, salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(
        &Sha256::new()
            .chain_update(salt)
            .chain_update(password.as_bytes())
            .finalize(),
    );
    for _ in 1..iterations {
        let next = Sha256::new().chain_update(out).chain_update(salt).finalize();
        out.copy_from_slice(&next);
    }
    out
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn hash_password(password: &str) -> String {
    let salt: [u8; SALT_LEN] = rand::random();
    hash_with(password, &salt, ITERATIONS)
}

fn hash_with(password: &str, salt: &[u8], iterations: u32) -> String {
    format!(
        "{SCHEME}${iterations}${}${}",
        hex::encode(salt),
        hex::encode(digest(password, salt, iterations))
    )
}

pub fn is_hashed(stored: &str) -> bool {
    stored.starts_with("sha256$")
}

pub fn verify_password(password: &str, stored: &str) -> Verification {
    if !is_hashed(stored) {
        return if !stored.is_empty() && constant_time_eq(password.as_bytes(), stored.as_bytes()) {
            Verification::ValidLegacy
        } else {
            Verification::Invalid
        };
    }

    let parts: Vec<&str> = stored.split('$').collect();
    let [_, iterations, salt, expected] = parts.as_slice() else {
        return Verification::Invalid;
    };
    let (Ok(iterations), Ok(salt), Ok(expected)) = (
        iterations.parse::<u32>(),
        hex::decode(salt),
        hex::decode(expected),
    ) else {
        return Verification::Invalid;
    };
    if iterations == 0 {
        return Verification::Invalid;
    }

    if constant_time_eq(&digest(password, &salt, iterations), &expected) {
        Verification::Valid
    } else {
        Verification::Invalid
    }
}

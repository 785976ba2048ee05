//! Argon2id hashing for passwords and one-time codes.

use anyhow::{Result, anyhow};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("password hashing failed: {e}"))?
        .to_string();
    Ok(hash)
}

/// `Ok(false)` on mismatch; `Err` only if the stored hash is unreadable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| anyhow!("invalid hash format: {e}"))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow!("verify error: {e}")),
    }
}

/// Well-formed Argon2id hash with the default parameters. Nothing hashes to it.
const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$bXVybXVyLWR1bW15LXNhbHQ$833GLIzuSTcRdILlbb/Vl60FTShj9zgiWCve7U29qvI";

/// Spend the same work as a real verification and discard the result.
/// Used when the account does not exist so timing does not reveal that.
pub fn verify_against_dummy(password: &str) {
    let _ = verify_password(password, DUMMY_HASH);
}

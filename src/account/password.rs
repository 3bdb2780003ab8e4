//! Password hashing with Argon2id.
//!
//! The same hasher is used for setting and verifying passwords. Hashing runs
//! on the blocking pool so request tasks are not stalled by the key
//! derivation.

use crate::error::{AppError, AppResult};
use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

/// Memory cost in KiB (64 MiB)
const MEMORY_KIB: u32 = 65_536;
/// Iterations; with 64 MiB this costs at least as much as bcrypt at cost 12
const ITERATIONS: u32 = 3;
/// Parallelism
const PARALLELISM: u32 = 1;

fn argon2() -> AppResult<Argon2<'static>> {
    let params = Params::new(MEMORY_KIB, ITERATIONS, PARALLELISM, None)
        .map_err(|e| AppError::Internal(format!("Invalid Argon2 parameters: {}", e)))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a password, returning a PHC-formatted string
pub fn hash_password_blocking(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = argon2()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

    Ok(hash.to_string())
}

/// Verify a password against a PHC-formatted hash
///
/// Malformed hashes are reported as a non-match.
pub fn verify_password_blocking(password: &str, hash: &str) -> AppResult<bool> {
    let parsed = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(_) => {
            tracing::warn!("Stored password hash is not in PHC format");
            return Ok(false);
        }
    };

    Ok(argon2()?
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Hash a password on the blocking pool
pub async fn hash_password(password: &str) -> AppResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash_password_blocking(&password))
        .await
        .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))?
}

/// Verify a password on the blocking pool
pub async fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || verify_password_blocking(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("Verification task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password_blocking("pw1").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password_blocking("pw1", &hash).unwrap());
        assert!(!verify_password_blocking("pw2", &hash).unwrap());
    }

    #[test]
    fn test_hash_carries_cost_parameters() {
        let hash = hash_password_blocking("pw1").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        let params = Params::try_from(&parsed).unwrap();

        assert_eq!(params.m_cost(), MEMORY_KIB);
        assert_eq!(params.t_cost(), ITERATIONS);
        assert_eq!(params.p_cost(), PARALLELISM);
        assert!(hash.contains("m=65536,t=3,p=1"));
    }

    #[test]
    fn test_weaker_stored_hash_still_verifies() {
        let weak = Argon2::new(
            Algorithm::Argon2id,
            Version::V0x13,
            Params::new(19_456, 2, 1, None).unwrap(),
        );
        let salt = SaltString::generate(&mut OsRng);
        let hash = weak.hash_password(b"legacy", &salt).unwrap().to_string();

        assert!(verify_password_blocking("legacy", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password_blocking("same").unwrap();
        let b = hash_password_blocking("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_is_non_match() {
        assert!(!verify_password_blocking("pw", "not-a-hash").unwrap());
    }

    #[tokio::test]
    async fn test_async_wrappers() {
        let hash = hash_password("secret").await.unwrap();
        assert!(verify_password("secret", &hash).await.unwrap());
    }
}

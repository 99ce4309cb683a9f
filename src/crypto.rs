//! Cryptographic logics.

use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::{Argon2, Params, Version};
use rand::rngs::OsRng;

use crate::config::Argon2 as ArgonConfig;

type Result<T> = std::result::Result<T, CryptoError>;

/// Hashing errors.
#[derive(thiserror::Error, Debug)]
pub enum CryptoError {
    /// Wrong parameters or malformed hash input.
    #[error("argon2 error: {0}")]
    Argon2(String),
    /// Password does not match the stored PHC string.
    #[error("password mismatch")]
    Mismatch,
}

impl From<CryptoError> for crate::error::ServerError {
    fn from(err: CryptoError) -> Self {
        crate::error::ServerError::Internal {
            details: err.to_string(),
            source: None,
        }
    }
}

/// Password manager that uses Argon2id and PHC string format for hashing and
/// verification.
pub struct PasswordManager {
    params: Params,
}

impl PasswordManager {
    /// Create a new [`PasswordManager`].
    pub fn new(config: Option<ArgonConfig>) -> Result<Self> {
        let config = config.unwrap_or_default();

        let params = Params::new(
            config.memory_cost,
            config.iterations,
            config.parallelism,
            Some(config.hash_length),
        )
        .map_err(|err| CryptoError::Argon2(err.to_string()))?;

        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'_> {
        Argon2::new(
            argon2::Algorithm::Argon2id,
            Version::V0x13,
            self.params.clone(),
        )
    }

    /// Hash password using Argon2id.
    pub fn hash_password(&self, password: impl AsRef<[u8]>) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_ref(), &salt)
            .map_err(|e| CryptoError::Argon2(e.to_string()))?;

        Ok(hash.to_string())
    }

    /// Verify password against a PHC string.
    ///
    /// Any parse or verification failure is reported as
    /// [`CryptoError::Mismatch`]; the caller decides which business signal
    /// it maps to.
    pub fn verify_password(
        &self,
        password: impl AsRef<[u8]>,
        phc_hash: &str,
    ) -> Result<()> {
        let parsed =
            PasswordHash::new(phc_hash).map_err(|_| CryptoError::Mismatch)?;

        self.argon2()
            .verify_password(password.as_ref(), &parsed)
            .map_err(|_| CryptoError::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> PasswordManager {
        // Small parameters to keep tests fast.
        PasswordManager::new(Some(ArgonConfig {
            memory_cost: 1024,
            iterations: 1,
            parallelism: 1,
            hash_length: 32,
        }))
        .unwrap()
    }

    #[test]
    fn hash_then_verify() {
        let pwd = manager();
        let hash = pwd.hash_password("StRong_Pa$$W0rD").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        pwd.verify_password("StRong_Pa$$W0rD", &hash).unwrap();
    }

    #[test]
    fn wrong_password_is_mismatch() {
        let pwd = manager();
        let hash = pwd.hash_password("StRong_Pa$$W0rD").unwrap();

        let err = pwd.verify_password("wrong", &hash).unwrap_err();
        assert!(matches!(err, CryptoError::Mismatch));
    }
}

//! Manage json web tokens.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::user::Role;

/// Session token lifetime, in seconds.
pub const SESSION_EXPIRATION: u64 = 60 * 15; // 15 minutes.
/// Confirmation token lifetime, in seconds.
pub const CONFIRM_EXPIRATION: u64 = 60 * 60 * 24; // 24 hours.
/// Reset token lifetime, in seconds.
pub const RESET_EXPIRATION: u64 = 60 * 60; // 1 hour.

/// What a token is allowed to be used for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    /// Authenticated session.
    Session,
    /// Account confirmation link.
    Confirm,
    /// Password reset link.
    Reset,
}

/// Pieces of information asserted on a JWT.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Recipients that the JWT is intended for.
    pub aud: String,
    /// Identifies the expiration time on or after which the JWT must not be
    /// accepted for processing.
    pub exp: u64,
    /// Identifies the time at which the JWT was issued.
    pub iat: u64,
    /// Identifies the organization that issued the JWT.
    pub iss: String,
    /// User ID.
    pub sub: String,
    pub purpose: Purpose,
    /// Only asserted on session tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// Manage JWT tokens.
#[derive(Clone)]
pub struct TokenManager {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    name: String,
    audience: String,
}

impl TokenManager {
    /// Create a new [`TokenManager`] instance.
    pub fn new(name: &str, secret: &str) -> Self {
        Self {
            algorithm: Algorithm::HS256,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            name: name.to_owned(),
            audience: name.to_owned(),
        }
    }

    /// Set `audience` field on JWT.
    pub fn audience(&mut self, audience: &str) {
        self.audience = audience.to_owned();
    }

    fn create(
        &self,
        user_id: i32,
        purpose: Purpose,
        role: Option<Role>,
        lifetime: u64,
    ) -> Result<String> {
        let time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let header = Header::new(self.algorithm);
        let claims = Claims {
            aud: self.audience.clone(),
            exp: time + lifetime,
            iat: time,
            iss: self.name.clone(),
            sub: user_id.to_string(),
            purpose,
            role,
        };

        Ok(encode(&header, &claims, &self.encoding_key)?)
    }

    /// Create a session token carrying the user's role.
    pub fn session(&self, user_id: i32, role: Role) -> Result<String> {
        self.create(user_id, Purpose::Session, Some(role), SESSION_EXPIRATION)
    }

    /// Create a confirmation token bound to a user.
    pub fn confirm(&self, user_id: i32) -> Result<String> {
        self.create(user_id, Purpose::Confirm, None, CONFIRM_EXPIRATION)
    }

    /// Create a password-reset token bound to a user.
    pub fn reset(&self, user_id: i32) -> Result<String> {
        self.create(user_id, Purpose::Reset, None, RESET_EXPIRATION)
    }

    /// Decode and check a token.
    pub fn decode(
        &self,
        token: &str,
    ) -> std::result::Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_audience(&[&self.audience]);

        Ok(decode::<Claims>(token, &self.decoding_key, &validation)?.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> TokenManager {
        TokenManager::new("scriba.example.com", "secret-for-tests")
    }

    #[test]
    fn session_token_round_trip() {
        let token = manager().session(42, Role::Admin).unwrap();
        let claims = manager().decode(&token).unwrap();

        assert_eq!(claims.sub, "42");
        assert_eq!(claims.purpose, Purpose::Session);
        assert_eq!(claims.role, Some(Role::Admin));
        assert_eq!(claims.iss, "scriba.example.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn confirmation_token_is_subject_bound() {
        let token = manager().confirm(7).unwrap();
        let claims = manager().decode(&token).unwrap();

        assert_eq!(claims.sub, "7");
        assert_eq!(claims.purpose, Purpose::Confirm);
        assert_eq!(claims.role, None);
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let token = TokenManager::new("scriba.example.com", "other-secret")
            .reset(7)
            .unwrap();

        assert!(manager().decode(&token).is_err());
    }
}

mod repository;
mod service;

pub use repository::*;
pub use service::*;

use serde::{Deserialize, Serialize};

/// Account status, stored as an integer code.
///
/// Drives login eligibility: only [`UserStatus::Active`] accounts may
/// authenticate.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type,
)]
#[repr(i16)]
pub enum UserStatus {
    /// Account created but not yet confirmed via emailed token.
    #[default]
    Pending = 0,
    /// Confirmed account eligible to authenticate.
    Active = 1,
    /// Administratively disabled account.
    Blocked = 2,
}

/// Closed set of roles governing boundary authorization checks.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type,
)]
#[repr(i16)]
pub enum Role {
    Admin = 0,
    #[default]
    User = 1,
}

/// User as saved on database.
#[derive(
    Clone, Debug, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow,
)]
pub struct User {
    pub id: i32,
    pub names: String,
    pub surnames: String,
    pub email: String,
    #[serde(skip)]
    pub password: String,
    /// True forces a password change before the next successful login.
    pub reset_password: bool,
    pub role: Role,
    pub status: UserStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Fields supplied at registration. The store assigns `id`, `status` and
/// `created_at`.
#[derive(Clone, Debug, Default)]
pub struct NewUser {
    pub names: String,
    pub surnames: String,
    pub email: String,
    /// Argon2 PHC string, never a plain password.
    pub password: String,
    pub role: Role,
}

/// Ownership index of a user's articles and comments.
///
/// Maintained by the store instead of embedded entity collections so the
/// user graph stays acyclic.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OwnedContent {
    pub article_ids: Vec<i32>,
    pub comment_ids: Vec<i32>,
}

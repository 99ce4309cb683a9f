//! Account lifecycle manager.
//!
//! Owns the status transitions of a [`User`] (Pending, Active, Blocked plus
//! the reset-password flag) and every rule around registration,
//! confirmation, login and password changes. Callers hold authorization
//! checks at the boundary; this service never inspects caller identity.

use std::sync::Arc;

use crate::crypto::{CryptoError, PasswordManager};
use crate::error::{Result, ServerError};
use crate::mail::MailManager;
use crate::token::{Purpose, TokenManager};
use crate::user::{
    NewUser, OwnedContent, Role, StoreError, User, UserStatus, UserStore,
};

/// Expected business-rule outcomes, matched explicitly by callers instead
/// of comparing reason strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("a user with this email already exists")]
    UserExists,
    #[error("this account has been blocked")]
    UserBlocked,
    #[error("invalid email or password")]
    UserNotLogin,
    #[error("a password reset must be completed before login")]
    ResetPassword,
    #[error("this account is awaiting email confirmation")]
    UserPending,
    #[error("email or current password is incorrect")]
    EmailOrPassword,
    #[error("user not found")]
    NotFound,
}

impl LifecycleError {
    /// Machine-readable reason code carried on problem responses.
    pub fn reason(&self) -> &'static str {
        match self {
            LifecycleError::UserExists => "user_exists",
            LifecycleError::UserBlocked => "user_blocked",
            LifecycleError::UserNotLogin => "user_not_login",
            LifecycleError::ResetPassword => "reset_password",
            LifecycleError::UserPending => "user_pending",
            LifecycleError::EmailOrPassword => "email_or_password",
            LifecycleError::NotFound => "not_found",
        }
    }
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        match err {
            // Two racing registrations resolve at the store's uniqueness
            // constraint.
            StoreError::DuplicateEmail => LifecycleError::UserExists.into(),
            StoreError::NotFound => LifecycleError::NotFound.into(),
            StoreError::Sql(err) => ServerError::Sql(err),
        }
    }
}

/// Registration input, password still in plain text.
#[derive(Clone, Debug, Default)]
pub struct Registration {
    pub names: String,
    pub surnames: String,
    pub email: String,
    pub password: String,
}

/// Mutable fields overwritten by an admin update.
#[derive(Clone, Debug)]
pub struct UserUpdate {
    pub names: String,
    pub surnames: String,
    pub email: String,
    pub role: Role,
}

/// Outcome of a confirmation attempt. Always rendered as a human-readable
/// message, never an error status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Confirmed,
    /// Re-confirming an active account is a no-op.
    AlreadyActive,
    Invalid,
}

/// User manager.
#[derive(Clone)]
pub struct UserService {
    pub store: Arc<dyn UserStore>,
    pub crypto: Arc<PasswordManager>,
    pub token: TokenManager,
    pub mail: MailManager,
}

impl UserService {
    /// Create a new [`UserService`].
    pub fn new(
        store: Arc<dyn UserStore>,
        crypto: Arc<PasswordManager>,
        token: TokenManager,
        mail: MailManager,
    ) -> Self {
        Self {
            store,
            crypto,
            token,
            mail,
        }
    }

    /// Register a new account in `Pending` status and mail a confirmation
    /// link built from `origin_host`.
    ///
    /// The mail is best-effort: a send failure is logged and does not roll
    /// back the registration.
    pub async fn register(
        &self,
        registration: Registration,
        origin_host: &str,
        role: Role,
    ) -> Result<User> {
        let email = registration.email.trim().to_lowercase();

        if let Some(existing) = self.store.find_by_email(&email).await? {
            if existing.status == UserStatus::Blocked {
                return Err(LifecycleError::UserBlocked.into());
            }
            return Err(LifecycleError::UserExists.into());
        }

        let password = self.crypto.hash_password(&registration.password)?;
        let user = self
            .store
            .create(NewUser {
                names: registration.names,
                surnames: registration.surnames,
                email,
                password,
                role,
            })
            .await?;

        let token = self.token.confirm(user.id)?;
        let link = format!(
            "https://{origin_host}/users/confirm/{}/{token}",
            user.id
        );
        if let Err(err) = self
            .mail
            .send_confirmation(&user.email, &user.names, &link)
            .await
        {
            tracing::error!(
                user_id = user.id,
                error = %err,
                "confirmation mail not sent"
            );
        }

        tracing::info!(user_id = user.id, role = ?user.role, "user registered");

        Ok(user)
    }

    /// Validate a confirmation token and activate the account.
    pub async fn confirm(
        &self,
        user_id: i32,
        token: &str,
    ) -> Result<ConfirmOutcome> {
        let Ok(claims) = self.token.decode(token) else {
            return Ok(ConfirmOutcome::Invalid);
        };
        if claims.purpose != Purpose::Confirm
            || claims.sub != user_id.to_string()
        {
            return Ok(ConfirmOutcome::Invalid);
        }

        let Some(user) = self.store.find_by_id(user_id).await? else {
            return Ok(ConfirmOutcome::Invalid);
        };

        match user.status {
            UserStatus::Active => Ok(ConfirmOutcome::AlreadyActive),
            UserStatus::Blocked => Ok(ConfirmOutcome::Invalid),
            UserStatus::Pending => {
                self.store.set_status(user_id, UserStatus::Active).await?;
                tracing::info!(user_id, "account confirmed");
                Ok(ConfirmOutcome::Confirmed)
            },
        }
    }

    /// Authenticate a user, returning a session token.
    ///
    /// Exactly one signal is surfaced per failed attempt, in priority
    /// order: `UserNotLogin`, `UserBlocked`, `ResetPassword`,
    /// `UserPending`.
    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let email = email.trim().to_lowercase();

        let Some(user) = self.store.find_by_email(&email).await? else {
            return Err(LifecycleError::UserNotLogin.into());
        };
        match self.crypto.verify_password(password, &user.password) {
            Ok(()) => (),
            Err(CryptoError::Mismatch) => {
                return Err(LifecycleError::UserNotLogin.into());
            },
            Err(err) => return Err(err.into()),
        }

        if user.status == UserStatus::Blocked {
            return Err(LifecycleError::UserBlocked.into());
        }
        if user.reset_password {
            return Err(LifecycleError::ResetPassword.into());
        }
        if user.status == UserStatus::Pending {
            return Err(LifecycleError::UserPending.into());
        }

        tracing::debug!(user_id = user.id, "user logged in");

        self.token.session(user.id, user.role)
    }

    /// Replace the stored password after verifying the current credentials,
    /// clearing the reset-password flag.
    pub async fn change_password(
        &self,
        email: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let email = email.trim().to_lowercase();

        let Some(user) = self.store.find_by_email(&email).await? else {
            return Err(LifecycleError::EmailOrPassword.into());
        };
        match self
            .crypto
            .verify_password(current_password, &user.password)
        {
            Ok(()) => (),
            Err(CryptoError::Mismatch) => {
                return Err(LifecycleError::EmailOrPassword.into());
            },
            Err(err) => return Err(err.into()),
        }

        let hash = self.crypto.hash_password(new_password)?;
        self.store.set_password(user.id, &hash, false).await?;

        tracing::info!(user_id = user.id, "password changed");

        Ok(())
    }

    /// Flag the account for a mandatory password reset and mail a reset
    /// link built from `origin_host`.
    ///
    /// An unknown email or an account that never completed confirmation
    /// signals `UserNotLogin`. The mail is best-effort, like registration.
    pub async fn request_password_reset(
        &self,
        email: &str,
        origin_host: &str,
    ) -> Result<()> {
        let email = email.trim().to_lowercase();

        let Some(user) = self.store.find_by_email(&email).await? else {
            return Err(LifecycleError::UserNotLogin.into());
        };
        if user.status != UserStatus::Active {
            return Err(LifecycleError::UserNotLogin.into());
        }

        self.store.set_reset_flag(user.id, true).await?;

        let token = self.token.reset(user.id)?;
        // The reset page lives on the frontend; it calls back into
        // `POST /users/changepassword`.
        let link = format!(
            "https://{origin_host}/account/reset/{}/{token}",
            user.id
        );
        if let Err(err) =
            self.mail.send_reset(&user.email, &user.names, &link).await
        {
            tracing::error!(
                user_id = user.id,
                error = %err,
                "reset mail not sent"
            );
        }

        tracing::info!(user_id = user.id, "password reset requested");

        Ok(())
    }

    /// Unconditionally overwrite a user's status. No transition-legality
    /// checks: Blocked to Active is permitted without re-confirmation.
    pub async fn set_status(
        &self,
        user_id: i32,
        status: UserStatus,
    ) -> Result<()> {
        self.store.set_status(user_id, status).await?;
        tracing::info!(user_id, ?status, "status overwritten");
        Ok(())
    }

    /// Overwrite the mutable fields of a user record.
    pub async fn update(&self, user_id: i32, fields: UserUpdate) -> Result<()> {
        let Some(mut user) = self.store.find_by_id(user_id).await? else {
            return Err(LifecycleError::NotFound.into());
        };

        user.names = fields.names;
        user.surnames = fields.surnames;
        user.email = fields.email.trim().to_lowercase();
        user.role = fields.role;

        self.store.update(&user).await?;
        Ok(())
    }

    /// Hard-delete a user; owned articles and comments follow the store
    /// cascade.
    pub async fn delete(&self, user_id: i32) -> Result<()> {
        self.store.delete(user_id).await?;
        tracing::info!(user_id, "user deleted");
        Ok(())
    }

    /// A user record together with its ownership index.
    pub async fn get(&self, user_id: i32) -> Result<(User, OwnedContent)> {
        let Some(user) = self.store.find_by_id(user_id).await? else {
            return Err(LifecycleError::NotFound.into());
        };
        let owned = self.store.owned_content(user_id).await?;
        Ok((user, owned))
    }

    /// Every user record.
    pub async fn list(&self) -> Result<Vec<User>> {
        Ok(self.store.list().await?)
    }
}

//! Link target of the confirmation mail.

use axum::extract::{Path, State};

use crate::AppState;
use crate::error::Result;
use crate::user::ConfirmOutcome;

/// Handler to confirm a freshly registered account.
///
/// Always answers 200 with a human-readable message; an invalid or expired
/// link is not distinguishable from the outside.
pub async fn handler(
    State(state): State<AppState>,
    Path((user_id, token)): Path<(i32, String)>,
) -> Result<String> {
    let message = match state.users.confirm(user_id, &token).await? {
        ConfirmOutcome::Confirmed => {
            "Your account has been confirmed. You can now log in."
        },
        ConfirmOutcome::AlreadyActive => "Your account was already confirmed.",
        ConfirmOutcome::Invalid => {
            "This confirmation link is invalid or has expired."
        },
    };

    Ok(message.to_owned())
}

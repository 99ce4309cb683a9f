//! Password change and reset requests.

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::router::{Valid, origin_host};

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangeBody {
    #[validate(email(message = "Email must be formatted."))]
    pub email: String,
    #[validate(length(min = 1, message = "Current password must not be empty."))]
    pub current_password: String,
    #[validate(length(
        min = 8,
        max = 255,
        message = "Password must contain at least 8 characters."
    ))]
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ResetBody {
    #[validate(email(message = "Email must be formatted."))]
    pub email: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub message: String,
}

/// Handler to replace a password using the current credentials.
pub async fn change_handler(
    State(state): State<AppState>,
    Valid(body): Valid<ChangeBody>,
) -> Result<Json<Response>> {
    state
        .users
        .change_password(&body.email, &body.current_password, &body.new_password)
        .await?;

    Ok(Json(Response {
        message: "Password updated.".to_owned(),
    }))
}

/// Handler to request a password-reset link by mail.
pub async fn reset_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Valid(body): Valid<ResetBody>,
) -> Result<Json<Response>> {
    let host = origin_host(&state, &headers);
    state.users.request_password_reset(&body.email, &host).await?;

    Ok(Json(Response {
        message: "Password reset requested. Check your email.".to_owned(),
    }))
}

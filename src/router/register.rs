use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::router::{Valid, origin_host};
use crate::user::{Registration, Role};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(length(min = 1, max = 100, message = "Names must not be empty."))]
    pub names: String,
    #[validate(length(min = 1, max = 100, message = "Surnames must not be empty."))]
    pub surnames: String,
    #[validate(email(message = "Email must be formatted."))]
    pub email: String,
    #[validate(length(
        min = 8,
        max = 255,
        message = "Password must contain at least 8 characters."
    ))]
    pub password: String,
}

impl From<Body> for Registration {
    fn from(body: Body) -> Self {
        Registration {
            names: body.names,
            surnames: body.surnames,
            email: body.email,
            password: body.password,
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub message: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct AdminResponse {
    pub id: i32,
}

/// Handler to register a user account.
pub async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Valid(body): Valid<Body>,
) -> Result<(StatusCode, Json<Response>)> {
    let host = origin_host(&state, &headers);
    state.users.register(body.into(), &host, Role::User).await?;

    Ok((
        StatusCode::CREATED,
        Json(Response {
            message: "Account created. Check your email to confirm it."
                .to_owned(),
        }),
    ))
}

/// Handler to register an admin account.
pub async fn admin_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Valid(body): Valid<Body>,
) -> Result<(StatusCode, Json<AdminResponse>)> {
    let host = origin_host(&state, &headers);
    let user = state
        .users
        .register(body.into(), &host, Role::Admin)
        .await?;

    Ok((StatusCode::CREATED, Json(AdminResponse { id: user.id })))
}

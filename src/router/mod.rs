//! Users-related HTTP API.
mod admin;
mod confirm;
mod login;
mod password;
mod register;

use axum::extract::{FromRequest, Request, State};
use axum::http::{HeaderMap, header};
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::{Json, Router, middleware};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::token::Purpose;
use crate::user::Role;
use crate::{AppState, ServerError};

const BEARER: &str = "Bearer ";

/// Json body extractor running `validator` checks before the handler.
pub struct Valid<T>(pub T);

impl<S, T> FromRequest<S> for Valid<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ServerError;

    async fn from_request(
        req: Request,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Valid(value))
    }
}

/// Host the caller reached us on, used to build mailed links.
pub(crate) fn origin_host(state: &AppState, headers: &HeaderMap) -> String {
    headers
        .get(header::HOST)
        .and_then(|host| host.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| state.config.url.clone())
}

/// Custom middleware gating admin routes.
///
/// Requires a session token asserting the `Admin` role. The lifecycle
/// service itself never inspects caller identity.
async fn admin_auth(
    State(state): State<AppState>,
    req: Request,
    next: middleware::Next,
) -> Result<Response, ServerError> {
    let claims = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|token| {
            state.users.token.decode(&token.replace(BEARER, "")).ok()
        })
        .ok_or(ServerError::Unauthorized)?;

    if claims.purpose != Purpose::Session || claims.role != Some(Role::Admin) {
        return Err(ServerError::Unauthorized);
    }

    Ok(next.run(req).await)
}

pub fn users(state: AppState) -> Router<AppState> {
    let admin = Router::new()
        // `GET /users` goes to `list`. Admin only.
        .route("/", get(admin::list))
        .route(
            "/{user_id}",
            get(admin::get).put(admin::update).delete(admin::remove),
        )
        // Unconditional status overwrites. Admin only.
        .route("/blocked/{user_id}", put(admin::block))
        .route("/pending/{user_id}", put(admin::pending))
        .route("/active/{user_id}", put(admin::activate))
        .route_layer(middleware::from_fn_with_state(state, admin_auth));

    Router::new()
        // `POST /users/register` goes to `register`.
        .route("/register", post(register::handler))
        .route("/registeradmin", post(register::admin_handler))
        // `POST /users/login` goes to `login`.
        .route("/login", post(login::handler))
        .route("/changepassword", post(password::change_handler))
        .route("/resetpassword", post(password::reset_handler))
        // Link target of the confirmation mail.
        .route("/confirm/{user_id}/{token}", get(confirm::handler))
        .merge(admin)
}

#[cfg(test)]
pub(crate) fn state_with(
    store: std::sync::Arc<dyn crate::user::UserStore>,
) -> AppState {
    use std::sync::Arc;

    use crate::config::{Argon2, Configuration};
    use crate::crypto::PasswordManager;
    use crate::mail::MailManager;
    use crate::token::TokenManager;
    use crate::user::UserService;

    // Small argon2 parameters to keep tests fast.
    let crypto = PasswordManager::new(Some(Argon2 {
        memory_cost: 1024,
        iterations: 1,
        parallelism: 1,
        hash_length: 32,
    }))
    .expect("cannot build password manager");

    let mut config = Configuration::default();
    config.name = "scriba".into();
    config.url = "blog.example.com".into();

    AppState {
        users: UserService::new(
            store,
            Arc::new(crypto),
            TokenManager::new(&config.url, "secret-for-tests"),
            MailManager::default(),
        ),
        config: Arc::new(config),
    }
}

#[cfg(test)]
pub(crate) fn state() -> AppState {
    state_with(std::sync::Arc::new(crate::user::MemoryUserStore::new()))
}
